use anyhow::Context;
use clap::Parser;
use logtail::{Config, TailManager};
use std::collections::HashSet;
use std::path::PathBuf;
use tokio_stream::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Follow log files and print every new line.
#[derive(Debug, Parser)]
#[command(name = "logtail", version)]
struct Cli {
    /// Path to a config file (default: logtail.yaml here, then ~/.config)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Comma-separated stream names to leave out of auto-discovery
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Only show lines written after startup
    #[arg(long)]
    tail: bool,

    /// Debug logging on stderr
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut cfg = Config::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "no usable config; relying on auto-discovery");
        Config::default()
    });

    let excluded: HashSet<String> = cli
        .exclude
        .iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    if let Err(e) = cfg.auto_discover(&excluded) {
        warn!(error = %e, "auto-discovery failed");
    }

    let manager = TailManager::new(cfg.engine.to_options(cli.tail));

    for group in &cfg.groups {
        manager
            .create_or_replace_group(
                &group.name,
                &group.pattern,
                group.color.as_deref(),
                group.streams.clone(),
            )
            .with_context(|| format!("invalid group '{}'", group.name))?;
    }

    // Subscribe before tailing so no line read at startup is missed.
    let mut live = manager.subscribe()?;

    for stream in cfg.streams {
        let name = stream.name.clone();
        match manager.tail(stream).await {
            Ok(files) => info!(stream = %name, files, "tailing"),
            Err(e) => warn!(stream = %name, error = %e, "failed to tail"),
        }
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            next = live.next() => match next {
                Some(entry) => println!("{entry}"),
                None => break,
            },
        }
    }

    let stats = manager.stats()?;
    manager.shutdown().await;
    info!(
        files = stats.source_count,
        groups = stats.group_count,
        buffered = stats.buffer_size,
        overflow_dropped = stats.overflow_dropped,
        drain_skipped = stats.drain_skipped,
        skipped = live.skipped(),
        "stopped"
    );
    Ok(())
}
