//! Incremental line extraction for followed files.

use std::io::SeekFrom;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Lines read in one poll of a file.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Chunk {
    /// Complete lines, newline stripped, in file order.
    pub lines: Vec<String>,
    /// The file had shrunk below the cursor and was re-read from the start.
    pub truncated: bool,
}

/// Read every newline-terminated line between `offset` and the current end of
/// `file`, advancing `offset` past the last consumed newline.
///
/// A trailing partial line is left unread for the next call.
pub(crate) async fn read_complete_lines(
    file: &mut File,
    offset: &mut u64,
) -> std::io::Result<Chunk> {
    let current_size = file.metadata().await?.len();

    let truncated = detect_file_truncation(current_size, *offset);
    if truncated {
        *offset = 0;
    }

    let bytes_to_read = match calculate_bytes_to_read(current_size, *offset) {
        Some(bytes) => bytes,
        None => {
            return Ok(Chunk {
                lines: Vec::new(),
                truncated,
            });
        }
    };

    file.seek(SeekFrom::Start(*offset)).await?;

    let mut buf = Vec::with_capacity(bytes_to_read as usize);
    (&mut *file).take(bytes_to_read).read_to_end(&mut buf).await?;

    let (lines, consumed) = split_complete_lines(&buf);
    *offset += consumed as u64;

    Ok(Chunk { lines, truncated })
}

/// Split `buf` into complete lines.
///
/// Returns the lines (without `\n` or a preceding `\r`) and the number of
/// bytes they occupied, i.e. the position just after the last newline.
/// Invalid UTF-8 is replaced rather than rejected.
fn split_complete_lines(buf: &[u8]) -> (Vec<String>, usize) {
    let Some(last_newline) = buf.iter().rposition(|&b| b == b'\n') else {
        return (Vec::new(), 0);
    };

    let lines = buf[..last_newline]
        .split(|&b| b == b'\n')
        .map(|line| {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            String::from_utf8_lossy(line).into_owned()
        })
        .collect();

    (lines, last_newline + 1)
}

/// Detect if the file was truncated by comparing current size with last position
fn detect_file_truncation(current_size: u64, last_position: u64) -> bool {
    current_size < last_position
}

/// Calculate bytes to read based on current size and last position
fn calculate_bytes_to_read(current_size: u64, last_position: u64) -> Option<u64> {
    if current_size <= last_position {
        None
    } else {
        Some(current_size - last_position)
    }
}
