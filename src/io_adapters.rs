use std::fs;
use std::io::{BufRead, Cursor, Read, Result as IoResult};
use std::path::Path;

/// Memory-backed reader over an invocation's pending input.
///
/// Public so tools can hold it wherever they would hold stdin.
#[derive(Debug)]
pub struct InputReader {
    cursor: Cursor<Vec<u8>>,
}

impl InputReader {
    /// Create an InputReader that will read from the provided buffer.
    pub fn new(buf: Vec<u8>) -> Self {
        Self {
            cursor: Cursor::new(buf),
        }
    }
}

impl Read for InputReader {
    fn read(&mut self, out: &mut [u8]) -> IoResult<usize> {
        self.cursor.read(out)
    }
}

impl BufRead for InputReader {
    fn fill_buf(&mut self) -> IoResult<&[u8]> {
        self.cursor.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.cursor.consume(amt)
    }
}

/// Read one command line, without its trailing `\n`.
///
/// Returns `None` at end of stream. Only the newline is removed, so a
/// `\r` sent by the peer stays part of the line. Bytes that are not UTF-8
/// are replaced rather than rejected.
pub(crate) fn read_command_line(input: &mut dyn BufRead) -> IoResult<Option<String>> {
    let mut raw = Vec::new();
    if input.read_until(b'\n', &mut raw)? == 0 {
        return Ok(None);
    }
    if raw.last() == Some(&b'\n') {
        raw.pop();
    }
    Ok(Some(String::from_utf8_lossy(&raw).into_owned()))
}

/// Read up to `count` raw bytes, stopping early only at end of stream.
///
/// Consumes exactly the returned bytes from `input`, so the next line read
/// starts right after them.
pub(crate) fn read_payload(input: &mut dyn BufRead, count: u64) -> IoResult<Vec<u8>> {
    let mut payload = Vec::new();
    input.take(count).read_to_end(&mut payload)?;
    Ok(payload)
}

/// Whole-file read that yields an empty buffer when the file is missing or
/// unreadable.
pub(crate) fn read_file_lossy(path: &Path) -> Vec<u8> {
    match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "in.file unreadable, using empty input");
            Vec::new()
        }
    }
}
