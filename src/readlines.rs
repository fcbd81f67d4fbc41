//! Line-oriented reader for command FIFOs
//!
//! Clients write newline-terminated commands into a FIFO and may do so in
//! arbitrary pieces. [`LineReader`] gathers whatever is available, hands out
//! every complete line and keeps the unterminated tail for the next call.

use std::io::{ErrorKind, Read};

use tracing::{debug, warn};

/// Buffer size before any growth
pub const INITIAL_CAPACITY: usize = 4095;
/// Growth step when a read fills the buffer
pub const GROW_STEP: usize = 4096;
/// Largest amount of unterminated data kept (1 MiB - 1)
pub const MAX_CAPACITY: usize = 1024 * 1024 - 1;

/// Per-channel line buffer
#[derive(Debug)]
pub struct LineReader {
    /// Read buffer; its length is the current capacity
    buf: Vec<u8>,
    /// Bytes of `buf` holding unconsumed data
    filled: usize,
}

impl Default for LineReader {
    fn default() -> Self {
        Self::new()
    }
}

impl LineReader {
    pub fn new() -> Self {
        Self {
            buf: vec![0; INITIAL_CAPACITY],
            filled: 0,
        }
    }

    /// Bytes carried over from previous reads
    pub fn pending(&self) -> usize {
        self.filled
    }

    /// Read what is available and return every complete line
    ///
    /// The returned block ends with a newline and may hold several lines.
    /// Lines that are not valid UTF-8 are dropped. `None` means nothing
    /// complete is available yet.
    pub fn read_lines<R: Read>(&mut self, src: &mut R) -> Option<String> {
        loop {
            let start = self.filled;
            if start >= self.buf.len() {
                break;
            }
            let want = self.buf.len() - start;
            let got = match src.read(&mut self.buf[start..]) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => 0,
                Err(e) => {
                    debug!("Command channel read failed: {}", e);
                    0
                }
            };
            self.filled += got;
            if got < want || self.buf.len() >= MAX_CAPACITY {
                break;
            }
            // Filled exactly: grow and read again
            let grown = (self.buf.len() + GROW_STEP).min(MAX_CAPACITY);
            self.buf.resize(grown, 0);
        }

        if self.filled == 0 {
            self.shrink();
            return None;
        }

        match self.buf[..self.filled].iter().rposition(|&b| b == b'\n') {
            Some(last) => {
                let end = last + 1;
                let block = self.buf[..end].to_vec();
                self.buf.copy_within(end..self.filled, 0);
                self.filled -= end;
                if self.filled == 0 {
                    self.shrink();
                }
                match String::from_utf8(block) {
                    Ok(text) => Some(text),
                    Err(e) => valid_lines(&e.into_bytes()),
                }
            }
            None if self.filled >= MAX_CAPACITY => {
                warn!(
                    "Too much command data without a newline, discarding {} bytes",
                    self.filled
                );
                self.filled = 0;
                self.shrink();
                None
            }
            None => None,
        }
    }

    /// Drop a grown buffer once nothing is carried over
    fn shrink(&mut self) {
        if self.buf.len() > INITIAL_CAPACITY {
            self.buf = vec![0; INITIAL_CAPACITY];
        }
    }
}

/// Keep the lines of a block that decode as UTF-8
fn valid_lines(block: &[u8]) -> Option<String> {
    let mut text = String::with_capacity(block.len());
    for line in block.split_inclusive(|&b| b == b'\n') {
        match std::str::from_utf8(line) {
            Ok(line) => text.push_str(line),
            Err(_) => warn!("Discarding command line with invalid UTF-8 ({} bytes)", line.len()),
        }
    }
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;

    /// Hands out scripted chunks, then reports WouldBlock
    struct Chunks(VecDeque<Vec<u8>>);

    impl Chunks {
        fn new(parts: &[&[u8]]) -> Self {
            Self(parts.iter().map(|p| p.to_vec()).collect())
        }
    }

    impl Read for Chunks {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            let Some(mut chunk) = self.0.pop_front() else {
                return Err(io::Error::from(ErrorKind::WouldBlock));
            };
            let n = chunk.len().min(out.len());
            out[..n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                self.0.push_front(chunk.split_off(n));
            }
            Ok(n)
        }
    }

    fn collect_lines(reader: &mut LineReader, src: &mut impl Read, calls: usize) -> Vec<String> {
        let mut lines = Vec::new();
        for _ in 0..calls {
            if let Some(block) = reader.read_lines(src) {
                assert!(block.ends_with('\n'));
                lines.extend(block.lines().map(str::to_string));
            }
        }
        lines
    }

    #[test]
    fn test_nothing_available() {
        let mut reader = LineReader::new();
        assert_eq!(reader.read_lines(&mut Chunks::new(&[])), None);
        assert_eq!(reader.read_lines(&mut io::empty()), None);
    }

    #[test]
    fn test_whole_lines() {
        let mut reader = LineReader::new();
        let mut src = Chunks::new(&[b"rgb ffffff\nswitch\n"]);
        assert_eq!(
            reader.read_lines(&mut src).as_deref(),
            Some("rgb ffffff\nswitch\n")
        );
        assert_eq!(reader.pending(), 0);
    }

    #[test]
    fn test_partial_line_carried_over() {
        let mut reader = LineReader::new();
        let mut src = Chunks::new(&[b"mode 2\nrgb ff", b"0000\n"]);
        assert_eq!(reader.read_lines(&mut src).as_deref(), Some("mode 2\n"));
        assert_eq!(reader.pending(), 6);
        assert_eq!(reader.read_lines(&mut src).as_deref(), Some("rgb ff0000\n"));
    }

    #[test]
    fn test_no_newline_retained() {
        let mut reader = LineReader::new();
        let mut src = Chunks::new(&[b"notify", b"on all", b"\n"]);
        assert_eq!(reader.read_lines(&mut src), None);
        assert_eq!(reader.read_lines(&mut src), None);
        assert_eq!(reader.read_lines(&mut src).as_deref(), Some("notifyon all\n"));
    }

    #[test]
    fn test_arbitrary_splits_preserve_lines() {
        let text = b"mode 1\nrgb 00ff00\nnotifyon all\nbind a:b\nswitch\nget :mode\n";
        let expected: Vec<String> = std::str::from_utf8(text)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();

        for step in 1..text.len() {
            let parts: Vec<&[u8]> = text.chunks(step).collect();
            let mut src = Chunks::new(&parts);
            let mut reader = LineReader::new();
            let lines = collect_lines(&mut reader, &mut src, parts.len() + 1);
            assert_eq!(lines, expected, "split every {} bytes", step);
            assert_eq!(reader.pending(), 0);
        }
    }

    #[test]
    fn test_large_block_grows_buffer() {
        let line = "rgb ffffff\n".repeat(1000);
        let mut src = io::Cursor::new(line.clone().into_bytes());
        let mut reader = LineReader::new();
        let block = reader.read_lines(&mut src).unwrap();
        assert_eq!(block, line);
    }

    #[test]
    fn test_overlong_line_discarded() {
        let mut data = vec![b'a'; MAX_CAPACITY + 10];
        data.extend_from_slice(b"\nswitch\n");
        let mut src = io::Cursor::new(data);
        let mut reader = LineReader::new();

        assert_eq!(reader.read_lines(&mut src), None);
        assert_eq!(reader.pending(), 0);
        // The remainder of the overlong line comes through on its own
        let block = reader.read_lines(&mut src).unwrap();
        assert!(block.ends_with("\nswitch\n"));
    }

    #[test]
    fn test_invalid_utf8_line_dropped() {
        let mut reader = LineReader::new();
        let mut src = Chunks::new(&[b"mode 2\nrgb \xff\xfe\nswitch\n"]);
        assert_eq!(reader.read_lines(&mut src).as_deref(), Some("mode 2\nswitch\n"));
        assert_eq!(reader.pending(), 0);

        let mut src = Chunks::new(&[b"\xc3\n"]);
        assert_eq!(reader.read_lines(&mut src), None);
        assert_eq!(reader.pending(), 0);
    }

    #[test]
    fn test_buffer_shrinks_after_burst() {
        let burst = "rgb ffffff\n".repeat(1000);
        let mut src = io::Cursor::new(burst.into_bytes());
        let mut reader = LineReader::new();
        assert!(reader.read_lines(&mut src).is_some());
        assert_eq!(reader.buf.len(), INITIAL_CAPACITY);

        // A partial line after a burst keeps working at the normal size
        let mut src = Chunks::new(&[b"swi", b"tch\n"]);
        assert_eq!(reader.read_lines(&mut src), None);
        assert_eq!(reader.read_lines(&mut src).as_deref(), Some("switch\n"));
    }

    #[test]
    fn test_read_errors_are_no_data() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("gone"))
            }
        }
        let mut reader = LineReader::new();
        assert_eq!(reader.read_lines(&mut Broken), None);
    }
}
