//! Line framing for subprocess output.
//!
//! Progress bars (tqdm, pip, `ollama pull`) redraw with a bare carriage
//! return and only write a newline when they close, so both count as line
//! ends here. Bytes are decoded lossily.

/// Splits a byte stream on `\r` and `\n`, skipping empty lines.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buffer: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for byte in chunk {
            if *byte == b'\n' || *byte == b'\r' {
                self.flush_into(&mut lines);
            } else {
                self.buffer.push(*byte);
            }
        }
        lines
    }

    /// The unterminated remainder, if any. Call once the stream hits EOF.
    pub fn finish(&mut self) -> Option<String> {
        let mut lines = Vec::new();
        self.flush_into(&mut lines);
        lines.pop()
    }

    fn flush_into(&mut self, lines: &mut Vec<String>) {
        let line = String::from_utf8_lossy(&self.buffer).trim().to_string();
        self.buffer.clear();
        if !line.is_empty() {
            lines.push(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_on_carriage_returns() {
        let mut splitter = LineSplitter::new();
        let lines = splitter.feed(b"pulling abc 10%\rpulling abc 20%\r\nverifying");
        assert_eq!(lines, vec!["pulling abc 10%", "pulling abc 20%"]);
        assert_eq!(splitter.finish().as_deref(), Some("verifying"));
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn test_partial_redraw_spans_chunks() {
        let mut splitter = LineSplitter::new();
        assert!(splitter.feed(b"Progreso:  1").is_empty());
        assert_eq!(splitter.feed(b"0%|#| 1/10\rProg"), vec!["Progreso:  10%|#| 1/10"]);
        assert_eq!(splitter.feed(b"reso:  50%\r"), vec!["Progreso:  50%"]);
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let mut splitter = LineSplitter::new();
        let lines = splitter.feed(b"bad \xff byte\n");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("bad "));
    }
}
