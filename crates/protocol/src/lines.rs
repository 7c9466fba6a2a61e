/// Reassembles whole lines from arbitrarily fragmented byte chunks.
///
/// The underlying transport does not respect event boundaries; a chunk may
/// end mid-line or carry several events at once. The splitter buffers the
/// trailing partial line between chunks so [`crate::EventParser`] only ever
/// sees whole lines.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buffer: Vec<u8>,
}

impl LineSplitter {
    /// Creates an empty splitter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns the lines it completed, without their
    /// terminators. `\r\n` terminators are accepted.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(end) = self.buffer.iter().position(|&byte| byte == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_lines() {
        let mut splitter = LineSplitter::new();
        assert_eq!(splitter.push(b"data: x\n\n"), vec!["data: x", ""]);
    }

    #[test]
    fn test_fragmented_mid_line() {
        let mut splitter = LineSplitter::new();
        assert!(splitter.push(b"data: he").is_empty());
        assert!(splitter.push(b"ll").is_empty());
        assert_eq!(splitter.push(b"o\n"), vec!["data: hello"]);
    }

    #[test]
    fn test_multiple_events_in_one_chunk() {
        let mut splitter = LineSplitter::new();
        let lines = splitter.push(b"event: yield\ndata: a\n\nevent: yield\ndata: b\n\n");
        assert_eq!(
            lines,
            vec!["event: yield", "data: a", "", "event: yield", "data: b", ""]
        );
    }

    #[test]
    fn test_crlf_terminators() {
        let mut splitter = LineSplitter::new();
        assert_eq!(splitter.push(b"data: x\r\n\r\n"), vec!["data: x", ""]);
    }

    #[test]
    fn test_partial_line_survives_between_chunks() {
        let mut splitter = LineSplitter::new();
        assert_eq!(splitter.push(b"data: a\ndata: b"), vec!["data: a"]);
        assert_eq!(splitter.push(b"c\n"), vec!["data: bc"]);
    }
}
