/// Incremental parser for the client side of an SSE stream.
///
/// Feed it body chunks as they arrive; it returns the `data` payload of
/// every event block completed by the chunk. Chunks may split lines (and
/// UTF-8 sequences) anywhere.
///
/// Handled subset of the event-stream format:
/// - `\n` and `\r\n` line endings
/// - multiple `data:` lines in a block, joined with `\n`
/// - comment lines (`:ping`) are skipped; a block holding only comments
///   yields nothing
/// - other fields (`event:`, `id:`, `retry:`) are ignored
///
/// A line longer than the limit (1 MiB by default) is dropped up to its
/// terminating newline instead of being buffered.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    data: Vec<String>,
    max_line_len: usize,
    skipping_line: bool,
}

pub const DEFAULT_MAX_LINE_LEN: usize = 1024 * 1024;

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::with_max_line_len(DEFAULT_MAX_LINE_LEN)
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line_len(max_line_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            data: Vec::new(),
            max_line_len: max_line_len.max(1),
            skipping_line: false,
        }
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buf[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            if self.skipping_line {
                self.skipping_line = false;
            } else if end - start <= self.max_line_len {
                let line = &self.buf[start..end];
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                let line = String::from_utf8_lossy(line).into_owned();
                self.process_line(&line, &mut frames);
            } else {
                tracing::warn!(len = end - start, "Dropping oversized SSE line");
            }
            start = end + 1;
        }
        self.buf.drain(..start);

        if self.buf.len() > self.max_line_len {
            if !self.skipping_line {
                tracing::warn!(limit = self.max_line_len, "Dropping oversized SSE line");
            }
            self.buf.clear();
            self.skipping_line = true;
        }
        frames
    }

    fn process_line(&mut self, line: &str, frames: &mut Vec<String>) {
        if line.is_empty() {
            if !self.data.is_empty() {
                frames.push(self.data.join("\n"));
                self.data.clear();
            }
            return;
        }
        if line.starts_with(':') {
            return;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data.push(value.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_frame() {
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.feed(b"data: {\"a\":1}\n\n"), vec!["{\"a\":1}"]);
    }

    #[test]
    fn test_split_across_chunks() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b"data: {\"a\"").is_empty());
        assert!(decoder.feed(b":1}\n").is_empty());
        assert_eq!(decoder.feed(b"\ndata: x\n\n"), vec!["{\"a\":1}", "x"]);
    }

    #[test]
    fn test_heartbeat_yields_nothing() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b":ping\n\n").is_empty());
        assert_eq!(decoder.feed(b"data: y\n\n"), vec!["y"]);
    }

    #[test]
    fn test_crlf_and_multiline_data() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(b"event: note\r\ndata: one\r\ndata:two\r\nid: 4\r\n\r\n");
        assert_eq!(frames, vec!["one\ntwo"]);
    }

    #[test]
    fn test_oversized_line_is_dropped_without_buffering() {
        let mut decoder = FrameDecoder::with_max_line_len(16);
        assert!(decoder.feed(b"data: 0123456789").is_empty());
        assert!(decoder.feed(b"abcdefghij").is_empty());
        assert!(decoder.buf.is_empty());
        assert!(decoder.feed(&[b'x'; 64]).is_empty());
        assert!(decoder.buf.is_empty());

        // The rest of the long line is skipped; the next line parses.
        assert_eq!(decoder.feed(b"tail\ndata: ok\n\n"), vec!["ok"]);
    }

    #[test]
    fn test_oversized_complete_line_is_dropped() {
        let mut decoder = FrameDecoder::with_max_line_len(8);
        assert_eq!(
            decoder.feed(b"data: far too long\ndata: ok\n\n"),
            vec!["ok"]
        );
    }

    #[test]
    fn test_split_utf8_sequence() {
        let mut decoder = FrameDecoder::new();
        let text = "data: caf\u{e9}\n\n".as_bytes();
        let (head, tail) = text.split_at(10);
        assert!(decoder.feed(head).is_empty());
        assert_eq!(decoder.feed(tail), vec!["caf\u{e9}"]);
    }
}
