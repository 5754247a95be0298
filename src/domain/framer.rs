const LINE_TERMINATOR: char = '\n';

/// Reassembles newline-terminated lines from arbitrarily split text chunks.
///
/// Unterminated input stays buffered until a later chunk completes it; there is
/// no size cap and no timeout.
#[derive(Clone, Debug, Default)]
pub struct LineFramer {
    buffer: String,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns every line it completed, trimmed, in arrival
    /// order. Lines that trim to nothing are returned as empty strings.
    pub fn feed(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);

        let Some(last) = self.buffer.rfind(LINE_TERMINATOR) else {
            return Vec::new();
        };

        let lines = self.buffer[..last]
            .split(LINE_TERMINATOR)
            .map(|line| line.trim().to_string())
            .collect::<Vec<_>>();
        self.buffer.drain(..=last);
        lines
    }

    pub fn pending(&self) -> &str {
        &self.buffer
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Incremental UTF-8 decoder for byte chunks.
///
/// A multi-byte sequence cut at a chunk boundary is held back until the next
/// chunk; invalid bytes decode to U+FFFD.
#[derive(Clone, Debug, Default)]
pub struct TextDecoder {
    carry: Vec<u8>,
}

impl TextDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.carry.extend_from_slice(bytes);

        let mut out = String::new();
        let mut rest = self.carry.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    rest = &[];
                    break;
                }
                Err(error) => {
                    let (valid, after) = rest.split_at(error.valid_up_to());
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match error.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }

        self.carry = rest.to_vec();
        out
    }

    pub fn reset(&mut self) {
        self.carry.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reassembles_line_split_across_chunks() {
        let mut framer = LineFramer::new();
        let mut lines = framer.feed("NEXT\nPRE");
        assert_eq!(framer.pending(), "PRE");
        lines.extend(framer.feed("V\n"));
        assert_eq!(lines, vec!["NEXT", "PREV"]);
        assert!(framer.pending().is_empty());
    }

    #[test]
    fn keeps_empty_lines_for_the_caller_to_discard() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.feed("\n\nNEXT\n"), vec!["", "", "NEXT"]);
    }

    #[test]
    fn terminator_arriving_alone_completes_buffered_line() {
        let mut framer = LineFramer::new();
        assert!(framer.feed("CR").is_empty());
        assert!(framer.feed("Y").is_empty());
        assert_eq!(framer.feed("\n"), vec!["CRY"]);
    }

    #[test]
    fn trims_carriage_returns_and_padding() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.feed("  RAND \r\nNEXT\r"), vec!["RAND"]);
        assert_eq!(framer.feed("\n"), vec!["NEXT"]);
    }

    #[test]
    fn clear_discards_partial_line() {
        let mut framer = LineFramer::new();
        let _ = framer.feed("NE");
        framer.clear();
        assert_eq!(framer.feed("XT\n"), vec!["XT"]);
    }

    #[test]
    fn decoder_carries_split_multibyte_sequence() {
        let mut decoder = TextDecoder::new();
        let bytes = "é\n".as_bytes();
        assert_eq!(decoder.decode(&bytes[..1]), "");
        assert_eq!(decoder.decode(&bytes[1..]), "é\n");
    }

    #[test]
    fn decoder_replaces_invalid_bytes() {
        let mut decoder = TextDecoder::new();
        assert_eq!(decoder.decode(b"A\xffB"), "A\u{fffd}B");
    }
}
