use crate::directive::{CLOSE_DELIMITER, OPEN_DELIMITER};

/// Scanner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorState {
    /// No opening delimiter seen; text flows to the client.
    Visible,
    /// Opening delimiter seen; everything is held back.
    Buffering,
    /// Closing delimiter seen; the payload is complete and any further
    /// text is suppressed.
    Closed,
}

/// What the scanner captured once the stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// No directive this turn.
    None,
    /// The trimmed text between the delimiters.
    Payload(String),
    /// An opening delimiter was never closed. Holds the unterminated tail.
    Malformed(String),
}

/// Incremental scanner that separates visible prose from an embedded
/// directive payload.
///
/// Detection runs on the cumulative buffer, so delimiters split across
/// tokens are still found. While visible, any buffer suffix that could be
/// the start of the opening delimiter is held back until the next token
/// decides it; [`finish`](Self::finish) releases it if the stream ends
/// first. Raw directive text therefore never reaches the visible output.
#[derive(Debug)]
pub struct ToolCallExtractor {
    state: ExtractorState,
    buffer: String,
    /// Bytes of `buffer` already released as visible.
    emitted: usize,
    /// Byte offset just past the opening delimiter.
    payload_start: usize,
    /// Byte offset of the closing delimiter.
    payload_end: usize,
}

impl Default for ToolCallExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolCallExtractor {
    pub fn new() -> Self {
        Self {
            state: ExtractorState::Visible,
            buffer: String::new(),
            emitted: 0,
            payload_start: 0,
            payload_end: 0,
        }
    }

    pub fn state(&self) -> ExtractorState {
        self.state
    }

    /// Everything the model generated so far, markup included.
    pub fn raw(&self) -> &str {
        &self.buffer
    }

    /// Feed one token. Returns the fragment safe to show, possibly empty.
    pub fn push(&mut self, token: &str) -> String {
        self.buffer.push_str(token);

        match self.state {
            ExtractorState::Visible => {
                if let Some(rel) = self.buffer[self.emitted..].find(OPEN_DELIMITER) {
                    let open_at = self.emitted + rel;
                    let visible = self.buffer[self.emitted..open_at].to_string();
                    self.emitted = self.buffer.len();
                    self.payload_start = open_at + OPEN_DELIMITER.len();
                    self.state = ExtractorState::Buffering;
                    self.scan_for_close();
                    return visible;
                }

                let held = self.pending_prefix_len();
                let safe_end = self.buffer.len() - held;
                let visible = self.buffer[self.emitted..safe_end].to_string();
                self.emitted = safe_end;
                visible
            }
            ExtractorState::Buffering => {
                self.scan_for_close();
                String::new()
            }
            ExtractorState::Closed => String::new(),
        }
    }

    /// End of stream. Returns the held-back visible tail (if any) and the
    /// extraction outcome.
    pub fn finish(&mut self) -> (String, Extraction) {
        match self.state {
            ExtractorState::Visible => {
                let tail = self.buffer[self.emitted..].to_string();
                self.emitted = self.buffer.len();
                (tail, Extraction::None)
            }
            ExtractorState::Buffering => (
                String::new(),
                Extraction::Malformed(self.buffer[self.payload_start..].to_string()),
            ),
            ExtractorState::Closed => (
                String::new(),
                Extraction::Payload(
                    self.buffer[self.payload_start..self.payload_end]
                        .trim()
                        .to_string(),
                ),
            ),
        }
    }

    fn scan_for_close(&mut self) {
        if let Some(rel) = self.buffer[self.payload_start..].find(CLOSE_DELIMITER) {
            self.payload_end = self.payload_start + rel;
            self.state = ExtractorState::Closed;
        }
    }

    /// Length of the longest unreleased suffix that is a proper prefix of
    /// the opening delimiter. The delimiter is ASCII, so the cut always
    /// lands on a char boundary.
    fn pending_prefix_len(&self) -> usize {
        let pending = &self.buffer.as_bytes()[self.emitted..];
        let open = OPEN_DELIMITER.as_bytes();
        (1..open.len())
            .rev()
            .find(|&k| pending.ends_with(&open[..k]))
            .unwrap_or(0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn run(tokens: &[&str]) -> (String, Extraction) {
        let mut ex = ToolCallExtractor::new();
        let mut visible = String::new();
        for t in tokens {
            visible.push_str(&ex.push(t));
        }
        let (tail, outcome) = ex.finish();
        visible.push_str(&tail);
        (visible, outcome)
    }

    #[test]
    fn test_plain_text_passes_through() {
        let tokens = ["Hola, ", "escríbenos a info@ciay.mx ", "cuando gustes @ 9am."];
        let (visible, outcome) = run(&tokens);
        assert_eq!(visible, tokens.concat());
        assert_eq!(outcome, Extraction::None);
    }

    #[test]
    fn test_payload_in_single_token() {
        let (visible, outcome) = run(&[
            "Listo. ",
            r#"@@TOOL_CALL: {"action":"save_contact"} @@"#,
        ]);
        assert_eq!(visible, "Listo. ");
        assert_eq!(outcome, Extraction::Payload(r#"{"action":"save_contact"}"#.into()));
    }

    #[test]
    fn test_delimiter_straddles_tokens() {
        let (visible, outcome) = run(&[
            "Gracias Juan.", " @", "@TOO", "L_CA", "LL: {\"a\":", "1} @", "@",
        ]);
        assert_eq!(visible, "Gracias Juan. ");
        assert_eq!(outcome, Extraction::Payload("{\"a\":1}".into()));
        assert!(!visible.contains('@'));
    }

    #[test]
    fn test_false_prefix_is_released() {
        let mut ex = ToolCallExtractor::new();
        assert_eq!(ex.push("correo: ana@"), "correo: ana");
        assert_eq!(ex.push("x.com"), "@x.com");
        assert_eq!(ex.state(), ExtractorState::Visible);
    }

    #[test]
    fn test_held_prefix_flushed_at_end() {
        let (visible, outcome) = run(&["fin @@TOOL"]);
        assert_eq!(visible, "fin @@TOOL");
        assert_eq!(outcome, Extraction::None);
    }

    #[test]
    fn test_unclosed_directive_is_malformed() {
        let (visible, outcome) = run(&["Texto ", "@@TOOL_CALL: {\"action\":", "\"x\"}"]);
        assert_eq!(visible, "Texto ");
        assert_eq!(outcome, Extraction::Malformed(" {\"action\":\"x\"}".into()));
    }

    #[test]
    fn test_trailing_text_after_close_is_suppressed() {
        let mut ex = ToolCallExtractor::new();
        ex.push("@@TOOL_CALL:{}@@");
        assert_eq!(ex.state(), ExtractorState::Closed);
        assert_eq!(ex.push(" y algo más"), "");
        assert_eq!(ex.finish().1, Extraction::Payload("{}".into()));
    }

    #[test]
    fn test_multibyte_text_before_prefix() {
        let (visible, _) = run(&["¿Cómo está? ñ@", "ñ"]);
        assert_eq!(visible, "¿Cómo está? ñ@ñ");
    }

    #[test]
    fn test_raw_keeps_markup() {
        let mut ex = ToolCallExtractor::new();
        ex.push("a @@TOOL_CALL:{}@@");
        assert_eq!(ex.raw(), "a @@TOOL_CALL:{}@@");
    }
}
