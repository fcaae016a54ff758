/// Incremental Server-Sent-Events framing: feed lines, get back the joined
/// `data:` payload whenever a frame ends.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    data: Vec<String>,
}

impl SseDecoder {
    pub(crate) fn push_line(&mut self, line: &str) -> Option<String> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return self.flush();
        }
        if let Some(data) = line.strip_prefix("data:") {
            self.data.push(data.strip_prefix(' ').unwrap_or(data).to_string());
        }
        // `event:`, `id:`, `retry:` and comments carry nothing we need; the
        // event type is repeated inside the JSON payload.
        None
    }

    pub(crate) fn flush(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.data).join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_end_on_blank_line() {
        let mut decoder = SseDecoder::default();
        assert_eq!(decoder.push_line("event: response.output_text.delta"), None);
        assert_eq!(decoder.push_line("data: {\"delta\":\"a\"}"), None);
        assert_eq!(
            decoder.push_line("").as_deref(),
            Some("{\"delta\":\"a\"}")
        );
        assert_eq!(decoder.push_line(""), None);
    }

    #[test]
    fn multi_line_data_is_joined() {
        let mut decoder = SseDecoder::default();
        decoder.push_line("data: first");
        decoder.push_line("data:second\r");
        assert_eq!(decoder.flush().as_deref(), Some("first\nsecond"));
        assert_eq!(decoder.flush(), None);
    }

    #[test]
    fn comments_are_ignored() {
        let mut decoder = SseDecoder::default();
        decoder.push_line(": keep-alive");
        assert_eq!(decoder.push_line(""), None);
    }
}
