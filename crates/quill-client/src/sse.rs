// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Incremental decoder for `data: <json>` SSE streams.
//!
//! The decoder is fed raw byte chunks as they arrive from the transport and
//! yields complete content fragments. It maintains a growing buffer split on
//! newlines; the last (possibly partial) line is always retained for the
//! next pass, so neither a JSON payload nor a multi-byte UTF-8 sequence is
//! ever parsed across a chunk boundary prematurely.

use tracing::warn;

use crate::types::StreamPayload;

/// Line prefix carrying a JSON payload.
const DATA_PREFIX: &str = "data: ";

/// Terminal sentinel line ending the stream cleanly.
const DONE_SENTINEL: &str = "data: [DONE]";

/// Stateful decoder for one streaming response body.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the terminal sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Consumes one transport chunk and returns the content fragments of
    /// every line completed by it, in order.
    ///
    /// Malformed JSON lines are logged and skipped without aborting the
    /// stream. Input after the terminal sentinel is ignored.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut fragments = Vec::new();
        if self.done {
            return fragments;
        }

        self.buffer.extend_from_slice(chunk);

        // Split off complete lines; the trailing partial line stays buffered.
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            let trimmed = line.trim();

            if trimmed.is_empty() {
                continue;
            }
            if trimmed == DONE_SENTINEL {
                self.done = true;
                break;
            }
            let Some(json) = trimmed.strip_prefix(DATA_PREFIX) else {
                continue;
            };
            match serde_json::from_str::<StreamPayload>(json) {
                Ok(payload) => {
                    if let Some(fragment) = payload.fragment() {
                        if !fragment.is_empty() {
                            fragments.push(fragment.to_string());
                        }
                    }
                }
                Err(error) => {
                    warn!(%error, line = %trimmed, "skipping malformed SSE payload");
                }
            }
        }

        fragments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_line(fragment: &str) -> String {
        format!("data: {{\"choices\":[{{\"delta\":{{\"content\":\"{fragment}\"}}}}]}}\n")
    }

    #[test]
    fn decodes_fragments_in_order() {
        let mut decoder = SseDecoder::new();
        let body = format!(
            "{}{}{}data: [DONE]\n",
            payload_line("He"),
            payload_line("llo"),
            payload_line(" world")
        );
        let fragments = decoder.feed(body.as_bytes());
        assert_eq!(fragments, vec!["He", "llo", " world"]);
        assert!(decoder.is_done());
    }

    #[test]
    fn retains_the_partial_last_line() {
        let mut decoder = SseDecoder::new();
        let line = payload_line("Hello");
        let (head, tail) = line.split_at(20);

        // The partial line must not be parsed yet.
        assert!(decoder.feed(head.as_bytes()).is_empty());
        assert_eq!(decoder.feed(tail.as_bytes()), vec!["Hello"]);
    }

    #[test]
    fn retains_partial_utf8_sequences_across_chunks() {
        let mut decoder = SseDecoder::new();
        let line = payload_line("你好");
        let bytes = line.as_bytes();
        // Split inside the first multi-byte character of the payload.
        let split = line.find('你').unwrap() + 1;

        assert!(decoder.feed(&bytes[..split]).is_empty());
        assert_eq!(decoder.feed(&bytes[split..]), vec!["你好"]);
    }

    #[test]
    fn skips_malformed_json_without_aborting() {
        let mut decoder = SseDecoder::new();
        let body = format!(
            "{}data: {{not json\n{}",
            payload_line("He"),
            payload_line("llo")
        );
        assert_eq!(decoder.feed(body.as_bytes()), vec!["He", "llo"]);
        assert!(!decoder.is_done());
    }

    #[test]
    fn ignores_blank_lines_and_non_data_lines() {
        let mut decoder = SseDecoder::new();
        let body = format!(": keep-alive\n\n{}", payload_line("Hi"));
        assert_eq!(decoder.feed(body.as_bytes()), vec!["Hi"]);
    }

    #[test]
    fn done_sentinel_ends_the_sequence_cleanly() {
        let mut decoder = SseDecoder::new();
        let body = format!("{}data: [DONE]\n{}", payload_line("Hi"), payload_line("late"));
        // Nothing after the sentinel is decoded.
        assert_eq!(decoder.feed(body.as_bytes()), vec!["Hi"]);
        assert!(decoder.is_done());
        assert!(decoder.feed(payload_line("more").as_bytes()).is_empty());
    }

    #[test]
    fn role_only_deltas_produce_no_fragment() {
        let mut decoder = SseDecoder::new();
        let body = "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n";
        assert!(decoder.feed(body.as_bytes()).is_empty());
    }
}
