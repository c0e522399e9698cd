//! Server-sent-event framing for the article stream.
//!
//! The body is a sequence of `\n`-terminated lines. Only lines starting with
//! [`DATA_PREFIX`] matter; each carries one JSON object with the optional
//! keys `chunk`, `done` and `error`. Everything else (blank separator lines,
//! `event:`/`id:` fields, comments) is ignored.

use encoding_rs::{CoderResult, Decoder, UTF_8};
use serde::{Deserialize, Serialize};

use crate::error::ArticleError;

pub const DATA_PREFIX: &str = "data: ";

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Notification delivered to a [`crate::ingestor::StreamSink`].
///
/// `Chunk` and `Done` are cumulative: they carry the whole article text
/// received so far, not the newly arrived fragment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text", rename_all = "lowercase")]
pub enum StreamEvent {
    Chunk(String),
    Done(String),
    Error(String),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Chunk(_))
    }
}

/// JSON object carried by one framed line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StreamPayload {
    /// Non-empty `error` field, if any. An empty string does not count.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.is_empty())
    }

    /// Non-empty `chunk` field, if any.
    pub fn chunk_text(&self) -> Option<&str> {
        self.chunk.as_deref().filter(|c| !c.is_empty())
    }

    pub fn is_done(&self) -> bool {
        self.done.unwrap_or(false)
    }
}

/// Parse one decoded line.
///
/// Returns `None` for lines without the `data: ` prefix. A prefixed line
/// whose remainder is not a valid payload yields [`ArticleError::Decode`].
pub fn parse_line(line: &str) -> Option<Result<StreamPayload, ArticleError>> {
    let json = line.strip_prefix(DATA_PREFIX)?;
    Some(
        serde_json::from_str::<StreamPayload>(json).map_err(|source| ArticleError::Decode {
            line: line.to_string(),
            source,
        }),
    )
}

/// Encode a payload as one framed event, followed by the blank separator
/// line the service writes after every event.
pub fn encode_frame(payload: &StreamPayload) -> String {
    // Serializing a struct of strings and bools cannot fail.
    let json = serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string());
    format!("{DATA_PREFIX}{json}\n\n")
}

// ---------------------------------------------------------------------------
// Line framer
// ---------------------------------------------------------------------------

/// Turns raw body blocks into complete text lines.
///
/// UTF-8 is decoded with a stateful decoder, so a code point split across
/// two blocks is reassembled instead of turning into replacement
/// characters. Text after the last newline stays buffered until the next
/// block completes it.
pub struct LineFramer {
    decoder: Decoder,
    pending: String,
    finished: bool,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineFramer {
    pub fn new() -> Self {
        Self {
            decoder: UTF_8.new_decoder(),
            pending: String::new(),
            finished: false,
        }
    }

    /// Feed one block and return every line it completed, in order.
    /// Blocks pushed after [`finish`](Self::finish) are dropped.
    pub fn push(&mut self, block: &[u8]) -> Vec<String> {
        if self.finished {
            return Vec::new();
        }
        self.decode(block, false);
        self.drain_lines()
    }

    /// Flush the decoder at end of body. Returns the complete lines still
    /// buffered plus any unterminated final line. Later calls return nothing.
    pub fn finish(&mut self) -> Vec<String> {
        if self.finished {
            return Vec::new();
        }
        self.decode(&[], true);
        self.finished = true;
        let mut lines = self.drain_lines();
        if !self.pending.is_empty() {
            let tail = std::mem::take(&mut self.pending);
            lines.push(strip_cr(tail));
        }
        lines
    }

    /// Bytes of text held back waiting for a newline.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn decode(&mut self, mut src: &[u8], last: bool) {
        loop {
            let needed = self
                .decoder
                .max_utf8_buffer_length(src.len())
                .unwrap_or(src.len() * 3 + 4);
            self.pending.reserve(needed);
            let (result, read, _replaced) = self.decoder.decode_to_string(src, &mut self.pending, last);
            src = &src[read..];
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => continue,
            }
        }
    }

    fn drain_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line_end) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=line_end).collect();
            lines.push(strip_cr(line));
        }
        lines
    }
}

fn strip_cr(mut line: String) -> String {
    if line.ends_with('\n') {
        line.pop();
    }
    if line.ends_with('\r') {
        line.pop();
    }
    line
}
