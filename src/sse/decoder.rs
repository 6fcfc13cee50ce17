//! Incremental `text/event-stream` decoder.
//!
//! Follows the HTML event-stream interpretation rules:
//!
//! - lines end in CRLF, LF, or a lone CR (a CRLF split across two reads
//!   still counts as one line break);
//! - a leading UTF-8 BOM is dropped;
//! - lines starting with `:` are comments, which servers use as keep-alives;
//! - `field: value` lines set `event`, `data`, `id`, or `retry`, and a
//!   single space after the colon is not part of the value;
//! - an empty line dispatches the buffered event, unless no `data` was seen.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use tracing::trace;

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// The event type used when the stream does not name one.
pub const DEFAULT_EVENT_TYPE: &str = "message";

/// A dispatched event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    /// `message` unless the stream set an `event:` field.
    pub event_type: String,
    /// All `data:` lines of the event joined with `\n`.
    pub data: String,
    /// The most recent `id:` seen on the stream, possibly empty.
    pub last_event_id: String,
}

impl MessageEvent {
    /// Returns `true` for unnamed events, the ones an `onmessage` handler sees.
    pub fn is_message(&self) -> bool {
        self.event_type == DEFAULT_EVENT_TYPE
    }
}

/// Turns raw stream bytes into [`MessageEvent`]s.
///
/// # Examples
///
/// ```
/// use livereload::sse::EventDecoder;
///
/// let mut decoder = EventDecoder::new();
/// decoder.push(b": keep-alive\n\ndata: reload_");
/// assert!(decoder.next_event().is_none());
///
/// decoder.push(b"value\n\n");
/// let event = decoder.next_event().unwrap();
/// assert_eq!(event.event_type, "message");
/// assert_eq!(event.data, "reload_value");
/// ```
#[derive(Debug, Default)]
pub struct EventDecoder {
    buf: BytesMut,
    started: bool,
    pending_cr: bool,
    event_type: String,
    data: String,
    id_buffer: String,
    last_event_id: String,
    retry: Option<Duration>,
    ready: VecDeque<MessageEvent>,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A decoder for a reconnected stream that remembers the previous last event ID.
    pub fn with_last_event_id(last_event_id: impl Into<String>) -> Self {
        let last_event_id = last_event_id.into();
        Self {
            id_buffer: last_event_id.clone(),
            last_event_id,
            ..Self::default()
        }
    }

    /// Feeds bytes read from the stream.
    ///
    /// Complete lines are interpreted immediately; a trailing partial line
    /// stays buffered until the next call.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);

        if !self.started {
            if self.buf.len() < BOM.len() && BOM.starts_with(&self.buf[..]) {
                return;
            }
            if self.buf.starts_with(BOM) {
                self.buf.advance(BOM.len());
            }
            self.started = true;
        }

        loop {
            if self.pending_cr {
                match self.buf.first().copied() {
                    None => break,
                    Some(b'\n') => self.buf.advance(1),
                    Some(_) => {}
                }
                self.pending_cr = false;
            }

            let Some(end) = self.buf.iter().position(|b| *b == b'\n' || *b == b'\r') else {
                break;
            };
            let line = self.buf.split_to(end);
            self.pending_cr = self.buf[0] == b'\r';
            self.buf.advance(1);

            let line = String::from_utf8_lossy(&line);
            self.process_line(&line);
        }
    }

    /// Pops the next dispatched event, oldest first.
    pub fn next_event(&mut self) -> Option<MessageEvent> {
        self.ready.pop_front()
    }

    /// Returns a reconnection time the server sent since the last call, if any.
    pub fn take_retry(&mut self) -> Option<Duration> {
        self.retry.take()
    }

    /// The ID set by the last complete event block (carried across reconnects).
    ///
    /// An `id:` line only counts once the blank line ending its block has
    /// arrived, whether or not the block carried data.
    pub fn last_event_id(&self) -> &str {
        &self.last_event_id
    }

    fn process_line(&mut self, line: &str) {
        if line.is_empty() {
            self.dispatch();
            return;
        }
        if line.starts_with(':') {
            trace!(comment = &line[1..], "event stream comment");
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event_type = value.to_owned(),
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "id" => {
                if !value.contains('\0') {
                    self.id_buffer = value.to_owned();
                }
            }
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    if let Ok(millis) = value.parse::<u64>() {
                        self.retry = Some(Duration::from_millis(millis));
                    }
                }
            }
            other => trace!(field = other, "ignoring unknown event stream field"),
        }
    }

    fn dispatch(&mut self) {
        self.last_event_id.clone_from(&self.id_buffer);
        let event_type = std::mem::take(&mut self.event_type);
        if self.data.is_empty() {
            return;
        }

        let mut data = std::mem::take(&mut self.data);
        if data.ends_with('\n') {
            data.pop();
        }

        self.ready.push_back(MessageEvent {
            event_type: if event_type.is_empty() {
                DEFAULT_EVENT_TYPE.to_owned()
            } else {
                event_type
            },
            data,
            last_event_id: self.last_event_id.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(input: &[u8]) -> Vec<MessageEvent> {
        let mut decoder = EventDecoder::new();
        decoder.push(input);
        std::iter::from_fn(|| decoder.next_event()).collect()
    }

    fn data(events: &[MessageEvent]) -> Vec<&str> {
        events.iter().map(|e| e.data.as_str()).collect()
    }

    #[test]
    fn line_terminator_variants() {
        let events = decode_all(b"data: a\r\n\r\ndata: b\n\ndata: c\r\rdata: d\n\r\n");
        assert_eq!(data(&events), ["a", "b", "c", "d"]);
    }

    #[test]
    fn crlf_split_across_pushes_is_one_break() {
        let mut decoder = EventDecoder::new();
        decoder.push(b"data: x\r");
        decoder.push(b"\ndata: y\r");
        decoder.push(b"\n\r");
        decoder.push(b"\n");
        let event = decoder.next_event().unwrap();
        assert_eq!(event.data, "x\ny");
        assert!(decoder.next_event().is_none());
    }

    #[test]
    fn byte_at_a_time() {
        let mut decoder = EventDecoder::new();
        for byte in b"event: update\ndata: reload_page\nid: 9\n\n" {
            decoder.push(&[*byte]);
        }
        let event = decoder.next_event().unwrap();
        assert_eq!(event.event_type, "update");
        assert_eq!(event.data, "reload_page");
        assert_eq!(event.last_event_id, "9");
    }

    #[test]
    fn multi_line_data_and_space_handling() {
        let events = decode_all(b"data:first\ndata:  second\ndata\n\n");
        assert_eq!(events[0].data, "first\n second\n");
    }

    #[test]
    fn empty_data_is_not_dispatched_and_resets_type() {
        let events = decode_all(b"event: custom\n\ndata: after\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "message");
        assert!(events[0].is_message());
    }

    #[test]
    fn comments_and_unknown_fields_are_ignored() {
        let events = decode_all(b": ping\nfoo: bar\ndata: reload_value\n\n:\n\n");
        assert_eq!(data(&events), ["reload_value"]);
    }

    #[test]
    fn incomplete_event_waits_for_blank_line() {
        let events = decode_all(b"data: reload_value\n");
        assert!(events.is_empty());
    }

    #[test]
    fn bom_is_stripped_even_when_split() {
        let mut decoder = EventDecoder::new();
        decoder.push(b"\xEF\xBB");
        decoder.push(b"\xBFdata: ok\n\n");
        assert_eq!(decoder.next_event().unwrap().data, "ok");
    }

    #[test]
    fn id_persists_and_rejects_nul() {
        let events = decode_all(b"id: 1\ndata: a\n\ndata: b\n\nid: 2\0\ndata: c\n\n");
        let ids: Vec<_> = events.iter().map(|e| e.last_event_id.as_str()).collect();
        assert_eq!(ids, ["1", "1", "1"]);
    }

    #[test]
    fn id_counts_only_once_its_block_ends() {
        let mut decoder = EventDecoder::new();
        decoder.push(b"id: 5\ndata: cut");
        assert_eq!(decoder.last_event_id(), "");

        decoder.push(b"\n\n");
        assert_eq!(decoder.last_event_id(), "5");
        assert_eq!(decoder.next_event().unwrap().last_event_id, "5");
    }

    #[test]
    fn id_only_block_updates_id_without_event() {
        let mut decoder = EventDecoder::new();
        decoder.push(b"id: 6\n\n");
        assert!(decoder.next_event().is_none());
        assert_eq!(decoder.last_event_id(), "6");
    }

    #[test]
    fn retry_requires_digits() {
        let mut decoder = EventDecoder::new();
        decoder.push(b"retry: 1500\n\n");
        assert_eq!(decoder.take_retry(), Some(Duration::from_millis(1500)));
        assert_eq!(decoder.take_retry(), None);

        decoder.push(b"retry: 15s\nretry:\n\n");
        assert_eq!(decoder.take_retry(), None);
    }

    #[test]
    fn reconnected_decoder_keeps_last_event_id() {
        let mut decoder = EventDecoder::with_last_event_id("41");
        decoder.push(b"data: x\n\n");
        assert_eq!(decoder.next_event().unwrap().last_event_id, "41");
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let events = decode_all(b"data: \xFFok\n\n");
        assert_eq!(events[0].data, "\u{FFFD}ok");
    }
}
