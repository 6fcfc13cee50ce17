//! Server-sent events: the push channel reload signals arrive on.
//!
//! - [`EventDecoder`]: incremental `text/event-stream` parser.
//! - [`EventSource`]: one subscription over [`HttpClient`](crate::client::HttpClient),
//!   with reconnection and `Last-Event-ID`, mirroring the browser API.

pub mod decoder;
pub mod source;

pub use decoder::{DEFAULT_EVENT_TYPE, EventDecoder, MessageEvent};
pub use source::{
    DEFAULT_RETRY, EVENT_STREAM_MEDIA_TYPE, EventSource, EventSourceError, MIN_RECONNECT_DELAY,
    ReadyState,
};
