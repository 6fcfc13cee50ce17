//! A native `EventSource`: one event-stream subscription with reconnection.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::decoder::{EventDecoder, MessageEvent};
use crate::client::{BodyStream, FetchError, HttpClient};
use crate::http::{Request, Url};

/// Media type an event stream must be served with.
pub const EVENT_STREAM_MEDIA_TYPE: &str = "text/event-stream";

/// Reconnection time used until the server sends a `retry:` field.
pub const DEFAULT_RETRY: Duration = Duration::from_millis(3000);

/// Shortest wait between reconnection attempts, whatever `retry:` says.
pub const MIN_RECONNECT_DELAY: Duration = Duration::from_millis(10);

/// Ways an event source can fail for good.
///
/// Network errors and streams that simply end are not failures: the source
/// reconnects after its reconnection time. Only an answer that shows the
/// endpoint is not an event stream closes it.
#[derive(Debug, Error)]
pub enum EventSourceError {
    #[error("event stream at {url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("event stream at {url} has content type {content_type:?}, expected `text/event-stream`")]
    ContentType {
        url: String,
        content_type: Option<String>,
    },

    #[error("event source is closed")]
    Closed,
}

/// Connection state, as exposed by a browser `EventSource`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// Not yet connected, or waiting to reconnect.
    Connecting,
    /// Receiving events.
    Open,
    /// Closed for good; no further events.
    Closed,
}

#[derive(Debug)]
struct Connection {
    body: BodyStream,
    decoder: EventDecoder,
}

enum OpenError {
    Retry(FetchError),
    Fatal(EventSourceError),
}

/// A subscription to an event stream.
///
/// Holds at most one open connection. Connecting is lazy: the first call to
/// [`next_event`](Self::next_event) opens it.
///
/// # Examples
///
/// ```rust,no_run
/// use livereload::client::HttpClient;
/// use livereload::http::Url;
/// use livereload::sse::{DEFAULT_RETRY, EventSource};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let url = Url::parse("http://localhost:3000/sse")?;
///     let mut source = EventSource::new(HttpClient::new(), url, DEFAULT_RETRY);
///     loop {
///         let event = source.next_event().await?;
///         println!("{}: {}", event.event_type, event.data);
///     }
/// }
/// ```
#[derive(Debug)]
pub struct EventSource {
    client: HttpClient,
    url: Url,
    retry: Duration,
    last_event_id: String,
    state: ReadyState,
    connection: Option<Connection>,
    reconnect_pending: bool,
    connections_opened: u64,
}

impl EventSource {
    pub fn new(client: HttpClient, url: Url, retry: Duration) -> Self {
        Self {
            client,
            url,
            retry,
            last_event_id: String::new(),
            state: ReadyState::Connecting,
            connection: None,
            reconnect_pending: false,
            connections_opened: 0,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn ready_state(&self) -> ReadyState {
        self.state
    }

    /// The current reconnection time.
    pub fn retry(&self) -> Duration {
        self.retry
    }

    /// The ID sent as `Last-Event-ID` on the next reconnect.
    pub fn last_event_id(&self) -> &str {
        &self.last_event_id
    }

    /// Number of connections that reached [`ReadyState::Open`].
    pub fn connections_opened(&self) -> u64 {
        self.connections_opened
    }

    /// Drops the connection. Subsequent calls to `next_event` fail with
    /// [`EventSourceError::Closed`].
    pub fn close(&mut self) {
        if self.state != ReadyState::Closed {
            debug!(url = %self.url, "closing event source");
        }
        self.connection = None;
        self.state = ReadyState::Closed;
    }

    /// Waits for the next event, connecting and reconnecting as needed.
    ///
    /// # Errors
    ///
    /// - [`EventSourceError::Status`] / [`EventSourceError::ContentType`]: the
    ///   endpoint is not an event stream; the source is now closed.
    /// - [`EventSourceError::Closed`]: [`close`](Self::close) was called earlier.
    pub async fn next_event(&mut self) -> Result<MessageEvent, EventSourceError> {
        loop {
            if self.state == ReadyState::Closed {
                return Err(EventSourceError::Closed);
            }

            let Some(connection) = self.connection.as_mut() else {
                if self.reconnect_pending {
                    tokio::time::sleep(self.retry.max(MIN_RECONNECT_DELAY)).await;
                }
                match self.open().await {
                    Ok(connection) => {
                        self.connections_opened += 1;
                        self.connection = Some(connection);
                        self.state = ReadyState::Open;
                        self.reconnect_pending = false;
                        info!(url = %self.url, "event stream open");
                    }
                    Err(OpenError::Retry(e)) => {
                        warn!(
                            url = %self.url,
                            error = %e,
                            retry_ms = self.retry.as_millis() as u64,
                            "event stream connection failed; retrying"
                        );
                        self.reconnect_pending = true;
                    }
                    Err(OpenError::Fatal(e)) => {
                        self.close();
                        return Err(e);
                    }
                }
                continue;
            };

            if let Some(event) = connection.decoder.next_event() {
                self.last_event_id.clone_from(&event.last_event_id);
                return Ok(event);
            }

            match connection.body.next_chunk().await {
                Ok(Some(bytes)) => {
                    connection.decoder.push(&bytes);
                    if let Some(retry) = connection.decoder.take_retry() {
                        debug!(retry_ms = retry.as_millis() as u64, "server set reconnection time");
                        self.retry = retry;
                    }
                }
                Ok(None) => {
                    info!(url = %self.url, "event stream ended; reconnecting");
                    self.drop_connection();
                }
                Err(e) => {
                    warn!(url = %self.url, error = %e, "event stream broke; reconnecting");
                    self.drop_connection();
                }
            }
        }
    }

    fn drop_connection(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.last_event_id = connection.decoder.last_event_id().to_owned();
        }
        self.state = ReadyState::Connecting;
        self.reconnect_pending = true;
    }

    async fn open(&mut self) -> Result<Connection, OpenError> {
        self.state = ReadyState::Connecting;

        let mut request = Request::get(self.url.clone())
            .header("Accept", EVENT_STREAM_MEDIA_TYPE)
            .header("Cache-Control", "no-cache");
        if !self.last_event_id.is_empty() {
            request = request.header("Last-Event-ID", self.last_event_id.clone());
        }

        let (head, body) = self.client.send(request).await.map_err(OpenError::Retry)?;

        if head.status() != 200 {
            return Err(OpenError::Fatal(EventSourceError::Status {
                url: self.url.to_string(),
                status: head.status(),
            }));
        }

        let media_type = head.headers().media_type();
        if !media_type.is_some_and(|media| media.eq_ignore_ascii_case(EVENT_STREAM_MEDIA_TYPE)) {
            return Err(OpenError::Fatal(EventSourceError::ContentType {
                url: self.url.to_string(),
                content_type: media_type.map(str::to_owned),
            }));
        }

        Ok(Connection {
            body,
            decoder: EventDecoder::with_last_event_id(self.last_event_id.clone()),
        })
    }
}
