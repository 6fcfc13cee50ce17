//! Async HTTP/1.1 client using Tokio.
//!
//! Opens one TCP connection per request, writes a [`Request`], parses the
//! [`ResponseHead`] and hands back a [`BodyStream`] that yields the body as
//! it arrives. That last part is what lets the same client drive both a
//! one-shot document fetch and a never-ending event stream.

use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use crate::http::{
    BodyError, Framing, Request, ResponseError, ResponseHead, Url,
    body::{Chunk, ChunkedDecoder},
};

/// Errors produced while performing a request.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out connecting to {addr}")]
    ConnectTimeout { addr: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed response: {0}")]
    Response(#[from] ResponseError),

    #[error("malformed response body: {0}")]
    Body(#[from] BodyError),

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
}

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// Default limit for a fetched document (8 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 8 * 1024 * 1024;

/// Default TCP connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A small HTTP/1.1 client.
///
/// Cheap to clone; holds settings only, no pooled connections.
///
/// # Examples
///
/// ```rust,no_run
/// use livereload::client::HttpClient;
/// use livereload::http::Url;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = HttpClient::new();
///     let page = Url::parse("http://localhost:3000/index.html")?;
///     let html = client.fetch_text(&page).await?;
///     println!("{html}");
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    connect_timeout: Duration,
    max_body_size: usize,
    user_agent: String,
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            user_agent: concat!("livereload/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Largest body [`fetch_text`](Self::fetch_text) accepts.
    #[must_use]
    pub fn max_body_size(mut self, max_bytes: usize) -> Self {
        self.max_body_size = max_bytes;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Sends `request` and returns the response head with a stream over its body.
    ///
    /// Interim `1xx` responses (other than `101`) are skipped.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Connect`] / [`FetchError::ConnectTimeout`]: no TCP connection.
    /// - [`FetchError::Io`]: the socket failed while writing or reading the head.
    /// - [`FetchError::Response`]: the head is malformed or too large.
    /// - [`FetchError::Body`]: the server closed the connection before the head ended.
    pub async fn send(&self, request: Request) -> Result<(ResponseHead, BodyStream), FetchError> {
        let url = request.url().clone();
        let mut stream = self.connect(&url).await?;

        let request = request.user_agent(self.user_agent.clone());
        stream.write_all(&request.into_bytes()).await?;
        stream.flush().await?;

        let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);
        let head = loop {
            match ResponseHead::parse(&buf) {
                Ok((head, body_offset)) => {
                    buf.advance(body_offset);
                    if (100..200).contains(&head.status()) && head.status() != 101 {
                        trace!(status = head.status(), "skipping interim response");
                        continue;
                    }
                    break head;
                }
                Err(ResponseError::Incomplete) => {
                    if read_more(&mut stream, &mut buf).await? == 0 {
                        return Err(BodyError::UnexpectedEof.into());
                    }
                }
                Err(e) => return Err(e.into()),
            }
        };

        debug!(
            url = %url,
            status = head.status(),
            reason = head.reason_phrase(),
            "response head received"
        );

        let body = BodyStream::new(stream, buf, Framing::for_response(&head));
        Ok((head, body))
    }

    /// GETs `url` and returns the body as text.
    ///
    /// Invalid UTF-8 is replaced with U+FFFD, as a browser's `Response.text()` does.
    ///
    /// # Errors
    ///
    /// Everything [`send`](Self::send) returns, plus [`FetchError::Status`]
    /// for a non-2xx status and [`BodyError::TooLarge`] past the size limit.
    pub async fn fetch_text(&self, url: &Url) -> Result<String, FetchError> {
        let (head, body) = self.send(Request::get(url.clone())).await?;
        if !head.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: head.status(),
            });
        }

        let bytes = body.collect(self.max_body_size).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn connect(&self, url: &Url) -> Result<TcpStream, FetchError> {
        let addr = url.authority();
        let connect = TcpStream::connect((url.host(), url.port()));
        match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(stream)) => {
                trace!(addr = %addr, "connected");
                Ok(stream)
            }
            Ok(Err(source)) => Err(FetchError::Connect { addr, source }),
            Err(_) => Err(FetchError::ConnectTimeout { addr }),
        }
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
enum BodyState {
    Length { remaining: u64 },
    Chunked(ChunkedDecoder),
    Close,
    Finished,
}

/// The body of a response, read incrementally from its connection.
///
/// Dropping the stream closes the connection.
#[derive(Debug)]
pub struct BodyStream {
    stream: TcpStream,
    buf: BytesMut,
    state: BodyState,
}

impl BodyStream {
    fn new(stream: TcpStream, buf: BytesMut, framing: Framing) -> Self {
        let state = match framing {
            Framing::Empty | Framing::Length(0) => BodyState::Finished,
            Framing::Length(remaining) => BodyState::Length { remaining },
            Framing::Chunked => BodyState::Chunked(ChunkedDecoder::new()),
            Framing::Close => BodyState::Close,
        };
        Self { stream, buf, state }
    }

    /// Returns the next piece of the body, or `None` once it is complete.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Io`]: the socket failed.
    /// - [`FetchError::Body`]: bad chunk framing, or the connection closed
    ///   before a length-delimited or chunked body was complete.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, FetchError> {
        loop {
            match &mut self.state {
                BodyState::Finished => return Ok(None),
                BodyState::Length { remaining } => {
                    if !self.buf.is_empty() {
                        let take = (*remaining).min(self.buf.len() as u64) as usize;
                        *remaining -= take as u64;
                        let data = self.buf.split_to(take).freeze();
                        if *remaining == 0 {
                            self.state = BodyState::Finished;
                        }
                        return Ok(Some(data));
                    }
                }
                BodyState::Chunked(decoder) => match decoder.decode(&mut self.buf)? {
                    Some(Chunk::Data(data)) => return Ok(Some(data)),
                    Some(Chunk::Done) => {
                        self.state = BodyState::Finished;
                        return Ok(None);
                    }
                    None => {}
                },
                BodyState::Close => {
                    if !self.buf.is_empty() {
                        return Ok(Some(self.buf.split().freeze()));
                    }
                }
            }

            if read_more(&mut self.stream, &mut self.buf).await? == 0 {
                if !matches!(self.state, BodyState::Close) {
                    return Err(BodyError::UnexpectedEof.into());
                }
                self.state = BodyState::Finished;
                return Ok(None);
            }
        }
    }

    /// Reads the whole body into memory.
    ///
    /// # Errors
    ///
    /// Returns [`BodyError::TooLarge`] once more than `max_bytes` have arrived,
    /// otherwise anything [`next_chunk`](Self::next_chunk) returns.
    pub async fn collect(mut self, max_bytes: usize) -> Result<BytesMut, FetchError> {
        let mut body = BytesMut::new();
        while let Some(chunk) = self.next_chunk().await? {
            if body.len() + chunk.len() > max_bytes {
                return Err(BodyError::TooLarge { max_bytes }.into());
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

/// Reads whatever the socket has into `buf`, returning the byte count (0 at EOF).
async fn read_more(stream: &mut TcpStream, buf: &mut BytesMut) -> std::io::Result<usize> {
    buf.reserve(INITIAL_BUF_SIZE);
    stream.read_buf(buf).await
}
