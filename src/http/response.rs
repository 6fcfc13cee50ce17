//! HTTP/1.1 response-head parsing using the [`httparse`] crate.

use thiserror::Error;

use super::{Headers, StatusCode};

/// Errors that can occur while parsing a response head.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("response head is incomplete; more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("response head exceeds maximum allowed size of {max_bytes} bytes")]
    HeadTooLarge { max_bytes: usize },
}

/// The status line and header fields of a response.
///
/// Created by [`ResponseHead::parse`] from the start of a read buffer; the
/// body that follows is framed by [`Framing`](super::Framing).
///
/// # Examples
///
/// ```
/// use livereload::http::ResponseHead;
///
/// let raw = b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\n\r\ndata: reload_page\n\n";
/// let (head, offset) = ResponseHead::parse(raw).unwrap();
///
/// assert_eq!(head.status(), 200);
/// assert!(head.is_success());
/// assert_eq!(head.headers().media_type(), Some("text/event-stream"));
/// assert_eq!(&raw[offset..], b"data: reload_page\n\n");
/// ```
#[derive(Debug, Clone)]
pub struct ResponseHead {
    status: u16,
    reason: String,
    headers: Headers,
}

impl ResponseHead {
    /// Maximum number of headers we accept per response.
    const MAX_HEADERS: usize = 64;

    /// Maximum size of a response head before we give up on it (64 KiB).
    pub const MAX_HEAD_SIZE: usize = 64 * 1024;

    /// Parses a response head from the start of `buf`.
    ///
    /// Returns the head and the offset at which the body begins (just past
    /// the `\r\n\r\n` terminator).
    ///
    /// # Errors
    ///
    /// - [`ResponseError::Incomplete`]: the terminator has not arrived yet.
    /// - [`ResponseError::HeadTooLarge`]: incomplete and already past [`Self::MAX_HEAD_SIZE`].
    /// - [`ResponseError::Parse`]: the bytes are not an HTTP/1.x response.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), ResponseError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw = httparse::Response::new(&mut headers);

        let body_offset = match raw.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial if buf.len() > Self::MAX_HEAD_SIZE => {
                return Err(ResponseError::HeadTooLarge {
                    max_bytes: Self::MAX_HEAD_SIZE,
                });
            }
            httparse::Status::Partial => return Err(ResponseError::Incomplete),
        };

        let status = raw
            .code
            .ok_or(ResponseError::MissingField { field: "status" })?;
        let reason = raw.reason.unwrap_or_default().to_owned();

        let mut header_map = Headers::with_capacity(raw.headers.len());
        for header in raw.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name, value);
            }
        }

        Ok((
            Self {
                status,
                reason,
                headers: header_map,
            },
            body_offset,
        ))
    }

    /// The numeric status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// The status as a named [`StatusCode`], if the client knows it.
    pub fn status_code(&self) -> Option<StatusCode> {
        StatusCode::try_from(self.status).ok()
    }

    /// The reason phrase the server sent (may be empty).
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// The reason phrase to report: the one sent, or the canonical phrase
    /// for a known status when the server left it empty.
    pub fn reason_phrase(&self) -> &str {
        if self.reason.is_empty() {
            self.status_code().map_or("", StatusCode::canonical_reason)
        } else {
            &self.reason
        }
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns `true` when the status forbids a body (1xx, 204, 304).
    pub fn is_bodyless(&self) -> bool {
        (100..200).contains(&self.status) || self.status == 204 || self.status == 304
    }
}
