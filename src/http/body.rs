//! Response body framing (RFC 9112 §6).
//!
//! [`Framing`] decides how the end of a body is found; [`ChunkedDecoder`]
//! incrementally strips the chunked transfer coding from a read buffer so
//! an event stream can be consumed while it is still being written.

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;

use super::ResponseHead;

/// Errors produced while reading a response body.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BodyError {
    #[error("invalid chunk size line")]
    InvalidChunkSize,

    #[error("chunk data is not followed by CRLF")]
    InvalidChunkTerminator,

    #[error("chunk size or trailer line exceeds {max_bytes} bytes")]
    LineTooLong { max_bytes: usize },

    #[error("body exceeds maximum allowed size of {max_bytes} bytes")]
    TooLarge { max_bytes: usize },

    #[error("connection closed before the body was complete")]
    UnexpectedEof,
}

/// How the end of a response body is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// The status forbids a body.
    Empty,
    /// Exactly this many bytes follow the head.
    Length(u64),
    /// `Transfer-Encoding: chunked`.
    Chunked,
    /// The body runs until the server closes the connection.
    Close,
}

impl Framing {
    /// Picks the framing for `head`, in the precedence order of RFC 9112 §6.3.
    pub fn for_response(head: &ResponseHead) -> Self {
        if head.is_bodyless() {
            Self::Empty
        } else if head.headers().is_chunked() {
            Self::Chunked
        } else if let Some(length) = head.headers().content_length() {
            Self::Length(length)
        } else {
            Self::Close
        }
    }
}

/// One step of chunked decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// Body bytes, in order. Never empty.
    Data(Bytes),
    /// The terminating zero-size chunk and its trailers have been consumed.
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Size,
    Data { remaining: u64 },
    DataEnd,
    Trailer,
    Done,
}

/// Incremental decoder for the chunked transfer coding.
///
/// Feed it the connection's read buffer; it consumes what it can and
/// leaves partial lines in place for the next read.
///
/// # Examples
///
/// ```
/// use bytes::BytesMut;
/// use livereload::http::body::{Chunk, ChunkedDecoder};
///
/// let mut decoder = ChunkedDecoder::new();
/// let mut buf = BytesMut::from(&b"5\r\nhello\r\n0\r\n\r\n"[..]);
///
/// assert_eq!(decoder.decode(&mut buf).unwrap(), Some(Chunk::Data("hello".into())));
/// assert_eq!(decoder.decode(&mut buf).unwrap(), Some(Chunk::Done));
/// assert!(buf.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct ChunkedDecoder {
    state: State,
}

impl ChunkedDecoder {
    /// Longest chunk-size or trailer line we buffer before rejecting it.
    const MAX_LINE: usize = 4096;

    pub fn new() -> Self {
        Self { state: State::Size }
    }

    /// Decodes the next piece of the body from `buf`.
    ///
    /// Returns `Ok(None)` when `buf` does not hold enough bytes to make
    /// progress; read more into it and call again.
    ///
    /// # Errors
    ///
    /// Returns a [`BodyError`] if the chunk framing is malformed.
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Chunk>, BodyError> {
        loop {
            match self.state {
                State::Size => match httparse::parse_chunk_size(&buf[..]) {
                    Ok(httparse::Status::Complete((consumed, size))) => {
                        buf.advance(consumed);
                        self.state = if size == 0 {
                            State::Trailer
                        } else {
                            State::Data { remaining: size }
                        };
                    }
                    Ok(httparse::Status::Partial) => {
                        check_line_length(&buf[..])?;
                        return Ok(None);
                    }
                    Err(_) => return Err(BodyError::InvalidChunkSize),
                },
                State::Data { remaining } => {
                    if buf.is_empty() {
                        return Ok(None);
                    }
                    let take = remaining.min(buf.len() as u64) as usize;
                    let data = buf.split_to(take).freeze();
                    let remaining = remaining - take as u64;
                    self.state = if remaining == 0 {
                        State::DataEnd
                    } else {
                        State::Data { remaining }
                    };
                    return Ok(Some(Chunk::Data(data)));
                }
                State::DataEnd => {
                    if buf.len() < 2 {
                        return Ok(None);
                    }
                    if &buf[..2] != b"\r\n" {
                        return Err(BodyError::InvalidChunkTerminator);
                    }
                    buf.advance(2);
                    self.state = State::Size;
                }
                State::Trailer => match find_crlf(&buf[..]) {
                    Some(0) => {
                        buf.advance(2);
                        self.state = State::Done;
                    }
                    // Trailer fields are discarded.
                    Some(end) => buf.advance(end + 2),
                    None => {
                        check_line_length(&buf[..])?;
                        return Ok(None);
                    }
                },
                State::Done => return Ok(Some(Chunk::Done)),
            }
        }
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn check_line_length(buf: &[u8]) -> Result<(), BodyError> {
    if buf.len() > ChunkedDecoder::MAX_LINE {
        Err(BodyError::LineTooLong {
            max_bytes: ChunkedDecoder::MAX_LINE,
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(decoder: &mut ChunkedDecoder, buf: &mut BytesMut) -> (Vec<u8>, bool) {
        let mut out = Vec::new();
        loop {
            match decoder.decode(buf).unwrap() {
                Some(Chunk::Data(data)) => out.extend_from_slice(&data),
                Some(Chunk::Done) => return (out, true),
                None => return (out, false),
            }
        }
    }

    #[test]
    fn multiple_chunks_with_extension_and_trailer() {
        let mut decoder = ChunkedDecoder::new();
        let mut buf =
            BytesMut::from(&b"4;name=x\r\ndata\r\n3\r\n: a\r\n0\r\nX-Trailer: 1\r\n\r\n"[..]);
        let (out, done) = drain(&mut decoder, &mut buf);
        assert_eq!(out, b"data: a");
        assert!(done);
    }

    #[test]
    fn split_at_every_byte() {
        let wire = b"a\r\n0123456789\r\n2\r\n\n\n\r\n0\r\n\r\n";
        let mut decoder = ChunkedDecoder::new();
        let mut buf = BytesMut::new();
        let mut out = Vec::new();
        let mut done = false;

        for byte in wire {
            buf.extend_from_slice(&[*byte]);
            let (data, finished) = drain(&mut decoder, &mut buf);
            out.extend(data);
            done |= finished;
        }

        assert_eq!(out, b"0123456789\n\n");
        assert!(done);
    }

    #[test]
    fn missing_crlf_after_data() {
        let mut decoder = ChunkedDecoder::new();
        let mut buf = BytesMut::from(&b"2\r\nokXX"[..]);
        assert_eq!(
            decoder.decode(&mut buf).unwrap(),
            Some(Chunk::Data("ok".into()))
        );
        assert_eq!(
            decoder.decode(&mut buf),
            Err(BodyError::InvalidChunkTerminator)
        );
    }

    #[test]
    fn invalid_size() {
        let mut decoder = ChunkedDecoder::new();
        let mut buf = BytesMut::from(&b"zz\r\n"[..]);
        assert_eq!(decoder.decode(&mut buf), Err(BodyError::InvalidChunkSize));
    }

    #[test]
    fn framing_precedence() {
        let parse = |raw: &[u8]| ResponseHead::parse(raw).unwrap().0;

        let head = parse(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nContent-Length: 3\r\n\r\n");
        assert_eq!(Framing::for_response(&head), Framing::Chunked);

        let head = parse(b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\n\r\n");
        assert_eq!(Framing::for_response(&head), Framing::Length(3));

        let head = parse(b"HTTP/1.1 304 Not Modified\r\nContent-Length: 3\r\n\r\n");
        assert_eq!(Framing::for_response(&head), Framing::Empty);

        let head = parse(b"HTTP/1.0 200 OK\r\n\r\n");
        assert_eq!(Framing::for_response(&head), Framing::Close);
    }
}
