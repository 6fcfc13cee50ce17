//! HTTP/1.1 request builder.
//!
//! The client only ever issues `GET`s: one for the page document and one
//! that opens the event stream. Every request asks the server to close the
//! connection once the response is done.

use bytes::{BufMut, BytesMut};

use super::{Headers, Url};

/// A `GET` request, ready to be serialized and written to a socket.
///
/// # Examples
///
/// ```
/// use livereload::http::{Request, Url};
///
/// let url = Url::parse("http://localhost:3000/sse").unwrap();
/// let request = Request::get(url)
///     .header("Accept", "text/event-stream")
///     .user_agent("livereload/0.1");
///
/// let bytes = request.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("GET /sse HTTP/1.1\r\nHost: localhost:3000\r\n"));
/// assert!(text.ends_with("Connection: close\r\n\r\n"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    url: Url,
    headers: Headers,
    user_agent: Option<String>,
}

impl Request {
    /// Creates a `GET` for `url` with no extra headers.
    pub fn get(url: Url) -> Self {
        Self {
            url,
            headers: Headers::new(),
            user_agent: None,
        }
    }

    /// Appends a request header. Repeated names are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the `User-Agent` header.
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// The target of this request.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Serializes the request into HTTP/1.1 wire format.
    ///
    /// Always writes `Host` first and `Connection: close` last; a
    /// caller-supplied `Host` or `Connection` header is dropped.
    pub fn into_bytes(self) -> BytesMut {
        let target = self.url.request_target();
        let estimated_size = 64 + target.len() + self.headers.len() * 48;
        let mut buf = BytesMut::with_capacity(estimated_size);

        // Request line
        buf.put(format!("GET {target} HTTP/1.1\r\n").as_bytes());
        buf.put(format!("Host: {}\r\n", self.url.authority()).as_bytes());

        if let Some(agent) = &self.user_agent {
            buf.put(format!("User-Agent: {agent}\r\n").as_bytes());
        }

        for (name, value) in self.headers.iter() {
            if name.eq_ignore_ascii_case("host") || name.eq_ignore_ascii_case("connection") {
                continue;
            }
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }

        buf.put(&b"Connection: close\r\n\r\n"[..]);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_string(bytes: BytesMut) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn minimal_get() {
        let s = to_string(Request::get(url("http://example.com/")).into_bytes());
        assert_eq!(
            s,
            "GET / HTTP/1.1\r\nHost: example.com\r\nConnection: close\r\n\r\n"
        );
    }

    #[test]
    fn query_is_on_request_line() {
        let s = to_string(Request::get(url("http://localhost:3000/p.html?a=1#frag")).into_bytes());
        assert!(s.starts_with("GET /p.html?a=1 HTTP/1.1\r\n"));
        assert!(!s.contains("frag"));
    }

    #[test]
    fn caller_cannot_override_host_or_connection() {
        let s = to_string(
            Request::get(url("http://localhost:3000/"))
                .header("Host", "evil")
                .header("Connection", "keep-alive")
                .header("Last-Event-ID", "7")
                .into_bytes(),
        );
        assert!(!s.contains("evil"));
        assert!(!s.contains("keep-alive"));
        assert!(s.contains("Last-Event-ID: 7\r\n"));
    }

    #[test]
    fn user_agent_follows_host() {
        let s = to_string(
            Request::get(url("http://localhost:3000/"))
                .user_agent("livereload/test")
                .into_bytes(),
        );
        assert!(s.contains("Host: localhost:3000\r\nUser-Agent: livereload/test\r\n"));
    }
}
