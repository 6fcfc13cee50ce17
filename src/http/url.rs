//! `http://` URLs: just enough to locate a page and its event stream.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors produced while parsing a [`Url`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("unsupported URL scheme `{0}` (only http:// is supported)")]
    UnsupportedScheme(String),

    #[error("URL has no scheme: `{0}`")]
    MissingScheme(String),

    #[error("URL has an empty host")]
    EmptyHost,

    #[error("invalid port `{0}`")]
    InvalidPort(String),
}

/// An absolute `http://` URL.
///
/// The fragment is accepted but discarded: it is never sent to a server.
///
/// # Examples
///
/// ```
/// use livereload::http::Url;
///
/// let page: Url = "http://localhost:3000/blog/index.html?draft=1#top".parse().unwrap();
/// assert_eq!(page.host(), "localhost");
/// assert_eq!(page.port(), 3000);
/// assert_eq!(page.request_target(), "/blog/index.html?draft=1");
///
/// let events = page.with_path("/sse");
/// assert_eq!(events.to_string(), "http://localhost:3000/sse");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Url {
    host: String,
    port: u16,
    path: String,
    query: Option<String>,
}

impl Url {
    const DEFAULT_PORT: u16 = 80;

    /// Parses an absolute URL.
    ///
    /// # Errors
    ///
    /// - [`UrlError::MissingScheme`] / [`UrlError::UnsupportedScheme`]: not an `http://` URL.
    /// - [`UrlError::EmptyHost`]: nothing between `//` and the path.
    /// - [`UrlError::InvalidPort`]: the port is not a `u16`.
    pub fn parse(input: &str) -> Result<Self, UrlError> {
        let input = input.trim();
        let (scheme, rest) = input
            .split_once("://")
            .ok_or_else(|| UrlError::MissingScheme(input.to_owned()))?;
        if !scheme.eq_ignore_ascii_case("http") {
            return Err(UrlError::UnsupportedScheme(scheme.to_owned()));
        }

        let rest = rest.split('#').next().unwrap_or_default();
        let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());
        let (authority, target) = rest.split_at(authority_end);
        let (host, port) = split_authority(authority)?;

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_owned())),
            None => (target, None),
        };
        let path = if path.is_empty() { "/" } else { path };

        Ok(Self {
            host: host.to_owned(),
            port,
            path: path.to_owned(),
            query,
        })
    }

    /// Builds a URL from its parts. `path` gets a leading `/` if it lacks one.
    pub fn from_parts(host: impl Into<String>, port: u16, path: &str) -> Self {
        Self {
            host: host.into(),
            port,
            path: String::new(),
            query: None,
        }
        .with_target(path)
    }

    /// The host, without brackets for IPv6 literals.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// The value for the `Host` header: the default port is omitted.
    pub fn authority(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        if self.port == Self::DEFAULT_PORT {
            host
        } else {
            format!("{host}:{}", self.port)
        }
    }

    /// Path and query as written on the request line.
    pub fn request_target(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{query}", self.path),
            None => self.path.clone(),
        }
    }

    /// A URL on the same origin with `target` (path plus optional query).
    #[must_use]
    pub fn with_path(&self, target: &str) -> Self {
        Self {
            host: self.host.clone(),
            port: self.port,
            path: String::new(),
            query: None,
        }
        .with_target(target)
    }

    fn with_target(mut self, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_owned())),
            None => (target, None),
        };
        self.path = normalize_path(path);
        self.query = query;
        self
    }
}

impl FromStr for Url {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "http://{}{}", self.authority(), self.request_target())
    }
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{path}")
    }
}

fn split_authority(authority: &str) -> Result<(&str, u16), UrlError> {
    // Userinfo is ignored.
    let authority = authority.rsplit('@').next().unwrap_or(authority);

    let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
        let (host, after) = bracketed.split_once(']').ok_or(UrlError::EmptyHost)?;
        (host, after.strip_prefix(':'))
    } else {
        match authority.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        }
    };

    if host.is_empty() {
        return Err(UrlError::EmptyHost);
    }

    let port = match port {
        Some("") | None => Url::DEFAULT_PORT,
        Some(port) => port
            .parse()
            .map_err(|_| UrlError::InvalidPort(port.to_owned()))?,
    };
    Ok((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_origin_gets_root_path() {
        let url = Url::parse("http://example.com").unwrap();
        assert_eq!(url.port(), 80);
        assert_eq!(url.path(), "/");
        assert_eq!(url.authority(), "example.com");
        assert_eq!(url.to_string(), "http://example.com/");
    }

    #[test]
    fn query_without_path() {
        let url = Url::parse("http://localhost:3000?x=1").unwrap();
        assert_eq!(url.path(), "/");
        assert_eq!(url.query(), Some("x=1"));
    }

    #[test]
    fn ipv6_literal() {
        let url = Url::parse("http://[::1]:8080/index.html").unwrap();
        assert_eq!(url.host(), "::1");
        assert_eq!(url.port(), 8080);
        assert_eq!(url.authority(), "[::1]:8080");
    }

    #[test]
    fn rejects_https() {
        assert_eq!(
            Url::parse("https://localhost/"),
            Err(UrlError::UnsupportedScheme("https".into()))
        );
    }

    #[test]
    fn rejects_bad_port() {
        assert!(matches!(
            Url::parse("http://localhost:99999/"),
            Err(UrlError::InvalidPort(_))
        ));
    }

    #[test]
    fn rejects_missing_scheme_and_host() {
        assert!(matches!(
            Url::parse("localhost:3000"),
            Err(UrlError::MissingScheme(_))
        ));
        assert_eq!(Url::parse("http:///index.html"), Err(UrlError::EmptyHost));
    }

    #[test]
    fn with_path_keeps_origin_and_drops_query() {
        let page = Url::parse("http://localhost:3000/a/b.html?v=2").unwrap();
        let events = page.with_path("sse");
        assert_eq!(events.to_string(), "http://localhost:3000/sse");
    }

    #[test]
    fn from_parts_splits_query() {
        let url = Url::from_parts("localhost", 3000, "/page.html?id=4");
        assert_eq!(url.path(), "/page.html");
        assert_eq!(url.query(), Some("id=4"));
    }
}
