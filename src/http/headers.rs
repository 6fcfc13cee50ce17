//! Header fields for outgoing requests and parsed responses.
//!
//! Field names compare case-insensitively per RFC 9110 §5.1; order of
//! insertion is kept so requests serialize the way they were built.

/// An order-preserving, case-insensitive list of header fields.
///
/// # Examples
///
/// ```
/// use livereload::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Content-Type", "text/event-stream; charset=utf-8");
/// headers.insert("Transfer-Encoding", "chunked");
///
/// assert_eq!(headers.media_type(), Some("text/event-stream"));
/// assert!(headers.is_chunked());
/// assert_eq!(headers.content_length(), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a header list with room for `capacity` fields.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Appends a field. Repeated names are kept as separate fields.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Returns the first value for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the number of fields (not unique names).
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if there are no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The `Content-Length` value, when present and a valid decimal number.
    pub fn content_length(&self) -> Option<u64> {
        self.get("content-length")?.trim().parse().ok()
    }

    /// Returns `true` if `chunked` is the final transfer coding.
    pub fn is_chunked(&self) -> bool {
        self.get("transfer-encoding")
            .and_then(|value| value.rsplit(',').next())
            .is_some_and(|last| last.trim().eq_ignore_ascii_case("chunked"))
    }

    /// The `Content-Type` media type without parameters, e.g. `text/html`.
    pub fn media_type(&self) -> Option<&str> {
        let value = self.get("content-type")?;
        let media = value.split(';').next().unwrap_or(value).trim();
        (!media.is_empty()).then_some(media)
    }
}
