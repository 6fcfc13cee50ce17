//! The page a [`ReloadClient`](crate::reload::ReloadClient) keeps current.
//!
//! A browser gives the reload script three primitives: the page URL, a way
//! to swap the whole document, and a full reload. [`Page`] is that surface;
//! [`Fetch`] is the network side (`fetch(location.href)`).
//!
//! Two pages ship with the crate:
//!
//! - [`MemoryPage`] keeps the document in memory.
//! - [`MirrorPage`] mirrors the document into a file or onto stdout.

use std::future::Future;

use crate::client::{FetchError, HttpClient};
use crate::http::Url;

mod memory;
mod mirror;

pub use memory::MemoryPage;
pub use mirror::{MirrorPage, Output, PageError};

/// Document and navigation primitives of a page.
///
/// Methods take `&self`: the page is shared between the client and its
/// in-flight apply tasks.
pub trait Page: Send + Sync + 'static {
    /// The page's own URL (`location.href`).
    fn location(&self) -> Url;

    /// Replaces the entire document with `html`.
    ///
    /// Replacements resolve in the order they were requested.
    fn replace_document(&self, html: String) -> impl Future<Output = ()> + Send;

    /// Performs a full reload of the page.
    ///
    /// Failures are the page's to report; the client never sees them.
    fn reload(&self) -> impl Future<Output = ()> + Send;
}

/// Fetches a document as text.
pub trait Fetch: Send + Sync + 'static {
    /// GETs `url` and resolves to the body text, or to an error for any
    /// network failure or non-2xx status.
    fn fetch_text(&self, url: &Url) -> impl Future<Output = Result<String, FetchError>> + Send;
}

impl Fetch for HttpClient {
    fn fetch_text(&self, url: &Url) -> impl Future<Output = Result<String, FetchError>> + Send {
        HttpClient::fetch_text(self, url)
    }
}
