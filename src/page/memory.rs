use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use super::Page;
use crate::http::Url;

/// A page whose document lives in memory.
///
/// Counts replacements and reloads, which makes it the natural page for
/// embedding the client in tests or in another tool.
///
/// # Examples
///
/// ```
/// use livereload::http::Url;
/// use livereload::page::{MemoryPage, Page};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let page = MemoryPage::new(Url::parse("http://localhost:3000/").unwrap(), "<html>OLD</html>");
/// page.replace_document("<html>NEW</html>".to_owned()).await;
///
/// assert_eq!(page.document(), "<html>NEW</html>");
/// assert_eq!(page.replacement_count(), 1);
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryPage {
    location: Url,
    document: Mutex<String>,
    replacements: AtomicUsize,
    reloads: AtomicUsize,
}

impl MemoryPage {
    pub fn new(location: Url, document: impl Into<String>) -> Self {
        Self {
            location,
            document: Mutex::new(document.into()),
            replacements: AtomicUsize::new(0),
            reloads: AtomicUsize::new(0),
        }
    }

    /// A copy of the current document.
    pub fn document(&self) -> String {
        self.document
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How many times the document has been replaced.
    pub fn replacement_count(&self) -> usize {
        self.replacements.load(Ordering::SeqCst)
    }

    /// How many full reloads have been requested.
    pub fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }
}

impl Page for MemoryPage {
    fn location(&self) -> Url {
        self.location.clone()
    }

    async fn replace_document(&self, html: String) {
        *self.document.lock().unwrap_or_else(PoisonError::into_inner) = html;
        self.replacements.fetch_add(1, Ordering::SeqCst);
    }

    async fn reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }
}
