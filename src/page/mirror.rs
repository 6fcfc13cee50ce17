use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::Page;
use crate::client::{FetchError, HttpClient};
use crate::http::Url;

/// Errors from loading a [`MirrorPage`].
#[derive(Debug, Error)]
pub enum PageError {
    #[error("failed to fetch page: {0}")]
    Fetch(#[from] FetchError),

    #[error("failed to write document to `{}`: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write document to stdout: {0}")]
    Stdout(#[source] io::Error),
}

/// Where a [`MirrorPage`] keeps its document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// Each new document is written to stdout in full.
    Stdout,
    /// The file is replaced atomically with each new document.
    File(PathBuf),
}

/// A headless page that mirrors a served document locally.
///
/// A full reload re-navigates: the page fetches its own URL again.
///
/// Writes run on Tokio's blocking pool, one at a time, in the order they
/// were requested.
#[derive(Debug)]
pub struct MirrorPage {
    location: Url,
    client: HttpClient,
    output: Output,
    writes: Arc<Mutex<()>>,
}

impl MirrorPage {
    pub fn new(location: Url, client: HttpClient, output: Output) -> Self {
        Self {
            location,
            client,
            output,
            writes: Arc::new(Mutex::new(())),
        }
    }

    pub fn output(&self) -> &Output {
        &self.output
    }

    /// Fetches the page and writes it out; the initial navigation.
    ///
    /// # Errors
    ///
    /// Returns [`PageError::Fetch`] if the page cannot be fetched, or a write
    /// error if the document cannot be stored.
    pub async fn load(&self) -> Result<(), PageError> {
        let html = self.client.fetch_text(&self.location).await?;
        self.write(html).await
    }

    async fn write(&self, html: String) -> Result<(), PageError> {
        // Held until the blocking write finishes, even if the caller is dropped.
        let guard = Arc::clone(&self.writes).lock_owned().await;
        let output = self.output.clone();
        let job = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            match &output {
                Output::Stdout => write_stdout(&html),
                Output::File(path) => write_atomically(path, html.as_bytes()),
            }
        });
        let result = match job.await {
            Ok(result) => result,
            Err(e) => Err(io::Error::other(e)),
        };

        result.map_err(|source| match &self.output {
            Output::Stdout => PageError::Stdout(source),
            Output::File(path) => PageError::Write {
                path: path.clone(),
                source,
            },
        })
    }
}

impl Page for MirrorPage {
    fn location(&self) -> Url {
        self.location.clone()
    }

    async fn replace_document(&self, html: String) {
        let bytes = html.len();
        match self.write(html).await {
            Ok(()) => info!(url = %self.location, bytes, "document replaced"),
            Err(e) => warn!(url = %self.location, error = %e, "document replacement failed"),
        }
    }

    async fn reload(&self) {
        match self.load().await {
            Ok(()) => info!(url = %self.location, "page reloaded"),
            Err(e) => warn!(url = %self.location, error = %e, "page reload failed"),
        }
    }
}

fn write_stdout(html: &str) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(html.as_bytes())?;
    if !html.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()
}

/// Writes `contents` to a hidden sibling file, then renames it over `path`.
fn write_atomically(path: &Path, contents: &[u8]) -> io::Result<()> {
    let Some(name) = path.file_name() else {
        return fs::write(path, contents);
    };
    let mut tmp_name = OsString::from(".");
    tmp_name.push(name);
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}
