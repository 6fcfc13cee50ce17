//! # livereload
//!
//! A live-reload client for development servers that push reload signals
//! over server-sent events.
//!
//! The client subscribes to `/sse` on the page's origin. On `reload_value`
//! (or the legacy `reload`) it refetches the page and replaces the whole
//! document; on `reload_page` it performs a full reload and subscribes
//! again.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use livereload::http::Url;
//! use livereload::page::{MirrorPage, Output};
//! use livereload::reload::{ClientConfig, ReloadClient};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::default();
//!     let url = Url::parse("http://localhost:3000/")?;
//!     let page = Arc::new(MirrorPage::new(url, config.http_client(), Output::Stdout));
//!     page.load().await?;
//!
//!     ReloadClient::new(page, config).run().await?;
//!     Ok(())
//! }
//! ```

// ── Protocol ─────────────────────────────────────────────────────────────────
pub mod page;
pub mod reload;
pub mod script;
pub mod signal;

// ── Transport ────────────────────────────────────────────────────────────────
pub mod client;
pub mod http;
pub mod sse;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use client::{FetchError, HttpClient};
pub use http::Url;
pub use page::{Fetch, MemoryPage, MirrorPage, Page};
pub use reload::{ClientConfig, ClientError, ClientState, ReloadClient};
pub use signal::{Action, ReloadSignal, dispatch};
pub use sse::{EventSource, MessageEvent, ReadyState};
