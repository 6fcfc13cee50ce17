//! The live-reload client.
//!
//! A [`ReloadClient`] owns one [`EventSource`] per page lifecycle and turns
//! each message it receives into an [`Action`] on its [`Page`]:
//!
//! - `reload_value` (and the legacy `reload`) spawns an apply task that
//!   refetches the page's own URL and replaces the document with the body;
//! - `reload_page` drops the subscription, reloads the page and starts a new
//!   lifecycle with a fresh subscription;
//! - anything else is ignored.
//!
//! Apply tasks are not ordered against each other. When two refetches
//! overlap, the one that resolves last decides the document.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use crate::client::HttpClient;
use crate::http::Url;
use crate::page::{Fetch, Page};
use crate::signal::{Action, ReloadSignal, dispatch};
use crate::sse::{EventSource, EventSourceError};

mod config;

pub use config::{ClientConfig, ConfigError};

/// Errors that end a [`ReloadClient`] run.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    EventSource(#[from] EventSourceError),
}

/// Whether any apply task is still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Idle,
    Applying,
}

/// Keeps a [`Page`] current by following a server's reload signals.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use livereload::http::Url;
/// use livereload::page::MemoryPage;
/// use livereload::reload::{ClientConfig, ReloadClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let page = Arc::new(MemoryPage::new(Url::parse("http://localhost:3000/")?, ""));
///     let mut client = ReloadClient::new(page, ClientConfig::default());
///     client.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct ReloadClient<P: Page, F: Fetch = HttpClient> {
    config: ClientConfig,
    http: HttpClient,
    fetcher: Arc<F>,
    page: Arc<P>,
    applying: JoinSet<()>,
    lifecycles: u64,
}

impl<P: Page> ReloadClient<P> {
    /// A client that refetches documents with the same [`HttpClient`] that
    /// carries the event stream.
    pub fn new(page: Arc<P>, config: ClientConfig) -> Self {
        let http = config.http_client();
        Self::with_fetcher(page, http, config)
    }
}

impl<P: Page, F: Fetch> ReloadClient<P, F> {
    /// A client that refetches documents through `fetcher`.
    pub fn with_fetcher(page: Arc<P>, fetcher: F, config: ClientConfig) -> Self {
        Self {
            http: config.http_client(),
            config,
            fetcher: Arc::new(fetcher),
            page,
            applying: JoinSet::new(),
            lifecycles: 0,
        }
    }

    pub fn page(&self) -> &Arc<P> {
        &self.page
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The event stream URL: the events path on the page's origin.
    pub fn events_url(&self) -> Url {
        self.page.location().with_path(&self.config.events_path)
    }

    /// Number of lifecycles started so far; one per subscription.
    pub fn lifecycles(&self) -> u64 {
        self.lifecycles
    }

    pub fn state(&mut self) -> ClientState {
        self.reap();
        if self.applying.is_empty() {
            ClientState::Idle
        } else {
            ClientState::Applying
        }
    }

    /// Handles one message payload and returns the action taken.
    ///
    /// `Replace` returns as soon as the apply task is spawned; `Reload`
    /// returns once the page has reloaded.
    pub async fn handle_message(&mut self, payload: &str) -> Action {
        self.reap();

        let action = dispatch(payload);
        match action {
            Action::Replace => {
                if ReloadSignal::parse(payload) == Some(ReloadSignal::Legacy) {
                    debug!("legacy `reload` signal; treating as `reload_value`");
                }
                self.spawn_replace();
            }
            Action::Reload => {
                let aborted = self.applying.len();
                self.applying.shutdown().await;
                if aborted > 0 {
                    debug!(aborted, "full reload discarded pending applies");
                }
                info!(url = %self.page.location(), "reloading page");
                self.page.reload().await;
            }
            Action::Ignore => {
                debug!(payload, "ignoring message");
            }
        }
        action
    }

    /// Waits for every pending apply task to finish.
    pub async fn settle(&mut self) {
        while let Some(result) = self.applying.join_next().await {
            log_join(result);
        }
    }

    /// Aborts pending applies. The subscription is owned by the running
    /// lifecycle and is dropped when [`run_until`](Self::run_until) returns.
    pub fn dispose(&mut self) {
        if !self.applying.is_empty() {
            debug!(pending = self.applying.len(), "aborting pending applies");
        }
        self.applying.abort_all();
    }

    /// Follows the event stream until it fails for good.
    ///
    /// # Errors
    ///
    /// See [`run_until`](Self::run_until).
    pub async fn run(&mut self) -> Result<(), ClientError> {
        self.run_until(std::future::pending()).await
    }

    /// Follows the event stream until `shutdown` resolves, then disposes of
    /// the client.
    ///
    /// Each lifecycle opens exactly one subscription. Network errors and
    /// ended streams are retried by the [`EventSource`]; a `reload_page`
    /// signal ends the lifecycle and starts the next one.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::EventSource`] when the events endpoint answers
    /// with something other than an event stream.
    pub async fn run_until<S>(&mut self, shutdown: S) -> Result<(), ClientError>
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            self.lifecycles += 1;
            let mut source = EventSource::new(
                self.http.clone(),
                self.events_url(),
                self.config.retry_interval(),
            );
            info!(lifecycle = self.lifecycles, url = %source.url(), "subscribing to reload signals");

            loop {
                tokio::select! {
                    () = &mut shutdown => {
                        source.close();
                        self.stop();
                        return Ok(());
                    }
                    event = source.next_event() => {
                        let event = match event {
                            Ok(event) => event,
                            Err(e) => {
                                self.dispose();
                                return Err(e.into());
                            }
                        };
                        if !event.is_message() {
                            debug!(event_type = %event.event_type, "ignoring named event");
                            continue;
                        }
                        if dispatch(&event.data) == Action::Reload {
                            source.close();
                            // A reload may stall on the network; shutdown still wins.
                            let stopped = tokio::select! {
                                () = &mut shutdown => true,
                                _ = self.handle_message(&event.data) => false,
                            };
                            if stopped {
                                self.stop();
                                return Ok(());
                            }
                            break;
                        }
                        self.handle_message(&event.data).await;
                    }
                }
            }
        }
    }

    fn stop(&mut self) {
        self.dispose();
        info!("live reload stopped");
    }

    fn spawn_replace(&mut self) {
        let page = Arc::clone(&self.page);
        let fetcher = Arc::clone(&self.fetcher);
        self.applying.spawn(async move {
            let url = page.location();
            match fetcher.fetch_text(&url).await {
                Ok(html) => {
                    debug!(url = %url, bytes = html.len(), "replacing document");
                    page.replace_document(html).await;
                }
                Err(e) => warn!(url = %url, error = %e, "refetch failed; document unchanged"),
            }
        });
    }

    fn reap(&mut self) {
        while let Some(result) = self.applying.try_join_next() {
            log_join(result);
        }
    }
}

fn log_join(result: Result<(), JoinError>) {
    match result {
        Err(e) if e.is_panic() => warn!(error = %e, "apply task panicked"),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::*;
    use crate::client::FetchError;
    use crate::page::MemoryPage;

    type Reply = Result<String, FetchError>;

    /// Answers each fetch with whatever is later sent on its channel.
    #[derive(Debug, Default)]
    struct ScriptedFetcher {
        replies: Mutex<VecDeque<oneshot::Receiver<Reply>>>,
        fetches: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn expect(&self) -> oneshot::Sender<Reply> {
            let (tx, rx) = oneshot::channel();
            self.replies.lock().unwrap().push_back(rx);
            tx
        }
    }

    impl Fetch for Arc<ScriptedFetcher> {
        async fn fetch_text(&self, _url: &Url) -> Result<String, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(rx) => rx.await.unwrap_or_else(|_| Err(refused())),
                None => Err(refused()),
            }
        }
    }

    fn refused() -> FetchError {
        std::io::Error::from(std::io::ErrorKind::ConnectionRefused).into()
    }

    fn client() -> (
        ReloadClient<MemoryPage, Arc<ScriptedFetcher>>,
        Arc<MemoryPage>,
        Arc<ScriptedFetcher>,
    ) {
        let page = Arc::new(MemoryPage::new(
            Url::parse("http://localhost:3000/").unwrap(),
            "<html>OLD</html>",
        ));
        let fetcher = Arc::new(ScriptedFetcher::default());
        let client = ReloadClient::with_fetcher(
            Arc::clone(&page),
            Arc::clone(&fetcher),
            ClientConfig::default(),
        );
        (client, page, fetcher)
    }

    #[tokio::test]
    async fn reload_value_replaces_document() {
        let (mut client, page, fetcher) = client();
        let reply = fetcher.expect();

        assert_eq!(client.handle_message("reload_value").await, Action::Replace);
        reply.send(Ok("<html>NEW</html>".to_owned())).unwrap();
        client.settle().await;

        assert_eq!(page.document(), "<html>NEW</html>");
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn legacy_reload_replaces_document() {
        let (mut client, page, fetcher) = client();
        let reply = fetcher.expect();

        assert_eq!(client.handle_message("reload").await, Action::Replace);
        reply.send(Ok("<html>NEW</html>".to_owned())).unwrap();
        client.settle().await;

        assert_eq!(page.document(), "<html>NEW</html>");
    }

    #[tokio::test]
    async fn reload_page_reloads_once_without_fetching() {
        let (mut client, page, fetcher) = client();

        assert_eq!(client.handle_message("reload_page").await, Action::Reload);
        client.settle().await;

        assert_eq!(page.reload_count(), 1);
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 0);
        assert_eq!(page.document(), "<html>OLD</html>");
    }

    #[tokio::test]
    async fn rejected_fetch_leaves_document_unchanged() {
        let (mut client, page, fetcher) = client();
        let reply = fetcher.expect();

        client.handle_message("reload_value").await;
        reply.send(Err(refused())).unwrap();
        client.settle().await;

        assert_eq!(page.document(), "<html>OLD</html>");
        assert_eq!(page.replacement_count(), 0);
    }

    #[tokio::test]
    async fn unknown_payloads_are_ignored() {
        let (mut client, page, fetcher) = client();

        for payload in ["", "RELOAD", " reload_value", "reload_value\n", "reload-page", "noop"] {
            assert_eq!(client.handle_message(payload).await, Action::Ignore);
        }
        client.settle().await;

        assert_eq!(page.document(), "<html>OLD</html>");
        assert_eq!(page.reload_count(), 0);
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn last_resolved_fetch_wins() {
        let (mut client, page, fetcher) = client();
        let first = fetcher.expect();
        let second = fetcher.expect();

        client.handle_message("reload_value").await;
        client.handle_message("reload_value").await;

        second.send(Ok("<html>EARLY</html>".to_owned())).unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while page.replacement_count() < 1 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        first.send(Ok("<html>LATE</html>".to_owned())).unwrap();
        client.settle().await;

        assert_eq!(page.document(), "<html>LATE</html>");
        assert_eq!(page.replacement_count(), 2);
    }

    #[tokio::test]
    async fn state_tracks_pending_applies() {
        let (mut client, _page, fetcher) = client();
        assert_eq!(client.state(), ClientState::Idle);

        let reply = fetcher.expect();
        client.handle_message("reload_value").await;
        assert_eq!(client.state(), ClientState::Applying);

        reply.send(Ok(String::new())).unwrap();
        client.settle().await;
        assert_eq!(client.state(), ClientState::Idle);
    }

    #[tokio::test]
    async fn full_reload_discards_pending_applies() {
        let (mut client, page, fetcher) = client();
        let stale = fetcher.expect();

        client.handle_message("reload_value").await;
        client.handle_message("reload_page").await;
        let _ = stale.send(Ok("<html>STALE</html>".to_owned()));
        client.settle().await;

        assert_eq!(page.document(), "<html>OLD</html>");
        assert_eq!(page.reload_count(), 1);
        assert_eq!(client.state(), ClientState::Idle);
    }

    #[tokio::test]
    async fn dispose_aborts_pending_applies() {
        let (mut client, page, fetcher) = client();
        let reply = fetcher.expect();

        client.handle_message("reload_value").await;
        client.dispose();
        let _ = reply.send(Ok("<html>NEW</html>".to_owned()));
        client.settle().await;

        assert_eq!(page.document(), "<html>OLD</html>");
    }

    #[test]
    fn events_url_is_on_the_page_origin() {
        let page = Arc::new(MemoryPage::new(
            Url::parse("http://localhost:8080/posts/1?draft=true").unwrap(),
            "",
        ));
        let client = ReloadClient::new(page, ClientConfig::default());
        assert_eq!(client.events_url().to_string(), "http://localhost:8080/sse");
    }
}
