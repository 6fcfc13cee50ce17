//! `livereload`: follow a page on a live-reload development server and keep
//! a local copy of its document current.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use livereload::http::Url;
use livereload::page::{MirrorPage, Output};
use livereload::reload::{ClientConfig, ReloadClient};
use livereload::script::RELOAD_SCRIPT;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "LIVERELOAD_LOG";

/// Follow a page served by a live-reload development server.
#[derive(Parser, Debug)]
#[command(name = "livereload", version, about)]
struct Options {
    /// Path of the page to follow.
    #[arg(default_value = "/")]
    page: String,

    /// Host the development server listens on.
    #[arg(short = 'n', long, default_value = "localhost")]
    hostname: String,

    /// Port the development server listens on.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// Mirror the document into FILE instead of printing it.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Path of the event stream.
    #[arg(long, value_name = "PATH")]
    events_path: Option<String>,

    /// Reconnection time in milliseconds.
    #[arg(long, value_name = "MS")]
    retry_ms: Option<u64>,

    /// JSON client configuration; command-line flags take precedence.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the browser reload script and exit.
    #[arg(long)]
    print_script: bool,
}

impl Options {
    fn client_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_json_file(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => ClientConfig::default(),
        };
        if let Some(path) = &self.events_path {
            config = config.events_path(path.clone());
        }
        if let Some(ms) = self.retry_ms {
            config.retry_ms = ms;
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }

    fn page_url(&self) -> Url {
        Url::from_parts(self.hostname.clone(), self.port, &self.page)
    }

    fn output(&self) -> Output {
        match &self.output {
            Some(path) => Output::File(path.clone()),
            None => Output::Stdout,
        }
    }
}

fn main() -> ExitCode {
    let options = Options::parse();

    if options.print_script {
        print!("{RELOAD_SCRIPT}");
        return ExitCode::SUCCESS;
    }

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(options)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(options: Options) -> Result<()> {
    let config = options.client_config()?;
    let url = options.page_url();
    let page = Arc::new(MirrorPage::new(
        url.clone(),
        config.http_client(),
        options.output(),
    ));

    page.load()
        .await
        .with_context(|| format!("failed to load {url}"))?;
    info!(url = %url, "page loaded");

    let mut client = ReloadClient::new(page, config);
    client
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
        .context("live reload failed")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_localhost_root() {
        let options = Options::parse_from(["livereload"]);
        assert_eq!(options.page_url().to_string(), "http://localhost:3000/");
        assert_eq!(options.output(), Output::Stdout);
        assert_eq!(options.client_config().unwrap(), ClientConfig::default());
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("livereload.json");
        std::fs::write(&path, r#"{ "events_path": "/events", "retry_ms": 100 }"#).unwrap();

        let options = Options::parse_from([
            "livereload",
            "--config",
            path.to_str().unwrap(),
            "--retry-ms",
            "250",
        ]);
        let config = options.client_config().unwrap();
        assert_eq!(config.events_path, "/events");
        assert_eq!(config.retry_ms, 250);
    }

    #[test]
    fn page_and_host_flags_build_url() {
        let options = Options::parse_from([
            "livereload",
            "-n",
            "127.0.0.1",
            "-p",
            "8080",
            "/posts/1",
            "-o",
            "out.html",
        ]);
        assert_eq!(options.page_url().to_string(), "http://127.0.0.1:8080/posts/1");
        assert_eq!(options.output(), Output::File(PathBuf::from("out.html")));
    }

    #[test]
    fn empty_events_path_is_rejected() {
        let options = Options::parse_from(["livereload", "--events-path", ""]);
        assert!(options.client_config().is_err());
    }

    #[test]
    fn zero_retry_is_rejected() {
        let options = Options::parse_from(["livereload", "--retry-ms", "0"]);
        assert!(options.client_config().is_err());
    }
}
