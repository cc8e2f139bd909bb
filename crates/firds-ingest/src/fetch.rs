//! Streamed HTTP downloads

use crate::config::IngestConfig;
use crate::error::{FetchError, IngestError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

/// Retrieves a remote resource into a local file.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Downloads `url` to `dest`, replacing it, and returns the written path.
    /// On failure no partial file is left at `dest`.
    async fn fetch(&self, url: &str, dest: &Path) -> std::result::Result<PathBuf, FetchError>;
}

/// reqwest-backed [`Fetcher`] that streams the body chunk by chunk.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    show_progress: bool,
}

impl HttpFetcher {
    pub fn new(config: &IngestConfig) -> Result<Self> {
        Self::with_timeouts(
            Duration::from_secs(config.connect_timeout_secs),
            Duration::from_secs(config.request_timeout_secs),
            config.show_progress,
        )
    }

    pub fn with_timeouts(connect: Duration, request: Duration, show_progress: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect)
            .timeout(request)
            .user_agent(concat!("firds-ingest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IngestError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            show_progress,
        })
    }

    async fn download(&self, url: &str, dest: &Path) -> std::result::Result<u64, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FetchError::other(url, e))?;
        }

        let total_size = response.content_length();
        let pb = self.progress_bar(total_size, dest);

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| FetchError::other(url, e))?;
        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| FetchError::from_reqwest(url, e))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| FetchError::other(url, e))?;
            downloaded += chunk.len() as u64;
            pb.set_position(downloaded);
        }

        file.flush().await.map_err(|e| FetchError::other(url, e))?;
        pb.finish_and_clear();

        Ok(downloaded)
    }

    fn progress_bar(&self, total_size: Option<u64>, dest: &Path) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(total_size.unwrap_or(0));
        let style = ProgressStyle::default_bar()
            .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .map(|s| s.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb.set_message(format!("Downloading {}", display_name(dest)));
        pb
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    #[instrument(skip(self), fields(dest = %dest.display()))]
    async fn fetch(&self, url: &str, dest: &Path) -> std::result::Result<PathBuf, FetchError> {
        debug!("starting download");

        match self.download(url, dest).await {
            Ok(bytes) => {
                info!(bytes, "download complete");
                Ok(dest.to_path_buf())
            },
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(dest).await {
                    if remove_err.kind() != std::io::ErrorKind::NotFound {
                        warn!(error = %remove_err, "could not remove partial download");
                    }
                }
                Err(e)
            },
        }
    }
}

/// Last path segment of `url`, without query or fragment.
pub fn file_name_from_url(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let after_scheme = without_query
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(without_query);

    // the host alone is not a file name
    let (_, path) = after_scheme.split_once('/')?;
    path.rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::with_timeouts(Duration::from_secs(5), Duration::from_secs(5), false).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_writes_body() {
        let server = MockServer::start().await;
        let body = vec![7u8; 200_000];
        Mock::given(method("GET"))
            .and(path("/firds/DLTINS_20210117_01of01.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("nested").join("archive.zip");
        let url = format!("{}/firds/DLTINS_20210117_01of01.zip", server.uri());

        let written = fetcher().fetch(&url, &dest).await.unwrap();

        assert_eq!(written, dest);
        assert_eq!(std::fs::read(&dest).unwrap(), body);
    }

    #[tokio::test]
    async fn test_fetch_http_error_leaves_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("missing.zip");
        std::fs::write(&dest, b"stale").unwrap();
        let url = format!("{}/missing.zip", server.uri());

        let err = fetcher().fetch(&url, &dest).await.unwrap_err();

        match err {
            FetchError::HttpStatus { url: failed, status } => {
                assert_eq!(status, 404);
                assert_eq!(failed, url);
            },
            other => panic!("expected HTTP status error, got {:?}", other),
        }
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let slow = HttpFetcher::with_timeouts(
            Duration::from_secs(1),
            Duration::from_millis(200),
            false,
        )
        .unwrap();
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("slow.xml");

        let err = slow
            .fetch(&format!("{}/slow.xml", server.uri()), &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Timeout { .. }), "got {:?}", err);
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("x.zip");

        // port 9 (discard) is closed on test machines
        let err = fetcher()
            .fetch("http://127.0.0.1:9/x.zip", &dest)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            FetchError::Other { .. } | FetchError::Timeout { .. }
        ));
        assert!(!dest.exists());
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("http://firds.esma.europa.eu/firds/DLTINS_20210117_01of01.zip")
                .as_deref(),
            Some("DLTINS_20210117_01of01.zip")
        );
        assert_eq!(
            file_name_from_url("https://example.test/a/b.zip?token=1#frag").as_deref(),
            Some("b.zip")
        );
        assert_eq!(file_name_from_url("https://example.test/dir/"), None);
        assert_eq!(file_name_from_url("https://example.test"), None);
    }
}
