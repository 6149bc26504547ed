//! Loading results-page snapshots from URLs, files and stdin.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::webhook::DEFAULT_USER_AGENT;
use crate::{OvexError, Result};

/// HTTP settings for fetching a results page.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(30), user_agent: DEFAULT_USER_AGENT.to_string() }
    }
}

/// Serialized results page plus the address it came from, when known.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub html: String,
    pub url: Option<Url>,
}

/// Loads a snapshot from `-` (stdin), an http(s) URL or a file path.
pub async fn load_snapshot(input: &str, config: &FetchConfig) -> Result<Snapshot> {
    if input == "-" {
        return Ok(Snapshot { html: fetch_stdin()?, url: None });
    }

    if input.starts_with("http://") || input.starts_with("https://") {
        let html = fetch_url(input, config).await?;
        let url = Url::parse(input).map_err(|e| OvexError::InvalidUrl(e.to_string()))?;
        return Ok(Snapshot { html, url: Some(url) });
    }

    Ok(Snapshot { html: fetch_file(input)?, url: None })
}

/// Fetches a results page over HTTP.
pub async fn fetch_url(url: &str, config: &FetchConfig) -> Result<String> {
    let parsed_url = Url::parse(url).map_err(|e| OvexError::InvalidUrl(e.to_string()))?;

    if !matches!(parsed_url.scheme(), "http" | "https") {
        return Err(OvexError::InvalidUrl(format!("unsupported scheme {}", parsed_url.scheme())));
    }

    let client = Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(OvexError::HttpError)?;

    debug!(url = %parsed_url, "fetching snapshot");
    let response = client
        .get(parsed_url)
        .header("User-Agent", &config.user_agent)
        .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
        .header("Accept-Language", "en-US,en;q=0.9")
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                OvexError::Timeout { timeout_ms: config.timeout.as_millis() as u64 }
            } else {
                OvexError::HttpError(e)
            }
        })?;

    let content = response.text().await?;

    Ok(content)
}

/// Reads a saved snapshot from disk.
pub fn fetch_file(path: &str) -> Result<String> {
    let path_buf = PathBuf::from(path);

    if !path_buf.exists() {
        Err(OvexError::FileNotFound(path_buf))
    } else {
        fs::read_to_string(&path_buf).map_err(OvexError::from)
    }
}

/// Reads a snapshot piped on stdin.
pub fn fetch_stdin() -> Result<String> {
    use std::io::{self, Read};

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer).map_err(OvexError::from)?;

    Ok(buffer)
}
