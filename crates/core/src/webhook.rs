//! Delivery of extracted overviews to a user-configured webhook.
//!
//! Every delivery resolves to a [`WebhookResult`]: timeouts, non-2xx
//! responses and transport errors are reported in it, never as `Err`.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info, warn};
use url::{Host, Url};

use crate::extract::{Extraction, Source};
use crate::storage::KeyValueStore;
use crate::{OvexError, Result};

/// Storage slot holding the webhook URL.
pub const WEBHOOK_URL_KEY: &str = "ai-overview-webhook-url";

/// Version reported in payload metadata.
pub const EXTENSION_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_USER_AGENT: &str = concat!("ovex/", env!("CARGO_PKG_VERSION"));

const TEST_MESSAGE: &str = "Connection test from AI Overview Extractor";

/// What the caller has extracted and wants delivered.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookData {
    pub search_query: Option<String>,
    /// The Markdown document.
    pub content: String,
    pub html_content: String,
    pub sources: Vec<Source>,
    /// Address of the results page.
    pub page_url: Option<String>,
}

impl WebhookData {
    pub fn from_extraction(extraction: Extraction, page_url: Option<&Url>) -> Self {
        Self {
            search_query: extraction.search_query,
            content: extraction.markdown,
            html_content: extraction.html_content,
            sources: extraction.sources,
            page_url: page_url.map(Url::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiOverview {
    pub content: String,
    pub html_content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadMetadata {
    pub google_search_url: Option<String>,
    pub extracted_at: String,
    pub user_agent: String,
    pub extension_version: String,
}

/// Body of a delivery POST.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub timestamp: String,
    pub search_query: Option<String>,
    pub ai_overview: AiOverview,
    pub sources: Vec<Source>,
    pub metadata: PayloadMetadata,
}

/// Body of a connection test POST.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestPayload {
    pub test: bool,
    pub timestamp: String,
    pub message: String,
}

/// Uniform outcome of a webhook request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Response body of a successful request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

impl WebhookResult {
    pub fn ok(response: String) -> Self {
        Self { success: true, error: None, response: Some(response) }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, error: Some(error.into()), response: None }
    }
}

/// Current time as an RFC 3339 timestamp.
pub(crate) fn timestamp() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

/// Whether `url` may be used as a webhook: https anywhere, http only on a local host.
pub fn is_valid_webhook_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return false;
    };

    match parsed.scheme() {
        "https" => parsed.host().is_some(),
        "http" => is_local_host(&parsed),
        _ => false,
    }
}

fn is_local_host(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain == "localhost",
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

fn describe_timeout(timeout: Duration) -> String {
    let millis = timeout.as_millis();
    if millis % 1000 == 0 { format!("{}s", millis / 1000) } else { format!("{}ms", millis) }
}

/// Stores the webhook URL and performs timeout-bounded POSTs to it.
pub struct WebhookManager {
    store: Arc<dyn KeyValueStore>,
    client: Client,
    timeout: Duration,
    user_agent: String,
}

impl WebhookManager {
    pub fn new(store: Arc<dyn KeyValueStore>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .map_err(OvexError::HttpError)?;

        Ok(Self { store, client, timeout, user_agent: DEFAULT_USER_AGENT.to_string() })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Validates and stores the webhook URL.
    pub fn save_webhook_url(&self, url: &str) -> Result<()> {
        let url = url.trim();
        if !is_valid_webhook_url(url) {
            warn!(url, "rejecting invalid webhook URL");
            return Err(OvexError::InvalidWebhookUrl(url.to_string()));
        }

        self.store.set(WEBHOOK_URL_KEY, Value::String(url.to_string()))?;
        info!(url, "webhook URL saved");
        Ok(())
    }

    /// The stored webhook URL; storage failures read as unset.
    pub fn get_webhook_url(&self) -> Option<String> {
        match self.store.get(WEBHOOK_URL_KEY) {
            Ok(Some(Value::String(url))) if !url.trim().is_empty() => Some(url),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "could not read webhook URL");
                None
            }
        }
    }

    pub fn remove_webhook_url(&self) -> Result<()> {
        self.store.remove(WEBHOOK_URL_KEY)?;
        info!("webhook URL removed");
        Ok(())
    }

    /// Whether a valid URL is stored.
    pub fn is_configured(&self) -> bool {
        self.get_webhook_url().is_some_and(|url| is_valid_webhook_url(&url))
    }

    /// POSTs a test payload to `url`, which need not be the stored one.
    pub async fn test_webhook(&self, url: &str) -> WebhookResult {
        if !is_valid_webhook_url(url) {
            return WebhookResult::failed(OvexError::InvalidWebhookUrl(url.to_string()).to_string());
        }

        let payload = TestPayload { test: true, timestamp: timestamp(), message: TEST_MESSAGE.to_string() };
        self.make_request(url, &payload).await
    }

    /// POSTs `data` to the stored webhook URL.
    pub async fn send_to_webhook(&self, data: &WebhookData) -> WebhookResult {
        let Some(url) = self.get_webhook_url() else {
            return WebhookResult::failed(OvexError::WebhookNotConfigured.to_string());
        };
        if !is_valid_webhook_url(&url) {
            return WebhookResult::failed(OvexError::InvalidWebhookUrl(url).to_string());
        }

        let payload = self.create_payload(data);
        info!(url = %url, sources = payload.sources.len(), "sending overview to webhook");

        let result = self.make_request(&url, &payload).await;
        match &result.error {
            None => info!("webhook delivered"),
            Some(error) => warn!(error = %error, "webhook delivery failed"),
        }
        result
    }

    pub fn create_payload(&self, data: &WebhookData) -> WebhookPayload {
        let now = timestamp();
        WebhookPayload {
            timestamp: now.clone(),
            search_query: data.search_query.clone(),
            ai_overview: AiOverview { content: data.content.clone(), html_content: data.html_content.clone() },
            sources: data.sources.clone(),
            metadata: PayloadMetadata {
                google_search_url: data.page_url.clone(),
                extracted_at: now,
                user_agent: self.user_agent.clone(),
                extension_version: EXTENSION_VERSION.to_string(),
            },
        }
    }

    async fn make_request<T: Serialize>(&self, url: &str, payload: &T) -> WebhookResult {
        debug!(url, timeout_ms = self.timeout.as_millis() as u64, "POST");

        let request = async {
            let response = self.client.post(url).json(payload).send().await?;
            let status = response.status();
            let result = if status.is_success() {
                WebhookResult::ok(response.text().await.unwrap_or_default())
            } else {
                WebhookResult::failed(format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or_default()
                ))
            };
            Ok::<_, reqwest::Error>(result)
        };

        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => WebhookResult::failed(describe_error(&e)),
            Err(_) => WebhookResult::failed(format!(
                "Timeout - webhook did not respond within {}",
                describe_timeout(self.timeout)
            )),
        }
    }
}

fn describe_error(e: &reqwest::Error) -> String {
    if e.is_connect() { format!("Connection error: {}", e) } else { e.to_string() }
}
