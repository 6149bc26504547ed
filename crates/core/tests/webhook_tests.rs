//! Webhook delivery against a local endpoint.
mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{hook_url, received_json, webhook_endpoint};
use ovex_core::*;
use wiremock::ResponseTemplate;

fn manager(url: &str, timeout: Duration) -> WebhookManager {
    let store = Arc::new(MemoryStore::new());
    let manager = WebhookManager::new(store, timeout).unwrap();
    manager.save_webhook_url(url).unwrap();
    manager
}

fn data() -> WebhookData {
    WebhookData {
        search_query: Some("rust ownership".to_string()),
        content: "# AI Overview\n\nOwnership rules.".to_string(),
        html_content: "<p>Ownership rules.</p>".to_string(),
        sources: vec![Source { title: "The Book".to_string(), url: "https://doc.rust-lang.org/book/".to_string() }],
        page_url: Some("https://www.google.com/search?q=rust+ownership".to_string()),
    }
}

#[tokio::test]
async fn test_send_delivers_payload() {
    let server = webhook_endpoint(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#)).await;
    let manager = manager(&hook_url(&server), Duration::from_secs(5));

    let result = manager.send_to_webhook(&data()).await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.response.as_deref(), Some(r#"{"ok":true}"#));

    let payloads = received_json(&server).await;
    assert_eq!(payloads.len(), 1);
    let payload = &payloads[0];
    assert_eq!(payload["searchQuery"], "rust ownership");
    assert_eq!(payload["aiOverview"]["content"], "# AI Overview\n\nOwnership rules.");
    assert_eq!(payload["aiOverview"]["htmlContent"], "<p>Ownership rules.</p>");
    assert_eq!(payload["sources"][0]["url"], "https://doc.rust-lang.org/book/");
    assert_eq!(payload["metadata"]["googleSearchUrl"], "https://www.google.com/search?q=rust+ownership");
    assert_eq!(payload["metadata"]["extensionVersion"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_non_2xx_is_reported() {
    let server = webhook_endpoint(ResponseTemplate::new(500)).await;
    let manager = manager(&hook_url(&server), Duration::from_secs(5));

    let result = manager.send_to_webhook(&data()).await;
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("HTTP 500: Internal Server Error"));
}

#[tokio::test]
async fn test_silent_endpoint_times_out() {
    let server = webhook_endpoint(ResponseTemplate::new(200).set_delay(Duration::from_secs(30))).await;
    let manager = manager(&hook_url(&server), Duration::from_millis(250));

    let started = Instant::now();
    let result = manager.send_to_webhook(&data()).await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Timeout - webhook did not respond within 250ms"));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_connection_refused_is_reported() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/hook", listener.local_addr().unwrap());
    drop(listener);

    let manager = manager(&url, Duration::from_secs(2));
    let result = manager.send_to_webhook(&data()).await;
    assert!(!result.success);
    assert!(result.error.is_some());
}

#[tokio::test]
async fn test_webhook_posts_test_payload() {
    let server = webhook_endpoint(ResponseTemplate::new(204)).await;
    let manager = WebhookManager::new(Arc::new(MemoryStore::new()), Duration::from_secs(5)).unwrap();

    let result = manager.test_webhook(&hook_url(&server)).await;
    assert!(result.success);

    let payload = &received_json(&server).await[0];
    assert_eq!(payload["test"], true);
    assert!(payload["message"].as_str().unwrap().contains("Connection test"));
}
