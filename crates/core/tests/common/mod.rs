//! Shared helpers for the integration tests.
#![allow(dead_code)]

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("../../tests/fixtures/{}", name)).unwrap()
}

/// Starts a mock endpoint answering JSON POSTs to `/hook` with `response`.
pub async fn webhook_endpoint(response: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("content-type", "application/json"))
        .respond_with(response)
        .mount(&server)
        .await;
    server
}

pub fn hook_url(server: &MockServer) -> String {
    format!("{}/hook", server.uri())
}

/// Bodies of every request the endpoint received, oldest first.
pub async fn received_json(server: &MockServer) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|request| serde_json::from_slice(&request.body).unwrap())
        .collect()
}
