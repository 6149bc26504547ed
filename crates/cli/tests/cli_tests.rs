//! CLI integration tests
use predicates::prelude::*;
use tempfile::TempDir;

fn cmd() -> assert_cmd::Command {
    assert_cmd::cargo::cargo_bin_cmd!("ovex")
}

fn get_fixture_path(name: &str) -> String {
    format!("../../tests/fixtures/{}", name)
}

/// A command whose store lives in `tmp`.
fn isolated(tmp: &TempDir) -> assert_cmd::Command {
    let mut command = cmd();
    command.arg("--store").arg(tmp.path().join("storage.json"));
    command
}

#[test]
fn test_cli_extract_markdown() {
    cmd()
        .args(["extract", &get_fixture_path("overview_expanded.html")])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("# AI Overview"))
        .stdout(predicate::str::contains("## Sources"))
        .stdout(predicate::str::contains("Rust (programming language) - Wikipedia"));
}

#[test]
fn test_cli_extract_with_page_url() {
    cmd()
        .args(["extract", "--page-url", "https://www.google.com/search?q=rust+ownership"])
        .arg(get_fixture_path("overview_expanded.html"))
        .assert()
        .success()
        .stdout(predicate::str::contains("**Search Query:** rust ownership"));
}

#[test]
fn test_cli_extract_stdin() {
    let html = std::fs::read_to_string(get_fixture_path("overview_expanded.html")).unwrap();
    cmd()
        .args(["extract", "-"])
        .write_stdin(html)
        .assert()
        .success()
        .stdout(predicate::str::contains("Ownership is the set of rules"));
}

#[test]
fn test_cli_extract_html_format() {
    cmd()
        .args(["extract", "-f", "html", &get_fixture_path("overview_expanded.html")])
        .assert()
        .success()
        .stdout(predicate::str::contains("<strong>"))
        .stdout(predicate::str::contains("class=").not());
}

#[test]
fn test_cli_extract_json_format() {
    let output = cmd()
        .args(["extract", "-f", "json", &get_fixture_path("overview_expanded.html")])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["sources"].as_array().unwrap().len(), 3);
    assert!(json.get("htmlContent").is_some());
}

#[test]
fn test_cli_extract_output_and_download() {
    let tmp = TempDir::new().unwrap();
    let output = tmp.path().join("overview.md");
    let downloads = tmp.path().join("downloads");

    cmd()
        .args(["extract", "-o", output.to_str().unwrap(), "--download", downloads.to_str().unwrap()])
        .arg(get_fixture_path("overview_expanded.html"))
        .assert()
        .success();

    assert!(output.exists());
    let saved: Vec<_> = std::fs::read_dir(&downloads).unwrap().collect();
    assert_eq!(saved.len(), 1);
}

#[test]
fn test_cli_extract_without_container() {
    let tmp = TempDir::new().unwrap();
    let page = tmp.path().join("plain.html");
    std::fs::write(&page, "<html><body><p>No overview here</p></body></html>").unwrap();

    cmd()
        .args(["extract", page.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No AI overview container"));
}

#[test]
fn test_cli_invalid_file() {
    cmd().args(["extract", "/nonexistent/file.html"]).assert().failure();
}

#[test]
fn test_cli_invalid_format() {
    cmd()
        .args(["extract", "-f", "pdf", &get_fixture_path("overview.html")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid format"));
}

#[test]
fn test_cli_send_without_webhook() {
    let tmp = TempDir::new().unwrap();
    isolated(&tmp)
        .args(["extract", "--send", &get_fixture_path("overview_expanded.html")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Webhook is not configured"));
}

#[test]
fn test_cli_settings_roundtrip() {
    let tmp = TempDir::new().unwrap();

    isolated(&tmp).args(["settings", "set", "autoSendWebhook", "true"]).assert().success();
    isolated(&tmp)
        .args(["settings", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""autoSendWebhook": true"#));

    isolated(&tmp).args(["settings", "reset"]).assert().success();
    isolated(&tmp)
        .args(["settings", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""autoSendWebhook": false"#));
}

#[test]
fn test_cli_settings_rejects_non_boolean_flag() {
    let tmp = TempDir::new().unwrap();
    isolated(&tmp).args(["settings", "set", "autoExpandSources", "yes"]).assert().failure();
}

#[test]
fn test_cli_settings_import_validates() {
    let tmp = TempDir::new().unwrap();

    isolated(&tmp)
        .args(["settings", "import", "-"])
        .write_stdin(r#"{"autoExpandOverviews": true}"#)
        .assert()
        .failure();

    isolated(&tmp)
        .args(["settings", "import", "-"])
        .write_stdin(r#"{"autoExpandOverviews": true, "autoExpandSources": true, "autoSendWebhook": false}"#)
        .assert()
        .success();
}

#[test]
fn test_cli_webhook_set_show_remove() {
    let tmp = TempDir::new().unwrap();

    isolated(&tmp)
        .args(["webhook", "set", "http://example.com/hook"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid webhook URL"));

    isolated(&tmp).args(["webhook", "set", "http://localhost:3000/hook"]).assert().success();
    isolated(&tmp)
        .args(["webhook", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("http://localhost:3000/hook"));

    isolated(&tmp).args(["webhook", "remove"]).assert().success();
    isolated(&tmp)
        .args(["webhook", "show"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_cli_automate_with_automation_disabled() {
    let tmp = TempDir::new().unwrap();
    isolated(&tmp)
        .args(["automate", &get_fixture_path("overview_expanded.html")])
        .assert()
        .success()
        .stdout(predicate::str::contains("COMPLETED"));
}

#[test]
fn test_cli_automate_json() {
    let tmp = TempDir::new().unwrap();
    let output = isolated(&tmp)
        .args(["automate", "--json", &get_fixture_path("overview_expanded.html")])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["state"], "COMPLETED");
    assert_eq!(json["breakers"].as_array().unwrap().len(), 3);
}

#[test]
fn test_cli_message_ack() {
    let tmp = TempDir::new().unwrap();
    isolated(&tmp)
        .args(["message", r#"{"type":"SETTINGS_RESET"}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"{"success":true}"#));

    isolated(&tmp).args(["message", r#"{"type":"UNKNOWN"}"#]).assert().failure();
}

#[test]
fn test_cli_completions() {
    cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ovex"));
}

#[test]
fn test_cli_verbose() {
    cmd()
        .env_remove("RUST_LOG")
        .args(["-v", "extract", &get_fixture_path("overview_expanded.html")])
        .assert()
        .success()
        .stderr(predicate::str::contains("Extraction Details"))
        .stderr(predicate::str::contains("snapshot loaded"))
        .stderr(predicate::str::contains("overview extracted"));
}

#[test]
fn test_cli_version() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
