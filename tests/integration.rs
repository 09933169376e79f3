//! End-to-end tests for the `recall` binary.
//!
//! Each test writes a config plus a directory of exported channel files to a
//! temp dir and runs the binary against it. Embeddings use the offline
//! `hash` provider; generation is either disabled or a wiremock Ollama.

use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn recall_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_recall"))
}

fn setup_test_env(generation: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let exports = root.join("exports");
    fs::create_dir_all(&exports).unwrap();
    fs::write(
        exports.join("eng.json"),
        json!([
            { "text": "The release is scheduled for Friday afternoon", "user": "U1", "ts": "1.0", "client_msg_id": "r-1" },
            { "text": "Database migration finished without errors", "user": "U2", "ts": "2.0" },
            { "text": "ok", "user": "U3", "ts": "3.0" }
        ])
        .to_string(),
    )
    .unwrap();
    fs::write(exports.join("random.json"), "[]").unwrap();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_path = config_dir.join("recall.toml");
    fs::write(
        &config_path,
        format!(
            r#"[embedding]
provider = "hash"

{}

[source]
provider = "export"
root = "{}"

[logging]
level = "warn"
"#,
            generation,
            exports.display()
        ),
    )
    .unwrap();

    (tmp, config_path)
}

fn run_recall(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(recall_binary())
        .arg("--config")
        .arg(config_path)
        .args(args)
        .output()
        .expect("failed to run recall");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

#[test]
fn test_channels() {
    let (_tmp, config) = setup_test_env("");
    let (stdout, stderr, ok) = run_recall(&config, &["channels"]);
    assert!(ok, "stderr: {}", stderr);
    assert!(stdout.contains("eng"));
    assert!(stdout.contains("random"));
}

#[test]
fn test_index_all_channels() {
    let (_tmp, config) = setup_test_env("");
    let (stdout, stderr, ok) = run_recall(&config, &["index"]);
    assert!(ok, "stderr: {}", stderr);
    assert_eq!(
        stdout.trim(),
        "Successfully indexed 2 messages from 2 channel(s)."
    );
}

#[test]
fn test_index_empty_channel() {
    let (_tmp, config) = setup_test_env("");
    let (stdout, _, ok) = run_recall(&config, &["index", "--channel", "random"]);
    assert!(ok);
    assert_eq!(
        stdout.trim(),
        "No new messages were indexed from the 1 channel(s) processed."
    );
}

#[test]
fn test_ask_without_index_has_no_context() {
    let (_tmp, config) = setup_test_env("");
    let (stdout, _, ok) = run_recall(&config, &["ask", "when is the release?"]);
    assert!(ok);
    assert_eq!(
        stdout.trim(),
        "No relevant information found in the indexed messages to answer your query."
    );
}

#[test]
fn test_ask_with_generation_disabled_falls_back() {
    let (_tmp, config) = setup_test_env("");
    let (stdout, _, ok) = run_recall(&config, &["ask", "when is the release?", "--index"]);
    assert!(ok);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(
        lines,
        vec![
            "Successfully indexed 2 messages from 2 channel(s).",
            "Sorry, an error occurred while trying to answer your query.",
        ]
    );
}

#[test]
fn test_ask_empty_query() {
    let (_tmp, config) = setup_test_env("");
    let (stdout, _, ok) = run_recall(&config, &["ask", "  "]);
    assert!(ok);
    assert_eq!(stdout.trim(), "Please provide a non-empty query.");
}

#[tokio::test]
async fn test_ask_end_to_end_with_ollama() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "The release is on Friday afternoon.",
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (tmp, config) = setup_test_env(&format!(
        "[generation]\nprovider = \"ollama\"\nmodel = \"llama3.2\"\nurl = \"{}\"",
        server.uri()
    ));

    let (stdout, stderr, ok) = tokio::task::spawn_blocking(move || {
        run_recall(
            &config,
            &["ask", "when is the release", "--index", "--channel", "eng"],
        )
    })
    .await
    .unwrap();
    drop(tmp);

    assert!(ok, "stderr: {}", stderr);
    assert!(stdout.contains("Successfully indexed 2 messages from 1 channel(s)."));
    assert!(stdout.contains("The release is on Friday afternoon."));

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let prompt = body["prompt"].as_str().unwrap();
    assert!(prompt.contains("The release is scheduled for Friday afternoon"));
    assert!(prompt.contains("User Query: when is the release"));
    assert_eq!(body["options"]["num_predict"], 500);
}

#[test]
fn test_missing_config_file_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, ok) = run_recall(&tmp.path().join("nope.toml"), &["channels"]);
    assert!(!ok);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_invalid_config_fails() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("bad.toml");
    fs::write(&config, "[retrieval]\ntop_k = 0\n").unwrap();
    let (_, stderr, ok) = run_recall(&config, &["channels"]);
    assert!(!ok);
    assert!(stderr.contains("top_k"));
}

#[test]
fn test_defaults_without_config() {
    let tmp = TempDir::new().unwrap();
    let output = Command::new(recall_binary())
        .current_dir(tmp.path())
        .arg("channels")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "No channels found."
    );
}
