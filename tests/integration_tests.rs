//! Integration tests using mock HTTP server
//!
//! Tests the full end-to-end flow: CLI runner → token endpoint → paged
//! listings → RECORD/STATE messages and persisted state

use clap::Parser;
use optiply_tap::cli::{Cli, Runner};
use optiply_tap::output::JsonLinesWriter;
use optiply_tap::state::StateManager;
use optiply_tap::sync::Message;
use optiply_tap::Error;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helpers
// ============================================================================

fn config_for(server: &MockServer) -> Value {
    json!({
        "client_id": "cid",
        "client_secret": "secret",
        "username": "user@example.com",
        "password": "pass",
        "account_id": 42,
        "start_date": "2024-01-01T00:00:00Z",
        "base_url": server.uri(),
        "token_url": format!("{}/oauth/token", server.uri()),
        "page_size": 2,
        "http": {
            "initial_backoff_ms": 1,
            "max_backoff_ms": 5
        }
    })
}

fn runner(args: &[&str]) -> Runner {
    let mut argv = vec!["optiply-tap"];
    argv.extend_from_slice(args);
    Runner::new(Cli::parse_from(argv))
}

fn runner_with_state_file(config: &Value, state_path: &Path) -> Runner {
    let config = config.to_string();
    runner(&[
        "--config-json",
        &config,
        "--state",
        state_path.to_str().unwrap(),
        "sync",
    ])
}

async fn mount_token(server: &MockServer, token: &str, times: u64) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "token_type": "bearer",
            "expires_in": 3600
        })))
        .up_to_n_times(times)
        .mount(server)
        .await;
}

fn product(id: u64, updated_at: &str) -> Value {
    json!({
        "id": id,
        "type": "products",
        "attributes": {"name": format!("product {id}"), "updatedAt": updated_at}
    })
}

fn records(messages: &[Message]) -> Vec<&serde_json::Map<String, Value>> {
    messages
        .iter()
        .filter_map(|m| match m {
            Message::Record { record, .. } => Some(record),
            _ => None,
        })
        .collect()
}

fn states(messages: &[Message]) -> Vec<&Value> {
    messages
        .iter()
        .filter_map(|m| match m {
            Message::State { value } => Some(value),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Sync Tests
// ============================================================================

#[tokio::test]
async fn test_first_run_emits_records_and_bookmark() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1", 1).await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .and(header("Authorization", "Bearer tok-1"))
        .and(query_param("filter[accountId]", "42"))
        .and(query_param("filter[updatedAt][GT]", "2024-01-01T00:00:00Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                product(1, "2024-03-01T00:00:00Z"),
                product(2, "2024-03-15T00:00:00Z")
            ],
            "links": {}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let state_path = dir.path().join("state.json");
    let runner = runner_with_state_file(&config_for(&server), &state_path);

    let mut messages = Vec::new();
    let stats = runner
        .sync(Some("products"), false, &mut messages)
        .await
        .unwrap();

    assert_eq!(stats.records_synced, 2);
    assert_eq!(stats.streams_synced, 1);

    let records = records(&messages);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["id"], "1");
    assert_eq!(records[0]["type"], "products");
    assert_eq!(records[1]["updatedAt"], "2024-03-15T00:00:00Z");

    let states = states(&messages);
    assert_eq!(states.len(), 1);
    assert_eq!(
        states[0]["streams"]["products"]["replication_value"],
        "2024-03-15T00:00:00Z"
    );
    assert!(states[0].get("credentials").is_none());

    let persisted = StateManager::from_file(&state_path).unwrap();
    assert_eq!(
        persisted.get_bookmark("products").await.as_deref(),
        Some("2024-03-15T00:00:00Z")
    );
    assert_eq!(
        persisted.credentials().await.unwrap().access_token,
        "tok-1"
    );
}

#[tokio::test]
async fn test_next_links_are_followed_to_the_end() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1", 1).await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("page[offset]", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                product(1, "2024-02-01T00:00:00Z"),
                product(2, "2024-02-02T00:00:00Z")
            ],
            "links": {
                "next": format!("{}/products?page[limit]=2&page[offset]=2", server.uri())
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("page[offset]", "2"))
        .and(query_param("filter[accountId]", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [product(3, "2024-02-03T00:00:00Z")],
            "links": {}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server).to_string();
    let runner = runner(&["--config-json", &config, "sync"]);

    let mut messages = Vec::new();
    let stats = runner
        .sync(Some("products"), false, &mut messages)
        .await
        .unwrap();

    assert_eq!(stats.pages_fetched, 2);
    let ids: Vec<_> = records(&messages).iter().map(|r| r["id"].clone()).collect();
    assert_eq!(ids, vec![json!("1"), json!("2"), json!("3")]);
    assert_eq!(
        states(&messages)[0]["streams"]["products"]["replication_value"],
        "2024-02-03T00:00:00Z"
    );
}

#[tokio::test]
async fn test_rejected_token_mid_sync_refreshes_once() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1", 1).await;
    mount_token(&server, "tok-2", 1).await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .and(header("Authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .and(header("Authorization", "Bearer tok-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [product(1, "2024-04-01T00:00:00Z")],
            "links": {}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let state_path = dir.path().join("state.json");
    let runner = runner_with_state_file(&config_for(&server), &state_path);

    let mut messages = Vec::new();
    runner
        .sync(Some("products"), false, &mut messages)
        .await
        .unwrap();

    assert_eq!(records(&messages).len(), 1);

    let token_calls = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/oauth/token")
        .count();
    assert_eq!(token_calls, 2);

    let persisted = StateManager::from_file(&state_path).unwrap();
    assert_eq!(
        persisted.credentials().await.unwrap().access_token,
        "tok-2"
    );
}

#[tokio::test]
async fn test_bookmark_never_moves_backwards() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1", 1).await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("filter[updatedAt][GT]", "2024-06-01T00:00:00Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [product(7, "2024-05-01T00:00:00Z")],
            "links": {}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server).to_string();
    let state = json!({
        "bookmarks": {"products": {"replication_key_value": "2024-06-01T00:00:00+00:00"}}
    })
    .to_string();
    let runner = runner(&["--config-json", &config, "--state-json", &state, "sync"]);

    let mut messages = Vec::new();
    runner
        .sync(Some("products"), false, &mut messages)
        .await
        .unwrap();

    assert_eq!(records(&messages).len(), 1);
    assert_eq!(
        states(&messages)[0]["streams"]["products"]["replication_value"],
        "2024-06-01T00:00:00+00:00"
    );
}

#[tokio::test]
async fn test_empty_pass_keeps_existing_bookmark() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1", 1).await;

    Mock::given(method("GET"))
        .and(path("/suppliers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [],
            "links": {}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let state_path = dir.path().join("state.json");
    std::fs::write(
        &state_path,
        json!({"streams": {"suppliers": {"replication_value": "2024-02-01T00:00:00Z"}}})
            .to_string(),
    )
    .unwrap();
    let runner = runner_with_state_file(&config_for(&server), &state_path);

    let mut messages = Vec::new();
    let stats = runner
        .sync(Some("suppliers"), false, &mut messages)
        .await
        .unwrap();

    assert_eq!(stats.records_synced, 0);
    assert_eq!(states(&messages).len(), 1);

    let persisted = StateManager::from_file(&state_path).unwrap();
    assert_eq!(
        persisted.get_bookmark("suppliers").await.as_deref(),
        Some("2024-02-01T00:00:00Z")
    );
}

#[tokio::test]
async fn test_failed_page_leaves_bookmark_untouched() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1", 1).await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("page[offset]", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                product(1, "2024-08-01T00:00:00Z"),
                product(2, "2024-08-02T00:00:00Z")
            ],
            "links": {
                "next": format!("{}/products?page[limit]=2&page[offset]=2", server.uri())
            }
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("page[offset]", "2"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let state_path = dir.path().join("state.json");
    std::fs::write(
        &state_path,
        json!({"streams": {"products": {"replication_value": "2024-01-15T00:00:00Z"}}})
            .to_string(),
    )
    .unwrap();
    let runner = runner_with_state_file(&config_for(&server), &state_path);

    let mut messages = Vec::new();
    let err = runner
        .sync(Some("products"), false, &mut messages)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Fatal { status: 500, .. }));
    assert_eq!(records(&messages).len(), 2);
    assert!(states(&messages).is_empty());

    let persisted = StateManager::from_file(&state_path).unwrap();
    assert_eq!(
        persisted.get_bookmark("products").await.as_deref(),
        Some("2024-01-15T00:00:00Z")
    );
}

#[tokio::test]
async fn test_cached_config_token_skips_token_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/suppliers"))
        .and(header("Authorization", "Bearer cached"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config["access_token"] = json!("cached");
    config["token_expires_at"] = json!(chrono::Utc::now().timestamp() + 3600);
    let config = config.to_string();
    let runner = runner(&["--config-json", &config, "sync"]);

    runner
        .sync(Some("suppliers"), false, &mut Vec::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_refreshed_token_written_back_to_config_file() {
    let server = MockServer::start().await;
    mount_token(&server, "fresh", 1).await;

    Mock::given(method("GET"))
        .and(path("/suppliers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.json");
    std::fs::write(&config_path, config_for(&server).to_string()).unwrap();

    let runner = runner(&["--config", config_path.to_str().unwrap(), "sync"]);
    runner
        .sync(Some("suppliers"), false, &mut Vec::new())
        .await
        .unwrap();

    let saved: Value =
        serde_json::from_str(&std::fs::read_to_string(&config_path).unwrap()).unwrap();
    assert_eq!(saved["access_token"], "fresh");
    assert!(saved["token_expires_at"].as_i64().unwrap() > chrono::Utc::now().timestamp());
    assert_eq!(saved["client_id"], "cid");
}

#[tokio::test]
async fn test_rate_limit_is_fatal_by_default() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1", 1).await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server).to_string();
    let runner = runner(&["--config-json", &config, "sync"]);

    let err = runner
        .sync(Some("products"), false, &mut Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::RateLimited {
            retry_after_seconds: 30
        }
    ));
    assert_eq!(err.kind().exit_code(), 3);
}

#[tokio::test]
async fn test_continue_on_error_syncs_remaining_streams() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1", 1).await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/suppliers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": 5, "type": "suppliers", "attributes": {"updatedAt": "2024-02-01T00:00:00Z"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server).to_string();
    let runner = runner(&["--config-json", &config, "sync"]);

    let mut messages = Vec::new();
    let err = runner
        .sync(Some("products,suppliers"), true, &mut messages)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ClientError { status: 404, .. }));
    assert_eq!(records(&messages).len(), 1);
    assert_eq!(records(&messages)[0]["type"], "suppliers");
}

// ============================================================================
// Output Tests
// ============================================================================

#[tokio::test]
async fn test_sync_into_json_lines() {
    let server = MockServer::start().await;
    mount_token(&server, "tok-1", 1).await;

    Mock::given(method("GET"))
        .and(path("/suppliers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": 5, "type": "suppliers", "attributes": {"name": "Acme", "updatedAt": "2024-02-01T00:00:00Z"}}]
        })))
        .mount(&server)
        .await;

    let config = config_for(&server).to_string();
    let runner = runner(&["--config-json", &config, "sync"]);

    let mut writer = JsonLinesWriter::new(Vec::new());
    runner
        .sync(Some("suppliers"), false, &mut writer)
        .await
        .unwrap();
    let output = String::from_utf8(writer.into_inner().unwrap()).unwrap();

    let lines: Vec<Value> = output
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["type"], "RECORD");
    assert_eq!(lines[0]["stream"], "suppliers");
    assert_eq!(lines[0]["record"]["name"], "Acme");
    assert_eq!(lines[1]["type"], "STATE");
}
