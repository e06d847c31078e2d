use std::path::PathBuf;
use std::sync::Arc;

use axum_test::TestServer;
use roundtable_gui::config::AppConfig;
use roundtable_gui::routes::build_router;
use roundtable_gui::state::AppState;
use roundtable_core::{
    ChatResponse, NO_RESEARCH_FOUND, ResearchWorkflow, RoundtableConfig, ScriptedChatModel,
};
use serde_json::json;
use tokio::time::{Duration, sleep, timeout};

fn base_config() -> AppConfig {
    AppConfig {
        listen_addr: "127.0.0.1:0".into(),
        assets_dir: PathBuf::from("crates/roundtable-gui/web/dist"),
        gui_enabled: true,
        auth_token: None,
        core_config: None,
    }
}

fn scripted_workflow(responses: Vec<ChatResponse>) -> ResearchWorkflow {
    let log_dir = std::env::temp_dir().join("roundtable-gui-test-logs");
    unsafe { std::env::set_var("ROUNDTABLE_LOG_DIR", &log_dir) };

    let mut config = RoundtableConfig::default();
    config.conversation.max_rounds = 2;
    ResearchWorkflow::with_model(config, Arc::new(ScriptedChatModel::new(responses)))
}

fn one_round_responses() -> Vec<ChatResponse> {
    let pad = "supporting evidence ".repeat(10);
    vec![
        ChatResponse::text(format!("Findings at https://example.com/a. {pad}")),
        ChatResponse::text(format!("Synthesis of everything. {pad}")),
        ChatResponse::text(format!("Critique complete. {pad} TERMINATE")),
    ]
}

fn server_with(responses: Vec<ChatResponse>, config: AppConfig) -> TestServer {
    let state = AppState::with_workflow(&config, scripted_workflow(responses));
    TestServer::new(build_router(state)).unwrap()
}

#[tokio::test]
async fn readiness_requires_gui_flag() {
    let mut disabled = base_config();
    disabled.gui_enabled = false;
    let server = server_with(Vec::new(), disabled);

    let response = server.get("/health/ready").await;
    assert_eq!(response.status_code(), 503);

    let server = server_with(Vec::new(), base_config());
    let response = server.get("/health/ready").await;
    assert_eq!(response.status_code(), 200);
}

#[tokio::test]
async fn api_requires_bearer_token_when_configured() {
    let mut config = base_config();
    config.auth_token = Some("secret".into());
    let server = server_with(Vec::new(), config);

    // Missing token -> unauthorized
    let response = server.get("/api/research").await;
    assert_eq!(response.status_code(), 401);

    // Correct token -> ok (empty history)
    let response = server
        .get("/api/research")
        .add_header("authorization", "Bearer secret")
        .await;
    assert_eq!(response.status_code(), 200);
    let body = response.json::<serde_json::Value>();
    assert!(body["runs"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn rejects_empty_topics() {
    let server = server_with(Vec::new(), base_config());

    let response = server
        .post("/api/research")
        .json(&json!({ "topic": "   " }))
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn run_lifecycle_reaches_completed_and_exports_report() {
    let server = server_with(one_round_responses(), base_config());

    let response = server
        .post("/api/research")
        .json(&json!({ "topic": "solar microgrids", "instructions": "keep it brief" }))
        .await;
    assert_eq!(response.status_code(), 202);
    let body = response.json::<serde_json::Value>();
    let run_id = body["run_id"].as_str().expect("run id missing").to_string();

    let status_path = format!("/api/research/runs/{run_id}");
    let status = timeout(Duration::from_secs(5), async {
        loop {
            let response = server.get(&status_path).await;
            assert_eq!(response.status_code(), 200);
            let body = response.json::<serde_json::Value>();
            if body["state"] != "running" {
                break body;
            }
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("run did not finish in time");

    assert_eq!(status["state"], "completed");
    assert_eq!(status["topic"], "solar microgrids");

    let response = server.get("/api/research/-1/report").await;
    assert_eq!(response.status_code(), 200);
    let report = response.text();
    assert!(report.contains("**Topic**: solar microgrids"));
    assert!(report.contains("## Executive Summary"));

    let response = server.get("/api/research/-1/data").await;
    assert_eq!(response.status_code(), 200);
    let record = response.json::<serde_json::Value>();
    assert_eq!(record["topic"], "solar microgrids");
    assert!(record["messages"].as_array().is_some());

    let response = server.get("/api/research").await;
    let history = response.json::<serde_json::Value>();
    assert_eq!(history["runs"].as_array().unwrap().len(), 1);

    let response = server.get("/api/analytics").await;
    let analytics = response.json::<serde_json::Value>();
    assert_eq!(analytics["total_runs"], 1);
    assert_eq!(analytics["completed_runs"], 1);
}

#[tokio::test]
async fn failed_runs_surface_their_error() {
    // No scripted responses: the first research turn fails.
    let server = server_with(Vec::new(), base_config());

    let response = server
        .post("/api/research")
        .json(&json!({ "topic": "doomed" }))
        .await;
    assert_eq!(response.status_code(), 202);
    let run_id = response.json::<serde_json::Value>()["run_id"]
        .as_str()
        .unwrap()
        .to_string();

    let status_path = format!("/api/research/runs/{run_id}");
    let status = timeout(Duration::from_secs(5), async {
        loop {
            let body = server.get(&status_path).await.json::<serde_json::Value>();
            if body["state"] != "running" {
                break body;
            }
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("run did not finish in time");

    assert_eq!(status["state"], "failed");
    assert!(status["error"].as_str().unwrap().contains("research_agent"));
}

#[tokio::test]
async fn empty_store_report_returns_the_literal_placeholder() {
    let server = server_with(Vec::new(), base_config());

    let response = server.get("/api/research/-1/report").await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.text(), NO_RESEARCH_FOUND);

    let response = server.get("/api/research/-1/data").await;
    assert_eq!(response.status_code(), 404);
}

#[tokio::test]
async fn unknown_runs_return_not_found() {
    let server = server_with(Vec::new(), base_config());

    let response = server.get("/api/research/runs/nope").await;
    assert_eq!(response.status_code(), 404);

    let response = server.get("/api/research/runs/nope/stream").await;
    assert_eq!(response.status_code(), 404);
}
