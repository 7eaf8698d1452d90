//! Integration tests for the jobs, status and history endpoints.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{body_json, get, post_json, put_json, spawn_app, MockExecutor, MOCK_ARTIFACT};
use serde_json::json;

// ---------------------------------------------------------------------------
// Test: POST /api/v1/jobs creates one pending job per input
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_returns_created_jobs() {
    let app = spawn_app(1, MockExecutor::new(Duration::from_millis(200))).await;

    let response = post_json(
        app.router.clone(),
        "/api/v1/jobs",
        json!({ "inputs": ["https://a.example/game", "https://b.example/game"] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    let jobs = json["data"].as_array().unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0]["input"], "https://a.example/game");
    assert!(jobs[0]["id"].is_string());
    assert!(jobs[0]["outputDir"]
        .as_str()
        .unwrap()
        .contains("a.example_game_"));
    assert_ne!(jobs[0]["outputDir"], jobs[1]["outputDir"]);
}

// ---------------------------------------------------------------------------
// Test: empty and blank batches are rejected without creating jobs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_batch_is_rejected() {
    let app = spawn_app(1, MockExecutor::new(Duration::ZERO)).await;

    let response = post_json(app.router.clone(), "/api/v1/jobs", json!({ "inputs": [] })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
    assert!(app.state.repo.is_empty().await);
}

#[tokio::test]
async fn blank_input_rejects_whole_batch() {
    let app = spawn_app(1, MockExecutor::new(Duration::ZERO)).await;

    let response = post_json(
        app.router.clone(),
        "/api/v1/jobs",
        json!({ "inputs": ["https://ok.example", "   "] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("index 1"));
    assert!(app.state.repo.is_empty().await);
}

// ---------------------------------------------------------------------------
// Test: GET /api/v1/jobs/{id}
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_job_by_id() {
    let app = spawn_app(1, MockExecutor::new(Duration::ZERO)).await;
    let jobs = app.submit(&["https://a.example"]).await;

    let response = get(app.router.clone(), &format!("/api/v1/jobs/{}", jobs[0].id)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["id"], jobs[0].id.to_string());
}

#[tokio::test]
async fn unknown_job_returns_404() {
    let app = spawn_app(1, MockExecutor::new(Duration::ZERO)).await;

    let response = get(
        app.router.clone(),
        &format!("/api/v1/jobs/{}", uuid::Uuid::new_v4()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn malformed_job_id_returns_400() {
    let app = spawn_app(1, MockExecutor::new(Duration::ZERO)).await;
    let response = get(app.router.clone(), "/api/v1/jobs/not-a-uuid").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Test: GET /api/v1/jobs?status=
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_filters_by_status() {
    let app = spawn_app(2, MockExecutor::new(Duration::ZERO)).await;
    app.submit(&["https://ok.example", "https://fail.example"]).await;
    app.wait_idle().await;

    let all = body_json(get(app.router.clone(), "/api/v1/jobs").await).await;
    assert_eq!(all["data"].as_array().unwrap().len(), 2);

    let failed = body_json(get(app.router.clone(), "/api/v1/jobs?status=failed").await).await;
    let failed = failed["data"].as_array().unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["input"], "https://fail.example");
    assert!(failed[0]["error"].as_str().unwrap().contains("could not play"));
}

#[tokio::test]
async fn list_rejects_unknown_status() {
    let app = spawn_app(1, MockExecutor::new(Duration::ZERO)).await;
    let response = get(app.router.clone(), "/api/v1/jobs?status=paused").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Test: status and concurrency endpoints
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_reports_counts_and_limit() {
    let app = spawn_app(3, MockExecutor::new(Duration::ZERO)).await;
    app.submit(&["https://a.example", "https://fail.example"]).await;
    app.wait_idle().await;

    let json = body_json(get(app.router.clone(), "/api/v1/status").await).await;
    let data = &json["data"];
    assert_eq!(data["pending"], 0);
    assert_eq!(data["running"], 0);
    assert_eq!(data["completed"], 1);
    assert_eq!(data["failed"], 1);
    assert_eq!(data["total"], 2);
    assert_eq!(data["limit"], 3);
    assert_eq!(data["availableSlots"], 3);
}

#[tokio::test]
async fn concurrency_limit_can_be_changed() {
    let app = spawn_app(2, MockExecutor::new(Duration::ZERO)).await;

    let response = put_json(
        app.router.clone(),
        "/api/v1/status/concurrency",
        json!({ "limit": 5 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["limit"], 5);
    assert_eq!(app.state.gate.limit(), 5);
}

#[tokio::test]
async fn zero_concurrency_limit_is_rejected() {
    let app = spawn_app(2, MockExecutor::new(Duration::ZERO)).await;

    let response = put_json(
        app.router.clone(),
        "/api/v1/status/concurrency",
        json!({ "limit": 0 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.state.gate.limit(), 2);
}

// ---------------------------------------------------------------------------
// Test: GET /api/v1/history returns persisted records
// ---------------------------------------------------------------------------

#[tokio::test]
async fn history_lists_persisted_records() {
    let app = spawn_app(2, MockExecutor::new(Duration::ZERO)).await;
    let jobs = app.submit(&["https://a.example", "https://fail.example"]).await;
    app.wait_idle().await;

    // Records are written after the status flips; give the runners a moment.
    let results = app.state.results.clone();
    common::wait_until(Duration::from_secs(5), || {
        let results = results.clone();
        async move { results.list_completed().await.unwrap().len() == 2 }
    })
    .await;

    let json = body_json(get(app.router.clone(), "/api/v1/history").await).await;
    let records = json["data"].as_array().unwrap();
    assert_eq!(records.len(), 2);

    let ok = records
        .iter()
        .find(|r| r["jobId"] == jobs[0].id.to_string())
        .unwrap();
    assert_eq!(ok["status"], "completed");
    assert_eq!(ok["summary"], json!({ "input": "https://a.example" }));
    assert_eq!(ok["artifacts"], json!([MOCK_ARTIFACT]));

    let failed = records
        .iter()
        .find(|r| r["jobId"] == jobs[1].id.to_string())
        .unwrap();
    assert_eq!(failed["status"], "failed");
    assert!(failed["error"].is_string());
}
