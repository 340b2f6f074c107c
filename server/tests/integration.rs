//! Integration tests for the REST layer

mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

use common::*;

#[tokio::test]
async fn test_health_check() {
    let (app, _guard) = create_test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn test_list_voices_empty_library() {
    let (app, _guard) = create_test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/voices")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let voices: Vec<String> = serde_json::from_slice(&body).unwrap();
    assert!(voices.is_empty());
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _guard) = create_test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let metrics: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(metrics.get("request_count").is_some());
    assert!(metrics.get("memory_used_mb").is_some());
}

async fn post_mix(app: axum::Router, request_json: &str, files: &[(&str, &[u8])]) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/mix")
                .header("content-type", multipart_content_type())
                .body(Body::from(multipart_body(request_json, files)))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    (status, value)
}

#[tokio::test]
async fn test_mix_server_files_and_silence() {
    let (app, outputs) = create_test_app();
    write_fixture(outputs.path(), "a.wav", 500.0);
    write_fixture(outputs.path(), "b.wav", 700.0);

    let request = json!({
        "segments": ["a.wav", "(500ms)", "b.wav"]
    })
    .to_string();

    let (status, body) = post_mix(app, &request, &[]).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(body["file_count"], 2);
    assert_eq!(body["silence_segments"], 1);
    assert_eq!(body["natural_pauses"], 0);
    let total = body["total_duration_seconds"].as_f64().unwrap();
    assert!((total - 1.7).abs() < 0.02, "total {total}");

    // The reported output exists under the outputs root
    let name = body["outputs"][0].as_str().unwrap();
    assert!(outputs.path().join(name).is_file());
    let sidecar = body["sidecar"].as_str().unwrap();
    assert!(outputs.path().join(sidecar).is_file());
}

#[tokio::test]
async fn test_mix_with_upload() {
    let (app, outputs) = create_test_app();
    write_fixture(outputs.path(), "up.wav", 400.0);
    let upload_bytes = std::fs::read(outputs.path().join("up.wav")).unwrap();

    let request = json!({
        "segments": ["upload:0", "(500ms)", "upload:0"]
    })
    .to_string();

    let (status, body) = post_mix(app, &request, &[("up.wav", &upload_bytes)]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["file_count"], 2);
    let total = body["total_duration_seconds"].as_f64().unwrap();
    assert!((total - 1.3).abs() < 0.02, "total {total}");
}

#[tokio::test]
async fn test_mix_rejects_out_of_range_silence() {
    let (app, outputs) = create_test_app();
    write_fixture(outputs.path(), "a.wav", 300.0);

    let request = json!({
        "segments": ["a.wav", "(11s)"]
    })
    .to_string();

    let (status, body) = post_mix(app, &request, &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("out of range"));
}

#[tokio::test]
async fn test_mix_rejects_silence_only_list() {
    let (app, _guard) = create_test_app();

    let request = json!({
        "segments": ["(1s)", "(500ms)"]
    })
    .to_string();

    let (status, _) = post_mix(app, &request, &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_mix_missing_server_file_is_404() {
    let (app, _guard) = create_test_app();

    let request = json!({
        "segments": ["nope.wav"]
    })
    .to_string();

    let (status, body) = post_mix(app, &request, &[]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nope.wav"));
}

#[tokio::test]
async fn test_mix_rejects_unknown_format() {
    let (app, outputs) = create_test_app();
    write_fixture(outputs.path(), "a.wav", 300.0);

    let request = json!({
        "segments": ["a.wav"],
        "formats": ["ogg"]
    })
    .to_string();

    let (status, _) = post_mix(app, &request, &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_mix_missing_request_part() {
    let (app, _guard) = create_test_app();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/mix")
                .header("content-type", multipart_content_type())
                .body(Body::from(multipart_body_without_request()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

fn multipart_body_without_request() -> Vec<u8> {
    format!("--{BOUNDARY}--\r\n").into_bytes()
}

#[tokio::test]
async fn test_tts_without_engine_is_503() {
    let (app, _guard) = create_test_app();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/tts")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({ "text": "hello there" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_api_prefix_routes() {
    let (app, _guard) = create_test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
