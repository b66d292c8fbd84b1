// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /predict tests
//!
//! Covers the three image sources, congestion labelling, error mapping and
//! cleanup of per-request staging directories.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    routing::get,
    Router,
};
use crowd_count_node::api::http_server::create_app;
use std::sync::Arc;
use tower::util::ServiceExt;

use crate::common::{
    body_json, json_request, png_base64, png_base64_wrapped, png_bytes, staging_entries,
    FailingDetector, Form, state_with_counts, state_with_detector, state_without_model,
    WidthDetector,
};

#[tokio::test]
async fn test_upload_counts_only_persons() {
    let root = tempfile::tempdir().unwrap();
    let app = create_app(state_with_counts(4, 7, root.path()));

    let png = png_bytes(32, 24);
    let response = app
        .oneshot(
            Form::new()
                .file("file", "beach.png", &png)
                .text("beachName", "Gyeongpo")
                .request("/predict"),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["personCount"], 4);
    assert_eq!(json["source"], "upload:beach.png");
    assert_eq!(json["beachName"], "Gyeongpo");
    assert_eq!(json["model"], "best.pt");
    assert!(json["congestion"].is_null());
    assert!((json["conf"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    assert!(json["timestamp"].as_str().unwrap().contains('T'));

    assert_eq!(staging_entries(root.path()), 0, "staging dir must be removed");
}

#[tokio::test]
async fn test_congestion_labels() {
    let cases = [(5, "low"), (6, "moderate"), (20, "crowded"), (31, "very crowded")];

    for (persons, expected) in cases {
        let root = tempfile::tempdir().unwrap();
        let app = create_app(state_with_counts(persons, 0, root.path()));
        let png = png_bytes(8, 8);

        let response = app
            .oneshot(
                Form::new()
                    .file("file", "a.png", &png)
                    .text("t1", "5")
                    .text("t2", "15")
                    .text("t3", "30")
                    .request("/predict"),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["personCount"], persons);
        assert_eq!(json["congestion"], expected, "count {}", persons);
    }
}

#[tokio::test]
async fn test_conf_override_is_reported() {
    let root = tempfile::tempdir().unwrap();
    let app = create_app(state_with_counts(2, 0, root.path()));
    let png = png_bytes(8, 8);

    let response = app
        .oneshot(
            Form::new()
                .text("conf", "0.55")
                .file("file", "a.png", &png)
                .request("/predict"),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!((json["conf"].as_f64().unwrap() - 0.55).abs() < 1e-6);
}

#[tokio::test]
async fn test_json_inline_image() {
    let root = tempfile::tempdir().unwrap();
    let app = create_app(state_with_counts(3, 2, root.path()));

    let response = app
        .oneshot(json_request(
            "/predict",
            serde_json::json!({
                "image": png_base64(16, 16),
                "beachName": "Sokcho",
                "t1": 1, "t2": 2, "t3": 10
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["source"], "inline:base64");
    assert_eq!(json["personCount"], 3);
    assert_eq!(json["congestion"], "crowded");
}

#[tokio::test]
async fn test_missing_input() {
    let root = tempfile::tempdir().unwrap();
    let state = state_with_counts(1, 0, root.path());

    let response = create_app(state.clone())
        .oneshot(Form::new().text("beachName", "x").request("/predict"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["errorType"], "missing_input");
    assert!(json["requestId"].as_str().is_some());

    let response = create_app(state.clone())
        .oneshot(json_request("/predict", serde_json::json!({"beachName": "x"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["errorType"], "missing_input");

    let empty = Request::builder()
        .method(Method::POST)
        .uri("/predict")
        .body(Body::empty())
        .unwrap();
    let response = create_app(state).oneshot(empty).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["errorType"], "missing_input");
}

#[tokio::test]
async fn test_two_sources_rejected() {
    let root = tempfile::tempdir().unwrap();
    let app = create_app(state_with_counts(1, 0, root.path()));
    let png = png_bytes(8, 8);

    let response = app
        .oneshot(
            Form::new()
                .file("file", "a.png", &png)
                .text("image_url", "http://example.com/a.jpg")
                .request("/predict"),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["errorType"], "invalid_request");
    assert_eq!(staging_entries(root.path()), 0);
}

#[tokio::test]
async fn test_invalid_threshold_field() {
    let root = tempfile::tempdir().unwrap();
    let app = create_app(state_with_counts(1, 0, root.path()));
    let png = png_bytes(8, 8);

    let response = app
        .oneshot(
            Form::new()
                .file("file", "a.png", &png)
                .text("t2", "lots")
                .request("/predict"),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["errorType"], "validation_error");
    assert_eq!(json["details"]["field"], "t2");
    assert_eq!(staging_entries(root.path()), 0);
}

#[tokio::test]
async fn test_non_image_upload_is_decode_failure() {
    let root = tempfile::tempdir().unwrap();
    let app = create_app(state_with_counts(1, 0, root.path()));

    let response = app
        .oneshot(
            Form::new()
                .file("file", "notes.txt", b"this is not an image")
                .request("/predict"),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["errorType"], "decode_failed");
    assert_eq!(staging_entries(root.path()), 0);
}

#[tokio::test]
async fn test_unreachable_url_is_client_error() {
    let root = tempfile::tempdir().unwrap();
    let app = create_app(state_with_counts(1, 0, root.path()));

    let response = app
        .oneshot(
            Form::new()
                .text("image_url", "http://127.0.0.1:1/x.jpg")
                .request("/predict"),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["errorType"], "source_fetch_failed");
    assert!(!json["error"].as_str().unwrap().is_empty());
    assert_eq!(staging_entries(root.path()), 0);
}

#[tokio::test]
async fn test_url_fetch_success() {
    let png = png_bytes(48, 8);
    let image_server = Router::new()
        .route(
            "/beach.png",
            get(move || {
                let png = png.clone();
                async move { ([(header::CONTENT_TYPE, "image/png")], png) }
            }),
        )
        .route(
            "/missing.png",
            get(|| async { StatusCode::NOT_FOUND }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, image_server).await.unwrap();
    });

    let root = tempfile::tempdir().unwrap();
    let state = state_with_detector(Arc::new(WidthDetector), root.path());

    let url = format!("http://{}/beach.png", addr);
    let response = create_app(state.clone())
        .oneshot(json_request("/predict", serde_json::json!({ "image_url": url })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["personCount"], 4);
    assert_eq!(json["source"], format!("url:{}", url));

    let missing = format!("http://{}/missing.png", addr);
    let response = create_app(state)
        .oneshot(json_request("/predict", serde_json::json!({ "image_url": missing })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["errorType"], "source_fetch_failed");

    assert_eq!(staging_entries(root.path()), 0);
}

#[tokio::test]
async fn test_model_unavailable() {
    let root = tempfile::tempdir().unwrap();
    let app = create_app(state_without_model(root.path()));
    let png = png_bytes(8, 8);

    let response = app
        .oneshot(Form::new().file("file", "a.png", &png).request("/predict"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["errorType"], "model_unavailable");
    assert_eq!(staging_entries(root.path()), 0);
}

#[tokio::test]
async fn test_inference_failure_cleans_up_staging() {
    let root = tempfile::tempdir().unwrap();
    let state = state_with_detector(Arc::new(FailingDetector("onnx run failed")), root.path());
    let png = png_bytes(8, 8);

    let response = create_app(state)
        .oneshot(Form::new().file("file", "a.png", &png).request("/predict"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["errorType"], "detection_failed");
    assert!(json["error"].as_str().unwrap().contains("onnx run failed"));
    assert_eq!(staging_entries(root.path()), 0);
}

#[tokio::test]
async fn test_json_line_wrapped_image() {
    let root = tempfile::tempdir().unwrap();
    let app = create_app(state_with_counts(3, 0, root.path()));

    let response = app
        .oneshot(json_request(
            "/predict",
            serde_json::json!({ "image": png_base64_wrapped(64, 64) }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["personCount"], 3);
}

#[tokio::test]
async fn test_invalid_json_body() {
    let root = tempfile::tempdir().unwrap();
    let app = create_app(state_with_counts(1, 0, root.path()));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["errorType"], "invalid_request");
}

#[tokio::test]
async fn test_concurrent_requests_keep_their_own_counts() {
    let root = tempfile::tempdir().unwrap();
    let state = state_with_detector(Arc::new(WidthDetector), root.path());

    let mut tasks = Vec::new();
    for persons in 1..=8u32 {
        let app = create_app(state.clone());
        tasks.push(tokio::spawn(async move {
            let png = png_bytes(persons * 10, 4);
            let filename = format!("frame-{}.png", persons);
            let response = app
                .oneshot(Form::new().file("file", &filename, &png).request("/predict"))
                .await
                .unwrap();
            (persons, filename, body_json(response).await)
        }));
    }

    for task in tasks {
        let (persons, filename, json) = task.await.unwrap();
        assert_eq!(json["personCount"], persons);
        assert_eq!(json["source"], format!("upload:{}", filename));
    }

    assert_eq!(staging_entries(root.path()), 0);
}
