//! HTTP Server & Routing Integration Tests
//!
//! Router-level tests through `tower::ServiceExt::oneshot` with canned
//! capabilities and an in-memory account database.

mod helpers;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use helpers::{fragment, jpeg_page};
use http_body_util::BodyExt;
use scorewave_sr::capability::canned::silent_wav;
use scorewave_sr::capability::{CannedRecognizer, CannedSynthesizer};
use scorewave_sr::pipeline::{PipelineConfig, PipelineOrchestrator};
use scorewave_sr::services::{FsAudioLibrary, SqliteAccountStore};
use scorewave_sr::{build_router, AppState};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "scorewave-test-boundary";

struct TestApp {
    router: Router,
    _root: TempDir,
}

async fn test_app_with(recognizer: CannedRecognizer, max_upload_bytes: usize) -> TestApp {
    let root = tempfile::tempdir().unwrap();

    // One connection: every connection to :memory: is a separate database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    scorewave_sr::db::init_tables(&pool).await.unwrap();

    let orchestrator = PipelineOrchestrator::new(
        PipelineConfig {
            scratch_dir: Some(root.path().join("scratch")),
            sound_bank: PathBuf::from("test-bank.sf2"),
            ..PipelineConfig::default()
        },
        Arc::new(recognizer),
        Arc::new(CannedSynthesizer::default()),
    );

    let state = AppState::new(
        orchestrator,
        Arc::new(SqliteAccountStore::new(pool)),
        Arc::new(FsAudioLibrary::new(root.path().join("library"))),
    )
    .with_max_upload_bytes(max_upload_bytes);

    TestApp {
        router: build_router(state),
        _root: root,
    }
}

async fn test_app() -> TestApp {
    test_app_with(
        CannedRecognizer::one_per_page(vec![fragment("One", 'C'), fragment("Two", 'D')]),
        1024 * 1024,
    )
    .await
}

/// Multipart body from `(field, filename, content)` parts
fn multipart_body(parts: &[(&str, &str, Vec<u8>)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, filename, content) in parts {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_request(method: &str, uri: &str, parts: &[(&str, &str, Vec<u8>)]) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, headers, body)
}

async fn send_json(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let (status, _, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health_check() {
    let app = test_app().await;

    let (status, body) = send_json(&app, empty_request("GET", "/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "scorewave-sr");
    assert!(body["uptime_seconds"].is_u64());
    assert!(body.get("last_error").is_none());
}

#[tokio::test]
async fn test_process_music_returns_waveform() {
    let app = test_app().await;
    let request = multipart_request(
        "POST",
        "/process_music",
        &[
            ("files", "first.jpg", jpeg_page(300)),
            ("files", "second.jpg", jpeg_page(600)),
        ],
    );

    let (status, headers, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "audio/wav");
    assert_eq!(headers["x-skipped-fragments"], "0");
    assert_eq!(headers["x-score-digest"].len(), 64);
    assert!(headers.contains_key("x-run-id"));
    assert_eq!(body, silent_wav(8000, 800));
}

#[tokio::test]
async fn test_process_music_low_resolution_is_bad_request() {
    let app = test_app().await;
    let request = multipart_request(
        "POST",
        "/process_music",
        &[
            ("files", "first.jpg", jpeg_page(300)),
            ("files", "blurry.jpg", jpeg_page(150)),
        ],
    );

    let (status, body) = send_json(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "RESOLUTION_TOO_LOW");
    let rejection = &body["error"]["details"]["rejections"][0];
    assert_eq!(rejection["dpi"], 150);
    assert_eq!(rejection["filename"], "blurry.jpg");

    // The failure is visible on /health
    let (_, health) = send_json(&app, empty_request("GET", "/health")).await;
    assert!(health["last_error"].as_str().unwrap().contains("150"));
}

#[tokio::test]
async fn test_process_music_without_pages() {
    let app = test_app().await;

    let (status, body) = send_json(&app, multipart_request("POST", "/process_music", &[])).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "EMPTY_REQUEST");
}

#[tokio::test]
async fn test_process_music_incomplete_recognition() {
    let app = test_app_with(
        CannedRecognizer::one_per_page(vec![fragment("Only", 'C')]),
        1024 * 1024,
    )
    .await;
    let request = multipart_request(
        "POST",
        "/process_music",
        &[
            ("files", "a.jpg", jpeg_page(300)),
            ("files", "b.jpg", jpeg_page(300)),
        ],
    );

    let (status, body) = send_json(&app, request).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "INCOMPLETE_RECOGNITION");
    assert_eq!(body["error"]["details"]["expected"], 2);
    assert_eq!(body["error"]["details"]["found"], 1);
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let app = test_app_with(CannedRecognizer::default(), 1024).await;
    let request = multipart_request(
        "POST",
        "/process_music",
        &[("files", "huge.jpg", vec![0u8; 8 * 1024])],
    );

    let (status, body) = send_json(&app, request).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn test_account_lifecycle() {
    let app = test_app().await;
    let credentials = json!({"username": "clara", "hashed_password": "5f4dcc3b"});

    let (status, body) = send_json(&app, empty_request("POST", "/check_username?username=clara")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["validity"], true);

    let (status, created) = send_json(&app, json_request("/sign_up", credentials.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["username"], "clara");

    let (status, body) = send_json(&app, json_request("/sign_up", credentials.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let (_, body) = send_json(&app, empty_request("POST", "/check_username?username=clara")).await;
    assert_eq!(body["validity"], false);

    let (status, login) = send_json(&app, json_request("/login", credentials)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login["success"], true);
    assert_eq!(login["user_id"], created["user_id"]);
    assert_eq!(login["username"], "clara");

    let (status, login) = send_json(
        &app,
        json_request("/login", json!({"username": "clara", "hashed_password": "wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login, json!({"success": false, "user_id": null, "username": null}));
}

#[tokio::test]
async fn test_library_lifecycle() {
    let app = test_app().await;

    let (status, body) = send_json(
        &app,
        multipart_request(
            "POST",
            "/7/upload_audio?filename=nocturne",
            &[("file_", "nocturne.wav", b"RIFF-nocturne".to_vec())],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "File nocturne.wav uploaded successfully.");

    send(
        &app,
        multipart_request(
            "POST",
            "/7/upload_audio?filename=etude",
            &[("file_", "etude.wav", b"RIFF-etude".to_vec())],
        ),
    )
    .await;

    let (status, listing) = send_json(&app, empty_request("GET", "/7/my_music")).await;
    assert_eq!(status, StatusCode::OK);
    let entries = listing.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0][0], "etude");
    assert_eq!(
        STANDARD.decode(entries[0][1].as_str().unwrap()).unwrap(),
        b"RIFF-etude"
    );
    assert_eq!(entries[1][0], "nocturne");

    let (status, _, _) = send(&app, empty_request("PUT", "/7/my_music/delete?filename=etude")).await;
    assert_eq!(status, StatusCode::OK);

    let (_, listing) = send_json(&app, empty_request("GET", "/7/my_music")).await;
    assert_eq!(listing.as_array().unwrap().len(), 1);

    // Other accounts see nothing
    let (_, listing) = send_json(&app, empty_request("GET", "/8/my_music")).await;
    assert_eq!(listing, json!([]));
}

#[tokio::test]
async fn test_delete_missing_audio_is_not_found() {
    let app = test_app().await;

    let (status, body) =
        send_json(&app, empty_request("PUT", "/7/my_music/delete?filename=ghost")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_upload_without_file_part() {
    let app = test_app().await;

    let (status, body) = send_json(
        &app,
        multipart_request(
            "POST",
            "/7/upload_audio?filename=nothing",
            &[("other", "x.wav", b"RIFF".to_vec())],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}
