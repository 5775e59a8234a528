//! HTTP ingress tests against a router bound to an ephemeral port

use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use reqwest::{StatusCode, header};
use site_inliner::{InlinerConfig, Preprocessor, server};
use tempfile::TempDir;

mod common;
use common::{FakePhp, create_test_html, leftover_entries, test_config};

/// Serve `config` on 127.0.0.1:0 and return the base URL
async fn spawn_app(config: InlinerConfig, preprocessor: Arc<dyn Preprocessor>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = server::router(config, preprocessor);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn file_part(name: &str, bytes: &[u8]) -> Part {
    Part::bytes(bytes.to_vec()).file_name(name.to_string())
}

#[tokio::test]
async fn test_upload_returns_flattened_download() {
    let root = TempDir::new().unwrap();
    let config = test_config(root.path());
    let upload_dir = config.upload_dir().clone();
    let base = spawn_app(config, Arc::new(FakePhp::printing(""))).await;

    let html = create_test_html(
        r#"<link rel="stylesheet" href="css/style.css">"#,
        r#"<img src="img/pic.png">"#,
    );
    let form = Form::new()
        .part("files", file_part("index.html", html.as_bytes()))
        .part("files", file_part("style.css", b"h1{background:url(../img/logo.png)}"))
        .part("files", file_part("logo.png", b"logo"))
        .part("files", file_part("pic.png", b"pic"));

    let response = reqwest::Client::new()
        .post(format!("{base}/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/html; charset=utf-8"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"index.html\""
    );
    let body = response.text().await.unwrap();
    assert_eq!(body.matches("data:image/jpg;base64,").count(), 2);
    assert!(body.contains("<style>"));

    // Working and staging directories are both cleaned up
    assert!(leftover_entries(&upload_dir).is_empty());
}

#[tokio::test]
async fn test_upload_without_entry_is_bad_request() {
    let root = TempDir::new().unwrap();
    let base = spawn_app(test_config(root.path()), Arc::new(FakePhp::printing(""))).await;

    let form = Form::new().part("files", file_part("style.css", b"p{}"));
    let response = reqwest::Client::new()
        .post(format!("{base}/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response.text().await.unwrap();
    assert!(body.contains("index.html"));
}

#[tokio::test]
async fn test_preprocessing_failure_is_server_error() {
    let root = TempDir::new().unwrap();
    let base = spawn_app(test_config(root.path()), Arc::new(FakePhp::printing(""))).await;

    let form = Form::new().part("files", file_part("index.php", b"<?php exit(1);"));
    let response = reqwest::Client::new()
        .post(format!("{base}/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_index_serves_builtin_form() {
    let root = TempDir::new().unwrap();
    let base = spawn_app(test_config(root.path()), Arc::new(FakePhp::printing(""))).await;

    let response = reqwest::get(format!("{base}/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await.unwrap();
    assert!(body.contains("action=\"/upload\""));
    assert!(body.contains("name=\"files\""));
}

#[tokio::test]
async fn test_public_directory_is_served() {
    let root = TempDir::new().unwrap();
    let public = root.path().join("public");
    std::fs::create_dir_all(public.join("css")).unwrap();
    std::fs::write(public.join("index.html"), "<h1>custom</h1>").unwrap();
    std::fs::write(public.join("css/site.css"), "h1{}").unwrap();
    let base = spawn_app(test_config(root.path()), Arc::new(FakePhp::printing(""))).await;

    let index = reqwest::get(format!("{base}/")).await.unwrap();
    assert_eq!(index.text().await.unwrap(), "<h1>custom</h1>");

    let css = reqwest::get(format!("{base}/css/site.css")).await.unwrap();
    assert_eq!(css.status(), StatusCode::OK);
    assert_eq!(css.headers()[header::CONTENT_TYPE], "text/css; charset=utf-8");

    let missing = reqwest::get(format!("{base}/nope.txt")).await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
