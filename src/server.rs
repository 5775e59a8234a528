//! HTTP ingress
//!
//! `POST /upload` takes a multipart collection of `files` parts and answers
//! with the flattened document as a download. `GET` requests serve the
//! public directory, falling back to a built-in upload form at `/`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{DefaultBodyLimit, Multipart, Path as AxumPath, State as AxumState};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use log::{debug, error, info, warn};

use crate::config::InlinerConfig;
use crate::error::InlineError;
use crate::pipeline::{FlattenedSite, process_upload};
use crate::preprocess::{PhpPreprocessor, Preprocessor};
use crate::workdir::UploadedFile;

/// Multipart field carrying the uploaded files
pub const UPLOAD_FIELD: &str = "files";

const UPLOAD_FORM: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Site inliner</title>
</head>
<body>
<h1>Flatten a site into one HTML file</h1>
<form action="/upload" method="post" enctype="multipart/form-data">
<input type="file" name="files" multiple webkitdirectory>
<button type="submit">Upload</button>
</form>
</body>
</html>
"#;

struct AppState {
    config: InlinerConfig,
    preprocessor: Arc<dyn Preprocessor>,
}

/// Build the application router
pub fn router(config: InlinerConfig, preprocessor: Arc<dyn Preprocessor>) -> Router {
    let body_limit = config.max_upload_bytes();
    let state = Arc::new(AppState {
        config,
        preprocessor,
    });
    Router::new()
        .route("/", get(route_index))
        .route("/upload", post(route_upload))
        .route("/{*path}", get(route_static))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Bind the configured address and serve until the process exits
pub async fn serve(config: InlinerConfig) -> Result<()> {
    tokio::fs::create_dir_all(config.upload_dir())
        .await
        .with_context(|| format!("failed to create {}", config.upload_dir().display()))?;

    let host = format!("{}:{}", config.bind_addr(), config.port());
    let preprocessor: Arc<dyn Preprocessor> = Arc::new(PhpPreprocessor::new(
        config.php_binary(),
        config.preprocess_timeout(),
    ));

    match serde_json::to_string(&config) {
        Ok(json) => debug!(target: "site_inliner::server", "Config: {json}"),
        Err(e) => warn!(target: "site_inliner::server", "Failed to serialize config: {e}"),
    }
    info!(target: "site_inliner::server", "Uploads: {}", config.upload_dir().display());
    info!(target: "site_inliner::server", "Public:  {}", config.public_dir().display());
    let app = router(config, preprocessor);

    let listener = tokio::net::TcpListener::bind(&host)
        .await
        .with_context(|| format!("failed to bind {host}"))?;
    info!(target: "site_inliner::server", "Listening on http://{host}");
    axum::serve(listener, app).await.context("server failed")?;
    Ok(())
}

async fn route_index(AxumState(state): AxumState<Arc<AppState>>) -> Response {
    let index = state.config.public_dir().join("index.html");
    if tokio::fs::metadata(&index).await.is_ok_and(|m| m.is_file()) {
        return serve_static(&index).await;
    }
    Html(UPLOAD_FORM).into_response()
}

async fn route_static(
    AxumPath(path): AxumPath<String>,
    AxumState(state): AxumState<Arc<AppState>>,
) -> Response {
    let Some(rel) = sanitize_rel_path(&path) else {
        return (StatusCode::NOT_FOUND, "not found").into_response();
    };
    let file = state.config.public_dir().join(rel);
    if tokio::fs::metadata(&file).await.is_ok_and(|m| m.is_file()) {
        return serve_static(&file).await;
    }
    (StatusCode::NOT_FOUND, "not found").into_response()
}

async fn route_upload(
    AxumState(state): AxumState<Arc<AppState>>,
    multipart: Multipart,
) -> Response {
    let upload_root = state.config.upload_dir().clone();
    if let Err(e) = tokio::fs::create_dir_all(&upload_root).await {
        return error_response(&InlineError::fs(&upload_root, e));
    }
    // Incoming parts are staged next to the working directories so the
    // normalizer can rename instead of copy
    let staging = match tempfile::Builder::new()
        .prefix(".incoming-")
        .tempdir_in(&upload_root)
    {
        Ok(dir) => dir,
        Err(e) => return error_response(&InlineError::fs(&upload_root, e)),
    };

    let uploads = match receive_files(multipart, staging.path()).await {
        Ok(uploads) => uploads,
        Err(response) => return response,
    };
    debug!(target: "site_inliner::server", "Received {} files", uploads.len());

    let worker_state = Arc::clone(&state);
    let result = tokio::task::spawn_blocking(move || {
        process_upload(
            &worker_state.config,
            &uploads,
            worker_state.preprocessor.as_ref(),
        )
    })
    .await;
    drop(staging);

    match result {
        Ok(Ok(site)) => download_response(site),
        Ok(Err(e)) => error_response(&e),
        Err(e) => {
            error!(target: "site_inliner::server", "Upload worker failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
        }
    }
}

/// Write every `files` part to `staging`, keeping the client's file names
async fn receive_files(
    mut multipart: Multipart,
    staging: &Path,
) -> std::result::Result<Vec<UploadedFile>, Response> {
    let mut uploads = Vec::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err((StatusCode::BAD_REQUEST, e.body_text()).into_response()),
        };
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let Some(original_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return Err((e.status(), e.body_text()).into_response()),
        };

        let temp_path = staging.join(uploads.len().to_string());
        if let Err(e) = tokio::fs::write(&temp_path, &bytes).await {
            return Err(error_response(&InlineError::fs(&temp_path, e)));
        }
        uploads.push(UploadedFile::new(original_name, temp_path));
    }
    Ok(uploads)
}

fn download_response(site: FlattenedSite) -> Response {
    let disposition = format!(
        "attachment; filename=\"{}\"",
        site.file_name.replace(['"', '\\'], "_")
    );
    let mut response = site.html.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    match HeaderValue::from_str(&disposition) {
        Ok(value) => {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
        Err(e) => warn!(target: "site_inliner::server", "Dropping Content-Disposition: {e}"),
    }
    response
}

fn error_response(err: &InlineError) -> Response {
    if err.is_user_error() {
        info!(target: "site_inliner::server", "Rejected upload: {err}");
        (StatusCode::BAD_REQUEST, err.to_string()).into_response()
    } else {
        error!(target: "site_inliner::server", "Upload failed: {err}");
        (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
    }
}

/// Relative path under the public directory, or `None` if it tries to escape
fn sanitize_rel_path(raw: &str) -> Option<PathBuf> {
    let mut rel = PathBuf::new();
    for part in raw.split('/') {
        match part {
            "" | "." => {}
            ".." => return None,
            p if p.contains('\\') || p.contains(':') => return None,
            p => rel.push(p),
        }
    }
    if rel.as_os_str().is_empty() {
        None
    } else {
        Some(rel)
    }
}

async fn serve_static(path: &Path) -> Response {
    let bytes = match tokio::fs::read(path).await {
        Ok(v) => v,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to read {}: {e}", path.display()),
            )
                .into_response();
        }
    };

    let content_type = match path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
    {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "application/javascript; charset=utf-8",
        "json" => "application/json; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        _ => "application/octet-stream",
    };

    let mut response = bytes.into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
