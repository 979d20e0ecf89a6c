//! Static hosting with deep-link support.
//!
//! Application routes all answer with `index.html` so a reload on
//! `/viewer/{catalog}/{collection}` works; legacy URL forms get a permanent
//! redirect to their canonical path before the app ever loads.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use catalog::{builtin_catalogs, parse_catalog_list, CatalogDescriptor, CatalogError};
use routing::{BasePath, RouteTable};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

const ASSET_CACHE: &str = "public, max-age=3600";
const NO_CACHE: &str = "no-cache";

/// Extensions served with [`ASSET_CACHE`].
const STATIC_EXTENSIONS: &[&str] = &[
    "js", "mjs", "css", "wasm", "map", "json", "png", "jpg", "jpeg", "gif", "webp", "svg", "ico",
    "woff", "woff2", "ttf",
];

#[derive(Clone)]
struct SpaState {
    root: Arc<PathBuf>,
    table: RouteTable,
}

pub fn router(root: PathBuf, base_path: &str) -> Router {
    let state = SpaState {
        root: Arc::new(root),
        table: RouteTable::new(BasePath::new(base_path)),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS]);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/catalogs", get(get_catalogs))
        .fallback(serve_path)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> Response {
    (StatusCode::OK, "ok").into_response()
}

/// `catalogs.json` from the static root when present and valid, the
/// built-in list otherwise.
async fn get_catalogs(State(state): State<SpaState>) -> Response {
    let path = state.root.join("catalogs.json");
    let catalogs = match tokio::fs::read_to_string(&path).await {
        Ok(text) => parse_catalog_list(&text).or_else(|err| {
            warn!("ignoring {path:?}: {err}");
            builtin_catalogs()
        }),
        Err(_) => builtin_catalogs(),
    };

    match catalogs.and_then(|list| encode_catalogs(&list)) {
        Ok(body) => {
            let mut headers = HeaderMap::new();
            headers.insert(
                http::header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            headers.insert(http::header::CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
            (StatusCode::OK, headers, Body::from(body)).into_response()
        }
        Err(err) => {
            error!("catalog list unavailable: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, "catalog list unavailable").into_response()
        }
    }
}

fn encode_catalogs(list: &[CatalogDescriptor]) -> Result<Vec<u8>, CatalogError> {
    serde_json::to_vec(list).map_err(|e| CatalogError::Corrupt(e.to_string()))
}

async fn serve_path(State(state): State<SpaState>, method: Method, uri: Uri) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return (StatusCode::METHOD_NOT_ALLOWED, "method not allowed").into_response();
    }
    let path = uri.path();

    if state.table.legacy_redirect(path).is_some() {
        if let Some(target) = state.table.resolve(path).redirect {
            let location = match uri.query() {
                Some(query) if !query.is_empty() => format!("{target}?{query}"),
                _ => target,
            };
            debug!(from = %uri, to = %location, "legacy path");
            return Redirect::permanent(&location).into_response();
        }
    }

    // `/viewer/app.js` also matches a route; asset names go to the disk.
    if state.table.is_app_path(path) && !is_asset_name(path) {
        return serve_index(&state).await;
    }

    let Some(file) = static_file_path(&state.root, state.table.base().strip(path)) else {
        return not_found();
    };
    let is_file = tokio::fs::metadata(&file)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if is_file {
        serve_file(&file).await
    } else if extension(Path::new(path)).is_some() {
        not_found()
    } else {
        serve_index(&state).await
    }
}

async fn serve_index(state: &SpaState) -> Response {
    serve_file(&state.root.join("index.html")).await
}

async fn serve_file(path: &Path) -> Response {
    match tokio::fs::read(path).await {
        Ok(data) => {
            let ext = extension(path);
            let mut headers = HeaderMap::new();
            headers.insert(
                http::header::CONTENT_TYPE,
                HeaderValue::from_static(content_type(ext.as_deref())),
            );
            headers.insert(
                http::header::CACHE_CONTROL,
                HeaderValue::from_static(cache_control(ext.as_deref())),
            );
            (StatusCode::OK, headers, Body::from(data)).into_response()
        }
        Err(err) => {
            warn!("file read failed: {path:?} -> {err}");
            not_found()
        }
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "not found").into_response()
}

/// Joins a request path below `root`; `None` for anything that would step
/// outside it.
fn static_file_path(root: &Path, rel: &str) -> Option<PathBuf> {
    let mut out = root.to_path_buf();
    for segment in rel.split('/').filter(|s| !s.is_empty()) {
        if segment == "." || segment == ".." || segment.contains('\\') {
            return None;
        }
        out.push(segment);
    }
    Some(out)
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn is_asset_name(path: &str) -> bool {
    extension(Path::new(path)).is_some_and(|ext| STATIC_EXTENSIONS.contains(&ext.as_str()))
}

fn cache_control(ext: Option<&str>) -> &'static str {
    match ext {
        Some(ext) if STATIC_EXTENSIONS.contains(&ext) => ASSET_CACHE,
        _ => NO_CACHE,
    }
}

fn content_type(ext: Option<&str>) -> &'static str {
    match ext {
        Some("html") => "text/html; charset=utf-8",
        Some("js" | "mjs") => "application/javascript",
        Some("css") => "text/css",
        Some("wasm") => "application/wasm",
        Some("json" | "map") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
