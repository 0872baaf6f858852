//! Axum router construction and route mapping.
//!
//! The [`app`] function wires every endpoint to its handler and returns a
//! ready-to-serve [`axum::Router`].
//!
//! File keys may contain `/`, so file routes use a wildcard segment.  The
//! `Path` extractor percent-decodes the key before it reaches a handler.
//! Method mismatches answer 404 like unknown paths, and `OPTIONS` on any
//! path is answered by the CORS middleware before routing.  `get()` also
//! answers `HEAD`, so the download routes opt out of it explicitly: a `HEAD`
//! must not count as a download.

use axum::{
    extract::{
        multipart::MultipartRejection, rejection::PathRejection, DefaultBodyLimit, Multipart,
        Path, State,
    },
    http::{HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::errors::{generate_request_id, ApiError};
use crate::handlers::{debug, docs, files, stats};
use crate::metrics::{metrics_handler, metrics_middleware};
use crate::AppState;

// -- OpenAPI document ---------------------------------------------------------

/// OpenAPI documentation for the filegate API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "filegate API",
        version = "0.1.0",
        description = "Download gateway with per-file download counters"
    ),
    paths(
        health_check,
        docs::index,
        files::generate_link,
        files::download_file,
        files::upload_file,
        files::list_files,
        stats::file_stats,
        stats::all_stats,
        stats::reset_stats,
        debug::kv_selftest,
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Docs", description = "Documentation"),
        (name = "Files", description = "Download links, downloads, uploads and listings"),
        (name = "Stats", description = "Download statistics"),
        (name = "Debug", description = "Diagnostics"),
    )
)]
struct ApiDoc;

/// Registers the `bearer` security scheme referenced by protected paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

/// Build the axum [`Router`] with all routes.
///
/// The returned router is ready to be passed to `axum::serve`.
pub fn app(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/", get(docs::index).fallback(no_route))
        .route("/health", get(health_check).fallback(no_route))
        .route("/openapi.json", get(openapi_json).fallback(no_route))
        // File routes. The bare `/prefix/` forms carry an empty key, which
        // the handlers reject with 400.
        .route("/generate/", get(handle_generate_empty).fallback(no_route))
        .route("/generate/*filename", get(handle_generate).fallback(no_route))
        .route(
            "/download/",
            get(handle_download_empty).head(no_route).fallback(no_route),
        )
        .route(
            "/download/*filename",
            get(handle_download).head(no_route).fallback(no_route),
        )
        .route("/upload", post(handle_upload).fallback(no_route))
        .route("/files", get(handle_list_files).fallback(no_route))
        .route("/stats/", get(handle_file_stats_empty).fallback(no_route))
        .route("/stats/*filename", get(handle_file_stats).fallback(no_route))
        .route("/all-stats", get(handle_all_stats).fallback(no_route))
        .route(
            "/reset-stats/",
            post(handle_reset_stats_empty).fallback(no_route),
        )
        .route(
            "/reset-stats/*filename",
            post(handle_reset_stats).fallback(no_route),
        )
        .route("/debug/kv", get(handle_kv_selftest).fallback(no_route));

    if state.config.observability.metrics {
        router = router.route("/metrics", get(metrics_handler).fallback(no_route));
    }

    router
        .fallback(no_route)
        .with_state(state.clone())
        // Layer ordering: inner layers run first, outer layers wrap them.
        .layer(DefaultBodyLimit::max(state.config.server.max_upload_size))
        // cors_middleware answers OPTIONS before routing.
        .layer(middleware::from_fn(cors_middleware))
        // common_headers_middleware also covers preflight responses.
        .layer(middleware::from_fn(common_headers_middleware))
        .layer(TraceLayer::new_for_http())
        // metrics_middleware is outer (captures full request lifecycle).
        .layer(middleware::from_fn(metrics_middleware))
}

// -- Middleware ----------------------------------------------------------------

/// Methods advertised on ordinary responses.
const CORS_METHODS: &str = "GET, HEAD, OPTIONS";

/// Methods advertised on preflight responses.
const CORS_PREFLIGHT_METHODS: &str = "GET, HEAD, POST, PUT, DELETE, OPTIONS";

const CORS_HEADERS: &str = "Authorization, Content-Type, X-Debug";

/// Permissive CORS on every response.  `OPTIONS` on any path gets an empty
/// 200 without reaching a handler.
async fn cors_middleware(req: Request<axum::body::Body>, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        let mut response = StatusCode::OK.into_response();
        let headers = response.headers_mut();
        headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
        headers.insert(
            "access-control-allow-methods",
            HeaderValue::from_static(CORS_PREFLIGHT_METHODS),
        );
        headers.insert(
            "access-control-allow-headers",
            HeaderValue::from_static(CORS_HEADERS),
        );
        headers.insert("access-control-max-age", HeaderValue::from_static("86400"));
        return response;
    }

    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static(CORS_METHODS),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static(CORS_HEADERS),
    );
    response
}

/// Adds `x-request-id` (16 hex chars) and `server` to every response.
async fn common_headers_middleware(req: Request<axum::body::Body>, next: Next) -> Response {
    let request_id = generate_request_id();
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    if !headers.contains_key("x-request-id") {
        if let Ok(v) = HeaderValue::from_str(&request_id) {
            headers.insert("x-request-id", v);
        }
    }
    headers.insert("server", HeaderValue::from_static("filegate"));

    response
}

// -- Built-in endpoints --------------------------------------------------------

/// `GET /health` -- Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    operation_id = "HealthCheck",
    responses(
        (status = 200, description = "Health check OK")
    )
)]
async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "application/json")],
        r#"{"status":"ok"}"#,
    )
}

/// `GET /openapi.json` -- Generated OpenAPI document.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Unknown path or unsupported method.
async fn no_route() -> ApiError {
    ApiError::NoRoute
}

// -- Route wrappers ------------------------------------------------------------

/// Unwrap the wildcard key, turning a malformed path (e.g. invalid UTF-8
/// after decoding) into a JSON 400.
fn file_key(path: Result<Path<String>, PathRejection>) -> Result<String, ApiError> {
    path.map(|Path(filename)| filename)
        .map_err(|rejection| ApiError::BadRequest {
            message: rejection.body_text(),
        })
}

/// `GET /generate/*filename`
async fn handle_generate(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let filename = file_key(path)?;
    files::generate_link(state, &filename, &headers).await
}

/// `GET /generate/`
async fn handle_generate_empty(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    files::generate_link(state, "", &headers).await
}

/// `GET /download/*filename`
async fn handle_download(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let filename = file_key(path)?;
    files::download_file(state, &filename, &headers).await
}

/// `GET /download/`
async fn handle_download_empty(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    files::download_file(state, "", &headers).await
}

/// `POST /upload`
async fn handle_upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    files::upload_file(state, &headers, multipart).await
}

/// `GET /files`
async fn handle_list_files(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    files::list_files(state).await
}

/// `GET /stats/*filename`
async fn handle_file_stats(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Response, ApiError> {
    let filename = file_key(path)?;
    stats::file_stats(state, &filename).await
}

/// `GET /stats/`
async fn handle_file_stats_empty(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    stats::file_stats(state, "").await
}

/// `GET /all-stats`
async fn handle_all_stats(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    stats::all_stats(state).await
}

/// `POST /reset-stats/*filename`
async fn handle_reset_stats(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let filename = file_key(path)?;
    stats::reset_stats(state, &filename, &headers).await
}

/// `POST /reset-stats/`
async fn handle_reset_stats_empty(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    stats::reset_stats(state, "", &headers).await
}

/// `GET /debug/kv`
async fn handle_kv_selftest(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    debug::kv_selftest(state).await
}

// -- Tests --------------------------------------------------------------------
