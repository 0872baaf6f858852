//! Download statistics endpoints.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::HeaderMap;
use axum::response::Response;
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use super::json_response;
use crate::auth;
use crate::errors::ApiError;
use crate::validation::validate_key;
use crate::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct FileStatsResponse {
    pub success: bool,
    pub filename: String,
    pub downloads: u64,
    /// Present only when the counter store could not be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AllStatsResponse {
    pub success: bool,
    /// File key to download count, ordered by key.
    pub stats: BTreeMap<String, u64>,
    pub total_files: usize,
    pub total_downloads: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResetStatsResponse {
    pub success: bool,
    pub message: String,
    pub filename: String,
}

/// `GET /stats/{filename}` -- Download count for one file.
///
/// A counter store failure is reported in the payload with status 200.
#[utoipa::path(
    get,
    path = "/stats/{filename}",
    tag = "Stats",
    operation_id = "FileStats",
    params(("filename" = String, Path, description = "File key, may contain '/'")),
    responses(
        (status = 200, description = "Download count", body = FileStatsResponse),
        (status = 400, description = "Missing or malformed filename")
    )
)]
pub async fn file_stats(state: Arc<AppState>, filename: &str) -> Result<Response, ApiError> {
    validate_key(filename)?;

    let body = match state.counters.read(filename).await {
        Ok(downloads) => FileStatsResponse {
            success: true,
            filename: filename.to_string(),
            downloads,
            error: None,
        },
        Err(e) => {
            warn!(key = %filename, "Failed to read download counter: {e:#}");
            FileStatsResponse {
                success: false,
                filename: filename.to_string(),
                downloads: 0,
                error: Some(e.to_string()),
            }
        }
    };
    Ok(json_response(&body))
}

/// `GET /all-stats` -- Download counts for every counted file.
#[utoipa::path(
    get,
    path = "/all-stats",
    tag = "Stats",
    operation_id = "AllStats",
    responses(
        (status = 200, description = "All download counts", body = AllStatsResponse),
        (status = 500, description = "Counter store failure")
    )
)]
pub async fn all_stats(state: Arc<AppState>) -> Result<Response, ApiError> {
    let stats: BTreeMap<String, u64> = state.counters.list_all().await?.into_iter().collect();
    let total_downloads = stats.values().sum();

    let body = AllStatsResponse {
        success: true,
        total_files: stats.len(),
        total_downloads,
        stats,
    };
    Ok(json_response(&body))
}

/// `POST /reset-stats/{filename}` -- Delete a file's download counter.
#[utoipa::path(
    post,
    path = "/reset-stats/{filename}",
    tag = "Stats",
    operation_id = "ResetStats",
    params(("filename" = String, Path, description = "File key, may contain '/'")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Counter reset", body = ResetStatsResponse),
        (status = 400, description = "Missing or malformed filename"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 500, description = "Counter store failure")
    )
)]
pub async fn reset_stats(
    state: Arc<AppState>,
    filename: &str,
    headers: &HeaderMap,
) -> Result<Response, ApiError> {
    auth::require_token(headers, state.config.auth.token.as_deref())?;
    validate_key(filename)?;

    state.counters.reset(filename).await?;
    info!(key = %filename, "Download counter reset");

    let body = ResetStatsResponse {
        success: true,
        message: format!("Stats reset for {filename}"),
        filename: filename.to_string(),
    };
    Ok(json_response(&body))
}
