//! Counter store self-test.

use std::sync::Arc;

use axum::response::Response;
use serde::Serialize;
use tracing::{debug, warn};
use utoipa::ToSchema;

use super::json_response;
use crate::errors::ApiError;
use crate::AppState;

/// Namespace for probe keys; never overlaps `download:`.
const PROBE_PREFIX: &str = "kv-selftest:";

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct KvSelftestResponse {
    /// True when the probe was written, read back intact and deleted.
    pub success: bool,
    pub key: String,
    pub written: bool,
    pub read_back: bool,
    pub deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `GET /debug/kv` -- Write, read back and delete a probe value.
///
/// Store failures are reported in the payload, never as a 5xx.
#[utoipa::path(
    get,
    path = "/debug/kv",
    tag = "Debug",
    operation_id = "KvSelftest",
    responses(
        (status = 200, description = "Self-test report", body = KvSelftestResponse),
        (status = 404, description = "Self-test disabled")
    )
)]
pub async fn kv_selftest(state: Arc<AppState>) -> Result<Response, ApiError> {
    if !state.config.debug.kv_selftest {
        return Err(ApiError::NoRoute);
    }

    let store = state.counters.store();
    let key = format!("{PROBE_PREFIX}{}", uuid::Uuid::new_v4());
    let value = chrono::Utc::now().to_rfc3339();
    let mut report = KvSelftestResponse {
        key: key.clone(),
        ..Default::default()
    };

    if let Err(e) = store.put(&key, &value).await {
        return Ok(failed(report, "write", e));
    }
    report.written = true;

    match store.get(&key).await {
        Ok(Some(read)) if read == value => report.read_back = true,
        Ok(Some(read)) => {
            report.error = Some(format!("read back {read:?}, expected {value:?}"));
        }
        Ok(None) => report.error = Some("probe key missing after write".to_string()),
        Err(e) => report.error = Some(format!("read failed: {e}")),
    }

    match store.delete(&key).await {
        Ok(()) => report.deleted = true,
        Err(e) => {
            warn!(key = %key, "Self-test probe not deleted: {e:#}");
            if report.error.is_none() {
                report.error = Some(format!("delete failed: {e}"));
            }
        }
    }

    report.success = report.written && report.read_back && report.deleted;
    debug!(key = %key, success = report.success, "Counter store self-test finished");
    Ok(json_response(&report))
}

fn failed(mut report: KvSelftestResponse, step: &str, err: anyhow::Error) -> Response {
    warn!(key = %report.key, "Self-test {step} failed: {err:#}");
    report.error = Some(format!("{step} failed: {err}"));
    json_response(&report)
}
