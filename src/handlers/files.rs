//! File endpoints: link generation, download, upload, listing.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::Multipart;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use metrics::counter;
use percent_encoding::utf8_percent_encode;
use serde::Serialize;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};
use utoipa::ToSchema;

use super::{add_debug_headers, download_url, json_response, PATH_SEGMENT};
use crate::auth;
use crate::errors::ApiError;
use crate::metrics::{BYTES_SENT_TOTAL, DOWNLOADS_SERVED_TOTAL, UPLOADS_TOTAL};
use crate::storage::backend::ObjectBody;
use crate::validation::{content_type_for, validate_filename};
use crate::AppState;

/// Cache policy for file bodies. Keys are immutable once served.
const DOWNLOAD_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

// -- Response bodies ----------------------------------------------------------

/// Download link descriptor. The expiry is advisory and never enforced.
#[derive(Debug, Serialize, ToSchema)]
pub struct GenerateLinkResponse {
    pub success: bool,
    pub url: String,
    pub filename: String,
    /// RFC 3339 timestamp.
    pub expires_at: String,
    /// Seconds until `expires_at`.
    pub expires_in: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub success: bool,
    pub filename: String,
    pub url: String,
    pub size: u64,
    /// Hex SHA-256 of the stored content.
    pub etag: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FileEntry {
    pub filename: String,
    pub size: u64,
    /// RFC 3339 upload timestamp.
    pub uploaded: String,
    pub downloads: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FileListResponse {
    pub success: bool,
    pub files: Vec<FileEntry>,
    pub total_files: usize,
    pub total_downloads: u64,
}

// -- Helpers ------------------------------------------------------------------

/// `attachment` disposition naming `filename`.
///
/// Non-ASCII names get an ASCII fallback plus an RFC 5987 `filename*`.
fn content_disposition(filename: &str) -> HeaderValue {
    let printable = |c: char| c.is_ascii() && !c.is_ascii_control();
    let escape = |s: &str| s.replace('\\', "\\\\").replace('"', "\\\"");

    let value = if filename.chars().all(printable) {
        format!("attachment; filename=\"{}\"", escape(filename))
    } else {
        let fallback: String = filename
            .chars()
            .map(|c| if printable(c) { c } else { '_' })
            .collect();
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            escape(&fallback),
            utf8_percent_encode(filename, PATH_SEGMENT)
        )
    };

    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// Map a multipart parse failure to an API error.
fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::BadRequest {
            message: format!("Failed to parse multipart data: {}", err.body_text()),
        }
    }
}

// -- Handlers -----------------------------------------------------------------

/// `GET /generate/{filename}` -- Build a download link descriptor.
#[utoipa::path(
    get,
    path = "/generate/{filename}",
    tag = "Files",
    operation_id = "GenerateLink",
    params(("filename" = String, Path, description = "File key, may contain '/'")),
    security((), ("bearer" = [])),
    responses(
        (status = 200, description = "Link descriptor", body = GenerateLinkResponse),
        (status = 400, description = "Missing filename or disallowed extension"),
        (status = 401, description = "Token configured and not presented")
    )
)]
pub async fn generate_link(
    state: Arc<AppState>,
    filename: &str,
    headers: &HeaderMap,
) -> Result<Response, ApiError> {
    auth::check_optional_token(headers, state.config.auth.token.as_deref())?;
    validate_filename(filename, &state.config.files.allowed_extensions)?;

    let expires_in = state.config.files.link_expiry_seconds;
    let expires_at = chrono::TimeDelta::try_seconds(expires_in)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| anyhow::anyhow!("link expiry of {expires_in}s is out of range"))?;

    let body = GenerateLinkResponse {
        success: true,
        url: download_url(&state.config, headers, filename),
        filename: filename.to_string(),
        expires_at: expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        expires_in,
    };

    let mut response = json_response(&body);
    add_debug_headers(&state.config, headers, &mut response, filename);
    Ok(response)
}

/// `GET /download/{filename}` -- Serve a file as an attachment.
///
/// The download is counted in the background; the response never waits on
/// the counter store.
#[utoipa::path(
    get,
    path = "/download/{filename}",
    tag = "Files",
    operation_id = "DownloadFile",
    params(("filename" = String, Path, description = "File key, may contain '/'")),
    responses(
        (status = 200, description = "File content"),
        (status = 400, description = "Disallowed extension"),
        (status = 404, description = "File not found"),
        (status = 500, description = "Storage failure")
    )
)]
pub async fn download_file(
    state: Arc<AppState>,
    filename: &str,
    headers: &HeaderMap,
) -> Result<Response, ApiError> {
    validate_filename(filename, &state.config.files.allowed_extensions)?;

    let object = state
        .storage
        .get(filename)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            key: filename.to_string(),
        })?;

    state.queue.submit(filename);

    counter!(DOWNLOADS_SERVED_TOTAL).increment(1);
    counter!(BYTES_SENT_TOTAL).increment(object.size);
    debug!(key = %filename, size = object.size, "Serving download");

    let body = match object.body {
        ObjectBody::Bytes(data) => Body::from(data),
        ObjectBody::File(file) => Body::from_stream(ReaderStream::new(file)),
    };
    let mut response = Response::new(body);
    let hdrs = response.headers_mut();
    hdrs.insert(
        "content-type",
        HeaderValue::from_static(content_type_for(filename)),
    );
    hdrs.insert("content-length", HeaderValue::from(object.size));
    hdrs.insert("content-disposition", content_disposition(filename));
    hdrs.insert(
        "cache-control",
        HeaderValue::from_static(DOWNLOAD_CACHE_CONTROL),
    );
    if let Ok(etag) = HeaderValue::from_str(&format!("\"{}\"", object.content_hash)) {
        hdrs.insert("etag", etag);
    }
    let last_modified = httpdate::fmt_http_date(object.uploaded.into());
    if let Ok(v) = HeaderValue::from_str(&last_modified) {
        hdrs.insert("last-modified", v);
    }

    add_debug_headers(&state.config, headers, &mut response, filename);
    Ok(response)
}

/// `POST /upload` -- Store a file from a multipart form.
///
/// Fields: `file` (required) and `filename` (optional, overrides the file
/// part's own name).  The token is checked before the body is looked at, so
/// an unauthorized request gets 401 even when its body is malformed.
#[utoipa::path(
    post,
    path = "/upload",
    tag = "Files",
    operation_id = "UploadFile",
    request_body(
        content_type = "multipart/form-data",
        description = "`file` part plus optional `filename` field"
    ),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "File stored", body = UploadResponse),
        (status = 400, description = "Missing file/filename or disallowed extension"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 413, description = "Upload too large"),
        (status = 500, description = "Storage failure")
    )
)]
pub async fn upload_file(
    state: Arc<AppState>,
    headers: &HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    auth::require_token(headers, state.config.auth.token.as_deref())?;
    let mut multipart = multipart.map_err(|rejection| ApiError::BadRequest {
        message: rejection.body_text(),
    })?;

    let mut file: Option<(Option<String>, Bytes)> = None;
    let mut filename_field: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                let part_name = field.file_name().map(|s| s.to_string());
                let data = field.bytes().await.map_err(multipart_error)?;
                file = Some((part_name, data));
            }
            "filename" => {
                let text = field.text().await.map_err(multipart_error)?;
                let text = text.trim();
                if !text.is_empty() {
                    filename_field = Some(text.to_string());
                }
            }
            other => debug!(field = %other, "Ignoring unknown multipart field"),
        }
    }

    let (part_name, data) = file.ok_or(ApiError::MissingFile)?;
    let filename = filename_field
        .or(part_name.filter(|n| !n.is_empty()))
        .ok_or(ApiError::MissingFilename)?;

    validate_filename(&filename, &state.config.files.allowed_extensions)?;

    let size = data.len() as u64;
    let etag = state.storage.put(&filename, data).await?;

    counter!(UPLOADS_TOTAL).increment(1);
    info!(key = %filename, size, "File uploaded");

    let body = UploadResponse {
        success: true,
        url: download_url(&state.config, headers, &filename),
        filename: filename.clone(),
        size,
        etag,
    };

    let mut response = json_response(&body);
    add_debug_headers(&state.config, headers, &mut response, &filename);
    Ok(response)
}

/// `GET /files` -- List stored files with their download counts.
#[utoipa::path(
    get,
    path = "/files",
    tag = "Files",
    operation_id = "ListFiles",
    responses(
        (status = 200, description = "File listing", body = FileListResponse),
        (status = 500, description = "Storage or counter store failure")
    )
)]
pub async fn list_files(state: Arc<AppState>) -> Result<Response, ApiError> {
    let mut objects = state.storage.list().await?;
    objects.sort_by(|a, b| a.key.cmp(&b.key));

    let mut files = Vec::with_capacity(objects.len());
    let mut total_downloads = 0u64;
    for object in objects {
        let downloads = state.counters.read(&object.key).await?;
        total_downloads += downloads;
        files.push(FileEntry {
            filename: object.key,
            size: object.size,
            uploaded: object.uploaded.to_rfc3339_opts(SecondsFormat::Secs, true),
            downloads,
        });
    }

    let body = FileListResponse {
        success: true,
        total_files: files.len(),
        total_downloads,
        files,
    };
    Ok(json_response(&body))
}
