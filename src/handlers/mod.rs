//! HTTP request handlers.
//!
//! Each submodule groups related endpoints:
//! - [`files`] -- link generation, download, upload, listing
//! - [`stats`] -- per-file and aggregate download statistics, reset
//! - [`debug`] -- counter store self-test
//! - [`docs`] -- static landing page

pub mod debug;
pub mod docs;
pub mod files;
pub mod stats;

use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;

use crate::config::Config;
use crate::counters::COUNTER_PREFIX;

/// Characters left unescaped in a URL path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Serialize `body` as a 200 JSON response that must not be cached.
pub(crate) fn json_response<T: Serialize>(body: &T) -> Response {
    (StatusCode::OK, [("cache-control", "no-cache")], Json(body)).into_response()
}

/// Percent-encode each `/`-separated segment of `key`, keeping the slashes.
pub(crate) fn encode_key_path(key: &str) -> String {
    key.split('/')
        .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Public download URL for `key`.
///
/// Uses `links.base_url` when configured, else `http://<Host>` from the
/// request.
pub(crate) fn download_url(config: &Config, headers: &HeaderMap, key: &str) -> String {
    let origin = match config.links.base_url.as_deref() {
        Some(base) => base.trim_end_matches('/').to_string(),
        None => {
            let host = headers
                .get("host")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("localhost");
            format!("http://{host}")
        }
    };
    format!("{origin}/download/{}", encode_key_path(key))
}

/// Add `x-debug-*` headers echoing the resolved keys when the request asks
/// for them and verbose diagnostics are enabled.
pub(crate) fn add_debug_headers(
    config: &Config,
    request_headers: &HeaderMap,
    response: &mut Response,
    key: &str,
) {
    if !config.debug.verbose || !request_headers.contains_key("x-debug") {
        return;
    }
    let hdrs = response.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&encode_key_path(key)) {
        hdrs.insert("x-debug-storage-key", v);
    }
    // The prefix is header-safe; only the file key needs escaping.
    if let Ok(v) = HeaderValue::from_str(&format!("{COUNTER_PREFIX}{}", encode_key_path(key))) {
        hdrs.insert("x-debug-counter-key", v);
    }
}
