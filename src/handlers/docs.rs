//! Static landing page.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>filegate</title>
<style>
body { font-family: system-ui, sans-serif; max-width: 48rem; margin: 2rem auto; line-height: 1.5; }
code { background: #f3f3f3; padding: 0 .25rem; }
td { padding: .2rem .8rem .2rem 0; vertical-align: top; }
</style>
</head>
<body>
<h1>filegate</h1>
<p>Download gateway with per-file download counters.</p>
<table>
<tr><td><code>GET /generate/{filename}</code></td><td>Download link for a file. Needs the bearer token when one is configured.</td></tr>
<tr><td><code>GET /download/{filename}</code></td><td>Download a file as an attachment.</td></tr>
<tr><td><code>POST /upload</code></td><td>Multipart upload: <code>file</code> plus optional <code>filename</code>. Needs the bearer token.</td></tr>
<tr><td><code>GET /files</code></td><td>Stored files with sizes and download counts.</td></tr>
<tr><td><code>GET /stats/{filename}</code></td><td>Download count for one file.</td></tr>
<tr><td><code>GET /all-stats</code></td><td>Download counts for every file.</td></tr>
<tr><td><code>POST /reset-stats/{filename}</code></td><td>Reset a download count. Needs the bearer token.</td></tr>
<tr><td><code>GET /debug/kv</code></td><td>Counter store self-test.</td></tr>
<tr><td><code>GET /health</code></td><td>Liveness probe.</td></tr>
<tr><td><code>GET /openapi.json</code></td><td>OpenAPI document.</td></tr>
</table>
<p>Authenticated endpoints expect <code>Authorization: Bearer &lt;token&gt;</code>.
Download counts are approximate.</p>
</body>
</html>
"#;

/// `GET /` -- Static documentation page.
#[utoipa::path(
    get,
    path = "/",
    tag = "Docs",
    operation_id = "Index",
    responses((status = 200, description = "HTML documentation page", content_type = "text/html"))
)]
pub async fn index() -> Response {
    (
        StatusCode::OK,
        [("content-type", "text/html; charset=utf-8")],
        INDEX_HTML,
    )
        .into_response()
}
