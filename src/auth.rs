//! Bearer token authorization.
//!
//! Admin endpoints expect `Authorization: Bearer <token>` where `<token>`
//! is the configured `auth.token`.  Comparison runs in constant time.

use axum::http::HeaderMap;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::errors::ApiError;

/// Compare two strings in constant time.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Check the `Authorization` header against `Bearer <expected>`.
///
/// Endpoints that require a token reject every request when none is
/// configured.
pub fn require_token(headers: &HeaderMap, expected: Option<&str>) -> Result<(), ApiError> {
    let Some(token) = expected else {
        debug!("Rejecting admin request: no auth token configured");
        return Err(ApiError::Unauthorized);
    };

    let provided = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if constant_time_eq(provided, &format!("Bearer {token}")) {
        Ok(())
    } else {
        debug!("Rejecting request with missing or invalid bearer token");
        Err(ApiError::Unauthorized)
    }
}

/// Like [`require_token`], but open when no token is configured.
pub fn check_optional_token(headers: &HeaderMap, expected: Option<&str>) -> Result<(), ApiError> {
    match expected {
        Some(_) => require_token(headers, expected),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(auth: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_str(auth).unwrap());
        headers
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
    }

    #[test]
    fn test_require_token_accepts_exact_bearer() {
        assert!(require_token(&headers_with("Bearer s3cret"), Some("s3cret")).is_ok());
    }

    #[test]
    fn test_require_token_rejects_mismatch() {
        assert!(require_token(&headers_with("Bearer wrong"), Some("s3cret")).is_err());
        assert!(require_token(&headers_with("bearer s3cret"), Some("s3cret")).is_err());
        assert!(require_token(&headers_with("s3cret"), Some("s3cret")).is_err());
        assert!(require_token(&HeaderMap::new(), Some("s3cret")).is_err());
    }

    #[test]
    fn test_require_token_without_configured_token() {
        assert!(require_token(&headers_with("Bearer anything"), None).is_err());
    }

    #[test]
    fn test_optional_token() {
        assert!(check_optional_token(&HeaderMap::new(), None).is_ok());
        assert!(check_optional_token(&HeaderMap::new(), Some("t")).is_err());
        assert!(check_optional_token(&headers_with("Bearer t"), Some("t")).is_ok());
    }
}
