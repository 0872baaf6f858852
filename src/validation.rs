//! Filename validation.
//!
//! Extension allow-list checks, key length limits, and the content type
//! served for a given filename.

use garde::Validate;

use crate::errors::ApiError;
use crate::storage::local::TMP_DIR;

/// Maximum storage key length in bytes.
pub const MAX_KEY_LENGTH: usize = 1024;

/// Return the lower-cased extension after the last `.`, if any.
///
/// `None` for names without a dot and for names ending in a dot.
pub fn extension_of(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Check a filename's extension against `allowed` (case-insensitive).
pub fn is_allowed_extension(filename: &str, allowed: &[String]) -> bool {
    match extension_of(filename) {
        Some(ext) => allowed.iter().any(|a| a.eq_ignore_ascii_case(&ext)),
        None => false,
    }
}

/// Storage key input, checked before any backend call.
#[derive(Debug, Validate)]
pub struct FileKeyInput {
    /// 1 to 1024 bytes.
    #[garde(length(min = 1, max = 1024))]
    pub key: String,
}

/// Validate a storage key: non-empty, at most [`MAX_KEY_LENGTH`] bytes, no
/// empty, `.` or `..` path segments, and not under the reserved temp
/// directory.
pub fn validate_key(key: &str) -> Result<(), ApiError> {
    if key.is_empty() {
        return Err(ApiError::MissingFilename);
    }

    let input = FileKeyInput {
        key: key.to_string(),
    };
    if let Err(report) = input.validate() {
        return Err(ApiError::InvalidKey {
            reason: report.to_string(),
        });
    }

    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(ApiError::InvalidKey {
            reason: "empty, '.' or '..' path segment".to_string(),
        });
    }

    if key.split('/').next() == Some(TMP_DIR) {
        return Err(ApiError::InvalidKey {
            reason: format!("'{TMP_DIR}/' is reserved"),
        });
    }

    Ok(())
}

/// [`validate_key`] plus the extension allow-list; the check every
/// extension-validating endpoint runs.
pub fn validate_filename(filename: &str, allowed: &[String]) -> Result<(), ApiError> {
    validate_key(filename)?;

    if !is_allowed_extension(filename, allowed) {
        return Err(ApiError::InvalidExtension {
            filename: filename.to_string(),
        });
    }

    Ok(())
}

/// MIME type served for `filename`.
pub fn content_type_for(filename: &str) -> &'static str {
    match extension_of(filename).as_deref() {
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("doc") => "application/msword",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("xls") => "application/vnd.ms-excel",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("ppt") => "application/vnd.ms-powerpoint",
        Some("pptx") => {
            "application/vnd.openxmlformats-officedocument.presentationml.presentation"
        }
        Some("txt") => "text/plain; charset=utf-8",
        Some("csv") => "text/csv; charset=utf-8",
        Some("json") => "application/json",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("mp3") => "audio/mpeg",
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("tar") => "application/x-tar",
        Some("gz") => "application/gzip",
        Some("7z") => "application/x-7z-compressed",
        Some("rar") => "application/vnd.rar",
        Some("apk") => "application/vnd.android.package-archive",
        Some("iso") => "application/x-iso9660-image",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed() -> Vec<String> {
        vec!["pdf".to_string(), "zip".to_string(), "TXT".to_string()]
    }

    #[test]
    fn test_allowed_extension_case_insensitive() {
        assert!(is_allowed_extension("report.pdf", &allowed()));
        assert!(is_allowed_extension("REPORT.PDF", &allowed()));
        assert!(is_allowed_extension("notes.txt", &allowed()));
        assert!(is_allowed_extension("archive.tar.zip", &allowed()));
    }

    #[test]
    fn test_disallowed_extension() {
        assert!(!is_allowed_extension("script.sh", &allowed()));
        assert!(!is_allowed_extension("report.pdf.exe", &allowed()));
    }

    #[test]
    fn test_no_dot_is_rejected() {
        assert!(!is_allowed_extension("README", &allowed()));
        assert!(!is_allowed_extension("", &allowed()));
        assert!(!is_allowed_extension("folder/pdf", &allowed()));
    }

    #[test]
    fn test_trailing_dot_is_rejected() {
        assert!(!is_allowed_extension("report.", &allowed()));
        assert_eq!(extension_of("report."), None);
    }

    #[test]
    fn test_subfolder_keys_use_last_dot() {
        assert!(is_allowed_extension("v1.2/setup.zip", &allowed()));
        assert!(!is_allowed_extension("v1.pdf/setup", &allowed()));
    }

    #[test]
    fn test_validate_filename_errors() {
        assert!(matches!(
            validate_filename("", &allowed()),
            Err(ApiError::MissingFilename)
        ));
        assert!(matches!(
            validate_filename("x.exe", &allowed()),
            Err(ApiError::InvalidExtension { .. })
        ));
        let long = format!("{}.pdf", "a".repeat(MAX_KEY_LENGTH));
        assert!(matches!(
            validate_filename(&long, &allowed()),
            Err(ApiError::InvalidKey { .. })
        ));
        assert!(validate_filename("docs/a.pdf", &allowed()).is_ok());
    }

    #[test]
    fn test_validate_key_ignores_extension() {
        assert!(validate_key("README").is_ok());
        assert!(validate_key("bin/tool.exe").is_ok());
        assert!(matches!(validate_key(""), Err(ApiError::MissingFilename)));
    }

    #[test]
    fn test_validate_key_rejects_reserved_dir() {
        for key in [".tmp/a.pdf", ".tmp"] {
            assert!(
                matches!(validate_key(key), Err(ApiError::InvalidKey { .. })),
                "{key} should be rejected"
            );
        }
        assert!(validate_key("docs/.tmp/a.pdf").is_ok());
        assert!(validate_key(".tmpfiles/a.pdf").is_ok());
    }

    #[test]
    fn test_validate_filename_rejects_bad_segments() {
        for key in ["../a.pdf", "/a.pdf", "docs//a.pdf", "docs/./a.pdf", "docs/"] {
            assert!(
                matches!(
                    validate_filename(key, &allowed()),
                    Err(ApiError::InvalidKey { .. })
                ),
                "{key} should be rejected"
            );
        }
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("a.PDF"), "application/pdf");
        assert_eq!(content_type_for("photo.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("blob"), "application/octet-stream");
        assert_eq!(content_type_for("setup.exe"), "application/octet-stream");
    }
}
