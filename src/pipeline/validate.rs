//! Input validation: reject files the provider would refuse before any
//! bytes are read or sent.
//!
//! Checks run in a fixed order (existence, extension, size) so a missing
//! `notes.txt` reports "not found" rather than "unsupported".

use crate::error::DocAiError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extensions (lowercase, without the dot) accepted for information extraction.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "jpeg", "jpg", "png", "bmp", "pdf", "tiff", "tif", "heic", "docx", "pptx", "xlsx",
];

/// Largest accepted file: 50 MiB.
pub const MAX_FILE_BYTES: u64 = 50 * 1024 * 1024;

/// A file that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedFile {
    pub path: PathBuf,
    /// Lowercase extension without the leading dot.
    pub extension: String,
    pub size_bytes: u64,
}

/// Lowercase extension of `path`, without the dot.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Whether `ext` (any case, with or without a leading dot) is supported.
pub fn is_supported_extension(ext: &str) -> bool {
    let ext = ext.trim_start_matches('.').to_ascii_lowercase();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}

/// Check that `path` is an existing file only.
///
/// Used by the parse operation, which accepts whatever the parsing endpoint
/// does and leaves format checks to it.
pub async fn require_file(path: &Path) -> Result<u64, DocAiError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(meta.len()),
        Ok(_) => Err(DocAiError::FileNotFound {
            path: path.to_path_buf(),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(DocAiError::FileNotFound {
            path: path.to_path_buf(),
        }),
        Err(e) => Err(DocAiError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Validate a file for information extraction.
pub async fn validate_file(path: &Path) -> Result<ValidatedFile, DocAiError> {
    let size_bytes = require_file(path).await?;

    let extension = extension_of(path).unwrap_or_default();
    if !is_supported_extension(&extension) {
        return Err(DocAiError::UnsupportedFormat {
            extension: if extension.is_empty() {
                String::new()
            } else {
                format!(".{extension}")
            },
        });
    }

    if size_bytes > MAX_FILE_BYTES {
        return Err(DocAiError::FileTooLarge {
            size_bytes,
            limit_bytes: MAX_FILE_BYTES,
        });
    }

    debug!("Validated {} ({} bytes)", path.display(), size_bytes);
    Ok(ValidatedFile {
        path: path.to_path_buf(),
        extension,
        size_bytes,
    })
}
