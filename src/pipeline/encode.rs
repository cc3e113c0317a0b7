//! Document encoding: file bytes → base64 plus a MIME type.
//!
//! The extraction endpoints take the document inline as a data URL
//! (`data:<mime>;base64,<content>`), so the whole file is read into memory.
//! Validation has already capped it at 50 MiB.

use crate::error::DocAiError;
use crate::pipeline::validate::extension_of;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tracing::debug;

/// Generic fallback when nothing better is known.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// A document ready to embed in a request. Owned by a single run.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedDocument {
    pub base64: String,
    pub mime_type: String,
}

impl std::fmt::Debug for EncodedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedDocument")
            .field("mime_type", &self.mime_type)
            .field("base64_len", &self.base64.len())
            .finish()
    }
}

impl EncodedDocument {
    /// Inline representation sent to the provider.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64)
    }

    /// Top-level media class of the document.
    ///
    /// Anything whose top-level type is not `application` is treated as
    /// `image`, including `text/*` or `video/*`. Diagnostic only: it is
    /// logged with each remote call, while requests always carry the full
    /// MIME type in the data URL.
    // TODO: confirm with the provider whether non-image, non-application
    // types should be rejected instead of coerced to `image`.
    pub fn media_class(&self) -> &'static str {
        match self.mime_type.split('/').next() {
            Some("application") => "application",
            _ => "image",
        }
    }
}

/// MIME type for an extension the system database does not know.
pub fn fallback_mime(ext: &str) -> &'static str {
    match ext {
        "jpg" | "jpeg" | "png" | "bmp" | "tif" | "tiff" | "heic" => "image/png",
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        _ => OCTET_STREAM,
    }
}

/// Infer the MIME type of `path` from its extension.
pub fn guess_mime(path: &Path) -> String {
    if let Some(mime) = mime_guess::from_path(path).first_raw() {
        return mime.to_string();
    }
    let ext = extension_of(path).unwrap_or_default();
    fallback_mime(&ext).to_string()
}

/// Read `path` and encode it for an extraction request.
pub async fn encode_document(path: &Path) -> Result<EncodedDocument, DocAiError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| DocAiError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mime_type = guess_mime(path);
    let base64 = STANDARD.encode(&bytes);
    debug!(
        "Encoded {} ({}) → {} bytes base64",
        path.display(),
        mime_type,
        base64.len()
    );

    Ok(EncodedDocument { base64, mime_type })
}
