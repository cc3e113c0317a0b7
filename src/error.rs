//! Error types for the upstage-docai library.
//!
//! Three types cover the three ways a run can go wrong:
//!
//! * [`DocAiError`] — **Fatal**: the step that raised it cannot produce its
//!   output (missing file, unusable schema, remote failure). Every pipeline
//!   component returns `Result<_, DocAiError>`.
//!
//! * [`RunFailure`] — a [`DocAiError`] tagged with the [`Stage`] in which it
//!   happened. This is the `Failed` state of a run and the error type of the
//!   top-level [`crate::extract::Pipeline`] operations.
//!
//! * [`ArtifactWarning`] — **Non-fatal**: a raw artifact could not be written
//!   but the answer was already computed. Attached to the successful output
//!   instead of aborting the run.

use crate::pipeline::persist::ArtifactKind;
use crate::progress::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors produced by the pipeline and its components.
#[derive(Debug, Error)]
pub enum DocAiError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The input path does not point at an existing regular file.
    #[error("File not found at {}", .path.display())]
    FileNotFound { path: PathBuf },

    /// The file extension is outside the supported document/image set.
    #[error(
        "Unsupported file format: {extension}. Supported formats are: {}",
        crate::pipeline::validate::SUPPORTED_EXTENSIONS.join(", ")
    )]
    UnsupportedFormat { extension: String },

    /// The file is larger than the provider accepts.
    #[error(
        "File exceeds maximum size of {:.0}MB. Current size: {:.2}MB",
        megabytes(.limit_bytes),
        megabytes(.size_bytes)
    )]
    FileTooLarge { size_bytes: u64, limit_bytes: u64 },

    /// The file passed validation but could not be read.
    #[error("Failed to read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Schema errors ─────────────────────────────────────────────────────
    /// A user-supplied schema file is missing, unreadable or not usable JSON.
    #[error("Error loading schema from '{}': {reason}", .path.display())]
    SchemaLoad { path: PathBuf, reason: String },

    /// The remote schema-generation call failed.
    #[error("Error generating schema: {0}")]
    SchemaGeneration(#[source] Box<DocAiError>),

    /// No schema path was given and auto-generation is disabled.
    #[error(
        "No schema provided or generated. Please provide a schema or enable auto_generate_schema."
    )]
    NoSchemaAvailable,

    // ── Remote errors ─────────────────────────────────────────────────────
    /// The provider answered with a non-success HTTP status.
    #[error("HTTP error from Upstage API: {status} - {body}")]
    RemoteHttp { status: u16, body: String },

    /// The request never completed (connection refused, DNS, timeout).
    #[error("Request error connecting to Upstage API ({endpoint}): {reason}")]
    RemoteTransport { endpoint: String, reason: String },

    /// The provider answered 2xx but the envelope or its content is unusable.
    #[error("Invalid response from {endpoint}: {detail}")]
    MalformedResponse { endpoint: String, detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// An artifact required for the answer could not be written.
    #[error("Failed to write artifact '{}': {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// No bearer token is available for the provider.
    #[error("UPSTAGE_API_KEY not set in environment variables\nExport it or pass --api-key.")]
    MissingApiKey,

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn megabytes(bytes: &u64) -> f64 {
    *bytes as f64 / (1024.0 * 1024.0)
}

impl DocAiError {
    /// Wrap any failure of the schema-generation call.
    pub fn schema_generation(inner: DocAiError) -> Self {
        DocAiError::SchemaGeneration(Box::new(inner))
    }

    /// HTTP status code carried by this error, looking through wrappers.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            DocAiError::RemoteHttp { status, .. } => Some(*status),
            DocAiError::SchemaGeneration(inner) => inner.http_status(),
            _ => None,
        }
    }
}

/// The terminal `Failed` state of a run: the error and the stage it hit.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct RunFailure {
    pub stage: Stage,
    #[source]
    pub source: DocAiError,
}

impl RunFailure {
    pub fn new(stage: Stage, source: DocAiError) -> Self {
        Self { stage, source }
    }
}

/// A non-fatal failure to persist an artifact that the answer does not need.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
#[error("Could not save {kind} artifact to '{}': {reason}", .path.display())]
pub struct ArtifactWarning {
    pub kind: ArtifactKind,
    pub path: PathBuf,
    pub reason: String,
}
