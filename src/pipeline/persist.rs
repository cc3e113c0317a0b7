//! Artifact persistence: pretty-printed JSON under a fixed output tree.
//!
//! ```text
//! <root>/
//!  ├─ document_parsing/<stem>_upstage.json
//!  └─ information_extraction/
//!      ├─ <stem>_extraction.json
//!      └─ schemas/<stem>_schema.json
//! ```
//!
//! Names derive only from the input file stem, so a re-run against the same
//! input overwrites the previous artifact. Writes go to a temp file in the
//! target directory followed by a rename, so a concurrent reader sees either
//! the old or the new file, never a torn one. Two concurrent runs on the same
//! stem still race; the last rename wins.

use crate::error::DocAiError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// What an artifact holds; decides its directory and file suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    /// Full envelope returned by the document-digitization endpoint.
    ParseResponse,
    /// Schema returned by the schema-generation endpoint.
    GeneratedSchema,
    /// Data returned by the information-extraction endpoint.
    ExtractionResult,
}

impl ArtifactKind {
    pub fn suffix(self) -> &'static str {
        match self {
            ArtifactKind::ParseResponse => "_upstage.json",
            ArtifactKind::GeneratedSchema => "_schema.json",
            ArtifactKind::ExtractionResult => "_extraction.json",
        }
    }

    /// Whether the final answer depends on this artifact being written.
    pub fn is_required(self) -> bool {
        !matches!(self, ArtifactKind::ParseResponse)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::ParseResponse => f.write_str("parse response"),
            ArtifactKind::GeneratedSchema => f.write_str("generated schema"),
            ArtifactKind::ExtractionResult => f.write_str("extraction result"),
        }
    }
}

/// Directory layout rooted at the configured output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn doc_parsing_dir(&self) -> PathBuf {
        self.root.join("document_parsing")
    }

    pub fn info_extraction_dir(&self) -> PathBuf {
        self.root.join("information_extraction")
    }

    pub fn schemas_dir(&self) -> PathBuf {
        self.info_extraction_dir().join("schemas")
    }

    pub fn dir_for(&self, kind: ArtifactKind) -> PathBuf {
        match kind {
            ArtifactKind::ParseResponse => self.doc_parsing_dir(),
            ArtifactKind::GeneratedSchema => self.schemas_dir(),
            ArtifactKind::ExtractionResult => self.info_extraction_dir(),
        }
    }

    /// Deterministic path of the `kind` artifact for an input with `stem`.
    pub fn artifact_path(&self, kind: ArtifactKind, stem: &str) -> PathBuf {
        self.dir_for(kind).join(format!("{stem}{}", kind.suffix()))
    }

    /// Create every directory of the layout. Safe to call repeatedly.
    pub async fn ensure_dirs(&self) -> Result<(), DocAiError> {
        for dir in [self.doc_parsing_dir(), self.schemas_dir()] {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| DocAiError::Persistence {
                    path: dir.clone(),
                    source: e,
                })?;
        }
        debug!("Output directories ready at {}", self.root.display());
        Ok(())
    }
}

/// Stem used to name artifacts for `input`: the file name without its
/// final extension, `"document"` when none can be derived.
pub fn artifact_stem(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string())
}

/// Write `payload` as the `kind` artifact for `stem` and return its path.
pub async fn persist_artifact(
    layout: &OutputLayout,
    kind: ArtifactKind,
    stem: &str,
    payload: &Value,
) -> Result<PathBuf, DocAiError> {
    let path = layout.artifact_path(kind, stem);
    let mut bytes = serde_json::to_vec_pretty(payload)
        .map_err(|e| DocAiError::Internal(format!("Failed to serialise {kind}: {e}")))?;
    bytes.push(b'\n');

    let dir = layout.dir_for(kind);
    let target = path.clone();
    tokio::task::spawn_blocking(move || write_atomic(&dir, &target, &bytes))
        .await
        .map_err(|e| DocAiError::Internal(format!("Artifact writer panicked: {e}")))?
        .map_err(|source| DocAiError::Persistence {
            path: path.clone(),
            source,
        })?;

    debug!("Saved {} to {}", kind, path.display());
    Ok(path)
}

fn write_atomic(dir: &Path, target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

/// Read a JSON artifact (or any JSON file) back.
pub async fn load_json(path: &Path) -> Result<Value, DocAiError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| DocAiError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_slice(&bytes)
        .map_err(|e| DocAiError::Internal(format!("'{}' is not JSON: {e}", path.display())))
}
