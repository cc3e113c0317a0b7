//! Schema resolution: decide which extraction schema a run uses.
//!
//! The decision is made in strict order and never falls back to a default
//! schema:
//!
//! 1. an explicit `schema_path` wins, even when auto-generation is on;
//! 2. otherwise, if auto-generation is enabled, ask the provider for one and
//!    save it next to the other extraction artifacts for later reuse;
//! 3. otherwise the run fails with [`DocAiError::NoSchemaAvailable`].

use crate::error::DocAiError;
use crate::pipeline::encode::EncodedDocument;
use crate::pipeline::invoke;
use crate::pipeline::persist::{persist_artifact, ArtifactKind, OutputLayout};
use crate::provider::{ChatEndpoint, DocumentAiProvider};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where a schema came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "path", rename_all = "snake_case")]
pub enum SchemaProvenance {
    /// Loaded from a caller-owned file; never written to.
    UserSupplied(PathBuf),
    /// Generated remotely and saved by this run.
    AutoGenerated(PathBuf),
}

impl SchemaProvenance {
    /// The file the schema lives in.
    pub fn path(&self) -> &Path {
        match self {
            SchemaProvenance::UserSupplied(p) | SchemaProvenance::AutoGenerated(p) => p,
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, SchemaProvenance::AutoGenerated(_))
    }
}

/// A non-null schema plus its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSchema {
    pub schema: Value,
    pub provenance: SchemaProvenance,
}

/// Load a user-supplied schema file.
///
/// Missing or unreadable files, invalid JSON and anything [`check_usable`]
/// refuses are rejected.
pub async fn load_schema(path: &Path) -> Result<Value, DocAiError> {
    let load_err = |reason: String| DocAiError::SchemaLoad {
        path: path.to_path_buf(),
        reason,
    };

    let text = match tokio::fs::read_to_string(path).await {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(load_err("schema file not found".to_string()))
        }
        Err(e) => return Err(load_err(e.to_string())),
    };

    let schema: Value =
        serde_json::from_str(&text).map_err(|e| load_err(format!("invalid JSON: {e}")))?;

    check_usable(&schema).map_err(|reason| load_err(reason.to_string()))?;
    Ok(schema)
}

/// A schema can drive an extraction only if it is a non-empty JSON object.
///
/// Applies to user files and generated schemas alike.
pub fn check_usable(schema: &Value) -> Result<(), &'static str> {
    match schema {
        Value::Object(map) if !map.is_empty() => Ok(()),
        Value::Null | Value::Object(_) => Err("schema is empty"),
        Value::Array(items) if items.is_empty() => Err("schema is empty"),
        Value::String(s) if s.is_empty() => Err("schema is empty"),
        _ => Err("schema must be a JSON object"),
    }
}

/// Resolve the schema for one run.
///
/// `stem` names the generated-schema artifact. Failures of the generation
/// call are wrapped in [`DocAiError::SchemaGeneration`]; failing to save a
/// generated schema is a fatal [`DocAiError::Persistence`].
pub async fn resolve_schema(
    schema_path: Option<&Path>,
    auto_generate: bool,
    doc: &EncodedDocument,
    stem: &str,
    provider: &dyn DocumentAiProvider,
    layout: &OutputLayout,
) -> Result<ResolvedSchema, DocAiError> {
    if let Some(path) = schema_path {
        debug!("Loading schema from {}", path.display());
        let schema = load_schema(path).await?;
        return Ok(ResolvedSchema {
            schema,
            provenance: SchemaProvenance::UserSupplied(path.to_path_buf()),
        });
    }

    if !auto_generate {
        return Err(DocAiError::NoSchemaAvailable);
    }

    debug!("Auto-generating schema from document");
    let schema = invoke::generate_schema(provider, doc)
        .await
        .and_then(|schema| {
            check_usable(&schema).map_err(|reason| DocAiError::MalformedResponse {
                endpoint: ChatEndpoint::SchemaGeneration.to_string(),
                detail: format!("Invalid schema format returned: {reason}"),
            })?;
            Ok(schema)
        })
        .map_err(DocAiError::schema_generation)?;

    let saved = persist_artifact(layout, ArtifactKind::GeneratedSchema, stem, &schema).await?;
    debug!("Generated schema saved to {}", saved.display());

    Ok(ResolvedSchema {
        schema,
        provenance: SchemaProvenance::AutoGenerated(saved),
    })
}
