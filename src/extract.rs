//! The orchestrator: sequences the pipeline stages for each operation.
//!
//! A [`Pipeline`] is built once from a [`DocAiConfig`] (resolving the
//! provider and creating the output tree) and then serves any number of
//! independent runs. Runs share no in-memory state, so a pipeline can sit
//! behind an `Arc` and serve concurrent callers; the only shared resource is
//! the artifact tree on disk.
//!
//! Every run goes through a [`StageTracker`], which turns the implicit
//! "do A, then B, stop on the first error" flow into explicit transitions.
//! A failing step ends the run as a [`RunFailure`] that records the stage.

use crate::config::DocAiConfig;
use crate::error::{ArtifactWarning, DocAiError, RunFailure};
use crate::output::{ExtractionMetadata, ExtractionOutput, ParseOutput};
use crate::pipeline::encode::{self, guess_mime};
use crate::pipeline::persist::{artifact_stem, persist_artifact, ArtifactKind, OutputLayout};
use crate::pipeline::{invoke, schema, validate};
use crate::progress::{ProgressCallback, Stage, StageTracker};
use crate::provider::{DocumentAiProvider, DocumentUpload, UpstageProvider};
use serde_json::{json, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Input of one extraction run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub file_path: PathBuf,
    /// Caller-owned schema file. Takes precedence over auto-generation.
    pub schema_path: Option<PathBuf>,
    /// Generate a schema remotely when no `schema_path` is given. Default: true.
    pub auto_generate_schema: bool,
}

impl ExtractionRequest {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            schema_path: None,
            auto_generate_schema: true,
        }
    }

    pub fn schema_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.schema_path = Some(path.into());
        self
    }

    pub fn auto_generate_schema(mut self, enabled: bool) -> Self {
        self.auto_generate_schema = enabled;
        self
    }
}

/// Runs document operations against one provider and one output tree.
pub struct Pipeline {
    provider: Arc<dyn DocumentAiProvider>,
    layout: OutputLayout,
    progress: Option<ProgressCallback>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Resolve the provider and create the output directories.
    ///
    /// # Errors
    /// [`DocAiError::MissingApiKey`] when no provider was injected and no
    /// API key is configured; [`DocAiError::Persistence`] when the output tree
    /// cannot be created.
    pub async fn new(config: DocAiConfig) -> Result<Self, DocAiError> {
        let provider = resolve_provider(&config)?;
        let layout = OutputLayout::new(&config.output_root);
        layout.ensure_dirs().await?;
        tracing::info!("Output directories ready at {}", layout.root().display());

        Ok(Self {
            provider,
            layout,
            progress: config.progress_callback,
        })
    }

    /// Build from `UPSTAGE_*` environment variables.
    pub async fn from_env() -> Result<Self, DocAiError> {
        Self::new(DocAiConfig::from_env()?).await
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// A pipeline sharing this one's provider and output tree but reporting
    /// to `callback`. Used to give each tool call its own progress channel.
    pub fn with_progress_callback(&self, callback: ProgressCallback) -> Pipeline {
        Pipeline {
            provider: Arc::clone(&self.provider),
            layout: self.layout.clone(),
            progress: Some(callback),
        }
    }

    /// Extract structured information from a document.
    ///
    /// Stages: validate → encode → resolve schema → extract → persist.
    /// On success exactly one result artifact is written, plus one schema
    /// artifact when the schema was generated.
    pub async fn extract_information(
        &self,
        request: &ExtractionRequest,
    ) -> Result<ExtractionOutput, RunFailure> {
        let started = Instant::now();
        let file = request.file_path.as_path();
        let mut tracker = StageTracker::new(self.progress.clone());
        tracker.start(file);
        tracker.info(&format!("Starting to process {}", file.display()));

        // ── Step 1: Validate ─────────────────────────────────────────────────
        let validated = tracker
            .step(Stage::Validating, validate::validate_file(file))
            .await?;
        let stem = artifact_stem(&validated.path);

        // ── Step 2: Encode ───────────────────────────────────────────────────
        tracker.info("Encoding file");
        let doc = tracker
            .step(Stage::Encoding, encode::encode_document(&validated.path))
            .await?;

        // ── Step 3: Resolve schema ───────────────────────────────────────────
        match request.schema_path {
            Some(ref path) => tracker.info(&format!("Loading schema from {}", path.display())),
            None if request.auto_generate_schema => {
                tracker.info("Auto-generating schema from document")
            }
            None => {}
        }
        let resolved = tracker
            .step(
                Stage::ResolvingSchema,
                schema::resolve_schema(
                    request.schema_path.as_deref(),
                    request.auto_generate_schema,
                    &doc,
                    &stem,
                    self.provider.as_ref(),
                    &self.layout,
                ),
            )
            .await?;
        if resolved.provenance.is_generated() {
            tracker.info(&format!(
                "Generated schema saved to {}",
                resolved.provenance.path().display()
            ));
        }

        // ── Step 4: Extract ──────────────────────────────────────────────────
        tracker.info("Extracting information with schema");
        let extracted = tracker
            .step(
                Stage::Extracting,
                invoke::extract_with_schema(self.provider.as_ref(), &doc, &resolved.schema),
            )
            .await?;
        drop(doc);

        // ── Step 5: Persist ──────────────────────────────────────────────────
        let saved = tracker
            .step(
                Stage::Persisting,
                persist_artifact(
                    &self.layout,
                    ArtifactKind::ExtractionResult,
                    &stem,
                    &extracted,
                ),
            )
            .await?;

        tracker.info(&format!(
            "Extraction complete. Results saved to {}",
            saved.display()
        ));
        tracker.finish(file);
        tracing::debug!("Extraction of {} took {:?}", file.display(), started.elapsed());

        Ok(ExtractionOutput {
            extracted_data: extracted,
            metadata: ExtractionMetadata {
                file: display_name(file),
                result_saved_to: saved,
                schema_used: resolved.provenance.path().to_path_buf(),
            },
            provenance: Some(resolved.provenance),
        })
    }

    /// Parse a document's layout and content remotely.
    ///
    /// Only existence is checked locally; the parsing endpoint decides which
    /// formats it accepts. The full response is saved as a convenience: if
    /// that write fails the content is still returned, with a warning.
    pub async fn parse_document(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<ParseOutput, RunFailure> {
        let file = path.as_ref();
        let mut tracker = StageTracker::new(self.progress.clone());
        tracker.start(file);
        tracker.info(&format!("Starting to process {}", file.display()));

        tracker
            .step(Stage::Validating, validate::require_file(file))
            .await?;

        let bytes = tracker.step(Stage::Encoding, read_bytes(file)).await?;
        let upload = DocumentUpload {
            file_name: display_name(file),
            mime_type: guess_mime(file),
            bytes,
        };

        let response = tracker
            .step(Stage::Parsing, self.provider.digitize(upload))
            .await?;
        let content = response.get("content").cloned().unwrap_or_else(|| json!({}));

        tracker.enter(Stage::Persisting);
        let (saved_to, warning) = self.save_parse_response(&tracker, file, &response).await;

        tracker.finish(file);
        Ok(ParseOutput {
            content,
            saved_to,
            warning,
        })
    }

    async fn save_parse_response(
        &self,
        tracker: &StageTracker,
        file: &Path,
        response: &Value,
    ) -> (Option<PathBuf>, Option<ArtifactWarning>) {
        let kind = ArtifactKind::ParseResponse;
        let stem = artifact_stem(file);
        match persist_artifact(&self.layout, kind, &stem, response).await {
            Ok(path) => {
                tracker.info(&format!(
                    "Document processed and saved to {}",
                    path.display()
                ));
                (Some(path), None)
            }
            Err(e) => {
                tracker.warning(&format!("Could not save response: {e}"));
                let warning = ArtifactWarning {
                    kind,
                    path: self.layout.artifact_path(kind, &stem),
                    reason: e.to_string(),
                };
                (None, Some(warning))
            }
        }
    }
}

/// Blocking wrapper around [`Pipeline::extract_information`].
///
/// Creates a temporary tokio runtime. The failing stage is dropped from the
/// error; use the async API to inspect it.
pub fn extract_information_sync(
    config: DocAiConfig,
    request: &ExtractionRequest,
) -> Result<ExtractionOutput, DocAiError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DocAiError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(async {
            let pipeline = Pipeline::new(config).await?;
            pipeline
                .extract_information(request)
                .await
                .map_err(|f| f.source)
        })
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn resolve_provider(config: &DocAiConfig) -> Result<Arc<dyn DocumentAiProvider>, DocAiError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }
    let key = config
        .api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .ok_or(DocAiError::MissingApiKey)?;
    Ok(Arc::new(UpstageProvider::new(key, config.base_url.as_str())?))
}

async fn read_bytes(path: &Path) -> Result<Vec<u8>, DocAiError> {
    tokio::fs::read(path).await.map_err(|e| DocAiError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
