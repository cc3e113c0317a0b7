//! # upstage-docai
//!
//! Parse documents and extract structured information with the Upstage
//! Document AI service.
//!
//! Two operations are exposed, each as a typed async API on [`Pipeline`], as
//! a text-in/text-out tool adapter in [`tools`], and as an MCP tool served
//! over stdio by [`McpServer`]:
//!
//! - **parse** sends a document to the digitization endpoint and returns its
//!   layout/content, saving the full response alongside.
//! - **extract** pulls structured data out of a document, driven by a JSON
//!   schema that is either supplied by the caller or generated remotely.
//!
//! ## Pipeline Overview
//!
//! ```text
//! file
//!  │
//!  ├─ 1. Validate  existence, extension allow-list, 50 MiB cap
//!  ├─ 2. Encode    bytes → base64 + MIME type → data URL
//!  ├─ 3. Schema    user file, or generate remotely and save
//!  ├─ 4. Extract   information-extraction call with the schema
//!  └─ 5. Persist   <root>/information_extraction/<stem>_extraction.json
//! ```
//!
//! Each stage is an explicit transition of a run; a failure records the
//! stage it happened in ([`RunFailure`]).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use upstage_docai::{DocAiConfig, ExtractionRequest, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads UPSTAGE_API_KEY, UPSTAGE_API_BASE and UPSTAGE_OUTPUT_DIR.
//!     let pipeline = Pipeline::new(DocAiConfig::from_env()?).await?;
//!     let request = ExtractionRequest::new("invoice.pdf");
//!     let output = pipeline.extract_information(&request).await?;
//!     println!("{}", serde_json::to_string_pretty(&output.extracted_data)?);
//!     eprintln!("saved to {}", output.metadata.result_saved_to.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `upstage-docai` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! upstage-docai = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod mcp;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod provider;
pub mod tools;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{DocAiConfig, DocAiConfigBuilder};
pub use error::{ArtifactWarning, DocAiError, RunFailure};
pub use extract::{extract_information_sync, ExtractionRequest, Pipeline};
pub use mcp::McpServer;
pub use output::{ExtractionMetadata, ExtractionOutput, ParseOutput};
pub use pipeline::persist::{ArtifactKind, OutputLayout};
pub use pipeline::schema::SchemaProvenance;
pub use progress::{NoopProgressCallback, PipelineProgressCallback, ProgressCallback, Stage};
pub use provider::{DocumentAiProvider, UpstageProvider};
pub use tools::{extract_information_tool, parse_document_tool, ToolReply};
