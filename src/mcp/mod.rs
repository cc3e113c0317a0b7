//! Model Context Protocol server over stdio.
//!
//! Exposes `parse_document` and `extract_information` as MCP tools. Messages
//! are newline-delimited JSON-RPC 2.0. Each tool call gets its own progress
//! channel: stage changes are forwarded as `notifications/progress` when the
//! client sends a `progressToken`, and pipeline messages as
//! `notifications/message`.
//!
//! ```no_run
//! # async fn run() -> Result<(), upstage_docai::DocAiError> {
//! use upstage_docai::{McpServer, Pipeline};
//!
//! let pipeline = Pipeline::from_env().await?;
//! McpServer::new(pipeline).serve_stdio().await
//! # }
//! ```

pub mod protocol;
pub mod server;

pub use server::{McpServer, Outbox};
