//! Host-facing tool adapters.
//!
//! A tool host hands over plain strings and expects plain text back, with an
//! error flag. These adapters translate between that surface and the typed
//! [`Pipeline`] API. Every failure is rendered as `Error: <message>`, so a
//! host can relay it to a user unchanged.

use crate::extract::{ExtractionRequest, Pipeline};
use crate::output::ParseOutput;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Text reply of one tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum ToolReply {
    Success(String),
    Failure(String),
}

impl ToolReply {
    pub(crate) fn failure(err: impl std::fmt::Display) -> Self {
        ToolReply::Failure(format!("Error: {err}"))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ToolReply::Failure(_))
    }

    pub fn text(&self) -> &str {
        match self {
            ToolReply::Success(t) | ToolReply::Failure(t) => t,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            ToolReply::Success(t) | ToolReply::Failure(t) => t,
        }
    }
}

/// Parse a document and reply with its compact content JSON.
///
/// The reply ends with a note on where the full response was saved, or that
/// it could not be saved.
pub async fn parse_document_tool(pipeline: &Pipeline, file_path: &str) -> ToolReply {
    match pipeline.parse_document(file_path).await {
        Ok(output) => match render_parse(&output) {
            Ok(text) => ToolReply::Success(text),
            Err(e) => ToolReply::failure(e),
        },
        Err(failure) => ToolReply::failure(failure),
    }
}

/// Extract structured information and reply with the pretty-printed result.
///
/// An empty `schema_path` counts as absent.
pub async fn extract_information_tool(
    pipeline: &Pipeline,
    file_path: &str,
    schema_path: Option<&str>,
    auto_generate_schema: bool,
) -> ToolReply {
    let mut request = ExtractionRequest::new(file_path).auto_generate_schema(auto_generate_schema);
    if let Some(schema) = schema_path.filter(|s| !s.trim().is_empty()) {
        request = request.schema_path(PathBuf::from(schema));
    }

    match pipeline.extract_information(&request).await {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => ToolReply::Success(text),
            Err(e) => ToolReply::failure(e),
        },
        Err(failure) => ToolReply::failure(failure),
    }
}

fn render_parse(output: &ParseOutput) -> Result<String, serde_json::Error> {
    let mut text = serde_json::to_string(&output.content)?;
    match output.saved_to {
        Some(ref path) => text.push_str(&format!(
            "\n\nThe full response has been saved to {} for your reference.",
            path.display()
        )),
        None => text.push_str("\n\nNote: Could not save the full response to disk."),
    }
    Ok(text)
}
