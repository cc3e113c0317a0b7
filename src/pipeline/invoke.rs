//! Remote calls: build chat-style requests and interpret their envelopes.
//!
//! Both information-extraction endpoints take the same request: one user
//! message whose only content part is the document as a data URL. Both
//! answer with a chat envelope whose first choice carries a JSON *string*:
//!
//! ```text
//! { "choices": [ { "message": { "content": "{\"vendor\": \"Acme\"}" } } ] }
//! ```
//!
//! Schema generation expects `json_schema` inside that string. Extraction
//! adds the schema as a `response_format` directive and the string is the
//! extracted object itself.
//!
//! Every call is a single attempt. Transient failures surface to the caller,
//! who may re-run.

use crate::error::DocAiError;
use crate::pipeline::encode::EncodedDocument;
use crate::provider::{
    ChatEndpoint, ChatMessage, ChatRequest, ContentPart, DocumentAiProvider, ImageUrl,
    ResponseFormat, EXTRACTION_MODEL,
};
use serde::Deserialize;
use serde_json::Value;
use std::time::Instant;
use tracing::debug;

// ── Response envelope ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatEnvelope {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Build the request for `endpoint`. `schema` is required for extraction
/// and ignored for schema generation.
pub fn build_request(doc: &EncodedDocument, schema: Option<&Value>) -> ChatRequest {
    ChatRequest {
        model: EXTRACTION_MODEL.to_string(),
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content: vec![ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: doc.data_url(),
                },
            }],
        }],
        response_format: schema.cloned().map(ResponseFormat::json_schema),
    }
}

/// Pull the JSON document out of a chat envelope.
fn decode_content(endpoint: ChatEndpoint, envelope: Value) -> Result<Value, DocAiError> {
    let malformed = |detail: String| DocAiError::MalformedResponse {
        endpoint: endpoint.to_string(),
        detail,
    };

    let envelope: ChatEnvelope = serde_json::from_value(envelope)
        .map_err(|e| malformed(format!("unexpected envelope: {e}")))?;
    let choice = envelope
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| malformed("no choices in response".to_string()))?;
    let content = choice
        .message
        .content
        .ok_or_else(|| malformed("first choice has no message content".to_string()))?;

    serde_json::from_str(&content).map_err(|e| malformed(format!("content is not JSON: {e}")))
}

async fn call(
    provider: &dyn DocumentAiProvider,
    endpoint: ChatEndpoint,
    request: &ChatRequest,
    doc: &EncodedDocument,
) -> Result<Value, DocAiError> {
    let start = Instant::now();
    debug!(
        "Calling {} ({} as {}, {} bytes base64)",
        endpoint,
        doc.mime_type,
        doc.media_class(),
        doc.base64.len()
    );
    let envelope = provider.chat(endpoint, request).await?;
    debug!("{} answered in {:?}", endpoint, start.elapsed());
    decode_content(endpoint, envelope)
}

/// Ask the provider to propose an extraction schema for `doc`.
///
/// Returns the value of the `json_schema` field; a missing or `null` field
/// is a malformed response.
pub async fn generate_schema(
    provider: &dyn DocumentAiProvider,
    doc: &EncodedDocument,
) -> Result<Value, DocAiError> {
    let endpoint = ChatEndpoint::SchemaGeneration;
    let request = build_request(doc, None);
    let mut content = call(provider, endpoint, &request, doc).await?;

    match content.get_mut("json_schema").map(Value::take) {
        Some(schema) if !schema.is_null() => Ok(schema),
        _ => Err(DocAiError::MalformedResponse {
            endpoint: endpoint.to_string(),
            detail: "Invalid schema format returned: missing 'json_schema'".to_string(),
        }),
    }
}

/// Extract data from `doc` according to `schema`.
pub async fn extract_with_schema(
    provider: &dyn DocumentAiProvider,
    doc: &EncodedDocument,
    schema: &Value,
) -> Result<Value, DocAiError> {
    let request = build_request(doc, Some(schema));
    call(provider, ChatEndpoint::InformationExtraction, &request, doc).await
}
