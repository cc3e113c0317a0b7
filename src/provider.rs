//! Transport seam between the pipeline and the remote document-AI service.
//!
//! The pipeline never talks HTTP directly. It builds requests, hands them to
//! a [`DocumentAiProvider`], and interprets the returned JSON envelope
//! itself. [`UpstageProvider`] is the production implementation over
//! `reqwest`; tests substitute a scripted provider.
//!
//! Providers are responsible for the transport-level error split only:
//!
//! | Outcome                          | Error                               |
//! |----------------------------------|-------------------------------------|
//! | request never completed          | [`DocAiError::RemoteTransport`]     |
//! | non-2xx status                   | [`DocAiError::RemoteHttp`]          |
//! | 2xx whose body is not JSON       | [`DocAiError::MalformedResponse`]   |
//!
//! Everything about the *shape* of a JSON envelope is checked by
//! [`crate::pipeline::invoke`].

use crate::config::REQUEST_TIMEOUT_SECS;
use crate::error::DocAiError;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Model name expected by both information-extraction endpoints.
pub const EXTRACTION_MODEL: &str = "information-extract";

/// Model name expected by the document-digitization endpoint.
pub const PARSE_MODEL: &str = "document-parse";

/// The chat-style endpoints of the information-extraction API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatEndpoint {
    SchemaGeneration,
    InformationExtraction,
}

impl ChatEndpoint {
    /// Path relative to the API root.
    pub fn path(self) -> &'static str {
        match self {
            ChatEndpoint::SchemaGeneration => "information-extraction/schema-generation",
            ChatEndpoint::InformationExtraction => "information-extraction",
        }
    }
}

impl fmt::Display for ChatEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatEndpoint::SchemaGeneration => f.write_str("schema generation API"),
            ChatEndpoint::InformationExtraction => f.write_str("information extraction API"),
        }
    }
}

/// Path of the document-digitization endpoint relative to the API root.
pub const DIGITIZATION_PATH: &str = "document-digitization";

// ── Request wire types ──────────────────────────────────────────────────────

/// Chat-style request body for schema generation and extraction.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Vec<ContentPart>,
}

/// One part of a message. The API only ever receives the document itself.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Structured-output directive carrying the extraction schema.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
    pub json_schema: Value,
}

impl ResponseFormat {
    pub fn json_schema(schema: Value) -> Self {
        Self {
            format_type: "json_schema".to_string(),
            json_schema: schema,
        }
    }
}

/// Raw file sent to the document-digitization endpoint.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

// ── Provider trait ──────────────────────────────────────────────────────────

/// A remote document-AI service.
///
/// Both methods are a single attempt. Implementations must not retry.
#[async_trait]
pub trait DocumentAiProvider: Send + Sync {
    /// Upload a document for layout parsing and return the full JSON envelope.
    async fn digitize(&self, upload: DocumentUpload) -> Result<Value, DocAiError>;

    /// Send a chat-style request and return the full JSON envelope.
    async fn chat(
        &self,
        endpoint: ChatEndpoint,
        request: &ChatRequest,
    ) -> Result<Value, DocAiError>;
}

// ── reqwest implementation ──────────────────────────────────────────────────

/// [`DocumentAiProvider`] backed by the Upstage REST API.
pub struct UpstageProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl fmt::Debug for UpstageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstageProvider")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl UpstageProvider {
    /// Build a provider with the fixed request timeout.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, DocAiError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(DocAiError::MissingApiKey);
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| DocAiError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Send a prepared request and decode a JSON body, mapping every failure
    /// onto the transport error split.
    async fn send(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<Value, DocAiError> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| transport_error(endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            return Err(DocAiError::RemoteHttp {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(endpoint, e))?;
        debug!("{} answered {} ({} bytes)", endpoint, status, bytes.len());

        serde_json::from_slice(&bytes).map_err(|e| DocAiError::MalformedResponse {
            endpoint: endpoint.to_string(),
            detail: format!("response body is not JSON: {e}"),
        })
    }
}

#[async_trait]
impl DocumentAiProvider for UpstageProvider {
    async fn digitize(&self, upload: DocumentUpload) -> Result<Value, DocAiError> {
        let part = Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.mime_type)
            .map_err(|e| DocAiError::Internal(format!("Invalid MIME type for upload: {e}")))?;

        let form = Form::new()
            .part("document", part)
            .text("ocr", "force")
            .text("base64_encoding", "['table']")
            .text("model", PARSE_MODEL);

        let request = self.client.post(self.url(DIGITIZATION_PATH)).multipart(form);
        self.send("document digitization API", request).await
    }

    async fn chat(
        &self,
        endpoint: ChatEndpoint,
        request: &ChatRequest,
    ) -> Result<Value, DocAiError> {
        let builder = self.client.post(self.url(endpoint.path())).json(request);
        self.send(&endpoint.to_string(), builder).await
    }
}

fn transport_error(endpoint: &str, e: reqwest::Error) -> DocAiError {
    let reason = if e.is_timeout() {
        format!("timed out after {REQUEST_TIMEOUT_SECS}s")
    } else {
        e.to_string()
    };
    DocAiError::RemoteTransport {
        endpoint: endpoint.to_string(),
        reason,
    }
}
