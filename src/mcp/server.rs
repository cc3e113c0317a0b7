//! Newline-delimited JSON-RPC server exposing the two document tools.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::protocol::*;
use crate::error::DocAiError;
use crate::extract::Pipeline;
use crate::progress::{PipelineProgressCallback, Stage};
use crate::tools::{extract_information_tool, parse_document_tool, ToolReply};

/// Protocol revision answered when the client does not name one.
pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "upstage-ai-tools";

const PARSE_DOCUMENT: &str = "parse_document";
const EXTRACT_INFORMATION: &str = "extract_information";

/// Serialized messages waiting for the writer task, one JSON document each.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<String>,
}

impl Outbox {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send<T: Serialize>(&self, message: &T) {
        match serde_json::to_string(message) {
            Ok(line) => {
                if self.tx.send(line).is_err() {
                    debug!("Writer closed; message dropped");
                }
            }
            Err(e) => warn!("Failed to serialize outgoing message: {}", e),
        }
    }

    pub fn notify(&self, method: &str, params: Value) {
        self.send(&JsonRpcNotification {
            jsonrpc: "2.0",
            method,
            params,
        });
    }
}

/// Relays pipeline events of one tool call to the client.
///
/// Stage changes become `notifications/progress` when the caller supplied a
/// progress token; messages become `notifications/message` log entries.
struct ToolCallProgress {
    outbox: Outbox,
    token: Option<Value>,
}

impl ToolCallProgress {
    fn log(&self, level: &str, data: String) {
        self.outbox.notify(
            "notifications/message",
            json!({"level": level, "logger": SERVER_NAME, "data": data}),
        );
    }
}

impl PipelineProgressCallback for ToolCallProgress {
    fn on_stage(&self, stage: Stage, percent: u8) {
        if let Some(ref token) = self.token {
            self.outbox.notify(
                "notifications/progress",
                json!({
                    "progressToken": token,
                    "progress": percent,
                    "total": 100,
                    "message": stage.to_string(),
                }),
            );
        }
    }

    fn on_info(&self, message: &str) {
        self.log("info", message.to_string());
    }

    fn on_warning(&self, message: &str) {
        self.log("warning", message.to_string());
    }

    fn on_run_failed(&self, stage: Stage, error: &str) {
        self.log("error", format!("Failed while {stage}: {error}"));
    }
}

#[derive(Debug, Deserialize)]
struct ParseDocumentArgs {
    file_path: String,
}

#[derive(Debug, Deserialize)]
struct ExtractInformationArgs {
    file_path: String,
    #[serde(default)]
    schema_path: Option<String>,
    #[serde(default = "default_true")]
    auto_generate_schema: bool,
}

fn default_true() -> bool {
    true
}

/// MCP tool server over one [`Pipeline`].
///
/// Requests are handled one at a time in arrival order. Notifications
/// produced during a tool call are written before its response.
pub struct McpServer {
    pipeline: Pipeline,
    initialized: bool,
}

impl McpServer {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            initialized: false,
        }
    }

    /// Serve on the process's stdin/stdout until stdin closes.
    pub async fn serve_stdio(self) -> Result<(), DocAiError> {
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Serve one JSON-RPC message per line from `reader`, answering on `writer`.
    pub async fn serve<R, W>(mut self, reader: R, mut writer: W) -> Result<(), DocAiError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        info!("MCP server {} ready", SERVER_NAME);
        let (outbox, mut rx) = Outbox::channel();
        let writer_task = tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            Ok::<_, std::io::Error>(())
        });

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await.map_err(transport_error)? {
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            let response = match serde_json::from_str::<JsonRpcRequest>(text) {
                Ok(request) => self.handle(request, &outbox).await,
                Err(e) => Some(JsonRpcResponse::failure(
                    None,
                    JsonRpcError::new(PARSE_ERROR, format!("Parse error: {e}")),
                )),
            };
            if let Some(response) = response {
                outbox.send(&response);
            }
        }
        info!("Client disconnected");

        drop(outbox);
        writer_task
            .await
            .map_err(|e| DocAiError::Internal(format!("MCP writer task failed: {e}")))?
            .map_err(transport_error)
    }

    /// Answer one request. Notifications (no `id`) get no response.
    pub async fn handle(
        &mut self,
        request: JsonRpcRequest,
        outbox: &Outbox,
    ) -> Option<JsonRpcResponse> {
        let Some(id) = request.id else {
            debug!("Notification: {}", request.method);
            return None;
        };
        debug!("Request: {}", request.method);

        let result = match request.method.as_str() {
            "initialize" => self.initialize(&request.params),
            "ping" => Ok(json!({})),
            "tools/list" => self.require_initialized().and_then(|_| tools_list()),
            "tools/call" => match self.require_initialized() {
                Ok(()) => self.call_tool(request.params, outbox).await,
                Err(e) => Err(e),
            },
            other => Err(JsonRpcError::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            )),
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(error) => JsonRpcResponse::failure(Some(id), error),
        })
    }

    fn initialize(&mut self, params: &Value) -> Result<Value, JsonRpcError> {
        let version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or(PROTOCOL_VERSION);
        self.initialized = true;
        info!("Initialized (protocol {})", version);

        to_value(InitializeResult {
            protocol_version: version.to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability::default(),
                logging: Some(json!({})),
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        })
    }

    fn require_initialized(&self) -> Result<(), JsonRpcError> {
        if self.initialized {
            Ok(())
        } else {
            Err(JsonRpcError::new(INVALID_REQUEST, "Server not initialized"))
        }
    }

    async fn call_tool(&self, params: Value, outbox: &Outbox) -> Result<Value, JsonRpcError> {
        let params: ToolCallParams = serde_json::from_value(params)
            .map_err(|e| JsonRpcError::new(INVALID_PARAMS, format!("Invalid tool call: {e}")))?;
        info!("Tool call: {}", params.name);

        let progress = ToolCallProgress {
            outbox: outbox.clone(),
            token: params.meta.and_then(|m| m.progress_token),
        };
        let pipeline = self.pipeline.with_progress_callback(Arc::new(progress));

        let reply = match params.name.as_str() {
            PARSE_DOCUMENT => match serde_json::from_value::<ParseDocumentArgs>(params.arguments) {
                Ok(args) => parse_document_tool(&pipeline, &args.file_path).await,
                Err(e) => ToolReply::failure(format!("Invalid arguments: {e}")),
            },
            EXTRACT_INFORMATION => {
                match serde_json::from_value::<ExtractInformationArgs>(params.arguments) {
                    Ok(args) => {
                        extract_information_tool(
                            &pipeline,
                            &args.file_path,
                            args.schema_path.as_deref(),
                            args.auto_generate_schema,
                        )
                        .await
                    }
                    Err(e) => ToolReply::failure(format!("Invalid arguments: {e}")),
                }
            }
            other => ToolReply::Failure(format!("Unknown tool: {other}")),
        };

        to_value(ToolCallResult::from(reply))
    }
}

fn tools_list() -> Result<Value, JsonRpcError> {
    to_value(ToolsListResult {
        tools: vec![
            Tool {
                name: PARSE_DOCUMENT.to_string(),
                description: "Parse a document using Upstage AI's document digitization API. \
                              Returns the document content as JSON and saves the full \
                              response to disk."
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "file_path": {
                            "type": "string",
                            "description": "Path to the document file to be processed"
                        }
                    },
                    "required": ["file_path"]
                }),
            },
            Tool {
                name: EXTRACT_INFORMATION.to_string(),
                description: "Extract structured information from documents using Upstage \
                              Universal Information Extraction. Supports JPEG, PNG, BMP, PDF, \
                              TIFF, HEIC, DOCX, PPTX and XLSX files up to 50MB."
                    .to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "file_path": {
                            "type": "string",
                            "description": "Path to the document file to process"
                        },
                        "schema_path": {
                            "type": "string",
                            "description":
                                "Path to JSON file containing the extraction schema (optional)"
                        },
                        "auto_generate_schema": {
                            "type": "boolean",
                            "description": "Whether to automatically generate a schema",
                            "default": true
                        }
                    },
                    "required": ["file_path"]
                }),
            },
        ],
    })
}

fn to_value<T: Serialize>(value: T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::new(INTERNAL_ERROR, e.to_string()))
}

fn transport_error(e: std::io::Error) -> DocAiError {
    DocAiError::Internal(format!("MCP transport error: {e}"))
}
