//! Pipeline integration tests against a scripted in-process provider.
//!
//! No network access: every remote call is answered from a queue of canned
//! replies, and every call is recorded so tests can assert what was (or was
//! not) sent.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use upstage_docai::provider::{ChatEndpoint, ChatRequest, DocumentUpload};
use upstage_docai::{
    extract_information_tool, parse_document_tool, ArtifactKind, DocAiConfig, DocAiError,
    DocumentAiProvider, ExtractionRequest, Pipeline, PipelineProgressCallback, SchemaProvenance,
    Stage,
};

// ── Test helpers ─────────────────────────────────────────────────────────────

enum Reply {
    Json(Value),
    Http(u16, &'static str),
}

#[derive(Default)]
struct FakeProvider {
    replies: Mutex<VecDeque<Reply>>,
    chats: Mutex<Vec<(ChatEndpoint, Value)>>,
    uploads: Mutex<Vec<(String, String)>>,
}

impl FakeProvider {
    fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        })
    }

    fn endpoints(&self) -> Vec<ChatEndpoint> {
        self.chats.lock().unwrap().iter().map(|(e, _)| *e).collect()
    }

    fn total_calls(&self) -> usize {
        self.chats.lock().unwrap().len() + self.uploads.lock().unwrap().len()
    }

    fn next(&self) -> Result<Value, DocAiError> {
        match self.replies.lock().unwrap().pop_front() {
            Some(Reply::Json(v)) => Ok(v),
            Some(Reply::Http(status, body)) => Err(DocAiError::RemoteHttp {
                status,
                body: body.to_string(),
            }),
            None => panic!("unexpected remote call"),
        }
    }
}

#[async_trait]
impl DocumentAiProvider for FakeProvider {
    async fn digitize(&self, upload: DocumentUpload) -> Result<Value, DocAiError> {
        self.uploads
            .lock()
            .unwrap()
            .push((upload.file_name, upload.mime_type));
        self.next()
    }

    async fn chat(
        &self,
        endpoint: ChatEndpoint,
        request: &ChatRequest,
    ) -> Result<Value, DocAiError> {
        let body = serde_json::to_value(request).unwrap();
        self.chats.lock().unwrap().push((endpoint, body));
        self.next()
    }
}

#[derive(Default)]
struct Recorder {
    percents: Mutex<Vec<u8>>,
    warnings: Mutex<Vec<String>>,
    failed_in: Mutex<Option<Stage>>,
}

impl PipelineProgressCallback for Recorder {
    fn on_stage(&self, _stage: Stage, percent: u8) {
        self.percents.lock().unwrap().push(percent);
    }

    fn on_warning(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }

    fn on_run_failed(&self, stage: Stage, _error: &str) {
        *self.failed_in.lock().unwrap() = Some(stage);
    }
}

fn chat_reply(content: &Value) -> Reply {
    Reply::Json(json!({
        "choices": [{"message": {"role": "assistant", "content": content.to_string()}}]
    }))
}

fn invoice_schema() -> Value {
    json!({
        "name": "invoice",
        "schema": {
            "type": "object",
            "properties": {
                "vendor": {"type": "string"},
                "total": {"type": "number"}
            }
        }
    })
}

async fn pipeline_with(
    tmp: &TempDir,
    provider: Arc<FakeProvider>,
    recorder: Option<Arc<Recorder>>,
) -> Pipeline {
    let mut builder = DocAiConfig::builder()
        .provider(provider)
        .output_root(tmp.path().join("outputs"));
    if let Some(rec) = recorder {
        builder = builder.progress_callback(rec);
    }
    Pipeline::new(builder.build().unwrap()).await.unwrap()
}

fn write_input(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"%PDF-1.4 fake").unwrap();
    path
}

fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

/// Swap an output directory for a plain file so writes into it fail.
fn block_dir(dir: &Path) {
    std::fs::remove_dir_all(dir).unwrap();
    std::fs::write(dir, b"not a directory").unwrap();
}

fn outputs(tmp: &TempDir) -> PathBuf {
    tmp.path().join("outputs")
}

// ── Extraction ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn invoice_with_generated_schema() {
    let tmp = TempDir::new().unwrap();
    let provider = FakeProvider::new(vec![
        chat_reply(&json!({"json_schema": invoice_schema()})),
        chat_reply(&json!({"vendor": "Acme", "total": 42.0})),
    ]);
    let pipeline = pipeline_with(&tmp, provider.clone(), None).await;
    let input = write_input(tmp.path(), "invoice.pdf");

    let output = pipeline
        .extract_information(&ExtractionRequest::new(&input))
        .await
        .unwrap();

    assert_eq!(output.extracted_data, json!({"vendor": "Acme", "total": 42.0}));
    assert_eq!(output.metadata.file, "invoice.pdf");

    let schema_path = outputs(&tmp).join("information_extraction/schemas/invoice_schema.json");
    let result_path = outputs(&tmp).join("information_extraction/invoice_extraction.json");
    assert_eq!(output.metadata.schema_used, schema_path);
    assert_eq!(output.metadata.result_saved_to, result_path);
    assert_eq!(
        output.provenance,
        Some(SchemaProvenance::AutoGenerated(schema_path.clone()))
    );

    assert_eq!(read_json(&schema_path), invoice_schema());
    assert_eq!(read_json(&result_path), output.extracted_data);

    assert_eq!(
        provider.endpoints(),
        vec![ChatEndpoint::SchemaGeneration, ChatEndpoint::InformationExtraction]
    );
    let chats = provider.chats.lock().unwrap();
    let extraction_body = &chats[1].1;
    assert_eq!(extraction_body["model"], "information-extract");
    assert_eq!(extraction_body["response_format"]["type"], "json_schema");
    assert_eq!(extraction_body["response_format"]["json_schema"], invoice_schema());
    assert!(extraction_body["messages"][0]["content"][0]["image_url"]["url"]
        .as_str()
        .unwrap()
        .starts_with("data:application/pdf;base64,"));
}

#[tokio::test]
async fn user_schema_beats_auto_generation() {
    let tmp = TempDir::new().unwrap();
    let provider = FakeProvider::new(vec![chat_reply(&json!({"vendor": "Acme"}))]);
    let pipeline = pipeline_with(&tmp, provider.clone(), None).await;
    let input = write_input(tmp.path(), "invoice.pdf");
    let schema_file = tmp.path().join("my_schema.json");
    std::fs::write(&schema_file, invoice_schema().to_string()).unwrap();

    let request = ExtractionRequest::new(&input)
        .schema_path(&schema_file)
        .auto_generate_schema(true);
    let output = pipeline.extract_information(&request).await.unwrap();

    assert_eq!(output.metadata.schema_used, schema_file);
    assert_eq!(provider.endpoints(), vec![ChatEndpoint::InformationExtraction]);
    assert!(!pipeline
        .layout()
        .artifact_path(ArtifactKind::GeneratedSchema, "invoice")
        .exists());
}

#[tokio::test]
async fn missing_file_fails_before_any_call() {
    let tmp = TempDir::new().unwrap();
    let provider = FakeProvider::new(vec![]);
    let pipeline = pipeline_with(&tmp, provider.clone(), None).await;

    let failure = pipeline
        .extract_information(&ExtractionRequest::new(tmp.path().join("missing.pdf")))
        .await
        .unwrap_err();

    assert_eq!(failure.stage, Stage::Validating);
    assert!(matches!(failure.source, DocAiError::FileNotFound { .. }));
    assert!(failure.to_string().starts_with("File not found at"));
    assert_eq!(provider.total_calls(), 0);
}

#[tokio::test]
async fn unsupported_extension_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let provider = FakeProvider::new(vec![]);
    let pipeline = pipeline_with(&tmp, provider.clone(), None).await;
    let input = write_input(tmp.path(), "notes.txt");

    let failure = pipeline
        .extract_information(&ExtractionRequest::new(&input))
        .await
        .unwrap_err();

    match failure.source {
        DocAiError::UnsupportedFormat { ref extension } => assert_eq!(extension, ".txt"),
        ref other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(provider.total_calls(), 0);
}

#[tokio::test]
async fn no_schema_and_no_generation_fails_before_extraction() {
    let tmp = TempDir::new().unwrap();
    let provider = FakeProvider::new(vec![]);
    let pipeline = pipeline_with(&tmp, provider.clone(), None).await;
    let input = write_input(tmp.path(), "invoice.pdf");

    let failure = pipeline
        .extract_information(&ExtractionRequest::new(&input).auto_generate_schema(false))
        .await
        .unwrap_err();

    assert_eq!(failure.stage, Stage::ResolvingSchema);
    assert!(matches!(failure.source, DocAiError::NoSchemaAvailable));
    assert_eq!(provider.total_calls(), 0);
}

#[tokio::test]
async fn malformed_schema_file_is_a_load_error() {
    let tmp = TempDir::new().unwrap();
    let provider = FakeProvider::new(vec![]);
    let pipeline = pipeline_with(&tmp, provider.clone(), None).await;
    let input = write_input(tmp.path(), "invoice.pdf");
    let schema_file = tmp.path().join("broken.json");
    std::fs::write(&schema_file, "{\"name\": ").unwrap();

    let failure = pipeline
        .extract_information(&ExtractionRequest::new(&input).schema_path(&schema_file))
        .await
        .unwrap_err();

    assert!(matches!(failure.source, DocAiError::SchemaLoad { .. }));
    assert!(failure.to_string().starts_with("Error loading schema from"));
    assert_eq!(provider.total_calls(), 0);
}

#[tokio::test]
async fn rate_limited_extraction_leaves_no_result() {
    let tmp = TempDir::new().unwrap();
    let provider = FakeProvider::new(vec![
        chat_reply(&json!({"json_schema": invoice_schema()})),
        Reply::Http(429, "Too Many Requests"),
    ]);
    let recorder = Arc::new(Recorder::default());
    let pipeline = pipeline_with(&tmp, provider, Some(recorder.clone())).await;
    let input = write_input(tmp.path(), "invoice.pdf");

    let reply = extract_information_tool(&pipeline, input.to_str().unwrap(), None, true).await;

    assert!(reply.is_error());
    assert_eq!(
        reply.text(),
        "Error: HTTP error from Upstage API: 429 - Too Many Requests"
    );
    assert_eq!(*recorder.failed_in.lock().unwrap(), Some(Stage::Extracting));
    assert!(!pipeline
        .layout()
        .artifact_path(ArtifactKind::ExtractionResult, "invoice")
        .exists());
}

#[tokio::test]
async fn schema_generation_failure_is_wrapped() {
    let tmp = TempDir::new().unwrap();
    let provider = FakeProvider::new(vec![Reply::Http(500, "boom")]);
    let pipeline = pipeline_with(&tmp, provider, None).await;
    let input = write_input(tmp.path(), "invoice.pdf");

    let failure = pipeline
        .extract_information(&ExtractionRequest::new(&input))
        .await
        .unwrap_err();

    assert_eq!(failure.stage, Stage::ResolvingSchema);
    assert_eq!(
        failure.to_string(),
        "Error generating schema: HTTP error from Upstage API: 500 - boom"
    );
}

#[tokio::test]
async fn empty_generated_schema_stops_before_extraction() {
    let tmp = TempDir::new().unwrap();
    let provider = FakeProvider::new(vec![chat_reply(&json!({"json_schema": {}}))]);
    let pipeline = pipeline_with(&tmp, provider.clone(), None).await;
    let input = write_input(tmp.path(), "invoice.pdf");

    let failure = pipeline
        .extract_information(&ExtractionRequest::new(&input))
        .await
        .unwrap_err();

    assert_eq!(failure.stage, Stage::ResolvingSchema);
    match failure.source {
        DocAiError::SchemaGeneration(ref inner) => {
            assert!(matches!(**inner, DocAiError::MalformedResponse { .. }), "{inner:?}")
        }
        ref other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(provider.endpoints(), vec![ChatEndpoint::SchemaGeneration]);
    assert!(!pipeline
        .layout()
        .artifact_path(ArtifactKind::GeneratedSchema, "invoice")
        .exists());
}

#[tokio::test]
async fn non_object_schema_files_are_rejected_without_calls() {
    let tmp = TempDir::new().unwrap();
    let provider = FakeProvider::new(vec![]);
    let pipeline = pipeline_with(&tmp, provider.clone(), None).await;
    let input = write_input(tmp.path(), "invoice.pdf");

    for (name, body) in [("list.json", "[]"), ("blank.json", "\"\""), ("flag.json", "false")] {
        let schema_file = tmp.path().join(name);
        std::fs::write(&schema_file, body).unwrap();

        let failure = pipeline
            .extract_information(&ExtractionRequest::new(&input).schema_path(&schema_file))
            .await
            .unwrap_err();

        assert!(
            matches!(failure.source, DocAiError::SchemaLoad { .. }),
            "{name}: {:?}",
            failure.source
        );
    }
    assert_eq!(provider.total_calls(), 0);
}

#[tokio::test]
async fn unwritable_schema_dir_is_fatal_before_extraction() {
    let tmp = TempDir::new().unwrap();
    let provider = FakeProvider::new(vec![chat_reply(&json!({"json_schema": invoice_schema()}))]);
    let pipeline = pipeline_with(&tmp, provider.clone(), None).await;
    let input = write_input(tmp.path(), "invoice.pdf");
    block_dir(&pipeline.layout().schemas_dir());

    let failure = pipeline
        .extract_information(&ExtractionRequest::new(&input))
        .await
        .unwrap_err();

    assert_eq!(failure.stage, Stage::ResolvingSchema);
    assert!(
        matches!(failure.source, DocAiError::Persistence { .. }),
        "{:?}",
        failure.source
    );
    assert_eq!(provider.endpoints(), vec![ChatEndpoint::SchemaGeneration]);
}

#[tokio::test]
async fn unwritable_result_dir_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let schema_file = tmp.path().join("schema.json");
    std::fs::write(&schema_file, invoice_schema().to_string()).unwrap();
    let provider = FakeProvider::new(vec![chat_reply(&json!({"vendor": "Acme"}))]);
    let recorder = Arc::new(Recorder::default());
    let pipeline = pipeline_with(&tmp, provider.clone(), Some(recorder.clone())).await;
    let input = write_input(tmp.path(), "invoice.pdf");
    block_dir(&pipeline.layout().info_extraction_dir());

    let reply = extract_information_tool(
        &pipeline,
        input.to_str().unwrap(),
        schema_file.to_str(),
        false,
    )
    .await;

    assert!(reply.is_error());
    assert!(
        reply.text().starts_with("Error: Failed to write artifact"),
        "{}",
        reply.text()
    );
    assert_eq!(*recorder.failed_in.lock().unwrap(), Some(Stage::Persisting));
    assert_eq!(provider.endpoints(), vec![ChatEndpoint::InformationExtraction]);
}

#[tokio::test]
async fn progress_is_strictly_increasing_and_ends_at_100() {
    let tmp = TempDir::new().unwrap();
    let provider = FakeProvider::new(vec![
        chat_reply(&json!({"json_schema": invoice_schema()})),
        chat_reply(&json!({"vendor": "Acme"})),
    ]);
    let recorder = Arc::new(Recorder::default());
    let pipeline = pipeline_with(&tmp, provider, Some(recorder.clone())).await;
    let input = write_input(tmp.path(), "invoice.pdf");

    pipeline
        .extract_information(&ExtractionRequest::new(&input))
        .await
        .unwrap();

    let percents = recorder.percents.lock().unwrap().clone();
    assert_eq!(percents, vec![5, 10, 15, 50, 90, 100]);
    assert!(percents.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn concurrent_runs_on_distinct_inputs_do_not_interfere() {
    let tmp = TempDir::new().unwrap();
    let schema_file = tmp.path().join("schema.json");
    std::fs::write(&schema_file, invoice_schema().to_string()).unwrap();
    let provider = FakeProvider::new(vec![
        chat_reply(&json!({"vendor": "same"})),
        chat_reply(&json!({"vendor": "same"})),
    ]);
    let pipeline = Arc::new(pipeline_with(&tmp, provider, None).await);

    let a = write_input(tmp.path(), "a.pdf");
    let b = write_input(tmp.path(), "b.png");
    let req_a = ExtractionRequest::new(&a).schema_path(&schema_file);
    let req_b = ExtractionRequest::new(&b).schema_path(&schema_file);

    let (ra, rb) = tokio::join!(
        pipeline.extract_information(&req_a),
        pipeline.extract_information(&req_b)
    );

    let (ra, rb) = (ra.unwrap(), rb.unwrap());
    assert_ne!(ra.metadata.result_saved_to, rb.metadata.result_saved_to);
    assert!(ra.metadata.result_saved_to.exists());
    assert!(rb.metadata.result_saved_to.exists());
}

// ── Parsing ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn parse_returns_content_and_saves_full_response() {
    let tmp = TempDir::new().unwrap();
    let response = json!({
        "api": "2.0",
        "content": {"html": "<h1>Report</h1>", "markdown": "# Report"},
        "elements": []
    });
    let provider = FakeProvider::new(vec![Reply::Json(response.clone())]);
    let pipeline = pipeline_with(&tmp, provider.clone(), None).await;
    let input = write_input(tmp.path(), "report.pdf");

    let output = pipeline.parse_document(&input).await.unwrap();

    assert_eq!(output.content, response["content"]);
    assert!(output.warning.is_none());
    let saved = output.saved_to.unwrap();
    assert_eq!(saved, outputs(&tmp).join("document_parsing/report_upstage.json"));
    let on_disk: Value = serde_json::from_slice(&std::fs::read(&saved).unwrap()).unwrap();
    assert_eq!(on_disk, response);

    let uploads = provider.uploads.lock().unwrap();
    assert_eq!(
        uploads.as_slice(),
        &[("report.pdf".to_string(), "application/pdf".to_string())]
    );
}

#[tokio::test]
async fn parse_without_content_field_returns_empty_object() {
    let tmp = TempDir::new().unwrap();
    let provider = FakeProvider::new(vec![Reply::Json(json!({"elements": []}))]);
    let pipeline = pipeline_with(&tmp, provider, None).await;
    let input = write_input(tmp.path(), "blank.pdf");

    let output = pipeline.parse_document(&input).await.unwrap();
    assert_eq!(output.content, json!({}));
}

#[tokio::test]
async fn parse_survives_unwritable_output() {
    let tmp = TempDir::new().unwrap();
    let provider = FakeProvider::new(vec![Reply::Json(json!({"content": {"text": "hi"}}))]);
    let recorder = Arc::new(Recorder::default());
    let pipeline = pipeline_with(&tmp, provider, Some(recorder.clone())).await;
    let input = write_input(tmp.path(), "memo.pdf");

    block_dir(&pipeline.layout().doc_parsing_dir());

    let reply = parse_document_tool(&pipeline, input.to_str().unwrap()).await;

    assert!(!reply.is_error());
    assert_eq!(
        reply.text(),
        "{\"text\":\"hi\"}\n\nNote: Could not save the full response to disk."
    );
    assert_eq!(recorder.warnings.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn parse_failure_is_reported_in_parsing_stage() {
    let tmp = TempDir::new().unwrap();
    let provider = FakeProvider::new(vec![Reply::Http(413, "Payload Too Large")]);
    let recorder = Arc::new(Recorder::default());
    let pipeline = pipeline_with(&tmp, provider, Some(recorder.clone())).await;
    let input = write_input(tmp.path(), "huge.pdf");

    let failure = pipeline.parse_document(&input).await.unwrap_err();

    assert_eq!(failure.stage, Stage::Parsing);
    assert_eq!(*recorder.failed_in.lock().unwrap(), Some(Stage::Parsing));
    assert_eq!(*recorder.percents.lock().unwrap(), vec![5, 10, 50]);
}

#[tokio::test]
async fn parse_of_missing_file_is_an_error_reply() {
    let tmp = TempDir::new().unwrap();
    let provider = FakeProvider::new(vec![]);
    let pipeline = pipeline_with(&tmp, provider.clone(), None).await;
    let missing = tmp.path().join("ghost.pdf");

    let reply = parse_document_tool(&pipeline, missing.to_str().unwrap()).await;

    assert!(reply.is_error());
    assert_eq!(
        reply.into_text(),
        format!("Error: File not found at {}", missing.display())
    );
    assert_eq!(provider.total_calls(), 0);
}
