//! Result types returned by the pipeline operations.

use crate::error::ArtifactWarning;
use crate::pipeline::schema::SchemaProvenance;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Successful result of [`crate::extract::Pipeline::extract_information`].
///
/// Serialises to the shape callers of the extraction tool receive:
///
/// ```json
/// {
///   "extracted_data": { "vendor": "Acme", "total": 42.0 },
///   "metadata": {
///     "file": "invoice.pdf",
///     "result_saved_to": "outputs/information_extraction/invoice_extraction.json",
///     "schema_used": "outputs/information_extraction/schemas/invoice_schema.json"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionOutput {
    /// Object returned by the extraction endpoint, untouched.
    pub extracted_data: Value,
    pub metadata: ExtractionMetadata,
    /// Where the schema came from. Not part of the serialised reply;
    /// `metadata.schema_used` carries its path.
    #[serde(skip)]
    pub provenance: Option<SchemaProvenance>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractionMetadata {
    /// File name of the input, without directories.
    pub file: String,
    pub result_saved_to: PathBuf,
    pub schema_used: PathBuf,
}

/// Successful result of [`crate::extract::Pipeline::parse_document`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseOutput {
    /// The `content` field of the parsing response (`{}` when absent).
    pub content: Value,
    /// Where the full response was saved, if saving succeeded.
    pub saved_to: Option<PathBuf>,
    /// Why the full response was not saved.
    pub warning: Option<ArtifactWarning>,
}
