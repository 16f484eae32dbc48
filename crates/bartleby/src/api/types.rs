//! Wire types for the catalog backend.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::upload::{FileKind, UploadedFileRef};

// ============================================================================
// Catalog records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub dimensions: Option<String>,
    #[serde(default)]
    pub origin_source: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub import_cost: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub retail_price: Option<f64>,
    #[serde(default)]
    pub key_tags: Option<Value>,
    /// Columns of custom inventory tables.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub journal_publisher: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub publication_year: Option<f64>,
    #[serde(default)]
    pub page_length: Option<Value>,
    #[serde(default)]
    pub thesis: Option<String>,
    #[serde(default)]
    pub issue: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub hashtags: Option<Value>,
    #[serde(default)]
    pub influenced_by: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Accepts numbers, numeric strings, and null. Anything unparsable becomes `None`.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

// ============================================================================
// Search
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub similarity: f64,
    #[serde(default)]
    pub excerpt: Option<String>,
}

impl SearchResult {
    /// Similarity as a rounded percentage, as shown next to each hit.
    pub fn relevance_percent(&self) -> u32 {
        (self.similarity * 100.0).round().clamp(0.0, 100.0) as u32
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub results: Option<Vec<SearchResult>>,
}

// ============================================================================
// Reset / export
// ============================================================================

#[derive(Debug, Clone, Default, Serialize)]
pub(crate) struct ResetRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_name: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    Inventory,
    Documents,
}

impl ExportKind {
    pub(crate) fn endpoint(&self) -> &'static str {
        match self {
            ExportKind::Inventory => "export-inventory",
            ExportKind::Documents => "export-documents",
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportKind::Inventory => write!(f, "inventory"),
            ExportKind::Documents => write!(f, "documents"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Xls,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Csv => write!(f, "csv"),
            ExportFormat::Xls => write!(f, "xls"),
        }
    }
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Value,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl User {
    /// The id as it appears in query strings (`7`, not `"7"`).
    pub fn id_param(&self) -> String {
        match &self.id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct EmailLoginRequest<'a> {
    pub email: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct GoogleLoginRequest<'a> {
    pub token: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserExport {
    pub id: Value,
    pub file_name: String,
    pub export_type: String,
    #[serde(default)]
    pub created_at: Option<String>,
    pub file_url: String,
}

// ============================================================================
// Processing jobs
// ============================================================================

/// Entry of the per-kind sub-lists of a job submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub original_name: String,
    pub blob_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTypes {
    pub images: Vec<FileEntry>,
    pub documents: Vec<FileEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessFilesRequest {
    pub files: Vec<UploadedFileRef>,
    pub instruction: String,
    pub file_types: FileTypes,
}

impl ProcessFilesRequest {
    /// Partitions the uploaded files into image and document sub-lists by type tag.
    pub fn new(files: &[UploadedFileRef], instruction: &str) -> Self {
        let mut file_types = FileTypes::default();
        for file in files {
            let entry = FileEntry {
                original_name: file.original_name.clone(),
                blob_url: file.blob_url.clone(),
            };
            match file.file_type {
                FileKind::Image => file_types.images.push(entry),
                FileKind::Document => file_types.documents.push(entry),
            }
        }

        Self {
            files: files.to_vec(),
            instruction: instruction.to_string(),
            file_types,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessFilesResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ProcessFilesResponse {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// Job status as reported by the backend. Unknown values are kept and treated as
/// still running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Other(String),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pending" => JobStatus::Pending,
            "in_progress" => JobStatus::InProgress,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Other(value),
        }
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.to_string()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::InProgress => write!(f, "in_progress"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub status: JobStatus,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl JobStatusResponse {
    /// Progress clamped to 0-100.
    pub fn progress_percent(&self) -> u8 {
        self.progress
            .filter(|p| p.is_finite())
            .map(|p| p.round().clamp(0.0, 100.0) as u8)
            .unwrap_or(0)
    }
}
