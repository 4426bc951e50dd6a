//! Core data models for the ingestion pipeline.
//!
//! These types represent the documents, chunks, processing jobs, and tags
//! that flow through the pipeline and into the store.

/// Classification of an uploaded file, produced by [`crate::detect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentType {
    Pdf,
    Docx,
    PlainText,
    Markdown,
    Html,
    Json,
    Csv,
    Image,
    Audio,
    Video,
    Unknown,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Pdf => "pdf",
            DocumentType::Docx => "docx",
            DocumentType::PlainText => "text",
            DocumentType::Markdown => "markdown",
            DocumentType::Html => "html",
            DocumentType::Json => "json",
            DocumentType::Csv => "csv",
            DocumentType::Image => "image",
            DocumentType::Audio => "audio",
            DocumentType::Video => "video",
            DocumentType::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> DocumentType {
        match s {
            "pdf" => DocumentType::Pdf,
            "docx" => DocumentType::Docx,
            "text" => DocumentType::PlainText,
            "markdown" => DocumentType::Markdown,
            "html" => DocumentType::Html,
            "json" => DocumentType::Json,
            "csv" => DocumentType::Csv,
            "image" => DocumentType::Image,
            "audio" => DocumentType::Audio,
            "video" => DocumentType::Video,
            _ => DocumentType::Unknown,
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document lifecycle status. Transitions move forward only, except an
/// explicit reprocess which resets `Ready`/`Failed` back to `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    Uploading,
    Processing,
    Ready,
    Failed,
    Deleted,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Uploading => "uploading",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Ready => "ready",
            DocumentStatus::Failed => "failed",
            DocumentStatus::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> DocumentStatus {
        match s {
            "uploading" => DocumentStatus::Uploading,
            "processing" => DocumentStatus::Processing,
            "ready" => DocumentStatus::Ready,
            "deleted" => DocumentStatus::Deleted,
            _ => DocumentStatus::Failed,
        }
    }
}

/// One uploaded source file.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub author: Option<String>,
    pub source: Option<String>,
    pub language: Option<String>,
    pub year: Option<i64>,
    pub version: Option<String>,
    pub document_type: DocumentType,
    /// Processing engine label recorded on the document (e.g. `"builtin"`).
    pub engine: String,
    /// Opaque key/value bag of processing options, stored as JSON.
    pub options_json: String,
    pub page_count: Option<i64>,
    pub word_count: Option<i64>,
    pub character_count: Option<i64>,
    pub uploaded_at: i64,
    pub processed_at: Option<i64>,
    pub status: DocumentStatus,
}

/// Aggregate statistics derived by the enricher. Either all counts are
/// written to the document or none are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentStats {
    pub page_count: i64,
    pub word_count: i64,
    pub character_count: i64,
}

/// A metadata annotation anchored to a byte range of the extracted text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuralMarker {
    pub page_number: Option<i64>,
    pub section_title: Option<String>,
    pub table_id: Option<String>,
    pub figure_id: Option<String>,
    pub start_offset: usize,
    pub end_offset: usize,
}

/// One contiguous slice of a document's extracted text.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub id: String,
    pub document_id: String,
    /// Dense, zero-based, unique within a document.
    pub chunk_index: i64,
    pub text: String,
    pub token_count: i64,
    pub chunk_type: Option<String>,
    pub page_number: Option<i64>,
    pub section_title: Option<String>,
    pub table_id: Option<String>,
    pub figure_id: Option<String>,
    /// Byte offsets into the document's extracted text.
    pub start_offset: i64,
    pub end_offset: i64,
    /// SHA-256 of the chunk text, for idempotent-reprocess comparison.
    pub hash: String,
}

/// Processing job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> JobStatus {
        match s {
            "pending" => JobStatus::Pending,
            "running" => JobStatus::Running,
            "completed" => JobStatus::Completed,
            "cancelled" => JobStatus::Cancelled,
            _ => JobStatus::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// One tracked attempt (or retry sequence) to process a document.
#[derive(Debug, Clone)]
pub struct ProcessingJob {
    pub id: String,
    pub document_id: String,
    pub user_id: String,
    pub job_type: String,
    pub status: JobStatus,
    pub priority: i64,
    pub engine: String,
    pub options_json: String,
    /// Fractional progress in `[0.0, 1.0]`, monotonic within one attempt.
    pub progress: f64,
    pub current_step: String,
    pub total_steps: i64,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub cancel_requested: bool,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
}

/// A reusable label shared across documents, with a usage counter.
#[derive(Debug, Clone)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub is_system: bool,
    pub usage_count: i64,
}
