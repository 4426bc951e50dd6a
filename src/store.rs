//! Storage abstraction for the ingestion pipeline.
//!
//! The [`Store`] trait defines every persistence operation the pipeline
//! needs, enabling pluggable backends (SQLite for production, in-memory for
//! tests). Implementations must be `Send + Sync` to run under tokio.
//!
//! Transactional contract: [`Store::replace_chunks`] is all-or-nothing so a
//! reader never observes a partially-chunked document, and
//! [`Store::create_job`] refuses a second active job for the same document.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    ChunkRecord, Document, DocumentStats, DocumentStatus, ProcessingJob, Tag,
};

/// Abstract persistence backend.
#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_document(&self, doc: &Document) -> Result<()>;

    async fn get_document(&self, id: &str) -> Result<Option<Document>>;

    async fn list_documents(&self) -> Result<Vec<Document>>;

    async fn update_document_status(&self, id: &str, status: DocumentStatus) -> Result<()>;

    /// Write all derived counts and the processing timestamp in one step, so
    /// counts are never partially set.
    async fn update_document_stats(
        &self,
        id: &str,
        stats: &DocumentStats,
        processed_at: i64,
    ) -> Result<()>;

    /// Soft delete: the row survives while references exist.
    async fn mark_deleted(&self, id: &str) -> Result<()>;

    /// Replace all chunks for a document atomically.
    async fn replace_chunks(&self, document_id: &str, chunks: &[ChunkRecord]) -> Result<()>;

    /// Chunks for a document, ordered by chunk index.
    async fn get_chunks(&self, document_id: &str) -> Result<Vec<ChunkRecord>>;

    /// Create a job. Fails if the document already has a non-terminal job,
    /// which is what serializes pipeline executions per document.
    async fn create_job(&self, job: &ProcessingJob) -> Result<()>;

    async fn update_job(&self, job: &ProcessingJob) -> Result<()>;

    async fn get_job(&self, id: &str) -> Result<Option<ProcessingJob>>;

    /// Flag a job for cancellation. Returns `false` when the job is already
    /// terminal (nothing to cancel).
    async fn request_cancel(&self, job_id: &str) -> Result<bool>;

    /// Whether cancellation has been requested; polled at stage boundaries.
    async fn cancel_requested(&self, job_id: &str) -> Result<bool>;

    /// Associate a tag with a document, creating the tag if needed and
    /// atomically incrementing its usage counter. Re-tagging with the same
    /// name is a no-op (the counter does not double-count).
    async fn tag_document(&self, document_id: &str, name: &str) -> Result<()>;

    /// Remove a tag association, atomically decrementing the usage counter
    /// when an association was actually removed.
    async fn untag_document(&self, document_id: &str, name: &str) -> Result<()>;

    async fn document_tags(&self, document_id: &str) -> Result<Vec<Tag>>;

    async fn get_tag(&self, name: &str) -> Result<Option<Tag>>;
}
