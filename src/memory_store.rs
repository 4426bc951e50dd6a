//! In-memory [`Store`] implementation for testing.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread safety.
//! Semantics mirror the SQLite backend: chunk replacement is wholesale,
//! job creation refuses a second active job per document, and tag usage
//! counters move only when an association actually changes.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    ChunkRecord, Document, DocumentStats, DocumentStatus, ProcessingJob, Tag,
};
use crate::store::Store;

/// In-memory store for tests.
pub struct MemoryStore {
    docs: RwLock<HashMap<String, Document>>,
    chunks: RwLock<Vec<ChunkRecord>>,
    jobs: RwLock<HashMap<String, ProcessingJob>>,
    tags: RwLock<HashMap<String, Tag>>,
    doc_tags: RwLock<HashSet<(String, String)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
            chunks: RwLock::new(Vec::new()),
            jobs: RwLock::new(HashMap::new()),
            tags: RwLock::new(HashMap::new()),
            doc_tags: RwLock::new(HashSet::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_document(&self, doc: &Document) -> Result<()> {
        let mut docs = self.docs.write().unwrap();
        if docs.contains_key(&doc.id) {
            bail!("document {} already exists", doc.id);
        }
        docs.insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let docs = self.docs.read().unwrap();
        Ok(docs.get(id).cloned())
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        let docs = self.docs.read().unwrap();
        let mut out: Vec<Document> = docs
            .values()
            .filter(|d| d.status != DocumentStatus::Deleted)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(out)
    }

    async fn update_document_status(&self, id: &str, status: DocumentStatus) -> Result<()> {
        let mut docs = self.docs.write().unwrap();
        if let Some(doc) = docs.get_mut(id) {
            doc.status = status;
        }
        Ok(())
    }

    async fn update_document_stats(
        &self,
        id: &str,
        stats: &DocumentStats,
        processed_at: i64,
    ) -> Result<()> {
        let mut docs = self.docs.write().unwrap();
        if let Some(doc) = docs.get_mut(id) {
            doc.page_count = Some(stats.page_count);
            doc.word_count = Some(stats.word_count);
            doc.character_count = Some(stats.character_count);
            doc.processed_at = Some(processed_at);
        }
        Ok(())
    }

    async fn mark_deleted(&self, id: &str) -> Result<()> {
        self.update_document_status(id, DocumentStatus::Deleted)
            .await
    }

    async fn replace_chunks(&self, document_id: &str, chunks: &[ChunkRecord]) -> Result<()> {
        let mut stored = self.chunks.write().unwrap();
        stored.retain(|c| c.document_id != document_id);
        stored.extend(chunks.iter().cloned());
        Ok(())
    }

    async fn get_chunks(&self, document_id: &str) -> Result<Vec<ChunkRecord>> {
        let stored = self.chunks.read().unwrap();
        let mut out: Vec<ChunkRecord> = stored
            .iter()
            .filter(|c| c.document_id == document_id)
            .cloned()
            .collect();
        out.sort_by_key(|c| c.chunk_index);
        Ok(out)
    }

    async fn create_job(&self, job: &ProcessingJob) -> Result<()> {
        let mut jobs = self.jobs.write().unwrap();
        let active = jobs
            .values()
            .any(|j| j.document_id == job.document_id && !j.status.is_terminal());
        if active {
            bail!(
                "document {} already has an active processing job",
                job.document_id
            );
        }
        jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn update_job(&self, job: &ProcessingJob) -> Result<()> {
        let mut jobs = self.jobs.write().unwrap();
        if let Some(stored) = jobs.get_mut(&job.id) {
            // cancel_requested is owned by request_cancel, not the worker.
            let cancel_requested = stored.cancel_requested;
            *stored = job.clone();
            stored.cancel_requested = cancel_requested;
        }
        Ok(())
    }

    async fn get_job(&self, id: &str) -> Result<Option<ProcessingJob>> {
        let jobs = self.jobs.read().unwrap();
        Ok(jobs.get(id).cloned())
    }

    async fn request_cancel(&self, job_id: &str) -> Result<bool> {
        let mut jobs = self.jobs.write().unwrap();
        match jobs.get_mut(job_id) {
            Some(job) if !job.status.is_terminal() => {
                job.cancel_requested = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn cancel_requested(&self, job_id: &str) -> Result<bool> {
        let jobs = self.jobs.read().unwrap();
        Ok(jobs.get(job_id).map(|j| j.cancel_requested).unwrap_or(false))
    }

    async fn tag_document(&self, document_id: &str, name: &str) -> Result<()> {
        let mut tags = self.tags.write().unwrap();
        let mut doc_tags = self.doc_tags.write().unwrap();

        let tag = tags.entry(name.to_string()).or_insert_with(|| Tag {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            is_system: false,
            usage_count: 0,
        });
        if doc_tags.insert((document_id.to_string(), tag.id.clone())) {
            tag.usage_count += 1;
        }
        Ok(())
    }

    async fn untag_document(&self, document_id: &str, name: &str) -> Result<()> {
        let mut tags = self.tags.write().unwrap();
        let mut doc_tags = self.doc_tags.write().unwrap();

        if let Some(tag) = tags.get_mut(name) {
            if doc_tags.remove(&(document_id.to_string(), tag.id.clone())) {
                tag.usage_count = (tag.usage_count - 1).max(0);
            }
        }
        Ok(())
    }

    async fn document_tags(&self, document_id: &str) -> Result<Vec<Tag>> {
        let tags = self.tags.read().unwrap();
        let doc_tags = self.doc_tags.read().unwrap();
        let mut out: Vec<Tag> = tags
            .values()
            .filter(|t| doc_tags.contains(&(document_id.to_string(), t.id.clone())))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn get_tag(&self, name: &str) -> Result<Option<Tag>> {
        let tags = self.tags.read().unwrap();
        Ok(tags.get(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobStatus;
    use chrono::Utc;

    fn doc(id: &str) -> Document {
        Document {
            id: id.to_string(),
            owner_id: "user1".to_string(),
            title: format!("{id}.txt"),
            author: None,
            source: None,
            language: None,
            year: None,
            version: None,
            document_type: crate::models::DocumentType::PlainText,
            engine: "builtin".to_string(),
            options_json: "{}".to_string(),
            page_count: None,
            word_count: None,
            character_count: None,
            uploaded_at: Utc::now().timestamp(),
            processed_at: None,
            status: DocumentStatus::Uploading,
        }
    }

    #[tokio::test]
    async fn second_active_job_is_rejected() {
        let store = MemoryStore::new();
        store.insert_document(&doc("d1")).await.unwrap();

        let first = ProcessingJob::new("d1", "user1", "ingest", 3);
        store.create_job(&first).await.unwrap();

        let second = ProcessingJob::new("d1", "user1", "ingest", 3);
        assert!(store.create_job(&second).await.is_err());

        // Once terminal, a new job is allowed again.
        let mut done = first.clone();
        done.complete();
        store.update_job(&done).await.unwrap();
        assert_eq!(
            store.get_job(&first.id).await.unwrap().unwrap().status,
            JobStatus::Completed
        );
        store.create_job(&second).await.unwrap();
    }

    #[tokio::test]
    async fn tag_counter_does_not_double_count() {
        let store = MemoryStore::new();
        store.tag_document("d1", "report").await.unwrap();
        store.tag_document("d1", "report").await.unwrap();
        store.tag_document("d2", "report").await.unwrap();
        assert_eq!(store.get_tag("report").await.unwrap().unwrap().usage_count, 2);

        store.untag_document("d1", "report").await.unwrap();
        store.untag_document("d1", "report").await.unwrap();
        assert_eq!(store.get_tag("report").await.unwrap().unwrap().usage_count, 1);
    }

    #[tokio::test]
    async fn soft_deleted_documents_are_hidden_from_listing() {
        let store = MemoryStore::new();
        store.insert_document(&doc("d1")).await.unwrap();
        store.insert_document(&doc("d2")).await.unwrap();
        store.mark_deleted("d1").await.unwrap();

        let listed = store.list_documents().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "d2");
        // The row itself survives.
        assert!(store.get_document("d1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn replace_chunks_is_wholesale() {
        let store = MemoryStore::new();
        let make = |idx: i64, text: &str| ChunkRecord {
            id: Uuid::new_v4().to_string(),
            document_id: "d1".to_string(),
            chunk_index: idx,
            text: text.to_string(),
            token_count: 1,
            chunk_type: None,
            page_number: None,
            section_title: None,
            table_id: None,
            figure_id: None,
            start_offset: 0,
            end_offset: text.len() as i64,
            hash: String::new(),
        };

        store
            .replace_chunks("d1", &[make(0, "old a"), make(1, "old b"), make(2, "old c")])
            .await
            .unwrap();
        store
            .replace_chunks("d1", &[make(0, "new a")])
            .await
            .unwrap();

        let chunks = store.get_chunks("d1").await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "new a");
    }
}
