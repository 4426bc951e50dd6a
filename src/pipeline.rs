//! Ingestion pipeline orchestration.
//!
//! Runs the stages upload → detect → extract → chunk → enrich → persist for
//! one document per job, tracking progress and retries through the
//! [`ProcessingJob`] state machine. Raw upload bytes are kept under
//! `ingest.upload_dir` so a document can be reprocessed from its original
//! content at any time.
//!
//! Failure taxonomy: configuration errors, unsupported or empty content, and
//! chunking invariant violations fail a job immediately; parse failures,
//! persistence failures, and stage timeouts consume the retry budget with
//! exponential backoff. Cancellation is polled at stage boundaries and wins
//! over both.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::Semaphore;

use crate::chunker;
use crate::config::Config;
use crate::detect;
use crate::enrich;
use crate::extract::{ExtractionOptions, ExtractorRegistry};
use crate::indexer::VectorIndexer;
use crate::job::{STEP_CHUNK, STEP_DETECT, STEP_ENRICH, STEP_EXTRACT, STEP_PERSIST};
use crate::models::{Document, DocumentStatus, DocumentType, ProcessingJob};
use crate::store::Store;

/// Stage failure, classified for the retry loop.
#[derive(Debug)]
pub enum StageError {
    /// Invalid pipeline configuration. Never retried.
    Config(String),
    /// No extractor can produce text from this content. Never retried.
    Unsupported(String),
    /// Extraction produced no text. Never retried.
    EmptyDocument,
    /// A format library failed on the bytes. Retried.
    Extraction(String),
    /// Chunking precondition violation. Never retried.
    Chunking(String),
    /// Store write failed. Retried.
    Persistence(String),
    /// One attempt exceeded `ingest.processing_timeout_secs`. Retried.
    Timeout(u64),
    /// Cancellation was requested. Terminal, not a failure.
    Cancelled,
}

impl StageError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StageError::Extraction(_) | StageError::Persistence(_) | StageError::Timeout(_)
        )
    }
}

impl std::fmt::Display for StageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageError::Config(reason) => write!(f, "configuration error: {}", reason),
            StageError::Unsupported(reason) => write!(f, "unsupported content: {}", reason),
            StageError::EmptyDocument => write!(f, "document produced no extractable text"),
            StageError::Extraction(reason) => write!(f, "extraction failed: {}", reason),
            StageError::Chunking(reason) => write!(f, "chunking failed: {}", reason),
            StageError::Persistence(reason) => write!(f, "persistence failed: {}", reason),
            StageError::Timeout(secs) => write!(f, "processing timed out after {}s", secs),
            StageError::Cancelled => write!(f, "cancelled by request"),
        }
    }
}

impl std::error::Error for StageError {}

/// The ingestion pipeline. Cheap to share behind an [`Arc`]; the semaphore
/// bounds how many documents are mid-pipeline at once.
pub struct Pipeline {
    store: Arc<dyn Store>,
    indexer: Arc<dyn VectorIndexer>,
    extractors: ExtractorRegistry,
    config: Config,
    semaphore: Semaphore,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn Store>,
        indexer: Arc<dyn VectorIndexer>,
        extractors: ExtractorRegistry,
        config: Config,
    ) -> Self {
        let permits = config.ingest.batch_size.max(1);
        Self {
            store,
            indexer,
            extractors,
            config,
            semaphore: Semaphore::new(permits),
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn upload_path(&self, document_id: &str) -> PathBuf {
        self.config.ingest.upload_dir.join(document_id)
    }

    /// Accept an upload: validate it, persist the raw bytes and the document
    /// row, and create a pending ingestion job. Every rejection here happens
    /// before any job exists, so nothing is left to clean up.
    pub async fn submit(
        &self,
        filename: &str,
        content: &[u8],
        owner_id: &str,
        options: Option<ExtractionOptions>,
    ) -> Result<(Document, ProcessingJob)> {
        self.config.ingest.validate()?;

        if content.len() as u64 > self.config.ingest.max_file_size_bytes {
            anyhow::bail!(
                "upload '{}' is {} bytes, larger than the {} byte limit",
                filename,
                content.len(),
                self.config.ingest.max_file_size_bytes
            );
        }

        let document_type = detect::detect(content, filename);
        if !self.config.ingest.is_type_allowed(document_type.as_str()) {
            anyhow::bail!(
                "file type '{}' is not in ingest.supported_file_types",
                document_type
            );
        }

        let options = options.unwrap_or_else(|| self.default_options());
        let doc = Document {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            title: filename.to_string(),
            author: None,
            source: None,
            language: None,
            year: None,
            version: None,
            document_type,
            engine: "builtin".to_string(),
            options_json: options_to_json(&options),
            page_count: None,
            word_count: None,
            character_count: None,
            uploaded_at: Utc::now().timestamp(),
            processed_at: None,
            status: DocumentStatus::Uploading,
        };

        std::fs::create_dir_all(&self.config.ingest.upload_dir).with_context(|| {
            format!(
                "Failed to create upload directory {}",
                self.config.ingest.upload_dir.display()
            )
        })?;
        std::fs::write(self.upload_path(&doc.id), content)
            .with_context(|| format!("Failed to store upload for document {}", doc.id))?;

        self.store.insert_document(&doc).await?;

        let job = ProcessingJob::new(
            &doc.id,
            owner_id,
            "ingest",
            self.config.ingest.max_retries,
        );
        self.store.create_job(&job).await?;

        Ok((doc, job))
    }

    /// Run a pending job to a terminal state, retrying transient failures
    /// with exponential backoff. Returns the terminal job.
    pub async fn process(&self, job_id: &str) -> Result<ProcessingJob> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| anyhow::anyhow!("pipeline is shut down"))?;

        let mut job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("no such job: {}", job_id))?;
        if job.status.is_terminal() {
            anyhow::bail!(
                "job {} is already terminal ({})",
                job_id,
                job.status.as_str()
            );
        }
        let doc = self
            .store
            .get_document(&job.document_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("no such document: {}", job.document_id))?;

        let content = std::fs::read(self.upload_path(&doc.id))
            .with_context(|| format!("Failed to read stored upload for document {}", doc.id))?;
        let options = options_from_json(&doc.options_json, &self.default_options());

        job.start();
        self.store.update_job(&job).await?;
        self.store
            .update_document_status(&doc.id, DocumentStatus::Processing)
            .await?;

        loop {
            let timeout = Duration::from_secs(self.config.ingest.processing_timeout_secs);
            let attempt = tokio::time::timeout(
                timeout,
                self.attempt(&doc, &mut job, &content, &options),
            )
            .await
            .unwrap_or(Err(StageError::Timeout(
                self.config.ingest.processing_timeout_secs,
            )));

            match attempt {
                Ok(()) => {
                    job.complete();
                    self.store.update_job(&job).await?;
                    self.store
                        .update_document_status(&doc.id, DocumentStatus::Ready)
                        .await?;
                    self.finish_best_effort(&doc).await;
                    return Ok(job);
                }
                Err(StageError::Cancelled) => {
                    job.cancel();
                    self.store.update_job(&job).await?;
                    self.store
                        .update_document_status(&doc.id, DocumentStatus::Failed)
                        .await?;
                    return Ok(job);
                }
                Err(err) => {
                    let reason = err.to_string();
                    if err.is_retryable() && job.record_retry(&reason) {
                        let delay = Duration::from_secs(1 << (job.retry_count - 1).min(5));
                        self.store.update_job(&job).await?;
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    job.fail(&reason);
                    self.store.update_job(&job).await?;
                    self.store
                        .update_document_status(&doc.id, DocumentStatus::Failed)
                        .await?;
                    return Ok(job);
                }
            }
        }
    }

    /// Create (but do not run) a reprocess job for an existing document.
    /// Fails when the document is deleted, its stored upload is missing, or
    /// another job is still active.
    pub async fn reprocess_job(&self, document_id: &str) -> Result<ProcessingJob> {
        let doc = self
            .store
            .get_document(document_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("no such document: {}", document_id))?;
        if doc.status == DocumentStatus::Deleted {
            anyhow::bail!("document {} is deleted", document_id);
        }
        if !self.upload_path(document_id).exists() {
            anyhow::bail!(
                "no stored upload for document {}; cannot reprocess",
                document_id
            );
        }

        let job = ProcessingJob::new(
            document_id,
            &doc.owner_id,
            "reprocess",
            self.config.ingest.max_retries,
        );
        self.store.create_job(&job).await?;
        Ok(job)
    }

    /// Re-run the pipeline for an existing document from its stored upload
    /// bytes. Chunks are replaced wholesale, so no stale chunk survives.
    pub async fn reprocess(&self, document_id: &str) -> Result<ProcessingJob> {
        let job = self.reprocess_job(document_id).await?;
        self.process(&job.id).await
    }

    /// Soft-delete a document and drop it from the vector index. The stored
    /// upload bytes are removed; chunks stay behind the deleted flag.
    pub async fn delete(&self, document_id: &str) -> Result<()> {
        self.store.mark_deleted(document_id).await?;
        if let Err(e) = self.indexer.remove_document(document_id).await {
            eprintln!(
                "Warning: failed to remove document {} from index: {}",
                document_id, e
            );
        }
        let path = self.upload_path(document_id);
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                eprintln!(
                    "Warning: failed to remove stored upload {}: {}",
                    path.display(),
                    e
                );
            }
        }
        Ok(())
    }

    /// One pipeline attempt: detect → extract → chunk → enrich → persist.
    /// Progress moves 0.0 → 0.4 → 0.8 → 1.0 at stage boundaries; the job is
    /// saved after each advance so the status endpoint stays current.
    async fn attempt(
        &self,
        doc: &Document,
        job: &mut ProcessingJob,
        content: &[u8],
        options: &ExtractionOptions,
    ) -> Result<(), StageError> {
        // Config may have changed between submit and a reprocess.
        self.config
            .ingest
            .validate()
            .map_err(|e| StageError::Config(e.to_string()))?;

        self.check_cancel(&job.id).await?;
        job.advance(STEP_DETECT, 0.0);
        self.save_job(job).await?;

        let document_type = detect::detect(content, &doc.title);
        if document_type == DocumentType::Unknown {
            return Err(StageError::Unsupported(format!(
                "could not determine a document type for '{}'",
                doc.title
            )));
        }

        self.check_cancel(&job.id).await?;
        job.advance(STEP_EXTRACT, 0.0);
        self.save_job(job).await?;

        let extraction = self
            .extractors
            .extract(content, &doc.title, document_type, options)
            .map_err(|e| match e {
                crate::extract::ExtractError::Unsupported(reason) => {
                    StageError::Unsupported(reason)
                }
                crate::extract::ExtractError::EmptyDocument => StageError::EmptyDocument,
                crate::extract::ExtractError::Parse(reason) => StageError::Extraction(reason),
            })?;

        self.check_cancel(&job.id).await?;
        job.advance(STEP_CHUNK, 0.4);
        self.save_job(job).await?;

        let chunks = chunker::chunk(
            &doc.id,
            &extraction.text,
            &extraction.markers,
            self.config.ingest.chunk_size,
            self.config.ingest.chunk_overlap,
        )
        .map_err(|e| StageError::Chunking(e.to_string()))?;

        self.check_cancel(&job.id).await?;
        job.advance(STEP_ENRICH, 0.8);
        self.save_job(job).await?;

        let stats = enrich::compute_stats(&extraction);

        self.check_cancel(&job.id).await?;
        job.advance(STEP_PERSIST, 0.8);
        self.save_job(job).await?;

        self.store
            .replace_chunks(&doc.id, &chunks)
            .await
            .map_err(|e| StageError::Persistence(e.to_string()))?;
        self.store
            .update_document_stats(&doc.id, &stats, Utc::now().timestamp())
            .await
            .map_err(|e| StageError::Persistence(e.to_string()))?;

        Ok(())
    }

    /// Auto-tagging and vector indexing run after the job is complete and
    /// never fail it; the store already holds the source of truth.
    async fn finish_best_effort(&self, doc: &Document) {
        if self.config.tagging.enabled {
            match self.store.get_chunks(&doc.id).await {
                Ok(chunks) => {
                    let text: String = chunks
                        .iter()
                        .map(|c| c.text.as_str())
                        .collect::<Vec<_>>()
                        .join(" ");
                    for tag in enrich::auto_tags(&text, self.config.tagging.max_tags) {
                        if let Err(e) = self.store.tag_document(&doc.id, &tag).await {
                            eprintln!(
                                "Warning: failed to tag document {} with '{}': {}",
                                doc.id, tag, e
                            );
                        }
                    }
                }
                Err(e) => {
                    eprintln!("Warning: failed to load chunks for tagging: {}", e);
                }
            }
        }

        if self.config.indexer.is_enabled() {
            match self.store.get_chunks(&doc.id).await {
                Ok(chunks) => {
                    if let Err(e) = self.indexer.index_document(&doc.id, &chunks).await {
                        eprintln!("Warning: failed to index document {}: {}", doc.id, e);
                    }
                }
                Err(e) => {
                    eprintln!("Warning: failed to load chunks for indexing: {}", e);
                }
            }
        }
    }

    async fn check_cancel(&self, job_id: &str) -> Result<(), StageError> {
        match self.store.cancel_requested(job_id).await {
            Ok(true) => Err(StageError::Cancelled),
            Ok(false) => Ok(()),
            Err(e) => Err(StageError::Persistence(e.to_string())),
        }
    }

    async fn save_job(&self, job: &ProcessingJob) -> Result<(), StageError> {
        self.store
            .update_job(job)
            .await
            .map_err(|e| StageError::Persistence(e.to_string()))
    }

    fn default_options(&self) -> ExtractionOptions {
        ExtractionOptions {
            ocr: self.config.extraction.ocr,
            ocr_language: self.config.extraction.ocr_language.clone(),
            extract_tables: self.config.extraction.extract_tables,
            extract_figures: self.config.extraction.extract_figures,
            vision_model: self.config.extraction.vision_model.clone(),
        }
    }
}

fn options_to_json(options: &ExtractionOptions) -> String {
    serde_json::json!({
        "ocr": options.ocr,
        "ocr_language": options.ocr_language,
        "extract_tables": options.extract_tables,
        "extract_figures": options.extract_figures,
        "vision_model": options.vision_model,
    })
    .to_string()
}

fn options_from_json(json: &str, defaults: &ExtractionOptions) -> ExtractionOptions {
    let value: serde_json::Value = match serde_json::from_str(json) {
        Ok(v) => v,
        Err(_) => return defaults.clone(),
    };
    ExtractionOptions {
        ocr: value["ocr"].as_bool().unwrap_or(defaults.ocr),
        ocr_language: value["ocr_language"]
            .as_str()
            .unwrap_or(&defaults.ocr_language)
            .to_string(),
        extract_tables: value["extract_tables"]
            .as_bool()
            .unwrap_or(defaults.extract_tables),
        extract_figures: value["extract_figures"]
            .as_bool()
            .unwrap_or(defaults.extract_figures),
        vision_model: value["vision_model"]
            .as_str()
            .map(String::from)
            .or_else(|| defaults.vision_model.clone()),
    }
}
