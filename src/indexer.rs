//! Vector indexer abstraction and implementations.
//!
//! Defines the [`VectorIndexer`] trait and concrete implementations:
//! - **[`NoopIndexer`]** — does nothing; used when indexing is not configured.
//! - **[`HttpIndexer`]** — forwards chunks to an external vector service.
//!
//! Indexing is downstream of persistence: the store is the source of truth
//! and the index is rebuilt from it on reprocess, so indexer failures never
//! fail an ingestion job.
//!
//! # Retry Strategy
//!
//! The HTTP indexer uses exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::IndexerConfig;
use crate::models::ChunkRecord;

/// Trait for vector index backends.
#[async_trait]
pub trait VectorIndexer: Send + Sync {
    /// Backend identifier, for logs and status output.
    fn name(&self) -> &str;

    /// Submit a document's chunks for indexing. Chunks replace whatever the
    /// index previously held for the document.
    async fn index_document(&self, document_id: &str, chunks: &[ChunkRecord]) -> Result<()>;

    /// Drop a document's entries from the index.
    async fn remove_document(&self, document_id: &str) -> Result<()>;
}

/// A no-op indexer used when `indexer.provider = "disabled"`.
pub struct NoopIndexer;

#[async_trait]
impl VectorIndexer for NoopIndexer {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn index_document(&self, _document_id: &str, _chunks: &[ChunkRecord]) -> Result<()> {
        Ok(())
    }

    async fn remove_document(&self, _document_id: &str) -> Result<()> {
        Ok(())
    }
}

/// Indexer that POSTs chunk batches to an external HTTP vector service.
///
/// `POST {endpoint}/documents/{id}/chunks` with a JSON body of chunk texts
/// and metadata; `DELETE {endpoint}/documents/{id}` on removal.
pub struct HttpIndexer {
    endpoint: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl HttpIndexer {
    pub fn new(config: &IndexerConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| anyhow::anyhow!("indexer.endpoint required for http provider"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
            max_retries: config.max_retries,
        })
    }

    fn chunk_payload(chunks: &[ChunkRecord]) -> serde_json::Value {
        let items: Vec<serde_json::Value> = chunks
            .iter()
            .map(|c| {
                serde_json::json!({
                    "chunk_id": c.id,
                    "chunk_index": c.chunk_index,
                    "text": c.text,
                    "metadata": {
                        "page_number": c.page_number,
                        "section_title": c.section_title,
                        "table_id": c.table_id,
                        "figure_id": c.figure_id,
                        "chunk_type": c.chunk_type,
                        "hash": c.hash,
                    },
                })
            })
            .collect();
        serde_json::json!({ "chunks": items })
    }

    async fn send_with_retry(&self, request: impl Fn() -> reqwest::RequestBuilder) -> Result<()> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            match request().send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(());
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err =
                            Some(anyhow::anyhow!("indexer error {}: {}", status, body_text));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("indexer error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("indexing failed after retries")))
    }
}

#[async_trait]
impl VectorIndexer for HttpIndexer {
    fn name(&self) -> &str {
        "http"
    }

    async fn index_document(&self, document_id: &str, chunks: &[ChunkRecord]) -> Result<()> {
        let url = format!("{}/documents/{}/chunks", self.endpoint, document_id);
        let body = Self::chunk_payload(chunks);
        self.send_with_retry(|| self.client.post(&url).json(&body))
            .await
    }

    async fn remove_document(&self, document_id: &str) -> Result<()> {
        let url = format!("{}/documents/{}", self.endpoint, document_id);
        self.send_with_retry(|| self.client.delete(&url)).await
    }
}

/// Create the appropriate [`VectorIndexer`] based on configuration.
pub fn create_indexer(config: &IndexerConfig) -> Result<Box<dyn VectorIndexer>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(NoopIndexer)),
        "http" => Ok(Box::new(HttpIndexer::new(config)?)),
        other => bail!("Unknown indexer provider: {}", other),
    }
}
