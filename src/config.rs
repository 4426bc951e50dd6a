use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub ingest: IngestConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub tagging: TaggingConfig,
    #[serde(default)]
    pub indexer: IndexerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    /// Pool size shared by the CLI ingest batches and the HTTP surface.
    #[serde(default = "default_db_connections")]
    pub max_connections: u32,
    #[serde(default = "default_db_busy_timeout")]
    pub busy_timeout_secs: u64,
}

fn default_db_connections() -> u32 {
    5
}
fn default_db_busy_timeout() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Directory where raw uploads are kept so documents can be reprocessed
    /// from their original bytes.
    pub upload_dir: PathBuf,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Concurrency limit: at most this many documents are mid-pipeline at once.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,
    /// Allowed document types (detector labels). Empty means all types are
    /// accepted and unsupported content fails at extraction instead.
    #[serde(default)]
    pub supported_file_types: Vec<String>,
    #[serde(default = "default_processing_timeout")]
    pub processing_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_chunk_size() -> usize {
    500
}
fn default_chunk_overlap() -> usize {
    50
}
fn default_batch_size() -> usize {
    10
}
fn default_max_file_size() -> u64 {
    50 * 1024 * 1024
}
fn default_processing_timeout() -> u64 {
    300
}
fn default_max_retries() -> u32 {
    3
}

impl IngestConfig {
    /// Reject invalid chunking parameters before any job is created.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            anyhow::bail!("ingest.chunk_size must be > 0");
        }
        if self.chunk_overlap >= self.chunk_size {
            anyhow::bail!(
                "ingest.chunk_overlap ({}) must be smaller than ingest.chunk_size ({})",
                self.chunk_overlap,
                self.chunk_size
            );
        }
        if self.batch_size == 0 {
            anyhow::bail!("ingest.batch_size must be >= 1");
        }
        Ok(())
    }

    pub fn is_type_allowed(&self, type_label: &str) -> bool {
        self.supported_file_types.is_empty()
            || self.supported_file_types.iter().any(|t| t == type_label)
    }
}

/// Defaults for [`crate::extract::ExtractionOptions`] when an upload does not
/// override them.
#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default)]
    pub ocr: bool,
    #[serde(default = "default_ocr_language")]
    pub ocr_language: String,
    #[serde(default)]
    pub extract_tables: bool,
    #[serde(default)]
    pub extract_figures: bool,
    #[serde(default)]
    pub vision_model: Option<String>,
}

fn default_ocr_language() -> String {
    "eng".to_string()
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            ocr: false,
            ocr_language: default_ocr_language(),
            extract_tables: false,
            extract_figures: false,
            vision_model: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TaggingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_max_tags")]
    pub max_tags: usize,
}

fn default_max_tags() -> usize {
    5
}

impl Default for TaggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_tags: default_max_tags(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexerConfig {
    #[serde(default = "default_indexer_provider")]
    pub provider: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_indexer_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_indexer_retries")]
    pub max_retries: u32,
}

fn default_indexer_provider() -> String {
    "disabled".to_string()
}
fn default_indexer_timeout() -> u64 {
    30
}
fn default_indexer_retries() -> u32 {
    5
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            provider: default_indexer_provider(),
            endpoint: None,
            timeout_secs: default_indexer_timeout(),
            max_retries: default_indexer_retries(),
        }
    }
}

impl IndexerConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:8070".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    config.ingest.validate()?;

    if config.ingest.max_file_size_bytes == 0 {
        anyhow::bail!("ingest.max_file_size_bytes must be > 0");
    }

    match config.indexer.provider.as_str() {
        "disabled" => {}
        "http" => {
            if config.indexer.endpoint.is_none() {
                anyhow::bail!("indexer.endpoint must be set when provider is 'http'");
            }
        }
        other => anyhow::bail!(
            "Unknown indexer provider: '{}'. Must be disabled or http.",
            other
        ),
    }

    Ok(config)
}
