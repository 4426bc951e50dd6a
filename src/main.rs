//! # Docflow CLI (`dfl`)
//!
//! The `dfl` binary is the primary interface for Docflow. It provides
//! commands for database initialization, document ingestion, job inspection,
//! and starting the HTTP ingestion server.
//!
//! ## Usage
//!
//! ```bash
//! dfl --config ./config/dfl.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dfl init` | Create the SQLite database and run schema migrations |
//! | `dfl ingest <paths>` | Upload and process files (directories are walked) |
//! | `dfl reprocess <doc-id>` | Re-run the pipeline from the stored upload |
//! | `dfl status <job-id>` | Show job status, progress, and failure reason |
//! | `dfl cancel <job-id>` | Request cancellation of a running job |
//! | `dfl docs` | List documents |
//! | `dfl show <doc-id>` | Show a document with its chunks and tags |
//! | `dfl delete <doc-id>` | Soft-delete a document |
//! | `dfl serve` | Start the HTTP ingestion server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! dfl init --config ./config/dfl.toml
//!
//! # Ingest a report and a whole docs directory
//! dfl ingest report.pdf ./docs --config ./config/dfl.toml
//!
//! # Preview chunk counts without writing anything
//! dfl ingest ./docs --dry-run --config ./config/dfl.toml
//!
//! # Start the HTTP API
//! dfl serve --config ./config/dfl.toml
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use docflow::config::{self, Config};
use docflow::extract::{ExtractionOptions, ExtractorRegistry};
use docflow::indexer::create_indexer;
use docflow::models::DocumentType;
use docflow::pipeline::Pipeline;
use docflow::sqlite_store::SqliteStore;
use docflow::{chunker, db, detect, migrate, server};

/// Docflow CLI — a document ingestion and chunking pipeline.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/dfl.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "dfl",
    about = "Docflow — a document ingestion and chunking pipeline",
    version,
    long_about = "Docflow converts uploaded files (PDF, DOCX, Markdown, HTML, CSV, JSON, plain \
    text) into ordered, overlapping text chunks with structural metadata, tracks each run through \
    a retryable processing-job state machine, and feeds an optional vector index."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/dfl.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables (documents,
    /// chunks, processing_jobs, tags, document_tags). This command is
    /// idempotent — running it multiple times is safe.
    Init,

    /// Upload and process files.
    ///
    /// Each path is uploaded as a document and run through the pipeline:
    /// detection, extraction, chunking, enrichment, persistence. Directories
    /// are walked recursively. Documents are processed concurrently up to
    /// `ingest.batch_size`.
    Ingest {
        /// Files or directories to ingest.
        paths: Vec<PathBuf>,

        /// Request OCR for image-based content (requires an OCR backend).
        #[arg(long)]
        ocr: bool,

        /// Show detection and chunk counts without writing to the database.
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of files to process.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Re-run the pipeline for a document from its stored upload bytes.
    ///
    /// Existing chunks are replaced wholesale; re-running on unchanged
    /// content and configuration produces identical chunks.
    Reprocess {
        /// Document UUID.
        id: String,
    },

    /// Show a processing job's status, progress, and failure reason.
    Status {
        /// Job UUID.
        id: String,
    },

    /// Request cancellation of a pending or running job.
    Cancel {
        /// Job UUID.
        id: String,
    },

    /// List documents (soft-deleted ones excluded).
    Docs,

    /// Show a document with its chunks and tags.
    Show {
        /// Document UUID.
        id: String,

        /// Print full chunk text instead of a preview.
        #[arg(long)]
        full: bool,
    },

    /// Soft-delete a document and remove it from the vector index.
    Delete {
        /// Document UUID.
        id: String,
    },

    /// Start the HTTP ingestion server.
    Serve,
}

async fn build_pipeline(cfg: &Config) -> Result<Arc<Pipeline>> {
    let pool = db::connect(&cfg.db).await?;
    migrate::apply_schema(&pool).await?;
    let store = Arc::new(SqliteStore::new(pool));
    let indexer: Arc<dyn docflow::indexer::VectorIndexer> =
        Arc::from(create_indexer(&cfg.indexer)?);
    Ok(Arc::new(Pipeline::new(
        store,
        indexer,
        ExtractorRegistry::with_builtins(),
        cfg.clone(),
    )))
}

/// Expand files and directories into a flat file list, capped at `limit`.
fn collect_files(paths: &[PathBuf], limit: Option<usize>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in walkdir::WalkDir::new(path)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if entry.file_type().is_file() {
                    files.push(entry.path().to_path_buf());
                }
            }
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            anyhow::bail!("no such file or directory: {}", path.display());
        }
    }
    files.sort();
    if let Some(limit) = limit {
        files.truncate(limit);
    }
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Detect, extract, and chunk without touching the database.
fn dry_run_file(cfg: &Config, path: &Path, options: &ExtractionOptions) -> Result<()> {
    let content =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = file_name(path);
    let document_type = detect::detect(&content, &filename);

    if document_type == DocumentType::Unknown {
        println!("  {} — unknown type, would be rejected", filename);
        return Ok(());
    }

    let registry = ExtractorRegistry::with_builtins();
    match registry.extract(&content, &filename, document_type, options) {
        Ok(extraction) => {
            let chunks = chunker::chunk(
                "dry-run",
                &extraction.text,
                &extraction.markers,
                cfg.ingest.chunk_size,
                cfg.ingest.chunk_overlap,
            )?;
            println!(
                "  {} — {} ({} chars, {} markers, {} chunks)",
                filename,
                document_type,
                extraction.text.chars().count(),
                extraction.markers.len(),
                chunks.len()
            );
        }
        Err(e) => {
            println!("  {} — {} (would fail: {})", filename, document_type, e);
        }
    }
    Ok(())
}

async fn run_ingest(
    cfg: &Config,
    paths: Vec<PathBuf>,
    ocr: bool,
    dry_run: bool,
    limit: Option<usize>,
) -> Result<()> {
    if paths.is_empty() {
        anyhow::bail!("no paths given");
    }
    let files = collect_files(&paths, limit)?;
    if files.is_empty() {
        println!("Nothing to ingest.");
        return Ok(());
    }

    let mut options = ExtractionOptions {
        ocr,
        ..ExtractionOptions::default()
    };
    options.ocr_language = cfg.extraction.ocr_language.clone();
    options.extract_tables = cfg.extraction.extract_tables;
    options.extract_figures = cfg.extraction.extract_figures;

    if dry_run {
        println!("Dry run — {} file(s):", files.len());
        for file in &files {
            dry_run_file(cfg, file, &options)?;
        }
        return Ok(());
    }

    let pipeline = build_pipeline(cfg).await?;
    let mut handles = Vec::new();

    for file in files {
        let filename = file_name(&file);
        let content =
            std::fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
        let submitted = pipeline
            .submit(&filename, &content, "cli", Some(options.clone()))
            .await;
        match submitted {
            Ok((doc, job)) => {
                println!("{}  {}  queued as {}", doc.id, filename, job.id);
                let pipeline = pipeline.clone();
                handles.push(tokio::spawn(async move { pipeline.process(&job.id).await }));
            }
            Err(e) => {
                eprintln!("Warning: skipping {}: {}", filename, e);
            }
        }
    }

    let mut completed = 0usize;
    let mut failed = 0usize;
    for handle in handles {
        match handle.await? {
            Ok(job) => {
                if job.status == docflow::models::JobStatus::Completed {
                    completed += 1;
                } else {
                    failed += 1;
                    println!(
                        "Job {} ended {}: {}",
                        job.id,
                        job.status.as_str(),
                        job.error_message.as_deref().unwrap_or("no reason recorded")
                    );
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("Warning: job aborted: {}", e);
            }
        }
    }

    println!("Ingest finished: {} completed, {} failed.", completed, failed);
    Ok(())
}

async fn run_status(cfg: &Config, id: &str) -> Result<()> {
    let pipeline = build_pipeline(cfg).await?;
    let job = pipeline
        .store()
        .get_job(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no job with id {}", id))?;

    println!("Job:        {}", job.id);
    println!("Document:   {}", job.document_id);
    println!("Type:       {}", job.job_type);
    println!("Status:     {}", job.status.as_str());
    println!(
        "Progress:   {:.0}% (step {} of {})",
        job.progress * 100.0,
        if job.current_step.is_empty() {
            "-"
        } else {
            &job.current_step
        },
        job.total_steps
    );
    println!("Retries:    {}/{}", job.retry_count, job.max_retries);
    if let Some(reason) = &job.error_message {
        println!("Reason:     {}", reason);
    }
    Ok(())
}

async fn run_docs(cfg: &Config) -> Result<()> {
    let pipeline = build_pipeline(cfg).await?;
    let docs = pipeline.store().list_documents().await?;
    if docs.is_empty() {
        println!("No documents.");
        return Ok(());
    }
    for doc in docs {
        println!(
            "{}  [{}]  {}  ({}, {} words)",
            doc.id,
            doc.status.as_str(),
            doc.title,
            doc.document_type,
            doc.word_count.unwrap_or(0)
        );
    }
    Ok(())
}

async fn run_show(cfg: &Config, id: &str, full: bool) -> Result<()> {
    let pipeline = build_pipeline(cfg).await?;
    let doc = pipeline
        .store()
        .get_document(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("no document with id {}", id))?;
    let chunks = pipeline.store().get_chunks(id).await?;
    let tags = pipeline.store().document_tags(id).await?;

    println!("Document:   {}", doc.id);
    println!("Title:      {}", doc.title);
    println!("Type:       {}", doc.document_type);
    println!("Status:     {}", doc.status.as_str());
    println!(
        "Stats:      {} pages, {} words, {} characters",
        doc.page_count.unwrap_or(0),
        doc.word_count.unwrap_or(0),
        doc.character_count.unwrap_or(0)
    );
    if !tags.is_empty() {
        let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        println!("Tags:       {}", names.join(", "));
    }
    println!("Chunks:     {}", chunks.len());
    for chunk in chunks {
        let header = format!(
            "--- chunk {} [{}..{}] {} tokens",
            chunk.chunk_index, chunk.start_offset, chunk.end_offset, chunk.token_count
        );
        println!("{}", header);
        if full {
            println!("{}", chunk.text);
        } else {
            let preview: String = chunk.text.chars().take(120).collect();
            println!("{}", preview);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            paths,
            ocr,
            dry_run,
            limit,
        } => {
            run_ingest(&cfg, paths, ocr, dry_run, limit).await?;
        }
        Commands::Reprocess { id } => {
            let pipeline = build_pipeline(&cfg).await?;
            let job = pipeline.reprocess(&id).await?;
            println!(
                "Job {} ended {}{}",
                job.id,
                job.status.as_str(),
                job.error_message
                    .as_deref()
                    .map(|r| format!(": {}", r))
                    .unwrap_or_default()
            );
        }
        Commands::Status { id } => {
            run_status(&cfg, &id).await?;
        }
        Commands::Cancel { id } => {
            let pipeline = build_pipeline(&cfg).await?;
            if pipeline.store().request_cancel(&id).await? {
                println!("Cancellation requested for job {}.", id);
            } else {
                println!("Job {} is already terminal; nothing to cancel.", id);
            }
        }
        Commands::Docs => {
            run_docs(&cfg).await?;
        }
        Commands::Show { id, full } => {
            run_show(&cfg, &id, full).await?;
        }
        Commands::Delete { id } => {
            let pipeline = build_pipeline(&cfg).await?;
            pipeline.delete(&id).await?;
            println!("Document {} deleted.", id);
        }
        Commands::Serve => {
            let pipeline = build_pipeline(&cfg).await?;
            server::run_server(pipeline).await?;
        }
    }

    Ok(())
}
