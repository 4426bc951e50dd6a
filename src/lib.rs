//! # Docflow
//!
//! A document ingestion and chunking pipeline.
//!
//! Docflow turns uploaded files (PDF, DOCX, Markdown, HTML, CSV, JSON, plain
//! text) into ordered, overlapping text chunks with structural metadata,
//! tracks each run through a retryable processing-job state machine, and
//! hands the persisted chunks to a pluggable vector indexer. Uploads arrive
//! through a CLI or a JSON HTTP API; everything lands in SQLite.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────────────────────┐   ┌──────────┐
//! │ Uploads  │──▶│  Pipeline                     │──▶│  SQLite  │
//! │ CLI/HTTP │   │ detect→extract→chunk→enrich   │   │  chunks  │
//! └──────────┘   └──────────────┬────────────────┘   └────┬─────┘
//!                               │ job state/progress      │
//!                               ▼                         ▼
//!                        ┌──────────────┐          ┌──────────────┐
//!                        │ processing   │          │ vector index │
//!                        │ jobs         │          │ (optional)   │
//!                        └──────────────┘          └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! dfl init                          # create database
//! dfl ingest report.pdf notes.md    # upload and process files
//! dfl status <job-id>               # poll job progress
//! dfl docs                          # list documents
//! dfl serve                         # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`detect`] | Document type detection (magic bytes + extension) |
//! | [`extract`] | Per-format text extraction strategies |
//! | [`chunker`] | Sliding-window token chunking |
//! | [`enrich`] | Derived statistics and auto-tagging |
//! | [`job`] | Processing-job state machine |
//! | [`pipeline`] | Stage orchestration, retries, cancellation |
//! | [`store`] | Storage abstraction |
//! | [`sqlite_store`] | SQLite storage backend |
//! | [`memory_store`] | In-memory storage backend for tests |
//! | [`indexer`] | Vector indexer abstraction |
//! | [`server`] | HTTP ingestion API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chunker;
pub mod config;
pub mod db;
pub mod detect;
pub mod enrich;
pub mod extract;
pub mod indexer;
pub mod job;
pub mod memory_store;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod sqlite_store;
pub mod store;
