//! Processing job state machine.
//!
//! `PENDING → RUNNING → {COMPLETED | FAILED | CANCELLED}`, with automatic
//! `FAILED → RUNNING` retries while the retry budget lasts. Progress is
//! clamped to `[0.0, 1.0]` and never decreases within one attempt; a retry
//! resets it to zero. `completed_at` is set exactly when the job becomes
//! terminal.

use chrono::Utc;
use uuid::Uuid;

use crate::models::{JobStatus, ProcessingJob};

/// Stage labels reported through the job-status endpoint.
pub const STEP_DETECT: &str = "detect";
pub const STEP_EXTRACT: &str = "extract";
pub const STEP_CHUNK: &str = "chunk";
pub const STEP_ENRICH: &str = "enrich";
pub const STEP_PERSIST: &str = "persist";

/// Total pipeline stages, reported as `total_steps`.
pub const TOTAL_STEPS: i64 = 5;

impl ProcessingJob {
    /// Create a pending ingestion job for a document.
    pub fn new(document_id: &str, user_id: &str, job_type: &str, max_retries: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            user_id: user_id.to_string(),
            job_type: job_type.to_string(),
            status: JobStatus::Pending,
            priority: 0,
            engine: "builtin".to_string(),
            options_json: "{}".to_string(),
            progress: 0.0,
            current_step: String::new(),
            total_steps: TOTAL_STEPS,
            error_message: None,
            retry_count: 0,
            max_retries,
            cancel_requested: false,
            created_at: Utc::now().timestamp(),
            started_at: None,
            completed_at: None,
        }
    }

    /// `PENDING → RUNNING` (also `FAILED → RUNNING` through [`record_retry`](Self::record_retry)).
    pub fn start(&mut self) {
        self.status = JobStatus::Running;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now().timestamp());
        }
        self.progress = 0.0;
        self.error_message = None;
    }

    /// Advance to a pipeline stage. Progress is clamped and monotonic:
    /// a lower fraction than the current one is ignored.
    pub fn advance(&mut self, step: &str, progress: f64) {
        self.current_step = step.to_string();
        let clamped = progress.clamp(0.0, 1.0);
        if clamped > self.progress {
            self.progress = clamped;
        }
    }

    /// `RUNNING → COMPLETED`. Terminal.
    pub fn complete(&mut self) {
        self.status = JobStatus::Completed;
        self.progress = 1.0;
        self.completed_at = Some(Utc::now().timestamp());
    }

    /// `RUNNING → FAILED`, terminal (the retry budget is exhausted or the
    /// error is not retryable).
    pub fn fail(&mut self, reason: &str) {
        self.status = JobStatus::Failed;
        self.error_message = Some(truncate_reason(reason));
        self.completed_at = Some(Utc::now().timestamp());
    }

    /// `RUNNING → CANCELLED`. Terminal; distinguishable from processing
    /// errors through its own status.
    pub fn cancel(&mut self) {
        self.status = JobStatus::Cancelled;
        self.error_message = Some("cancelled by request".to_string());
        self.completed_at = Some(Utc::now().timestamp());
    }

    /// Attempt `FAILED → RUNNING`. Returns `false` when the budget is
    /// exhausted; the caller must then [`fail`](Self::fail) terminally.
    /// On success the attempt counter advances, progress resets to zero,
    /// and the failure reason is kept for the status endpoint until the
    /// retry overwrites it.
    pub fn record_retry(&mut self, reason: &str) -> bool {
        if self.retry_count >= self.max_retries {
            return false;
        }
        self.retry_count += 1;
        self.status = JobStatus::Running;
        self.progress = 0.0;
        self.error_message = Some(truncate_reason(reason));
        true
    }
}

/// Cap stored error messages; library errors can embed whole documents.
const MAX_REASON_LEN: usize = 1024;

fn truncate_reason(reason: &str) -> String {
    if reason.len() <= MAX_REASON_LEN {
        return reason.to_string();
    }
    let mut cut = MAX_REASON_LEN;
    while !reason.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…", &reason[..cut])
}
