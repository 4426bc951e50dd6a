use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn dfl_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("dfl");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    // Create test files
    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("alpha.md"),
        "# Alpha Document\n\nThis is the alpha document about Rust programming.\n\nIt contains information about cargo and crates.",
    ).unwrap();
    fs::write(
        files_dir.join("beta.md"),
        "# Beta Document\n\nThis document discusses Python and machine learning.\n\nDeep learning frameworks like PyTorch are covered.",
    ).unwrap();
    fs::write(
        files_dir.join("gamma.txt"),
        "Gamma plain text file.\n\nContains notes about deployment and infrastructure.\n\nKubernetes and Docker are mentioned here.",
    ).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/docflow.sqlite"

[ingest]
upload_dir = "{}/data/uploads"
chunk_size = 50
chunk_overlap = 5
max_retries = 1

[server]
bind = "127.0.0.1:8071"
"#,
        root.display(),
        root.display()
    );

    let config_path = config_dir.join("dfl.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_dfl(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = dfl_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run dfl binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

/// Ingest the test files directory and return (document_id, job_id) of the
/// first queued file.
fn ingest_all(tmp: &TempDir, config_path: &Path) -> (String, String) {
    let files_dir = tmp.path().join("files");
    let (stdout, stderr, success) =
        run_dfl(config_path, &["ingest", files_dir.to_str().unwrap()]);
    assert!(
        success,
        "ingest failed: stdout={}, stderr={}",
        stdout, stderr
    );
    let line = stdout
        .lines()
        .find(|l| l.contains("queued as"))
        .unwrap_or_else(|| panic!("no queued line in: {}", stdout));
    let mut parts = line.split_whitespace();
    let doc_id = parts.next().unwrap().to_string();
    let job_id = line.split("queued as").nth(1).unwrap().trim().to_string();
    (doc_id, job_id)
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_dfl(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_dfl(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_dfl(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_directory() {
    let (tmp, config_path) = setup_test_env();

    run_dfl(&config_path, &["init"]);
    let files_dir = tmp.path().join("files");
    let (stdout, stderr, success) =
        run_dfl(&config_path, &["ingest", files_dir.to_str().unwrap()]);
    assert!(
        success,
        "ingest failed: stdout={}, stderr={}",
        stdout, stderr
    );
    assert!(
        stdout.contains("3 completed, 0 failed"),
        "Expected 3 completed jobs, got: {}",
        stdout
    );
}

#[test]
fn test_ingest_dry_run_writes_nothing() {
    let (tmp, config_path) = setup_test_env();

    run_dfl(&config_path, &["init"]);
    let files_dir = tmp.path().join("files");
    let (stdout, _, success) = run_dfl(
        &config_path,
        &["ingest", files_dir.to_str().unwrap(), "--dry-run"],
    );
    assert!(success);
    assert!(stdout.contains("Dry run"));
    assert!(stdout.contains("chunks"));

    let (stdout, _, _) = run_dfl(&config_path, &["docs"]);
    assert!(
        stdout.contains("No documents"),
        "Dry run must not persist documents, got: {}",
        stdout
    );
}

#[test]
fn test_ingest_with_limit() {
    let (tmp, config_path) = setup_test_env();

    run_dfl(&config_path, &["init"]);
    let files_dir = tmp.path().join("files");
    let (stdout, _, success) = run_dfl(
        &config_path,
        &["ingest", files_dir.to_str().unwrap(), "--limit", "1"],
    );
    assert!(success);
    assert!(
        stdout.contains("1 completed, 0 failed"),
        "Expected 1 completed job, got: {}",
        stdout
    );
}

#[test]
fn test_docs_lists_ready_documents() {
    let (tmp, config_path) = setup_test_env();

    run_dfl(&config_path, &["init"]);
    ingest_all(&tmp, &config_path);

    let (stdout, _, success) = run_dfl(&config_path, &["docs"]);
    assert!(success);
    assert!(stdout.contains("[ready]"));
    assert!(stdout.contains("alpha.md"));
    assert!(stdout.contains("beta.md"));
    assert!(stdout.contains("gamma.txt"));
}

#[test]
fn test_status_of_completed_job() {
    let (tmp, config_path) = setup_test_env();

    run_dfl(&config_path, &["init"]);
    let (_, job_id) = ingest_all(&tmp, &config_path);

    let (stdout, stderr, success) = run_dfl(&config_path, &["status", &job_id]);
    assert!(
        success,
        "status failed: stdout={}, stderr={}",
        stdout, stderr
    );
    assert!(stdout.contains("completed"));
    assert!(stdout.contains("100%"));
}

#[test]
fn test_status_of_missing_job() {
    let (_tmp, config_path) = setup_test_env();

    run_dfl(&config_path, &["init"]);
    let (_, stderr, success) = run_dfl(&config_path, &["status", "nonexistent-id"]);
    assert!(!success, "status with missing ID should fail");
    assert!(stderr.contains("no job"));
}

#[test]
fn test_show_document_with_chunks() {
    let (tmp, config_path) = setup_test_env();

    run_dfl(&config_path, &["init"]);
    let (doc_id, _) = ingest_all(&tmp, &config_path);

    let (stdout, stderr, success) = run_dfl(&config_path, &["show", &doc_id]);
    assert!(success, "show failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains(&doc_id));
    assert!(stdout.contains("chunk 0"));
    assert!(stdout.contains("tokens"));
}

#[test]
fn test_delete_hides_document_from_listing() {
    let (tmp, config_path) = setup_test_env();

    run_dfl(&config_path, &["init"]);
    let (doc_id, _) = ingest_all(&tmp, &config_path);

    let (stdout, _, success) = run_dfl(&config_path, &["delete", &doc_id]);
    assert!(success);
    assert!(stdout.contains("deleted"));

    let (stdout, _, _) = run_dfl(&config_path, &["docs"]);
    assert!(
        !stdout.contains(&doc_id),
        "Deleted document must not be listed, got: {}",
        stdout
    );
}

#[test]
fn test_reprocess_completes_again() {
    let (tmp, config_path) = setup_test_env();

    run_dfl(&config_path, &["init"]);
    let (doc_id, _) = ingest_all(&tmp, &config_path);

    let (stdout, stderr, success) = run_dfl(&config_path, &["reprocess", &doc_id]);
    assert!(
        success,
        "reprocess failed: stdout={}, stderr={}",
        stdout, stderr
    );
    assert!(stdout.contains("completed"));
}

#[test]
fn test_cancel_terminal_job_reports_nothing_to_do() {
    let (tmp, config_path) = setup_test_env();

    run_dfl(&config_path, &["init"]);
    let (_, job_id) = ingest_all(&tmp, &config_path);

    let (stdout, _, success) = run_dfl(&config_path, &["cancel", &job_id]);
    assert!(success);
    assert!(stdout.contains("nothing to cancel"));
}

#[test]
fn test_ingest_missing_path_fails() {
    let (_tmp, config_path) = setup_test_env();

    run_dfl(&config_path, &["init"]);
    let (_, stderr, success) = run_dfl(&config_path, &["ingest", "/no/such/path"]);
    assert!(!success, "ingest of a missing path should fail");
    assert!(stderr.contains("no such file or directory"));
}

#[test]
fn test_invalid_chunk_overlap_rejected_at_startup() {
    let (tmp, config_path) = setup_test_env();

    let bad_config = tmp.path().join("config").join("bad.toml");
    fs::write(
        &bad_config,
        format!(
            r#"[db]
path = "{}/data/docflow.sqlite"

[ingest]
upload_dir = "{}/data/uploads"
chunk_size = 50
chunk_overlap = 50
"#,
            tmp.path().display(),
            tmp.path().display()
        ),
    )
    .unwrap();

    let (_, stderr, success) = run_dfl(&bad_config, &["docs"]);
    assert!(!success, "invalid overlap should be rejected");
    assert!(stderr.contains("chunk_overlap"));
}
