use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const ENV_OVERRIDES: &[&str] = &[
    "VECTOR_STORE_TYPE",
    "LOCAL_STORE_PATH",
    "QDRANT_URL",
    "QDRANT_API_KEY",
    "LLM_BASE_URL",
    "LLM_API_KEY",
    "LLM_MODEL",
    "TEXT_EMBEDDING_MODEL",
    "IMAGE_EMBEDDING_MODEL",
    "REQUEST_TIMEOUT",
    "LOG_LEVEL",
    "RUST_LOG",
];

fn lrag_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("lrag");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("alpha.md"),
        "# Alpha\n\nNotes about Rust, cargo and crates.",
    )
    .unwrap();

    let config_content = format!(
        r#"[store]
backend = "local"
path = "{}/data/vectors.sqlite"

[llm]
base_url = "http://127.0.0.1:9/v1"

[chunking]
chunk_size = 512
chunk_overlap = 64
"#,
        root.display()
    );
    let config_path = config_dir.join("rag.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn command(dir: &Path) -> Command {
    let mut cmd = Command::new(lrag_binary());
    cmd.current_dir(dir);
    for key in ENV_OVERRIDES {
        cmd.env_remove(key);
    }
    cmd
}

fn run_lrag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let dir = config_path.parent().unwrap().parent().unwrap();
    let output = command(dir)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run lrag binary: {}", e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_version() {
    let tmp = TempDir::new().unwrap();
    let output = command(tmp.path()).arg("version").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&format!("version {}", env!("CARGO_PKG_VERSION"))));
}

#[test]
fn test_version_ignores_missing_config() {
    let tmp = TempDir::new().unwrap();
    let output = command(tmp.path())
        .args(["--config", "does-not-exist.toml", "version"])
        .output()
        .unwrap();
    assert!(output.status.success());
}

#[test]
fn test_explicit_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let output = command(tmp.path())
        .args(["--config", "does-not-exist.toml", "stats"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Config file not found"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_chunking_config_fails() {
    let (tmp, config_path) = setup_test_env();
    let content = format!(
        "[store]\npath = \"{}/data/vectors.sqlite\"\n\n[chunking]\nchunk_size = 100\nchunk_overlap = 100\n",
        tmp.path().display()
    );
    fs::write(&config_path, content).unwrap();

    let (_, stderr, success) = run_lrag(&config_path, &["stats"]);
    assert!(!success);
    assert!(stderr.contains("chunk_overlap"), "stderr: {}", stderr);
}

#[test]
fn test_unknown_store_type_from_env_fails() {
    let (tmp, config_path) = setup_test_env();
    let output = command(tmp.path())
        .env("VECTOR_STORE_TYPE", "pinecone")
        .arg("--config")
        .arg(&config_path)
        .arg("stats")
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unknown vector store type"), "stderr: {}", stderr);
}

#[test]
fn test_stats_on_fresh_local_store() {
    let (tmp, config_path) = setup_test_env();
    let (stdout, stderr, success) = run_lrag(&config_path, &["stats"]);
    assert!(success, "stats failed: {}", stderr);
    assert!(stdout.contains("local"));
    assert!(stdout.contains("rag_text"));
    assert!(stdout.contains("rag_images"));
    assert!(stdout.contains("1024"));
    assert!(stdout.contains("512"));
    assert!(tmp.path().join("data/vectors.sqlite").exists());

    // Second run sees the same collections.
    let (stdout2, _, success) = run_lrag(&config_path, &["stats"]);
    assert!(success);
    assert_eq!(
        stdout.lines().filter(|l| l.contains("rag_")).count(),
        stdout2.lines().filter(|l| l.contains("rag_")).count()
    );
}

#[test]
fn test_stats_store_path_from_env() {
    let (tmp, config_path) = setup_test_env();
    let custom = tmp.path().join("elsewhere/store.sqlite");
    let output = command(tmp.path())
        .env("LOCAL_STORE_PATH", &custom)
        .arg("--config")
        .arg(&config_path)
        .arg("stats")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(custom.exists());
    assert!(!tmp.path().join("data/vectors.sqlite").exists());
}

#[cfg(feature = "local-embeddings-fastembed")]
#[test]
fn test_ingest_with_only_invalid_paths() {
    let (tmp, config_path) = setup_test_env();
    let missing = tmp.path().join("missing");
    let file = tmp.path().join("files/alpha.md");

    let (stdout, stderr, success) = run_lrag(
        &config_path,
        &[
            "ingest",
            missing.to_str().unwrap(),
            file.to_str().unwrap(),
            "--progress",
            "off",
        ],
    );
    assert!(success, "ingest failed: {}", stderr);
    assert!(stdout.contains("No valid directories to ingest."));
    assert!(stderr.contains("path does not exist"));
    assert!(stderr.contains("path is not a directory"));
    assert!(!tmp.path().join("data/vectors.sqlite").exists());
}

#[test]
fn test_ingest_requires_a_path() {
    let (_tmp, config_path) = setup_test_env();
    let (_, _, success) = run_lrag(&config_path, &["ingest"]);
    assert!(!success);
}

#[test]
fn test_query_rejects_zero_top_k() {
    let (_tmp, config_path) = setup_test_env();
    let (_, _, success) = run_lrag(&config_path, &["query", "anything", "--top-k", "0"]);
    assert!(!success);
}

#[test]
fn test_health_reports_each_component() {
    let (tmp, config_path) = setup_test_env();
    let (stdout, _, success) = run_lrag(&config_path, &["health"]);
    // Nothing listens on the configured LLM port.
    assert!(!success);
    assert!(stdout.contains("✓ Vector store (local): OK"), "stdout: {}", stdout);
    assert!(stdout.contains("✗ LLM"), "stdout: {}", stdout);
    assert!(stdout.contains("Some systems are not available."));
    // The local store is opened by the ping.
    assert!(tmp.path().join("data/vectors.sqlite").exists());
}
