//! End-to-end integration tests for the taskloop runtime.
//!
//! These tests build a [`Runtime`] from configuration exactly as the CLI
//! does, point it at a temporary workspace, and back the generator and
//! test-runner tools with small shell commands.

use std::path::Path;

use taskloop_agent::Runtime;
use taskloop_config::AppConfig;
use taskloop_core::task::{Task, TaskOutcome};
use tokio_util::sync::CancellationToken;

// ── Fixtures ─────────────────────────────────────────────────────────────

const CLEAN_CODE: &str = r#"cat >/dev/null; echo '{"files":[{"path":"src/wallet.rs","content":"pub struct Wallet { pub balance: u64 }"}]}'"#;
const TODO_CODE: &str = r#"cat >/dev/null; echo '{"files":[{"path":"src/wallet.rs","content":"// TODO: balance"}]}'"#;
const TEST_GEN: &str = r##"cat >/dev/null; echo '{"files":[{"path":"tests/wallet_test.rs","content":"#[test] fn balance() {}"}]}'"##;
const GOOD_RUN: &str = "echo '4 passed; 0 failed'; echo 'coverage: 91.5%'";
const LOW_COVERAGE_RUN: &str = "echo '4 passed; 0 failed'; echo 'coverage: 40.0%'";

fn workspace() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("src/wallet.rs"), "pub struct Wallet;").unwrap();
    std::fs::write(dir.path().join("src/ledger.rs"), "pub fn post() {}").unwrap();
    std::fs::write(dir.path().join("README.md"), "# fixture").unwrap();
    dir
}

fn config(root: &Path, code: &str, runner: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.tools.workspace_root = root.to_path_buf();
    config.tools.code_generator = Some(code.into());
    config.tools.test_generator = Some(TEST_GEN.into());
    config.tools.test_runner = Some(runner.into());
    config.orchestrator.max_iterations = 2;
    config
}

async fn runtime(root: &Path, code: &str, runner: &str) -> Runtime {
    let runtime = Runtime::from_config(config(root, code, runner));
    runtime.prime().await;
    runtime
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_search_task_completes_with_matches() {
    let dir = workspace();
    let runtime = runtime(dir.path(), CLEAN_CODE, GOOD_RUN).await;

    let result = runtime
        .orchestrator
        .execute(Task::new("search", "find the wallet"), CancellationToken::new())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.outcome, TaskOutcome::Completed);
    assert_eq!(result.iterations, 1);
    assert!(result.artifacts.contains(&"src/wallet.rs".to_string()));
}

#[tokio::test]
async fn e2e_bugfix_runs_search_code_and_test() {
    let dir = workspace();
    let runtime = runtime(dir.path(), CLEAN_CODE, GOOD_RUN).await;
    let mut events = runtime.orchestrator.event_bus().subscribe();

    let result = runtime
        .orchestrator
        .execute(
            Task::new("bugfix", "wallet balance is wrong"),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(result.success, "feedback: {:?}", result.feedback);
    assert_eq!(result.iterations, 1);

    let workers: Vec<&str> = result.sub_results.iter().map(|r| r.worker.as_str()).collect();
    assert_eq!(workers, vec!["search", "code", "test"]);

    let written = std::fs::read_to_string(dir.path().join("src/wallet.rs")).unwrap();
    assert!(written.contains("balance: u64"));
    assert!(dir.path().join("tests/wallet_test.rs").exists());

    // The run is visible on the event bus.
    let mut saw_finish = false;
    while let Ok(event) = events.try_recv() {
        if matches!(
            event.as_ref(),
            taskloop_core::event::DomainEvent::TaskFinished { .. }
        ) {
            saw_finish = true;
        }
    }
    assert!(saw_finish);

    let log = runtime.orchestrator.iteration_log();
    assert_eq!(log.iterations_for(&result.task_id).await, 1);
}

#[tokio::test]
async fn e2e_unresolved_markers_exhaust_iterations() {
    let dir = workspace();
    let runtime = runtime(dir.path(), TODO_CODE, GOOD_RUN).await;

    let result = runtime
        .orchestrator
        .execute(Task::new("code", "wallet balance"), CancellationToken::new())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.outcome, TaskOutcome::Exhausted);
    assert_eq!(result.iterations, 2);
    let feedback = result.feedback.unwrap();
    assert!(feedback.contains("code"), "feedback: {feedback}");

    // Rejected output is never written.
    let original = std::fs::read_to_string(dir.path().join("src/wallet.rs")).unwrap();
    assert_eq!(original, "pub struct Wallet;");
}

#[tokio::test]
async fn e2e_low_coverage_fails_verification() {
    let dir = workspace();
    let runtime = runtime(dir.path(), CLEAN_CODE, LOW_COVERAGE_RUN).await;

    let result = runtime
        .orchestrator
        .execute(Task::new("test", "wallet"), CancellationToken::new())
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.iterations, 2);
    let feedback = result.feedback.unwrap();
    assert!(feedback.contains("40.0%"), "feedback: {feedback}");
}

#[tokio::test]
async fn e2e_cancelled_before_start() {
    let dir = workspace();
    let runtime = runtime(dir.path(), CLEAN_CODE, GOOD_RUN).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = runtime
        .orchestrator
        .execute(Task::new("bugfix", "wallet"), cancel)
        .await
        .unwrap();

    assert!(!result.success);
    assert_eq!(result.outcome, TaskOutcome::Cancelled);
}

#[tokio::test]
async fn e2e_store_search_ranks_ingested_files() {
    let dir = workspace();
    let runtime = runtime(dir.path(), CLEAN_CODE, GOOD_RUN).await;

    let hits = runtime.store.search("wallet").await;
    assert_eq!(hits.first().map(|h| h.id.as_str()), Some("src/wallet.rs"));
    assert!(runtime.tools.contains("code_generate"));
    assert_eq!(runtime.tools.len(), 7);
}
