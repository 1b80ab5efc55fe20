use assert_cmd::Command;
use predicates::prelude::*;
use serial_test::serial;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// Nothing listens on the discard port, so every request fails fast.
const DEAD_API: &str = "http://127.0.0.1:9/api/v1";

fn syft_deploy(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("syft-deploy").expect("Binary exists");
    cmd.current_dir(workdir)
        .env("SYFT_API_URL", DEAD_API)
        .env("SYFT_ADMIN_API_KEY", "test-key")
        .env_remove("OPENROUTER_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_every_command() {
    let dir = tempdir().unwrap();
    let output = syft_deploy(dir.path()).arg("--help").output().unwrap();
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    for name in [
        "list",
        "deploy",
        "delete",
        "publish",
        "update",
        "generate",
        "fix-names",
    ] {
        assert!(text.contains(name), "help should mention {name}: {text}");
    }
}

#[test]
fn deploy_dry_run_previews_without_network() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("datasets");
    fs::create_dir_all(source.join("journal-of-law")).unwrap();
    fs::write(source.join("journal-of-law/article.pdf"), b"%PDF").unwrap();

    syft_deploy(dir.path())
        .args(["deploy", "--dry-run", "--delay", "0", "--slug-template", "{name}-oa"])
        .arg("--source-dir")
        .arg(&source)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Auto-detected file types: .pdf")
                .and(predicate::str::contains(
                    "[DRY RUN] Would create dataset: journal-of-law",
                ))
                .and(predicate::str::contains(
                    "[DRY RUN] Would create endpoint: journal-of-law-oa",
                ))
                .and(predicate::str::contains("Success:  1")),
        );
    assert!(!dir.path().join("progress.json").exists());
}

#[test]
fn deploy_fails_when_api_is_unreachable() {
    let dir = tempdir().unwrap();
    syft_deploy(dir.path())
        .args(["deploy", "--source-dir", "."])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot connect to API at"));
}

#[test]
fn update_without_descriptions_file_fails() {
    let dir = tempdir().unwrap();
    syft_deploy(dir.path())
        .args(["update", "--descriptions", "missing.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Descriptions file not found: missing.json",
        ));
}

#[test]
fn generate_requires_openrouter_key() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("src/alpha")).unwrap();
    syft_deploy(dir.path())
        .args(["generate", "--source-dir", "src"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "OPENROUTER_API_KEY environment variable not set",
        ));
}

#[test]
fn delete_dry_run_reports_listing_errors_and_succeeds() {
    let dir = tempdir().unwrap();
    syft_deploy(dir.path())
        .args(["delete", "--dry-run", "--delay", "0"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("DELETE RESOURCES")
                .and(predicate::str::contains("Error listing endpoints"))
                .and(predicate::str::contains("Error listing datasets")),
        );
}

#[test]
fn delete_aborts_without_confirmation() {
    let dir = tempdir().unwrap();
    syft_deploy(dir.path())
        .arg("delete")
        .write_stdin("no\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Aborted"));
}

#[test]
fn config_file_supplies_defaults() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("data/medical-review")).unwrap();
    fs::write(
        dir.path().join("syft.yaml"),
        "defaults:\n  source_dir: data\n  name_template: \"{name}-journal\"\n",
    )
    .unwrap();

    syft_deploy(dir.path())
        .args([
            "--config",
            "syft.yaml",
            "deploy",
            "--dry-run",
            "--file-types",
            ".pdf",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "[DRY RUN] Would create dataset: medical-review-journal",
        ));
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{:?}", event));
    }
}

#[tokio::test]
#[serial]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use syft_deploy::cli::{run, Cli, Commands};

    std::env::set_var("SYFT_API_URL", DEAD_API);
    std::env::set_var("SYFT_ADMIN_API_KEY", "test-key");
    let cli = Cli {
        config: None,
        command: Commands::Update {
            dry_run: true,
            limit: 0,
            resume: false,
            delay: 0.0,
            descriptions: Some("does-not-exist.json".into()),
            summary_template: None,
            progress_file: None,
        },
    };

    let result = run(cli).await;
    assert!(result.is_err(), "missing descriptions should fail the run");

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
