// tests/process_launcher.rs
//
// Spawns real `sh` evaluators.
#![cfg(unix)]

mod common;
use crate::common::{sqlite_orchestrator, wait_terminal, OWNER};

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use benchrun::config::Settings;
use benchrun::configuration::BenchmarkConfiguration;
use benchrun::exec::{build_evaluator_command, LaunchRequest, Launcher, ProcessEvent, ProcessLauncher};
use benchrun::orchestrator::Orchestrator;
use benchrun::store::RunStore;
use benchrun::types::RunStatus;
use benchrun_test_utils::builders::{ConfigurationBuilder, SettingsBuilder};
use benchrun_test_utils::evaluator::ScriptDir;
use benchrun_test_utils::{init_tracing, with_timeout};

fn orchestrator(settings: &Settings) -> Orchestrator {
    sqlite_orchestrator(Arc::new(ProcessLauncher::new()), settings).0
}

async fn run_once(orchestrator: &Orchestrator, tasks: &[&str]) -> benchrun::types::RunRecord {
    let config = orchestrator
        .create_configuration(OWNER, ConfigurationBuilder::new().tasks(tasks).build())
        .await
        .expect("create configuration");
    let run_id = orchestrator
        .submit_run(config.id, OWNER)
        .await
        .expect("submit run");
    wait_terminal(orchestrator, run_id).await
}

#[tokio::test]
async fn evaluator_receives_configuration_as_arguments() {
    init_tracing();
    let scripts = ScriptDir::new();
    let script = scripts.echo_args_script();
    let settings = SettingsBuilder::new().evaluator("sh", &script).build();
    let orchestrator = orchestrator(&settings);

    let record = run_once(&orchestrator, &["hellaswag", "arc_easy"]).await;

    assert_eq!(record.status, RunStatus::Completed, "{:?}", record.error_message);
    assert_eq!(
        record.results,
        Some(json!({
            "args": [
                script.to_string_lossy(),
                "--api-url", "http://localhost:8000",
                "--samples", "50",
                "--timeout", "120",
                "--tasks", "hellaswag", "arc_easy"
            ]
        }))
    );
}

#[tokio::test]
async fn evaluator_environment_is_extended() {
    init_tracing();
    let scripts = ScriptDir::new();
    let script = scripts.write_script(
        "env.sh",
        r#"printf '{"success": true, "results": {"token": "%s"}}' "$BENCH_TOKEN""#,
    );
    let settings = SettingsBuilder::new()
        .evaluator("sh", &script)
        .env("BENCH_TOKEN", "abc123")
        .build();
    let orchestrator = orchestrator(&settings);

    let record = run_once(&orchestrator, &["hellaswag"]).await;

    assert_eq!(record.results, Some(json!({ "token": "abc123" })));
}

#[tokio::test]
async fn stderr_of_failing_evaluator_becomes_error_message() {
    init_tracing();
    let scripts = ScriptDir::new();
    let script = scripts.write_script(
        "fail.sh",
        "echo 'partial output'\necho 'RuntimeError: CUDA out of memory' >&2\nexit 3",
    );
    let settings = SettingsBuilder::new().evaluator("sh", &script).build();
    let orchestrator = orchestrator(&settings);

    let record = run_once(&orchestrator, &["hellaswag"]).await;

    assert_eq!(record.status, RunStatus::Failed);
    assert_eq!(
        record.error_message.as_deref().map(str::trim),
        Some("RuntimeError: CUDA out of memory")
    );
    assert_eq!(record.results, None);
}

#[tokio::test]
async fn missing_program_is_a_launch_failure() {
    init_tracing();
    let scripts = ScriptDir::new();
    let script = scripts.echo_args_script();
    let settings = SettingsBuilder::new()
        .evaluator("/nonexistent/benchrun-evaluator", &script)
        .build();
    let orchestrator = orchestrator(&settings);

    let record = run_once(&orchestrator, &["hellaswag"]).await;

    assert_eq!(record.status, RunStatus::Failed);
    let message = record.error_message.expect("error message");
    assert!(
        message.starts_with("Failed to start benchmark process:"),
        "{message}"
    );
}

#[tokio::test]
async fn large_output_is_reassembled_from_chunks() {
    init_tracing();
    let scripts = ScriptDir::new();
    let script = scripts.write_script(
        "large.sh",
        r#"printf '{"success": true, "results": {"blob": "'
head -c 100000 /dev/zero | tr '\0' 'a'
printf '"}}'"#,
    );
    let settings = SettingsBuilder::new().evaluator("sh", &script).build();
    let orchestrator = orchestrator(&settings);

    let record = run_once(&orchestrator, &["hellaswag"]).await;

    assert_eq!(record.status, RunStatus::Completed, "{:?}", record.error_message);
    let blob = record.results.as_ref().and_then(|r| r["blob"].as_str()).unwrap();
    assert_eq!(blob.len(), 100_000);
}

#[tokio::test]
async fn wall_clock_limit_kills_the_evaluator() {
    init_tracing();
    let scripts = ScriptDir::new();
    let script = scripts.write_script("slow.sh", "sleep 30");
    let settings = SettingsBuilder::new()
        .evaluator("sh", &script)
        .max_runtime_secs(1)
        .build();
    let orchestrator = orchestrator(&settings);

    let record = run_once(&orchestrator, &["hellaswag"]).await;

    assert_eq!(record.status, RunStatus::Failed);
    assert_eq!(
        record.error_message.as_deref(),
        Some("Benchmark exceeded wall-clock limit of 1s")
    );
}

#[tokio::test]
async fn wall_clock_limit_covers_output_held_open_by_background_children() {
    init_tracing();
    let scripts = ScriptDir::new();
    let script = scripts.write_script(
        "forks.sh",
        "sleep 30 &\nprintf '{\"success\": true, \"results\": {}}'\nexit 0",
    );
    let settings = SettingsBuilder::new()
        .evaluator("sh", &script)
        .max_runtime_secs(1)
        .build();
    let orchestrator = orchestrator(&settings);

    let record = run_once(&orchestrator, &["hellaswag"]).await;

    assert_eq!(record.status, RunStatus::Failed);
    assert_eq!(
        record.error_message.as_deref(),
        Some("Benchmark exceeded wall-clock limit of 1s")
    );
    assert_eq!(record.results, None);
}

#[tokio::test]
async fn event_stream_ends_with_exit_after_all_output() {
    init_tracing();
    let scripts = ScriptDir::new();
    let script = scripts.write_script("chatty.sh", "echo out\necho err >&2\nexit 0");
    let settings = SettingsBuilder::new().evaluator("sh", &script).build();
    let now = chrono::Utc::now();
    let config = BenchmarkConfiguration {
        id: 1,
        user_id: OWNER,
        name: "direct".to_string(),
        api_url: "http://localhost:8000".to_string(),
        timeout_secs: 120,
        num_samples: 1,
        tasks: vec!["hellaswag".to_string()],
        created_at: now,
        updated_at: now,
    };

    let mut events = ProcessLauncher::new().launch(LaunchRequest {
        run_id: 1,
        command: build_evaluator_command(&settings.evaluator, &config),
        max_runtime: Some(Duration::from_secs(10)),
    });

    let collected = with_timeout(async {
        let mut collected = Vec::new();
        while let Some(event) = events.recv().await {
            collected.push(event);
        }
        collected
    })
    .await;

    assert!(matches!(collected.first(), Some(ProcessEvent::Started { .. })));
    assert_eq!(collected.last(), Some(&ProcessEvent::Exited { code: 0 }));
    assert_eq!(collected.iter().filter(|e| e.is_terminal()).count(), 1);
    let stdout: Vec<u8> = collected
        .iter()
        .filter_map(|e| match e {
            ProcessEvent::Stdout(chunk) => Some(chunk.clone()),
            _ => None,
        })
        .flatten()
        .collect();
    assert_eq!(stdout, b"out\n");
}

#[tokio::test]
async fn terminal_state_survives_reopening_the_database() {
    init_tracing();
    let scripts = ScriptDir::new();
    let script = scripts.echo_args_script();
    let db = scripts.path().join("runs.db");
    let settings = SettingsBuilder::new()
        .evaluator("sh", &script)
        .store_path(&db)
        .build();

    let run_id = {
        let orchestrator = orchestrator(&settings);
        run_once(&orchestrator, &["hellaswag"]).await.id
    };

    let reopened = benchrun::open_store(&settings.store).unwrap();
    let record = reopened.get_run(run_id).unwrap().expect("run persisted");
    assert_eq!(record.status, RunStatus::Completed);
    assert!(record.completed_at.is_some());
}
