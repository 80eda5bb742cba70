use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use detection_bridge::ErrorKind;
use detection_bridge::runner::mock::MockRunner;
use detection_bridge::runner::process::ProcessRunner;
use detection_bridge::runner::{Invocation, Runner};

fn sh(script: &str) -> Invocation {
    Invocation {
        program: OsString::from("sh"),
        args: vec![OsString::from("-c"), OsString::from(script)],
    }
}

#[tokio::test]
async fn process_runner_captures_stdout() {
    let output = ProcessRunner.run(&sh("echo hello")).await.unwrap();
    assert!(output.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
}

#[tokio::test]
async fn process_runner_reports_exit_code_and_stderr() {
    let output = ProcessRunner
        .run(&sh("echo oops >&2; exit 7"))
        .await
        .unwrap();
    assert!(!output.success());
    assert_eq!(output.exit_code, Some(7));
    assert_eq!(String::from_utf8_lossy(&output.stderr).trim(), "oops");
}

#[tokio::test]
async fn process_runner_spawn_error_is_execution_failure() {
    let invocation = Invocation::new(None, PathBuf::from("/nonexistent/detector"), vec![]);
    let err = ProcessRunner.run(&invocation).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExecutionFailure);
}

#[tokio::test]
async fn process_runner_passes_args_verbatim() {
    let invocation = Invocation {
        program: OsString::from("sh"),
        args: vec![
            OsString::from("-c"),
            OsString::from("printf '%s|' \"$@\""),
            OsString::from("sh"),
            OsString::from("a b.png"),
            OsString::from("$(whoami)"),
        ],
    };
    let output = ProcessRunner.run(&invocation).await.unwrap();
    assert_eq!(String::from_utf8_lossy(&output.stdout), "a b.png|$(whoami)|");
}

#[tokio::test]
async fn process_runner_kills_child_when_dropped() {
    let dir = tempfile::TempDir::new().unwrap();
    let marker = dir.path().join("finished");
    let script = format!("sleep 1; touch '{}'", marker.display());

    let result =
        tokio::time::timeout(Duration::from_millis(200), ProcessRunner.run(&sh(&script))).await;
    assert!(result.is_err());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(!marker.exists());
}

#[tokio::test]
async fn mock_runner_replays_outputs_and_records_calls() {
    let runner = MockRunner::succeeding("{}");
    let first = runner.run(&sh("first")).await.unwrap();
    assert!(first.success());
    assert_eq!(first.stdout, b"{}");

    let second = runner.run(&sh("second")).await;
    assert!(second.is_err());

    let calls = runner.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].args[1], OsString::from("first"));
}
