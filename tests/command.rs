//! End-to-end runs of real commands through the tokio-backed handle.
#![cfg(unix)]

use std::time::Duration;

use childvisor::{
    ChildProcess, Config, OutputMode, OutputStream, Phase, ProcessError, SIGNALED_EXIT_CODE,
};

fn buffered(name: &str, args: &[&str]) -> ChildProcess {
    ChildProcess::builder(name)
        .args(args.iter().copied())
        .config(Config {
            output: OutputMode::buffered(),
            ..Config::default()
        })
        .build()
}

#[tokio::test]
async fn exit_code_and_output_are_recorded() {
    let c = buffered("sh", &["-c", "echo hi; echo oops >&2; exit 3"]);
    c.start().unwrap();
    let status = c.wait().await;

    assert!(status.complete);
    assert_eq!(status.exit_code, 3);
    assert!(status.error.is_none());
    assert_ne!(status.pid, 0);
    assert_eq!(c.phase(), Phase::Failed);

    let out = c.buffered_output();
    assert_eq!(out.stdout, vec!["hi".to_string()]);
    assert_eq!(out.stderr, vec!["oops".to_string()]);

    let snap = c.to_json();
    assert!(snap.complete);
    assert_eq!(snap.exit_code, 3);
    assert!(snap.is_started());
}

#[tokio::test]
async fn streamed_lines_reach_subscribers() {
    let c = ChildProcess::new("sh", ["-c", "sleep 0.2; echo one; echo two"]);
    let mut rx = c.subscribe_output();
    c.start().unwrap();

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert_eq!(first.stream, OutputStream::Stdout);
    assert_eq!(&*first.text, "one");
    assert_eq!(&*second.text, "two");
    assert!(second.seq > first.seq);

    let status = c.wait().await;
    assert_eq!(status.exit_code, 0);
    assert_eq!(c.phase(), Phase::Succeeded);
}

#[tokio::test]
async fn dir_and_env_are_applied() {
    let c = buffered("sh", &["-c", "pwd; echo $GREETING"]);
    c.set_dir("/").unwrap();
    c.set_env(["GREETING=hello", "PATH=/usr/bin:/bin"]).unwrap();
    c.start().unwrap();
    c.wait().await;

    assert_eq!(
        c.buffered_output().stdout,
        vec!["/".to_string(), "hello".to_string()]
    );
}

#[tokio::test]
async fn stop_ends_the_run_incomplete() {
    let c = ChildProcess::builder("sleep")
        .args(["30"])
        .config(Config {
            stop_grace: Duration::from_millis(200),
            ..Config::default()
        })
        .build();
    c.start().unwrap();
    assert_eq!(c.phase(), Phase::Running);

    c.stop().unwrap();
    let status = tokio::time::timeout(Duration::from_secs(5), c.wait())
        .await
        .expect("stop did not finish the process");

    assert!(!status.complete);
    assert_eq!(status.exit_code, SIGNALED_EXIT_CODE);
    assert_eq!(c.phase(), Phase::Stopped);
    assert!(c.stop().is_ok());
    assert!(c.signal(15).is_err());
}

#[tokio::test]
async fn spawn_failure_is_recorded() {
    let c = ChildProcess::new("/nonexistent/childvisor-test-binary", Vec::<String>::new());
    let err = c.start().unwrap_err();
    assert!(matches!(err, ProcessError::Spawn { .. }));

    let status = c.wait().await;
    assert!(!status.complete);
    assert!(status.error.is_some());
    assert_eq!(c.phase(), Phase::Failed);
    assert!(c.to_json().error.is_some());
}

#[tokio::test]
async fn clone_runs_again_after_finish() {
    let c = buffered("echo", &["again"]);
    c.start().unwrap();
    c.wait().await;

    let twin = c.clone_child();
    assert!(matches!(
        c.start(),
        Err(ProcessError::AlreadyStarted { .. })
    ));
    twin.start().unwrap();
    let status = twin.wait().await;
    assert!(status.complete);
    assert_eq!(twin.buffered_output().stdout, vec!["again".to_string()]);
}

#[tokio::test]
async fn invalid_utf8_output_does_not_kill_the_child() {
    let c = buffered("sh", &["-c", "printf '\\377\\n'; sleep 0.3; echo after; exit 0"]);
    c.start().unwrap();
    let status = c.wait().await;

    assert!(status.complete);
    assert_eq!(status.exit_code, 0);
    assert_eq!(c.phase(), Phase::Succeeded);
    assert_eq!(
        c.buffered_output().stdout,
        vec!["\u{fffd}".to_string(), "after".to_string()]
    );
}

#[tokio::test]
async fn last_line_without_newline_is_kept() {
    let c = buffered("sh", &["-c", "echo first; printf 'no newline'"]);
    c.start().unwrap();
    c.wait().await;

    assert_eq!(
        c.buffered_output().stdout,
        vec!["first".to_string(), "no newline".to_string()]
    );
}

#[tokio::test]
async fn exit_is_reported_while_grandchild_holds_the_pipe() {
    let c = ChildProcess::new("sh", ["-c", "sleep 5 & echo started; exit 0"]);
    c.start().unwrap();

    let status = tokio::time::timeout(Duration::from_secs(3), c.wait())
        .await
        .expect("wait blocked on an inherited pipe");
    assert!(status.complete);
    assert_eq!(status.exit_code, 0);
    assert_eq!(c.phase(), Phase::Succeeded);

    let first = c.to_json().run_time;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(c.to_json().run_time, first);
}
