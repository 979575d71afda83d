#![cfg(unix)]
use std::time::Duration;

use anyhow::Result;
use deployer::{
    exec::{ExecError, ProcessRunner},
    log::Logger,
};
use pretty_assertions::assert_eq;

fn runner() -> ProcessRunner {
    ProcessRunner::new(false, Logger::console(false)).unwrap()
}

#[tokio::test]
async fn test_success_returns_full_stdout() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let report = runner()
        .run("build", "seq 1 5000", dir.path(), true, true)
        .await?;

    assert!(report.success);
    assert_eq!(report.code, Some(0));
    let stdout = report.stdout.expect("stdout captured");
    assert_eq!(stdout.lines().count(), 5000);
    assert!(stdout.ends_with("5000\n"));
    Ok(())
}

#[tokio::test]
async fn test_stdout_not_returned_without_capture() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let report = runner()
        .run("build", "echo hidden", dir.path(), false, true)
        .await?;

    assert!(report.success);
    assert_eq!(report.stdout, None);
    Ok(())
}

#[tokio::test]
async fn test_failure_without_fail_fast_returns_control() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let report = runner()
        .run("deploy", "echo broken >&2; exit 1", dir.path(), false, false)
        .await?;

    assert!(!report.success);
    assert_eq!(report.code, Some(1));
    assert_eq!(report.stderr, "broken\n");
    Ok(())
}

#[tokio::test]
async fn test_failure_with_fail_fast_carries_exit_code() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let err = runner()
        .run("deploy", "exit 1", dir.path(), false, true)
        .await
        .unwrap_err();

    assert!(matches!(err, ExecError::FailFast { code: 1, .. }), "{err:?}");
    assert_eq!(err.exit_code(), 1);

    let err = runner()
        .run("deploy", "exit 7", dir.path(), true, true)
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), 7);
    Ok(())
}

#[tokio::test]
async fn test_command_runs_in_working_directory() -> Result<()> {
    let dir = tempfile::tempdir()?;
    runner()
        .run("touch", "touch deployed.flag", dir.path(), false, true)
        .await?;
    assert!(dir.path().join("deployed.flag").exists());
    Ok(())
}

#[tokio::test]
async fn test_drain_timeout_is_an_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let res = runner()
        .with_drain_timeout(Duration::from_millis(300))
        .run("serve", "sleep 3 & echo up", dir.path(), true, false)
        .await;

    assert!(matches!(res, Err(ExecError::DrainTimeout { .. })), "{res:?}");
    Ok(())
}

#[tokio::test]
async fn test_background_process_does_not_fail_successful_deploy() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let report = runner()
        .with_drain_timeout(Duration::from_millis(300))
        .run("serve", "sleep 3 & echo up", dir.path(), false, true)
        .await?;

    assert!(report.success);
    assert_eq!(report.code, Some(0));
    assert_eq!(report.stdout, None);
    Ok(())
}

#[tokio::test]
async fn test_drain_timeout_after_failure_keeps_child_code() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let err = runner()
        .with_drain_timeout(Duration::from_millis(300))
        .run("serve", "sleep 3 & exit 6", dir.path(), false, true)
        .await
        .unwrap_err();

    assert!(
        matches!(err, ExecError::DrainTimeout { code: Some(6), .. }),
        "{err:?}"
    );
    assert_eq!(err.exit_code(), 6);
    assert!(err.to_string().contains("300ms"), "{err}");
    Ok(())
}

#[test]
fn test_privilege_requirement() {
    let res = ProcessRunner::new(true, Logger::console(false));
    if nix::unistd::geteuid().is_root() {
        assert!(res.is_ok());
    } else {
        assert!(matches!(res, Err(ExecError::NotPrivileged)));
    }
    assert!(ProcessRunner::new(false, Logger::console(false)).is_ok());
}
