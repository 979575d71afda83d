use std::{path::Path, process::Stdio, time::Duration};

use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::Command,
    time::timeout,
};

use crate::exec::ExecError;

/// Exit status and full output of a finished shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutput {
    pub code: Option<i32>, // None when killed by a signal
    pub stdout: String,
    pub stderr: String,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn exit_code(&self) -> i32 {
        self.code.unwrap_or(1)
    }
}

#[cfg(windows)]
fn shell_cmd(cmd: &str) -> (&'static str, Vec<String>) {
    (
        "powershell.exe",
        vec![
            "-NoProfile".into(),
            "-NonInteractive".into(),
            "-Command".into(),
            cmd.into(),
        ],
    )
}

#[cfg(not(windows))]
fn shell_cmd(cmd: &str) -> (&'static str, Vec<String>) {
    ("sh", vec!["-c".into(), cmd.into()])
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<String> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Runs `command` through the platform shell inside `cwd` and waits for it.
///
/// Both pipes are read from spawn time so a chatty child never blocks on a
/// full pipe. Once the child has exited, the remaining output must arrive
/// within `drain_timeout`; a grandchild still holding the pipes turns into
/// [`ExecError::DrainTimeout`].
///
/// Without `capture`, a successful command returns as soon as it exits and
/// its output is dropped: a deploy that leaves a server running in the
/// background keeps the pipes open for good.
pub async fn run_shell(
    command: &str,
    cwd: &Path,
    drain_timeout: Duration,
    capture: bool,
) -> Result<ShellOutput, ExecError> {
    let (program, args) = shell_cmd(command);

    let mut child = Command::new(program)
        .args(&args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ExecError::Spawn {
            command: command.to_string(),
            source,
        })?;

    let mut stdout_task = tokio::spawn(read_pipe(child.stdout.take()));
    let mut stderr_task = tokio::spawn(read_pipe(child.stderr.take()));

    let status = child.wait().await?;

    if status.success() && !capture {
        stdout_task.abort();
        stderr_task.abort();
        return Ok(ShellOutput {
            code: status.code(),
            stdout: String::new(),
            stderr: String::new(),
        });
    }

    let drained = timeout(drain_timeout, async {
        tokio::try_join!(&mut stdout_task, &mut stderr_task)
    })
    .await;

    match drained {
        Ok(Ok((stdout, stderr))) => Ok(ShellOutput {
            code: status.code(),
            stdout: stdout?,
            stderr: stderr?,
        }),
        Ok(Err(join)) => Err(ExecError::Io(std::io::Error::other(join))),
        Err(_) => {
            stdout_task.abort();
            stderr_task.abort();
            Err(ExecError::DrainTimeout {
                command: command.to_string(),
                timeout: drain_timeout,
                code: status.code(),
            })
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_both_streams() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let out = run_shell(
            "echo out; echo err >&2; exit 3",
            dir.path(),
            Duration::from_secs(5),
            false,
        )
        .await?;
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stdout, "out\n");
        assert_eq!(out.stderr, "err\n");
        assert!(!out.success());
        Ok(())
    }

    #[tokio::test]
    async fn runs_in_working_directory() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("marker.txt"), "here")?;
        let out = run_shell("cat marker.txt", dir.path(), Duration::from_secs(5), true).await?;
        assert_eq!(out.stdout, "here");
        Ok(())
    }

    #[tokio::test]
    async fn large_output_does_not_deadlock() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        // well above a pipe buffer
        let out = run_shell(
            "i=0; while [ $i -lt 20000 ]; do echo line-$i; i=$((i+1)); done",
            dir.path(),
            Duration::from_secs(15),
            true,
        )
        .await?;
        assert!(out.success());
        assert_eq!(out.stdout.lines().count(), 20000);
        assert!(out.stdout.ends_with("line-19999\n"));
        Ok(())
    }

    #[tokio::test]
    async fn grandchild_holding_pipe_hits_drain_timeout() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let res = run_shell(
            "sleep 5 & echo started",
            dir.path(),
            Duration::from_millis(500),
            true,
        )
        .await;
        assert!(matches!(res, Err(ExecError::DrainTimeout { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn success_without_capture_skips_drain() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let out = run_shell(
            "sleep 5 & echo started",
            dir.path(),
            Duration::from_millis(500),
            false,
        )
        .await?;
        assert!(out.success());
        assert!(out.stdout.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn drain_timeout_keeps_exit_code() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let res = run_shell("sleep 5 & exit 6", dir.path(), Duration::from_millis(300), false).await;
        match res {
            Err(ExecError::DrainTimeout { code, timeout, .. }) => {
                assert_eq!(code, Some(6));
                assert_eq!(timeout, Duration::from_millis(300));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        Ok(())
    }
}
