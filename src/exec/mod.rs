use std::time::Duration;

use thiserror::Error;

pub mod command;
pub mod runner;

pub use command::{ShellOutput, run_shell};
pub use runner::{ProcessRunner, RunReport};

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("This command must be run as root")]
    NotPrivileged,

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command failed and the caller asked for the whole process to stop.
    #[error("{label} failed with exit code {code}")]
    FailFast { label: String, code: i32 },

    /// The command exited but its output did not arrive in time. `code` is
    /// the command's own exit status.
    #[error("output of `{command}` was not drained within {timeout:?}")]
    DrainTimeout {
        command: String,
        timeout: Duration,
        code: Option<i32>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Log(#[from] anyhow::Error),
}

impl ExecError {
    /// Exit status the watcher process should terminate with.
    pub fn exit_code(&self) -> i32 {
        match self {
            ExecError::FailFast { code, .. } => *code,
            ExecError::DrainTimeout {
                code: Some(code), ..
            } if *code != 0 => *code,
            _ => 1,
        }
    }
}
