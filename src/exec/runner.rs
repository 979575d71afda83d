use std::{io::IsTerminal, path::Path, time::Duration};

use tokio::{sync::watch, task::JoinHandle, time::interval};

use crate::{
    exec::{ExecError, command::run_shell},
    log::{Logger, logger::flush_stdout},
};

/// Upper bound for collecting a finished command's output.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(15);

const WHEEL: [char; 4] = ['|', '/', '-', '\\'];
const TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub success: bool,
    pub code: Option<i32>,
    /// Full stdout, only when output capture was requested.
    pub stdout: Option<String>,
    pub stderr: String,
}

/// Runs deploy commands one at a time.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    logger: Logger,
    drain_timeout: Duration,
    spinner: bool,
}

impl ProcessRunner {
    /// Fails right away when `require_privileged` is set and we are not root.
    pub fn new(require_privileged: bool, logger: Logger) -> Result<Self, ExecError> {
        if require_privileged && !is_privileged() {
            return Err(ExecError::NotPrivileged);
        }
        let spinner = logger.is_verbose() && std::io::stdout().is_terminal();
        Ok(Self {
            logger,
            drain_timeout: DRAIN_TIMEOUT,
            spinner,
        })
    }

    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    /// Runs `command` in `working_directory` and waits for it to exit.
    ///
    /// On failure stderr is always logged. With `fail_fast` a failure is
    /// returned as [`ExecError::FailFast`] carrying the child's exit code,
    /// otherwise the report comes back with `success: false`.
    pub async fn run(
        &self,
        label: &str,
        command: &str,
        working_directory: &Path,
        capture_output: bool,
        fail_fast: bool,
    ) -> Result<RunReport, ExecError> {
        self.logger.info(&format!("{label}: {command}")).await?;

        let spinner = self.spinner.then(|| Spinner::start(label.to_string()));
        let result = run_shell(command, working_directory, self.drain_timeout, capture_output).await;

        let output = match result {
            Ok(output) => {
                if let Some(s) = spinner {
                    s.finish(if output.success() { '+' } else { 'x' }, label).await;
                }
                output
            }
            Err(e) => {
                if let Some(s) = spinner {
                    s.finish('x', label).await;
                }
                self.logger.error(&format!("{label}: {e}")).await?;
                return Err(e);
            }
        };

        if output.success() {
            if capture_output {
                self.logger.output("Output", &output.stdout).await?;
            }
            return Ok(RunReport {
                success: true,
                code: output.code,
                stdout: capture_output.then_some(output.stdout),
                stderr: output.stderr,
            });
        }

        let code = output.exit_code();
        self.logger
            .error(&format!(
                "{label} failed with exit code {code}: {}",
                output.stderr.trim()
            ))
            .await?;
        if capture_output && !output.stdout.is_empty() {
            self.logger.output("Output", &output.stdout).await?;
        }

        if fail_fast {
            return Err(ExecError::FailFast {
                label: label.to_string(),
                code,
            });
        }

        Ok(RunReport {
            success: false,
            code: output.code,
            stdout: capture_output.then_some(output.stdout),
            stderr: output.stderr,
        })
    }
}

#[cfg(unix)]
fn is_privileged() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(not(unix))]
fn is_privileged() -> bool {
    true
}

/// `\r [|] label` redrawn every tick until stopped. Display only.
struct Spinner {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Spinner {
    fn start(label: String) -> Self {
        let (stop, mut stopped) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(TICK);
            let mut idx = 0;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        print!("\r [{}] {label}", WHEEL[idx % WHEEL.len()]);
                        flush_stdout();
                        idx += 1;
                    }
                    _ = stopped.changed() => break,
                }
            }
        });
        Self { stop, handle }
    }

    async fn finish(self, mark: char, label: &str) {
        let _ = self.stop.send(true);
        let _ = self.handle.await;
        println!("\r [{mark}] {label}");
    }
}
