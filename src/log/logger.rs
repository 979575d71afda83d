use std::{
    io::{IsTerminal, Write},
    path::Path,
    sync::Arc,
};

use anyhow::Ok;
use chrono::Local;
use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::Mutex};

/// Console + file logger.
///
/// Every line is appended to the log file and mirrored on the console.
/// `INFO` lines are hidden from the console when `verbose` is off, warnings
/// and errors always go to stderr.
#[derive(Debug, Clone)]
pub struct Logger {
    file: Option<Arc<Mutex<tokio::fs::File>>>,
    color: ConsoleColor,
    verbose: bool,
}

/// Whether badges are painted, per console stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ConsoleColor {
    stdout: bool,
    stderr: bool,
}

impl ConsoleColor {
    fn detect() -> Self {
        let allowed = std::env::var("DEPLOYER_NO_COLOR").ok().as_deref() != Some("1");
        Self {
            stdout: allowed && std::io::stdout().is_terminal(),
            stderr: allowed && std::io::stderr().is_terminal(),
        }
    }
}

const RESET: &str = "\x1b[0m";
const BG_BLUE: &str = "\x1b[44m"; // info
const BG_ORANGE: &str = "\x1b[48;5;208m"; // warning
const BG_RED: &str = "\x1b[41m";
const BG_GREEN: &str = "\x1b[42m"; // deploy start
const BG_MAGENTA: &str = "\x1b[45m"; // deploy end
const FG_BOLD_WHITE: &str = "\x1b[97;1m";

impl Logger {
    pub async fn new(path: &Path, verbose: bool) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .await?;
        Ok(Self {
            file: Some(Arc::new(Mutex::new(file))),
            color: ConsoleColor::detect(),
            verbose,
        })
    }

    /// Logger without a backing file, used before the home directory is known.
    pub fn console(verbose: bool) -> Logger {
        Logger {
            file: None,
            color: ConsoleColor::detect(),
            verbose,
        }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    fn paint_level(&self, level: &str, painted: bool) -> String {
        if !painted {
            return level.to_string();
        }
        match level {
            "INFO" => format!("{BG_BLUE}{FG_BOLD_WHITE} {level} {RESET}"),
            "WARNING" => format!("{BG_ORANGE}{FG_BOLD_WHITE} {level} {RESET}"),
            "ERROR" => format!("{BG_RED}{FG_BOLD_WHITE} {level} {RESET}"),
            "DEPLOY START" => format!("{BG_GREEN}{FG_BOLD_WHITE} {level} {RESET}"),
            "DEPLOY END" => format!("{BG_MAGENTA}{FG_BOLD_WHITE} {level} {RESET}"),
            _ => level.to_string(),
        }
    }

    pub async fn log(&self, level: &str, msg: &str) -> anyhow::Result<()> {
        let now = Local::now();
        let stamp = now.format("%Y-%m-%d %H:%M:%S");

        match level {
            "WARNING" | "ERROR" => {
                eprintln!("{} {msg}", self.paint_level(level, self.color.stderr))
            }
            _ if self.verbose => println!("{} {msg}", self.paint_level(level, self.color.stdout)),
            _ => {}
        }

        if let Some(file) = &self.file {
            // the file never gets escape codes
            let line = format!("[{stamp}] {level}: {msg}\n");
            let mut f = file.lock().await;
            f.write_all(line.as_bytes()).await?;
            f.flush().await?;
        }
        Ok(())
    }

    pub async fn info(&self, msg: &str) -> anyhow::Result<()> {
        self.log("INFO", msg).await
    }

    pub async fn warning(&self, msg: &str) -> anyhow::Result<()> {
        self.log("WARNING", msg).await
    }

    pub async fn error(&self, msg: &str) -> anyhow::Result<()> {
        self.log("ERROR", msg).await
    }

    pub async fn deploy_start(&self, msg: &str) -> anyhow::Result<()> {
        self.log("DEPLOY START", msg).await
    }

    pub async fn deploy_end(&self, msg: &str) -> anyhow::Result<()> {
        self.log("DEPLOY END", msg).await
    }

    /// Writes raw command output to the console (when verbose) and the file.
    pub async fn output(&self, title: &str, body: &str) -> anyhow::Result<()> {
        if self.verbose {
            println!("{title}:");
            println!("{}", body.trim_end());
        }
        if let Some(file) = &self.file {
            let mut f = file.lock().await;
            f.write_all(format!("--- {title} ---\n{}\n", body.trim_end()).as_bytes())
                .await?;
            f.flush().await?;
        }
        Ok(())
    }
}

/// Flushes stdout after an in-place (`\r`) console update.
pub fn flush_stdout() {
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_lines_have_level_and_no_color() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("logs").join("deployer.log");
        let logger = Logger::new(&path, false).await?;

        logger.info("hello").await?;
        logger.error("boom").await?;

        let content = tokio::fs::read_to_string(&path).await?;
        assert!(content.contains("INFO: hello"));
        assert!(content.contains("ERROR: boom"));
        assert!(!content.contains("\x1b["));
        Ok(())
    }

    #[tokio::test]
    async fn console_logger_writes_nothing_to_disk() {
        let logger = Logger::console(true);
        assert!(logger.file.is_none());
        assert!(logger.info("only console").await.is_ok());
    }

    #[test]
    fn badges_follow_the_target_stream() {
        let logger = Logger {
            file: None,
            color: ConsoleColor {
                stdout: false,
                stderr: true,
            },
            verbose: true,
        };
        assert_eq!(logger.paint_level("INFO", logger.color.stdout), "INFO");
        assert!(
            logger
                .paint_level("ERROR", logger.color.stderr)
                .starts_with(BG_RED)
        );
    }
}
