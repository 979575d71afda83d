use std::path::PathBuf;

use anyhow::Result;

use crate::{
    config::WatchConfig,
    core::state::{WatchOutcome, WatchState},
    exec::{ProcessRunner, RunReport},
    git::{RefreshOutcome, RepositorySnapshot, TrackedRepository, url::display_name},
    log::Logger,
};

const RUN_LABEL: &str = "running command";

/// Everything one watch needs: settings, the checkout, the runner and the
/// last adopted snapshot.
pub struct WatchContext {
    config: WatchConfig,
    repo: TrackedRepository,
    runner: ProcessRunner,
    logger: Logger,
    state: WatchState,
    baseline: Option<RepositorySnapshot>,
}

impl WatchContext {
    pub fn new(
        config: WatchConfig,
        checkout_dir: impl Into<PathBuf>,
        runner: ProcessRunner,
        logger: Logger,
    ) -> Self {
        let repo = TrackedRepository::new(
            config.repository_url.clone(),
            checkout_dir,
            config.refresh_timeout,
        );
        Self {
            config,
            repo,
            runner,
            logger,
            state: WatchState::Initializing,
            baseline: None,
        }
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn baseline(&self) -> Option<&RepositorySnapshot> {
        self.baseline.as_ref()
    }

    pub fn repository(&self) -> &TrackedRepository {
        &self.repo
    }

    /// Initializing -> Watching: clone, take the baseline, deploy once.
    pub async fn initialize(&mut self) -> Result<()> {
        if self.state != WatchState::Initializing {
            anyhow::bail!("watch already initialized (state: {})", self.state);
        }
        let name = display_name(&self.config.repository_url);

        self.logger
            .info(&format!("Cloning {name} into {}", self.repo.checkout_dir().display()))
            .await?;
        self.repo.setup().await?;
        self.logger
            .info(&format!(
                "Tracking branch `{}`",
                self.repo.branch().unwrap_or_default()
            ))
            .await?;

        self.logger.info("Getting commits and tags...").await?;
        let snapshot = self
            .repo
            .snapshot(self.config.track_commits, self.config.track_tags)
            .await?;

        self.deploy("first deploy").await?;

        self.baseline = Some(snapshot);
        self.state = WatchState::Watching;
        self.logger.info(&format!("Watching {name}")).await?;
        Ok(())
    }

    /// Refreshes the checkout and captures a new snapshot.
    ///
    /// Tags need a full re-clone: a plain pull never retrieves them.
    pub async fn poll(&mut self) -> Result<RepositorySnapshot> {
        let renew = self.config.track_tags;
        let outcome = self.repo.refresh(renew).await?;
        match outcome {
            RefreshOutcome::Reset => {
                self.logger
                    .warning("Upstream history was rewritten, checkout reset to the remote branch")
                    .await?
            }
            other => self.logger.info(&format!("Refresh: {other:?}")).await?,
        }
        Ok(self
            .repo
            .snapshot(self.config.track_commits, self.config.track_tags)
            .await?)
    }

    /// One cycle: poll, compare with the baseline, deploy on change.
    ///
    /// A failed deploy is returned as an error and the baseline is left
    /// untouched.
    pub async fn watch_once(&mut self) -> Result<WatchOutcome> {
        if self.state != WatchState::Watching {
            anyhow::bail!("cannot poll while {}", self.state);
        }

        let snapshot = self.poll().await?;
        let baseline = self
            .baseline
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no baseline snapshot"))?;

        if &snapshot == baseline {
            self.logger.info("No change").await?;
            return Ok(WatchOutcome::Unchanged);
        }

        self.logger
            .info(&format!(
                "Changes detected in source repository: {}",
                snapshot.describe_changes(baseline)
            ))
            .await?;

        self.state = WatchState::Deploying;
        self.deploy("change detected").await?;
        self.baseline = Some(snapshot);
        self.state = WatchState::Watching;
        Ok(WatchOutcome::Deployed)
    }

    async fn deploy(&self, reason: &str) -> Result<RunReport> {
        self.logger.deploy_start(reason).await?;
        let report = self
            .runner
            .run(
                RUN_LABEL,
                &self.config.command,
                self.repo.checkout_dir(),
                self.config.capture_output,
                true,
            )
            .await?;
        self.logger.deploy_end("command succeeded").await?;
        Ok(report)
    }
}
