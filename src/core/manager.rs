use anyhow::Result;
use tokio::time::sleep;

use crate::{
    config::{WatchConfig, parser::ConfigStore},
    core::{state::WatchOutcome, watcher::WatchContext},
    exec::ProcessRunner,
    log::Logger,
};

/// Sleeps, polls, deploys on change. Only returns on a fatal error.
pub async fn supervisor_loop(ctx: &mut WatchContext) -> Result<()> {
    let interval = ctx.config().poll_interval;

    loop {
        ctx.logger()
            .info(&format!("Sleeping for {} seconds", interval.as_secs()))
            .await?;
        sleep(interval).await;

        ctx.logger().info("Fetching new changes...").await?;
        if ctx.watch_once().await? == WatchOutcome::Deployed {
            ctx.logger().info("✔ Deploy finished, new baseline adopted").await?;
        }
    }
}

/// Entry point of `start`: set up the checkout, deploy once, then watch.
pub async fn start(config: WatchConfig, store: &ConfigStore, logger: Logger) -> Result<()> {
    let runner = ProcessRunner::new(config.require_privileged, logger.clone())?;
    let mut ctx = WatchContext::new(config, store.checkout_dir(), runner, logger);

    ctx.initialize().await?;
    supervisor_loop(&mut ctx).await
}
