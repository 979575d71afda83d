use std::{io::IsTerminal, time::Duration};

use anyhow::{Ok, Result};
use dialoguer::{Confirm, Input};

use crate::{
    cli::{Cli, Commands, SetupArgs},
    config::{
        ConfigError, ConfigRecord, DEFAULT_REFRESH_TIMEOUT, DEFAULT_SLEEP_INTERVAL,
        parser::ConfigStore,
    },
    core::manager,
    exec::{ExecError, ProcessRunner},
    git::{TrackedRepository, url::display_name},
    log::Logger,
};

/// Dispatches a parsed command line. `--silent` is threaded down as the
/// logger's verbosity.
pub async fn handle_command(cli: Cli) -> Result<()> {
    let store = ConfigStore::default_location()?;
    let verbose = !cli.silent;

    match cli.command {
        Commands::Setup(args) => handle_setup(&store, args, verbose).await,
        Commands::Start { verbose: capture } => handle_start(&store, capture, verbose).await,
        Commands::Reset { yes } => handle_reset(&store, yes).await,
        Commands::Configs => handle_configs(&store),
        Commands::Version => {
            println!(
                "App Name: {}\nApp version: {}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            );
            Ok(())
        }
    }
}

/// Values collected by `setup`, prompted or taken from flags.
#[derive(Debug, Clone, PartialEq)]
pub struct SetupAnswers {
    pub record: ConfigRecord,
    pub run_after_setup: bool,
}

impl SetupArgs {
    pub fn resolve(self) -> Result<SetupAnswers> {
        let interactive = !self.no_input && std::io::stdin().is_terminal();

        let git_url = ask_text(self.git_url, interactive, "Enter git destination url to watch")?;
        let track_commits = ask_bool(
            self.track_commits,
            interactive,
            "Enable tracking commits in watcher?",
            true,
        )?;
        let track_tags = ask_bool(
            self.track_tags,
            interactive,
            "Enable tracking tags in watcher?",
            false,
        )?;
        let execute_command = ask_text(self.execute_command, interactive, "Enter your command")?;
        let run_after_setup = ask_bool(
            self.run_after_setup,
            interactive,
            "Run one time after setup is completed?",
            false,
        )?;
        let sleep_interval = match self.sleep_interval {
            Some(v) => v,
            None if interactive => Input::<u64>::new()
                .with_prompt("Sleep interval (minutes) between two checks")
                .default(DEFAULT_SLEEP_INTERVAL)
                .interact_text()?,
            None => DEFAULT_SLEEP_INTERVAL,
        };
        let require_privileged = self.require_privileged.unwrap_or(false);

        Ok(SetupAnswers {
            record: ConfigRecord {
                setup_done: true,
                git_repo_url: git_url.trim().to_string(),
                execute_command,
                sleep_interval,
                track_commits,
                track_tags,
                require_privileged,
                refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            },
            run_after_setup,
        })
    }
}

fn ask_text(value: Option<String>, interactive: bool, prompt: &str) -> Result<String> {
    match value {
        Some(v) => Ok(v),
        None if interactive => Ok(Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()?),
        None => Ok(String::new()),
    }
}

fn ask_bool(value: Option<bool>, interactive: bool, prompt: &str, default: bool) -> Result<bool> {
    match value {
        Some(v) => Ok(v),
        None if interactive => Ok(Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?),
        None => Ok(default),
    }
}

/// Validates the answers and the repository URL, optionally deploys once,
/// then persists the record. Nothing is written when a check fails.
pub async fn handle_setup(store: &ConfigStore, args: SetupArgs, verbose: bool) -> Result<()> {
    let answers = args.resolve()?;
    let record = answers.record;
    record.check()?;

    let timeout = Duration::from_secs(record.refresh_timeout);
    if !TrackedRepository::validate(&record.git_repo_url, timeout).await? {
        return Err(ConfigError::InvalidRepository.into());
    }

    let logger = Logger::new(&store.log_path(), verbose).await?;

    if answers.run_after_setup {
        let mut repo = TrackedRepository::new(&record.git_repo_url, store.checkout_dir(), timeout);
        repo.setup().await?;
        let runner = ProcessRunner::new(record.require_privileged, logger.clone())?;
        runner
            .run(
                "Running Command",
                &record.execute_command,
                repo.checkout_dir(),
                true,
                true,
            )
            .await?;
    }

    if verbose {
        println!("Git Repository URL: {}", record.git_repo_url);
        println!("Execution Command: {}", record.execute_command);
        println!("Sleep Interval: {}", record.sleep_interval);
    }

    store.save(&record)?;
    logger
        .info(&format!(
            "✔ Configurations updated! ({})",
            display_name(&record.git_repo_url)
        ))
        .await?;
    Ok(())
}

pub async fn handle_start(store: &ConfigStore, capture_output: bool, verbose: bool) -> Result<()> {
    let config = store.load()?.watch_config(capture_output)?;
    let logger = Logger::new(&store.log_path(), verbose).await?;

    tokio::select! {
        res = manager::start(config, store, logger.clone()) => res,
        _ = tokio::signal::ctrl_c() => {
            logger.warning("Interrupted, watcher stopped").await?;
            Ok(())
        }
    }
}

/// Writes `{"setup_done": false}` and removes the checkout.
pub async fn handle_reset(store: &ConfigStore, yes: bool) -> Result<()> {
    let sure = yes
        || (std::io::stdin().is_terminal()
            && Confirm::new()
                .with_prompt("Are you sure?")
                .default(false)
                .interact()?);
    if !sure {
        println!("✋ Command will not take effect.");
        return Ok(());
    }

    let record = store.load()?;
    store.reset()?;
    TrackedRepository::new(
        record.git_repo_url,
        store.checkout_dir(),
        Duration::from_secs(record.refresh_timeout),
    )
    .destroy()?;
    println!("✔ Configurations Reset!");
    Ok(())
}

pub fn handle_configs(store: &ConfigStore) -> Result<()> {
    let record = store.load()?;
    println!("deployer configurations ({})", store.config_path().display());
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

/// Prints `err` and returns the process exit code for it.
pub fn report_failure(err: &anyhow::Error) -> i32 {
    if let Some(cfg) = err.downcast_ref::<ConfigError>() {
        eprintln!("⚠ {cfg}");
        if let Some(hint) = cfg.hint() {
            eprintln!("👉 You may need to run: {hint}");
        }
        eprintln!("✋ Command will not take effect.");
        return 2;
    }
    if let Some(exec) = err.downcast_ref::<ExecError>() {
        eprintln!("❌ {exec}");
        return exec.exit_code();
    }
    eprintln!("❌ Error: {err:#}");
    1
}
