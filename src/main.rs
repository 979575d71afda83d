use clap::Parser;

use deployer::cli::{
    Cli,
    handlers::{handle_command, report_failure},
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match handle_command(cli).await {
        Ok(()) => 0,
        Err(e) => report_failure(&e),
    };
    // dropping the runtime would wait on an abandoned git transfer
    std::process::exit(code);
}
