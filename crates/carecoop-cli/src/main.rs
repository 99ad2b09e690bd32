//! CareCoop CLI - command-line interface for cooperative governance.
//!
//! Each invocation acts as one identity at one block height against the
//! ledger stored in the configured data directory.

mod commands;
mod config;
mod output;
mod telemetry;

use clap::Parser;

fn main() {
    let cli = commands::Cli::parse();

    if let Err(e) = run(cli) {
        output::print_error(&format!("Error: {:#}", e));
        std::process::exit(1);
    }
}

fn run(cli: commands::Cli) -> anyhow::Result<()> {
    let config = config::CliConfig::load(cli.config.as_deref())?;
    config.validate()?;
    telemetry::init_telemetry(&config.logging, cli.log_level.as_deref())?;

    commands::execute(cli, config)
}
