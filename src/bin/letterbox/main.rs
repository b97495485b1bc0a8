//! letterbox: archive admin client driving the query cache and mutation coordinators.
#![deny(clippy::all, clippy::pedantic)]

mod args;
mod client;
mod handlers;
mod print;

use std::process::ExitCode;

use clap::Parser;
use letterbox::{config, infra::telemetry};
use tracing::error;

use args::{Cli, Commands};
use client::{CliError, build_session};
use handlers::{correspondences, letters, recipients};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "Command failed");
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let settings = config::load(&cli.config)?;
    telemetry::init(&settings.logging)?;
    let session = build_session(&cli, &settings)?;

    match cli.command {
        Commands::Letters(cmd) => letters::handle(&session, cmd.action).await,
        Commands::Correspondences(cmd) => correspondences::handle(&session, cmd.action).await,
        Commands::Recipients(cmd) => recipients::handle(&session, cmd.action).await,
    }
}
