mod cli;

use std::process::ExitCode;

use accounting_data::{command::SystemCommand, config::Settings, logging, su};
use clap::Parser as _;
use cli::Args;
use color_eyre::{eyre::WrapErr as _, Result};
use tracing::{debug, info};

fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let args = Args::parse();
    logging::init(args.verbose);

    let settings = Settings::new(args.config.as_deref()).wrap_err("loading configuration")?;
    info!(?settings, "configuration loaded");
    let query = SystemCommand::new(settings.commands, args.cmd);

    match su::calculate(&query, &args.job_id) {
        Ok(outcome) => {
            println!("{outcome}");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            debug!(error = ?e, "service unit calculation failed");
            println!("Error: {e}");
            Ok(ExitCode::FAILURE)
        }
    }
}
