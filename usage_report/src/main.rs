mod cli;

use accounting_data::{
    account::{build_report, AccountMembers, Identity, LoginIdentity},
    command::SystemCommand,
    config::Settings,
    logging,
    period::ReportPeriod,
    report::render_report,
};
use chrono::Local;
use clap::Parser as _;
use cli::Args;
use color_eyre::{eyre::WrapErr as _, Result};
use tracing::info;

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    logging::init(args.verbose);

    let settings = Settings::new(args.config.as_deref()).wrap_err("loading configuration")?;
    info!(?settings, "configuration loaded");
    let query = SystemCommand::new(settings.commands, args.cmd);

    let identity = Identity::from_args(args.user, args.pi, &LoginIdentity)?;
    let period = ReportPeriod::resolve(args.start_date, args.end_date, Local::now().naive_local())?;
    info!(%identity, %period, "reporting");

    let members = AccountMembers::query(&query, &identity);
    if members.is_empty() {
        println!("No accounts found for {identity}.");
        return Ok(());
    }

    let reports = build_report(&query, &members, &period, args.hide_zero);
    print!("{}", render_report(&reports, &period, args.usage));
    Ok(())
}
