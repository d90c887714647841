use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{ArgAction, Parser};

/// Core-hour usage of Slurm accounts, per user, against each account's allocation.
#[derive(Debug, Clone, PartialEq, Parser)]
#[command(version, about)]
pub struct Args {
    /// Report the accounts of this user (default: you)
    #[arg(short, long, conflicts_with = "pi")]
    pub user: Option<String>,

    /// Report every member of the PI's accounts; without a value, you are the PI
    #[arg(short, long, value_name = "PI")]
    pub pi: Option<Option<String>>,

    /// Leave out users without any usage
    #[arg(long)]
    pub hide_zero: bool,

    /// Start of the report (YYYY-MM-DD), default: start of the current quarter
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub start_date: Option<NaiveDate>,

    /// End of the report (YYYY-MM-DD), default: end of the current quarter, or now if only
    /// --start-date is given
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub end_date: Option<NaiveDate>,

    /// Add a column with the usage in percent of the allocation
    #[arg(long)]
    pub usage: bool,

    /// Print every Slurm command before running it
    #[arg(short = 'c', long = "cmd")]
    pub cmd: bool,

    /// Extra TOML config file (command paths)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// More log output on stderr, repeatable
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}
