use std::path::PathBuf;

use clap::{ArgAction, Parser};

/// Service units consumed by a finished Slurm job.
#[derive(Debug, Clone, PartialEq, Parser)]
#[command(version, about)]
pub struct Args {
    /// Job ID as known to sacct (arrays as `<id>_<index>`)
    pub job_id: String,

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

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn verify_cli() {
        Args::command().debug_assert();
    }

    #[test]
    fn parse_job_and_cmd_flag() {
        let args = Args::try_parse_from(["su-calc", "--cmd", "123_4"]).unwrap();
        assert_eq!(args.job_id, "123_4");
        assert!(args.cmd);
        assert_eq!(args.verbose, 0);

        let args = Args::try_parse_from(["su-calc", "-c", "-vv", "9"]).unwrap();
        assert!(args.cmd);
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn job_id_is_required() {
        assert!(Args::try_parse_from(["su-calc"]).is_err());
    }
}
