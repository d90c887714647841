pub mod account;
pub mod billing;
pub mod command;
pub mod config;
pub mod job;
pub mod logging;
pub mod period;
pub mod report;
pub mod slurm;
pub mod su;

pub mod misc {
    pub mod parsing;
}

/// Account that exists in every Slurm association tree; never reported.
pub const ROOT_ACCOUNT: &str = "root";
