use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::command::Program;

/// Looked up as `/etc/slurm-accounting/config.toml`, missing is fine.
const SYSTEM_CONFIG: &str = "/etc/slurm-accounting/config";
const ENV_PREFIX: &str = "SLURM_ACCOUNTING";

/// Names (or absolute paths) of the Slurm executables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Commands {
    pub sacct: String,
    pub sacctmgr: String,
    pub sreport: String,
    pub scontrol: String,
}

impl Default for Commands {
    fn default() -> Self {
        Self {
            sacct: Program::Sacct.default_name().to_owned(),
            sacctmgr: Program::Sacctmgr.default_name().to_owned(),
            sreport: Program::Sreport.default_name().to_owned(),
            scontrol: Program::Scontrol.default_name().to_owned(),
        }
    }
}

impl Commands {
    pub fn path(&self, program: Program) -> &str {
        match program {
            Program::Sacct => &self.sacct,
            Program::Sacctmgr => &self.sacctmgr,
            Program::Sreport => &self.sreport,
            Program::Scontrol => &self.scontrol,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub commands: Commands,
}

impl Settings {
    /// Built-in defaults, then the system config file, then `extra` (must exist if given), then
    /// environment variables like `SLURM_ACCOUNTING_COMMANDS__SACCT=/opt/slurm/bin/sacct`.
    pub fn new(extra: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_sources(Some(Path::new(SYSTEM_CONFIG)), extra)
    }

    fn from_sources(system: Option<&Path>, extra: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = Commands::default();
        let mut builder = Config::builder()
            .set_default("commands.sacct", defaults.sacct)?
            .set_default("commands.sacctmgr", defaults.sacctmgr)?
            .set_default("commands.sreport", defaults.sreport)?
            .set_default("commands.scontrol", defaults.scontrol)?;

        if let Some(system) = system {
            builder = builder.add_source(File::from(system).required(false));
        }
        if let Some(extra) = extra {
            builder = builder.add_source(File::from(extra).required(true));
        }

        builder
            .add_source(Environment::with_prefix(ENV_PREFIX).prefix_separator("_").separator("__"))
            .build()?
            .try_deserialize()
    }
}
