use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::{
    args,
    command::{CommandError, Program, SlurmQuery},
    slurm::Partition,
};

static DESCRIPTOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"TRESBillingWeights=(\S+)").expect("billing descriptor regex is valid"));

static WEIGHT_TERM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)(cpu|mem|gres/gpu(?::[^=]+)?)=([0-9]*\.?[0-9]+)([KMGTP]?)$").expect("weight term regex is valid")
});

/// Per-partition multipliers, memory normalized to GB.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BillingWeights {
    pub cpu: f64,
    pub mem_per_gb: f64,
    /// `0.0` means GPUs are not billed at all on this partition
    pub gpu: f64,
}

impl BillingWeights {
    /// Used when a partition has no (or an unreadable) `TRESBillingWeights`.
    pub const FALLBACK: BillingWeights = BillingWeights {
        cpu: 1.0,
        mem_per_gb: 1.0,
        gpu: 0.0,
    };

    /// Finds `TRESBillingWeights=CPU=<n>,Mem=<n>[unit][,GRES/gpu=<n>]` anywhere in `text`.
    ///
    /// `CPU` and `Mem` are required. Memory in `M` is divided by 1024, `G` or no unit is taken as
    /// GB already. Other terms (e.g. `license/…`) are ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let descriptor = DESCRIPTOR.captures(text)?.get(1)?.as_str();

        let (mut cpu, mut mem_per_gb, mut gpu) = (None, None, None);
        for term in descriptor.split(',').filter(|term| !term.is_empty()) {
            let Some(caps) = WEIGHT_TERM.captures(term) else {
                debug!(term, "ignoring billing weight term");
                continue;
            };
            let key = caps[1].to_ascii_lowercase();
            let value: f64 = caps[2].parse().ok()?;
            let unit = caps[3].to_ascii_uppercase();

            match key.as_str() {
                "cpu" if unit.is_empty() => cpu = cpu.or(Some(value)),
                "mem" => mem_per_gb = mem_per_gb.or(Some(mem_weight_per_gb(value, &unit))),
                gres if gres.starts_with("gres/gpu") && unit.is_empty() => gpu = gpu.or(Some(value)),
                _ => return None,
            }
        }

        Some(Self {
            cpu: cpu?,
            mem_per_gb: mem_per_gb?,
            gpu: gpu.unwrap_or(0.0),
        })
    }

    /// [`Self::parse`], degrading to [`Self::FALLBACK`].
    pub fn resolve(text: &str) -> Self {
        Self::parse(text).unwrap_or_else(|| {
            warn!("no usable TRESBillingWeights, falling back to CPU=1,Mem=1G");
            Self::FALLBACK
        })
    }

    pub fn bills_gpus(&self) -> bool {
        self.gpu != 0.0
    }

    /// Reads the partition definition via `scontrol show partition`.
    ///
    /// A failing command is an error; a definition without billing weights is not.
    pub fn for_partition(query: &impl SlurmQuery, partition: &Partition) -> Result<Self, CommandError> {
        let output = query.run(Program::Scontrol, &args!["show", "partition", partition.as_str()])?;
        Ok(Self::resolve(&output))
    }
}

/// The weight is per unit of memory, so a per-MB weight is scaled down, per-TB scaled up.
fn mem_weight_per_gb(value: f64, unit: &str) -> f64 {
    match unit {
        "K" => value / 1024f64.powi(2),
        "M" => value / 1024.0,
        "T" => value * 1024.0,
        "P" => value * 1024f64.powi(2),
        _ => value,
    }
}
