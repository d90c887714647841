use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error};

use crate::{
    args,
    command::{Program, SlurmQuery},
    misc::parsing::{parsable_rows, parse_elapsed_hours, requested_memory_gb},
    slurm::Partition,
};

static GPU_TRES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"gres/gpu(?::[^=,]+)?=(\d+)").expect("gpu tres regex is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Completed,
    Pending,
    Running,
    Cancelled,
    Failed,
    Timeout,
    Unknown(String),
}

impl JobState {
    /// Only the first word counts, sacct prints things like `CANCELLED by 1234`.
    pub fn parse(input: &str) -> Self {
        let word = input.split_whitespace().next().unwrap_or_default();
        match word.to_ascii_uppercase().as_str() {
            "COMPLETED" => JobState::Completed,
            "PENDING" => JobState::Pending,
            "RUNNING" => JobState::Running,
            "CANCELLED" => JobState::Cancelled,
            "FAILED" => JobState::Failed,
            "TIMEOUT" => JobState::Timeout,
            _ => JobState::Unknown(word.to_owned()),
        }
    }

    /// Whether service units are computed for a job in this state.
    ///
    /// A job without any state is not known to have finished and is not billed.
    pub fn is_billable(&self) -> bool {
        match self {
            JobState::Pending | JobState::Running | JobState::Cancelled | JobState::Failed | JobState::Timeout => false,
            JobState::Unknown(raw) => !raw.is_empty(),
            JobState::Completed => true,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Completed => "COMPLETED",
            JobState::Pending => "PENDING",
            JobState::Running => "RUNNING",
            JobState::Cancelled => "CANCELLED",
            JobState::Failed => "FAILED",
            JobState::Timeout => "TIMEOUT",
            JobState::Unknown(raw) if raw.is_empty() => "UNKNOWN",
            JobState::Unknown(raw) => raw.as_str(),
        };
        f.write_str(name)
    }
}

/// What a job allocated, from the job's allocation record.
#[derive(Debug, Clone, PartialEq)]
pub struct JobResourceUsage {
    pub alloc_cpus: u32,
    pub requested_memory_gb: f64,
    /// never below one second, see [`parse_elapsed_hours`]
    pub elapsed_hours: f64,
    pub state: JobState,
    /// only looked up when the partition bills GPUs
    pub gpus: u32,
}

impl JobResourceUsage {
    /// `AllocCPUS|REQMEM|Elapsed|State`; missing CPU or memory fields count as 0.
    pub fn from_row(fields: &[&str]) -> Self {
        let field = |i: usize| fields.get(i).copied().unwrap_or_default();
        JobResourceUsage {
            alloc_cpus: field(0).parse().unwrap_or(0),
            requested_memory_gb: requested_memory_gb(field(1)),
            elapsed_hours: parse_elapsed_hours(field(2)),
            state: JobState::parse(field(3)),
            gpus: 0,
        }
    }

    /// First matching accounting row only; job steps are not summed up.
    pub fn query(query: &impl SlurmQuery, job_id: &str) -> Option<Self> {
        let output = query
            .run(
                Program::Sacct,
                &args!["-nP", "-X", "-j", job_id, "--format=AllocCPUS,REQMEM,Elapsed,State"],
            )
            .inspect_err(|e| error!(job_id, "querying job resources: {e}"))
            .ok()?;
        let rows = parsable_rows(&output);
        let usage = Self::from_row(rows.first()?);
        debug!(job_id, ?usage);
        Some(usage)
    }
}

/// Partition the job ran in, `None` if sacct doesn't know the job.
pub fn resolve_partition(query: &impl SlurmQuery, job_id: &str) -> Option<Partition> {
    let output = query
        .run(Program::Sacct, &args!["-nP", "-X", "-j", job_id, "--format=Partition"])
        .inspect_err(|e| error!(job_id, "querying partition: {e}"))
        .ok()?;

    parsable_rows(&output)
        .into_iter()
        .filter_map(|row| row.first().copied())
        // pending jobs may list several candidate partitions
        .filter_map(|field| field.split(',').next())
        .find(|partition| !partition.is_empty())
        .map(|partition| Partition(partition.to_owned()))
}

/// First `gres/gpu[:type]=<n>` in an `AllocTRES` string, 0 otherwise.
pub fn parse_gpu_count(alloc_tres: &str) -> u32 {
    GPU_TRES
        .captures(alloc_tres)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(0)
}

pub fn gpu_count(query: &impl SlurmQuery, job_id: &str) -> u32 {
    match query.run(Program::Sacct, &args!["-nP", "-X", "-j", job_id, "--format=AllocTRES"]) {
        Ok(output) => output.lines().next().map(parse_gpu_count).unwrap_or(0),
        Err(e) => {
            error!(job_id, "querying allocated GPUs: {e}");
            0
        }
    }
}
