//! Service units for a single finished job.
//!
//! ```text
//! su/h  = cpus · w_cpu + mem_gb · w_mem + gpus · w_gpu
//! total = su/h · elapsed_hours
//! ```

use std::fmt;

use thiserror::Error;
use tracing::info;

use crate::{
    billing::BillingWeights,
    command::{CommandError, SlurmQuery},
    job::{gpu_count, resolve_partition, JobResourceUsage, JobState},
    misc::parsing::MIN_ELAPSED_HOURS,
    slurm::Partition,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Cpu,
    Memory,
    Gpu,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::Cpu => "CPU",
            Category::Memory => "Memory",
            Category::Gpu => "GPU",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceUnitBreakdown {
    pub cpu_su: f64,
    pub memory_su: f64,
    pub gpu_su: f64,
    pub su_per_hour: f64,
    pub total_su: f64,
    /// largest contribution, ties go to CPU, then Memory
    pub dominant: Category,
}

impl ServiceUnitBreakdown {
    pub fn compute(weights: &BillingWeights, usage: &JobResourceUsage) -> Self {
        let cpu_su = f64::from(usage.alloc_cpus) * weights.cpu;
        let memory_su = usage.requested_memory_gb * weights.mem_per_gb;
        let gpu_su = f64::from(usage.gpus) * weights.gpu;
        let su_per_hour = cpu_su + memory_su + gpu_su;
        let total_su = su_per_hour * usage.elapsed_hours.max(MIN_ELAPSED_HOURS);

        let dominant = [(Category::Memory, memory_su), (Category::Gpu, gpu_su)]
            .into_iter()
            .fold((Category::Cpu, cpu_su), |best, candidate| {
                if candidate.1 > best.1 {
                    candidate
                } else {
                    best
                }
            })
            .0;

        Self {
            cpu_su,
            memory_su,
            gpu_su,
            su_per_hour,
            total_su,
            dominant,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceUnitReport {
    pub job_id: String,
    pub partition: Partition,
    pub weights: BillingWeights,
    pub usage: JobResourceUsage,
    pub breakdown: ServiceUnitBreakdown,
}

impl fmt::Display for ServiceUnitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            job_id,
            partition,
            weights,
            usage,
            breakdown,
        } = self;

        writeln!(f, "Job ID:            {job_id}")?;
        writeln!(f, "Partition:         {partition}")?;
        writeln!(f, "State:             {}", usage.state)?;
        writeln!(
            f,
            "Billing weights:   CPU={}, Mem={}/GB, GPU={}",
            weights.cpu, weights.mem_per_gb, weights.gpu
        )?;
        writeln!(f)?;
        writeln!(f, "Allocated CPUs:    {}", usage.alloc_cpus)?;
        writeln!(f, "Requested memory:  {:.2} GB", usage.requested_memory_gb)?;
        if weights.bills_gpus() {
            writeln!(f, "Allocated GPUs:    {}", usage.gpus)?;
        }
        writeln!(f, "Elapsed:           {:.4} h", usage.elapsed_hours)?;
        writeln!(f)?;
        writeln!(f, "CPU SU/h:          {:.2}", breakdown.cpu_su)?;
        writeln!(f, "Memory SU/h:       {:.2}", breakdown.memory_su)?;
        if weights.bills_gpus() {
            writeln!(f, "GPU SU/h:          {:.2}", breakdown.gpu_su)?;
        }
        writeln!(f, "SU per hour:       {:.2}", breakdown.su_per_hour)?;
        writeln!(f, "Total SU:          {:.2}", breakdown.total_su)?;
        write!(f, "Dominant resource: {}", breakdown.dominant)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SuOutcome {
    /// the job is not (yet) in a state that gets billed
    NotBillable { job_id: String, state: JobState },
    Computed(ServiceUnitReport),
}

impl fmt::Display for SuOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuOutcome::NotBillable { job_id, state } => {
                write!(f, "Job {job_id} is {state}, no service units computed.")
            }
            SuOutcome::Computed(report) => fmt::Display::fmt(report, f),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SuError {
    #[error("could not determine the partition of job {0}")]
    PartitionNotFound(String),
    #[error("could not read billing weights of partition {partition}")]
    BillingWeights {
        partition: Partition,
        #[source]
        source: CommandError,
    },
    #[error("could not retrieve accounting information for job {0}")]
    JobNotFound(String),
}

/// partition → billing weights → job record → (GPUs, only if billed) → SU.
pub fn calculate(query: &impl SlurmQuery, job_id: &str) -> Result<SuOutcome, SuError> {
    let partition = resolve_partition(query, job_id).ok_or_else(|| SuError::PartitionNotFound(job_id.to_owned()))?;
    let weights = BillingWeights::for_partition(query, &partition).map_err(|source| SuError::BillingWeights {
        partition: partition.clone(),
        source,
    })?;
    let mut usage = JobResourceUsage::query(query, job_id).ok_or_else(|| SuError::JobNotFound(job_id.to_owned()))?;

    if !usage.state.is_billable() {
        info!(job_id, state = %usage.state, "job not billable");
        return Ok(SuOutcome::NotBillable {
            job_id: job_id.to_owned(),
            state: usage.state,
        });
    }

    if weights.bills_gpus() {
        usage.gpus = gpu_count(query, job_id);
    }

    let breakdown = ServiceUnitBreakdown::compute(&weights, &usage);
    info!(job_id, total_su = breakdown.total_su, "computed service units");

    Ok(SuOutcome::Computed(ServiceUnitReport {
        job_id: job_id.to_owned(),
        partition,
        weights,
        usage,
        breakdown,
    }))
}

#[allow(non_snake_case)]
#[cfg(test)]
mod tests {
    use super::*;

    const ε: f64 = 0.0000000001;

    fn usage(cpus: u32, mem_gb: f64, hours: f64, gpus: u32) -> JobResourceUsage {
        JobResourceUsage {
            alloc_cpus: cpus,
            requested_memory_gb: mem_gb,
            elapsed_hours: hours,
            state: JobState::Completed,
            gpus,
        }
    }

    #[test]
    fn ServiceUnitBreakdown__compute__memory_dominant_example() {
        let weights = BillingWeights { cpu: 2.0, mem_per_gb: 4.0, gpu: 0.0 };
        let su = ServiceUnitBreakdown::compute(&weights, &usage(4, 8.0, 2.0, 0));
        assert_eq!(su.cpu_su, 8.0);
        assert_eq!(su.memory_su, 32.0);
        assert_eq!(su.gpu_su, 0.0);
        assert_eq!(su.su_per_hour, 40.0);
        assert!((su.total_su - 80.0).abs() < ε);
        assert_eq!(su.dominant, Category::Memory);
    }

    #[test]
    fn ServiceUnitBreakdown__compute__gpu_dominant() {
        let weights = BillingWeights { cpu: 1.0, mem_per_gb: 0.25, gpu: 30.0 };
        let su = ServiceUnitBreakdown::compute(&weights, &usage(8, 64.0, 0.5, 2));
        assert_eq!(su.su_per_hour, 8.0 + 16.0 + 60.0);
        assert!((su.total_su - 42.0).abs() < ε);
        assert_eq!(su.dominant, Category::Gpu);
    }

    #[test]
    fn ServiceUnitBreakdown__compute__ties_prefer_cpu_then_memory() {
        let weights = BillingWeights { cpu: 1.0, mem_per_gb: 1.0, gpu: 1.0 };
        assert_eq!(ServiceUnitBreakdown::compute(&weights, &usage(4, 4.0, 1.0, 4)).dominant, Category::Cpu);
        assert_eq!(ServiceUnitBreakdown::compute(&weights, &usage(2, 4.0, 1.0, 4)).dominant, Category::Memory);
        assert_eq!(ServiceUnitBreakdown::compute(&weights, &usage(0, 0.0, 1.0, 0)).dominant, Category::Cpu);
    }

    #[test]
    fn ServiceUnitBreakdown__compute__elapsed_is_floored() {
        let weights = BillingWeights { cpu: 2.0, mem_per_gb: 4.0, gpu: 0.0 };
        let su = ServiceUnitBreakdown::compute(&weights, &usage(4, 8.0, 0.0, 0));
        assert!((su.total_su - 40.0 / 3600.0).abs() < ε);
    }

    #[test]
    fn ServiceUnitReport__display() {
        let weights = BillingWeights { cpu: 2.0, mem_per_gb: 4.0, gpu: 0.0 };
        let usage = usage(4, 8.0, 2.0, 0);
        let report = ServiceUnitReport {
            job_id: "123".into(),
            partition: Partition("cpu".into()),
            breakdown: ServiceUnitBreakdown::compute(&weights, &usage),
            weights,
            usage,
        };
        let text = report.to_string();
        assert!(text.contains("Total SU:          80.00"));
        assert!(text.contains("Dominant resource: Memory"));
        assert!(!text.contains("GPU SU/h"));
    }

    #[test]
    fn SuOutcome__display__not_billable() {
        let outcome = SuOutcome::NotBillable {
            job_id: "5".into(),
            state: JobState::Running,
        };
        assert_eq!(outcome.to_string(), "Job 5 is RUNNING, no service units computed.");
    }
}
