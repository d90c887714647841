//! Total parsers for Slurm's textual output. None of these fail: on a mismatch they return the
//! default documented on the function.

use std::num::ParseFloatError;

use itertools::Itertools as _;
use thiserror::Error;

/// Smallest elapsed time a job is billed for: one second.
pub const MIN_ELAPSED_HOURS: f64 = 1.0 / 3600.0;

/// Splits `--parsable2` output (`|` separated, no trailing `|`) into trimmed fields, skipping
/// blank lines.
pub fn parsable_rows(output: &str) -> Vec<Vec<&str>> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.split('|').map(str::trim).collect_vec())
        .collect_vec()
}

/// Slurm elapsed time (`[D-]HH:MM:SS[.fff]` or `MM:SS`) in hours.
///
/// Returns at least [`MIN_ELAPSED_HOURS`]; unparsable input yields exactly that floor.
pub fn parse_elapsed_hours(input: &str) -> f64 {
    match elapsed_seconds(input) {
        Some(secs) => (secs / 3600.0).max(MIN_ELAPSED_HOURS),
        None => MIN_ELAPSED_HOURS,
    }
}

fn elapsed_seconds(input: &str) -> Option<f64> {
    let input = input.trim();
    let (days, clock) = match input.split_once('-') {
        Some((days, clock)) => (days.parse::<u32>().ok()?, clock),
        None => (0, input),
    };

    let parts = clock.split(':').collect_vec();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (h.parse::<u32>().ok()?, m.parse::<u32>().ok()?, s.parse::<f64>().ok()?),
        [m, s] => (0, m.parse::<u32>().ok()?, s.parse::<f64>().ok()?),
        _ => return None,
    };
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }

    Some(f64::from(days) * 86_400.0 + f64::from(hours) * 3600.0 + f64::from(minutes) * 60.0 + seconds)
}

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct MemorySize(pub f64);

impl MemorySize {
    pub fn as_gib(&self) -> f64 {
        self.0 / 1024f64.powi(3)
    }

    pub fn from_kib(val: f64) -> Self {
        Self(val * 1024f64)
    }

    pub fn from_mib(val: f64) -> Self {
        Self(val * 1024f64.powi(2))
    }

    pub fn from_gib(val: f64) -> Self {
        Self(val * 1024f64.powi(3))
    }

    pub fn from_tib(val: f64) -> Self {
        Self(val * 1024f64.powi(4))
    }

    pub fn from_pib(val: f64) -> Self {
        Self(val * 1024f64.powi(5))
    }

    /// `REQMEM` style sizes: `16G`, `4000M`, `2.5Gn` (per node), `512Mc` (per cpu).
    ///
    /// A number without unit is bytes. empty means empty after trimming
    pub fn parse(input: &str) -> Result<MemorySize, MemorySizeParseError> {
        use MemorySizeParseError::*;
        let input = input.trim();
        let input = input.strip_suffix(['n', 'c']).unwrap_or(input);

        let (number, ctor): (&str, fn(f64) -> MemorySize) = match input.chars().last() {
            None => return Err(Empty),
            Some('K') => (&input[..input.len() - 1], MemorySize::from_kib),
            Some('M') => (&input[..input.len() - 1], MemorySize::from_mib),
            Some('G') => (&input[..input.len() - 1], MemorySize::from_gib),
            Some('T') => (&input[..input.len() - 1], MemorySize::from_tib),
            Some('P') => (&input[..input.len() - 1], MemorySize::from_pib),
            Some(_) => (input, MemorySize),
        };

        let value = number.parse::<f64>()?;
        if !value.is_finite() || value < 0.0 {
            return Err(OutOfRange(number.to_owned()));
        }
        Ok(ctor(value))
    }
}

/// empty means empty after trimming
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MemorySizeParseError {
    #[error("trying to parse an empty string")]
    Empty,
    #[error("scalar part is not a number")]
    InvalidNumber(#[from] ParseFloatError),
    #[error("{0} is not a valid size")]
    OutOfRange(String),
}

/// Requested memory in GB, `0.0` when missing or malformed.
pub fn requested_memory_gb(input: &str) -> f64 {
    MemorySize::parse(input).map(|size| size.as_gib()).unwrap_or(0.0)
}

/// A non-negative share value, `0.0` for anything else (e.g. `parent`).
pub fn parse_share(input: &str) -> f64 {
    match input.trim().parse::<f64>() {
        Ok(share) if share.is_finite() && share >= 0.0 => share,
        _ => 0.0,
    }
}
