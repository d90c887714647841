use std::fmt;

use chrono::{Datelike as _, NaiveDate, NaiveDateTime};
use color_eyre::{eyre::ensure, Result};

use crate::slurm::format_datetime_for_slurm;

/// Reporting window handed to `sreport`, in local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportPeriod {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// First and last day of the calendar quarter (Jan–Mar, Apr–Jun, Jul–Sep, Oct–Dec) containing
/// `date`.
pub fn quarter_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first_month = date.month0() / 3 * 3 + 1;
    let first = NaiveDate::from_ymd_opt(date.year(), first_month, 1).expect("first day of a quarter is a valid date");
    let last = match first_month + 3 {
        13 => NaiveDate::from_ymd_opt(date.year(), 12, 31),
        next => NaiveDate::from_ymd_opt(date.year(), next, 1).and_then(|d| d.pred_opt()),
    }
    .expect("last day of a quarter is a valid date");
    (first, last)
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(0, 0, 0).expect("00:00:00 should always be a valid time")
}

impl ReportPeriod {
    /// Current quarter, from its first day to its last day (both at 00:00:00).
    pub fn quarter_of(date: NaiveDate) -> Self {
        let (first, last) = quarter_bounds(date);
        Self {
            start: midnight(first),
            end: midnight(last),
        }
    }

    /// - neither date: the quarter containing `now`
    /// - only `start`: from `start` until `now`
    /// - only `end`: from the first day of `end`'s quarter until `end`
    pub fn resolve(start: Option<NaiveDate>, end: Option<NaiveDate>, now: NaiveDateTime) -> Result<Self> {
        let period = match (start, end) {
            (None, None) => Self::quarter_of(now.date()),
            (Some(start), None) => Self {
                start: midnight(start),
                end: now,
            },
            (None, Some(end)) => Self {
                start: midnight(quarter_bounds(end).0),
                end: midnight(end),
            },
            (Some(start), Some(end)) => Self {
                start: midnight(start),
                end: midnight(end),
            },
        };
        ensure!(
            period.start <= period.end,
            "start date {} is after end date {}",
            period.start.date(),
            period.end.date()
        );
        Ok(period)
    }

    /// `start=… end=…` arguments for `sreport`.
    pub fn sreport_args(&self) -> [String; 2] {
        [
            format!("start={}", format_datetime_for_slurm(self.start)),
            format!("end={}", format_datetime_for_slurm(self.end)),
        ]
    }
}

impl fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            format_datetime_for_slurm(self.start),
            format_datetime_for_slurm(self.end)
        )
    }
}
