use std::fmt::Debug;

use chrono::NaiveDateTime;
use derive_more::derive::{Deref, Display, From, Into};

use crate::ROOT_ACCOUNT;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deref, Display, From, Into)]
pub struct SlurmUser(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deref, Display, From, Into)]
pub struct AccountName(pub String);

impl AccountName {
    pub fn is_root(&self) -> bool {
        self.0 == ROOT_ACCOUNT
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deref, Display, From, Into)]
pub struct Partition(pub String);

/// Use `%Y-%m-%dT%H:%M:%S`, i.e. RFC 3339 without the `+xx:yy` end (slurm don't like).
///
/// working theory: slurm takes _local_ time, not UTC, so callers hand in naive local datetimes.
pub fn format_datetime_for_slurm(date: NaiveDateTime) -> String {
    const FMT: &str = "%Y-%m-%dT%H:%M:%S";
    date.format(FMT).to_string()
}
