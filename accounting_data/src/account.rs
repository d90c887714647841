use std::{collections::BTreeMap, collections::HashMap, env, fmt};

use color_eyre::{
    eyre::{eyre, WrapErr as _},
    Result,
};
use derive_more::derive::Deref;
use itertools::Itertools as _;
use tracing::{debug, error, warn};

use crate::{
    args,
    command::{Program, SlurmQuery},
    misc::parsing::{parsable_rows, parse_share},
    period::ReportPeriod,
    slurm::{AccountName, SlurmUser},
};

/// Whose accounts to report on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// the accounts the user is associated with, showing only that user
    User(String),
    /// the accounts the PI is associated with, showing every member
    Pi(String),
}

impl Identity {
    pub fn name(&self) -> &str {
        match self {
            Identity::User(name) | Identity::Pi(name) => name,
        }
    }

    /// `pi`: `Some(None)` means "the invoking user, as PI".
    pub fn from_args(
        user: Option<String>,
        pi: Option<Option<String>>,
        login: &impl IdentityProvider,
    ) -> Result<Self> {
        Ok(match (user, pi) {
            (Some(_), Some(_)) => return Err(eyre!("--user and --pi are mutually exclusive")),
            (Some(user), None) => Identity::User(user),
            (None, Some(Some(pi))) => Identity::Pi(pi),
            (None, Some(None)) => Identity::Pi(login.login()?),
            (None, None) => Identity::User(login.login()?),
        })
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::User(name) => write!(f, "user {name}"),
            Identity::Pi(name) => write!(f, "PI {name}"),
        }
    }
}

/// Who is running this.
pub trait IdentityProvider {
    fn login(&self) -> Result<String>;
}

impl<F: Fn() -> Result<String>> IdentityProvider for F {
    fn login(&self) -> Result<String> {
        self()
    }
}

/// OS login name, `$USER` if that can't be determined.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoginIdentity;

impl IdentityProvider for LoginIdentity {
    fn login(&self) -> Result<String> {
        match whoami::fallible::username() {
            Ok(name) if !name.is_empty() => Ok(name),
            other => {
                debug!(?other, "no OS login name, trying $USER");
                env::var("USER").wrap_err("could not determine the invoking user (no login name and $USER unset)")
            }
        }
    }
}

/// account → members, sorted by account name; `root` never shows up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deref)]
pub struct AccountMembers(BTreeMap<AccountName, Vec<SlurmUser>>);

impl AccountMembers {
    pub fn query(query: &impl SlurmQuery, identity: &Identity) -> Self {
        let own = associations(query, &format!("user={}", identity.name()));
        match identity {
            Identity::User(_) => Self::group(own),
            Identity::Pi(_) => {
                let accounts = own
                    .iter()
                    .map(|(account, _)| account.as_str())
                    .filter(|account| !account.is_empty() && *account != crate::ROOT_ACCOUNT)
                    .unique()
                    .join(",");
                if accounts.is_empty() {
                    return Self::default();
                }
                // account level associations have no user
                let members = associations(query, &format!("account={accounts}"))
                    .into_iter()
                    .filter(|(_, user)| !user.is_empty());
                Self::group(members)
            }
        }
    }

    pub fn group(rows: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut members: BTreeMap<AccountName, Vec<SlurmUser>> = BTreeMap::new();
        for (account, user) in rows {
            let account = AccountName(account);
            if account.is_empty() || account.is_root() {
                continue;
            }
            let users = members.entry(account).or_default();
            let user = SlurmUser(user);
            if !users.contains(&user) {
                users.push(user);
            }
        }
        for users in members.values_mut() {
            users.sort();
        }
        Self(members)
    }
}

/// `(Account, User)` pairs from `sacctmgr show associations <filter>`, empty on failure.
fn associations(query: &impl SlurmQuery, filter: &str) -> Vec<(String, String)> {
    match query.run(
        Program::Sacctmgr,
        &args!["-nP", "show", "associations", filter, "format=Account,User"],
    ) {
        Ok(output) => parsable_rows(&output)
            .into_iter()
            .filter_map(|row| match row.as_slice() {
                [account, user, ..] => Some((account.to_string(), user.to_string())),
                [account] => Some((account.to_string(), String::new())),
                [] => None,
            })
            .collect_vec(),
        Err(e) => {
            error!("looking up associations ({filter}): {e}");
            Vec::new()
        }
    }
}

/// Core-hours per user of `account` in `period`.
///
/// `sreport` reports minutes; the account total row (no login) is skipped. On failure a
/// diagnostic is logged and the map is empty.
pub fn account_usage(query: &impl SlurmQuery, account: &AccountName, period: &ReportPeriod) -> HashMap<SlurmUser, f64> {
    let [start, end] = period.sreport_args();
    let args = args![
        "-nP",
        "-t",
        "Minutes",
        "cluster",
        "AccountUtilizationByUser",
        format!("accounts={account}"),
        start,
        end,
        "format=Account,Login,Used",
    ];

    let output = match query.run(Program::Sreport, &args) {
        Ok(output) => output,
        Err(e) => {
            error!(%account, "fetching usage: {e}");
            return HashMap::new();
        }
    };

    let mut usage = HashMap::new();
    for row in parsable_rows(&output) {
        let [row_account, login, used, ..] = row.as_slice() else {
            warn!(?row, "unexpected sreport row");
            continue;
        };
        if *row_account != account.as_str() || login.is_empty() {
            continue;
        }
        match used.parse::<f64>() {
            Ok(minutes) => *usage.entry(SlurmUser(login.to_string())).or_insert(0.0) += minutes / 60.0,
            Err(e) => warn!(%account, login, used, "unparsable usage: {e}"),
        }
    }
    usage
}

/// The account's share (core-hour budget), `0.0` when unknown.
///
/// Prefers the account level association (empty user) over user rows.
pub fn account_allocation(query: &impl SlurmQuery, account: &AccountName) -> f64 {
    let output = match query.run(
        Program::Sacctmgr,
        &args![
            "-nP",
            "show",
            "associations",
            format!("account={account}"),
            "format=Account,User,Share"
        ],
    ) {
        Ok(output) => output,
        Err(e) => {
            error!(%account, "fetching allocation: {e}");
            return 0.0;
        }
    };

    let rows = parsable_rows(&output)
        .into_iter()
        .filter(|row| row.first().is_some_and(|name| *name == account.as_str()))
        .collect_vec();
    rows.iter()
        .find(|row| row.get(1).is_some_and(|user| user.is_empty()))
        .or_else(|| rows.first())
        .and_then(|row| row.get(2))
        .map(|share| parse_share(share))
        .unwrap_or(0.0)
}

/// `used / allocation · 100`, `0.0` without an allocation.
pub fn usage_percent(used_hours: f64, allocation: f64) -> f64 {
    if allocation > 0.0 {
        used_hours / allocation * 100.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsageRecord {
    pub account: AccountName,
    pub user: SlurmUser,
    pub used_hours: f64,
    pub usage_percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountReport {
    pub account: AccountName,
    pub allocation: f64,
    pub users: Vec<UsageRecord>,
}

impl AccountReport {
    pub fn total_hours(&self) -> f64 {
        self.users.iter().map(|record| record.used_hours).sum()
    }

    pub fn usage_percent(&self) -> f64 {
        usage_percent(self.total_hours(), self.allocation)
    }
}

/// One report per account; members without usage rows count as 0 hours.
pub fn build_report(
    query: &impl SlurmQuery,
    members: &AccountMembers,
    period: &ReportPeriod,
    hide_zero: bool,
) -> Vec<AccountReport> {
    members
        .iter()
        .filter(|(account, _)| !account.is_root())
        .map(|(account, users)| {
            let usage = account_usage(query, account, period);
            let allocation = account_allocation(query, account);
            let users = users
                .iter()
                .map(|user| {
                    // TODO decide whether members missing from sreport should be flagged
                    let used_hours = usage.get(user).copied().unwrap_or(0.0);
                    UsageRecord {
                        account: account.clone(),
                        user: user.clone(),
                        used_hours,
                        usage_percent: usage_percent(used_hours, allocation),
                    }
                })
                .filter(|record| !(hide_zero && record.used_hours == 0.0))
                .collect_vec();

            AccountReport {
                account: account.clone(),
                allocation,
                users,
            }
        })
        .collect_vec()
}

#[allow(non_snake_case)]
#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::command::CannedQuery;

    fn period() -> ReportPeriod {
        ReportPeriod::quarter_of(NaiveDate::from_ymd_opt(2025, 5, 1).unwrap())
    }

    fn account(name: &str) -> AccountName {
        AccountName(name.into())
    }

    #[test]
    fn Identity__from_args() {
        let login = || -> Result<String> { Ok("me".to_owned()) };
        assert_eq!(Identity::from_args(None, None, &login).unwrap(), Identity::User("me".into()));
        assert_eq!(
            Identity::from_args(Some("alice".into()), None, &login).unwrap(),
            Identity::User("alice".into())
        );
        assert_eq!(Identity::from_args(None, Some(None), &login).unwrap(), Identity::Pi("me".into()));
        assert_eq!(
            Identity::from_args(None, Some(Some("smith".into())), &login).unwrap(),
            Identity::Pi("smith".into())
        );
        assert!(Identity::from_args(Some("a".into()), Some(None), &login).is_err());
    }

    #[test]
    fn Identity__from_args__login_failure_propagates() {
        let login = || -> Result<String> { Err(eyre!("no login")) };
        assert!(Identity::from_args(None, None, &login).is_err());
        // an explicit user never asks for the login
        assert!(Identity::from_args(Some("bob".into()), None, &login).is_ok());
    }

    #[test]
    fn AccountMembers__group__drops_root_and_dedups() {
        let members = AccountMembers::group([
            ("root".to_owned(), "admin".to_owned()),
            ("lab".to_owned(), "bob".to_owned()),
            ("lab".to_owned(), "alice".to_owned()),
            ("lab".to_owned(), "bob".to_owned()),
        ]);
        assert_eq!(members.len(), 1);
        assert_eq!(members[&account("lab")], vec![SlurmUser("alice".into()), SlurmUser("bob".into())]);
    }

    #[test]
    fn AccountMembers__query__pi_mode_skips_account_rows() {
        let query = CannedQuery::new()
            .on(Program::Sacctmgr, "user=smith", "lab_smith|smith\nroot|smith\n")
            .on(Program::Sacctmgr, "account=lab_smith", "lab_smith|\nlab_smith|smith\nlab_smith|carol\n");
        let members = AccountMembers::query(&query, &Identity::Pi("smith".into()));
        assert_eq!(
            members[&account("lab_smith")],
            vec![SlurmUser("carol".into()), SlurmUser("smith".into())]
        );
        assert!(query.calls().iter().any(|c| c.contains("account=lab_smith ")));
    }

    #[test]
    fn AccountMembers__query__failure_is_empty() {
        let query = CannedQuery::new().fail(Program::Sacctmgr, "user=", 1);
        assert!(AccountMembers::query(&query, &Identity::User("x".into())).is_empty());
        assert!(AccountMembers::query(&query, &Identity::Pi("x".into())).is_empty());
    }

    #[test]
    fn account_usage__minutes_to_hours_exact_match() {
        let query = CannedQuery::new().on(
            Program::Sreport,
            "accounts=lab",
            "lab||900\nlab|alice|600\nlab|bob|300\nlabx|carol|60\n",
        );
        let usage = account_usage(&query, &account("lab"), &period());
        assert_eq!(usage.len(), 2);
        assert_eq!(usage[&SlurmUser("alice".into())], 10.0);
        assert_eq!(usage[&SlurmUser("bob".into())], 5.0);
    }

    #[test]
    fn account_usage__passes_period() {
        let query = CannedQuery::new().on(Program::Sreport, "", "lab|alice|60");
        account_usage(&query, &account("lab"), &period());
        let calls = query.calls();
        assert!(calls[0].contains("start=2025-04-01T00:00:00 end=2025-06-30T00:00:00"));
    }

    #[test]
    fn account_allocation__prefers_account_row() {
        let query = CannedQuery::new().on(Program::Sacctmgr, "account=lab", "lab|alice|1\nlab||10000\n");
        assert_eq!(account_allocation(&query, &account("lab")), 10000.0);

        let query = CannedQuery::new().on(Program::Sacctmgr, "account=lab", "lab|alice|parent\n");
        assert_eq!(account_allocation(&query, &account("lab")), 0.0);

        let query = CannedQuery::new().fail(Program::Sacctmgr, "account=lab", 1);
        assert_eq!(account_allocation(&query, &account("lab")), 0.0);
    }

    #[test]
    fn usage_percent__zero_allocation() {
        assert_eq!(usage_percent(10.0, 0.0), 0.0);
        assert_eq!(usage_percent(25.0, 100.0), 25.0);
    }
}
