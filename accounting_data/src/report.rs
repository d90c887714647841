use std::fmt::Write as _;

use crate::{account::AccountReport, period::ReportPeriod};

const NAME_WIDTH: usize = 24;
const USER_INDENT: usize = 4;
const NUMBER_WIDTH: usize = 14;
const PERCENT_WIDTH: usize = 10;

fn percent(value: f64) -> String {
    format!("{value:.2}%")
}

/// Fixed-width usage table: a summary line per account, an indented line per user, then a blank
/// line.
pub fn render_report(reports: &[AccountReport], period: &ReportPeriod, show_usage: bool) -> String {
    let mut out = String::new();
    // writing into a String can't fail
    let _ = render_into(&mut out, reports, period, show_usage);
    out
}

fn render_into(
    out: &mut String,
    reports: &[AccountReport],
    period: &ReportPeriod,
    show_usage: bool,
) -> std::fmt::Result {
    writeln!(out, "Usage in core-hours, {period}")?;
    writeln!(out)?;

    let mut header = format!(
        "{:<NAME_WIDTH$}{:>NUMBER_WIDTH$}{:>NUMBER_WIDTH$}",
        "Account / User", "Used", "Allocation"
    );
    if show_usage {
        write!(header, "{:>PERCENT_WIDTH$}", "Usage")?;
    }
    writeln!(out, "{header}")?;
    writeln!(out, "{}", "-".repeat(header.len()))?;

    for report in reports {
        write!(
            out,
            "{:<NAME_WIDTH$}{:>NUMBER_WIDTH$.2}{:>NUMBER_WIDTH$.2}",
            report.account.as_str(),
            report.total_hours(),
            report.allocation
        )?;
        if show_usage {
            write!(out, "{:>PERCENT_WIDTH$}", percent(report.usage_percent()))?;
        }
        writeln!(out)?;

        for record in &report.users {
            write!(
                out,
                "{:USER_INDENT$}{:<width$}{:>NUMBER_WIDTH$.2}",
                "",
                record.user.as_str(),
                record.used_hours,
                width = NAME_WIDTH - USER_INDENT
            )?;
            if show_usage {
                write!(out, "{:NUMBER_WIDTH$}{:>PERCENT_WIDTH$}", "", percent(record.usage_percent))?;
            }
            writeln!(out)?;
        }
        writeln!(out)?;
    }
    Ok(())
}
