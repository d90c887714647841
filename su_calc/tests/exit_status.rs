//! `su-calc` against shell stubs standing in for `sacct` and `scontrol`.
#![cfg(unix)]

use std::{
    fs,
    os::unix::fs::PermissionsExt as _,
    path::{Path, PathBuf},
    process::{Command, Output},
};

use tempfile::TempDir;

const SACCT: &str = r#"#!/bin/sh
case "$*" in
  *"-j 404 "*) exit 0 ;;
  *--format=Partition*) echo compute ;;
  *"-j 2 "*--format=AllocCPUS*) echo '4|8G|01:00:00|RUNNING' ;;
  *--format=AllocCPUS*) echo '4|8G|02:00:00|COMPLETED' ;;
  *) exit 1 ;;
esac
"#;

const SCONTROL: &str = r#"#!/bin/sh
echo "PartitionName=compute State=UP TRESBillingWeights=CPU=2,Mem=4G"
"#;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).expect("write stub");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("make stub executable");
    path
}

/// Temp dir with the stubs and a config file pointing at them.
fn stub_cluster() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let sacct = write_script(dir.path(), "sacct", SACCT);
    let scontrol = write_script(dir.path(), "scontrol", SCONTROL);
    let config = dir.path().join("config.toml");
    fs::write(
        &config,
        format!(
            "[commands]\nsacct = \"{}\"\nscontrol = \"{}\"\n",
            sacct.display(),
            scontrol.display()
        ),
    )
    .expect("write config");
    (dir, config)
}

fn su_calc(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_su-calc"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("SLURM_ACCOUNTING_COMMANDS__SACCT")
        .env_remove("SLURM_ACCOUNTING_COMMANDS__SCONTROL")
        .output()
        .expect("run su-calc")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn completed_job_exits_zero_with_report() {
    let (_dir, config) = stub_cluster();
    let output = su_calc(&config, &["1"]);

    assert_eq!(output.status.code(), Some(0));
    let text = stdout(&output);
    assert!(text.contains("Total SU:          80.00"), "{text}");
    assert!(text.contains("Dominant resource: Memory"), "{text}");
}

#[test]
fn running_job_exits_zero_without_total() {
    let (_dir, config) = stub_cluster();
    let output = su_calc(&config, &["2"]);

    assert_eq!(output.status.code(), Some(0));
    let text = stdout(&output);
    assert!(text.contains("RUNNING"), "{text}");
    assert!(!text.contains("Total SU"), "{text}");
}

#[test]
fn unknown_job_exits_one_with_error_line() {
    let (_dir, config) = stub_cluster();
    let output = su_calc(&config, &["404"]);

    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stdout(&output).trim(), "Error: could not determine the partition of job 404");
}

#[test]
fn cmd_flag_echoes_queries_first() {
    let (dir, config) = stub_cluster();
    let output = su_calc(&config, &["--cmd", "1"]);

    assert_eq!(output.status.code(), Some(0));
    let text = stdout(&output);
    let first = text.lines().next().unwrap_or_default();
    assert_eq!(
        first,
        format!("$ {} -nP -X -j 1 --format=Partition", dir.path().join("sacct").display())
    );
    assert!(text.contains("Total SU:"), "{text}");
}
