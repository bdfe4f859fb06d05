//! End-to-end tests for the `nsrun` binary.
//!
//! Scenarios that create namespaces and pivot the root need root and a
//! minimal rootfs (busybox is enough) named by `NSRUN_TEST_ROOTFS`; they
//! return early otherwise. The remaining tests run anywhere.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::path::PathBuf;
use std::process::{Command, Output};

const BIN: &str = env!("CARGO_BIN_EXE_nsrun");

/// Rootfs for privileged scenarios, if this environment can run them.
fn privileged_rootfs() -> Option<PathBuf> {
    if !nix::unistd::geteuid().is_root() {
        eprintln!("skipping: requires root");
        return None;
    }
    let Some(rootfs) = std::env::var_os("NSRUN_TEST_ROOTFS") else {
        eprintln!("skipping: NSRUN_TEST_ROOTFS is not set");
        return None;
    };
    Some(PathBuf::from(rootfs))
}

fn nsrun(args: &[&str]) -> Output {
    Command::new(BIN)
        .args(args)
        .output()
        .expect("failed to launch nsrun")
}

fn run_in(rootfs: &std::path::Path, command: &[&str]) -> Output {
    let rootfs = rootfs.to_str().expect("utf-8 rootfs path");
    let mut args = vec!["run", "--rootfs", rootfs, "busybox"];
    args.extend_from_slice(command);
    nsrun(&args)
}

// ── Privileged ───────────────────────────────────────────────────────

#[test]
fn true_exits_zero_and_is_stopped() {
    let Some(rootfs) = privileged_rootfs() else {
        return;
    };
    let output = run_in(&rootfs, &["/bin/true"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(0), "{stderr}");
    assert!(stderr.contains("Stopped"), "{stderr}");
}

#[test]
fn exit_seven_is_failed() {
    let Some(rootfs) = privileged_rootfs() else {
        return;
    };
    let output = run_in(&rootfs, &["/bin/sh", "-c", "exit 7"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(7), "{stderr}");
    assert!(stderr.contains("Failed"), "{stderr}");
}

#[test]
fn missing_rootfs_fails_setup() {
    if privileged_rootfs().is_none() {
        return;
    }
    let dir = std::env::temp_dir().join("nsrun-e2e-no-such-rootfs");
    let output = run_in(&dir, &["/bin/true"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stderr.contains("setup failed"), "{stderr}");
}

#[test]
fn hostname_is_set_inside_container() {
    let Some(rootfs) = privileged_rootfs() else {
        return;
    };
    let host = nix::unistd::gethostname().expect("host hostname");
    let rootfs_arg = rootfs.to_str().expect("utf-8 rootfs path");
    let output = nsrun(&[
        "run",
        "--rootfs",
        rootfs_arg,
        "--hostname",
        "nsrun-e2e",
        "busybox",
        "/bin/hostname",
    ]);
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "nsrun-e2e");
    assert_eq!(nix::unistd::gethostname().expect("host hostname"), host);
}

#[test]
fn container_sees_itself_as_pid_one() {
    let Some(rootfs) = privileged_rootfs() else {
        return;
    };
    let output = run_in(&rootfs, &["/bin/sh", "-c", "echo $$"]);
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "1");
}

#[test]
fn working_directory_is_applied() {
    let Some(rootfs) = privileged_rootfs() else {
        return;
    };
    let rootfs_arg = rootfs.to_str().expect("utf-8 rootfs path");
    let output = nsrun(&[
        "run", "--rootfs", rootfs_arg, "-w", "/proc", "busybox", "/bin/pwd",
    ]);
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "/proc");
}

// ── Unprivileged ─────────────────────────────────────────────────────

#[test]
fn network_namespace_is_not_implemented() {
    let output = nsrun(&["run", "--net", "--rootfs", "/nonexistent", "busybox", "/bin/true"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stderr.contains("not implemented"), "{stderr}");
}

#[test]
fn child_without_arguments_fails() {
    let output = nsrun(&["child"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(1), "{stderr}");
    assert!(stderr.contains("parse child arguments"), "{stderr}");
}

#[test]
fn unreadable_config_is_reported() {
    let output = nsrun(&[
        "--config",
        "/nonexistent/nsrun.json",
        "run",
        "busybox",
        "/bin/true",
    ]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stderr.contains("loading configuration"), "{stderr}");
}
