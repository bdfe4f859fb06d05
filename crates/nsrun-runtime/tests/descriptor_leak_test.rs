//! The parent holds no extra descriptors after create, on success or failure.
//!
//! Kept in its own test binary so no concurrently running test opens or
//! closes descriptors while they are counted.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use nsrun_core::namespace::NamespaceFlags;
use nsrun_runtime::process::{self, ProcessExecutor};

use common::{ShellLauncher, command};

fn open_descriptors() -> usize {
    std::fs::read_dir("/proc/self/fd")
        .expect("read /proc/self/fd")
        .count()
}

fn executor(script: &str) -> ProcessExecutor {
    ProcessExecutor::new(NamespaceFlags::none())
        .with_launcher(Arc::new(ShellLauncher::new(script)))
        .with_handshake_timeout(Some(Duration::from_millis(300)))
}

#[test]
fn create_cycles_do_not_leak_descriptors() {
    // Warm up lazily opened descriptors before taking the baseline.
    let process = executor("printf '\\001' >&3")
        .create_container(&command(), Path::new("/"))
        .expect("create");
    process::wait_for_exit(process.pid).expect("wait");
    let baseline = open_descriptors();

    for _ in 0..5 {
        let process = executor("printf '\\001' >&3")
            .create_container(&command(), Path::new("/"))
            .expect("create");
        process::wait_for_exit(process.pid).expect("wait");

        executor("exit 1")
            .create_container(&command(), Path::new("/"))
            .unwrap_err();
        executor("sleep 5")
            .create_container(&command(), Path::new("/"))
            .unwrap_err();
        executor("printf 'z' >&3")
            .create_container(&command(), Path::new("/"))
            .unwrap_err();
    }

    assert_eq!(open_descriptors(), baseline);
}
