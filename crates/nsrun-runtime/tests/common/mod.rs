//! Shared helpers for runtime integration tests.

#![allow(dead_code)]

use std::ffi::OsString;
use std::path::Path;

use nsrun_runtime::launcher::SelfInvocation;

/// Runs a shell script in place of the child entrypoint.
///
/// The script sees the readiness pipe at descriptor 3, so `printf '\001' >&3`
/// completes the handshake. No namespaces or mounts are involved, which
/// lets these tests run unprivileged.
#[derive(Debug, Clone)]
pub struct ShellLauncher {
    script: String,
}

impl ShellLauncher {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
        }
    }

    /// Signals readiness, then exits with `code`.
    pub fn ready_then_exit(code: i32) -> Self {
        Self::new(format!("printf '\\001' >&3; exit {code}"))
    }
}

impl SelfInvocation for ShellLauncher {
    fn program(&self) -> &Path {
        Path::new("/bin/sh")
    }

    fn arguments(&self, _rootfs: &Path, _command: &[String]) -> Vec<OsString> {
        vec!["-c".into(), self.script.clone().into()]
    }

    fn pivots_root(&self) -> bool {
        false
    }
}

pub fn command() -> Vec<String> {
    vec!["/bin/true".into()]
}
