//! Self-invocation strategies.
//!
//! The executor does not hard-code how the child-side entrypoint is
//! reached. A [`SelfInvocation`] names the program exec'd in the cloned
//! process and the arguments it receives.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use nsrun_common::config::RuntimeConfig;
use nsrun_common::constants::{CHILD_MARKER, SELF_EXE};

/// How the cloned child reaches the container setup entrypoint.
pub trait SelfInvocation: fmt::Debug + Send + Sync {
    /// Program exec'd in the cloned child.
    fn program(&self) -> &Path;

    /// Arguments after `argv[0]`.
    ///
    /// The default is the re-exec protocol: the child marker, the rootfs,
    /// then the command.
    fn arguments(&self, rootfs: &Path, command: &[String]) -> Vec<OsString> {
        let mut args = Vec::with_capacity(command.len() + 2);
        args.push(OsString::from(CHILD_MARKER));
        args.push(rootfs.as_os_str().to_owned());
        args.extend(command.iter().map(OsString::from));
        args
    }

    /// Whether the launched program pivots into the rootfs.
    ///
    /// When `true`, the executor refuses to launch without a mount namespace.
    fn pivots_root(&self) -> bool {
        true
    }
}

/// Re-executes the running binary through `/proc/self/exe`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcSelfExe;

impl SelfInvocation for ProcSelfExe {
    fn program(&self) -> &Path {
        Path::new(SELF_EXE)
    }
}

/// Executes a named binary that speaks the child protocol.
#[derive(Debug, Clone)]
pub struct ExplicitBinary {
    path: PathBuf,
}

impl ExplicitBinary {
    /// Creates a strategy that launches `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SelfInvocation for ExplicitBinary {
    fn program(&self) -> &Path {
        &self.path
    }
}

/// Picks the strategy named by the runtime configuration.
#[must_use]
pub fn from_config(config: &RuntimeConfig) -> Arc<dyn SelfInvocation> {
    match &config.self_exe {
        Some(path) => Arc::new(ExplicitBinary::new(path.clone())),
        None => Arc::new(ProcSelfExe),
    }
}
