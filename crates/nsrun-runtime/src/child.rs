//! Child-side container setup.
//!
//! Runs in the process cloned by [`crate::process::ProcessExecutor`], already
//! inside its new namespaces. The steps are strictly ordered; the parent is
//! only signaled once the new root is fully in place.

use std::convert::Infallible;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use nsrun_common::constants::{CONTAINER_PATH, CONTAINER_PS1, HOSTNAME_ENV, WORKDIR_ENV};
use nsrun_common::error::{NsrunError, Result, SetupStep};
use nsrun_core::filesystem::{mount, pivot_root};
use nsrun_core::namespace::uts;

use crate::exec;
use crate::handshake::ReadinessSender;

/// Settings the parent passes through the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChildSettings {
    /// Hostname to set. Present only when a UTS namespace was created.
    pub hostname: Option<String>,
    /// Directory to enter after the pivot.
    pub working_dir: Option<PathBuf>,
}

impl ChildSettings {
    /// Reads the settings from the current process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            hostname: std::env::var(HOSTNAME_ENV).ok().filter(|h| !h.is_empty()),
            working_dir: std::env::var_os(WORKDIR_ENV).map(PathBuf::from),
        }
    }
}

/// Entry point for `child <rootfs> <command...>`.
///
/// On success the process image is replaced and this never returns.
///
/// # Errors
///
/// Returns a setup error naming the failed step, or an exec error if the
/// command cannot be started. Either way the parent has not been signaled
/// unless the failure happened at exec.
pub fn run(args: &[String]) -> Result<Infallible> {
    let (rootfs, command) = args.split_first().ok_or_else(|| {
        NsrunError::setup(
            SetupStep::Arguments,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "missing rootfs argument"),
        )
    })?;
    if command.is_empty() {
        return Err(NsrunError::NoCommandSpecified);
    }

    setup_container(Path::new(rootfs), &ChildSettings::from_env())?;
    let env = container_environment(std::env::vars_os());
    ReadinessSender::inherited()?.signal()?;

    exec::replace_process(command, &env)
}

/// Isolates mounts, pivots into `rootfs` and mounts the virtual filesystems.
///
/// # Errors
///
/// Returns [`NsrunError::Setup`] for the first step that fails. Nothing is
/// rolled back.
pub fn setup_container(rootfs: &Path, settings: &ChildSettings) -> Result<()> {
    if let Some(hostname) = &settings.hostname {
        uts::set_hostname(hostname)?;
    }
    mount::make_mounts_private()?;
    mount::bind_rootfs(rootfs)?;
    pivot_root::pivot_into(rootfs)?;
    mount::mount_virtual_filesystems()?;

    if let Some(dir) = &settings.working_dir {
        nix::unistd::chdir(dir.as_path())
            .map_err(|e| NsrunError::setup(SetupStep::EnterWorkingDir, e))?;
    }
    tracing::debug!(rootfs = %rootfs.display(), "container setup complete");
    Ok(())
}

/// Environment handed to the container command.
///
/// Drops the internal `NSRUN_*` keys and sets `PS1` and `PATH`. Each key
/// appears once; a later value replaces an earlier one in place.
pub fn container_environment(
    vars: impl IntoIterator<Item = (OsString, OsString)>,
) -> Vec<(OsString, OsString)> {
    let mut env: Vec<(OsString, OsString)> = Vec::new();
    let defaults = [
        (OsString::from("PS1"), OsString::from(CONTAINER_PS1)),
        (OsString::from("PATH"), OsString::from(CONTAINER_PATH)),
    ];
    let vars = vars
        .into_iter()
        .filter(|(key, _)| key != HOSTNAME_ENV && key != WORKDIR_ENV);
    for (key, value) in vars.chain(defaults) {
        match env.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = value,
            None => env.push((key, value)),
        }
    }
    env
}
