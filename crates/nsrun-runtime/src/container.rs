//! Container records and the configuration they are created from.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use nix::unistd::Pid;
use serde::{Deserialize, Serialize};

use nsrun_common::types::ProcessState;
use nsrun_core::namespace::NamespaceFlags;

/// One spawned container process.
///
/// Built by the executor once the child has signaled readiness, then owned
/// by the registry. Only the runtime manager mutates it, through
/// [`crate::registry::ContainerRegistry::update_state`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerProcess {
    /// Host PID of the container's first process.
    pub pid: Pid,
    /// Namespaces the process was created in.
    pub namespaces: NamespaceFlags,
    /// Current lifecycle state.
    pub state: ProcessState,
    /// When the child finished setup.
    pub start_time: DateTime<Utc>,
    /// Exit code, once the process has been waited on.
    pub exit_code: Option<i32>,
    /// Command executing inside the container.
    pub command: Vec<String>,
}

impl ContainerProcess {
    /// Creates a record in the `Running` state, started now.
    #[must_use]
    pub fn running(pid: Pid, namespaces: NamespaceFlags, command: Vec<String>) -> Self {
        Self {
            pid,
            namespaces,
            state: ProcessState::Running,
            start_time: Utc::now(),
            exit_code: None,
            command,
        }
    }
}

/// Caller-supplied description of a container to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Image label. Not resolved; the rootfs must already exist.
    pub image: String,
    /// Command to execute inside the container. Must not be empty.
    pub command: Vec<String>,
    /// Namespaces to isolate.
    pub namespaces: NamespaceFlags,
    /// Hostname inside the UTS namespace. Empty falls back to the runtime default.
    pub hostname: String,
    /// Directory, inside the new root, the command starts in.
    pub working_dir: PathBuf,
    /// Extra `KEY=VALUE` environment entries for the command.
    pub env: Vec<String>,
    /// Directory that becomes the container's root.
    pub rootfs: PathBuf,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            image: "default".into(),
            command: vec!["/bin/sh".into()],
            namespaces: NamespaceFlags::default(),
            hostname: String::new(),
            working_dir: PathBuf::from("/"),
            env: Vec::new(),
            rootfs: PathBuf::from("./busybox-rootfs"),
        }
    }
}
