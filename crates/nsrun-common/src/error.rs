//! Unified error types for the nsrun workspace.
//!
//! OS-level failures are kept as `std::io::Error` sources so callers can
//! inspect the underlying errno; every variant names the operation or
//! setup step that produced it.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::ProcessState;

/// A numbered step of the child-side container setup.
///
/// Order matches the order the steps are executed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetupStep {
    /// Reading the child arguments.
    Arguments,
    /// Setting the container hostname.
    Hostname,
    /// Marking the mount tree private.
    MakeMountsPrivate,
    /// Bind-mounting the rootfs onto itself.
    BindRootfs,
    /// Changing directory into the rootfs.
    EnterRootfs,
    /// Creating the directory that receives the old root.
    CreateOldRoot,
    /// Calling `pivot_root(2)`.
    PivotRoot,
    /// Changing directory to the new `/`.
    EnterNewRoot,
    /// Detaching the old root.
    UnmountOldRoot,
    /// Removing the old root directory.
    RemoveOldRoot,
    /// Mounting `/proc`.
    MountProc,
    /// Mounting `/sys`.
    MountSys,
    /// Mounting `/dev`.
    MountDev,
    /// Changing into the configured working directory.
    EnterWorkingDir,
    /// Writing the readiness byte.
    SignalParent,
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            Self::Arguments => "parse child arguments",
            Self::Hostname => "set hostname",
            Self::MakeMountsPrivate => "make root mount private",
            Self::BindRootfs => "bind mount rootfs",
            Self::EnterRootfs => "chdir to rootfs",
            Self::CreateOldRoot => "create old root directory",
            Self::PivotRoot => "pivot_root",
            Self::EnterNewRoot => "chdir to new root",
            Self::UnmountOldRoot => "unmount old root",
            Self::RemoveOldRoot => "remove old root directory",
            Self::MountProc => "mount /proc",
            Self::MountSys => "mount /sys",
            Self::MountDev => "mount /dev",
            Self::EnterWorkingDir => "chdir to working directory",
            Self::SignalParent => "signal parent",
        };
        f.write_str(step)
    }
}

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum NsrunError {
    /// The container command was empty.
    #[error("no command specified")]
    NoCommandSpecified,

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A namespace or feature was requested that the runtime does not support yet.
    #[error("{feature} is not implemented")]
    NotImplemented {
        /// Name of the unsupported feature.
        feature: &'static str,
    },

    /// A descriptor or other kernel resource could not be allocated.
    #[error("failed to {step}: {source}")]
    Resource {
        /// Operation that needed the resource.
        step: &'static str,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// The OS refused to create the container process.
    #[error("failed to start container process {program}: {source}")]
    Spawn {
        /// Program that was being launched.
        program: PathBuf,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// The child never signaled readiness. It has been killed and reaped.
    #[error("child process {pid} setup failed: {reason}")]
    Handshake {
        /// Host PID of the reaped child.
        pid: i32,
        /// What the parent observed instead of the readiness byte.
        reason: String,
    },

    /// A step of the child-side namespace and mount setup failed.
    #[error("failed to {step}: {source}")]
    Setup {
        /// Step that failed.
        step: SetupStep,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// The target executable could not replace the process image.
    #[error("cannot execute {program}: {message}")]
    Exec {
        /// Program as given in the command.
        program: String,
        /// Why resolution or `execve(2)` failed.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} {id} not found")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// A state update tried to leave a terminal state.
    #[error("container {id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Container identifier.
        id: String,
        /// State currently recorded.
        from: ProcessState,
        /// State that was requested.
        to: ProcessState,
    },

    /// Waiting on the container process failed.
    #[error("failed to wait for process {pid}: {source}")]
    Wait {
        /// Host PID that was being waited on.
        pid: i32,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// An I/O operation on a named path failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl NsrunError {
    /// Wraps an OS error produced by a child setup step.
    pub fn setup(step: SetupStep, source: impl Into<std::io::Error>) -> Self {
        Self::Setup {
            step,
            source: source.into(),
        }
    }

    /// Returns the failed setup step, if this is a setup error.
    #[must_use]
    pub const fn setup_step(&self) -> Option<SetupStep> {
        match self {
            Self::Setup { step, .. } => Some(*step),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, NsrunError>;
