//! Domain primitive types used across the nsrun workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{CONTAINER_ID_BYTES, CONTAINER_ID_PREFIX};

/// Unique identifier for a container instance.
///
/// This is the only handle the runtime hands out; it keys the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a container ID from an existing string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a random container ID.
    ///
    /// Eight bytes from the thread-local CSPRNG, hex-encoded behind
    /// [`CONTAINER_ID_PREFIX`]. Collisions are not checked.
    #[must_use]
    pub fn generate() -> Self {
        let bytes: [u8; CONTAINER_ID_BYTES] = rand::random();
        Self(format!("{CONTAINER_ID_PREFIX}{}", hex::encode(bytes)))
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContainerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Lifecycle state of a container process.
///
/// A record enters the registry as `Running`; `Created` is never assigned
/// by the executor. `Stopped` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessState {
    /// Placeholder for a record whose process has not started.
    Created,
    /// The process has completed setup and is executing its command.
    Running,
    /// The process exited with status 0.
    Stopped,
    /// The process exited non-zero, or waiting on it failed.
    Failed,
}

impl ProcessState {
    /// Returns `true` for states no update may leave.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }

    /// Maps an exit code to the terminal state it produces.
    #[must_use]
    pub const fn from_exit_code(code: i32) -> Self {
        if code == 0 { Self::Stopped } else { Self::Failed }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Running => write!(f, "Running"),
            Self::Stopped => write!(f, "Stopped"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}
