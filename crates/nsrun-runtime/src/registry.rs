//! In-memory store of container records.
//!
//! The only shared mutable state in the runtime. A single reader/writer
//! lock covers the whole map.

use std::collections::HashMap;

use parking_lot::RwLock;

use nsrun_common::error::{NsrunError, Result};
use nsrun_common::types::{ContainerId, ProcessState};

use crate::container::ContainerProcess;

/// Concurrency-safe mapping from [`ContainerId`] to [`ContainerProcess`].
#[derive(Debug, Default)]
pub struct ContainerRegistry {
    containers: RwLock<HashMap<ContainerId, ContainerProcess>>,
}

impl ContainerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `process` under `id`, replacing any previous record.
    pub fn add(&self, id: ContainerId, process: ContainerProcess) {
        tracing::debug!(%id, pid = process.pid.as_raw(), "container registered");
        if let Some(previous) = self.containers.write().insert(id, process) {
            tracing::warn!(pid = previous.pid.as_raw(), "replaced existing container record");
        }
    }

    /// Returns a copy of the record for `id`.
    #[must_use]
    pub fn get(&self, id: &ContainerId) -> Option<ContainerProcess> {
        self.containers.read().get(id).cloned()
    }

    /// Records a new state and, optionally, the exit code.
    ///
    /// # Errors
    ///
    /// Returns [`NsrunError::NotFound`] for an unknown id, and
    /// [`NsrunError::InvalidTransition`] if the record is already terminal.
    pub fn update_state(
        &self,
        id: &ContainerId,
        state: ProcessState,
        exit_code: Option<i32>,
    ) -> Result<()> {
        let mut containers = self.containers.write();
        let process = containers.get_mut(id).ok_or_else(|| NsrunError::NotFound {
            kind: "container",
            id: id.to_string(),
        })?;
        if process.state.is_terminal() {
            return Err(NsrunError::InvalidTransition {
                id: id.to_string(),
                from: process.state,
                to: state,
            });
        }
        tracing::debug!(%id, from = %process.state, to = %state, "container state changed");
        process.state = state;
        if exit_code.is_some() {
            process.exit_code = exit_code;
        }
        Ok(())
    }

    /// Returns a snapshot of every record.
    #[must_use]
    pub fn list(&self) -> HashMap<ContainerId, ContainerProcess> {
        self.containers.read().clone()
    }

    /// Removes and returns the record for `id`.
    pub fn remove(&self, id: &ContainerId) -> Option<ContainerProcess> {
        self.containers.write().remove(id)
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.containers.read().len()
    }

    /// Whether the registry holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.containers.read().is_empty()
    }
}
