//! Runtime manager that orchestrates the container lifecycle.

use std::collections::HashMap;
use std::sync::Arc;

use nix::unistd::Pid;
use parking_lot::Mutex;

use nsrun_common::config::RuntimeConfig;
use nsrun_common::error::{NsrunError, Result};
use nsrun_common::types::{ContainerId, ProcessState};

use crate::container::{ContainerConfig, ContainerProcess};
use crate::launcher::{self, SelfInvocation};
use crate::process::{self, ProcessExecutor};
use crate::registry::ContainerRegistry;

/// Coordinates executor, registry and identity generation.
///
/// The registry is injected so several managers, or a test, can share or
/// isolate it.
#[derive(Debug)]
pub struct RuntimeManager {
    registry: Arc<ContainerRegistry>,
    launcher: Arc<dyn SelfInvocation>,
    config: RuntimeConfig,
    /// One lock per container being waited on, so a single waiter reaps it.
    wait_locks: Mutex<HashMap<ContainerId, Arc<Mutex<()>>>>,
}

impl RuntimeManager {
    /// Creates a manager using the self-invocation strategy named by `config`.
    #[must_use]
    pub fn new(registry: Arc<ContainerRegistry>, config: RuntimeConfig) -> Self {
        let launcher = launcher::from_config(&config);
        Self {
            registry,
            launcher,
            config,
            wait_locks: Mutex::default(),
        }
    }

    /// Replaces the self-invocation strategy.
    #[must_use]
    pub fn with_launcher(mut self, launcher: Arc<dyn SelfInvocation>) -> Self {
        self.launcher = launcher;
        self
    }

    /// The registry this manager records containers in.
    #[must_use]
    pub fn registry(&self) -> &Arc<ContainerRegistry> {
        &self.registry
    }

    /// Spawns a container and registers it as `Running`.
    ///
    /// # Errors
    ///
    /// Propagates every executor error. A failed create leaves no registry
    /// entry.
    pub fn create_container(&self, config: &ContainerConfig) -> Result<ContainerId> {
        let executor = ProcessExecutor::new(config.namespaces)
            .with_launcher(Arc::clone(&self.launcher))
            .with_hostname(self.hostname_for(config))
            .with_working_dir(config.working_dir.clone())
            .with_env(config.env.clone())
            .with_handshake_timeout(self.config.handshake_timeout())
            .with_stack_size(self.config.stack_size);

        let process = executor.create_container(&config.command, &config.rootfs)?;
        let id = ContainerId::generate();
        tracing::info!(
            %id,
            pid = process.pid.as_raw(),
            image = %config.image,
            "container created"
        );
        self.registry.add(id.clone(), process);
        Ok(id)
    }

    /// Reports the PID of an already-running container.
    ///
    /// The process starts executing during create; this only looks it up.
    ///
    /// # Errors
    ///
    /// Returns [`NsrunError::NotFound`] for an unknown id.
    pub fn start_container(&self, id: &ContainerId) -> Result<Pid> {
        let process = self.lookup(id)?;
        tracing::info!(
            %id,
            pid = process.pid.as_raw(),
            state = %process.state,
            "container started"
        );
        Ok(process.pid)
    }

    /// Blocks until the container exits and returns its exit code.
    ///
    /// Code 0 records `Stopped`, anything else `Failed`. A container
    /// already in a terminal state returns its recorded code immediately.
    /// Concurrent waits on one container are serialized: the first reaps
    /// the process, the rest return the code it recorded.
    ///
    /// # Errors
    ///
    /// Returns [`NsrunError::NotFound`] for an unknown id, or
    /// [`NsrunError::Wait`] if waiting fails; the record is then `Failed`.
    pub fn wait_container(&self, id: &ContainerId) -> Result<i32> {
        if self.registry.get(id).is_none() {
            return Err(not_found(id));
        }
        let lock = Arc::clone(self.wait_locks.lock().entry(id.clone()).or_default());
        let _waiting = lock.lock();

        let process = self.lookup(id)?;
        if process.state.is_terminal() {
            return process.exit_code.ok_or_else(|| NsrunError::Config {
                message: format!("container {id} is {} without an exit code", process.state),
            });
        }

        match process::wait_for_exit(process.pid) {
            Ok(code) => {
                let state = ProcessState::from_exit_code(code);
                self.registry.update_state(id, state, Some(code))?;
                tracing::info!(%id, code, %state, "container exited");
                Ok(code)
            }
            Err(e) => {
                if let Err(update) = self.registry.update_state(id, ProcessState::Failed, None) {
                    tracing::warn!(%id, error = %update, "could not record wait failure");
                }
                Err(e)
            }
        }
    }

    /// Snapshot of every container, oldest first.
    #[must_use]
    pub fn list_containers(&self) -> Vec<(ContainerId, ContainerProcess)> {
        let mut containers: Vec<_> = self.registry.list().into_iter().collect();
        containers.sort_by(|a, b| {
            a.1.start_time
                .cmp(&b.1.start_time)
                .then_with(|| a.0.cmp(&b.0))
        });
        containers
    }

    /// Drops the record of a container that is no longer running.
    ///
    /// # Errors
    ///
    /// Returns [`NsrunError::NotFound`] for an unknown id, or
    /// [`NsrunError::InvalidTransition`] if the container is still `Running`.
    pub fn remove_container(&self, id: &ContainerId) -> Result<ContainerProcess> {
        let process = self.lookup(id)?;
        if process.state == ProcessState::Running {
            return Err(NsrunError::InvalidTransition {
                id: id.to_string(),
                from: process.state,
                to: ProcessState::Stopped,
            });
        }
        drop(self.wait_locks.lock().remove(id));
        self.registry.remove(id).ok_or_else(|| not_found(id))
    }

    /// Hostname for `config`, falling back to the runtime default.
    fn hostname_for(&self, config: &ContainerConfig) -> String {
        if config.hostname.is_empty() {
            self.config.hostname.clone()
        } else {
            config.hostname.clone()
        }
    }

    fn lookup(&self, id: &ContainerId) -> Result<ContainerProcess> {
        self.registry.get(id).ok_or_else(|| not_found(id))
    }
}

fn not_found(id: &ContainerId) -> NsrunError {
    NsrunError::NotFound {
        kind: "container",
        id: id.to_string(),
    }
}
