//! Global configuration model for the nsrun runtime.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_HANDSHAKE_TIMEOUT_MS, DEFAULT_HOSTNAME, DEFAULT_STACK_SIZE};
use crate::error::{NsrunError, Result};

/// Root configuration for the nsrun runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// How long the parent waits for the child's readiness byte.
    /// Zero waits forever.
    pub handshake_timeout_ms: u64,
    /// Hostname for containers that do not set their own.
    pub hostname: String,
    /// Binary to re-invoke in child mode. `None` uses `/proc/self/exe`.
    pub self_exe: Option<PathBuf>,
    /// Size in bytes of the stack given to the cloned child.
    pub stack_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
            hostname: DEFAULT_HOSTNAME.to_string(),
            self_exe: None,
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

impl RuntimeConfig {
    /// Loads a configuration file, filling absent fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON,
    /// or describes an unusable configuration.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| NsrunError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`NsrunError::Config`] on an empty hostname or a stack too
    /// small to run the clone callback.
    pub fn validate(&self) -> Result<()> {
        if self.hostname.is_empty() {
            return Err(NsrunError::Config {
                message: "hostname must not be empty".into(),
            });
        }
        if self.stack_size < 64 * 1024 {
            return Err(NsrunError::Config {
                message: format!("stack_size {} is below 64 KiB", self.stack_size),
            });
        }
        Ok(())
    }

    /// Returns the handshake deadline, or `None` to wait indefinitely.
    #[must_use]
    pub const fn handshake_timeout(&self) -> Option<Duration> {
        if self.handshake_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.handshake_timeout_ms))
        }
    }
}
