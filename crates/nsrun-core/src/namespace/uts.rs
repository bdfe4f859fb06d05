//! UTS namespace isolation.
//!
//! Gives the container its own hostname, invisible to the host.

use nsrun_common::error::{NsrunError, Result, SetupStep};

/// Sets the hostname inside the calling process's UTS namespace.
///
/// Only call this after the process has entered a new UTS namespace;
/// otherwise the host's hostname changes.
///
/// # Errors
///
/// Returns an error if `sethostname(2)` fails.
pub fn set_hostname(hostname: &str) -> Result<()> {
    nix::unistd::sethostname(hostname).map_err(|e| NsrunError::setup(SetupStep::Hostname, e))?;
    tracing::debug!(hostname, "hostname set");
    Ok(())
}
