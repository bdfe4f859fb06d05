//! Linux namespace selection for container isolation.
//!
//! [`NamespaceFlags`] records which namespaces a container is created in and
//! converts that set into the flag mask handed to `clone(2)`.

pub mod uts;

use nix::sched::CloneFlags;
use serde::{Deserialize, Serialize};

use nsrun_common::error::{NsrunError, Result};

/// Which namespaces to create for a new container.
///
/// `net` and `user` are part of the configuration surface but are rejected
/// by [`NamespaceFlags::validate`] until the runtime implements them.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceFlags {
    /// Isolate UTS (hostname) namespace.
    pub uts: bool,
    /// Isolate PID namespace.
    pub pid: bool,
    /// Isolate network namespace. Not implemented.
    pub net: bool,
    /// Isolate mount namespace.
    pub mount: bool,
    /// Isolate IPC namespace.
    pub ipc: bool,
    /// Isolate user namespace. Not implemented.
    pub user: bool,
}

impl Default for NamespaceFlags {
    fn default() -> Self {
        Self {
            uts: true,
            pid: true,
            net: false,
            mount: true,
            ipc: true,
            user: false,
        }
    }
}

impl NamespaceFlags {
    /// A set with every namespace disabled.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            uts: false,
            pid: false,
            net: false,
            mount: false,
            ipc: false,
            user: false,
        }
    }

    /// Rejects namespaces that are reserved but not implemented.
    ///
    /// # Errors
    ///
    /// Returns [`NsrunError::NotImplemented`] if `net` or `user` is set.
    pub fn validate(&self) -> Result<()> {
        if self.net {
            return Err(NsrunError::NotImplemented {
                feature: "network namespace",
            });
        }
        if self.user {
            return Err(NsrunError::NotImplemented {
                feature: "user namespace",
            });
        }
        Ok(())
    }

    /// Converts the selection to the `clone(2)` flag mask.
    ///
    /// Reserved namespaces are mapped too; callers validate first.
    #[must_use]
    pub fn to_clone_flags(&self) -> CloneFlags {
        let mut flags = CloneFlags::empty();
        flags.set(CloneFlags::CLONE_NEWUTS, self.uts);
        flags.set(CloneFlags::CLONE_NEWPID, self.pid);
        flags.set(CloneFlags::CLONE_NEWNS, self.mount);
        flags.set(CloneFlags::CLONE_NEWIPC, self.ipc);
        flags.set(CloneFlags::CLONE_NEWNET, self.net);
        flags.set(CloneFlags::CLONE_NEWUSER, self.user);
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_isolates_uts_pid_mount_ipc() {
        let flags = NamespaceFlags::default().to_clone_flags();
        assert_eq!(
            flags,
            CloneFlags::CLONE_NEWUTS
                | CloneFlags::CLONE_NEWPID
                | CloneFlags::CLONE_NEWNS
                | CloneFlags::CLONE_NEWIPC
        );
        assert!(NamespaceFlags::default().validate().is_ok());
    }

    #[test]
    fn none_maps_to_empty_mask() {
        assert!(NamespaceFlags::none().to_clone_flags().is_empty());
    }

    #[test]
    fn single_namespace_maps_to_single_flag() {
        let flags = NamespaceFlags {
            uts: true,
            ..NamespaceFlags::none()
        };
        assert_eq!(flags.to_clone_flags(), CloneFlags::CLONE_NEWUTS);
    }

    #[test]
    fn network_namespace_is_not_implemented() {
        let flags = NamespaceFlags {
            net: true,
            ..NamespaceFlags::default()
        };
        assert!(matches!(
            flags.validate(),
            Err(NsrunError::NotImplemented { feature: "network namespace" })
        ));
    }

    #[test]
    fn user_namespace_is_not_implemented() {
        let flags = NamespaceFlags {
            user: true,
            ..NamespaceFlags::none()
        };
        assert!(matches!(
            flags.validate(),
            Err(NsrunError::NotImplemented { feature: "user namespace" })
        ));
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let flags: NamespaceFlags = serde_json::from_str(r#"{"pid": false}"#).expect("parse");
        assert!(!flags.pid);
        assert!(flags.uts && flags.mount && flags.ipc);
    }
}
