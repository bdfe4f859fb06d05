//! Mount utilities for container filesystem setup.
//!
//! Handles mount propagation, the rootfs self-bind, and mounting `/proc`,
//! `/sys` and `/dev` inside the container's namespace.

use std::path::Path;

use nix::mount::{MsFlags, mount};

use nsrun_common::constants::DEV_TMPFS_OPTIONS;
use nsrun_common::error::{NsrunError, Result, SetupStep};

/// Marks the whole mount tree private, recursively.
///
/// After this, mount and unmount events inside the new mount namespace no
/// longer propagate to the host, and host events no longer arrive. Must run
/// before any other mount operation in the child.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails.
pub fn make_mounts_private() -> Result<()> {
    mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_REC | MsFlags::MS_PRIVATE,
        None::<&str>,
    )
    .map_err(|e| NsrunError::setup(SetupStep::MakeMountsPrivate, e))?;
    tracing::debug!("mount tree marked private");
    Ok(())
}

/// Bind-mounts `rootfs` onto itself.
///
/// `pivot_root(2)` requires the new root to be a mount point distinct from
/// its parent mount; the self-bind guarantees it even when the rootfs lives
/// on the host root filesystem.
///
/// # Errors
///
/// Returns an error if the `mount(2)` syscall fails, for example when the
/// rootfs does not exist.
pub fn bind_rootfs(rootfs: &Path) -> Result<()> {
    mount(
        Some(rootfs),
        rootfs,
        None::<&str>,
        MsFlags::MS_BIND | MsFlags::MS_REC,
        None::<&str>,
    )
    .map_err(|e| NsrunError::setup(SetupStep::BindRootfs, e))?;
    tracing::debug!(rootfs = %rootfs.display(), "rootfs bind-mounted onto itself");
    Ok(())
}

/// A virtual filesystem mounted into every container.
struct VirtualMount {
    source: &'static str,
    target: &'static str,
    fstype: &'static str,
    flags: MsFlags,
    data: Option<&'static str>,
    step: SetupStep,
}

fn virtual_mounts() -> [VirtualMount; 3] {
    [
        VirtualMount {
            source: "proc",
            target: "/proc",
            fstype: "proc",
            flags: MsFlags::empty(),
            data: None,
            step: SetupStep::MountProc,
        },
        VirtualMount {
            source: "sysfs",
            target: "/sys",
            fstype: "sysfs",
            flags: MsFlags::empty(),
            data: None,
            step: SetupStep::MountSys,
        },
        VirtualMount {
            source: "tmpfs",
            target: "/dev",
            fstype: "tmpfs",
            flags: MsFlags::MS_NOSUID | MsFlags::MS_STRICTATIME,
            data: Some(DEV_TMPFS_OPTIONS),
            step: SetupStep::MountDev,
        },
    ]
}

/// Mounts `proc` on `/proc`, `sysfs` on `/sys` and a bounded `tmpfs` on `/dev`.
///
/// Runs after the root pivot, so the targets resolve inside the container.
/// Missing mount points are created.
///
/// # Errors
///
/// Returns an error naming the first mount that failed.
pub fn mount_virtual_filesystems() -> Result<()> {
    for vm in virtual_mounts() {
        std::fs::create_dir_all(vm.target).map_err(|e| NsrunError::setup(vm.step, e))?;
        mount(
            Some(vm.source),
            vm.target,
            Some(vm.fstype),
            vm.flags,
            vm.data,
        )
        .map_err(|e| NsrunError::setup(vm.step, e))?;
        tracing::debug!(target = vm.target, fstype = vm.fstype, "mounted");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_mounts_cover_proc_sys_dev_in_order() {
        let targets: Vec<_> = virtual_mounts().iter().map(|m| m.target).collect();
        assert_eq!(targets, ["/proc", "/sys", "/dev"]);
    }

    #[test]
    fn dev_is_bounded_nosuid_tmpfs() {
        let mounts = virtual_mounts();
        let dev = &mounts[2];
        assert_eq!(dev.fstype, "tmpfs");
        assert_eq!(dev.data, Some("size=65536k"));
        assert!(dev.flags.contains(MsFlags::MS_NOSUID | MsFlags::MS_STRICTATIME));
    }

    #[test]
    fn bind_of_missing_rootfs_reports_bind_step() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = bind_rootfs(&dir.path().join("missing")).unwrap_err();
        assert_eq!(err.setup_step(), Some(SetupStep::BindRootfs));
    }
}
