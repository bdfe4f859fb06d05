//! Secure root filesystem switching via `pivot_root(2)`.
//!
//! More secure than `chroot` because it actually changes the root mount
//! point rather than just the process's view of `/`.

use std::path::Path;

use nix::mount::{MntFlags, umount2};
use nix::unistd::{chdir, pivot_root};

use nsrun_common::constants::OLD_ROOT_DIR;
use nsrun_common::error::{NsrunError, Result, SetupStep};

/// Makes `rootfs` the root of the calling process's mount namespace.
///
/// The rootfs must already be a mount point (see
/// [`super::mount::bind_rootfs`]). The sequence is:
///
/// 1. `chdir` into the rootfs, so `.` is the new root candidate.
/// 2. Create `.old_root` if it is missing.
/// 3. `pivot_root(".", ".old_root")`.
/// 4. `chdir("/")`, now the new root.
/// 5. Lazily detach `/.old_root`; the old root may still be busy.
/// 6. Remove the empty `/.old_root` directory.
///
/// # Errors
///
/// Returns an error tagged with the first step that failed. Nothing is
/// rolled back.
pub fn pivot_into(rootfs: &Path) -> Result<()> {
    tracing::info!(rootfs = %rootfs.display(), "performing pivot_root");

    chdir(rootfs).map_err(|e| NsrunError::setup(SetupStep::EnterRootfs, e))?;

    std::fs::create_dir_all(OLD_ROOT_DIR)
        .map_err(|e| NsrunError::setup(SetupStep::CreateOldRoot, e))?;

    pivot_root(".", OLD_ROOT_DIR).map_err(|e| NsrunError::setup(SetupStep::PivotRoot, e))?;

    chdir("/").map_err(|e| NsrunError::setup(SetupStep::EnterNewRoot, e))?;

    let old_root = Path::new("/").join(OLD_ROOT_DIR);
    umount2(old_root.as_path(), MntFlags::MNT_DETACH)
        .map_err(|e| NsrunError::setup(SetupStep::UnmountOldRoot, e))?;
    std::fs::remove_dir(&old_root).map_err(|e| NsrunError::setup(SetupStep::RemoveOldRoot, e))?;

    tracing::debug!("old root detached and removed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_rootfs_fails_before_pivoting() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = pivot_into(&dir.path().join("missing")).unwrap_err();
        assert_eq!(err.setup_step(), Some(SetupStep::EnterRootfs));
    }
}
