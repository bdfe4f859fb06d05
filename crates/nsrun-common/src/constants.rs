//! System-wide constants shared by the parent and child halves of the runtime.
//!
//! The re-exec protocol values below must match bit-for-bit between the
//! process that spawns a container and the process that sets it up.

/// First argument that switches the binary into child-setup mode.
pub const CHILD_MARKER: &str = "child";

/// Path used to re-invoke the running executable.
pub const SELF_EXE: &str = "/proc/self/exe";

/// Descriptor slot the readiness pipe occupies in the child.
pub const SYNC_FD: i32 = 3;

/// Byte written by the child once setup has completed.
pub const READY_BYTE: u8 = 0x01;

/// Directory (relative to the new root) that temporarily holds the old root.
pub const OLD_ROOT_DIR: &str = ".old_root";

/// Mount options for the `tmpfs` mounted on `/dev`.
pub const DEV_TMPFS_OPTIONS: &str = "size=65536k";

/// `PATH` exported to the container command.
pub const CONTAINER_PATH: &str = "/bin:/sbin:/usr/bin:/usr/sbin";

/// Shell prompt exported to the container command.
pub const CONTAINER_PS1: &str = "container# ";

/// Environment key carrying the requested hostname to the child.
pub const HOSTNAME_ENV: &str = "NSRUN_HOSTNAME";

/// Environment key carrying the container working directory to the child.
pub const WORKDIR_ENV: &str = "NSRUN_WORKDIR";

/// Hostname used when neither the container nor the runtime config sets one.
pub const DEFAULT_HOSTNAME: &str = "container";

/// Prefix of every generated container identifier.
pub const CONTAINER_ID_PREFIX: &str = "container-";

/// Number of random bytes behind a container identifier.
pub const CONTAINER_ID_BYTES: usize = 8;

/// Default deadline for the readiness handshake, in milliseconds.
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 10_000;

/// Default size of the stack handed to `clone(2)`.
pub const DEFAULT_STACK_SIZE: usize = 1024 * 1024;

/// Application name used in CLI output.
pub const APP_NAME: &str = "nsrun";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "nsrun";
