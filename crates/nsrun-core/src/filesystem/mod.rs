//! Filesystem management for container isolation.
//!
//! Provides mount propagation control, bind and virtual filesystem mounts,
//! and the `pivot_root` sequence that switches the container root.

pub mod mount;
pub mod pivot_root;
