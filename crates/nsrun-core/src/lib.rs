//! # nsrun-core
//!
//! Low-level Linux isolation primitives for the nsrun runtime.
//!
//! This crate provides safe abstractions over:
//! - **Namespaces**: selecting UTS, PID, mount and IPC isolation and mapping
//!   the selection to `clone(2)` flags, plus the UTS hostname.
//! - **Filesystem**: mount propagation, the rootfs self-bind, `pivot_root`
//!   with lazy detach of the old root, and the virtual filesystems a shell
//!   expects.
//!
//! Every function returns [`nsrun_common::error::NsrunError::Setup`] tagged
//! with the step that failed.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod filesystem;
pub mod namespace;
