//! Container lifecycle management for the nsrun runtime.
//!
//! The parent side ([`process::ProcessExecutor`]) clones a re-invocation of
//! the binary into new namespaces and blocks on a one-byte readiness pipe.
//! The child side ([`child::run`]) isolates mounts, pivots into the rootfs,
//! signals readiness, then replaces itself with the target command.
//! [`manager::RuntimeManager`] ties both to a [`registry::ContainerRegistry`].

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod child;
pub mod container;
pub mod exec;
pub mod handshake;
pub mod launcher;
pub mod manager;
pub mod process;
pub mod registry;
