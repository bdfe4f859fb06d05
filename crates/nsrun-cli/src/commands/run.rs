//! `nsrun run`: create a container, wait for it, report its exit.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Args;
use nsrun_common::config::RuntimeConfig;
use nsrun_common::constants::APP_NAME;
use nsrun_core::namespace::NamespaceFlags;
use nsrun_runtime::container::ContainerConfig;
use nsrun_runtime::manager::RuntimeManager;
use nsrun_runtime::registry::ContainerRegistry;

use crate::output;

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Image label recorded with the container.
    pub image: String,

    /// Command to run inside the container.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, default_value = "/bin/sh")]
    pub command: Vec<String>,

    /// Directory that becomes the container's root.
    #[arg(long, default_value = "./busybox-rootfs")]
    pub rootfs: PathBuf,

    /// Hostname inside the container.
    #[arg(long)]
    pub hostname: Option<String>,

    /// Working directory inside the container.
    #[arg(short = 'w', long, default_value = "/")]
    pub workdir: PathBuf,

    /// Extra environment entry, as KEY=VALUE. Repeatable.
    #[arg(short, long = "env", value_name = "KEY=VALUE")]
    pub env: Vec<String>,

    /// Readiness deadline in milliseconds; 0 waits forever.
    #[arg(long)]
    pub handshake_timeout_ms: Option<u64>,

    /// Share the host's UTS namespace.
    #[arg(long)]
    pub no_uts: bool,

    /// Share the host's PID namespace.
    #[arg(long)]
    pub no_pid: bool,

    /// Share the host's IPC namespace.
    #[arg(long)]
    pub no_ipc: bool,

    /// Request a network namespace (not implemented).
    #[arg(long)]
    pub net: bool,

    /// Request a user namespace (not implemented).
    #[arg(long)]
    pub user: bool,
}

impl RunArgs {
    fn namespaces(&self) -> NamespaceFlags {
        NamespaceFlags {
            uts: !self.no_uts,
            pid: !self.no_pid,
            ipc: !self.no_ipc,
            net: self.net,
            user: self.user,
            ..NamespaceFlags::default()
        }
    }

    fn container_config(&self) -> ContainerConfig {
        ContainerConfig {
            image: self.image.clone(),
            command: self.command.clone(),
            namespaces: self.namespaces(),
            hostname: self.hostname.clone().unwrap_or_default(),
            working_dir: self.workdir.clone(),
            env: self.env.clone(),
            rootfs: self.rootfs.clone(),
        }
    }
}

const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Executes the `run` command.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the
/// container cannot be created or waited on.
pub fn execute(args: RunArgs, config_path: Option<&Path>) -> anyhow::Result<ExitCode> {
    let mut config = match config_path {
        Some(path) => RuntimeConfig::load(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    if let Some(ms) = args.handshake_timeout_ms {
        config.handshake_timeout_ms = ms;
    }

    let manager = RuntimeManager::new(Arc::new(ContainerRegistry::new()), config);
    let started = Instant::now();

    let id = manager
        .create_container(&args.container_config())
        .with_context(|| format!("creating container from {}", args.rootfs.display()))?;
    let pid = manager.start_container(&id)?;
    eprintln!(
        "{BOLD}{APP_NAME}{RESET} {id} {DIM}pid {pid} [{}]{RESET}",
        args.image
    );

    let code = manager.wait_container(&id)?;
    let state = manager
        .registry()
        .get(&id)
        .map(|process| process.state)
        .context("container record disappeared")?;
    eprintln!(
        "{BOLD}{APP_NAME}{RESET} {id} {} exit {code} {DIM}after {}{RESET}",
        output::state_label(state),
        output::format_elapsed(started.elapsed()),
    );

    Ok(ExitCode::from(output::exit_status(code)))
}
