//! `nsrun child`: container setup inside the new namespaces.

use std::process::ExitCode;

use clap::Args;
use nsrun_common::error::NsrunError;
use nsrun_runtime::child;

/// Exit status when the target command cannot be executed.
const EXEC_FAILED: u8 = 127;

/// Arguments for the hidden `child` command.
#[derive(Args, Debug)]
pub struct ChildArgs {
    /// Rootfs path followed by the command to execute.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Sets up the container and replaces this process with its command.
///
/// Only returns on failure.
pub fn execute(args: &ChildArgs) -> ExitCode {
    let Err(err) = child::run(&args.args);
    tracing::error!(error = %err, step = ?err.setup_step(), "container setup failed");
    eprintln!("nsrun child: {err}");
    match err {
        NsrunError::Exec { .. } => ExitCode::from(EXEC_FAILED),
        _ => ExitCode::FAILURE,
    }
}
