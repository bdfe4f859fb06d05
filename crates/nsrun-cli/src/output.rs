//! Formatted output helpers for CLI commands.
//!
//! Colored lifecycle states and short human-readable durations.

use std::time::Duration;

use nsrun_common::types::ProcessState;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

/// Colors a lifecycle state for terminal output.
#[must_use]
pub fn state_label(state: ProcessState) -> String {
    let color = match state {
        ProcessState::Stopped => GREEN,
        ProcessState::Failed => RED,
        ProcessState::Created | ProcessState::Running => YELLOW,
    };
    format!("{color}{state}{RESET}")
}

/// Formats a duration as milliseconds below one second, seconds above.
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    if elapsed < Duration::from_secs(1) {
        format!("{}ms", elapsed.as_millis())
    } else {
        format!("{:.1}s", elapsed.as_secs_f64())
    }
}

/// Process exit status the CLI reports for a container exit code.
///
/// Codes outside `0..=255` become 1.
#[must_use]
pub fn exit_status(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}
