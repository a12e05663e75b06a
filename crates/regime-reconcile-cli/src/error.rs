//! CLI exit code handling.
//!
//! Exit codes:
//! - 0: Success
//! - 1: Failure (missing directory, I/O, configuration, trainer, cancellation)
//! - 2: Invalid input (malformed neuron tables, LUTs or arrays, shape
//!   mismatches, labels the LUT cannot map)

use std::process::ExitCode;

use regime_reconcile_core::ReconcileError;

/// Exit codes for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CliExitCode {
    /// Command completed
    Success = 0,
    /// Environment or runtime failure
    Failure = 1,
    /// The artifacts themselves are inconsistent
    InvalidInput = 2,
}

impl From<CliExitCode> for ExitCode {
    fn from(code: CliExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl From<CliExitCode> for i32 {
    fn from(code: CliExitCode) -> Self {
        code as i32
    }
}

impl From<&ReconcileError> for CliExitCode {
    fn from(err: &ReconcileError) -> Self {
        if err.is_input_error() {
            CliExitCode::InvalidInput
        } else {
            CliExitCode::Failure
        }
    }
}

/// Report `err` on stderr and return the process exit code for it.
pub fn exit_code_for_error(command: &str, err: &ReconcileError) -> i32 {
    let code = CliExitCode::from(err);
    tracing::error!(command, error = %err, exit_code = code as u8, "command failed");
    eprintln!("{}", err);
    code.into()
}
