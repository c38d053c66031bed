//! Command implementations for fgt-cli

pub mod provision;
pub mod upgrade;

use colored::Colorize;
use std::process::ExitCode;

pub use provision::{provision, ProvisionArgs};
pub use upgrade::{upgrade, UpgradeArgs};

/// Bad arguments, unreadable files or a setup failure before any device work
pub const EXIT_INVALID_INPUT: u8 = 1;

/// At least one device or stage did not complete
pub const EXIT_PARTIAL_FAILURE: u8 = 2;

/// Final process status for a command result
///
/// Errors that escape a command happened before any device work finished,
/// so they are reported and mapped to [`EXIT_INVALID_INPUT`].
pub fn exit_code(result: anyhow::Result<ExitCode>) -> ExitCode {
    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red(), e);
            ExitCode::from(EXIT_INVALID_INPUT)
        }
    }
}
