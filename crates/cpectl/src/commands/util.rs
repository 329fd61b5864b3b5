//! Shared helpers for command handlers.

use std::io::IsTerminal;

use cpectl_core::{CoreError, OperationReport};

use crate::cli::GlobalOpts;
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

/// Prompt for confirmation, auto-approving if `--yes` was passed.
///
/// Without a terminal to prompt on, `--yes` is required.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Map a core error with the context only the CLI knows: the profile
/// name for auth failures and the configured timeout.
pub fn core_error(err: CoreError, resolved: &Resolved) -> CliError {
    if err.is_timeout() {
        return CliError::Timeout {
            seconds: resolved.timeout_secs,
        };
    }
    match CliError::from(err) {
        CliError::AuthFailed { message, .. } => CliError::AuthFailed {
            profile: resolved.profile_name.clone(),
            message,
        },
        other => other,
    }
}

/// Print a report in the selected format; a failed report becomes an error.
pub fn finish(report: &OperationReport, global: &GlobalOpts) -> Result<(), CliError> {
    let rendered = output::render_report(&global.output, report);
    if report.success {
        output::print_output(&rendered, global.quiet);
        Ok(())
    } else {
        // Failures always print, even under --quiet.
        output::print_output(&rendered, false);
        Err(CliError::OperationFailed {
            operation: report.operation.to_string(),
            target: report.target.clone(),
        })
    }
}
