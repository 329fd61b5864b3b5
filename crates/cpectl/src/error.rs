//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use cpectl_config::ConfigError;
use cpectl_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const OPERATION_FAILED: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Authentication ───────────────────────────────────────────────
    #[error("DMP authentication failed: {message}")]
    #[diagnostic(
        code(cpectl::auth_failed),
        help(
            "Verify the service account email and password.\n\
             Run: cpectl config set-password --profile {profile}"
        )
    )]
    AuthFailed { profile: String, message: String },

    #[error("No DMP credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(cpectl::no_credentials),
        help(
            "Configure credentials with: cpectl config init\n\
             Or set CPECTL_EMAIL and CPECTL_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    #[error("No client ID configured")]
    #[diagnostic(
        code(cpectl::no_client_id),
        help(
            "Device passwords are derived from the client ID.\n\
             Pass --client-id, set CPECTL_CLIENT_ID, or add client_id to your profile."
        )
    )]
    MissingClientId,

    // ── Devices ──────────────────────────────────────────────────────
    #[error("Device '{serial}' could not be resolved ({missing} not found)")]
    #[diagnostic(
        code(cpectl::not_found),
        help("Run: cpectl getinfo {serial} to see what the DMP reports")
    )]
    ResolutionFailed { serial: String, missing: String },

    #[error("Could not reach {target}")]
    #[diagnostic(
        code(cpectl::connection_failed),
        help(
            "If the DMP reports a mobile or private IP, try --ip with the Ethernet/LAN address\n\
             or connect through the VPN."
        )
    )]
    ConnectionFailed { target: String, reason: String },

    #[error("{operation} failed for {target}")]
    #[diagnostic(code(cpectl::operation_failed))]
    OperationFailed { operation: String, target: String },

    #[error("Remote command '{command}' failed: {reason}")]
    #[diagnostic(code(cpectl::remote_command))]
    RemoteCommand { command: String, reason: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("DMP API error: {message}")]
    #[diagnostic(code(cpectl::api_error))]
    ApiError { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(cpectl::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(cpectl::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: cpectl config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file not found")]
    #[diagnostic(
        code(cpectl::no_config),
        help(
            "Create one with: cpectl config init\n\
             Expected at: {path}\n\
             Or pass --email and set CPECTL_PASSWORD."
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(cpectl::config))]
    Config { message: String },

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Operation '{action}' requires confirmation")]
    #[diagnostic(
        code(cpectl::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(cpectl::timeout),
        help("Increase timeout with --timeout or check DMP responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::ResolutionFailed { .. } => exit_code::NOT_FOUND,
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::OperationFailed { .. } | Self::RemoteCommand { .. } => {
                exit_code::OPERATION_FAILED
            }
            Self::Validation { .. }
            | Self::MissingClientId
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AuthFailure { message } => CliError::AuthFailed {
                profile: "current".into(),
                message,
            },
            CoreError::ResolutionFailure {
                serial, missing, ..
            } => CliError::ResolutionFailed { serial, missing },
            CoreError::CredentialInvalid { raw, .. } => CliError::Validation {
                field: "WAN MAC".into(),
                reason: format!("cannot derive a password from '{raw}'"),
            },
            CoreError::UnreachableEndpoint {
                ip,
                primary_port,
                fallback_port,
            } => CliError::ConnectionFailed {
                target: ip,
                reason: format!("no answer on ports {primary_port}, {fallback_port}"),
            },
            CoreError::SessionFailure { host, port, reason } => CliError::ConnectionFailed {
                target: format!("{host}:{port}"),
                reason,
            },
            CoreError::RemoteCommandFailure { command, reason } => {
                CliError::RemoteCommand { command, reason }
            }
            CoreError::Api { message, .. } | CoreError::Internal(message) => {
                CliError::ApiError { message }
            }
            CoreError::Config { message } => CliError::Config { message },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::ProfileNotFound { name, available } => {
                CliError::ProfileNotFound { name, available }
            }
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}
