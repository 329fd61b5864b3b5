// ── Core error types ──
//
// Operation-level failures. Consumers never see raw HTTP status codes or
// ssh2 error codes: the `From<cpectl_api::Error>` impl and the session
// layer translate transport errors into these variants. Control
// operations convert them into failed reports at their boundary.

use serde::Serialize;
use thiserror::Error;

/// Failure category, independent of the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    AuthFailure,
    ResolutionFailure,
    CredentialInvalid,
    UnreachableEndpoint,
    SessionFailure,
    RemoteCommandFailure,
    Api,
    Config,
    Internal,
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Cloud API ────────────────────────────────────────────────────
    #[error("Failed to obtain DMP authorization token: {message}")]
    AuthFailure { message: String },

    #[error("DMP API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Discovery ────────────────────────────────────────────────────
    #[error(
        "Failed to retrieve device info for {serial} ({missing} not found). Run 'getinfo' to debug."
    )]
    ResolutionFailure {
        serial: String,
        missing: String,
        ip: Option<String>,
        wan_mac: Option<String>,
    },

    #[error(
        "WAN MAC missing/invalid from DMP response, cannot compute SSH password (expected 12 hex). Got: '{raw}'"
    )]
    CredentialInvalid { raw: String, clean: String },

    #[error(
        "Could not reach device for SSH.\n- Candidate IP from DMP: {ip}\n- Tried ports: {primary_port}, {fallback_port}\nTip: If this is a mobile/private IP, you may need the Ethernet/LAN IP or VPN."
    )]
    UnreachableEndpoint {
        ip: String,
        primary_port: u16,
        fallback_port: u16,
    },

    // ── Remote shell ─────────────────────────────────────────────────
    #[error("Failed to connect to {host}:{port}: {reason}")]
    SessionFailure {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Remote command '{command}' failed: {reason}")]
    RemoteCommandFailure { command: String, reason: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthFailure { .. } => ErrorKind::AuthFailure,
            Self::Api { .. } => ErrorKind::Api,
            Self::ResolutionFailure { .. } => ErrorKind::ResolutionFailure,
            Self::CredentialInvalid { .. } => ErrorKind::CredentialInvalid,
            Self::UnreachableEndpoint { .. } => ErrorKind::UnreachableEndpoint,
            Self::SessionFailure { .. } => ErrorKind::SessionFailure,
            Self::RemoteCommandFailure { .. } => ErrorKind::RemoteCommandFailure,
            Self::Config { .. } => ErrorKind::Config,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// A DMP request that ran past the transport timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Api { message, status: None } if message.starts_with(TIMED_OUT))
    }
}

const TIMED_OUT: &str = "request timed out";

// ── Conversion from transport-layer errors ───────────────────────────

impl From<cpectl_api::Error> for CoreError {
    fn from(err: cpectl_api::Error) -> Self {
        let auth_failure = err.is_auth_failure();
        let status = err.status();
        match err {
            cpectl_api::Error::Authentication { message } => CoreError::AuthFailure { message },
            cpectl_api::Error::Api { status, body } if auth_failure => {
                CoreError::AuthFailure {
                    message: format!("HTTP {status}: {body}"),
                }
            }
            cpectl_api::Error::Api { status, body } => CoreError::Api {
                message: format!("HTTP {status}: {body}"),
                status: Some(status),
            },
            cpectl_api::Error::Transport(ref e) if e.is_timeout() => CoreError::Api {
                message: format!("{TIMED_OUT}: {e}"),
                status: None,
            },
            cpectl_api::Error::Transport(ref e) => CoreError::Api {
                message: e.to_string(),
                status,
            },
            cpectl_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            cpectl_api::Error::Tls(msg) => CoreError::Config {
                message: format!("TLS error: {msg}"),
            },
            cpectl_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
