// ── Runtime configuration ──
//
// These types describe *how* to reach the DMP and the devices behind it.
// They carry credential data and timing knobs, but never touch disk.
// The CLI builds a `ServiceConfig` (via cpectl-config) and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use cpectl_api::transport::{TlsMode, TransportConfig};
use cpectl_api::{DEFAULT_BASE_URL, Identity};

use crate::credential::DEFAULT_USERNAME;

/// Primary device SSH port.
pub const PRIMARY_SSH_PORT: u16 = 8822;
/// Fallback device SSH port.
pub const FALLBACK_SSH_PORT: u16 = 22;

/// TLS verification strategy for the DMP API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification.
    DangerAcceptInvalid,
}

/// How to talk to the DMP cloud API.
#[derive(Debug, Clone)]
pub struct DmpConfig {
    /// API root (e.g., `https://api.dataremote.com`).
    pub base_url: Url,
    /// Service identity used for every login.
    pub identity: Identity,
    pub tls: TlsVerification,
    /// Whole-request timeout; must exceed the 60s parameter wait hint.
    pub timeout: Duration,
}

impl DmpConfig {
    /// Translate into the api crate's transport settings.
    pub fn transport(&self) -> TransportConfig {
        let tls = match &self.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };
        TransportConfig {
            tls,
            timeout: self.timeout,
        }
    }
}

impl Default for DmpConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default DMP URL is valid"),
            identity: Identity {
                email: String::new(),
                password: SecretString::from(String::new()),
            },
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(90),
        }
    }
}

/// Reachability probing knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    pub primary_port: u16,
    pub fallback_port: u16,
    /// Bound on each TCP connect attempt.
    pub connect_timeout: Duration,
    /// Advisory per-port ICMP echo.
    pub echo_timeout: Duration,
    /// ICMP echo used by online checks and ping reports.
    pub online_echo_timeout: Duration,
    /// Send ICMP echoes at all (needs raw-socket privileges).
    pub icmp: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            primary_port: PRIMARY_SSH_PORT,
            fallback_port: FALLBACK_SSH_PORT,
            connect_timeout: Duration::from_secs(2),
            echo_timeout: Duration::from_millis(1500),
            online_echo_timeout: Duration::from_secs(3),
            icmp: true,
        }
    }
}

/// Device shell settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    pub username: String,
    /// Bound on TCP connect + handshake for a shell session.
    pub connect_timeout: Duration,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            username: DEFAULT_USERNAME.into(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Everything a [`DeviceController`](crate::DeviceController) needs.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub dmp: DmpConfig,
    pub probe: ProbeConfig,
    pub shell: ShellConfig,
}
