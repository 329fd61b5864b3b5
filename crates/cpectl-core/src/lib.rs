//! Device discovery and remote control for DMP-managed CPE devices.
//!
//! This crate owns everything between the DMP HTTP client (`cpectl-api`)
//! and the CLI:
//!
//! - **[`extract`]**: pure, schema-free field discovery over telemetry JSON
//!   (IPv4 address and WAN MAC, with scope precedence).
//! - **[`credential`]**: the `{client_id}!{CLEAN MAC}` password convention.
//! - **[`DeviceResolver`]**: serial number to [`DeviceEndpoint`] over four
//!   telemetry paths, first-found-wins per field, early stop.
//! - **[`Prober`]**: primary/fallback port selection with a bounded TCP
//!   connect and an advisory ICMP echo.
//! - **[`DeviceController`]**: the restart state machine plus reboot,
//!   stop/start, online checks, ping, exec and device info. Every operation
//!   returns an [`OperationReport`] or a small record, never an error for a
//!   remote failure.
//! - **[`session`]**: the [`ShellSession`] seam, a scoped guard that always
//!   disconnects, and the ssh2 transport.

pub mod config;
pub mod control;
pub mod credential;
pub mod error;
pub mod extract;
pub mod probe;
pub mod report;
pub mod resolver;
pub mod session;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{DmpConfig, ProbeConfig, ServiceConfig, ShellConfig, TlsVerification};
pub use control::{DeviceController, DeviceInfo, ResolvedCredential, RestartStage};
pub use credential::{CleanMac, Credential, clean_wan_mac, derive_password};
pub use error::{CoreError, ErrorKind};
pub use probe::{EchoOutcome, OnlineCheckResult, Prober, ReachabilityResult};
pub use report::{Operation, OperationReport, ReportFailure, StepRecord};
pub use resolver::{DeviceEndpoint, DeviceResolver, DeviceScan, PathOutcome, TELEMETRY_PATHS};
pub use session::{
    ScopedSession, SessionFactory, SessionTarget, ShellError, ShellSession, Ssh2Factory,
};

// Transport types consumers need to build a `ServiceConfig` or a client.
pub use cpectl_api::{DmpClient, Identity};
