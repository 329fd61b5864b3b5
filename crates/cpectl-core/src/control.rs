// ── Device control orchestration ──
//
// High-level operations over the resolver, prober and shell sessions.
// Every operation returns a report or a small result record; failures
// are folded into that value at this boundary and never propagated.

use std::sync::Arc;
use std::time::Instant;

use secrecy::SecretString;
use serde::Serialize;
use tracing::{debug, info, warn};

use cpectl_api::DmpClient;

use crate::config::ServiceConfig;
use crate::credential::{CleanMac, Credential, derive_password};
use crate::error::{CoreError, ErrorKind};
use crate::probe::{EchoOutcome, OnlineCheckResult, Prober};
use crate::report::{Operation, OperationReport, millis};
use crate::resolver::{DeviceEndpoint, DeviceResolver, DeviceScan};
use crate::session::{ScopedSession, SessionFactory, SessionTarget, Ssh2Factory};

pub const STOP_COMMAND: &str = "/etc/init.d/ngacsclient stop";
pub const START_COMMAND: &str = "/etc/init.d/ngacsclient start";
pub const STATUS_COMMAND: &str = "ps | grep ngacs";

/// States of the index-restart sequence, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RestartStage {
    Resolve,
    ValidateCredential,
    SelectEndpoint,
    Connect,
    Stop,
    Start,
    Status,
    Done,
}

/// An endpoint plus the credential that opens it.
#[derive(Debug, Clone)]
pub struct ResolvedCredential {
    pub endpoint: DeviceEndpoint,
    pub clean_mac: CleanMac,
    pub credential: Credential,
}

/// Diagnostic view of a device, partial results included.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    #[serde(flatten)]
    pub scan: DeviceScan,
    pub wan_mac_clean: Option<CleanMac>,
    pub elapsed_ms: u64,
}

impl DeviceInfo {
    /// Whether the clean MAC is long enough to seed a restart password.
    pub fn mac_complete(&self) -> bool {
        self.wan_mac_clean.as_ref().is_some_and(CleanMac::is_complete)
    }
}

/// Entry point for every device operation.
pub struct DeviceController {
    resolver: DeviceResolver,
    prober: Prober,
    sessions: Arc<dyn SessionFactory>,
    config: ServiceConfig,
}

impl DeviceController {
    /// Build a controller with the HTTP client and ssh2 transport from `config`.
    pub fn new(config: ServiceConfig) -> Result<Self, CoreError> {
        let client = DmpClient::new(config.dmp.base_url.clone(), &config.dmp.transport())?;
        let sessions = Arc::new(Ssh2Factory::new(config.shell.connect_timeout));
        Ok(Self::with_parts(client, sessions, config))
    }

    /// Build a controller around an existing client and session factory.
    pub fn with_parts(
        client: DmpClient,
        sessions: Arc<dyn SessionFactory>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            resolver: DeviceResolver::new(client, config.dmp.identity.clone()),
            prober: Prober::new(config.probe.clone()),
            sessions,
            config,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    // ── Index restart ────────────────────────────────────────────────

    /// Resolve, derive credentials, probe, then stop/start/status over SSH.
    ///
    /// `ip_override` replaces the resolved address for probing and
    /// connecting; resolution still runs for the WAN MAC.
    pub async fn index_restart(
        &self,
        serial: &str,
        client_id: &str,
        ip_override: Option<&str>,
    ) -> OperationReport {
        info!(serial, "starting index restart");
        let mut report = OperationReport::begin(Operation::Restart, serial);
        let endpoint = match self.resolver.resolve(serial).await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                warn!(serial, stage = %RestartStage::Resolve, error = %e, "index restart failed");
                return report.fail(Some(<&'static str>::from(RestartStage::Resolve)), &e);
            }
        };
        report.note(format!(
            "Resolved {serial}: IP {}, WAN MAC {}",
            endpoint.ip, endpoint.wan_mac_raw
        ));
        self.finish_restart(report, serial, client_id, endpoint, ip_override)
            .await
    }

    /// The restart sequence from ValidateCredential on, for an endpoint
    /// that is already known.
    pub async fn index_restart_endpoint(
        &self,
        serial: &str,
        client_id: &str,
        endpoint: DeviceEndpoint,
        ip_override: Option<&str>,
    ) -> OperationReport {
        let report = OperationReport::begin(Operation::Restart, serial);
        self.finish_restart(report, serial, client_id, endpoint, ip_override)
            .await
    }

    async fn finish_restart(
        &self,
        mut report: OperationReport,
        serial: &str,
        client_id: &str,
        endpoint: DeviceEndpoint,
        ip_override: Option<&str>,
    ) -> OperationReport {
        let mut stage = RestartStage::ValidateCredential;
        match self
            .run_restart(serial, client_id, endpoint, ip_override, &mut report, &mut stage)
            .await
        {
            Ok(()) => {
                info!(serial, "index restart completed");
                report.succeed()
            }
            Err(e) => {
                warn!(serial, %stage, error = %e, "index restart failed");
                report.fail(Some(<&'static str>::from(stage)), &e)
            }
        }
    }

    async fn run_restart(
        &self,
        serial: &str,
        client_id: &str,
        endpoint: DeviceEndpoint,
        ip_override: Option<&str>,
        report: &mut OperationReport,
        stage: &mut RestartStage,
    ) -> Result<(), CoreError> {
        let clean_mac = CleanMac::from_raw(&endpoint.wan_mac_raw);
        if !clean_mac.is_complete() {
            return Err(CoreError::CredentialInvalid {
                raw: endpoint.wan_mac_raw,
                clean: clean_mac.to_string(),
            });
        }
        let credential = Credential::new(
            self.config.shell.username.clone(),
            derive_password(client_id, clean_mac.as_str()),
        );

        *stage = RestartStage::SelectEndpoint;
        let candidate = ip_override.map_or(endpoint.ip.as_str(), str::trim);
        let reachability = self.prober.probe(candidate).await;
        if !reachability.reachable {
            return Err(CoreError::UnreachableEndpoint {
                ip: candidate.to_owned(),
                primary_port: self.config.probe.primary_port,
                fallback_port: self.config.probe.fallback_port,
            });
        }

        *stage = RestartStage::Connect;
        report.note(format!(
            "Connecting to {serial} at {}:{} as {}",
            reachability.ip, reachability.port, credential.username
        ));
        report.note(format!("Using WAN MAC (clean): {clean_mac}"));
        let target = SessionTarget {
            host: reachability.ip,
            port: reachability.port,
            credential,
        };
        let mut session = ScopedSession::connect(self.sessions.as_ref(), &target).await?;

        *stage = RestartStage::Stop;
        timed_command(&mut session, report, "ngacs stop", STOP_COMMAND).await?;

        *stage = RestartStage::Start;
        if !session.is_connected() {
            return Err(session.session_failure("session dropped before start"));
        }
        timed_command(&mut session, report, "ngacs start", START_COMMAND).await?;

        *stage = RestartStage::Status;
        // Informational only; never fails the sequence.
        if let Err(e) =
            timed_command(&mut session, report, "ngacs status (via ps)", STATUS_COMMAND).await
        {
            warn!(serial, error = %e, "status check failed");
            report.note(format!("Status check skipped: {e}"));
        }

        *stage = RestartStage::Done;
        session.close().await;
        Ok(())
    }

    // ── Single-command operations ────────────────────────────────────

    /// Run the stop command against an already-resolved endpoint.
    pub async fn stop_only(
        &self,
        serial: &str,
        ip: &str,
        port: u16,
        username: &str,
        password: SecretString,
    ) -> OperationReport {
        let target = target(ip, port, username, password);
        self.single_command(Operation::Stop, serial, &target, "ngacs stop", STOP_COMMAND)
            .await
    }

    /// Run the start command against an already-resolved endpoint.
    pub async fn start_only(
        &self,
        serial: &str,
        ip: &str,
        port: u16,
        username: &str,
        password: SecretString,
    ) -> OperationReport {
        let target = target(ip, port, username, password);
        self.single_command(Operation::Start, serial, &target, "ngacs start", START_COMMAND)
            .await
    }

    /// Run an arbitrary command over one scoped session.
    pub async fn exec(&self, serial: &str, target: &SessionTarget, command: &str) -> OperationReport {
        self.single_command(Operation::Exec, serial, target, command, command)
            .await
    }

    async fn single_command(
        &self,
        operation: Operation,
        serial: &str,
        target: &SessionTarget,
        step: &str,
        command: &str,
    ) -> OperationReport {
        let mut report = OperationReport::begin(operation, serial);
        let result = async {
            let mut session = ScopedSession::connect(self.sessions.as_ref(), target).await?;
            report.note(format!("Connected to {serial} ({}:{})", target.host, target.port));
            timed_command(&mut session, &mut report, step, command).await?;
            session.close().await;
            Ok::<(), CoreError>(())
        }
        .await;

        match result {
            Ok(()) => report.succeed(),
            Err(e) => {
                warn!(serial, %operation, error = %e, "operation failed");
                report.fail(None, &e)
            }
        }
    }

    // ── Cloud-only operations ────────────────────────────────────────

    /// Trigger a reboot through the DMP. No resolution or SSH involved.
    pub async fn reboot(&self, serial: &str) -> OperationReport {
        let mut report = OperationReport::begin(Operation::Reboot, serial);
        let result = async {
            let token = self.resolver.token().await?;
            let started = Instant::now();
            let ack = self.resolver.client().reboot(&token, serial).await?;
            report.push_step(
                "reboot request",
                None,
                started.elapsed(),
                format!("HTTP {}", ack.status),
            );
            Ok::<(), CoreError>(())
        }
        .await;

        match result {
            Ok(()) => {
                info!(serial, "reboot triggered");
                report.succeed()
            }
            Err(e) => {
                warn!(serial, error = %e, "reboot failed");
                report.fail(None, &e)
            }
        }
    }

    /// Resolve a device and derive its credential from a non-empty raw MAC.
    ///
    /// Unlike the restart sequence, a short clean MAC is accepted here.
    pub async fn resolve_credential(
        &self,
        serial: &str,
        client_id: &str,
    ) -> Result<ResolvedCredential, CoreError> {
        let endpoint = self.resolver.resolve(serial).await?;
        if endpoint.wan_mac_raw.trim().is_empty() {
            return Err(CoreError::CredentialInvalid {
                raw: endpoint.wan_mac_raw,
                clean: String::new(),
            });
        }

        let clean_mac = CleanMac::from_raw(&endpoint.wan_mac_raw);
        if !clean_mac.is_complete() {
            warn!(serial, clean = %clean_mac, "WAN MAC is not 12 hex characters, password may be wrong");
        }
        let credential = Credential::new(
            self.config.shell.username.clone(),
            derive_password(client_id, clean_mac.as_str()),
        );
        Ok(ResolvedCredential {
            endpoint,
            clean_mac,
            credential,
        })
    }

    /// Scan all telemetry paths and keep whatever was found.
    pub async fn get_info(&self, serial: &str) -> Result<DeviceInfo, CoreError> {
        let started = Instant::now();
        let scan = self.resolver.scan(serial).await?;
        let wan_mac_clean = scan.wan_mac_raw.as_deref().map(CleanMac::from_raw);
        Ok(DeviceInfo {
            scan,
            wan_mac_clean,
            elapsed_ms: millis(started.elapsed()),
        })
    }

    // ── Liveness ─────────────────────────────────────────────────────

    /// ICMP echo first; only when it fails, try opening a shell session.
    pub async fn check_online(
        &self,
        ip: &str,
        port: u16,
        username: &str,
        password: SecretString,
    ) -> OnlineCheckResult {
        let echo = self
            .prober
            .echo(ip, self.config.probe.online_echo_timeout)
            .await;
        debug!(ip, ?echo, "online echo");
        if echo.is_reply() {
            return OnlineCheckResult::online();
        }

        let target = target(ip, port, username, password);
        match ScopedSession::connect(self.sessions.as_ref(), &target).await {
            Ok(session) => {
                session.close().await;
                OnlineCheckResult::online()
            }
            Err(e) => {
                warn!(ip, port, error = %e, "ssh fallback failed");
                OnlineCheckResult::default()
            }
        }
    }

    /// One ICMP echo with the online-check timeout.
    pub async fn ping(&self, ip: &str) -> OperationReport {
        let mut report = OperationReport::begin(Operation::Ping, ip);
        let outcome = self
            .prober
            .echo(ip, self.config.probe.online_echo_timeout)
            .await;

        let reason = match outcome {
            EchoOutcome::Reply(rtt) => {
                report.note(format!(
                    "Ping to {ip} successful. Roundtrip time: {}ms",
                    rtt.as_millis()
                ));
                return report.succeed();
            }
            EchoOutcome::TimedOut => "timed out".to_owned(),
            EchoOutcome::Skipped => "ICMP disabled in configuration".to_owned(),
            EchoOutcome::Failed(msg) => msg,
        };
        report.note(format!("Ping to {ip} failed. Status: {reason}"));
        report.fail_with(
            None,
            ErrorKind::UnreachableEndpoint,
            format!("no echo reply from {ip}: {reason}"),
        )
    }
}

fn target(ip: &str, port: u16, username: &str, password: SecretString) -> SessionTarget {
    SessionTarget {
        host: ip.trim().to_owned(),
        port,
        credential: Credential {
            username: username.to_owned(),
            password,
        },
    }
}

/// Run `command`, recording its duration and output as a report step.
async fn timed_command(
    session: &mut ScopedSession,
    report: &mut OperationReport,
    step: &str,
    command: &str,
) -> Result<(), CoreError> {
    debug!(command, "running remote command");
    let started = Instant::now();
    let output = session.run(command).await?;
    report.push_step(step, Some(command), started.elapsed(), output);
    Ok(())
}
