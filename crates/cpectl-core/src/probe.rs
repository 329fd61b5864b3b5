// ── Reachability probing ──
//
// Picks the first device port that accepts a TCP connection. Each port
// attempt is preceded by an ICMP echo that is advisory only: its outcome
// is logged and discarded, never consulted for the decision.

use std::net::IpAddr;
use std::time::Duration;

use serde::Serialize;
use tokio::net::TcpStream;
use tracing::debug;

use crate::config::ProbeConfig;

/// Outcome of [`Prober::probe`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReachabilityResult {
    pub reachable: bool,
    pub ip: String,
    /// The answering port, or the primary port when nothing answered.
    pub port: u16,
}

/// Snapshot returned by online checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OnlineCheckResult {
    pub success: bool,
    pub online: bool,
    pub dmp_online: bool,
}

impl OnlineCheckResult {
    pub fn online() -> Self {
        Self {
            success: true,
            online: true,
            dmp_online: true,
        }
    }
}

/// Result of one ICMP echo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EchoOutcome {
    Reply(Duration),
    TimedOut,
    Failed(String),
    /// ICMP disabled by configuration.
    Skipped,
}

impl EchoOutcome {
    pub fn is_reply(&self) -> bool {
        matches!(self, Self::Reply(_))
    }
}

/// Reachability prober over the configured primary/fallback ports.
#[derive(Debug, Clone, Default)]
pub struct Prober {
    config: ProbeConfig,
}

impl Prober {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Candidate ports in probing order.
    pub fn ports(&self) -> [u16; 2] {
        [self.config.primary_port, self.config.fallback_port]
    }

    /// Try the primary port, then the fallback; first TCP success wins.
    pub async fn probe(&self, ip: &str) -> ReachabilityResult {
        for port in self.ports() {
            if self.is_reachable(ip, port).await {
                debug!(ip, port, "endpoint reachable");
                return ReachabilityResult {
                    reachable: true,
                    ip: ip.to_owned(),
                    port,
                };
            }
        }

        debug!(ip, ports = ?self.ports(), "no candidate port answered");
        ReachabilityResult {
            reachable: false,
            ip: ip.to_owned(),
            port: self.config.primary_port,
        }
    }

    async fn is_reachable(&self, ip: &str, port: u16) -> bool {
        // Liveness hint only; the TCP connect below decides.
        let hint = self.echo(ip, self.config.echo_timeout).await;
        debug!(ip, port, ?hint, "advisory echo");

        is_tcp_open(ip, port, self.config.connect_timeout).await
    }

    /// Send one ICMP echo, unless ICMP is disabled.
    pub async fn echo(&self, ip: &str, timeout: Duration) -> EchoOutcome {
        if !self.config.icmp {
            return EchoOutcome::Skipped;
        }
        let Ok(addr) = ip.trim().parse::<IpAddr>() else {
            return EchoOutcome::Failed(format!("'{ip}' is not an IP address"));
        };
        icmp_echo(addr, timeout).await
    }
}

/// `true` if a TCP connection to `host:port` completes within `timeout`.
///
/// A timed-out attempt is dropped; nothing else observes it.
pub async fn is_tcp_open(host: &str, port: u16, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_stream)) => true,
        Ok(Err(e)) => {
            debug!(host, port, error = %e, "tcp connect failed");
            false
        }
        Err(_) => {
            debug!(host, port, ?timeout, "tcp connect timed out");
            false
        }
    }
}

async fn icmp_echo(addr: IpAddr, timeout: Duration) -> EchoOutcome {
    let pinger = match tokio_icmp_echo::Pinger::new().await {
        Ok(pinger) => pinger,
        Err(e) => return EchoOutcome::Failed(format!("cannot open ICMP socket: {e:?}")),
    };

    let ident = u16::try_from(std::process::id() & 0xffff).unwrap_or_default();
    match pinger.ping(addr, ident, 0, timeout).await {
        Ok(Some(rtt)) => EchoOutcome::Reply(rtt),
        Ok(None) => EchoOutcome::TimedOut,
        Err(e) => EchoOutcome::Failed(format!("{e:?}")),
    }
}
