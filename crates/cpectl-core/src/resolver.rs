// ── Device directory resolution ──
//
// Turns a serial number into an IP + WAN MAC by walking a fixed list of
// telemetry paths on the DMP. Each field is first-found-wins across paths;
// a failed path is logged and skipped, never fatal on its own.

use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use cpectl_api::{BearerToken, DmpClient, Identity};

use crate::error::CoreError;
use crate::extract::{IpScope, find_ipv4_address, find_ipv4_in, find_mac_address};

/// Telemetry selectors, in query order.
pub const TELEMETRY_PATHS: [&str; 4] = [
    "+Status.Network",
    "+Status.Network.EthernetWAN",
    "+Status.Network.Mobile",
    "+Status.Network.LAN",
];

/// Candidate network identity of a device. Recomputed on every lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceEndpoint {
    pub ip: String,
    pub wan_mac_raw: String,
}

/// Outcome of querying one telemetry path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathOutcome {
    pub path: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u128,
}

/// Diagnostic scan of all telemetry paths, keeping partial results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceScan {
    pub serial: String,
    /// Address picked by the resolution policy (EthernetWAN, Mobile, LAN, anywhere).
    pub ip: Option<String>,
    /// LAN-side address, when the device reports one.
    pub lan_ip: Option<String>,
    pub wan_mac_raw: Option<String>,
    #[serde(skip)]
    pub ip_found_after: Option<Duration>,
    #[serde(skip)]
    pub lan_ip_found_after: Option<Duration>,
    pub paths: Vec<PathOutcome>,
}

impl DeviceScan {
    /// The all-or-nothing endpoint, if both fields were found.
    pub fn endpoint(&self) -> Option<DeviceEndpoint> {
        Some(DeviceEndpoint {
            ip: self.ip.clone()?,
            wan_mac_raw: self.wan_mac_raw.clone()?,
        })
    }
}

#[derive(Debug, Default)]
struct Discovery {
    ip: Option<String>,
    wan_mac: Option<String>,
}

impl Discovery {
    fn merge(&mut self, tree: &Value) {
        if self.ip.is_none() {
            self.ip = find_ipv4_address(tree);
        }
        if self.wan_mac.is_none() {
            self.wan_mac = find_mac_address(tree);
        }
    }

    fn is_complete(&self) -> bool {
        self.ip.is_some() && self.wan_mac.is_some()
    }
}

/// Names the fields a failed resolution is missing.
fn missing_fields(ip: Option<&String>, wan_mac: Option<&String>) -> String {
    match (ip.is_none(), wan_mac.is_none()) {
        (true, true) => "IP/WAN MAC",
        (true, false) => "IP",
        (false, true) => "WAN MAC",
        (false, false) => "nothing",
    }
    .into()
}

/// Resolves serial numbers through the DMP telemetry API.
#[derive(Debug, Clone)]
pub struct DeviceResolver {
    client: DmpClient,
    identity: Identity,
}

impl DeviceResolver {
    pub fn new(client: DmpClient, identity: Identity) -> Self {
        Self { client, identity }
    }

    pub fn client(&self) -> &DmpClient {
        &self.client
    }

    /// Log in with the service identity. Tokens are never reused across calls.
    pub async fn token(&self) -> Result<BearerToken, CoreError> {
        self.client
            .login(&self.identity)
            .await
            .map_err(|e| CoreError::AuthFailure {
                message: e.to_string(),
            })
    }

    /// Resolve `serial` to an IP and raw WAN MAC, all-or-nothing.
    pub async fn resolve(&self, serial: &str) -> Result<DeviceEndpoint, CoreError> {
        let token = self.token().await?;
        let mut found = Discovery::default();

        for path in TELEMETRY_PATHS {
            let Ok(tree) = self.query(&token, serial, path).await else {
                continue;
            };
            found.merge(&tree);
            if found.is_complete() {
                debug!(serial, path, "device identity complete");
                break;
            }
        }

        match found {
            Discovery {
                ip: Some(ip),
                wan_mac: Some(wan_mac_raw),
            } => {
                info!(serial, %ip, wan_mac = %wan_mac_raw, "resolved device");
                Ok(DeviceEndpoint { ip, wan_mac_raw })
            }
            Discovery { ip, wan_mac } => {
                warn!(
                    serial,
                    ip = ip.as_deref().unwrap_or(""),
                    wan_mac = wan_mac.as_deref().unwrap_or(""),
                    "could not extract IP/WAN MAC from DMP data"
                );
                Err(CoreError::ResolutionFailure {
                    serial: serial.to_owned(),
                    missing: missing_fields(ip.as_ref(), wan_mac.as_ref()),
                    ip,
                    wan_mac,
                })
            }
        }
    }

    /// Query every path (until all fields are known) and keep partials.
    pub async fn scan(&self, serial: &str) -> Result<DeviceScan, CoreError> {
        let started = Instant::now();
        let token = self.token().await?;
        let mut scan = DeviceScan {
            serial: serial.to_owned(),
            ..DeviceScan::default()
        };

        for path in TELEMETRY_PATHS {
            let path_started = Instant::now();
            let result = self.query(&token, serial, path).await;
            scan.paths.push(PathOutcome {
                path: path.to_owned(),
                ok: result.is_ok(),
                error: result.as_ref().err().map(ToString::to_string),
                elapsed_ms: path_started.elapsed().as_millis(),
            });
            let Ok(tree) = result else {
                continue;
            };

            if scan.ip.is_none() {
                scan.ip = find_ipv4_address(&tree);
                if scan.ip.is_some() {
                    scan.ip_found_after = Some(started.elapsed());
                }
            }
            if scan.lan_ip.is_none() {
                scan.lan_ip = find_ipv4_in(&tree, IpScope::Lan);
                if scan.lan_ip.is_some() {
                    scan.lan_ip_found_after = Some(started.elapsed());
                }
            }
            if scan.wan_mac_raw.is_none() {
                scan.wan_mac_raw = find_mac_address(&tree);
            }

            if scan.ip.is_some() && scan.lan_ip.is_some() && scan.wan_mac_raw.is_some() {
                break;
            }
        }

        Ok(scan)
    }

    async fn query(&self, token: &BearerToken, serial: &str, path: &str) -> Result<Value, CoreError> {
        self.client
            .query_parameter(token, serial, path)
            .await
            .map_err(|e| {
                warn!(serial, path, error = %e, "telemetry path failed, trying next");
                CoreError::from(e)
            })
    }
}
