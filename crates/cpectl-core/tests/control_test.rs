#![allow(clippy::unwrap_used)]
// Integration tests for `DeviceController`: wiremock for the DMP, an
// in-memory session factory for the device shell, local listeners for
// device ports.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cpectl_core::control::{START_COMMAND, STATUS_COMMAND, STOP_COMMAND};
use cpectl_core::{
    DeviceController, DeviceEndpoint, DmpClient, ErrorKind, OnlineCheckResult, ProbeConfig,
    ServiceConfig, SessionFactory, SessionTarget, ShellError, ShellSession,
};
use secrecy::{ExposeSecret, SecretString};

// ── Fake shell ──────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Clone, Default)]
struct Behaviour {
    refuse_connect: bool,
    drop_after: Option<&'static str>,
    fail_command: Option<&'static str>,
}

struct FakeFactory {
    recorder: Recorder,
    behaviour: Behaviour,
}

impl SessionFactory for FakeFactory {
    fn open(&self, target: &SessionTarget) -> Box<dyn ShellSession> {
        self.recorder.push(format!(
            "open {}:{} {} {}",
            target.host,
            target.port,
            target.credential.username,
            target.credential.password.expose_secret()
        ));
        Box::new(FakeSession {
            recorder: self.recorder.clone(),
            behaviour: self.behaviour.clone(),
            connected: false,
        })
    }
}

struct FakeSession {
    recorder: Recorder,
    behaviour: Behaviour,
    connected: bool,
}

impl ShellSession for FakeSession {
    fn connect(&mut self) -> Result<(), ShellError> {
        self.recorder.push("connect");
        if self.behaviour.refuse_connect {
            return Err(ShellError::Auth("superadmin".into()));
        }
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.connected {
            self.recorder.push("disconnect");
        }
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn run_command(&mut self, command: &str) -> Result<String, ShellError> {
        self.recorder.push(format!("run {command}"));
        if self.behaviour.fail_command == Some(command) {
            return Err(ShellError::Command("channel closed".into()));
        }
        if self.behaviour.drop_after == Some(command) {
            self.connected = false;
        }
        Ok(format!("{command}: ok\n"))
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

struct Harness {
    server: MockServer,
    controller: DeviceController,
    recorder: Recorder,
}

async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

async fn harness(primary_port: u16, behaviour: Behaviour) -> Harness {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = DmpClient::with_client(reqwest::Client::new(), base_url);
    let recorder = Recorder::default();
    let factory = Arc::new(FakeFactory {
        recorder: recorder.clone(),
        behaviour,
    });

    let config = ServiceConfig {
        probe: ProbeConfig {
            primary_port,
            fallback_port: closed_port().await,
            connect_timeout: Duration::from_millis(500),
            icmp: false,
            ..ProbeConfig::default()
        },
        ..ServiceConfig::default()
    };

    Harness {
        server,
        controller: DeviceController::with_parts(client, factory, config),
        recorder,
    }
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "authorization_token": "tok-1" })),
        )
        .mount(server)
        .await;
}

async fn mount_network(server: &MockServer, serial: &str, body: Value) {
    let selector = json!({ "data": { "path": "+Status.Network" } }).to_string();
    Mock::given(method("GET"))
        .and(path(format!("/ngacs/cpe/{serial}/parameter")))
        .and(query_param("data", selector))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn local_device() -> Value {
    json!({ "EthernetWAN": { "IPv4Address": "127.0.0.1", "MACAddress": "aa:bb:cc:dd:ee:ff" } })
}

// ── Index restart ───────────────────────────────────────────────────

#[tokio::test]
async fn restart_runs_stop_start_status_and_releases_session() {
    let device = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = device.local_addr().unwrap().port();
    let h = harness(port, Behaviour::default()).await;
    mount_login(&h.server).await;
    mount_network(&h.server, "SN123", local_device()).await;

    let report = h.controller.index_restart("SN123", "client1", None).await;

    assert!(report.success, "{report}");
    assert_eq!(
        h.recorder.events(),
        vec![
            format!("open 127.0.0.1:{port} superadmin client1!AABBCCDDEEFF"),
            "connect".to_owned(),
            format!("run {STOP_COMMAND}"),
            format!("run {START_COMMAND}"),
            format!("run {STATUS_COMMAND}"),
            "disconnect".to_owned(),
        ]
    );
    let steps: Vec<&str> = report.steps.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(steps, vec!["ngacs stop", "ngacs start", "ngacs status (via ps)"]);
    assert!(report.to_string().contains("Using WAN MAC (clean): AABBCCDDEEFF"));
}

#[tokio::test]
async fn restart_with_short_mac_fails_before_any_connection() {
    let h = harness(closed_port().await, Behaviour::default()).await;
    let endpoint = DeviceEndpoint {
        ip: "127.0.0.1".into(),
        wan_mac_raw: "aa:bb:cc:dd".into(),
    };

    let report = h
        .controller
        .index_restart_endpoint("SN5", "client1", endpoint, None)
        .await;

    let failure = report.failure.unwrap();
    assert_eq!(failure.stage.as_deref(), Some("validate_credential"));
    assert_eq!(failure.kind, ErrorKind::CredentialInvalid);
    assert!(failure.message.contains("Got: 'aa:bb:cc:dd'"));
    assert!(h.recorder.events().is_empty());
}

#[tokio::test]
async fn restart_reports_unreachable_endpoint_with_both_ports() {
    let primary = closed_port().await;
    let h = harness(primary, Behaviour::default()).await;
    mount_login(&h.server).await;
    mount_network(&h.server, "SN6", local_device()).await;

    let report = h.controller.index_restart("SN6", "client1", None).await;

    let failure = report.failure.unwrap();
    assert_eq!(failure.stage.as_deref(), Some("select_endpoint"));
    assert_eq!(failure.kind, ErrorKind::UnreachableEndpoint);
    assert!(failure.message.contains(&format!("Tried ports: {primary}, ")));
    assert!(h.recorder.events().is_empty());
}

#[tokio::test]
async fn restart_ip_override_replaces_resolved_address() {
    let device = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = device.local_addr().unwrap().port();
    let h = harness(port, Behaviour::default()).await;
    mount_login(&h.server).await;
    mount_network(
        &h.server,
        "SN7",
        json!({ "Mobile": { "IPv4Address": "100.64.9.9" }, "MACAddress": "00:11:22:33:44:55" }),
    )
    .await;

    let report = h
        .controller
        .index_restart("SN7", "client1", Some("127.0.0.1"))
        .await;

    assert!(report.success, "{report}");
    assert_eq!(
        h.recorder.events().first().map(String::as_str),
        Some(format!("open 127.0.0.1:{port} superadmin client1!001122334455").as_str())
    );
}

#[tokio::test]
async fn restart_skips_start_when_session_dropped() {
    let device = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = device.local_addr().unwrap().port();
    let h = harness(
        port,
        Behaviour {
            drop_after: Some(STOP_COMMAND),
            ..Behaviour::default()
        },
    )
    .await;
    mount_login(&h.server).await;
    mount_network(&h.server, "SN8", local_device()).await;

    let report = h.controller.index_restart("SN8", "client1", None).await;

    assert!(!report.success);
    assert_eq!(report.failure.as_ref().unwrap().stage.as_deref(), Some("start"));
    assert_eq!(report.steps.len(), 1);
    assert!(report.step("ngacs stop").is_some());
    assert!(!h.recorder.events().contains(&format!("run {START_COMMAND}")));
}

#[tokio::test]
async fn restart_status_failure_is_informational() {
    let device = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = device.local_addr().unwrap().port();
    let h = harness(
        port,
        Behaviour {
            fail_command: Some(STATUS_COMMAND),
            ..Behaviour::default()
        },
    )
    .await;
    mount_login(&h.server).await;
    mount_network(&h.server, "SN9", local_device()).await;

    let report = h.controller.index_restart("SN9", "client1", None).await;

    assert!(report.success, "{report}");
    assert_eq!(report.steps.len(), 2);
    assert!(report.notes.iter().any(|n| n.starts_with("Status check skipped")));
    assert_eq!(h.recorder.events().last().map(String::as_str), Some("disconnect"));
}

#[tokio::test]
async fn restart_stop_failure_releases_session() {
    let device = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = device.local_addr().unwrap().port();
    let h = harness(
        port,
        Behaviour {
            fail_command: Some(STOP_COMMAND),
            ..Behaviour::default()
        },
    )
    .await;
    mount_login(&h.server).await;
    mount_network(&h.server, "SN10", local_device()).await;

    let report = h.controller.index_restart("SN10", "client1", None).await;

    assert!(!report.success);
    let failure = report.failure.as_ref().unwrap();
    assert_eq!(failure.stage.as_deref(), Some("stop"));
    assert_eq!(failure.kind, ErrorKind::RemoteCommandFailure);
    assert!(report.steps.is_empty());
    let events = h.recorder.events();
    assert!(!events.contains(&format!("run {START_COMMAND}")));
    assert_eq!(
        events[1..],
        [
            "connect".to_owned(),
            format!("run {STOP_COMMAND}"),
            "disconnect".to_owned(),
        ]
    );
}

#[tokio::test]
async fn restart_resolution_failure_names_missing_field() {
    let h = harness(closed_port().await, Behaviour::default()).await;
    mount_login(&h.server).await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Status": {} })))
        .expect(4)
        .mount(&h.server)
        .await;

    let report = h.controller.index_restart("SN10", "client1", None).await;

    let failure = report.failure.unwrap();
    assert_eq!(failure.stage.as_deref(), Some("resolve"));
    assert!(failure.message.contains("(IP/WAN MAC not found)"));
}

// ── Single-command operations ───────────────────────────────────────

#[tokio::test]
async fn stop_only_uses_given_credentials() {
    let h = harness(closed_port().await, Behaviour::default()).await;

    let report = h
        .controller
        .stop_only(
            "SN11",
            "10.9.8.7",
            22,
            "superadmin",
            SecretString::from("client1!AABBCC".to_owned()),
        )
        .await;

    assert!(report.success, "{report}");
    assert_eq!(
        h.recorder.events(),
        vec![
            "open 10.9.8.7:22 superadmin client1!AABBCC".to_owned(),
            "connect".to_owned(),
            format!("run {STOP_COMMAND}"),
            "disconnect".to_owned(),
        ]
    );
    assert!(report.to_string().contains("Connected to SN11 (10.9.8.7:22)"));
}

#[tokio::test]
async fn start_only_reports_session_failure() {
    let h = harness(
        closed_port().await,
        Behaviour {
            refuse_connect: true,
            ..Behaviour::default()
        },
    )
    .await;

    let report = h
        .controller
        .start_only("SN12", "10.9.8.7", 8822, "superadmin", SecretString::from("x".to_owned()))
        .await;

    assert!(!report.success);
    assert_eq!(report.failure.unwrap().kind, ErrorKind::SessionFailure);
    assert!(!h.recorder.events().iter().any(|e| e.starts_with("run ")));
}

#[tokio::test]
async fn exec_returns_command_output() {
    let h = harness(closed_port().await, Behaviour::default()).await;
    let target = SessionTarget {
        host: "10.0.0.1".into(),
        port: 22,
        credential: cpectl_core::Credential::new("superadmin", "pw"),
    };

    let report = h.controller.exec("SN13", &target, "uptime").await;

    assert!(report.success);
    assert_eq!(report.step("uptime").unwrap().output, "uptime: ok\n");
}

// ── Online check ────────────────────────────────────────────────────

#[tokio::test]
async fn check_online_falls_back_to_ssh() {
    let h = harness(closed_port().await, Behaviour::default()).await;

    let result = h
        .controller
        .check_online("10.0.0.2", 8822, "superadmin", SecretString::from("pw".to_owned()))
        .await;

    assert_eq!(result, OnlineCheckResult::online());
    assert_eq!(h.recorder.events().last().map(String::as_str), Some("disconnect"));
}

#[tokio::test]
async fn check_online_reports_offline_when_ssh_fails() {
    let h = harness(
        closed_port().await,
        Behaviour {
            refuse_connect: true,
            ..Behaviour::default()
        },
    )
    .await;

    let result = h
        .controller
        .check_online("10.0.0.2", 8822, "superadmin", SecretString::from("pw".to_owned()))
        .await;

    assert_eq!(result, OnlineCheckResult::default());
}

#[tokio::test]
async fn ping_fails_when_icmp_disabled() {
    let h = harness(closed_port().await, Behaviour::default()).await;

    let report = h.controller.ping("10.0.0.3").await;

    assert!(!report.success);
    assert!(report.to_string().contains("ICMP disabled"));
}

// ── Cloud operations ────────────────────────────────────────────────

#[tokio::test]
async fn reboot_posts_once_without_resolution() {
    let h = harness(closed_port().await, Behaviour::default()).await;
    mount_login(&h.server).await;
    Mock::given(method("POST"))
        .and(path("/ngacs/cpe/SN14/reboot"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    let report = h.controller.reboot("SN14").await;

    assert!(report.success, "{report}");
    assert_eq!(report.step("reboot request").unwrap().output, "HTTP 202");
    assert!(h.recorder.events().is_empty());
}

#[tokio::test]
async fn reboot_failure_is_reported_not_raised() {
    let h = harness(closed_port().await, Behaviour::default()).await;
    mount_login(&h.server).await;
    Mock::given(method("POST"))
        .and(path("/ngacs/cpe/SN15/reboot"))
        .respond_with(ResponseTemplate::new(404).set_body_string("unknown device"))
        .mount(&h.server)
        .await;

    let report = h.controller.reboot("SN15").await;

    let failure = report.failure.unwrap();
    assert_eq!(failure.kind, ErrorKind::Api);
    assert!(failure.message.contains("unknown device"));
}

#[tokio::test]
async fn resolve_credential_end_to_end() {
    let h = harness(closed_port().await, Behaviour::default()).await;
    mount_login(&h.server).await;
    mount_network(
        &h.server,
        "SN123",
        json!({ "EthernetWAN": { "IPv4Address": "10.0.0.5", "MACAddress": "aa:bb:cc:dd:ee:ff" } }),
    )
    .await;

    let resolved = h.controller.resolve_credential("SN123", "client1").await.unwrap();

    assert_eq!(resolved.endpoint.ip, "10.0.0.5");
    assert_eq!(resolved.endpoint.wan_mac_raw, "aa:bb:cc:dd:ee:ff");
    assert_eq!(resolved.clean_mac.as_str(), "AABBCCDDEEFF");
    assert_eq!(
        resolved.credential.password.expose_secret(),
        "client1!AABBCCDDEEFF"
    );
}

#[tokio::test]
async fn get_info_reports_clean_mac_and_partials() {
    let h = harness(closed_port().await, Behaviour::default()).await;
    mount_login(&h.server).await;
    mount_network(
        &h.server,
        "SN16",
        json!({ "EthernetWAN": { "MACAddress": "AA-BB-CC-DD-EE-01" } }),
    )
    .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&h.server)
        .await;

    let info = h.controller.get_info("SN16").await.unwrap();

    assert_eq!(info.scan.ip, None);
    assert_eq!(info.wan_mac_clean.as_ref().map(|m| m.as_str()), Some("AABBCCDDEE01"));
    assert!(info.mac_complete());
    assert_eq!(info.scan.paths.len(), 4);
}
