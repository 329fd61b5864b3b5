//! Device command handlers: restart, reboot, stop/start, check, getinfo, ping, exec.

use std::time::Duration;

use owo_colors::OwoColorize;
use tabled::Tabled;

use cpectl_core::{
    DeviceController, DeviceInfo, OnlineCheckResult, PathOutcome, ResolvedCredential,
    SessionTarget,
};

use crate::cli::{ExecArgs, GlobalOpts, PingArgs, PortArgs, RestartArgs, SerialArgs};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

use super::util;

// ── Row / detail views ──────────────────────────────────────────────

#[derive(Tabled)]
struct PathRow {
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "OK")]
    ok: String,
    #[tabled(rename = "Time (ms)")]
    elapsed_ms: u128,
    #[tabled(rename = "Error")]
    error: String,
}

impl From<&PathOutcome> for PathRow {
    fn from(p: &PathOutcome) -> Self {
        Self {
            path: p.path.clone(),
            ok: if p.ok { "yes" } else { "no" }.into(),
            elapsed_ms: p.elapsed_ms,
            error: p.error.clone().unwrap_or_default(),
        }
    }
}

fn found_after(value: Option<&str>, after: Option<Duration>) -> String {
    match (value, after) {
        (Some(v), Some(after)) => format!("{v}  (found after {} ms)", after.as_millis()),
        (Some(v), None) => v.to_owned(),
        (None, _) => "-".into(),
    }
}

fn info_detail(info: &DeviceInfo, color: bool) -> String {
    let scan = &info.scan;
    let clean = info
        .wan_mac_clean
        .as_ref()
        .map_or_else(|| "-".into(), ToString::to_string);
    let clean = if info.wan_mac_clean.is_some() && !info.mac_complete() {
        let warning = "(not 12 hex characters)";
        if color {
            format!("{clean}  {}", warning.yellow())
        } else {
            format!("{clean}  {warning}")
        }
    } else {
        clean
    };

    let rows: Vec<PathRow> = scan.paths.iter().map(PathRow::from).collect();
    let lines = [
        format!("Serial:           {}", scan.serial),
        format!(
            "Primary IP:       {}",
            found_after(scan.ip.as_deref(), scan.ip_found_after)
        ),
        format!(
            "LAN IP:           {}",
            found_after(scan.lan_ip.as_deref(), scan.lan_ip_found_after)
        ),
        format!(
            "WAN MAC (raw):    {}",
            scan.wan_mac_raw.as_deref().unwrap_or("-")
        ),
        format!("WAN MAC (clean):  {clean}"),
        "Password = ClientID + '!' + CLEAN WAN MAC".into(),
        String::new(),
        output::render_table(&rows),
        format!("⏱️ Total: {} ms", info.elapsed_ms),
    ];
    lines.join("\n")
}

fn online_detail(result: &OnlineCheckResult, color: bool) -> String {
    [
        format!("Success:   {}", output::flag(result.success, color)),
        format!("Online:    {}", output::flag(result.online, color)),
        format!("DMPOnline: {}", output::flag(result.dmp_online, color)),
    ]
    .join("\n")
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn restart(
    controller: &DeviceController,
    resolved: &Resolved,
    args: &RestartArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let client_id = resolved.require_client_id()?;
    let report = controller
        .index_restart(&args.serial, client_id, args.ip.as_deref())
        .await;
    util::finish(&report, global)
}

pub async fn reboot(
    controller: &DeviceController,
    args: &SerialArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if !util::confirm(&format!("Reboot device {}?", args.serial), "reboot", global.yes)? {
        return Ok(());
    }
    let report = controller.reboot(&args.serial).await;
    util::finish(&report, global)
}

/// Restart the management client, then reboot regardless of how the
/// restart went.
pub async fn both(
    controller: &DeviceController,
    resolved: &Resolved,
    args: &RestartArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let client_id = resolved.require_client_id()?;
    if !util::confirm(
        &format!("Restart the management client on {} and reboot it?", args.serial),
        "both",
        global.yes,
    )? {
        return Ok(());
    }

    let restart = controller
        .index_restart(&args.serial, client_id, args.ip.as_deref())
        .await;
    let restart_result = util::finish(&restart, global);

    let reboot = controller.reboot(&args.serial).await;
    util::finish(&reboot, global)?;
    restart_result
}

pub async fn stop(
    controller: &DeviceController,
    resolved: &Resolved,
    args: &PortArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let (device, port) = credential_for(controller, resolved, &args.serial, args.port).await?;
    let ResolvedCredential {
        endpoint,
        credential,
        ..
    } = device;
    let report = controller
        .stop_only(
            &args.serial,
            &endpoint.ip,
            port,
            &credential.username,
            credential.password,
        )
        .await;
    util::finish(&report, global)
}

pub async fn start(
    controller: &DeviceController,
    resolved: &Resolved,
    args: &PortArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let (device, port) = credential_for(controller, resolved, &args.serial, args.port).await?;
    let ResolvedCredential {
        endpoint,
        credential,
        ..
    } = device;
    let report = controller
        .start_only(
            &args.serial,
            &endpoint.ip,
            port,
            &credential.username,
            credential.password,
        )
        .await;
    util::finish(&report, global)
}

pub async fn check(
    controller: &DeviceController,
    resolved: &Resolved,
    args: &PortArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let (device, port) = credential_for(controller, resolved, &args.serial, args.port).await?;
    let ResolvedCredential {
        endpoint,
        credential,
        ..
    } = device;
    let result = controller
        .check_online(
            &endpoint.ip,
            port,
            &credential.username,
            credential.password,
        )
        .await;

    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &result,
        |r| online_detail(r, color),
        |r| r.online.to_string(),
    );
    if result.online {
        output::print_output(&out, global.quiet);
        Ok(())
    } else {
        output::print_output(&out, false);
        Err(CliError::OperationFailed {
            operation: "Online check".into(),
            target: args.serial.clone(),
        })
    }
}

pub async fn getinfo(
    controller: &DeviceController,
    resolved: &Resolved,
    args: &SerialArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let info = controller
        .get_info(&args.serial)
        .await
        .map_err(|e| util::core_error(e, resolved))?;

    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &info,
        |i| info_detail(i, color),
        |i| i.scan.ip.clone().unwrap_or_default(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn ping(
    controller: &DeviceController,
    args: &PingArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let report = controller.ping(&args.ip).await;
    util::finish(&report, global)
}

pub async fn exec(
    controller: &DeviceController,
    resolved: &Resolved,
    args: &ExecArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let (device, port) = credential_for(controller, resolved, &args.serial, args.port).await?;
    let ResolvedCredential {
        endpoint,
        credential,
        ..
    } = device;
    let target = SessionTarget {
        host: endpoint.ip,
        port,
        credential,
    };
    let command = args.command.join(" ");
    let report = controller.exec(&args.serial, &target, &command).await;
    util::finish(&report, global)
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Resolve the device credential and the SSH port to use with it.
async fn credential_for(
    controller: &DeviceController,
    resolved: &Resolved,
    serial: &str,
    port: Option<u16>,
) -> Result<(ResolvedCredential, u16), CliError> {
    let client_id = resolved.require_client_id()?;
    let credential = controller
        .resolve_credential(serial, client_id)
        .await
        .map_err(|e| util::core_error(e, resolved))?;
    let port = port.unwrap_or(controller.config().probe.primary_port);
    Ok((credential, port))
}
