//! Command dispatch: bridges CLI args -> controller operations -> output formatting.

pub mod config_cmd;
pub mod device;
pub mod util;

use cpectl_core::DeviceController;

use crate::cli::{Command, GlobalOpts};
use crate::config::Resolved;
use crate::error::CliError;

/// Dispatch a device-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    controller: &DeviceController,
    resolved: &Resolved,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Restart(args) => device::restart(controller, resolved, &args, global).await,
        Command::Reboot(args) => device::reboot(controller, &args, global).await,
        Command::Both(args) => device::both(controller, resolved, &args, global).await,
        Command::Stop(args) => device::stop(controller, resolved, &args, global).await,
        Command::Start(args) => device::start(controller, resolved, &args, global).await,
        Command::Check(args) => device::check(controller, resolved, &args, global).await,
        Command::Getinfo(args) => device::getinfo(controller, resolved, &args, global).await,
        Command::Ping(args) => device::ping(controller, &args, global).await,
        Command::Exec(args) => device::exec(controller, resolved, &args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
