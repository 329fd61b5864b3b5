//! Clap derive structures for the `cpectl` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// cpectl -- diagnose and control DMP-managed CPE devices
#[derive(Debug, Parser)]
#[command(
    name = "cpectl",
    version,
    about = "Diagnose and control DMP-managed CPE devices",
    long_about = "Resolve a device by serial number through the DMP cloud API, derive its\n\
        SSH credentials from the WAN MAC, and restart its management client,\n\
        reboot it, or check whether it is online.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Configuration profile to use
    #[arg(long, short = 'p', env = "CPECTL_PROFILE", global = true)]
    pub profile: Option<String>,

    /// DMP API URL (overrides profile)
    #[arg(long, env = "CPECTL_API_URL", global = true)]
    pub api_url: Option<String>,

    /// DMP service account email (overrides profile)
    #[arg(long, env = "CPECTL_EMAIL", global = true)]
    pub email: Option<String>,

    /// Client identifier used to derive device passwords
    #[arg(long, env = "CPECTL_CLIENT_ID", global = true)]
    pub client_id: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "CPECTL_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept invalid TLS certificates from the DMP
    #[arg(long, short = 'k', env = "CPECTL_INSECURE", global = true)]
    pub insecure: bool,

    /// DMP request timeout in seconds
    #[arg(long, env = "CPECTL_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable report (default)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Restart the ngacs management client over SSH (stop, start, status)
    #[command(alias = "index-restart")]
    Restart(RestartArgs),

    /// Reboot the device through the DMP API
    Reboot(SerialArgs),

    /// Restart the management client, then reboot the device
    Both(RestartArgs),

    /// Stop the ngacs management client over SSH
    Stop(PortArgs),

    /// Start the ngacs management client over SSH
    Start(PortArgs),

    /// Check whether the device is online (ICMP, then SSH)
    Check(PortArgs),

    /// Show the IP and WAN MAC the DMP reports for a device
    #[command(alias = "info")]
    Getinfo(SerialArgs),

    /// Send one ICMP echo to an address
    Ping(PingArgs),

    /// Run an arbitrary command on the device over SSH
    Exec(ExecArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Device Arguments ─────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SerialArgs {
    /// Device serial number
    pub serial: String,
}

#[derive(Debug, Args)]
pub struct RestartArgs {
    /// Device serial number
    pub serial: String,

    /// Connect to this IP instead of the one reported by the DMP
    #[arg(long)]
    pub ip: Option<String>,
}

#[derive(Debug, Args)]
pub struct PortArgs {
    /// Device serial number
    pub serial: String,

    /// SSH port (defaults to the profile's primary port)
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Debug, Args)]
pub struct PingArgs {
    /// IPv4 or IPv6 address
    pub ip: String,
}

#[derive(Debug, Args)]
pub struct ExecArgs {
    /// Device serial number
    pub serial: String,

    /// SSH port (defaults to the profile's primary port)
    #[arg(long)]
    pub port: Option<u16>,

    /// Command to run, after `--`
    #[arg(last = true, required = true, num_args = 1..)]
    pub command: Vec<String>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current configuration (secrets masked)
    Show,

    /// Store the DMP password in the system keyring
    SetPassword {
        /// Profile name
        #[arg(long)]
        profile: Option<String>,
    },

    /// Print the config file path
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
