//! Configuration for cpectl.
//!
//! TOML profiles, DMP password resolution (env + keyring + plaintext),
//! and translation to `cpectl_core::ServiceConfig`. The CLI layers its
//! `GlobalOpts` overrides on top of this.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use cpectl_core::config::{DmpConfig, FALLBACK_SSH_PORT, PRIMARY_SSH_PORT};
use cpectl_core::credential::DEFAULT_USERNAME;
use cpectl_core::{Identity, ProbeConfig, ServiceConfig, ShellConfig, TlsVerification};

/// Keyring service name for stored DMP passwords.
pub const KEYRING_SERVICE: &str = "cpectl";

/// Default DMP API root.
pub const DEFAULT_API_URL: &str = "https://api.dataremote.com";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no DMP credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found (available: {available})")]
    ProfileNotFound { name: String, available: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named DMP profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Name of the profile to use when none is given explicitly.
    pub fn active_profile_name(&self) -> String {
        self.default_profile
            .clone()
            .unwrap_or_else(|| "default".into())
    }

    /// Look up a named profile; the error lists the names that do exist.
    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles.get(name).ok_or_else(|| {
            let mut available: Vec<_> = self.profiles.keys().cloned().collect();
            available.sort();
            ConfigError::ProfileNotFound {
                name: name.into(),
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            }
        })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default)]
    pub insecure: bool,

    /// DMP request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            insecure: false,
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    90
}

/// A named DMP profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// DMP API root.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Service account email for `/auth/login`.
    pub email: Option<String>,

    /// Service account password (plaintext, prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Client identifier used to derive device passwords.
    pub client_id: Option<String>,

    #[serde(default = "default_ssh_username")]
    pub ssh_username: String,

    #[serde(default = "default_primary_port")]
    pub primary_port: u16,

    #[serde(default = "default_fallback_port")]
    pub fallback_port: u16,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,

    /// Send ICMP echoes (needs raw-socket privileges).
    #[serde(default = "default_icmp")]
    pub icmp: bool,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            email: None,
            password: None,
            password_env: None,
            client_id: None,
            ssh_username: default_ssh_username(),
            primary_port: default_primary_port(),
            fallback_port: default_fallback_port(),
            ca_cert: None,
            insecure: None,
            timeout: None,
            icmp: default_icmp(),
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.into()
}
fn default_ssh_username() -> String {
    DEFAULT_USERNAME.into()
}
fn default_primary_port() -> u16 {
    PRIMARY_SSH_PORT
}
fn default_fallback_port() -> u16 {
    FALLBACK_SSH_PORT
}
fn default_icmp() -> bool {
    true
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "cpectl", "cpectl").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("cpectl");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("CPECTL_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

/// Keyring entry holding a profile's DMP password.
pub fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/password"))
}

/// Resolve the DMP password from the credential chain.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env → env var lookup
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. Well-known env var
    if let Ok(val) = std::env::var("CPECTL_PASSWORD") {
        return Ok(SecretString::from(val));
    }

    // 3. System keyring
    if let Ok(entry) = keyring_entry(profile_name) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 4. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Resolve the DMP service identity (email + password).
pub fn resolve_identity(profile: &Profile, profile_name: &str) -> Result<Identity, ConfigError> {
    let email = profile
        .email
        .clone()
        .or_else(|| std::env::var("CPECTL_EMAIL").ok())
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })?;
    let password = resolve_password(profile, profile_name)?;
    Ok(Identity { email, password })
}

/// Client identifier from the profile or `CPECTL_CLIENT_ID`.
pub fn resolve_client_id(profile: &Profile) -> Option<String> {
    profile
        .client_id
        .clone()
        .or_else(|| std::env::var("CPECTL_CLIENT_ID").ok())
        .filter(|c| !c.trim().is_empty())
}

/// TLS strategy for a profile, with an optional insecure override.
pub fn tls_for(profile: &Profile, insecure: bool) -> TlsVerification {
    if insecure || profile.insecure.unwrap_or(false) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    }
}

/// Parse and validate the profile's API URL.
pub fn api_url(profile: &Profile) -> Result<url::Url, ConfigError> {
    profile
        .api_url
        .parse()
        .map_err(|_| ConfigError::Validation {
            field: "api_url".into(),
            reason: format!("invalid URL: {}", profile.api_url),
        })
}

/// Build a `ServiceConfig` from a profile with an already-resolved identity.
pub fn profile_to_service_config_with(
    profile: &Profile,
    identity: Identity,
) -> Result<ServiceConfig, ConfigError> {
    if profile.primary_port == 0 || profile.fallback_port == 0 {
        return Err(ConfigError::Validation {
            field: "primary_port/fallback_port".into(),
            reason: "ports must be non-zero".into(),
        });
    }

    Ok(ServiceConfig {
        dmp: DmpConfig {
            base_url: api_url(profile)?,
            identity,
            tls: tls_for(profile, false),
            timeout: Duration::from_secs(profile.timeout.unwrap_or_else(default_timeout)),
        },
        probe: ProbeConfig {
            primary_port: profile.primary_port,
            fallback_port: profile.fallback_port,
            icmp: profile.icmp,
            ..ProbeConfig::default()
        },
        shell: ShellConfig {
            username: profile.ssh_username.clone(),
            ..ShellConfig::default()
        },
    })
}
