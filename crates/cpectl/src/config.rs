//! CLI configuration — thin wrapper around `cpectl_config` shared types.
//!
//! Re-exports the shared types and adds CLI-specific resolution that
//! respects `GlobalOpts` flag overrides (--api-url, --email, etc.).

use cpectl_core::ServiceConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use cpectl_config::{
    Config, Defaults, Profile, config_path, keyring_entry, load_config_or_default, save_config,
};

/// Everything a device command needs besides the controller.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub profile_name: String,
    pub client_id: Option<String>,
    pub timeout_secs: u64,
    pub service: ServiceConfig,
}

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .unwrap_or_else(|| config.active_profile_name())
}

/// Apply flag overrides on top of a profile.
///
/// Flags take priority over profile values; clap already folds the
/// matching `CPECTL_*` env vars into the flags.
pub fn apply_overrides(profile: &mut Profile, global: &GlobalOpts) {
    if let Some(ref url) = global.api_url {
        profile.api_url.clone_from(url);
    }
    if global.email.is_some() {
        profile.email.clone_from(&global.email);
    }
    if global.client_id.is_some() {
        profile.client_id.clone_from(&global.client_id);
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if global.timeout.is_some() {
        profile.timeout = global.timeout;
    }
}

/// Build the `ServiceConfig` for a device command from the config file,
/// profile, and CLI overrides.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let mut profile = match cfg.profile(&profile_name) {
        Ok(profile) => profile.clone(),
        // No profile: flags / env alone must name the service account.
        Err(_) if global.email.is_some() => Profile::default(),
        Err(err) if global.profile.is_some() => return Err(err.into()),
        Err(_) => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };
    // File-wide defaults fill what the profile leaves unset.
    profile.timeout.get_or_insert(cfg.defaults.timeout);
    if cfg.defaults.insecure {
        profile.insecure.get_or_insert(true);
    }
    apply_overrides(&mut profile, global);

    let identity = cpectl_config::resolve_identity(&profile, &profile_name)?;
    let service = cpectl_config::profile_to_service_config_with(&profile, identity)?;

    Ok(Resolved {
        client_id: cpectl_config::resolve_client_id(&profile),
        timeout_secs: service.dmp.timeout.as_secs(),
        profile_name,
        service,
    })
}

impl Resolved {
    /// The client ID, or a usage error naming where to set it.
    pub fn require_client_id(&self) -> Result<&str, CliError> {
        self.client_id.as_deref().ok_or(CliError::MissingClientId)
    }
}
