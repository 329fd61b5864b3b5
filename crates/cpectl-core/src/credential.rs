// ── Device SSH credentials ──
//
// The device password is a convention, not a secret store lookup:
// `{client_id}!{first 12 hex chars of the WAN MAC, uppercased}`.

use std::fmt;

use secrecy::SecretString;
use serde::Serialize;

/// Fixed device-side shell account.
pub const DEFAULT_USERNAME: &str = "superadmin";

/// Length of a complete hardware address in hex characters.
pub const CLEAN_MAC_LEN: usize = 12;

/// Strip every non-hex character, keep at most the first 12, uppercase.
///
/// Shorter input stays short; it is never padded.
pub fn clean_wan_mac(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii_hexdigit)
        .take(CLEAN_MAC_LEN)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// `client_id` (trimmed) + `!` + `clean_mac`.
pub fn derive_password(client_id: &str, clean_mac: &str) -> String {
    format!("{}!{clean_mac}", client_id.trim())
}

// ── CleanMac ────────────────────────────────────────────────────────

/// Normalized hardware address, possibly shorter than 12 characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CleanMac(String);

impl CleanMac {
    pub fn from_raw(raw: &str) -> Self {
        Self(clean_wan_mac(raw))
    }

    /// Only a full 12-character value may seed a password in the restart flow.
    pub fn is_complete(&self) -> bool {
        self.0.len() == CLEAN_MAC_LEN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CleanMac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Credential ──────────────────────────────────────────────────────

/// Username and password for a device shell session.
#[derive(Debug, Clone)]
pub struct Credential {
    pub username: String,
    pub password: SecretString,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    /// Build the conventional credential for `superadmin`.
    pub fn derive(client_id: &str, clean_mac: &CleanMac) -> Self {
        Self::new(DEFAULT_USERNAME, derive_password(client_id, clean_mac.as_str()))
    }
}
