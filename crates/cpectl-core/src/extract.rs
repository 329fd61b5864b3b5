// ── Telemetry field extraction ──
//
// DMP parameter responses have no fixed schema: the same field can sit at
// different depths, under differently-cased keys, either as a bare string
// or wrapped in `{ "value": ... }`. Everything here is a pure pre-order
// walk over `serde_json::Value`, with object properties visited in
// document order (serde_json is built with `preserve_order`).

use std::net::Ipv4Addr;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

/// Telemetry key carrying an IPv4 address.
pub const IPV4_KEY: &str = "IPv4Address";
/// Telemetry key carrying a hardware address.
pub const MAC_KEY: &str = "MACAddress";
/// Subtree holding the WAN interface parameters.
pub const ETHERNET_WAN_KEY: &str = "EthernetWAN";

static MAC_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[0-9A-Fa-f]{2}(?:(?::[0-9A-Fa-f]{2}){5}|(?:-[0-9A-Fa-f]{2}){5}|(?:[0-9A-Fa-f]{2}){5})$",
    )
    .expect("MAC pattern is a valid regex")
});

// ── Generic lookups ─────────────────────────────────────────────────

/// Return the value bound to the first occurrence of `key` (case-insensitive).
///
/// Pre-order depth-first: a property is compared before its subtree is
/// searched, and a subtree is exhausted before the next sibling.
pub fn find_subtree<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    match root {
        Value::Object(map) => map.iter().find_map(|(name, child)| {
            if name.eq_ignore_ascii_case(key) {
                Some(child)
            } else {
                find_subtree(child, key)
            }
        }),
        Value::Array(items) => items.iter().find_map(|item| find_subtree(item, key)),
        _ => None,
    }
}

/// Return the first non-blank string bound to `key` (case-insensitive).
///
/// A bound `{ "value": "..." }` object is unwrapped once. Blank strings and
/// non-string bindings do not end the search: the walk continues into the
/// bound value and then on to later siblings.
pub fn find_leaf<'a>(root: &'a Value, key: &str) -> Option<&'a str> {
    match root {
        Value::Object(map) => map.iter().find_map(|(name, child)| {
            name.eq_ignore_ascii_case(key)
                .then(|| leaf_text(child))
                .flatten()
                .or_else(|| find_leaf(child, key))
        }),
        Value::Array(items) => items.iter().find_map(|item| find_leaf(item, key)),
        _ => None,
    }
}

fn leaf_text(value: &Value) -> Option<&str> {
    let text = match value {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("value")?.as_str()?,
        _ => return None,
    };
    (!text.trim().is_empty()).then_some(text)
}

// ── IPv4 discovery ──────────────────────────────────────────────────

/// Where in the telemetry tree an IPv4 address is looked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
pub enum IpScope {
    #[strum(serialize = "EthernetWAN")]
    EthernetWan,
    #[strum(serialize = "Mobile")]
    Mobile,
    #[strum(serialize = "LAN")]
    Lan,
    #[strum(serialize = "anywhere")]
    Anywhere,
}

impl IpScope {
    /// Lookup order used for the device's connectable address.
    pub const PRECEDENCE: [Self; 4] = [Self::EthernetWan, Self::Mobile, Self::Lan, Self::Anywhere];

    /// The subtree key this scope narrows to, if any.
    pub fn subtree_key(self) -> Option<&'static str> {
        match self {
            Self::Anywhere => None,
            scoped => Some(<&'static str>::from(scoped)),
        }
    }
}

/// Find a valid IPv4 address within one scope.
pub fn find_ipv4_in(root: &Value, scope: IpScope) -> Option<String> {
    let subtree = match scope.subtree_key() {
        Some(key) => find_subtree(root, key)?,
        None => root,
    };
    find_leaf(subtree, IPV4_KEY).and_then(validated_ipv4)
}

/// Find the device address, trying each scope in [`IpScope::PRECEDENCE`].
pub fn find_ipv4_address(root: &Value) -> Option<String> {
    IpScope::PRECEDENCE
        .into_iter()
        .find_map(|scope| find_ipv4_in(root, scope))
}

/// Drop a trailing `:port` suffix (`"1.2.3.4:8443"` -> `"1.2.3.4"`).
pub fn strip_port(value: &str) -> &str {
    let trimmed = value.trim();
    match trimmed.find(':') {
        Some(idx) if idx > 0 => &trimmed[..idx],
        _ => trimmed,
    }
}

/// Strip any port and accept the candidate only if it is an IPv4 literal.
pub fn validated_ipv4(candidate: &str) -> Option<String> {
    let host = strip_port(candidate);
    host.parse::<Ipv4Addr>().ok().map(|_| host.to_owned())
}

// ── MAC discovery ───────────────────────────────────────────────────

/// `true` for six hex pairs separated consistently by `:`, `-`, or nothing.
pub fn looks_like_mac(value: &str) -> bool {
    MAC_PATTERN.is_match(value.trim())
}

/// Find the WAN hardware address: `EthernetWAN` first, then anywhere.
pub fn find_mac_address(root: &Value) -> Option<String> {
    let scoped = find_subtree(root, ETHERNET_WAN_KEY)
        .and_then(|wan| find_leaf(wan, MAC_KEY))
        .filter(|mac| looks_like_mac(mac));

    scoped
        .or_else(|| find_leaf(root, MAC_KEY).filter(|mac| looks_like_mac(mac)))
        .map(|mac| mac.trim().to_owned())
}
