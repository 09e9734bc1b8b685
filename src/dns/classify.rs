//! Address family classification for textual IP literals.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Address family of a cached node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpVersion {
    /// Not a valid IPv4 or IPv6 literal.
    #[default]
    Unknown,
    #[serde(rename = "ipv4")]
    V4,
    #[serde(rename = "ipv6")]
    V6,
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpVersion::Unknown => f.write_str("unknown"),
            IpVersion::V4 => f.write_str("ipv4"),
            IpVersion::V6 => f.write_str("ipv6"),
        }
    }
}

/// Classify a textual address.
///
/// Strict IPv4 parse first, then strict IPv6. Partial or out-of-range
/// literals such as `"1.2.3"` or `"999.1.1.1"` are [`IpVersion::Unknown`].
pub fn classify(text: &str) -> IpVersion {
    if text.parse::<Ipv4Addr>().is_ok() {
        IpVersion::V4
    } else if text.parse::<Ipv6Addr>().is_ok() {
        IpVersion::V6
    } else {
        IpVersion::Unknown
    }
}
