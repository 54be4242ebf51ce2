//! Address normalization.
//!
//! Every address handed to the WAF API goes through [`normalize`] first, so the
//! API layer only ever sees a validated, CIDR-qualified value:
//! - a bare IPv4 host becomes `/32`
//! - a bare IPv6 host becomes `/64`
//! - an explicit prefix is kept as given (after range validation)

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::error::{WafError, WafResult};

/// Default prefix applied to a bare IPv4 host
pub const DEFAULT_IPV4_PREFIX: u8 = 32;

/// Default prefix applied to a bare IPv6 host
pub const DEFAULT_IPV6_PREFIX: u8 = 64;

/// Address family, serialized the way the classic WAF API spells it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressKind {
    #[serde(rename = "IPV4")]
    Ipv4,
    #[serde(rename = "IPV6")]
    Ipv6,
}

impl AddressKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressKind::Ipv4 => "IPV4",
            AddressKind::Ipv6 => "IPV6",
        }
    }
}

impl fmt::Display for AddressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated, CIDR-qualified address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    kind: AddressKind,
    cidr: IpNet,
}

impl Address {
    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    /// The CIDR string sent to the API (e.g. `203.0.113.5/32`)
    pub fn to_cidr_string(&self) -> String {
        self.cidr.to_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cidr)
    }
}

impl FromStr for Address {
    type Err = WafError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize(s)
    }
}

/// Validate and canonicalize a raw address string.
///
/// # Examples
/// ```
/// use aws_fail2ban::address::normalize;
/// assert_eq!(normalize("203.0.113.5").unwrap().to_string(), "203.0.113.5/32");
/// assert_eq!(normalize("2001:db8::1").unwrap().to_string(), "2001:db8::1/64");
/// assert_eq!(normalize("10.0.0.0/8").unwrap().to_string(), "10.0.0.0/8");
/// assert!(normalize("not-an-ip").is_err());
/// ```
pub fn normalize(raw: &str) -> WafResult<Address> {
    let trimmed = raw.trim();
    let (host, prefix) = match trimmed.split_once('/') {
        Some((host, prefix)) => (host, Some(prefix)),
        None => (trimmed, None),
    };

    let ip: IpAddr = host
        .parse()
        .map_err(|_| WafError::Validation(raw.to_string()))?;

    let prefix = match prefix {
        Some(p) => Some(parse_prefix(raw, p)?),
        None => None,
    };

    let (kind, cidr) = match ip {
        IpAddr::V4(v4) => {
            let len = prefix.unwrap_or(DEFAULT_IPV4_PREFIX);
            let net = Ipv4Net::new(v4, len)
                .map_err(|_| WafError::Validation(format!("{} (prefix out of range)", raw)))?;
            (AddressKind::Ipv4, IpNet::V4(net))
        }
        IpAddr::V6(v6) => {
            let len = prefix.unwrap_or(DEFAULT_IPV6_PREFIX);
            let net = Ipv6Net::new(v6, len)
                .map_err(|_| WafError::Validation(format!("{} (prefix out of range)", raw)))?;
            (AddressKind::Ipv6, IpNet::V6(net))
        }
    };

    Ok(Address { kind, cidr })
}

fn parse_prefix(raw: &str, prefix: &str) -> WafResult<u8> {
    // u8::from_str accepts a leading '+', which is not valid CIDR notation
    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(WafError::Validation(format!("{} (bad prefix length)", raw)));
    }
    prefix
        .parse::<u8>()
        .map_err(|_| WafError::Validation(format!("{} (bad prefix length)", raw)))
}

/// Guess the family of an address string returned by the API without
/// rejecting it. Used where the remote side hands back plain strings.
pub fn kind_of(value: &str) -> AddressKind {
    match normalize(value) {
        Ok(address) => address.kind(),
        Err(_) if value.contains(':') => AddressKind::Ipv6,
        Err(_) => AddressKind::Ipv4,
    }
}
