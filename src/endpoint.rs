//! Broker endpoint addressing.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::BrokerError;

/// Address of a single broker node.
///
/// Compared, hashed, and ordered by value: two addresses with equal host
/// and port identify the same broker regardless of how they were produced,
/// which is what makes this type usable as a cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BrokerAddr {
    host: String,
    port: u16,
}

impl BrokerAddr {
    /// Build an address, rejecting empty hosts and port zero before any
    /// I/O is attempted.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, BrokerError> {
        let host = host.into();
        if host.is_empty() {
            return Err(BrokerError::InvalidAddress(
                "host must not be empty".to_string(),
            ));
        }
        if port == 0 {
            return Err(BrokerError::InvalidAddress(format!(
                "port must be non-zero for host '{host}'"
            )));
        }
        Ok(Self { host, port })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for BrokerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Bracket bare IPv6 literals so the rendering round-trips.
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for BrokerAddr {
    type Err = BrokerError;

    /// Parse `"host:port"` or `"[v6-literal]:port"`.
    fn from_str(s: &str) -> Result<Self, BrokerError> {
        let (host, port_str) = if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(|| {
                BrokerError::InvalidAddress(format!("unterminated '[' in '{s}'"))
            })?;
            let port_str = tail.strip_prefix(':').ok_or_else(|| {
                BrokerError::InvalidAddress(format!("missing port in '{s}'"))
            })?;
            (host, port_str)
        } else {
            let (host, port_str) = s.rsplit_once(':').ok_or_else(|| {
                BrokerError::InvalidAddress(format!("missing port in '{s}'"))
            })?;
            if host.contains(':') {
                return Err(BrokerError::InvalidAddress(format!(
                    "IPv6 literals must be bracketed: '{s}'"
                )));
            }
            (host, port_str)
        };

        let port: u16 = port_str.parse().map_err(|_| {
            BrokerError::InvalidAddress(format!("invalid port '{port_str}' in '{s}'"))
        })?;

        Self::new(host, port)
    }
}

impl Serialize for BrokerAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for BrokerAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_and_port() {
        let addr: BrokerAddr = "broker-1.internal:9092".parse().unwrap();
        assert_eq!(addr.host(), "broker-1.internal");
        assert_eq!(addr.port(), 9092);
    }

    #[test]
    fn parses_bracketed_ipv6() {
        let addr: BrokerAddr = "[::1]:9092".parse().unwrap();
        assert_eq!(addr.host(), "::1");
        assert_eq!(addr.port(), 9092);
        assert_eq!(addr.to_string(), "[::1]:9092");
    }

    #[test]
    fn display_round_trips() {
        let addr = BrokerAddr::new("10.0.0.5", 9092).unwrap();
        let parsed: BrokerAddr = addr.to_string().parse().unwrap();
        assert_eq!(addr, parsed);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!("".parse::<BrokerAddr>().is_err());
        assert!("no-port".parse::<BrokerAddr>().is_err());
        assert!(":9092".parse::<BrokerAddr>().is_err());
        assert!("host:0".parse::<BrokerAddr>().is_err());
        assert!("host:notaport".parse::<BrokerAddr>().is_err());
        assert!("host:99999".parse::<BrokerAddr>().is_err());
        assert!("::1:9092".parse::<BrokerAddr>().is_err());
        assert!("[::1:9092".parse::<BrokerAddr>().is_err());
    }

    #[test]
    fn equal_by_value() {
        let a = BrokerAddr::new("kafka-a", 9092).unwrap();
        let b: BrokerAddr = "kafka-a:9092".parse().unwrap();
        assert_eq!(a, b);

        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn serde_uses_string_form() {
        let addr = BrokerAddr::new("kafka-a", 9092).unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"kafka-a:9092\"");

        let back: BrokerAddr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);

        assert!(serde_json::from_str::<BrokerAddr>("\"kafka-a\"").is_err());
    }
}
