//! Compact IP address representation
//!
//! Addresses are stored as a fixed-width binary value so they can be used
//! directly as index keys: 16 address bytes (IPv4 is kept in its
//! v4-in-v6-mapped form, occupying bytes 12..16) plus one flag byte with
//! derived predicates. Equality and hashing are byte-exact.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

const IS_PRIVATE: u8 = 0b0000_0001;
const IS_IPV6: u8 = 0b0000_0010;
const IS_UNSPECIFIED: u8 = 0b0000_0100;

/// A parsed IP address, immutable once constructed.
///
/// Unparseable input collapses to the unspecified sentinel rather than an
/// error; upstream alert formats routinely contain partial records and
/// relations with an unspecified endpoint are dropped before classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IpAddress {
    octets: [u8; 16],
    flags: u8,
}

impl IpAddress {
    /// Parse a textual IPv4 or IPv6 address.
    pub fn parse(address: &str) -> Self {
        match address.parse::<IpAddr>() {
            Ok(IpAddr::V4(v4)) => {
                let mut flags = 0;
                if v4.is_private() {
                    flags |= IS_PRIVATE;
                }
                if v4.is_unspecified() {
                    flags |= IS_UNSPECIFIED;
                }
                IpAddress {
                    octets: v4.to_ipv6_mapped().octets(),
                    flags,
                }
            }
            Ok(IpAddr::V6(v6)) => {
                let octets = v6.octets();
                let mut flags = IS_IPV6;
                // Unique local addresses (fc00::/7) count as private.
                if octets[0] & 0xfe == 0xfc {
                    flags |= IS_PRIVATE;
                }
                if v6.is_unspecified() {
                    flags |= IS_UNSPECIFIED;
                }
                IpAddress { octets, flags }
            }
            Err(_) => Self::unspecified(),
        }
    }

    /// The sentinel value standing in for missing or malformed addresses.
    pub fn unspecified() -> Self {
        IpAddress {
            octets: [0; 16],
            flags: IS_UNSPECIFIED,
        }
    }

    pub fn is_private(&self) -> bool {
        self.flags & IS_PRIVATE == IS_PRIVATE
    }

    pub fn is_ipv6(&self) -> bool {
        self.flags & IS_IPV6 == IS_IPV6
    }

    pub fn is_unspecified(&self) -> bool {
        self.flags & IS_UNSPECIFIED == IS_UNSPECIFIED
    }

    /// Whether both addresses fall into the same subnet.
    ///
    /// Private IPv4 networks are compared at /24, IPv6 at /64; addresses of
    /// different families are never in the same subnet.
    pub fn is_same_subnet(&self, other: &IpAddress) -> bool {
        if self.is_ipv6() != other.is_ipv6() {
            return false;
        }

        if self.is_ipv6() {
            self.octets[..8] == other.octets[..8]
        } else {
            self.octets[12..15] == other.octets[12..15]
        }
    }
}

impl Default for IpAddress {
    fn default() -> Self {
        Self::unspecified()
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ipv6() {
            write!(f, "{}", Ipv6Addr::from(self.octets))
        } else {
            let o = &self.octets;
            write!(f, "{}", Ipv4Addr::new(o[12], o[13], o[14], o[15]))
        }
    }
}

impl Serialize for IpAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct IpAddressVisitor;

impl Visitor<'_> for IpAddressVisitor {
    type Value = IpAddress;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an IP address string")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<IpAddress, E> {
        Ok(IpAddress::parse(value))
    }
}

impl<'de> Deserialize<'de> for IpAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(IpAddressVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_private_ipv4() {
        let addr = IpAddress::parse("192.168.1.10");
        assert!(addr.is_private());
        assert!(!addr.is_ipv6());
        assert!(!addr.is_unspecified());
        assert_eq!(addr.to_string(), "192.168.1.10");
    }

    #[test]
    fn test_parse_public_ipv4() {
        let addr = IpAddress::parse("1.1.13.37");
        assert!(!addr.is_private());
        assert!(!addr.is_unspecified());
    }

    #[test]
    fn test_parse_ipv6() {
        let public = IpAddress::parse("2001:db8::1");
        assert!(public.is_ipv6());
        assert!(!public.is_private());

        let ula = IpAddress::parse("fd12:3456:789a::1");
        assert!(ula.is_ipv6());
        assert!(ula.is_private());
    }

    #[test]
    fn test_malformed_collapses_to_unspecified() {
        let addr = IpAddress::parse("not-an-address");
        assert!(addr.is_unspecified());
        assert_eq!(addr, IpAddress::unspecified());
    }

    #[test]
    fn test_zero_address_is_unspecified() {
        assert!(IpAddress::parse("0.0.0.0").is_unspecified());
        assert!(IpAddress::parse("::").is_unspecified());
    }

    #[test]
    fn test_byte_exact_equality() {
        assert_eq!(IpAddress::parse("10.0.0.1"), IpAddress::parse("10.0.0.1"));
        assert_ne!(IpAddress::parse("10.0.0.1"), IpAddress::parse("10.0.0.2"));
    }

    #[test]
    fn test_same_subnet_ipv4() {
        let a = IpAddress::parse("10.0.0.1");
        let b = IpAddress::parse("10.0.0.200");
        let c = IpAddress::parse("10.2.0.2");
        assert!(a.is_same_subnet(&b));
        assert!(!a.is_same_subnet(&c));
    }

    #[test]
    fn test_same_subnet_ipv6() {
        let a = IpAddress::parse("fd00:aaaa:bbbb:cccc::1");
        let b = IpAddress::parse("fd00:aaaa:bbbb:cccc::2");
        let c = IpAddress::parse("fd00:aaaa:bbbb:dddd::1");
        assert!(a.is_same_subnet(&b));
        assert!(!a.is_same_subnet(&c));
    }

    #[test]
    fn test_mixed_families_never_same_subnet() {
        let v4 = IpAddress::parse("10.0.0.1");
        let v6 = IpAddress::parse("fd00::1");
        assert!(!v4.is_same_subnet(&v6));
    }

    #[test]
    fn test_serde_round_trip() {
        let addr = IpAddress::parse("172.31.64.67");
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"172.31.64.67\"");
        let back: IpAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(addr, back);
    }
}
