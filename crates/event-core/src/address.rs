//! IP addresses stored in a uniform 128-bit representation.
//!
//! IPv4 addresses are kept in their v4-mapped IPv6 form so that every address
//! occupies the same bit space. This is what makes the bit-sliced address
//! index and subnet masking uniform across families.

use crate::CoreError;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// A 128-bit IP address; IPv4 addresses are v4-mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(Ipv6Addr);

impl Address {
    /// Create an address from a standard library IP address.
    pub fn from_ip(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => Self(v4.to_ipv6_mapped()),
            IpAddr::V6(v6) => Self(v6),
        }
    }

    /// Create an address from its 128-bit big-endian image.
    pub fn from_bits(bits: u128) -> Self {
        Self(Ipv6Addr::from(bits.to_be_bytes()))
    }

    /// The 128-bit big-endian image of this address.
    ///
    /// Bit 0 of the returned value (counted from the most significant end)
    /// is the first bit of the address on the wire.
    pub fn bits(&self) -> u128 {
        u128::from_be_bytes(self.0.octets())
    }

    /// Check whether this is a v4-mapped address.
    pub fn is_v4(&self) -> bool {
        self.0.to_ipv4_mapped().is_some()
    }

    /// Check whether this is a native IPv6 address.
    pub fn is_v6(&self) -> bool {
        !self.is_v4()
    }

    /// Check whether this is a loopback address (either family).
    pub fn is_loopback(&self) -> bool {
        match self.0.to_ipv4_mapped() {
            Some(v4) => v4.is_loopback(),
            None => self.0.is_loopback(),
        }
    }

    /// View this address as a standard library IP address.
    pub fn to_ip(&self) -> IpAddr {
        match self.0.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(self.0),
        }
    }
}

impl From<IpAddr> for Address {
    fn from(ip: IpAddr) -> Self {
        Self::from_ip(ip)
    }
}

impl From<Ipv4Addr> for Address {
    fn from(ip: Ipv4Addr) -> Self {
        Self::from_ip(IpAddr::V4(ip))
    }
}

impl From<Ipv6Addr> for Address {
    fn from(ip: Ipv6Addr) -> Self {
        Self(ip)
    }
}

impl FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_ip(s.parse::<IpAddr>()?))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_ip())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v4_mapping() {
        let addr: Address = "10.1.1.2".parse().unwrap();
        assert!(addr.is_v4());
        assert_eq!(addr.to_string(), "10.1.1.2");

        let lo: Address = "127.0.0.1".parse().unwrap();
        assert!(lo.is_loopback());
    }

    #[test]
    fn test_v6() {
        let addr: Address = "f00::babe".parse().unwrap();
        assert!(addr.is_v6());
        assert_ne!(addr, "10.1.1.2".parse().unwrap());
    }

    #[test]
    fn test_bits_round_trip() {
        let addr: Address = "dead::beef".parse().unwrap();
        assert_eq!(Address::from_bits(addr.bits()), addr);

        // The first octet lands in the most significant bits.
        let v4: Address = "255.0.0.0".parse().unwrap();
        assert_eq!(v4.bits() & 0xff, 0);
        assert_eq!((v4.bits() >> 24) & 0xff, 0xff);
    }
}
