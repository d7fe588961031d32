//! Transport-layer ports.

use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The transport protocol of a port.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Proto {
    #[default]
    Unknown,
    Tcp,
    Udp,
    Icmp,
}

impl Proto {
    pub fn as_str(self) -> &'static str {
        match self {
            Proto::Unknown => "?",
            Proto::Tcp => "tcp",
            Proto::Udp => "udp",
            Proto::Icmp => "icmp",
        }
    }

    /// Stable single-byte encoding used by the index image.
    pub fn discriminant(self) -> u8 {
        match self {
            Proto::Unknown => 0,
            Proto::Tcp => 1,
            Proto::Udp => 2,
            Proto::Icmp => 3,
        }
    }

    pub fn from_discriminant(d: u8) -> Option<Self> {
        match d {
            0 => Some(Proto::Unknown),
            1 => Some(Proto::Tcp),
            2 => Some(Proto::Udp),
            3 => Some(Proto::Icmp),
            _ => None,
        }
    }
}

/// A transport-layer port, ordered by `(number, proto)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Port {
    number: u16,
    proto: Proto,
}

impl Port {
    pub fn new(number: u16, proto: Proto) -> Self {
        Self { number, proto }
    }

    pub fn number(&self) -> u16 {
        self.number
    }

    pub fn proto(&self) -> Proto {
        self.proto
    }
}

impl FromStr for Port {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (number, proto) = s
            .split_once('/')
            .ok_or_else(|| CoreError::Port(s.to_string()))?;
        let number: u16 = number.parse().map_err(|_| CoreError::Port(s.to_string()))?;
        let proto = match proto {
            "tcp" => Proto::Tcp,
            "udp" => Proto::Udp,
            "icmp" => Proto::Icmp,
            "?" => Proto::Unknown,
            _ => return Err(CoreError::Port(s.to_string())),
        };
        Ok(Self::new(number, proto))
    }
}

impl std::fmt::Display for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.number, self.proto.as_str())
    }
}
