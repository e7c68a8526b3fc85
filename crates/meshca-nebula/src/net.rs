//! IPv4 networks as carried by mesh certificates

use serde::{Serialize, Serializer};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// An IPv4 address together with its network mask
///
/// Mesh certificates assign a node its overlay address as a network, e.g.
/// `10.0.0.7/24`: the address is the node's, the mask describes the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Net {
    addr: Ipv4Addr,
    mask: Ipv4Addr,
}

impl Ipv4Net {
    /// Create from an address and a prefix length (clamped to 32)
    pub fn new(addr: Ipv4Addr, prefix_len: u8) -> Self {
        let prefix_len = prefix_len.min(32);
        let mask = if prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(prefix_len))
        };
        Self {
            addr,
            mask: Ipv4Addr::from(mask),
        }
    }

    /// Create from the wire words (address, mask)
    pub fn from_words(addr: u32, mask: u32) -> Self {
        Self {
            addr: Ipv4Addr::from(addr),
            mask: Ipv4Addr::from(mask),
        }
    }

    /// Wire words (address, mask)
    pub fn to_words(&self) -> (u32, u32) {
        (u32::from(self.addr), u32::from(self.mask))
    }

    /// The assigned address
    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    /// The network mask
    pub fn mask(&self) -> Ipv4Addr {
        self.mask
    }

    /// Number of leading one bits in the mask
    pub fn prefix_len(&self) -> u32 {
        u32::from(self.mask).leading_ones()
    }

    /// Whether `ip` is inside this network
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        let mask = u32::from(self.mask);
        u32::from(ip) & mask == u32::from(self.addr) & mask
    }

    /// Whether `other` is fully inside this network
    ///
    /// The other address must be covered and its mask must be at least as
    /// narrow as ours.
    pub fn contains_net(&self, other: &Ipv4Net) -> bool {
        if !self.contains(other.addr) {
            return false;
        }
        self.mask
            .octets()
            .iter()
            .zip(other.mask.octets().iter())
            .all(|(ours, theirs)| ours <= theirs)
    }
}

impl fmt::Display for Ipv4Net {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len())
    }
}

impl FromStr for Ipv4Net {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| format!("invalid CIDR address: {s}"))?;
        let addr: Ipv4Addr = addr
            .parse()
            .map_err(|_| format!("invalid CIDR address: {s}"))?;
        let prefix: u8 = prefix
            .parse()
            .ok()
            .filter(|p| *p <= 32)
            .ok_or_else(|| format!("invalid CIDR address: {s}"))?;
        Ok(Self::new(addr, prefix))
    }
}

impl Serialize for Ipv4Net {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
