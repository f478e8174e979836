use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr};

use crate::error::TargetError;

/// Upper bound on addresses a single sweep may expand to (a /16).
pub const MAX_TARGETS: usize = 65_536;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Range {
    pub start_addr: Ipv4Addr,
    pub end_addr: Ipv4Addr,
}

impl Ipv4Range {
    pub fn new(start_addr: Ipv4Addr, end_addr: Ipv4Addr) -> Result<Self, TargetError> {
        if u32::from(start_addr) > u32::from(end_addr) {
            return Err(TargetError::ReversedRange {
                start: start_addr,
                end: end_addr,
            });
        }
        Ok(Self {
            start_addr,
            end_addr,
        })
    }

    pub fn len(&self) -> usize {
        (u32::from(self.end_addr) - u32::from(self.start_addr)) as usize + 1
    }

    pub fn to_iter(&self) -> impl Iterator<Item = IpAddr> {
        let start: u32 = self.start_addr.into();
        let end: u32 = self.end_addr.into();
        (start..=end).map(|ip| IpAddr::V4(Ipv4Addr::from(ip)))
    }
}

/// Host range of a CIDR block. Network and broadcast addresses are dropped for
/// prefixes up to /30; /31 and /32 keep every address.
pub fn cidr_range(ip: Ipv4Addr, prefix: u8) -> Result<Ipv4Range, TargetError> {
    if prefix > 32 {
        return Err(TargetError::InvalidPrefix(prefix));
    }

    let mask: u32 = if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix)
    };
    let network: u32 = u32::from(ip) & mask;
    let broadcast: u32 = network | !mask;

    let (start, end) = if prefix <= 30 {
        (network + 1, broadcast - 1)
    } else {
        (network, broadcast)
    };

    Ipv4Range::new(Ipv4Addr::from(start), Ipv4Addr::from(end))
}

/// Deduplicated, ordered set of addresses to sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpCollection {
    addrs: BTreeSet<IpAddr>,
}

impl IpCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_single(&mut self, addr: IpAddr) {
        self.addrs.insert(addr);
    }

    pub fn add_range(&mut self, range: Ipv4Range) -> Result<(), TargetError> {
        let projected = self.addrs.len().saturating_add(range.len());
        if projected > MAX_TARGETS {
            return Err(TargetError::TooLarge {
                count: projected,
                limit: MAX_TARGETS,
            });
        }
        self.addrs.extend(range.to_iter());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    pub fn contains(&self, addr: &IpAddr) -> bool {
        self.addrs.contains(addr)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IpAddr> {
        self.addrs.iter()
    }
}

impl IntoIterator for IpCollection {
    type Item = IpAddr;
    type IntoIter = std::collections::btree_set::IntoIter<IpAddr>;

    fn into_iter(self) -> Self::IntoIter {
        self.addrs.into_iter()
    }
}

impl FromIterator<IpAddr> for IpCollection {
    fn from_iter<T: IntoIterator<Item = IpAddr>>(iter: T) -> Self {
        Self {
            addrs: iter.into_iter().collect(),
        }
    }
}
