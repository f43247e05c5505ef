//! IPv4 address descriptor.

use std::fmt;
use std::net::Ipv4Addr;

use super::port_matches;
use crate::util::addr::{ipv4_in_prefix, prefix_mask};

/// An IPv4 address assigned to a port.
///
/// Equality ignores `port_index` when either side is [`ANY_PORT`], so a
/// descriptor built without a port matches the kernel's copy of it. That
/// makes equality non-transitive; there is deliberately no `Eq`/`Hash`.
///
/// [`ANY_PORT`]: super::ANY_PORT
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AddressDescriptor {
    pub address: Ipv4Addr,
    pub prefix_length: u8,
    pub port_index: u32,
}

impl AddressDescriptor {
    pub fn new(address: Ipv4Addr, prefix_length: u8, port_index: u32) -> Self {
        Self {
            address,
            prefix_length,
            port_index,
        }
    }

    /// Network address of the subnet.
    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.address) & prefix_mask(self.prefix_length))
    }

    /// Directed broadcast address of the subnet.
    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.address) | !prefix_mask(self.prefix_length))
    }

    /// True if `other` is in this address's subnet.
    pub fn same_network(&self, other: Ipv4Addr) -> bool {
        ipv4_in_prefix(other, self.address, self.prefix_length)
    }
}

impl PartialEq for AddressDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
            && self.prefix_length == other.prefix_length
            && port_matches(self.port_index, other.port_index)
    }
}

impl fmt::Display for AddressDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_length)?;
        if self.port_index != 0 {
            write!(f, " dev {}", self.port_index)?;
        }
        Ok(())
    }
}
