//! Port (link) descriptor.

use std::fmt;
use std::str::FromStr;

use crate::netlink::error::Error;
use crate::netlink::types::link::{IFF_RUNNING, IFF_UP};

/// Ethernet hardware address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::util::addr::format_mac(&self.0))
    }
}

impl FromStr for MacAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::util::addr::parse_mac(s)
            .map(Self)
            .map_err(|e| Error::InvalidAttribute(e.to_string()))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for MacAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Attributes every port carries regardless of its kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PortInfo {
    /// Kernel interface index.
    pub index: u32,
    pub mtu: u32,
    /// IFF_* flags.
    pub flags: u32,
    pub name: String,
    pub hardware_address: Option<MacAddress>,
}

/// What kind of device a port is, from the link-info kind string.
///
/// Unrecognized kinds, and links without link-info, are `Physical`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase", tag = "kind"))]
pub enum PortKind {
    #[default]
    Physical,
    Vlan {
        tag: u16,
        lower_link: Option<u32>,
    },
    Bond,
    Bridge,
    Deth,
    Veth,
}

impl PortKind {
    /// Map a link-info kind string. The VLAN tag is filled in by the caller.
    pub fn from_kind(kind: &str) -> Self {
        match kind {
            "vlan" => PortKind::Vlan {
                tag: 0,
                lower_link: None,
            },
            "bond" => PortKind::Bond,
            "bridge" => PortKind::Bridge,
            "deth" => PortKind::Deth,
            "veth" => PortKind::Veth,
            _ => PortKind::Physical,
        }
    }

    /// The link-info kind string, `None` for physical ports.
    pub fn as_kind(&self) -> Option<&'static str> {
        match self {
            PortKind::Physical => None,
            PortKind::Vlan { .. } => Some("vlan"),
            PortKind::Bond => Some("bond"),
            PortKind::Bridge => Some("bridge"),
            PortKind::Deth => Some("deth"),
            PortKind::Veth => Some("veth"),
        }
    }
}

/// A decoded link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PortDescriptor {
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub info: PortInfo,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub kind: PortKind,
    /// Parent link (IFLA_LINK); never the port itself.
    pub link: Option<u32>,
    /// Bond or bridge this port is enslaved to.
    pub master: Option<u32>,
    /// RFC 2863 operational state (IF_OPER_*).
    pub oper_state: Option<u8>,
}

impl PortDescriptor {
    pub fn index(&self) -> u32 {
        self.info.index
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Administratively up (IFF_UP).
    pub fn is_admin_up(&self) -> bool {
        self.info.flags & IFF_UP != 0
    }

    /// Operationally running (IFF_RUNNING).
    pub fn is_running(&self) -> bool {
        self.info.flags & IFF_RUNNING != 0
    }

    /// VLAN tag, for VLAN ports.
    pub fn vlan_tag(&self) -> Option<u16> {
        match self.kind {
            PortKind::Vlan { tag, .. } => Some(tag),
            _ => None,
        }
    }
}

impl fmt::Display for PortDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.info.index, self.info.name)?;
        if let Some(kind) = self.kind.as_kind() {
            write!(f, " type {}", kind)?;
        }
        if let PortKind::Vlan { tag, .. } = self.kind {
            write!(f, " id {}", tag)?;
        }
        write!(
            f,
            " mtu {} {}",
            self.info.mtu,
            if self.is_admin_up() { "up" } else { "down" }
        )?;
        if let Some(mac) = &self.info.hardware_address {
            write!(f, " link/ether {}", mac)?;
        }
        if let Some(link) = self.link {
            write!(f, " link {}", link)?;
        }
        if let Some(master) = self.master {
            write!(f, " master {}", master)?;
        }
        Ok(())
    }
}
