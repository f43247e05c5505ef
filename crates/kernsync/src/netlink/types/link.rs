//! Link header (`ifinfomsg`) and IFLA_* constants.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Interface info message header (mirrors struct ifinfomsg).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct IfInfoMsg {
    pub ifi_family: u8,
    pub ifi_pad: u8,
    /// Hardware type (ARPHRD_*).
    pub ifi_type: u16,
    pub ifi_index: i32,
    /// IFF_* flags.
    pub ifi_flags: u32,
    /// Mask of flags the request changes, or the kernel reports as changed.
    pub ifi_change: u32,
}

impl IfInfoMsg {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index(mut self, index: u32) -> Self {
        self.ifi_index = index as i32;
        self
    }

    pub fn with_flags(mut self, flags: u32, change: u32) -> Self {
        self.ifi_flags = flags;
        self.ifi_change = change;
        self
    }

    pub fn index(&self) -> u32 {
        self.ifi_index as u32
    }
}

/// Interface flags.
pub const IFF_UP: u32 = libc::IFF_UP as u32;
pub const IFF_RUNNING: u32 = libc::IFF_RUNNING as u32;
pub const IFF_LOWER_UP: u32 = 0x10000;

/// Hardware types.
pub const ARPHRD_ETHER: u16 = libc::ARPHRD_ETHER;

/// Change mask the kernel uses for newly created links.
pub const IFI_CHANGE_ALL: u32 = 0xFFFF_FFFF;

/// Maximum interface name length (including null terminator).
pub const IFNAMSIZ: usize = 16;

/// Top-level IFLA_* attributes.
pub mod ifla {
    pub const IFLA_ADDRESS: u16 = 1;
    pub const IFLA_IFNAME: u16 = 3;
    pub const IFLA_MTU: u16 = 4;
    pub const IFLA_LINK: u16 = 5;
    pub const IFLA_MASTER: u16 = 10;
    pub const IFLA_OPERSTATE: u16 = 16;
    pub const IFLA_LINKINFO: u16 = 18;
}

/// Nested IFLA_INFO_* attributes.
pub mod info {
    pub const IFLA_INFO_KIND: u16 = 1;
    pub const IFLA_INFO_DATA: u16 = 2;
}

/// IFLA_VLAN_* attributes inside IFLA_INFO_DATA.
pub mod vlan {
    pub const IFLA_VLAN_ID: u16 = 1;
}
