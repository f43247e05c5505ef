//! Route header (`rtmsg`) and RTA_* constants.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Route message header (mirrors struct rtmsg).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct RtMsg {
    pub rtm_family: u8,
    pub rtm_dst_len: u8,
    pub rtm_src_len: u8,
    pub rtm_tos: u8,
    pub rtm_table: u8,
    /// RTPROT_* value; who installed the route.
    pub rtm_protocol: u8,
    pub rtm_scope: u8,
    /// RTN_* value.
    pub rtm_type: u8,
    /// RTM_F_* flags.
    pub rtm_flags: u32,
}

impl RtMsg {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// Routing tables.
pub const RT_TABLE_MAIN: u8 = 254;
pub const RT_TABLE_LOCAL: u8 = 255;

/// Scopes, shared by addresses and routes.
pub const RT_SCOPE_UNIVERSE: u8 = 0;
pub const RT_SCOPE_LINK: u8 = 253;
pub const RT_SCOPE_HOST: u8 = 254;
pub const RT_SCOPE_NOWHERE: u8 = 255;

/// Route types.
pub const RTN_UNSPEC: u8 = 0;
pub const RTN_UNICAST: u8 = 1;

/// Route protocols.
pub const RTPROT_UNSPEC: u8 = 0;
pub const RTPROT_REDIRECT: u8 = 1;
pub const RTPROT_KERNEL: u8 = 2;
pub const RTPROT_BOOT: u8 = 3;
pub const RTPROT_STATIC: u8 = 4;
pub const RTPROT_ZEBRA: u8 = 11;

/// Route flags.
pub const RTM_F_CLONED: u32 = 0x200;

/// RTA_* attributes.
pub mod rta {
    pub const RTA_DST: u16 = 1;
    pub const RTA_SRC: u16 = 2;
    pub const RTA_IIF: u16 = 3;
    pub const RTA_OIF: u16 = 4;
    pub const RTA_GATEWAY: u16 = 5;
    pub const RTA_PRIORITY: u16 = 6;
    pub const RTA_PREFSRC: u16 = 7;
    pub const RTA_TABLE: u16 = 15;
}
