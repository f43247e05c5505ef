//! Address header (`ifaddrmsg`) and IFA_* constants.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Interface address message header (mirrors struct ifaddrmsg).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct IfAddrMsg {
    pub ifa_family: u8,
    pub ifa_prefixlen: u8,
    /// IFA_F_* flags.
    pub ifa_flags: u8,
    /// RT_SCOPE_* value.
    pub ifa_scope: u8,
    pub ifa_index: u32,
}

impl IfAddrMsg {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// Address flags.
pub const IFA_F_PERMANENT: u8 = 0x80;

/// IFA_* attributes.
pub mod ifa {
    pub const IFA_ADDRESS: u16 = 1;
    pub const IFA_LOCAL: u16 = 2;
    pub const IFA_LABEL: u16 = 3;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        assert_eq!(IfAddrMsg::SIZE, 8);
    }
}
