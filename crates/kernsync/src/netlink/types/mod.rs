//! Fixed-size kernel headers that follow the netlink header.
//!
//! Each struct mirrors its C counterpart byte for byte and is read through
//! zerocopy, so a short payload is reported as [`Error::Truncated`] instead of
//! being read past its end.
//!
//! [`Error::Truncated`]: crate::netlink::Error::Truncated

pub mod addr;
pub mod link;
pub mod route;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::error::{Error, Result};

/// Address families.
pub const AF_UNSPEC: u8 = 0;
pub const AF_INET: u8 = libc::AF_INET as u8;

/// Generic request header used by dump requests (mirrors struct rtgenmsg).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct RtGenMsg {
    pub rtgen_family: u8,
}

impl RtGenMsg {
    pub fn new(family: u8) -> Self {
        Self {
            rtgen_family: family,
        }
    }
}

/// Read a fixed header from the front of a payload.
pub(crate) fn header_from_bytes<T>(data: &[u8]) -> Result<&T>
where
    T: FromBytes + KnownLayout + Immutable,
{
    T::ref_from_prefix(data)
        .map(|(r, _)| r)
        .map_err(|_| Error::Truncated {
            expected: std::mem::size_of::<T>(),
            actual: data.len(),
        })
}
