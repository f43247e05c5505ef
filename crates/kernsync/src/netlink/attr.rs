//! Netlink attribute (rtattr) reading.

use winnow::binary::{Endianness, u16 as endian_u16};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::take;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::error::{Error, Result};

/// Netlink attribute alignment.
pub const NLA_ALIGNTO: usize = 4;

/// Align a length to NLA_ALIGNTO boundary.
#[inline]
pub const fn nla_align(len: usize) -> usize {
    (len + NLA_ALIGNTO - 1) & !(NLA_ALIGNTO - 1)
}

/// Size of the attribute header.
pub const NLA_HDRLEN: usize = 4; // nla_align(size_of::<NlAttr>())

/// Netlink attribute header (mirrors struct rtattr).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlAttr {
    /// Length including header, without trailing padding.
    pub nla_len: u16,
    /// Attribute type.
    pub nla_type: u16,
}

/// Attribute type flags.
pub const NLA_F_NESTED: u16 = 1 << 15;
pub const NLA_F_NET_BYTEORDER: u16 = 1 << 14;
pub const NLA_TYPE_MASK: u16 = !(NLA_F_NESTED | NLA_F_NET_BYTEORDER);

impl NlAttr {
    /// Create a new attribute header.
    pub fn new(attr_type: u16, data_len: usize) -> Self {
        Self {
            nla_len: (NLA_HDRLEN + data_len) as u16,
            nla_type: attr_type,
        }
    }

    /// Get the attribute type without flags.
    pub fn kind(&self) -> u16 {
        self.nla_type & NLA_TYPE_MASK
    }

    /// Check if this is a nested attribute.
    pub fn is_nested(&self) -> bool {
        self.nla_type & NLA_F_NESTED != 0
    }

    /// Convert to bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    /// Parse from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(data)
            .map(|(r, _)| r)
            .map_err(|_| Error::Truncated {
                expected: std::mem::size_of::<Self>(),
                actual: data.len(),
            })
    }
}

/// Result type of the attribute parsers.
pub(crate) type PResult<T> = std::result::Result<T, ErrMode<ContextError>>;

fn ne_u16(input: &mut &[u8]) -> PResult<u16> {
    endian_u16(Endianness::Native).parse_next(input)
}

fn take_bytes<'a>(input: &mut &'a [u8], count: usize) -> PResult<&'a [u8]> {
    take(count).parse_next(input)
}

/// Parse one attribute, consuming its trailing padding.
///
/// Returns the type with flag bits masked off and the unpadded payload.
pub(crate) fn parse_attr<'a>(input: &mut &'a [u8]) -> PResult<(u16, &'a [u8])> {
    let len = ne_u16(input)? as usize;
    let kind = ne_u16(input)?;
    if len < NLA_HDRLEN {
        return Err(ErrMode::Cut(ContextError::new()));
    }

    let payload = take_bytes(input, len - NLA_HDRLEN)?;
    // The last attribute of a message may omit its padding.
    let pad = (nla_align(len) - len).min(input.len());
    take_bytes(input, pad)?;

    Ok((kind & NLA_TYPE_MASK, payload))
}

/// Parse every attribute in `input`, calling `visit` for each.
pub(crate) fn walk_attrs<'a>(
    mut input: &'a [u8],
    mut visit: impl FnMut(u16, &'a [u8]) -> Result<()>,
) -> Result<()> {
    while input.len() >= NLA_HDRLEN {
        let (kind, payload) = parse_attr(&mut input).map_err(|_| {
            Error::InvalidAttribute(format!("malformed attribute, {} bytes left", input.len()))
        })?;
        visit(kind, payload)?;
    }
    Ok(())
}

/// Iterator over netlink attributes in a buffer.
///
/// Stops at the first malformed attribute.
pub struct AttrIter<'a> {
    data: &'a [u8],
}

impl<'a> AttrIter<'a> {
    /// Create a new attribute iterator.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a> Iterator for AttrIter<'a> {
    /// Returns (attribute type, payload data).
    type Item = (u16, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.len() < NLA_HDRLEN {
            return None;
        }
        match parse_attr(&mut self.data) {
            Ok(item) => Some(item),
            Err(_) => {
                self.data = &[];
                None
            }
        }
    }
}

/// Helper functions for extracting typed values from attribute payloads.
pub mod get {
    use std::net::Ipv4Addr;

    use super::*;

    /// Extract a u8 value.
    pub fn u8(data: &[u8]) -> Result<u8> {
        data.first()
            .copied()
            .ok_or_else(|| Error::InvalidAttribute("empty u8 attribute".into()))
    }

    /// Extract a u16 value (native endian).
    pub fn u16_ne(data: &[u8]) -> Result<u16> {
        match data {
            [a, b, ..] => Ok(u16::from_ne_bytes([*a, *b])),
            _ => Err(Error::InvalidAttribute("truncated u16 attribute".into())),
        }
    }

    /// Extract a u32 value (native endian).
    pub fn u32_ne(data: &[u8]) -> Result<u32> {
        match data {
            [a, b, c, d, ..] => Ok(u32::from_ne_bytes([*a, *b, *c, *d])),
            _ => Err(Error::InvalidAttribute("truncated u32 attribute".into())),
        }
    }

    /// Extract an IPv4 address (network order on the wire). The payload
    /// must be exactly four bytes.
    pub fn ipv4(data: &[u8]) -> Result<Ipv4Addr> {
        <[u8; 4]>::try_from(data)
            .map(Ipv4Addr::from)
            .map_err(|_| Error::InvalidAttribute(format!("IPv4 address of {} bytes", data.len())))
    }

    /// Extract a 6-byte hardware address.
    pub fn mac(data: &[u8]) -> Result<[u8; 6]> {
        data.get(..6)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| Error::InvalidAttribute(format!("hardware address of {} bytes", data.len())))
    }

    /// Extract a null-terminated string.
    pub fn string(data: &[u8]) -> Result<&str> {
        let len = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        std::str::from_utf8(&data[..len])
            .map_err(|e| Error::InvalidAttribute(format!("invalid UTF-8: {}", e)))
    }
}
