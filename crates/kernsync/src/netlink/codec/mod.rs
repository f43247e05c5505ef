//! Wire codec: pure encoders and decoders for rtnetlink requests and records.
//!
//! Encoders return a complete frame with sequence number and port id left at
//! zero; the reply correlator stamps them before sending. Decoders take the
//! frame payload (everything after the netlink header) and apply the
//! filtering policy when asked to.

mod addr;
mod dump;
mod link;
mod route;

use std::fmt;

pub use addr::{decode_address, encode_address_operation};
pub use dump::{DumpKind, encode_dump_request};
pub use link::{
    PortOperation, decode_link, encode_add_link, encode_enslave, encode_port_operation,
    encode_vlan,
};
pub use route::{decode_route, encode_route_operation};

use super::builder::MessageBuilder;
use super::message::NLMSG_HDRLEN;

/// Room for attributes after the fixed header of a request.
pub const REQUEST_ATTR_SPACE: usize = 1024;

/// Builder sized for one request with a fixed header of `header_len` bytes.
fn request_builder(kind: u16, flags: u16, header_len: usize) -> MessageBuilder {
    MessageBuilder::with_capacity_limit(kind, flags, NLMSG_HDRLEN + header_len + REQUEST_ATTR_SPACE)
}

/// Add or delete, for addresses and routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Delete,
}

/// Why a well-formed record was dropped by the filtering policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterReason {
    /// Link hardware type is not Ethernet.
    NotEthernet(u16),
    /// Address scope is not universe.
    Scope(u8),
    /// Not an IPv4 record.
    Family(u8),
    /// Route lives in the local table.
    LocalTable,
    /// Route type is not unicast.
    NotUnicast(u8),
    /// Route was installed by an ICMP redirect.
    Redirect,
    /// Route has a source prefix.
    SourcePrefix(u8),
    /// Route is a cached clone.
    Cloned,
}

impl fmt::Display for FilterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterReason::NotEthernet(t) => write!(f, "hardware type {} is not ethernet", t),
            FilterReason::Scope(s) => write!(f, "scope {} is not universe", s),
            FilterReason::Family(af) => write!(f, "address family {} is not IPv4", af),
            FilterReason::LocalTable => f.write_str("local table"),
            FilterReason::NotUnicast(t) => write!(f, "route type {} is not unicast", t),
            FilterReason::Redirect => f.write_str("installed by redirect"),
            FilterReason::SourcePrefix(len) => write!(f, "source prefix /{}", len),
            FilterReason::Cloned => f.write_str("cloned route"),
        }
    }
}

/// Outcome of decoding one record.
///
/// `Filtered` is not an error: the record is well formed but of no interest,
/// and callers skip it silently.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum Decoded<T> {
    Item(T),
    Filtered(FilterReason),
}

impl<T> Decoded<T> {
    pub fn item(self) -> Option<T> {
        match self {
            Decoded::Item(item) => Some(item),
            Decoded::Filtered(_) => None,
        }
    }

    pub fn is_filtered(&self) -> bool {
        matches!(self, Decoded::Filtered(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Decoded<U> {
        match self {
            Decoded::Item(item) => Decoded::Item(f(item)),
            Decoded::Filtered(reason) => Decoded::Filtered(reason),
        }
    }
}
