//! Dump (table listing) requests.

use crate::netlink::message::{NLM_F_DUMP, NLM_F_REQUEST, NlMsgType};
use crate::netlink::types::{AF_INET, AF_UNSPEC, RtGenMsg};

use super::request_builder;

/// The three tables the engine can dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DumpKind {
    Links,
    Addresses,
    Routes,
}

impl DumpKind {
    /// Request message kind (RTM_GET*).
    pub fn request_type(self) -> u16 {
        match self {
            DumpKind::Links => NlMsgType::RTM_GETLINK,
            DumpKind::Addresses => NlMsgType::RTM_GETADDR,
            DumpKind::Routes => NlMsgType::RTM_GETROUTE,
        }
    }

    /// Address family the dump asks for.
    pub fn family(self) -> u8 {
        match self {
            DumpKind::Links => AF_UNSPEC,
            DumpKind::Addresses | DumpKind::Routes => AF_INET,
        }
    }

    /// Map either a GET request kind or a NEW record kind to its table.
    pub fn from_message_type(kind: u16) -> Option<Self> {
        match kind {
            NlMsgType::RTM_GETLINK | NlMsgType::RTM_NEWLINK => Some(DumpKind::Links),
            NlMsgType::RTM_GETADDR | NlMsgType::RTM_NEWADDR => Some(DumpKind::Addresses),
            NlMsgType::RTM_GETROUTE | NlMsgType::RTM_NEWROUTE => Some(DumpKind::Routes),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DumpKind::Links => "links",
            DumpKind::Addresses => "addresses",
            DumpKind::Routes => "routes",
        }
    }
}

/// Header-only dump request for `dump_type` (an RTM_GET* kind).
///
/// The one-byte `rtgenmsg` body is padded to four bytes.
pub fn encode_dump_request(dump_type: u16, family: u8) -> Vec<u8> {
    let mut builder = request_builder(
        dump_type,
        NLM_F_REQUEST | NLM_F_DUMP,
        std::mem::size_of::<RtGenMsg>(),
    );
    builder.append_header(&RtGenMsg::new(family));
    builder.finish()
}
