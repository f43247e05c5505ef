//! Dispatch tables.
//!
//! Outbound: every [`Command`] the request API can queue maps to exactly one
//! encoder, and its reply is collected by the correlator. Inbound: every
//! multicast message kind the engine subscribes to maps to exactly one
//! decoder producing a [`KernelEvent`]. Both tables are plain `match`es, so a
//! new variant does not compile until it has an entry.

use std::fmt;

use tracing::{info, warn};

use super::codec::{
    Decoded, DumpKind, Operation, PortOperation, decode_address, decode_link, decode_route,
    encode_add_link, encode_address_operation, encode_dump_request, encode_enslave,
    encode_port_operation, encode_route_operation, encode_vlan,
};
use super::correlator::{FrameIo, Reply, ReplyCorrelator};
use super::error::Result;
use super::events::KernelEvent;
use super::message::NlMsgType;
use super::messages::{AddressDescriptor, MacAddress, RouteDescriptor};
use super::types::header_from_bytes;
use super::types::link::{IFF_UP, IFI_CHANGE_ALL, IfInfoMsg};

/// A request for the command thread.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AddLink {
        kind: String,
        name: String,
        mac: Option<MacAddress>,
        mtu: Option<u32>,
    },
    AddVlan {
        vlan_id: u16,
        lower_link: u32,
        name: String,
    },
    DeleteLink(u32),
    SetPortUp(u32),
    SetPortDown(u32),
    Enslave {
        index: u32,
        master: u32,
    },
    Release(u32),
    AddAddress(AddressDescriptor),
    RemoveAddress(AddressDescriptor),
    AddRoute(RouteDescriptor),
    RemoveRoute(RouteDescriptor),
    DumpLinks,
    DumpAddresses,
    DumpRoutes,
}

/// Fieldless tag of a [`Command`], for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    AddLink,
    AddVlan,
    DeleteLink,
    SetPortUp,
    SetPortDown,
    Enslave,
    Release,
    AddAddress,
    RemoveAddress,
    AddRoute,
    RemoveRoute,
    DumpLinks,
    DumpAddresses,
    DumpRoutes,
}

impl CommandKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::AddLink => "add link",
            CommandKind::AddVlan => "add vlan",
            CommandKind::DeleteLink => "delete link",
            CommandKind::SetPortUp => "set port up",
            CommandKind::SetPortDown => "set port down",
            CommandKind::Enslave => "enslave",
            CommandKind::Release => "release",
            CommandKind::AddAddress => "add address",
            CommandKind::RemoveAddress => "remove address",
            CommandKind::AddRoute => "add route",
            CommandKind::RemoveRoute => "remove route",
            CommandKind::DumpLinks => "dump links",
            CommandKind::DumpAddresses => "dump addresses",
            CommandKind::DumpRoutes => "dump routes",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::AddLink { .. } => CommandKind::AddLink,
            Command::AddVlan { .. } => CommandKind::AddVlan,
            Command::DeleteLink(_) => CommandKind::DeleteLink,
            Command::SetPortUp(_) => CommandKind::SetPortUp,
            Command::SetPortDown(_) => CommandKind::SetPortDown,
            Command::Enslave { .. } => CommandKind::Enslave,
            Command::Release(_) => CommandKind::Release,
            Command::AddAddress(_) => CommandKind::AddAddress,
            Command::RemoveAddress(_) => CommandKind::RemoveAddress,
            Command::AddRoute(_) => CommandKind::AddRoute,
            Command::RemoveRoute(_) => CommandKind::RemoveRoute,
            Command::DumpLinks => CommandKind::DumpLinks,
            Command::DumpAddresses => CommandKind::DumpAddresses,
            Command::DumpRoutes => CommandKind::DumpRoutes,
        }
    }

    /// Encode into a request frame with sequence and port left at zero.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(match self {
            Command::AddLink {
                kind,
                name,
                mac,
                mtu,
            } => encode_add_link(kind, name, *mac, *mtu)?,
            Command::AddVlan {
                vlan_id,
                lower_link,
                name,
            } => encode_vlan(*vlan_id, *lower_link, name)?,
            Command::DeleteLink(index) => encode_port_operation(PortOperation::Delete, *index),
            Command::SetPortUp(index) => encode_port_operation(PortOperation::SetUp, *index),
            Command::SetPortDown(index) => encode_port_operation(PortOperation::SetDown, *index),
            Command::Enslave { index, master } => encode_enslave(*index, *master),
            Command::Release(index) => encode_enslave(*index, 0),
            Command::AddAddress(addr) => encode_address_operation(Operation::Add, addr),
            Command::RemoveAddress(addr) => encode_address_operation(Operation::Delete, addr),
            Command::AddRoute(route) => encode_route_operation(Operation::Add, route)?,
            Command::RemoveRoute(route) => encode_route_operation(Operation::Delete, route)?,
            Command::DumpLinks => dump(DumpKind::Links),
            Command::DumpAddresses => dump(DumpKind::Addresses),
            Command::DumpRoutes => dump(DumpKind::Routes),
        })
    }

    fn describe(&self) -> String {
        match self {
            Command::AddLink { kind, name, .. } => format!("{} {} ({})", self.kind(), name, kind),
            Command::AddVlan {
                vlan_id,
                lower_link,
                name,
            } => format!("{} {} id {} on {}", self.kind(), name, vlan_id, lower_link),
            Command::DeleteLink(index)
            | Command::SetPortUp(index)
            | Command::SetPortDown(index)
            | Command::Release(index) => format!("{} {}", self.kind(), index),
            Command::Enslave { index, master } => {
                format!("{} {} to {}", self.kind(), index, master)
            }
            Command::AddAddress(addr) | Command::RemoveAddress(addr) => {
                format!("{} {}", self.kind(), addr)
            }
            Command::AddRoute(route) | Command::RemoveRoute(route) => {
                format!("{} {}", self.kind(), route)
            }
            Command::DumpLinks | Command::DumpAddresses | Command::DumpRoutes => {
                self.kind().to_string()
            }
        }
    }
}

fn dump(kind: DumpKind) -> Vec<u8> {
    encode_dump_request(kind.request_type(), kind.family())
}

/// Outbound table: encode, send, correlate.
pub struct OutboundTable;

impl OutboundTable {
    pub fn execute<I: FrameIo>(
        correlator: &mut ReplyCorrelator<I>,
        command: &Command,
    ) -> Result<Reply> {
        let result = command
            .encode()
            .and_then(|request| correlator.send_and_correlate(request))
            .map_err(|e| e.with_context(command.describe()));

        match &result {
            Ok(_) => info!(command = %command.kind(), "{} succeeded", command.describe()),
            Err(e) => warn!(command = %command.kind(), error = %e, "request failed"),
        }
        result
    }
}

/// What an RTM_NEWLINK notification says happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkChange {
    Added,
    AdminUp,
    AdminDown,
    Undecoded,
}

/// Classify a link notification from its change mask and flags.
///
/// New links report every bit (or none, on older kernels) as changed. A
/// change of exactly IFF_UP is an administrative up/down. Anything else is
/// passed on undecoded.
pub fn classify_link_change(change: u32, flags: u32) -> LinkChange {
    match change {
        IFI_CHANGE_ALL | 0 => LinkChange::Added,
        IFF_UP if flags & IFF_UP != 0 => LinkChange::AdminUp,
        IFF_UP => LinkChange::AdminDown,
        _ => LinkChange::Undecoded,
    }
}

/// Inbound table entries, one per subscribed message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundKind {
    NewLink,
    DelLink,
    NewAddr,
    DelAddr,
    NewRoute,
    DelRoute,
}

impl InboundKind {
    pub fn from_message_type(kind: u16) -> Option<Self> {
        match kind {
            NlMsgType::RTM_NEWLINK => Some(InboundKind::NewLink),
            NlMsgType::RTM_DELLINK => Some(InboundKind::DelLink),
            NlMsgType::RTM_NEWADDR => Some(InboundKind::NewAddr),
            NlMsgType::RTM_DELADDR => Some(InboundKind::DelAddr),
            NlMsgType::RTM_NEWROUTE => Some(InboundKind::NewRoute),
            NlMsgType::RTM_DELROUTE => Some(InboundKind::DelRoute),
            _ => None,
        }
    }

    /// Decode a notification payload into an event.
    pub fn handle(self, payload: &[u8], filter: bool) -> Result<Decoded<KernelEvent>> {
        Ok(match self {
            InboundKind::NewLink => {
                let header = *header_from_bytes::<IfInfoMsg>(payload)?;
                let change = classify_link_change(header.ifi_change, header.ifi_flags);
                decode_link(payload, filter)?.map(|port| match change {
                    LinkChange::Added => KernelEvent::LinkAdded(port),
                    LinkChange::AdminUp => KernelEvent::LinkAdminUp(port),
                    LinkChange::AdminDown => KernelEvent::LinkAdminDown(port),
                    LinkChange::Undecoded => KernelEvent::LinkUndecoded(port),
                })
            }
            InboundKind::DelLink => decode_link(payload, filter)?.map(KernelEvent::LinkDeleted),
            InboundKind::NewAddr => {
                decode_address(payload, filter)?.map(KernelEvent::AddressAdded)
            }
            InboundKind::DelAddr => {
                decode_address(payload, filter)?.map(KernelEvent::AddressRemoved)
            }
            InboundKind::NewRoute => decode_route(payload, filter)?.map(KernelEvent::RouteAdded),
            InboundKind::DelRoute => decode_route(payload, filter)?.map(KernelEvent::RouteRemoved),
        })
    }
}
