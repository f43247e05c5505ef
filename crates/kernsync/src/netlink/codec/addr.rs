//! Address requests and address record decoding.

use crate::netlink::attr::{get, walk_attrs};
use crate::netlink::error::{Error, Result};
use crate::netlink::message::{NLM_F_ACK, NLM_F_CREATE, NLM_F_EXCL, NLM_F_REQUEST, NlMsgType};
use crate::netlink::messages::AddressDescriptor;
use crate::netlink::types::addr::{IFA_F_PERMANENT, IfAddrMsg, ifa};
use crate::netlink::types::route::RT_SCOPE_UNIVERSE;
use crate::netlink::types::{AF_INET, header_from_bytes};

use super::{Decoded, FilterReason, Operation, request_builder};

/// Add or delete a permanent, universe-scope IPv4 address.
pub fn encode_address_operation(op: Operation, address: &AddressDescriptor) -> Vec<u8> {
    let (kind, flags) = match op {
        Operation::Add => (
            NlMsgType::RTM_NEWADDR,
            NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL,
        ),
        Operation::Delete => (NlMsgType::RTM_DELADDR, NLM_F_REQUEST | NLM_F_ACK),
    };

    let mut builder = request_builder(kind, flags, IfAddrMsg::SIZE);
    builder.append_header(&IfAddrMsg {
        ifa_family: AF_INET,
        ifa_prefixlen: address.prefix_length,
        ifa_flags: IFA_F_PERMANENT,
        ifa_scope: RT_SCOPE_UNIVERSE,
        ifa_index: address.port_index,
    });
    builder.append_attr(ifa::IFA_LOCAL, &address.address.octets());
    builder.finish()
}

/// Decode an RTM_NEWADDR/RTM_DELADDR payload.
///
/// With `filter` set, addresses whose scope is not universe (loopback and
/// link-local ones, mostly) come back as [`Decoded::Filtered`].
pub fn decode_address(payload: &[u8], filter: bool) -> Result<Decoded<AddressDescriptor>> {
    let header = *header_from_bytes::<IfAddrMsg>(payload)?;
    if header.ifa_family != AF_INET {
        if filter {
            return Ok(Decoded::Filtered(FilterReason::Family(header.ifa_family)));
        }
        return Err(Error::InvalidMessage(format!(
            "address family {} is not IPv4",
            header.ifa_family
        )));
    }
    if filter && header.ifa_scope != RT_SCOPE_UNIVERSE {
        return Ok(Decoded::Filtered(FilterReason::Scope(header.ifa_scope)));
    }

    let mut local = None;
    let mut address = None;
    walk_attrs(&payload[IfAddrMsg::SIZE..], |attr, data| {
        match attr {
            ifa::IFA_LOCAL => local = Some(get::ipv4(data)?),
            ifa::IFA_ADDRESS => address = Some(get::ipv4(data)?),
            _ => {}
        }
        Ok(())
    })?;

    // On point-to-point links IFA_ADDRESS is the peer; IFA_LOCAL is ours.
    let address = local.or(address).ok_or_else(|| {
        Error::InvalidMessage(format!(
            "address record for port {} has no address",
            header.ifa_index
        ))
    })?;

    Ok(Decoded::Item(AddressDescriptor::new(
        address,
        header.ifa_prefixlen,
        header.ifa_index,
    )))
}
