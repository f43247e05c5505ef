//! Route requests and route record decoding.

use std::net::Ipv4Addr;

use crate::netlink::attr::{get, walk_attrs};
use crate::netlink::error::{Error, Result};
use crate::netlink::message::{NLM_F_ACK, NLM_F_CREATE, NLM_F_EXCL, NLM_F_REQUEST, NlMsgType};
use crate::netlink::messages::{RouteDescriptor, RouteOrigin};
use crate::netlink::types::route::{
    RT_SCOPE_LINK, RT_SCOPE_NOWHERE, RT_SCOPE_UNIVERSE, RT_TABLE_LOCAL, RT_TABLE_MAIN,
    RTM_F_CLONED, RTN_UNICAST, RTN_UNSPEC, RTPROT_REDIRECT, RTPROT_UNSPEC, RtMsg, rta,
};
use crate::netlink::types::{AF_INET, header_from_bytes};

use super::{Decoded, FilterReason, Operation, request_builder};

/// Add or delete an IPv4 route in the main table.
///
/// A delete names the outgoing port only when it is known; the kernel then
/// refuses to delete a route whose gateway is on another port, which is
/// accepted behavior. An add without a gateway is a link-scope route and
/// must name its port.
pub fn encode_route_operation(op: Operation, route: &RouteDescriptor) -> Result<Vec<u8>> {
    let mut header = RtMsg {
        rtm_family: AF_INET,
        rtm_dst_len: route.prefix_length,
        rtm_table: RT_TABLE_MAIN,
        ..Default::default()
    };

    match op {
        Operation::Delete => {
            header.rtm_type = RTN_UNSPEC;
            header.rtm_protocol = RTPROT_UNSPEC;
            header.rtm_scope = RT_SCOPE_NOWHERE;

            let mut builder = request_builder(
                NlMsgType::RTM_DELROUTE,
                NLM_F_REQUEST | NLM_F_ACK,
                RtMsg::SIZE,
            );
            builder.append_header(&header);
            builder.append_attr(rta::RTA_DST, &route.destination.octets());
            if route.port_index != 0 {
                builder.append_attr_u32(rta::RTA_OIF, route.port_index);
            }
            Ok(builder.finish())
        }
        Operation::Add => {
            if route.gateway.is_none() && route.port_index == 0 {
                return Err(Error::MissingPort(route.prefix()));
            }

            header.rtm_type = RTN_UNICAST;
            header.rtm_protocol = route.origin.protocol();
            header.rtm_scope = if route.gateway.is_some() {
                RT_SCOPE_UNIVERSE
            } else {
                RT_SCOPE_LINK
            };

            let mut builder = request_builder(
                NlMsgType::RTM_NEWROUTE,
                NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL,
                RtMsg::SIZE,
            );
            builder.append_header(&header);
            builder.append_attr(rta::RTA_DST, &route.destination.octets());
            if let Some(gateway) = route.gateway {
                builder.append_attr(rta::RTA_GATEWAY, &gateway.octets());
            }
            if route.port_index != 0 {
                builder.append_attr_u32(rta::RTA_OIF, route.port_index);
            }
            if let Some(source) = route.source {
                builder.append_attr(rta::RTA_PREFSRC, &source.octets());
            }
            if let Some(metric) = route.metric.filter(|m| *m != 0) {
                builder.append_attr_u32(rta::RTA_PRIORITY, metric);
            }
            Ok(builder.finish())
        }
    }
}

/// Why a route record is of no interest, if it isn't.
fn route_filter(header: &RtMsg) -> Option<FilterReason> {
    if header.rtm_family != AF_INET {
        Some(FilterReason::Family(header.rtm_family))
    } else if header.rtm_table == RT_TABLE_LOCAL {
        Some(FilterReason::LocalTable)
    } else if header.rtm_type != RTN_UNICAST {
        Some(FilterReason::NotUnicast(header.rtm_type))
    } else if header.rtm_protocol == RTPROT_REDIRECT {
        Some(FilterReason::Redirect)
    } else if header.rtm_src_len != 0 {
        Some(FilterReason::SourcePrefix(header.rtm_src_len))
    } else if header.rtm_flags & RTM_F_CLONED != 0 {
        Some(FilterReason::Cloned)
    } else {
        None
    }
}

/// Decode an RTM_NEWROUTE/RTM_DELROUTE payload.
///
/// With `filter` set, local-table, non-unicast, redirect-installed,
/// source-routed and cloned routes come back as [`Decoded::Filtered`].
pub fn decode_route(payload: &[u8], filter: bool) -> Result<Decoded<RouteDescriptor>> {
    let header = *header_from_bytes::<RtMsg>(payload)?;
    if filter && let Some(reason) = route_filter(&header) {
        return Ok(Decoded::Filtered(reason));
    }
    if header.rtm_family != AF_INET {
        return Err(Error::InvalidMessage(format!(
            "route family {} is not IPv4",
            header.rtm_family
        )));
    }

    let mut route = RouteDescriptor::new(Ipv4Addr::UNSPECIFIED, header.rtm_dst_len)
        .origin(RouteOrigin::from_protocol(header.rtm_protocol));

    walk_attrs(&payload[RtMsg::SIZE..], |attr, data| {
        match attr {
            rta::RTA_DST => route.destination = get::ipv4(data)?,
            rta::RTA_GATEWAY => route = route.gateway(get::ipv4(data)?),
            rta::RTA_PREFSRC => route = route.source(get::ipv4(data)?),
            rta::RTA_OIF => route.port_index = get::u32_ne(data)?,
            rta::RTA_PRIORITY => route = route.metric(get::u32_ne(data)?),
            _ => {}
        }
        Ok(())
    })?;

    Ok(Decoded::Item(route))
}
