//! Link requests and link record decoding.

use crate::netlink::attr::{AttrIter, get, walk_attrs};
use crate::netlink::error::{Error, Result};
use crate::netlink::message::{NLM_F_ACK, NLM_F_CREATE, NLM_F_EXCL, NLM_F_REQUEST, NlMsgType};
use crate::netlink::messages::{MacAddress, PortDescriptor, PortInfo, PortKind};
use crate::netlink::types::header_from_bytes;
use crate::netlink::types::link::{ARPHRD_ETHER, IFF_UP, IfInfoMsg, ifla, info, vlan};
use crate::util::ifname;

use super::{Decoded, FilterReason, request_builder};

/// Administrative operation on an existing port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortOperation {
    SetUp,
    SetDown,
    Delete,
}

/// Set a port up or down, or delete it.
pub fn encode_port_operation(op: PortOperation, index: u32) -> Vec<u8> {
    let (kind, flags) = match op {
        PortOperation::SetUp => (NlMsgType::RTM_NEWLINK, IFF_UP),
        PortOperation::SetDown => (NlMsgType::RTM_NEWLINK, 0),
        PortOperation::Delete => (NlMsgType::RTM_DELLINK, 0),
    };

    let mut builder = request_builder(kind, NLM_F_REQUEST | NLM_F_ACK, IfInfoMsg::SIZE);
    builder.append_header(&IfInfoMsg::new().with_index(index).with_flags(flags, IFF_UP));
    builder.finish()
}

fn check_name(name: &str) -> Result<()> {
    ifname::validate(name).map_err(|e| Error::InvalidName(e.to_string()))
}

/// Create a virtual link of the given kind.
pub fn encode_add_link(
    kind: &str,
    name: &str,
    mac: Option<MacAddress>,
    mtu: Option<u32>,
) -> Result<Vec<u8>> {
    check_name(name)?;
    if kind.is_empty() {
        return Err(Error::InvalidMessage("link kind is empty".into()));
    }

    let mut builder = request_builder(
        NlMsgType::RTM_NEWLINK,
        NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL,
        IfInfoMsg::SIZE,
    );
    builder.append_header(&IfInfoMsg::new());
    builder.append_attr_str(ifla::IFLA_IFNAME, name);
    if let Some(mac) = mac {
        builder.append_attr(ifla::IFLA_ADDRESS, &mac.octets());
    }
    if let Some(mtu) = mtu {
        builder.append_attr_u32(ifla::IFLA_MTU, mtu);
    }

    let linkinfo = builder.nest_start(ifla::IFLA_LINKINFO);
    builder.append_attr_string(info::IFLA_INFO_KIND, kind);
    builder.nest_end(linkinfo);

    Ok(builder.finish())
}

/// Enslave `index` to `master`; a master of 0 releases it.
pub fn encode_enslave(index: u32, master: u32) -> Vec<u8> {
    let mut builder = request_builder(
        NlMsgType::RTM_NEWLINK,
        NLM_F_REQUEST | NLM_F_ACK,
        IfInfoMsg::SIZE,
    );
    builder.append_header(&IfInfoMsg::new().with_index(index));
    builder.append_attr_u32(ifla::IFLA_MASTER, master);
    builder.finish()
}

/// Create VLAN `vlan_id` named `name` on top of `lower_link`.
pub fn encode_vlan(vlan_id: u16, lower_link: u32, name: &str) -> Result<Vec<u8>> {
    check_name(name)?;
    if !(1..=4094).contains(&vlan_id) {
        return Err(Error::InvalidVlanId(vlan_id));
    }

    let mut builder = request_builder(
        NlMsgType::RTM_NEWLINK,
        NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL,
        IfInfoMsg::SIZE,
    );
    builder.append_header(&IfInfoMsg::new());
    builder.append_attr_u32(ifla::IFLA_LINK, lower_link);
    builder.append_attr_str(ifla::IFLA_IFNAME, name);

    let linkinfo = builder.nest_start(ifla::IFLA_LINKINFO);
    builder.append_attr_string(info::IFLA_INFO_KIND, "vlan");
    let data = builder.nest_start(info::IFLA_INFO_DATA);
    builder.append_attr_u16(vlan::IFLA_VLAN_ID, vlan_id);
    builder.nest_end(data);
    builder.nest_end(linkinfo);

    Ok(builder.finish())
}

/// Decode an RTM_NEWLINK/RTM_DELLINK payload.
///
/// With `filter` set, non-Ethernet links come back as
/// [`Decoded::Filtered`].
pub fn decode_link(payload: &[u8], filter: bool) -> Result<Decoded<PortDescriptor>> {
    let header = *header_from_bytes::<IfInfoMsg>(payload)?;
    if filter && header.ifi_type != ARPHRD_ETHER {
        return Ok(Decoded::Filtered(FilterReason::NotEthernet(header.ifi_type)));
    }

    let index = header.index();
    let mut port = PortDescriptor {
        info: PortInfo {
            index,
            flags: header.ifi_flags,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut kind = None;
    let mut vlan_tag = None;

    walk_attrs(&payload[IfInfoMsg::SIZE..], |attr, data| {
        match attr {
            ifla::IFLA_IFNAME => port.info.name = get::string(data)?.to_string(),
            // Non-Ethernet links carry other address lengths.
            ifla::IFLA_ADDRESS if data.len() == 6 => {
                port.info.hardware_address = Some(MacAddress(get::mac(data)?));
            }
            ifla::IFLA_MTU => port.info.mtu = get::u32_ne(data)?,
            ifla::IFLA_LINK => {
                let link = get::u32_ne(data)?;
                port.link = (link != 0 && link != index).then_some(link);
            }
            ifla::IFLA_MASTER => {
                let master = get::u32_ne(data)?;
                port.master = (master != 0).then_some(master);
            }
            ifla::IFLA_OPERSTATE => port.oper_state = Some(get::u8(data)?),
            ifla::IFLA_LINKINFO => {
                let (k, tag) = parse_link_info(data)?;
                kind = k;
                vlan_tag = tag;
            }
            _ => {}
        }
        Ok(())
    })?;

    port.kind = match PortKind::from_kind(kind.unwrap_or_default()) {
        PortKind::Vlan { .. } => PortKind::Vlan {
            tag: vlan_tag.unwrap_or_default(),
            lower_link: port.link,
        },
        other => other,
    };

    Ok(Decoded::Item(port))
}

/// Returns the link-info kind and, for VLANs only, the VLAN id.
fn parse_link_info(data: &[u8]) -> Result<(Option<&str>, Option<u16>)> {
    let mut kind = None;
    let mut info_data = None;

    for (attr, payload) in AttrIter::new(data) {
        match attr {
            info::IFLA_INFO_KIND => kind = Some(get::string(payload)?),
            info::IFLA_INFO_DATA => info_data = Some(payload),
            _ => {}
        }
    }

    let mut tag = None;
    if kind == Some("vlan")
        && let Some(info_data) = info_data
    {
        for (attr, payload) in AttrIter::new(info_data) {
            if attr == vlan::IFLA_VLAN_ID {
                tag = Some(get::u16_ne(payload)?);
            }
        }
    }

    Ok((kind, tag))
}
