//! IPv4 route descriptor and route origin.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use super::port_matches;
use crate::netlink::error::Error;
use crate::netlink::types::route::{
    RTPROT_BOOT, RTPROT_KERNEL, RTPROT_STATIC, RTPROT_UNSPEC, RTPROT_ZEBRA,
};

/// Who installed a route, from the rtmsg protocol byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum RouteOrigin {
    Unknown,
    Kernel,
    Boot,
    #[default]
    Static,
    Zebra,
}

impl RouteOrigin {
    pub fn from_protocol(protocol: u8) -> Self {
        match protocol {
            RTPROT_KERNEL => RouteOrigin::Kernel,
            RTPROT_BOOT => RouteOrigin::Boot,
            RTPROT_STATIC => RouteOrigin::Static,
            RTPROT_ZEBRA => RouteOrigin::Zebra,
            _ => RouteOrigin::Unknown,
        }
    }

    pub fn protocol(self) -> u8 {
        match self {
            RouteOrigin::Unknown => RTPROT_UNSPEC,
            RouteOrigin::Kernel => RTPROT_KERNEL,
            RouteOrigin::Boot => RTPROT_BOOT,
            RouteOrigin::Static => RTPROT_STATIC,
            RouteOrigin::Zebra => RTPROT_ZEBRA,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RouteOrigin::Unknown => "unknown",
            RouteOrigin::Kernel => "kernel",
            RouteOrigin::Boot => "boot",
            RouteOrigin::Static => "static",
            RouteOrigin::Zebra => "zebra",
        }
    }
}

impl fmt::Display for RouteOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouteOrigin {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unknown" => Ok(RouteOrigin::Unknown),
            "kernel" => Ok(RouteOrigin::Kernel),
            "boot" => Ok(RouteOrigin::Boot),
            "static" => Ok(RouteOrigin::Static),
            "zebra" => Ok(RouteOrigin::Zebra),
            other => Err(Error::InvalidMessage(format!("unknown route origin: {}", other))),
        }
    }
}

/// An IPv4 route in the main table.
///
/// Equality compares destination, prefix length, source and gateway, and
/// ignores `port_index` when either side is [`ANY_PORT`]. Metric and origin
/// are not compared.
///
/// [`ANY_PORT`]: super::ANY_PORT
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RouteDescriptor {
    pub destination: Ipv4Addr,
    pub prefix_length: u8,
    /// Preferred source address.
    pub source: Option<Ipv4Addr>,
    pub gateway: Option<Ipv4Addr>,
    pub metric: Option<u32>,
    /// Outgoing port, 0 when unknown.
    pub port_index: u32,
    pub origin: RouteOrigin,
}

impl RouteDescriptor {
    /// Route to `destination/prefix_length` with no gateway or port yet.
    pub fn new(destination: Ipv4Addr, prefix_length: u8) -> Self {
        Self {
            destination,
            prefix_length,
            source: None,
            gateway: None,
            metric: None,
            port_index: 0,
            origin: RouteOrigin::default(),
        }
    }

    pub fn gateway(mut self, gateway: Ipv4Addr) -> Self {
        self.gateway = (!gateway.is_unspecified()).then_some(gateway);
        self
    }

    pub fn port(mut self, index: u32) -> Self {
        self.port_index = index;
        self
    }

    pub fn source(mut self, source: Ipv4Addr) -> Self {
        self.source = (!source.is_unspecified()).then_some(source);
        self
    }

    pub fn metric(mut self, metric: u32) -> Self {
        self.metric = (metric != 0).then_some(metric);
        self
    }

    pub fn origin(mut self, origin: RouteOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// True for 0.0.0.0/0.
    pub fn is_default(&self) -> bool {
        self.prefix_length == 0
    }

    /// `destination/prefix_length`.
    pub fn prefix(&self) -> String {
        format!("{}/{}", self.destination, self.prefix_length)
    }
}

impl PartialEq for RouteDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.destination == other.destination
            && self.prefix_length == other.prefix_length
            && self.source == other.source
            && self.gateway == other.gateway
            && port_matches(self.port_index, other.port_index)
    }
}

impl fmt::Display for RouteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default() {
            f.write_str("default")?;
        } else {
            f.write_str(&self.prefix())?;
        }
        if let Some(gw) = self.gateway {
            write!(f, " via {}", gw)?;
        }
        if self.port_index != 0 {
            write!(f, " dev {}", self.port_index)?;
        }
        if let Some(src) = self.source {
            write!(f, " src {}", src)?;
        }
        if let Some(metric) = self.metric {
            write!(f, " metric {}", metric)?;
        }
        write!(f, " proto {}", self.origin)
    }
}
