//! rtnetlink synchronization engine.
//!
//! Layers, bottom up:
//!
//! - [`message`], [`attr`], `builder`: netlink frames and attributes.
//! - [`types`]: the kernel's fixed headers and constants.
//! - [`codec`]: pure encoders and decoders for link, address and route
//!   requests and records.
//! - [`correlator`]: matches replies to requests on the command socket.
//! - [`dispatch`]: the outbound (command) and inbound (notification) tables.
//! - [`Transport`]: the two sockets and their threads, the request API and
//!   the event subscription.
//!
//! # Quick Start
//!
//! ```ignore
//! use kernsync::netlink::{Config, Transport};
//!
//! let transport = Transport::new(Config::default());
//! transport.start()?;
//!
//! for port in transport.dump_links().wait()? {
//!     println!("{}", port);
//! }
//!
//! let mut events = transport.subscribe();
//! loop {
//!     println!("{}", events.recv()?);
//! }
//! ```

pub mod attr;
mod builder;
pub mod codec;
pub mod config;
pub mod correlator;
pub mod dispatch;
mod error;
pub mod events;
pub mod message;
pub mod messages;
mod pending;
pub mod seq;
mod socket;
mod transport;
pub mod types;

pub use attr::{AttrIter, NlAttr};
pub use builder::{MAX_REQUEST_LEN, MessageBuilder, NestToken};
pub use codec::{Decoded, DumpKind, FilterReason};
pub use config::Config;
pub use correlator::{Dump, FrameIo, Reply, ReplyCorrelator};
pub use dispatch::{Command, CommandKind, InboundKind, LinkChange, classify_link_change};
pub use error::{Error, Result};
pub use events::{EventSubscription, KernelEvent};
pub use message::{MessageIter, NLMSG_HDRLEN, NlMsgHdr, NlMsgType, ReplyEnvelope};
pub use messages::{
    AddressDescriptor, MacAddress, PortDescriptor, PortInfo, PortKind, RouteDescriptor,
    RouteOrigin,
};
pub use pending::PendingReply;
pub use seq::SequenceCounter;
pub use socket::{NetlinkSocket, Readiness, SocketRole, in_namespace, rtnetlink_groups};
pub use transport::{Transport, TransportState};
