//! Kernel synchronization engine for a software router.
//!
//! Keeps a router's view of links, IPv4 addresses and IPv4 routes in step
//! with the Linux kernel over rtnetlink. Requests (create/delete links, set
//! ports up or down, add/remove addresses and routes, dump tables) run on a
//! dedicated command thread; kernel change notifications are decoded on a
//! second thread and broadcast as [`KernelEvent`]s.
//!
//! # Features
//!
//! - `serde` - Serialize descriptors and events, load [`Config`] from JSON
//! - `integration` - Root-only integration tests in scratch namespaces
//!
//! # Example
//!
//! ```ignore
//! use std::net::Ipv4Addr;
//! use kernsync::{AddressDescriptor, Config, Transport};
//!
//! #[tokio::main]
//! async fn main() -> kernsync::Result<()> {
//!     let transport = Transport::new(Config::default());
//!     transport.start()?;
//!
//!     transport.set_port_up(2).await?;
//!     transport
//!         .add_address(AddressDescriptor::new(Ipv4Addr::new(10, 0, 0, 1), 24, 2))
//!         .await?;
//!
//!     for route in transport.dump_routes().await? {
//!         println!("{}", route);
//!     }
//!     Ok(())
//! }
//! ```

pub mod netlink;
pub mod util;

// Re-export common types at crate root for convenience
pub use netlink::{
    AddressDescriptor, Command, Config, Error, EventSubscription, KernelEvent, MacAddress,
    PendingReply, PortDescriptor, PortKind, Reply, Result, RouteDescriptor, RouteOrigin,
    SequenceCounter, Transport, TransportState,
};
