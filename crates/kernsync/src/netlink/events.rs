//! Kernel change notifications and their subscription handle.
//!
//! # Example
//!
//! ```ignore
//! use kernsync::{Config, KernelEvent, Transport};
//! use tokio_stream::StreamExt;
//!
//! let transport = Transport::new(Config::default());
//! transport.start()?;
//!
//! let mut events = transport.subscribe().into_stream();
//! while let Some(event) = events.next().await {
//!     match event? {
//!         KernelEvent::LinkAdminUp(port) => println!("{} is up", port.name()),
//!         KernelEvent::RouteAdded(route) => println!("new route {}", route),
//!         _ => {}
//!     }
//! }
//! ```

use std::fmt;

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{Stream, StreamExt};

use super::error::{Error, Result};
use super::messages::{AddressDescriptor, PortDescriptor, RouteDescriptor};

/// A change the kernel announced on one of the subscribed groups.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "event", content = "data", rename_all = "snake_case"))]
pub enum KernelEvent {
    /// A link appeared.
    LinkAdded(PortDescriptor),
    /// A link was set administratively up.
    LinkAdminUp(PortDescriptor),
    /// A link was set administratively down.
    LinkAdminDown(PortDescriptor),
    LinkDeleted(PortDescriptor),
    /// A link changed in some way that is not add or up/down (carrier,
    /// MTU, rename, ...).
    LinkUndecoded(PortDescriptor),
    AddressAdded(AddressDescriptor),
    AddressRemoved(AddressDescriptor),
    RouteAdded(RouteDescriptor),
    RouteRemoved(RouteDescriptor),
}

impl KernelEvent {
    pub fn is_link(&self) -> bool {
        matches!(
            self,
            KernelEvent::LinkAdded(_)
                | KernelEvent::LinkAdminUp(_)
                | KernelEvent::LinkAdminDown(_)
                | KernelEvent::LinkDeleted(_)
                | KernelEvent::LinkUndecoded(_)
        )
    }

    pub fn is_address(&self) -> bool {
        matches!(
            self,
            KernelEvent::AddressAdded(_) | KernelEvent::AddressRemoved(_)
        )
    }

    pub fn is_route(&self) -> bool {
        matches!(self, KernelEvent::RouteAdded(_) | KernelEvent::RouteRemoved(_))
    }

    /// Interface index the event concerns; 0 for routes via a gateway with
    /// no known port.
    pub fn port_index(&self) -> u32 {
        match self {
            KernelEvent::LinkAdded(p)
            | KernelEvent::LinkAdminUp(p)
            | KernelEvent::LinkAdminDown(p)
            | KernelEvent::LinkDeleted(p)
            | KernelEvent::LinkUndecoded(p) => p.index(),
            KernelEvent::AddressAdded(a) | KernelEvent::AddressRemoved(a) => a.port_index,
            KernelEvent::RouteAdded(r) | KernelEvent::RouteRemoved(r) => r.port_index,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            KernelEvent::LinkAdded(_) => "link-added",
            KernelEvent::LinkAdminUp(_) => "link-up",
            KernelEvent::LinkAdminDown(_) => "link-down",
            KernelEvent::LinkDeleted(_) => "link-deleted",
            KernelEvent::LinkUndecoded(_) => "link-changed",
            KernelEvent::AddressAdded(_) => "address-added",
            KernelEvent::AddressRemoved(_) => "address-removed",
            KernelEvent::RouteAdded(_) => "route-added",
            KernelEvent::RouteRemoved(_) => "route-removed",
        }
    }
}

impl fmt::Display for KernelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelEvent::LinkAdded(p)
            | KernelEvent::LinkAdminUp(p)
            | KernelEvent::LinkAdminDown(p)
            | KernelEvent::LinkDeleted(p)
            | KernelEvent::LinkUndecoded(p) => write!(f, "[{}] {}", self.kind_name(), p),
            KernelEvent::AddressAdded(a) | KernelEvent::AddressRemoved(a) => {
                write!(f, "[{}] {}", self.kind_name(), a)
            }
            KernelEvent::RouteAdded(r) | KernelEvent::RouteRemoved(r) => {
                write!(f, "[{}] {}", self.kind_name(), r)
            }
        }
    }
}

/// Receiving end of the transport's event broadcast.
///
/// Each subscription sees every event published after it was created. A
/// subscriber that falls more than the configured capacity behind loses the
/// oldest events and is told so with [`Error::Lagged`].
pub struct EventSubscription {
    rx: broadcast::Receiver<KernelEvent>,
}

impl EventSubscription {
    pub(crate) fn new(rx: broadcast::Receiver<KernelEvent>) -> Self {
        Self { rx }
    }

    /// Block until the next event. Must not be called from async code.
    pub fn recv(&mut self) -> Result<KernelEvent> {
        self.rx.blocking_recv().map_err(from_recv_error)
    }

    /// Wait for the next event.
    pub async fn next_event(&mut self) -> Result<KernelEvent> {
        self.rx.recv().await.map_err(from_recv_error)
    }

    /// Take an event if one is queued.
    pub fn try_recv(&mut self) -> Result<Option<KernelEvent>> {
        match self.rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Lagged(n)) => Err(Error::Lagged(n)),
            Err(TryRecvError::Closed) => Err(Error::Stopped),
        }
    }

    /// Convert into a `Stream` of events.
    pub fn into_stream(self) -> impl Stream<Item = Result<KernelEvent>> + Send + Unpin {
        BroadcastStream::new(self.rx).map(|item| {
            item.map_err(|e| match e {
                BroadcastStreamRecvError::Lagged(n) => Error::Lagged(n),
            })
        })
    }
}

fn from_recv_error(e: RecvError) -> Error {
    match e {
        RecvError::Lagged(n) => Error::Lagged(n),
        RecvError::Closed => Error::Stopped,
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::netlink::messages::PortInfo;

    fn port(index: u32) -> PortDescriptor {
        PortDescriptor {
            info: PortInfo {
                index,
                name: format!("eth{}", index),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_helpers() {
        let event = KernelEvent::LinkAdminUp(port(3));
        assert!(event.is_link());
        assert_eq!(event.port_index(), 3);
        assert_eq!(event.kind_name(), "link-up");

        let event =
            KernelEvent::AddressAdded(AddressDescriptor::new(Ipv4Addr::new(10, 0, 0, 1), 24, 7));
        assert!(event.is_address());
        assert!(!event.is_link());
        assert_eq!(event.port_index(), 7);
    }

    #[test]
    fn test_try_recv_and_lag() {
        let (tx, rx) = broadcast::channel(2);
        let mut sub = EventSubscription::new(rx);
        assert!(sub.try_recv().unwrap().is_none());

        for i in 1..=3 {
            tx.send(KernelEvent::LinkDeleted(port(i))).unwrap();
        }
        assert!(matches!(sub.try_recv(), Err(Error::Lagged(1))));
        assert_eq!(sub.try_recv().unwrap().unwrap().port_index(), 2);
        assert_eq!(sub.try_recv().unwrap().unwrap().port_index(), 3);

        drop(tx);
        assert!(matches!(sub.try_recv(), Err(Error::Stopped)));
    }

    #[tokio::test]
    async fn test_stream() {
        let (tx, rx) = broadcast::channel(8);
        let mut stream = EventSubscription::new(rx).into_stream();

        tx.send(KernelEvent::LinkAdded(port(4))).unwrap();
        drop(tx);

        let event = stream.next().await.unwrap().unwrap();
        assert_eq!(event, KernelEvent::LinkAdded(port(4)));
        assert!(stream.next().await.is_none());
    }
}
