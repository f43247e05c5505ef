//! Event subscription integration tests.

use std::net::Ipv4Addr;
use std::time::Duration;

use bytes::BytesMut;
use kernsync::netlink::{NetlinkSocket, Readiness, in_namespace};
use kernsync::{
    AddressDescriptor, Error, KernelEvent, Result, RouteDescriptor, Transport, TransportState,
};
use tokio_stream::{Stream, StreamExt};

use crate::common::{TestNamespace, port_index};

const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

/// Wait for the first event matching `pred`.
async fn wait_for<S>(events: &mut S, pred: impl Fn(&KernelEvent) -> bool) -> Option<KernelEvent>
where
    S: Stream<Item = Result<KernelEvent>> + Unpin,
{
    let deadline = tokio::time::Instant::now() + EVENT_TIMEOUT;
    loop {
        let next = tokio::time::timeout_at(deadline, events.next()).await.ok()??;
        match next {
            Ok(event) if pred(&event) => return Some(event),
            Ok(_) => continue,
            Err(e) => panic!("event stream failed: {}", e),
        }
    }
}

#[tokio::test]
async fn test_link_events() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("linkev")?;
    let transport = ns.transport()?;
    let mut events = transport.subscribe().into_stream();

    ns.add_dummy("dummy0")?;
    let added = wait_for(&mut events, |e| {
        matches!(e, KernelEvent::LinkAdded(p) if p.name() == "dummy0")
    })
    .await;
    assert!(added.is_some(), "no LinkAdded for dummy0");

    ns.link_up("dummy0")?;
    let up = wait_for(&mut events, |e| {
        matches!(e, KernelEvent::LinkAdminUp(p) if p.name() == "dummy0")
    })
    .await;
    assert!(up.is_some(), "no LinkAdminUp for dummy0");

    ns.ip(&["link", "del", "dummy0"])?;
    let deleted = wait_for(&mut events, |e| {
        matches!(e, KernelEvent::LinkDeleted(p) if p.name() == "dummy0")
    })
    .await;
    assert!(deleted.is_some(), "no LinkDeleted for dummy0");
    Ok(())
}

#[tokio::test]
async fn test_own_requests_are_published() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("ownev")?;
    ns.add_dummy("dummy0")?;
    ns.link_up("dummy0")?;
    let transport = ns.transport()?;
    let index = port_index(&transport, "dummy0").await?;
    let mut events = transport.subscribe().into_stream();

    let addr = AddressDescriptor::new(Ipv4Addr::new(10, 20, 0, 1), 24, index);
    transport.add_address(addr).await?;
    let event = wait_for(&mut events, |e| matches!(e, KernelEvent::AddressAdded(_))).await;
    assert_eq!(event, Some(KernelEvent::AddressAdded(addr)));

    let route = RouteDescriptor::new(Ipv4Addr::new(10, 30, 0, 0), 16).port(index);
    transport.add_route(route).await?;
    let event = wait_for(&mut events, |e| {
        matches!(e, KernelEvent::RouteAdded(r) if *r == route)
    })
    .await;
    assert!(event.is_some(), "no RouteAdded for {}", route);

    transport.remove_address(addr).await?;
    let event = wait_for(&mut events, |e| matches!(e, KernelEvent::AddressRemoved(_))).await;
    assert_eq!(event, Some(KernelEvent::AddressRemoved(addr)));
    Ok(())
}

#[tokio::test]
async fn test_blocking_subscription() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("blockev")?;
    let transport = ns.transport()?;
    let mut events = transport.subscribe();

    ns.add_dummy("dummy1")?;
    let event = tokio::task::spawn_blocking(move || events.recv())
        .await
        .expect("receiver task panicked")?;
    assert!(event.is_link());
    Ok(())
}

#[tokio::test]
async fn test_events_survive_socket_overrun() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("overrun")?;
    ns.add_dummy("dummy0")?;
    ns.link_up("dummy0")?;
    // Room for the whole backlog, so only socket overruns can lose events.
    let transport = Transport::new(ns.config().event_capacity(16384));
    transport.start()?;
    let index = port_index(&transport, "dummy0").await?;

    // Nobody reads this listener while the changes pile up.
    let groups = ns.config().groups;
    let listener = in_namespace(&ns.path(), || NetlinkSocket::notifications(groups))?;
    for i in 0..3000u32 {
        let addr = AddressDescriptor::new(Ipv4Addr::from(0x0a40_0000 + i), 32, index);
        transport.add_address(addr).await?;
        transport.remove_address(addr).await?;
    }

    assert_eq!(
        listener.poll_readable(Duration::from_millis(100))?,
        Readiness::Readable
    );
    let mut buf = BytesMut::new();
    let mut overran = false;
    loop {
        match listener.recv(&mut buf) {
            Ok(_) => {}
            Err(Error::Io(e)) if e.raw_os_error() == Some(libc::ENOBUFS) => overran = true,
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::WouldBlock => break,
            Err(e) => return Err(e),
        }
    }
    assert!(overran, "listener never overran");

    let mut events = transport.subscribe().into_stream();
    let addr = AddressDescriptor::new(Ipv4Addr::new(10, 65, 0, 1), 24, index);
    transport.add_address(addr).await?;

    // The drained listener receives again.
    assert_eq!(
        listener.poll_readable(Duration::from_secs(1))?,
        Readiness::Readable
    );
    assert!(listener.recv(&mut buf)? > 0);

    let added = wait_for(&mut events, |e| {
        matches!(e, KernelEvent::AddressAdded(a) if *a == addr)
    })
    .await;
    assert!(added.is_some(), "no events published after the flood");
    assert_eq!(transport.state(), TransportState::Running);

    transport.stop()
}
