//! Route integration tests.

use std::net::Ipv4Addr;

use kernsync::{AddressDescriptor, Error, Result, RouteDescriptor, RouteOrigin, Transport};

use crate::common::{TestNamespace, port_index};

/// Namespace with dummy0 up and 192.168.1.1/24 on it.
async fn setup_routed_ns(name: &str) -> Result<(TestNamespace, Transport, u32)> {
    let ns = TestNamespace::new(name)?;
    let transport = ns.transport()?;

    transport.add_link("dummy", "dummy0", None, None).await?;
    let index = port_index(&transport, "dummy0").await?;
    transport.set_port_up(index).await?;
    transport
        .add_address(AddressDescriptor::new(
            Ipv4Addr::new(192, 168, 1, 1),
            24,
            index,
        ))
        .await?;

    Ok((ns, transport, index))
}

#[tokio::test]
async fn test_add_route_via_interface() -> Result<()> {
    require_root!();

    let (_ns, transport, index) = setup_routed_ns("rtdev").await?;
    let route = RouteDescriptor::new(Ipv4Addr::new(10, 0, 0, 0), 8).port(index);
    transport.add_route(route).await?;

    let routes = transport.dump_routes().await?;
    let found = routes.iter().find(|r| **r == route).expect("route should exist");
    assert_eq!(found.port_index, index);
    assert_eq!(found.gateway, None);
    assert_eq!(found.origin, RouteOrigin::Static);
    Ok(())
}

#[tokio::test]
async fn test_add_route_via_gateway() -> Result<()> {
    require_root!();

    let (_ns, transport, index) = setup_routed_ns("rtgw").await?;
    let route = RouteDescriptor::new(Ipv4Addr::new(10, 0, 0, 0), 8)
        .gateway(Ipv4Addr::new(192, 168, 1, 254))
        .metric(20)
        .origin(RouteOrigin::Zebra);
    transport.add_route(route).await?;

    let routes = transport.dump_routes().await?;
    let found = routes.iter().find(|r| **r == route).expect("route should exist");
    assert_eq!(found.gateway, Some(Ipv4Addr::new(192, 168, 1, 254)));
    assert_eq!(found.port_index, index);
    assert_eq!(found.metric, Some(20));
    assert_eq!(found.origin, RouteOrigin::Zebra);
    Ok(())
}

#[tokio::test]
async fn test_delete_route() -> Result<()> {
    require_root!();

    let (_ns, transport, index) = setup_routed_ns("rtdel").await?;
    let route = RouteDescriptor::new(Ipv4Addr::new(10, 0, 0, 0), 8).port(index);
    transport.add_route(route).await?;
    transport.remove_route(route).await?;

    let routes = transport.dump_routes().await?;
    assert!(!routes.contains(&route));

    let err = transport.remove_route(route).await.unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {}", err);
    Ok(())
}

#[tokio::test]
async fn test_default_route() -> Result<()> {
    require_root!();

    let (_ns, transport, _) = setup_routed_ns("rtdefault").await?;
    let route = RouteDescriptor::new(Ipv4Addr::UNSPECIFIED, 0)
        .gateway(Ipv4Addr::new(192, 168, 1, 254));
    transport.add_route(route).await?;

    let routes = transport.dump_routes().await?;
    assert!(routes.iter().any(|r| r.is_default() && r.gateway == route.gateway));
    Ok(())
}

#[tokio::test]
async fn test_link_route_without_port() -> Result<()> {
    require_root!();

    let (_ns, transport, _) = setup_routed_ns("rtnoport").await?;
    let route = RouteDescriptor::new(Ipv4Addr::new(10, 0, 0, 0), 8);
    let err = transport.add_route(route).await.unwrap_err();
    assert!(matches!(err, Error::MissingPort(_)));
    Ok(())
}

#[tokio::test]
async fn test_local_routes_filtered() -> Result<()> {
    require_root!();

    let (ns, transport, _) = setup_routed_ns("rtlocal").await?;

    // The kernel adds 192.168.1.1/32 to the local table.
    let local = RouteDescriptor::new(Ipv4Addr::new(192, 168, 1, 1), 32);
    let routes = transport.dump_routes().await?;
    assert!(!routes.contains(&local));
    // The connected subnet route is in main and kept.
    let connected = RouteDescriptor::new(Ipv4Addr::new(192, 168, 1, 0), 24);
    assert!(routes.contains(&connected));

    let unfiltered = Transport::new(ns.config().filter(false));
    unfiltered.start()?;
    assert!(unfiltered.dump_routes().await?.contains(&local));
    Ok(())
}
