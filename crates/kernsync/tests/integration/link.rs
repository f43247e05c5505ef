//! Link integration tests.

use kernsync::{PortKind, Result, Transport};

use crate::common::{TestNamespace, find_port, port_index};

#[tokio::test]
async fn test_add_and_delete_dummy() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("dummy")?;
    let transport = ns.transport()?;

    transport
        .add_link("dummy", "dummy0", Some("02:00:00:00:00:01".parse()?), Some(1400))
        .await?;

    let port = find_port(&transport, "dummy0").await?.expect("dummy0 exists");
    assert_eq!(port.info.mtu, 1400);
    assert_eq!(
        port.info.hardware_address.map(|m| m.to_string()).as_deref(),
        Some("02:00:00:00:00:01")
    );
    assert_eq!(port.kind, PortKind::Physical);
    assert!(!port.is_admin_up());

    transport.delete_link(port.index()).await?;
    assert!(find_port(&transport, "dummy0").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_duplicate_link() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("duplink")?;
    ns.add_dummy("dummy0")?;
    let transport = ns.transport()?;

    let err = transport
        .add_link("dummy", "dummy0", None, None)
        .await
        .unwrap_err();
    assert!(err.is_already_exists(), "unexpected error: {}", err);
    Ok(())
}

#[tokio::test]
async fn test_set_port_up_down() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("updown")?;
    ns.add_dummy("dummy0")?;
    let transport = ns.transport()?;
    let index = port_index(&transport, "dummy0").await?;

    transport.set_port_up(index).await?;
    let port = find_port(&transport, "dummy0").await?.expect("dummy0 exists");
    assert!(port.is_admin_up());

    transport.set_port_down(index).await?;
    let port = find_port(&transport, "dummy0").await?.expect("dummy0 exists");
    assert!(!port.is_admin_up());
    Ok(())
}

#[tokio::test]
async fn test_delete_missing_link() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("nolink")?;
    let transport = ns.transport()?;

    let err = transport.delete_link(9999).await.unwrap_err();
    assert!(err.is_not_found(), "unexpected error: {}", err);
    Ok(())
}

#[tokio::test]
async fn test_vlan() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("vlan")?;
    ns.add_dummy("dummy0")?;
    let transport = ns.transport()?;
    let lower = port_index(&transport, "dummy0").await?;

    transport.add_vlan(100, lower, "dummy0.100").await?;

    let vlan = find_port(&transport, "dummy0.100")
        .await?
        .expect("vlan exists");
    assert_eq!(
        vlan.kind,
        PortKind::Vlan {
            tag: 100,
            lower_link: Some(lower)
        }
    );
    assert_eq!(vlan.vlan_tag(), Some(100));
    Ok(())
}

#[tokio::test]
async fn test_enslave_and_release() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("bridge")?;
    ns.add_dummy("dummy0")?;
    let transport = ns.transport()?;

    transport.add_link("bridge", "br0", None, None).await?;
    let bridge = port_index(&transport, "br0").await?;
    let port = port_index(&transport, "dummy0").await?;

    transport.enslave(port, bridge).await?;
    let dummy = find_port(&transport, "dummy0").await?.expect("dummy0 exists");
    assert_eq!(dummy.master, Some(bridge));
    let br = find_port(&transport, "br0").await?.expect("br0 exists");
    assert_eq!(br.kind, PortKind::Bridge);

    transport.release(port).await?;
    let dummy = find_port(&transport, "dummy0").await?.expect("dummy0 exists");
    assert_eq!(dummy.master, None);
    Ok(())
}

#[tokio::test]
async fn test_loopback_filtering() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("lofilter")?;
    let filtered = ns.transport()?;
    assert!(find_port(&filtered, "lo").await?.is_none());

    let unfiltered = Transport::new(ns.config().filter(false));
    unfiltered.start()?;
    let lo = find_port(&unfiltered, "lo").await?.expect("lo exists");
    assert_eq!(lo.index(), 1);
    Ok(())
}

#[tokio::test]
async fn test_invalid_name_rejected_locally() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("badname")?;
    let transport = ns.transport()?;

    let err = transport
        .add_link("dummy", "this-name-is-far-too-long", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, kernsync::Error::InvalidName(_)));
    Ok(())
}
