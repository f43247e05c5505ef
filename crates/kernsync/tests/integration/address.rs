//! Address integration tests.

use std::net::Ipv4Addr;

use kernsync::{AddressDescriptor, Result};

use crate::common::{TestNamespace, port_index};

async fn setup(name: &str) -> Result<(TestNamespace, kernsync::Transport, u32)> {
    let ns = TestNamespace::new(name)?;
    ns.add_dummy("dummy0")?;
    ns.link_up("dummy0")?;
    let transport = ns.transport()?;
    let index = port_index(&transport, "dummy0").await?;
    Ok((ns, transport, index))
}

#[tokio::test]
async fn test_add_and_remove_address() -> Result<()> {
    require_root!();

    let (_ns, transport, index) = setup("addr").await?;
    let addr = AddressDescriptor::new(Ipv4Addr::new(192, 168, 50, 1), 24, index);

    transport.add_address(addr).await?;
    let addresses = transport.dump_addresses().await?;
    let found = addresses
        .iter()
        .find(|a| **a == addr)
        .expect("address should exist");
    assert_eq!(found.port_index, index);
    assert_eq!(found.prefix_length, 24);

    transport.remove_address(addr).await?;
    let addresses = transport.dump_addresses().await?;
    assert!(!addresses.contains(&addr));
    Ok(())
}

#[tokio::test]
async fn test_duplicate_address() -> Result<()> {
    require_root!();

    let (_ns, transport, index) = setup("dupaddr").await?;
    let addr = AddressDescriptor::new(Ipv4Addr::new(10, 10, 0, 1), 16, index);

    transport.add_address(addr).await?;
    let err = transport.add_address(addr).await.unwrap_err();
    assert!(err.is_already_exists(), "unexpected error: {}", err);
    Ok(())
}

#[tokio::test]
async fn test_wildcard_lookup() -> Result<()> {
    require_root!();

    let (ns, transport, index) = setup("addrwild").await?;
    ns.add_addr("dummy0", "172.16.5.5/20")?;

    // Port 0 matches the address on any port.
    let wanted = AddressDescriptor::new(Ipv4Addr::new(172, 16, 5, 5), 20, 0);
    let addresses = transport.dump_addresses().await?;
    let found = addresses.iter().find(|a| **a == wanted).expect("address exists");
    assert_eq!(found.port_index, index);
    assert_eq!(found.network(), Ipv4Addr::new(172, 16, 0, 0));
    Ok(())
}

#[tokio::test]
async fn test_loopback_address_filtered() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("addrlo")?;
    ns.link_up("lo")?;
    let transport = ns.transport()?;

    let addresses = transport.dump_addresses().await?;
    assert!(addresses.iter().all(|a| !a.address.is_loopback()));
    Ok(())
}
