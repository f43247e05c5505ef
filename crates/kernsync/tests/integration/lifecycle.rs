//! Transport lifecycle tests.

use std::time::{Duration, Instant};

use kernsync::{Config, Error, Result, Transport, TransportState};

use crate::common::{TEST_POLL_TIMEOUT, TestNamespace};

#[test]
fn test_start_stop() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("life")?;
    let transport = Transport::new(ns.config());
    assert_eq!(transport.state(), TransportState::Stopped);

    transport.start()?;
    assert_eq!(transport.state(), TransportState::Running);
    assert!(transport.command_port().is_some());

    transport.stop()?;
    assert_eq!(transport.state(), TransportState::Stopped);
    assert!(transport.command_port().is_none());

    // Stopping again is harmless.
    transport.stop()?;
    Ok(())
}

#[test]
fn test_stop_within_poll_timeout() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("lifelat")?;
    let transport = ns.transport()?;
    // Let both threads reach their blocking calls.
    std::thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    transport.stop()?;
    let elapsed = started.elapsed();
    assert!(
        elapsed < TEST_POLL_TIMEOUT + Duration::from_millis(500),
        "stop took {:?}",
        elapsed
    );
    Ok(())
}

#[test]
fn test_double_start_rejected() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("lifedbl")?;
    let transport = ns.transport()?;
    assert!(matches!(transport.start(), Err(Error::InvalidState(_))));
    assert_eq!(transport.state(), TransportState::Running);
    Ok(())
}

#[test]
fn test_requests_after_stop() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("lifereq")?;
    let transport = ns.transport()?;
    transport.dump_links().wait()?;
    transport.stop()?;

    assert!(matches!(transport.dump_links().wait(), Err(Error::NotRunning)));
    Ok(())
}

#[test]
fn test_restart() -> Result<()> {
    require_root!();

    let ns = TestNamespace::new("liferst")?;
    let transport = ns.transport()?;
    transport.stop()?;
    transport.start()?;

    let links = transport.dump_links().wait()?;
    // Only loopback exists, and it is filtered out.
    assert!(links.is_empty());
    Ok(())
}

#[test]
fn test_missing_namespace() -> Result<()> {
    require_root!();

    let transport = Transport::new(Config::default().netns("/var/run/netns/ksync-does-not-exist"));
    assert!(matches!(transport.start(), Err(Error::Namespace(_))));
    assert_eq!(transport.state(), TransportState::Stopped);
    Ok(())
}
