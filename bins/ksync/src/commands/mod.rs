//! Subcommand implementations.

mod address;
mod link;
mod monitor;
mod route;

pub use address::AddressCmd;
pub use link::LinkCmd;
pub use monitor::MonitorCmd;
pub use route::RouteCmd;

use anyhow::{Context, anyhow};
use kernsync::Transport;
use kernsync::util::ifname;

/// Resolve a device argument (name or numeric index) to an interface index.
///
/// Names are looked up in a link dump so that `--netns` is honored. The
/// sysfs fallback only applies in the caller's own namespace, where it finds
/// links the dump filters out (loopback).
pub async fn resolve_port(transport: &Transport, dev: &str) -> anyhow::Result<u32> {
    if let Ok(index) = dev.parse::<u32>() {
        return Ok(index);
    }

    let links = transport.dump_links().await.context("listing links")?;
    if let Some(port) = links.iter().find(|p| p.name() == dev) {
        return Ok(port.index());
    }

    if transport.config().netns.is_none() {
        return ifname::name_to_index(dev)
            .with_context(|| format!("cannot find device \"{}\"", dev));
    }
    Err(anyhow!("cannot find device \"{}\"", dev))
}
