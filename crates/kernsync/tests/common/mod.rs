//! Scratch network namespaces and helpers shared by the integration tests.

use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use kernsync::{Config, Error, PortDescriptor, Result, Transport};

/// Short poll timeout so transports stop quickly between tests.
pub const TEST_POLL_TIMEOUT: Duration = Duration::from_millis(200);

const NETNS_DIR: &str = "/var/run/netns";

static NEXT_ID: AtomicU32 = AtomicU32::new(0);

fn namespace_name(tag: &str) -> String {
    format!(
        "ksync-test-{}-{}-{}",
        tag,
        std::process::id(),
        NEXT_ID.fetch_add(1, Ordering::Relaxed)
    )
}

fn checked(what: String, output: Output) -> Result<String> {
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(Error::InvalidMessage(format!(
            "{}: {}",
            what,
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }
}

/// A named namespace created with `ip netns add`, removed on drop.
pub struct TestNamespace {
    name: String,
}

impl TestNamespace {
    pub fn new(tag: &str) -> Result<Self> {
        let name = namespace_name(tag);
        let output = Command::new("ip").args(["netns", "add", &name]).output()?;
        checked(format!("ip netns add {}", name), output)?;
        Ok(Self { name })
    }

    #[allow(dead_code)]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bind-mount path, as `Config::netns` expects it.
    pub fn path(&self) -> PathBuf {
        PathBuf::from(NETNS_DIR).join(&self.name)
    }

    pub fn config(&self) -> Config {
        Config::default()
            .netns(self.path())
            .poll_timeout(TEST_POLL_TIMEOUT)
    }

    /// A running transport inside this namespace.
    pub fn transport(&self) -> Result<Transport> {
        let transport = Transport::new(self.config());
        transport.start()?;
        Ok(transport)
    }

    /// Run `ip ARGS...` inside the namespace.
    pub fn ip(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("ip")
            .args(["-n", &self.name])
            .args(args)
            .output()?;
        checked(format!("ip {}", args.join(" ")), output)
    }

    pub fn add_dummy(&self, name: &str) -> Result<()> {
        self.ip(&["link", "add", name, "type", "dummy"]).map(drop)
    }

    pub fn link_up(&self, name: &str) -> Result<()> {
        self.ip(&["link", "set", name, "up"]).map(drop)
    }

    pub fn add_addr(&self, dev: &str, prefix: &str) -> Result<()> {
        self.ip(&["addr", "add", prefix, "dev", dev]).map(drop)
    }
}

impl Drop for TestNamespace {
    fn drop(&mut self) {
        let _ = Command::new("ip")
            .args(["netns", "delete", &self.name])
            .output();
    }
}

/// Look a port up by name in a fresh link dump.
pub async fn find_port(transport: &Transport, name: &str) -> Result<Option<PortDescriptor>> {
    let links = transport.dump_links().await?;
    Ok(links.into_iter().find(|p| p.name() == name))
}

/// Index of the port called `name`, which must exist.
pub async fn port_index(transport: &Transport, name: &str) -> Result<u32> {
    match find_port(transport, name).await? {
        Some(port) => Ok(port.index()),
        None => Err(Error::InvalidMessage(format!("no port named {}", name))),
    }
}

pub fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions.
    unsafe { libc::geteuid() == 0 }
}

/// Return early from a test that needs root.
#[macro_export]
macro_rules! require_root {
    () => {
        if !$crate::common::is_root() {
            eprintln!("skipped: needs root");
            return Ok(());
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_names_are_unique() {
        let first = namespace_name("link");
        let second = namespace_name("link");
        assert_ne!(first, second);
        assert!(first.starts_with("ksync-test-link-"));
    }
}
