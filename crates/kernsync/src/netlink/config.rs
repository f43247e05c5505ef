//! Transport configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use kernsync::Config;
//!
//! let config = Config::default()
//!     .poll_timeout(Duration::from_millis(250))
//!     .debug(true);
//! ```
//!
//! With the `serde` feature the same settings load from JSON:
//!
//! ```json
//! { "debug": true, "poll_timeout_ms": 250, "netns": "/var/run/netns/lab" }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use super::socket::rtnetlink_groups::{RTMGRP_IPV4_IFADDR, RTMGRP_IPV4_ROUTE, RTMGRP_LINK};

/// Shortest poll timeout the notification loop uses; zero would spin.
pub const MIN_POLL_TIMEOUT: Duration = Duration::from_millis(1);

/// Settings for a [`Transport`](super::Transport).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct Config {
    /// Log a one-line summary of every frame sent and received.
    pub debug: bool,
    /// Drop uninteresting records (non-Ethernet links, host-scope
    /// addresses, local/cloned/redirect routes) before they reach callers.
    pub filter: bool,
    /// How long the notification loop waits for traffic before re-checking
    /// whether it should stop.
    pub poll_timeout_ms: u64,
    /// Multicast group mask for the notification socket.
    pub groups: u32,
    /// Events buffered per subscriber before it starts lagging.
    pub event_capacity: usize,
    /// Open both sockets inside this network namespace.
    pub netns: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            filter: true,
            poll_timeout_ms: 1000,
            groups: RTMGRP_LINK | RTMGRP_IPV4_IFADDR | RTMGRP_IPV4_ROUTE,
            event_capacity: 256,
            netns: None,
        }
    }
}

impl Config {
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn filter(mut self, filter: bool) -> Self {
        self.filter = filter;
        self
    }

    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn groups(mut self, groups: u32) -> Self {
        self.groups = groups;
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    pub fn netns(mut self, path: impl Into<PathBuf>) -> Self {
        self.netns = Some(path.into());
        self
    }

    /// Poll timeout as a `Duration`, never shorter than
    /// [`MIN_POLL_TIMEOUT`].
    pub fn poll_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms).max(MIN_POLL_TIMEOUT)
    }

    /// Parse from a JSON document; missing fields take their defaults.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> super::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON file.
    #[cfg(feature = "serde")]
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> super::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
