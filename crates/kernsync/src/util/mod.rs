//! Shared text helpers for addresses and interface names.

pub mod addr;
pub mod ifname;

pub use addr::{format_mac, parse_mac, parse_prefix};
