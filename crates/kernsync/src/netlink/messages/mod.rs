//! Domain descriptors decoded from, and encoded into, rtnetlink messages.
//!
//! Descriptors are plain values. They refer to ports by kernel index only;
//! resolving an index to a live port is up to the consumer.

mod address;
mod link;
mod route;

pub use address::*;
pub use link::*;
pub use route::*;

/// Port index meaning "any port" in descriptor comparisons.
pub const ANY_PORT: u32 = 0;

/// Port index equality where 0 matches anything.
pub(crate) fn port_matches(a: u32, b: u32) -> bool {
    a == ANY_PORT || b == ANY_PORT || a == b
}
