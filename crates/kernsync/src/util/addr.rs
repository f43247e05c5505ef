//! Address parsing and formatting utilities.

use std::net::Ipv4Addr;

/// Error type for address parsing.
#[derive(Debug, thiserror::Error)]
pub enum AddrError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid prefix length: {0}")]
    InvalidPrefix(String),

    #[error("invalid MAC address: {0}")]
    InvalidMac(String),
}

pub type Result<T> = std::result::Result<T, AddrError>;

/// Parse an IPv4 address from string.
pub fn parse_addr(s: &str) -> Result<Ipv4Addr> {
    s.parse()
        .map_err(|_| AddrError::InvalidAddress(s.to_string()))
}

/// Parse an IPv4 address with prefix length (CIDR notation).
///
/// `default` is accepted as `0.0.0.0/0`; a bare address is a /32.
pub fn parse_prefix(s: &str) -> Result<(Ipv4Addr, u8)> {
    if s == "default" {
        return Ok((Ipv4Addr::UNSPECIFIED, 0));
    }

    if let Some((addr_str, prefix_str)) = s.split_once('/') {
        let addr = parse_addr(addr_str)?;
        let prefix: u8 = prefix_str
            .parse()
            .map_err(|_| AddrError::InvalidPrefix(prefix_str.to_string()))?;

        if prefix > 32 {
            return Err(AddrError::InvalidPrefix(format!(
                "{} exceeds maximum 32 for IPv4",
                prefix
            )));
        }

        Ok((addr, prefix))
    } else {
        Ok((parse_addr(s)?, 32))
    }
}

/// Netmask for a prefix length, in host order.
pub fn prefix_mask(prefix_len: u8) -> u32 {
    match prefix_len {
        0 => 0,
        len if len >= 32 => u32::MAX,
        len => !0u32 << (32 - len),
    }
}

/// Check if an IPv4 address is in a given prefix.
pub fn ipv4_in_prefix(addr: Ipv4Addr, prefix_addr: Ipv4Addr, prefix_len: u8) -> bool {
    if prefix_len > 32 {
        return false;
    }
    let mask = prefix_mask(prefix_len);
    (u32::from(addr) & mask) == (u32::from(prefix_addr) & mask)
}

/// Parse a MAC address from string.
pub fn parse_mac(s: &str) -> Result<[u8; 6]> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 6 {
        return Err(AddrError::InvalidMac(s.to_string()));
    }

    let mut mac = [0u8; 6];
    for (i, part) in parts.iter().enumerate() {
        mac[i] = u8::from_str_radix(part, 16).map_err(|_| AddrError::InvalidMac(s.to_string()))?;
    }

    Ok(mac)
}

/// Format a MAC address.
pub fn format_mac(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prefix() {
        assert_eq!(
            parse_prefix("10.0.0.0/24").unwrap(),
            (Ipv4Addr::new(10, 0, 0, 0), 24)
        );
        assert_eq!(parse_prefix("10.0.0.1").unwrap().1, 32);
        assert_eq!(parse_prefix("default").unwrap(), (Ipv4Addr::UNSPECIFIED, 0));
        assert!(parse_prefix("10.0.0.0/33").is_err());
        assert!(parse_prefix("fe80::1/64").is_err());
    }

    #[test]
    fn test_prefix_mask() {
        assert_eq!(prefix_mask(0), 0);
        assert_eq!(prefix_mask(24), 0xFFFF_FF00);
        assert_eq!(prefix_mask(32), u32::MAX);
        assert!(ipv4_in_prefix(
            Ipv4Addr::new(8, 8, 8, 8),
            Ipv4Addr::UNSPECIFIED,
            0
        ));
    }

    #[test]
    fn test_mac() {
        let mac = parse_mac("aa:bb:cc:00:11:22").unwrap();
        assert_eq!(format_mac(&mac), "aa:bb:cc:00:11:22");
        assert!(parse_mac("aa:bb:cc").is_err());
        assert!(parse_mac("zz:bb:cc:00:11:22").is_err());
    }
}
