//! Interface names: validation and sysfs lookup.

use std::path::Path;

use crate::netlink::types::link::IFNAMSIZ;

const SYS_CLASS_NET: &str = "/sys/class/net";

#[derive(Debug, thiserror::Error)]
pub enum IfError {
    #[error("interface name is empty")]
    Empty,

    #[error("interface name {0:?} is longer than {max} bytes", max = IFNAMSIZ - 1)]
    TooLong(String),

    #[error("interface name {0:?} contains '/', NUL or whitespace")]
    BadCharacter(String),

    #[error("no interface named {0:?}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, IfError>;

/// Check a name against the kernel's rules for `IFLA_IFNAME`.
pub fn validate(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(IfError::Empty);
    }
    if name.len() >= IFNAMSIZ {
        return Err(IfError::TooLong(name.to_string()));
    }
    if name
        .chars()
        .any(|c| c == '/' || c == '\0' || c.is_whitespace())
    {
        return Err(IfError::BadCharacter(name.to_string()));
    }
    Ok(())
}

/// Index of `name` in the caller's network namespace, read from sysfs.
///
/// Only meaningful in the namespace the process itself runs in; use a link
/// dump for anything else.
pub fn name_to_index(name: &str) -> Result<u32> {
    validate(name)?;
    read_ifindex(&Path::new(SYS_CLASS_NET).join(name))
        .ok_or_else(|| IfError::NotFound(name.to_string()))
}

fn read_ifindex(dev_dir: &Path) -> Option<u32> {
    std::fs::read_to_string(dev_dir.join("ifindex"))
        .ok()?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(validate("eth0").is_ok());
        assert!(validate("eth0.100").is_ok());
        assert!(validate("fifteen_bytes_x").is_ok());

        assert!(matches!(validate(""), Err(IfError::Empty)));
        assert!(matches!(validate("sixteen_bytes_xx"), Err(IfError::TooLong(_))));
        assert!(matches!(validate("eth/0"), Err(IfError::BadCharacter(_))));
        assert!(matches!(validate("eth 0"), Err(IfError::BadCharacter(_))));
    }

    #[test]
    fn test_lookup() {
        if Path::new("/sys/class/net/lo").exists() {
            assert_eq!(name_to_index("lo").unwrap(), 1);
        }
        assert!(matches!(
            name_to_index("no-such-dev0"),
            Err(IfError::NotFound(_))
        ));
    }
}
