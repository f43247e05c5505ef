//! Error types for the synchronization engine.

use std::io;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the kernel.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization error.
    #[cfg(feature = "serde")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Kernel returned an error code for an echoed request.
    #[error("kernel error: {message} (errno {errno})")]
    Kernel {
        /// The errno value from the kernel.
        errno: i32,
        /// Human-readable error message.
        message: String,
    },

    /// Kernel error with operation context.
    #[error("{operation}: {message} (errno {errno})")]
    KernelWithContext {
        /// The operation that failed.
        operation: String,
        /// The errno value from the kernel.
        errno: i32,
        /// Human-readable error message.
        message: String,
    },

    /// Message was truncated.
    #[error("message truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Expected message length.
        expected: usize,
        /// Actual bytes received.
        actual: usize,
    },

    /// Invalid message format.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Invalid attribute format.
    #[error("invalid attribute: {0}")]
    InvalidAttribute(String),

    /// The socket returned no data.
    #[error("netlink socket closed")]
    Closed,

    /// The kernel reported lost data (NLMSG_OVERRUN).
    #[error("netlink overrun, data lost")]
    Overrun,

    /// A request was submitted while the transport is not running.
    #[error("transport is not running")]
    NotRunning,

    /// The transport stopped before the request was answered.
    #[error("transport stopped before the request completed")]
    Stopped,

    /// Lifecycle call made in the wrong state.
    #[error("invalid transport state: {0}")]
    InvalidState(String),

    /// An event subscriber fell behind and missed events.
    #[error("event subscriber lagged, {0} events dropped")]
    Lagged(u64),

    /// The kernel answered with a reply of the wrong shape.
    #[error("unexpected reply: expected {expected}, got {actual}")]
    UnexpectedReply {
        /// What the request expected.
        expected: &'static str,
        /// What was received.
        actual: &'static str,
    },

    /// Invalid interface name.
    #[error("invalid interface name: {0}")]
    InvalidName(String),

    /// VLAN id outside 1..=4094.
    #[error("invalid VLAN id: {0}")]
    InvalidVlanId(u16),

    /// A route without a gateway needs an outgoing port.
    #[error("route {0} has neither gateway nor outgoing port")]
    MissingPort(String),

    /// Entering or leaving a network namespace failed.
    #[error("namespace error: {0}")]
    Namespace(String),
}

impl Error {
    /// Create a kernel error from a negative errno value.
    pub fn from_errno(errno: i32) -> Self {
        let message = io::Error::from_raw_os_error(-errno).to_string();
        Self::Kernel {
            errno: -errno,
            message,
        }
    }

    /// Add context to this error.
    ///
    /// Wraps kernel errors with operation context. Other errors are returned unchanged.
    pub fn with_context(self, operation: impl Into<String>) -> Self {
        match self {
            Self::Kernel { errno, message } => Self::KernelWithContext {
                operation: operation.into(),
                errno,
                message,
            },
            other => other,
        }
    }

    /// Check if this is a "not found" error (ENOENT, ENODEV, ESRCH).
    pub fn is_not_found(&self) -> bool {
        matches!(self.errno(), Some(libc::ENOENT | libc::ENODEV | libc::ESRCH))
    }

    /// Check if this is a permission error (EPERM, EACCES).
    pub fn is_permission_denied(&self) -> bool {
        matches!(self.errno(), Some(libc::EPERM | libc::EACCES))
    }

    /// Check if this is an "already exists" error (EEXIST).
    pub fn is_already_exists(&self) -> bool {
        self.errno() == Some(libc::EEXIST)
    }

    /// Check if this is a "device busy" error (EBUSY).
    pub fn is_busy(&self) -> bool {
        self.errno() == Some(libc::EBUSY)
    }

    /// Get the errno value if this is a kernel error.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Kernel { errno, .. } | Self::KernelWithContext { errno, .. } => Some(*errno),
            _ => None,
        }
    }

    /// True for failures of the socket itself rather than of one request.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Closed | Self::Overrun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_errno() {
        let err = Error::from_errno(-1); // EPERM
        assert!(err.is_permission_denied());
        assert_eq!(err.errno(), Some(1));
    }

    #[test]
    fn test_with_context() {
        let err = Error::from_errno(-2).with_context("removing route 10.0.0.0/24");
        assert!(err.is_not_found());
        let msg = err.to_string();
        assert!(msg.contains("removing route 10.0.0.0/24"));
        assert!(msg.contains("No such file or directory"));
    }

    #[test]
    fn test_context_leaves_other_errors() {
        let err = Error::Closed.with_context("dump routes");
        assert!(matches!(err, Error::Closed));
        assert!(err.is_transport());
    }

    #[test]
    fn test_already_exists() {
        assert!(Error::from_errno(-17).is_already_exists());
        assert!(!Error::from_errno(-16).is_already_exists());
        assert!(Error::from_errno(-16).is_busy());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(Error::InvalidVlanId(4095).to_string(), "invalid VLAN id: 4095");
        assert_eq!(
            Error::MissingPort("10.0.0.0/24".into()).to_string(),
            "route 10.0.0.0/24 has neither gateway nor outgoing port"
        );
        assert_eq!(
            Error::Lagged(3).to_string(),
            "event subscriber lagged, 3 events dropped"
        );
    }
}
