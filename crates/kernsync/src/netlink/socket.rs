//! Blocking NETLINK_ROUTE sockets for the command and notification threads.
//!
//! Each [`NetlinkSocket`] is owned by exactly one thread. The command socket
//! is connected to the kernel and answers requests; the notification socket
//! is bound to multicast groups, non-blocking, and drained after `poll(2)`
//! reports it readable.

use std::fs::File;
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;
use std::time::Duration;

use bytes::BytesMut;
use netlink_sys::{Socket, SocketAddr, protocols};

use super::correlator::FrameIo;
use super::error::{Error, Result};

/// Smallest receive buffer, whatever SO_RCVBUF says.
const MIN_RECV_BUFFER: usize = 32 * 1024;

/// What a socket is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketRole {
    /// Request/reply traffic, connected to the kernel.
    Command,
    /// Multicast change notifications.
    Notifications,
}

/// Result of waiting for a socket to become readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Data is queued, or a pending socket error (such as a multicast
    /// overrun) is waiting to be collected by the next receive.
    Readable,
    TimedOut,
    /// POLLNVAL; the descriptor is unusable.
    Failed(i16),
}

impl Readiness {
    /// Classify poll(2) `revents`.
    ///
    /// POLLERR is reported as readable: the kernel raises it on overrun
    /// together with POLLIN, and the receive returns ENOBUFS and clears it.
    pub fn from_revents(revents: i16) -> Self {
        if revents & libc::POLLNVAL != 0 {
            Readiness::Failed(revents)
        } else if revents & (libc::POLLIN | libc::POLLERR) != 0 {
            Readiness::Readable
        } else {
            Readiness::TimedOut
        }
    }
}

/// A NETLINK_ROUTE socket with a kernel-assigned port id.
pub struct NetlinkSocket {
    socket: Socket,
    port: u32,
    role: SocketRole,
    send_buffer: usize,
    recv_buffer: usize,
}

impl NetlinkSocket {
    /// Open the command socket: bound to a kernel-assigned port and
    /// connected to the kernel (port 0).
    pub fn command() -> Result<Self> {
        let mut socket = Socket::new(protocols::NETLINK_ROUTE)?;
        let port = bind(&mut socket, 0)?;
        socket.connect(&SocketAddr::new(0, 0))?;
        Self::finish(socket, port, SocketRole::Command)
    }

    /// Open the notification socket subscribed to `groups`.
    pub fn notifications(groups: u32) -> Result<Self> {
        let mut socket = Socket::new(protocols::NETLINK_ROUTE)?;
        let port = bind(&mut socket, groups)?;
        socket.set_non_blocking(true)?;
        Self::finish(socket, port, SocketRole::Notifications)
    }

    fn finish(socket: Socket, port: u32, role: SocketRole) -> Result<Self> {
        let mut this = Self {
            socket,
            port,
            role,
            send_buffer: 0,
            recv_buffer: 0,
        };
        this.send_buffer = this.socket_option(libc::SO_SNDBUF)?;
        this.recv_buffer = this.socket_option(libc::SO_RCVBUF)?;
        tracing::debug!(
            ?role,
            port,
            sndbuf = this.send_buffer,
            rcvbuf = this.recv_buffer,
            "netlink socket open"
        );
        Ok(this)
    }

    fn socket_option(&self, name: libc::c_int) -> Result<usize> {
        let mut value: libc::c_int = 0;
        let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
        // SAFETY: value and len point to valid storage sized for an int option,
        // and the descriptor is owned by self.
        let ret = unsafe {
            libc::getsockopt(
                self.as_raw_fd(),
                libc::SOL_SOCKET,
                name,
                &mut value as *mut libc::c_int as *mut libc::c_void,
                &mut len,
            )
        };
        if ret < 0 {
            return Err(Error::Io(io::Error::last_os_error()));
        }
        Ok(value.max(0) as usize)
    }

    /// Kernel-assigned local port id.
    pub fn port(&self) -> u32 {
        self.port
    }

    pub fn role(&self) -> SocketRole {
        self.role
    }

    /// SO_SNDBUF as reported by the kernel.
    pub fn send_buffer_size(&self) -> usize {
        self.send_buffer
    }

    /// Receive buffer size to use for one datagram.
    pub fn recv_buffer_size(&self) -> usize {
        self.recv_buffer.max(MIN_RECV_BUFFER)
    }

    /// Send one encoded frame.
    pub fn send(&self, frame: &[u8]) -> Result<()> {
        let sent = self.socket.send(frame, 0)?;
        if sent != frame.len() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short netlink send: {} of {} bytes", sent, frame.len()),
            )));
        }
        Ok(())
    }

    /// Receive one datagram into `buf`, replacing its contents.
    pub fn recv(&self, buf: &mut BytesMut) -> Result<usize> {
        buf.clear();
        buf.reserve(self.recv_buffer_size());
        Ok(self.socket.recv(buf, 0)?)
    }

    /// Wait up to `timeout` for the socket to become readable.
    pub fn poll_readable(&self, timeout: Duration) -> Result<Readiness> {
        let mut pfd = libc::pollfd {
            fd: self.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;

        // SAFETY: pfd is a single valid pollfd for the duration of the call.
        let ret = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(Readiness::TimedOut);
            }
            return Err(Error::Io(err));
        }
        if ret == 0 {
            return Ok(Readiness::TimedOut);
        }
        Ok(Readiness::from_revents(pfd.revents))
    }
}

fn bind(socket: &mut Socket, groups: u32) -> Result<u32> {
    let mut addr = SocketAddr::new(0, groups);
    socket.bind(&addr)?;
    socket.get_address(&mut addr)?;
    Ok(addr.port_number())
}

impl AsRawFd for NetlinkSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}

impl FrameIo for NetlinkSocket {
    fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.send(frame)
    }

    fn recv_frames(&mut self, buf: &mut BytesMut) -> Result<usize> {
        self.recv(buf)
    }

    fn local_port(&self) -> u32 {
        self.port
    }
}

/// Run `f` with the calling thread inside the network namespace at `path`,
/// then switch back.
///
/// Sockets created by `f` stay bound to the target namespace after the
/// thread returns to its original one.
pub fn in_namespace<T>(path: &Path, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let target = File::open(path)
        .map_err(|e| Error::Namespace(format!("cannot open {}: {}", path.display(), e)))?;
    let current = File::open("/proc/self/ns/net")
        .map_err(|e| Error::Namespace(format!("cannot open current namespace: {}", e)))?;

    // SAFETY: target is an open namespace file; setns only affects this thread.
    if unsafe { libc::setns(target.as_raw_fd(), libc::CLONE_NEWNET) } < 0 {
        return Err(Error::Namespace(format!(
            "cannot enter {}: {}",
            path.display(),
            io::Error::last_os_error()
        )));
    }

    let result = f();

    // SAFETY: current was opened from /proc/self/ns/net above.
    if unsafe { libc::setns(current.as_raw_fd(), libc::CLONE_NEWNET) } < 0 {
        tracing::error!(
            error = %io::Error::last_os_error(),
            "failed to restore original network namespace"
        );
    }

    result
}

/// Multicast group masks for NETLINK_ROUTE (legacy RTMGRP_* bits).
pub mod rtnetlink_groups {
    pub const RTMGRP_LINK: u32 = 0x1;
    pub const RTMGRP_NOTIFY: u32 = 0x2;
    pub const RTMGRP_IPV4_IFADDR: u32 = 0x10;
    pub const RTMGRP_IPV4_ROUTE: u32 = 0x40;
}
