//! The transport: two sockets, two threads, one request queue.
//!
//! The command thread owns the command socket and runs queued requests one
//! at a time, in submission order. The notification thread owns the
//! multicast socket, turns kernel notifications into [`KernelEvent`]s and
//! publishes them to every subscriber. Neither thread ever touches the
//! other's socket.
//!
//! # Example
//!
//! ```ignore
//! use std::net::Ipv4Addr;
//! use kernsync::{Config, RouteDescriptor, Transport};
//!
//! let transport = Transport::new(Config::default());
//! transport.start()?;
//!
//! for route in transport.dump_routes().wait()? {
//!     println!("{}", route);
//! }
//!
//! let route = RouteDescriptor::new(Ipv4Addr::new(10, 8, 0, 0), 16)
//!     .gateway(Ipv4Addr::new(192, 168, 1, 1));
//! transport.add_route(route).await?;
//!
//! transport.stop()?;
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::BytesMut;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::codec::Decoded;
use super::config::Config;
use super::correlator::{FrameIo, Reply, ReplyCorrelator};
use super::dispatch::{Command, InboundKind, OutboundTable};
use super::error::{Error, Result};
use super::events::{EventSubscription, KernelEvent};
use super::message::{MessageIter, message_kind_name};
use super::messages::{AddressDescriptor, MacAddress, PortDescriptor, RouteDescriptor};
use super::pending::PendingReply;
use super::seq::SequenceCounter;
use super::socket::{NetlinkSocket, Readiness, in_namespace};

/// Lifecycle of a [`Transport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Running,
    Stopping,
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportState::Stopped => "stopped",
            TransportState::Running => "running",
            TransportState::Stopping => "stopping",
        })
    }
}

enum QueueItem {
    Request {
        command: Command,
        reply: oneshot::Sender<Result<Reply>>,
    },
    Stop,
}

/// Flags shared between the caller side and both threads.
#[derive(Default)]
struct Shared {
    running: AtomicBool,
    /// Requests sent to the queue but not yet taken by the command thread.
    queued: AtomicUsize,
}

struct Workers {
    queue: mpsc::UnboundedSender<QueueItem>,
    command: JoinHandle<()>,
    notify: JoinHandle<()>,
    port: u32,
}

/// Kernel synchronization engine.
///
/// Create with a [`Config`], [`start`](Self::start) it, then issue requests
/// and [`subscribe`](Self::subscribe) to events. Dropping a running
/// transport stops it.
pub struct Transport {
    config: Config,
    seq: SequenceCounter,
    shared: Arc<Shared>,
    events: broadcast::Sender<KernelEvent>,
    state: Mutex<TransportState>,
    workers: Mutex<Option<Workers>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Transport {
    /// New stopped transport with a clock-seeded sequence counter.
    pub fn new(config: Config) -> Self {
        Self::with_sequence(config, SequenceCounter::from_clock())
    }

    /// New stopped transport drawing sequence numbers from `seq`.
    pub fn with_sequence(config: Config, seq: SequenceCounter) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            config,
            seq,
            shared: Arc::new(Shared::default()),
            events,
            state: Mutex::new(TransportState::Stopped),
            workers: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> TransportState {
        *lock(&self.state)
    }

    pub fn is_running(&self) -> bool {
        self.state() == TransportState::Running
    }

    /// Port id of the command socket while running.
    pub fn command_port(&self) -> Option<u32> {
        lock(&self.workers).as_ref().map(|w| w.port)
    }

    /// Open both sockets and start the command and notification threads.
    pub fn start(&self) -> Result<()> {
        let mut state = lock(&self.state);
        if *state != TransportState::Stopped {
            return Err(Error::InvalidState(format!("cannot start while {}", *state)));
        }

        let groups = self.config.groups;
        let open = || -> Result<(NetlinkSocket, NetlinkSocket)> {
            Ok((NetlinkSocket::command()?, NetlinkSocket::notifications(groups)?))
        };
        let (command_socket, notify_socket) = match &self.config.netns {
            Some(path) => in_namespace(path, open)?,
            None => open()?,
        };
        let port = command_socket.port();

        let (queue, rx) = mpsc::unbounded_channel();
        self.shared.queued.store(0, Ordering::SeqCst);
        self.shared.running.store(true, Ordering::SeqCst);

        let correlator = ReplyCorrelator::new(command_socket, self.seq.clone(), self.config.filter)
            .debug(self.config.debug);
        let shared = Arc::clone(&self.shared);
        let command = thread::Builder::new()
            .name("kernsync-cmd".into())
            .spawn(move || command_loop(correlator, rx, shared));
        let command = match command {
            Ok(handle) => handle,
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };

        let notifier = NotificationLoop {
            socket: notify_socket,
            dispatcher: NotificationDispatcher {
                events: self.events.clone(),
                command_port: port,
                filter: self.config.filter,
                debug: self.config.debug,
            },
            shared: Arc::clone(&self.shared),
            poll_timeout: self.config.poll_timeout_duration(),
        };
        let notify = thread::Builder::new()
            .name("kernsync-notify".into())
            .spawn(move || notifier.run());
        let notify = match notify {
            Ok(handle) => handle,
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                let _ = queue.send(QueueItem::Stop);
                let _ = command.join();
                return Err(e.into());
            }
        };

        *lock(&self.workers) = Some(Workers {
            queue,
            command,
            notify,
            port,
        });
        *state = TransportState::Running;
        info!(port, groups = format_args!("{:#x}", groups), "transport started");
        Ok(())
    }

    /// Stop both threads and close the sockets.
    ///
    /// A request that is executing finishes first; requests still queued
    /// behind it resolve with [`Error::Stopped`]. Stopping a stopped
    /// transport does nothing.
    pub fn stop(&self) -> Result<()> {
        let mut state = lock(&self.state);
        if *state == TransportState::Stopped {
            return Ok(());
        }
        *state = TransportState::Stopping;

        // Clear the flag before looking at the queue: a request popped after
        // this point is the last one the command thread runs.
        self.shared.running.store(false, Ordering::SeqCst);

        let mut result = Ok(());
        let workers = lock(&self.workers).take();
        if let Some(workers) = workers {
            if self.shared.queued.load(Ordering::SeqCst) == 0 {
                let _ = workers.queue.send(QueueItem::Stop);
            }
            drop(workers.queue);

            if workers.command.join().is_err() {
                result = Err(Error::InvalidState("command thread panicked".into()));
            }
            if workers.notify.join().is_err() {
                result = Err(Error::InvalidState("notification thread panicked".into()));
            }
        }

        *state = TransportState::Stopped;
        info!("transport stopped");
        result
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription::new(self.events.subscribe())
    }

    /// Queue a command and get its raw reply.
    pub fn submit(&self, command: Command) -> PendingReply<Reply> {
        self.request(command, Ok)
    }

    fn request<T>(&self, command: Command, extract: fn(Reply) -> Result<T>) -> PendingReply<T> {
        if !self.shared.running.load(Ordering::SeqCst) {
            return PendingReply::failed(Error::NotRunning, extract);
        }
        let workers = lock(&self.workers);
        let Some(workers) = workers.as_ref() else {
            return PendingReply::failed(Error::NotRunning, extract);
        };

        let (reply, rx) = oneshot::channel();
        debug!(command = %command.kind(), "queueing request");
        self.shared.queued.fetch_add(1, Ordering::SeqCst);
        if workers.queue.send(QueueItem::Request { command, reply }).is_err() {
            // The command thread is gone; the dropped sender resolves the
            // reply with Error::Stopped.
            self.shared.queued.fetch_sub(1, Ordering::SeqCst);
        }
        PendingReply::new(rx, extract)
    }

    /// Create a virtual link of `kind` ("dummy", "bridge", "bond", ...).
    pub fn add_link(
        &self,
        kind: &str,
        name: &str,
        mac: Option<MacAddress>,
        mtu: Option<u32>,
    ) -> PendingReply<()> {
        self.request(
            Command::AddLink {
                kind: kind.to_string(),
                name: name.to_string(),
                mac,
                mtu,
            },
            Reply::into_ack,
        )
    }

    /// Create VLAN `vlan_id` on `lower_link`.
    pub fn add_vlan(&self, vlan_id: u16, lower_link: u32, name: &str) -> PendingReply<()> {
        self.request(
            Command::AddVlan {
                vlan_id,
                lower_link,
                name: name.to_string(),
            },
            Reply::into_ack,
        )
    }

    pub fn delete_link(&self, index: u32) -> PendingReply<()> {
        self.request(Command::DeleteLink(index), Reply::into_ack)
    }

    pub fn set_port_up(&self, index: u32) -> PendingReply<()> {
        self.request(Command::SetPortUp(index), Reply::into_ack)
    }

    pub fn set_port_down(&self, index: u32) -> PendingReply<()> {
        self.request(Command::SetPortDown(index), Reply::into_ack)
    }

    /// Make `index` a slave of `master` (a bridge or bond).
    pub fn enslave(&self, index: u32, master: u32) -> PendingReply<()> {
        self.request(Command::Enslave { index, master }, Reply::into_ack)
    }

    /// Detach `index` from its master.
    pub fn release(&self, index: u32) -> PendingReply<()> {
        self.request(Command::Release(index), Reply::into_ack)
    }

    pub fn add_address(&self, address: AddressDescriptor) -> PendingReply<()> {
        self.request(Command::AddAddress(address), Reply::into_ack)
    }

    pub fn remove_address(&self, address: AddressDescriptor) -> PendingReply<()> {
        self.request(Command::RemoveAddress(address), Reply::into_ack)
    }

    pub fn add_route(&self, route: RouteDescriptor) -> PendingReply<()> {
        self.request(Command::AddRoute(route), Reply::into_ack)
    }

    pub fn remove_route(&self, route: RouteDescriptor) -> PendingReply<()> {
        self.request(Command::RemoveRoute(route), Reply::into_ack)
    }

    pub fn dump_links(&self) -> PendingReply<Vec<PortDescriptor>> {
        self.request(Command::DumpLinks, Reply::into_links)
    }

    pub fn dump_addresses(&self) -> PendingReply<Vec<AddressDescriptor>> {
        self.request(Command::DumpAddresses, Reply::into_addresses)
    }

    pub fn dump_routes(&self) -> PendingReply<Vec<RouteDescriptor>> {
        self.request(Command::DumpRoutes, Reply::into_routes)
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %e, "transport did not stop cleanly");
        }
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("state", &self.state())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn command_loop<I: FrameIo>(
    mut correlator: ReplyCorrelator<I>,
    mut rx: mpsc::UnboundedReceiver<QueueItem>,
    shared: Arc<Shared>,
) {
    debug!("command loop started");
    while let Some(item) = rx.blocking_recv() {
        match item {
            QueueItem::Stop => break,
            QueueItem::Request { command, reply } => {
                shared.queued.fetch_sub(1, Ordering::SeqCst);
                let result = OutboundTable::execute(&mut correlator, &command);
                if reply.send(result).is_err() {
                    debug!(command = %command.kind(), "caller dropped its pending reply");
                }
            }
        }
        if !shared.running.load(Ordering::SeqCst) {
            break;
        }
    }

    // Whatever is left never ran; dropping the senders resolves each reply
    // with Error::Stopped.
    rx.close();
    let mut abandoned = 0;
    while let Ok(item) = rx.try_recv() {
        if let QueueItem::Request { .. } = item {
            abandoned += 1;
        }
    }
    if abandoned > 0 {
        warn!(abandoned, "requests abandoned at shutdown");
    }
    debug!("command loop exiting");
}

/// Turns notification datagrams into published events.
struct NotificationDispatcher {
    events: broadcast::Sender<KernelEvent>,
    command_port: u32,
    filter: bool,
    debug: bool,
}

impl NotificationDispatcher {
    /// Publish every event in `datagram`; returns how many were published.
    fn dispatch(&self, datagram: &[u8]) -> usize {
        let mut published = 0;
        for frame in MessageIter::new(datagram) {
            let (header, payload) = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "malformed notification datagram");
                    break;
                }
            };
            if self.debug {
                info!(frame = %header.summary(), "notification");
            }

            let Some(kind) = InboundKind::from_message_type(header.nlmsg_type) else {
                info!(
                    kind = message_kind_name(header.nlmsg_type),
                    "no handler for notification"
                );
                continue;
            };
            if header.nlmsg_pid == self.command_port {
                debug!(seq = header.nlmsg_seq, "notification caused by our own request");
            }

            match kind.handle(payload, self.filter) {
                Ok(Decoded::Item(event)) => {
                    debug!(event = event.kind_name(), index = event.port_index(), "publishing");
                    // No subscribers is fine.
                    let _ = self.events.send(event);
                    published += 1;
                }
                Ok(Decoded::Filtered(reason)) => debug!(%reason, "filtered notification"),
                Err(e) => warn!(
                    kind = message_kind_name(header.nlmsg_type),
                    error = %e,
                    "undecodable notification"
                ),
            }
        }
        published
    }
}

/// The multicast side of the notification loop.
trait NotificationSource {
    fn port(&self) -> u32;
    fn recv_buffer_size(&self) -> usize;
    fn poll_readable(&self, timeout: Duration) -> Result<Readiness>;
    fn recv(&self, buf: &mut BytesMut) -> Result<usize>;
}

impl NotificationSource for NetlinkSocket {
    fn port(&self) -> u32 {
        NetlinkSocket::port(self)
    }

    fn recv_buffer_size(&self) -> usize {
        NetlinkSocket::recv_buffer_size(self)
    }

    fn poll_readable(&self, timeout: Duration) -> Result<Readiness> {
        NetlinkSocket::poll_readable(self, timeout)
    }

    fn recv(&self, buf: &mut BytesMut) -> Result<usize> {
        NetlinkSocket::recv(self, buf)
    }
}

struct NotificationLoop<S = NetlinkSocket> {
    socket: S,
    dispatcher: NotificationDispatcher,
    shared: Arc<Shared>,
    poll_timeout: Duration,
}

impl<S: NotificationSource> NotificationLoop<S> {
    fn run(self) {
        debug!(port = self.socket.port(), "notification loop started");
        let mut buf = BytesMut::with_capacity(self.socket.recv_buffer_size());

        while self.shared.running.load(Ordering::SeqCst) {
            match self.socket.poll_readable(self.poll_timeout) {
                Ok(Readiness::Readable) => {}
                Ok(Readiness::TimedOut) => continue,
                Ok(Readiness::Failed(revents)) => {
                    error!(revents, "notification socket failed");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "poll on notification socket failed");
                    break;
                }
            }

            match self.socket.recv(&mut buf) {
                Ok(n) => {
                    self.dispatcher.dispatch(&buf[..n]);
                }
                Err(Error::Io(e)) if e.raw_os_error() == Some(libc::ENOBUFS) => {
                    // The receive cleared the socket error; later datagrams
                    // arrive normally.
                    warn!("notification socket overrun, events were lost");
                }
                Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(e) => {
                    error!(error = %e, "receive on notification socket failed");
                    break;
                }
            }
        }
        debug!("notification loop exiting");
    }
}
