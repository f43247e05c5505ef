//! Request/reply correlation on the command socket.
//!
//! Every request gets a fresh sequence number. Replies are matched on it;
//! anything else arriving on the socket (late frames from an earlier,
//! abandoned request) is skipped. A request ends with exactly one of:
//!
//! - `NLMSG_ERROR` with code 0: an ACK.
//! - `NLMSG_ERROR` with a negative errno: a kernel error.
//! - `NLMSG_DONE` after zero or more `NLM_F_MULTI` records: a dump.

use std::mem;

use bytes::BytesMut;
use tracing::{debug, info, warn};

use super::codec::{Decoded, DumpKind, decode_address, decode_link, decode_route};
use super::error::{Error, Result};
use super::message::{
    MessageIter, NlMsgHdr, NlMsgType, ReplyEnvelope, message_kind_name, stamp_port,
    stamp_sequence,
};
use super::messages::{AddressDescriptor, PortDescriptor, RouteDescriptor};
use super::seq::SequenceCounter;

const DEFAULT_RECV_BUFFER: usize = 32 * 1024;

/// Frame transport used by the correlator.
///
/// Implemented by [`NetlinkSocket`](super::socket::NetlinkSocket); tests
/// substitute scripted doubles.
pub trait FrameIo {
    /// Send one complete frame.
    fn send_frame(&mut self, frame: &[u8]) -> Result<()>;

    /// Receive one datagram into `buf`, returning its length. Zero means the
    /// peer is gone.
    fn recv_frames(&mut self, buf: &mut BytesMut) -> Result<usize>;

    /// Local port id stamped into outgoing frames.
    fn local_port(&self) -> u32;
}

/// Records collected from a dump.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "table", content = "records", rename_all = "lowercase"))]
pub enum Dump {
    Links(Vec<PortDescriptor>),
    Addresses(Vec<AddressDescriptor>),
    Routes(Vec<RouteDescriptor>),
}

impl Dump {
    pub fn kind(&self) -> DumpKind {
        match self {
            Dump::Links(_) => DumpKind::Links,
            Dump::Addresses(_) => DumpKind::Addresses,
            Dump::Routes(_) => DumpKind::Routes,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Dump::Links(v) => v.len(),
            Dump::Addresses(v) => v.len(),
            Dump::Routes(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Successful outcome of one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Ack,
    Dump(Dump),
}

impl Reply {
    fn describe(&self) -> &'static str {
        match self {
            Reply::Ack => "ack",
            Reply::Dump(dump) => dump.kind().as_str(),
        }
    }

    fn unexpected<T>(self, expected: &'static str) -> Result<T> {
        Err(Error::UnexpectedReply {
            expected,
            actual: self.describe(),
        })
    }

    pub fn into_ack(self) -> Result<()> {
        match self {
            Reply::Ack => Ok(()),
            other => other.unexpected("ack"),
        }
    }

    pub fn into_links(self) -> Result<Vec<PortDescriptor>> {
        match self {
            Reply::Dump(Dump::Links(links)) => Ok(links),
            other => other.unexpected("links"),
        }
    }

    pub fn into_addresses(self) -> Result<Vec<AddressDescriptor>> {
        match self {
            Reply::Dump(Dump::Addresses(addresses)) => Ok(addresses),
            other => other.unexpected("addresses"),
        }
    }

    pub fn into_routes(self) -> Result<Vec<RouteDescriptor>> {
        match self {
            Reply::Dump(Dump::Routes(routes)) => Ok(routes),
            other => other.unexpected("routes"),
        }
    }
}

enum State {
    AwaitingReply,
    Accumulating { kind: u16, frames: Vec<Vec<u8>> },
    Complete,
}

/// Per-request reply state machine.
pub(crate) struct Correlation {
    seq: u32,
    request_kind: u16,
    filter: bool,
    state: State,
}

impl Correlation {
    pub(crate) fn new(seq: u32, request_kind: u16, filter: bool) -> Self {
        Self {
            seq,
            request_kind,
            filter,
            state: State::AwaitingReply,
        }
    }

    pub(crate) fn is_complete(&self) -> bool {
        matches!(self.state, State::Complete)
    }

    /// Feed one frame. Returns the reply once the request is finished.
    pub(crate) fn feed(&mut self, header: &NlMsgHdr, payload: &[u8]) -> Result<Option<Reply>> {
        if self.is_complete() {
            return Ok(None);
        }
        if header.nlmsg_seq != self.seq {
            debug!(
                seq = header.nlmsg_seq,
                expected = self.seq,
                kind = message_kind_name(header.nlmsg_type),
                "skipping stale frame"
            );
            return Ok(None);
        }

        match header.nlmsg_type {
            NlMsgType::NOOP => Ok(None),
            NlMsgType::OVERRUN => {
                self.state = State::Complete;
                Err(Error::Overrun)
            }
            NlMsgType::ERROR => {
                self.state = State::Complete;
                ReplyEnvelope::parse(payload)?.into_result()?;
                Ok(Some(Reply::Ack))
            }
            NlMsgType::DONE => {
                let state = mem::replace(&mut self.state, State::Complete);
                if let Some(code) = done_error(payload)
                    && code < 0
                {
                    return Err(Error::from_errno(code));
                }
                let (kind, frames) = match state {
                    State::Accumulating { kind, frames } => (kind, frames),
                    _ => (self.request_kind, Vec::new()),
                };
                Ok(Some(Reply::Dump(self.decode_dump(kind, &frames)?)))
            }
            kind if header.is_multi() => {
                if let State::Accumulating { frames, .. } = &mut self.state {
                    frames.push(payload.to_vec());
                } else {
                    self.state = State::Accumulating {
                        kind,
                        frames: vec![payload.to_vec()],
                    };
                }
                Ok(None)
            }
            kind => {
                warn!(kind = message_kind_name(kind), seq = self.seq, "ignoring unexpected reply frame");
                Ok(None)
            }
        }
    }

    fn decode_dump(&self, kind: u16, frames: &[Vec<u8>]) -> Result<Dump> {
        let table = DumpKind::from_message_type(kind).ok_or(Error::UnexpectedReply {
            expected: "dump records",
            actual: message_kind_name(kind),
        })?;

        Ok(match table {
            DumpKind::Links => Dump::Links(collect(frames, self.filter, table, decode_link)),
            DumpKind::Addresses => {
                Dump::Addresses(collect(frames, self.filter, table, decode_address))
            }
            DumpKind::Routes => Dump::Routes(collect(frames, self.filter, table, decode_route)),
        })
    }
}

/// Optional i32 status carried by NLMSG_DONE.
fn done_error(payload: &[u8]) -> Option<i32> {
    payload
        .get(..4)
        .and_then(|bytes| bytes.try_into().ok())
        .map(i32::from_ne_bytes)
}

/// Decode every fragment; one bad record never spoils the dump.
fn collect<T>(
    frames: &[Vec<u8>],
    filter: bool,
    table: DumpKind,
    decode: fn(&[u8], bool) -> Result<Decoded<T>>,
) -> Vec<T> {
    frames
        .iter()
        .filter_map(|payload| match decode(payload, filter) {
            Ok(Decoded::Item(item)) => Some(item),
            Ok(Decoded::Filtered(reason)) => {
                debug!(table = table.as_str(), %reason, "filtered dump record");
                None
            }
            Err(e) => {
                warn!(table = table.as_str(), error = %e, "skipping undecodable dump record");
                None
            }
        })
        .collect()
}

/// Sends requests and waits for their replies, one at a time.
pub struct ReplyCorrelator<I> {
    io: I,
    buf: BytesMut,
    seq: SequenceCounter,
    filter: bool,
    debug: bool,
}

impl<I: FrameIo> ReplyCorrelator<I> {
    pub fn new(io: I, seq: SequenceCounter, filter: bool) -> Self {
        Self {
            io,
            buf: BytesMut::with_capacity(DEFAULT_RECV_BUFFER),
            seq,
            filter,
            debug: false,
        }
    }

    /// Log a summary of every frame at info.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn io(&self) -> &I {
        &self.io
    }

    /// Stamp `request` with a new sequence number, send it, and collect the
    /// reply.
    pub fn send_and_correlate(&mut self, mut request: Vec<u8>) -> Result<Reply> {
        let request_kind = NlMsgHdr::from_bytes(&request)?.nlmsg_type;
        let seq = self.seq.next();
        stamp_sequence(&mut request, seq)?;
        stamp_port(&mut request, self.io.local_port())?;

        if self.debug {
            info!(frame = %NlMsgHdr::from_bytes(&request)?.summary(), "send");
        }
        self.io.send_frame(&request)?;

        let mut correlation = Correlation::new(seq, request_kind, self.filter);
        loop {
            self.buf.clear();
            let n = self.io.recv_frames(&mut self.buf)?;
            if n == 0 {
                return Err(Error::Closed);
            }

            for frame in MessageIter::new(&self.buf[..n]) {
                let (header, payload) = frame?;
                if self.debug {
                    info!(frame = %header.summary(), "recv");
                }
                if let Some(reply) = correlation.feed(header, payload)? {
                    return Ok(reply);
                }
            }
        }
    }
}
