//! Netlink message header, flags, kinds and frame iteration.

use super::error::{Error, Result};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Netlink message header alignment.
pub const NLMSG_ALIGNTO: usize = 4;

/// Align a length to NLMSG_ALIGNTO boundary.
#[inline]
pub const fn nlmsg_align(len: usize) -> usize {
    (len + NLMSG_ALIGNTO - 1) & !(NLMSG_ALIGNTO - 1)
}

/// Size of the netlink message header.
pub const NLMSG_HDRLEN: usize = nlmsg_align(std::mem::size_of::<NlMsgHdr>());

/// Netlink message header (mirrors struct nlmsghdr).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlMsgHdr {
    /// Length of message including header.
    pub nlmsg_len: u32,
    /// Message type.
    pub nlmsg_type: u16,
    /// Additional flags.
    pub nlmsg_flags: u16,
    /// Sequence number.
    pub nlmsg_seq: u32,
    /// Sending process port ID.
    pub nlmsg_pid: u32,
}

impl NlMsgHdr {
    /// Create a new message header.
    pub fn new(msg_type: u16, flags: u16) -> Self {
        Self {
            nlmsg_len: NLMSG_HDRLEN as u32,
            nlmsg_type: msg_type,
            nlmsg_flags: flags,
            nlmsg_seq: 0,
            nlmsg_pid: 0,
        }
    }

    /// Get the payload length (total length minus header).
    pub fn payload_len(&self) -> usize {
        (self.nlmsg_len as usize).saturating_sub(NLMSG_HDRLEN)
    }

    /// Check if this is an error (or ACK) message.
    pub fn is_error(&self) -> bool {
        self.nlmsg_type == NlMsgType::ERROR
    }

    /// Check if this is a done message.
    pub fn is_done(&self) -> bool {
        self.nlmsg_type == NlMsgType::DONE
    }

    /// Check if this message has the multi flag.
    pub fn is_multi(&self) -> bool {
        self.nlmsg_flags & NLM_F_MULTI != 0
    }

    /// Convert header to bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    /// Parse header from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(data)
            .map(|(r, _)| r)
            .map_err(|_| Error::Truncated {
                expected: std::mem::size_of::<Self>(),
                actual: data.len(),
            })
    }

    /// One-line summary used by debug frame logging.
    pub fn summary(&self) -> String {
        format!(
            "{} len={} flags={:#x} seq={} pid={}",
            message_kind_name(self.nlmsg_type),
            self.nlmsg_len,
            self.nlmsg_flags,
            self.nlmsg_seq,
            self.nlmsg_pid
        )
    }
}

/// Netlink message kinds used by the engine.
pub struct NlMsgType;

impl NlMsgType {
    /// No operation, message must be discarded.
    pub const NOOP: u16 = 1;
    /// Error message or ACK.
    pub const ERROR: u16 = 2;
    /// End of multipart message.
    pub const DONE: u16 = 3;
    /// Data lost, request resend.
    pub const OVERRUN: u16 = 4;

    // Link messages
    pub const RTM_NEWLINK: u16 = 16;
    pub const RTM_DELLINK: u16 = 17;
    pub const RTM_GETLINK: u16 = 18;
    pub const RTM_SETLINK: u16 = 19;

    // Address messages
    pub const RTM_NEWADDR: u16 = 20;
    pub const RTM_DELADDR: u16 = 21;
    pub const RTM_GETADDR: u16 = 22;

    // Route messages
    pub const RTM_NEWROUTE: u16 = 24;
    pub const RTM_DELROUTE: u16 = 25;
    pub const RTM_GETROUTE: u16 = 26;
}

/// Name of a message kind, for logs.
pub fn message_kind_name(kind: u16) -> &'static str {
    match kind {
        NlMsgType::NOOP => "NLMSG_NOOP",
        NlMsgType::ERROR => "NLMSG_ERROR",
        NlMsgType::DONE => "NLMSG_DONE",
        NlMsgType::OVERRUN => "NLMSG_OVERRUN",
        NlMsgType::RTM_NEWLINK => "RTM_NEWLINK",
        NlMsgType::RTM_DELLINK => "RTM_DELLINK",
        NlMsgType::RTM_GETLINK => "RTM_GETLINK",
        NlMsgType::RTM_SETLINK => "RTM_SETLINK",
        NlMsgType::RTM_NEWADDR => "RTM_NEWADDR",
        NlMsgType::RTM_DELADDR => "RTM_DELADDR",
        NlMsgType::RTM_GETADDR => "RTM_GETADDR",
        NlMsgType::RTM_NEWROUTE => "RTM_NEWROUTE",
        NlMsgType::RTM_DELROUTE => "RTM_DELROUTE",
        NlMsgType::RTM_GETROUTE => "RTM_GETROUTE",
        _ => "UNKNOWN",
    }
}

/// Netlink message flags.
pub const NLM_F_REQUEST: u16 = 0x01;
pub const NLM_F_MULTI: u16 = 0x02;
pub const NLM_F_ACK: u16 = 0x04;
pub const NLM_F_ECHO: u16 = 0x08;
pub const NLM_F_DUMP_INTR: u16 = 0x10;

// Modifiers to GET request
pub const NLM_F_ROOT: u16 = 0x100;
pub const NLM_F_MATCH: u16 = 0x200;
pub const NLM_F_DUMP: u16 = NLM_F_ROOT | NLM_F_MATCH;

// Modifiers to NEW request
pub const NLM_F_REPLACE: u16 = 0x100;
pub const NLM_F_EXCL: u16 = 0x200;
pub const NLM_F_CREATE: u16 = 0x400;
pub const NLM_F_APPEND: u16 = 0x800;

/// Write a sequence number into an encoded frame.
pub fn stamp_sequence(frame: &mut [u8], seq: u32) -> Result<()> {
    stamp_u32(frame, 8, seq)
}

/// Write the sender port id into an encoded frame.
pub fn stamp_port(frame: &mut [u8], pid: u32) -> Result<()> {
    stamp_u32(frame, 12, pid)
}

fn stamp_u32(frame: &mut [u8], offset: usize, value: u32) -> Result<()> {
    let actual = frame.len();
    let slot = frame
        .get_mut(offset..offset + 4)
        .ok_or(Error::Truncated {
            expected: NLMSG_HDRLEN,
            actual,
        })?;
    slot.copy_from_slice(&value.to_ne_bytes());
    Ok(())
}

/// Iterator over netlink messages in a buffer.
pub struct MessageIter<'a> {
    data: &'a [u8],
}

impl<'a> MessageIter<'a> {
    /// Create a new message iterator.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a> Iterator for MessageIter<'a> {
    type Item = Result<(&'a NlMsgHdr, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.len() < NLMSG_HDRLEN {
            return None;
        }
        let data = std::mem::take(&mut self.data);

        let header = match NlMsgHdr::from_bytes(data) {
            Ok(header) => header,
            Err(e) => return Some(Err(e)),
        };
        let frame_len = header.nlmsg_len as usize;
        if !(NLMSG_HDRLEN..=data.len()).contains(&frame_len) {
            // The rest of the datagram is left unread.
            return Some(Err(Error::InvalidMessage(format!(
                "frame length {} outside {}..={}",
                frame_len,
                NLMSG_HDRLEN,
                data.len()
            ))));
        }

        self.data = data.get(nlmsg_align(frame_len)..).unwrap_or_default();
        Some(Ok((header, &data[NLMSG_HDRLEN..frame_len])))
    }
}

/// Netlink error message payload (mirrors struct nlmsgerr).
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, Immutable, KnownLayout)]
pub struct NlMsgError {
    /// Error code (negative errno or 0 for ACK).
    pub error: i32,
    /// Original message header that caused the error.
    pub msg: NlMsgHdr,
}

impl NlMsgError {
    /// Parse error message from payload.
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(data)
            .map(|(r, _)| r)
            .map_err(|_| Error::Truncated {
                expected: std::mem::size_of::<Self>(),
                actual: data.len(),
            })
    }

    /// Check if this is an ACK (no error).
    pub fn is_ack(&self) -> bool {
        self.error == 0
    }
}

/// Decoded terminal reply (NLMSG_ERROR with or without an error code).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyEnvelope {
    /// True when the kernel acknowledged the request.
    pub is_ack: bool,
    /// Negative errno, or 0 for an ACK.
    pub error_code: i32,
    /// Echoed request header and whatever payload the kernel kept.
    pub echoed_request: Option<Vec<u8>>,
    /// Port id of the original requester.
    pub requester_port_id: u32,
    /// Sequence number of the original request.
    pub sequence: u32,
}

impl ReplyEnvelope {
    /// Decode the payload of an NLMSG_ERROR frame.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let err = NlMsgError::from_bytes(payload)?;
        let echoed = &payload[std::mem::size_of::<i32>()..];

        Ok(Self {
            is_ack: err.is_ack(),
            error_code: err.error,
            echoed_request: (!echoed.is_empty()).then(|| echoed.to_vec()),
            requester_port_id: err.msg.nlmsg_pid,
            sequence: err.msg.nlmsg_seq,
        })
    }

    /// Kind of the request this reply answers.
    pub fn request_kind(&self) -> Option<u16> {
        self.echoed_request
            .as_deref()
            .and_then(|bytes| NlMsgHdr::from_bytes(bytes).ok())
            .map(|hdr| hdr.nlmsg_type)
    }

    /// Convert into `Ok(())` for an ACK or a kernel error.
    pub fn into_result(self) -> Result<()> {
        if self.is_ack {
            Ok(())
        } else {
            Err(Error::from_errno(self.error_code))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(kind: u16, flags: u16, seq: u32, payload: &[u8]) -> Vec<u8> {
        let mut hdr = NlMsgHdr::new(kind, flags);
        hdr.nlmsg_len = (NLMSG_HDRLEN + payload.len()) as u32;
        hdr.nlmsg_seq = seq;
        let mut out = hdr.as_bytes().to_vec();
        out.extend_from_slice(payload);
        out.resize(nlmsg_align(out.len()), 0);
        out
    }

    #[test]
    fn test_iterates_padded_frames() {
        let mut buf = frame(NlMsgType::RTM_NEWLINK, NLM_F_MULTI, 7, &[1, 2, 3]);
        buf.extend(frame(NlMsgType::DONE, NLM_F_MULTI, 7, &[0; 4]));

        let frames: Vec<_> = MessageIter::new(&buf).collect::<Result<_>>().unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].1, &[1, 2, 3]);
        assert!(frames[0].0.is_multi());
        assert!(frames[1].0.is_done());
    }

    #[test]
    fn test_bad_length_stops_iteration() {
        let mut buf = frame(NlMsgType::RTM_NEWLINK, 0, 1, &[0; 8]);
        buf[0..4].copy_from_slice(&200u32.to_ne_bytes());

        let mut iter = MessageIter::new(&buf);
        assert!(matches!(iter.next(), Some(Err(Error::InvalidMessage(_)))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_stamp_sequence() {
        let mut buf = frame(NlMsgType::RTM_GETROUTE, NLM_F_REQUEST, 0, &[]);
        stamp_sequence(&mut buf, 0xdead).unwrap();
        stamp_port(&mut buf, 42).unwrap();
        let hdr = NlMsgHdr::from_bytes(&buf).unwrap();
        assert_eq!(hdr.nlmsg_seq, 0xdead);
        assert_eq!(hdr.nlmsg_pid, 42);

        assert!(matches!(
            stamp_sequence(&mut [0u8; 6], 1),
            Err(Error::Truncated { actual: 6, .. })
        ));
    }

    #[test]
    fn test_reply_envelope() {
        let request = frame(NlMsgType::RTM_NEWROUTE, NLM_F_REQUEST, 99, &[]);
        let mut payload = (-17i32).to_ne_bytes().to_vec();
        payload.extend_from_slice(&request);

        let env = ReplyEnvelope::parse(&payload).unwrap();
        assert!(!env.is_ack);
        assert_eq!(env.error_code, -17);
        assert_eq!(env.sequence, 99);
        assert_eq!(env.request_kind(), Some(NlMsgType::RTM_NEWROUTE));
        assert!(env.into_result().unwrap_err().is_already_exists());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(message_kind_name(NlMsgType::RTM_DELADDR), "RTM_DELADDR");
        assert_eq!(message_kind_name(999), "UNKNOWN");
    }
}
