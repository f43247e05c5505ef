//! Message builder for constructing netlink requests.
//!
//! Every builder carries a maximum message length. Appending past it is a
//! programming error in the caller and panics.

use zerocopy::{Immutable, IntoBytes};

use super::attr::{NLA_F_NESTED, NLA_HDRLEN, NlAttr, nla_align};
use super::message::{NLMSG_HDRLEN, NlMsgHdr, nlmsg_align};

/// Default capacity of a request message.
pub const MAX_REQUEST_LEN: usize = 4096;

/// Token returned when starting a nested attribute.
/// Used to finalize the nested attribute length.
#[derive(Debug, Clone, Copy)]
#[must_use = "a nested attribute must be closed with nest_end"]
pub struct NestToken {
    /// Offset of the nested attribute header in the buffer.
    offset: usize,
}

/// Builder for constructing netlink messages.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    buf: Vec<u8>,
    max_len: usize,
}

impl MessageBuilder {
    /// Create a new message builder with the given type and flags.
    pub fn new(msg_type: u16, flags: u16) -> Self {
        Self::with_capacity_limit(msg_type, flags, MAX_REQUEST_LEN)
    }

    /// Create a builder whose message may never exceed `max_len` bytes.
    pub fn with_capacity_limit(msg_type: u16, flags: u16, max_len: usize) -> Self {
        assert!(
            max_len >= NLMSG_HDRLEN,
            "message capacity {} is smaller than the netlink header",
            max_len
        );
        let header = NlMsgHdr::new(msg_type, flags);
        let mut buf = Vec::with_capacity(max_len);
        buf.extend_from_slice(header.as_bytes());
        Self { buf, max_len }
    }

    /// Get the current message length.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if the message is empty (header only).
    pub fn is_empty(&self) -> bool {
        self.buf.len() == NLMSG_HDRLEN
    }

    /// Declared maximum length.
    pub fn capacity_limit(&self) -> usize {
        self.max_len
    }

    fn reserve(&mut self, what: &str, aligned_len: usize) {
        let needed = self.buf.len() + aligned_len;
        assert!(
            needed <= self.max_len,
            "{} needs {} bytes but message capacity is {}",
            what,
            needed,
            self.max_len
        );
    }

    /// Append raw bytes to the message (with alignment padding).
    pub fn append_bytes(&mut self, data: &[u8]) {
        self.reserve("fixed header", nlmsg_align(data.len()));
        self.buf.extend_from_slice(data);
        let aligned = nlmsg_align(self.buf.len());
        self.buf.resize(aligned, 0);
    }

    /// Append a fixed-size kernel header.
    pub fn append_header<T: IntoBytes + Immutable>(&mut self, header: &T) {
        self.append_bytes(header.as_bytes());
    }

    /// Append an attribute with the given type and data.
    ///
    /// # Panics
    ///
    /// Panics if the padded attribute would exceed the message capacity.
    pub fn append_attr(&mut self, attr_type: u16, data: &[u8]) {
        let attr_len = NLA_HDRLEN + data.len();
        assert!(
            attr_len <= u16::MAX as usize,
            "attribute {} payload of {} bytes does not fit a u16 length",
            attr_type,
            data.len()
        );
        self.reserve(&format!("attribute {}", attr_type), nla_align(attr_len));

        let attr = NlAttr::new(attr_type, data.len());
        self.buf.extend_from_slice(attr.as_bytes());
        self.buf.extend_from_slice(data);
        let aligned = nla_align(self.buf.len());
        self.buf.resize(aligned, 0);
    }

    /// Append a u16 attribute (native endian).
    pub fn append_attr_u16(&mut self, attr_type: u16, value: u16) {
        self.append_attr(attr_type, &value.to_ne_bytes());
    }

    /// Append a u32 attribute (native endian).
    pub fn append_attr_u32(&mut self, attr_type: u16, value: u32) {
        self.append_attr(attr_type, &value.to_ne_bytes());
    }

    /// Append a null-terminated string attribute.
    pub fn append_attr_str(&mut self, attr_type: u16, value: &str) {
        let mut data = value.as_bytes().to_vec();
        data.push(0);
        self.append_attr(attr_type, &data);
    }

    /// Append a string attribute without null terminator.
    pub fn append_attr_string(&mut self, attr_type: u16, value: &str) {
        self.append_attr(attr_type, value.as_bytes());
    }

    /// Start a nested attribute. Returns a token to finalize it.
    pub fn nest_start(&mut self, attr_type: u16) -> NestToken {
        self.reserve(&format!("nested attribute {}", attr_type), NLA_HDRLEN);
        let offset = self.buf.len();
        let attr = NlAttr::new(attr_type | NLA_F_NESTED, 0);
        self.buf.extend_from_slice(attr.as_bytes());
        NestToken { offset }
    }

    /// End a nested attribute started with `nest_start`.
    pub fn nest_end(&mut self, token: NestToken) {
        let len = self.buf.len() - token.offset;
        let len_bytes = (len as u16).to_ne_bytes();
        self.buf[token.offset..token.offset + 2].copy_from_slice(&len_bytes);
    }

    /// Set the sequence number.
    pub fn set_seq(&mut self, seq: u32) {
        self.buf[8..12].copy_from_slice(&seq.to_ne_bytes());
    }

    /// Set the port ID.
    pub fn set_pid(&mut self, pid: u32) {
        self.buf[12..16].copy_from_slice(&pid.to_ne_bytes());
    }

    /// Finalize and return the message bytes.
    pub fn finish(mut self) -> Vec<u8> {
        let len = self.buf.len() as u32;
        self.buf[0..4].copy_from_slice(&len.to_ne_bytes());
        self.buf
    }

    /// Get the current buffer for inspection.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}
