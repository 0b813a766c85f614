// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// MQTT-SN v1.2 wire format parser/builder (gateway subset).
//
// All parsing is safe: malformed input returns Err, never panics.
// Multi-byte integers are big-endian on the wire.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while decoding a datagram into a [`Packet`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Frame too short, declared length disagrees with the datagram size,
    /// truncated body or invalid field value.
    #[error("malformed frame: {0}")]
    Malformed(String),
    /// Message type byte outside the supported set.
    #[error("unknown message type: 0x{0:02x}")]
    UnknownType(u8),
}

impl DecodeError {
    fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed(reason.into())
    }
}

/// Errors produced while building a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// The 1-byte length field caps a frame at 255 bytes.
    #[error("frame of {size} bytes exceeds the 255-byte limit")]
    TooLarge { size: usize },
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Length byte + message type byte.
pub const FRAME_HEADER_SIZE: usize = 2;

/// Largest frame expressible with the 1-byte length field.
pub const MAX_FRAME_SIZE: usize = 255;

// Message types
pub const MSG_CONNECT: u8 = 0x04;
pub const MSG_CONNACK: u8 = 0x05;
pub const MSG_REGISTER: u8 = 0x0A;
pub const MSG_REGACK: u8 = 0x0B;
pub const MSG_PUBLISH: u8 = 0x0C;
pub const MSG_PUBACK: u8 = 0x0D;
pub const MSG_SUBSCRIBE: u8 = 0x12;
pub const MSG_SUBACK: u8 = 0x13;
pub const MSG_UNSUBSCRIBE: u8 = 0x14;
pub const MSG_UNSUBACK: u8 = 0x15;
pub const MSG_PINGREQ: u8 = 0x16;
pub const MSG_PINGRESP: u8 = 0x17;
pub const MSG_DISCONNECT: u8 = 0x18;

// Flag bits
pub const FLAG_DUP: u8 = 0x80;
pub const FLAG_QOS_MASK: u8 = 0x60;
pub const FLAG_QOS_SHIFT: u8 = 5;
pub const FLAG_RETAIN: u8 = 0x10;
pub const FLAG_WILL: u8 = 0x08;
pub const FLAG_CLEAN_SESSION: u8 = 0x04;
pub const FLAG_TOPIC_TYPE_MASK: u8 = 0x03;

// Topic id types (flags bits 0-1)
pub const TOPIC_TYPE_NAME: u8 = 0x00;
pub const TOPIC_TYPE_ID: u8 = 0x01;
pub const TOPIC_TYPE_SHORT: u8 = 0x02;

// Return codes
pub const RC_ACCEPTED: u8 = 0x00;
pub const RC_CONGESTION: u8 = 0x01;
pub const RC_INVALID_TOPIC_ID: u8 = 0x02;
pub const RC_NOT_SUPPORTED: u8 = 0x03;

// ---------------------------------------------------------------------------
// QoS level
// ---------------------------------------------------------------------------

/// QoS as carried in flags bits 5-6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum QosLevel {
    #[default]
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
    /// QoS "-1": publish without a session.
    NoSession = 3,
}

impl QosLevel {
    pub fn from_bits(v: u8) -> Self {
        match v & 0x03 {
            0 => Self::AtMostOnce,
            1 => Self::AtLeastOnce,
            2 => Self::ExactlyOnce,
            _ => Self::NoSession,
        }
    }

    pub fn bits(self) -> u8 {
        self as u8
    }

    /// QoS 1 and 2 publishes carry a message id.
    pub fn carries_msg_id(self) -> bool {
        matches!(self, Self::AtLeastOnce | Self::ExactlyOnce)
    }
}

// ---------------------------------------------------------------------------
// Flags
// ---------------------------------------------------------------------------

/// The flags byte minus the topic-id-type bits, which travel with
/// [`TopicRef`] so a packet cannot carry two disagreeing topic types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags {
    pub dup: bool,
    pub qos: QosLevel,
    pub retain: bool,
    pub will: bool,
    pub clean_session: bool,
}

impl Flags {
    pub fn from_byte(b: u8) -> Self {
        Self {
            dup: b & FLAG_DUP != 0,
            qos: QosLevel::from_bits((b & FLAG_QOS_MASK) >> FLAG_QOS_SHIFT),
            retain: b & FLAG_RETAIN != 0,
            will: b & FLAG_WILL != 0,
            clean_session: b & FLAG_CLEAN_SESSION != 0,
        }
    }

    pub fn to_byte(self, topic_type: u8) -> u8 {
        let mut b = (self.qos.bits() << FLAG_QOS_SHIFT) & FLAG_QOS_MASK;
        if self.dup {
            b |= FLAG_DUP;
        }
        if self.retain {
            b |= FLAG_RETAIN;
        }
        if self.will {
            b |= FLAG_WILL;
        }
        if self.clean_session {
            b |= FLAG_CLEAN_SESSION;
        }
        b | (topic_type & FLAG_TOPIC_TYPE_MASK)
    }

    pub fn with_qos(qos: QosLevel) -> Self {
        Self {
            qos,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Topic addressing
// ---------------------------------------------------------------------------

/// How a PUBLISH / SUBSCRIBE / UNSUBSCRIBE names its topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicRef {
    /// Full topic name (or topic filter for SUBSCRIBE).
    Name(String),
    /// Registered topic id.
    Id(u16),
    /// Two-character short topic name.
    Short([u8; 2]),
}

impl TopicRef {
    pub fn id_type(&self) -> u8 {
        match self {
            Self::Name(_) => TOPIC_TYPE_NAME,
            Self::Id(_) => TOPIC_TYPE_ID,
            Self::Short(_) => TOPIC_TYPE_SHORT,
        }
    }
}

// ---------------------------------------------------------------------------
// Return codes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReturnCode {
    Accepted = RC_ACCEPTED,
    Congestion = RC_CONGESTION,
    InvalidTopicId = RC_INVALID_TOPIC_ID,
    NotSupported = RC_NOT_SUPPORTED,
}

impl ReturnCode {
    pub fn from_u8(v: u8) -> Result<Self, DecodeError> {
        match v {
            RC_ACCEPTED => Ok(Self::Accepted),
            RC_CONGESTION => Ok(Self::Congestion),
            RC_INVALID_TOPIC_ID => Ok(Self::InvalidTopicId),
            RC_NOT_SUPPORTED => Ok(Self::NotSupported),
            other => Err(DecodeError::malformed(format!(
                "unknown return code 0x{other:02x}"
            ))),
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

// ---------------------------------------------------------------------------
// Frame header
// ---------------------------------------------------------------------------

/// `[length][msg_type]` prefix shared by every packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub length: u8,
    pub msg_type: u8,
}

impl FrameHeader {
    /// Parse the header and check the declared length against `buf.len()`.
    pub fn parse(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Err(DecodeError::malformed(format!(
                "frame of {} bytes is shorter than the header",
                buf.len()
            )));
        }
        let length = buf[0];
        if length as usize != buf.len() {
            return Err(DecodeError::malformed(format!(
                "declared length {} but received {} bytes",
                length,
                buf.len()
            )));
        }
        Ok(Self {
            length,
            msg_type: buf[1],
        })
    }

    pub fn write_to(&self, buf: &mut Vec<u8>) {
        buf.push(self.length);
        buf.push(self.msg_type);
    }
}

// ---------------------------------------------------------------------------
// Packet payloads
// ---------------------------------------------------------------------------

/// CONNECT (0x04)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectPayload {
    pub flags: Flags,
    pub protocol_id: u8,
    /// Keep-alive duration in seconds.
    pub keep_alive: u16,
    pub client_id: String,
}

/// CONNACK (0x05)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnAckPayload {
    pub return_code: ReturnCode,
}

/// REGISTER (0x0A). `topic_id` is 0 when sent by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterPayload {
    pub topic_id: u16,
    pub msg_id: u16,
    pub topic_name: String,
}

/// REGACK (0x0B)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegAckPayload {
    pub topic_id: u16,
    pub msg_id: u16,
    pub return_code: ReturnCode,
}

/// PUBLISH (0x0C). `msg_id` is only on the wire for QoS 1 and 2 and
/// decodes as 0 otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishPayload {
    pub flags: Flags,
    pub topic: TopicRef,
    pub msg_id: u16,
    pub data: Vec<u8>,
}

/// PUBACK (0x0D)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PubAckPayload {
    pub topic_id: u16,
    pub msg_id: u16,
    pub return_code: ReturnCode,
}

/// SUBSCRIBE (0x12)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribePayload {
    pub flags: Flags,
    pub msg_id: u16,
    pub topic: TopicRef,
}

/// SUBACK (0x13)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubAckPayload {
    pub flags: Flags,
    pub topic_id: u16,
    pub msg_id: u16,
    pub return_code: ReturnCode,
}

/// UNSUBSCRIBE (0x14)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribePayload {
    pub flags: Flags,
    pub msg_id: u16,
    pub topic: TopicRef,
}

/// UNSUBACK (0x15)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsubAckPayload {
    pub msg_id: u16,
}

// ---------------------------------------------------------------------------
// Unified packet enum
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Connect(ConnectPayload),
    ConnAck(ConnAckPayload),
    Register(RegisterPayload),
    RegAck(RegAckPayload),
    Publish(PublishPayload),
    PubAck(PubAckPayload),
    Subscribe(SubscribePayload),
    SubAck(SubAckPayload),
    Unsubscribe(UnsubscribePayload),
    UnsubAck(UnsubAckPayload),
    PingReq,
    PingResp,
    Disconnect,
}

impl Packet {
    pub fn msg_type(&self) -> u8 {
        match self {
            Self::Connect(_) => MSG_CONNECT,
            Self::ConnAck(_) => MSG_CONNACK,
            Self::Register(_) => MSG_REGISTER,
            Self::RegAck(_) => MSG_REGACK,
            Self::Publish(_) => MSG_PUBLISH,
            Self::PubAck(_) => MSG_PUBACK,
            Self::Subscribe(_) => MSG_SUBSCRIBE,
            Self::SubAck(_) => MSG_SUBACK,
            Self::Unsubscribe(_) => MSG_UNSUBSCRIBE,
            Self::UnsubAck(_) => MSG_UNSUBACK,
            Self::PingReq => MSG_PINGREQ,
            Self::PingResp => MSG_PINGRESP,
            Self::Disconnect => MSG_DISCONNECT,
        }
    }

    /// Upper-case protocol name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect(_) => "CONNECT",
            Self::ConnAck(_) => "CONNACK",
            Self::Register(_) => "REGISTER",
            Self::RegAck(_) => "REGACK",
            Self::Publish(_) => "PUBLISH",
            Self::PubAck(_) => "PUBACK",
            Self::Subscribe(_) => "SUBSCRIBE",
            Self::SubAck(_) => "SUBACK",
            Self::Unsubscribe(_) => "UNSUBSCRIBE",
            Self::UnsubAck(_) => "UNSUBACK",
            Self::PingReq => "PINGREQ",
            Self::PingResp => "PINGRESP",
            Self::Disconnect => "DISCONNECT",
        }
    }
}

// ---------------------------------------------------------------------------
// Body reader
// ---------------------------------------------------------------------------

struct BodyReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BodyReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn u8(&mut self, field: &str) -> Result<u8, DecodeError> {
        let b = *self
            .buf
            .get(self.pos)
            .ok_or_else(|| DecodeError::malformed(format!("truncated before {field}")))?;
        self.pos += 1;
        Ok(b)
    }

    fn u16(&mut self, field: &str) -> Result<u16, DecodeError> {
        if self.remaining() < 2 {
            return Err(DecodeError::malformed(format!("truncated before {field}")));
        }
        let v = u16::from_be_bytes([self.buf[self.pos], self.buf[self.pos + 1]]);
        self.pos += 2;
        Ok(v)
    }

    fn take(&mut self, n: usize, field: &str) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::malformed(format!("truncated {field}")));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }

    fn finish(&self, msg: &str) -> Result<(), DecodeError> {
        if self.remaining() != 0 {
            return Err(DecodeError::malformed(format!(
                "{} trailing bytes after {msg}",
                self.remaining()
            )));
        }
        Ok(())
    }
}

fn topic_name_from(bytes: &[u8]) -> Result<String, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::malformed("empty topic name"));
    }
    String::from_utf8(bytes.to_vec())
        .map_err(|_| DecodeError::malformed("topic name is not valid UTF-8"))
}

fn topic_type_of(flags_byte: u8) -> Result<u8, DecodeError> {
    let t = flags_byte & FLAG_TOPIC_TYPE_MASK;
    if t > TOPIC_TYPE_SHORT {
        return Err(DecodeError::malformed("reserved topic id type"));
    }
    Ok(t)
}

/// Bytes the legacy scanner accepts as part of a topic name.
pub fn is_topic_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'/' || b == b'_'
}

/// Length of the topic name at the start of a PUBLISH-by-name span.
///
/// The name is capped at `span.len() - reserved`, so at least `reserved`
/// bytes always remain for the message id. This only bounds the name: when a
/// payload follows, a message id made of name-class bytes can still be taken
/// as part of the name. A configured well-known name wins (longest match)
/// before falling back to the character-class scan.
fn topic_name_len(span: &[u8], reserved: usize, known_topics: &[String]) -> Result<usize, DecodeError> {
    if span.len() < reserved {
        return Err(DecodeError::malformed("truncated before msg_id"));
    }
    let limit = span.len() - reserved;
    let known = known_topics
        .iter()
        .map(String::as_bytes)
        .filter(|name| !name.is_empty() && name.len() <= limit && span.starts_with(name))
        .map(<[u8]>::len)
        .max();
    if let Some(len) = known {
        return Ok(len);
    }
    let scanned = span[..limit]
        .iter()
        .take_while(|&&b| is_topic_name_byte(b))
        .count();
    if scanned == 0 {
        return Err(DecodeError::malformed("empty topic name"));
    }
    Ok(scanned)
}

fn parse_topic_field(
    reader: &mut BodyReader<'_>,
    topic_type: u8,
) -> Result<TopicRef, DecodeError> {
    match topic_type {
        TOPIC_TYPE_ID => Ok(TopicRef::Id(reader.u16("topic_id")?)),
        TOPIC_TYPE_SHORT => {
            let b = reader.take(2, "short topic name")?;
            Ok(TopicRef::Short([b[0], b[1]]))
        }
        _ => Ok(TopicRef::Name(topic_name_from(reader.rest())?)),
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse one datagram using only the character-class topic-name scan.
pub fn parse_packet(buf: &[u8]) -> Result<Packet, DecodeError> {
    parse_packet_with(buf, &[])
}

/// Parse one datagram. `known_topics` feeds the PUBLISH-by-name boundary
/// inference.
pub fn parse_packet_with(buf: &[u8], known_topics: &[String]) -> Result<Packet, DecodeError> {
    let hdr = FrameHeader::parse(buf)?;
    let mut r = BodyReader::new(&buf[FRAME_HEADER_SIZE..]);

    let packet = match hdr.msg_type {
        MSG_CONNECT => {
            let flags = Flags::from_byte(r.u8("flags")?);
            let protocol_id = r.u8("protocol_id")?;
            let keep_alive = r.u16("duration")?;
            let client_id = String::from_utf8_lossy(r.rest()).into_owned();
            Packet::Connect(ConnectPayload {
                flags,
                protocol_id,
                keep_alive,
                client_id,
            })
        }
        MSG_CONNACK => {
            let return_code = ReturnCode::from_u8(r.u8("return_code")?)?;
            r.finish("CONNACK")?;
            Packet::ConnAck(ConnAckPayload { return_code })
        }
        MSG_REGISTER => {
            let topic_id = r.u16("topic_id")?;
            let msg_id = r.u16("msg_id")?;
            let topic_name = topic_name_from(r.rest())?;
            Packet::Register(RegisterPayload {
                topic_id,
                msg_id,
                topic_name,
            })
        }
        MSG_REGACK => {
            let topic_id = r.u16("topic_id")?;
            let msg_id = r.u16("msg_id")?;
            let return_code = ReturnCode::from_u8(r.u8("return_code")?)?;
            r.finish("REGACK")?;
            Packet::RegAck(RegAckPayload {
                topic_id,
                msg_id,
                return_code,
            })
        }
        MSG_PUBLISH => {
            let flags_byte = r.u8("flags")?;
            let flags = Flags::from_byte(flags_byte);
            let id_len = if flags.qos.carries_msg_id() { 2 } else { 0 };
            let topic = match topic_type_of(flags_byte)? {
                TOPIC_TYPE_NAME => {
                    let span = &r.buf[r.pos..];
                    let len = topic_name_len(span, id_len, known_topics)?;
                    TopicRef::Name(topic_name_from(r.take(len, "topic name")?)?)
                }
                other => parse_topic_field(&mut r, other)?,
            };
            let msg_id = if id_len > 0 { r.u16("msg_id")? } else { 0 };
            Packet::Publish(PublishPayload {
                flags,
                topic,
                msg_id,
                data: r.rest().to_vec(),
            })
        }
        MSG_PUBACK => {
            let topic_id = r.u16("topic_id")?;
            let msg_id = r.u16("msg_id")?;
            let return_code = ReturnCode::from_u8(r.u8("return_code")?)?;
            r.finish("PUBACK")?;
            Packet::PubAck(PubAckPayload {
                topic_id,
                msg_id,
                return_code,
            })
        }
        MSG_SUBSCRIBE | MSG_UNSUBSCRIBE => {
            let flags_byte = r.u8("flags")?;
            let flags = Flags::from_byte(flags_byte);
            let msg_id = r.u16("msg_id")?;
            let topic = parse_topic_field(&mut r, topic_type_of(flags_byte)?)?;
            r.finish("topic")?;
            if hdr.msg_type == MSG_SUBSCRIBE {
                Packet::Subscribe(SubscribePayload {
                    flags,
                    msg_id,
                    topic,
                })
            } else {
                Packet::Unsubscribe(UnsubscribePayload {
                    flags,
                    msg_id,
                    topic,
                })
            }
        }
        MSG_SUBACK => {
            let flags = Flags::from_byte(r.u8("flags")?);
            let topic_id = r.u16("topic_id")?;
            let msg_id = r.u16("msg_id")?;
            let return_code = ReturnCode::from_u8(r.u8("return_code")?)?;
            r.finish("SUBACK")?;
            Packet::SubAck(SubAckPayload {
                flags,
                topic_id,
                msg_id,
                return_code,
            })
        }
        MSG_UNSUBACK => {
            let msg_id = r.u16("msg_id")?;
            r.finish("UNSUBACK")?;
            Packet::UnsubAck(UnsubAckPayload { msg_id })
        }
        // Optional client id / sleep duration are ignored.
        MSG_PINGREQ => Packet::PingReq,
        MSG_DISCONNECT => Packet::Disconnect,
        MSG_PINGRESP => {
            r.finish("PINGRESP")?;
            Packet::PingResp
        }
        other => return Err(DecodeError::UnknownType(other)),
    };
    Ok(packet)
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

fn write_topic(body: &mut Vec<u8>, topic: &TopicRef) {
    match topic {
        TopicRef::Name(name) => body.extend_from_slice(name.as_bytes()),
        TopicRef::Id(id) => body.extend_from_slice(&id.to_be_bytes()),
        TopicRef::Short(s) => body.extend_from_slice(s),
    }
}

/// Serialize a packet into a complete frame. The length byte is recomputed.
pub fn serialize_packet(packet: &Packet) -> Result<Vec<u8>, EncodeError> {
    let mut body = Vec::new();
    match packet {
        Packet::Connect(p) => {
            body.push(p.flags.to_byte(0));
            body.push(p.protocol_id);
            body.extend_from_slice(&p.keep_alive.to_be_bytes());
            body.extend_from_slice(p.client_id.as_bytes());
        }
        Packet::ConnAck(p) => body.push(p.return_code.as_u8()),
        Packet::Register(p) => {
            body.extend_from_slice(&p.topic_id.to_be_bytes());
            body.extend_from_slice(&p.msg_id.to_be_bytes());
            body.extend_from_slice(p.topic_name.as_bytes());
        }
        Packet::RegAck(p) => {
            body.extend_from_slice(&p.topic_id.to_be_bytes());
            body.extend_from_slice(&p.msg_id.to_be_bytes());
            body.push(p.return_code.as_u8());
        }
        Packet::Publish(p) => {
            body.push(p.flags.to_byte(p.topic.id_type()));
            write_topic(&mut body, &p.topic);
            if p.flags.qos.carries_msg_id() {
                body.extend_from_slice(&p.msg_id.to_be_bytes());
            }
            body.extend_from_slice(&p.data);
        }
        Packet::PubAck(p) => {
            body.extend_from_slice(&p.topic_id.to_be_bytes());
            body.extend_from_slice(&p.msg_id.to_be_bytes());
            body.push(p.return_code.as_u8());
        }
        Packet::Subscribe(SubscribePayload { flags, msg_id, topic })
        | Packet::Unsubscribe(UnsubscribePayload { flags, msg_id, topic }) => {
            body.push(flags.to_byte(topic.id_type()));
            body.extend_from_slice(&msg_id.to_be_bytes());
            write_topic(&mut body, topic);
        }
        Packet::SubAck(p) => {
            body.push(p.flags.to_byte(0));
            body.extend_from_slice(&p.topic_id.to_be_bytes());
            body.extend_from_slice(&p.msg_id.to_be_bytes());
            body.push(p.return_code.as_u8());
        }
        Packet::UnsubAck(p) => body.extend_from_slice(&p.msg_id.to_be_bytes()),
        Packet::PingReq | Packet::PingResp | Packet::Disconnect => {}
    }

    let size = FRAME_HEADER_SIZE + body.len();
    if size > MAX_FRAME_SIZE {
        return Err(EncodeError::TooLarge { size });
    }
    let mut out = Vec::with_capacity(size);
    FrameHeader {
        length: size as u8,
        msg_type: packet.msg_type(),
    }
    .write_to(&mut out);
    out.extend_from_slice(&body);
    Ok(out)
}
