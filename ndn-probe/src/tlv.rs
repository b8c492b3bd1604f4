//! NDN packet format v0.3 wire encoding: Interest, Data and the NDNLPv2
//! `LpPacket` envelope a forwarder may wrap around them.
//!
//! ```text
//!  TLV      = TLV-TYPE TLV-LENGTH TLV-VALUE
//!  VAR-NUM  = 1 byte  (< 253)
//!           | 0xFD 2 bytes | 0xFE 4 bytes | 0xFF 8 bytes   (big-endian)
//! ```
//!
//! TLV framing is big-endian per the NDN format; only the application
//! payloads carried in `Content` use little-endian numbers (see `codec`).

use crate::error::ProbeError;
use crate::name::{Name, NameComponent};
use std::time::Duration;

pub mod types {
    pub const INTEREST: u64 = 0x05;
    pub const DATA: u64 = 0x06;
    pub const NAME: u64 = 0x07;
    pub const NONCE: u64 = 0x0A;
    pub const INTEREST_LIFETIME: u64 = 0x0C;
    pub const MUST_BE_FRESH: u64 = 0x12;
    pub const META_INFO: u64 = 0x14;
    pub const CONTENT: u64 = 0x15;
    pub const SIGNATURE_INFO: u64 = 0x16;
    pub const SIGNATURE_VALUE: u64 = 0x17;
    pub const CONTENT_TYPE: u64 = 0x18;
    pub const FRESHNESS_PERIOD: u64 = 0x19;
    pub const CAN_BE_PREFIX: u64 = 0x21;
    pub const HOP_LIMIT: u64 = 0x22;
    pub const LP_PACKET: u64 = 0x64;
    pub const LP_FRAGMENT: u64 = 0x50;
    pub const LP_NACK: u64 = 0x0320;
    pub const LP_NACK_REASON: u64 = 0x0321;
}

/* ============================
VAR-NUMBER / NonNegativeInteger
============================ */

pub fn write_var_number(out: &mut Vec<u8>, value: u64) {
    if value < 253 {
        out.push(value as u8);
    } else if value <= u16::MAX as u64 {
        out.push(0xFD);
        out.extend_from_slice(&(value as u16).to_be_bytes());
    } else if value <= u32::MAX as u64 {
        out.push(0xFE);
        out.extend_from_slice(&(value as u32).to_be_bytes());
    } else {
        out.push(0xFF);
        out.extend_from_slice(&value.to_be_bytes());
    }
}

pub fn read_var_number(data: &[u8], offset: usize) -> Result<(u64, usize), ProbeError> {
    let first = *data
        .get(offset)
        .ok_or_else(|| ProbeError::MalformedPacket("var-number overflow".into()))?;
    let width = match first {
        0xFD => 2,
        0xFE => 4,
        0xFF => 8,
        v => return Ok((v as u64, offset + 1)),
    };
    let bytes = data
        .get(offset + 1..offset + 1 + width)
        .ok_or_else(|| ProbeError::MalformedPacket("var-number overflow".into()))?;
    Ok((be_uint(bytes), offset + 1 + width))
}

fn be_uint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64)
}

/// Shortest of the 1/2/4/8-byte big-endian forms.
pub fn encode_non_negative(value: u64) -> Vec<u8> {
    if value <= u8::MAX as u64 {
        vec![value as u8]
    } else if value <= u16::MAX as u64 {
        (value as u16).to_be_bytes().to_vec()
    } else if value <= u32::MAX as u64 {
        (value as u32).to_be_bytes().to_vec()
    } else {
        value.to_be_bytes().to_vec()
    }
}

pub fn decode_non_negative(bytes: &[u8]) -> Result<u64, ProbeError> {
    match bytes.len() {
        1 | 2 | 4 | 8 => Ok(be_uint(bytes)),
        n => Err(ProbeError::MalformedPacket(format!(
            "non-negative integer of length {}",
            n
        ))),
    }
}

fn write_tlv(out: &mut Vec<u8>, typ: u64, value: &[u8]) {
    write_var_number(out, typ);
    write_var_number(out, value.len() as u64);
    out.extend_from_slice(value);
}

/// One decoded TLV element borrowing its value from the packet buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element<'a> {
    pub typ: u64,
    pub value: &'a [u8],
}

/// Read one TLV at `offset`, returning it and the offset just past it.
pub fn read_element(data: &[u8], offset: usize) -> Result<(Element<'_>, usize), ProbeError> {
    let (typ, o) = read_var_number(data, offset)?;
    let (len, o) = read_var_number(data, o)?;
    let end = usize::try_from(len)
        .ok()
        .and_then(|len| o.checked_add(len))
        .ok_or_else(|| ProbeError::MalformedPacket("length overflow".into()))?;
    let value = data.get(o..end).ok_or_else(|| {
        ProbeError::MalformedPacket(format!("TLV {} truncated: want {} bytes", typ, len))
    })?;
    Ok((Element { typ, value }, end))
}

/// All consecutive TLV elements in `data`.
pub fn read_elements(data: &[u8]) -> Result<Vec<Element<'_>>, ProbeError> {
    let mut elements = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        let (el, next) = read_element(data, offset)?;
        elements.push(el);
        offset = next;
    }
    Ok(elements)
}

/// Critical TLV types must be understood; non-critical ones may be skipped.
fn is_critical(typ: u64) -> bool {
    typ <= 31 || typ % 2 == 1
}

/* ============================
Name
============================ */

pub fn encode_name(out: &mut Vec<u8>, name: &Name) {
    let mut inner = Vec::new();
    for c in name.components() {
        write_tlv(&mut inner, c.typ, &c.value);
    }
    write_tlv(out, types::NAME, &inner);
}

pub fn decode_name(value: &[u8]) -> Result<Name, ProbeError> {
    let components = read_elements(value)?
        .into_iter()
        .map(|el| NameComponent {
            typ: el.typ,
            value: el.value.to_vec(),
        })
        .collect();
    Ok(Name::from_components(components))
}

/* ============================
Interest
============================ */

#[derive(Debug, Clone, PartialEq)]
pub struct Interest {
    pub name: Name,
    pub can_be_prefix: bool,
    pub must_be_fresh: bool,
    pub nonce: u32,
    pub lifetime: Duration,
}

impl Interest {
    /// Default 4 s lifetime and CanBePrefix set, since replies extend the name.
    pub fn new(name: Name) -> Self {
        Self {
            name,
            can_be_prefix: true,
            must_be_fresh: false,
            nonce: rand::random(),
            lifetime: Duration::from_millis(4000),
        }
    }

    pub fn must_be_fresh(mut self, fresh: bool) -> Self {
        self.must_be_fresh = fresh;
        self
    }

    pub fn can_be_prefix(mut self, prefix: bool) -> Self {
        self.can_be_prefix = prefix;
        self
    }

    pub fn lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Would `data_name` satisfy this Interest?
    pub fn matches(&self, data_name: &Name) -> bool {
        if self.can_be_prefix {
            self.name.is_prefix_of(data_name)
        } else {
            &self.name == data_name
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut inner = Vec::new();
        encode_name(&mut inner, &self.name);
        if self.can_be_prefix {
            write_tlv(&mut inner, types::CAN_BE_PREFIX, &[]);
        }
        if self.must_be_fresh {
            write_tlv(&mut inner, types::MUST_BE_FRESH, &[]);
        }
        write_tlv(&mut inner, types::NONCE, &self.nonce.to_be_bytes());
        let lifetime_ms = u64::try_from(self.lifetime.as_millis()).unwrap_or(u64::MAX);
        write_tlv(
            &mut inner,
            types::INTEREST_LIFETIME,
            &encode_non_negative(lifetime_ms),
        );
        let mut out = Vec::with_capacity(inner.len() + 4);
        write_tlv(&mut out, types::INTEREST, &inner);
        out
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProbeError> {
        let (outer, _) = read_element(data, 0)?;
        if outer.typ != types::INTEREST {
            return Err(ProbeError::MalformedPacket(format!(
                "expected Interest, got type {}",
                outer.typ
            )));
        }
        let mut name = None;
        let mut interest = Interest {
            name: Name::new(),
            can_be_prefix: false,
            must_be_fresh: false,
            nonce: 0,
            lifetime: Duration::from_millis(4000),
        };
        for el in read_elements(outer.value)? {
            match el.typ {
                types::NAME => name = Some(decode_name(el.value)?),
                types::CAN_BE_PREFIX => interest.can_be_prefix = true,
                types::MUST_BE_FRESH => interest.must_be_fresh = true,
                types::NONCE => {
                    let bytes: [u8; 4] = el
                        .value
                        .try_into()
                        .map_err(|_| ProbeError::MalformedPacket("bad Nonce length".into()))?;
                    interest.nonce = u32::from_be_bytes(bytes);
                }
                types::INTEREST_LIFETIME => {
                    interest.lifetime = Duration::from_millis(decode_non_negative(el.value)?);
                }
                types::HOP_LIMIT => {}
                t if is_critical(t) => {
                    return Err(ProbeError::MalformedPacket(format!(
                        "unknown critical element {} in Interest",
                        t
                    )))
                }
                _ => {}
            }
        }
        interest.name =
            name.ok_or_else(|| ProbeError::MalformedPacket("Interest without Name".into()))?;
        Ok(interest)
    }
}

/* ============================
Data
============================ */

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    pub name: Name,
    pub content_type: u64,
    pub freshness: Option<Duration>,
    pub content: Vec<u8>,
}

impl Data {
    pub fn new(name: Name, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name,
            content_type: 0,
            freshness: None,
            content: content.into(),
        }
    }

    /// Encode without SignatureInfo/SignatureValue.
    ///
    /// Replies are never verified here, so this is only good enough for
    /// loopback fakes standing in for a sensor node.
    pub fn encode(&self) -> Vec<u8> {
        let mut inner = Vec::new();
        encode_name(&mut inner, &self.name);

        let mut meta = Vec::new();
        if self.content_type != 0 {
            write_tlv(
                &mut meta,
                types::CONTENT_TYPE,
                &encode_non_negative(self.content_type),
            );
        }
        if let Some(fresh) = self.freshness {
            let ms = u64::try_from(fresh.as_millis()).unwrap_or(u64::MAX);
            write_tlv(&mut meta, types::FRESHNESS_PERIOD, &encode_non_negative(ms));
        }
        if !meta.is_empty() {
            write_tlv(&mut inner, types::META_INFO, &meta);
        }
        write_tlv(&mut inner, types::CONTENT, &self.content);

        let mut out = Vec::with_capacity(inner.len() + 4);
        write_tlv(&mut out, types::DATA, &inner);
        out
    }

    pub fn decode(data: &[u8]) -> Result<Self, ProbeError> {
        let (outer, _) = read_element(data, 0)?;
        if outer.typ != types::DATA {
            return Err(ProbeError::MalformedPacket(format!(
                "expected Data, got type {}",
                outer.typ
            )));
        }
        let mut name = None;
        let mut decoded = Data::new(Name::new(), Vec::new());
        for el in read_elements(outer.value)? {
            match el.typ {
                types::NAME => name = Some(decode_name(el.value)?),
                types::META_INFO => {
                    for meta in read_elements(el.value)? {
                        match meta.typ {
                            types::CONTENT_TYPE => {
                                decoded.content_type = decode_non_negative(meta.value)?
                            }
                            types::FRESHNESS_PERIOD => {
                                decoded.freshness =
                                    Some(Duration::from_millis(decode_non_negative(meta.value)?))
                            }
                            _ => {}
                        }
                    }
                }
                types::CONTENT => decoded.content = el.value.to_vec(),
                // Trust is not checked; signatures are skipped.
                types::SIGNATURE_INFO | types::SIGNATURE_VALUE => {}
                t if is_critical(t) => {
                    return Err(ProbeError::MalformedPacket(format!(
                        "unknown critical element {} in Data",
                        t
                    )))
                }
                _ => {}
            }
        }
        decoded.name =
            name.ok_or_else(|| ProbeError::MalformedPacket("Data without Name".into()))?;
        Ok(decoded)
    }
}

/* ============================
Inbound packet dispatch
============================ */

/// A datagram received from the forwarder.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Interest(Interest),
    Data(Data),
    /// Negative acknowledgement for the carried Interest.
    Nack { interest: Interest, reason: u64 },
}

impl Packet {
    pub fn decode(data: &[u8]) -> Result<Self, ProbeError> {
        let (outer, _) = read_element(data, 0)?;
        match outer.typ {
            types::INTEREST => Ok(Packet::Interest(Interest::decode(data)?)),
            types::DATA => Ok(Packet::Data(Data::decode(data)?)),
            types::LP_PACKET => decode_lp_packet(outer.value),
            t => Err(ProbeError::MalformedPacket(format!(
                "unexpected packet type {}",
                t
            ))),
        }
    }
}

fn decode_lp_packet(value: &[u8]) -> Result<Packet, ProbeError> {
    let mut fragment = None;
    let mut nack_reason = None;
    for el in read_elements(value)? {
        match el.typ {
            types::LP_FRAGMENT => fragment = Some(el.value),
            types::LP_NACK => {
                let reason = read_elements(el.value)?
                    .into_iter()
                    .find(|e| e.typ == types::LP_NACK_REASON)
                    .map(|e| decode_non_negative(e.value))
                    .transpose()?;
                nack_reason = Some(reason.unwrap_or(0));
            }
            _ => {}
        }
    }
    let fragment =
        fragment.ok_or_else(|| ProbeError::MalformedPacket("LpPacket without fragment".into()))?;
    match (Packet::decode(fragment)?, nack_reason) {
        (Packet::Interest(interest), Some(reason)) => Ok(Packet::Nack { interest, reason }),
        (packet, _) => Ok(packet),
    }
}
