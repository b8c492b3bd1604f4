//! Turn raw reply payloads into typed results.
//!
//! | Kind               | Payload                                        |
//! |--------------------|------------------------------------------------|
//! | `Scalar`           | 8-byte LE IEEE-754 double, or empty (no data)  |
//! | `Discovery`        | 0x00-separated UTF-8 paths                     |
//! | `LinkQualityTable` | N × (8-byte LE id, 4-byte LE float)            |
//!
//! Discovery replies also carry meaning in their *name*: the last component
//! is the responder id, and a root coordinator puts the sentinel component
//! right before it.

use crate::channel::Reply;
use crate::codec::{decode_f32_le, decode_f64_le, decode_u64_le, split_null_delimited, F64_WIDTH};
use crate::error::ProbeError;
use crate::name::{NameComponent, NodeId};

/// Size of one packed link-quality record.
pub const LINK_QUALITY_RECORD: usize = 12;

/// Default name component marking a root coordinator's discovery reply.
pub const DEFAULT_ROOT_SENTINEL: &str = "root";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Scalar,
    Discovery,
    LinkQualityTable,
}

/// A sensor reading, or the "no data" sentinel for an empty payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Value(f64),
    NoData,
}

impl Scalar {
    pub fn value(self) -> Option<f64> {
        match self {
            Scalar::Value(v) => Some(v),
            Scalar::NoData => None,
        }
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Scalar::Value(v) => write!(f, "{}", v),
            Scalar::NoData => write!(f, "<no data>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryReply {
    Node { responder: NodeId, paths: Vec<String> },
    /// Root coordinator: no further paths on this branch.
    Root { responder: NodeId },
}

impl DiscoveryReply {
    pub fn responder(&self) -> NodeId {
        match self {
            DiscoveryReply::Node { responder, .. } | DiscoveryReply::Root { responder } => {
                *responder
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkQualityEntry {
    pub neighbor: NodeId,
    pub quality: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Interpreted {
    Scalar(Scalar),
    Discovery(DiscoveryReply),
    LinkQuality(Vec<LinkQualityEntry>),
}

impl Interpreted {
    pub fn kind(&self) -> ResponseKind {
        match self {
            Interpreted::Scalar(_) => ResponseKind::Scalar,
            Interpreted::Discovery(_) => ResponseKind::Discovery,
            Interpreted::LinkQuality(_) => ResponseKind::LinkQualityTable,
        }
    }

    pub fn into_scalar(self) -> Result<Scalar, ProbeError> {
        match self {
            Interpreted::Scalar(v) => Ok(v),
            other => Err(other.mismatch(ResponseKind::Scalar)),
        }
    }

    pub fn into_link_quality(self) -> Result<Vec<LinkQualityEntry>, ProbeError> {
        match self {
            Interpreted::LinkQuality(entries) => Ok(entries),
            other => Err(other.mismatch(ResponseKind::LinkQualityTable)),
        }
    }

    fn mismatch(&self, wanted: ResponseKind) -> ProbeError {
        ProbeError::MalformedPayload(format!("expected {:?}, got {:?}", wanted, self.kind()))
    }
}

fn decode_scalar(payload: &[u8]) -> Result<Scalar, ProbeError> {
    if payload.is_empty() {
        return Ok(Scalar::NoData);
    }
    if payload.len() != F64_WIDTH {
        log::warn!(
            "scalar payload is {} bytes, reading the first {}",
            payload.len(),
            F64_WIDTH
        );
    }
    decode_f64_le(payload, 0).map(Scalar::Value)
}

fn decode_link_quality(payload: &[u8]) -> Result<Vec<LinkQualityEntry>, ProbeError> {
    if payload.len() % LINK_QUALITY_RECORD != 0 {
        return Err(ProbeError::MalformedPayload(format!(
            "link-quality table of {} bytes is not a multiple of {}",
            payload.len(),
            LINK_QUALITY_RECORD
        )));
    }
    (0..payload.len() / LINK_QUALITY_RECORD)
        .map(|i| {
            let at = i * LINK_QUALITY_RECORD;
            Ok(LinkQualityEntry {
                neighbor: NodeId(decode_u64_le(payload, at)?),
                quality: decode_f32_le(payload, at + 8)?,
            })
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ResponseInterpreter {
    root_sentinel: NameComponent,
}

impl Default for ResponseInterpreter {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT_SENTINEL)
    }
}

impl ResponseInterpreter {
    pub fn new(root_sentinel: impl Into<Vec<u8>>) -> Self {
        Self {
            root_sentinel: NameComponent::generic(root_sentinel),
        }
    }

    pub fn root_sentinel(&self) -> &NameComponent {
        &self.root_sentinel
    }

    pub fn interpret(&self, reply: &Reply, kind: ResponseKind) -> Result<Interpreted, ProbeError> {
        Ok(match kind {
            ResponseKind::Scalar => Interpreted::Scalar(decode_scalar(&reply.payload)?),
            ResponseKind::Discovery => Interpreted::Discovery(self.discovery(reply)?),
            ResponseKind::LinkQualityTable => {
                Interpreted::LinkQuality(decode_link_quality(&reply.payload)?)
            }
        })
    }

    pub fn discovery(&self, reply: &Reply) -> Result<DiscoveryReply, ProbeError> {
        let responder = reply
            .name
            .get(-1)
            .and_then(NameComponent::to_node_id)
            .ok_or_else(|| {
                ProbeError::MalformedPayload(format!(
                    "discovery reply {} does not end in a node id",
                    reply.name
                ))
            })?;

        if reply.name.get(-2) == Some(&self.root_sentinel) {
            return Ok(DiscoveryReply::Root { responder });
        }
        Ok(DiscoveryReply::Node {
            responder,
            paths: split_null_delimited(&reply.payload),
        })
    }
}
