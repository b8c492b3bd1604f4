//! Hierarchical NDN names and the name layouts used by the sensor network.
//!
//! A [`Name`] is an ordered list of opaque components. Components are shown
//! in NDN URI form: unreserved characters verbatim, anything else `%XX`
//! escaped, so binary exclusion-list entries stay printable.

use crate::codec::encode_u64_le;
use crate::error::ProbeError;
use std::fmt;
use std::str::FromStr;

/// TLV type of a generic name component.
pub const GENERIC_COMPONENT: u64 = 8;

/// Unsigned 64-bit identity of a sensor or relay node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(NodeId)
            .map_err(|e| ProbeError::InvalidName(format!("bad node id '{}': {}", s, e)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NameComponent {
    pub typ: u64,
    pub value: Vec<u8>,
}

impl NameComponent {
    pub fn generic(value: impl Into<Vec<u8>>) -> Self {
        Self {
            typ: GENERIC_COMPONENT,
            value: value.into(),
        }
    }

    /// Interpret the component as decimal text, e.g. a responder id.
    pub fn to_node_id(&self) -> Option<NodeId> {
        std::str::from_utf8(&self.value).ok()?.parse().ok()
    }

    fn parse_uri(s: &str) -> Result<Self, ProbeError> {
        let (typ, body) = match s.split_once('=') {
            Some((t, body)) if !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit()) => {
                let typ = t
                    .parse::<u64>()
                    .map_err(|e| ProbeError::InvalidName(format!("component type: {}", e)))?;
                (typ, body)
            }
            _ => (GENERIC_COMPONENT, s),
        };

        let value = unescape(body)?;
        if !value.is_empty() && value.iter().all(|b| *b == b'.') {
            if value.len() < 3 {
                return Err(ProbeError::InvalidName(format!(
                    "component '{}' is reserved",
                    s
                )));
            }
            return Ok(Self {
                typ,
                value: value[3..].to_vec(),
            });
        }
        Ok(Self { typ, value })
    }
}

impl fmt::Display for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.typ != GENERIC_COMPONENT {
            write!(f, "{}=", self.typ)?;
        }
        if self.value.iter().all(|b| *b == b'.') {
            // Empty and all-period components get three extra periods.
            f.write_str("...")?;
        }
        for &b in &self.value {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "%{:02X}", b)?;
            }
        }
        Ok(())
    }
}

fn unescape(s: &str) -> Result<Vec<u8>, ProbeError> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes
                .get(i + 1..i + 3)
                .and_then(|h| std::str::from_utf8(h).ok())
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| ProbeError::InvalidName(format!("bad escape in '{}'", s)))?;
            out.push(hex);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Name {
    components: Vec<NameComponent>,
}

impl Name {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_components(components: Vec<NameComponent>) -> Self {
        Self { components }
    }

    pub fn components(&self) -> &[NameComponent] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Component at `index`; negative indices count from the end (`-1` = last).
    pub fn get(&self, index: isize) -> Option<&NameComponent> {
        let idx = if index < 0 {
            self.components.len().checked_sub(index.unsigned_abs())?
        } else {
            index as usize
        };
        self.components.get(idx)
    }

    pub fn push(&mut self, component: NameComponent) {
        self.components.push(component);
    }

    /// Builder-style append of a generic component.
    pub fn append(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.push(NameComponent::generic(value));
        self
    }

    /// Append a node id as 8 little-endian bytes.
    pub fn append_u64_le(self, value: u64) -> Self {
        self.append(encode_u64_le(value).to_vec())
    }

    pub fn is_prefix_of(&self, other: &Name) -> bool {
        self.components.len() <= other.components.len()
            && self
                .components
                .iter()
                .zip(other.components.iter())
                .all(|(a, b)| a == b)
    }
}

impl FromStr for Name {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("ndn:").unwrap_or(s);
        let components = s
            .split('/')
            .filter(|part| !part.is_empty())
            .map(NameComponent::parse_uri)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { components })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.components.is_empty() {
            return f.write_str("/");
        }
        for c in &self.components {
            write!(f, "/{}", c)?;
        }
        Ok(())
    }
}

/// `/<service>/discovery`
pub fn discovery_name(service: &Name) -> Name {
    service.clone().append("discovery")
}

/// Discovery base followed by every visited node id, in visitation order.
///
/// Deterministic: the same `visited` slice always yields the same name.
pub fn discovery_request_name(base: &Name, visited: &[NodeId]) -> Name {
    visited
        .iter()
        .fold(base.clone(), |name, id| name.append_u64_le(id.0))
}

/// `/<service>/<nodeId>/data/<quantity>`
pub fn sensor_data_name(service: &Name, node: NodeId, quantity: &str) -> Name {
    service
        .clone()
        .append(node.to_string())
        .append("data")
        .append(quantity)
}

/// `/<service>/<nodeId>/linkquality`
pub fn link_quality_name(service: &Name, node: NodeId) -> Name {
    service.clone().append(node.to_string()).append("linkquality")
}
