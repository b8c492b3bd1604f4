//! The request/reply seam between protocol logic and the network.
//!
//! [`RequestChannel::send`] blocks until exactly one of: a matching reply
//! arrives, or the Interest lifetime elapses. There is no pipelining and no
//! retry here; retry policy belongs to the caller.

use crate::error::ProbeError;
use crate::name::Name;
use crate::tlv::{Data, Interest};
use std::time::Duration;

/// A reply: the Data name (the responder's addressing) and its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub name: Name,
    pub payload: Vec<u8>,
}

impl Reply {
    pub fn new(name: Name, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            name,
            payload: payload.into(),
        }
    }
}

impl From<Data> for Reply {
    fn from(data: Data) -> Self {
        Self {
            name: data.name,
            payload: data.content,
        }
    }
}

/// Result of one request. `Err` from `send` is reserved for transport failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Reply(Reply),
    Timeout,
}

pub trait RequestChannel {
    fn send(&mut self, interest: &Interest) -> Result<Outcome, ProbeError>;

    /// `send(name, freshnessRequired, timeout)` in one call.
    fn request(
        &mut self,
        name: &Name,
        must_be_fresh: bool,
        timeout: Duration,
    ) -> Result<Outcome, ProbeError> {
        let interest = Interest::new(name.clone())
            .must_be_fresh(must_be_fresh)
            .lifetime(timeout);
        self.send(&interest)
    }
}

/// Closures act as channels, which keeps scripted fakes short.
impl<F> RequestChannel for F
where
    F: FnMut(&Interest) -> Result<Outcome, ProbeError>,
{
    fn send(&mut self, interest: &Interest) -> Result<Outcome, ProbeError> {
        self(interest)
    }
}
