use thiserror::Error;

/// Errors surfaced by the probe library.
///
/// A timeout is usually not an error: [`crate::channel::Outcome::Timeout`]
/// carries it through the request path so discovery and polling can count it.
/// The `Timeout` variant here is only used by single-shot operations that
/// have nothing better to return.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("Timeout waiting for {0}")]
    Timeout(String),
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
    #[error("Malformed packet: {0}")]
    MalformedPacket(String),
    #[error("Invalid name: {0}")]
    InvalidName(String),
    #[error("Transport failure: {0}")]
    TransportFailure(String),
}

impl ProbeError {
    /// True for errors that end the current run rather than a single attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProbeError::TransportFailure(_))
    }
}

impl From<std::io::Error> for ProbeError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock => ProbeError::Timeout(err.to_string()),
            _ => ProbeError::TransportFailure(err.to_string()),
        }
    }
}

impl From<std::net::AddrParseError> for ProbeError {
    fn from(err: std::net::AddrParseError) -> Self {
        ProbeError::TransportFailure(format!("Invalid address: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn io_timeout_maps_to_timeout() {
        let err: ProbeError = Error::new(ErrorKind::TimedOut, "slow").into();
        assert!(matches!(err, ProbeError::Timeout(_)));
        let err: ProbeError = Error::new(ErrorKind::WouldBlock, "again").into();
        assert!(matches!(err, ProbeError::Timeout(_)));
    }

    #[test]
    fn io_other_maps_to_transport_failure() {
        let err: ProbeError = Error::new(ErrorKind::ConnectionRefused, "refused").into();
        assert!(err.is_fatal());
    }

    #[test]
    fn display_includes_detail() {
        let err = ProbeError::MalformedPayload("13 bytes".into());
        assert_eq!(err.to_string(), "Malformed payload: 13 bytes");
    }
}
