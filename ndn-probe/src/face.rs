//! UDP face: Interests out, Data back, against a local NDN forwarder.

use crate::channel::{Outcome, Reply, RequestChannel};
use crate::error::ProbeError;
use crate::tlv::{Interest, Packet};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

/// Default NFD UDP port.
pub const NFD_PORT: u16 = 6363;

/// Largest NDN packet a forwarder will emit.
pub const MAX_PACKET_SIZE: usize = 8800;

#[derive(Debug, Clone)]
pub struct FaceConfig {
    pub remote: SocketAddr,
    pub bind: SocketAddr,
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            remote: SocketAddr::from(([127, 0, 0, 1], NFD_PORT)),
            bind: SocketAddr::from(([0, 0, 0, 0], 0)),
        }
    }
}

impl FaceConfig {
    /// Resolve `host[:port]`, defaulting the port to [`NFD_PORT`].
    pub fn for_remote(remote: &str) -> Result<Self, ProbeError> {
        let with_port = if remote.parse::<SocketAddr>().is_ok() || remote.contains(':') {
            remote.to_string()
        } else {
            format!("{}:{}", remote, NFD_PORT)
        };
        let remote = with_port
            .to_socket_addrs()
            .map_err(|e| ProbeError::TransportFailure(e.to_string()))?
            .next()
            .ok_or_else(|| ProbeError::TransportFailure("Invalid forwarder address".into()))?;
        Ok(Self {
            remote,
            ..Self::default()
        })
    }
}

/// Returns true if the error means "nothing arrived before the deadline".
fn is_timeout_error(e: &std::io::Error) -> bool {
    use std::io::ErrorKind;
    matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock)
}

/// A connected UDP socket to the forwarder.
///
/// One Interest is outstanding at a time. The socket is closed on drop.
#[derive(Debug)]
pub struct UdpFace {
    socket: UdpSocket,
    remote: SocketAddr,
}

impl UdpFace {
    pub fn connect(config: &FaceConfig) -> Result<Self, ProbeError> {
        let socket = UdpSocket::bind(config.bind)
            .map_err(|e| ProbeError::TransportFailure(format!("bind {}: {}", config.bind, e)))?;
        socket.connect(config.remote).map_err(|e| {
            ProbeError::TransportFailure(format!("connect {}: {}", config.remote, e))
        })?;
        log::debug!("[face] connected to {}", config.remote);
        Ok(Self {
            socket,
            remote: config.remote,
        })
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ProbeError> {
        self.socket.local_addr().map_err(ProbeError::from)
    }
}

impl RequestChannel for UdpFace {
    fn send(&mut self, interest: &Interest) -> Result<Outcome, ProbeError> {
        let wire = interest.encode();
        self.socket
            .send(&wire)
            .map_err(|e| ProbeError::TransportFailure(e.to_string()))?;
        log::debug!(
            "[face] → Interest {} fresh={} lifetime={:?}",
            interest.name,
            interest.must_be_fresh,
            interest.lifetime
        );

        let deadline = Instant::now() + interest.lifetime;
        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                log::debug!("[face] timeout for {}", interest.name);
                return Ok(Outcome::Timeout);
            }
            // A zero read timeout means "block forever" to the OS, so clamp.
            self.socket
                .set_read_timeout(Some(remaining.max(Duration::from_millis(1))))
                .map_err(|e| ProbeError::TransportFailure(e.to_string()))?;

            let len = match self.socket.recv(&mut buf) {
                Ok(len) => len,
                Err(e) if is_timeout_error(&e) => continue,
                Err(e) => return Err(ProbeError::TransportFailure(e.to_string())),
            };

            match Packet::decode(&buf[..len]) {
                Ok(Packet::Data(data)) if interest.matches(&data.name) => {
                    log::debug!("[face] ← Data {} ({} bytes)", data.name, data.content.len());
                    return Ok(Outcome::Reply(Reply::from(data)));
                }
                Ok(Packet::Data(data)) => {
                    // Late reply to an earlier Interest that already timed out.
                    log::debug!("[face] dropping unsolicited Data {}", data.name);
                }
                Ok(Packet::Nack { interest: nacked, reason }) if nacked.nonce == interest.nonce => {
                    log::debug!("[face] ← Nack {} reason={}", nacked.name, reason);
                    return Ok(Outcome::Timeout);
                }
                Ok(other) => log::debug!("[face] ignoring {:?}", other),
                Err(e) => log::warn!("[face] undecodable datagram ({} bytes): {}", len, e),
            }
        }
    }
}
