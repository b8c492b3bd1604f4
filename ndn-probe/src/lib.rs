//! `ndn-probe` is a blocking client for a named-data sensor network.
//!
//! ```text
//!  ┌─────────────────┐   ┌──────────────┐
//!  │ DiscoveryEngine │   │    poll()    │
//!  └────────┬────────┘   └──────┬───────┘
//!           │  RequestChannel   │  + ResponseInterpreter
//!  ┌────────▼───────────────────▼───────┐
//!  │ UdpFace: Interest → Data | timeout │
//!  └────────────────────────────────────┘
//! ```
//!
//! - [`codec`]      - little-endian numbers and 0x00-separated string lists
//! - [`name`]       - NDN names, node ids and the sensor network's name layouts
//! - [`tlv`]        - NDN packet format (Interest, Data, LpPacket)
//! - [`channel`]    - the blocking request/reply seam
//! - [`face`]       - UDP face to a local forwarder
//! - [`interpret`]  - payload decoding per response kind
//! - [`discovery`]  - iterative topology discovery
//! - [`polling`]    - repeated reads with latency statistics
//! - [`probe`]      - facade bundling the above, with traffic counters

pub mod channel;
pub mod codec;
pub mod discovery;
pub mod error;
pub mod face;
pub mod interpret;
pub mod name;
pub mod polling;
pub mod probe;
pub mod tlv;

pub use channel::{Outcome, Reply, RequestChannel};
pub use discovery::{DiscoveryConfig, DiscoveryEngine, DiscoveryResult, Termination};
pub use error::ProbeError;
pub use face::{FaceConfig, UdpFace};
pub use interpret::{DiscoveryReply, LinkQualityEntry, ResponseInterpreter, ResponseKind, Scalar};
pub use name::{Name, NodeId};
pub use polling::{PollConfig, PollReport};
pub use probe::NdnProbe;
