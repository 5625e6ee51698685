//! Length-prefixed, sequenced message reassembly (spec section 4.6).
//!
//! Fragmentation is stateless apart from the sender's own sequence counter;
//! reassembly is stateless across calls by design (spec section 4.6's
//! "state-machine view"): the receiver rebuilds its transient bookkeeping
//! from the transport's peek window on every call.

mod receiver;
mod sender;

pub use receiver::{recv, Message};
pub use sender::Sender;

/// Fragment payload capacity: MTU minus the fixed 8-byte header.
pub const FRAGMENT_PAYLOAD_LEN: usize = abi::MAX_PACKET_LENGTH - abi::FRAGMENT_HEADER_LEN;
