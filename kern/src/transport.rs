//! Packet transport collaborator contract.
//!
//! Spec section 6 names this as an external collaborator: `packet_send`,
//! `packet_peek`, `packet_discard`. [`PacketTransport`] is that contract as
//! a Rust trait; [`LoopbackTransport`] is a host-side implementation used
//! by this crate's own tests and suitable as a reference for anyone wiring
//! up a real one.

use alloc::vec::Vec;

use crate::err::KernelError;

/// A best-effort packet transport: send up to MTU bytes, and expose a
/// finite peek window of received-but-undiscarded packets.
pub trait PacketTransport {
    /// Sends one packet. `buf.len()` must not exceed the transport's MTU.
    fn send(&mut self, buf: &[u8]) -> Result<(), KernelError>;

    /// Returns the bytes occupying receive slot `slot`, or `None` if the
    /// slot is empty. Non-owning: the bytes remain in the window until
    /// [`Self::discard`] is called.
    fn peek(&self, slot: usize) -> Option<&[u8]>;

    /// Releases slot `slot`, whether or not it was occupied.
    fn discard(&mut self, slot: usize);
}

/// A fixed-capacity loopback transport: packets sent are immediately
/// visible in the peek window, in the order they were sent and modulo
/// overwriting once all slots are occupied.
pub struct LoopbackTransport {
    slots: [Option<Vec<u8>>; abi::MAX_OUTSTANDING_PACKETS],
    next_slot: usize,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        LoopbackTransport {
            slots: core::array::from_fn(|_| None),
            next_slot: 0,
        }
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketTransport for LoopbackTransport {
    fn send(&mut self, buf: &[u8]) -> Result<(), KernelError> {
        if buf.len() > abi::MAX_PACKET_LENGTH {
            return Err(KernelError::TOO_LARGE);
        }
        let idx = self.next_slot;
        self.next_slot = (self.next_slot + 1) % self.slots.len();
        self.slots[idx] = Some(Vec::from(buf));
        Ok(())
    }

    fn peek(&self, slot: usize) -> Option<&[u8]> {
        self.slots.get(slot)?.as_deref()
    }

    fn discard(&mut self, slot: usize) {
        if let Some(s) = self.slots.get_mut(slot) {
            *s = None;
        }
    }
}

/// Injects a raw, possibly-bogus packet directly into a slot, bypassing
/// `send`. Used by tests exercising the receiver's handling of malformed
/// input (spec scenario S7).
impl LoopbackTransport {
    pub fn inject(&mut self, slot: usize, bytes: &[u8]) {
        self.slots[slot] = Some(Vec::from(bytes));
    }
}
