//! Message fragmentation.

use abi::FragmentHeader;
use zerocopy::IntoBytes;

use super::FRAGMENT_PAYLOAD_LEN;
use crate::err::KernelError;
use crate::transport::PacketTransport;

/// A process-wide fragment sequence counter. One of these exists per
/// message-sending endpoint; spec section 4.6 describes it as initially 1,
/// skipping 0 on wrap.
pub struct Sender {
    sequence: u16,
}

impl Sender {
    pub fn new() -> Self {
        Sender { sequence: 1 }
    }

    /// The sequence number the next call to [`Self::send`] will use.
    pub fn next_sequence(&self) -> u16 {
        self.sequence
    }

    /// Fragments `payload` and hands each fragment to `transport`.
    ///
    /// Rejects payloads over 65535 bytes outright. A transport failure
    /// aborts immediately; fragments already sent are not revoked, per
    /// spec section 7's "already-sent fragments are not revoked."
    pub fn send<T: PacketTransport>(
        &mut self,
        transport: &mut T,
        msg_type: u16,
        payload: &[u8],
    ) -> Result<(), KernelError> {
        if payload.len() > u16::MAX as usize {
            return Err(KernelError::TOO_LARGE);
        }
        let total_length = payload.len() as u16;
        let mut offset = 0usize;
        let mut buf = [0u8; abi::MAX_PACKET_LENGTH];

        loop {
            let end = (offset + FRAGMENT_PAYLOAD_LEN).min(payload.len());
            let chunk = &payload[offset..end];
            let header =
                FragmentHeader::new(msg_type, self.sequence, total_length, offset as u16);

            let header_bytes = header.as_bytes();
            buf[..header_bytes.len()].copy_from_slice(header_bytes);
            buf[header_bytes.len()..header_bytes.len() + chunk.len()].copy_from_slice(chunk);

            transport
                .send(&buf[..header_bytes.len() + chunk.len()])
                .map_err(|_| KernelError::SEND_FAILED)?;

            offset = end;
            if offset >= payload.len() {
                break;
            }
        }

        self.sequence = if self.sequence == u16::MAX {
            1
        } else {
            self.sequence + 1
        };
        Ok(())
    }
}

impl Default for Sender {
    fn default() -> Self {
        Self::new()
    }
}
