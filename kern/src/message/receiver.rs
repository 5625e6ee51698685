//! Message reassembly.

use alloc::vec::Vec;

use abi::FragmentHeader;
use zerocopy::FromBytes;

use super::FRAGMENT_PAYLOAD_LEN;
use crate::err::KernelError;
use crate::transport::PacketTransport;

/// Upper bound on fragments a single message can be split into, derived
/// from the worst case (a maximum-length message over minimum-size
/// fragments). Keeps the receiver's transient bitmap a fixed-size array
/// instead of a heap allocation, per the design notes' "avoid heap churn"
/// guidance.
const MAX_FRAGMENTS: usize = (u16::MAX as usize / FRAGMENT_PAYLOAD_LEN) + 2;

ringbuf!(RECV_RINGBUF, RecvTrace, 64, RecvTrace::Init);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum RecvTrace {
    Init,
    BogusFragmentDiscarded(usize),
    Delivered(u16, u16),
}

struct ReassemblyRecord {
    sequence: u16,
    total_length: u16,
    msg_type: u16,
    bits: [bool; MAX_FRAGMENTS],
}

/// A successfully reassembled message.
#[derive(Debug, Eq, PartialEq)]
pub struct Message {
    pub msg_type: u16,
    pub data: Vec<u8>,
}

fn read_header(bytes: &[u8]) -> Option<FragmentHeader> {
    if bytes.len() < abi::FRAGMENT_HEADER_LEN {
        return None;
    }
    FragmentHeader::read_from_prefix(bytes).ok().map(|(h, _)| h)
}

fn needed_bits(total_length: u16) -> usize {
    if total_length == 0 {
        1
    } else {
        (total_length as usize + FRAGMENT_PAYLOAD_LEN - 1) / FRAGMENT_PAYLOAD_LEN
    }
}

/// Scans the transport's peek window and delivers the first complete
/// message found, per spec section 4.6.
///
/// Bogus fragments (too short, or sequence 0) are discarded as they are
/// encountered. If no sequence is complete, returns
/// [`KernelError::NOT_READY`] and discards nothing else.
pub fn recv<T: PacketTransport>(transport: &mut T) -> Result<Message, KernelError> {
    let mut records: [Option<ReassemblyRecord>; abi::MAX_OUTSTANDING_PACKETS] =
        core::array::from_fn(|_| None);
    let mut count = 0usize;

    for slot in 0..abi::MAX_OUTSTANDING_PACKETS {
        let bytes = match transport.peek(slot) {
            Some(b) => b,
            None => continue,
        };

        let header = match read_header(bytes) {
            Some(h) => h,
            None => {
                transport.discard(slot);
                ringbuf_entry!(RECV_RINGBUF, RecvTrace::BogusFragmentDiscarded(slot));
                continue;
            }
        };
        let sequence = header.sequence.get();
        if sequence == abi::SEQUENCE_INVALID {
            transport.discard(slot);
            ringbuf_entry!(RECV_RINGBUF, RecvTrace::BogusFragmentDiscarded(slot));
            continue;
        }

        let existing = records[..count]
            .iter()
            .position(|r| matches!(r, Some(rec) if rec.sequence == sequence));
        let idx = match existing {
            Some(i) => i,
            None => {
                if count >= records.len() {
                    // No room to track another distinct in-flight sequence
                    // this call; leave the slot for a future scan.
                    continue;
                }
                records[count] = Some(ReassemblyRecord {
                    sequence,
                    total_length: header.total_length.get(),
                    msg_type: header.msg_type.get(),
                    bits: [false; MAX_FRAGMENTS],
                });
                let i = count;
                count += 1;
                i
            }
        };

        let offset = header.offset.get() as usize;
        let bit = offset / FRAGMENT_PAYLOAD_LEN;
        if let Some(rec) = &mut records[idx] {
            if bit < MAX_FRAGMENTS {
                rec.bits[bit] = true;
            }
        }
    }

    for i in 0..count {
        let rec = records[i].as_ref().unwrap();
        let need = needed_bits(rec.total_length);
        let complete = rec.bits[..need].iter().all(|&b| b);
        if !complete {
            continue;
        }

        let sequence = rec.sequence;
        let total_length = rec.total_length as usize;
        let msg_type = rec.msg_type;
        let mut data = alloc::vec![0u8; total_length];

        for slot in 0..abi::MAX_OUTSTANDING_PACKETS {
            let bytes = match transport.peek(slot) {
                Some(b) => b,
                None => continue,
            };
            let header = match read_header(bytes) {
                Some(h) => h,
                None => continue,
            };
            if header.sequence.get() != sequence {
                continue;
            }
            let offset = header.offset.get() as usize;
            let payload = &bytes[abi::FRAGMENT_HEADER_LEN..];
            if offset < total_length {
                let end = (offset + payload.len()).min(total_length);
                data[offset..end].copy_from_slice(&payload[..end - offset]);
            }
            transport.discard(slot);
        }

        ringbuf_entry!(RECV_RINGBUF, RecvTrace::Delivered(sequence, total_length as u16));
        return Ok(Message { msg_type, data });
    }

    Err(KernelError::NOT_READY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Sender;
    use crate::transport::LoopbackTransport;

    #[test]
    fn round_trip_single_fragment() {
        let mut transport = LoopbackTransport::new();
        let mut sender = Sender::new();
        sender.send(&mut transport, 0x1234, b"hello").unwrap();
        let msg = recv(&mut transport).unwrap();
        assert_eq!(msg.msg_type, 0x1234);
        assert_eq!(msg.data, b"hello");
    }

    #[test]
    fn round_trip_empty_payload() {
        let mut transport = LoopbackTransport::new();
        let mut sender = Sender::new();
        sender.send(&mut transport, 1, &[]).unwrap();
        let msg = recv(&mut transport).unwrap();
        assert_eq!(msg.data.len(), 0);
    }

    #[test]
    fn no_complete_message_is_not_ready() {
        let mut transport = LoopbackTransport::new();
        assert_eq!(recv(&mut transport), Err(KernelError::NOT_READY));
    }

    #[test]
    fn bogus_sequence_zero_is_discarded_and_not_ready() {
        let mut transport = LoopbackTransport::new();
        let header = FragmentHeader::new(0, 0, 5, 0);
        let mut buf = Vec::new();
        buf.extend_from_slice(zerocopy::IntoBytes::as_bytes(&header));
        buf.extend_from_slice(b"hello");
        transport.inject(0, &buf);

        assert_eq!(recv(&mut transport), Err(KernelError::NOT_READY));
        assert!(transport.peek(0).is_none());
    }

    #[test]
    fn interleaved_messages_both_reassemble() {
        let mut transport = LoopbackTransport::new();
        let mut sender = Sender::new();
        // Two short messages, each a single fragment, land in the same
        // peek window. Neither send shares a sequence with the other.
        sender.send(&mut transport, 1, b"first").unwrap();
        sender.send(&mut transport, 2, b"second").unwrap();

        let a = recv(&mut transport).unwrap();
        assert_eq!(a.msg_type, 1);
        assert_eq!(a.data, b"first");

        let b = recv(&mut transport).unwrap();
        assert_eq!(b.msg_type, 2);
        assert_eq!(b.data, b"second");
    }
}
