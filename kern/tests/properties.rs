//! Property-based tests for the invariants listed in spec section 8.
//!
//! These use `proptest` to generate many small configurations/sequences
//! rather than hand-picking individual cases; the hand-picked scenarios
//! (S1-S7) live in `scenarios.rs`.

use std::collections::HashSet;

use proptest::prelude::*;

use abi::{Priority, ThreadState};
use kern::counter::CounterTable;
use kern::message::{recv, Sender};
use kern::scheduler::{schedule, Request};
use kern::thread::ThreadTable;
use kern::transport::{LoopbackTransport, PacketTransport};

extern "C" fn body(_: usize) {}

// --- Property 1: the live-id set always equals the set of present descriptors. ---

#[derive(Copy, Clone, Debug)]
enum Op {
    Create,
    Start(u8),
    Stop(u8),
    Destroy(u8),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Create),
        2 => any::<u8>().prop_map(Op::Start),
        2 => any::<u8>().prop_map(Op::Stop),
        1 => any::<u8>().prop_map(Op::Destroy),
    ]
}

proptest! {
    #[test]
    fn live_id_set_matches_present_descriptors(ops in prop::collection::vec(op_strategy(), 0..200)) {
        let mut tasks = ThreadTable::new();
        let mut live: Vec<u32> = Vec::new();

        for op in ops {
            match op {
                Op::Create => {
                    if let Ok(id) = tasks.create("t", body, 0, Priority(0)) {
                        live.push(id);
                    }
                }
                Op::Start(pick) => {
                    if let Some(&id) = live.get(pick as usize % live.len().max(1)) {
                        tasks.start(id);
                    }
                }
                Op::Stop(pick) => {
                    if let Some(&id) = live.get(pick as usize % live.len().max(1)) {
                        tasks.stop(id);
                    }
                }
                Op::Destroy(pick) => {
                    if !live.is_empty() {
                        let idx = pick as usize % live.len();
                        let id = live.remove(idx);
                        tasks.destroy(id).unwrap();
                    }
                }
            }

            let expected: HashSet<u32> = live.iter().copied().collect();
            let actual: HashSet<u32> = (0..tasks.len())
                .filter_map(|i| tasks.slot(i))
                .map(|t| t.id)
                .collect();
            prop_assert_eq!(expected, actual);
        }
    }
}

// --- Properties 2 & 3: schedule() always returns a Running thread of max
// --- eligible priority, and never returns null / a non-Running thread.

fn build_table_with_idle(
    prios: Vec<(i32, bool)>,
) -> (ThreadTable, Vec<*mut kern::arch::SavedContext>) {
    let mut tasks = ThreadTable::new();
    let mut ctxs = Vec::new();
    for (prio, running) in prios {
        let id = tasks.create("t", body, 0, Priority(prio)).unwrap();
        if running {
            tasks.start(id);
        }
        let idx = (0..tasks.len())
            .find(|&i| tasks.slot(i).map(|t| t.id) == Some(id))
            .unwrap();
        ctxs.push(tasks.slot(idx).unwrap().context_ptr());
    }
    let idle = tasks.create("idle", body, 0, Priority::IDLE).unwrap();
    tasks.start(idle);
    (tasks, ctxs)
}

proptest! {
    #[test]
    fn schedule_always_returns_running_max_priority(
        prios in prop::collection::vec((-10i32..10, any::<bool>()), 1..8),
        current_pick in 0usize..8,
        request_pick in 0u8..3,
    ) {
        let n = prios.len();
        let (tasks, ctxs) = build_table_with_idle(prios);
        let current = ctxs[current_pick % n];
        let request = match request_pick {
            0 => Request::Current,
            1 => Request::Other,
            _ => Request::Any,
        };

        let next = schedule(&tasks, current, request);
        prop_assert!(!next.is_null());

        let idx = tasks.index_by_context(next).expect("schedule must return a live context");
        let chosen = tasks.slot(idx).unwrap();
        prop_assert_eq!(chosen.state, ThreadState::Running);

        let max_running = (0..tasks.len())
            .filter_map(|i| tasks.slot(i))
            .filter(|t| {
                t.state == ThreadState::Running
                    && !(request == Request::Other && t.context_ptr() == current)
            })
            .map(|t| t.priority)
            .max_by_key(|p| p.0)
            .unwrap();
        prop_assert_eq!(chosen.priority, max_running);
    }
}

// --- Property 4: round-robin fairness within a band of K equal-priority threads. ---

proptest! {
    #[test]
    fn round_robin_visits_every_band_member_within_k_calls(k in 2usize..6) {
        let mut tasks = ThreadTable::new();
        let mut ctxs = Vec::new();
        for _ in 0..k {
            let id = tasks.create("t", body, 0, Priority(0)).unwrap();
            tasks.start(id);
        }
        let idle = tasks.create("idle", body, 0, Priority::IDLE).unwrap();
        tasks.start(idle);
        for i in 0..k {
            ctxs.push(tasks.slot(i).unwrap().context_ptr());
        }

        let mut current = ctxs[0];
        let mut seen: HashSet<*mut kern::arch::SavedContext> = HashSet::new();
        seen.insert(current);
        for _ in 0..k - 1 {
            current = schedule(&tasks, current, Request::Other);
            seen.insert(current);
        }
        let band: HashSet<_> = ctxs.iter().copied().collect();
        prop_assert_eq!(seen, band);
    }
}

// --- Property 5: counter saturation. ---

#[derive(Copy, Clone, Debug)]
enum CounterOp {
    Inc,
    Dec,
}

proptest! {
    #[test]
    fn counter_never_goes_negative_or_above_net_increments(
        ops in prop::collection::vec(prop_oneof![Just(CounterOp::Inc), Just(CounterOp::Dec)], 0..200)
    ) {
        let mut counters = CounterTable::new();
        let h = counters.init(0).unwrap();
        let mut net = 0i64;
        for op in ops {
            match op {
                CounterOp::Inc => {
                    counters.increment(h);
                    net += 1;
                }
                CounterOp::Dec => {
                    counters.decrement(h);
                    net = (net - 1).max(0);
                }
            }
            let v = counters.value(h) as i64;
            prop_assert!(v >= 0);
            prop_assert!(v <= net);
        }
    }
}

// --- Property 6: message codec round-trip across boundary lengths. ---

const D: usize = abi::MAX_PACKET_LENGTH - abi::FRAGMENT_HEADER_LEN;

/// The largest payload whose fragments can all sit in the transport's peek
/// window at once. A 65535-byte message (the wire format's absolute
/// ceiling) needs `ceil(65535/D)` fragments simultaneously resident for a
/// single `recv` scan to see them all; with this build's tunables
/// (`MAX_PACKET_LENGTH=256`, `MAX_OUTSTANDING_PACKETS=16`) that exceeds the
/// window, so the literal max-length case is exercised separately below as
/// the known limitation spec section 4.6 calls out, rather than asserted to
/// round-trip.
const MAX_FITTING_LEN: usize = (abi::MAX_OUTSTANDING_PACKETS - 1) * D;

fn length_strategy() -> impl Strategy<Value = usize> {
    prop_oneof![
        Just(0),
        Just(1),
        Just(D),
        Just(D + 1),
        Just(3 * D + 7),
        Just(MAX_FITTING_LEN),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]
    #[test]
    fn round_trip_at_boundary_lengths(len in length_strategy(), msg_type in any::<u16>(), seed in any::<u8>()) {
        let payload: Vec<u8> = (0..len).map(|i| (i as u8).wrapping_add(seed)).collect();
        let mut transport = LoopbackTransport::new();
        let mut sender = Sender::new();
        sender.send(&mut transport, msg_type, &payload).unwrap();
        let msg = recv(&mut transport).unwrap();
        prop_assert_eq!(msg.msg_type, msg_type);
        prop_assert_eq!(msg.data, payload);
    }
}

/// Spec section 4.6's documented limitation: a message whose fragment count
/// exceeds the transport's window can never be observed complete in a
/// single scan, since the receiver only ever looks at what the peek window
/// holds right now. A 65535-byte payload is the wire format's ceiling and
/// overflows this build's 16-slot window at MTU 256, so it surfaces as
/// `NOT_READY` forever rather than a successful round trip.
#[test]
fn message_exceeding_window_capacity_never_becomes_ready() {
    let mut transport = LoopbackTransport::new();
    let mut sender = Sender::new();
    let payload = vec![0xabu8; 65535];
    // The send succeeds -- fragmentation itself has no window limit, only
    // reassembly does, since send never reads back what it wrote.
    sender.send(&mut transport, 1, &payload).unwrap();
    assert_eq!(recv(&mut transport), Err(kern::KernelError::NOT_READY));
}

// --- Property 7: out-of-order (permuted) fragment delivery still reassembles. ---

proptest! {
    #[test]
    fn permuted_fragments_still_reassemble(seed in any::<u8>()) {
        let mut staging = LoopbackTransport::new();
        let mut sender = Sender::new();
        let payload: Vec<u8> = (0..3 * D + 13).map(|i| (i as u8).wrapping_add(seed)).collect();
        sender.send(&mut staging, 0x55, &payload).unwrap();

        let mut fragments: Vec<Vec<u8>> = (0..abi::MAX_OUTSTANDING_PACKETS)
            .filter_map(|i| staging.peek(i).map(|b| b.to_vec()))
            .collect();
        // A deterministic, data-dependent "shuffle": reverse, which differs
        // from send order whenever there's more than one fragment.
        fragments.reverse();

        let mut transport = LoopbackTransport::new();
        for (slot, bytes) in fragments.iter().enumerate() {
            transport.inject(slot, bytes);
        }

        let msg = recv(&mut transport).unwrap();
        prop_assert_eq!(msg.msg_type, 0x55);
        prop_assert_eq!(msg.data, payload);
    }
}

// --- Property 9: sequence wrap skips zero. ---

#[test]
fn sequence_wraps_and_skips_zero_after_65535_sends() {
    let mut transport = LoopbackTransport::new();
    let mut sender = Sender::new();
    for _ in 0..65535u32 {
        sender.send(&mut transport, 0, &[]).unwrap();
    }
    assert_eq!(sender.next_sequence(), 1);
}

// --- Property 10: bogus packets are discarded without disturbing valid ones. ---

proptest! {
    #[test]
    fn bogus_packets_discarded_without_affecting_valid_message(
        short_len in 0usize..8,
    ) {
        let mut transport = LoopbackTransport::new();
        let mut sender = Sender::new();
        sender.send(&mut transport, 0x77, b"payload").unwrap();

        // Find an empty slot to plant bogus packets in.
        let empty_slot = (0..abi::MAX_OUTSTANDING_PACKETS)
            .find(|&i| transport.peek(i).is_none())
            .unwrap();
        transport.inject(empty_slot, &vec![0xffu8; short_len]);

        let msg = recv(&mut transport).unwrap();
        prop_assert_eq!(msg.msg_type, 0x77);
        prop_assert_eq!(msg.data, b"payload".to_vec());
        prop_assert!(transport.peek(empty_slot).is_none());
    }
}
