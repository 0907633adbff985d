//! Combines segmented per-APID packet streams into logical packets
//! (component J). Optional stage in front of the polymorphic decoder.

use std::collections::{HashMap, VecDeque};

use crate::error::WarningKind;
use crate::framer::{PrimaryHeader, RawPacket, SequenceFlags};
use crate::sink::{Sink, WarningEvent};

const SEQ_COUNT_MODULUS: u16 = 1 << 14;

struct Accumulator {
    header: PrimaryHeader,
    expected_seq: u16,
    data: Vec<u8>,
}

enum ApidState {
    Idle,
    Accumulating(Accumulator),
}

/// Per-APID segment reassembly, per the state table in section 4.J. Bytes
/// declared as secondary-header in non-first segments are stripped before
/// appending.
pub struct Reassembler {
    states: HashMap<u16, ApidState>,
    secondary_header_bytes: usize,
    /// A single `feed()` call can complete more than one packet (an
    /// `Unsegmented` packet arriving mid-accumulation both flushes the
    /// interrupted accumulator *and* is itself a whole packet). `feed`
    /// returns the first; the rest queue here for `pop_pending` to drain
    /// before the caller pulls another packet off the byte source.
    pending: VecDeque<RawPacket>,
}

impl Reassembler {
    pub fn new(secondary_header_bytes: usize) -> Self {
        Self { states: HashMap::new(), secondary_header_bytes, pending: VecDeque::new() }
    }

    /// Drains a packet queued by a prior `feed()` call beyond the one it
    /// already returned. Callers must check this before pulling a new
    /// packet off the byte source, or a completed packet is lost.
    pub fn pop_pending(&mut self) -> Option<RawPacket> {
        self.pending.pop_front()
    }

    /// Pre-sizes the per-APID state table. Purely a capacity hint: APIDs
    /// outside this set are still tracked the first time they appear.
    pub fn reserve(&mut self, additional: usize) {
        self.states.reserve(additional);
    }

    fn strip_secondary_header<'a>(&self, user_data: &'a [u8]) -> &'a [u8] {
        user_data.get(self.secondary_header_bytes..).unwrap_or(&[])
    }

    /// Feeds one framed packet in; returns a completed logical packet when
    /// segmentation resolves to one, or `None` while still accumulating.
    pub fn feed(&mut self, packet: RawPacket, sink: &mut dyn Sink) -> Option<RawPacket> {
        let apid = packet.header.apid;
        let state = self.states.remove(&apid).unwrap_or(ApidState::Idle);

        match (state, packet.header.seq_flags) {
            (ApidState::Idle, SequenceFlags::Unsegmented) => Some(packet),
            (ApidState::Idle, SequenceFlags::FirstSegment) => {
                let expected_seq = next_seq(packet.header.seq_count);
                self.states.insert(
                    apid,
                    ApidState::Accumulating(Accumulator { header: packet.header, expected_seq, data: packet.user_data }),
                );
                None
            }
            (ApidState::Idle, flags @ (SequenceFlags::Continuation | SequenceFlags::LastSegment)) => {
                sink.warn(WarningEvent::new(WarningKind::OrphanSegment { apid, sequence_count: packet.header.seq_count }, Some(apid), None));
                let _ = flags;
                None
            }
            (ApidState::Accumulating(mut acc), SequenceFlags::Continuation) => {
                if packet.header.seq_count == acc.expected_seq {
                    acc.data.extend_from_slice(self.strip_secondary_header(&packet.user_data));
                    acc.expected_seq = next_seq(acc.expected_seq);
                    self.states.insert(apid, ApidState::Accumulating(acc));
                    None
                } else {
                    sink.warn(WarningEvent::new(
                        WarningKind::SequenceGap { apid, expected: acc.expected_seq, found: packet.header.seq_count },
                        Some(apid),
                        None,
                    ));
                    None
                }
            }
            (ApidState::Accumulating(mut acc), SequenceFlags::LastSegment) => {
                if packet.header.seq_count == acc.expected_seq {
                    acc.data.extend_from_slice(self.strip_secondary_header(&packet.user_data));
                    Some(finish(acc))
                } else {
                    sink.warn(WarningEvent::new(
                        WarningKind::SequenceGap { apid, expected: acc.expected_seq, found: packet.header.seq_count },
                        Some(apid),
                        None,
                    ));
                    None
                }
            }
            (ApidState::Accumulating(acc), SequenceFlags::FirstSegment) => {
                sink.warn(WarningEvent::new(WarningKind::UnexpectedStart { apid }, Some(apid), None));
                let partial = finish(acc);
                let expected_seq = next_seq(packet.header.seq_count);
                self.states.insert(
                    apid,
                    ApidState::Accumulating(Accumulator { header: packet.header, expected_seq, data: packet.user_data }),
                );
                Some(partial)
            }
            (ApidState::Accumulating(acc), SequenceFlags::Unsegmented) => {
                // The interrupted accumulator is flushed as a partial
                // packet, but `packet` itself is a complete, self-contained
                // Unsegmented packet and must still be surfaced — queued
                // here since `feed` can only return one packet directly.
                sink.warn(WarningEvent::new(WarningKind::UnexpectedStart { apid }, Some(apid), None));
                let partial = finish(acc);
                self.states.insert(apid, ApidState::Idle);
                self.pending.push_back(packet);
                Some(partial)
            }
        }
    }
}

fn next_seq(seq: u16) -> u16 {
    (seq + 1) % SEQ_COUNT_MODULUS
}

fn finish(acc: Accumulator) -> RawPacket {
    let mut header = acc.header;
    header.packet_data_length = (acc.data.len().saturating_sub(1)) as u16;
    RawPacket { header, user_data: acc.data }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sink::VecSink;

    fn packet(apid: u16, seq_flags: SequenceFlags, seq_count: u16, data: &[u8]) -> RawPacket {
        RawPacket {
            header: PrimaryHeader {
                version: 0,
                packet_type: crate::framer::PacketKind::Telemetry,
                secondary_header: false,
                apid,
                seq_flags,
                seq_count,
                packet_data_length: data.len().saturating_sub(1) as u16,
            },
            user_data: data.to_vec(),
        }
    }

    #[test]
    fn unsegmented_passes_straight_through() {
        let mut reassembler = Reassembler::new(0);
        let mut sink = VecSink::default();
        let p = packet(1, SequenceFlags::Unsegmented, 4, &[1, 2, 3]);
        let out = reassembler.feed(p.clone(), &mut sink).unwrap();
        assert_eq!(out, p);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn first_continuation_last_concatenate_scenario_s4() {
        // Section 8, S4's literal vectors: AA BB / CC / DD EE with
        // secondary_header_bytes=1 stripped from the two non-first segments
        // only, yielding AA BB + "" + EE.
        let mut reassembler = Reassembler::new(1);
        let mut sink = VecSink::default();

        assert!(reassembler.feed(packet(7, SequenceFlags::FirstSegment, 100, &[0xAA, 0xBB]), &mut sink).is_none());
        assert!(reassembler.feed(packet(7, SequenceFlags::Continuation, 101, &[0xCC]), &mut sink).is_none());
        let complete = reassembler.feed(packet(7, SequenceFlags::LastSegment, 102, &[0xDD, 0xEE]), &mut sink).unwrap();

        assert_eq!(complete.user_data, vec![0xAA, 0xBB, 0xEE]);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn secondary_header_bytes_are_not_stripped_from_the_first_segment() {
        let mut reassembler = Reassembler::new(1);
        let mut sink = VecSink::default();

        assert!(reassembler.feed(packet(5, SequenceFlags::FirstSegment, 0, &[0xAA, 1, 2]), &mut sink).is_none());
        assert!(reassembler.feed(packet(5, SequenceFlags::Continuation, 1, &[0xAA, 3, 4]), &mut sink).is_none());
        let complete = reassembler.feed(packet(5, SequenceFlags::LastSegment, 2, &[0xAA, 5]), &mut sink).unwrap();

        assert_eq!(complete.user_data, vec![0xAA, 1, 2, 3, 4, 5]);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn interleaved_apids_reassemble_independently() {
        let mut reassembler = Reassembler::new(0);
        let mut sink = VecSink::default();

        reassembler.feed(packet(1, SequenceFlags::FirstSegment, 0, &[1]), &mut sink);
        reassembler.feed(packet(2, SequenceFlags::FirstSegment, 0, &[9]), &mut sink);
        let done1 = reassembler.feed(packet(1, SequenceFlags::LastSegment, 1, &[2]), &mut sink).unwrap();
        let done2 = reassembler.feed(packet(2, SequenceFlags::LastSegment, 1, &[10]), &mut sink).unwrap();

        assert_eq!(done1.user_data, vec![1, 2]);
        assert_eq!(done2.user_data, vec![9, 10]);
    }

    #[test]
    fn sequence_gap_resets_and_warns() {
        let mut reassembler = Reassembler::new(0);
        let mut sink = VecSink::default();

        reassembler.feed(packet(3, SequenceFlags::FirstSegment, 0, &[1]), &mut sink);
        let result = reassembler.feed(packet(3, SequenceFlags::Continuation, 5, &[2]), &mut sink);
        assert!(result.is_none());
        assert_eq!(sink.events().len(), 1);
        assert!(matches!(sink.events()[0].kind, WarningKind::SequenceGap { .. }));
    }

    #[test]
    fn unsegmented_packet_interrupting_accumulation_surfaces_both_packets() {
        let mut reassembler = Reassembler::new(0);
        let mut sink = VecSink::default();

        assert!(reassembler.feed(packet(4, SequenceFlags::FirstSegment, 0, &[0xAA]), &mut sink).is_none());
        let partial = reassembler
            .feed(packet(4, SequenceFlags::Unsegmented, 50, &[0xFF]), &mut sink)
            .expect("interrupted accumulator flushes as a partial packet");
        assert_eq!(partial.user_data, vec![0xAA]);
        assert!(matches!(sink.events()[0].kind, WarningKind::UnexpectedStart { .. }));

        let queued = reassembler.pop_pending().expect("the interrupting Unsegmented packet must not be dropped");
        assert_eq!(queued.user_data, vec![0xFF]);
        assert_eq!(queued.header.seq_count, 50);
        assert!(reassembler.pop_pending().is_none());
    }

    #[test]
    fn first_segment_interrupting_accumulation_flushes_partial_and_starts_fresh() {
        let mut reassembler = Reassembler::new(0);
        let mut sink = VecSink::default();

        assert!(reassembler.feed(packet(6, SequenceFlags::FirstSegment, 0, &[1]), &mut sink).is_none());
        let partial = reassembler
            .feed(packet(6, SequenceFlags::FirstSegment, 10, &[2]), &mut sink)
            .expect("interrupted accumulator flushes as a partial packet");
        assert_eq!(partial.user_data, vec![1]);
        assert!(reassembler.pop_pending().is_none());

        let complete = reassembler.feed(packet(6, SequenceFlags::LastSegment, 11, &[3]), &mut sink).unwrap();
        assert_eq!(complete.user_data, vec![2, 3]);
    }

    #[test]
    fn orphan_continuation_in_idle_state_warns_and_drops() {
        let mut reassembler = Reassembler::new(0);
        let mut sink = VecSink::default();

        let result = reassembler.feed(packet(9, SequenceFlags::Continuation, 1, &[1]), &mut sink);
        assert!(result.is_none());
        assert!(matches!(sink.events()[0].kind, WarningKind::OrphanSegment { .. }));
    }
}
