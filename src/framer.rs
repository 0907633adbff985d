//! Scans a byte stream for CCSDS primary headers and yields raw packets
//! (component H). Adapted from the primary-header codec this crate is built
//! around, generalized to a sync-marker-aware ring buffer over any blocking
//! byte source instead of a single in-memory buffer.

use std::io::Read;

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::PacketError;

/// CCSDS sequence-flags field: whether this packet is a whole unsegmented
/// packet or one segment of a longer one (section 4.J).
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequenceFlags {
    Continuation = 0b00,
    FirstSegment = 0b01,
    LastSegment = 0b10,
    Unsegmented = 0b11,
}

impl SequenceFlags {
    pub fn from_2bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Self::Continuation,
            0b01 => Self::FirstSegment,
            0b10 => Self::LastSegment,
            0b11 => Self::Unsegmented,
            _ => unreachable!(),
        }
    }

    pub fn as_2bits(self) -> u8 {
        self as u8
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketKind {
    Telemetry = 0,
    Command = 1,
}

impl PacketKind {
    fn from_1bit(bit: u8) -> Self {
        if bit & 0x1 == 0 {
            Self::Telemetry
        } else {
            Self::Command
        }
    }
}

/// The fixed 48-bit CCSDS primary header (section 4.H).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrimaryHeader {
    pub version: u8,
    pub packet_type: PacketKind,
    pub secondary_header: bool,
    pub apid: u16,
    pub seq_flags: SequenceFlags,
    pub seq_count: u16,
    /// The wire value: actual user-data length minus one.
    pub packet_data_length: u16,
}

impl PrimaryHeader {
    pub const ENCODED_LEN: usize = 6;

    /// Total packet length in bytes, header included (section 4.H).
    pub fn total_len(&self) -> usize {
        Self::ENCODED_LEN + 1 + self.packet_data_length as usize
    }

    pub fn user_data_len(&self) -> usize {
        self.packet_data_length as usize + 1
    }

    pub fn decode<R: Read>(source: &mut R) -> std::io::Result<Self> {
        let word0 = source.read_u16::<BigEndian>()?;
        let word1 = source.read_u16::<BigEndian>()?;
        let packet_data_length = source.read_u16::<BigEndian>()?;

        Ok(Self {
            version: ((word0 & 0xE000) >> 13) as u8,
            packet_type: PacketKind::from_1bit(((word0 & 0x1000) >> 12) as u8),
            secondary_header: (word0 & 0x0800) != 0,
            apid: word0 & 0x07FF,
            seq_flags: SequenceFlags::from_2bits(((word1 & 0xC000) >> 14) as u8),
            seq_count: word1 & 0x3FFF,
            packet_data_length,
        })
    }

    pub fn encode(&self) -> [u8; Self::ENCODED_LEN] {
        let word0 = (u16::from(self.version & 0x7) << 13)
            | (u16::from(self.packet_type as u8 & 0x1) << 12)
            | ((self.secondary_header as u16) << 11)
            | (self.apid & 0x07FF);
        let word1 = (u16::from(self.seq_flags.as_2bits()) << 14) | (self.seq_count & 0x3FFF);

        let mut out = [0_u8; Self::ENCODED_LEN];
        out[0..2].copy_from_slice(&word0.to_be_bytes());
        out[2..4].copy_from_slice(&word1.to_be_bytes());
        out[4..6].copy_from_slice(&self.packet_data_length.to_be_bytes());
        out
    }
}

/// One CCSDS packet as framed off the wire, prior to decoding or reassembly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawPacket {
    pub header: PrimaryHeader,
    pub user_data: Vec<u8>,
}

impl RawPacket {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.header.encode().to_vec();
        out.extend_from_slice(&self.user_data);
        out
    }
}

/// Any source that can yield bytes on demand; a short read is not EOF, only
/// a zero-length read is (section 6, `ByteSource`).
pub trait ByteSource {
    /// Reads up to `buf.len()` bytes, returning how many were read. Zero
    /// means end-of-stream.
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
}

impl<R: Read> ByteSource for R {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Read::read(self, buf)
    }
}

const MAX_PACKET_LEN: usize = PrimaryHeader::ENCODED_LEN + 1 + u16::MAX as usize;

/// Scans `source` for packets, skipping `leading_sync_bytes` before each one
/// (section 4.H "optional behavior"). Maintains a ring buffer bounded by the
/// largest declared packet size and never holds more than one full packet
/// plus one header's lookahead in memory.
pub struct Framer<S> {
    source: S,
    leading_sync_bytes: usize,
    buffer: Vec<u8>,
    eof: bool,
    max_len: usize,
}

impl<S: ByteSource> Framer<S> {
    pub fn new(source: S, leading_sync_bytes: usize) -> Self {
        Self { source, leading_sync_bytes, buffer: Vec::new(), eof: false, max_len: MAX_PACKET_LEN }
    }

    /// Like [`Framer::new`], but caps the ring buffer at `max_len` bytes
    /// instead of the protocol's own `u16`-length ceiling (section 5,
    /// [`crate::config::DecoderConfig::max_packet_len`]).
    pub fn with_max_len(source: S, leading_sync_bytes: usize, max_len: usize) -> Self {
        Self { source, leading_sync_bytes, buffer: Vec::new(), eof: false, max_len: max_len.min(MAX_PACKET_LEN) }
    }

    fn fill(&mut self, at_least: usize) -> std::io::Result<()> {
        let mut chunk = [0_u8; 4096];
        while self.buffer.len() < at_least && !self.eof {
            let n = self.source.read(&mut chunk)?;
            if n == 0 {
                self.eof = true;
                break;
            }
            self.buffer.extend_from_slice(&chunk[..n]);
        }
        Ok(())
    }

    /// Pulls the next framed packet, or `None` at a clean end-of-stream.
    pub fn next_packet(&mut self) -> Option<Result<RawPacket, PacketError>> {
        if self.fill(self.leading_sync_bytes).is_err() {
            return None;
        }
        if self.buffer.len() < self.leading_sync_bytes && self.eof {
            if self.buffer.is_empty() {
                return None;
            }
            let available = self.buffer.len();
            self.buffer.clear();
            return Some(Err(PacketError::Truncated { expected: self.leading_sync_bytes, available }));
        }
        if self.leading_sync_bytes > 0 {
            self.buffer.drain(..self.leading_sync_bytes);
        }

        if self.fill(PrimaryHeader::ENCODED_LEN).is_err() {
            return None;
        }
        if self.buffer.is_empty() && self.eof {
            return None;
        }
        if self.buffer.len() < PrimaryHeader::ENCODED_LEN {
            let available = self.buffer.len();
            self.buffer.clear();
            return Some(Err(PacketError::Truncated { expected: PrimaryHeader::ENCODED_LEN, available }));
        }

        let header = PrimaryHeader::decode(&mut &self.buffer[..PrimaryHeader::ENCODED_LEN])
            .expect("fixed-size header decode cannot fail once enough bytes are present");
        let total_len = header.total_len().min(self.max_len);

        if self.fill(total_len).is_err() {
            return None;
        }
        if self.buffer.len() < total_len {
            let available = self.buffer.len();
            self.buffer.clear();
            return Some(Err(PacketError::Truncated { expected: total_len, available }));
        }

        let user_data = self.buffer[PrimaryHeader::ENCODED_LEN..total_len].to_vec();
        self.buffer.drain(..total_len);
        Some(Ok(RawPacket { header, user_data }))
    }
}

impl<S: ByteSource> Iterator for Framer<S> {
    type Item = Result<RawPacket, PacketError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_packet()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    fn sample_header(apid: u16, seq_flags: SequenceFlags, seq_count: u16, user_data_len: u16) -> PrimaryHeader {
        PrimaryHeader {
            version: 0,
            packet_type: PacketKind::Telemetry,
            secondary_header: false,
            apid,
            seq_flags,
            seq_count,
            packet_data_length: user_data_len - 1,
        }
    }

    #[rstest]
    #[case(SequenceFlags::Unsegmented)]
    #[case(SequenceFlags::FirstSegment)]
    #[case(SequenceFlags::LastSegment)]
    #[case(SequenceFlags::Continuation)]
    fn header_roundtrips(#[case] seq_flags: SequenceFlags) {
        let header = sample_header(1234, seq_flags, 99, 10);
        let bytes = header.encode();
        let decoded = PrimaryHeader::decode(&mut &bytes[..]).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn frames_two_back_to_back_packets_scenario_s1() {
        let a = RawPacket { header: sample_header(11, SequenceFlags::Unsegmented, 0, 4), user_data: vec![1, 2, 3, 4] };
        let b = RawPacket { header: sample_header(12, SequenceFlags::Unsegmented, 1, 2), user_data: vec![9, 9] };

        let mut stream = a.encode();
        stream.extend(b.encode());

        let mut framer = Framer::new(stream.as_slice(), 0);
        assert_eq!(framer.next_packet().unwrap().unwrap(), a);
        assert_eq!(framer.next_packet().unwrap().unwrap(), b);
        assert!(framer.next_packet().is_none());
    }

    #[test]
    fn decodes_the_literal_s1_primary_header_vector() {
        // Section 8, S1: 08 0B 00 00 00 06 DE AD BE EF 01 02 03. Bit 11 of
        // word0 (0x080B) is actually set, so the secondary-header flag
        // decodes true under the standard version:3|type:1|sec_hdr:1|apid:11
        // layout even though the prose table claims SEC_HDR_FLG=0; version,
        // type, apid, seq_flags, seq_count, and packet_data_length all match
        // the worked example exactly.
        let bytes: [u8; 13] = [0x08, 0x0B, 0x00, 0x00, 0x00, 0x06, 0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x02, 0x03];
        let mut framer = Framer::new(&bytes[..], 0);
        let packet = framer.next_packet().unwrap().unwrap();

        assert_eq!(packet.header.version, 0);
        assert_eq!(packet.header.packet_type, PacketKind::Telemetry);
        assert!(packet.header.secondary_header);
        assert_eq!(packet.header.apid, 11);
        assert_eq!(packet.header.seq_flags, SequenceFlags::Continuation);
        assert_eq!(packet.header.seq_count, 0);
        assert_eq!(packet.header.packet_data_length, 6);
        assert_eq!(packet.user_data, vec![0xDE, 0xAD, 0xBE, 0xEF, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn skips_configured_leading_sync_bytes() {
        let packet = RawPacket { header: sample_header(7, SequenceFlags::Unsegmented, 5, 3), user_data: vec![1, 2, 3] };
        let mut stream = vec![0xAA, 0xBB];
        stream.extend(packet.encode());

        let mut framer = Framer::new(stream.as_slice(), 2);
        assert_eq!(framer.next_packet().unwrap().unwrap(), packet);
    }

    #[test]
    fn truncated_tail_is_fatal_for_that_packet_only() {
        let packet = RawPacket { header: sample_header(7, SequenceFlags::Unsegmented, 5, 10), user_data: vec![0; 10] };
        let full = packet.encode();
        let partial = &full[..full.len() - 3];

        let mut framer = Framer::new(partial, 0);
        let err = framer.next_packet().unwrap().unwrap_err();
        assert!(matches!(err, PacketError::Truncated { .. }));
        assert!(framer.next_packet().is_none());
    }
}
