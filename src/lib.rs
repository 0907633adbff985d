#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod bitcursor;
pub mod calibration;
#[cfg(any(feature = "async-codec", feature = "tokio-codec"))]
#[cfg_attr(docsrs, doc(cfg(any(feature = "async-codec", feature = "tokio-codec"))))]
/// Sink/Stream support for framing [`framer::RawPacket`]s off network data
/// with an optional synchronization marker.
///
/// Provides both `asynchronous-codec` and `tokio-util::codec` trait impls.
pub mod codec;
pub mod config;
pub mod container;
pub mod context;
pub mod criteria;
pub mod decoder;
pub mod encoding;
pub mod error;
pub mod framer;
pub mod ptype;
pub mod reassembler;
pub mod sink;
pub mod value;
pub mod xtce;

use std::io::BufRead;

use config::{DecoderConfig, WarningPolicy};
use container::TypeSystem;
use decoder::{PacketRecord, PolymorphicDecoder};
use error::{PacketError, XtceResult};
use framer::{ByteSource, Framer, RawPacket};
use reassembler::Reassembler;
use sink::Sink;

/// Loads an XTCE document into a [`TypeSystem`], discarding the loader's
/// bookkeeping around namespace and space system name (use [`xtce::load`]
/// directly if those matter to the caller).
pub fn load_type_system<R: BufRead>(reader: R) -> XtceResult<TypeSystem> {
    Ok(xtce::load(reader)?.type_system)
}

/// A pull-based sequence of decoded packets over one byte source.
///
/// Combines the framer (H), an optional reassembler (J), and the
/// polymorphic decoder (I) behind a single [`Iterator`]. A [`PacketStream`]
/// is not restartable: it owns the byte source and the reassembler's
/// per-APID state, and consumes both as it is driven forward. Construct a
/// fresh one (with a fresh `S`) to decode a stream again from the start.
///
/// Under [`WarningPolicy::Lenient`] (the default) a packet-level
/// [`PacketError`] is logged and the stream resynchronizes to the next
/// header, per section 7's policy; under [`WarningPolicy::Strict`] the
/// error is yielded instead, but the stream stays usable afterward and
/// later packets still decode normally.
pub struct PacketStream<S, K> {
    framer: Framer<S>,
    reassembler: Option<Reassembler>,
    type_system: TypeSystem,
    sink: K,
    policy: WarningPolicy,
}

impl<S: ByteSource, K: Sink> PacketStream<S, K> {
    /// Builds a stream that frames raw packets but does not reassemble
    /// segmented ones; each yielded record corresponds to one CCSDS packet
    /// on the wire, segmented or not.
    pub fn new(source: S, type_system: TypeSystem, config: DecoderConfig, sink: K) -> Self {
        Self {
            framer: Framer::with_max_len(source, config.leading_sync_bytes, config.max_packet_len),
            reassembler: None,
            type_system,
            sink,
            policy: config.warning_policy,
        }
    }

    /// Builds a stream that reassembles segmented packets (section 4.J)
    /// before decoding each completed logical packet.
    pub fn with_reassembly(source: S, type_system: TypeSystem, config: DecoderConfig, sink: K) -> Self {
        let mut reassembler = Reassembler::new(config.secondary_header_bytes);
        reassembler.reserve(config.expected_apids.len());
        Self {
            framer: Framer::with_max_len(source, config.leading_sync_bytes, config.max_packet_len),
            reassembler: Some(reassembler),
            type_system,
            sink,
            policy: config.warning_policy,
        }
    }

    /// Consumes the stream, returning the sink it was decoding into.
    pub fn into_sink(self) -> K {
        self.sink
    }

    fn next_raw(&mut self) -> Option<Result<RawPacket, PacketError>> {
        loop {
            // A single `feed()` can complete more than one packet (section
            // 4.J: an Unsegmented packet interrupting an accumulation both
            // flushes it and is itself complete); drain those before
            // pulling another packet off the byte source.
            if let Some(reassembler) = &mut self.reassembler {
                if let Some(pending) = reassembler.pop_pending() {
                    return Some(Ok(pending));
                }
            }
            let framed = self.framer.next_packet()?;
            match (framed, &mut self.reassembler) {
                (Ok(raw), Some(reassembler)) => match reassembler.feed(raw, &mut self.sink) {
                    Some(complete) => return Some(Ok(complete)),
                    None => continue,
                },
                (Ok(raw), None) => return Some(Ok(raw)),
                (Err(e), _) => return Some(Err(e)),
            }
        }
    }
}

impl<S: ByteSource, K: Sink> Iterator for PacketStream<S, K> {
    type Item = Result<PacketRecord, PacketError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let raw = match self.next_raw()? {
                Ok(raw) => raw,
                Err(e) => {
                    return match self.policy {
                        WarningPolicy::Strict => Some(Err(e)),
                        WarningPolicy::Lenient => {
                            log::warn!("discarding packet: {e}");
                            continue;
                        }
                    }
                }
            };

            let decoder = PolymorphicDecoder::new(&self.type_system);
            match decoder.decode(&raw, &mut self.sink) {
                Ok(record) => return Some(Ok(record)),
                Err(e) => match self.policy {
                    WarningPolicy::Strict => return Some(Err(e)),
                    WarningPolicy::Lenient => {
                        log::warn!("discarding packet: {e}");
                        continue;
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::container::{BaseContainer, ContainerEntry, SequenceContainer, ROOT_CONTAINER_NAME};
    use crate::framer::{PacketKind, PrimaryHeader, SequenceFlags};
    use crate::ptype::{Parameter, ParameterType, ParameterTypeKind};
    use crate::sink::VecSink;

    fn one_byte_type_system() -> TypeSystem {
        let mut ts = TypeSystem::default();
        ts.containers.insert(
            ROOT_CONTAINER_NAME.into(),
            SequenceContainer { name: ROOT_CONTAINER_NAME.into(), abstract_: true, base: None, entries: vec![] },
        );
        ts.parameter_types.insert(
            "U8".into(),
            ParameterType {
                name: "U8".into(),
                encoding: crate::encoding::DataEncoding::Integer { bits: 8, encoding: bitcursor::IntegerEncoding::Unsigned },
                kind: ParameterTypeKind::Integer { calibrator: None },
            },
        );
        ts.parameters.insert(
            "COUNTER".into(),
            Parameter { name: "COUNTER".into(), type_name: "U8".into(), short_desc: None, long_desc: None },
        );
        ts.containers.insert(
            "Telemetry".into(),
            SequenceContainer {
                name: "Telemetry".into(),
                abstract_: false,
                base: Some(BaseContainer { base_name: ROOT_CONTAINER_NAME.into(), restriction: None }),
                entries: vec![ContainerEntry::Parameter("COUNTER".into())],
            },
        );
        ts
    }

    fn packet_bytes(apid: u16, seq_flags: SequenceFlags, seq_count: u16, data: &[u8]) -> Vec<u8> {
        let header = PrimaryHeader {
            version: 0,
            packet_type: PacketKind::Telemetry,
            secondary_header: false,
            apid,
            seq_flags,
            seq_count,
            packet_data_length: data.len().saturating_sub(1) as u16,
        };
        let mut out = header.encode().to_vec();
        out.extend_from_slice(data);
        out
    }

    #[test]
    fn decodes_two_unsegmented_packets_without_reassembly() {
        let ts = one_byte_type_system();
        let mut bytes = packet_bytes(1, SequenceFlags::Unsegmented, 0, &[7]);
        bytes.extend(packet_bytes(1, SequenceFlags::Unsegmented, 1, &[8]));

        let stream = PacketStream::new(bytes.as_slice(), ts, DecoderConfig::default(), VecSink::default());
        let records: Vec<_> = stream.collect::<Result<_, _>>().unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("COUNTER").unwrap().raw, value::RawValue::UInt(7));
        assert_eq!(records[1].get("COUNTER").unwrap().raw, value::RawValue::UInt(8));
    }

    #[test]
    fn reassembles_segmented_packet_before_decoding() {
        let ts = one_byte_type_system();
        let mut bytes = packet_bytes(2, SequenceFlags::FirstSegment, 0, &[0xAA]);
        bytes.extend(packet_bytes(2, SequenceFlags::LastSegment, 1, &[9]));

        let config = DecoderConfig::builder().secondary_header_bytes(1).build();
        let stream = PacketStream::with_reassembly(bytes.as_slice(), ts, config, VecSink::default());
        let records: Vec<_> = stream.collect::<Result<_, _>>().unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("COUNTER").unwrap().raw, value::RawValue::UInt(9));
    }

    #[test]
    fn lenient_policy_skips_a_fatal_decode_error_and_keeps_going() {
        // A 16-bit COUNTER, but the first packet's declared user data is one
        // byte short of that: decode() fails with OutOfData and the stream
        // should resynchronize to the second, well-formed packet.
        let mut ts = TypeSystem::default();
        ts.containers.insert(
            ROOT_CONTAINER_NAME.into(),
            SequenceContainer { name: ROOT_CONTAINER_NAME.into(), abstract_: true, base: None, entries: vec![] },
        );
        ts.parameter_types.insert(
            "U16".into(),
            ParameterType {
                name: "U16".into(),
                encoding: crate::encoding::DataEncoding::Integer { bits: 16, encoding: bitcursor::IntegerEncoding::Unsigned },
                kind: ParameterTypeKind::Integer { calibrator: None },
            },
        );
        ts.parameters.insert(
            "COUNTER".into(),
            Parameter { name: "COUNTER".into(), type_name: "U16".into(), short_desc: None, long_desc: None },
        );
        ts.containers.insert(
            "Telemetry".into(),
            SequenceContainer {
                name: "Telemetry".into(),
                abstract_: false,
                base: Some(BaseContainer { base_name: ROOT_CONTAINER_NAME.into(), restriction: None }),
                entries: vec![ContainerEntry::Parameter("COUNTER".into())],
            },
        );

        let mut bytes = packet_bytes(1, SequenceFlags::Unsegmented, 0, &[5]);
        bytes.extend(packet_bytes(1, SequenceFlags::Unsegmented, 1, &[0, 42]));

        let stream = PacketStream::new(bytes.as_slice(), ts, DecoderConfig::default(), VecSink::default());
        let records: Vec<_> = stream.collect::<Result<_, _>>().unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("COUNTER").unwrap().raw, value::RawValue::UInt(42));
    }
}
