//! Walks container inheritance against one packet's bytes and produces a
//! Packet Record (component I). Pure with respect to the type system.

use std::collections::HashMap;

use serde::ser::SerializeMap;
use serde::Serialize;

use crate::bitcursor::BitCursor;
use crate::container::{ContainerEntry, SequenceContainer, TypeSystem, ROOT_CONTAINER_NAME};
use crate::context::DecodedFields;
use crate::criteria::MatchCriterion;
use crate::error::{PacketError, WarningKind};
use crate::framer::RawPacket;
use crate::sink::{Sink, WarningEvent};
use crate::value::{DerivedValue, RawValue};

/// One decoded field: its raw and derived values plus whatever description
/// text the parameter carried at load time.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRecord {
    pub raw: RawValue,
    pub derived: DerivedValue,
    pub short_desc: Option<String>,
    pub long_desc: Option<String>,
}

/// An arena of decoded fields keyed by insertion order, with a name-indexed
/// side table for lookups (design note: avoid a mutable name-keyed map).
#[derive(Debug, Clone, Default)]
pub struct PacketRecord {
    fields: Vec<(String, FieldRecord)>,
    index: HashMap<String, usize>,
}

impl PacketRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: String, field: FieldRecord) {
        if let Some(&i) = self.index.get(&name) {
            self.fields[i].1 = field;
        } else {
            self.index.insert(name.clone(), self.fields.len());
            self.fields.push((name, field));
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldRecord> {
        self.index.get(name).map(|&i| &self.fields[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldRecord)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl DecodedFields for PacketRecord {
    fn raw(&self, name: &str) -> Option<&RawValue> {
        self.get(name).map(|f| &f.raw)
    }

    fn derived(&self, name: &str) -> Option<&DerivedValue> {
        self.get(name).map(|f| &f.derived)
    }
}

impl Serialize for PacketRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, field) in &self.fields {
            map.serialize_entry(name, &field.derived)?;
        }
        map.end()
    }
}

/// Header parameter names the loader reserves on the synthetic root
/// container (design note: every document gets these whether or not the
/// XTCE source declares them explicitly).
pub const HEADER_VERSION: &str = "VERSION";
pub const HEADER_TYPE: &str = "TYPE";
pub const HEADER_SEC_HDR_FLG: &str = "SEC_HDR_FLG";
pub const HEADER_APID: &str = "PKT_APID";
pub const HEADER_SEQ_FLGS: &str = "SEQ_FLGS";
pub const HEADER_SEQ_COUNT: &str = "SRC_SEQ_CTR";
pub const HEADER_PKT_LEN: &str = "PKT_LEN";

fn seed_header(record: &mut PacketRecord, packet: &RawPacket) {
    let h = &packet.header;
    let field = |raw: RawValue, derived: DerivedValue| FieldRecord { raw, derived, short_desc: None, long_desc: None };

    record.insert(HEADER_VERSION.into(), field(RawValue::UInt(h.version as u64), DerivedValue::UInt(h.version as u64)));
    record.insert(
        HEADER_TYPE.into(),
        field(RawValue::UInt(h.packet_type as u64), DerivedValue::UInt(h.packet_type as u64)),
    );
    record.insert(
        HEADER_SEC_HDR_FLG.into(),
        field(RawValue::UInt(h.secondary_header as u64), DerivedValue::Bool(h.secondary_header)),
    );
    record.insert(HEADER_APID.into(), field(RawValue::UInt(h.apid as u64), DerivedValue::UInt(h.apid as u64)));
    record.insert(
        HEADER_SEQ_FLGS.into(),
        field(RawValue::UInt(h.seq_flags.as_2bits() as u64), DerivedValue::UInt(h.seq_flags.as_2bits() as u64)),
    );
    record.insert(HEADER_SEQ_COUNT.into(), field(RawValue::UInt(h.seq_count as u64), DerivedValue::UInt(h.seq_count as u64)));
    record.insert(
        HEADER_PKT_LEN.into(),
        field(RawValue::UInt(h.packet_data_length as u64), DerivedValue::UInt(h.packet_data_length as u64)),
    );
}

/// Combines container resolution (F) with a cursor over one packet's
/// user-data bytes to produce a [`PacketRecord`].
pub struct PolymorphicDecoder<'a> {
    type_system: &'a TypeSystem,
}

impl<'a> PolymorphicDecoder<'a> {
    pub fn new(type_system: &'a TypeSystem) -> Self {
        Self { type_system }
    }

    pub fn decode(&self, packet: &RawPacket, sink: &mut dyn Sink) -> Result<PacketRecord, PacketError> {
        let mut record = PacketRecord::new();
        seed_header(&mut record, packet);

        let mut cursor = BitCursor::new(&packet.user_data);
        let mut current_name = ROOT_CONTAINER_NAME.to_string();

        loop {
            let current = self
                .type_system
                .container(&current_name)
                .ok_or_else(|| PacketError::Malformed(format!("unresolved container '{current_name}'")))?;

            self.decode_entries(current, &mut record, &mut cursor, sink)?;

            if !current.abstract_ {
                break;
            }

            let candidates: Vec<&SequenceContainer> = self.type_system.direct_subtypes(&current_name).collect();
            log::trace!("resolving abstract container '{current_name}': {} candidate(s)", candidates.len());
            let mut matched: Vec<&SequenceContainer> = Vec::new();
            for candidate in &candidates {
                let restriction: Option<&MatchCriterion> =
                    candidate.base.as_ref().and_then(|b| b.restriction.as_ref());
                let ok = match restriction {
                    Some(criterion) => criterion.eval(&record)?,
                    None => true,
                };
                if ok {
                    matched.push(candidate);
                }
            }

            if matched.is_empty() {
                return Err(PacketError::NoContainerMatch { apid: packet.header.apid });
            }
            if matched.len() > 1 {
                sink.warn(WarningEvent::new(
                    WarningKind::ContainerAmbiguity {
                        candidates: matched.iter().map(|c| c.name.clone()).collect(),
                        chosen: matched[0].name.clone(),
                    },
                    Some(packet.header.apid),
                    Some(cursor.position()),
                ));
            }
            current_name = matched[0].name.clone();
            log::trace!("resolved to concrete candidate '{current_name}'");
        }

        if cursor.remaining() > 0 {
            sink.warn(WarningEvent::new(
                WarningKind::UnderRun { unused_bits: cursor.remaining() },
                Some(packet.header.apid),
                Some(cursor.position()),
            ));
        }

        Ok(record)
    }

    fn decode_entries(
        &self,
        container: &SequenceContainer,
        record: &mut PacketRecord,
        cursor: &mut BitCursor,
        sink: &mut dyn Sink,
    ) -> Result<(), PacketError> {
        for entry in &container.entries {
            match entry {
                ContainerEntry::Parameter(name) => self.decode_parameter(name, record, cursor, sink)?,
                ContainerEntry::Container(name) => {
                    let nested = self
                        .type_system
                        .container(name)
                        .ok_or_else(|| PacketError::Malformed(format!("unresolved aggregate container '{name}'")))?;
                    self.decode_entries(nested, record, cursor, sink)?;
                }
            }
        }
        Ok(())
    }

    fn decode_parameter(
        &self,
        name: &str,
        record: &mut PacketRecord,
        cursor: &mut BitCursor,
        sink: &mut dyn Sink,
    ) -> Result<(), PacketError> {
        let parameter = self
            .type_system
            .parameter(name)
            .ok_or_else(|| PacketError::Malformed(format!("unresolved parameter '{name}'")))?;
        let ptype = self
            .type_system
            .parameter_type(&parameter.type_name)
            .ok_or_else(|| PacketError::Malformed(format!("unresolved parameter type '{}'", parameter.type_name)))?;

        let (raw, _text) = ptype.encoding.decode(cursor, record)?;
        let derived = ptype.derive(&raw, record, sink)?;

        record.insert(
            name.to_string(),
            FieldRecord { raw, derived, short_desc: parameter.short_desc.clone(), long_desc: parameter.long_desc.clone() },
        );
        Ok(())
    }
}
