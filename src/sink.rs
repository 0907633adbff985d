//! Structured warning events and the caller-provided sink that collects them.
//!
//! Warnings never abort decoding (see [`crate::error::WarningKind`]); they are
//! pushed to whatever [`Sink`] the caller supplies, following the same "don't
//! hold a lock, don't block" contract as the rest of the decode pipeline.

use crate::error::WarningKind;

/// One structured warning, as specified in section 6 (Observability).
#[derive(Debug, Clone, PartialEq)]
pub struct WarningEvent {
    pub kind: WarningKind,
    pub apid: Option<u16>,
    /// Bit position within the packet's user-data field, when applicable.
    pub position: Option<usize>,
    pub message: String,
}

impl WarningEvent {
    pub fn new(kind: WarningKind, apid: Option<u16>, position: Option<usize>) -> Self {
        let message = describe(&kind);
        Self { kind, apid, position, message }
    }
}

fn describe(kind: &WarningKind) -> String {
    match kind {
        WarningKind::UnknownApid { apid } => format!("no container declared for apid {apid}"),
        WarningKind::UnknownEnumValue { parameter, raw } => {
            format!("parameter '{parameter}' raw value {raw} has no enumeration label")
        }
        WarningKind::UnderRun { unused_bits } => {
            format!("container consumed fewer bits than declared; {unused_bits} bits unused")
        }
        WarningKind::SequenceGap { apid, expected, found } => {
            format!("apid {apid}: expected sequence count {expected}, found {found}")
        }
        WarningKind::OrphanSegment { apid, sequence_count } => {
            format!("apid {apid}: continuation segment {sequence_count} with no open accumulator")
        }
        WarningKind::UnexpectedStart { apid } => {
            format!("apid {apid}: new segment started before prior one was completed")
        }
        WarningKind::ContainerAmbiguity { candidates, chosen } => format!(
            "{} concrete containers matched ({}); chose '{chosen}' by declaration order",
            candidates.len(),
            candidates.join(", ")
        ),
    }
}

/// Receives warnings emitted during loading, framing, reassembly, and decoding.
///
/// A single method keeps this implementable by anything from a `Vec` to a
/// `log` bridge to a channel sender; the decoder never holds onto the sink
/// across a suspension point, so implementations need no internal locking of
/// their own beyond what the caller already uses.
pub trait Sink {
    fn warn(&mut self, event: WarningEvent);
}

/// Default sink: collects every warning in arrival order.
#[derive(Debug, Default)]
pub struct VecSink {
    events: Vec<WarningEvent>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[WarningEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<WarningEvent> {
        self.events
    }
}

impl Sink for VecSink {
    fn warn(&mut self, event: WarningEvent) {
        self.events.push(event);
    }
}

/// Bridges warnings onto the `log` facade at `warn!`, per section 4.K.
#[derive(Debug, Default)]
pub struct LogSink;

impl Sink for LogSink {
    fn warn(&mut self, event: WarningEvent) {
        log::warn!("{}", event.message);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn vec_sink_preserves_order() {
        let mut sink = VecSink::new();
        sink.warn(WarningEvent::new(WarningKind::UnknownApid { apid: 3 }, Some(3), None));
        sink.warn(WarningEvent::new(WarningKind::UnknownApid { apid: 4 }, Some(4), None));

        let events = sink.into_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].apid, Some(3));
        assert_eq!(events[1].apid, Some(4));
    }
}
