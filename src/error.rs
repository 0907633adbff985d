//! Error and warning taxonomy for the loader, framer, and decoder.
//!
//! Load-time failures (malformed XTCE, dangling references, unsupported
//! encodings) are [`XtceError`] and halt loading entirely. Packet-level
//! failures are [`PacketError`]; they discard the offending packet and the
//! caller resynchronizes to the next header. Everything that is merely
//! informative (an unknown APID, a missing enum label, a sequence gap) is a
//! [`WarningKind`] routed through the [`crate::sink::Sink`] trait instead of
//! returned as an `Err`.

use thiserror::Error;

pub type XtceResult<T> = std::result::Result<T, XtceError>;
pub type PacketResult<T> = std::result::Result<T, PacketError>;

/// Failures that can occur while loading an XTCE document into a [`crate::container::TypeSystem`].
#[derive(Error, Debug)]
pub enum XtceError {
    #[error("malformed XTCE XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed XTCE XML at byte {position}: {message}")]
    Malformed { position: usize, message: String },

    #[error("unknown element <{0}>")]
    UnknownElement(String),

    #[error("dangling reference to '{kind}' named '{name}'")]
    DanglingReference { kind: &'static str, name: String },

    #[error("duplicate name '{name}' in {kind}")]
    DuplicateName { kind: &'static str, name: String },

    #[error("cycle detected in container inheritance involving '{0}'")]
    InheritanceCycle(String),

    #[error("unsupported encoding in element '{element}': {reason}")]
    UnsupportedEncoding { element: String, reason: String },

    #[error("I/O error while reading XTCE document")]
    Io(#[from] std::io::Error),
}

/// Failures that discard a single packet but let the decoder continue.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PacketError {
    #[error("ran out of data: requested {requested} bits, {remaining} remained")]
    OutOfData { requested: usize, remaining: usize },

    #[error("malformed packet: {0}")]
    Malformed(String),

    #[error("encoding unsupported at decode time: {0}")]
    UnsupportedEncoding(String),

    #[error("reference to parameter '{0}' is unresolved at this point in the decode")]
    UnresolvedReference(String),

    #[error("packet stream ended with a truncated packet ({available} of {expected} bytes)")]
    Truncated { expected: usize, available: usize },

    #[error("no concrete container matched apid {apid}")]
    NoContainerMatch { apid: u16 },
}

/// Non-fatal events worth surfacing to a caller-provided [`crate::sink::Sink`].
#[derive(Debug, Clone, PartialEq)]
pub enum WarningKind {
    UnknownApid { apid: u16 },
    UnknownEnumValue { parameter: String, raw: String },
    UnderRun { unused_bits: usize },
    SequenceGap { apid: u16, expected: u16, found: u16 },
    OrphanSegment { apid: u16, sequence_count: u16 },
    UnexpectedStart { apid: u16 },
    ContainerAmbiguity { candidates: Vec<String>, chosen: String },
}
