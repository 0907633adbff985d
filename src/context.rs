//! The lookup surface that data encodings (C) and match criteria (E) need
//! into the in-progress decode, without depending on [`crate::decoder`]
//! directly (design note: "arena of Packet Records keyed by insertion order
//! plus a name→index side table").

use crate::value::{DerivedValue, RawValue};

/// Read-only view of the fields decoded so far in the current packet.
pub trait DecodedFields {
    fn raw(&self, name: &str) -> Option<&RawValue>;
    fn derived(&self, name: &str) -> Option<&DerivedValue>;
}

/// A [`DecodedFields`] with nothing in it, for decoding fixed-size fields
/// that never need a dynamic reference.
pub struct EmptyFields;

impl DecodedFields for EmptyFields {
    fn raw(&self, _name: &str) -> Option<&RawValue> {
        None
    }

    fn derived(&self, _name: &str) -> Option<&DerivedValue> {
        None
    }
}
