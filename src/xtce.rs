//! XTCE document support: loading (component G), the round-trip writer
//! (section 4.G.1), and the namespace-agnostic XML tree they share.

pub mod load;
pub mod write;
pub mod xml;

pub use load::{load, LoadedDocument, NAMESPACE_2018, NAMESPACE_LEGACY};
pub use write::write;
