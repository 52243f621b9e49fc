//! Instrument model: an ordered component sequence plus instrument-wide
//! parameters, declarations and code blocks.
//!
//! The [`Instrument`] struct is the assembly everything else feeds:
//! the parser populates it, the validator walks it, the subset extractor
//! copies slices of it and the serializer renders it back to DSL text.

mod assembly;
mod component;
mod subset;
mod types;
mod validate;

pub use assembly::Instrument;
pub use component::{Component, ParamSlot};
pub use types::{Anchor, DeclareItem, Placement, Reference, Split};
pub use validate::{check_remainder, check_sequence, check_subrange};

pub(crate) use component::LINE_BUDGET;
