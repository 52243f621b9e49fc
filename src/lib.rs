//! # Beamline Core
//!
//! An in-memory model of a neutron or X-ray instrument: an ordered sequence
//! of placed components plus the instrument-wide state around it.
//!
//! This library provides:
//! - A typed value and variable layer shared by parameters and components
//! - A schema catalog that closes each component kind's parameter set
//! - The instrument assembly with sequence edits, validation and subset
//!   extraction for split runs
//! - A reader and deterministic writer for the instrument description
//!   language, plus a JSON snapshot of the full model
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`value`] - Typed values, variables and identifier rules
//! - [`schema`] - Component kind schemas and the catalog
//! - [`instrument`] - The assembly: components, sequence checks, subsets
//! - [`dsl`] - Reader and writer for the description language
//!
//! ## Usage
//!
//! ```no_run
//! use beamline_core::schema::{Catalog, SchemaProvider};
//! use beamline_core::{dsl, Instrument};
//!
//! fn build() -> beamline_core::Result<String> {
//!     let catalog = Catalog::builtin();
//!     let mut instrument = Instrument::new("demo")?;
//!     let src = instrument.add_component("src", catalog.require("Source")?)?;
//!     src.set_parameter("radius", 0.05)?;
//!     instrument.validate()?;
//!     dsl::render(&instrument)
//! }
//! ```
//!
//! ## Validation Model
//!
//! Checks run at two points. Mutations that would corrupt the model outright
//! (unknown parameter names, type mismatches, namespace collisions) fail at
//! the call site and leave the instrument unchanged. Ordering properties
//! that edits may break transiently (relative references resolving to an
//! earlier component) are checked by [`Instrument::validate`] when the
//! caller decides the model should be consistent again.

pub mod dsl;
pub mod error;
pub mod instrument;
pub mod schema;
pub mod value;

// Re-export main types for convenience
pub use error::{BeamlineError, Result};
pub use instrument::{Component, Instrument};
pub use value::{Value, ValueType, Variable};
