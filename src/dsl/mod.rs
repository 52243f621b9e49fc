//! Reader and writer for the instrument description language.
//!
//! The language is line-oriented and human-editable: a header comment, a
//! DEFINE line with the typed input parameters, C-code sections delimited by
//! `%{ ... %}`, and a TRACE section listing the component sequence.
//!
//! # Grammar Overview
//!
//! ```text
//! instrument  = header define { section } "END"
//! define      = "DEFINE" "INSTRUMENT" name '(' [ parameter { ',' parameter } ] ')'
//! parameter   = [ type ] name [ '=' value ]
//! section     = declare | uservars | initialize | trace | finally
//! declare     = "DECLARE" block
//! uservars    = "USERVARS" block
//! initialize  = "INITIALIZE" block
//! finally     = "FINALLY" block
//! block       = "%{" { c_line } "%}"
//! trace       = "TRACE" { statement }
//! statement   = [ "SPLIT" [ factor ] ] "COMPONENT" name '=' call { clause }
//! call        = kind '(' [ assignment { ',' assignment } ] ')'
//!             | "COPY" '(' source ')' [ '(' assignment { ',' assignment } ')' ]
//! assignment  = name '=' value
//! clause      = "WHEN" '(' expr ')'
//!             | "AT" coords reference
//!             | "ROTATED" coords reference
//!             | "GROUP" name
//!             | "EXTEND" "%{" { c_line } "%}"
//!             | "JUMP" target
//! coords      = '(' expr ',' expr ',' expr ')'
//! reference   = "ABSOLUTE" | "RELATIVE" ("PREVIOUS" | name)
//!
//! type        = "double" | "int" | "string" | "char"
//! value       = number | quoted_string | '{' value { ',' value } '}' | expr
//! identifier  = (letter | '_') { letter | digit | '_' }
//! ```
//!
//! # Sections
//!
//! | Section | Content | Model field |
//! |------------|----------------------------------------|----------------------|
//! | DECLARE | C globals, typed where possible | `Instrument::declares` |
//! | USERVARS | typed per-ray variables | `Instrument::user_vars` |
//! | INITIALIZE | verbatim C startup code | `Instrument::initialize` |
//! | TRACE | the ordered component sequence | `Instrument::components` |
//! | FINALLY | verbatim C teardown code | `Instrument::finally` |
//!
//! # Example
//!
//! ```text
//! DEFINE INSTRUMENT demo (double lambda = 2.5)
//! DECLARE
//! %{
//!   double mono_q = 1.8734;
//! %}
//! TRACE
//!
//! COMPONENT src = Source(radius = 0.05)
//! AT (0,0,0) ABSOLUTE
//!
//! COMPONENT det = Monitor(filename = "det.dat")
//! AT (0,0,2) RELATIVE src
//!
//! END
//! ```
//!
//! Reading is lenient where the text allows it: unrecognized lines ride
//! along verbatim with a warning. Component kinds, their parameter names
//! and position clauses are checked strictly.

pub(crate) mod text;

mod reader;
mod trace;
mod writer;

pub use writer::{render, render_to, render_with, WriteOptions};
#[cfg(feature = "cli")]
pub use writer::render_to_file;

use crate::error::Result;
use crate::instrument::Instrument;
use crate::schema::SchemaProvider;

/// Parses an instrument description, resolving component kinds against
/// `schemas`.
pub fn parse(input: &str, schemas: &dyn SchemaProvider) -> Result<Instrument> {
    reader::read(input, schemas)
}

/// Parses an instrument description file.
#[cfg(feature = "cli")]
pub fn parse_file(path: &std::path::Path, schemas: &dyn SchemaProvider) -> Result<Instrument> {
    let content =
        std::fs::read_to_string(path).map_err(|e| crate::error::BeamlineError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
    parse(&content, schemas)
}
