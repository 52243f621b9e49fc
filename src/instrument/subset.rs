//! Extraction of a contiguous runnable slice of an instrument.
//!
//! The slice keeps the instrument envelope (parameters, declarations, code
//! blocks) and replaces the component sequence with the selected range.
//! Synthetic boundary components stand in for the removed portions: an
//! `MCPL_input` replays rays where the cut head used to be fed, an
//! `MCPL_output` records rays where the cut tail used to continue.

use crate::error::{BeamlineError, Result};
use crate::schema::{Catalog, SchemaProvider};

use super::assembly::Instrument;
use super::component::Component;
use super::types::Reference;
use super::validate;

/// Instance names of the synthetic boundary components.
pub(crate) const INPUT_NAME: &str = "external_input";
pub(crate) const OUTPUT_NAME: &str = "external_output";

pub(crate) fn extract(instrument: &Instrument) -> Result<Instrument> {
    let components = &instrument.components;
    let start = match &instrument.run_from {
        Some(name) => index_of(components, name)?,
        None => 0,
    };
    let end = match &instrument.run_to {
        Some(name) => index_of(components, name)?,
        None => components.len(),
    };
    if start >= end {
        return Err(BeamlineError::TrivialSplit {
            from: instrument.run_from.clone().unwrap_or_else(|| "start".into()),
            to: instrument.run_to.clone().unwrap_or_else(|| "end".into()),
        });
    }

    let mut subset = instrument.clone();
    subset.reset_run();
    subset.components = components[start..end].to_vec();

    let catalog = Catalog::builtin();
    if instrument.run_from.is_some() {
        // The head loses its external anchor; its coordinates now read in
        // the laboratory frame.
        let head = &mut subset.components[0];
        head.position.reference = Reference::Absolute;
        if let Some(rotation) = &mut head.rotation {
            rotation.reference = Reference::Absolute;
        }
        let input = Component::from_schema(INPUT_NAME, catalog.require("MCPL_input")?)?;
        subset.components.insert(0, input);
    }
    if instrument.run_to.is_some() {
        // The output sits exactly where the removed continuation would
        // have been, so it mirrors the placement of the first component
        // after the range.
        let mut output = Component::from_schema(OUTPUT_NAME, catalog.require("MCPL_output")?)?;
        output.position = components[end].position.clone();
        output.rotation = components[end].rotation.clone();
        subset.components.push(output);
    }

    validate::check_subrange(&subset.components, true)?;
    validate::check_remainder(&components[end..])?;
    Ok(subset)
}

fn index_of(components: &[Component], name: &str) -> Result<usize> {
    components
        .iter()
        .position(|c| c.name == name)
        .ok_or_else(|| BeamlineError::UnknownComponent {
            name: name.to_string(),
        })
}
