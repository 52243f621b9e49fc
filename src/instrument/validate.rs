//! Relative-reference checks over an ordered component sequence.
//!
//! A component may only anchor its position or rotation on a component
//! defined earlier in the sequence, on its immediate predecessor
//! (`PREVIOUS`), or on the laboratory frame (`ABSOLUTE`). The sub-range
//! variants additionally confine references to the range itself, which is
//! what makes an extracted slice runnable on its own.

use std::collections::HashSet;

use crate::error::{BeamlineError, Result};

use super::component::Component;
use super::types::Reference;

fn references(component: &Component) -> impl Iterator<Item = &Reference> {
    std::iter::once(&component.position.reference)
        .chain(component.rotation.as_ref().map(|p| &p.reference))
}

/// Checks that every reference resolves to a component already defined
/// earlier in the sequence.
pub fn check_sequence(components: &[Component]) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::new();
    for (i, component) in components.iter().enumerate() {
        for reference in references(component) {
            match reference {
                Reference::Absolute => {}
                Reference::Previous if i == 0 => {
                    return Err(BeamlineError::unresolved(&component.name, "PREVIOUS"));
                }
                Reference::Previous => {}
                Reference::Named(target) if !seen.contains(target.as_str()) => {
                    return Err(BeamlineError::unresolved(&component.name, target));
                }
                Reference::Named(_) => {}
            }
        }
        seen.insert(component.name.as_str());
    }
    Ok(())
}

/// Checks a bounded sub-range for self-containment.
///
/// Name resolution is by membership: the set of resolvable names is seeded
/// from the whole range up front, since definition order across the range
/// was already established when the full sequence was validated. With
/// `allow_absolute` unset, any `ABSOLUTE` placement is rejected.
pub fn check_subrange(components: &[Component], allow_absolute: bool) -> Result<()> {
    let members: HashSet<&str> = components.iter().map(|c| c.name.as_str()).collect();
    for (i, component) in components.iter().enumerate() {
        check_one(component, i, &members, allow_absolute)?;
    }
    Ok(())
}

/// Checks the unexecuted remainder left behind by a subset extraction.
///
/// The head component is exempt: a later run starting there rewrites its
/// placement to `ABSOLUTE`, so references leaving the remainder through the
/// head are fine. Everything after the head must stay inside the remainder
/// and must not anchor on the laboratory frame.
pub fn check_remainder(components: &[Component]) -> Result<()> {
    let members: HashSet<&str> = components.iter().map(|c| c.name.as_str()).collect();
    for (i, component) in components.iter().enumerate().skip(1) {
        check_one(component, i, &members, false)?;
    }
    Ok(())
}

fn check_one(
    component: &Component,
    index: usize,
    members: &HashSet<&str>,
    allow_absolute: bool,
) -> Result<()> {
    for reference in references(component) {
        match reference {
            Reference::Absolute if !allow_absolute => {
                return Err(BeamlineError::AbsoluteNotAllowed {
                    component: component.name.clone(),
                });
            }
            Reference::Absolute => {}
            Reference::Previous if index == 0 => {
                return Err(BeamlineError::unresolved(&component.name, "PREVIOUS"));
            }
            Reference::Previous => {}
            Reference::Named(target) if !members.contains(target.as_str()) => {
                return Err(BeamlineError::unresolved(&component.name, target));
            }
            Reference::Named(_) => {}
        }
    }
    Ok(())
}
