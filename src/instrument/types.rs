//! Core types for the component sequence.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Variable;

/// The anchor a component's position or rotation is taken against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reference {
    /// The laboratory frame.
    Absolute,
    /// The component immediately before this one in sequence.
    Previous,
    /// A component defined earlier in sequence, by name.
    Named(String),
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Absolute => f.write_str("ABSOLUTE"),
            Reference::Previous => f.write_str("RELATIVE PREVIOUS"),
            Reference::Named(name) => write!(f, "RELATIVE {}", name),
        }
    }
}

/// A position or rotation statement: three coordinate expressions and the
/// reference they are taken in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub coords: [String; 3],
    pub reference: Reference,
}

impl Placement {
    pub fn new<C: fmt::Display>(coords: [C; 3], reference: Reference) -> Self {
        Placement {
            coords: coords.map(|c| c.to_string()),
            reference,
        }
    }

    /// The implicit origin: `(0,0,0) ABSOLUTE`.
    pub fn origin() -> Self {
        Placement::new([0, 0, 0], Reference::Absolute)
    }

    /// Coordinates as they appear between the parentheses.
    pub fn coords_text(&self) -> String {
        self.coords.join(",")
    }
}

/// Ray-splitting directive on a component.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Split {
    /// No splitting.
    #[default]
    Off,
    /// `SPLIT` with the simulator's default multiplier.
    Bare,
    /// `SPLIT n` with an explicit multiplier expression.
    Factor(String),
}

/// One entry of the DECLARE block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeclareItem {
    /// A typed variable declaration.
    Var(Variable),
    /// A struct body, function body or unrecognized statement kept verbatim.
    Verbatim(String),
}

/// Where a component lands when inserted or moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    /// At the end of the sequence.
    Append,
    /// Immediately before the named component.
    Before(String),
    /// Immediately after the named component.
    After(String),
}

impl Anchor {
    pub fn before(name: &str) -> Self {
        Anchor::Before(name.to_string())
    }

    pub fn after(name: &str) -> Self {
        Anchor::After(name.to_string())
    }
}
