//! Error types for the Beamline instrument toolchain.
//!
//! This module provides a unified error type [`BeamlineError`] that covers
//! all error conditions that can occur while building an instrument model,
//! parsing instrument DSL text, validating the component sequence, and
//! serializing the model back to text.

use thiserror::Error;

/// Result type alias using [`BeamlineError`].
pub type Result<T> = std::result::Result<T, BeamlineError>;

/// Unified error type for all Beamline operations.
#[derive(Error, Debug)]
pub enum BeamlineError {
    // ============ Name Errors ============
    /// Identifier does not match the DSL identifier grammar or is reserved
    #[error("Illegal name '{name}': {message}")]
    IllegalName { name: String, message: String },

    /// Name already used in the instrument's flat variable namespace
    #[error("Duplicate name '{name}' already declared as {existing}")]
    DuplicateName { name: String, existing: String },

    /// Component instance name already used in the sequence
    #[error("Duplicate component name '{name}'")]
    DuplicateComponent { name: String },

    /// Component instance not found in the sequence
    #[error("Component '{name}' not found in instrument")]
    UnknownComponent { name: String },

    /// Insert/move anchor names a component that is absent
    #[error("Anchor component '{name}' not found in instrument")]
    UnknownAnchor { name: String },

    // ============ Type Errors ============
    /// Value incompatible with a declared type
    #[error("Value '{value}' is not legal for {vtype} variable '{name}'")]
    IncompatibleValue {
        name: String,
        vtype: String,
        value: String,
    },

    /// Array initializer length does not match the declared length
    #[error("Array '{name}' declared with length {declared} but initialized with {actual} elements")]
    ArrayLengthMismatch {
        name: String,
        declared: u32,
        actual: usize,
    },

    /// Identifier value refers to a variable of an incompatible type
    #[error("Value of '{owner}' refers to '{target}' of type {target_type}, expected {expected}")]
    IncompatibleReference {
        owner: String,
        target: String,
        target_type: String,
        expected: String,
    },

    /// Identifier value does not refer to any instrument variable
    #[error("Value of '{owner}' refers to unknown variable '{target}'")]
    UnknownVariable { owner: String, target: String },

    // ============ Syntax Errors ============
    /// Malformed DSL construct during parse
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// AT/ROTATED clause matches neither ABSOLUTE nor RELATIVE <ref>
    #[error("Malformed position clause for component '{component}' at line {line}: '{clause}'")]
    MalformedPositionClause {
        component: String,
        line: usize,
        clause: String,
    },

    /// A %{ ... %} or brace block was still open at end of input
    #[error("Unterminated {block} block starting at line {line}")]
    UnterminatedBlock { block: String, line: usize },

    /// No DEFINE INSTRUMENT statement found in the input
    #[error("Input contains no DEFINE INSTRUMENT statement")]
    MissingDefine,

    // ============ Reference Errors ============
    /// A position/rotation reference does not resolve within the sequence
    #[error("Component '{component}' references '{reference}' which is not defined earlier in the sequence")]
    UnresolvedReference {
        component: String,
        reference: String,
    },

    /// ABSOLUTE used where a split sub-range requires relative placement
    #[error("Component '{component}' uses ABSOLUTE positioning, not allowed in a split sub-range")]
    AbsoluteNotAllowed { component: String },

    /// run_from/run_to describe an empty or inverted range
    #[error("Split range from '{from}' to '{to}' selects no components")]
    TrivialSplit { from: String, to: String },

    // ============ Schema Errors ============
    /// Component kind unknown to the schema provider
    #[error("Unknown component kind '{kind}'")]
    UnknownKind { kind: String },

    /// Parameter name not part of the component kind's schema
    #[error("Component '{component}' of kind '{kind}' has no parameter '{parameter}'")]
    UnknownParameter {
        component: String,
        kind: String,
        parameter: String,
    },

    /// Required parameter still unset at serialization time
    #[error("Required parameter '{parameter}' of component '{component}' has no value")]
    MissingRequiredParameter {
        component: String,
        parameter: String,
    },

    // ============ I/O Errors ============
    /// Error reading an instrument file
    #[error("Failed to read instrument file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error writing rendered DSL text to a sink
    #[error("Failed to write instrument text: {source}")]
    WriteError {
        #[source]
        source: std::io::Error,
    },

    /// Error encoding or decoding a model snapshot
    #[error("Snapshot serialization error: {0}")]
    SnapshotError(#[from] serde_json::Error),
}

impl BeamlineError {
    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            message: message.into(),
        }
    }

    /// Create an illegal-name error
    pub fn illegal_name(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IllegalName {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a malformed position clause error
    pub fn malformed_position(
        component: impl Into<String>,
        line: usize,
        clause: impl Into<String>,
    ) -> Self {
        Self::MalformedPositionClause {
            component: component.into(),
            line,
            clause: clause.into(),
        }
    }

    /// Create an unresolved reference error
    pub fn unresolved(component: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::UnresolvedReference {
            component: component.into(),
            reference: reference.into(),
        }
    }
}
