//! Component-kind schemas.
//!
//! A schema lists every parameter a component kind accepts, with declared
//! types, defaults, units and comments. Instances consult the schema once at
//! construction; afterwards the set of assignable parameter names is closed,
//! so a typo in a parameter name fails immediately instead of surfacing as a
//! silently ignored setting.
//!
//! The core only ever reads schemas through [`SchemaProvider`]. [`Catalog`]
//! is the concrete in-memory provider, fed from the builtin library or from
//! a JSON file.

mod builtin;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{BeamlineError, Result};
use crate::value::{Value, ValueType};

/// Schema of a single component parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSchema {
    pub name: String,
    pub vtype: ValueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ParamSchema {
    pub fn new(name: &str, vtype: ValueType) -> Self {
        ParamSchema {
            name: name.to_string(),
            vtype,
            default: None,
            unit: None,
            comment: None,
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    /// A parameter with no default must be set before the instrument can be
    /// rendered.
    pub fn required(&self) -> bool {
        self.default.is_none()
    }
}

/// All parameters of one component kind, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSchema {
    pub kind: String,
    #[serde(default)]
    pub params: Vec<ParamSchema>,
}

impl ComponentSchema {
    pub fn new(kind: &str) -> Self {
        ComponentSchema {
            kind: kind.to_string(),
            params: Vec::new(),
        }
    }

    /// Builder-style parameter registration.
    pub fn param(mut self, param: ParamSchema) -> Self {
        self.params.push(param);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamSchema> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// Source of component schemas consulted during assembly and parsing.
pub trait SchemaProvider {
    fn lookup(&self, kind: &str) -> Option<&ComponentSchema>;

    /// Like [`lookup`](Self::lookup), but a miss is an error.
    fn require(&self, kind: &str) -> Result<&ComponentSchema> {
        self.lookup(kind)
            .ok_or_else(|| BeamlineError::UnknownKind {
                kind: kind.to_string(),
            })
    }
}

/// An in-memory set of component schemas keyed by kind name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    schemas: HashMap<String, ComponentSchema>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog::default()
    }

    /// The schemas every installation has available.
    pub fn builtin() -> Self {
        builtin::catalog()
    }

    /// Registers a schema, replacing any previous one for the same kind.
    pub fn insert(&mut self, schema: ComponentSchema) {
        self.schemas.insert(schema.kind.clone(), schema);
    }

    /// Loads schemas from a JSON array of component schemas.
    pub fn from_json(text: &str) -> Result<Self> {
        let mut catalog = Catalog::new();
        catalog.extend_from_json(text)?;
        Ok(catalog)
    }

    /// Merges schemas from a JSON array into this catalog.
    pub fn extend_from_json(&mut self, text: &str) -> Result<()> {
        let schemas: Vec<ComponentSchema> = serde_json::from_str(text)?;
        for schema in schemas {
            self.insert(schema);
        }
        Ok(())
    }

    /// Serializes the catalog as a JSON array, sorted by kind name.
    pub fn to_json(&self) -> Result<String> {
        let mut schemas: Vec<&ComponentSchema> = self.schemas.values().collect();
        schemas.sort_by(|a, b| a.kind.cmp(&b.kind));
        Ok(serde_json::to_string_pretty(&schemas)?)
    }

    /// Kind names in sorted order.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl SchemaProvider for Catalog {
    fn lookup(&self, kind: &str) -> Option<&ComponentSchema> {
        self.schemas.get(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_is_absence_of_default() {
        let p = ParamSchema::new("l", ValueType::Double).with_unit("m");
        assert!(p.required());
        let p = p.with_default(2.0);
        assert!(!p.required());
    }

    #[test]
    fn test_require_unknown_kind() {
        let catalog = Catalog::builtin();
        assert!(catalog.lookup("Guide").is_some());
        let err = catalog.require("Giude").unwrap_err();
        assert!(matches!(err, BeamlineError::UnknownKind { .. }));
    }

    #[test]
    fn test_builtin_has_boundary_kinds() {
        let catalog = Catalog::builtin();
        for kind in ["Arm", "Source", "Monitor", "MCPL_input", "MCPL_output"] {
            assert!(catalog.lookup(kind).is_some(), "missing builtin {kind}");
        }
    }

    #[test]
    fn test_json_round_trip() {
        let catalog = Catalog::builtin();
        let json = catalog.to_json().unwrap();
        let reloaded = Catalog::from_json(&json).unwrap();
        assert_eq!(reloaded.len(), catalog.len());
        assert_eq!(
            reloaded.lookup("Guide").unwrap(),
            catalog.lookup("Guide").unwrap()
        );
    }

    #[test]
    fn test_extend_replaces_kind() {
        let mut catalog = Catalog::builtin();
        let n = catalog.len();
        catalog.extend_from_json(
            r#"[{"kind": "Arm", "params": [{"name": "length", "vtype": "Double"}]}]"#,
        )
        .unwrap();
        assert_eq!(catalog.len(), n);
        assert_eq!(catalog.lookup("Arm").unwrap().params.len(), 1);
    }
}
