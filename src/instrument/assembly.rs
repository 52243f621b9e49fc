//! The instrument assembly.
//!
//! An [`Instrument`] owns the ordered component sequence together with the
//! instrument-wide state: typed input parameters, DECLARE and USERVARS
//! variables, INITIALIZE/FINALLY code and the header fields. Parameters,
//! declared variables and user variables share one flat namespace; component
//! names form their own.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{BeamlineError, Result};
use crate::schema::ComponentSchema;
use crate::value::{self, Variable};

use super::component::Component;
use super::subset;
use super::types::{Anchor, DeclareItem};
use super::validate;

/// Header defaults for instruments built through the API.
pub const DEFAULT_AUTHOR: &str = "beamline_core";
pub const DEFAULT_ORIGIN: &str = "generated";

/// A complete instrument description.
///
/// `run_from`/`run_to` are transient view state for subset extraction; they
/// are not persisted and do not take part in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    pub name: String,
    pub author: String,
    pub origin: String,
    /// Typed input parameters of the DEFINE line, in declaration order.
    pub parameters: Vec<Variable>,
    /// DECLARE block entries, in source order.
    pub declares: Vec<DeclareItem>,
    /// USERVARS per-ray variables, in source order.
    pub user_vars: Vec<Variable>,
    /// Verbatim INITIALIZE lines.
    pub initialize: Vec<String>,
    /// Verbatim FINALLY lines.
    pub finally: Vec<String>,
    /// The ordered component sequence.
    pub components: Vec<Component>,
    #[serde(skip)]
    pub run_from: Option<String>,
    #[serde(skip)]
    pub run_to: Option<String>,
}

impl PartialEq for Instrument {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.author == other.author
            && self.origin == other.origin
            && self.parameters == other.parameters
            && self.declares == other.declares
            && self.user_vars == other.user_vars
            && self.initialize == other.initialize
            && self.finally == other.finally
            && self.components == other.components
    }
}

impl Instrument {
    /// Creates an empty instrument.
    pub fn new(name: &str) -> Result<Self> {
        value::check_identifier(name)?;
        Ok(Instrument {
            name: name.to_string(),
            author: DEFAULT_AUTHOR.to_string(),
            origin: DEFAULT_ORIGIN.to_string(),
            parameters: Vec::new(),
            declares: Vec::new(),
            user_vars: Vec::new(),
            initialize: Vec::new(),
            finally: Vec::new(),
            components: Vec::new(),
            run_from: None,
            run_to: None,
        })
    }

    // ------------------------------------------------------------------
    // Variable namespace
    // ------------------------------------------------------------------

    fn namespace_holder(&self, name: &str) -> Option<&'static str> {
        if self.parameters.iter().any(|v| v.name == name) {
            return Some("instrument parameter");
        }
        let declared = self.declares.iter().any(|item| {
            matches!(item, DeclareItem::Var(v) if v.name == name)
        });
        if declared {
            return Some("declared variable");
        }
        if self.user_vars.iter().any(|v| v.name == name) {
            return Some("user variable");
        }
        None
    }

    fn check_free_name(&self, name: &str) -> Result<()> {
        match self.namespace_holder(name) {
            Some(existing) => Err(BeamlineError::DuplicateName {
                name: name.to_string(),
                existing: existing.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Adds a typed input parameter to the DEFINE line.
    pub fn add_parameter(&mut self, var: Variable) -> Result<()> {
        self.check_free_name(&var.name)?;
        self.parameters.push(var);
        Ok(())
    }

    /// Adds a typed variable to the DECLARE block.
    pub fn add_declare(&mut self, var: Variable) -> Result<()> {
        self.check_free_name(&var.name)?;
        self.declares.push(DeclareItem::Var(var));
        Ok(())
    }

    /// Appends a verbatim DECLARE block (struct or function body, or any
    /// statement the typed form cannot carry).
    pub fn append_declare_code(&mut self, code: &str) {
        self.declares.push(DeclareItem::Verbatim(code.to_string()));
    }

    /// Adds a per-ray variable to the USERVARS block.
    pub fn add_user_var(&mut self, var: Variable) -> Result<()> {
        self.check_free_name(&var.name)?;
        self.user_vars.push(var);
        Ok(())
    }

    /// Appends one line to the INITIALIZE block.
    pub fn append_initialize(&mut self, line: &str) {
        self.initialize.push(line.to_string());
    }

    /// Appends one line to the FINALLY block.
    pub fn append_finally(&mut self, line: &str) {
        self.finally.push(line.to_string());
    }

    /// Looks up a typed input parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&Variable> {
        self.parameters.iter().find(|v| v.name == name)
    }

    /// All variables of the flat namespace, keyed by name.
    pub(crate) fn scope(&self) -> HashMap<&str, &Variable> {
        let mut scope = HashMap::new();
        for var in &self.parameters {
            scope.insert(var.name.as_str(), var);
        }
        for item in &self.declares {
            if let DeclareItem::Var(var) = item {
                scope.insert(var.name.as_str(), var);
            }
        }
        for var in &self.user_vars {
            scope.insert(var.name.as_str(), var);
        }
        scope
    }

    // ------------------------------------------------------------------
    // Component sequence
    // ------------------------------------------------------------------

    fn component_index(&self, name: &str) -> Option<usize> {
        self.components.iter().position(|c| c.name == name)
    }

    fn require_index(&self, name: &str) -> Result<usize> {
        self.component_index(name)
            .ok_or_else(|| BeamlineError::UnknownComponent {
                name: name.to_string(),
            })
    }

    fn check_free_component_name(&self, name: &str) -> Result<()> {
        if self.component_index(name).is_some() {
            return Err(BeamlineError::DuplicateComponent {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn anchor_index(&self, anchor: &Anchor) -> Result<usize> {
        match anchor {
            Anchor::Append => Ok(self.components.len()),
            Anchor::Before(name) => self
                .component_index(name)
                .ok_or_else(|| BeamlineError::UnknownAnchor { name: name.clone() }),
            Anchor::After(name) => self
                .component_index(name)
                .map(|i| i + 1)
                .ok_or_else(|| BeamlineError::UnknownAnchor { name: name.clone() }),
        }
    }

    /// Creates a component from `schema` and appends it, handing back a
    /// mutable reference for further setup.
    pub fn add_component(&mut self, name: &str, schema: &ComponentSchema) -> Result<&mut Component> {
        self.check_free_component_name(name)?;
        let component = Component::from_schema(name, schema)?;
        self.components.push(component);
        let last = self.components.len() - 1;
        Ok(&mut self.components[last])
    }

    /// Inserts an already-built component at the anchored location. The
    /// sequence is unchanged when the anchor does not resolve.
    pub fn insert_component(&mut self, component: Component, anchor: Anchor) -> Result<()> {
        self.check_free_component_name(&component.name)?;
        let index = self.anchor_index(&anchor)?;
        self.components.insert(index, component);
        Ok(())
    }

    /// Deep-copies an existing component under a new name and appends the
    /// copy. With no name given, `source_N` is derived with the first free
    /// suffix.
    pub fn copy_component(
        &mut self,
        source: &str,
        new_name: Option<&str>,
    ) -> Result<&mut Component> {
        let source_index = self.require_index(source)?;
        let name = match new_name {
            Some(name) => name.to_string(),
            None => self.free_copy_name(source),
        };
        value::check_identifier(&name)?;
        self.check_free_component_name(&name)?;
        let mut copy = self.components[source_index].clone();
        copy.name = name;
        self.components.push(copy);
        let last = self.components.len() - 1;
        Ok(&mut self.components[last])
    }

    fn free_copy_name(&self, base: &str) -> String {
        let mut n = 1;
        loop {
            let candidate = format!("{}_{}", base, n);
            if self.component_index(&candidate).is_none() {
                return candidate;
            }
            n += 1;
        }
    }

    /// Removes a component by name. Dangling references this leaves behind
    /// are caught by [`validate`](Self::validate), not here.
    pub fn remove_component(&mut self, name: &str) -> Result<Component> {
        let index = self.require_index(name)?;
        Ok(self.components.remove(index))
    }

    /// Moves a component to the anchored location. The sequence is restored
    /// unchanged when the anchor does not resolve.
    pub fn move_component(&mut self, name: &str, anchor: Anchor) -> Result<()> {
        let index = self.require_index(name)?;
        let component = self.components.remove(index);
        match self.anchor_index(&anchor) {
            Ok(dest) => {
                self.components.insert(dest, component);
                Ok(())
            }
            Err(err) => {
                self.components.insert(index, component);
                Err(err)
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Component> {
        self.component_index(name).map(|i| &self.components[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Component> {
        self.component_index(name).map(|i| &mut self.components[i])
    }

    /// Component names in sequence order.
    pub fn component_names(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.name.as_str()).collect()
    }

    // ------------------------------------------------------------------
    // Checks
    // ------------------------------------------------------------------

    /// Checks that every relative reference resolves to a component defined
    /// earlier in the sequence.
    pub fn validate(&self) -> Result<()> {
        validate::check_sequence(&self.components)
    }

    /// Re-checks every bound value that is a bare identifier against the
    /// flat instrument namespace: the identifier must name a variable of a
    /// compatible type.
    pub fn check_bindings(&self) -> Result<()> {
        let scope = self.scope();
        for item in &self.declares {
            if let DeclareItem::Var(var) = item {
                var.bind_scope(&scope)?;
            }
        }
        for var in &self.user_vars {
            var.bind_scope(&scope)?;
        }
        for component in &self.components {
            for slot in component.set_params() {
                if let Some(bound) = &slot.value {
                    let owner = format!("{}.{}", component.name, slot.schema.name);
                    value::bind_value(&owner, slot.schema.vtype, bound, &scope)?;
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Run bounds and subset extraction
    // ------------------------------------------------------------------

    /// Restricts a later run to start from the named component.
    pub fn set_run_from(&mut self, name: &str) -> Result<()> {
        self.require_index(name)?;
        self.run_from = Some(name.to_string());
        Ok(())
    }

    /// Restricts a later run to stop before the named component.
    pub fn set_run_to(&mut self, name: &str) -> Result<()> {
        self.require_index(name)?;
        self.run_to = Some(name.to_string());
        Ok(())
    }

    /// Clears both run bounds.
    pub fn reset_run(&mut self) {
        self.run_from = None;
        self.run_to = None;
    }

    /// Extracts the contiguous slice selected by the run bounds as a new
    /// instrument, with synthetic boundary components standing in for the
    /// removed portions. Both the slice and the remainder are re-validated.
    pub fn extract_subset(&self) -> Result<Instrument> {
        subset::extract(self)
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Serializes the full model as JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Restores an instrument from its JSON form.
    pub fn from_json(text: &str) -> Result<Instrument> {
        Ok(serde_json::from_str(text)?)
    }
}
