//! A named instance of a component kind.
//!
//! Instances are created from a [`ComponentSchema`]: every parameter the
//! kind accepts gets a slot up front, and the slot set never grows. Setting
//! a name outside the schema is rejected at the call site, so a typo cannot
//! ride along silently until code generation.

use serde::{Deserialize, Serialize};

use crate::error::{BeamlineError, Result};
use crate::schema::{ComponentSchema, ParamSchema};
use crate::value::{self, Value};

use super::types::{Placement, Reference, Split};

/// Column budget before a parameter list is wrapped.
pub(crate) const LINE_BUDGET: usize = 85;

/// A parameter slot: the schema entry plus the value bound to it, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSlot {
    pub schema: ParamSchema,
    pub value: Option<Value>,
}

impl ParamSlot {
    fn new(schema: &ParamSchema) -> Self {
        ParamSlot {
            schema: schema.clone(),
            value: None,
        }
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    /// The value code generation would use: the bound value, else the
    /// schema default.
    pub fn effective(&self) -> Option<&Value> {
        self.value.as_ref().or(self.schema.default.as_ref())
    }
}

/// A named instance of a component kind in the instrument sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    pub kind: String,
    params: Vec<ParamSlot>,
    pub position: Placement,
    pub rotation: Option<Placement>,
    /// Guard expression, written as `WHEN (...)`.
    pub when: Option<String>,
    pub group: Option<String>,
    /// Jump directive after the `JUMP` keyword, kept opaque.
    pub jump: Option<String>,
    pub split: Split,
    /// Verbatim lines of the `EXTEND %{ ... %}` block.
    pub extend: Vec<String>,
    /// Raw lines emitted before and after the component statement.
    pub pre_code: Vec<String>,
    pub post_code: Vec<String>,
    pub comment: Option<String>,
}

impl Component {
    /// Creates an instance of `schema`'s kind with every parameter slot
    /// registered and unset.
    pub fn from_schema(name: &str, schema: &ComponentSchema) -> Result<Self> {
        value::check_identifier(name)?;
        Ok(Component {
            name: name.to_string(),
            kind: schema.kind.clone(),
            params: schema.params.iter().map(ParamSlot::new).collect(),
            position: Placement::origin(),
            rotation: None,
            when: None,
            group: None,
            jump: None,
            split: Split::Off,
            extend: Vec::new(),
            pre_code: Vec::new(),
            post_code: Vec::new(),
            comment: None,
        })
    }

    pub fn set_position<C: std::fmt::Display>(&mut self, coords: [C; 3], reference: Reference) {
        self.position = Placement::new(coords, reference);
    }

    pub fn set_rotation<C: std::fmt::Display>(&mut self, coords: [C; 3], reference: Reference) {
        self.rotation = Some(Placement::new(coords, reference));
    }

    /// Sets the guard expression, without the surrounding `WHEN (...)`.
    pub fn set_when(&mut self, expr: &str) {
        self.when = Some(expr.trim().to_string());
    }

    pub fn set_group(&mut self, group: &str) {
        self.group = Some(group.to_string());
    }

    pub fn set_jump(&mut self, jump: &str) {
        self.jump = Some(jump.to_string());
    }

    pub fn set_split(&mut self, split: Split) {
        self.split = split;
    }

    pub fn set_comment(&mut self, comment: &str) {
        self.comment = Some(comment.to_string());
    }

    pub fn append_extend(&mut self, line: &str) {
        self.extend.push(line.to_string());
    }

    /// Binds one parameter value, checked against the slot's declared type.
    /// Names outside the kind's schema fail immediately.
    pub fn set_parameter(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let Some(idx) = self.params.iter().position(|s| s.schema.name == name) else {
            return Err(BeamlineError::UnknownParameter {
                component: self.name.clone(),
                kind: self.kind.clone(),
                parameter: name.to_string(),
            });
        };
        let value = value.into();
        let owner = format!("{}.{}", self.name, name);
        value::check_value(&owner, self.params[idx].schema.vtype, None, &value)?;
        self.params[idx].value = Some(value);
        Ok(())
    }

    /// Binds several parameters in order; stops at the first failure.
    pub fn set_parameters(&mut self, pairs: &[(&str, Value)]) -> Result<()> {
        for (name, value) in pairs {
            self.set_parameter(name, value.clone())?;
        }
        Ok(())
    }

    /// The bound value of a parameter, if any.
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.params
            .iter()
            .find(|s| s.schema.name == name)
            .and_then(|s| s.value.as_ref())
    }

    /// All parameter slots in schema order.
    pub fn params(&self) -> &[ParamSlot] {
        &self.params
    }

    /// Slots carrying an explicitly bound value, in schema order.
    pub fn set_params(&self) -> impl Iterator<Item = &ParamSlot> {
        self.params.iter().filter(|s| s.is_set())
    }

    /// Appends the component's DSL statement block to `out`.
    ///
    /// Statement order is fixed: pre-code, comment, `SPLIT`/`COMPONENT`
    /// head with the parameter list, `WHEN`, `AT`, `ROTATED`, `GROUP`,
    /// `EXTEND`, `JUMP`, post-code. A required parameter with no bound
    /// value makes this fail.
    pub fn write(&self, out: &mut String) -> Result<()> {
        for slot in &self.params {
            if slot.schema.required() && !slot.is_set() {
                return Err(BeamlineError::MissingRequiredParameter {
                    component: self.name.clone(),
                    parameter: slot.schema.name.clone(),
                });
            }
        }

        for line in &self.pre_code {
            out.push_str(line);
            out.push('\n');
        }
        if let Some(comment) = &self.comment {
            out.push_str("// ");
            out.push_str(comment);
            out.push('\n');
        }

        let split = match &self.split {
            Split::Off => String::new(),
            Split::Bare => "SPLIT ".to_string(),
            Split::Factor(n) => format!("SPLIT {} ", n),
        };
        let assignments: Vec<String> = self
            .params
            .iter()
            .filter_map(|s| {
                s.value
                    .as_ref()
                    .map(|v| format!("{} = {}", s.schema.name, v))
            })
            .collect();
        let opening = format!("{}COMPONENT {} = {}(", split, self.name, self.kind);
        let single = format!("{}{})", opening, assignments.join(", "));
        if single.len() <= LINE_BUDGET {
            out.push_str(&single);
            out.push('\n');
        } else {
            // Two parameters per continuation line once the budget is blown.
            out.push_str(&opening);
            out.push('\n');
            let chunks: Vec<&[String]> = assignments.chunks(2).collect();
            for (i, chunk) in chunks.iter().enumerate() {
                out.push_str("  ");
                out.push_str(&chunk.join(", "));
                if i + 1 < chunks.len() {
                    out.push_str(",\n");
                } else {
                    out.push_str(")\n");
                }
            }
        }

        if let Some(when) = &self.when {
            out.push_str(&format!("WHEN ({})\n", when));
        }
        out.push_str(&format!(
            "AT ({}) {}\n",
            self.position.coords_text(),
            self.position.reference
        ));
        if let Some(rotation) = &self.rotation {
            out.push_str(&format!(
                "ROTATED ({}) {}\n",
                rotation.coords_text(),
                rotation.reference
            ));
        }
        if let Some(group) = &self.group {
            out.push_str(&format!("GROUP {}\n", group));
        }
        if !self.extend.is_empty() {
            out.push_str("EXTEND %{\n");
            for line in &self.extend {
                out.push_str(line);
                out.push('\n');
            }
            out.push_str("%}\n");
        }
        if let Some(jump) = &self.jump {
            out.push_str(&format!("JUMP {}\n", jump));
        }
        for line in &self.post_code {
            out.push_str(line);
            out.push('\n');
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Catalog, SchemaProvider};

    fn component(name: &str, kind: &str) -> Component {
        let catalog = Catalog::builtin();
        Component::from_schema(name, catalog.require(kind).unwrap()).unwrap()
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let mut src = component("src", "Source");
        let err = src.set_parameter("radius_", Value::Double(0.2)).unwrap_err();
        assert!(matches!(err, BeamlineError::UnknownParameter { .. }));
        // The typo did not get recorded anywhere.
        assert!(src.set_params().next().is_none());
    }

    #[test]
    fn test_parameter_type_checked() {
        let mut det = component("det", "Monitor");
        assert!(det
            .set_parameter("filename", Value::Str("det.dat".into()))
            .is_ok());
        let err = det
            .set_parameter("restore_neutron", Value::Str("yes".into()))
            .unwrap_err();
        assert!(matches!(err, BeamlineError::IncompatibleValue { .. }));
    }

    #[test]
    fn test_write_minimal_component() {
        let mut src = component("src", "Source");
        src.set_position([0, 0, 0], Reference::Absolute);
        let mut out = String::new();
        src.write(&mut out).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines, ["COMPONENT src = Source()", "AT (0,0,0) ABSOLUTE"]);
    }

    #[test]
    fn test_write_requires_required_parameters() {
        let mut guide = component("g", "Guide");
        guide.set_parameter("w1", Value::Double(0.05)).unwrap();
        guide.set_parameter("h1", Value::Double(0.05)).unwrap();
        let mut out = String::new();
        let err = guide.write(&mut out).unwrap_err();
        assert!(matches!(
            err,
            BeamlineError::MissingRequiredParameter { ref parameter, .. } if parameter == "l"
        ));
        guide.set_parameter("l", Value::Double(2.0)).unwrap();
        assert!(guide.write(&mut out).is_ok());
    }

    #[test]
    fn test_write_full_statement_order() {
        let mut det = component("det", "Monitor");
        det.set_comment("banana detector");
        det.set_split(Split::Factor("10".into()));
        det.set_parameter("filename", Value::Str("det.dat".into()))
            .unwrap();
        det.set_when("theta > 0");
        det.set_position([0, 0, 1], Reference::Named("src".into()));
        det.set_rotation([0, 90, 0], Reference::Previous);
        det.set_group("detectors");
        det.append_extend("if (SCATTERED) flag = 1;");
        det.set_jump("sample_arm");
        let mut out = String::new();
        det.write(&mut out).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            [
                "// banana detector",
                "SPLIT 10 COMPONENT det = Monitor(filename = \"det.dat\")",
                "WHEN (theta > 0)",
                "AT (0,0,1) RELATIVE src",
                "ROTATED (0,90,0) RELATIVE PREVIOUS",
                "GROUP detectors",
                "EXTEND %{",
                "if (SCATTERED) flag = 1;",
                "%}",
                "JUMP sample_arm",
            ]
        );
    }

    #[test]
    fn test_write_wraps_long_parameter_lists() {
        let mut guide = component("feeder", "Guide");
        guide
            .set_parameters(&[
                ("w1", Value::Double(0.05)),
                ("h1", Value::Double(0.08)),
                ("w2", Value::Double(0.04)),
                ("h2", Value::Double(0.07)),
                ("l", Value::Double(12.5)),
                ("m", Value::Double(2.5)),
                ("R0", Value::Double(0.995)),
                ("Qc", Value::Double(0.0219)),
            ])
            .unwrap();
        let mut out = String::new();
        guide.write(&mut out).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "COMPONENT feeder = Guide(");
        assert_eq!(lines[1], "  w1 = 0.05, h1 = 0.08,");
        assert!(lines.iter().any(|l| l.ends_with(")")));
        assert!(lines.iter().all(|l| l.len() <= LINE_BUDGET));
    }
}
