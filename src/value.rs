//! Typed values shared by instrument parameters, declared variables and
//! component parameter slots.
//!
//! Values keep the distinction between numbers parsed from source text and
//! expressions that are only meaningful to the generated simulation code.
//! Expressions are carried verbatim; a bare identifier inside one can be
//! checked against the instrument scope before code generation.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BeamlineError, Result};

/// Words the instrument language claims for itself. Variables and components
/// may not use these as names.
pub const RESERVED_WORDS: &[&str] = &[
    "ABSOLUTE",
    "AT",
    "COMPONENT",
    "COPY",
    "DECLARE",
    "DEFINE",
    "END",
    "EXTEND",
    "FINALLY",
    "GROUP",
    "INITIALIZE",
    "INSTRUMENT",
    "JUMP",
    "PREVIOUS",
    "RELATIVE",
    "ROTATED",
    "SPLIT",
    "TRACE",
    "USERVARS",
    "WHEN",
    "char",
    "double",
    "int",
    "string",
];

/// Returns true if `name` is a legal C-style identifier.
pub fn is_legal_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Checks a name for identifier legality and reserved-word collisions.
pub fn check_identifier(name: &str) -> Result<()> {
    if !is_legal_identifier(name) {
        return Err(BeamlineError::illegal_name(
            name,
            "not a legal C identifier",
        ));
    }
    if RESERVED_WORDS.contains(&name) {
        return Err(BeamlineError::illegal_name(name, "reserved word"));
    }
    Ok(())
}

/// Heuristic used when deciding whether a non-numeric token is arithmetic
/// rather than a plain identifier: any of `+ - ( )` present, or more than one
/// non-empty segment when split on `*`.
pub fn is_expression(text: &str) -> bool {
    if text.contains(['+', '-', '(', ')']) {
        return true;
    }
    text.split('*').filter(|s| !s.trim().is_empty()).count() > 1
}

// ============================================================================
// Declared types
// ============================================================================

/// The declared type of an instrument parameter, variable or component
/// parameter slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    Double,
    Int,
    String,
    Char,
}

impl ValueType {
    /// Parses a type keyword as written in instrument source.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "double" => Some(ValueType::Double),
            "int" => Some(ValueType::Int),
            "string" => Some(ValueType::String),
            "char" => Some(ValueType::Char),
            _ => None,
        }
    }

    /// The keyword used for this type in instrument source.
    pub fn keyword(&self) -> &'static str {
        match self {
            ValueType::Double => "double",
            ValueType::Int => "int",
            ValueType::String => "string",
            ValueType::Char => "char",
        }
    }

    /// Whether a slot of this type may be fed from a variable of type `other`.
    pub fn accepts_var(&self, other: ValueType) -> bool {
        match self {
            ValueType::Double => matches!(other, ValueType::Double | ValueType::Int),
            ValueType::Int => other == ValueType::Int,
            ValueType::String => matches!(other, ValueType::String | ValueType::Char),
            ValueType::Char => matches!(other, ValueType::Char | ValueType::String),
        }
    }

    /// The printf conversion used when emitting a value of this type.
    pub fn format_directive(&self) -> &'static str {
        match self {
            ValueType::Double => "%g",
            ValueType::Int => "%i",
            ValueType::String | ValueType::Char => "%s",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

// ============================================================================
// Values
// ============================================================================

/// A value bound to a typed slot.
///
/// `Str` holds the unquoted payload; quotes are re-applied when rendering.
/// `Expr` is any text that did not parse as a literal and is passed through
/// untouched to the generated code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Double(f64),
    Int(i64),
    Str(String),
    Expr(String),
    List(Vec<Value>),
}

impl Value {
    /// Classifies a source token against a declared type. Never fails: text
    /// that does not parse as a literal of `vtype` is kept as an expression.
    pub fn from_dsl(text: &str, vtype: ValueType) -> Value {
        let t = text.trim();
        if let Some(inner) = t.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
            if !inner.contains('"') {
                return Value::Str(inner.to_string());
            }
        }
        if let Some(body) = t.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            let items = crate::dsl::text::split_top_level(body, ',')
                .into_iter()
                .map(|item| Value::from_dsl(&item, vtype))
                .collect();
            return Value::List(items);
        }
        match vtype {
            ValueType::Int => {
                if let Ok(v) = t.parse::<i64>() {
                    return Value::Int(v);
                }
            }
            ValueType::Double => {
                if let Ok(v) = t.parse::<i64>() {
                    return Value::Int(v);
                }
                if let Ok(v) = t.parse::<f64>() {
                    return Value::Double(v);
                }
            }
            ValueType::String | ValueType::Char => {}
        }
        Value::Expr(t.to_string())
    }

    /// If the value is a lone identifier, returns it for scope checking.
    /// Literals and arithmetic expressions return `None`.
    pub fn bare_identifier(&self) -> Option<&str> {
        match self {
            Value::Expr(e) => {
                let t = e.trim();
                if is_legal_identifier(t) && !is_expression(t) {
                    Some(t)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// A short name for the value's shape, used in error messages.
    pub fn shape(&self) -> &'static str {
        match self {
            Value::Double(_) => "double",
            Value::Int(_) => "int",
            Value::Str(_) => "string",
            Value::Expr(_) => "expression",
            Value::List(_) => "list",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // The {:?} form keeps ".0" on whole values, so a written double
            // reads back as a double rather than an int.
            Value::Double(v) => write!(f, "{:?}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Expr(e) => f.write_str(e),
            Value::List(items) => {
                f.write_str("{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Expr(v.to_string())
    }
}

// ============================================================================
// Variables
// ============================================================================

/// Declared length of an array variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArrayLen {
    /// `name[]`, sized by its initializer.
    Auto,
    /// `name[n]`.
    Fixed(u32),
}

impl fmt::Display for ArrayLen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayLen::Auto => f.write_str("[]"),
            ArrayLen::Fixed(n) => write!(f, "[{}]", n),
        }
    }
}

/// An instrument parameter, DECLARE variable or USERVARS variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub vtype: ValueType,
    pub name: String,
    pub value: Option<Value>,
    pub array: Option<ArrayLen>,
    pub unit: Option<String>,
    pub comment: Option<String>,
}

impl Variable {
    /// Creates an unbound variable, rejecting illegal or reserved names.
    pub fn new(vtype: ValueType, name: &str) -> Result<Self> {
        check_identifier(name)?;
        Ok(Variable {
            vtype,
            name: name.to_string(),
            value: None,
            array: None,
            unit: None,
            comment: None,
        })
    }

    /// Binds an initial value, checking it against the declared type.
    pub fn with_value(mut self, value: impl Into<Value>) -> Result<Self> {
        self.set_value(value)?;
        Ok(self)
    }

    /// Marks the variable as an array of the given length.
    pub fn with_array(mut self, len: ArrayLen) -> Result<Self> {
        self.array = Some(len);
        if let Some(value) = &self.value {
            check_value(&self.name, self.vtype, self.array, value)?;
        }
        Ok(self)
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    /// Rebinds the value, checking it against the declared type and array
    /// length.
    pub fn set_value(&mut self, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        check_value(&self.name, self.vtype, self.array, &value)?;
        self.value = Some(value);
        Ok(())
    }

    /// Re-validates the bound value against the variables visible at binding
    /// time. A value that is a bare identifier must name a variable of a
    /// compatible type; literals and arithmetic expressions pass untouched.
    pub fn bind_scope(&self, scope: &HashMap<&str, &Variable>) -> Result<()> {
        match &self.value {
            Some(value) => bind_value(&self.name, self.vtype, value, scope),
            None => Ok(()),
        }
    }
}

/// Checks a value against a declared type and optional array length.
pub(crate) fn check_value(
    name: &str,
    vtype: ValueType,
    array: Option<ArrayLen>,
    value: &Value,
) -> Result<()> {
    match value {
        Value::List(items) => {
            match array {
                None => {
                    return Err(BeamlineError::IncompatibleValue {
                        name: name.to_string(),
                        vtype: vtype.to_string(),
                        value: value.to_string(),
                    })
                }
                Some(ArrayLen::Fixed(n)) if items.len() != n as usize => {
                    return Err(BeamlineError::ArrayLengthMismatch {
                        name: name.to_string(),
                        declared: n,
                        actual: items.len(),
                    })
                }
                Some(_) => {}
            }
            for item in items {
                check_scalar(name, vtype, item)?;
            }
            Ok(())
        }
        scalar => {
            // An array variable may still take a single expression, or a
            // string literal when it is a char buffer.
            if array.is_some() {
                let ok = matches!(scalar, Value::Expr(_))
                    || (vtype == ValueType::Char && matches!(scalar, Value::Str(_)));
                if ok {
                    return Ok(());
                }
                return Err(BeamlineError::IncompatibleValue {
                    name: name.to_string(),
                    vtype: format!("{}[]", vtype),
                    value: scalar.to_string(),
                });
            }
            check_scalar(name, vtype, scalar)
        }
    }
}

fn check_scalar(name: &str, vtype: ValueType, value: &Value) -> Result<()> {
    let ok = match vtype {
        ValueType::Double => matches!(value, Value::Double(_) | Value::Int(_) | Value::Expr(_)),
        ValueType::Int => matches!(value, Value::Int(_) | Value::Expr(_)),
        ValueType::String => matches!(value, Value::Str(_) | Value::Expr(_)),
        ValueType::Char => matches!(value, Value::Str(_) | Value::Int(_) | Value::Expr(_)),
    };
    if ok {
        Ok(())
    } else {
        Err(BeamlineError::IncompatibleValue {
            name: name.to_string(),
            vtype: vtype.to_string(),
            value: value.to_string(),
        })
    }
}

/// Scope check shared by variables and component parameter slots. `owner` is
/// a display path such as `det.filename` or the variable name.
pub(crate) fn bind_value(
    owner: &str,
    expected: ValueType,
    value: &Value,
    scope: &HashMap<&str, &Variable>,
) -> Result<()> {
    if let Value::List(items) = value {
        for item in items {
            bind_value(owner, expected, item, scope)?;
        }
        return Ok(());
    }
    let Some(ident) = value.bare_identifier() else {
        return Ok(());
    };
    match scope.get(ident) {
        None => Err(BeamlineError::UnknownVariable {
            owner: owner.to_string(),
            target: ident.to_string(),
        }),
        Some(var) if expected.accepts_var(var.vtype) => Ok(()),
        Some(var) => Err(BeamlineError::IncompatibleReference {
            owner: owner.to_string(),
            target: ident.to_string(),
            target_type: var.vtype.to_string(),
            expected: expected.to_string(),
        }),
    }
}
