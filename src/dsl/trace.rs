//! The TRACE section sub-parser.
//!
//! Component statements span multiple lines: the `COMPONENT name = kind(...)`
//! call is accumulated until its parentheses balance (quote-aware, so a `(`
//! inside a filename does not count), then the decoration clauses `WHEN`,
//! `AT`, `ROTATED`, `GROUP`, `EXTEND` and `JUMP` attach to it one by one.
//! `COPY` calls clone an earlier component before overrides are applied.

use tracing::warn;

use crate::error::{BeamlineError, Result};
use crate::instrument::{Anchor, Component, Instrument, Placement, Reference, Split};
use crate::schema::SchemaProvider;
use crate::value::Value;

use super::text;

/// Keywords that close the TRACE section; the line is handed back to the
/// outer reader.
const SECTION_ENDERS: &[&str] = &["FINALLY", "END", "DECLARE", "INITIALIZE", "USERVARS"];

/// Outcome of feeding one line to the trace reader.
pub(super) enum TraceStep {
    Consumed,
    /// A section keyword was seen; the caller leaves TRACE mode and
    /// processes the same line again.
    Exit,
}

enum State {
    /// Between statements; decorations attach to the current component.
    Idle,
    /// Accumulating a COMPONENT call until its parentheses balance.
    Call {
        buf: String,
        depth: i32,
        quote: bool,
        seen_paren: bool,
        start_line: usize,
    },
    /// Accumulating a multi-line WHEN/AT/ROTATED clause.
    Clause {
        buf: String,
        depth: i32,
        quote: bool,
        start_line: usize,
    },
    /// Inside an `EXTEND %{ ... %}` block.
    Extend { start_line: usize },
}

/// How the statement named its component.
enum NameSpec {
    Plain(String),
    /// `COMPONENT COPY(base) = ...`: derive a free name from `base`.
    Auto,
}

pub(super) struct TraceReader {
    state: State,
    /// `%include` and stray lines waiting for the next component's pre-code.
    pending_pre: Vec<String>,
    /// A `//` line waiting to become the next component's comment.
    pending_comment: Option<String>,
    /// Name of the component currently receiving decorations.
    current: Option<String>,
}

impl TraceReader {
    pub fn new() -> Self {
        TraceReader {
            state: State::Idle,
            pending_pre: Vec::new(),
            pending_comment: None,
            current: None,
        }
    }

    /// Feeds one raw line.
    pub fn step(
        &mut self,
        raw: &str,
        line_no: usize,
        instrument: &mut Instrument,
        schemas: &dyn SchemaProvider,
    ) -> Result<TraceStep> {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Idle => self.step_idle(raw, line_no, instrument, schemas),
            State::Call {
                mut buf,
                mut depth,
                mut quote,
                mut seen_paren,
                start_line,
            } => {
                let trimmed = raw.trim();
                if let Some((word, _)) = text::next_word(trimmed) {
                    if SECTION_ENDERS.contains(&word) {
                        return Err(BeamlineError::UnterminatedBlock {
                            block: "COMPONENT".to_string(),
                            line: start_line,
                        });
                    }
                }
                let (code, _) = text::strip_line_comment(trimmed);
                if !buf.is_empty() && !code.is_empty() {
                    buf.push(' ');
                }
                buf.push_str(code);
                depth += text::paren_depth_delta(code, &mut quote);
                seen_paren = seen_paren || buf.contains('(');
                if seen_paren && depth == 0 {
                    self.finalize_call(&buf, start_line, instrument, schemas)?;
                } else {
                    self.state = State::Call {
                        buf,
                        depth,
                        quote,
                        seen_paren,
                        start_line,
                    };
                }
                Ok(TraceStep::Consumed)
            }
            State::Clause {
                mut buf,
                mut depth,
                mut quote,
                start_line,
            } => {
                let trimmed = raw.trim();
                if let Some((word, _)) = text::next_word(trimmed) {
                    if SECTION_ENDERS.contains(&word) {
                        return Err(BeamlineError::UnterminatedBlock {
                            block: "clause".to_string(),
                            line: start_line,
                        });
                    }
                }
                let (code, _) = text::strip_line_comment(trimmed);
                if !code.is_empty() {
                    buf.push(' ');
                    buf.push_str(code);
                }
                depth += text::paren_depth_delta(code, &mut quote);
                if depth <= 0 {
                    self.dispatch(&buf, line_no, instrument)?;
                } else {
                    self.state = State::Clause {
                        buf,
                        depth,
                        quote,
                        start_line,
                    };
                }
                Ok(TraceStep::Consumed)
            }
            State::Extend { start_line } => {
                let trimmed = raw.trim();
                if let Some(rest) = trimmed.strip_prefix("%}") {
                    let rest = rest.trim();
                    if !rest.is_empty() {
                        self.dispatch(rest, line_no, instrument)?;
                    }
                } else {
                    self.append_extend_line(raw, line_no, instrument)?;
                    self.state = State::Extend { start_line };
                }
                Ok(TraceStep::Consumed)
            }
        }
    }

    /// Flushes end-of-section state; errors on half-read statements.
    pub fn finish(&mut self, instrument: &mut Instrument) -> Result<()> {
        match &self.state {
            State::Idle => {}
            State::Call { start_line, .. } => {
                return Err(BeamlineError::UnterminatedBlock {
                    block: "COMPONENT".to_string(),
                    line: *start_line,
                });
            }
            State::Clause { start_line, .. } => {
                return Err(BeamlineError::UnterminatedBlock {
                    block: "clause".to_string(),
                    line: *start_line,
                });
            }
            State::Extend { start_line } => {
                return Err(BeamlineError::UnterminatedBlock {
                    block: "EXTEND".to_string(),
                    line: *start_line,
                });
            }
        }
        if !self.pending_pre.is_empty() {
            let lines = std::mem::take(&mut self.pending_pre);
            match self.current.as_ref().and_then(|n| instrument.get_mut(n)) {
                Some(component) => {
                    warn!("trailing lines after last component kept as its post-code");
                    component.post_code.extend(lines);
                }
                None => warn!("dropping trailing lines in empty TRACE section"),
            }
        }
        if self.pending_comment.take().is_some() {
            warn!("dropping comment with no following component");
        }
        Ok(())
    }

    fn step_idle(
        &mut self,
        raw: &str,
        line_no: usize,
        instrument: &mut Instrument,
        schemas: &dyn SchemaProvider,
    ) -> Result<TraceStep> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(TraceStep::Consumed);
        }
        if let Some(comment) = trimmed.strip_prefix("//") {
            self.pending_comment = Some(comment.trim().to_string());
            return Ok(TraceStep::Consumed);
        }
        let Some((word, _)) = text::next_word(trimmed) else {
            return Ok(TraceStep::Consumed);
        };
        if SECTION_ENDERS.contains(&word) {
            return Ok(TraceStep::Exit);
        }
        if word == "COMPONENT" || word == "SPLIT" {
            let (code, _) = text::strip_line_comment(trimmed);
            let mut quote = false;
            let depth = text::paren_depth_delta(code, &mut quote);
            let seen_paren = code.contains('(');
            if seen_paren && depth == 0 {
                self.finalize_call(code, line_no, instrument, schemas)?;
            } else {
                self.state = State::Call {
                    buf: code.to_string(),
                    depth,
                    quote,
                    seen_paren,
                    start_line: line_no,
                };
            }
            return Ok(TraceStep::Consumed);
        }
        if trimmed.starts_with("%include") || trimmed.starts_with("#include") {
            return self.keep_opaque(trimmed, instrument);
        }
        if matches!(word, "WHEN" | "AT" | "ROTATED" | "GROUP" | "EXTEND" | "JUMP") {
            let (code, _) = text::strip_line_comment(trimmed);
            let mut quote = false;
            let depth = text::paren_depth_delta(code, &mut quote);
            if depth > 0 {
                self.state = State::Clause {
                    buf: code.to_string(),
                    depth,
                    quote,
                    start_line: line_no,
                };
            } else {
                self.dispatch(code, line_no, instrument)?;
            }
            return Ok(TraceStep::Consumed);
        }
        warn!(line = line_no, "unrecognized TRACE line kept verbatim");
        self.keep_opaque(trimmed, instrument)
    }

    /// Unrecognized text: post-code of the current component, or pre-code
    /// of the next one when no component has been read yet.
    fn keep_opaque(&mut self, line: &str, instrument: &mut Instrument) -> Result<TraceStep> {
        match self.current.as_ref().and_then(|n| instrument.get_mut(n)) {
            Some(component) => component.post_code.push(line.to_string()),
            None => self.pending_pre.push(line.to_string()),
        }
        Ok(TraceStep::Consumed)
    }

    fn append_extend_line(
        &mut self,
        raw: &str,
        line_no: usize,
        instrument: &mut Instrument,
    ) -> Result<()> {
        match self.current.as_ref().and_then(|n| instrument.get_mut(n)) {
            Some(component) => {
                component.append_extend(raw);
                Ok(())
            }
            None => Err(BeamlineError::parse(line_no, "EXTEND outside a component")),
        }
    }

    // ------------------------------------------------------------------
    // Component calls
    // ------------------------------------------------------------------

    fn finalize_call(
        &mut self,
        buf: &str,
        line: usize,
        instrument: &mut Instrument,
        schemas: &dyn SchemaProvider,
    ) -> Result<()> {
        let Some((left, right)) = text::split_once_top_level(buf, '=') else {
            return Err(BeamlineError::parse(
                line,
                format!("malformed component statement: {}", buf),
            ));
        };
        let (split, name) = parse_statement_head(&left, line)?;

        let Some(open) = right.find('(') else {
            return Err(BeamlineError::parse(
                line,
                "component call without a parameter list",
            ));
        };
        let kind = right[..open].trim().to_string();
        let Some((group1, after_call)) = text::extract_group(&right[open..]) else {
            return Err(BeamlineError::parse(line, "unbalanced component call"));
        };

        let leftover = if kind == "COPY" {
            self.finalize_copy(&name, split, &group1, &after_call, line, instrument)?
        } else {
            self.finalize_new(&name, split, &kind, &group1, line, instrument, schemas)?;
            after_call
        };
        let leftover = leftover.trim();
        if !leftover.is_empty() {
            self.dispatch(leftover, line, instrument)?;
        }
        Ok(())
    }

    fn finalize_new(
        &mut self,
        name: &NameSpec,
        split: Split,
        kind: &str,
        params: &str,
        line: usize,
        instrument: &mut Instrument,
        schemas: &dyn SchemaProvider,
    ) -> Result<()> {
        let NameSpec::Plain(name) = name else {
            return Err(BeamlineError::parse(
                line,
                "COPY in the name slot requires COPY on the right-hand side",
            ));
        };
        let schema = schemas.require(kind)?;
        let mut component = Component::from_schema(name, schema)?;
        component.split = split;
        component.pre_code = std::mem::take(&mut self.pending_pre);
        component.comment = self.pending_comment.take();
        for (pname, vtext) in parse_call_params(params, line)? {
            let value = match schema.get(&pname) {
                Some(spec) => Value::from_dsl(&vtext, spec.vtype),
                // Let the slot lookup produce the schema error.
                None => Value::Expr(vtext),
            };
            component.set_parameter(&pname, value)?;
        }
        instrument.insert_component(component, Anchor::Append)?;
        self.current = Some(name.clone());
        Ok(())
    }

    /// Resolves a `COPY(source)` call; returns the text left after the
    /// optional override parameter group.
    fn finalize_copy(
        &mut self,
        name: &NameSpec,
        split: Split,
        source: &str,
        after_call: &str,
        line: usize,
        instrument: &mut Instrument,
    ) -> Result<String> {
        let source = match source.trim() {
            "PREVIOUS" => match instrument.components.last() {
                Some(component) => component.name.clone(),
                None => {
                    return Err(BeamlineError::parse(line, "COPY(PREVIOUS) with no components"))
                }
            },
            other => other.to_string(),
        };
        let (overrides, leftover) = if after_call.trim_start().starts_with('(') {
            match text::extract_group(after_call) {
                Some((inner, rest)) => (inner, rest),
                None => return Err(BeamlineError::parse(line, "unbalanced COPY parameter list")),
            }
        } else {
            (String::new(), after_call.to_string())
        };

        let new_name = match name {
            NameSpec::Plain(n) => Some(n.as_str()),
            NameSpec::Auto => None,
        };
        let pre = std::mem::take(&mut self.pending_pre);
        let comment = self.pending_comment.take();
        let component = instrument.copy_component(&source, new_name)?;
        component.split = split;
        component.pre_code = pre;
        component.comment = comment;
        // Post-code belongs to the statement, not the template.
        component.post_code.clear();
        let slot_types: Vec<(String, crate::value::ValueType)> = component
            .params()
            .iter()
            .map(|s| (s.schema.name.clone(), s.schema.vtype))
            .collect();
        let copy_name = component.name.clone();
        for (pname, vtext) in parse_call_params(&overrides, line)? {
            let value = match slot_types.iter().find(|(n, _)| *n == pname) {
                Some((_, vtype)) => Value::from_dsl(&vtext, *vtype),
                None => Value::Expr(vtext),
            };
            // Re-borrow per parameter; the copy was just inserted.
            match instrument.get_mut(&copy_name) {
                Some(component) => component.set_parameter(&pname, value)?,
                None => return Err(BeamlineError::parse(line, "lost track of COPY target")),
            }
        }
        self.current = Some(copy_name);
        Ok(leftover)
    }

    // ------------------------------------------------------------------
    // Decorations
    // ------------------------------------------------------------------

    /// Applies one or more decoration clauses from a single balanced text.
    fn dispatch(&mut self, clauses: &str, line: usize, instrument: &mut Instrument) -> Result<()> {
        let Some(name) = self.current.clone() else {
            warn!(line, "decoration before any component kept verbatim");
            self.pending_pre.push(clauses.to_string());
            return Ok(());
        };
        let mut cursor = clauses.trim().to_string();
        while !cursor.is_empty() {
            let Some((word, tail)) = text::next_word(&cursor) else {
                break;
            };
            let tail = tail.to_string();
            let component = match instrument.get_mut(&name) {
                Some(component) => component,
                None => return Err(BeamlineError::parse(line, "lost track of component")),
            };
            match word {
                "WHEN" => {
                    if tail.trim_start().starts_with('(') {
                        let Some((inner, rest)) = text::extract_group(&tail) else {
                            return Err(BeamlineError::parse(line, "unbalanced WHEN condition"));
                        };
                        component.set_when(inner.trim());
                        cursor = rest.trim().to_string();
                    } else {
                        let Some((cond, rest)) = text::next_word(&tail) else {
                            return Err(BeamlineError::parse(line, "WHEN without a condition"));
                        };
                        component.set_when(cond);
                        cursor = rest.to_string();
                    }
                }
                "AT" | "ROTATED" => {
                    let (placement, rest) = parse_placement(&name, word, &tail, line)?;
                    if word == "AT" {
                        component.position = placement;
                    } else {
                        component.rotation = Some(placement);
                    }
                    cursor = rest;
                }
                "GROUP" => {
                    let Some((group, rest)) = text::next_word(&tail) else {
                        return Err(BeamlineError::parse(line, "GROUP without a name"));
                    };
                    component.set_group(group);
                    cursor = rest.to_string();
                }
                "JUMP" => {
                    if tail.is_empty() {
                        return Err(BeamlineError::parse(line, "JUMP without a target"));
                    }
                    component.set_jump(tail.trim());
                    cursor.clear();
                }
                "EXTEND" => {
                    let t = tail.trim_start();
                    let Some(body) = t.strip_prefix("%{") else {
                        return Err(BeamlineError::parse(line, "EXTEND without %{"));
                    };
                    if let Some(end) = body.find("%}") {
                        let inner = body[..end].trim();
                        if !inner.is_empty() {
                            component.append_extend(inner);
                        }
                        cursor = body[end + 2..].trim().to_string();
                    } else {
                        let opening = body.trim();
                        if !opening.is_empty() {
                            component.append_extend(opening);
                        }
                        self.state = State::Extend { start_line: line };
                        return Ok(());
                    }
                }
                _ => {
                    // Opaque trailing text rides along as post-code.
                    component.post_code.push(cursor.clone());
                    break;
                }
            }
        }
        Ok(())
    }
}

/// Parses `[SPLIT [n]] COMPONENT <name>` from the left of the `=`.
fn parse_statement_head(left: &str, line: usize) -> Result<(Split, NameSpec)> {
    let mut split = Split::Off;
    let mut rest = left.trim();
    let Some((first, tail)) = text::next_word(rest) else {
        return Err(BeamlineError::parse(line, "empty component statement"));
    };
    if first == "SPLIT" {
        let Some((second, tail2)) = text::next_word(tail) else {
            return Err(BeamlineError::parse(line, "SPLIT without COMPONENT"));
        };
        if second == "COMPONENT" {
            split = Split::Bare;
            rest = tail2;
        } else {
            split = Split::Factor(second.to_string());
            let Some((third, tail3)) = text::next_word(tail2) else {
                return Err(BeamlineError::parse(line, "SPLIT without COMPONENT"));
            };
            if third != "COMPONENT" {
                return Err(BeamlineError::parse(line, "SPLIT without COMPONENT"));
            }
            rest = tail3;
        }
    } else if first == "COMPONENT" {
        rest = tail;
    } else {
        return Err(BeamlineError::parse(
            line,
            format!("expected COMPONENT, found '{}'", first),
        ));
    }
    let name_text = rest.trim();
    if name_text.starts_with("COPY") && name_text.contains('(') {
        return Ok((split, NameSpec::Auto));
    }
    Ok((split, NameSpec::Plain(name_text.to_string())))
}

/// Parses the `name = value` pairs of a component call.
fn parse_call_params(params: &str, line: usize) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for part in text::split_top_level(params, ',') {
        let Some((name, value)) = text::split_once_top_level(&part, '=') else {
            return Err(BeamlineError::parse(
                line,
                format!("parameter without a value: '{}'", part),
            ));
        };
        out.push((name, value));
    }
    Ok(out)
}

/// Parses `({x},{y},{z}) ABSOLUTE|RELATIVE <target>`; returns the placement
/// and the unconsumed remainder.
fn parse_placement(
    component: &str,
    keyword: &str,
    tail: &str,
    line: usize,
) -> Result<(Placement, String)> {
    let malformed = |clause: &str| BeamlineError::malformed_position(component, line, clause);
    if !tail.trim_start().starts_with('(') {
        return Err(malformed(&format!("{} {}", keyword, tail.trim())));
    }
    let Some((inner, rest)) = text::extract_group(tail) else {
        return Err(malformed(&format!("{} {}", keyword, tail.trim())));
    };
    let coords = text::split_top_level(&inner, ',');
    let coords: [String; 3] = match coords.try_into() {
        Ok(coords) => coords,
        Err(_) => return Err(malformed(&format!("{} ({})", keyword, inner))),
    };
    let Some((ref_word, rest2)) = text::next_word(&rest) else {
        return Err(malformed(&format!("{} ({})", keyword, inner)));
    };
    let (reference, remainder) = match ref_word {
        "ABSOLUTE" => (Reference::Absolute, rest2.to_string()),
        "RELATIVE" => {
            let Some((target, rest3)) = text::next_word(rest2) else {
                return Err(malformed(&format!("{} ({}) RELATIVE", keyword, inner)));
            };
            let reference = if target == "PREVIOUS" {
                Reference::Previous
            } else {
                Reference::Named(target.to_string())
            };
            (reference, rest3.to_string())
        }
        other => {
            return Err(malformed(&format!(
                "{} ({}) {}",
                keyword, inner, other
            )))
        }
    };
    Ok((
        Placement {
            coords,
            reference,
        },
        remainder,
    ))
}
