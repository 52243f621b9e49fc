//! Deterministic writer for instrument descriptions.
//!
//! The same model always renders byte for byte the same: section order is
//! fixed, parameters keep declaration order, and wrapping is governed by a
//! single column budget. Rendering an instrument and reading the text back
//! reproduces the model.

use std::io;

use crate::error::{BeamlineError, Result};
use crate::instrument::{DeclareItem, Instrument, LINE_BUDGET};
use crate::value::Variable;

/// Options for [`render_with`].
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Emit INITIALIZE code that logs the parameter values a run actually
    /// used to `<name>_parameters.txt`.
    pub save_parameters: bool,
}

/// Renders the instrument with default options.
pub fn render(instrument: &Instrument) -> Result<String> {
    render_with(instrument, &WriteOptions::default())
}

/// Renders the instrument as instrument-description text.
pub fn render_with(instrument: &Instrument, options: &WriteOptions) -> Result<String> {
    let mut out = String::new();
    write_header(instrument, &mut out);
    write_define(instrument, &mut out);
    write_declare(instrument, &mut out);
    write_uservars(instrument, &mut out);
    write_initialize(instrument, options, &mut out);
    write_trace(instrument, &mut out)?;
    write_finally(instrument, &mut out);
    out.push_str("END\n");
    Ok(out)
}

/// Renders the instrument into a caller-supplied sink.
pub fn render_to(instrument: &Instrument, sink: &mut impl io::Write) -> Result<()> {
    let text = render(instrument)?;
    sink.write_all(text.as_bytes())
        .map_err(|source| BeamlineError::WriteError { source })
}

/// Renders with default options and writes the text to `path`.
#[cfg(feature = "cli")]
pub fn render_to_file(
    instrument: &Instrument,
    path: &std::path::Path,
    options: &WriteOptions,
) -> Result<()> {
    let text = render_with(instrument, options)?;
    std::fs::write(path, text).map_err(|source| BeamlineError::WriteError { source })?;
    Ok(())
}

fn write_header(instrument: &Instrument, out: &mut String) {
    let rule = "*".repeat(79);
    out.push('/');
    out.push_str(&rule);
    out.push('\n');
    out.push_str(&format!("* Instrument: {}\n", instrument.name));
    out.push_str("*\n");
    out.push_str(&format!("* Written by: {}\n", instrument.author));
    out.push_str(&format!("* Origin: {}\n", instrument.origin));
    out.push_str(&rule);
    out.push_str("/\n\n");
}

fn write_define(instrument: &Instrument, out: &mut String) {
    let params: Vec<String> = instrument.parameters.iter().map(parameter_text).collect();
    let single = format!(
        "DEFINE INSTRUMENT {} ({})",
        instrument.name,
        params.join(", ")
    );
    if params.is_empty() || single.len() <= LINE_BUDGET {
        out.push_str(&single);
        out.push('\n');
    } else {
        out.push_str(&format!("DEFINE INSTRUMENT {} (\n", instrument.name));
        let chunks: Vec<&[String]> = params.chunks(2).collect();
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
    out.push('\n');
}

/// One DEFINE parameter, always carrying its type keyword.
fn parameter_text(var: &Variable) -> String {
    let mut text = format!("{} {}", var.vtype.keyword(), var.name);
    if let Some(value) = &var.value {
        text.push_str(&format!(" = {}", value));
    }
    text
}

fn write_declare(instrument: &Instrument, out: &mut String) {
    out.push_str("DECLARE\n%{\n");
    for item in &instrument.declares {
        match item {
            DeclareItem::Var(var) => {
                out.push_str(&declare_line(var));
                out.push('\n');
            }
            DeclareItem::Verbatim(code) => {
                out.push_str(code);
                out.push('\n');
            }
        }
    }
    out.push_str("%}\n\n");
}

fn declare_line(var: &Variable) -> String {
    let mut line = format!("  {} {}", var.vtype.keyword(), var.name);
    if let Some(array) = var.array {
        line.push_str(&array.to_string());
    }
    if let Some(value) = &var.value {
        line.push_str(&format!(" = {}", value));
    }
    line.push(';');
    if let Some(comment) = &var.comment {
        line.push_str(&format!(" // {}", comment));
    }
    line
}

fn write_uservars(instrument: &Instrument, out: &mut String) {
    if instrument.user_vars.is_empty() {
        return;
    }
    out.push_str("USERVARS\n%{\n");
    for var in &instrument.user_vars {
        out.push_str(&declare_line(var));
        out.push('\n');
    }
    out.push_str("%}\n\n");
}

fn write_initialize(instrument: &Instrument, options: &WriteOptions, out: &mut String) {
    out.push_str("INITIALIZE\n%{\n");
    for line in &instrument.initialize {
        out.push_str(line);
        out.push('\n');
    }
    if options.save_parameters {
        write_parameter_log(instrument, out);
    }
    out.push_str("%}\n\n");
}

/// C code that records the parameter values a run actually used: the
/// instrument parameters, then every explicitly set component parameter.
/// Array and list values have no single format directive and are skipped.
fn write_parameter_log(instrument: &Instrument, out: &mut String) {
    out.push_str(&format!(
        "  FILE *parfile = fopen(\"{}_parameters.txt\", \"w\");\n",
        instrument.name
    ));
    for var in &instrument.parameters {
        if var.array.is_some() {
            continue;
        }
        out.push_str(&format!(
            "  fprintf(parfile, \"{} = {}\\n\", {});\n",
            var.name,
            var.vtype.format_directive(),
            var.name
        ));
    }
    for component in &instrument.components {
        for slot in component.set_params() {
            let Some(value) = &slot.value else { continue };
            if matches!(value, crate::value::Value::List(_)) {
                continue;
            }
            out.push_str(&format!(
                "  fprintf(parfile, \"{}.{} = {}\\n\", {});\n",
                component.name,
                slot.schema.name,
                slot.schema.vtype.format_directive(),
                value
            ));
        }
    }
    out.push_str("  fclose(parfile);\n");
}

fn write_trace(instrument: &Instrument, out: &mut String) -> Result<()> {
    out.push_str("TRACE\n");
    for component in &instrument.components {
        out.push('\n');
        component.write(out)?;
    }
    out.push('\n');
    Ok(())
}

fn write_finally(instrument: &Instrument, out: &mut String) {
    if instrument.finally.is_empty() {
        return;
    }
    out.push_str("FINALLY\n%{\n");
    for line in &instrument.finally {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("%}\n\n");
}
