//! Line-oriented reader for instrument description files.
//!
//! The reader is a mode machine keyed on section keywords. The preamble is
//! mined for the `* Written by:` and `* Origin:` header fields, the DEFINE
//! line is accumulated until its parameter list balances, DECLARE, USERVARS,
//! INITIALIZE and FINALLY collect their `%{ ... %}` bodies, and TRACE is
//! handed line by line to [`TraceReader`]. DECLARE and USERVARS statements
//! are lifted into typed [`Variable`]s where they fit the simple C forms;
//! anything else is kept verbatim so the file survives a round trip.

use tracing::{debug, warn};

use crate::error::{BeamlineError, Result};
use crate::instrument::Instrument;
use crate::schema::SchemaProvider;
use crate::value::{self, ArrayLen, Value, ValueType, Variable};

use super::text;
use super::trace::{TraceReader, TraceStep};

/// The verbatim-block sections delimited by `%{ ... %}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Declare,
    UserVars,
    Initialize,
    Finally,
}

impl Section {
    fn keyword(self) -> &'static str {
        match self {
            Section::Declare => "DECLARE",
            Section::UserVars => "USERVARS",
            Section::Initialize => "INITIALIZE",
            Section::Finally => "FINALLY",
        }
    }
}

enum Mode {
    /// Before DEFINE INSTRUMENT; banner comments carry the header fields.
    Preamble,
    /// Accumulating the DEFINE line until its parameter list balances.
    Define {
        buf: String,
        depth: i32,
        quote: bool,
        start_line: usize,
    },
    /// Between sections.
    Body,
    /// A section keyword was read; its `%{` has not appeared yet.
    AwaitBlock { section: Section, start_line: usize },
    /// Collecting verbatim lines until `%}`.
    Block {
        section: Section,
        lines: Vec<String>,
        start_line: usize,
    },
    Trace,
    /// After END.
    Done,
}

pub(super) struct Reader<'a> {
    schemas: &'a dyn SchemaProvider,
    mode: Mode,
    /// Inside a `/* ... */` block of the preamble or body.
    in_comment: bool,
    author: Option<String>,
    origin: Option<String>,
    instrument: Option<Instrument>,
    trace: TraceReader,
}

/// Parses a complete instrument description.
pub(super) fn read(input: &str, schemas: &dyn SchemaProvider) -> Result<Instrument> {
    let mut reader = Reader::new(schemas);
    for (i, raw) in input.lines().enumerate() {
        reader.feed(raw, i + 1)?;
    }
    reader.finish()
}

impl<'a> Reader<'a> {
    fn new(schemas: &'a dyn SchemaProvider) -> Self {
        Reader {
            schemas,
            mode: Mode::Preamble,
            in_comment: false,
            author: None,
            origin: None,
            instrument: None,
            trace: TraceReader::new(),
        }
    }

    fn feed(&mut self, raw: &str, line_no: usize) -> Result<()> {
        // A mode change may hand the same line back for reprocessing.
        while self.process(raw, line_no)? {}
        Ok(())
    }

    fn finish(mut self) -> Result<Instrument> {
        match std::mem::replace(&mut self.mode, Mode::Done) {
            Mode::Preamble => return Err(BeamlineError::MissingDefine),
            Mode::Define { start_line, .. } => {
                return Err(BeamlineError::UnterminatedBlock {
                    block: "DEFINE".to_string(),
                    line: start_line,
                });
            }
            Mode::AwaitBlock {
                section,
                start_line,
            }
            | Mode::Block {
                section,
                start_line,
                ..
            } => {
                return Err(BeamlineError::UnterminatedBlock {
                    block: section.keyword().to_string(),
                    line: start_line,
                });
            }
            Mode::Trace => {
                let Some(instrument) = self.instrument.as_mut() else {
                    return Err(BeamlineError::MissingDefine);
                };
                self.trace.finish(instrument)?;
                warn!("input ends without END");
            }
            Mode::Body => warn!("input ends without END"),
            Mode::Done => {}
        }
        self.instrument.ok_or(BeamlineError::MissingDefine)
    }

    fn process(&mut self, raw: &str, line_no: usize) -> Result<bool> {
        match std::mem::replace(&mut self.mode, Mode::Body) {
            Mode::Preamble => self.preamble_line(raw, line_no),
            Mode::Define {
                buf,
                depth,
                quote,
                start_line,
            } => self.define_line(raw, buf, depth, quote, start_line),
            Mode::Body => self.body_line(raw, line_no),
            Mode::AwaitBlock {
                section,
                start_line,
            } => self.await_block_line(raw, line_no, section, start_line),
            Mode::Block {
                section,
                lines,
                start_line,
            } => self.block_line(raw, line_no, section, lines, start_line),
            Mode::Trace => {
                let Some(instrument) = self.instrument.as_mut() else {
                    return Err(BeamlineError::MissingDefine);
                };
                match self.trace.step(raw, line_no, instrument, self.schemas)? {
                    TraceStep::Consumed => {
                        self.mode = Mode::Trace;
                        Ok(false)
                    }
                    TraceStep::Exit => {
                        self.trace.finish(instrument)?;
                        self.mode = Mode::Body;
                        Ok(true)
                    }
                }
            }
            Mode::Done => {
                let trimmed = raw.trim();
                if !trimmed.is_empty() && !self.absorb_comment(trimmed) && !trimmed.starts_with("//")
                {
                    warn!(line = line_no, "content after END ignored");
                }
                self.mode = Mode::Done;
                Ok(false)
            }
        }
    }

    // ------------------------------------------------------------------
    // Preamble and DEFINE
    // ------------------------------------------------------------------

    fn preamble_line(&mut self, raw: &str, line_no: usize) -> Result<bool> {
        self.mode = Mode::Preamble;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(false);
        }
        if self.in_comment
            || trimmed.starts_with("/*")
            || trimmed.starts_with('*')
            || trimmed.starts_with("//")
        {
            self.mine_header(trimmed);
            self.absorb_comment(trimmed);
            return Ok(false);
        }
        let Some((word, _)) = text::next_word(trimmed) else {
            return Ok(false);
        };
        if word == "DEFINE" {
            let (code, _) = text::strip_line_comment(trimmed);
            let mut quote = false;
            let depth = text::paren_depth_delta(code, &mut quote);
            if code.contains('(') && depth == 0 {
                self.finish_define(code, line_no)?;
                self.mode = Mode::Body;
            } else {
                self.mode = Mode::Define {
                    buf: code.to_string(),
                    depth,
                    quote,
                    start_line: line_no,
                };
            }
            return Ok(false);
        }
        warn!(line = line_no, "line before DEFINE INSTRUMENT ignored");
        Ok(false)
    }

    fn define_line(
        &mut self,
        raw: &str,
        mut buf: String,
        mut depth: i32,
        mut quote: bool,
        start_line: usize,
    ) -> Result<bool> {
        let (code, _) = text::strip_line_comment(raw.trim());
        if !buf.is_empty() && !code.is_empty() {
            buf.push(' ');
        }
        buf.push_str(code);
        depth += text::paren_depth_delta(code, &mut quote);
        if buf.contains('(') && depth == 0 {
            self.finish_define(&buf, start_line)?;
            self.mode = Mode::Body;
        } else {
            self.mode = Mode::Define {
                buf,
                depth,
                quote,
                start_line,
            };
        }
        Ok(false)
    }

    fn finish_define(&mut self, code: &str, line: usize) -> Result<()> {
        let rest = code.trim_start();
        let rest = rest
            .strip_prefix("DEFINE")
            .map(str::trim_start)
            .unwrap_or(rest);
        let Some(rest) = rest.strip_prefix("INSTRUMENT") else {
            return Err(BeamlineError::parse(line, "expected INSTRUMENT after DEFINE"));
        };
        let Some(open) = rest.find('(') else {
            return Err(BeamlineError::parse(
                line,
                "DEFINE INSTRUMENT without a parameter list",
            ));
        };
        let name = rest[..open].trim();
        let Some((params, after)) = text::extract_group(&rest[open..]) else {
            return Err(BeamlineError::parse(line, "unbalanced DEFINE parameter list"));
        };
        let mut instrument = Instrument::new(name)?;
        if let Some(author) = self.author.take() {
            instrument.author = author;
        }
        if let Some(origin) = self.origin.take() {
            instrument.origin = origin;
        }
        for part in text::split_top_level(&params, ',') {
            instrument.add_parameter(parse_parameter(&part, line)?)?;
        }
        if !after.trim().is_empty() {
            warn!(line, "text after DEFINE parameter list ignored");
        }
        debug!(name = %instrument.name, "instrument defined");
        self.instrument = Some(instrument);
        Ok(())
    }

    fn mine_header(&mut self, trimmed: &str) {
        let body = trimmed.trim_start_matches(['/', '*']).trim();
        if let Some(rest) = body.strip_prefix("Written by:") {
            let rest = rest.trim();
            if !rest.is_empty() {
                self.author = Some(rest.to_string());
            }
        } else if let Some(rest) = body.strip_prefix("Origin:") {
            let rest = rest.trim();
            if !rest.is_empty() {
                self.origin = Some(rest.to_string());
            }
        }
    }

    /// Tracks `/* ... */` state; true when the line lives inside a comment.
    fn absorb_comment(&mut self, trimmed: &str) -> bool {
        if self.in_comment {
            if trimmed.contains("*/") {
                self.in_comment = false;
            }
            return true;
        }
        if let Some(rest) = trimmed.strip_prefix("/*") {
            if !rest.contains("*/") {
                self.in_comment = true;
            }
            return true;
        }
        false
    }

    // ------------------------------------------------------------------
    // Sections
    // ------------------------------------------------------------------

    fn body_line(&mut self, raw: &str, line_no: usize) -> Result<bool> {
        self.mode = Mode::Body;
        let trimmed = raw.trim();
        if trimmed.is_empty() || self.absorb_comment(trimmed) || trimmed.starts_with("//") {
            return Ok(false);
        }
        let Some((word, rest)) = text::next_word(trimmed) else {
            return Ok(false);
        };
        match word {
            "DECLARE" => self.start_block(Section::Declare, rest, line_no),
            "USERVARS" => self.start_block(Section::UserVars, rest, line_no),
            "INITIALIZE" => self.start_block(Section::Initialize, rest, line_no),
            "FINALLY" => self.start_block(Section::Finally, rest, line_no),
            "TRACE" => {
                if !rest.trim().is_empty() {
                    warn!(line = line_no, "text after TRACE ignored");
                }
                self.mode = Mode::Trace;
                Ok(false)
            }
            "END" => {
                self.mode = Mode::Done;
                Ok(false)
            }
            "DEFINE" => Err(BeamlineError::parse(
                line_no,
                "second DEFINE INSTRUMENT statement",
            )),
            _ => {
                warn!(line = line_no, "unrecognized line between sections ignored");
                Ok(false)
            }
        }
    }

    fn start_block(&mut self, section: Section, rest: &str, line_no: usize) -> Result<bool> {
        let rest = rest.trim();
        if rest.is_empty() {
            self.mode = Mode::AwaitBlock {
                section,
                start_line: line_no,
            };
            return Ok(false);
        }
        let Some(body) = rest.strip_prefix("%{") else {
            return Err(BeamlineError::parse(
                line_no,
                format!("expected %{{ after {}", section.keyword()),
            ));
        };
        self.open_block(section, body, line_no)
    }

    fn await_block_line(
        &mut self,
        raw: &str,
        line_no: usize,
        section: Section,
        start_line: usize,
    ) -> Result<bool> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            self.mode = Mode::AwaitBlock {
                section,
                start_line,
            };
            return Ok(false);
        }
        let Some(body) = trimmed.strip_prefix("%{") else {
            return Err(BeamlineError::parse(
                line_no,
                format!("expected %{{ after {}", section.keyword()),
            ));
        };
        self.open_block(section, body, line_no)
    }

    fn open_block(&mut self, section: Section, body: &str, line_no: usize) -> Result<bool> {
        // The whole block may sit on the keyword line.
        if let Some(end) = body.find("%}") {
            let inner = body[..end].trim();
            let lines = if inner.is_empty() {
                Vec::new()
            } else {
                vec![inner.to_string()]
            };
            self.finish_block(section, lines)?;
            self.mode = Mode::Body;
            return Ok(false);
        }
        let mut lines = Vec::new();
        let opening = body.trim();
        if !opening.is_empty() {
            lines.push(opening.to_string());
        }
        self.mode = Mode::Block {
            section,
            lines,
            start_line: line_no,
        };
        Ok(false)
    }

    fn block_line(
        &mut self,
        raw: &str,
        line_no: usize,
        section: Section,
        mut lines: Vec<String>,
        start_line: usize,
    ) -> Result<bool> {
        let trimmed = raw.trim();
        if let Some(rest) = trimmed.strip_prefix("%}") {
            if !rest.trim().is_empty() {
                warn!(line = line_no, "text after %}} ignored");
            }
            self.finish_block(section, lines)?;
            self.mode = Mode::Body;
            return Ok(false);
        }
        lines.push(raw.trim_end().to_string());
        self.mode = Mode::Block {
            section,
            lines,
            start_line,
        };
        Ok(false)
    }

    fn finish_block(&mut self, section: Section, lines: Vec<String>) -> Result<()> {
        let Some(instrument) = self.instrument.as_mut() else {
            return Err(BeamlineError::MissingDefine);
        };
        match section {
            Section::Initialize => instrument.initialize.extend(lines),
            Section::Finally => instrument.finally.extend(lines),
            Section::Declare => parse_declare_block(instrument, &lines)?,
            Section::UserVars => parse_uservars_block(instrument, &lines)?,
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------
// DECLARE and USERVARS statement parsing
// ----------------------------------------------------------------------

fn parse_declare_block(instrument: &mut Instrument, lines: &[String]) -> Result<()> {
    for stmt in gather_statements(lines) {
        if !is_comment_statement(&stmt) {
            if let Some(vars) = parse_typed_declaration(&stmt.replace('\n', " ")) {
                for var in vars {
                    instrument.add_declare(var)?;
                }
                continue;
            }
            debug!("DECLARE statement kept verbatim");
        }
        instrument.append_declare_code(&stmt);
    }
    Ok(())
}

/// USERVARS entries must be typed per-ray variables; anything else is moved
/// to DECLARE so it is not lost.
fn parse_uservars_block(instrument: &mut Instrument, lines: &[String]) -> Result<()> {
    for stmt in gather_statements(lines) {
        if !is_comment_statement(&stmt) {
            if let Some(vars) = parse_typed_declaration(&stmt.replace('\n', " ")) {
                for var in vars {
                    instrument.add_user_var(var)?;
                }
                continue;
            }
            warn!("USERVARS entry is not a typed declaration; kept in DECLARE");
        }
        instrument.append_declare_code(&stmt);
    }
    Ok(())
}

fn is_comment_statement(stmt: &str) -> bool {
    let t = stmt.trim_start();
    t.starts_with("//") || t.starts_with("/*")
}

/// Groups block lines into statements: a statement runs until braces and
/// parens balance and the line ends in `;` or `}`. Comment lines and
/// `/* ... */` runs form their own statements.
fn gather_statements(lines: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let trimmed = lines[i].trim();
        if trimmed.is_empty() {
            i += 1;
            continue;
        }
        if trimmed.starts_with("//") {
            out.push(trimmed.to_string());
            i += 1;
            continue;
        }
        if trimmed.starts_with("/*") {
            let mut chunk = vec![lines[i].trim_end().to_string()];
            let mut closed = trimmed.contains("*/");
            i += 1;
            while !closed && i < lines.len() {
                chunk.push(lines[i].trim_end().to_string());
                closed = lines[i].contains("*/");
                i += 1;
            }
            out.push(chunk.join("\n"));
            continue;
        }
        let mut brace_quote = false;
        let mut paren_quote = false;
        let mut braces = text::brace_depth_delta(&lines[i], &mut brace_quote);
        let mut parens = text::paren_depth_delta(&lines[i], &mut paren_quote);
        let mut chunk = vec![lines[i].trim_end().to_string()];
        let mut done = braces <= 0 && parens <= 0 && ends_statement(trimmed);
        i += 1;
        while !done && i < lines.len() {
            let t = lines[i].trim();
            chunk.push(lines[i].trim_end().to_string());
            braces += text::brace_depth_delta(&lines[i], &mut brace_quote);
            parens += text::paren_depth_delta(&lines[i], &mut paren_quote);
            done = braces <= 0 && parens <= 0 && ends_statement(t);
            i += 1;
        }
        out.push(chunk.join("\n"));
    }
    out
}

fn ends_statement(trimmed: &str) -> bool {
    let (code, _) = text::strip_line_comment(trimmed);
    let code = code.trim_end();
    code.ends_with(';') || code.ends_with('}')
}

/// Lifts `type name[len] = value, ...;` into typed variables. `None` when
/// the statement does not fit the simple declaration forms.
fn parse_typed_declaration(stmt: &str) -> Option<Vec<Variable>> {
    let (code, comment) = text::strip_line_comment(stmt);
    let code = code.trim().strip_suffix(';')?;
    let (type_word, rest) = text::next_word(code)?;
    let vtype = ValueType::parse(type_word)?;
    let mut vars = Vec::new();
    for decl in text::split_top_level(rest, ',') {
        let (head, init) = match text::split_once_top_level(&decl, '=') {
            Some((head, init)) => (head, Some(init)),
            None => (decl.trim().to_string(), None),
        };
        let (name, array) = parse_declarator(&head)?;
        if !value::is_legal_identifier(&name) {
            return None;
        }
        let mut var = Variable::new(vtype, &name).ok()?;
        if let Some(len) = array {
            var = var.with_array(len).ok()?;
        }
        if let Some(init) = init {
            var.set_value(Value::from_dsl(&init, vtype)).ok()?;
        }
        vars.push(var);
    }
    if vars.is_empty() {
        return None;
    }
    if let Some(comment) = comment {
        if let Some(last) = vars.last_mut() {
            last.comment = Some(comment.trim().to_string());
        }
    }
    Some(vars)
}

/// Splits `name`, `name[]` or `name[n]` into the name and array length.
fn parse_declarator(head: &str) -> Option<(String, Option<ArrayLen>)> {
    let head = head.trim();
    match head.find('[') {
        Some(open) => {
            let name = head[..open].trim().to_string();
            let inner = head[open..].strip_prefix('[')?.strip_suffix(']')?.trim();
            let len = if inner.is_empty() {
                ArrayLen::Auto
            } else {
                ArrayLen::Fixed(inner.parse().ok()?)
            };
            Some((name, Some(len)))
        }
        None => Some((head.to_string(), None)),
    }
}

/// Parses one DEFINE parameter: `[type] name [= default]`, type defaulting
/// to double.
fn parse_parameter(part: &str, line: usize) -> Result<Variable> {
    let (lhs, default) = match text::split_once_top_level(part, '=') {
        Some((lhs, rhs)) => (lhs, Some(rhs)),
        None => (part.trim().to_string(), None),
    };
    let (vtype, name) = match text::next_word(&lhs) {
        Some((first, rest)) if !rest.trim().is_empty() => {
            let Some(vtype) = ValueType::parse(first) else {
                return Err(BeamlineError::parse(
                    line,
                    format!("unknown parameter type '{}'", first),
                ));
            };
            (vtype, rest.trim().to_string())
        }
        Some((only, _)) => (ValueType::Double, only.to_string()),
        None => {
            return Err(BeamlineError::parse(line, "empty parameter declaration"));
        }
    };
    let mut var = Variable::new(vtype, &name)?;
    if let Some(default) = default {
        var.set_value(Value::from_dsl(&default, vtype))?;
    }
    Ok(var)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::DeclareItem;
    use crate::schema::Catalog;

    fn parse(input: &str) -> Result<Instrument> {
        let catalog = Catalog::builtin();
        read(input, &catalog)
    }

    const MINIMAL: &str = "\
DEFINE INSTRUMENT demo ()
TRACE
COMPONENT origin = Arm()
AT (0,0,0) ABSOLUTE
END
";

    #[test]
    fn test_parse_minimal_instrument() {
        let instrument = parse(MINIMAL).unwrap();
        assert_eq!(instrument.name, "demo");
        assert_eq!(instrument.component_names(), ["origin"]);
        assert!(instrument.parameters.is_empty());
    }

    #[test]
    fn test_header_fields_recovered() {
        let input = "\
/*******************************************************************************
* Instrument: demo
*
* Written by: Jane Doe
* Origin: ESS
*******************************************************************************/
DEFINE INSTRUMENT demo ()
TRACE
END
";
        let instrument = parse(input).unwrap();
        assert_eq!(instrument.author, "Jane Doe");
        assert_eq!(instrument.origin, "ESS");
    }

    #[test]
    fn test_define_parameters() {
        let input = "\
DEFINE INSTRUMENT demo (double lambda = 2.5, int n = 10, string file = \"out.dat\", theta)
TRACE
END
";
        let instrument = parse(input).unwrap();
        assert_eq!(instrument.parameters.len(), 4);
        let lambda = instrument.parameter("lambda").unwrap();
        assert_eq!(lambda.vtype, ValueType::Double);
        assert_eq!(lambda.value, Some(Value::Double(2.5)));
        assert_eq!(
            instrument.parameter("file").unwrap().value,
            Some(Value::Str("out.dat".into()))
        );
        // untyped parameters default to double
        assert_eq!(instrument.parameter("theta").unwrap().vtype, ValueType::Double);
        assert_eq!(instrument.parameter("theta").unwrap().value, None);
    }

    #[test]
    fn test_define_accumulates_across_lines() {
        let input = "\
DEFINE INSTRUMENT demo (
  double lambda = 2.5,
  int n = 10)
TRACE
END
";
        let instrument = parse(input).unwrap();
        assert_eq!(instrument.parameters.len(), 2);
        assert_eq!(
            instrument.parameter("n").unwrap().value,
            Some(Value::Int(10))
        );
    }

    #[test]
    fn test_declare_typed_and_verbatim() {
        let input = "\
DEFINE INSTRUMENT demo ()
DECLARE
%{
  double mono_q = 1.8734;
  int counts[3];
  double angles[] = {10, 20, 30}; // scan points
  struct config { int a; } cfg;
%}
TRACE
END
";
        let instrument = parse(input).unwrap();
        assert_eq!(instrument.declares.len(), 4);
        let DeclareItem::Var(mono_q) = &instrument.declares[0] else {
            panic!("expected typed variable");
        };
        assert_eq!(mono_q.value, Some(Value::Double(1.8734)));
        let DeclareItem::Var(counts) = &instrument.declares[1] else {
            panic!("expected typed variable");
        };
        assert_eq!(counts.array, Some(ArrayLen::Fixed(3)));
        let DeclareItem::Var(angles) = &instrument.declares[2] else {
            panic!("expected typed variable");
        };
        assert_eq!(angles.array, Some(ArrayLen::Auto));
        assert_eq!(angles.comment.as_deref(), Some("scan points"));
        assert!(matches!(&instrument.declares[3], DeclareItem::Verbatim(v) if v.contains("struct")));
    }

    #[test]
    fn test_declare_multi_declarator() {
        let input = "\
DEFINE INSTRUMENT demo ()
DECLARE
%{
  double t1, t2, t3;
%}
TRACE
END
";
        let instrument = parse(input).unwrap();
        let names: Vec<&str> = instrument
            .declares
            .iter()
            .filter_map(|d| match d {
                DeclareItem::Var(v) => Some(v.name.as_str()),
                DeclareItem::Verbatim(_) => None,
            })
            .collect();
        assert_eq!(names, ["t1", "t2", "t3"]);
    }

    #[test]
    fn test_declare_function_kept_verbatim() {
        let input = "\
DEFINE INSTRUMENT demo ()
DECLARE
%{
  double shift(double x) {
    return x + 1;
  }
%}
TRACE
END
";
        let instrument = parse(input).unwrap();
        assert_eq!(instrument.declares.len(), 1);
        let DeclareItem::Verbatim(body) = &instrument.declares[0] else {
            panic!("expected verbatim block");
        };
        assert!(body.contains("return x + 1;"));
    }

    #[test]
    fn test_uservars_typed_and_fallback() {
        let input = "\
DEFINE INSTRUMENT demo ()
USERVARS
%{
  double flightpath;
  int flag;
  struct hit { double t; } last_hit;
%}
TRACE
END
";
        let instrument = parse(input).unwrap();
        let names: Vec<&str> = instrument.user_vars.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["flightpath", "flag"]);
        // the struct is not lost, it moves to DECLARE
        assert!(matches!(&instrument.declares[0], DeclareItem::Verbatim(v) if v.contains("last_hit")));
    }

    #[test]
    fn test_initialize_and_finally_verbatim() {
        let input = "\
DEFINE INSTRUMENT demo ()
INITIALIZE
%{
  mono_q = 2*PI/lambda;
%}
TRACE
FINALLY
%{
  printf(\"done\\n\");
%}
END
";
        let instrument = parse(input).unwrap();
        assert_eq!(instrument.initialize, ["  mono_q = 2*PI/lambda;"]);
        assert_eq!(instrument.finally, ["  printf(\"done\\n\");"]);
    }

    #[test]
    fn test_missing_define_fails() {
        let err = parse("TRACE\nEND\n").unwrap_err();
        assert!(matches!(err, BeamlineError::MissingDefine));
    }

    #[test]
    fn test_unterminated_declare_fails() {
        let input = "\
DEFINE INSTRUMENT demo ()
DECLARE
%{
  double x;
";
        let err = parse(input).unwrap_err();
        assert!(matches!(
            err,
            BeamlineError::UnterminatedBlock { ref block, .. } if block == "DECLARE"
        ));
    }

    #[test]
    fn test_duplicate_namespace_name_fails() {
        let input = "\
DEFINE INSTRUMENT demo (double theta)
DECLARE
%{
  double theta;
%}
TRACE
END
";
        let err = parse(input).unwrap_err();
        assert!(matches!(err, BeamlineError::DuplicateName { .. }));
    }

    #[test]
    fn test_second_define_fails() {
        let input = "\
DEFINE INSTRUMENT demo ()
DEFINE INSTRUMENT other ()
TRACE
END
";
        let err = parse(input).unwrap_err();
        assert!(matches!(err, BeamlineError::ParseError { .. }));
    }

    #[test]
    fn test_keywords_inside_blocks_are_not_sections() {
        let input = "\
DEFINE INSTRUMENT demo ()
INITIALIZE
%{
  // TRACE and END appear in this comment
  char *mode = \"END\";
%}
TRACE
COMPONENT a = Arm() AT (0,0,0) ABSOLUTE
END
";
        let instrument = parse(input).unwrap();
        assert_eq!(instrument.initialize.len(), 2);
        assert_eq!(instrument.component_names(), ["a"]);
    }
}
