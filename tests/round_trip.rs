//! Round-trip properties of the reader and writer.
//!
//! An instrument built through the API reads back structurally equal after
//! rendering, and rendering is a fixed point under re-parsing.

use beamline_core::dsl;
use beamline_core::instrument::{Reference, Split};
use beamline_core::schema::{Catalog, SchemaProvider};
use beamline_core::value::{ArrayLen, Value, ValueType, Variable};
use beamline_core::Instrument;

/// An instrument touching every section and statement form.
fn rich_instrument() -> Instrument {
    let catalog = Catalog::builtin();
    let mut instrument = Instrument::new("rt_demo").unwrap();
    instrument.author = "Jane Doe".to_string();
    instrument.origin = "ESS".to_string();

    instrument
        .add_parameter(
            Variable::new(ValueType::Double, "lambda")
                .unwrap()
                .with_value(2.5)
                .unwrap(),
        )
        .unwrap();
    instrument
        .add_parameter(
            Variable::new(ValueType::Int, "n")
                .unwrap()
                .with_value(10i64)
                .unwrap(),
        )
        .unwrap();
    instrument
        .add_parameter(
            Variable::new(ValueType::String, "outfile")
                .unwrap()
                .with_value(Value::Str("out.dat".into()))
                .unwrap(),
        )
        .unwrap();

    instrument
        .add_declare(
            Variable::new(ValueType::Double, "mono_q")
                .unwrap()
                .with_value(1.8734)
                .unwrap(),
        )
        .unwrap();
    instrument
        .add_declare(
            Variable::new(ValueType::Double, "angles")
                .unwrap()
                .with_array(ArrayLen::Auto)
                .unwrap()
                .with_value(Value::List(vec![
                    Value::Int(10),
                    Value::Int(20),
                    Value::Int(30),
                ]))
                .unwrap()
                .with_comment("scan points"),
        )
        .unwrap();
    instrument.append_declare_code("struct config { int a; } cfg;");
    instrument
        .add_user_var(Variable::new(ValueType::Int, "scattered").unwrap())
        .unwrap();
    instrument.append_initialize("  mono_q = 2*PI/lambda;");
    instrument.append_finally("  printf(\"done\\n\");");

    let src = instrument
        .add_component("src", catalog.require("Source").unwrap())
        .unwrap();
    src.set_parameter("radius", 0.05).unwrap();
    src.set_parameter("lambda0", Value::Expr("lambda".into()))
        .unwrap();
    src.set_position([0, 0, 0], Reference::Absolute);
    src.set_comment("cold source");

    let guide = instrument
        .add_component("guide", catalog.require("Guide").unwrap())
        .unwrap();
    guide
        .set_parameters(&[
            ("w1", Value::Double(0.05)),
            ("h1", Value::Double(0.05)),
            ("l", Value::Double(10.5)),
        ])
        .unwrap();
    guide.set_position([0, 0, 1], Reference::Named("src".into()));
    guide.set_split(Split::Factor("10".into()));

    let det = instrument
        .add_component("det", catalog.require("Monitor").unwrap())
        .unwrap();
    det.set_parameter("filename", Value::Expr("outfile".into()))
        .unwrap();
    det.set_position(["0", "0", "11.5"], Reference::Named("guide".into()));
    det.set_rotation([0, 90, 0], Reference::Previous);
    det.set_when("n > 0");
    det.append_extend("if (SCATTERED) scattered = scattered + 1;");

    instrument
}

#[test]
fn test_api_build_round_trips() {
    let catalog = Catalog::builtin();
    let instrument = rich_instrument();
    instrument.validate().unwrap();
    instrument.check_bindings().unwrap();

    let text = dsl::render(&instrument).unwrap();
    let reparsed = dsl::parse(&text, &catalog).unwrap();
    assert_eq!(reparsed, instrument);
}

#[test]
fn test_render_is_fixed_point_of_parse() {
    let catalog = Catalog::builtin();
    let instrument = rich_instrument();
    let first = dsl::render(&instrument).unwrap();
    let reparsed = dsl::parse(&first, &catalog).unwrap();
    let second = dsl::render(&reparsed).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_foreign_layout_normalizes_once() {
    // Hand-formatted input: odd spacing, wrapped call, trailing comments.
    let input = "\
DEFINE INSTRUMENT messy (double   lambda=2.5)
DECLARE
%{
  double mono_q   = 1.8734;
%}
TRACE
COMPONENT src = Source(
   radius = 0.05,
   dlambda = 0.1)   // wide band
AT (0, 0, 0) ABSOLUTE
COMPONENT det = Monitor() AT (0,0,1) RELATIVE src
END
";
    let catalog = Catalog::builtin();
    let parsed = dsl::parse(input, &catalog).unwrap();
    let canonical = dsl::render(&parsed).unwrap();
    let reparsed = dsl::parse(&canonical, &catalog).unwrap();
    assert_eq!(reparsed, parsed);
    assert_eq!(dsl::render(&reparsed).unwrap(), canonical);
}

#[test]
fn test_json_snapshot_round_trips() {
    let instrument = rich_instrument();
    let json = instrument.to_json().unwrap();
    let restored = Instrument::from_json(&json).unwrap();
    assert_eq!(restored, instrument);
}

#[cfg(feature = "cli")]
#[test]
fn test_render_to_file_and_back() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("rt_demo.instr");
    let instrument = rich_instrument();
    dsl::render_to_file(&instrument, &path, &dsl::WriteOptions::default()).unwrap();
    let catalog = Catalog::builtin();
    let reparsed = dsl::parse_file(&path, &catalog).unwrap();
    assert_eq!(reparsed, instrument);
}
