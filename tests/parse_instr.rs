//! End-to-end parsing of instrument description files.
//!
//! Covers a realistic multi-section file, the acceptance scenario for the
//! rendered text, and error surfacing for broken inputs.

use beamline_core::dsl;
use beamline_core::error::BeamlineError;
use beamline_core::instrument::{Anchor, Reference, Split};
use beamline_core::schema::{Catalog, SchemaProvider};
use beamline_core::value::Value;
use beamline_core::Instrument;

const POWDER: &str = r#"/*******************************************************************************
* Instrument: powder
*
* Written by: Jane Doe
* Origin: ESS
*******************************************************************************/
DEFINE INSTRUMENT powder (double lambda = 2.5, int n = 10, string outfile = "powder.dat")

DECLARE
%{
  double mono_q = 1.8734;
  double d_phi;
  int scattered = 0;
%}

USERVARS
%{
  double flightpath;
%}

INITIALIZE
%{
  d_phi = RAD2DEG*atan2(0.5, 1.0);
%}

TRACE

COMPONENT origin = Arm()
AT (0,0,0) ABSOLUTE

COMPONENT src = Source(radius = 0.05, lambda0 = lambda, dlambda = 0.1)
AT (0,0,0) RELATIVE origin

SPLIT 10 COMPONENT guide = Guide(w1 = 0.05, h1 = 0.05, l = 10)
AT (0,0,1.5) RELATIVE src

COMPONENT sample = Sample(radius = 0.005)
WHEN (n > 0)
AT (0,0,12) RELATIVE guide
EXTEND %{
  if (SCATTERED) scattered = scattered + 1;
%}

COMPONENT det = Monitor(filename = outfile, xwidth = 0.2)
AT (0,0,1) RELATIVE sample
ROTATED (0,45,0) RELATIVE sample

COMPONENT det_far = COPY(det)(filename = "far.dat")
AT (0,0,3) RELATIVE sample

FINALLY
%{
  printf("scattered %i\n", scattered);
%}

END
"#;

fn catalog() -> Catalog {
    Catalog::builtin()
}

#[test]
fn test_parse_full_file() {
    let instrument = dsl::parse(POWDER, &catalog()).unwrap();
    assert_eq!(instrument.name, "powder");
    assert_eq!(instrument.author, "Jane Doe");
    assert_eq!(instrument.origin, "ESS");
    assert_eq!(instrument.parameters.len(), 3);
    assert_eq!(
        instrument.component_names(),
        ["origin", "src", "guide", "sample", "det", "det_far"]
    );

    let guide = instrument.get("guide").unwrap();
    assert_eq!(guide.split, Split::Factor("10".into()));
    assert_eq!(guide.parameter("l"), Some(&Value::Int(10)));

    let sample = instrument.get("sample").unwrap();
    assert_eq!(sample.when.as_deref(), Some("n > 0"));
    assert_eq!(
        sample.extend,
        ["  if (SCATTERED) scattered = scattered + 1;"]
    );

    let det = instrument.get("det").unwrap();
    assert_eq!(det.parameter("filename"), Some(&Value::Expr("outfile".into())));
    assert_eq!(det.rotation.as_ref().unwrap().coords_text(), "0,45,0");

    // the copy keeps the template's settings and applies overrides
    let det_far = instrument.get("det_far").unwrap();
    assert_eq!(det_far.kind, "Monitor");
    assert_eq!(det_far.parameter("xwidth"), Some(&Value::Double(0.2)));
    assert_eq!(det_far.parameter("filename"), Some(&Value::Str("far.dat".into())));
    assert_eq!(det_far.position.reference, Reference::Named("sample".into()));
}

#[test]
fn test_parsed_file_passes_checks() {
    let instrument = dsl::parse(POWDER, &catalog()).unwrap();
    instrument.validate().unwrap();
    instrument.check_bindings().unwrap();
}

#[test]
fn test_acceptance_scenario() {
    let catalog = catalog();
    let mut instrument = Instrument::new("demo").unwrap();
    instrument
        .add_parameter(
            beamline_core::Variable::new(beamline_core::ValueType::Double, "theta").unwrap(),
        )
        .unwrap();
    instrument
        .add_component("src", catalog.require("Source").unwrap())
        .unwrap()
        .set_position([0, 0, 0], Reference::Absolute);
    instrument
        .add_component("det", catalog.require("Monitor").unwrap())
        .unwrap()
        .set_position([0, 0, 1], Reference::Named("src".into()));

    instrument.validate().unwrap();

    let text = dsl::render(&instrument).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    for expected in [
        "DEFINE INSTRUMENT demo (double theta)",
        "COMPONENT src = Source()",
        "AT (0,0,0) ABSOLUTE",
        "COMPONENT det = Monitor()",
        "AT (0,0,1) RELATIVE src",
    ] {
        assert!(lines.contains(&expected), "missing line: {}", expected);
    }

    // src is no longer earlier in sequence, so det's reference dangles
    instrument.move_component("det", Anchor::before("src")).unwrap();
    let err = instrument.validate().unwrap_err();
    assert!(matches!(
        err,
        BeamlineError::UnresolvedReference { ref component, ref reference }
            if component == "det" && reference == "src"
    ));
}

#[test]
fn test_numeric_defaults_coerced_by_type() {
    let input = "\
DEFINE INSTRUMENT demo (double flux = 1.2e13, double width = 0.05, int n = 1000)
TRACE
END
";
    let instrument = dsl::parse(input, &catalog()).unwrap();
    let Some(Value::Double(flux)) = instrument.parameter("flux").unwrap().value else {
        panic!("flux should coerce to a double");
    };
    approx::assert_relative_eq!(flux, 1.2e13);
    let Some(Value::Double(width)) = instrument.parameter("width").unwrap().value else {
        panic!("width should coerce to a double");
    };
    approx::assert_relative_eq!(width, 0.05);
    assert_eq!(instrument.parameter("n").unwrap().value, Some(Value::Int(1000)));
}

#[test]
fn test_unknown_kind_aborts_parse() {
    let input = "\
DEFINE INSTRUMENT demo ()
TRACE
COMPONENT g = Giude(w1 = 0.05, h1 = 0.05, l = 10)
AT (0,0,0) ABSOLUTE
END
";
    let err = dsl::parse(input, &catalog()).unwrap_err();
    assert!(matches!(err, BeamlineError::UnknownKind { ref kind } if kind == "Giude"));
}

#[test]
fn test_unknown_parameter_aborts_parse() {
    let input = "\
DEFINE INSTRUMENT demo ()
TRACE
COMPONENT s = Source(radius = 0.05, dist_ = 2)
AT (0,0,0) ABSOLUTE
END
";
    let err = dsl::parse(input, &catalog()).unwrap_err();
    assert!(matches!(
        err,
        BeamlineError::UnknownParameter { ref parameter, .. } if parameter == "dist_"
    ));
}

#[test]
fn test_catalog_extension_from_json() {
    let extra = r#"[
  {
    "kind": "Chopper",
    "params": [
      { "name": "frequency", "vtype": "Double", "default": { "Double": 100.0 } },
      { "name": "nu", "vtype": "Double" }
    ]
  }
]"#;
    let mut catalog = Catalog::builtin();
    catalog.extend_from_json(extra).unwrap();
    let input = "\
DEFINE INSTRUMENT demo ()
TRACE
COMPONENT chop = Chopper(nu = 42.5)
AT (0,0,1) ABSOLUTE
END
";
    let instrument = dsl::parse(input, &catalog).unwrap();
    assert_eq!(
        instrument.get("chop").unwrap().parameter("nu"),
        Some(&Value::Double(42.5))
    );
}

#[cfg(feature = "cli")]
#[test]
fn test_parse_file_from_disk() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("powder.instr");
    std::fs::write(&path, POWDER).unwrap();
    let instrument = dsl::parse_file(&path, &catalog()).unwrap();
    assert_eq!(instrument.name, "powder");

    let missing = dir.path().join("missing.instr");
    let err = dsl::parse_file(&missing, &catalog()).unwrap_err();
    assert!(matches!(err, BeamlineError::FileReadError { .. }));
}
