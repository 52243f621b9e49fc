//! Builtin component schemas.
//!
//! A small library of common beamline kinds so the parser, CLI and tests
//! have a concrete schema source without an installation-specific catalog.
//! Site catalogs loaded from JSON can extend or replace any of these.

use crate::value::{Value, ValueType};

use super::{Catalog, ComponentSchema, ParamSchema};

fn double(name: &str) -> ParamSchema {
    ParamSchema::new(name, ValueType::Double)
}

fn int(name: &str) -> ParamSchema {
    ParamSchema::new(name, ValueType::Int)
}

fn string(name: &str) -> ParamSchema {
    ParamSchema::new(name, ValueType::String)
}

pub(super) fn catalog() -> Catalog {
    let mut catalog = Catalog::new();

    // A bare coordinate anchor, used to hang other components off.
    catalog.insert(ComponentSchema::new("Arm"));

    catalog.insert(
        ComponentSchema::new("Source")
            .param(double("radius").with_default(0.1).with_unit("m"))
            .param(double("dist").with_default(1.0).with_unit("m"))
            .param(double("focus_xw").with_default(0.05).with_unit("m"))
            .param(double("focus_yh").with_default(0.05).with_unit("m"))
            .param(double("lambda0").with_default(1.0).with_unit("AA"))
            .param(double("dlambda").with_default(0.1).with_unit("AA"))
            .param(double("flux").with_default(1e13).with_unit("1/(s*cm**2*st*AA)")),
    );

    catalog.insert(
        ComponentSchema::new("Slit")
            .param(double("xmin").with_default(-0.01).with_unit("m"))
            .param(double("xmax").with_default(0.01).with_unit("m"))
            .param(double("ymin").with_default(-0.01).with_unit("m"))
            .param(double("ymax").with_default(0.01).with_unit("m"))
            .param(
                double("radius")
                    .with_default(0.0)
                    .with_unit("m")
                    .with_comment("circular opening when nonzero"),
            ),
    );

    catalog.insert(
        ComponentSchema::new("Guide")
            .param(double("w1").with_unit("m").with_comment("entry width"))
            .param(double("h1").with_unit("m").with_comment("entry height"))
            .param(double("w2").with_default(0.0).with_unit("m"))
            .param(double("h2").with_default(0.0).with_unit("m"))
            .param(double("l").with_unit("m").with_comment("guide length"))
            .param(double("m").with_default(1.0).with_unit("1"))
            .param(double("R0").with_default(0.99).with_unit("1"))
            .param(double("Qc").with_default(0.0219).with_unit("AA-1"))
            .param(double("alpha").with_default(6.07).with_unit("AA"))
            .param(double("W").with_default(0.003).with_unit("AA-1")),
    );

    catalog.insert(
        ComponentSchema::new("Sample")
            .param(double("radius").with_default(0.005).with_unit("m"))
            .param(double("height").with_default(0.01).with_unit("m"))
            .param(double("pack").with_default(1.0).with_unit("1"))
            .param(double("sigma_abs").with_default(0.0).with_unit("barns"))
            .param(double("sigma_inc").with_default(0.0).with_unit("barns")),
    );

    catalog.insert(
        ComponentSchema::new("Monitor")
            .param(
                string("filename")
                    .with_default(Value::Str(String::new()))
                    .with_comment("output file, instrument name when empty"),
            )
            .param(double("xwidth").with_default(0.1).with_unit("m"))
            .param(double("yheight").with_default(0.1).with_unit("m"))
            .param(int("restore_neutron").with_default(0_i64).with_unit("1")),
    );

    // Boundary kinds used when a contiguous slice of an instrument is run on
    // its own: the input replays rays recorded by the output.
    catalog.insert(
        ComponentSchema::new("MCPL_input")
            .param(string("filename").with_default(Value::Str(String::new())))
            .param(int("repeat_count").with_default(1_i64).with_unit("1"))
            .param(int("verbose").with_default(0_i64).with_unit("1")),
    );

    catalog.insert(
        ComponentSchema::new("MCPL_output")
            .param(string("filename").with_default(Value::Str(String::new())))
            .param(int("verbose").with_default(0_i64).with_unit("1")),
    );

    catalog
}
