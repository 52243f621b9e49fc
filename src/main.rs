//! Beamline - instrument description tool
//!
//! Parses, checks and rewrites instrument description files, and extracts
//! sub-range instruments for split runs.
//!
//! # Usage
//!
//! ```bash
//! beamline check powder.instr
//! beamline render powder.instr -o powder_clean.instr
//! beamline subset powder.instr --from sample -o tail.instr
//! ```

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use beamline_core::error::{BeamlineError, Result};
use beamline_core::schema::Catalog;
use beamline_core::dsl;

/// Instrument description tool
#[derive(Parser)]
#[command(name = "beamline")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file with additional component schemas
    #[arg(long, global = true, value_name = "FILE")]
    components: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a file and run the sequence and binding checks
    Check {
        /// Instrument description file
        file: PathBuf,
    },

    /// Parse a file and write it back in canonical form
    Render {
        /// Instrument description file
        file: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Generate INITIALIZE code that logs the parameter values
        #[arg(long)]
        save_parameters: bool,
    },

    /// Dump the parsed model as JSON
    Json {
        /// Instrument description file
        file: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Extract the sub-range between two components as a new instrument
    Subset {
        /// Instrument description file
        file: PathBuf,

        /// First component of the subset
        #[arg(long)]
        from: Option<String>,

        /// First component after the subset
        #[arg(long)]
        to: Option<String>,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the known component kinds
    Components {
        /// Dump the full schema catalog as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let catalog = load_catalog(cli.components.as_deref())?;

    match cli.command {
        Commands::Check { file } => {
            let instrument = dsl::parse_file(&file, &catalog)?;
            instrument.validate()?;
            instrument.check_bindings()?;
            println!(
                "{}: {} components, {} parameters",
                instrument.name,
                instrument.components.len(),
                instrument.parameters.len()
            );
        }
        Commands::Render {
            file,
            output,
            save_parameters,
        } => {
            let instrument = dsl::parse_file(&file, &catalog)?;
            instrument.validate()?;
            let options = dsl::WriteOptions { save_parameters };
            emit(&dsl::render_with(&instrument, &options)?, output.as_deref())?;
        }
        Commands::Json { file, output } => {
            let instrument = dsl::parse_file(&file, &catalog)?;
            let json = instrument.to_json()? + "\n";
            emit(&json, output.as_deref())?;
        }
        Commands::Subset {
            file,
            from,
            to,
            output,
        } => {
            let mut instrument = dsl::parse_file(&file, &catalog)?;
            if let Some(from) = &from {
                instrument.set_run_from(from)?;
            }
            if let Some(to) = &to {
                instrument.set_run_to(to)?;
            }
            let subset = instrument.extract_subset()?;
            emit(&dsl::render(&subset)?, output.as_deref())?;
        }
        Commands::Components { json } => {
            if json {
                println!("{}", catalog.to_json()?);
            } else {
                for kind in catalog.kinds() {
                    println!("{}", kind);
                }
            }
        }
    }

    Ok(())
}

/// The built-in catalog, extended by the user's schema file when given.
fn load_catalog(extra: Option<&Path>) -> Result<Catalog> {
    let mut catalog = Catalog::builtin();
    if let Some(path) = extra {
        let text = std::fs::read_to_string(path).map_err(|e| BeamlineError::FileReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        catalog.extend_from_json(&text)?;
    }
    Ok(catalog)
}

fn emit(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text).map_err(|source| BeamlineError::WriteError { source })?
        }
        None => print!("{}", text),
    }
    Ok(())
}
