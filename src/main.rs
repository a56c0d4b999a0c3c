//! quickopt - Inspect option tables and how arguments parse against them.

use anyhow::{Context, Result};
use clap::{Args, Parser as ClapParser, Subcommand, ValueEnum};
use quickopt::{generate_help, generate_option_table, generate_usage, OptionSpec, OptionTable};
use quickopt::{help::DEFAULT_COLUMN_WIDTH, ParseError, Parser};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit status for arguments that do not match the table.
const USAGE_EXIT_CODE: u8 = 2;

/// Inspect option tables and how arguments parse against them.
#[derive(ClapParser, Debug)]
#[command(name = "quickopt", version, about, disable_help_subcommand = true)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where the option table comes from.
#[derive(Args, Debug)]
struct TableSource {
    /// JSON option table
    #[arg(long, conflicts_with = "table_file", required_unless_present = "table_file")]
    table: Option<String>,

    /// Path to a JSON option table
    #[arg(long)]
    table_file: Option<PathBuf>,

    /// Program name shown in help text
    #[arg(long, default_value = "program")]
    name: String,
}

impl TableSource {
    fn load(&self) -> Result<Parser> {
        let table = match (&self.table, &self.table_file) {
            (Some(json), _) => OptionTable::from_json(json).context("failed to parse table JSON")?,
            (None, Some(path)) => OptionTable::from_json_file(path)
                .with_context(|| format!("failed to load table from {}", path.display()))?,
            (None, None) => anyhow::bail!("one of --table or --table-file is required"),
        };
        Ok(Parser::with_table(self.name.clone(), table))
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse arguments and print every option's state as JSON
    Parse {
        #[command(flatten)]
        source: TableSource,

        /// Arguments to parse against the table
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Parse arguments and print one option's typed value as JSON
    Get {
        #[command(flatten)]
        source: TableSource,

        /// Long name (or single-character short name) of the option.
        /// A single character is tried as a short name first, so it picks
        /// the option with that short name over one with that long name.
        #[arg(long)]
        option: String,

        /// How to convert the raw value
        #[arg(long = "as", value_enum, default_value_t = View::Raw)]
        view: View,

        /// Arguments to parse against the table
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Print help text for the table
    Usage {
        #[command(flatten)]
        source: TableSource,

        /// Print the fixed-width column listing instead
        #[arg(long)]
        columns: bool,
    },
}

/// Typed view requested by `get`.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum View {
    Raw,
    Int,
    Float,
    Vector,
    Matrix,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match cli.command {
        Commands::Parse { source, args } => {
            let mut parser = source.load()?;
            if let Err(code) = parse_or_report(&mut parser, &args) {
                return Ok(ExitCode::from(code));
            }
            println!("{}", serde_json::to_string_pretty(&parsed_state(&parser))?);
        }
        Commands::Get {
            source,
            option,
            view,
            args,
        } => {
            let mut parser = source.load()?;
            if let Err(code) = parse_or_report(&mut parser, &args) {
                return Ok(ExitCode::from(code));
            }
            let spec = lookup(&parser, &option)?;
            let value = typed_view(spec, view)
                .with_context(|| format!("failed to read option '{}'", option))?;
            println!("{}", value);
        }
        Commands::Usage { source, columns } => {
            let parser = source.load()?;
            if columns {
                print!(
                    "{}",
                    generate_option_table(parser.table(), parser.program(), DEFAULT_COLUMN_WIDTH)
                );
            } else {
                print!("{}", generate_help(parser.table(), parser.program()));
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("quickopt=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Parse, or print help / the error and return the exit status to use.
fn parse_or_report(parser: &mut Parser, args: &[String]) -> Result<(), u8> {
    match parser.parse(args) {
        Ok(()) => Ok(()),
        Err(ParseError::HelpRequested) => {
            print!("{}", generate_help(parser.table(), parser.program()));
            Err(0)
        }
        Err(err) => {
            eprintln!("{}: {}", parser.program(), err);
            eprintln!("{}", generate_usage(parser.table(), parser.program()));
            Err(USAGE_EXIT_CODE)
        }
    }
}

/// Resolve a long name, falling back to a short name for one-character input.
fn lookup<'a>(parser: &'a Parser, name: &str) -> Result<&'a OptionSpec> {
    let mut chars = name.chars();
    if let (Some(short), None) = (chars.next(), chars.next()) {
        if let Ok(spec) = parser.get(short) {
            return Ok(spec);
        }
    }
    Ok(parser.get(name)?)
}

/// Every option's parse state plus the operands, as a JSON object.
fn parsed_state(parser: &Parser) -> Value {
    let mut options = Map::new();
    for spec in parser.table().iter() {
        options.insert(
            spec.long_name().to_string(),
            json!({
                "set": spec.was_set(),
                "value": spec.raw_value(),
            }),
        );
    }
    json!({
        "options": options,
        "operands": parser.operands(),
    })
}

fn typed_view(spec: &OptionSpec, view: View) -> Result<Value, quickopt::ValueError> {
    Ok(match view {
        View::Raw => json!(spec.raw_value()),
        View::Int => json!(spec.as_integer()?),
        View::Float => json!(spec.as_float()?),
        View::Vector => json!(spec.as_vector::<f64>()?),
        View::Matrix => json!(spec.as_matrix::<f64>()?.into_rows()),
    })
}
