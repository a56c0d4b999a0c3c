//! quickopt - Declarative command-line option tables with typed values.
//!
//! Declare options once, parse process arguments against them, then read
//! each option's raw value or convert it on demand to an integer, float,
//! `,`-delimited vector or `;`/`,`-delimited matrix.

pub mod help;
pub mod parser;
pub mod table;
pub mod value;

pub use help::{generate_help, generate_option_table, generate_usage};
pub use parser::{LookupError, OptionKey, ParseError, Parser};
pub use table::{Arity, OptionSpec, OptionTable, TableError};
pub use value::{Matrix, ValueError};
