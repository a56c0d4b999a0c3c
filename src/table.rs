//! Option declarations and the table that holds them.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Long name that always requests help instead of being handled as an option.
pub const HELP_LONG_NAME: &str = "help";

/// Errors that can occur while declaring options or loading a table.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("duplicate option: {0}")]
    DuplicateOption(String),

    #[error("invalid short option '{0}': must be a printable ASCII character other than '-', ':' or '='")]
    InvalidShortName(char),

    #[error("invalid long option '{0}': must be non-empty, must not start with '-' and must not contain '=' or whitespace")]
    InvalidLongName(String),

    #[error("failed to parse JSON option table: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read option table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Whether an option consumes a following value token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Arity {
    /// A bare flag (e.g., --verbose)
    #[default]
    None,
    /// An option that takes a value (e.g., --number 5)
    Value,
}

/// A declared command-line option and, after parsing, its results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionSpec {
    pub(crate) short: char,
    pub(crate) long: String,
    pub(crate) arity: Arity,
    pub(crate) required: bool,
    pub(crate) default_value: String,
    pub(crate) type_label: String,
    pub(crate) help: String,
    pub(crate) was_set: bool,
    pub(crate) raw_value: Option<String>,
}

impl OptionSpec {
    /// Create an optional, no-value option with empty documentation.
    pub fn new(short: char, long: impl Into<String>) -> Self {
        Self {
            short,
            long: long.into(),
            arity: Arity::None,
            required: false,
            default_value: String::new(),
            type_label: String::new(),
            help: String::new(),
            was_set: false,
            raw_value: None,
        }
    }

    pub fn arity(mut self, arity: Arity) -> Self {
        self.arity = arity;
        self
    }

    /// Shorthand for `arity(Arity::Value)`.
    pub fn takes_value(self) -> Self {
        self.arity(Arity::Value)
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Documented default. It is never applied to the raw value.
    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        self.default_value = default.into();
        self
    }

    pub fn type_label(mut self, label: impl Into<String>) -> Self {
        self.type_label = label.into();
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    pub fn short_name(&self) -> char {
        self.short
    }

    pub fn long_name(&self) -> &str {
        &self.long
    }

    pub fn arity_kind(&self) -> Arity {
        self.arity
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn default_text(&self) -> &str {
        &self.default_value
    }

    pub fn type_text(&self) -> &str {
        &self.type_label
    }

    pub fn help_text(&self) -> &str {
        &self.help
    }

    /// True once the option was observed during the last successful parse.
    pub fn was_set(&self) -> bool {
        self.was_set
    }

    /// The captured value token, present only for set value options.
    pub fn raw_value(&self) -> Option<&str> {
        self.raw_value.as_deref()
    }

    pub(crate) fn reset(&mut self) {
        self.was_set = false;
        self.raw_value = None;
    }
}

/// Append-only table of option declarations.
///
/// Descriptors live in a single list; the long and short name maps both
/// index into it.
#[derive(Debug, Clone, Default)]
pub struct OptionTable {
    options: Vec<OptionSpec>,
    by_long: HashMap<String, usize>,
    by_short: HashMap<char, usize>,
}

impl OptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an option from its individual attributes.
    #[allow(clippy::too_many_arguments)]
    pub fn declare(
        &mut self,
        short: char,
        long: &str,
        arity: Arity,
        required: bool,
        default_value: &str,
        type_label: &str,
        help: &str,
    ) -> Result<&OptionSpec, TableError> {
        self.declare_spec(
            OptionSpec::new(short, long)
                .arity(arity)
                .required(required)
                .default_value(default_value)
                .type_label(type_label)
                .help(help),
        )
    }

    /// Declare an option from a prepared spec.
    ///
    /// Rejects a short or long name that is already taken, leaving the
    /// table unchanged.
    pub fn declare_spec(&mut self, mut spec: OptionSpec) -> Result<&OptionSpec, TableError> {
        validate_short(spec.short)?;
        validate_long(&spec.long)?;
        if self.by_long.contains_key(&spec.long) {
            return Err(TableError::DuplicateOption(format!("--{}", spec.long)));
        }
        if self.by_short.contains_key(&spec.short) {
            return Err(TableError::DuplicateOption(format!("-{}", spec.short)));
        }

        spec.reset();
        let index = self.options.len();
        tracing::debug!(
            short = %spec.short,
            long = %spec.long,
            arity = ?spec.arity,
            required = spec.required,
            "declared option"
        );
        self.by_long.insert(spec.long.clone(), index);
        self.by_short.insert(spec.short, index);
        self.options.push(spec);
        Ok(&self.options[index])
    }

    /// Parse a JSON table definition.
    pub fn from_json(json: &str) -> Result<OptionTable, TableError> {
        let file: TableFile = serde_json::from_str(json)?;
        let mut table = OptionTable::new();
        for entry in file.options {
            table.declare_spec(entry.into_spec())?;
        }
        Ok(table)
    }

    /// Read and parse a JSON table definition from disk.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<OptionTable, TableError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Declarations in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &OptionSpec> {
        self.options.iter()
    }

    pub fn index_of_long(&self, long: &str) -> Option<usize> {
        self.by_long.get(long).copied()
    }

    pub fn index_of_short(&self, short: char) -> Option<usize> {
        self.by_short.get(&short).copied()
    }

    /// Long names starting with `prefix`, in declaration order.
    pub(crate) fn longs_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = usize> + 'a {
        self.options
            .iter()
            .enumerate()
            .filter(move |(_, o)| o.long.starts_with(prefix))
            .map(|(i, _)| i)
    }

    pub fn by_index(&self, index: usize) -> &OptionSpec {
        &self.options[index]
    }

    pub(crate) fn options_mut(&mut self) -> &mut [OptionSpec] {
        &mut self.options
    }

    /// The compact short-option alphabet, with `:` after value options.
    pub fn short_spec(&self) -> String {
        let mut spec = String::with_capacity(self.options.len() * 2);
        for option in &self.options {
            spec.push(option.short);
            if option.arity == Arity::Value {
                spec.push(':');
            }
        }
        spec
    }
}

fn validate_short(short: char) -> Result<(), TableError> {
    if !short.is_ascii_graphic() || matches!(short, '-' | ':' | '=') {
        return Err(TableError::InvalidShortName(short));
    }
    Ok(())
}

fn validate_long(long: &str) -> Result<(), TableError> {
    if long.is_empty() || long.starts_with('-') || long.contains(|c: char| c == '=' || c.is_whitespace()) {
        return Err(TableError::InvalidLongName(long.to_string()));
    }
    Ok(())
}

/// On-disk shape of a table definition.
#[derive(Debug, Deserialize)]
struct TableFile {
    #[serde(default)]
    options: Vec<TableEntry>,
}

#[derive(Debug, Deserialize)]
struct TableEntry {
    short: char,
    long: String,
    #[serde(default)]
    arity: Arity,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    default: String,
    #[serde(default, rename = "type")]
    type_label: String,
    #[serde(default)]
    help: String,
}

impl TableEntry {
    fn into_spec(self) -> OptionSpec {
        OptionSpec::new(self.short, self.long)
            .arity(self.arity)
            .required(self.required)
            .default_value(self.default)
            .type_label(self.type_label)
            .help(self.help)
    }
}
