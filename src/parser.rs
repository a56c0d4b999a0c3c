//! Argument scanning and option lookup.

use crate::table::{Arity, OptionSpec, OptionTable, TableError, HELP_LONG_NAME};
use thiserror::Error;

/// Errors that can occur during argument parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("{0}")]
    Usage(String),

    #[error("help requested")]
    HelpRequested,

    #[error("missing required option: {}", .0.join(", "))]
    MissingRequired(Vec<String>),
}

impl ParseError {
    /// True when the caller should show help and exit cleanly.
    pub fn is_help(&self) -> bool {
        matches!(self, ParseError::HelpRequested)
    }
}

/// Error returned when looking up a name that was never declared.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("unknown option '{0}'")]
    UnknownOption(String),
}

/// A name an option can be looked up by: its long name or its short name.
pub trait OptionKey {
    fn resolve(&self, table: &OptionTable) -> Option<usize>;
    fn display(&self) -> String;
}

impl OptionKey for &str {
    fn resolve(&self, table: &OptionTable) -> Option<usize> {
        table.index_of_long(self)
    }

    fn display(&self) -> String {
        format!("--{}", self)
    }
}

impl OptionKey for String {
    fn resolve(&self, table: &OptionTable) -> Option<usize> {
        table.index_of_long(self)
    }

    fn display(&self) -> String {
        format!("--{}", self)
    }
}

impl OptionKey for char {
    fn resolve(&self, table: &OptionTable) -> Option<usize> {
        table.index_of_short(*self)
    }

    fn display(&self) -> String {
        format!("-{}", self)
    }
}

/// Owns an option table, parses arguments against it and serves lookups.
#[derive(Debug, Clone)]
pub struct Parser {
    program: String,
    table: OptionTable,
    operands: Vec<String>,
}

impl Parser {
    pub fn new(program: impl Into<String>) -> Self {
        Self::with_table(program, OptionTable::new())
    }

    pub fn with_table(program: impl Into<String>, table: OptionTable) -> Self {
        Self {
            program: program.into(),
            table,
            operands: Vec::new(),
        }
    }

    /// Build a parser from a JSON table definition.
    pub fn from_json(program: impl Into<String>, json: &str) -> Result<Self, TableError> {
        Ok(Self::with_table(program, OptionTable::from_json(json)?))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn table(&self) -> &OptionTable {
        &self.table
    }

    /// Declare an option. See [`OptionTable::declare`].
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
        self.table
            .declare(short, long, arity, required, default_value, type_label, help)
    }

    pub fn declare_spec(&mut self, spec: OptionSpec) -> Result<&OptionSpec, TableError> {
        self.table.declare_spec(spec)
    }

    /// Look up an option by long name (`&str`) or short name (`char`).
    pub fn get<K: OptionKey>(&self, key: K) -> Result<&OptionSpec, LookupError> {
        key.resolve(&self.table)
            .map(|index| self.table.by_index(index))
            .ok_or_else(|| LookupError::UnknownOption(key.display()))
    }

    /// Non-option arguments from the last successful parse, in order.
    pub fn operands(&self) -> &[String] {
        &self.operands
    }

    /// Parse `std::env::args()`, skipping the program name.
    pub fn parse_env(&mut self) -> Result<(), ParseError> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        self.parse(&args)
    }

    /// Parse arguments (without the program name) against the table.
    ///
    /// Every descriptor is reset first. Results are committed only when the
    /// whole parse succeeds, so a failed parse leaves every option unset.
    /// Help wins over every other outcome; usage errors found while
    /// scanning are reported after the scan completes. A value option
    /// always consumes the next token, so in `-k --help` the string
    /// `--help` is the value of `-k` and no help is requested.
    pub fn parse<S: AsRef<str>>(&mut self, args: &[S]) -> Result<(), ParseError> {
        for option in self.table.options_mut() {
            option.reset();
        }
        self.operands.clear();

        tracing::debug!(
            program = %self.program,
            short_spec = %self.table.short_spec(),
            args = args.len(),
            "parsing arguments"
        );

        let mut seen: Vec<(bool, Option<String>)> = vec![(false, None); self.table.len()];
        let mut operands = Vec::new();
        let mut first_error: Option<String> = None;

        for event in Scanner::new(&self.table, args) {
            match event {
                Ok(Event::Help) => {
                    tracing::debug!("help requested");
                    return Err(ParseError::HelpRequested);
                }
                Ok(Event::Occurrence { index, value }) => {
                    tracing::trace!(
                        option = %self.table.by_index(index).long_name(),
                        value = ?value,
                        "matched option"
                    );
                    let slot = &mut seen[index];
                    slot.0 = true;
                    if value.is_some() {
                        slot.1 = value;
                    }
                }
                Ok(Event::Operand(operand)) => operands.push(operand),
                Err(message) => {
                    tracing::debug!(%message, "usage error");
                    first_error.get_or_insert(message);
                }
            }
        }

        if let Some(message) = first_error {
            return Err(ParseError::Usage(message));
        }

        let missing: Vec<String> = self
            .table
            .iter()
            .zip(&seen)
            .filter(|(option, (was_set, _))| option.is_required() && !was_set)
            .map(|(option, _)| option.long_name().to_string())
            .collect();
        if !missing.is_empty() {
            tracing::debug!(?missing, "required options not set");
            return Err(ParseError::MissingRequired(missing));
        }

        for (option, (was_set, raw_value)) in self.table.options_mut().iter_mut().zip(seen) {
            option.was_set = was_set;
            option.raw_value = raw_value;
        }
        self.operands = operands;
        Ok(())
    }
}

/// One step of the scan loop.
#[derive(Debug, PartialEq, Eq)]
enum Event {
    Help,
    Occurrence { index: usize, value: Option<String> },
    Operand(String),
}

/// Walks the argument list one recognized occurrence at a time.
struct Scanner<'a, S> {
    table: &'a OptionTable,
    args: &'a [S],
    pos: usize,
    options_done: bool,
    help_index: Option<usize>,
    help_short: Option<char>,
}

impl<'a, S: AsRef<str>> Scanner<'a, S> {
    fn new(table: &'a OptionTable, args: &'a [S]) -> Self {
        let help_index = table.index_of_long(HELP_LONG_NAME);
        let help_short = match help_index {
            Some(index) => Some(table.by_index(index).short_name()),
            None if table.index_of_short('h').is_none() => Some('h'),
            None => None,
        };
        Self {
            table,
            args,
            pos: 0,
            options_done: false,
            help_index,
            help_short,
        }
    }

    fn take_next(&mut self) -> Option<String> {
        let next = self.args.get(self.pos)?.as_ref().to_string();
        self.pos += 1;
        Some(next)
    }

    fn long_option(&mut self, body: &str) -> Result<Event, String> {
        let (name, inline_value) = match body.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (body, None),
        };

        if name == HELP_LONG_NAME {
            return Ok(Event::Help);
        }

        let index = self.resolve_long(name)?;
        if Some(index) == self.help_index {
            return Ok(Event::Help);
        }

        let table = self.table;
        let option = table.by_index(index);
        match option.arity_kind() {
            Arity::None => {
                if inline_value.is_some() {
                    return Err(format!(
                        "option '--{}' doesn't allow an argument",
                        option.long_name()
                    ));
                }
                Ok(Event::Occurrence { index, value: None })
            }
            Arity::Value => {
                let value = match inline_value {
                    Some(v) => v.to_string(),
                    None => self.take_next().ok_or_else(|| {
                        format!("option '--{}' requires an argument", option.long_name())
                    })?,
                };
                Ok(Event::Occurrence {
                    index,
                    value: Some(value),
                })
            }
        }
    }

    /// Exact long names win; otherwise a unique prefix is accepted.
    fn resolve_long(&self, name: &str) -> Result<usize, String> {
        if let Some(index) = self.table.index_of_long(name) {
            return Ok(index);
        }
        let candidates: Vec<usize> = if name.is_empty() {
            Vec::new()
        } else {
            self.table.longs_with_prefix(name).collect()
        };
        match candidates.as_slice() {
            [index] => Ok(*index),
            [] => Err(format!("unrecognized option '--{}'", name)),
            many => {
                let names: Vec<String> = many
                    .iter()
                    .map(|i| format!("'--{}'", self.table.by_index(*i).long_name()))
                    .collect();
                Err(format!(
                    "option '--{}' is ambiguous; possibilities: {}",
                    name,
                    names.join(" ")
                ))
            }
        }
    }

    fn short_option(&mut self, arg: &str) -> Result<Event, String> {
        let body = &arg[1..]; // Strip "-"
        let Some(c) = body.chars().next() else {
            return Err(format!("invalid option '{}'", arg));
        };
        let rest = &body[c.len_utf8()..];

        if Some(c) == self.help_short {
            return Ok(Event::Help);
        }

        let index = self
            .table
            .index_of_short(c)
            .ok_or_else(|| format!("invalid option -- '{}'", c))?;

        let table = self.table;
        match table.by_index(index).arity_kind() {
            Arity::None => {
                if !rest.is_empty() {
                    return Err(format!("grouped short options are not supported: '{}'", arg));
                }
                Ok(Event::Occurrence { index, value: None })
            }
            Arity::Value => {
                // Attached (-k5) or the next token (-k 5)
                let value = if !rest.is_empty() {
                    rest.to_string()
                } else {
                    self.take_next()
                        .ok_or_else(|| format!("option requires an argument -- '{}'", c))?
                };
                Ok(Event::Occurrence {
                    index,
                    value: Some(value),
                })
            }
        }
    }
}

impl<'a, S: AsRef<str>> Iterator for Scanner<'a, S> {
    type Item = Result<Event, String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let arg = self.take_next()?;

            if self.options_done {
                return Some(Ok(Event::Operand(arg)));
            }
            if arg == "--" {
                // Everything after is an operand
                self.options_done = true;
                continue;
            }

            return Some(if let Some(body) = arg.strip_prefix("--") {
                self.long_option(body)
            } else if arg.starts_with('-') && arg.len() > 1 {
                self.short_option(&arg)
            } else {
                Ok(Event::Operand(arg))
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    /// Two required value options plus a declared help flag.
    fn example_parser() -> Parser {
        let mut parser = Parser::new("test");
        parser
            .declare('k', "number", Arity::Value, true, "", "int", "Number of things")
            .unwrap();
        parser
            .declare('n', "vector", Arity::Value, true, "", "int[k]", "Count for each bin")
            .unwrap();
        parser
            .declare('H', "help", Arity::None, false, "", "bool", "Print this message and exit")
            .unwrap();
        parser
    }

    fn flags_parser() -> Parser {
        let mut parser = Parser::new("test");
        parser
            .declare_spec(OptionSpec::new('v', "verbose"))
            .unwrap();
        parser
            .declare_spec(OptionSpec::new('o', "output").takes_value())
            .unwrap();
        parser
            .declare_spec(OptionSpec::new('O', "output-format").takes_value())
            .unwrap();
        parser
    }

    #[test]
    fn test_parse_short_and_long() {
        let mut parser = example_parser();
        parser
            .parse(&args(&["-k", "3", "--vector", "1,2,3"]))
            .unwrap();

        let number = parser.get("number").unwrap();
        assert!(number.was_set());
        assert_eq!(number.raw_value(), Some("3"));
        assert_eq!(parser.get("vector").unwrap().raw_value(), Some("1,2,3"));
        assert!(!parser.get("help").unwrap().was_set());
    }

    #[test]
    fn test_parse_long_equals() {
        let mut parser = example_parser();
        parser
            .parse(&args(&["--number=7", "--vector=4"]))
            .unwrap();
        assert_eq!(parser.get('k').unwrap().raw_value(), Some("7"));
        assert_eq!(parser.get('n').unwrap().raw_value(), Some("4"));
    }

    #[test]
    fn test_parse_long_equals_empty() {
        let mut parser = flags_parser();
        parser.parse(&args(&["--output="])).unwrap();
        assert_eq!(parser.get("output").unwrap().raw_value(), Some(""));
    }

    #[test]
    fn test_parse_short_attached_value() {
        let mut parser = flags_parser();
        parser.parse(&args(&["-ofile.txt"])).unwrap();
        assert_eq!(parser.get('o').unwrap().raw_value(), Some("file.txt"));
    }

    #[test]
    fn test_value_may_start_with_dash() {
        let mut parser = example_parser();
        parser.parse(&args(&["-k", "-5", "-n", "--"])).unwrap();
        assert_eq!(parser.get('k').unwrap().raw_value(), Some("-5"));
        assert_eq!(parser.get('n').unwrap().raw_value(), Some("--"));
    }

    #[test]
    fn test_flag_sets_without_value() {
        let mut parser = flags_parser();
        parser.parse(&args(&["--verbose"])).unwrap();
        let verbose = parser.get("verbose").unwrap();
        assert!(verbose.was_set());
        assert_eq!(verbose.raw_value(), None);
    }

    #[test]
    fn test_repeated_option_keeps_last_value() {
        let mut parser = flags_parser();
        parser
            .parse(&args(&["-o", "first", "--output", "second"]))
            .unwrap();
        assert_eq!(parser.get("output").unwrap().raw_value(), Some("second"));
    }

    #[test]
    fn test_long_and_short_lookup_share_state() {
        let mut parser = example_parser();
        parser.parse(&args(&["-k", "9", "-n", "1"])).unwrap();
        let by_long = parser.get("number").unwrap();
        let by_short = parser.get('k').unwrap();
        assert!(std::ptr::eq(by_long, by_short));
        assert_eq!(by_long.raw_value(), by_short.raw_value());
    }

    #[test]
    fn test_unique_long_prefix() {
        let mut parser = flags_parser();
        parser.parse(&args(&["--verb", "--output-f", "json"])).unwrap();
        assert!(parser.get("verbose").unwrap().was_set());
        assert_eq!(parser.get("output-format").unwrap().raw_value(), Some("json"));
    }

    #[test]
    fn test_exact_long_name_beats_prefix() {
        let mut parser = flags_parser();
        parser.parse(&args(&["--output", "x"])).unwrap();
        assert_eq!(parser.get("output").unwrap().raw_value(), Some("x"));
        assert!(!parser.get("output-format").unwrap().was_set());
    }

    #[test]
    fn test_error_ambiguous_prefix() {
        let mut parser = flags_parser();
        let result = parser.parse(&args(&["--out", "x"]));
        assert!(matches!(result, Err(ParseError::Usage(msg)) if msg.contains("ambiguous")));
    }

    #[test]
    fn test_operands_collected() {
        let mut parser = flags_parser();
        parser
            .parse(&args(&["in.txt", "-v", "-", "--", "-o", "--verbose"]))
            .unwrap();
        assert_eq!(parser.operands(), &["in.txt", "-", "-o", "--verbose"]);
        assert!(parser.get('v').unwrap().was_set());
        assert!(!parser.get('o').unwrap().was_set());
    }

    #[test]
    fn test_error_unknown_long_option() {
        let mut parser = flags_parser();
        let result = parser.parse(&args(&["--unknown"]));
        assert_eq!(
            result,
            Err(ParseError::Usage("unrecognized option '--unknown'".to_string()))
        );
    }

    #[test]
    fn test_error_unknown_short_option() {
        let mut parser = flags_parser();
        let result = parser.parse(&args(&["-x"]));
        assert_eq!(
            result,
            Err(ParseError::Usage("invalid option -- 'x'".to_string()))
        );
    }

    #[test]
    fn test_error_missing_value() {
        let mut parser = flags_parser();
        assert!(matches!(
            parser.parse(&args(&["--output"])),
            Err(ParseError::Usage(msg)) if msg.contains("requires an argument")
        ));
        assert!(matches!(
            parser.parse(&args(&["-o"])),
            Err(ParseError::Usage(msg)) if msg.contains("requires an argument")
        ));
    }

    #[test]
    fn test_error_flag_with_inline_value() {
        let mut parser = flags_parser();
        let result = parser.parse(&args(&["--verbose=yes"]));
        assert!(matches!(result, Err(ParseError::Usage(msg)) if msg.contains("doesn't allow")));
    }

    #[test]
    fn test_error_grouped_short_flags() {
        let mut parser = flags_parser();
        let result = parser.parse(&args(&["-vo", "x"]));
        assert!(matches!(result, Err(ParseError::Usage(msg)) if msg.contains("grouped")));
    }

    #[test]
    fn test_error_missing_required_names_all() {
        let mut parser = example_parser();
        let result = parser.parse(&args(&[]));
        assert_eq!(
            result,
            Err(ParseError::MissingRequired(vec![
                "number".to_string(),
                "vector".to_string()
            ]))
        );

        let result = parser.parse(&args(&["-n", "1"]));
        assert_eq!(
            result,
            Err(ParseError::MissingRequired(vec!["number".to_string()]))
        );
    }

    #[test]
    fn test_missing_required_message() {
        let err = ParseError::MissingRequired(vec!["number".to_string(), "vector".to_string()]);
        assert_eq!(err.to_string(), "missing required option: number, vector");
    }

    #[test]
    fn test_failed_parse_leaves_options_unset() {
        let mut parser = example_parser();
        parser.parse(&args(&["-k", "1", "-n", "2", "x"])).unwrap();
        assert!(parser.get('k').unwrap().was_set());

        let result = parser.parse(&args(&["-k", "5"]));
        assert!(matches!(result, Err(ParseError::MissingRequired(_))));
        assert!(!parser.get('k').unwrap().was_set());
        assert_eq!(parser.get('k').unwrap().raw_value(), None);
        assert!(parser.operands().is_empty());
    }

    #[test]
    fn test_reparse_resets_previous_results() {
        let mut parser = flags_parser();
        parser.parse(&args(&["-v", "-o", "a"])).unwrap();
        parser.parse(&args(&["-o", "b"])).unwrap();
        assert!(!parser.get('v').unwrap().was_set());
        assert_eq!(parser.get('o').unwrap().raw_value(), Some("b"));
    }

    #[test]
    fn test_help_long() {
        let mut parser = example_parser();
        assert_eq!(
            parser.parse(&args(&["--help"])),
            Err(ParseError::HelpRequested)
        );
    }

    #[test]
    fn test_help_declared_short_alias() {
        let mut parser = example_parser();
        assert_eq!(parser.parse(&args(&["-H"])), Err(ParseError::HelpRequested));
    }

    #[test]
    fn test_help_default_short_alias() {
        let mut parser = flags_parser();
        assert_eq!(parser.parse(&args(&["-h"])), Err(ParseError::HelpRequested));
        assert_eq!(
            parser.parse(&args(&["--help"])),
            Err(ParseError::HelpRequested)
        );
    }

    #[test]
    fn test_h_is_ordinary_when_declared_for_something_else() {
        let mut parser = Parser::new("test");
        parser
            .declare_spec(OptionSpec::new('h', "height").takes_value())
            .unwrap();
        parser.parse(&args(&["-h", "180"])).unwrap();
        assert_eq!(parser.get("height").unwrap().raw_value(), Some("180"));
    }

    #[test]
    fn test_help_beats_missing_required() {
        let mut parser = example_parser();
        assert_eq!(
            parser.parse(&args(&["-k", "1", "--help"])),
            Err(ParseError::HelpRequested)
        );
    }

    #[test]
    fn test_help_beats_earlier_usage_error() {
        let mut parser = example_parser();
        assert_eq!(
            parser.parse(&args(&["--bogus", "-H"])),
            Err(ParseError::HelpRequested)
        );
    }

    fn value_help_parser() -> Parser {
        let mut parser = Parser::new("test");
        parser
            .declare_spec(OptionSpec::new('H', "help").takes_value().type_label("topic"))
            .unwrap();
        parser
            .declare_spec(OptionSpec::new('k', "number").takes_value().required(true))
            .unwrap();
        parser
    }

    #[test]
    fn test_help_declared_with_value_still_requests_help() {
        let mut parser = value_help_parser();
        assert_eq!(
            parser.parse(&args(&["--help", "topic"])),
            Err(ParseError::HelpRequested)
        );
        assert_eq!(
            parser.parse(&args(&["-H", "topic"])),
            Err(ParseError::HelpRequested)
        );
        assert!(parser.operands().is_empty());
        assert_eq!(parser.get("help").unwrap().raw_value(), None);
    }

    #[test]
    fn test_help_long_prefix_and_inline_value() {
        let mut parser = value_help_parser();
        assert_eq!(parser.parse(&args(&["--he"])), Err(ParseError::HelpRequested));
        assert_eq!(
            parser.parse(&args(&["--help=x"])),
            Err(ParseError::HelpRequested)
        );
    }

    #[test]
    fn test_help_consumed_as_option_value() {
        let mut parser = example_parser();
        parser
            .parse(&args(&["-k", "--help", "-n", "1"]))
            .unwrap();
        assert_eq!(parser.get('k').unwrap().raw_value(), Some("--help"));
        assert!(!parser.get("help").unwrap().was_set());
    }

    #[test]
    fn test_help_after_double_dash_is_operand() {
        let mut parser = flags_parser();
        parser.parse(&args(&["--", "--help"])).unwrap();
        assert_eq!(parser.operands(), &["--help"]);
    }

    #[test]
    fn test_get_unknown_option() {
        let parser = example_parser();
        assert_eq!(
            parser.get("missing").unwrap_err(),
            LookupError::UnknownOption("--missing".to_string())
        );
        assert_eq!(
            parser.get('z').unwrap_err(),
            LookupError::UnknownOption("-z".to_string())
        );
    }

    #[test]
    fn test_get_before_parse() {
        let parser = example_parser();
        let number = parser.get("number").unwrap();
        assert!(!number.was_set());
        assert_eq!(number.type_text(), "int");
    }

    #[test]
    fn test_parse_accepts_str_slices() {
        let mut parser = flags_parser();
        parser.parse(&["-o", "x"]).unwrap();
        assert_eq!(parser.get('o').unwrap().raw_value(), Some("x"));
    }

    #[test]
    fn test_from_json() {
        let mut parser = Parser::from_json(
            "demo",
            r#"{"options": [{"short": "k", "long": "number", "arity": "value", "required": true}]}"#,
        )
        .unwrap();
        assert_eq!(parser.program(), "demo");
        parser.parse(&args(&["--number", "12"])).unwrap();
        assert_eq!(parser.get("number").unwrap().as_integer(), Ok(12));
    }
}
