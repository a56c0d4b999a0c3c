//! Help and usage text generation for option tables using Clap.
//!
//! Nothing here prints; callers render the text on `HelpRequested` or a
//! usage error and decide how to exit.

use crate::table::{Arity, OptionSpec, OptionTable};
use clap::{Arg, ArgAction, Command};

/// Default column width for [`generate_option_table`].
pub const DEFAULT_COLUMN_WIDTH: usize = 20;

/// Build a Clap Command from an option table (for help generation only).
fn build_command(table: &OptionTable, program: &str) -> Command {
    let mut cmd = Command::new(program.to_string())
        .disable_help_flag(true)
        .disable_help_subcommand(true)
        .disable_version_flag(true);

    for option in table.iter() {
        cmd = cmd.arg(build_arg(option));
    }

    cmd
}

/// Build a Clap Arg from a declared option.
fn build_arg(option: &OptionSpec) -> Arg {
    let mut arg = Arg::new(option.long_name().to_string())
        .short(option.short_name())
        .long(option.long_name().to_string());

    match option.arity_kind() {
        Arity::None => {
            arg = arg.action(ArgAction::SetTrue);
        }
        Arity::Value => {
            arg = arg.action(ArgAction::Set);

            let value_name = if option.type_text().is_empty() {
                "VALUE"
            } else {
                option.type_text()
            };
            arg = arg.value_name(value_name.to_string());

            // The default is documentation only; Clap rejects it on required args
            if !option.default_text().is_empty() && !option.is_required() {
                arg = arg.default_value(option.default_text().to_string());
            }
        }
    }

    if option.is_required() {
        arg = arg.required(true);
    }

    if !option.help_text().is_empty() {
        arg = arg.help(option.help_text().to_string());
    }

    arg
}

/// Generate the full help text for a table.
pub fn generate_help(table: &OptionTable, program: &str) -> String {
    let mut cmd = build_command(table, program);
    cmd.render_help().to_string()
}

/// Generate the one-line usage string for a table.
pub fn generate_usage(table: &OptionTable, program: &str) -> String {
    let mut cmd = build_command(table, program);
    cmd.render_usage().to_string()
}

/// Generate a fixed-width NAME / TYPE / DEFAULT / DESCRIPTION listing.
///
/// Optional options are shown in brackets.
pub fn generate_option_table(table: &OptionTable, program: &str, width: usize) -> String {
    let mut out = format!("USAGE: {} [options]\n\n", program);
    out.push_str(&format!(
        "{:<width$}{:<width$}{:<width$}\t{}\n",
        "NAME",
        "TYPE",
        "DEFAULT",
        "DESCRIPTION",
        width = width
    ));

    for option in table.iter() {
        let name = if option.is_required() {
            format!("-{} --{}", option.short_name(), option.long_name())
        } else {
            format!("[ -{} --{}]", option.short_name(), option.long_name())
        };
        out.push_str(&format!(
            "{:<width$}{:<width$}{:<width$}\t{}\n",
            name,
            option.type_text(),
            option.default_text(),
            option.help_text(),
            width = width
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_table() -> OptionTable {
        let mut table = OptionTable::new();
        table
            .declare('k', "number", Arity::Value, true, "", "int", "Number of things")
            .unwrap();
        table
            .declare('s', "scale", Arity::Value, false, "1.0", "float", "Scale factor")
            .unwrap();
        table
            .declare('H', "help", Arity::None, false, "", "bool", "Print this message and exit")
            .unwrap();
        table
    }

    #[test]
    fn test_build_command_debug_asserts() {
        build_command(&example_table(), "test").debug_assert();
    }

    #[test]
    fn test_generate_help_lists_options() {
        let help = generate_help(&example_table(), "test");
        assert!(help.contains("-k, --number <int>"), "help was: {}", help);
        assert!(help.contains("Number of things"));
        assert!(help.contains("-s, --scale <float>"));
        assert!(help.contains("[default: 1.0]"));
        assert!(help.contains("-H, --help"));
        assert!(help.contains("Print this message and exit"));
    }

    #[test]
    fn test_generate_help_value_name_fallback() {
        let mut table = OptionTable::new();
        table
            .declare_spec(OptionSpec::new('o', "output").takes_value())
            .unwrap();
        let help = generate_help(&table, "test");
        assert!(help.contains("--output <VALUE>"), "help was: {}", help);
    }

    #[test]
    fn test_generate_usage_shows_required() {
        let usage = generate_usage(&example_table(), "test");
        assert!(usage.contains("test"));
        assert!(usage.contains("--number <int>"), "usage was: {}", usage);
    }

    #[test]
    fn test_generate_help_empty_table() {
        let help = generate_help(&OptionTable::new(), "bare");
        assert!(help.contains("bare"));
    }

    #[test]
    fn test_generate_option_table() {
        let text = generate_option_table(&example_table(), "test", DEFAULT_COLUMN_WIDTH);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "USAGE: test [options]");
        assert_eq!(lines[1], "");
        assert_eq!(
            lines[2],
            format!("{:<20}{:<20}{:<20}\tDESCRIPTION", "NAME", "TYPE", "DEFAULT")
        );
        assert_eq!(
            lines[3],
            format!("{:<20}{:<20}{:<20}\tNumber of things", "-k --number", "int", "")
        );
        assert_eq!(
            lines[4],
            format!("{:<20}{:<20}{:<20}\tScale factor", "[ -s --scale]", "float", "1.0")
        );
        assert_eq!(lines.len(), 6);
    }
}
