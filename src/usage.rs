//! Rendering of usage blocks.
//!
//! The default layout looks like this:
//!
//! ```text
//! USAGE
//!   example [flags] <subcommand>
//!
//! A longer description of the command.
//!
//! SUBCOMMANDS
//!   foo  does foo things
//!   bar  does bar things
//!
//! FLAGS
//!   -debug false  debug mode
//!   -name ...     who to greet
//! ```

use std::fmt;

use crate::command::Command;
use crate::flag::FlagSet;

/// Render the usage block of a command.
///
/// Sections without content are left out. A flag whose default is empty is
/// shown with `...` as its default.
///
/// # Examples
///
/// ```rust
/// use cmdwerk::{usage, Command};
///
/// let command = Command::new("example")
///     .long_help("Does example things.")
///     .subcommand(Command::new("foo").short_help("does foo things"));
///
/// assert_eq!(
///     usage::default_usage(&command),
///     "USAGE\n  example\n\nDoes example things.\n\nSUBCOMMANDS\n  foo  does foo things"
/// );
/// ```
pub fn default_usage(command: &Command) -> String {
    let mut out = String::new();

    out.push_str("USAGE\n");

    let short_usage = match command.get_short_usage() {
        "" => command.name(),
        short_usage => short_usage,
    };

    out.push_str("  ");
    out.push_str(short_usage);
    out.push_str("\n\n");

    if !command.get_long_help().is_empty() {
        out.push_str(command.get_long_help());
        out.push_str("\n\n");
    }

    if !command.get_subcommands().is_empty() {
        let mut table = Table::default();

        for subcommand in command.get_subcommands() {
            table.row(format!("  {}", subcommand.name()), subcommand.get_short_help());
        }

        out.push_str("SUBCOMMANDS\n");
        out.push_str(&table.to_string());
        out.push('\n');
    }

    if let Some(flag_set) = command.get_flag_set().filter(|fs| count_flags(fs) > 0) {
        let mut table = Table::default();

        flag_set.visit_all(|flag| {
            table.row(
                format!("  -{} {}", flag.name(), display_default(flag.default_value())),
                flag.usage(),
            );
        });

        out.push_str("FLAGS\n");
        out.push_str(&table.to_string());
        out.push('\n');
    }

    out.trim().to_owned()
}

/// Count the flags registered in a flag set.
pub fn count_flags(flag_set: &FlagSet) -> usize {
    let mut n = 0;
    flag_set.visit_all(|_| n += 1);
    n
}

/// How a flag default is displayed, `...` standing in for an empty default.
pub fn display_default(default: &str) -> &str {
    if default.is_empty() {
        "..."
    } else {
        default
    }
}

/// Two aligned columns.
///
/// The first column is padded to its widest cell plus [Table::PADDING].
#[derive(Default)]
struct Table {
    rows: Vec<(String, String)>,
    width: usize,
}

impl Table {
    const PADDING: usize = 2;

    fn row(&mut self, first: String, second: &str) {
        self.width = usize::max(self.width, first.chars().count());
        self.rows.push((first, second.to_owned()));
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (first, second) in &self.rows {
            f.write_str(first)?;
            fill_spaces(f, self.width + Self::PADDING - first.chars().count())?;
            f.write_str(second)?;
            writeln!(f)?;
        }

        Ok(())
    }
}

fn fill_spaces(f: &mut fmt::Formatter<'_>, mut count: usize) -> fmt::Result {
    // Static buffer for quicker whitespace filling.
    static BUF: &str = "                                                                ";

    while count > 0 {
        f.write_str(&BUF[..usize::min(count, BUF.len())])?;
        count = count.saturating_sub(BUF.len());
    }

    Ok(())
}
