//! Parsers for config files overlaid onto flags.
//!
//! A parser turns the contents of a config file into `(name, value)` pairs,
//! in the order they should be applied. Names are matched against registered
//! flags by [ParseOptions](crate::ParseOptions).

use crate::BoxError;

/// Parse the contents of a config file into flag assignments.
pub trait ConfigParser {
    /// Parse `contents` into `(name, value)` pairs.
    fn parse(&self, contents: &str) -> Result<Vec<(String, String)>, BoxError>;
}

impl<F> ConfigParser for F
where
    F: Fn(&str) -> Result<Vec<(String, String)>, BoxError>,
{
    fn parse(&self, contents: &str) -> Result<Vec<(String, String)>, BoxError> {
        self(contents)
    }
}

/// The default parser, taking one flag per line.
///
/// ```text
/// # comments and blank lines are ignored
/// debug
/// name ferris   # trailing comments too
/// -limit 10
/// ```
///
/// A name without a value sets the flag to `true`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainParser;

impl ConfigParser for PlainParser {
    fn parse(&self, contents: &str) -> Result<Vec<(String, String)>, BoxError> {
        let mut out = Vec::new();

        for line in contents.lines() {
            let mut line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(index) = line.find(" #") {
                line = line[..index].trim();
            }

            let (name, value) = match line.split_once(char::is_whitespace) {
                Some((name, value)) => (name, value.trim()),
                None => (line, "true"),
            };

            out.push((name.trim_start_matches('-').to_owned(), value.to_owned()));
        }

        Ok(out)
    }
}

/// Parser for TOML config files.
///
/// Nested tables are flattened into dotted names, so `[server] port = 80`
/// sets the flag `server.port`. Arrays set the same flag once per element.
#[derive(Debug, Default, Clone, Copy)]
pub struct TomlParser;

impl ConfigParser for TomlParser {
    fn parse(&self, contents: &str) -> Result<Vec<(String, String)>, BoxError> {
        let table = toml::from_str::<toml::Table>(contents)?;
        let mut out = Vec::new();
        flatten(None, &table, &mut out)?;
        Ok(out)
    }
}

fn flatten(
    prefix: Option<&str>,
    table: &toml::Table,
    out: &mut Vec<(String, String)>,
) -> Result<(), BoxError> {
    for (key, value) in table {
        let name = match prefix {
            Some(prefix) => format!("{}.{}", prefix, key),
            None => key.clone(),
        };

        match value {
            toml::Value::Table(table) => flatten(Some(&name), table, out)?,
            toml::Value::Array(items) => {
                for item in items {
                    out.push((name.clone(), scalar(&name, item)?));
                }
            }
            value => {
                let value = scalar(&name, value)?;
                out.push((name, value));
            }
        }
    }

    Ok(())
}

fn scalar(name: &str, value: &toml::Value) -> Result<String, BoxError> {
    Ok(match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Integer(n) => n.to_string(),
        toml::Value::Float(n) => n.to_string(),
        toml::Value::Boolean(b) => b.to_string(),
        toml::Value::Datetime(d) => d.to_string(),
        toml::Value::Array(..) | toml::Value::Table(..) => {
            return Err(format!("unsupported nested value for {}", name).into());
        }
    })
}
