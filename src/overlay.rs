use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::{ConfigParser, PlainParser};
use crate::env::Environment;
use crate::flag::FlagSet;
use crate::{Error, ErrorKind};

/// Options for how a [Command](crate::Command) fills in its flags.
///
/// Flags are first parsed from the command line. Flags which were not
/// provided there can then be taken from environment variables, and after
/// that from a config file. The command line always has the last word, then
/// the environment, then the config file.
///
/// # Examples
///
/// ```rust
/// use cmdwerk::{Command, ParseOptions, Slot, StaticEnvironment};
///
/// # fn main() -> Result<(), cmdwerk::Error> {
/// let limit = Slot::new(0u64);
///
/// let mut command = Command::new("demo")
///     .options(ParseOptions::new().env_var_prefix("DEMO"))
///     .flags({
///         let limit = limit.clone();
///         move |fs| fs.uint_var(&limit, "max-items", 10, "maximum items")
///     });
///
/// let env = StaticEnvironment::new().var("DEMO_MAX_ITEMS", "30");
/// command.parse_with(Vec::<String>::new(), &env)?;
/// assert_eq!(limit.get(), 30);
/// # Ok(()) }
/// ```
#[derive(Default)]
pub struct ParseOptions {
    env_var_prefix: Option<String>,
    env_var_no_prefix: bool,
    config_file: Option<PathBuf>,
    config_file_flag: Option<String>,
    config_parser: Option<Box<dyn ConfigParser>>,
    allow_missing_config_file: bool,
    ignore_undefined: bool,
}

impl ParseOptions {
    /// Construct options which only parse the command line.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up flags from environment variables named `PREFIX_FLAG_NAME`.
    ///
    /// Flag names are upper-cased and `-`, `.` and `/` are replaced by `_`.
    pub fn env_var_prefix(mut self, prefix: &str) -> Self {
        self.env_var_prefix = Some(prefix.to_owned());
        self
    }

    /// Look up flags from environment variables named after the flag alone.
    pub fn env_var_no_prefix(mut self) -> Self {
        self.env_var_no_prefix = true;
        self
    }

    /// Read flags from the config file at `path`.
    pub fn config_file<P>(mut self, path: P) -> Self
    where
        P: Into<PathBuf>,
    {
        self.config_file = Some(path.into());
        self
    }

    /// Read the path of the config file from the flag `name`.
    ///
    /// This only applies if no path was given through
    /// [ParseOptions::config_file].
    pub fn config_file_flag(mut self, name: &str) -> Self {
        self.config_file_flag = Some(name.to_owned());
        self
    }

    /// Use the given parser for config files. Defaults to [PlainParser].
    pub fn config_parser<P>(mut self, parser: P) -> Self
    where
        P: ConfigParser + 'static,
    {
        self.config_parser = Some(Box::new(parser));
        self
    }

    /// Don't treat a missing config file as an error.
    pub fn allow_missing_config_file(mut self) -> Self {
        self.allow_missing_config_file = true;
        self
    }

    /// Skip names in the config file which aren't registered flags.
    pub fn ignore_undefined(mut self) -> Self {
        self.ignore_undefined = true;
        self
    }

    /// Parse `args` into the flag set, then overlay the environment and the
    /// config file.
    pub(crate) fn parse(
        &self,
        fs: &mut FlagSet,
        args: Vec<String>,
        env: &dyn Environment,
    ) -> Result<(), Error> {
        fs.parse(args)?;

        if self.env_var_prefix.is_some() || self.env_var_no_prefix {
            self.overlay_env(fs, env)?;
        }

        if let Some(path) = self.config_path(fs) {
            self.overlay_config(fs, &path)?;
        }

        Ok(())
    }

    fn overlay_env(&self, fs: &mut FlagSet, env: &dyn Environment) -> Result<(), Error> {
        let names = unset_flags(fs);

        for name in names {
            let var = env_key(self.env_var_prefix.as_deref(), &name);

            let value = match env.var(&var) {
                Some(value) => value,
                None => continue,
            };

            fs.set(&name, &value).map_err(|error| {
                Error::new(ErrorKind::EnvVar {
                    name: name.as_str().into(),
                    var: var.as_str().into(),
                    error,
                })
            })?;

            tracing::trace!(set = fs.name(), flag = %name, %var, "flag set from environment");
        }

        Ok(())
    }

    fn config_path(&self, fs: &FlagSet) -> Option<PathBuf> {
        if let Some(path) = &self.config_file {
            return Some(path.clone());
        }

        let flag = fs.lookup(self.config_file_flag.as_deref()?)?;
        let value = flag.value();

        if value.is_empty() {
            return None;
        }

        Some(PathBuf::from(value))
    }

    fn overlay_config(&self, fs: &mut FlagSet, path: &Path) -> Result<(), Error> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(error)
                if error.kind() == io::ErrorKind::NotFound && self.allow_missing_config_file =>
            {
                tracing::debug!(path = %path.display(), "config file missing, skipping");
                return Ok(());
            }
            Err(error) => {
                return Err(Error::new(ErrorKind::ConfigFile {
                    path: path.to_owned(),
                    error,
                }))
            }
        };

        let pairs = match &self.config_parser {
            Some(parser) => parser.parse(&contents),
            None => PlainParser.parse(&contents),
        };

        let pairs = pairs.map_err(|error| {
            Error::new(ErrorKind::ConfigParse {
                path: path.to_owned(),
                error,
            })
        })?;

        let provided = provided_flags(fs);

        for (name, value) in pairs {
            if fs.lookup(&name).is_none() {
                if self.ignore_undefined {
                    continue;
                }

                return Err(Error::new(ErrorKind::ConfigUndefinedFlag {
                    name: name.into(),
                }));
            }

            if provided.contains(&name) {
                continue;
            }

            fs.set(&name, &value).map_err(|error| {
                Error::new(ErrorKind::ConfigValue {
                    name: name.as_str().into(),
                    error,
                })
            })?;

            tracing::trace!(set = fs.name(), flag = %name, path = %path.display(), "flag set from config file");
        }

        Ok(())
    }
}

impl fmt::Debug for ParseOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParseOptions")
            .field("env_var_prefix", &self.env_var_prefix)
            .field("env_var_no_prefix", &self.env_var_no_prefix)
            .field("config_file", &self.config_file)
            .field("config_file_flag", &self.config_file_flag)
            .field("config_parser", &self.config_parser.is_some())
            .field("allow_missing_config_file", &self.allow_missing_config_file)
            .field("ignore_undefined", &self.ignore_undefined)
            .finish()
    }
}

fn provided_flags(fs: &FlagSet) -> BTreeSet<String> {
    let mut provided = BTreeSet::new();
    fs.visit(|flag| {
        provided.insert(flag.name().to_owned());
    });
    provided
}

fn unset_flags(fs: &FlagSet) -> Vec<String> {
    fs.flags()
        .filter(|flag| !fs.is_set(flag.name()))
        .map(|flag| flag.name().to_owned())
        .collect()
}

/// The environment variable a flag is looked up from.
fn env_key(prefix: Option<&str>, name: &str) -> String {
    let name = name.to_uppercase().replace(['-', '.', '/'], "_");

    match prefix {
        Some(prefix) => format!("{}_{}", prefix, name),
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;
    use crate::config::TomlParser;
    use crate::env::StaticEnvironment;
    use crate::flag::Slot;

    struct Fixture {
        fs: FlagSet,
        debug: Slot<bool>,
        name: Slot<String>,
        config: Slot<String>,
    }

    fn fixture() -> Fixture {
        let debug = Slot::new(false);
        let name = Slot::new(String::new());
        let config = Slot::new(String::new());

        let mut fs = FlagSet::new("test");
        fs.bool_var(&debug, "debug", false, "debug mode");
        fs.string_var(&name, "user-name", "nobody", "user name");
        fs.string_var(&config, "config", "", "config file");

        Fixture {
            fs,
            debug,
            name,
            config,
        }
    }

    fn config_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn args(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn env_keys() {
        assert_eq!(env_key(Some("APP"), "user-name"), "APP_USER_NAME");
        assert_eq!(env_key(Some("APP"), "server.port"), "APP_SERVER_PORT");
        assert_eq!(env_key(None, "debug"), "DEBUG");
        assert_eq!(env_key(Some("APP"), "db/host"), "APP_DB_HOST");
    }

    #[test]
    fn env_is_ignored_without_prefix_option() {
        let mut f = fixture();
        let env = StaticEnvironment::new().var("DEBUG", "true");

        ParseOptions::new().parse(&mut f.fs, args(&[]), &env).unwrap();
        assert!(!f.debug.get());
    }

    #[test]
    fn command_line_beats_env() {
        let mut f = fixture();
        let env = StaticEnvironment::new()
            .var("APP_DEBUG", "true")
            .var("APP_USER_NAME", "env");

        ParseOptions::new()
            .env_var_prefix("APP")
            .parse(&mut f.fs, args(&["-user-name", "cli"]), &env)
            .unwrap();

        assert!(f.debug.get());
        assert_eq!(f.name.get(), "cli");
    }

    #[test]
    fn env_no_prefix() {
        let mut f = fixture();
        let env = StaticEnvironment::new().var("USER_NAME", "env");

        ParseOptions::new()
            .env_var_no_prefix()
            .parse(&mut f.fs, args(&[]), &env)
            .unwrap();

        assert_eq!(f.name.get(), "env");
    }

    #[test]
    fn bad_env_value() {
        let mut f = fixture();
        let env = StaticEnvironment::new().var("APP_DEBUG", "sure");

        let error = ParseOptions::new()
            .env_var_prefix("APP")
            .parse(&mut f.fs, args(&[]), &env)
            .unwrap_err();

        assert!(matches!(error.kind(), ErrorKind::EnvVar { .. }));
    }

    #[test]
    fn config_priority() {
        let file = config_file("debug true\nuser-name config\n");
        let mut f = fixture();
        let env = StaticEnvironment::new().var("APP_USER_NAME", "env");

        ParseOptions::new()
            .env_var_prefix("APP")
            .config_file(file.path())
            .parse(&mut f.fs, args(&[]), &env)
            .unwrap();

        assert!(f.debug.get());
        assert_eq!(f.name.get(), "env");
    }

    #[test]
    fn config_from_flag() {
        let file = config_file("user-name = \"toml\"\n");
        let mut f = fixture();
        let path = file.path().to_string_lossy().into_owned();

        ParseOptions::new()
            .config_file_flag("config")
            .config_parser(TomlParser)
            .parse(&mut f.fs, args(&["-config", path.as_str()]), &StaticEnvironment::new())
            .unwrap();

        assert_eq!(f.config.get(), path);
        assert_eq!(f.name.get(), "toml");
    }

    #[test]
    fn config_flag_unset_means_no_config() {
        let mut f = fixture();

        ParseOptions::new()
            .config_file_flag("config")
            .parse(&mut f.fs, args(&[]), &StaticEnvironment::new())
            .unwrap();

        assert_eq!(f.name.get(), "nobody");
    }

    #[test]
    fn missing_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.conf");

        let mut f = fixture();
        let error = ParseOptions::new()
            .config_file(&path)
            .parse(&mut f.fs, args(&[]), &StaticEnvironment::new())
            .unwrap_err();
        assert!(matches!(error.kind(), ErrorKind::ConfigFile { .. }));

        let mut f = fixture();
        ParseOptions::new()
            .config_file(&path)
            .allow_missing_config_file()
            .parse(&mut f.fs, args(&[]), &StaticEnvironment::new())
            .unwrap();
    }

    #[test]
    fn undefined_config_flag() {
        let file = config_file("verbose true\ndebug true\n");

        let mut f = fixture();
        let error = ParseOptions::new()
            .config_file(file.path())
            .parse(&mut f.fs, args(&[]), &StaticEnvironment::new())
            .unwrap_err();
        assert!(matches!(error.kind(), ErrorKind::ConfigUndefinedFlag { .. }));

        let mut f = fixture();
        ParseOptions::new()
            .config_file(file.path())
            .ignore_undefined()
            .parse(&mut f.fs, args(&[]), &StaticEnvironment::new())
            .unwrap();
        assert!(f.debug.get());
    }

    #[test]
    fn config_parse_error() {
        let file = config_file("= nope");

        let mut f = fixture();
        let error = ParseOptions::new()
            .config_file(file.path())
            .config_parser(TomlParser)
            .parse(&mut f.fs, args(&[]), &StaticEnvironment::new())
            .unwrap_err();

        assert!(matches!(error.kind(), ErrorKind::ConfigParse { .. }));
    }
}
