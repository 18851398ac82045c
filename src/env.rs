use std::collections::HashMap;
use std::env;
use std::path::Path;

/// Ambient process state consulted while parsing.
///
/// This is where a root command without a name gets its name from, and where
/// [ParseOptions](crate::ParseOptions) looks up environment variables.
pub trait Environment {
    /// The name the program was invoked as.
    fn program_name(&self) -> Option<String>;

    /// Look up an environment variable.
    fn var(&self, key: &str) -> Option<String>;
}

/// The environment of the running process.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn program_name(&self) -> Option<String> {
        let arg0 = env::args_os().next()?;
        let name = Path::new(&arg0).file_name()?;
        Some(name.to_string_lossy().into_owned())
    }

    fn var(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

/// A fixed environment, for tests or for embedding a command tree somewhere
/// the process environment doesn't apply.
///
/// # Examples
///
/// ```rust
/// use cmdwerk::{Command, StaticEnvironment};
///
/// # fn main() -> Result<(), cmdwerk::Error> {
/// let mut command = Command::default();
/// command.parse_with(Vec::<String>::new(), &StaticEnvironment::new().program_name("tool"))?;
/// assert_eq!(command.name(), "tool");
/// # Ok(()) }
/// ```
#[derive(Debug, Default, Clone)]
pub struct StaticEnvironment {
    program_name: Option<String>,
    vars: HashMap<String, String>,
}

impl StaticEnvironment {
    /// Construct an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the program name.
    pub fn program_name(mut self, name: &str) -> Self {
        self.program_name = Some(name.to_owned());
        self
    }

    /// Set an environment variable.
    pub fn var(mut self, key: &str, value: &str) -> Self {
        self.vars.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl Environment for StaticEnvironment {
    fn program_name(&self) -> Option<String> {
        self.program_name.clone()
    }

    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}
