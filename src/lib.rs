//! [![Documentation](https://docs.rs/cmdwerk/badge.svg)](https://docs.rs/cmdwerk)
//! [![Crates](https://img.shields.io/crates/v/cmdwerk.svg)](https://crates.io/crates/cmdwerk)
//!
//! A two-phase command tree for small command-line tools.
//!
//! Every [Command] owns its own set of flags. Parsing happens level by level:
//! a command consumes the flags it knows about, and if the first remaining
//! argument names one of its subcommands, parsing continues there with
//! whatever is left. Once [Command::parse] has resolved a target,
//! [Command::run] invokes exactly one handler.
//!
//! This is **not** intended to be a complete command-line parser library. For
//! that, use [clap].
//!
//! We provide:
//! * Nested subcommands with case-insensitive name matching.
//! * Single-dash flags bound to caller-owned [Slot]s.
//! * Overlaying flags from environment variables and config files through
//!   [ParseOptions].
//! * Decent looking usage blocks, printed whenever `-h` is passed.
//!
//! We *do not* provide:
//! * Typed positional arguments. Handlers receive whatever is left after flag
//!   parsing as strings.
//! * Abbreviated or fuzzy subcommand matching.
//!
//! # Examples
//!
//! > This is available as a runnable example:
//! > ```sh
//! > cargo run --example subcommands
//! > ```
//!
//! ```rust
//! use cmdwerk::{Command, Context, Slot};
//!
//! # fn main() -> Result<(), cmdwerk::Error> {
//! let debug = Slot::new(false);
//! let name = Slot::new(String::new());
//! let greeted = Slot::new(Vec::new());
//!
//! let mut root = Command::new("example")
//!     .short_usage("example [flags] <subcommand>")
//!     .flags({
//!         let debug = debug.clone();
//!         move |fs| fs.bool_var(&debug, "debug", false, "debug mode")
//!     })
//!     .subcommand(
//!         Command::new("greet")
//!             .short_help("greet someone")
//!             .flags({
//!                 let name = name.clone();
//!                 move |fs| fs.string_var(&name, "name", "world", "who to greet")
//!             })
//!             .exec({
//!                 let name = name.clone();
//!                 let greeted = greeted.clone();
//!                 move |_, _| {
//!                     greeted.borrow_mut().push(name.get());
//!                     Ok(())
//!                 }
//!             }),
//!     );
//!
//! root.parse(["-debug", "GREET", "-name=ferris"])?;
//! root.run(&Context::background())?;
//!
//! assert!(debug.get());
//! assert_eq!(greeted.get(), vec![String::from("ferris")]);
//! # Ok(()) }
//! ```
//!
//! Passing `-h` to any level prints its usage block and returns an error for
//! which [Error::is_help] is `true`:
//!
//! ```text
//! USAGE
//!   example [flags] <subcommand>
//!
//! SUBCOMMANDS
//!   greet  greet someone
//!
//! FLAGS
//!   -debug false  debug mode
//! ```
//!
//! [clap]: https://docs.rs/clap

#![deny(missing_docs)]

use std::error;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

mod command;
pub mod config;
mod context;
mod env;
pub mod flag;
mod overlay;
pub mod usage;

pub use self::command::{Command, ExecFn, UsageFn};
pub use self::config::{ConfigParser, PlainParser, TomlParser};
pub use self::context::{CancelHandle, Context, ContextError};
pub use self::env::{Environment, StaticEnvironment, SystemEnvironment};
pub use self::flag::{Flag, FlagSet, Output, Slot, Value};
pub use self::overlay::ParseOptions;

/// A boxed error, as returned by handlers, flag values and config parsers.
pub type BoxError = Box<dyn error::Error + Send + Sync + 'static>;

/// An error raised by cmdwerk.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error {
    kind: Box<ErrorKind>,
}

impl Error {
    /// Construct a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
        }
    }

    /// Construct the error signalling that usage should be shown instead of
    /// running the command.
    ///
    /// Handlers can return this to have the usage of their command printed.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cmdwerk::{Command, Context, Error};
    ///
    /// let mut command = Command::new("demo")
    ///     .output(std::io::sink())
    ///     .exec(|_, args| {
    ///         if args.is_empty() {
    ///             return Err(Error::help().into());
    ///         }
    ///
    ///         Ok(())
    ///     });
    ///
    /// command.parse(Vec::<String>::new()).unwrap();
    /// let error = command.run(&Context::background()).unwrap_err();
    /// assert!(error.is_help());
    /// ```
    pub fn help() -> Self {
        Self::new(ErrorKind::HelpRequested)
    }

    /// Access the underlying error kind.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Test if this is the help-requested condition.
    ///
    /// A help request returned by a handler is found even if it's wrapped in
    /// other errors, as long as it can be reached through
    /// [source](error::Error::source).
    pub fn is_help(&self) -> bool {
        match &*self.kind {
            ErrorKind::HelpRequested => true,
            ErrorKind::Exec(error) => is_help_chain(&**error),
            _ => false,
        }
    }

    /// Test if this error came out of tokenizing flags, in which case the
    /// usage of the command is worth showing.
    pub(crate) fn is_flag_syntax(&self) -> bool {
        matches!(
            *self.kind,
            ErrorKind::BadFlagSyntax { .. }
                | ErrorKind::UnknownFlag { .. }
                | ErrorKind::MissingFlagValue { .. }
                | ErrorKind::InvalidFlagValue { .. }
                | ErrorKind::InvalidBoolFlag { .. }
        )
    }

    /// Convert an error returned by a handler, unwrapping errors which were
    /// raised by this crate.
    pub(crate) fn from_exec(error: BoxError) -> Self {
        match error.downcast::<Error>() {
            Ok(error) => *error,
            Err(error) => Self::new(ErrorKind::Exec(error)),
        }
    }
}

/// Walk the source chain of `error` looking for a help request.
fn is_help_chain(error: &(dyn error::Error + 'static)) -> bool {
    let mut current = Some(error);

    while let Some(error) = current {
        if error.downcast_ref::<Error>().map_or(false, Error::is_help) {
            return true;
        }

        current = error.source();
    }

    false
}

/// The kind of an error.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// Usage was requested, either through `-h` / `-help` or by running a
    /// command which has no handler.
    ///
    /// # Examples
    ///
    /// ```rust
    /// let mut command = cmdwerk::Command::new("demo").output(std::io::sink());
    /// let error = command.parse(["-h"]).unwrap_err();
    ///
    /// assert!(matches!(error.kind(), cmdwerk::ErrorKind::HelpRequested));
    /// ```
    #[error("flag: help requested")]
    HelpRequested,
    /// A flag token which can't be a flag, like `---debug` or `-=x`.
    #[error("bad flag syntax: {argument}")]
    BadFlagSyntax {
        /// The offending argument.
        argument: Box<str>,
    },
    /// A flag which is not registered with the flag set.
    ///
    /// # Examples
    ///
    /// ```rust
    /// let mut command = cmdwerk::Command::new("demo").output(std::io::sink());
    /// let error = command.parse(["-path"]).unwrap_err();
    ///
    /// assert!(matches!(error.kind(), cmdwerk::ErrorKind::UnknownFlag { .. }));
    /// assert_eq!(error.to_string(), "flag provided but not defined: -path");
    /// ```
    #[error("flag provided but not defined: -{name}")]
    UnknownFlag {
        /// The name of the flag, without dashes.
        name: Box<str>,
    },
    /// A non-boolean flag at the end of the arguments without a value.
    #[error("flag needs an argument: -{name}")]
    MissingFlagValue {
        /// The name of the flag.
        name: Box<str>,
    },
    /// A flag value which was rejected by the flag.
    #[error("invalid value {value:?} for flag -{name}: {error}")]
    InvalidFlagValue {
        /// The name of the flag.
        name: Box<str>,
        /// The rejected value.
        value: Box<str>,
        /// Why the value was rejected.
        #[source]
        error: BoxError,
    },
    /// A boolean flag which refused to be set to `true`.
    #[error("invalid boolean flag {name}: {error}")]
    InvalidBoolFlag {
        /// The name of the flag.
        name: Box<str>,
        /// Why the value was rejected.
        #[source]
        error: BoxError,
    },
    /// The same flag name was registered twice on one flag set.
    #[error("{set} flag redefined: {name}")]
    FlagRedefined {
        /// The name of the flag set.
        set: Box<str>,
        /// The name of the flag.
        name: Box<str>,
    },
    /// A flag could not be set from an environment variable.
    #[error("error setting flag {name:?} from env var {var:?}: {error}")]
    EnvVar {
        /// The name of the flag.
        name: Box<str>,
        /// The environment variable the value came from.
        var: Box<str>,
        /// Why the value was rejected.
        #[source]
        error: BoxError,
    },
    /// The config file could not be read.
    #[error("error opening config file {path:?}: {error}")]
    ConfigFile {
        /// Path to the config file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        error: io::Error,
    },
    /// The config file could not be parsed.
    #[error("error parsing config file {path:?}: {error}")]
    ConfigParse {
        /// Path to the config file.
        path: PathBuf,
        /// The parser error.
        #[source]
        error: BoxError,
    },
    /// The config file names a flag which is not registered.
    #[error("config file flag {name:?} not defined in flag set")]
    ConfigUndefinedFlag {
        /// The name used in the config file.
        name: Box<str>,
    },
    /// A flag could not be set from the config file.
    #[error("error setting flag {name:?} from config file: {error}")]
    ConfigValue {
        /// The name of the flag.
        name: Box<str>,
        /// Why the value was rejected.
        #[source]
        error: BoxError,
    },
    /// Two subcommands share a name, which is rejected by strict commands.
    #[error("command {parent:?} has duplicate subcommand {name:?}")]
    DuplicateSubcommand {
        /// The command owning the subcommands.
        parent: Box<str>,
        /// The duplicated name.
        name: Box<str>,
    },
    /// [Command::run] was called before [Command::parse].
    ///
    /// # Examples
    ///
    /// ```rust
    /// let mut command = cmdwerk::Command::new("demo");
    /// let error = command.run(&cmdwerk::Context::background()).unwrap_err();
    ///
    /// assert!(matches!(error.kind(), cmdwerk::ErrorKind::Unparsed));
    /// ```
    #[error("command is unparsed, cannot run")]
    Unparsed,
    /// An error returned by a command handler.
    #[error(transparent)]
    Exec(BoxError),
}
