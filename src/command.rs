use std::fmt;
use std::io;

use crate::context::Context;
use crate::env::{Environment, SystemEnvironment};
use crate::flag::{self, FlagSet, Output};
use crate::overlay::ParseOptions;
use crate::usage;
use crate::{BoxError, Error, ErrorKind};

/// The handler of a command.
///
/// Receives the execution context and the arguments left over after flag
/// parsing.
pub type ExecFn = Box<dyn FnMut(&Context, &[String]) -> Result<(), BoxError>>;

/// A function rendering the usage block of a command.
pub type UsageFn = Box<dyn Fn(&Command) -> String>;

type FlagsFn = Box<dyn FnMut(&mut FlagSet)>;

/// What the last parse resolved a command to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    /// The command itself runs.
    Local,
    /// The subcommand at the given index runs.
    Delegated(usize),
}

/// A node in a command tree.
///
/// A command is built once, parsed once with [Command::parse], and then run
/// once with [Command::run].
///
/// # Examples
///
/// ```rust
/// use cmdwerk::{Command, Context, Slot};
///
/// # fn main() -> Result<(), cmdwerk::Error> {
/// let seen = Slot::new(Vec::new());
///
/// let mut root = Command::new("root").subcommand(Command::new("list").exec({
///     let seen = seen.clone();
///     move |_, args| {
///         seen.set(args.to_vec());
///         Ok(())
///     }
/// }));
///
/// root.parse(["LIST", "a", "b"])?;
/// assert_eq!(root.resolved().map(Command::name), Some("list"));
///
/// root.run(&Context::background())?;
/// assert_eq!(seen.get(), ["a", "b"]);
/// # Ok(()) }
/// ```
#[derive(Default)]
pub struct Command {
    name: String,
    exec: Option<ExecFn>,
    flags: Option<FlagsFn>,
    subcommands: Vec<Command>,
    short_usage: String,
    short_help: String,
    long_help: String,
    options: ParseOptions,
    flag_set: Option<FlagSet>,
    usage_func: Option<UsageFn>,
    output: Option<Output>,
    strict: bool,
    resolution: Option<Resolution>,
    args: Vec<String>,
}

impl Command {
    /// Construct a new command with the given name.
    ///
    /// An empty name on the root command is replaced with the name of the
    /// program when parsing.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }

    /// Set the handler which runs when this command is resolved.
    ///
    /// Without a handler, running the command requests help.
    pub fn exec<F>(mut self, exec: F) -> Self
    where
        F: FnMut(&Context, &[String]) -> Result<(), BoxError> + 'static,
    {
        self.exec = Some(Box::new(exec));
        self
    }

    /// Set the function registering the flags of this command.
    ///
    /// It's called once, the first time the command is parsed. Parsing again
    /// after a failed parse reuses the flags it registered.
    pub fn flags<F>(mut self, flags: F) -> Self
    where
        F: FnMut(&mut FlagSet) + 'static,
    {
        self.flags = Some(Box::new(flags));
        self
    }

    /// Add a subcommand.
    pub fn subcommand(mut self, subcommand: Command) -> Self {
        self.subcommands.push(subcommand);
        self
    }

    /// Add several subcommands.
    pub fn subcommands<I>(mut self, subcommands: I) -> Self
    where
        I: IntoIterator<Item = Command>,
    {
        self.subcommands.extend(subcommands);
        self
    }

    /// Set the line shown under `USAGE`. Defaults to the name of the command.
    pub fn short_usage(mut self, short_usage: &str) -> Self {
        self.short_usage = short_usage.to_owned();
        self
    }

    /// Set the help shown next to this command when listed as a subcommand.
    pub fn short_help(mut self, short_help: &str) -> Self {
        self.short_help = short_help.to_owned();
        self
    }

    /// Set the longer help shown in the usage block of this command.
    pub fn long_help(mut self, long_help: &str) -> Self {
        self.long_help = long_help.to_owned();
        self
    }

    /// Set how flags are overlaid from the environment and config files.
    pub fn options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    /// Use the given flag set instead of constructing one when parsing.
    pub fn flag_set(mut self, flag_set: FlagSet) -> Self {
        self.flag_set = Some(flag_set);
        self
    }

    /// Override how the usage block of this command is rendered.
    pub fn usage_func<F>(mut self, usage_func: F) -> Self
    where
        F: Fn(&Command) -> String + 'static,
    {
        self.usage_func = Some(Box::new(usage_func));
        self
    }

    /// Write usage and flag errors to `output`.
    ///
    /// Subcommands without an output of their own inherit it.
    pub fn output<W>(mut self, output: W) -> Self
    where
        W: io::Write + 'static,
    {
        self.output = Some(flag::output(output));
        self
    }

    /// Write usage and flag errors to a shared output.
    pub fn shared_output(mut self, output: Output) -> Self {
        self.output = Some(output);
        self
    }

    /// Reject subcommands whose names only differ by case when parsing.
    ///
    /// By default the first matching subcommand silently wins.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// The name of the command.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The line shown under `USAGE`.
    pub fn get_short_usage(&self) -> &str {
        &self.short_usage
    }

    /// The help shown when listed as a subcommand.
    pub fn get_short_help(&self) -> &str {
        &self.short_help
    }

    /// The longer help of the command.
    pub fn get_long_help(&self) -> &str {
        &self.long_help
    }

    /// The subcommands, in declaration order.
    pub fn get_subcommands(&self) -> &[Command] {
        &self.subcommands
    }

    /// The flag set of the command, once it has been parsed.
    pub fn get_flag_set(&self) -> Option<&FlagSet> {
        self.flag_set.as_ref()
    }

    /// Arguments left after the flags of this command have been consumed.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Test if the command has been parsed.
    pub fn is_parsed(&self) -> bool {
        self.resolution.is_some()
    }

    /// The command which will run, once parsed.
    pub fn resolved(&self) -> Option<&Command> {
        match self.resolution? {
            Resolution::Local => Some(self),
            Resolution::Delegated(index) => self.subcommands.get(index)?.resolved(),
        }
    }

    /// Render the usage block of the command.
    pub fn usage(&self) -> String {
        match &self.usage_func {
            Some(usage_func) => usage_func(self),
            None => usage::default_usage(self),
        }
    }

    /// Parse `args`, which must not include the program name, resolving the
    /// command to run.
    ///
    /// Parsing an already parsed command does nothing.
    pub fn parse<I>(&mut self, args: I) -> Result<(), Error>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.parse_with(args, &SystemEnvironment)
    }

    /// Parse `args` against the given environment.
    pub fn parse_with<I>(&mut self, args: I, env: &dyn Environment) -> Result<(), Error>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let args = args.into_iter().map(Into::into).collect();
        self.resolve(args, env, None)
    }

    fn resolve(
        &mut self,
        args: Vec<String>,
        env: &dyn Environment,
        inherited: Option<Output>,
    ) -> Result<(), Error> {
        if self.resolution.is_some() {
            return Ok(());
        }

        if self.name.is_empty() {
            if let Some(name) = env.program_name() {
                self.name = name;
            }
        }

        let mut flag_set = match self.flag_set.take() {
            Some(flag_set) => flag_set,
            None => FlagSet::new(&self.name),
        };

        if let Some(output) = self.output.clone().or(inherited) {
            if self.output.is_some() || !flag_set.has_output() {
                flag_set.set_output(output);
            }
        }

        if let Some(mut flags) = self.flags.take() {
            flags(&mut flag_set);
        }

        let result = self.options.parse(&mut flag_set, args, env);
        self.flag_set = Some(flag_set);

        if let Err(error) = result {
            self.report(&error);
            return Err(error);
        }

        if self.strict {
            self.check_duplicates()?;
        }

        self.args = match &self.flag_set {
            Some(flag_set) => flag_set.args().to_vec(),
            None => Vec::new(),
        };

        if let Some(first) = self.args.first() {
            let index = self
                .subcommands
                .iter()
                .position(|subcommand| equal_fold(first, &subcommand.name));

            if let Some(index) = index {
                tracing::debug!(command = %self.name, subcommand = %self.subcommands[index].name, "resolved subcommand");

                self.resolution = Some(Resolution::Delegated(index));
                let rest = self.args[1..].to_vec();
                let output = self.flag_set.as_ref().map(FlagSet::output);
                return self.subcommands[index].resolve(rest, env, output);
            }
        }

        tracing::debug!(command = %self.name, args = ?self.args, "resolved command");

        self.resolution = Some(Resolution::Local);

        if self.exec.is_none() {
            self.exec = Some(Box::new(|_, _| Err(Error::help().into())));
        }

        Ok(())
    }

    /// Run the resolved command.
    ///
    /// If the handler requests help, the usage of the command is written to
    /// its output before the error is returned.
    pub fn run(&mut self, ctx: &Context) -> Result<(), Error> {
        let index = match self.resolution {
            None => return Err(Error::new(ErrorKind::Unparsed)),
            Some(Resolution::Delegated(index)) => index,
            Some(Resolution::Local) => {
                let result = match &mut self.exec {
                    Some(exec) => exec(ctx, &self.args),
                    None => Err(Error::help().into()),
                };

                return match result {
                    Ok(()) => Ok(()),
                    Err(error) => {
                        let error = Error::from_exec(error);

                        if error.is_help() {
                            self.print_usage();
                        }

                        Err(error)
                    }
                };
            }
        };

        match self.subcommands.get_mut(index) {
            Some(subcommand) => subcommand.run(ctx),
            None => Err(Error::new(ErrorKind::Unparsed)),
        }
    }

    /// Write whatever the flag set would show for `error`.
    fn report(&self, error: &Error) {
        if error.is_help() {
            self.print_usage();
        } else if error.is_flag_syntax() {
            if let Some(flag_set) = &self.flag_set {
                let _ = writeln!(flag_set.output().borrow_mut(), "{}", error);
            }

            self.print_usage();
        }
    }

    fn print_usage(&self) {
        let output = match &self.flag_set {
            Some(flag_set) => flag_set.output(),
            None => match &self.output {
                Some(output) => output.clone(),
                None => flag::output(io::stderr()),
            },
        };

        let _ = writeln!(output.borrow_mut(), "{}", self.usage());
    }

    fn check_duplicates(&self) -> Result<(), Error> {
        for (n, subcommand) in self.subcommands.iter().enumerate() {
            let duplicate = self.subcommands[..n]
                .iter()
                .any(|other| equal_fold(&other.name, &subcommand.name));

            if duplicate {
                return Err(Error::new(ErrorKind::DuplicateSubcommand {
                    parent: self.name.as_str().into(),
                    name: subcommand.name.as_str().into(),
                }));
            }
        }

        Ok(())
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("short_usage", &self.short_usage)
            .field("short_help", &self.short_help)
            .field("subcommands", &self.subcommands)
            .field("options", &self.options)
            .field("flag_set", &self.flag_set)
            .field("strict", &self.strict)
            .field("resolution", &self.resolution)
            .field("args", &self.args)
            .finish()
    }
}

/// Compare two strings under simple case folding.
fn equal_fold(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::StaticEnvironment;
    use crate::flag::Slot;

    fn env() -> StaticEnvironment {
        StaticEnvironment::new().program_name("prog")
    }

    #[test]
    fn folding() {
        assert!(equal_fold("foo", "FOO"));
        assert!(!equal_fold("Straße", "STRASSE"));
        assert!(equal_fold("ÄRGER", "ärger"));
        assert!(!equal_fold("foo", "fo"));
    }

    #[test]
    fn empty_name_takes_program_name() {
        let mut command = Command::default().output(io::sink());
        command.parse_with(Vec::<String>::new(), &env()).unwrap();
        assert_eq!(command.name(), "prog");
    }

    #[test]
    fn named_command_keeps_name() {
        let mut command = Command::new("mine").output(io::sink());
        command.parse_with(Vec::<String>::new(), &env()).unwrap();
        assert_eq!(command.name(), "mine");
    }

    #[test]
    fn parse_is_idempotent() {
        let calls = Slot::new(0);

        let mut command = Command::new("root")
            .output(io::sink())
            .flags({
                let calls = calls.clone();
                move |_| *calls.borrow_mut() += 1
            })
            .subcommand(Command::new("sub"));

        command.parse_with(["sub"], &env()).unwrap();
        command.parse_with(["other", "args"], &env()).unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(command.resolution, Some(Resolution::Delegated(0)));
        assert_eq!(command.resolved().map(Command::name), Some("sub"));
    }

    #[test]
    fn parse_can_be_retried_after_failure() {
        let debug = Slot::new(false);

        let mut command = Command::new("root").output(io::sink()).flags({
            let debug = debug.clone();
            move |fs| fs.bool_var(&debug, "d", false, "debug mode")
        });

        let error = command.parse_with(["-nope"], &env()).unwrap_err();
        assert!(matches!(error.kind(), ErrorKind::UnknownFlag { .. }));
        assert!(!command.is_parsed());

        command.parse_with(["-d"], &env()).unwrap();
        assert!(debug.get());
        assert_eq!(command.resolution, Some(Resolution::Local));
    }

    #[test]
    fn first_match_wins() {
        let mut command = Command::new("root")
            .subcommand(Command::new("dup").short_help("first"))
            .subcommand(Command::new("DUP").short_help("second"));

        command.parse_with(["dup"], &env()).unwrap();
        assert_eq!(
            command.resolved().map(Command::get_short_help),
            Some("first")
        );
    }

    #[test]
    fn strict_rejects_duplicates() {
        let mut command = Command::new("root")
            .strict(true)
            .subcommand(Command::new("dup"))
            .subcommand(Command::new("DUP"));

        let error = command.parse_with(["dup"], &env()).unwrap_err();
        assert!(matches!(error.kind(), ErrorKind::DuplicateSubcommand { .. }));
    }

    #[test]
    fn missing_exec_requests_help() {
        let mut command = Command::new("root").output(io::sink());
        command.parse_with(Vec::<String>::new(), &env()).unwrap();
        assert!(command.exec.is_some());

        let error = command.run(&Context::background()).unwrap_err();
        assert!(error.is_help());
    }

    #[test]
    fn failed_child_parse_leaves_child_unparsed() {
        let mut command = Command::new("root")
            .output(io::sink())
            .subcommand(Command::new("sub"));

        let error = command.parse_with(["sub", "-nope"], &env()).unwrap_err();
        assert!(matches!(error.kind(), ErrorKind::UnknownFlag { .. }));

        let error = command.run(&Context::background()).unwrap_err();
        assert!(matches!(error.kind(), ErrorKind::Unparsed));
    }

    #[test]
    fn handler_errors_pass_through() {
        let mut command = Command::new("root").exec(|_, _| Err("boom".into()));
        command.parse_with(Vec::<String>::new(), &env()).unwrap();

        let error = command.run(&Context::background()).unwrap_err();
        assert!(matches!(error.kind(), ErrorKind::Exec(..)));
        assert_eq!(error.to_string(), "boom");
    }

    #[test]
    fn handler_receives_context() {
        let (ctx, cancel) = Context::background().with_cancel();
        cancel.cancel();

        let mut command = Command::new("root").exec(|ctx, _| match ctx.err() {
            Some(error) => Err(error.into()),
            None => Ok(()),
        });

        command.parse_with(Vec::<String>::new(), &env()).unwrap();
        let error = command.run(&ctx).unwrap_err();
        assert_eq!(error.to_string(), "context canceled");
    }
}
