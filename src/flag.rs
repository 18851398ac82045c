//! Single-dash flags bound to caller-owned storage.
//!
//! A [FlagSet] is the flag schema of one [Command](crate::Command). Flags are
//! registered against [Slot]s which the caller keeps a handle to, so parsed
//! values are read back through the caller's own handle once parsing is done.
//!
//! The accepted syntax is:
//!
//! ```text
//! -flag
//! --flag
//! -flag=value
//! -flag value   (non-boolean flags only)
//! ```
//!
//! Parsing stops at the first argument that isn't a flag, at a lone `-`, or
//! right after a `--` terminator.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io;
use std::rc::Rc;
use std::str::FromStr;

use crate::{BoxError, Error, ErrorKind};

/// A shared, writable output stream.
///
/// Usage blocks and flag errors are written here.
pub type Output = Rc<RefCell<dyn io::Write>>;

/// Construct an [Output] from a writer.
pub fn output<W>(writer: W) -> Output
where
    W: io::Write + 'static,
{
    Rc::new(RefCell::new(writer))
}

/// Caller-owned storage a flag writes its value into.
///
/// Cloning a slot produces another handle to the same storage.
///
/// # Examples
///
/// ```rust
/// use cmdwerk::{FlagSet, Slot};
///
/// # fn main() -> Result<(), cmdwerk::Error> {
/// let limit = Slot::new(0u64);
///
/// let mut fs = FlagSet::new("demo");
/// fs.uint_var(&limit, "limit", 10, "limit the number of things");
/// assert_eq!(limit.get(), 10);
///
/// fs.parse(["-limit", "20"])?;
/// assert_eq!(limit.get(), 20);
/// # Ok(()) }
/// ```
pub struct Slot<T> {
    inner: Rc<RefCell<T>>,
}

impl<T> Slot<T> {
    /// Construct a new slot holding `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(value)),
        }
    }

    /// Replace the stored value.
    pub fn set(&self, value: T) {
        *self.inner.borrow_mut() = value;
    }

    /// Borrow the stored value.
    pub fn borrow(&self) -> Ref<'_, T> {
        self.inner.borrow()
    }

    /// Mutably borrow the stored value.
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.inner.borrow_mut()
    }
}

impl<T> Slot<T>
where
    T: Clone,
{
    /// Get a copy of the stored value.
    pub fn get(&self) -> T {
        self.inner.borrow().clone()
    }
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for Slot<T>
where
    T: Default,
{
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for Slot<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Slot").field(&*self.inner.borrow()).finish()
    }
}

/// The dynamic value behind a flag.
///
/// Implement this to register flags of custom types through [FlagSet::var].
pub trait Value {
    /// Set the value from its command-line representation.
    fn set(&mut self, value: &str) -> Result<(), BoxError>;

    /// Render the current value.
    fn get(&self) -> String;

    /// Boolean flags don't consume the following argument, and can be set
    /// with a bare `-flag`.
    fn is_bool_flag(&self) -> bool {
        false
    }
}

/// Parse a boolean the way flags accept them.
pub(crate) fn parse_bool(value: &str) -> Result<bool, BoxError> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(format!("parse error: {:?} is not a boolean", value).into()),
    }
}

struct BoolValue(Slot<bool>);

impl Value for BoolValue {
    fn set(&mut self, value: &str) -> Result<(), BoxError> {
        self.0.set(parse_bool(value)?);
        Ok(())
    }

    fn get(&self) -> String {
        self.0.get().to_string()
    }

    fn is_bool_flag(&self) -> bool {
        true
    }
}

struct ParsedValue<T>(Slot<T>);

impl<T> Value for ParsedValue<T>
where
    T: FromStr + fmt::Display,
    T::Err: Into<BoxError>,
{
    fn set(&mut self, value: &str) -> Result<(), BoxError> {
        let value = T::from_str(value).map_err(Into::<BoxError>::into)?;
        self.0.set(value);
        Ok(())
    }

    fn get(&self) -> String {
        self.0.borrow().to_string()
    }
}

struct FuncValue<F>(F);

impl<F> Value for FuncValue<F>
where
    F: FnMut(&str) -> Result<(), BoxError>,
{
    fn set(&mut self, value: &str) -> Result<(), BoxError> {
        (self.0)(value)
    }

    fn get(&self) -> String {
        String::new()
    }
}

/// A single registered flag.
pub struct Flag {
    name: Box<str>,
    usage: Box<str>,
    default: Box<str>,
    value: Box<dyn Value>,
}

impl Flag {
    /// The name of the flag, without dashes.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The usage string of the flag.
    pub fn usage(&self) -> &str {
        &self.usage
    }

    /// The default value as it was rendered when the flag was registered.
    pub fn default_value(&self) -> &str {
        &self.default
    }

    /// Render the current value of the flag.
    pub fn value(&self) -> String {
        self.value.get()
    }

    /// Test if this is a boolean flag.
    pub fn is_bool_flag(&self) -> bool {
        self.value.is_bool_flag()
    }
}

impl fmt::Debug for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flag")
            .field("name", &self.name)
            .field("usage", &self.usage)
            .field("default", &self.default)
            .field("value", &self.value.get())
            .finish()
    }
}

/// A set of flags, parsed from one level of the command line.
pub struct FlagSet {
    name: Box<str>,
    formal: BTreeMap<Box<str>, Flag>,
    actual: BTreeSet<Box<str>>,
    args: Vec<String>,
    parsed: bool,
    redefined: Option<Box<str>>,
    output: Option<Output>,
}

impl FlagSet {
    /// Construct a new empty flag set.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            formal: BTreeMap::new(),
            actual: BTreeSet::new(),
            args: Vec::new(),
            parsed: false,
            redefined: None,
            output: None,
        }
    }

    /// The name of the flag set.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The stream usage and errors are written to. Defaults to stderr.
    pub fn output(&self) -> Output {
        match &self.output {
            Some(output) => output.clone(),
            None => self::output(io::stderr()),
        }
    }

    /// Test if an output has been configured.
    pub(crate) fn has_output(&self) -> bool {
        self.output.is_some()
    }

    /// Set the stream usage and errors are written to.
    pub fn set_output(&mut self, output: Output) {
        self.output = Some(output);
    }

    /// Register a boolean flag.
    pub fn bool_var(&mut self, slot: &Slot<bool>, name: &str, value: bool, usage: &str) {
        if self.redefines(name) {
            return;
        }

        slot.set(value);
        self.var(BoolValue(slot.clone()), name, usage);
    }

    /// Register a string flag.
    pub fn string_var(&mut self, slot: &Slot<String>, name: &str, value: &str, usage: &str) {
        self.typed_var(slot, name, value.to_owned(), usage);
    }

    /// Register a signed integer flag.
    pub fn int_var(&mut self, slot: &Slot<i64>, name: &str, value: i64, usage: &str) {
        self.typed_var(slot, name, value, usage);
    }

    /// Register an unsigned integer flag.
    pub fn uint_var(&mut self, slot: &Slot<u64>, name: &str, value: u64, usage: &str) {
        self.typed_var(slot, name, value, usage);
    }

    /// Register a floating point flag.
    pub fn float_var(&mut self, slot: &Slot<f64>, name: &str, value: f64, usage: &str) {
        self.typed_var(slot, name, value, usage);
    }

    /// Register a flag for any type which can be parsed from and rendered to
    /// a string.
    pub fn typed_var<T>(&mut self, slot: &Slot<T>, name: &str, value: T, usage: &str)
    where
        T: FromStr + fmt::Display + 'static,
        T::Err: Into<BoxError>,
    {
        if self.redefines(name) {
            return;
        }

        slot.set(value);
        self.var(ParsedValue(slot.clone()), name, usage);
    }

    /// Register a flag which calls `f` every time it's set.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cmdwerk::{FlagSet, Slot};
    ///
    /// # fn main() -> Result<(), cmdwerk::Error> {
    /// let tags = Slot::new(Vec::new());
    ///
    /// let mut fs = FlagSet::new("demo");
    ///
    /// fs.func("tag", "add a tag", {
    ///     let tags = tags.clone();
    ///     move |value| {
    ///         tags.borrow_mut().push(value.to_owned());
    ///         Ok(())
    ///     }
    /// });
    ///
    /// fs.parse(["-tag", "a", "-tag=b"])?;
    /// assert_eq!(tags.get(), ["a", "b"]);
    /// # Ok(()) }
    /// ```
    pub fn func<F>(&mut self, name: &str, usage: &str, f: F)
    where
        F: FnMut(&str) -> Result<(), BoxError> + 'static,
    {
        self.var(FuncValue(f), name, usage);
    }

    /// Register a flag with a custom [Value].
    ///
    /// The default is whatever the value renders to at registration time.
    /// Registering the same name twice is reported as
    /// [ErrorKind::FlagRedefined] by the next call to [FlagSet::parse], and
    /// leaves the first registration and its storage untouched.
    pub fn var<V>(&mut self, value: V, name: &str, usage: &str)
    where
        V: Value + 'static,
    {
        if self.redefines(name) {
            return;
        }

        let flag = Flag {
            name: name.into(),
            usage: usage.into(),
            default: value.get().into(),
            value: Box::new(value),
        };

        self.formal.insert(name.into(), flag);
    }

    /// Record `name` as redefined if it's already registered.
    fn redefines(&mut self, name: &str) -> bool {
        if !self.formal.contains_key(name) {
            return false;
        }

        tracing::debug!(set = %self.name, flag = name, "flag redefined");
        self.redefined.get_or_insert_with(|| name.into());
        true
    }

    /// Look up a registered flag.
    pub fn lookup(&self, name: &str) -> Option<&Flag> {
        self.formal.get(name)
    }

    /// Set the value of a registered flag and mark it as provided.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), BoxError> {
        let flag = match self.formal.get_mut(name) {
            Some(flag) => flag,
            None => return Err(format!("no such flag -{}", name).into()),
        };

        flag.value.set(value)?;
        self.actual.insert(name.into());
        Ok(())
    }

    /// Test if the given flag has been provided, either on the command line
    /// or through [FlagSet::set].
    pub fn is_set(&self, name: &str) -> bool {
        self.actual.contains(name)
    }

    /// Iterate over all registered flags, sorted by name.
    pub fn flags(&self) -> impl Iterator<Item = &Flag> + '_ {
        self.formal.values()
    }

    /// Visit all registered flags, sorted by name.
    pub fn visit_all<F>(&self, mut f: F)
    where
        F: FnMut(&Flag),
    {
        for flag in self.formal.values() {
            f(flag);
        }
    }

    /// Visit flags which have been provided, sorted by name.
    pub fn visit<F>(&self, mut f: F)
    where
        F: FnMut(&Flag),
    {
        for name in &self.actual {
            if let Some(flag) = self.formal.get(name) {
                f(flag);
            }
        }
    }

    /// The number of registered flags.
    pub fn len(&self) -> usize {
        self.formal.len()
    }

    /// Test if no flags are registered.
    pub fn is_empty(&self) -> bool {
        self.formal.is_empty()
    }

    /// Arguments remaining after flags have been parsed.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Test if [FlagSet::parse] has been called.
    pub fn is_parsed(&self) -> bool {
        self.parsed
    }

    /// Parse flags from the given arguments, which must not include the
    /// program name.
    ///
    /// A `-h` or `-help` flag which isn't registered results in
    /// [ErrorKind::HelpRequested]. Nothing is written to the output here, that
    /// is up to whoever owns the usage of this flag set.
    pub fn parse<I>(&mut self, args: I) -> Result<(), Error>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.parsed = true;

        if let Some(name) = self.redefined.take() {
            return Err(Error::new(ErrorKind::FlagRedefined {
                set: self.name.clone(),
                name,
            }));
        }

        let mut it = args.into_iter().map(Into::into).peekable();

        while let Some(arg) = it.peek() {
            let dashes = match dashes(arg) {
                Some(dashes) => dashes,
                None => break,
            };

            let arg = match it.next() {
                Some(arg) => arg,
                None => break,
            };

            // Terminator.
            if dashes == 2 && arg.len() == 2 {
                break;
            }

            let name = &arg[dashes..];

            if name.starts_with('-') || name.starts_with('=') {
                return Err(Error::new(ErrorKind::BadFlagSyntax {
                    argument: arg.as_str().into(),
                }));
            }

            let (name, value) = match name.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (name, None),
            };

            let flag = match self.formal.get_mut(name) {
                Some(flag) => flag,
                None if name == "h" || name == "help" => {
                    return Err(Error::help());
                }
                None => {
                    return Err(Error::new(ErrorKind::UnknownFlag { name: name.into() }));
                }
            };

            if flag.value.is_bool_flag() {
                match value {
                    Some(value) => flag.value.set(value).map_err(|error| {
                        Error::new(ErrorKind::InvalidFlagValue {
                            name: name.into(),
                            value: value.into(),
                            error,
                        })
                    })?,
                    None => flag.value.set("true").map_err(|error| {
                        Error::new(ErrorKind::InvalidBoolFlag {
                            name: name.into(),
                            error,
                        })
                    })?,
                }
            } else {
                let value = match value {
                    Some(value) => value.to_owned(),
                    None => match it.next() {
                        Some(value) => value,
                        None => {
                            return Err(Error::new(ErrorKind::MissingFlagValue {
                                name: name.into(),
                            }))
                        }
                    },
                };

                flag.value.set(&value).map_err(|error| {
                    Error::new(ErrorKind::InvalidFlagValue {
                        name: name.into(),
                        value: value.as_str().into(),
                        error,
                    })
                })?;
            }

            self.actual.insert(name.into());
        }

        self.args = it.collect();
        Ok(())
    }
}

impl fmt::Debug for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlagSet")
            .field("name", &self.name)
            .field("formal", &self.formal)
            .field("actual", &self.actual)
            .field("args", &self.args)
            .field("parsed", &self.parsed)
            .finish()
    }
}

/// Count the leading dashes of something which looks like a flag.
fn dashes(arg: &str) -> Option<usize> {
    if arg.len() < 2 || !arg.starts_with('-') {
        return None;
    }

    if arg[1..].starts_with('-') {
        Some(2)
    } else {
        Some(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags_until_first_positional() {
        let debug = Slot::new(false);
        let name = Slot::new(String::new());

        let mut fs = FlagSet::new("test");
        fs.bool_var(&debug, "debug", false, "debug mode");
        fs.string_var(&name, "name", "", "a name");

        fs.parse(["--debug", "-name", "ferris", "rest", "-debug=false"])
            .unwrap();

        assert!(debug.get());
        assert_eq!(name.get(), "ferris");
        assert_eq!(fs.args(), ["rest", "-debug=false"]);
        assert!(fs.is_set("debug"));
        assert!(fs.is_set("name"));
    }

    #[test]
    fn terminator_is_consumed() {
        let mut fs = FlagSet::new("test");
        fs.parse(["--", "-x", "y"]).unwrap();
        assert_eq!(fs.args(), ["-x", "y"]);
    }

    #[test]
    fn lone_dash_is_positional() {
        let mut fs = FlagSet::new("test");
        fs.parse(["-", "-x"]).unwrap();
        assert_eq!(fs.args(), ["-", "-x"]);
    }

    #[test]
    fn last_occurrence_wins() {
        let debug = Slot::new(false);
        let mut fs = FlagSet::new("test");
        fs.bool_var(&debug, "debug", false, "debug mode");

        fs.parse(["-debug", "-debug=F"]).unwrap();
        assert!(!debug.get());
    }

    #[test]
    fn bool_spellings() {
        let cases = [
            ("1", true),
            ("T", true),
            ("True", true),
            ("0", false),
            ("FALSE", false),
        ];

        for (input, expected) in cases {
            assert_eq!(parse_bool(input).unwrap(), expected, "{}", input);
        }

        assert!(parse_bool("yes").is_err());
    }

    #[test]
    fn help_is_distinguished() {
        let mut fs = FlagSet::new("test");
        assert!(fs.parse(["-h"]).unwrap_err().is_help());

        let mut fs = FlagSet::new("test");
        assert!(fs.parse(["--help"]).unwrap_err().is_help());
    }

    #[test]
    fn registered_help_flag_is_not_special() {
        let help = Slot::new(false);
        let mut fs = FlagSet::new("test");
        fs.bool_var(&help, "h", false, "my own help");

        fs.parse(["-h"]).unwrap();
        assert!(help.get());
    }

    #[test]
    fn syntax_errors() {
        let count = Slot::new(0i64);

        let mut fs = FlagSet::new("test");
        fs.int_var(&count, "count", 0, "a count");

        let error = fs.parse(["---count"]).unwrap_err();
        assert!(matches!(error.kind(), ErrorKind::BadFlagSyntax { .. }));

        let mut fs = FlagSet::new("test");
        fs.int_var(&count, "count", 0, "a count");
        let error = fs.parse(["-count"]).unwrap_err();
        assert!(matches!(error.kind(), ErrorKind::MissingFlagValue { .. }));
        assert_eq!(error.to_string(), "flag needs an argument: -count");

        let mut fs = FlagSet::new("test");
        fs.int_var(&count, "count", 0, "a count");
        let error = fs.parse(["-count=many"]).unwrap_err();
        assert!(matches!(error.kind(), ErrorKind::InvalidFlagValue { .. }));
        assert!(error.is_flag_syntax());
    }

    #[test]
    fn redefinition_is_reported_on_parse() {
        let a = Slot::new(false);
        let mut fs = FlagSet::new("test");
        fs.bool_var(&a, "a", false, "first");
        fs.bool_var(&a, "a", true, "second");

        let count = Slot::new(0i64);
        fs.int_var(&count, "count", 1, "first");
        fs.int_var(&count, "count", 2, "second");

        assert!(!a.get());
        assert_eq!(count.get(), 1);
        assert_eq!(fs.lookup("a").unwrap().usage(), "first");

        let error = fs.parse(Vec::<String>::new()).unwrap_err();
        assert!(matches!(error.kind(), ErrorKind::FlagRedefined { .. }));
        assert_eq!(error.to_string(), "test flag redefined: a");
    }

    #[test]
    fn defaults_are_captured_at_registration() {
        let limit = Slot::new(0u64);
        let mut fs = FlagSet::new("test");
        fs.uint_var(&limit, "limit", 42, "a limit");
        fs.parse(["-limit=7"]).unwrap();

        let flag = fs.lookup("limit").unwrap();
        assert_eq!(flag.default_value(), "42");
        assert_eq!(flag.value(), "7");
    }

    #[test]
    fn flags_are_sorted() {
        let slot = Slot::new(String::new());
        let mut fs = FlagSet::new("test");
        fs.string_var(&slot, "zeta", "", "");
        fs.string_var(&slot, "alpha", "", "");
        fs.string_var(&slot, "mid", "", "");

        let names = fs.flags().map(Flag::name).collect::<Vec<_>>();
        assert_eq!(names, ["alpha", "mid", "zeta"]);
    }
}
