use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{self, Error as IoError, ErrorKind as Kind};
use std::sync::Arc;

use serde::Deserialize;

use crate::error::Result;
use crate::parser::Parser;
use crate::value::Value;

/// Environment lookup used for `$NAME` / `${NAME}` interpolation.
pub type Env = HashMap<String, String>;

/// Called with the text and kind of every comment, in source order.
pub type CommentHook = dyn Fn(&str, CommentKind) + Send + Sync;

/// Called with the variable name and the raw matched text (`$NAME` or
/// `${NAME}`) when a variable is not in the environment. Returns the
/// replacement text.
pub type EnvHook = dyn Fn(&str, &str) -> String + Send + Sync;

/// Kind of comment passed to the comment hook.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CommentKind {
    Block,
    Line,
}

impl CommentKind {
    pub fn as_str(&self) -> &'static str {
        match *self {
            CommentKind::Block => "block-comment",
            CommentKind::Line => "line-comment",
        }
    }
}

/// Parser options.
///
/// A [`Parser`] takes ownership of its options; to parse with different
/// options, build a new parser.
#[derive(Clone)]
pub struct Options {
    /// Merge the sections over the global mapping.
    pub merge: bool,
    /// Variables for interpolation. `None` disables interpolation.
    pub env: Option<Env>,
    /// Block comment markers; the same marker opens and closes.
    pub block_comment: Option<Vec<String>>,
    /// Line comment markers.
    pub line_comment: Option<Vec<String>>,
    /// Assignment markers.
    pub assign: Vec<String>,
    /// Turn `true`, `false` and numbers into booleans and numbers.
    pub native_type: bool,
    /// Expand `a.b.c` keys into nested mappings.
    pub dot_key: bool,
    /// Resolve `[child : parent]` sections and inherit the global keys.
    pub inherit: bool,
    /// `key[] = value` appends to an array.
    pub array: bool,
    /// Single and double quoted strings.
    pub string: bool,
    /// Triple quoted (multi-line) strings.
    pub mstring: bool,
    /// Treat a broken quoted key as plain text instead of failing.
    pub ignore_invalid_string_key: bool,
    /// Treat a broken quoted value as plain text instead of failing.
    pub ignore_invalid_string_value: bool,
    /// Value of a key at the end of the input that has no value.
    pub empty_value: Value,
    /// `\X` in an unquoted key is `X`.
    pub escape_char_key: bool,
    /// `\X` in an unquoted value is `X`.
    pub escape_char_value: bool,
    /// A line without assignment is a key with an empty value.
    pub ignore_missing_assign: bool,
    /// Lowercase keys and values.
    pub ignore_case: bool,
    pub on_comment: Option<Arc<CommentHook>>,
    pub on_env_not_found: Option<Arc<EnvHook>>,
}

fn strings(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for Options {
    fn default() -> Options {
        Options {
            merge: false,
            env: Some(Env::new()),
            block_comment: Some(strings(&[";;;", "###"])),
            line_comment: Some(strings(&[";", "#"])),
            assign: strings(&[":", "="]),
            native_type: true,
            dot_key: true,
            inherit: true,
            array: true,
            string: true,
            mstring: true,
            ignore_invalid_string_key: true,
            ignore_invalid_string_value: true,
            empty_value: Value::String(String::new()),
            escape_char_key: true,
            escape_char_value: true,
            ignore_missing_assign: true,
            ignore_case: false,
            on_comment: None,
            on_env_not_found: None,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn hook<T: ?Sized>(h: &Option<Arc<T>>) -> &'static str {
            if h.is_some() {
                "[callback]"
            } else {
                "None"
            }
        }
        f.debug_struct("Options")
            .field("merge", &self.merge)
            .field("env", &self.env.as_ref().map(|e| e.len()))
            .field("block_comment", &self.block_comment)
            .field("line_comment", &self.line_comment)
            .field("assign", &self.assign)
            .field("native_type", &self.native_type)
            .field("dot_key", &self.dot_key)
            .field("inherit", &self.inherit)
            .field("array", &self.array)
            .field("string", &self.string)
            .field("mstring", &self.mstring)
            .field("ignore_invalid_string_key", &self.ignore_invalid_string_key)
            .field("ignore_invalid_string_value", &self.ignore_invalid_string_value)
            .field("empty_value", &self.empty_value)
            .field("escape_char_key", &self.escape_char_key)
            .field("escape_char_value", &self.escape_char_value)
            .field("ignore_missing_assign", &self.ignore_missing_assign)
            .field("ignore_case", &self.ignore_case)
            .field("on_comment", &hook(&self.on_comment))
            .field("on_env_not_found", &hook(&self.on_env_not_found))
            .finish()
    }
}

/// Parse a string with the default options, merging sections over the
/// global keys.
pub fn parse(s: &str) -> Result<Value> {
    Builder::new().parse(s)
}

/// Parse a file with the default options, merging sections over the
/// global keys.
pub fn parse_file(name: impl Into<String>) -> io::Result<Value> {
    Builder::new().parse_file(name)
}

/// Read configuration from a string.
pub fn from_str<T>(s: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    Builder::new().from_str(s)
}

/// Read configuration from a file.
pub fn from_file<T>(name: impl Into<String>) -> io::Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    Builder::new().from_file(name)
}

/// Configuration builder.
///
/// Starts out with the default [`Options`], except that `merge` is on.
#[derive(Debug, Clone)]
pub struct Builder {
    options: Options,
}

impl Default for Builder {
    fn default() -> Builder {
        Builder::new()
    }
}

macro_rules! flags {
    ( $($(#[$doc:meta])* $name:ident),* ) => {
        $(
            $(#[$doc])*
            pub fn $name(mut self, on: bool) -> Builder {
                self.options.$name = on;
                self
            }
        )*
    };
}

impl Builder {
    /// Create a new builder.
    pub fn new() -> Builder {
        let mut options = Options::default();
        options.merge = true;
        Builder { options }
    }

    flags!(
        /// Merge sections over the global keys (default on).
        merge,
        /// Booleans and numbers instead of strings.
        native_type,
        /// Expand dotted keys.
        dot_key,
        /// Section inheritance.
        inherit,
        /// `key[]` arrays.
        array,
        /// Quoted strings.
        string,
        /// Triple quoted strings.
        mstring,
        ignore_invalid_string_key,
        ignore_invalid_string_value,
        escape_char_key,
        escape_char_value,
        ignore_missing_assign,
        /// Lowercase keys and values.
        ignore_case
    );

    /// Set the variables used for interpolation.
    pub fn env<I, K, V>(mut self, vars: I) -> Builder
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.options.env = Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Interpolate from a snapshot of the process environment.
    pub fn process_env(self) -> Builder {
        self.env(std::env::vars())
    }

    /// Disable interpolation.
    pub fn no_env(mut self) -> Builder {
        self.options.env = None;
        self
    }

    pub fn block_comment<I, S>(mut self, markers: I) -> Builder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.block_comment = Some(markers.into_iter().map(Into::into).collect());
        self
    }

    pub fn no_block_comment(mut self) -> Builder {
        self.options.block_comment = None;
        self
    }

    pub fn line_comment<I, S>(mut self, markers: I) -> Builder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.line_comment = Some(markers.into_iter().map(Into::into).collect());
        self
    }

    pub fn no_line_comment(mut self) -> Builder {
        self.options.line_comment = None;
        self
    }

    pub fn assign<I, S>(mut self, markers: I) -> Builder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.assign = markers.into_iter().map(Into::into).collect();
        self
    }

    /// Value for a key without value at the end of the input.
    pub fn empty_value(mut self, value: impl Into<Value>) -> Builder {
        self.options.empty_value = value.into();
        self
    }

    /// Callback for every comment.
    pub fn on_comment<F>(mut self, f: F) -> Builder
    where
        F: Fn(&str, CommentKind) + Send + Sync + 'static,
    {
        self.options.on_comment = Some(Arc::new(f));
        self
    }

    /// Callback for variables that are not in the environment.
    pub fn on_env_not_found<F>(mut self, f: F) -> Builder
    where
        F: Fn(&str, &str) -> String + Send + Sync + 'static,
    {
        self.options.on_env_not_found = Some(Arc::new(f));
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Build a reusable parser.
    pub fn build(self) -> Parser {
        Parser::new(self.options)
    }

    /// Parse a string.
    pub fn parse(self, s: &str) -> Result<Value> {
        self.build().parse_value(s)
    }

    /// Parse a file.
    pub fn parse_file(self, name: impl Into<String>) -> io::Result<Value> {
        let name = name.into();
        let text = read_file(&name)?;
        self.build()
            .parse_value(&text)
            .map_err(|mut e| { e.file_name = name; e })
            .map_err(|e| IoError::new(Kind::Other, e))
    }

    /// Read configuration from a string.
    pub fn from_str<T>(self, s: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        T::deserialize(self.parse(s)?)
    }

    /// Read configuration from a file.
    pub fn from_file<T>(self, name: impl Into<String>) -> io::Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let name = name.into();
        let value = self.parse_file(name.clone())?;
        T::deserialize(value)
            .map_err(|mut e| { e.file_name = name; e })
            .map_err(|e| IoError::new(Kind::Other, e))
    }
}

fn read_file(name: &str) -> io::Result<String> {
    let data = fs::read(name)
        .map_err(|e| IoError::new(e.kind(), format!("{}: {}", name, e)))?;
    String::from_utf8(data)
        .map_err(|_| IoError::new(Kind::InvalidData, format!("{}: utf-8 error", name)))
}
