//! Parser for extended INI files.
//!
//! On top of plain `key = value` lines and `[section]` headers this
//! understands:
//!
//! - line comments (`;`, `#`) and block comments (`;;;`, `###`), also
//!   in the middle of keys and values
//! - quoted keys and values, `"""` / `'''` strings spanning lines
//! - escapes and `$VAR` / `${VAR}` environment substitution
//! - `a.b.c = 1` nested keys and `list[] = x` arrays
//! - `[child : parent]` section inheritance
//! - numbers and booleans as native values
//!
//! ```no_run
//! let cfg = extini::Builder::new()
//!     .process_env()
//!     .parse("[server]\nport = 8080\n")
//!     .unwrap();
//! assert_eq!(cfg["server"]["port"].as_f64(), Some(8080.0));
//! ```
//!
//! A parsed document can also be read straight into a type that
//! implements `serde::Deserialize`, see [`from_str`] and [`from_file`].
#[macro_use]
extern crate log;

mod cfg;
mod coerce;
mod de;
mod entry;
mod error;
mod inherit;
mod parser;
mod scanner;
mod value;

pub use cfg::{
    from_file, from_str, parse, parse_file, Builder, CommentHook, CommentKind, Env, EnvHook,
    Options,
};
pub use entry::Entry;
pub use error::{Error, ErrorCode, Result, TokenPos};
pub use parser::{Document, Parser};
pub use value::{merge_into, Map, Sections, Value};
