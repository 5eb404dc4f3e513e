//! Escape decoding and `$NAME` / `${NAME}` interpolation.
//!
//! Unquoted values only know `\X` → `X`. Quoted strings also decode
//! octal, unicode and control character escapes, and interpolate
//! variables only inside double quotes.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::cfg::{Env, EnvHook, Options};
use crate::error::{Error, ErrorCode, Result, TokenPos};
use crate::value::Value;

static RE_ESCAPE: Lazy<Regex> = Lazy::new(|| {
    let re = r"\\(?P<esc>[^\r\n\x{2028}\x{2029}])";
    Regex::new(re).expect("could not compile RE_ESCAPE regexp")
});

static RE_VALUE_ENV: Lazy<Regex> = Lazy::new(|| {
    let re = r"\$(?P<var>[0-9A-Za-z_]+)|(?P<open>\$\{)|(?P<close>\})";
    Regex::new(re).expect("could not compile RE_VALUE_ENV regexp")
});

static RE_VALUE_ESCAPE_ENV: Lazy<Regex> = Lazy::new(|| {
    let re = r"\\(?P<esc>[^\r\n\x{2028}\x{2029}])|\$(?P<var>[0-9A-Za-z_]+)|(?P<open>\$\{)|(?P<close>\})";
    Regex::new(re).expect("could not compile RE_VALUE_ESCAPE_ENV regexp")
});

static RE_STRING_ENV: Lazy<Regex> = Lazy::new(|| {
    let re = r"\\(?P<esc>[^\r\n\x{2028}\x{2029}])|\$(?P<var>[0-9A-Za-z_]+)|(?P<open>\$\{)|(?P<close>\})|(?P<lf>[\r\n])";
    Regex::new(re).expect("could not compile RE_STRING_ENV regexp")
});

static RE_OCTAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\\([0-7]{1,3})").expect("could not compile RE_OCTAL regexp")
});

static RE_UNICODE: Lazy<Regex> = Lazy::new(|| {
    let re = r"^\\u(?:([0-9a-fA-F]{4,5})|\{([0-9a-fA-F]{1,5})\})";
    Regex::new(re).expect("could not compile RE_UNICODE regexp")
});

// A closing quote may not follow a backslash; single quotes may not span lines.
static RE_END_DQ: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[^\r\n\\](")|[\r\n]"#).expect("RE_END_DQ"));
static RE_END_SQ: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\r\n\\](')|[\r\n]").expect("RE_END_SQ"));
static RE_END_TDQ: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[^\\](""")"#).expect("RE_END_TDQ"));
static RE_END_TSQ: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\\](''')").expect("RE_END_TSQ"));

/// Quote styles, in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Quote {
    TripleDouble,
    TripleSingle,
    Double,
    Single,
}

impl Quote {
    pub(crate) fn symbol(self) -> &'static str {
        match self {
            Quote::TripleDouble => r#"""""#,
            Quote::TripleSingle => "'''",
            Quote::Double => "\"",
            Quote::Single => "'",
        }
    }

    /// Finds the closing quote. Group 1 is set only for a real
    /// terminator, not for a stray newline.
    pub(crate) fn terminator(self) -> &'static Regex {
        match self {
            Quote::TripleDouble => &*RE_END_TDQ,
            Quote::TripleSingle => &*RE_END_TSQ,
            Quote::Double => &*RE_END_DQ,
            Quote::Single => &*RE_END_SQ,
        }
    }

    fn interpolates(self) -> bool {
        self == Quote::TripleDouble || self == Quote::Double
    }
}

/// `\X` → `X` for unquoted keys.
pub(crate) fn unescape_key(s: &str) -> String {
    RE_ESCAPE.replace_all(s, "$esc").into_owned()
}

/// `true`, `false` or a number.
pub(crate) fn native(s: &str) -> Option<Value> {
    match s {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        _ => s
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Value::Number),
    }
}

pub(crate) struct Coercer<'a> {
    env: Option<&'a Env>,
    not_found: Option<&'a EnvHook>,
    escape_value: bool,
}

impl<'a> Coercer<'a> {
    pub(crate) fn new(opts: &'a Options) -> Coercer<'a> {
        Coercer {
            env: opts.env.as_ref(),
            not_found: opts.on_env_not_found.as_deref(),
            escape_value: opts.escape_char_value,
        }
    }

    /// Unquoted value text.
    pub(crate) fn value(&self, s: &str) -> Result<String> {
        let re: &Regex = match (self.escape_value, self.env.is_some()) {
            (true, true) => &*RE_VALUE_ESCAPE_ENV,
            (true, false) => &*RE_ESCAPE,
            (false, true) => &*RE_VALUE_ENV,
            (false, false) => return Ok(s.to_string()),
        };
        self.interpolate(s, re, false)
    }

    /// Body of a quoted string.
    pub(crate) fn string(&self, s: &str, quote: Quote) -> Result<String> {
        if self.env.is_some() && quote.interpolates() {
            self.interpolate(s, &*RE_STRING_ENV, true)
        } else {
            self.interpolate(s, &*RE_ESCAPE, true)
        }
    }

    fn lookup(&self, name: &str, raw: &str) -> String {
        if let Some(value) = self.env.and_then(|env| env.get(name)) {
            return value.clone();
        }
        match self.not_found {
            Some(hook) => hook(name, raw),
            None => raw.to_string(),
        }
    }

    // An escape or `$NAME` drops a pending `${`, which is then kept as
    // literal text. With `quoted`, escapes are decoded.
    fn interpolate(&self, s: &str, re: &Regex, quoted: bool) -> Result<String> {
        let mut out = String::with_capacity(s.len());
        let mut last = 0;
        let mut at = 0;
        let mut open: Option<usize> = None;

        while let Some(caps) = re.captures_at(s, at) {
            let (start, end) = match caps.get(0) {
                Some(m) => (m.start(), m.end()),
                None => break,
            };
            at = end;
            if let Some(esc) = caps.name("esc") {
                open = None;
                out.push_str(&s[last..start]);
                if quoted {
                    let (c, len) = decode_escape(&s[start..], esc.as_str())?;
                    out.push(c);
                    at = start + len;
                } else {
                    out.push_str(esc.as_str());
                }
                last = at;
            } else if let Some(var) = caps.name("var") {
                open = None;
                out.push_str(&s[last..start]);
                out.push_str(&self.lookup(var.as_str(), &s[start..end]));
                last = end;
            } else if let (Some(_), Some(name_start)) = (caps.name("close"), open) {
                out.push_str(&self.lookup(&s[name_start..start], &s[last..end]));
                last = end;
                open = None;
            } else if caps.name("open").is_some() {
                out.push_str(&s[last..start]);
                last = start;
                open = Some(end);
            } else if caps.name("lf").is_some() && open.is_some() {
                out.push_str(&s[last..end]);
                last = end;
                open = None;
            }
        }
        out.push_str(&s[last..]);
        Ok(out)
    }
}

fn unicode_error() -> Error {
    Error::new(ErrorCode::Unicode, "invalid unicode escape sequence", TokenPos::none())
}

// Decode the escape at the start of `s`. Returns the character and the
// length of the escape sequence.
fn decode_escape(s: &str, esc: &str) -> Result<(char, usize)> {
    if let Some(caps) = RE_OCTAL.captures(s) {
        let digits = &caps[1];
        if let Some(c) = u32::from_str_radix(digits, 8).ok().and_then(std::char::from_u32) {
            return Ok((c, 1 + digits.len()));
        }
    }
    if esc == "u" {
        let caps = RE_UNICODE.captures(s).ok_or_else(unicode_error)?;
        let hex = caps.get(1).or_else(|| caps.get(2)).ok_or_else(unicode_error)?;
        let c = u32::from_str_radix(hex.as_str(), 16)
            .ok()
            .and_then(std::char::from_u32)
            .ok_or_else(unicode_error)?;
        return Ok((c, caps[0].len()));
    }
    let c = match esc {
        "t" => '\t',
        "r" => '\r',
        "n" => '\n',
        "v" => '\x0b',
        "f" => '\x0c',
        "b" => '\x08',
        _ => match esc.chars().next() {
            Some(c) => c,
            None => return Err(Error::new(ErrorCode::Expected, "empty escape", TokenPos::none())),
        },
    };
    Ok((c, 1 + esc.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn opts(env: &[(&str, &str)]) -> Options {
        let mut o = Options::default();
        o.env = Some(env.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect());
        o
    }

    #[test]
    fn control_escapes() {
        let o = opts(&[]);
        let c = Coercer::new(&o);
        let decoded = c.string(r"\t\r\n\v\f\b\q\\\'", Quote::Double).unwrap();
        assert_eq!(decoded, "\t\r\n\x0b\x0c\x08q\\'");
    }

    #[test]
    fn octal_and_unicode() {
        let o = opts(&[]);
        let c = Coercer::new(&o);
        assert_eq!(c.string(r"o\111o", Quote::Single).unwrap(), "oIo");
        assert_eq!(c.string(r"\0", Quote::Single).unwrap(), "\u{0}");
        assert_eq!(c.string(r"\1234", Quote::Single).unwrap(), "S4");
        assert_eq!(c.string(r"\u00FF", Quote::Double).unwrap(), "\u{FF}");
        assert_eq!(c.string(r"u\u0424u", Quote::Double).unwrap(), "u\u{424}u");
        assert_eq!(c.string(r"\u{456}", Quote::Double).unwrap(), "\u{456}");
        assert_eq!(c.string(r"\u{1F600}!", Quote::Double).unwrap(), "\u{1F600}!");
        assert_eq!(c.string(r"\8", Quote::Double).unwrap(), "8");
    }

    #[test]
    fn invalid_unicode() {
        let o = opts(&[]);
        let c = Coercer::new(&o);
        assert_eq!(c.string(r"\uZZ", Quote::Double).unwrap_err().code, ErrorCode::Unicode);
        assert_eq!(c.string(r"\u{D800}", Quote::Double).unwrap_err().code, ErrorCode::Unicode);
    }

    #[test]
    fn string_interpolation() {
        let o = opts(&[("VAR0", "VAL0")]);
        let c = Coercer::new(&o);
        assert_eq!(c.string("a $VAR0 b", Quote::Double).unwrap(), "a VAL0 b");
        assert_eq!(c.string("${VAR0}", Quote::TripleDouble).unwrap(), "VAL0");
        assert_eq!(c.string("$VAR0", Quote::Single).unwrap(), "$VAR0");
        assert_eq!(c.string("${VAR0}", Quote::TripleSingle).unwrap(), "${VAR0}");
        assert_eq!(c.string("$NOPE ${NOPE}", Quote::Double).unwrap(), "$NOPE ${NOPE}");
        assert_eq!(c.string("x ${VAR0", Quote::Double).unwrap(), "x ${VAR0");
    }

    #[test]
    fn newline_drops_pending_brace() {
        let mut o = opts(&[]);
        o.on_env_not_found = Some(Arc::new(|name: &str, _raw: &str| format!("<{}>", name)));
        let c = Coercer::new(&o);
        assert_eq!(c.string("${A\nB}", Quote::TripleDouble).unwrap(), "${A\nB}");
        assert_eq!(c.string("${A B}", Quote::TripleDouble).unwrap(), "<A B>");
    }

    #[test]
    fn value_interpolation() {
        let o = opts(&[("HOST", "127.0.0.1")]);
        let c = Coercer::new(&o);
        assert_eq!(c.value("$HOST").unwrap(), "127.0.0.1");
        assert_eq!(c.value("http://${HOST}:80").unwrap(), "http://127.0.0.1:80");
        assert_eq!(c.value("$PORT").unwrap(), "$PORT");
        assert_eq!(c.value(r"\$HOST \t").unwrap(), "$HOST t");
        assert_eq!(c.value("${HOST").unwrap(), "${HOST");
        assert_eq!(c.value("a}b").unwrap(), "a}b");
        assert_eq!(c.value("${A$HOST}").unwrap(), "${A127.0.0.1}");
    }

    #[test]
    fn value_without_env_or_escapes() {
        let mut o = Options::default();
        o.env = None;
        assert_eq!(Coercer::new(&o).value(r"$HOST \x").unwrap(), "$HOST x");
        o.escape_char_value = false;
        assert_eq!(Coercer::new(&o).value(r"$HOST \x").unwrap(), r"$HOST \x");
        let mut o = opts(&[("A", "1")]);
        o.escape_char_value = false;
        assert_eq!(Coercer::new(&o).value(r"\$A").unwrap(), r"\1");
    }

    #[test]
    fn native_types() {
        assert_eq!(native("true"), Some(Value::Bool(true)));
        assert_eq!(native("false"), Some(Value::Bool(false)));
        assert_eq!(native("5"), Some(Value::Number(5.0)));
        assert_eq!(native("1.5"), Some(Value::Number(1.5)));
        assert_eq!(native("-2e3"), Some(Value::Number(-2000.0)));
        assert_eq!(native("TRUE"), None);
        assert_eq!(native("inf"), None);
        assert_eq!(native("5px"), None);
        assert_eq!(native(""), None);
    }

    #[test]
    fn key_unescape() {
        assert_eq!(unescape_key(r"a\.b\\c\="), r"a.b\c=");
    }
}
