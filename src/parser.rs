use regex::Regex;
use serde::Serialize;

use crate::cfg::Options;
use crate::coerce::{self, Coercer, Quote};
use crate::entry::Entry;
use crate::error::{Error, ErrorCode, Result};
use crate::inherit;
use crate::scanner::{is_space, Scanner};
use crate::value::{Map, Sections, Value};

/// Result of parsing a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Document {
    /// Keys before the first section header.
    pub global: Map,
    /// Sections in the order they first appear.
    pub sections: Sections,
}

impl Document {
    /// Either the merged mapping, or `{global: .., sections: ..}`.
    pub fn into_value(self, merge: bool) -> Value {
        if merge {
            return Value::Map(inherit::merge(self));
        }
        let mut sections = Map::new();
        for (name, section) in self.sections {
            sections.insert(name, Value::Map(section));
        }
        let mut doc = Map::new();
        doc.insert("global".to_string(), Value::Map(self.global));
        doc.insert("sections".to_string(), Value::Map(sections));
        Value::Map(doc)
    }
}

// Where a quoted string was found; decides which `ignore_invalid_string_*`
// option applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StringContext {
    Key,
    Value,
    Section,
}

/// Parser for one set of options.
///
/// The parser is immutable once built; `parse` can be called any number
/// of times, also from several threads at once.
#[derive(Debug)]
pub struct Parser {
    options: Options,
    // assign | block comment | line comment | newline
    assign_or_lf_or_comment: Regex,
    // block comment | line comment | newline | end of input
    comment_or_newline: Regex,
}

fn alternation(groups: &[&[String]], tail: &[&str]) -> String {
    groups
        .iter()
        .flat_map(|g| g.iter())
        .map(|s| regex::escape(s))
        .chain(tail.iter().map(|s| s.to_string()))
        .collect::<Vec<_>>()
        .join("|")
}

fn drop_empty(what: &str, markers: &mut Vec<String>) {
    if markers.iter().any(|m| m.is_empty()) {
        warn!("ignoring empty {} marker", what);
        markers.retain(|m| !m.is_empty());
    }
}

impl Parser {
    pub fn new(mut options: Options) -> Parser {
        drop_empty("assign", &mut options.assign);
        if let Some(markers) = options.block_comment.as_mut() {
            drop_empty("block comment", markers);
        }
        if let Some(markers) = options.line_comment.as_mut() {
            drop_empty("line comment", markers);
        }

        let block = options.block_comment.as_deref().unwrap_or(&[]);
        let line = options.line_comment.as_deref().unwrap_or(&[]);
        let assign = options.assign.as_slice();
        let assign_or_lf_or_comment = alternation(&[assign, block, line], &[r"[\r\n]"]);
        let comment_or_newline = alternation(&[block, line], &[r"[\r\n]", r"\z"]);
        debug!("assign_or_lf_or_comment: {}", assign_or_lf_or_comment);
        debug!("comment_or_newline: {}", comment_or_newline);

        Parser {
            assign_or_lf_or_comment: Regex::new(&assign_or_lf_or_comment)
                .expect("could not compile assign_or_lf_or_comment regexp"),
            comment_or_newline: Regex::new(&comment_or_newline)
                .expect("could not compile comment_or_newline regexp"),
            options,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Parse `input` into global keys and sections.
    ///
    /// Either the whole input parses, or an error is returned. A leading
    /// byte order mark is skipped like any other whitespace.
    pub fn parse(&self, input: &str) -> Result<Document> {
        debug!("parse: {} bytes", input.len());
        let mut sc = Scanner::new(input, &self.options);
        let mut doc = Document::default();
        self.config(&mut sc, &mut doc)?;
        if self.options.inherit {
            doc = inherit::resolve(doc);
        }
        debug!("parse: {} global keys, {} sections", doc.global.len(), doc.sections.len());
        Ok(doc)
    }

    /// Parse `input`, merging the sections over the global keys if the
    /// `merge` option is set.
    pub fn parse_value(&self, input: &str) -> Result<Value> {
        Ok(self.parse(input)?.into_value(self.options.merge))
    }

    // Section headers and key/value lines until the end of the input.
    fn config(&self, sc: &mut Scanner<'_>, doc: &mut Document) -> Result<()> {
        let mut current: Option<String> = None;
        loop {
            if let Some(name) = self.maybe_section(sc)? {
                debug!("section [{}]", name);
                doc.sections.entry(name.clone()).or_insert_with(Map::new);
                current = Some(name);
                continue;
            }
            let entry = match self.expect_eof_or_key_value(sc)? {
                Some(entry) => entry,
                None => return Ok(()),
            };
            trace!("set {:?} = {:?}", entry.key, entry.value);
            let target = match current.as_ref() {
                Some(name) => doc.sections.entry(name.clone()).or_insert_with(Map::new),
                None => &mut doc.global,
            };
            entry
                .set(target, self.options.dot_key)
                .map_err(|e| e.update_pos(sc.token_pos()))?;
        }
    }

    fn ignores_invalid(&self, ctx: StringContext) -> bool {
        match ctx {
            StringContext::Key => self.options.ignore_invalid_string_key,
            StringContext::Value => self.options.ignore_invalid_string_value,
            StringContext::Section => false,
        }
    }

    fn is_assign(&self, s: &str) -> bool {
        self.options.assign.iter().any(|m| m == s)
    }

    fn is_block_comment(&self, s: &str) -> bool {
        self.options.block_comment.iter().flatten().any(|m| m == s)
    }

    fn is_line_comment(&self, s: &str) -> bool {
        self.options.line_comment.iter().flatten().any(|m| m == s)
    }

    fn expected_assign(&self) -> String {
        let markers: Vec<_> = self.options.assign.iter().map(|m| format!("'{}'", m)).collect();
        format!("one of {}", markers.join(", "))
    }

    // A quoted string at the cursor, if there is one.
    fn maybe_string(&self, sc: &mut Scanner<'_>, ctx: StringContext) -> Result<Option<String>> {
        let backup = sc.save_pos();
        if self.options.mstring {
            for &quote in &[Quote::TripleDouble, Quote::TripleSingle] {
                if sc.maybe(quote.symbol()) {
                    if let Some(s) = self.quoted(sc, quote, ctx, backup)? {
                        return Ok(Some(s));
                    }
                }
            }
        }
        if self.options.string {
            let quote = match sc.peek() {
                Some('"') => Some(Quote::Double),
                Some('\'') => Some(Quote::Single),
                _ => None,
            };
            if let Some(quote) = quote {
                sc.maybe(quote.symbol());
                return self.quoted(sc, quote, ctx, backup);
            }
        }
        Ok(None)
    }

    // Rest of a quoted string, the opening quote already consumed.
    fn quoted(
        &self,
        sc: &mut Scanner<'_>,
        quote: Quote,
        ctx: StringContext,
        backup: usize,
    ) -> Result<Option<String>> {
        if sc.maybe(quote.symbol()) {
            return Ok(Some(String::new()));
        }
        let start = sc.pos;
        let caps = sc.captures(quote.terminator());
        if let Some(end) = caps.as_ref().and_then(|c| c.get(1)) {
            let body = &sc.input()[start..end.start()];
            let s = Coercer::new(&self.options)
                .string(body, quote)
                .map_err(|e| e.update_pos(sc.token_pos()))?;
            return Ok(Some(s));
        }
        if self.ignores_invalid(ctx) {
            sc.restore_pos(backup);
            return Ok(None);
        }
        let found = match caps.as_ref().and_then(|c| c.get(0)) {
            Some(_) => "newline",
            None => "[EOF]",
        };
        Err(Error::expected(format!("'{}'", quote.symbol()), found, sc.token_pos()))
    }

    /// A `[section]` header, if the next line has one.
    fn maybe_section(&self, sc: &mut Scanner<'_>) -> Result<Option<String>> {
        sc.skip_all_space_and_comment()?;
        if sc.at_end() || !sc.maybe("[") {
            return Ok(None);
        }
        sc.skip_space_and_comment()?;
        let quoted = self
            .maybe_string(sc, StringContext::Section)?
            .filter(|s| !s.is_empty());
        if quoted.is_some() {
            sc.skip_space_and_comment()?;
        }
        let start = sc.pos;
        let closed = match quoted {
            Some(_) => sc.maybe("]"),
            None => sc.maybe_past("]"),
        };
        if !closed {
            return Err(Error::expected("']'", describe(sc), sc.token_pos()));
        }
        let name = match quoted {
            Some(name) => name,
            None => sc.input()[start..sc.pos - 1].trim_matches(is_space).to_string(),
        };
        if name.is_empty() {
            return Err(Error::new(ErrorCode::Section, "empty section", sc.token_pos()));
        }
        Ok(Some(name))
    }

    /// Next `key = value` entry, or `None` at the end of the input.
    fn expect_eof_or_key_value(&self, sc: &mut Scanner<'_>) -> Result<Option<Entry>> {
        sc.skip_all_space_and_comment()?;
        if sc.at_end() {
            return Ok(None);
        }
        let opts = &self.options;
        let input = sc.input();
        let key_start = sc.pos;

        // Quoted key: must be followed by an assignment (or comment/newline).
        let mut is_string_key = false;
        let mut key = None;
        let mut symbol = None;
        if let Some(k) = self.maybe_string(sc, StringContext::Key)? {
            is_string_key = true;
            sc.skip_space_and_comment()?;
            let at = sc.pos;
            if sc.maybe_char(&self.assign_or_lf_or_comment).is_some() {
                key = Some(k);
                symbol = Some(at..sc.pos);
            } else if opts.ignore_invalid_string_key {
                sc.restore_pos(key_start);
            } else {
                return Err(Error::new(ErrorCode::InvalidString, "invalid string", sc.token_pos()));
            }
        }

        let symbol = match symbol {
            Some(symbol) => symbol,
            None => match sc.find(&self.assign_or_lf_or_comment) {
                Some(m) => m.range(),
                None if opts.ignore_missing_assign => {
                    sc.restore_pos(input.len());
                    input.len()..input.len()
                }
                None => {
                    return Err(Error::expected(self.expected_assign(), "[EOF]", sc.token_pos()));
                }
            },
        };
        let key_end = symbol.start;
        let text = &input[symbol.clone()];
        let mut has_block_comment = false;
        if self.is_line_comment(text) || text == "\r" || text == "\n" {
            if !opts.ignore_missing_assign {
                let found = if self.is_line_comment(text) { "comment" } else { "newline" };
                return Err(Error::expected(self.expected_assign(), found, sc.token_pos()));
            }
            sc.restore_pos(symbol.start);
        } else if self.is_block_comment(text) {
            has_block_comment = true;
            sc.restore_pos(symbol.start);
        }

        let mut is_array = false;
        let key = match key {
            Some(key) => key,
            None => {
                let mut key = input[key_start..key_end].to_string();
                if has_block_comment {
                    key = self.key_around_comments(sc, key)?;
                }
                let mut key = key.trim_matches(is_space).to_string();
                if opts.escape_char_key {
                    key = coerce::unescape_key(&key);
                }
                if opts.array && key.ends_with("[]") {
                    is_array = true;
                    key.truncate(key.len() - 2);
                }
                if key.is_empty() {
                    return Err(Error::new(ErrorCode::Key, "empty key", sc.token_pos()));
                }
                key
            }
        };
        let key = if opts.ignore_case { key.to_lowercase() } else { key };

        sc.skip_space_and_comment()?;
        if sc.at_end() {
            return Ok(Some(Entry {
                key,
                value: opts.empty_value.clone(),
                is_array,
                is_string_key,
            }));
        }

        // Quoted value: only spaces or comments may follow on the line.
        let backup = sc.save_pos();
        let mut value = None;
        if let Some(v) = self.maybe_string(sc, StringContext::Value)? {
            sc.skip_space_and_comment()?;
            match sc.peek() {
                None | Some('\r') | Some('\n') => {
                    let v = if opts.ignore_case { v.to_lowercase() } else { v };
                    value = Some(Value::String(v));
                }
                Some(_) if opts.ignore_invalid_string_value => sc.restore_pos(backup),
                Some(_) => return Err(Error::expected("[EOF]", describe(sc), sc.token_pos())),
            }
        }
        let value = match value {
            Some(value) => value,
            None => self.raw_value(sc)?,
        };

        Ok(Some(Entry {
            key,
            value,
            is_array,
            is_string_key,
        }))
    }

    // Unquoted value up to the end of the line.
    fn raw_value(&self, sc: &mut Scanner<'_>) -> Result<Value> {
        let opts = &self.options;
        let input = sc.input();
        let start = sc.pos;
        let end = match sc.find(&self.comment_or_newline) {
            Some(m) => m.range(),
            None => input.len()..input.len(),
        };
        sc.restore_pos(end.start);
        let mut value = input[start..end.start].to_string();
        if self.is_block_comment(&input[end]) {
            let mut parts = Segments::new(input, value);
            while let Some(m) = sc.find(&self.comment_or_newline) {
                sc.restore_pos(m.start());
                parts.cut(sc.pos);
                if !sc.skip_comment()? {
                    break;
                }
                parts.open = Some(sc.pos);
            }
            parts.cut_at_line_end(sc);
            value = parts.join();
        }

        let value = value.trim_matches(is_space);
        let value = if opts.ignore_case { value.to_lowercase() } else { value.to_string() };
        if opts.native_type {
            if let Some(v) = coerce::native(&value) {
                return Ok(v);
            }
        }
        let s = Coercer::new(opts)
            .value(&value)
            .map_err(|e| e.update_pos(sc.token_pos()))?;
        Ok(Value::String(s))
    }

    // Unquoted key with block comments in it: keep scanning for the
    // assignment, skipping the comments.
    fn key_around_comments(&self, sc: &mut Scanner<'_>, head: String) -> Result<String> {
        let input = sc.input();
        let mut parts = Segments::new(input, head);
        let mut last_symbol = "[EOF]";
        while let Some(m) = sc.find(&self.assign_or_lf_or_comment) {
            let after = sc.pos;
            sc.restore_pos(m.start());
            last_symbol = m.as_str();
            parts.cut(sc.pos);
            if self.is_assign(m.as_str()) {
                sc.restore_pos(after);
                return Ok(parts.join());
            }
            if !sc.skip_comment()? {
                break;
            }
            parts.open = Some(sc.pos);
        }
        if !self.options.ignore_missing_assign {
            let found = match last_symbol {
                "\r" | "\n" => "newline",
                s => s,
            };
            return Err(Error::expected(self.expected_assign(), found, sc.token_pos()));
        }
        parts.cut_at_line_end(sc);
        Ok(parts.join())
    }
}

// Text pieces between embedded comments.
struct Segments<'a> {
    input: &'a str,
    parts: Vec<String>,
    // Start of the piece being collected, if any.
    open: Option<usize>,
}

impl<'a> Segments<'a> {
    fn new(input: &'a str, head: String) -> Segments<'a> {
        Segments {
            input,
            parts: vec![head],
            open: None,
        }
    }

    // End the open piece at `at`.
    fn cut(&mut self, at: usize) {
        if let Some(start) = self.open {
            if start != at {
                self.parts.push(self.input[start..at].to_string());
                self.open = Some(at);
            }
        }
    }

    // End the open piece at the end of the line and leave the cursor there.
    fn cut_at_line_end(&mut self, sc: &mut Scanner<'_>) {
        let end = match sc.rest().find(|c: char| c == '\r' || c == '\n') {
            Some(idx) => sc.pos + idx,
            None => self.input.len(),
        };
        sc.restore_pos(end);
        self.cut(end);
    }

    fn join(self) -> String {
        self.parts.concat()
    }
}

fn describe(sc: &Scanner<'_>) -> String {
    match sc.peek() {
        None => "[EOF]".to_string(),
        Some('\n') | Some('\r') => "newline".to_string(),
        Some(c) => format!("'{}'", c),
    }
}
