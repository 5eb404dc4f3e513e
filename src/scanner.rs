use regex::{Captures, Match, Regex};

use crate::cfg::{CommentKind, Options};
use crate::error::{Error, Result, TokenPos};

/// Whitespace, including a byte order mark.
pub(crate) fn is_space(c: char) -> bool {
    c.is_whitespace() || c == '\u{FEFF}'
}

/// Cursor over one input text.
///
/// Created per parse call; the parser itself holds no scan state.
pub(crate) struct Scanner<'a> {
    input: &'a str,
    pub(crate) pos: usize,
    opts: &'a Options,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(input: &'a str, opts: &'a Options) -> Scanner<'a> {
        Scanner { input, pos: 0, opts }
    }

    pub(crate) fn input(&self) -> &'a str {
        self.input
    }

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    pub(crate) fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub(crate) fn token_pos(&self) -> TokenPos {
        TokenPos::locate(self.input, self.pos)
    }

    pub(crate) fn save_pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn restore_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Consume `symbol` if the input continues with it.
    pub(crate) fn maybe(&mut self, symbol: &str) -> bool {
        if self.rest().starts_with(symbol) {
            self.pos += symbol.len();
            true
        } else {
            false
        }
    }

    /// Move past the next occurrence of `symbol`, if any.
    pub(crate) fn maybe_past(&mut self, symbol: &str) -> bool {
        match self.rest().find(symbol) {
            Some(idx) => {
                self.pos += idx + symbol.len();
                true
            }
            None => false,
        }
    }

    /// Consume the next character if it matches `re` on its own.
    pub(crate) fn maybe_char(&mut self, re: &Regex) -> Option<char> {
        let c = self.peek()?;
        let mut buf = [0u8; 4];
        if re.is_match(c.encode_utf8(&mut buf)) {
            self.pos += c.len_utf8();
            Some(c)
        } else {
            None
        }
    }

    /// Find the next match of `re` and move past it.
    pub(crate) fn find(&mut self, re: &Regex) -> Option<Match<'a>> {
        let m = re.find_at(self.input, self.pos)?;
        self.pos = m.end();
        Some(m)
    }

    /// Like `find`, with capture groups.
    pub(crate) fn captures(&mut self, re: &Regex) -> Option<Captures<'a>> {
        let caps = re.captures_at(self.input, self.pos)?;
        if let Some(m) = caps.get(0) {
            self.pos = m.end();
        }
        Some(caps)
    }

    fn skip_while(&mut self, skip: impl Fn(char) -> bool) -> bool {
        let start = self.pos;
        self.pos = match self.rest().find(|c: char| !skip(c)) {
            Some(idx) => start + idx,
            None => self.input.len(),
        };
        self.pos != start
    }

    /// Skip whitespace, but not newlines.
    pub(crate) fn skip_space(&mut self) -> bool {
        self.skip_while(|c| is_space(c) && c != '\r' && c != '\n')
    }

    /// Skip whitespace including newlines.
    pub(crate) fn skip_all_space(&mut self) -> bool {
        self.skip_while(is_space)
    }

    /// Skip one block or line comment at the cursor.
    pub(crate) fn skip_comment(&mut self) -> Result<bool> {
        let opts = self.opts;
        for symbol in opts.block_comment.iter().flatten() {
            if self.maybe(symbol) {
                let start = self.pos;
                if !self.maybe_past(symbol) {
                    return Err(Error::expected(format!("'{}'", symbol), "[EOF]", self.token_pos()));
                }
                let text = &self.input[start..self.pos - symbol.len()];
                self.comment(text, CommentKind::Block);
                return Ok(true);
            }
        }
        for symbol in opts.line_comment.iter().flatten() {
            if self.maybe(symbol) {
                let start = self.pos;
                self.pos = match self.rest().find(|c: char| c == '\r' || c == '\n') {
                    Some(idx) => start + idx,
                    None => self.input.len(),
                };
                let text = &self.input[start..self.pos];
                self.comment(text, CommentKind::Line);
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn comment(&self, text: &str, kind: CommentKind) {
        trace!("{}: {:?}", kind.as_str(), text);
        if let Some(hook) = self.opts.on_comment.as_ref() {
            hook(text, kind);
        }
    }

    /// Skip spaces and comments up to the end of the line.
    pub(crate) fn skip_space_and_comment(&mut self) -> Result<()> {
        while self.skip_space() || self.skip_comment()? {}
        Ok(())
    }

    /// Skip spaces, newlines and comments.
    pub(crate) fn skip_all_space_and_comment(&mut self) -> Result<()> {
        while self.skip_all_space() || self.skip_comment()? {}
        Ok(())
    }
}
