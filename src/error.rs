use serde::de;
use std::fmt;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Kind of parse error.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorCode {
    /// Something else was expected at this position.
    Expected,
    /// Empty key, or empty component in a dotted key.
    Key,
    /// Empty section name.
    Section,
    /// Invalid `\u` escape sequence in a quoted string.
    Unicode,
    /// Quoted key not followed by an assignment.
    InvalidString,
    /// Error raised while deserializing into a user type.
    Custom,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match *self {
            ErrorCode::Expected => "EXPECTED",
            ErrorCode::Key => "KEY",
            ErrorCode::Section => "SECTION",
            ErrorCode::Unicode => "UNICODE",
            ErrorCode::InvalidString => "INVALID_STRING",
            ErrorCode::Custom => "CUSTOM",
        }
    }
}

/// Position in the input text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPos {
    pub line: u32,
    pub column: u32,
    pub offset: usize,
}

impl TokenPos {
    /// Line and column of byte `offset` in `input`.
    pub(crate) fn locate(input: &str, offset: usize) -> TokenPos {
        let mut pos = TokenPos {
            line: 1,
            column: 1,
            offset,
        };
        for c in input[..offset].chars() {
            if c == '\n' {
                pos.line += 1;
                pos.column = 1;
            } else {
                pos.column += 1;
            }
        }
        pos
    }

    pub(crate) fn none() -> TokenPos {
        TokenPos {
            line: 0,
            column: 0,
            offset: 0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Error {
    pub code: ErrorCode,
    pub pos: TokenPos,
    pub msg: String,
    pub file_name: String,
}

impl Error {
    pub fn new(code: ErrorCode, msg: impl Into<String>, pos: TokenPos) -> Error {
        Error {
            code,
            pos,
            msg: msg.into(),
            file_name: "config-text".to_string(),
        }
    }

    /// "expected X, found Y" error.
    pub(crate) fn expected(expected: impl fmt::Display, found: impl fmt::Display, pos: TokenPos) -> Error {
        Error::new(
            ErrorCode::Expected,
            format!("expected {}, found {}", expected, found),
            pos,
        )
    }

    // Errors raised away from the scanner carry no position yet.
    pub(crate) fn update_pos(mut self, pos: TokenPos) -> Error {
        if self.pos.line == 0 {
            self.pos = pos;
        }
        self
    }
}

impl de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::new(ErrorCode::Custom, msg.to_string(), TokenPos::none())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pos.line == 0 {
            write!(f, "{}: {}: {}", self.file_name, self.code.as_str(), self.msg)
        } else {
            write!(
                f,
                "{}:{}:{}: {}: {}",
                self.file_name,
                self.pos.line,
                self.pos.column,
                self.code.as_str(),
                self.msg
            )
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locate_counts_lines_and_columns() {
        let text = "a = 1\nbé = 2\n";
        let pos = TokenPos::locate(text, text.find('=').unwrap());
        assert_eq!((pos.line, pos.column), (1, 3));
        let pos = TokenPos::locate(text, text.rfind('=').unwrap());
        assert_eq!((pos.line, pos.column), (2, 4));
    }

    #[test]
    fn display_with_and_without_position() {
        let e = Error::new(ErrorCode::Key, "empty key", TokenPos::none());
        assert_eq!(e.to_string(), "config-text: KEY: empty key");
        let e = e.update_pos(TokenPos::locate("x\ny", 2));
        assert_eq!(e.to_string(), "config-text:2:1: KEY: empty key");
    }
}
