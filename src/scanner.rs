//! Byte cursor over an OpenDDL source buffer.
//!
//! The scanner never copies: every word it returns is a slice of the input.
//! It never resynchronizes after a malformed token either; the first
//! lexical problem is returned as a `DdlError`.

use crate::error::{DdlError, Position};
use crate::token::is_symbol_byte;

/// How a data-list element was terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListEnd {
    /// Followed by `,`: more elements follow.
    More,
    /// Followed by `}`: this was the last element.
    Last,
}

/// One raw element of a `{ }` data list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element<'a> {
    pub text: &'a [u8],
    pub offset: usize,
    pub end: ListEnd,
}

pub struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a [u8]) -> Self {
        Scanner { input, pos: 0 }
    }

    // ── Cursor ───────────────────────────────────────────────────────

    pub fn input(&self) -> &'a [u8] {
        self.input
    }

    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// Move forward, stopping at the end of input.
    pub fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    /// Move back, stopping at the start of input.
    pub fn retreat(&mut self, n: usize) {
        self.pos = self.pos.saturating_sub(n);
    }

    /// Do the bytes at the cursor spell `word`? Does not consume.
    pub fn matches_literal(&self, word: &[u8]) -> bool {
        self.input[self.pos..].starts_with(word)
    }

    pub fn position(&self) -> Position {
        Position::locate(self.input, self.pos)
    }

    pub fn position_at(&self, offset: usize) -> Position {
        Position::locate(self.input, offset)
    }

    fn lexical_error(&self, message: String, begin: usize) -> DdlError {
        DdlError::lexical(message, self.position_at(begin), self.position())
    }

    // ── Whitespace & Comments ────────────────────────────────────────

    /// Any byte at or below 0x20 is whitespace.
    pub fn is_whitespace(&self) -> bool {
        matches!(self.peek(), Some(b) if b <= 0x20)
    }

    pub fn is_comment_start(&self) -> bool {
        self.matches_literal(b"//") || self.matches_literal(b"/*")
    }

    pub fn skip_whitespace_and_comments(&mut self) -> Result<(), DdlError> {
        loop {
            while self.is_whitespace() {
                self.advance(1);
            }
            if !self.is_comment_start() {
                return Ok(());
            }
            let begin = self.pos;
            if self.matches_literal(b"//") {
                while let Some(b) = self.peek() {
                    if b == b'\n' {
                        break;
                    }
                    self.advance(1);
                }
            } else {
                self.advance(2);
                loop {
                    match self.peek() {
                        None => {
                            return Err(self.lexical_error(
                                "Unterminated block comment".to_string(),
                                begin,
                            ))
                        }
                        Some(_) if self.matches_literal(b"*/") => {
                            self.advance(2);
                            break;
                        }
                        Some(_) => self.advance(1),
                    }
                }
            }
        }
    }

    // ── Words ────────────────────────────────────────────────────────

    /// Consume `byte` if it is next.
    pub fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.advance(1);
            true
        } else {
            false
        }
    }

    /// Consume a maximal run of word bytes, a quoted string, or a single
    /// symbol character. Returns the raw span and its offset.
    pub fn read_word(&mut self) -> Result<(&'a [u8], usize), DdlError> {
        let start = self.pos;
        match self.peek() {
            None => Err(DdlError::syntax(
                "Unexpected end of input".to_string(),
                self.position(),
                self.position(),
            )),
            Some(b) if is_symbol_byte(b) => {
                self.advance(1);
                Ok((&self.input[start..self.pos], start))
            }
            Some(b'"') => {
                self.skip_quoted(b'"')?;
                Ok((&self.input[start..self.pos], start))
            }
            Some(_) => {
                while let Some(b) = self.peek() {
                    if is_symbol_byte(b) || b <= 0x20 || self.is_comment_start() || b == b'"' {
                        break;
                    }
                    self.advance(1);
                }
                Ok((&self.input[start..self.pos], start))
            }
        }
    }

    /// Skip over a quoted literal starting at the cursor, honoring `\`
    /// escapes. The cursor ends just past the closing quote.
    fn skip_quoted(&mut self, quote: u8) -> Result<(), DdlError> {
        let begin = self.pos;
        self.advance(1);
        loop {
            match self.peek() {
                None => {
                    let what = if quote == b'"' { "string" } else { "character" };
                    return Err(self.lexical_error(format!("Unterminated {} literal", what), begin));
                }
                Some(b'\\') => self.advance(2),
                Some(b) if b == quote => {
                    self.advance(1);
                    return Ok(());
                }
                Some(_) => self.advance(1),
            }
        }
    }

    /// Parse `[ digits ]` at the cursor.
    pub fn read_bracketed_integer(&mut self) -> Result<usize, DdlError> {
        let begin = self.pos;
        if !self.eat(b'[') {
            return Err(DdlError::syntax(
                "Expected '['".to_string(),
                self.position(),
                self.position(),
            ));
        }
        self.skip_whitespace_and_comments()?;
        let digits_start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_digit() {
                self.advance(1);
            } else {
                break;
            }
        }
        let digits = &self.input[digits_start..self.pos];
        self.skip_whitespace_and_comments()?;
        if digits.is_empty() || self.peek() != Some(b']') {
            if !self.at_end() {
                self.advance(1);
            }
            return Err(self.lexical_error(
                "Array size must be a decimal integer followed by ']'".to_string(),
                begin,
            ));
        }
        self.advance(1);
        std::str::from_utf8(digits)
            .ok()
            .and_then(|text| text.parse::<usize>().ok())
            .ok_or_else(|| self.lexical_error("Array size out of range".to_string(), begin))
    }

    /// Read one element of a data list. The element ends at a `,` or `}`
    /// outside quotes and comments; that delimiter is consumed.
    pub fn read_data_list_element(&mut self) -> Result<Element<'a>, DdlError> {
        self.skip_whitespace_and_comments()?;
        let start = self.pos;
        let mut end = self.pos;
        loop {
            match self.peek() {
                None => {
                    return Err(self.lexical_error(
                        "Unterminated data list: expected ',' or '}'".to_string(),
                        start,
                    ))
                }
                Some(b',') | Some(b'}') => {
                    let terminator = if self.peek() == Some(b',') {
                        ListEnd::More
                    } else {
                        ListEnd::Last
                    };
                    if end == start {
                        return Err(DdlError::syntax(
                            "Expected a literal".to_string(),
                            self.position(),
                            self.position(),
                        ));
                    }
                    self.advance(1);
                    return Ok(Element {
                        text: &self.input[start..end],
                        offset: start,
                        end: terminator,
                    });
                }
                Some(b) if is_symbol_byte(b) => {
                    let at = self.pos;
                    self.advance(1);
                    return Err(DdlError::syntax(
                        format!("Unexpected '{}' in data list", b as char),
                        self.position_at(at),
                        self.position(),
                    ));
                }
                Some(b'"') => {
                    self.skip_quoted(b'"')?;
                    end = self.pos;
                }
                Some(b'\'') => {
                    self.skip_quoted(b'\'')?;
                    end = self.pos;
                }
                Some(_) if self.is_whitespace() || self.is_comment_start() => {
                    self.skip_whitespace_and_comments()?;
                }
                Some(_) => {
                    self.advance(1);
                    end = self.pos;
                }
            }
        }
    }
}
