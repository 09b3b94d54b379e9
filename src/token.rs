//! Lexical token kinds of OpenDDL and their canonical spellings.
//!
//! This table is read-only; every parse shares it.

use std::fmt;

/// A primitive data type usable as a data-type structure keyword or as a
/// `type` literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UnsignedInt8,
    UnsignedInt16,
    UnsignedInt32,
    UnsignedInt64,
    Half,
    Float,
    Double,
    String,
    Ref,
    Type,
}

/// Long and short spellings, in the order they are tried.
const PRIMITIVE_SPELLINGS: &[(&str, PrimitiveType)] = &[
    ("bool", PrimitiveType::Bool),
    ("b", PrimitiveType::Bool),
    ("int8", PrimitiveType::Int8),
    ("i8", PrimitiveType::Int8),
    ("int16", PrimitiveType::Int16),
    ("i16", PrimitiveType::Int16),
    ("int32", PrimitiveType::Int32),
    ("i32", PrimitiveType::Int32),
    ("int64", PrimitiveType::Int64),
    ("i64", PrimitiveType::Int64),
    ("unsigned_int8", PrimitiveType::UnsignedInt8),
    ("u8", PrimitiveType::UnsignedInt8),
    ("unsigned_int16", PrimitiveType::UnsignedInt16),
    ("u16", PrimitiveType::UnsignedInt16),
    ("unsigned_int32", PrimitiveType::UnsignedInt32),
    ("u32", PrimitiveType::UnsignedInt32),
    ("unsigned_int64", PrimitiveType::UnsignedInt64),
    ("u64", PrimitiveType::UnsignedInt64),
    ("half", PrimitiveType::Half),
    ("float16", PrimitiveType::Half),
    ("h", PrimitiveType::Half),
    ("f16", PrimitiveType::Half),
    ("float", PrimitiveType::Float),
    ("float32", PrimitiveType::Float),
    ("f", PrimitiveType::Float),
    ("f32", PrimitiveType::Float),
    ("double", PrimitiveType::Double),
    ("float64", PrimitiveType::Double),
    ("d", PrimitiveType::Double),
    ("f64", PrimitiveType::Double),
    ("string", PrimitiveType::String),
    ("s", PrimitiveType::String),
    ("ref", PrimitiveType::Ref),
    ("r", PrimitiveType::Ref),
    ("type", PrimitiveType::Type),
    ("t", PrimitiveType::Type),
];

impl PrimitiveType {
    /// Look up a primitive type by any of its spellings.
    pub fn from_word(word: &[u8]) -> Option<PrimitiveType> {
        PRIMITIVE_SPELLINGS
            .iter()
            .find(|(spelling, _)| spelling.as_bytes() == word)
            .map(|(_, ty)| *ty)
    }

    /// The canonical (long) spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            PrimitiveType::Bool => "bool",
            PrimitiveType::Int8 => "int8",
            PrimitiveType::Int16 => "int16",
            PrimitiveType::Int32 => "int32",
            PrimitiveType::Int64 => "int64",
            PrimitiveType::UnsignedInt8 => "unsigned_int8",
            PrimitiveType::UnsignedInt16 => "unsigned_int16",
            PrimitiveType::UnsignedInt32 => "unsigned_int32",
            PrimitiveType::UnsignedInt64 => "unsigned_int64",
            PrimitiveType::Half => "half",
            PrimitiveType::Float => "float",
            PrimitiveType::Double => "double",
            PrimitiveType::String => "string",
            PrimitiveType::Ref => "ref",
            PrimitiveType::Type => "type",
        }
    }

    pub fn is_signed_integer(self) -> bool {
        matches!(
            self,
            PrimitiveType::Int8 | PrimitiveType::Int16 | PrimitiveType::Int32 | PrimitiveType::Int64
        )
    }

    pub fn is_unsigned_integer(self) -> bool {
        matches!(
            self,
            PrimitiveType::UnsignedInt8
                | PrimitiveType::UnsignedInt16
                | PrimitiveType::UnsignedInt32
                | PrimitiveType::UnsignedInt64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(
            self,
            PrimitiveType::Half | PrimitiveType::Float | PrimitiveType::Double
        )
    }

    /// Bit width of numeric types, `None` for the others.
    pub fn bit_width(self) -> Option<u32> {
        match self {
            PrimitiveType::Int8 | PrimitiveType::UnsignedInt8 => Some(8),
            PrimitiveType::Int16 | PrimitiveType::UnsignedInt16 | PrimitiveType::Half => Some(16),
            PrimitiveType::Int32 | PrimitiveType::UnsignedInt32 | PrimitiveType::Float => Some(32),
            PrimitiveType::Int64 | PrimitiveType::UnsignedInt64 | PrimitiveType::Double => Some(64),
            _ => None,
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The structural symbol characters `{ } [ ] ( ) , =`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    OpenBrace,
    CloseBrace,
    OpenBracket,
    CloseBracket,
    OpenParen,
    CloseParen,
    Comma,
    Equals,
}

impl Symbol {
    pub fn from_byte(byte: u8) -> Option<Symbol> {
        match byte {
            b'{' => Some(Symbol::OpenBrace),
            b'}' => Some(Symbol::CloseBrace),
            b'[' => Some(Symbol::OpenBracket),
            b']' => Some(Symbol::CloseBracket),
            b'(' => Some(Symbol::OpenParen),
            b')' => Some(Symbol::CloseParen),
            b',' => Some(Symbol::Comma),
            b'=' => Some(Symbol::Equals),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Symbol::OpenBrace => '{',
            Symbol::CloseBrace => '}',
            Symbol::OpenBracket => '[',
            Symbol::CloseBracket => ']',
            Symbol::OpenParen => '(',
            Symbol::CloseParen => ')',
            Symbol::Comma => ',',
            Symbol::Equals => '=',
        }
    }
}

/// Is `byte` one of the structural symbol characters?
pub fn is_symbol_byte(byte: u8) -> bool {
    Symbol::from_byte(byte).is_some()
}

/// Classification of one scanned word.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind {
    Primitive(PrimitiveType),
    Boolean(bool),
    Symbol(Symbol),
    /// A bare word that is not a keyword (structure identifier or property key).
    Identifier,
    /// `%name` or `$name`.
    Name { global: bool },
    StringLiteral,
    NumberLiteral,
    /// A word that fits none of the above.
    Unknown,
}

/// A classified word borrowed from the input buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a [u8],
    /// Byte offset of `text` in the input.
    pub offset: usize,
}

impl<'a> Token<'a> {
    pub fn classify(text: &'a [u8], offset: usize) -> Token<'a> {
        Token {
            kind: classify_word(text),
            text,
            offset,
        }
    }

    /// Lossy text for diagnostics.
    pub fn display(&self) -> String {
        String::from_utf8_lossy(self.text).into_owned()
    }
}

fn classify_word(text: &[u8]) -> TokenKind {
    let Some(&first) = text.first() else {
        return TokenKind::Unknown;
    };
    if text.len() == 1 {
        if let Some(symbol) = Symbol::from_byte(first) {
            return TokenKind::Symbol(symbol);
        }
    }
    if let Some(ty) = PrimitiveType::from_word(text) {
        return TokenKind::Primitive(ty);
    }
    match text {
        b"true" => return TokenKind::Boolean(true),
        b"false" => return TokenKind::Boolean(false),
        _ => {}
    }
    match first {
        b'$' | b'%' if text.len() > 1 => TokenKind::Name {
            global: first == b'$',
        },
        b'"' => TokenKind::StringLiteral,
        b'0'..=b'9' | b'+' | b'-' | b'.' | b'\'' => TokenKind::NumberLiteral,
        _ if crate::literal::is_identifier(text) => TokenKind::Identifier,
        _ => TokenKind::Unknown,
    }
}
