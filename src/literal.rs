//! Decoding of raw literal text into typed `DataLiteral` values.
//!
//! Numeral and identifier spellings are checked against regular
//! expressions first; conversion only runs on text that already has the
//! right shape, so every failure message names the offending spelling.

use crate::ast::{DataLiteral, Name, Reference};
use crate::scanner::Scanner;
use crate::token::PrimitiveType;
use regex::bytes::Regex;
use std::sync::LazyLock;

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());
static DECIMAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[+-]?[0-9][0-9_]*$").unwrap());
static HEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?0[xX][0-9A-Fa-f][0-9A-Fa-f_]*$").unwrap());
static OCTAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[+-]?0[oO][0-7][0-7_]*$").unwrap());
static BINARY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[+-]?0[bB][01][01_]*$").unwrap());
static FLOAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?([0-9][0-9_]*(\.[0-9_]*)?|\.[0-9][0-9_]*)([eE][+-]?[0-9][0-9_]*)?$").unwrap()
});

/// Is `text` a well-formed OpenDDL identifier?
pub fn is_identifier(text: &[u8]) -> bool {
    IDENTIFIER_RE.is_match(text)
}

fn lossy(text: &[u8]) -> String {
    String::from_utf8_lossy(text).into_owned()
}

/// Decode one data-list element of the declared type.
pub fn decode(ty: PrimitiveType, text: &[u8]) -> Result<DataLiteral, String> {
    match ty {
        PrimitiveType::Bool => decode_bool(text).map(DataLiteral::Bool),
        PrimitiveType::Int8 | PrimitiveType::Int16 | PrimitiveType::Int32 | PrimitiveType::Int64 => {
            decode_signed(ty, text).map(DataLiteral::Signed)
        }
        PrimitiveType::UnsignedInt8
        | PrimitiveType::UnsignedInt16
        | PrimitiveType::UnsignedInt32
        | PrimitiveType::UnsignedInt64 => decode_unsigned(ty, text).map(DataLiteral::Unsigned),
        PrimitiveType::Half | PrimitiveType::Float | PrimitiveType::Double => {
            decode_float(ty, text).map(DataLiteral::Float)
        }
        PrimitiveType::String => decode_string(text).map(DataLiteral::String),
        PrimitiveType::Ref => decode_reference(text).map(DataLiteral::Reference),
        PrimitiveType::Type => PrimitiveType::from_word(text)
            .map(DataLiteral::Type)
            .ok_or_else(|| format!("Invalid type literal '{}'", lossy(text))),
    }
}

/// Decode a property value, inferring its type from its spelling.
pub fn decode_property_value(text: &[u8]) -> Result<DataLiteral, String> {
    match text.first() {
        None => Err("Expected a property value".to_string()),
        Some(b'"') => decode_string(text).map(DataLiteral::String),
        Some(b'$' | b'%') => decode_reference(text).map(DataLiteral::Reference),
        Some(_) if text == b"null" => Ok(DataLiteral::Reference(Reference::null())),
        Some(_) if text == b"true" || text == b"false" => decode_bool(text).map(DataLiteral::Bool),
        Some(_) => {
            if let Some(ty) = PrimitiveType::from_word(text) {
                return Ok(DataLiteral::Type(ty));
            }
            let is_radix = HEX_RE.is_match(text) || OCTAL_RE.is_match(text) || BINARY_RE.is_match(text);
            if !is_radix && !DECIMAL_RE.is_match(text) && FLOAT_RE.is_match(text) {
                return decode_float(PrimitiveType::Double, text).map(DataLiteral::Float);
            }
            if text.first() == Some(&b'-') {
                decode_signed(PrimitiveType::Int64, text).map(DataLiteral::Signed)
            } else {
                decode_unsigned(PrimitiveType::UnsignedInt64, text).map(DataLiteral::Unsigned)
            }
        }
    }
}

fn decode_bool(text: &[u8]) -> Result<bool, String> {
    match text {
        b"true" => Ok(true),
        b"false" => Ok(false),
        _ => Err(format!("Invalid boolean literal '{}'", lossy(text))),
    }
}

// ── Integers ────────────────────────────────────────────────────────

/// Split a numeral into (negative, magnitude). Radix numerals also report
/// that they were written as a bit pattern.
fn decode_magnitude(text: &[u8]) -> Result<(bool, u64, bool), String> {
    if text.first() == Some(&b'\'') {
        return decode_char(text).map(|value| (false, value, false));
    }
    let (negative, body) = match text.first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let (radix, digits) = if HEX_RE.is_match(text) {
        (16, &body[2..])
    } else if OCTAL_RE.is_match(text) {
        (8, &body[2..])
    } else if BINARY_RE.is_match(text) {
        (2, &body[2..])
    } else if DECIMAL_RE.is_match(text) {
        (10, body)
    } else {
        return Err(format!("Invalid integer literal '{}'", lossy(text)));
    };
    let mut value: u64 = 0;
    for &b in digits.iter().filter(|&&b| b != b'_') {
        let digit = (b as char)
            .to_digit(radix)
            .ok_or_else(|| format!("Invalid integer literal '{}'", lossy(text)))?;
        value = value
            .checked_mul(radix as u64)
            .and_then(|v| v.checked_add(digit as u64))
            .ok_or_else(|| format!("Integer literal '{}' is out of range", lossy(text)))?;
    }
    Ok((negative, value, radix != 10))
}

fn decode_char(text: &[u8]) -> Result<u64, String> {
    let inner = text
        .strip_prefix(b"'")
        .and_then(|t| t.strip_suffix(b"'"))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| format!("Invalid character literal '{}'", lossy(text)))?;
    let bytes = unescape(inner)?;
    if bytes.len() > 8 {
        return Err(format!("Character literal '{}' is too long", lossy(text)));
    }
    Ok(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
}

fn decode_unsigned(ty: PrimitiveType, text: &[u8]) -> Result<u64, String> {
    let (negative, value, _) = decode_magnitude(text)?;
    if negative && value != 0 {
        return Err(format!("Negative value '{}' for {}", lossy(text), ty));
    }
    let bits = ty.bit_width().unwrap_or(64);
    if bits < 64 && value >> bits != 0 {
        return Err(format!("Value '{}' does not fit in {}", lossy(text), ty));
    }
    Ok(value)
}

fn decode_signed(ty: PrimitiveType, text: &[u8]) -> Result<i64, String> {
    let (negative, value, bit_pattern) = decode_magnitude(text)?;
    let bits = ty.bit_width().unwrap_or(64);
    let out_of_range = || format!("Value '{}' does not fit in {}", lossy(text), ty);
    if bit_pattern && !negative {
        if bits < 64 && value >> bits != 0 {
            return Err(out_of_range());
        }
        // Sign-extend the raw bit pattern.
        let shift = 64 - bits;
        return Ok(((value << shift) as i64) >> shift);
    }
    let limit = 1u64 << (bits - 1);
    if negative {
        if value > limit {
            return Err(out_of_range());
        }
        Ok((value as i64).wrapping_neg())
    } else {
        if value >= limit {
            return Err(out_of_range());
        }
        Ok(value as i64)
    }
}

// ── Floats ──────────────────────────────────────────────────────────

fn decode_float(ty: PrimitiveType, text: &[u8]) -> Result<f64, String> {
    let is_radix = HEX_RE.is_match(text) || OCTAL_RE.is_match(text) || BINARY_RE.is_match(text);
    if is_radix {
        let (negative, bits, _) = decode_magnitude(text)?;
        let value = match ty {
            PrimitiveType::Half => {
                let bits = u16::try_from(bits).map_err(|_| format!("'{}' is wider than half", lossy(text)))?;
                half_to_f32(bits) as f64
            }
            PrimitiveType::Float => {
                let bits = u32::try_from(bits).map_err(|_| format!("'{}' is wider than float", lossy(text)))?;
                f32::from_bits(bits) as f64
            }
            _ => f64::from_bits(bits),
        };
        return Ok(if negative { -value } else { value });
    }
    if !FLOAT_RE.is_match(text) {
        return Err(format!("Invalid floating-point literal '{}'", lossy(text)));
    }
    let cleaned: String = text.iter().filter(|&&b| b != b'_').map(|&b| b as char).collect();
    cleaned
        .parse::<f64>()
        .map_err(|_| format!("Invalid floating-point literal '{}'", lossy(text)))
}

/// IEEE 754 binary16 to binary32.
fn half_to_f32(bits: u16) -> f32 {
    let sign = ((bits >> 15) & 1) as u32;
    let exponent = ((bits >> 10) & 0x1f) as u32;
    let mantissa = (bits & 0x3ff) as u32;
    let magnitude = match (exponent, mantissa) {
        (0, 0) => 0.0,
        (0, m) => (m as f32) * 2f32.powi(-24),
        (0x1f, 0) => f32::INFINITY,
        (0x1f, _) => f32::NAN,
        (e, m) => f32::from_bits(((e + 112) << 23) | (m << 13)),
    };
    if sign == 1 {
        -magnitude
    } else {
        magnitude
    }
}

// ── Strings ─────────────────────────────────────────────────────────

/// Decode one or more adjacent quoted pieces, concatenated.
pub fn decode_string(text: &[u8]) -> Result<String, String> {
    let mut scanner = Scanner::new(text);
    let mut bytes = Vec::new();
    loop {
        scanner
            .skip_whitespace_and_comments()
            .map_err(|err| err.message)?;
        if scanner.at_end() {
            break;
        }
        if !scanner.eat(b'"') {
            return Err(format!("Invalid string literal {}", lossy(text)));
        }
        let start = scanner.offset();
        loop {
            match scanner.peek() {
                None => return Err("Unterminated string literal".to_string()),
                Some(b'\\') => scanner.advance(2),
                Some(b'"') => break,
                Some(_) => scanner.advance(1),
            }
        }
        let end = scanner.offset().min(text.len());
        bytes.extend(unescape(&text[start..end])?);
        scanner.advance(1);
    }
    if scanner.offset() == 0 {
        return Err("Expected a string literal".to_string());
    }
    String::from_utf8(bytes).map_err(|_| "String literal is not valid UTF-8".to_string())
}

fn unescape(raw: &[u8]) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let b = raw[i];
        if b != b'\\' {
            out.push(b);
            i += 1;
            continue;
        }
        let Some(&escape) = raw.get(i + 1) else {
            return Err("Dangling '\\' at end of literal".to_string());
        };
        i += 2;
        match escape {
            b'"' => out.push(b'"'),
            b'\'' => out.push(b'\''),
            b'?' => out.push(b'?'),
            b'\\' => out.push(b'\\'),
            b'a' => out.push(0x07),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'v' => out.push(0x0b),
            b'x' => {
                let code = hex_digits(raw, i, 2)?;
                out.push(code as u8);
                i += 2;
            }
            b'u' | b'U' => {
                let width = if escape == b'u' { 4 } else { 6 };
                let code = hex_digits(raw, i, width)?;
                let ch = char::from_u32(code)
                    .ok_or_else(|| format!("Invalid unicode escape U+{:X}", code))?;
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
                i += width;
            }
            other => return Err(format!("Unknown escape sequence '\\{}'", other as char)),
        }
    }
    Ok(out)
}

fn hex_digits(raw: &[u8], start: usize, count: usize) -> Result<u32, String> {
    let digits = raw
        .get(start..start + count)
        .ok_or_else(|| "Truncated escape sequence".to_string())?;
    digits.iter().try_fold(0u32, |acc, &b| {
        (b as char)
            .to_digit(16)
            .map(|d| acc * 16 + d)
            .ok_or_else(|| format!("Invalid hex digit '{}' in escape", b as char))
    })
}

// ── References ──────────────────────────────────────────────────────

/// `null`, or `$name` / `%name` followed by any number of `%name` parts.
pub fn decode_reference(text: &[u8]) -> Result<Reference, String> {
    if text == b"null" {
        return Ok(Reference::null());
    }
    let mut names = Vec::new();
    let mut rest = text;
    while let Some(&sigil) = rest.first() {
        let global = match sigil {
            b'$' if names.is_empty() => true,
            b'%' => false,
            _ => return Err(format!("Invalid reference '{}'", lossy(text))),
        };
        let len = rest[1..]
            .iter()
            .position(|&b| b == b'%')
            .unwrap_or(rest.len() - 1);
        let part = &rest[1..1 + len];
        if part.is_empty() {
            return Err(format!("Name expected after '{}' in '{}'", sigil as char, lossy(text)));
        }
        if !is_identifier(part) {
            return Err(format!("Invalid name '{}' in reference", lossy(part)));
        }
        names.push(Name {
            global,
            text: lossy(part),
        });
        rest = &rest[1 + len..];
    }
    if names.is_empty() {
        return Err("Expected a reference".to_string());
    }
    Ok(Reference { names })
}

/// Decode a `$name`/`%name` structure name.
pub fn decode_name(text: &[u8]) -> Result<Name, String> {
    let global = match text.first() {
        Some(b'$') => true,
        Some(b'%') => false,
        _ => return Err(format!("Invalid structure name '{}'", lossy(text))),
    };
    let part = &text[1..];
    if part.is_empty() {
        return Err(format!("Name expected after '{}'", text[0] as char));
    }
    if !is_identifier(part) {
        return Err(format!("Invalid structure name '{}'", lossy(text)));
    }
    Ok(Name {
        global,
        text: lossy(part),
    })
}
