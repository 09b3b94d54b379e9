//! JSON rendering of a parsed document, for diagnostics and the CLI.
//!
//! Identifier structures become
//! `{"identifier": "Node", "name": "$n", "properties": {...}, "children": [...]}`,
//! data structures become `{"type": "float", "arity": 3, "data": [[...]]}`.

use crate::ast::*;
use crate::error::DdlError;

/// JSON formatting style.
#[derive(Clone, Copy)]
pub enum JsonStyle {
    /// Compact: no whitespace between tokens.
    Compact,
    /// Pretty: 2-space indented, one entry per line.
    Pretty,
}

struct JsonWriter<'d> {
    buf: String,
    style: JsonStyle,
    depth: usize,
    document: &'d Document,
}

impl<'d> JsonWriter<'d> {
    fn new(style: JsonStyle, document: &'d Document) -> Self {
        JsonWriter {
            buf: String::new(),
            style,
            depth: 0,
            document,
        }
    }

    fn is_pretty(&self) -> bool {
        matches!(self.style, JsonStyle::Pretty)
    }

    fn newline(&mut self) {
        if self.is_pretty() {
            self.buf.push('\n');
            for _ in 0..self.depth {
                self.buf.push_str("  ");
            }
        }
    }

    fn space(&mut self) {
        if self.is_pretty() {
            self.buf.push(' ');
        }
    }

    fn write_structure_list(&mut self, ids: &[StructureId]) {
        self.buf.push('[');
        self.depth += 1;
        for (i, &id) in ids.iter().enumerate() {
            if i > 0 {
                self.buf.push(',');
            }
            self.newline();
            self.write_structure(id);
        }
        self.depth -= 1;
        if !ids.is_empty() {
            self.newline();
        }
        self.buf.push(']');
    }

    fn write_structure(&mut self, id: StructureId) {
        let document = self.document;
        let structure = document.get(id);
        self.buf.push('{');
        self.depth += 1;
        let mut first = true;

        match &structure.kind {
            StructureKind::Identifier {
                keyword,
                properties,
                children,
                ..
            } => {
                self.entry_sep(&mut first);
                self.write_key("identifier");
                self.write_string_value(keyword);
                self.write_name(structure, &mut first);

                if !properties.is_empty() {
                    self.entry_sep(&mut first);
                    self.write_key("properties");
                    self.write_properties(properties);
                }

                self.entry_sep(&mut first);
                self.write_key("children");
                self.write_structure_list(children);
            }
            StructureKind::Data { ty, arity, lists } => {
                self.entry_sep(&mut first);
                self.write_key("type");
                self.write_string_value(ty.as_str());
                self.write_name(structure, &mut first);

                if let Some(arity) = arity {
                    self.entry_sep(&mut first);
                    self.write_key("arity");
                    self.buf.push_str(&arity.to_string());
                }

                self.entry_sep(&mut first);
                self.write_key("data");
                self.write_lists(lists);
            }
        }

        self.depth -= 1;
        self.newline();
        self.buf.push('}');
    }

    fn write_name(&mut self, structure: &Structure, first: &mut bool) {
        if let Some(name) = &structure.name {
            self.entry_sep(first);
            self.write_key("name");
            self.write_string_value(&name.to_string());
        }
    }

    fn write_properties(&mut self, properties: &[Property]) {
        self.buf.push('{');
        self.depth += 1;
        let mut first = true;
        for property in properties {
            self.entry_sep(&mut first);
            self.write_key(&property.key);
            self.write_literal(&property.value);
        }
        self.depth -= 1;
        self.newline();
        self.buf.push('}');
    }

    fn write_lists(&mut self, lists: &[DataList]) {
        self.buf.push('[');
        for (i, list) in lists.iter().enumerate() {
            if i > 0 {
                self.buf.push(',');
                self.space();
            }
            self.buf.push('[');
            for (j, value) in list.iter().enumerate() {
                if j > 0 {
                    self.buf.push(',');
                    self.space();
                }
                self.write_literal(value);
            }
            self.buf.push(']');
        }
        self.buf.push(']');
    }

    fn write_literal(&mut self, value: &DataLiteral) {
        match value {
            DataLiteral::Unsigned(v) => self.buf.push_str(&v.to_string()),
            DataLiteral::Signed(v) => self.buf.push_str(&v.to_string()),
            DataLiteral::Bool(b) => self.buf.push_str(if *b { "true" } else { "false" }),
            DataLiteral::Float(n) => self.write_number(*n),
            DataLiteral::String(s) => self.write_string_value(s),
            DataLiteral::Reference(r) => self.write_string_value(&r.to_string()),
            DataLiteral::Type(ty) => self.write_string_value(ty.as_str()),
        }
    }

    fn write_number(&mut self, n: f64) {
        if !n.is_finite() {
            // JSON has no NaN/Infinity.
            self.buf.push_str("null");
        } else if n.fract() == 0.0 && n.abs() < (1u64 << 53) as f64 {
            self.buf.push_str(&(n as i64).to_string());
        } else {
            self.buf.push_str(&format!("{}", n));
        }
    }

    fn entry_sep(&mut self, first: &mut bool) {
        if *first {
            *first = false;
        } else {
            self.buf.push(',');
        }
        self.newline();
    }

    fn write_key(&mut self, key: &str) {
        self.write_string_value(key);
        self.buf.push(':');
        self.space();
    }

    fn write_string_value(&mut self, s: &str) {
        self.buf.push('"');
        for ch in s.chars() {
            match ch {
                '"' => self.buf.push_str("\\\""),
                '\\' => self.buf.push_str("\\\\"),
                '\n' => self.buf.push_str("\\n"),
                '\r' => self.buf.push_str("\\r"),
                '\t' => self.buf.push_str("\\t"),
                '\u{0008}' => self.buf.push_str("\\b"),
                '\u{000C}' => self.buf.push_str("\\f"),
                c if c < '\u{0020}' => {
                    self.buf.push_str(&format!("\\u{:04x}", c as u32));
                }
                c => self.buf.push(c),
            }
        }
        self.buf.push('"');
    }
}

/// Serialize a document's top-level structures to compact JSON.
pub fn to_json(document: &Document) -> String {
    let mut w = JsonWriter::new(JsonStyle::Compact, document);
    w.write_structure_list(document.roots());
    w.buf
}

/// Serialize a document's top-level structures to pretty JSON (2-space indent).
pub fn to_json_pretty(document: &Document) -> String {
    let mut w = JsonWriter::new(JsonStyle::Pretty, document);
    w.write_structure_list(document.roots());
    w.buf
}

/// Serialize a parse error as a JSON object with code, message and span.
pub fn error_to_json(error: &DdlError) -> String {
    let empty = Document::default();
    let mut w = JsonWriter::new(JsonStyle::Compact, &empty);
    w.buf.push('{');
    w.write_key("code");
    w.write_string_value(error.code);
    w.buf.push(',');
    w.write_key("message");
    w.write_string_value(&error.message);
    for (key, pos) in [("begin", &error.begin), ("end", &error.end)] {
        w.buf.push(',');
        w.write_key(key);
        w.buf.push_str(&format!(
            "{{\"line\":{},\"column\":{},\"offset\":{}}}",
            pos.line, pos.column, pos.offset
        ));
    }
    w.buf.push('}');
    w.buf
}
