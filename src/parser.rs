use crate::ast::*;
use crate::error::{DdlError, Position};
use crate::identifier::Identifier;
use crate::literal;
use crate::scanner::{ListEnd, Scanner};
use crate::token::{PrimitiveType, Symbol, Token, TokenKind};

/// Which identifier keywords the parser accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vocabulary {
    /// Only identifiers from the OpenGEX table.
    OpenGex,
    /// Any lexically valid identifier.
    Generic,
}

/// Parser state: the scanner plus the arena being filled.
struct Parser<'a> {
    scanner: Scanner<'a>,
    vocabulary: Vocabulary,
    document: Document,
}

/// Parse an OpenDDL buffer into a document tree.
pub fn parse(input: &[u8], vocabulary: Vocabulary) -> Result<Document, DdlError> {
    let mut parser = Parser {
        scanner: Scanner::new(input),
        vocabulary,
        document: Document::default(),
    };

    parser.skip()?;
    while !parser.scanner.at_end() {
        let id = parser.parse_structure(None)?;
        parser.document.roots.push(id);
        parser.skip()?;
    }

    Ok(parser.document)
}

impl<'a> Parser<'a> {
    // ── Helpers ──────────────────────────────────────────────────────

    fn skip(&mut self) -> Result<(), DdlError> {
        self.scanner.skip_whitespace_and_comments()
    }

    fn peek(&self) -> Option<u8> {
        self.scanner.peek()
    }

    fn position(&self) -> Position {
        self.scanner.position()
    }

    /// Create an error at a single point (current position).
    fn error_point(&self, message: String) -> DdlError {
        let pos = self.position();
        DdlError::syntax(message, pos, pos)
    }

    /// Create an error spanning from byte `begin` to the current position.
    fn error_span(&self, message: String, begin: usize) -> DdlError {
        DdlError::syntax(message, self.scanner.position_at(begin), self.position())
    }

    fn lexical_span(&self, message: String, begin: usize, end: usize) -> DdlError {
        DdlError::lexical(
            message,
            self.scanner.position_at(begin),
            self.scanner.position_at(end),
        )
    }

    fn expect_symbol(&mut self, symbol: Symbol) -> Result<(), DdlError> {
        self.skip()?;
        if self.scanner.eat(symbol.as_char() as u8) {
            Ok(())
        } else {
            Err(self.error_point(format!(
                "Expected '{}', found {}",
                symbol.as_char(),
                self.describe_next()
            )))
        }
    }

    fn describe_next(&self) -> String {
        match self.peek() {
            None => "end of input".to_string(),
            Some(b) => format!("'{}'", b as char),
        }
    }

    fn alloc(&mut self, kind: StructureKind, father: Option<StructureId>) -> StructureId {
        let id = StructureId(self.document.structures.len());
        self.document.structures.push(Structure {
            kind,
            name: None,
            name_id: None,
            father,
            local_names: NameTable::default(),
        });
        id
    }

    // ── Structures ───────────────────────────────────────────────────

    fn parse_structure(&mut self, father: Option<StructureId>) -> Result<StructureId, DdlError> {
        self.skip()?;
        let (text, offset) = self.scanner.read_word()?;
        let token = Token::classify(text, offset);
        match token.kind {
            TokenKind::Primitive(ty) => self.parse_data_structure(ty, father),
            TokenKind::Identifier => {
                let identifier = Identifier::from_word(text);
                if identifier.is_none() && self.vocabulary == Vocabulary::OpenGex {
                    return Err(self.error_span(
                        format!("Unknown structure identifier '{}'", token.display()),
                        offset,
                    ));
                }
                self.parse_identifier_structure(identifier, token.display(), father)
            }
            _ => Err(self.error_span(
                format!(
                    "Expected a structure identifier or data type, found '{}'",
                    token.display()
                ),
                offset,
            )),
        }
    }

    /// `identifier [name] [(properties)] { substructures }`
    fn parse_identifier_structure(
        &mut self,
        identifier: Option<Identifier>,
        keyword: String,
        father: Option<StructureId>,
    ) -> Result<StructureId, DdlError> {
        let id = self.alloc(
            StructureKind::Identifier {
                identifier,
                keyword,
                properties: Vec::new(),
                children: Vec::new(),
            },
            father,
        );
        self.parse_optional_name(id, father)?;

        self.skip()?;
        let properties = if self.peek() == Some(b'(') {
            self.parse_properties()?
        } else {
            Vec::new()
        };

        self.expect_symbol(Symbol::OpenBrace)?;
        let begin = self.scanner.offset() - 1;
        let mut children = Vec::new();
        loop {
            self.skip()?;
            if self.scanner.eat(b'}') {
                break;
            }
            if self.scanner.at_end() {
                return Err(self.error_span("Unclosed '{'".to_string(), begin));
            }
            children.push(self.parse_structure(Some(id))?);
        }

        if let StructureKind::Identifier {
            properties: props,
            children: kids,
            ..
        } = &mut self.document.structures[id.0].kind
        {
            *props = properties;
            *kids = children;
        }
        Ok(id)
    }

    /// `type [ '[' arity ']' ] [name] { literals }` or `{ {row}, {row} }`.
    fn parse_data_structure(
        &mut self,
        ty: PrimitiveType,
        father: Option<StructureId>,
    ) -> Result<StructureId, DdlError> {
        self.skip()?;
        let arity = if self.peek() == Some(b'[') {
            let begin = self.scanner.offset();
            let arity = self.scanner.read_bracketed_integer()?;
            if arity == 0 {
                return Err(self.error_span("Array size must be at least 1".to_string(), begin));
            }
            Some(arity)
        } else {
            None
        };

        let id = self.alloc(
            StructureKind::Data {
                ty,
                arity,
                lists: Vec::new(),
            },
            father,
        );
        self.parse_optional_name(id, father)?;

        self.expect_symbol(Symbol::OpenBrace)?;
        let lists = match arity {
            None => vec![self.parse_data_list(ty)?],
            Some(n) => self.parse_data_rows(ty, n)?,
        };

        if let StructureKind::Data { lists: slot, .. } = &mut self.document.structures[id.0].kind {
            *slot = lists;
        }
        Ok(id)
    }

    /// Rows of exactly `arity` literals. Arity 1 also accepts a flat list.
    fn parse_data_rows(&mut self, ty: PrimitiveType, arity: usize) -> Result<Vec<DataList>, DdlError> {
        let begin = self.scanner.offset() - 1;
        self.skip()?;
        if self.scanner.eat(b'}') {
            return Ok(Vec::new());
        }
        if self.peek() != Some(b'{') {
            if arity == 1 {
                return Ok(vec![self.parse_data_list(ty)?]);
            }
            return Err(self.error_point(format!(
                "Expected '{{' to start a row of {} elements, found {}",
                arity,
                self.describe_next()
            )));
        }

        let mut rows = Vec::new();
        loop {
            self.expect_symbol(Symbol::OpenBrace)?;
            let row_begin = self.scanner.offset() - 1;
            let row = self.parse_data_list(ty)?;
            if row.len() != arity {
                return Err(self.error_span(
                    format!("Expected {} elements in row, found {}", arity, row.len()),
                    row_begin,
                ));
            }
            rows.push(row);

            self.skip()?;
            if self.scanner.eat(b',') {
                continue;
            }
            if self.scanner.eat(b'}') {
                return Ok(rows);
            }
            if self.scanner.at_end() {
                return Err(self.error_span("Unclosed '{'".to_string(), begin));
            }
            return Err(self.error_point(format!(
                "Expected ',' or '}}' after row, found {}",
                self.describe_next()
            )));
        }
    }

    /// Comma-separated literals up to and including the closing `}`.
    fn parse_data_list(&mut self, ty: PrimitiveType) -> Result<DataList, DdlError> {
        let mut list = DataList::new();
        self.skip()?;
        if self.scanner.eat(b'}') {
            return Ok(list);
        }
        loop {
            let element = self.scanner.read_data_list_element()?;
            let value = literal::decode(ty, element.text).map_err(|message| {
                self.lexical_span(message, element.offset, element.offset + element.text.len())
            })?;
            list.push(value);
            if element.end == ListEnd::Last {
                return Ok(list);
            }
        }
    }

    // ── Names ────────────────────────────────────────────────────────

    /// Read `$name` / `%name` if present and register it in its scope.
    fn parse_optional_name(
        &mut self,
        id: StructureId,
        father: Option<StructureId>,
    ) -> Result<(), DdlError> {
        self.skip()?;
        if !matches!(self.peek(), Some(b'$' | b'%')) {
            return Ok(());
        }
        let (text, offset) = self.scanner.read_word()?;
        let end = offset + text.len();
        let name = literal::decode_name(text).map_err(|message| self.lexical_span(message, offset, end))?;

        let table = if name.global {
            &mut self.document.global_names
        } else {
            match father {
                Some(father) => &mut self.document.structures[father.0].local_names,
                None => &mut self.document.root_names,
            }
        };
        let name_id = table.insert(&name.text, id).ok_or_else(|| {
            DdlError::syntax(
                format!("Duplicate structure name '{}'", name),
                self.scanner.position_at(offset),
                self.scanner.position_at(end),
            )
        })?;

        let structure = &mut self.document.structures[id.0];
        structure.name = Some(name);
        structure.name_id = Some(name_id);
        Ok(())
    }

    // ── Properties ───────────────────────────────────────────────────

    /// `( key = value key = value ... )`; commas between properties are optional.
    fn parse_properties(&mut self) -> Result<Vec<Property>, DdlError> {
        let begin = self.scanner.offset();
        self.expect_symbol(Symbol::OpenParen)?;
        let mut properties: Vec<Property> = Vec::new();
        loop {
            self.skip()?;
            while self.scanner.eat(b',') {
                self.skip()?;
            }
            if self.scanner.eat(b')') {
                return Ok(properties);
            }
            if self.scanner.at_end() {
                return Err(self.error_span("Unclosed '('".to_string(), begin));
            }

            let (text, offset) = self.scanner.read_word()?;
            if !literal::is_identifier(text) {
                return Err(self.error_span(
                    format!(
                        "Expected a property name, found '{}'",
                        String::from_utf8_lossy(text)
                    ),
                    offset,
                ));
            }
            let key = String::from_utf8_lossy(text).into_owned();
            if properties.iter().any(|p| p.key == key) {
                return Err(self.error_span(format!("Duplicate property '{}'", key), offset));
            }

            self.skip()?;
            let value = if self.scanner.eat(b'=') {
                self.skip()?;
                self.parse_property_value()?
            } else {
                // A bare key is shorthand for `key = true`.
                DataLiteral::Bool(true)
            };
            properties.push(Property { key, value });
        }
    }

    fn parse_property_value(&mut self) -> Result<DataLiteral, DdlError> {
        let (text, offset) = self.scanner.read_word()?;
        let mut end = offset + text.len();
        if text.len() == 1 && crate::token::is_symbol_byte(text[0]) {
            self.scanner.retreat(1);
            return Err(self.error_point(format!(
                "Expected a property value, found '{}'",
                text[0] as char
            )));
        }
        // Adjacent string literals concatenate.
        if text.first() == Some(&b'"') {
            loop {
                self.skip()?;
                if self.peek() != Some(b'"') {
                    break;
                }
                let (next, next_offset) = self.scanner.read_word()?;
                end = next_offset + next.len();
            }
        }
        let raw = &self.scanner.input()[offset..end];
        literal::decode_property_value(raw).map_err(|message| self.lexical_span(message, offset, end))
    }
}
