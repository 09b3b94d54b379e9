//! The OpenDDL document tree produced by the parser.
//!
//! Structures live in an arena owned by `Document` and are addressed by
//! `StructureId`. Parent links and name tables hold ids, never ownership.

use crate::identifier::Identifier;
use crate::token::PrimitiveType;
use std::collections::BTreeMap;
use std::fmt;

/// Index of a structure in its document's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StructureId(pub usize);

/// A structure name: `$text` (global) or `%text` (local).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name {
    pub global: bool,
    pub text: String,
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sigil = if self.global { '$' } else { '%' };
        write!(f, "{}{}", sigil, self.text)
    }
}

/// A `ref` literal: a name path such as `$a%b`, or `null` when empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub names: Vec<Name>,
}

impl Reference {
    pub fn null() -> Self {
        Reference { names: Vec::new() }
    }

    pub fn is_null(&self) -> bool {
        self.names.is_empty()
    }

    /// True when resolution starts from the document-global table.
    pub fn is_global(&self) -> bool {
        self.names.first().is_some_and(|name| name.global)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("null");
        }
        for name in &self.names {
            write!(f, "{}", name)?;
        }
        Ok(())
    }
}

/// A typed literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum DataLiteral {
    Unsigned(u64),
    Signed(i64),
    Bool(bool),
    Float(f64),
    String(String),
    Reference(Reference),
    Type(PrimitiveType),
}

impl DataLiteral {
    /// Short description of the literal's kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            DataLiteral::Unsigned(_) => "unsigned integer",
            DataLiteral::Signed(_) => "signed integer",
            DataLiteral::Bool(_) => "bool",
            DataLiteral::Float(_) => "float",
            DataLiteral::String(_) => "string",
            DataLiteral::Reference(_) => "ref",
            DataLiteral::Type(_) => "type",
        }
    }

    /// Numeric value of any integer or float literal.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DataLiteral::Unsigned(v) => Some(*v as f64),
            DataLiteral::Signed(v) => Some(*v as f64),
            DataLiteral::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Non-negative integer value of an integer literal.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            DataLiteral::Unsigned(v) => Some(*v),
            DataLiteral::Signed(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DataLiteral::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataLiteral::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            DataLiteral::Reference(r) => Some(r),
            _ => None,
        }
    }
}

/// One `{ ... }` run of literals sharing the structure's declared type.
pub type DataList = Vec<DataLiteral>;

/// `key = value` inside a structure's parentheses.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub key: String,
    pub value: DataLiteral,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StructureKind {
    Identifier {
        /// `None` when the keyword is not part of the OpenGEX vocabulary
        /// (generic parsing only).
        identifier: Option<Identifier>,
        keyword: String,
        properties: Vec<Property>,
        children: Vec<StructureId>,
    },
    Data {
        ty: PrimitiveType,
        /// Declared `[N]`; `None` for a flat list.
        arity: Option<usize>,
        lists: Vec<DataList>,
    },
}

/// A name table of one scope, in declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NameTable {
    order: Vec<StructureId>,
    by_name: BTreeMap<String, usize>,
}

impl NameTable {
    /// Register `name`; returns its index, or `None` if already taken.
    pub fn insert(&mut self, name: &str, id: StructureId) -> Option<usize> {
        if self.by_name.contains_key(name) {
            return None;
        }
        let index = self.order.len();
        self.order.push(id);
        self.by_name.insert(name.to_string(), index);
        Some(index)
    }

    pub fn get(&self, name: &str) -> Option<StructureId> {
        self.by_name.get(name).map(|&index| self.order[index])
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    pub kind: StructureKind,
    pub name: Option<Name>,
    /// Index of `name` in the table it was registered in.
    pub name_id: Option<usize>,
    /// Nearest enclosing identifier structure.
    pub father: Option<StructureId>,
    /// `%name` children declared directly inside this structure.
    pub local_names: NameTable,
}

impl Structure {
    pub fn identifier(&self) -> Option<Identifier> {
        match &self.kind {
            StructureKind::Identifier { identifier, .. } => *identifier,
            StructureKind::Data { .. } => None,
        }
    }

    /// The identifier keyword, or the data type's spelling.
    pub fn keyword(&self) -> &str {
        match &self.kind {
            StructureKind::Identifier { keyword, .. } => keyword,
            StructureKind::Data { ty, .. } => ty.as_str(),
        }
    }

    pub fn properties(&self) -> &[Property] {
        match &self.kind {
            StructureKind::Identifier { properties, .. } => properties,
            StructureKind::Data { .. } => &[],
        }
    }

    pub fn property(&self, key: &str) -> Option<&DataLiteral> {
        self.properties()
            .iter()
            .find(|p| p.key == key)
            .map(|p| &p.value)
    }

    pub fn children(&self) -> &[StructureId] {
        match &self.kind {
            StructureKind::Identifier { children, .. } => children,
            StructureKind::Data { .. } => &[],
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(self.kind, StructureKind::Data { .. })
    }

    pub fn data_type(&self) -> Option<PrimitiveType> {
        match &self.kind {
            StructureKind::Data { ty, .. } => Some(*ty),
            StructureKind::Identifier { .. } => None,
        }
    }

    pub fn arity(&self) -> Option<usize> {
        match &self.kind {
            StructureKind::Data { arity, .. } => *arity,
            StructureKind::Identifier { .. } => None,
        }
    }

    pub fn lists(&self) -> &[DataList] {
        match &self.kind {
            StructureKind::Data { lists, .. } => lists,
            StructureKind::Identifier { .. } => &[],
        }
    }

    /// Name text without its sigil.
    pub fn name_text(&self) -> Option<&str> {
        self.name.as_ref().map(|n| n.text.as_str())
    }
}

/// A parsed OpenDDL file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub(crate) structures: Vec<Structure>,
    pub(crate) roots: Vec<StructureId>,
    /// `%name` structures declared at top level.
    pub(crate) root_names: NameTable,
    /// All `$name` structures.
    pub(crate) global_names: NameTable,
}

impl Document {
    pub fn get(&self, id: StructureId) -> &Structure {
        &self.structures[id.0]
    }

    /// Top-level structures in file order.
    pub fn roots(&self) -> &[StructureId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.structures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.structures.is_empty()
    }

    pub fn global(&self, name: &str) -> Option<StructureId> {
        self.global_names.get(name)
    }

    /// Children of `id` that are identifier structures of kind `identifier`.
    pub fn children_of<'a>(
        &'a self,
        id: StructureId,
        identifier: Identifier,
    ) -> impl Iterator<Item = StructureId> + 'a {
        self.get(id)
            .children()
            .iter()
            .copied()
            .filter(move |&child| self.get(child).identifier() == Some(identifier))
    }

    fn scope_names(&self, scope: Option<StructureId>) -> &NameTable {
        match scope {
            Some(id) => &self.get(id).local_names,
            None => &self.root_names,
        }
    }

    /// Resolve a reference appearing inside structure `from`.
    ///
    /// A global first name is looked up in the document table. A local first
    /// name is looked up among the children of `from`, then in each ancestor
    /// scope up to the top level. Later names descend into local tables.
    pub fn resolve(&self, reference: &Reference, from: StructureId) -> Option<StructureId> {
        let (first, rest) = reference.names.split_first()?;
        let mut current = if first.global {
            self.global_names.get(&first.text)?
        } else {
            let mut scope = Some(from);
            loop {
                if let Some(found) = self.scope_names(scope).get(&first.text) {
                    break found;
                }
                scope = self.get(scope?).father;
            }
        };
        for name in rest {
            current = self.get(current).local_names.get(&name.text)?;
        }
        Some(current)
    }

    /// Every structure id, in creation (pre-)order.
    pub fn ids(&self) -> impl Iterator<Item = StructureId> {
        (0..self.structures.len()).map(StructureId)
    }

    pub fn to_json(&self) -> String {
        crate::json::to_json(self)
    }

    pub fn to_json_pretty(&self) -> String {
        crate::json::to_json_pretty(self)
    }
}
