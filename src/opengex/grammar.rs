//! Per-structure grammar checks and typed data extraction.

use crate::ast::{DataLiteral, Document, Reference, StructureId};
use crate::error::ImportError;
use crate::identifier::Identifier;
use crate::token::PrimitiveType;

/// Literal kind a property accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyType {
    Bool,
    Unsigned,
    /// Any numeric literal.
    Float,
    String,
    Reference,
}

impl PropertyType {
    fn accepts(self, value: &DataLiteral) -> bool {
        match self {
            PropertyType::Bool => matches!(value, DataLiteral::Bool(_)),
            PropertyType::Unsigned => value.as_u64().is_some(),
            PropertyType::Float => value.as_f64().is_some(),
            PropertyType::String => matches!(value, DataLiteral::String(_)),
            PropertyType::Reference => matches!(value, DataLiteral::Reference(_)),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            PropertyType::Bool => "bool",
            PropertyType::Unsigned => "unsigned integer",
            PropertyType::Float => "number",
            PropertyType::String => "string",
            PropertyType::Reference => "ref",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PropertySpec {
    pub key: &'static str,
    pub ty: PropertyType,
}

pub const fn prop(key: &'static str, ty: PropertyType) -> PropertySpec {
    PropertySpec { key, ty }
}

/// What a child rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    Structure(Identifier),
    /// Any data-type structure.
    Data,
    /// Any node-like structure (`Node`, `BoneNode`, ...).
    AnyNode,
    /// Any of `Transform`, `Translation`, `Rotation`, `Scale`.
    AnyTransform,
}

/// How many children of one kind a structure may have.
#[derive(Debug, Clone, Copy)]
pub struct ChildRule {
    pub kind: ChildKind,
    pub min: usize,
    pub max: usize,
}

impl ChildRule {
    pub const fn any(identifier: Identifier) -> Self {
        ChildRule {
            kind: ChildKind::Structure(identifier),
            min: 0,
            max: usize::MAX,
        }
    }

    pub const fn one(identifier: Identifier) -> Self {
        ChildRule {
            kind: ChildKind::Structure(identifier),
            min: 1,
            max: 1,
        }
    }

    pub const fn at_most_one(identifier: Identifier) -> Self {
        ChildRule {
            kind: ChildKind::Structure(identifier),
            min: 0,
            max: 1,
        }
    }

    pub const fn at_least_one(identifier: Identifier) -> Self {
        ChildRule {
            kind: ChildKind::Structure(identifier),
            min: 1,
            max: usize::MAX,
        }
    }

    pub const fn one_data() -> Self {
        ChildRule {
            kind: ChildKind::Data,
            min: 1,
            max: 1,
        }
    }

    pub const fn kind(kind: ChildKind) -> Self {
        ChildRule {
            kind,
            min: 0,
            max: usize::MAX,
        }
    }

    fn matches(&self, document: &Document, child: StructureId) -> bool {
        let structure = document.get(child);
        match self.kind {
            ChildKind::Data => structure.is_data(),
            ChildKind::Structure(identifier) => structure.identifier() == Some(identifier),
            ChildKind::AnyNode => structure.identifier().is_some_and(Identifier::is_node),
            ChildKind::AnyTransform => structure.identifier().is_some_and(Identifier::is_transform),
        }
    }

    fn describe(&self) -> String {
        match self.kind {
            ChildKind::Structure(identifier) => identifier.to_string(),
            ChildKind::Data => "data".to_string(),
            ChildKind::AnyNode => "node".to_string(),
            ChildKind::AnyTransform => "transform".to_string(),
        }
    }
}

/// Build a structure error that names `id`.
pub fn error(document: &Document, id: StructureId, message: String) -> ImportError {
    let structure = document.get(id);
    ImportError::structure(
        structure.keyword(),
        structure.name.as_ref().map(|n| n.to_string()).as_deref(),
        message,
    )
}

/// Every property must be listed in `allowed` with a matching literal kind.
pub fn check_properties(
    document: &Document,
    id: StructureId,
    allowed: &[PropertySpec],
) -> Result<(), ImportError> {
    for property in document.get(id).properties() {
        let Some(spec) = allowed.iter().find(|spec| spec.key == property.key) else {
            return Err(error(
                document,
                id,
                format!("unexpected property '{}'", property.key),
            ));
        };
        if !spec.ty.accepts(&property.value) {
            return Err(error(
                document,
                id,
                format!(
                    "property '{}' must be a {}, found {}",
                    property.key,
                    spec.ty.describe(),
                    property.value.kind_name()
                ),
            ));
        }
    }
    Ok(())
}

/// Every child must match some rule, and each rule's count must be in range.
pub fn check_substructures(
    document: &Document,
    id: StructureId,
    rules: &[ChildRule],
) -> Result<(), ImportError> {
    let mut counts = vec![0usize; rules.len()];
    for &child in document.get(id).children() {
        match rules.iter().position(|rule| rule.matches(document, child)) {
            Some(index) => counts[index] += 1,
            None => {
                return Err(error(
                    document,
                    id,
                    format!(
                        "unexpected substructure '{}'",
                        document.get(child).keyword()
                    ),
                ))
            }
        }
    }
    for (rule, &count) in rules.iter().zip(&counts) {
        if count < rule.min {
            let message = if rule.min == 1 {
                format!("missing required substructure '{}'", rule.describe())
            } else {
                format!(
                    "expected at least {} '{}' substructures, found {}",
                    rule.min,
                    rule.describe(),
                    count
                )
            };
            return Err(error(document, id, message));
        }
        if count > rule.max {
            return Err(error(
                document,
                id,
                format!(
                    "expected at most {} '{}' substructure{}, found {}",
                    rule.max,
                    rule.describe(),
                    if rule.max == 1 { "" } else { "s" },
                    count
                ),
            ));
        }
    }
    Ok(())
}

// ── Property accessors (call after check_properties) ────────────────

pub fn bool_property(document: &Document, id: StructureId, key: &str, default: bool) -> bool {
    document
        .get(id)
        .property(key)
        .and_then(DataLiteral::as_bool)
        .unwrap_or(default)
}

pub fn unsigned_property(document: &Document, id: StructureId, key: &str) -> Option<u64> {
    document.get(id).property(key).and_then(DataLiteral::as_u64)
}

pub fn float_property(document: &Document, id: StructureId, key: &str) -> Option<f32> {
    document
        .get(id)
        .property(key)
        .and_then(DataLiteral::as_f64)
        .map(|v| v as f32)
}

pub fn string_property<'d>(document: &'d Document, id: StructureId, key: &str) -> Option<&'d str> {
    document.get(id).property(key).and_then(DataLiteral::as_str)
}

pub fn reference_property<'d>(
    document: &'d Document,
    id: StructureId,
    key: &str,
) -> Option<&'d Reference> {
    document.get(id).property(key).and_then(DataLiteral::as_reference)
}

pub fn required_string<'d>(
    document: &'d Document,
    id: StructureId,
    key: &str,
) -> Result<&'d str, ImportError> {
    string_property(document, id, key)
        .ok_or_else(|| error(document, id, format!("missing required property '{}'", key)))
}

// ── Data extraction ──────────────────────────────────────────────────

/// The first data-type child of `id`.
pub fn data_child(document: &Document, id: StructureId) -> Result<StructureId, ImportError> {
    document
        .get(id)
        .children()
        .iter()
        .copied()
        .find(|&child| document.get(child).is_data())
        .ok_or_else(|| error(document, id, "missing data structure".to_string()))
}

/// Float data flattened row by row, with its row width.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatData {
    pub values: Vec<f32>,
    pub width: usize,
}

impl FloatData {
    pub fn rows(&self) -> usize {
        if self.width == 0 {
            0
        } else {
            self.values.len() / self.width
        }
    }

    pub fn row(&self, index: usize) -> &[f32] {
        &self.values[index * self.width..(index + 1) * self.width]
    }
}

fn check_type(
    document: &Document,
    owner: StructureId,
    data: StructureId,
    accept: fn(PrimitiveType) -> bool,
    expected: &str,
) -> Result<(), ImportError> {
    match document.get(data).data_type() {
        Some(ty) if accept(ty) => Ok(()),
        Some(ty) => Err(error(
            document,
            owner,
            format!("expected {} data, found {}", expected, ty),
        )),
        None => Err(error(document, owner, "missing data structure".to_string())),
    }
}

/// Float data of the data child of `owner`.
pub fn float_data(document: &Document, owner: StructureId) -> Result<FloatData, ImportError> {
    let data = data_child(document, owner)?;
    check_type(document, owner, data, PrimitiveType::is_float, "floating-point")?;
    let structure = document.get(data);
    let values = structure
        .lists()
        .iter()
        .flatten()
        .filter_map(DataLiteral::as_f64)
        .map(|v| v as f32)
        .collect();
    Ok(FloatData {
        values,
        width: structure.arity().unwrap_or(1),
    })
}

/// Unsigned integer data of the data child of `owner`, with its row width.
pub fn unsigned_data(document: &Document, owner: StructureId) -> Result<(Vec<u64>, usize), ImportError> {
    let data = data_child(document, owner)?;
    check_type(document, owner, data, PrimitiveType::is_unsigned_integer, "unsigned integer")?;
    let structure = document.get(data);
    let values = structure
        .lists()
        .iter()
        .flatten()
        .filter_map(DataLiteral::as_u64)
        .collect();
    Ok((values, structure.arity().unwrap_or(1)))
}

/// The single string of the data child of `owner`.
pub fn string_data<'d>(document: &'d Document, owner: StructureId) -> Result<&'d str, ImportError> {
    let data = data_child(document, owner)?;
    check_type(document, owner, data, |ty| ty == PrimitiveType::String, "string")?;
    let mut values = document.get(data).lists().iter().flatten();
    match (values.next().and_then(DataLiteral::as_str), values.next()) {
        (Some(value), None) => Ok(value),
        _ => Err(error(document, owner, "expected exactly one string".to_string())),
    }
}

/// References of the data child of `owner`, with the data structure's id
/// (the scope they resolve from).
pub fn reference_data<'d>(
    document: &'d Document,
    owner: StructureId,
) -> Result<(Vec<&'d Reference>, StructureId), ImportError> {
    let data = data_child(document, owner)?;
    check_type(document, owner, data, |ty| ty == PrimitiveType::Ref, "ref")?;
    let refs = document
        .get(data)
        .lists()
        .iter()
        .flatten()
        .filter_map(DataLiteral::as_reference)
        .collect();
    Ok((refs, data))
}

/// The single reference of the data child of `owner`, resolved.
pub fn single_reference(document: &Document, owner: StructureId) -> Result<StructureId, ImportError> {
    let (refs, scope) = reference_data(document, owner)?;
    let [reference] = refs.as_slice() else {
        return Err(error(
            document,
            owner,
            format!("expected exactly one reference, found {}", refs.len()),
        ));
    };
    document.resolve(reference, scope).ok_or_else(|| {
        ImportError::unresolved(document.get(owner).keyword(), reference.to_string())
    })
}

/// `Name { string { "..." } }` child of `id`, if any.
pub fn name_child<'d>(document: &'d Document, id: StructureId) -> Result<Option<&'d str>, ImportError> {
    match document.children_of(id, Identifier::Name).next() {
        Some(name) => {
            check_properties(document, name, &[])?;
            check_substructures(document, name, &[ChildRule::one_data()])?;
            string_data(document, name).map(Some)
        }
        None => Ok(None),
    }
}
