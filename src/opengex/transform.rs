//! `Transform`, `Translation`, `Rotation` and `Scale` structures.

use super::context::Metrics;
use super::grammar::{self, prop, ChildRule, FloatData, PropertyType};
use crate::ast::{Document, StructureId};
use crate::error::ImportError;
use crate::identifier::Identifier;
use crate::math::{Matrix4, Quaternion, Vector3};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Component {
    X,
    Y,
    Z,
    Xyz,
}

impl Component {
    fn parse(kind: Option<&str>) -> Option<Component> {
        Some(match kind {
            None | Some("xyz") => Component::Xyz,
            Some("x") => Component::X,
            Some("y") => Component::Y,
            Some("z") => Component::Z,
            Some(_) => return None,
        })
    }

    fn count(self) -> usize {
        match self {
            Component::Xyz => 3,
            _ => 1,
        }
    }

    /// Spread `values` over a vector whose other components are `fill`.
    fn vector(self, values: &[f32], fill: f32) -> Vector3 {
        match self {
            Component::X => Vector3::new(values[0], fill, fill),
            Component::Y => Vector3::new(fill, values[0], fill),
            Component::Z => Vector3::new(fill, fill, values[0]),
            Component::Xyz => Vector3::new(values[0], values[1], values[2]),
        }
    }
}

/// How a transform structure's components become a matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TransformKind {
    Matrix,
    Translation(Component),
    Scale(Component),
    RotationX,
    RotationY,
    RotationZ,
    /// `{angle, x, y, z}`
    RotationAxis,
    /// `{x, y, z, w}`
    Quaternion,
}

impl TransformKind {
    /// Float components of one element.
    pub fn components(self) -> usize {
        match self {
            TransformKind::Matrix => 16,
            TransformKind::Translation(c) | TransformKind::Scale(c) => c.count(),
            TransformKind::RotationX | TransformKind::RotationY | TransformKind::RotationZ => 1,
            TransformKind::RotationAxis | TransformKind::Quaternion => 4,
        }
    }

    /// Build the matrix for one element; `values` holds exactly
    /// `components()` floats.
    pub fn matrix(self, values: &[f32], metrics: &Metrics) -> Matrix4 {
        match self {
            TransformKind::Matrix => {
                let mut m = Matrix4::IDENTITY;
                m.m.copy_from_slice(&values[..16]);
                for i in 12..15 {
                    m.m[i] *= metrics.distance;
                }
                m
            }
            TransformKind::Translation(c) => {
                Matrix4::translation(c.vector(values, 0.0) * metrics.distance)
            }
            TransformKind::Scale(c) => Matrix4::scale(c.vector(values, 1.0)),
            TransformKind::RotationX => Matrix4::rotation_x(values[0] * metrics.angle),
            TransformKind::RotationY => Matrix4::rotation_y(values[0] * metrics.angle),
            TransformKind::RotationZ => Matrix4::rotation_z(values[0] * metrics.angle),
            TransformKind::RotationAxis => Matrix4::axis_angle(
                values[0] * metrics.angle,
                Vector3::new(values[1], values[2], values[3]),
            ),
            TransformKind::Quaternion => {
                Quaternion::new(values[0], values[1], values[2], values[3]).to_matrix()
            }
        }
    }
}

/// A decoded transform structure.
#[derive(Debug, Clone)]
pub(super) struct TransformData {
    pub kind: TransformKind,
    /// Applies to the node's geometry only.
    pub object: bool,
    pub data: FloatData,
}

impl TransformData {
    /// Number of complete elements.
    pub fn elements(&self) -> usize {
        self.data.values.len() / self.kind.components()
    }

    pub fn element(&self, index: usize) -> &[f32] {
        let n = self.kind.components();
        &self.data.values[index * n..(index + 1) * n]
    }

    /// The matrix of a structure holding exactly one element.
    pub fn single_matrix(
        &self,
        document: &Document,
        id: StructureId,
        metrics: &Metrics,
    ) -> Result<Matrix4, ImportError> {
        if self.data.values.len() != self.kind.components() {
            return Err(grammar::error(
                document,
                id,
                format!(
                    "expected {} values, found {}",
                    self.kind.components(),
                    self.data.values.len()
                ),
            ));
        }
        Ok(self.kind.matrix(&self.data.values, metrics))
    }
}

const TRANSFORM_PROPERTIES: &[grammar::PropertySpec] = &[prop("object", PropertyType::Bool)];

const KINDED_PROPERTIES: &[grammar::PropertySpec] = &[
    prop("kind", PropertyType::String),
    prop("object", PropertyType::Bool),
];

/// Validate and decode a transform structure.
pub(super) fn read_transform(document: &Document, id: StructureId) -> Result<TransformData, ImportError> {
    let identifier = document.get(id).identifier();
    let properties = if identifier == Some(Identifier::Transform) {
        TRANSFORM_PROPERTIES
    } else {
        KINDED_PROPERTIES
    };
    grammar::check_properties(document, id, properties)?;
    grammar::check_substructures(document, id, &[ChildRule::one_data()])?;

    let data = grammar::float_data(document, id)?;
    let kind_text = grammar::string_property(document, id, "kind");
    let bad_kind = || {
        grammar::error(
            document,
            id,
            format!("invalid kind \"{}\"", kind_text.unwrap_or_default()),
        )
    };

    let kind = match identifier {
        Some(Identifier::Transform) => TransformKind::Matrix,
        Some(Identifier::Translation) => {
            TransformKind::Translation(Component::parse(kind_text).ok_or_else(bad_kind)?)
        }
        Some(Identifier::Scale) => {
            TransformKind::Scale(Component::parse(kind_text).ok_or_else(bad_kind)?)
        }
        Some(Identifier::Rotation) => match kind_text {
            Some("x") => TransformKind::RotationX,
            Some("y") => TransformKind::RotationY,
            Some("z") => TransformKind::RotationZ,
            Some("axis") => TransformKind::RotationAxis,
            Some("quaternion") => TransformKind::Quaternion,
            Some(_) => return Err(bad_kind()),
            None if data.values.len() == 4 => TransformKind::Quaternion,
            None => {
                return Err(grammar::error(
                    document,
                    id,
                    format!(
                        "rotation without kind needs 4 components, found {}",
                        data.values.len()
                    ),
                ))
            }
        },
        _ => {
            return Err(grammar::error(
                document,
                id,
                "not a transform structure".to_string(),
            ))
        }
    };

    if data.values.len() % kind.components() != 0 {
        return Err(grammar::error(
            document,
            id,
            format!(
                "value count {} is not a multiple of {}",
                data.values.len(),
                kind.components()
            ),
        ));
    }

    Ok(TransformData {
        kind,
        object: grammar::bool_property(document, id, "object", false),
        data,
    })
}

/// Every matrix of a `Transform` structure (skeleton bind poses hold one
/// per bone).
pub(super) fn read_matrices(
    document: &Document,
    id: StructureId,
    metrics: &Metrics,
) -> Result<Vec<Matrix4>, ImportError> {
    let transform = read_transform(document, id)?;
    Ok((0..transform.elements())
        .map(|i| transform.kind.matrix(transform.element(i), metrics))
        .collect())
}
