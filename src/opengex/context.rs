//! State carried through one interpretation pass.

use crate::ast::StructureId;
use crate::math::Matrix4;
use crate::resource::{Mesh, MeshInstance};
use crate::scene::NodeId;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Scene-wide unit conventions set by `Metric` structures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    /// Scene units per meter-like distance unit in the file.
    pub distance: f32,
    pub angle: f32,
    pub time: f32,
    pub up: Axis,
    pub forward: Axis,
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics {
            distance: 1.0,
            angle: 1.0,
            time: 1.0,
            up: Axis::PositiveZ,
            forward: Axis::PositiveX,
        }
    }
}

/// A signed coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl Axis {
    pub fn parse(text: &str) -> Option<Axis> {
        Some(match text {
            "x" => Axis::PositiveX,
            "-x" => Axis::NegativeX,
            "y" => Axis::PositiveY,
            "-y" => Axis::NegativeY,
            "z" => Axis::PositiveZ,
            "-z" => Axis::NegativeZ,
            _ => return None,
        })
    }
}

/// A `GeometryNode` waiting for its `GeometryObject` to be built.
#[derive(Debug, Clone)]
pub(super) struct PendingInstance {
    pub node: NodeId,
    pub tag: String,
    /// `MaterialRef` targets by material index.
    pub materials: BTreeMap<u32, StructureId>,
    pub object_transform: Matrix4,
    pub visible: Option<bool>,
    pub cast_shadows: Option<bool>,
}

/// What a built `GeometryObject` contributes to its instances.
#[derive(Debug, Clone)]
pub(super) struct BuiltGeometry {
    pub resource: String,
    /// Material index of each index buffer, in order.
    pub material_slots: Vec<u32>,
    pub visible: bool,
    pub cast_shadows: bool,
}

/// Skin data whose bone references are resolved once every node exists.
#[derive(Debug, Clone)]
pub(super) struct PendingSkin {
    pub skin: StructureId,
    pub bind_shape: Matrix4,
    pub bones: Vec<StructureId>,
    pub bind_poses: Vec<Matrix4>,
    pub counts: Vec<usize>,
    pub indices: Vec<u32>,
    pub weights: Vec<f32>,
}

/// A mesh built from a `GeometryObject`, published at finalize.
#[derive(Debug, Clone)]
pub(super) struct BuiltMesh {
    pub resource: String,
    pub mesh: Mesh,
    pub skin: Option<PendingSkin>,
}

/// Mutable interpretation state for one document.
#[derive(Debug, Default)]
pub(super) struct ImportContext {
    pub metrics: Metrics,
    /// Node structure → scene node.
    pub nodes: HashMap<StructureId, NodeId>,
    /// Scene node → tag it was given.
    pub tags: HashMap<NodeId, String>,
    /// Scene node → unique prefix for the resources it owns.
    pub prefixes: HashMap<NodeId, String>,
    pub taken_prefixes: HashSet<String>,
    /// Top-level object or material → unique resource name.
    pub resource_names: HashMap<StructureId, String>,
    pub geometries: HashMap<StructureId, BuiltGeometry>,
    /// Object structure → nodes that referenced it before it was built.
    pub pending_instances: HashMap<StructureId, Vec<PendingInstance>>,
    /// Material structure → resource name.
    pub materials: HashMap<StructureId, String>,
    /// Material structure → indices into `instances` awaiting it.
    pub pending_materials: HashMap<StructureId, Vec<usize>>,
    /// Instances with their resource names, published at finalize.
    pub instances: Vec<(String, MeshInstance)>,
    pub meshes: Vec<BuiltMesh>,
}

/// Take `base` if it is free in `taken`, else suffix it with `#<suffix>`
/// until it is.
pub(super) fn claim(taken: &mut HashSet<String>, base: String, suffix: usize) -> String {
    let mut candidate = base;
    while !taken.insert(candidate.clone()) {
        candidate = format!("{}#{}", candidate, suffix);
    }
    candidate
}
