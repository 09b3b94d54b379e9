//! Render-side resources produced by the importer.
//!
//! These are plain data: every buffer is computed by the interpreter and
//! handed over through the constructors below.

use crate::math::Matrix4;
use crate::scene::NodeId;
use std::collections::BTreeMap;

/// Texture coordinate used when a mesh has no `texcoord` array.
pub const DEFAULT_UV: [f32; 2] = [0.0, 1.0];

/// Bone index stored in unused per-vertex influence slots.
pub const UNUSED_BONE: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Default for Vertex {
    fn default() -> Self {
        Vertex {
            position: [0.0; 3],
            normal: [0.0; 3],
            uv: DEFAULT_UV,
        }
    }
}

/// Triangle indices drawn with one material slot.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexBuffer {
    /// Matches the `index` of a `MaterialRef` on the instancing node.
    pub material_index: u32,
    pub indices: Vec<u32>,
}

impl IndexBuffer {
    pub fn new(material_index: u32, indices: Vec<u32>) -> Self {
        IndexBuffer {
            material_index,
            indices,
        }
    }

    pub fn num_indices(&self) -> usize {
        self.indices.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub index_buffers: Vec<IndexBuffer>,
    pub skin: Option<Skin>,
}

impl Mesh {
    pub fn new(vertices: Vec<Vertex>, index_buffers: Vec<IndexBuffer>) -> Self {
        Mesh {
            vertices,
            index_buffers,
            skin: None,
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Vertex data as one flat `position, normal, uv` stream.
    pub fn interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.vertices.len() * 8);
        for v in &self.vertices {
            out.extend_from_slice(&v.position);
            out.extend_from_slice(&v.normal);
            out.extend_from_slice(&v.uv);
        }
        out
    }
}

/// Per-vertex bone influences, padded to a fixed count per vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct Skin {
    /// Transform from mesh space into the skeleton's bind space.
    pub bind_shape: Matrix4,
    pub max_bones_per_vertex: usize,
    /// `num_vertices * max_bones_per_vertex` entries; `UNUSED_BONE` pads.
    pub bone_indices: Vec<u32>,
    /// Same layout as `bone_indices`; padding slots weigh 0.
    pub bone_weights: Vec<f32>,
    /// Resource name of the skeleton.
    pub skeleton: String,
}

impl Skin {
    pub fn new(
        bind_shape: Matrix4,
        max_bones_per_vertex: usize,
        bone_indices: Vec<u32>,
        bone_weights: Vec<f32>,
        skeleton: String,
    ) -> Self {
        Skin {
            bind_shape,
            max_bones_per_vertex,
            bone_indices,
            bone_weights,
            skeleton,
        }
    }

    /// Influences of one vertex as `(bone, weight)` pairs, padding excluded.
    pub fn influences(&self, vertex: usize) -> Vec<(u32, f32)> {
        let start = vertex * self.max_bones_per_vertex;
        let end = start + self.max_bones_per_vertex;
        self.bone_indices
            .get(start..end)
            .into_iter()
            .flatten()
            .zip(self.bone_weights.get(start..end).into_iter().flatten())
            .filter(|(&bone, _)| bone != UNUSED_BONE)
            .map(|(&bone, &weight)| (bone, weight))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    pub node: NodeId,
    /// Index of the parent bone in the same skeleton; `None` for roots.
    pub parent: Option<usize>,
    pub bind_pose: Matrix4,
    pub inverse_bind_pose: Matrix4,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Skeleton {
    pub bones: Vec<Bone>,
}

impl Skeleton {
    pub fn new(bones: Vec<Bone>) -> Self {
        Skeleton { bones }
    }

    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }
}

/// Which material a mesh instance draws with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterialBinding {
    /// No `MaterialRef` names this slot; the renderer's default applies.
    Unbound,
    /// A `MaterialRef` names a material that has not been built yet.
    Pending(String),
    /// Resource name of the bound material.
    Bound(String),
}

/// One drawable: a node, a mesh and one of the mesh's index buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshInstance {
    pub node: NodeId,
    pub mesh: String,
    pub index_buffer: usize,
    pub material: MaterialBinding,
    /// Transforms flagged `object = true` on the node.
    pub object_transform: Matrix4,
    pub visible: bool,
    pub cast_shadows: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub file: String,
    pub texcoord: u32,
    pub transform: Matrix4,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Material {
    pub name: String,
    pub two_sided: bool,
    /// RGBA by attrib (`diffuse`, `specular`, ...); RGB inputs get alpha 1.
    pub colors: BTreeMap<String, [f32; 4]>,
    pub params: BTreeMap<String, f32>,
    pub textures: BTreeMap<String, Texture>,
}

impl Material {
    pub fn new(name: String, two_sided: bool) -> Self {
        Material {
            name,
            two_sided,
            ..Material::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Camera {
    /// Horizontal field of view in radians.
    pub fov: Option<f32>,
    pub near: Option<f32>,
    pub far: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Infinite,
    Point,
    Spot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: [f32; 3],
    pub intensity: f32,
    pub cast_shadows: bool,
}

impl Light {
    pub fn new(kind: LightKind, cast_shadows: bool) -> Self {
        Light {
            kind,
            color: [1.0, 1.0, 1.0],
            intensity: 1.0,
            cast_shadows,
        }
    }
}

/// A camera or light object placed at a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInstance {
    pub node: NodeId,
    /// Resource name of the camera or light object.
    pub object: String,
}

/// A node's local transform sampled once per key time.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationInstance {
    pub node: NodeId,
    pub clip: u32,
    pub times: Vec<f32>,
    pub transforms: Vec<Matrix4>,
}

impl AnimationInstance {
    pub fn new(node: NodeId, clip: u32, times: Vec<f32>, transforms: Vec<Matrix4>) -> Self {
        AnimationInstance {
            node,
            clip,
            times,
            transforms,
        }
    }

    pub fn num_keyframes(&self) -> usize {
        self.times.len()
    }
}

/// An entry of the scene's resource dictionary.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Mesh(Mesh),
    MeshInstance(MeshInstance),
    Material(Material),
    Skeleton(Skeleton),
    Animation(AnimationInstance),
    Camera(Camera),
    CameraInstance(ObjectInstance),
    Light(Light),
    LightInstance(ObjectInstance),
}

impl Resource {
    pub fn as_mesh(&self) -> Option<&Mesh> {
        match self {
            Resource::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }

    pub fn as_mesh_instance(&self) -> Option<&MeshInstance> {
        match self {
            Resource::MeshInstance(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn as_material(&self) -> Option<&Material> {
        match self {
            Resource::Material(material) => Some(material),
            _ => None,
        }
    }

    pub fn as_skeleton(&self) -> Option<&Skeleton> {
        match self {
            Resource::Skeleton(skeleton) => Some(skeleton),
            _ => None,
        }
    }

    pub fn as_animation(&self) -> Option<&AnimationInstance> {
        match self {
            Resource::Animation(animation) => Some(animation),
            _ => None,
        }
    }

    pub fn as_camera(&self) -> Option<&Camera> {
        match self {
            Resource::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    pub fn as_light(&self) -> Option<&Light> {
        match self {
            Resource::Light(light) => Some(light),
            _ => None,
        }
    }
}
