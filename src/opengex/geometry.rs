//! `GeometryObject`, `Mesh`, `VertexArray` and `IndexArray`, plus
//! instancing of built geometry at geometry nodes.

use super::context::{BuiltGeometry, BuiltMesh, PendingInstance, PendingSkin};
use super::grammar::{self, prop, ChildRule, FloatData, PropertySpec, PropertyType};
use super::Interpreter;
use crate::ast::{Document, StructureId};
use crate::error::ImportError;
use crate::identifier::Identifier;
use crate::resource::{IndexBuffer, MaterialBinding, Mesh, MeshInstance, Vertex};
use crate::scene::SceneGraph;
use tracing::{debug, warn};

const OBJECT_PROPERTIES: &[PropertySpec] = &[
    prop("visible", PropertyType::Bool),
    prop("shadow", PropertyType::Bool),
    prop("motion_blur", PropertyType::Bool),
];

const OBJECT_CHILDREN: &[ChildRule] = &[
    ChildRule::at_least_one(Identifier::Mesh),
    ChildRule::any(Identifier::Morph),
    ChildRule::any(Identifier::Extension),
];

const MESH_PROPERTIES: &[PropertySpec] = &[
    prop("lod", PropertyType::Unsigned),
    prop("primitive", PropertyType::String),
];

const MESH_CHILDREN: &[ChildRule] = &[
    ChildRule::at_least_one(Identifier::VertexArray),
    ChildRule::any(Identifier::IndexArray),
    ChildRule::at_most_one(Identifier::Skin),
    ChildRule::any(Identifier::Extension),
];

const VERTEX_ARRAY_PROPERTIES: &[PropertySpec] = &[
    prop("attrib", PropertyType::String),
    prop("morph", PropertyType::Unsigned),
];

const INDEX_ARRAY_PROPERTIES: &[PropertySpec] = &[
    prop("material", PropertyType::Unsigned),
    prop("restart", PropertyType::Unsigned),
    prop("front", PropertyType::String),
];

impl<S: SceneGraph> Interpreter<'_, S> {
    pub(super) fn visit_geometry_object(&mut self, id: StructureId) -> Result<(), ImportError> {
        let document = self.document;
        grammar::check_properties(document, id, OBJECT_PROPERTIES)?;
        grammar::check_substructures(document, id, OBJECT_CHILDREN)?;

        if document.children_of(id, Identifier::Morph).next().is_some() {
            debug!("skipping Morph targets");
        }

        // The most detailed level of detail is the one with the lowest lod.
        let mut mesh_id = None;
        let mut best_lod = u64::MAX;
        for mesh in document.children_of(id, Identifier::Mesh) {
            let lod = grammar::unsigned_property(document, mesh, "lod").unwrap_or(0);
            if lod < best_lod {
                best_lod = lod;
                mesh_id = Some(mesh);
            }
        }
        let mesh_id = mesh_id.ok_or_else(|| {
            grammar::error(document, id, "missing required substructure 'Mesh'".to_string())
        })?;
        if document.children_of(id, Identifier::Mesh).count() > 1 {
            debug!(lod = best_lod, "using one level of detail, skipping the others");
        }

        let (mesh, skin) = self.build_mesh(mesh_id)?;
        let resource = self.resource_name(id);
        let geometry = BuiltGeometry {
            resource: resource.clone(),
            material_slots: mesh.index_buffers.iter().map(|b| b.material_index).collect(),
            visible: grammar::bool_property(document, id, "visible", true),
            cast_shadows: grammar::bool_property(document, id, "shadow", true),
        };
        self.context.meshes.push(BuiltMesh {
            resource,
            mesh,
            skin,
        });
        self.geometry_built(id, geometry);
        Ok(())
    }

    fn build_mesh(&mut self, id: StructureId) -> Result<(Mesh, Option<PendingSkin>), ImportError> {
        let document = self.document;
        grammar::check_properties(document, id, MESH_PROPERTIES)?;
        grammar::check_substructures(document, id, MESH_CHILDREN)?;
        if let Some(primitive) = grammar::string_property(document, id, "primitive") {
            if primitive != "triangles" {
                return Err(grammar::error(
                    document,
                    id,
                    format!("unsupported primitive \"{}\"", primitive),
                ));
            }
        }

        let mut positions: Option<FloatData> = None;
        let mut normals: Option<FloatData> = None;
        let mut texcoords: Option<FloatData> = None;
        for array in document.children_of(id, Identifier::VertexArray) {
            grammar::check_properties(document, array, VERTEX_ARRAY_PROPERTIES)?;
            grammar::check_substructures(document, array, &[ChildRule::one_data()])?;
            let attrib = grammar::required_string(document, array, "attrib")?;
            if grammar::unsigned_property(document, array, "morph").unwrap_or(0) != 0 {
                debug!(attrib, "skipping morph target vertex array");
                continue;
            }
            let (slot, widths): (&mut Option<FloatData>, &[usize]) = match attrib {
                "position" => (&mut positions, &[3, 2][..]),
                "normal" => (&mut normals, &[3][..]),
                "texcoord" => (&mut texcoords, &[2][..]),
                _ => {
                    debug!(attrib, "skipping vertex array");
                    continue;
                }
            };
            if slot.is_some() {
                return Err(grammar::error(
                    document,
                    array,
                    format!("duplicate vertex array '{}'", attrib),
                ));
            }
            let data = grammar::float_data(document, array)?;
            if !widths.contains(&data.width) {
                return Err(grammar::error(
                    document,
                    array,
                    format!(
                        "vertex array '{}' needs float[{}] data, found float[{}]",
                        attrib, widths[0], data.width
                    ),
                ));
            }
            *slot = Some(data);
        }

        let positions = positions.ok_or_else(|| {
            grammar::error(document, id, "missing 'position' vertex array".to_string())
        })?;
        let count = positions.rows();
        for (attrib, data) in [("normal", &normals), ("texcoord", &texcoords)] {
            if let Some(data) = data {
                if data.rows() != count {
                    return Err(grammar::error(
                        document,
                        id,
                        format!(
                            "vertex array '{}' has {} vertices, expected {}",
                            attrib,
                            data.rows(),
                            count
                        ),
                    ));
                }
            }
        }

        let scale = self.context.metrics.distance;
        let vertices = (0..count)
            .map(|i| {
                let p = positions.row(i);
                let mut vertex = Vertex {
                    position: [p[0] * scale, p[1] * scale, p.get(2).map_or(0.0, |z| z * scale)],
                    ..Vertex::default()
                };
                if let Some(normals) = &normals {
                    let n = normals.row(i);
                    vertex.normal = [n[0], n[1], n[2]];
                }
                if let Some(texcoords) = &texcoords {
                    let t = texcoords.row(i);
                    vertex.uv = [t[0], t[1]];
                }
                vertex
            })
            .collect::<Vec<_>>();

        let mut index_buffers = Vec::new();
        for array in document.children_of(id, Identifier::IndexArray) {
            index_buffers.push(read_index_array(document, array, count)?);
        }
        if index_buffers.is_empty() {
            warn!(vertices = count, "mesh has no IndexArray, drawing vertices in order");
            index_buffers.push(IndexBuffer::new(0, (0..count as u32).collect()));
        }

        let skin = match document.children_of(id, Identifier::Skin).next() {
            Some(skin) if self.options.process_skins => Some(self.read_skin(skin, count)?),
            Some(_) => {
                debug!("skins disabled, skipping Skin");
                None
            }
            None => None,
        };

        Ok((Mesh::new(vertices, index_buffers), skin))
    }

    /// Instance the geometry now if it is built, otherwise queue the request.
    pub(super) fn request_instances(&mut self, object: StructureId, pending: PendingInstance) {
        match self.context.geometries.get(&object).cloned() {
            Some(geometry) => self.materialize(pending, &geometry),
            None => self
                .context
                .pending_instances
                .entry(object)
                .or_default()
                .push(pending),
        }
    }

    fn geometry_built(&mut self, object: StructureId, geometry: BuiltGeometry) {
        let waiting = self.context.pending_instances.remove(&object).unwrap_or_default();
        for pending in waiting {
            self.materialize(pending, &geometry);
        }
        self.context.geometries.insert(object, geometry);
    }

    /// One mesh instance per index buffer of the geometry.
    fn materialize(&mut self, pending: PendingInstance, geometry: &BuiltGeometry) {
        for (index, slot) in geometry.material_slots.iter().enumerate() {
            let position = self.context.instances.len();
            let material = match pending.materials.get(slot) {
                Some(&target) => self.bind_material(target, position),
                None => MaterialBinding::Unbound,
            };
            let instance = MeshInstance {
                node: pending.node,
                mesh: geometry.resource.clone(),
                index_buffer: index,
                material,
                object_transform: pending.object_transform,
                visible: pending.visible.unwrap_or(geometry.visible),
                cast_shadows: pending.cast_shadows.unwrap_or(geometry.cast_shadows),
            };
            self.context
                .instances
                .push((format!("{}/{}", pending.tag, index), instance));
        }
    }
}

/// `IndexArray (material, restart, front) { unsigned_int32[3] {...} }`
fn read_index_array(
    document: &Document,
    id: StructureId,
    vertex_count: usize,
) -> Result<IndexBuffer, ImportError> {
    grammar::check_properties(document, id, INDEX_ARRAY_PROPERTIES)?;
    grammar::check_substructures(document, id, &[ChildRule::one_data()])?;

    let material = grammar::unsigned_property(document, id, "material").unwrap_or(0);
    let material = u32::try_from(material)
        .map_err(|_| grammar::error(document, id, format!("material {} out of range", material)))?;
    if grammar::unsigned_property(document, id, "restart").is_some() {
        debug!("ignoring restart index for triangle lists");
    }
    let clockwise = match grammar::string_property(document, id, "front") {
        None | Some("ccw") => false,
        Some("cw") => true,
        Some(other) => {
            return Err(grammar::error(
                document,
                id,
                format!("front must be \"ccw\" or \"cw\", found \"{}\"", other),
            ))
        }
    };

    let (values, width) = grammar::unsigned_data(document, id)?;
    if !(width == 3 || (width == 1 && values.len() % 3 == 0)) {
        return Err(grammar::error(
            document,
            id,
            format!(
                "triangle indices need rows of 3, found {} values of width {}",
                values.len(),
                width
            ),
        ));
    }

    let mut indices = Vec::with_capacity(values.len());
    for value in values {
        if value >= vertex_count as u64 {
            return Err(grammar::error(
                document,
                id,
                format!("index {} out of range for {} vertices", value, vertex_count),
            ));
        }
        indices.push(value as u32);
    }
    if clockwise {
        for triangle in indices.chunks_exact_mut(3) {
            triangle.swap(1, 2);
        }
    }
    Ok(IndexBuffer::new(material, indices))
}
