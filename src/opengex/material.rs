//! `Material` with its `Color`, `Param` and `Texture` attributes, and
//! binding of materials to mesh instances in either definition order.

use super::grammar::{self, prop, ChildKind, ChildRule, PropertySpec, PropertyType};
use super::transform;
use super::{Interpreter, Metrics};
use crate::ast::{Document, StructureId};
use crate::error::ImportError;
use crate::identifier::Identifier;
use crate::math::Matrix4;
use crate::resource::{Material, MaterialBinding, Resource, Texture};
use crate::scene::SceneGraph;
use tracing::debug;

const MATERIAL_CHILDREN: &[ChildRule] = &[
    ChildRule::at_most_one(Identifier::Name),
    ChildRule::any(Identifier::Color),
    ChildRule::any(Identifier::Param),
    ChildRule::any(Identifier::Texture),
    ChildRule::any(Identifier::Spectrum),
    ChildRule::any(Identifier::Extension),
];

const ATTRIB_PROPERTIES: &[PropertySpec] = &[prop("attrib", PropertyType::String)];

const TEXTURE_PROPERTIES: &[PropertySpec] = &[
    prop("attrib", PropertyType::String),
    prop("texcoord", PropertyType::Unsigned),
];

const TEXTURE_CHILDREN: &[ChildRule] = &[
    ChildRule::one_data(),
    ChildRule::kind(ChildKind::AnyTransform),
    ChildRule::any(Identifier::Animation),
];

impl<S: SceneGraph> Interpreter<'_, S> {
    pub(super) fn visit_material(&mut self, id: StructureId) -> Result<(), ImportError> {
        const PROPERTIES: &[PropertySpec] = &[prop("two_sided", PropertyType::Bool)];
        let document = self.document;
        grammar::check_properties(document, id, PROPERTIES)?;
        grammar::check_substructures(document, id, MATERIAL_CHILDREN)?;

        let resource = self.resource_name(id);
        let name = match grammar::name_child(document, id) {
            Ok(name) => name.unwrap_or(&resource).to_string(),
            Err(err) => {
                self.errors.push(err);
                resource.clone()
            }
        };
        let mut material = Material::new(name, grammar::bool_property(document, id, "two_sided", false));
        // Texture space has no distance unit.
        let texture_metrics = Metrics {
            distance: 1.0,
            ..self.context.metrics
        };

        for &child in document.get(id).children() {
            let result = match document.get(child).identifier() {
                Some(Identifier::Color) => read_color(document, child).map(|(attrib, color)| {
                    material.colors.insert(attrib, color);
                }),
                Some(Identifier::Param) => read_param(document, child).map(|(attrib, value)| {
                    material.params.insert(attrib, value);
                }),
                Some(Identifier::Texture) => {
                    read_texture(document, child, &texture_metrics).map(|(attrib, texture)| {
                        material.textures.insert(attrib, texture);
                    })
                }
                Some(Identifier::Spectrum) => {
                    debug!("skipping Spectrum");
                    Ok(())
                }
                _ => Ok(()),
            };
            self.record(result);
        }

        self.scene.set_resource(&resource, Resource::Material(material));
        self.material_built(id, resource);
        Ok(())
    }

    /// Bind now if the material is built, otherwise queue instance
    /// `instance` until it is.
    pub(super) fn bind_material(&mut self, material: StructureId, instance: usize) -> MaterialBinding {
        if let Some(name) = self.context.materials.get(&material) {
            return MaterialBinding::Bound(name.clone());
        }
        self.context
            .pending_materials
            .entry(material)
            .or_default()
            .push(instance);
        MaterialBinding::Pending(self.resource_name(material))
    }

    fn material_built(&mut self, material: StructureId, name: String) {
        let waiting = self.context.pending_materials.remove(&material).unwrap_or_default();
        for index in waiting {
            self.context.instances[index].1.material = MaterialBinding::Bound(name.clone());
        }
        self.context.materials.insert(material, name);
    }
}

/// `Color (attrib) { float[3] {{r, g, b}} }`; alpha defaults to 1.
pub(super) fn read_color(document: &Document, id: StructureId) -> Result<(String, [f32; 4]), ImportError> {
    grammar::check_properties(document, id, ATTRIB_PROPERTIES)?;
    grammar::check_substructures(document, id, &[ChildRule::one_data()])?;
    let attrib = grammar::required_string(document, id, "attrib")?;
    let data = grammar::float_data(document, id)?;
    match data.values.as_slice() {
        &[r, g, b] => Ok((attrib.to_string(), [r, g, b, 1.0])),
        &[r, g, b, a] => Ok((attrib.to_string(), [r, g, b, a])),
        values => Err(grammar::error(
            document,
            id,
            format!("color needs 3 or 4 components, found {}", values.len()),
        )),
    }
}

/// `Param (attrib) { float {value} }`
pub(super) fn read_param(document: &Document, id: StructureId) -> Result<(String, f32), ImportError> {
    grammar::check_properties(document, id, ATTRIB_PROPERTIES)?;
    grammar::check_substructures(document, id, &[ChildRule::one_data()])?;
    let attrib = grammar::required_string(document, id, "attrib")?;
    let data = grammar::float_data(document, id)?;
    match data.values.as_slice() {
        &[value] => Ok((attrib.to_string(), value)),
        values => Err(grammar::error(
            document,
            id,
            format!("param needs one value, found {}", values.len()),
        )),
    }
}

fn read_texture(
    document: &Document,
    id: StructureId,
    metrics: &Metrics,
) -> Result<(String, Texture), ImportError> {
    grammar::check_properties(document, id, TEXTURE_PROPERTIES)?;
    grammar::check_substructures(document, id, TEXTURE_CHILDREN)?;
    let attrib = grammar::required_string(document, id, "attrib")?;
    let file = grammar::string_data(document, id)?;
    let texcoord = grammar::unsigned_property(document, id, "texcoord").unwrap_or(0);
    let texcoord = u32::try_from(texcoord)
        .map_err(|_| grammar::error(document, id, format!("texcoord {} out of range", texcoord)))?;

    let mut matrix = Matrix4::IDENTITY;
    for &child in document.get(id).children() {
        match document.get(child).identifier() {
            Some(identifier) if identifier.is_transform() => {
                let t = transform::read_transform(document, child)?;
                matrix = matrix * t.single_matrix(document, child, metrics)?;
            }
            Some(Identifier::Animation) => debug!("skipping texture Animation"),
            _ => {}
        }
    }

    Ok((
        attrib.to_string(),
        Texture {
            file: file.to_string(),
            texcoord,
            transform: matrix,
        },
    ))
}
