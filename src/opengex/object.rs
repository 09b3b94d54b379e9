//! `CameraObject` and `LightObject`.

use super::grammar::{self, prop, ChildRule, PropertySpec, PropertyType};
use super::material::{read_color, read_param};
use super::Interpreter;
use crate::ast::StructureId;
use crate::error::ImportError;
use crate::identifier::Identifier;
use crate::resource::{Camera, Light, LightKind, Resource};
use crate::scene::SceneGraph;
use tracing::debug;

const CAMERA_CHILDREN: &[ChildRule] = &[
    ChildRule::any(Identifier::Param),
    ChildRule::any(Identifier::Color),
    ChildRule::any(Identifier::Extension),
];

const LIGHT_PROPERTIES: &[PropertySpec] = &[
    prop("type", PropertyType::String),
    prop("shadow", PropertyType::Bool),
];

const LIGHT_CHILDREN: &[ChildRule] = &[
    ChildRule::any(Identifier::Color),
    ChildRule::any(Identifier::Param),
    ChildRule::any(Identifier::Texture),
    ChildRule::any(Identifier::Atten),
    ChildRule::any(Identifier::Spectrum),
    ChildRule::any(Identifier::Extension),
];

impl<S: SceneGraph> Interpreter<'_, S> {
    pub(super) fn visit_camera_object(&mut self, id: StructureId) -> Result<(), ImportError> {
        let document = self.document;
        grammar::check_properties(document, id, &[])?;
        grammar::check_substructures(document, id, CAMERA_CHILDREN)?;

        let metrics = self.context.metrics;
        let mut camera = Camera::default();
        for param in document.children_of(id, Identifier::Param) {
            match read_param(document, param) {
                Ok((attrib, value)) => match attrib.as_str() {
                    "fov" => camera.fov = Some(value * metrics.angle),
                    "near" => camera.near = Some(value * metrics.distance),
                    "far" => camera.far = Some(value * metrics.distance),
                    other => debug!(attrib = other, "skipping camera param"),
                },
                Err(err) => self.errors.push(err),
            }
        }

        let name = self.resource_name(id);
        self.scene.set_resource(&name, Resource::Camera(camera));
        Ok(())
    }

    pub(super) fn visit_light_object(&mut self, id: StructureId) -> Result<(), ImportError> {
        let document = self.document;
        grammar::check_properties(document, id, LIGHT_PROPERTIES)?;
        grammar::check_substructures(document, id, LIGHT_CHILDREN)?;

        let kind = match grammar::required_string(document, id, "type")? {
            "infinite" => LightKind::Infinite,
            "point" => LightKind::Point,
            "spot" => LightKind::Spot,
            other => {
                return Err(grammar::error(
                    document,
                    id,
                    format!("unknown light type \"{}\"", other),
                ))
            }
        };
        let mut light = Light::new(kind, grammar::bool_property(document, id, "shadow", true));

        for &child in document.get(id).children() {
            match document.get(child).identifier() {
                Some(Identifier::Color) => match read_color(document, child) {
                    Ok((attrib, [r, g, b, _])) if attrib == "light" => light.color = [r, g, b],
                    Ok((attrib, _)) => debug!(attrib = %attrib, "skipping light color"),
                    Err(err) => self.errors.push(err),
                },
                Some(Identifier::Param) => match read_param(document, child) {
                    Ok((attrib, value)) if attrib == "intensity" => light.intensity = value,
                    Ok((attrib, _)) => debug!(attrib = %attrib, "skipping light param"),
                    Err(err) => self.errors.push(err),
                },
                Some(Identifier::Atten) => debug!("skipping Atten"),
                Some(Identifier::Texture) => debug!("skipping light Texture"),
                Some(Identifier::Spectrum) => debug!("skipping Spectrum"),
                _ => {}
            }
        }

        let name = self.resource_name(id);
        self.scene.set_resource(&name, Resource::Light(light));
        Ok(())
    }
}
