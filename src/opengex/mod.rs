//! OpenGEX interpretation of a parsed OpenDDL document.
//!
//! The interpreter walks the top-level structures, builds scene nodes and
//! resources through a [`SceneGraph`], and collects every non-fatal error.
//! Objects and materials may be defined before or after the nodes that
//! reference them: each reference is resolved at once when its target has
//! been built, or queued and resolved when the target arrives. Skins are
//! resolved in a final pass, once every bone node exists.

mod animation;
mod context;
mod geometry;
mod grammar;
mod material;
mod node;
mod object;
mod skin;
mod transform;

#[cfg(test)]
mod tests;

pub use context::{Axis, Metrics};

use crate::ast::{Document, StructureId};
use crate::error::ImportError;
use crate::identifier::Identifier;
use crate::resource::{MaterialBinding, Resource};
use crate::scene::{NodeId, SceneGraph};
use context::ImportContext;
use grammar::{prop, ChildRule, PropertyType};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Which optional parts of a file are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    /// Sample `Animation` structures into animation resources.
    pub process_animations: bool,
    /// Build skins and skeletons for skinned meshes.
    pub process_skins: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        ImportOptions {
            process_animations: true,
            process_skins: true,
        }
    }
}

/// Interpret `document` into `scene`, returning the scene, the metrics in
/// effect and every error found along the way.
pub fn interpret<S: SceneGraph>(
    document: &Document,
    scene: S,
    options: &ImportOptions,
) -> (S, Metrics, Vec<ImportError>) {
    let mut interpreter = Interpreter {
        document,
        scene,
        options: *options,
        context: ImportContext::default(),
        errors: Vec::new(),
    };
    interpreter.run();
    let Interpreter {
        scene,
        context,
        errors,
        ..
    } = interpreter;
    (scene, context.metrics, errors)
}

struct Interpreter<'d, S> {
    document: &'d Document,
    scene: S,
    options: ImportOptions,
    context: ImportContext,
    errors: Vec<ImportError>,
}

impl<'d, S: SceneGraph> Interpreter<'d, S> {
    fn run(&mut self) {
        let document = self.document;
        self.name_resources();
        // Metrics first, so unit scaling does not depend on their position.
        for &id in document.roots() {
            if document.get(id).identifier() == Some(Identifier::Metric) {
                let result = self.visit_metric(id);
                self.record(result);
            }
        }
        for &id in document.roots() {
            self.visit_top_level(id);
        }
        self.finalize();
    }

    /// Give every top-level object and material a distinct resource name.
    /// `$a` and `%a` both want `a`; the later one becomes `a#<index>`.
    fn name_resources(&mut self) {
        let document = self.document;
        let mut taken = HashSet::new();
        for &id in document.roots() {
            let named = matches!(
                document.get(id).identifier(),
                Some(
                    Identifier::GeometryObject
                        | Identifier::CameraObject
                        | Identifier::LightObject
                        | Identifier::Material
                )
            );
            if named {
                let name = context::claim(&mut taken, self.default_resource_name(id), id.0);
                self.context.resource_names.insert(id, name);
            }
        }
    }

    fn record(&mut self, result: Result<(), ImportError>) {
        if let Err(err) = result {
            debug!(error = %err, "structure rejected");
            self.errors.push(err);
        }
    }

    fn visit_top_level(&mut self, id: StructureId) {
        let document = self.document;
        let result = match document.get(id).identifier() {
            Some(Identifier::Metric) => Ok(()),
            Some(identifier) if identifier.is_node() => self.visit_node(id, None).map(|_| ()),
            Some(Identifier::GeometryObject) => self.visit_geometry_object(id),
            Some(Identifier::CameraObject) => self.visit_camera_object(id),
            Some(Identifier::LightObject) => self.visit_light_object(id),
            Some(Identifier::Material) => self.visit_material(id),
            Some(Identifier::Extension) => {
                debug!("skipping top-level Extension");
                Ok(())
            }
            _ => Err(grammar::error(
                document,
                id,
                "unexpected top-level structure".to_string(),
            )),
        };
        self.record(result);
    }

    /// `Metric (key) { float {..} }` or `{ string {..} }`.
    fn visit_metric(&mut self, id: StructureId) -> Result<(), ImportError> {
        const PROPERTIES: &[grammar::PropertySpec] = &[prop("key", PropertyType::String)];
        let document = self.document;
        grammar::check_properties(document, id, PROPERTIES)?;
        grammar::check_substructures(document, id, &[ChildRule::one_data()])?;
        let key = grammar::required_string(document, id, "key")?;
        let metrics = &mut self.context.metrics;
        match key {
            "distance" | "angle" | "time" => {
                let data = grammar::float_data(document, id)?;
                let [value] = data.values.as_slice() else {
                    return Err(grammar::error(
                        document,
                        id,
                        format!("metric '{}' takes one value", key),
                    ));
                };
                if *value <= 0.0 || !value.is_finite() {
                    return Err(grammar::error(
                        document,
                        id,
                        format!("metric '{}' must be positive, found {}", key, value),
                    ));
                }
                match key {
                    "distance" => metrics.distance = *value,
                    "angle" => metrics.angle = *value,
                    _ => metrics.time = *value,
                }
            }
            "up" => {
                let axis = grammar::string_data(document, id)?;
                metrics.up = match axis {
                    "y" | "z" => Axis::parse(axis).unwrap_or(Axis::PositiveZ),
                    _ => {
                        return Err(grammar::error(
                            document,
                            id,
                            format!("up axis must be \"y\" or \"z\", found \"{}\"", axis),
                        ))
                    }
                };
            }
            "forward" => {
                let axis = grammar::string_data(document, id)?;
                metrics.forward = Axis::parse(axis).ok_or_else(|| {
                    grammar::error(document, id, format!("invalid forward axis \"{}\"", axis))
                })?;
            }
            _ => {
                return Err(grammar::error(
                    document,
                    id,
                    format!("unknown metric key \"{}\"", key),
                ))
            }
        }
        Ok(())
    }

    /// Resource name of an object or material structure.
    fn resource_name(&self, id: StructureId) -> String {
        match self.context.resource_names.get(&id) {
            Some(name) => name.clone(),
            None => self.default_resource_name(id),
        }
    }

    fn default_resource_name(&self, id: StructureId) -> String {
        let structure = self.document.get(id);
        match structure.name_text() {
            Some(name) => name.to_string(),
            None => format!("{}{}", structure.keyword(), id.0),
        }
    }

    /// Reserve a prefix for resources owned by `node`: its tag, or
    /// `node<N>` when untagged, suffixed with `#<N>` if already taken.
    fn claim_prefix(&mut self, node: NodeId, tag: &str) {
        let base = if tag.is_empty() {
            format!("node{}", node.0)
        } else {
            tag.to_string()
        };
        let prefix = context::claim(&mut self.context.taken_prefixes, base, node.0);
        self.context.prefixes.insert(node, prefix);
    }

    /// Prefix for resources owned by a node.
    fn node_prefix(&self, node: NodeId) -> String {
        match self.context.prefixes.get(&node) {
            Some(prefix) => prefix.clone(),
            None => format!("node{}", node.0),
        }
    }

    /// Resolve what is still queued and publish deferred resources.
    fn finalize(&mut self) {
        let meshes = std::mem::take(&mut self.context.meshes);
        for built in meshes {
            let mut mesh = built.mesh;
            if let Some(pending) = built.skin {
                match self.resolve_skin(&built.resource, pending) {
                    Ok((skin, skeleton_name, skeleton)) => {
                        self.scene
                            .set_resource(&skeleton_name, Resource::Skeleton(skeleton));
                        mesh.skin = Some(skin);
                    }
                    Err(err) => self.errors.push(err),
                }
            }
            self.scene.set_resource(&built.resource, Resource::Mesh(mesh));
        }

        let unbuilt = std::mem::take(&mut self.context.pending_instances);
        let mut unbuilt: Vec<_> = unbuilt.into_iter().collect();
        unbuilt.sort_by_key(|(object, _)| *object);
        for (object, waiting) in unbuilt {
            let reference = match &self.document.get(object).name {
                Some(name) => name.to_string(),
                None => self.resource_name(object),
            };
            for pending in waiting {
                warn!(node = %pending.tag, object = %reference, "geometry object was never built");
                self.errors.push(ImportError::unresolved(
                    Identifier::GeometryNode.as_str(),
                    reference.clone(),
                ));
            }
        }

        let unbound = std::mem::take(&mut self.context.pending_materials);
        let mut unbound: Vec<_> = unbound.into_iter().collect();
        unbound.sort_by_key(|(material, _)| *material);
        for (material, waiting) in unbound {
            let reference = self.resource_name(material);
            warn!(material = %reference, "material was never built");
            for index in waiting {
                self.context.instances[index].1.material = MaterialBinding::Unbound;
            }
            self.errors.push(ImportError::unresolved(
                Identifier::MaterialRef.as_str(),
                reference,
            ));
        }

        for (name, instance) in std::mem::take(&mut self.context.instances) {
            self.scene.set_resource(&name, Resource::MeshInstance(instance));
        }
    }
}
