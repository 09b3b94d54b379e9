//! `Node`, `BoneNode`, `GeometryNode`, `CameraNode` and `LightNode`.

use super::context::PendingInstance;
use super::grammar::{self, prop, ChildKind, ChildRule, PropertySpec, PropertyType};
use super::transform;
use super::Interpreter;
use crate::ast::StructureId;
use crate::error::ImportError;
use crate::identifier::Identifier;
use crate::math::Matrix4;
use crate::resource::{ObjectInstance, Resource};
use crate::scene::{NodeId, SceneGraph};
use std::collections::BTreeMap;
use tracing::debug;

const GEOMETRY_NODE_PROPERTIES: &[PropertySpec] = &[
    prop("visible", PropertyType::Bool),
    prop("shadow", PropertyType::Bool),
    prop("motion_blur", PropertyType::Bool),
];

const LIGHT_NODE_PROPERTIES: &[PropertySpec] = &[prop("shadow", PropertyType::Bool)];

const NODE_CHILDREN: &[ChildRule] = &[
    ChildRule::at_most_one(Identifier::Name),
    ChildRule::kind(ChildKind::AnyTransform),
    ChildRule::any(Identifier::Animation),
    ChildRule::kind(ChildKind::AnyNode),
    ChildRule::any(Identifier::Extension),
];

const GEOMETRY_NODE_CHILDREN: &[ChildRule] = &[
    ChildRule::at_most_one(Identifier::Name),
    ChildRule::kind(ChildKind::AnyTransform),
    ChildRule::any(Identifier::Animation),
    ChildRule::kind(ChildKind::AnyNode),
    ChildRule::any(Identifier::Extension),
    ChildRule::one(Identifier::ObjectRef),
    ChildRule::any(Identifier::MaterialRef),
    ChildRule::any(Identifier::MorphWeight),
];

const OBJECT_NODE_CHILDREN: &[ChildRule] = &[
    ChildRule::at_most_one(Identifier::Name),
    ChildRule::kind(ChildKind::AnyTransform),
    ChildRule::any(Identifier::Animation),
    ChildRule::kind(ChildKind::AnyNode),
    ChildRule::any(Identifier::Extension),
    ChildRule::one(Identifier::ObjectRef),
];

impl<S: SceneGraph> Interpreter<'_, S> {
    /// Create the scene node for `id` under `parent`, then its subtree.
    pub(super) fn visit_node(
        &mut self,
        id: StructureId,
        parent: Option<NodeId>,
    ) -> Result<NodeId, ImportError> {
        let document = self.document;
        let identifier = document.get(id).identifier();
        let (properties, children): (&[PropertySpec], &[ChildRule]) = match identifier {
            Some(Identifier::GeometryNode) => (GEOMETRY_NODE_PROPERTIES, GEOMETRY_NODE_CHILDREN),
            Some(Identifier::CameraNode) => (&[][..], OBJECT_NODE_CHILDREN),
            Some(Identifier::LightNode) => (LIGHT_NODE_PROPERTIES, OBJECT_NODE_CHILDREN),
            _ => (&[][..], NODE_CHILDREN),
        };
        grammar::check_properties(document, id, properties)?;
        grammar::check_substructures(document, id, children)?;

        let tag = match grammar::name_child(document, id) {
            Ok(Some(name)) => name.to_string(),
            Ok(None) => document.get(id).name_text().unwrap_or_default().to_string(),
            Err(err) => {
                self.errors.push(err);
                document.get(id).name_text().unwrap_or_default().to_string()
            }
        };

        let (local, object) = self.node_transforms(id);

        let node = self.scene.create_node();
        self.scene.set_tag(node, &tag);
        self.scene.set_local_transform(node, local);
        if let Some(parent) = parent {
            self.scene.add_child(parent, node);
        }
        self.context.nodes.insert(id, node);
        self.claim_prefix(node, &tag);
        self.context.tags.insert(node, tag);

        let bound = match identifier {
            Some(Identifier::GeometryNode) => self.bind_geometry(id, node, object),
            Some(Identifier::CameraNode) => self.bind_object(id, node, Identifier::CameraObject),
            Some(Identifier::LightNode) => self.bind_object(id, node, Identifier::LightObject),
            _ => Ok(()),
        };
        self.record(bound);

        for &child in document.get(id).children() {
            match document.get(child).identifier() {
                Some(Identifier::Animation) if self.options.process_animations => {
                    let result = self.visit_animation(id, node, child);
                    self.record(result);
                }
                Some(Identifier::Animation) => debug!("animations disabled, skipping Animation"),
                Some(Identifier::MorphWeight) => debug!("skipping MorphWeight"),
                Some(Identifier::Extension) => debug!("skipping Extension"),
                _ => {}
            }
        }

        for &child in document.get(id).children() {
            if document.get(child).identifier().is_some_and(Identifier::is_node) {
                if let Err(err) = self.visit_node(child, Some(node)) {
                    self.errors.push(err);
                }
            }
        }

        Ok(node)
    }

    /// Compose the node's transforms in order: those flagged `object`
    /// apply to its geometry only.
    fn node_transforms(&mut self, id: StructureId) -> (Matrix4, Matrix4) {
        let document = self.document;
        let mut local = Matrix4::IDENTITY;
        let mut object = Matrix4::IDENTITY;
        for &child in document.get(id).children() {
            if !document.get(child).identifier().is_some_and(Identifier::is_transform) {
                continue;
            }
            let matrix = transform::read_transform(document, child).and_then(|t| {
                t.single_matrix(document, child, &self.context.metrics)
                    .map(|m| (m, t.object))
            });
            match matrix {
                Ok((m, true)) => object = object * m,
                Ok((m, false)) => local = local * m,
                Err(err) => self.errors.push(err),
            }
        }
        (local, object)
    }

    /// Resolve the node's single `ObjectRef` and check the target's kind.
    fn object_ref(&self, id: StructureId, expected: Identifier) -> Result<StructureId, ImportError> {
        let document = self.document;
        let object_ref = document
            .children_of(id, Identifier::ObjectRef)
            .next()
            .ok_or_else(|| grammar::error(document, id, "missing ObjectRef".to_string()))?;
        grammar::check_properties(document, object_ref, &[])?;
        grammar::check_substructures(document, object_ref, &[ChildRule::one_data()])?;
        let target = grammar::single_reference(document, object_ref)?;
        if document.get(target).identifier() != Some(expected) {
            return Err(grammar::error(
                document,
                id,
                format!(
                    "ObjectRef must refer to a {}, found {}",
                    expected,
                    document.get(target).keyword()
                ),
            ));
        }
        Ok(target)
    }

    fn bind_geometry(
        &mut self,
        id: StructureId,
        node: NodeId,
        object_transform: Matrix4,
    ) -> Result<(), ImportError> {
        let document = self.document;
        let object = self.object_ref(id, Identifier::GeometryObject)?;

        let mut materials = BTreeMap::new();
        for material_ref in document.children_of(id, Identifier::MaterialRef) {
            match self.material_ref(material_ref) {
                Ok((index, target)) => {
                    if materials.insert(index, target).is_some() {
                        self.errors.push(grammar::error(
                            document,
                            id,
                            format!("duplicate MaterialRef index {}", index),
                        ));
                    }
                }
                Err(err) => self.errors.push(err),
            }
        }

        let pending = PendingInstance {
            node,
            tag: self.node_prefix(node),
            materials,
            object_transform,
            visible: document.get(id).property("visible").and_then(|v| v.as_bool()),
            cast_shadows: document.get(id).property("shadow").and_then(|v| v.as_bool()),
        };
        self.request_instances(object, pending);
        Ok(())
    }

    /// `MaterialRef (index) { ref {$material} }`
    fn material_ref(&self, id: StructureId) -> Result<(u32, StructureId), ImportError> {
        const PROPERTIES: &[PropertySpec] = &[prop("index", PropertyType::Unsigned)];
        let document = self.document;
        grammar::check_properties(document, id, PROPERTIES)?;
        grammar::check_substructures(document, id, &[ChildRule::one_data()])?;
        let index = grammar::unsigned_property(document, id, "index").unwrap_or(0);
        let index = u32::try_from(index)
            .map_err(|_| grammar::error(document, id, format!("index {} out of range", index)))?;
        let target = grammar::single_reference(document, id)?;
        if document.get(target).identifier() != Some(Identifier::Material) {
            return Err(grammar::error(
                document,
                id,
                format!(
                    "MaterialRef must refer to a Material, found {}",
                    document.get(target).keyword()
                ),
            ));
        }
        Ok((index, target))
    }

    /// Place a camera or light object at `node`.
    fn bind_object(
        &mut self,
        id: StructureId,
        node: NodeId,
        expected: Identifier,
    ) -> Result<(), ImportError> {
        let object = self.object_ref(id, expected)?;
        let instance = ObjectInstance {
            node,
            object: self.resource_name(object),
        };
        let prefix = self.node_prefix(node);
        let (name, resource) = if expected == Identifier::CameraObject {
            (format!("{}/camera", prefix), Resource::CameraInstance(instance))
        } else {
            (format!("{}/light", prefix), Resource::LightInstance(instance))
        };
        self.scene.set_resource(&name, resource);
        Ok(())
    }
}
