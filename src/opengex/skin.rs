//! `Skin` and `Skeleton`: read while building the mesh, resolved against
//! the scene once every bone node has been created.

use super::context::PendingSkin;
use super::grammar::{self, ChildRule};
use super::transform;
use super::Interpreter;
use crate::ast::{Document, StructureId};
use crate::error::ImportError;
use crate::identifier::Identifier;
use crate::math::Matrix4;
use crate::resource::{Bone, Skeleton, Skin, UNUSED_BONE};
use crate::scene::{NodeId, SceneGraph};
use std::collections::HashMap;

const SKIN_CHILDREN: &[ChildRule] = &[
    ChildRule::at_most_one(Identifier::Transform),
    ChildRule::one(Identifier::Skeleton),
    ChildRule::one(Identifier::BoneCountArray),
    ChildRule::one(Identifier::BoneIndexArray),
    ChildRule::one(Identifier::BoneWeightArray),
];

const SKELETON_CHILDREN: &[ChildRule] = &[
    ChildRule::one(Identifier::BoneRefArray),
    ChildRule::one(Identifier::Transform),
];

impl<S: SceneGraph> Interpreter<'_, S> {
    /// Validate a `Skin` against a mesh of `vertex_count` vertices.
    pub(super) fn read_skin(
        &self,
        id: StructureId,
        vertex_count: usize,
    ) -> Result<PendingSkin, ImportError> {
        let document = self.document;
        let metrics = &self.context.metrics;
        grammar::check_properties(document, id, &[])?;
        grammar::check_substructures(document, id, SKIN_CHILDREN)?;

        let bind_shape = match document.children_of(id, Identifier::Transform).next() {
            Some(t) => transform::read_transform(document, t)?.single_matrix(document, t, metrics)?,
            None => Matrix4::IDENTITY,
        };

        let skeleton = first_child(document, id, Identifier::Skeleton)?;
        grammar::check_properties(document, skeleton, &[])?;
        grammar::check_substructures(document, skeleton, SKELETON_CHILDREN)?;

        let bone_refs = first_child(document, skeleton, Identifier::BoneRefArray)?;
        grammar::check_properties(document, bone_refs, &[])?;
        grammar::check_substructures(document, bone_refs, &[ChildRule::one_data()])?;
        let (references, scope) = grammar::reference_data(document, bone_refs)?;
        let mut bones = Vec::with_capacity(references.len());
        for reference in references {
            let bone = document.resolve(reference, scope).ok_or_else(|| {
                ImportError::unresolved(Identifier::BoneRefArray.as_str(), reference.to_string())
            })?;
            if !document.get(bone).identifier().is_some_and(Identifier::is_node) {
                return Err(grammar::error(
                    document,
                    bone_refs,
                    format!("{} does not refer to a node", reference),
                ));
            }
            bones.push(bone);
        }

        let poses = first_child(document, skeleton, Identifier::Transform)?;
        let bind_poses = transform::read_matrices(document, poses, metrics)?;
        if bind_poses.len() != bones.len() {
            return Err(grammar::error(
                document,
                skeleton,
                format!(
                    "{} bind pose matrices for {} bones",
                    bind_poses.len(),
                    bones.len()
                ),
            ));
        }

        let count_array = first_child(document, id, Identifier::BoneCountArray)?;
        let counts = unsigned_array(document, count_array)?;
        if counts.len() != vertex_count {
            return Err(grammar::error(
                document,
                count_array,
                format!(
                    "{} bone counts for {} vertices",
                    counts.len(),
                    vertex_count
                ),
            ));
        }
        let mut total: usize = 0;
        let mut influences = Vec::with_capacity(counts.len());
        for count in counts {
            let count = usize::try_from(count)
                .ok()
                .filter(|&count| count <= bones.len())
                .ok_or_else(|| {
                    grammar::error(
                        document,
                        count_array,
                        format!("bone count {} exceeds {} bones", count, bones.len()),
                    )
                })?;
            total = total.checked_add(count).ok_or_else(|| {
                grammar::error(document, count_array, "bone counts overflow".to_string())
            })?;
            influences.push(count);
        }
        let counts = influences;

        let index_array = first_child(document, id, Identifier::BoneIndexArray)?;
        let raw_indices = unsigned_array(document, index_array)?;
        if raw_indices.len() != total {
            return Err(grammar::error(
                document,
                index_array,
                format!("expected {} bone indices, found {}", total, raw_indices.len()),
            ));
        }
        let mut indices = Vec::with_capacity(total);
        for index in raw_indices {
            if index >= bones.len() as u64 {
                return Err(grammar::error(
                    document,
                    index_array,
                    format!("bone index {} out of range for {} bones", index, bones.len()),
                ));
            }
            indices.push(index as u32);
        }

        let weight_array = first_child(document, id, Identifier::BoneWeightArray)?;
        grammar::check_properties(document, weight_array, &[])?;
        grammar::check_substructures(document, weight_array, &[ChildRule::one_data()])?;
        let weights = grammar::float_data(document, weight_array)?.values;
        if weights.len() != total {
            return Err(grammar::error(
                document,
                weight_array,
                format!("expected {} bone weights, found {}", total, weights.len()),
            ));
        }

        Ok(PendingSkin {
            skin: id,
            bind_shape,
            bones,
            bind_poses,
            counts,
            indices,
            weights,
        })
    }

    /// Map bone structures to scene nodes and pad influences per vertex.
    pub(super) fn resolve_skin(
        &self,
        mesh: &str,
        pending: PendingSkin,
    ) -> Result<(Skin, String, Skeleton), ImportError> {
        let document = self.document;
        let mut nodes = Vec::with_capacity(pending.bones.len());
        for &bone in &pending.bones {
            let node = self.context.nodes.get(&bone).copied().ok_or_else(|| {
                let reference = document
                    .get(bone)
                    .name
                    .as_ref()
                    .map_or_else(|| document.get(bone).keyword().to_string(), |n| n.to_string());
                ImportError::unresolved(Identifier::BoneRefArray.as_str(), reference)
            })?;
            nodes.push(node);
        }
        let bone_of: HashMap<NodeId, usize> = nodes.iter().enumerate().map(|(i, &n)| (n, i)).collect();

        let mut bones = Vec::with_capacity(nodes.len());
        for (&node, &bind_pose) in nodes.iter().zip(&pending.bind_poses) {
            let name = self.context.tags.get(&node).cloned().unwrap_or_default();
            let inverse_bind_pose = bind_pose.inverse().ok_or_else(|| {
                grammar::error(
                    document,
                    pending.skin,
                    format!("bind pose of bone '{}' is not invertible", name),
                )
            })?;
            bones.push(Bone {
                name,
                node,
                parent: self
                    .scene
                    .get_parent(node)
                    .and_then(|parent| bone_of.get(&parent).copied()),
                bind_pose,
                inverse_bind_pose,
            });
        }

        let max = pending.counts.iter().copied().max().unwrap_or(0);
        let mut bone_indices = Vec::with_capacity(pending.counts.len() * max);
        let mut bone_weights = Vec::with_capacity(pending.counts.len() * max);
        let mut next = 0;
        for &count in &pending.counts {
            bone_indices.extend_from_slice(&pending.indices[next..next + count]);
            bone_weights.extend_from_slice(&pending.weights[next..next + count]);
            bone_indices.extend(std::iter::repeat(UNUSED_BONE).take(max - count));
            bone_weights.extend(std::iter::repeat(0.0).take(max - count));
            next += count;
        }

        let skeleton_name = format!("{}/skeleton", mesh);
        let skin = Skin::new(
            pending.bind_shape,
            max,
            bone_indices,
            bone_weights,
            skeleton_name.clone(),
        );
        Ok((skin, skeleton_name, Skeleton::new(bones)))
    }
}

fn first_child(
    document: &Document,
    id: StructureId,
    identifier: Identifier,
) -> Result<StructureId, ImportError> {
    document.children_of(id, identifier).next().ok_or_else(|| {
        grammar::error(
            document,
            id,
            format!("missing required substructure '{}'", identifier),
        )
    })
}

/// `BoneCountArray`/`BoneIndexArray` content.
fn unsigned_array(document: &Document, id: StructureId) -> Result<Vec<u64>, ImportError> {
    grammar::check_properties(document, id, &[])?;
    grammar::check_substructures(document, id, &[ChildRule::one_data()])?;
    Ok(grammar::unsigned_data(document, id)?.0)
}
