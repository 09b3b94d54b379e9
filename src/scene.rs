use crate::math::Matrix4;
use crate::resource::Resource;
use std::collections::BTreeMap;

/// Handle of a node inside a scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

/// The scene-graph surface the importer writes to.
///
/// Implement this to import straight into an engine's own scene; `Scene`
/// is the in-memory implementation.
pub trait SceneGraph {
    fn create_node(&mut self) -> NodeId;
    fn set_local_transform(&mut self, node: NodeId, transform: Matrix4);
    /// Attach a string identifier (the OpenGEX `Name`) to a node.
    fn set_tag(&mut self, node: NodeId, tag: &str);
    fn add_child(&mut self, parent: NodeId, child: NodeId);
    fn get_parent(&self, node: NodeId) -> Option<NodeId>;
    fn set_resource(&mut self, name: &str, resource: Resource);
}

/// A node in the output tree.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub tag: String,
    pub local_transform: Matrix4,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl SceneNode {
    pub fn new() -> Self {
        SceneNode {
            tag: String::new(),
            local_transform: Matrix4::IDENTITY,
            parent: None,
            children: Vec::new(),
        }
    }
}

impl Default for SceneNode {
    fn default() -> Self {
        Self::new()
    }
}

/// In-memory scene: a node arena plus the resource dictionary.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scene {
    nodes: Vec<SceneNode>,
    resources: BTreeMap<String, Resource>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &SceneNode {
        &self.nodes[id.0]
    }

    /// Nodes without a parent, in creation order.
    pub fn roots(&self) -> Vec<NodeId> {
        (0..self.nodes.len())
            .map(NodeId)
            .filter(|&id| self.nodes[id.0].parent.is_none())
            .collect()
    }

    /// First node carrying `tag`.
    pub fn find_node(&self, tag: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.tag == tag).map(NodeId)
    }

    /// Product of local transforms from the root down to `id`.
    pub fn world_transform(&self, id: NodeId) -> Matrix4 {
        let node = self.node(id);
        match node.parent {
            Some(parent) => self.world_transform(parent) * node.local_transform,
            None => node.local_transform,
        }
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.get(name)
    }

    pub fn resources(&self) -> &BTreeMap<String, Resource> {
        &self.resources
    }
}

impl SceneGraph for Scene {
    fn create_node(&mut self) -> NodeId {
        self.nodes.push(SceneNode::new());
        NodeId(self.nodes.len() - 1)
    }

    fn set_local_transform(&mut self, node: NodeId, transform: Matrix4) {
        self.nodes[node.0].local_transform = transform;
    }

    fn set_tag(&mut self, node: NodeId, tag: &str) {
        self.nodes[node.0].tag = tag.to_string();
    }

    fn add_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(old) = self.nodes[child.0].parent.replace(parent) {
            self.nodes[old.0].children.retain(|&c| c != child);
        }
        self.nodes[parent.0].children.push(child);
    }

    fn get_parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    fn set_resource(&mut self, name: &str, resource: Resource) {
        self.resources.insert(name.to_string(), resource);
    }
}
