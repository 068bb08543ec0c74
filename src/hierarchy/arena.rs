//! Tree arena
//!
//! Nodes live in a flat arena addressed by integer keys, with an explicit
//! index from skeleton id to key. Build and override passes mutate the
//! arena through the index; the tree is never searched while it is being
//! restructured.

use crate::catalog::{Annotation, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Arena key of a tree node.
pub type NodeKey = usize;

/// Structural classification of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Root,
    Region,
    Brand,
    Factory,
    Identifier,
    ClusterGroup,
    ClusterParam,
    Material,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Region => "region",
            Self::Brand => "brand",
            Self::Factory => "factory",
            Self::Identifier => "identifier",
            Self::ClusterGroup => "cluster_group",
            Self::ClusterParam => "cluster_param",
            Self::Material => "material",
        }
    }
}

/// A node in the arena.
#[derive(Debug, Clone)]
pub struct TreeNode {
    /// Level-local token, e.g. `region-EU` or `mat-42`.
    pub local_id: String,
    /// Path id assigned at skeleton time; stable key for overrides.
    pub skeleton_id: String,
    /// Externally visible path id, recomputed during decoration.
    pub id: String,
    pub name: String,
    pub node_type: NodeType,
    /// Backing record for material leaves.
    pub record_id: Option<RecordId>,
    /// How many identical leaves collapsed into this node.
    pub count: u32,
    pub children: Vec<NodeKey>,
    pub annotations: Vec<Annotation>,
    pub has_open_qa: bool,
    pub comment: Option<String>,
}

impl TreeNode {
    fn new(name: impl Into<String>, local_id: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            local_id: local_id.into(),
            skeleton_id: String::new(),
            id: String::new(),
            name: name.into(),
            node_type,
            record_id: None,
            count: 1,
            children: Vec::new(),
            annotations: Vec::new(),
            has_open_qa: false,
            comment: None,
        }
    }
}

/// Flat node storage with parent links and a skeleton-id index.
#[derive(Debug)]
pub struct TreeArena {
    nodes: Vec<TreeNode>,
    parents: Vec<Option<NodeKey>>,
    by_skeleton: HashMap<String, NodeKey>,
    root: NodeKey,
}

impl TreeArena {
    /// Create an arena holding only a root node.
    pub fn new(root_name: impl Into<String>) -> Self {
        let mut root = TreeNode::new(root_name, "root", NodeType::Root);
        root.skeleton_id = "root".to_string();
        root.id = "root".to_string();

        let mut by_skeleton = HashMap::new();
        by_skeleton.insert("root".to_string(), 0);

        Self {
            nodes: vec![root],
            parents: vec![None],
            by_skeleton,
            root: 0,
        }
    }

    pub fn root(&self) -> NodeKey {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, key: NodeKey) -> &TreeNode {
        &self.nodes[key]
    }

    pub fn node_mut(&mut self, key: NodeKey) -> &mut TreeNode {
        &mut self.nodes[key]
    }

    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.parents[key]
    }

    /// Exact-name child lookup among a node's current children.
    pub fn find_child_by_name(&self, parent: NodeKey, name: &str) -> Option<NodeKey> {
        self.nodes[parent]
            .children
            .iter()
            .copied()
            .find(|&child| self.nodes[child].name == name)
    }

    /// Find a child by name or insert a fresh node with a skeleton id
    /// derived from the parent's. Returns the child's key.
    pub fn child_or_insert(
        &mut self,
        parent: NodeKey,
        name: &str,
        local_id: &str,
        node_type: NodeType,
    ) -> NodeKey {
        if let Some(existing) = self.find_child_by_name(parent, name) {
            return existing;
        }
        let mut node = TreeNode::new(name, local_id, node_type);
        node.skeleton_id = format!("{}::{}", self.nodes[parent].skeleton_id, local_id);
        node.id = node.skeleton_id.clone();
        self.insert(parent, node)
    }

    /// Insert a leaf node under a parent, assigning its skeleton id.
    pub fn insert_leaf(
        &mut self,
        parent: NodeKey,
        name: &str,
        local_id: &str,
        record_id: RecordId,
    ) -> NodeKey {
        let mut node = TreeNode::new(name, local_id, NodeType::Material);
        node.skeleton_id = format!("{}::{}", self.nodes[parent].skeleton_id, local_id);
        node.id = node.skeleton_id.clone();
        node.record_id = Some(record_id);
        self.insert(parent, node)
    }

    fn insert(&mut self, parent: NodeKey, node: TreeNode) -> NodeKey {
        let key = self.nodes.len();
        self.by_skeleton.insert(node.skeleton_id.clone(), key);
        self.nodes.push(node);
        self.parents.push(Some(parent));
        self.nodes[parent].children.push(key);
        key
    }

    /// Look a node up by its skeleton-assigned path id.
    pub fn by_skeleton_id(&self, skeleton_id: &str) -> Option<NodeKey> {
        self.by_skeleton.get(skeleton_id).copied()
    }

    /// Detach a node from its current parent. The root cannot be detached.
    pub fn detach(&mut self, key: NodeKey) {
        let Some(parent) = self.parents[key] else {
            return;
        };
        self.nodes[parent].children.retain(|&c| c != key);
        self.parents[key] = None;
    }

    /// Attach a detached node under a new parent.
    pub fn attach(&mut self, parent: NodeKey, key: NodeKey) {
        debug_assert!(self.parents[key].is_none(), "attach of a non-detached node");
        self.nodes[parent].children.push(key);
        self.parents[key] = Some(parent);
    }

    /// Whether `candidate` lies inside the subtree rooted at `ancestor`.
    pub fn is_in_subtree(&self, ancestor: NodeKey, candidate: NodeKey) -> bool {
        let mut cursor = Some(candidate);
        while let Some(key) = cursor {
            if key == ancestor {
                return true;
            }
            cursor = self.parents[key];
        }
        false
    }

    /// Current path ids (parent-path::local-id, post-move), keyed to arena
    /// keys. Recomputed on demand; moves invalidate previous results.
    pub fn current_path_ids(&self) -> HashMap<String, NodeKey> {
        let mut ids = HashMap::with_capacity(self.nodes.len());
        let mut stack: Vec<(NodeKey, String)> = vec![(self.root, "root".to_string())];
        while let Some((key, path)) = stack.pop() {
            for &child in &self.nodes[key].children {
                let child_path = format!("{}::{}", path, self.nodes[child].local_id);
                stack.push((child, child_path.clone()));
                ids.insert(child_path, child);
            }
            ids.insert(path, key);
        }
        ids
    }

    /// Project the subtree at `key` into the nested, serializable view.
    pub fn to_cluster_node(&self, key: NodeKey) -> ClusterNode {
        let node = &self.nodes[key];
        ClusterNode {
            id: node.id.clone(),
            local_id: node.local_id.clone(),
            name: node.name.clone(),
            node_type: node.node_type,
            count: (node.node_type == NodeType::Material).then_some(node.count),
            db_id: node.record_id.map(|r| r.as_i64()),
            children: node
                .children
                .iter()
                .map(|&child| self.to_cluster_node(child))
                .collect(),
            annotations: node.annotations.clone(),
            has_open_qa: node.has_open_qa,
            comment: node.comment.clone(),
        }
    }
}

/// Nested tree view returned to consumers. Derived, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterNode {
    pub id: String,
    pub local_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_id: Option<i64>,
    pub children: Vec<ClusterNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub has_open_qa: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ClusterNode {
    /// Depth-first search by externally visible id.
    pub fn find(&self, id: &str) -> Option<&ClusterNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Depth-first search by node name.
    pub fn find_by_name(&self, name: &str) -> Option<&ClusterNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find_by_name(name))
    }

    /// Total node count including this node.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(ClusterNode::size).sum::<usize>()
    }
}
