//! Persisted tree-placement overrides

use serde::{Deserialize, Serialize};

/// A user correction relocating one tree node under a different parent
/// than the one computed from raw data.
///
/// Unique per moved node (latest write wins); survives rebuilds because the
/// builder re-applies the full override set over every fresh skeleton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeOverride {
    /// Skeleton id of the node being moved.
    pub node_id: String,
    /// Skeleton or current path id of the new parent.
    pub target_parent_id: String,
}

impl NodeOverride {
    pub fn new(node_id: impl Into<String>, target_parent_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            target_parent_id: target_parent_id.into(),
        }
    }
}
