//! Cluster hierarchy engine
//!
//! A pure function of the catalog snapshot: skeleton construction from
//! per-category configuration, persisted override application, then
//! decoration with stable path ids and annotations. Rebuilding from
//! identical inputs yields an identical tree.

mod arena;
mod bucket;
mod builder;

pub use arena::{ClusterNode, NodeKey, NodeType, TreeArena, TreeNode};
pub use bucket::{apply_bucket_rules, numeric_prefix};
pub use builder::build_tree;
