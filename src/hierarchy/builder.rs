//! Three-phase tree construction
//!
//! Phase 1 builds the skeleton from records and per-category configuration.
//! Phase 2 re-applies persisted overrides onto the fresh skeleton. Phase 3
//! recomputes externally visible path ids and attaches annotations.

use super::arena::{ClusterNode, NodeKey, NodeType, TreeArena};
use super::bucket::apply_bucket_rules;
use crate::catalog::{Annotation, MaterialRecord, NodeOverride};
use crate::config::{CategoryConfig, HierarchyLevel};
use crate::store::CatalogSnapshot;
use std::collections::HashMap;

/// Parameter values that never become tree levels.
const SKIPPED_VALUES: &[&str] = &["", "nan", "N/A", "Unspecified"];

/// Build the cluster tree for a snapshot, optionally filtered to one
/// sub-category. Pure: identical inputs produce identical trees.
pub fn build_tree(snapshot: &CatalogSnapshot, sub_category: Option<&str>) -> ClusterNode {
    let mut arena = TreeArena::new(format!(
        "Material Clusters - {}",
        sub_category.unwrap_or("All")
    ));

    // Phase 1: skeleton. Configurations are resolved once per sub-category.
    let mut configs: HashMap<String, CategoryConfig> = HashMap::new();
    for record in snapshot
        .records
        .iter()
        .filter(|r| sub_category.map_or(true, |s| r.sub_category == s))
    {
        let config = configs
            .entry(record.sub_category.clone())
            .or_insert_with(|| CategoryConfig::resolve(snapshot.rule_for(&record.sub_category)));
        insert_record(&mut arena, record, config);
    }

    // Phase 2: overrides onto the fresh skeleton.
    apply_overrides(&mut arena, &snapshot.overrides);

    // Phase 3: decoration.
    decorate(&mut arena, &snapshot.annotations);

    arena.to_cluster_node(arena.root())
}

/// Walk one record down its structural and parameter levels, creating or
/// reusing ancestor nodes, and land its leaf.
fn insert_record(arena: &mut TreeArena, record: &MaterialRecord, config: &CategoryConfig) {
    let mut cursor = arena.root();

    for level in &config.hierarchy {
        let (name, local_id, node_type) = match level {
            HierarchyLevel::Region => {
                let name = non_empty_or(&record.region, "Unknown Region");
                (name.clone(), format!("region-{name}"), NodeType::Region)
            }
            HierarchyLevel::Brand => {
                let name = non_empty_or(&record.brand, "Unknown Brand");
                (name.clone(), format!("brand-{name}"), NodeType::Brand)
            }
            HierarchyLevel::Factory => {
                let name = non_empty_or(&record.plant, "Unknown Factory");
                (name.clone(), format!("plant-{name}"), NodeType::Factory)
            }
            HierarchyLevel::Identifier => {
                let value = if record.has_identifier() {
                    record.identifier.clone()
                } else {
                    format!("No {}", config.identifier_name)
                };
                (
                    format!("{}: {}", config.identifier_name, value),
                    format!("{}-{}", config.identifier_name.to_lowercase(), value),
                    NodeType::Identifier,
                )
            }
        };
        cursor = arena.child_or_insert(cursor, &name, &local_id, node_type);
    }

    let parameters = record.parameter_map();
    for parameter in &config.parameter_order {
        let Some(value) = parameters.get(&parameter.trim().to_lowercase()).copied() else {
            continue;
        };
        if SKIPPED_VALUES.contains(&value.trim()) {
            continue;
        }

        if config.is_bucketed(parameter) {
            // Bucketed values get a coarse group node for visual clustering
            // and, when the raw value differs, an exact-value node beneath
            // it for audit.
            let bucket = apply_bucket_rules(value, &config.bucket_rules);
            let group_name = format!("{parameter}: {bucket}");
            cursor = arena.child_or_insert(
                cursor,
                &group_name,
                &format!("grp-{parameter}-{bucket}"),
                NodeType::ClusterGroup,
            );
            let raw_name = format!("{parameter}: {value}");
            if raw_name != group_name {
                cursor = arena.child_or_insert(
                    cursor,
                    &raw_name,
                    &format!("raw-{value}"),
                    NodeType::ClusterParam,
                );
            }
        } else {
            let name = format!("{parameter}: {value}");
            cursor = arena.child_or_insert(
                cursor,
                &name,
                &format!("param-{parameter}-{value}"),
                NodeType::ClusterParam,
            );
        }
    }

    // Leaf: one node per distinct display name; duplicates count up.
    let display = record.display_name();
    match arena.find_child_by_name(cursor, display) {
        Some(existing) => arena.node_mut(existing).count += 1,
        None => {
            let local_id = format!("mat-{}", record.id);
            arena.insert_leaf(cursor, display, &local_id, record.id);
        }
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("nan") {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

/// Re-apply persisted overrides onto the fresh skeleton.
///
/// Moved nodes are located by skeleton id. Targets are located by skeleton
/// id first, then by current (post-move) path id since moves may chain. A
/// target that cannot be found (or that would create a cycle) re-attaches
/// the node at the root rather than dropping it.
fn apply_overrides(arena: &mut TreeArena, overrides: &[NodeOverride]) {
    for ov in overrides {
        let Some(node) = arena.by_skeleton_id(&ov.node_id) else {
            // The node may belong to a filtered-out sub-category.
            tracing::debug!(node = %ov.node_id, "override target absent from this build");
            continue;
        };

        let target = arena
            .by_skeleton_id(&ov.target_parent_id)
            .or_else(|| arena.current_path_ids().get(&ov.target_parent_id).copied());

        arena.detach(node);
        match target {
            Some(parent) if !arena.is_in_subtree(node, parent) => {
                arena.attach(parent, node);
            }
            _ => {
                tracing::warn!(
                    node = %ov.node_id,
                    target = %ov.target_parent_id,
                    "dangling override; attaching node at root"
                );
                let root = arena.root();
                arena.attach(root, node);
            }
        }
    }
}

/// Recompute externally visible path ids and attach annotations.
///
/// Ids are parent-id::local-id, so they stay stable across rebuilds as long
/// as local structure is unchanged. Material leaves are addressed by record
/// id for annotation purposes; structural nodes by their path id.
fn decorate(arena: &mut TreeArena, annotations: &[Annotation]) {
    let mut by_key: HashMap<(&str, &str), Vec<&Annotation>> = HashMap::new();
    for ann in annotations {
        by_key
            .entry((ann.node_type.as_str(), ann.node_identifier.as_str()))
            .or_default()
            .push(ann);
    }

    let root = arena.root();
    let mut stack: Vec<(NodeKey, String)> = vec![(root, "root".to_string())];
    while let Some((key, id)) = stack.pop() {
        let children = arena.node(key).children.clone();

        let node = arena.node_mut(key);
        node.id = id.clone();
        let identifier = match (node.node_type, node.record_id) {
            (NodeType::Material, Some(record_id)) => record_id.to_string(),
            _ => id.clone(),
        };

        if let Some(matched) = by_key.get(&(node.node_type.as_str(), identifier.as_str())) {
            node.annotations = matched.iter().map(|a| (*a).clone()).collect();
            node.has_open_qa = node.annotations.iter().any(Annotation::is_open_qa);
            node.comment = match node.annotations.as_slice() {
                [] => None,
                [single] => Some(single.summary()),
                many => Some(format!("{} annotations", many.len())),
            };
        }

        for child in children {
            let child_id = format!("{}::{}", id, arena.node(child).local_id);
            stack.push((child, child_id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BucketOp, BucketRule, CategoryRule, RecordId};

    fn record(
        id: i64,
        description: &str,
        sub: &str,
        region: &str,
        plant: &str,
        identifier: &str,
    ) -> MaterialRecord {
        MaterialRecord::new(description, sub)
            .with_id(RecordId::new(id))
            .with_region(region)
            .with_plant(plant)
            .with_identifier(identifier)
    }

    fn surfactant_rule() -> CategoryRule {
        CategoryRule::new("Surfactants")
            .with_parameter("Purity")
            .with_bucket(BucketRule::new(BucketOp::Lt { value: 90.0 }, "Low"))
    }

    #[test]
    fn default_hierarchy_is_region_identifier_factory() {
        let snapshot = CatalogSnapshot {
            records: vec![record(1, "Glycerine", "Solvents", "EU", "Lyon", "56-81-5")],
            ..Default::default()
        };
        let tree = build_tree(&snapshot, None);

        let region = &tree.children[0];
        assert_eq!(region.name, "EU");
        let cas = &region.children[0];
        assert_eq!(cas.name, "CAS: 56-81-5");
        let plant = &cas.children[0];
        assert_eq!(plant.name, "Lyon");
        let leaf = &plant.children[0];
        assert_eq!(leaf.name, "Glycerine");
        assert_eq!(leaf.db_id, Some(1));
    }

    #[test]
    fn bucketed_purity_gets_group_and_raw_nodes() {
        let snapshot = CatalogSnapshot {
            records: vec![record(1, "SLES", "Surfactants", "EU", "Lyon", "68585-34-2")
                .with_parameter("Purity", "85%")],
            rules: vec![surfactant_rule()],
            ..Default::default()
        };
        let tree = build_tree(&snapshot, None);

        let group = tree.find_by_name("Purity: Low").expect("bucket group");
        assert_eq!(group.node_type, NodeType::ClusterGroup);
        let raw = group.find_by_name("Purity: 85%").expect("raw value node");
        assert_eq!(raw.node_type, NodeType::ClusterParam);
        assert_eq!(raw.children[0].name, "SLES");
    }

    #[test]
    fn unbucketed_purity_gets_single_node() {
        let snapshot = CatalogSnapshot {
            records: vec![record(1, "SLES", "Surfactants", "EU", "Lyon", "68585-34-2")
                .with_parameter("Purity", "95%")],
            rules: vec![surfactant_rule()],
            ..Default::default()
        };
        let tree = build_tree(&snapshot, None);

        // No rule matched 95%, so the raw value is its own level, no group.
        assert!(tree.find_by_name("Purity: Low").is_none());
        let node = tree.find_by_name("Purity: 95%").expect("raw level");
        assert_eq!(node.children[0].name, "SLES");
    }

    #[test]
    fn skipped_parameter_values_create_no_levels() {
        let snapshot = CatalogSnapshot {
            records: vec![record(1, "SLES", "Surfactants", "EU", "Lyon", "68585-34-2")
                .with_parameter("Purity", "N/A")],
            rules: vec![surfactant_rule()],
            ..Default::default()
        };
        let tree = build_tree(&snapshot, None);
        assert!(tree.find_by_name("Purity: N/A").is_none());
        assert!(tree.find_by_name("SLES").is_some());
    }

    #[test]
    fn identical_leaves_count_up_instead_of_duplicating() {
        let snapshot = CatalogSnapshot {
            records: vec![
                record(1, "Glycerine", "Solvents", "EU", "Lyon", "56-81-5"),
                record(2, "Glycerine", "Solvents", "EU", "Lyon", "56-81-5"),
            ],
            ..Default::default()
        };
        let tree = build_tree(&snapshot, None);
        let leaf = tree.find_by_name("Glycerine").expect("leaf");
        assert_eq!(leaf.count, Some(2));
    }

    #[test]
    fn rebuild_is_idempotent() {
        let snapshot = CatalogSnapshot {
            records: vec![
                record(1, "Glycerine", "Solvents", "EU", "Lyon", "56-81-5"),
                record(2, "SLES", "Surfactants", "US", "Akron", "68585-34-2")
                    .with_parameter("Purity", "85%"),
            ],
            rules: vec![surfactant_rule()],
            overrides: vec![NodeOverride::new(
                "root::region-US",
                "root::region-EU",
            )],
            ..Default::default()
        };

        let a = serde_json::to_value(build_tree(&snapshot, None)).unwrap();
        let b = serde_json::to_value(build_tree(&snapshot, None)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn override_moves_subtree_under_target() {
        let snapshot = CatalogSnapshot {
            records: vec![
                record(1, "Glycerine", "Solvents", "EU", "Lyon", "56-81-5"),
                record(2, "SLES", "Solvents", "US", "Akron", "68585-34-2"),
            ],
            overrides: vec![NodeOverride::new("root::region-US", "root::region-EU")],
            ..Default::default()
        };
        let tree = build_tree(&snapshot, None);

        let eu = tree.find_by_name("EU").expect("EU region");
        let moved = eu.find_by_name("US").expect("US moved under EU");
        // The whole subtree came along and ids were recomputed on the new path.
        assert!(moved.find_by_name("SLES").is_some());
        assert_eq!(moved.id, "root::region-EU::region-US");
    }

    #[test]
    fn chained_override_targets_resolve_by_current_id() {
        let snapshot = CatalogSnapshot {
            records: vec![
                record(1, "Glycerine", "Solvents", "EU", "Lyon", "56-81-5"),
                record(2, "SLES", "Solvents", "US", "Akron", "68585-34-2"),
                record(3, "Citric Acid", "Solvents", "APAC", "Pune", "77-92-9"),
            ],
            overrides: vec![
                NodeOverride::new("root::region-US", "root::region-EU"),
                // Target addressed by the *moved* path of US.
                NodeOverride::new("root::region-APAC", "root::region-EU::region-US"),
            ],
            ..Default::default()
        };
        let tree = build_tree(&snapshot, None);

        let apac = tree.find_by_name("APAC").expect("APAC");
        assert_eq!(apac.id, "root::region-EU::region-US::region-APAC");
    }

    #[test]
    fn dangling_override_falls_back_to_root() {
        let snapshot = CatalogSnapshot {
            records: vec![record(1, "Glycerine", "Solvents", "EU", "Lyon", "56-81-5")],
            overrides: vec![NodeOverride::new(
                "root::region-EU::cas-56-81-5",
                "root::region-GONE",
            )],
            ..Default::default()
        };
        let tree = build_tree(&snapshot, None);

        // The CAS subtree survived, re-attached at the root.
        let cas = tree
            .children
            .iter()
            .find(|c| c.name == "CAS: 56-81-5")
            .expect("node attached at root");
        assert!(cas.find_by_name("Glycerine").is_some());
    }

    #[test]
    fn override_into_own_subtree_falls_back_to_root() {
        let snapshot = CatalogSnapshot {
            records: vec![record(1, "Glycerine", "Solvents", "EU", "Lyon", "56-81-5")],
            overrides: vec![NodeOverride::new(
                "root::region-EU",
                "root::region-EU::cas-56-81-5",
            )],
            ..Default::default()
        };
        let tree = build_tree(&snapshot, None);

        // Cycle-producing target is treated as dangling.
        let eu = tree.children.iter().find(|c| c.name == "EU").expect("EU at root");
        assert!(eu.find_by_name("Glycerine").is_some());
    }

    #[test]
    fn sub_category_filter_limits_records_and_names_root() {
        let snapshot = CatalogSnapshot {
            records: vec![
                record(1, "Glycerine", "Solvents", "EU", "Lyon", "56-81-5"),
                record(2, "SLES", "Surfactants", "US", "Akron", "68585-34-2"),
            ],
            ..Default::default()
        };
        let tree = build_tree(&snapshot, Some("Solvents"));
        assert_eq!(tree.name, "Material Clusters - Solvents");
        assert!(tree.find_by_name("Glycerine").is_some());
        assert!(tree.find_by_name("SLES").is_none());
    }

    #[test]
    fn annotations_attach_by_type_and_identity() {
        let mut qa = Annotation::question("material", "1", "pharma grade?");
        qa.recompute_open();
        let info = Annotation::info("region", "root::region-EU", "dual sourced");

        let snapshot = CatalogSnapshot {
            records: vec![record(1, "Glycerine", "Solvents", "EU", "Lyon", "56-81-5")],
            annotations: vec![qa, info],
            ..Default::default()
        };
        let tree = build_tree(&snapshot, None);

        let leaf = tree.find_by_name("Glycerine").expect("leaf");
        assert_eq!(leaf.annotations.len(), 1);
        assert!(leaf.has_open_qa);
        assert_eq!(leaf.comment.as_deref(), Some("Q: pharma grade?"));

        let eu = tree.find_by_name("EU").expect("region");
        assert_eq!(eu.annotations.len(), 1);
        assert!(!eu.has_open_qa);
        assert_eq!(eu.comment.as_deref(), Some("dual sourced"));
    }
}
