//! Resolved per-category configuration
//!
//! Rules are user-edited and loosely typed; the builder works from a
//! validated [`CategoryConfig`] computed once per sub-category per build,
//! never re-parsed per record.

use crate::catalog::{BucketRule, CategoryRule};

/// A structural level in the cluster hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HierarchyLevel {
    Region,
    Brand,
    Factory,
    Identifier,
}

impl HierarchyLevel {
    /// Parse a user-supplied level name. Case-insensitive; `cas` is an
    /// alias for the identifier level and `plant` for the factory level.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "region" => Some(Self::Region),
            "brand" => Some(Self::Brand),
            "factory" | "plant" => Some(Self::Factory),
            "identifier" | "cas" => Some(Self::Identifier),
            _ => None,
        }
    }
}

/// Default structural ordering when a rule declares none.
pub const DEFAULT_HIERARCHY: [HierarchyLevel; 3] = [
    HierarchyLevel::Region,
    HierarchyLevel::Identifier,
    HierarchyLevel::Factory,
];

/// Default parameter depth when no rule exists for a sub-category.
pub const DEFAULT_PARAMETER_ORDER: [&str; 3] = ["Grade", "Purity", "Color"];

/// Validated configuration driving tree construction for one sub-category.
#[derive(Debug, Clone)]
pub struct CategoryConfig {
    pub identifier_name: String,
    pub parameter_order: Vec<String>,
    pub bucket_rules: Vec<BucketRule>,
    pub hierarchy: Vec<HierarchyLevel>,
}

impl CategoryConfig {
    /// Resolve the effective configuration from an optional rule.
    ///
    /// A present rule owns the parameter order outright (an empty list means
    /// no parameter levels); hierarchy falls back to the default whenever no
    /// declared level survives validation.
    pub fn resolve(rule: Option<&CategoryRule>) -> Self {
        let Some(rule) = rule else {
            return Self::default();
        };

        let mut hierarchy: Vec<HierarchyLevel> = Vec::new();
        for raw in &rule.hierarchy_order {
            match HierarchyLevel::parse(raw) {
                Some(level) => hierarchy.push(level),
                None => tracing::warn!(level = %raw, sub_category = %rule.sub_category,
                    "unknown hierarchy level dropped"),
            }
        }
        if hierarchy.is_empty() {
            hierarchy = DEFAULT_HIERARCHY.to_vec();
        }

        Self {
            identifier_name: rule.identifier_name.clone(),
            parameter_order: rule.parameter_order.clone(),
            bucket_rules: rule.bucket_rules.clone(),
            hierarchy,
        }
    }

    /// Whether a parameter's values are grouped through the bucket rules.
    /// Bucketing applies to purity-type parameters only.
    pub fn is_bucketed(&self, parameter: &str) -> bool {
        !self.bucket_rules.is_empty() && parameter.trim().eq_ignore_ascii_case("purity")
    }
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            identifier_name: "CAS".to_string(),
            parameter_order: DEFAULT_PARAMETER_ORDER
                .iter()
                .map(|p| p.to_string())
                .collect(),
            bucket_rules: Vec::new(),
            hierarchy: DEFAULT_HIERARCHY.to_vec(),
        }
    }
}
