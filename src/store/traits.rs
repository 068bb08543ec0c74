//! Catalog store trait definitions

use crate::catalog::{Annotation, CategoryRule, MaterialRecord, NodeOverride, RecordId};
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("date parsing error: {0}")]
    DateParse(String),

    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("annotation not found: {0}")]
    AnnotationNotFound(i64),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// An immutable view of the catalog taken at build time.
///
/// The hierarchy builder is a pure function over one of these; it never
/// reads the store directly.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub records: Vec<MaterialRecord>,
    pub rules: Vec<CategoryRule>,
    pub overrides: Vec<NodeOverride>,
    pub annotations: Vec<Annotation>,
}

impl CatalogSnapshot {
    /// The rule for a sub-category, if one exists.
    pub fn rule_for(&self, sub_category: &str) -> Option<&CategoryRule> {
        self.rules.iter().find(|r| r.sub_category == sub_category)
    }
}

/// Persistence boundary for material records, category rules, tree
/// overrides and node annotations.
///
/// Implementations must be thread-safe (Send + Sync). Writers are expected
/// to be serialized per record by the caller; readers may be concurrent.
pub trait CatalogStore: Send + Sync {
    // === Material records ===

    /// Insert a record, returning its assigned id.
    fn insert_material(&self, record: &MaterialRecord) -> StoreResult<RecordId>;

    /// Update a record in place (matched by id).
    fn update_material(&self, record: &MaterialRecord) -> StoreResult<()>;

    /// Load a record by id.
    fn get_material(&self, id: RecordId) -> StoreResult<Option<MaterialRecord>>;

    /// List records, optionally filtered by sub-category, in insertion order.
    fn list_materials(&self, sub_category: Option<&str>) -> StoreResult<Vec<MaterialRecord>>;

    /// Clear the current ingestion session: records and annotations.
    /// Rules and overrides survive re-ingestion by design.
    fn clear_session(&self) -> StoreResult<()>;

    /// Distinct sub-categories present in the catalog, sorted.
    fn distinct_sub_categories(&self) -> StoreResult<Vec<String>>;

    /// Distinct descriptions whose records lack the standardized enriched
    /// format, for background enrichment.
    fn unenriched_descriptions(&self) -> StoreResult<Vec<String>>;

    /// Apply a background-enrichment result to every record sharing the
    /// description. Returns the number of records updated.
    fn apply_enrichment(
        &self,
        description: &str,
        enriched: &str,
        identifier: &str,
        descriptive_name: &str,
    ) -> StoreResult<usize>;

    // === Category rules ===

    /// Create or replace the rule for a sub-category.
    fn upsert_rule(&self, rule: &CategoryRule) -> StoreResult<()>;

    /// Load the rule for a sub-category.
    fn get_rule(&self, sub_category: &str) -> StoreResult<Option<CategoryRule>>;

    /// List all rules, sorted by sub-category.
    fn list_rules(&self) -> StoreResult<Vec<CategoryRule>>;

    /// Delete the rule for a sub-category. Returns whether one existed.
    fn delete_rule(&self, sub_category: &str) -> StoreResult<bool>;

    // === Overrides ===

    /// Create or replace the override for a moved node (latest write wins).
    fn upsert_override(&self, ov: &NodeOverride) -> StoreResult<()>;

    /// List all overrides, sorted by moved node id.
    fn list_overrides(&self) -> StoreResult<Vec<NodeOverride>>;

    /// Delete the override for a moved node. Returns whether one existed.
    fn delete_override(&self, node_id: &str) -> StoreResult<bool>;

    // === Annotations ===

    /// Insert an annotation, returning its assigned id. The open flag is
    /// recomputed on write.
    fn insert_annotation(&self, annotation: &Annotation) -> StoreResult<i64>;

    /// List annotations, optionally filtered by (node type, identifier).
    fn list_annotations(&self, node: Option<(&str, &str)>) -> StoreResult<Vec<Annotation>>;

    /// Set the answer on a Q&A annotation, recomputing the open flag.
    fn answer_annotation(&self, id: i64, answer: Option<&str>) -> StoreResult<Annotation>;

    /// Delete an annotation. Returns whether one existed.
    fn delete_annotation(&self, id: i64) -> StoreResult<bool>;

    // === Snapshot ===

    /// Take the immutable view the hierarchy builder consumes. Records are
    /// filtered by sub-category when given; rules, overrides and
    /// annotations are always complete.
    fn snapshot(&self, sub_category: Option<&str>) -> StoreResult<CatalogSnapshot> {
        Ok(CatalogSnapshot {
            records: self.list_materials(sub_category)?,
            rules: self.list_rules()?,
            overrides: self.list_overrides()?,
            annotations: self.list_annotations(None)?,
        })
    }
}
