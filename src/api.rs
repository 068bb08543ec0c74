//! Transport-independent API layer.
//!
//! `MateriaApi` is the single entry point for all consumer-facing
//! operations. Transports (HTTP handlers, the CLI, direct embedding) call
//! these methods; they never reach into the store, resolver or builder
//! directly.

use crate::catalog::{
    Annotation, CategoryRule, MaterialRecord, NodeOverride, Parameter, RawItem, RecordId,
    ValidationDocument, ValidationStatus,
};
use crate::enrich::{EnrichmentJob, EnrichmentProgress};
use crate::hierarchy::{build_tree, ClusterNode};
use crate::llm::LlmCapability;
use crate::registry::{ChemicalRegistry, SynonymSource};
use crate::resolver::{material_token, IdentityResolver};
use crate::store::{CatalogStore, StoreError};
use chrono::Utc;
use dashmap::DashMap;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by API operations
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("assistant not configured")]
    LlmUnavailable,

    #[error("document does not confirm identifier {0}")]
    DocumentRejected(String),

    #[error("an enrichment job is already running")]
    EnrichmentAlreadyRunning,
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Per-ingestion summary.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub session: String,
    pub rows: usize,
    /// Rows that ended with a real identifier.
    pub resolved: usize,
    /// Records written (rows fan out per brand).
    pub records: usize,
}

/// Manual edit of a record's user-editable fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordEdit {
    pub description: Option<String>,
    pub enriched_description: Option<String>,
    pub identifier: Option<String>,
    pub descriptive_name: Option<String>,
    pub synonyms: Option<String>,
}

/// Confidence assigned by successful validation.
const VALIDATED_CONFIDENCE: u8 = 100;

/// Single entry point for all consumer-facing operations.
pub struct MateriaApi {
    store: Arc<dyn CatalogStore>,
    resolver: IdentityResolver,
    llm: LlmCapability,
    jobs: DashMap<Uuid, EnrichmentJob>,
    latest_job: Mutex<Option<Uuid>>,
}

impl MateriaApi {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        registry: Arc<dyn ChemicalRegistry>,
        synonyms: Arc<dyn SynonymSource>,
        llm: LlmCapability,
    ) -> Self {
        let resolver = IdentityResolver::new(registry, synonyms, llm.clone());
        Self {
            store,
            resolver,
            llm,
            jobs: DashMap::new(),
            latest_job: Mutex::new(None),
        }
    }

    // --- Ingestion ---

    /// Resolve and persist a batch of raw rows as a fresh session.
    ///
    /// The previous session's records and annotations are cleared first
    /// (rules and overrides survive). Rows are resolved strictly
    /// sequentially; the registry client owns the rate-limit spacing.
    pub async fn ingest(&self, session: &str, rows: &[RawItem]) -> ApiResult<IngestReport> {
        self.store.clear_session()?;

        let mut resolved = 0;
        let mut records = 0;
        for (index, row) in rows.iter().enumerate() {
            let rule = self.store.get_rule(&row.sub_category)?;
            let resolution = self
                .resolver
                .resolve(&row.description, &row.sub_category, rule.as_ref())
                .await;
            if resolution.found() {
                resolved += 1;
            }

            for brand in row.fan_out_brands() {
                let mut record = MaterialRecord::new(&row.description, &row.sub_category);
                record.session = session.to_string();
                record.row_number = (index + 1) as u32;
                record.commodity = row.commodity.clone();
                record.brand = brand;
                record.item_code = row.item_code.clone();
                record.plant = row.plant.clone();
                record.region = row.region.clone();
                record.enriched_description = resolution.enriched_description.clone();
                record.final_search_term = resolution.final_search_term.clone();
                record.identifier = resolution.identifier.clone();
                record.descriptive_name = resolution.descriptive_name.clone();
                record.synonyms = resolution.synonyms.clone();
                record.confidence = resolution.confidence;
                record.quantity = row.quantity.unwrap_or(0.0);
                record.spend_value = row.spend_value.unwrap_or(0.0);
                // Rule-extracted parameters first, then raw columns the
                // extraction did not cover.
                record.parameters = resolution.parameters.clone();
                for (name, value) in &row.parameters {
                    if !record.parameters.iter().any(|p| &p.name == name) {
                        record.parameters.push(Parameter::new(name, value));
                    }
                }

                let id = self.store.insert_material(&record)?;
                tracing::debug!(record = %id, row = index + 1, "record persisted");
                records += 1;
            }
        }

        tracing::info!(session = %session, rows = rows.len(), resolved, records,
            "ingestion complete");
        Ok(IngestReport {
            session: session.to_string(),
            rows: rows.len(),
            resolved,
            records,
        })
    }

    // --- Tree ---

    /// Build the cluster tree, optionally filtered to one sub-category.
    pub fn cluster_tree(&self, sub_category: Option<&str>) -> ApiResult<ClusterNode> {
        let snapshot = self.store.snapshot(sub_category)?;
        Ok(build_tree(&snapshot, sub_category))
    }

    /// Persist a relocation of a tree node under a new parent. Applied on
    /// every subsequent rebuild; latest write per node wins.
    pub fn move_node(&self, node_id: &str, target_parent_id: &str) -> ApiResult<()> {
        self.store
            .upsert_override(&NodeOverride::new(node_id, target_parent_id))?;
        Ok(())
    }

    /// Drop the override for a node, letting the skeleton place it again.
    pub fn reset_node(&self, node_id: &str) -> ApiResult<bool> {
        Ok(self.store.delete_override(node_id)?)
    }

    // --- Records ---

    pub fn records(&self) -> ApiResult<Vec<MaterialRecord>> {
        Ok(self.store.list_materials(None)?)
    }

    pub fn record(&self, id: RecordId) -> ApiResult<MaterialRecord> {
        self.store
            .get_material(id)?
            .ok_or(ApiError::RecordNotFound(id))
    }

    pub fn sub_categories(&self) -> ApiResult<Vec<String>> {
        Ok(self.store.distinct_sub_categories()?)
    }

    /// Apply a manual edit to a record's user-editable fields.
    pub fn update_record(&self, id: RecordId, edit: RecordEdit) -> ApiResult<MaterialRecord> {
        let mut record = self.record(id)?;
        if let Some(description) = edit.description {
            record.description = description;
        }
        if let Some(enriched) = edit.enriched_description {
            record.enriched_description = enriched;
        }
        if let Some(identifier) = edit.identifier {
            record.identifier = identifier;
        }
        if let Some(name) = edit.descriptive_name {
            record.descriptive_name = name;
        }
        if let Some(synonyms) = edit.synonyms {
            record.synonyms = synonyms;
        }
        self.store.update_material(&record)?;
        Ok(record)
    }

    // --- Rules ---

    pub fn set_rule(&self, rule: &CategoryRule) -> ApiResult<()> {
        self.store.upsert_rule(rule)?;
        Ok(())
    }

    pub fn rules(&self) -> ApiResult<Vec<CategoryRule>> {
        Ok(self.store.list_rules()?)
    }

    pub fn delete_rule(&self, sub_category: &str) -> ApiResult<bool> {
        Ok(self.store.delete_rule(sub_category)?)
    }

    // --- Annotations ---

    pub fn annotate(&self, annotation: Annotation) -> ApiResult<Annotation> {
        let id = self.store.insert_annotation(&annotation)?;
        let mut stored = annotation;
        stored.id = id;
        stored.recompute_open();
        Ok(stored)
    }

    pub fn annotations(&self, node: Option<(&str, &str)>) -> ApiResult<Vec<Annotation>> {
        Ok(self.store.list_annotations(node)?)
    }

    pub fn answer_annotation(&self, id: i64, answer: Option<&str>) -> ApiResult<Annotation> {
        Ok(self.store.answer_annotation(id, answer)?)
    }

    pub fn delete_annotation(&self, id: i64) -> ApiResult<bool> {
        Ok(self.store.delete_annotation(id)?)
    }

    // --- Validation ---

    /// Mark a record validated without documentation.
    pub fn validate_manual(&self, id: RecordId) -> ApiResult<MaterialRecord> {
        let mut record = self.record(id)?;
        record.confidence = VALIDATED_CONFIDENCE;
        record.validation_status = ValidationStatus::ValidatedManual;
        self.store.update_material(&record)?;
        Ok(record)
    }

    /// Validate a record against extracted document text (an MSDS or CoA).
    ///
    /// The assistant must confirm the record's identifier in the text;
    /// rejection leaves the record untouched. On success, rule parameters
    /// are re-extracted from the document, the enriched description is
    /// regenerated, and the document reference is attached.
    pub async fn validate_with_document(
        &self,
        id: RecordId,
        text: &str,
        doc_type: &str,
        filename: &str,
        path: &str,
    ) -> ApiResult<MaterialRecord> {
        let mut record = self.record(id)?;
        let Some(assistant) = self.llm.get() else {
            return Err(ApiError::LlmUnavailable);
        };

        if !assistant.verify_identifier(text, &record.identifier).await {
            return Err(ApiError::DocumentRejected(record.identifier));
        }

        if let Some(rule) = self.store.get_rule(&record.sub_category)? {
            if let Some(extracted) = assistant
                .extract_parameters(text, &rule.identifier_name, &rule.parameter_order)
                .await
            {
                if let Some(identifier) = extracted.get(&rule.identifier_name) {
                    record.identifier = identifier.clone();
                }
                for name in &rule.parameter_order {
                    let Some(value) = extracted.get(name) else {
                        continue;
                    };
                    match record.parameters.iter_mut().find(|p| &p.name == name) {
                        Some(parameter) => parameter.value = value.clone(),
                        None => record.parameters.push(Parameter::new(name, value)),
                    }
                }

                // Regenerate the name of record from the document findings.
                let mut parts = vec![material_token(&record.description)];
                if record.has_identifier() {
                    parts.push(rule.identifier_name.to_lowercase());
                    parts.push(record.clean_identifier().to_string());
                }
                for name in &rule.parameter_order {
                    if let Some(parameter) = record.parameters.iter().find(|p| &p.name == name) {
                        parts.push(name.to_lowercase());
                        parts.push(parameter.value.clone());
                    }
                }
                record.enriched_description = parts.join("_");
            }
        }

        record.validation_documents.push(ValidationDocument {
            doc_type: doc_type.to_string(),
            filename: filename.to_string(),
            path: path.to_string(),
            uploaded_at: Utc::now(),
        });
        record.confidence = VALIDATED_CONFIDENCE;
        record.validation_status =
            ValidationStatus::ValidatedDocuments(record.validation_documents.len() as u32);

        self.store.update_material(&record)?;
        tracing::info!(record = %id, identifier = %record.identifier, "record validated");
        Ok(record)
    }

    // --- Background enrichment ---

    /// Start a background enrichment pass over every description lacking
    /// the standardized enriched format. One job at a time.
    pub fn start_enrichment(&self) -> ApiResult<Uuid> {
        {
            let latest = self.latest_job.lock().unwrap();
            if let Some(id) = *latest {
                if let Some(job) = self.jobs.get(&id) {
                    if !job.is_finished() {
                        return Err(ApiError::EnrichmentAlreadyRunning);
                    }
                }
            }
        }

        let descriptions = self.store.unenriched_descriptions()?;
        tracing::info!(count = descriptions.len(), "starting background enrichment");
        let job = EnrichmentJob::spawn(Arc::clone(&self.store), self.llm.clone(), descriptions);
        let id = job.id();
        self.jobs.insert(id, job);
        *self.latest_job.lock().unwrap() = Some(id);
        Ok(id)
    }

    /// Progress of the most recent enrichment job; Idle when none ran.
    pub fn enrichment_status(&self) -> EnrichmentProgress {
        let latest = self.latest_job.lock().unwrap();
        latest
            .and_then(|id| self.jobs.get(&id).map(|job| job.snapshot()))
            .unwrap_or_default()
    }

    /// Progress of a specific enrichment job.
    pub fn enrichment_job(&self, id: Uuid) -> Option<EnrichmentProgress> {
        self.jobs.get(&id).map(|job| job.snapshot())
    }
}
