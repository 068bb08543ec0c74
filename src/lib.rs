//! Materia: chemical identity resolution and cluster-tree engine
//!
//! Ingests free-text procurement line items, resolves each to a canonical
//! chemical identity (registry number, descriptive name, parameters), and
//! organizes the resolved records into a navigable, user-editable cluster
//! hierarchy for spend and risk analysis.
//!
//! # Core Concepts
//!
//! - **Resolution**: a multi-stage, fail-soft pipeline over a registry
//!   client, a synonym service and an optional LLM assistant
//! - **Cluster tree**: a pure rebuild from records + per-category rules,
//!   with persisted user overrides re-applied over every fresh skeleton
//! - **Annotations**: notes and Q&A threads attached to nodes by stable id
//!
//! # Example
//!
//! ```
//! use materia::{LlmCapability, MateriaApi, MockRegistry, MockSynonyms, SqliteStore};
//! use std::sync::Arc;
//!
//! let store = Arc::new(SqliteStore::open_in_memory().unwrap());
//! let api = MateriaApi::new(
//!     store,
//!     Arc::new(MockRegistry::new()),
//!     Arc::new(MockSynonyms::new()),
//!     LlmCapability::unavailable(),
//! );
//! let tree = api.cluster_tree(None).unwrap();
//! assert!(tree.children.is_empty());
//! ```

pub mod api;
pub mod catalog;
pub mod config;
pub mod enrich;
pub mod hierarchy;
pub mod inci;
pub mod llm;
pub mod normalize;
pub mod registry;
pub mod resolver;
pub mod store;

pub use api::{ApiError, ApiResult, IngestReport, MateriaApi, RecordEdit};
pub use catalog::{
    Annotation, AnnotationKind, BucketOp, BucketRule, CategoryRule, MaterialRecord, NodeOverride,
    Parameter, RawItem, RecordId, ValidationDocument, ValidationStatus, NOT_AVAILABLE, NOT_FOUND,
};
pub use config::{CategoryConfig, HierarchyLevel};
pub use enrich::{EnrichmentJob, EnrichmentProgress, JobStatus};
pub use hierarchy::{build_tree, ClusterNode, NodeType};
pub use llm::{HttpAssistant, KnownIdentity, LlmAssistant, LlmCapability, MockAssistant};
pub use normalize::normalize;
pub use registry::{
    ChemicalRegistry, CommonChemistryClient, MockRegistry, MockSynonyms, PubChemClient,
    RegistryError, RegistryMatch, SynonymSource,
};
pub use resolver::{IdentityResolver, Resolution};
pub use store::{CatalogSnapshot, CatalogStore, SqliteStore, StoreError, StoreResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
