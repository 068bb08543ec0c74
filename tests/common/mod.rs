//! Common test utilities for materia integration tests
//!
//! Shared builders for an API wired to scripted collaborators and for
//! catalog fixtures.

use materia::{LlmCapability, MateriaApi, MockRegistry, MockSynonyms, RawItem, SqliteStore};
use std::sync::Arc;

/// An API over an in-memory store with the given registry and assistant.
pub fn api_with(registry: MockRegistry, llm: LlmCapability) -> MateriaApi {
    MateriaApi::new(
        Arc::new(SqliteStore::open_in_memory().expect("in-memory store")),
        Arc::new(registry),
        Arc::new(MockSynonyms::new()),
        llm,
    )
}

/// A registry that resolves the usual suspects.
pub fn stocked_registry() -> MockRegistry {
    MockRegistry::new()
        .with_match("GLYCERINE", "56-81-5", &["Glycerin", "GLYCEROL"])
        .with_match(
            "SODIUM LAURYL SULFATE",
            "151-21-3",
            &["SODIUM LAURYL SULFATE"],
        )
        .with_match("CITRIC ACID", "77-92-9", &["CITRIC ACID"])
}

/// One raw row with region/plant structure filled in.
pub fn row(description: &str, sub: &str, region: &str, plant: &str) -> RawItem {
    RawItem::new(description, sub)
        .with_region(region)
        .with_plant(plant)
}
