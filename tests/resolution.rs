//! End-to-end resolution pipeline tests
//!
//! Exercises the full ingest path through `MateriaApi` with scripted
//! collaborators: normalization-driven registry trials, LLM fallback,
//! descriptive-name extraction and degradation without an assistant.

mod common;

use common::{api_with, row, stocked_registry};
use materia::{
    CategoryRule, LlmCapability, MockAssistant, MockRegistry, NOT_AVAILABLE, NOT_FOUND,
};

#[tokio::test]
async fn noisy_description_resolves_through_normalization() {
    // The registry only knows the clean term; grade and concentration noise
    // must be stripped before the trial that hits.
    let api = api_with(stocked_registry(), LlmCapability::unavailable());

    let report = api
        .ingest("t", &[row("USP GLYCERINE 99.5%", "Solvents", "EU", "Lyon")])
        .await
        .unwrap();
    assert_eq!(report.resolved, 1);

    let record = &api.records().unwrap()[0];
    assert_eq!(record.identifier, "56-81-5");
    assert_eq!(record.final_search_term, "GLYCERINE (Clean Desc)");
    assert_eq!(record.confidence, 70);
    assert_eq!(record.synonyms, "Glycerin|GLYCEROL");
}

#[tokio::test]
async fn descriptive_name_comes_from_registry_synonyms() {
    let api = api_with(stocked_registry(), LlmCapability::unavailable());

    api.ingest("t", &[row("Sodium Lauryl Sulfate", "Surfactants", "EU", "Lyon")])
        .await
        .unwrap();

    let record = &api.records().unwrap()[0];
    assert_eq!(record.identifier, "151-21-3");
    assert_eq!(record.descriptive_name, "SODIUM LAURYL SULFATE");
}

#[tokio::test]
async fn unresolvable_rows_are_terminal_not_errors() {
    let api = api_with(MockRegistry::new(), LlmCapability::unavailable());

    let report = api
        .ingest("t", &[row("Mystery Compound X", "Solvents", "EU", "Lyon")])
        .await
        .unwrap();
    assert_eq!(report.resolved, 0);

    let record = &api.records().unwrap()[0];
    assert_eq!(record.identifier, NOT_FOUND);
    assert_eq!(record.confidence, 0);
    assert_eq!(record.descriptive_name, NOT_AVAILABLE);
}

#[tokio::test]
async fn registry_failures_leave_the_batch_alive() {
    // The first row's raw trial errors out; both rows must still complete.
    let registry = MockRegistry::new()
        .with_failure("FLAKY ITEM 99%")
        .with_match("FLAKY ITEM", "1-2-3", &[])
        .with_match("CITRIC ACID", "77-92-9", &[]);
    let api = api_with(registry, LlmCapability::unavailable());

    let report = api
        .ingest(
            "t",
            &[
                row("FLAKY ITEM 99%", "Solvents", "EU", "Lyon"),
                row("Citric Acid", "Solvents", "EU", "Lyon"),
            ],
        )
        .await
        .unwrap();

    assert_eq!(report.rows, 2);
    assert_eq!(report.resolved, 2);
    let records = api.records().unwrap();
    assert_eq!(records[0].identifier, "1-2-3");
    assert_eq!(records[1].identifier, "77-92-9");
}

#[tokio::test]
async fn llm_clean_term_rescues_a_trade_name() {
    let registry = MockRegistry::new().with_match("POLYACRYLIC ACID", "9003-01-4", &[]);
    let llm = MockAssistant::new()
        .with_clean_term("Acusol 445N", "POLYACRYLIC ACID")
        .into_capability();
    let api = api_with(registry, llm);

    api.ingest("t", &[row("Acusol 445N", "Polymers", "EU", "Lyon")])
        .await
        .unwrap();

    let record = &api.records().unwrap()[0];
    assert_eq!(record.identifier, "9003-01-4");
    assert_eq!(record.final_search_term, "POLYACRYLIC ACID (AI Clean)");
}

#[tokio::test]
async fn unverified_llm_knowledge_is_tagged() {
    // The assistant claims an identifier the registry cannot verify.
    let llm = MockAssistant::new()
        .with_identity("Obscurin", Some("999-99-9"), None)
        .into_capability();
    let api = api_with(MockRegistry::new(), llm);

    api.ingest("t", &[row("Obscurin", "Polymers", "EU", "Lyon")])
        .await
        .unwrap();

    let record = &api.records().unwrap()[0];
    assert_eq!(record.identifier, "999-99-9 (LLM)");
    assert_eq!(record.final_search_term, "Obscurin (AI Knowledge)");
    // Unverified finds still carry the default confidence.
    assert_eq!(record.confidence, 70);
}

#[tokio::test]
async fn verified_llm_knowledge_replaces_the_identifier() {
    let registry = MockRegistry::new().with_match("999-99-9", "999-99-9", &["OBSCURIN OXIDE"]);
    let llm = MockAssistant::new()
        .with_identity("Obscurin", Some("999-99-9"), None)
        .into_capability();
    let api = api_with(registry, llm);

    api.ingest("t", &[row("Obscurin", "Polymers", "EU", "Lyon")])
        .await
        .unwrap();

    let record = &api.records().unwrap()[0];
    assert_eq!(record.identifier, "999-99-9");
    assert_eq!(record.final_search_term, "Obscurin (AI Verified)");
    assert_eq!(record.descriptive_name, "OBSCURIN OXIDE");
}

#[tokio::test]
async fn enrichment_rule_composes_the_name_of_record() {
    let llm = MockAssistant::new()
        .with_parameters(
            "Glycerine 85% Technical",
            &[("CAS", "56-81-5"), ("Purity", "85%"), ("Grade", "Technical")],
        )
        .into_capability();
    let api = api_with(stocked_registry(), llm);

    api.set_rule(
        &CategoryRule::new("Solvents")
            .with_parameter("Purity")
            .with_parameter("Grade"),
    )
    .unwrap();

    api.ingest(
        "t",
        &[row("Glycerine 85% Technical", "Solvents", "EU", "Lyon")],
    )
    .await
    .unwrap();

    let record = &api.records().unwrap()[0];
    // Registry trial confirmed the identifier; the final regeneration is
    // the canonical enriched name.
    assert_eq!(record.identifier, "56-81-5");
    assert_eq!(
        record.enriched_description,
        "glycerine_cas_56-81-5_purity_85%_grade_Technical"
    );
    // Extracted parameters landed on the record in rule order.
    let names: Vec<&str> = record.parameters.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Purity", "Grade"]);
}

#[tokio::test]
async fn absent_assistant_means_registry_only() {
    // A rule exists but no assistant: stage 1, 3 and 5 extraction are
    // skipped and resolution degrades to registry trials.
    let api = api_with(stocked_registry(), LlmCapability::unavailable());
    api.set_rule(&CategoryRule::new("Solvents").with_parameter("Purity"))
        .unwrap();

    api.ingest("t", &[row("Glycerine 85% Technical", "Solvents", "EU", "Lyon")])
        .await
        .unwrap();

    let record = &api.records().unwrap()[0];
    assert_eq!(record.identifier, "56-81-5");
    assert_eq!(record.enriched_description, "glycerine_cas_56-81-5");
    assert!(record.parameters.is_empty());
}
