//! Identity resolution pipeline
//!
//! Turns one noisy free-text description into a best-effort registry
//! identifier, enriched name, descriptive name and confidence signal.
//! Five stages, each optional and fail-soft: rule-based enrichment,
//! registry trials, LLM fallback, descriptive-name lookup, and final
//! enrichment regeneration. Rows are resolved strictly sequentially; the
//! registry client owns the inter-call spacing contract.

mod trials;

pub use trials::{should_skip, trial_candidates, Trial};

use crate::catalog::{CategoryRule, Parameter, NOT_AVAILABLE, NOT_FOUND};
use crate::inci::descriptive_name_from_synonyms;
use crate::llm::LlmCapability;
use crate::normalize::normalize;
use crate::registry::{ChemicalRegistry, SynonymSource};
use std::sync::Arc;

/// The outcome of resolving one description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Registry number; `" (LLM)"`-tagged when unverified; [`NOT_FOUND`]
    /// when every stage came up empty.
    pub identifier: String,
    /// Name of record: machine-composed enrichment when a rule applies,
    /// otherwise the winning search term.
    pub enriched_description: String,
    /// The candidate (plus label) that produced the identifier.
    pub final_search_term: String,
    /// Standardized descriptive name, or [`NOT_AVAILABLE`].
    pub descriptive_name: String,
    /// Pipe-joined registry synonyms, or [`NOT_AVAILABLE`].
    pub synonyms: String,
    /// Fixed default: 70 when an identifier was found, 0 otherwise.
    pub confidence: u8,
    /// Parameters extracted during final enrichment, in rule order.
    pub parameters: Vec<Parameter>,
}

impl Resolution {
    pub fn found(&self) -> bool {
        self.identifier != NOT_FOUND
    }
}

/// Confidence assigned to any resolved identifier pending validation.
const DEFAULT_CONFIDENCE: u8 = 70;

/// Orchestrates the registry, synonym source and optional LLM assistant.
pub struct IdentityResolver {
    registry: Arc<dyn ChemicalRegistry>,
    synonyms: Arc<dyn SynonymSource>,
    llm: LlmCapability,
}

impl IdentityResolver {
    pub fn new(
        registry: Arc<dyn ChemicalRegistry>,
        synonyms: Arc<dyn SynonymSource>,
        llm: LlmCapability,
    ) -> Self {
        Self {
            registry,
            synonyms,
            llm,
        }
    }

    /// Resolve one description. Never fails: external errors degrade to
    /// "no result" for the stage that hit them and the pipeline moves on.
    pub async fn resolve(
        &self,
        description: &str,
        sub_category: &str,
        rule: Option<&CategoryRule>,
    ) -> Resolution {
        let trials = trial_candidates(description, sub_category);

        let cleaned = normalize(description);
        let mut best_term = if cleaned.is_empty() {
            description.trim().to_string()
        } else {
            cleaned.clone()
        };
        let mut identifier: Option<String> = None;
        let mut registry_synonyms: Vec<String> = Vec::new();
        let mut enrichment_applied = false;
        let mut llm_descriptive: Option<String> = None;

        // Stage 1: rule-based enrichment. The extracted identifier is
        // provisional; the enriched name protects final_search_term from
        // being overwritten by trial labels.
        if let (Some(rule), Some(llm)) = (rule, self.llm.get()) {
            if let Some(extracted) = llm
                .extract_parameters(description, &rule.identifier_name, &rule.parameter_order)
                .await
            {
                let mut parts = vec![material_token(description)];
                if let Some(value) = extracted
                    .get(&rule.identifier_name)
                    .filter(|v| !v.trim().is_empty())
                {
                    parts.push(rule.identifier_name.to_lowercase());
                    parts.push(value.clone());
                    identifier = Some(value.clone());
                }
                for name in &rule.parameter_order {
                    if let Some(value) = extracted.get(name) {
                        parts.push(name.to_lowercase());
                        parts.push(value.clone());
                    }
                }
                best_term = parts.join("_");
                enrichment_applied = true;
                tracing::info!(sub_category = %sub_category, enriched = %best_term,
                    "enrichment rule applied");
            }
        }

        // Stage 2: registry trials, in order. First hit wins; failures and
        // misses fall through to the next candidate.
        for trial in &trials {
            if should_skip(&trial.term) {
                continue;
            }
            match self.registry.search_and_detail(&trial.term).await {
                Ok(Some(hit)) => {
                    tracing::info!(term = %trial.term, identifier = %hit.identifier,
                        "identifier found");
                    if !enrichment_applied {
                        best_term = format!("{} ({})", trial.term, trial.label);
                    }
                    identifier = Some(hit.identifier.clone());
                    registry_synonyms = hit.synonyms;
                    break;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(term = %trial.term, error = %e,
                        "registry trial failed; continuing");
                }
            }
        }

        // Stage 3: LLM fallback, only when nothing at all was found.
        if identifier.is_none() {
            if let Some(llm) = self.llm.get() {
                // (a) a smarter cleaning of the description, retried
                // against the registry when it differs from ours.
                if let Some(suggestion) = llm.clean_term(description).await {
                    if suggestion.to_uppercase() != cleaned {
                        match self.registry.search_and_detail(&suggestion).await {
                            Ok(Some(hit)) => {
                                tracing::info!(term = %suggestion, identifier = %hit.identifier,
                                    "identifier found via assistant cleaning");
                                best_term = format!("{suggestion} (AI Clean)");
                                identifier = Some(hit.identifier.clone());
                                registry_synonyms = hit.synonyms;
                            }
                            Ok(None) => {}
                            Err(e) => {
                                tracing::warn!(term = %suggestion, error = %e,
                                    "assistant-cleaned lookup failed");
                            }
                        }
                    }
                }

                // (b) direct knowledge-base answer, verified against the
                // registry when possible. Unverified answers are tagged.
                if identifier.is_none() {
                    if let Some(known) = llm.known_identity(description).await {
                        if let Some(claimed) = known.identifier {
                            match self.registry.search_and_detail(&claimed).await {
                                Ok(Some(verified)) => {
                                    tracing::info!(identifier = %verified.identifier,
                                        "assistant answer verified");
                                    if !enrichment_applied {
                                        best_term = format!("{description} (AI Verified)");
                                    }
                                    identifier = Some(verified.identifier.clone());
                                    registry_synonyms = verified.synonyms;
                                }
                                _ => {
                                    tracing::warn!(identifier = %claimed,
                                        "assistant answer unverified");
                                    identifier = Some(format!("{claimed} (LLM)"));
                                    best_term = format!("{description} (AI Knowledge)");
                                }
                            }
                        }
                        if let Some(name) = known.descriptive_name {
                            llm_descriptive = Some(format!("{name} (AI)"));
                        }
                    }
                }
            }
        }
        // Stage 4: descriptive name. Assistant answer, registry synonyms,
        // then the secondary synonym service.
        let mut descriptive_name = llm_descriptive.unwrap_or_else(|| NOT_AVAILABLE.to_string());
        if descriptive_name == NOT_AVAILABLE {
            if let Some(id) = identifier.as_deref() {
                descriptive_name =
                    descriptive_name_from_synonyms(registry_synonyms.iter().map(String::as_str))
                        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

                if descriptive_name == NOT_AVAILABLE {
                    let clean_id = strip_tag(id);
                    match self.synonyms.synonyms(clean_id).await {
                        Ok(remote) => {
                            descriptive_name = descriptive_name_from_synonyms(
                                remote.iter().map(String::as_str),
                            )
                            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
                        }
                        Err(e) => {
                            tracing::warn!(identifier = %clean_id, error = %e,
                                "synonym lookup failed");
                        }
                    }
                }
            }
        }

        // Stage 5: final enrichment regeneration, the canonical name of
        // record whenever an identifier and a rule exist. Stage 1's
        // provisional name does not survive this.
        let mut parameters = Vec::new();
        let enriched_description = match (identifier.as_deref(), rule) {
            (Some(id), Some(rule)) => {
                let mut parts = vec![
                    material_token(description),
                    rule.identifier_name.to_lowercase(),
                    strip_tag(id).to_string(),
                ];
                if let Some(llm) = self.llm.get() {
                    if let Some(extracted) = llm
                        .extract_parameters(description, &rule.identifier_name, &rule.parameter_order)
                        .await
                    {
                        for name in &rule.parameter_order {
                            if let Some(value) = extracted.get(name) {
                                parts.push(name.to_lowercase());
                                parts.push(value.clone());
                                parameters.push(Parameter::new(name.clone(), value.clone()));
                            }
                        }
                    }
                }
                parts.join("_")
            }
            _ => best_term.clone(),
        };

        let confidence = if identifier.is_some() {
            DEFAULT_CONFIDENCE
        } else {
            0
        };
        let synonyms = if registry_synonyms.is_empty() {
            NOT_AVAILABLE.to_string()
        } else {
            registry_synonyms.join("|")
        };

        Resolution {
            identifier: identifier.unwrap_or_else(|| NOT_FOUND.to_string()),
            enriched_description,
            final_search_term: best_term,
            descriptive_name,
            synonyms,
            confidence,
            parameters,
        }
    }
}

/// Lowercased material token for enriched names: normalized description
/// with spaces and hyphens squeezed out.
pub fn material_token(description: &str) -> String {
    normalize(description)
        .to_lowercase()
        .replace([' ', '-'], "")
}

/// Strip a confidence tag (`"56-81-5 (LLM)"` → `"56-81-5"`).
fn strip_tag(identifier: &str) -> &str {
    identifier.split('(').next().unwrap_or(identifier).trim()
}
