//! Material records and their raw input rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Terminal identifier value for a record that could not be resolved.
pub const NOT_FOUND: &str = "NOT FOUND";
/// Placeholder for absent descriptive names / synonym strings.
pub const NOT_AVAILABLE: &str = "N/A";

/// Surrogate identifier for a stored material record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct RecordId(i64);

impl RecordId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One raw procurement row as received from the ingestion boundary.
///
/// Immutable input. A row listing several brands fans out into one
/// [`MaterialRecord`] per brand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawItem {
    pub description: String,
    #[serde(default = "default_sub_category")]
    pub sub_category: String,
    #[serde(default = "default_not_available")]
    pub commodity: String,
    #[serde(default)]
    pub brands: Vec<String>,
    #[serde(default = "default_not_available")]
    pub item_code: String,
    #[serde(default = "default_not_available")]
    pub plant: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub spend_value: Option<f64>,
    /// Raw parameter columns carried alongside the description.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

fn default_sub_category() -> String {
    "Uncategorized".to_string()
}

fn default_not_available() -> String {
    NOT_AVAILABLE.to_string()
}

fn default_region() -> String {
    "Global".to_string()
}

impl RawItem {
    pub fn new(description: impl Into<String>, sub_category: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            sub_category: sub_category.into(),
            commodity: default_not_available(),
            brands: Vec::new(),
            item_code: default_not_available(),
            plant: default_not_available(),
            region: default_region(),
            quantity: None,
            spend_value: None,
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brands.push(brand.into());
        self
    }

    pub fn with_plant(mut self, plant: impl Into<String>) -> Self {
        self.plant = plant.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Brands this row fans out into; `"N/A"` when none are usable.
    pub fn fan_out_brands(&self) -> Vec<String> {
        let usable: Vec<String> = self
            .brands
            .iter()
            .map(|b| b.trim())
            .filter(|b| !b.is_empty() && !b.eq_ignore_ascii_case("nan") && !b.eq_ignore_ascii_case("none"))
            .map(str::to_string)
            .collect();
        if usable.is_empty() {
            vec![NOT_AVAILABLE.to_string()]
        } else {
            usable
        }
    }
}

/// An ordered (name, value) pair on a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Validation state of a record's resolved identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ValidationStatus {
    Pending,
    ValidatedManual,
    ValidatedDocuments(u32),
}

impl Default for ValidationStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::ValidatedManual => write!(f, "Validated (Manual)"),
            Self::ValidatedDocuments(1) => write!(f, "Validated (1 doc)"),
            Self::ValidatedDocuments(n) => write!(f, "Validated ({n} docs)"),
        }
    }
}

impl From<ValidationStatus> for String {
    fn from(status: ValidationStatus) -> Self {
        status.to_string()
    }
}

impl From<String> for ValidationStatus {
    fn from(label: String) -> Self {
        let label = label.trim();
        if label == "Validated (Manual)" {
            return Self::ValidatedManual;
        }
        if let Some(rest) = label.strip_prefix("Validated (") {
            let count: u32 = rest
                .trim_end_matches(')')
                .trim_end_matches("docs")
                .trim_end_matches("doc")
                .trim()
                .parse()
                .unwrap_or(1);
            return Self::ValidatedDocuments(count);
        }
        Self::Pending
    }
}

/// A validation document attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationDocument {
    pub doc_type: String,
    pub filename: String,
    pub path: String,
    pub uploaded_at: DateTime<Utc>,
}

/// A resolved material record: one per (row, brand).
///
/// Created during resolution; mutated only by manual edits,
/// validation-document review or re-enrichment. Never deleted except on
/// full re-ingestion of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialRecord {
    pub id: RecordId,
    pub session: String,
    pub row_number: u32,
    pub commodity: String,
    pub sub_category: String,
    pub description: String,
    pub brand: String,
    pub item_code: String,
    pub plant: String,
    pub region: String,
    pub enriched_description: String,
    pub final_search_term: String,
    /// Registry number, possibly `" (LLM)"`-tagged, or [`NOT_FOUND`].
    pub identifier: String,
    pub descriptive_name: String,
    pub synonyms: String,
    pub confidence: u8,
    pub validation_status: ValidationStatus,
    pub validation_documents: Vec<ValidationDocument>,
    pub quantity: f64,
    pub spend_value: f64,
    pub parameters: Vec<Parameter>,
    pub created_at: DateTime<Utc>,
}

impl MaterialRecord {
    /// A fresh, unresolved record for the given description.
    pub fn new(description: impl Into<String>, sub_category: impl Into<String>) -> Self {
        Self {
            id: RecordId::default(),
            session: String::new(),
            row_number: 0,
            commodity: NOT_AVAILABLE.to_string(),
            sub_category: sub_category.into(),
            description: description.into(),
            brand: NOT_AVAILABLE.to_string(),
            item_code: NOT_AVAILABLE.to_string(),
            plant: NOT_AVAILABLE.to_string(),
            region: "Global".to_string(),
            enriched_description: String::new(),
            final_search_term: String::new(),
            identifier: NOT_FOUND.to_string(),
            descriptive_name: NOT_AVAILABLE.to_string(),
            synonyms: NOT_AVAILABLE.to_string(),
            confidence: 0,
            validation_status: ValidationStatus::Pending,
            validation_documents: Vec::new(),
            quantity: 0.0,
            spend_value: 0.0,
            parameters: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = id;
        self
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = brand.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_plant(mut self, plant: impl Into<String>) -> Self {
        self.plant = plant.into();
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    pub fn with_enriched_description(mut self, enriched: impl Into<String>) -> Self {
        self.enriched_description = enriched.into();
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push(Parameter::new(name, value));
        self
    }

    /// Whether the record carries a real (found) identifier.
    pub fn has_identifier(&self) -> bool {
        !self.identifier.trim().is_empty() && self.identifier != NOT_FOUND
    }

    /// Identifier with any confidence tag (e.g. `" (LLM)"`) stripped.
    pub fn clean_identifier(&self) -> &str {
        self.identifier
            .split('(')
            .next()
            .unwrap_or(&self.identifier)
            .trim()
    }

    /// The name the record shows in trees: enriched when present, raw
    /// description otherwise.
    pub fn display_name(&self) -> &str {
        if self.enriched_description.trim().is_empty() {
            &self.description
        } else {
            &self.enriched_description
        }
    }

    /// Case-insensitive parameter lookup map.
    pub fn parameter_map(&self) -> BTreeMap<String, &str> {
        self.parameters
            .iter()
            .map(|p| (p.name.trim().to_lowercase(), p.value.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fan_out_filters_unusable_brands() {
        let item = RawItem::new("Glycerine", "Solvents")
            .with_brand("Acme")
            .with_brand("  ")
            .with_brand("nan")
            .with_brand("Umbrella");
        assert_eq!(item.fan_out_brands(), vec!["Acme", "Umbrella"]);

        let bare = RawItem::new("Glycerine", "Solvents");
        assert_eq!(bare.fan_out_brands(), vec![NOT_AVAILABLE]);
    }

    #[test]
    fn validation_status_labels_round_trip() {
        for status in [
            ValidationStatus::Pending,
            ValidationStatus::ValidatedManual,
            ValidationStatus::ValidatedDocuments(1),
            ValidationStatus::ValidatedDocuments(3),
        ] {
            let label = status.to_string();
            assert_eq!(ValidationStatus::from(label), status);
        }
    }

    #[test]
    fn unknown_status_label_falls_back_to_pending() {
        assert_eq!(
            ValidationStatus::from("whatever".to_string()),
            ValidationStatus::Pending
        );
    }

    #[test]
    fn clean_identifier_strips_confidence_tag() {
        let record = MaterialRecord::new("Glycerine", "Solvents").with_identifier("56-81-5 (LLM)");
        assert_eq!(record.clean_identifier(), "56-81-5");
        assert!(record.has_identifier());

        let unresolved = MaterialRecord::new("Mystery", "Solvents");
        assert!(!unresolved.has_identifier());
    }

    #[test]
    fn display_name_prefers_enrichment() {
        let record = MaterialRecord::new("Glycerine USP", "Solvents");
        assert_eq!(record.display_name(), "Glycerine USP");

        let enriched = record.with_enriched_description("glycerine_cas_56-81-5");
        assert_eq!(enriched.display_name(), "glycerine_cas_56-81-5");
    }

    #[test]
    fn parameter_map_is_case_insensitive_on_names() {
        let record = MaterialRecord::new("Glycerine", "Solvents")
            .with_parameter(" Purity ", "85%")
            .with_parameter("GRADE", "Technical");
        let map = record.parameter_map();
        assert_eq!(map.get("purity").copied(), Some("85%"));
        assert_eq!(map.get("grade").copied(), Some("Technical"));
    }
}
