//! Trial candidate generation
//!
//! Registry search is attempted over an ordered candidate list: the raw
//! description, the raw sub-category, their normalized forms, then
//! morphological variants for patterns that defeat registry nomenclature.

use crate::normalize::normalize;
use once_cell::sync::Lazy;
use regex_lite::Regex;

static ESTER_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bESTER\b").expect("valid pattern"));

/// Degenerate terms that would match half the registry.
const SKIP_TERMS: &[&str] = &["EXTRACT", "OIL", "NAN"];

/// One search candidate with a derived label for traceability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trial {
    pub term: String,
    pub label: String,
}

impl Trial {
    fn new(term: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            label: label.into(),
        }
    }
}

/// Whether a candidate term should be skipped outright.
pub fn should_skip(term: &str) -> bool {
    let term = term.trim();
    term.is_empty() || SKIP_TERMS.contains(&term.to_uppercase().as_str())
}

/// Build the ordered candidate list for one row.
///
/// Base candidates first, then variants: POLYGLYCEROL is commonly indexed
/// as POLYGLYCERYL, and an ESTER suffix often hides the parent compound.
pub fn trial_candidates(description: &str, sub_category: &str) -> Vec<Trial> {
    let mut trials = vec![
        Trial::new(description, "Raw Desc"),
        Trial::new(sub_category, "Raw Sub"),
        Trial::new(normalize(description), "Clean Desc"),
        Trial::new(normalize(sub_category), "Clean Sub"),
    ];

    let mut variants = Vec::new();
    for trial in &trials {
        let upper = trial.term.to_uppercase();
        if upper.contains("POLYGLYCEROL") {
            variants.push(Trial::new(
                upper.replace("POLYGLYCEROL", "POLYGLYCERYL"),
                format!("{} (Var)", trial.label),
            ));
        }
        if upper.contains("ESTER") {
            variants.push(Trial::new(
                ESTER_TOKEN.replace_all(&upper, "").trim().to_string(),
                format!("{} (No Ester)", trial.label),
            ));
        }
    }
    trials.extend(variants);

    trials
}
