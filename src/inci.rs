//! Descriptive-name (INCI-style) heuristics
//!
//! Registry synonym lists mix registry numbers, trade names and systematic
//! names. These helpers pick out the entry that reads like a standardized
//! descriptive name: mostly uppercase, bounded length, and ending in one of
//! the suffixes the naming convention uses.

use once_cell::sync::Lazy;
use regex_lite::Regex;

/// Bare registry-number pattern (`7732-18-5`); never a descriptive name.
static REGISTRY_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+-\d+-\d+$").expect("valid pattern"));

/// Terms too generic to identify a material on their own.
const GENERIC_TERMS: &[&str] = &["EXTRACT", "OIL", "POWDER", "LIQUID", "SOLUTION", "MIXTURE"];

/// Suffix vocabulary of standardized descriptive names.
const NAME_SUFFIXES: &[&str] = &[
    "ACID",
    "OXIDE",
    "EXTRACT",
    "OIL",
    "BUTTER",
    "WAX",
    "GLYCOL",
    "ALCOHOL",
    "ESTER",
    "SULFATE",
    "CHLORIDE",
    "NITRATE",
    "PHOSPHATE",
    "CARBONATE",
    "HYDROXIDE",
    "PEROXIDE",
    "BENZOATE",
    "PALMITATE",
    "STEARATE",
    "OLEATE",
    "ACETATE",
    "CITRATE",
];

/// Minimum share of uppercase characters (over non-space, non-hyphen chars).
const UPPERCASE_RATIO: f64 = 0.7;

/// Whether a synonym reads like a standardized descriptive name.
pub fn is_descriptive_name(name: &str) -> bool {
    let name = name.trim();
    if name.len() < 3 || name.len() > 60 {
        return false;
    }
    if REGISTRY_NUMBER.is_match(name) {
        return false;
    }

    let upper = name.to_uppercase();
    if GENERIC_TERMS.contains(&upper.as_str()) {
        return false;
    }

    let significant = name.chars().filter(|c| *c != ' ' && *c != '-').count();
    if significant == 0 {
        return false;
    }
    let uppercase = name.chars().filter(|c| c.is_uppercase()).count();
    if (uppercase as f64) / (significant as f64) < UPPERCASE_RATIO {
        return false;
    }

    NAME_SUFFIXES.iter().any(|suffix| upper.ends_with(suffix))
}

/// Pick the first descriptive name out of a synonym list, if any.
pub fn descriptive_name_from_synonyms<'a, I>(synonyms: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    synonyms
        .into_iter()
        .map(str::trim)
        .find(|syn| is_descriptive_name(syn))
        .map(str::to_string)
}
