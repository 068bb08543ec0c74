//! Search-term normalization
//!
//! Raw procurement descriptions carry packaging codes, grades, lot numbers
//! and concentration suffixes that defeat registry search. Normalization is
//! an ordered table of pure cleaning steps over an uppercased copy of the
//! input; the step order is part of the contract and is enforced by
//! `CLEAN_STEPS` being a constant.

use once_cell::sync::Lazy;
use regex_lite::Regex;

/// Leading article/code prefix such as `A1-` or `C2-B-`.
static CODE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9]{1,3}\s*-\s*([A-Z]\s*-)?").expect("valid pattern"));

/// Parenthetical asides, non-greedy.
static PARENTHETICAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(.*?\)").expect("valid pattern"));

/// Concentration expressions: `99.5%`, `20 - 30 %`, `70/80%`.
static CONCENTRATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d+(\.\d+)?\s*(-|/)?\s*(\d+(\.\d+)?)?\s*%").expect("valid pattern")
});

/// Packaging, grade and form tokens that never identify the chemical.
///
/// Hyphenated entries come before their suffix words so the alternation
/// consumes `NON-KOSHER` whole instead of leaving a dangling `NON-`.
const NOISE_WORDS: &[&str] = &[
    "NON-GMO",
    "NON-KOSHER",
    "BULK",
    "ANHYDROUS",
    "COATED",
    "GRANULAR",
    "LIQUID",
    "POWDER",
    "PURE",
    "SOURCE",
    "HEAVY",
    "PERF",
    "TECH",
    "TECHNICAL",
    "BP",
    "USP",
    "FCC",
    "GRADE",
    "MESH",
    "EXTRACT",
    "OIL",
    "PEPTIDE",
    "GEL",
    "BUTTER",
    "WAX",
    "MONOHYDRATE",
    "DIHYDRATE",
    "CRYSTALLINE",
    "PHARMA",
    "BG",
    "LQ",
    "WD",
    "CH",
    "JP",
    "FR",
    "EP",
    "KOSHER",
    "COGNIS",
    "DRUM",
    "ESTER",
    "SOLUTION",
];

static NOISE: Lazy<Regex> = Lazy::new(|| {
    let alternation = NOISE_WORDS.join("|");
    Regex::new(&format!(r"\b({})\b", alternation)).expect("valid pattern")
});

/// A single named cleaning step. Pure: string in, string out.
pub struct CleanStep {
    /// Step name, for diagnostics and tests.
    pub name: &'static str,
    run: fn(&str) -> String,
}

impl CleanStep {
    /// Apply the step.
    pub fn apply(&self, input: &str) -> String {
        (self.run)(input)
    }
}

/// The cleaning pipeline, in contract order:
/// prefix-strip, parenthetical-strip, percentage-strip, split-on-delimiter,
/// noise-word removal, coded-token removal, edge trim.
pub const CLEAN_STEPS: &[CleanStep] = &[
    CleanStep { name: "strip-code-prefix", run: strip_code_prefix },
    CleanStep { name: "strip-parentheticals", run: strip_parentheticals },
    CleanStep { name: "strip-concentrations", run: strip_concentrations },
    CleanStep { name: "split-on-delimiter", run: split_on_delimiter },
    CleanStep { name: "strip-noise-words", run: strip_noise_words },
    CleanStep { name: "strip-coded-tokens", run: strip_coded_tokens },
    CleanStep { name: "trim-edges", run: trim_edges },
];

/// Normalize a raw description into a canonical search term.
///
/// Deterministic, no I/O. May return an empty string; callers must treat
/// empty (and `"NAN"` inputs) as not usable and fall back to the raw text.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return String::new();
    }

    let mut term = trimmed.to_uppercase();
    for step in CLEAN_STEPS {
        term = step.apply(&term);
    }
    term
}

fn strip_code_prefix(input: &str) -> String {
    CODE_PREFIX.replace(input, "").into_owned()
}

fn strip_parentheticals(input: &str) -> String {
    PARENTHETICAL.replace_all(input, "").into_owned()
}

fn strip_concentrations(input: &str) -> String {
    CONCENTRATION.replace_all(input, "").into_owned()
}

fn split_on_delimiter(input: &str) -> String {
    input
        .split(|c| c == ',' || c == '/')
        .next()
        .unwrap_or("")
        .trim()
        .to_string()
}

fn strip_noise_words(input: &str) -> String {
    NOISE.replace_all(input, "").into_owned()
}

/// Drop tokens that read as lot/spec codes (contain a digit, length >= 3)
/// and stray single characters once at least one real token has been kept.
fn strip_coded_tokens(input: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    for word in input.split_whitespace() {
        if word.chars().any(|c| c.is_ascii_digit()) && word.len() >= 3 {
            continue;
        }
        if word.chars().count() == 1 && !kept.is_empty() {
            continue;
        }
        kept.push(word);
    }
    kept.join(" ")
}

fn trim_edges(input: &str) -> String {
    input.trim_matches(&['*', '-', '.', ',', ' '][..]).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    // === Scenario: grade and concentration noise is stripped ===
    #[test]
    fn strips_grade_and_concentration() {
        assert_eq!(normalize("USP GLYCERINE 99.5%"), "GLYCERINE");
        assert_eq!(normalize("Citric Acid Anhydrous FCC"), "CITRIC ACID");
    }

    // === Scenario: leading code prefixes are removed ===
    #[test]
    fn strips_code_prefix() {
        assert_eq!(normalize("A1-B-Sodium Chloride"), "SODIUM CHLORIDE");
        assert_eq!(normalize("C2 - Stearic Acid"), "STEARIC ACID");
    }

    // === Scenario: parentheticals and everything after a delimiter go ===
    #[test]
    fn strips_parentheticals_and_tail() {
        assert_eq!(normalize("Sorbitol (crystalline), drum"), "SORBITOL");
        assert_eq!(normalize("Lauryl Sulfate / Sodium Salt"), "LAURYL SULFATE");
    }

    // === Scenario: lot codes and stray single characters drop out ===
    #[test]
    fn strips_coded_tokens_and_singles() {
        assert_eq!(normalize("XANTHAN GUM FN200"), "XANTHAN GUM");
        assert_eq!(normalize("GUAR X"), "GUAR");
    }

    // === Scenario: hyphenated noise words are consumed whole ===
    #[test]
    fn hyphenated_noise_words_removed_whole() {
        // Mid-string, so the leading code-prefix strip stays out of play.
        assert_eq!(normalize("GLYCERINE NON-KOSHER"), "GLYCERINE");
        assert_eq!(normalize("LECITHIN NON-GMO"), "LECITHIN");
    }

    // === Scenario: unusable inputs normalize to empty ===
    #[test]
    fn unusable_inputs_are_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("nan"), "");
        assert_eq!(normalize("NaN"), "");
        // Everything stripped away
        assert_eq!(normalize("USP BULK 99%"), "");
    }

    // === Scenario: deterministic and idempotent ===
    #[test]
    fn deterministic_and_idempotent() {
        let inputs = [
            "USP GLYCERINE 99.5%",
            "A1-B-Sodium Chloride (tech), drum",
            "Polyglycerol Oleate Ester 70-80%",
            "Stearic Acid",
        ];
        for raw in inputs {
            let once = normalize(raw);
            assert_eq!(once, normalize(raw), "determinism for {raw:?}");
            assert_eq!(normalize(&once), once, "idempotence for {raw:?}");
        }
    }

    // === Scenario: step order is the documented pipeline ===
    #[test]
    fn step_table_order() {
        let names: Vec<&str> = CLEAN_STEPS.iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            [
                "strip-code-prefix",
                "strip-parentheticals",
                "strip-concentrations",
                "split-on-delimiter",
                "strip-noise-words",
                "strip-coded-tokens",
                "trim-edges",
            ]
        );
    }

    // === Scenario: individual steps are independently testable ===
    #[test]
    fn individual_steps() {
        assert_eq!(strip_code_prefix("A1-B-FOO"), "FOO");
        assert_eq!(strip_parentheticals("FOO (BAR) BAZ"), "FOO  BAZ");
        assert_eq!(strip_concentrations("FOO 20 - 30 % BAR"), "FOO  BAR");
        assert_eq!(split_on_delimiter("FOO, BAR"), "FOO");
        assert_eq!(strip_noise_words("FOO DRUM BAR"), "FOO  BAR");
        assert_eq!(strip_coded_tokens("FOO FN200 B"), "FOO");
        assert_eq!(trim_edges("*-FOO.,"), "FOO");
    }
}
