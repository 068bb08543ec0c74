//! Numeric-range bucketing of parameter values

use crate::catalog::BucketRule;

/// Numeric prefix of a raw parameter value: the first `-`-separated token
/// with non-numeric characters stripped. `"85%"` → 85, `"90-99%"` → 90.
pub fn numeric_prefix(raw: &str) -> Option<f64> {
    let token = raw.split('-').next()?;
    let digits: String = token
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Map a raw value through ordered bucketing rules. First matching rule
/// wins; a non-numeric value or no match passes the raw value through
/// unchanged.
pub fn apply_bucket_rules(raw: &str, rules: &[BucketRule]) -> String {
    let Some(value) = numeric_prefix(raw) else {
        return raw.to_string();
    };
    for rule in rules {
        if rule.op.matches(value) {
            return rule.display_label();
        }
    }
    raw.to_string()
}
