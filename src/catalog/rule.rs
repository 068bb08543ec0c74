//! Per-category rules: identifier field, parameter ordering, value
//! bucketing and structural hierarchy ordering.

use serde::{Deserialize, Serialize};

/// A numeric-range-to-label bucketing operator.
///
/// Serialized in the rule-editor wire shape:
/// `{"operator": "<", "value": 90.0, "label": "Low"}` or
/// `{"operator": "range", "min": 90.0, "max": 99.0, "label": "High"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operator")]
pub enum BucketOp {
    #[serde(rename = "<")]
    Lt { value: f64 },
    #[serde(rename = "<=")]
    Le { value: f64 },
    #[serde(rename = ">")]
    Gt { value: f64 },
    #[serde(rename = ">=")]
    Ge { value: f64 },
    /// Half-open interval: `min <= v < max`.
    #[serde(rename = "range")]
    Range { min: f64, max: f64 },
}

impl BucketOp {
    /// Whether a numeric value falls in this bucket.
    pub fn matches(&self, v: f64) -> bool {
        match *self {
            Self::Lt { value } => v < value,
            Self::Le { value } => v <= value,
            Self::Gt { value } => v > value,
            Self::Ge { value } => v >= value,
            Self::Range { min, max } => min <= v && v < max,
        }
    }

    /// A label derived from the operator's bounds, used when a rule carries
    /// no label of its own.
    pub fn bounds_label(&self) -> String {
        match *self {
            Self::Lt { value } => format!("< {value}"),
            Self::Le { value } => format!("<= {value}"),
            Self::Gt { value } => format!("> {value}"),
            Self::Ge { value } => format!(">= {value}"),
            Self::Range { min, max } => format!("{min} - {max}"),
        }
    }
}

/// One ordered bucketing rule; first matching rule wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketRule {
    #[serde(flatten)]
    pub op: BucketOp,
    #[serde(default)]
    pub label: String,
}

impl BucketRule {
    pub fn new(op: BucketOp, label: impl Into<String>) -> Self {
        Self {
            op,
            label: label.into(),
        }
    }

    /// The label this bucket groups under; derived from the bounds when the
    /// configured label is empty.
    pub fn display_label(&self) -> String {
        let label = self.label.trim();
        if label.is_empty() {
            self.op.bounds_label()
        } else {
            label.to_string()
        }
    }
}

/// Per-sub-category configuration. At most one rule per sub-category; an
/// absent rule means built-in defaults apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub sub_category: String,
    /// Name of the identifier field this category resolves against.
    #[serde(default = "default_identifier_name")]
    pub identifier_name: String,
    /// Parameter names defining cluster depth, in order.
    #[serde(default)]
    pub parameter_order: Vec<String>,
    /// Ordered bucketing rules for purity-type parameters.
    #[serde(default)]
    pub bucket_rules: Vec<BucketRule>,
    /// Structural levels, outermost first (e.g. Region, Identifier, Factory).
    #[serde(default)]
    pub hierarchy_order: Vec<String>,
}

fn default_identifier_name() -> String {
    "CAS".to_string()
}

impl CategoryRule {
    pub fn new(sub_category: impl Into<String>) -> Self {
        Self {
            sub_category: sub_category.into(),
            identifier_name: default_identifier_name(),
            parameter_order: Vec::new(),
            bucket_rules: Vec::new(),
            hierarchy_order: Vec::new(),
        }
    }

    pub fn with_identifier_name(mut self, name: impl Into<String>) -> Self {
        self.identifier_name = name.into();
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>) -> Self {
        self.parameter_order.push(name.into());
        self
    }

    pub fn with_bucket(mut self, rule: BucketRule) -> Self {
        self.bucket_rules.push(rule);
        self
    }

    pub fn with_hierarchy(mut self, levels: &[&str]) -> Self {
        self.hierarchy_order = levels.iter().map(|l| l.to_string()).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operators_match_their_ranges() {
        assert!(BucketOp::Lt { value: 90.0 }.matches(85.0));
        assert!(!BucketOp::Lt { value: 90.0 }.matches(90.0));
        assert!(BucketOp::Le { value: 90.0 }.matches(90.0));
        assert!(BucketOp::Gt { value: 90.0 }.matches(95.0));
        assert!(BucketOp::Ge { value: 90.0 }.matches(90.0));

        // range is half-open: [min, max)
        let range = BucketOp::Range {
            min: 90.0,
            max: 99.0,
        };
        assert!(range.matches(90.0));
        assert!(range.matches(98.9));
        assert!(!range.matches(99.0));
    }

    #[test]
    fn empty_label_derives_from_bounds() {
        let labeled = BucketRule::new(BucketOp::Lt { value: 90.0 }, "Low");
        assert_eq!(labeled.display_label(), "Low");

        let unlabeled = BucketRule::new(BucketOp::Lt { value: 90.0 }, "");
        assert_eq!(unlabeled.display_label(), "< 90");

        let range = BucketRule::new(
            BucketOp::Range {
                min: 90.0,
                max: 99.0,
            },
            " ",
        );
        assert_eq!(range.display_label(), "90 - 99");
    }

    #[test]
    fn wire_shape_round_trips() {
        let json = r#"{"operator": "<", "value": 90.0, "label": "Low"}"#;
        let rule: BucketRule = serde_json::from_str(json).unwrap();
        assert_eq!(rule, BucketRule::new(BucketOp::Lt { value: 90.0 }, "Low"));

        let json = r#"{"operator": "range", "min": 90.0, "max": 99.0, "label": "High"}"#;
        let rule: BucketRule = serde_json::from_str(json).unwrap();
        assert_eq!(
            rule.op,
            BucketOp::Range {
                min: 90.0,
                max: 99.0
            }
        );

        let back = serde_json::to_value(&rule).unwrap();
        assert_eq!(back["operator"], "range");
        assert_eq!(back["label"], "High");
    }

    #[test]
    fn category_rule_defaults() {
        let json = r#"{"sub_category": "Surfactants"}"#;
        let rule: CategoryRule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.identifier_name, "CAS");
        assert!(rule.parameter_order.is_empty());
        assert!(rule.bucket_rules.is_empty());
        assert!(rule.hierarchy_order.is_empty());
    }
}
