//! Node annotations: free-form notes and Q&A threads attached to tree
//! nodes by stable identity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Annotation payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AnnotationKind {
    Info {
        content: String,
    },
    Qa {
        question: String,
        #[serde(default)]
        answer: Option<String>,
    },
}

/// An annotation attached to a tree node.
///
/// `open` is true iff the annotation is a Q&A with no answer; it is
/// recomputed on every write, never stored stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: i64,
    /// Node type the annotation targets (e.g. "material", "region").
    pub node_type: String,
    /// Stable node identity: record id for leaves, path id otherwise.
    pub node_identifier: String,
    #[serde(flatten)]
    pub kind: AnnotationKind,
    pub open: bool,
    pub created_at: DateTime<Utc>,
}

impl Annotation {
    pub fn info(
        node_type: impl Into<String>,
        node_identifier: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            node_type: node_type.into(),
            node_identifier: node_identifier.into(),
            kind: AnnotationKind::Info {
                content: content.into(),
            },
            open: false,
            created_at: Utc::now(),
        }
    }

    pub fn question(
        node_type: impl Into<String>,
        node_identifier: impl Into<String>,
        question: impl Into<String>,
    ) -> Self {
        let mut ann = Self {
            id: 0,
            node_type: node_type.into(),
            node_identifier: node_identifier.into(),
            kind: AnnotationKind::Qa {
                question: question.into(),
                answer: None,
            },
            open: false,
            created_at: Utc::now(),
        };
        ann.recompute_open();
        ann
    }

    /// Set (or clear) the answer on a Q&A annotation and refresh `open`.
    pub fn set_answer(&mut self, answer: Option<String>) {
        if let AnnotationKind::Qa { answer: slot, .. } = &mut self.kind {
            *slot = answer.filter(|a| !a.trim().is_empty());
        }
        self.recompute_open();
    }

    /// Recompute the open flag from the payload.
    pub fn recompute_open(&mut self) {
        self.open = matches!(self.kind, AnnotationKind::Qa { answer: None, .. });
    }

    pub fn is_open_qa(&self) -> bool {
        self.open
    }

    /// One-line summary shown on decorated tree nodes.
    pub fn summary(&self) -> String {
        match &self.kind {
            AnnotationKind::Info { content } => content.clone(),
            AnnotationKind::Qa { question, .. } => format!("Q: {question}"),
        }
    }
}
