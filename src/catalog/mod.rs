//! Catalog domain model: raw input rows, resolved material records,
//! per-category rules, tree overrides and node annotations.

mod annotation;
mod overrides;
mod record;
mod rule;

pub use annotation::{Annotation, AnnotationKind};
pub use overrides::NodeOverride;
pub use record::{
    MaterialRecord, Parameter, RawItem, RecordId, ValidationDocument, ValidationStatus,
    NOT_AVAILABLE, NOT_FOUND,
};
pub use rule::{BucketOp, BucketRule, CategoryRule};
