//! Domain model for the materialization engine.
//!
//! The types here are plain data: they map onto catalog rows and carry no
//! I/O. Invariants that involve the filesystem or other rows (unique names
//! per version, class ids never reused) are enforced by the modules that
//! write them.

mod bbox;
mod ids;
mod records;

pub use bbox::NormalizedBox;
pub use ids::{AnnotationId, AssetId, ClassId, DatasetId, JobId, UserId, VersionId};
pub use records::{
    Annotation, Asset, Dataset, DatasetVersion, LabelClass, SplitStats, BASE_VERSION_TAG,
};
