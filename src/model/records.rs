//! Catalog records for datasets, versions, assets, label classes and annotations.
//!
//! These mirror the relational rows one-to-one. Ownership runs
//! Dataset → DatasetVersion → {Asset → Annotation, LabelClass}, and deletion
//! always walks that graph children first (see [`crate::gc`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::bbox::NormalizedBox;
use super::ids::{AnnotationId, AssetId, ClassId, DatasetId, UserId, VersionId};
use crate::split::{Split, SplitCounts, SplitRatios};

/// Tag of the version created on first upload.
pub const BASE_VERSION_TAG: &str = "v0";

/// A named collection of images owned by one user.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Dataset {
    pub id: DatasetId,

    /// Owner; `(owner, name)` is unique.
    pub owner: UserId,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// One tagged snapshot of a dataset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatasetVersion {
    pub id: VersionId,
    pub dataset_id: DatasetId,

    /// Human-readable tag such as `v0` or `v1`.
    pub tag: String,

    pub created_at: DateTime<Utc>,

    /// Split statistics of the last materialization, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<SplitStats>,
}

/// Split counts and the ratios that produced them.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SplitStats {
    pub counts: SplitCounts,
    pub ratios: SplitRatios,
}

/// One image registered within a specific version.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub version_id: VersionId,

    /// Display name (the original upload filename); unique per version.
    pub name: String,

    /// Where the image file lives inside the version directory.
    pub storage_path: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    /// Split assignment from the last materialization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split: Option<Split>,
}

impl Asset {
    /// Name used for lookups, falling back to the stored file name.
    pub fn effective_name(&self) -> String {
        if self.name.trim().is_empty() {
            self.storage_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            self.name.clone()
        }
    }
}

/// A named category with a per-version integer id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelClass {
    pub class_id: ClassId,
    pub version_id: VersionId,
    pub name: String,
}

/// One bounding box on one asset.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,
    pub asset_id: AssetId,

    /// Class within the asset's version.
    pub class_id: ClassId,

    pub bbox: NormalizedBox,

    /// The label file this annotation is rendered into.
    pub label_path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_name_falls_back_to_file_name() {
        let asset = Asset {
            id: AssetId(1),
            version_id: VersionId(1),
            name: "  ".to_string(),
            storage_path: PathBuf::from("/data/u1/1_cats/v0/cat.jpg"),
            width: None,
            height: None,
            split: None,
        };
        assert_eq!(asset.effective_name(), "cat.jpg");
    }
}
