//! Training layout materialization.
//!
//! Builds the split tree inside a version directory:
//!
//! ```text
//! <version>/
//!   images/{train,val,test}/<image files>
//!   labels/{train,val,test}/<stem>.txt
//!   data.yaml
//! ```
//!
//! The split directories are emptied and refilled on every run, so an image
//! that moved to another split does not linger in its old one.

pub mod manifest;

pub use manifest::{read_manifest, write_manifest, Manifest, MANIFEST_FILE_NAME};

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::annotations::label_path_for;
use crate::catalog::{assets, datasets};
use crate::error::LabelforgeError;
use crate::model::{Asset, DatasetVersion, SplitStats};
use crate::registry::LabelRegistry;
use crate::split::{self, ShuffleMode, Split, SplitCounts, SplitRatios};

/// Image directory for `split` under `version_dir`.
pub fn images_dir(version_dir: &Path, split: Split) -> PathBuf {
    version_dir.join("images").join(split.as_str())
}

/// Label directory for `split` under `version_dir`.
pub fn labels_dir(version_dir: &Path, split: Split) -> PathBuf {
    version_dir.join("labels").join(split.as_str())
}

/// Options that shape one materialization.
#[derive(Clone, Copy, Debug, Default)]
pub struct LayoutOptions {
    pub ratios: SplitRatios,
    pub shuffle: ShuffleMode,
}

/// Rebuild the split tree, persist split assignments and counts, and write the manifest.
///
/// Must run after every label of the batch has gone through `registry`, so the
/// manifest lists all classes the label files can refer to.
pub fn materialize(
    conn: &Connection,
    version: &DatasetVersion,
    version_dir: &Path,
    registry: &LabelRegistry,
    options: &LayoutOptions,
) -> Result<SplitCounts, LabelforgeError> {
    if !registry.is_contiguous() {
        return Err(LabelforgeError::Inconsistent {
            path: version_dir.to_path_buf(),
            message: "class ids are not contiguous from 0; manifest positions would not match"
                .to_string(),
        });
    }

    let assets = assets::list_assets(conn, version.id)?;
    for asset in &assets {
        if !asset.storage_path.is_file() {
            return Err(LabelforgeError::Inconsistent {
                path: asset.storage_path.clone(),
                message: format!("image for asset {} is missing", asset.id),
            });
        }
    }

    reset_split_dirs(version_dir)?;

    let seed = match options.shuffle {
        ShuffleMode::Random => None,
        ShuffleMode::PerVersion => Some(version.id.as_i64() as u64),
    };
    let partition = split::partition(assets, &options.ratios, seed);

    for (asset, split) in &partition.assignments {
        place_asset(version_dir, asset, *split)?;
        assets::update_asset_split(conn, asset.id, Some(*split))?;
    }

    let counts = partition.counts;
    datasets::update_version_stats(
        conn,
        version.id,
        &SplitStats {
            counts,
            ratios: options.ratios,
        },
    )?;

    write_manifest(version_dir, &Manifest::new(registry.names_in_order()))?;

    info!(
        version_id = %version.id,
        tag = %version.tag,
        %counts,
        classes = registry.len(),
        "materialized training layout"
    );
    Ok(counts)
}

/// Empty (or create) the six split directories.
fn reset_split_dirs(version_dir: &Path) -> Result<(), LabelforgeError> {
    for split in Split::ALL {
        for dir in [images_dir(version_dir, split), labels_dir(version_dir, split)] {
            if dir.exists() {
                fs::remove_dir_all(&dir).map_err(|source| LabelforgeError::RemoveFailed {
                    path: dir.clone(),
                    source,
                })?;
            }
            fs::create_dir_all(&dir).map_err(LabelforgeError::Io)?;
        }
    }
    Ok(())
}

/// Copy an asset's image, and its label file if it has one, into `split`.
fn place_asset(version_dir: &Path, asset: &Asset, split: Split) -> Result<(), LabelforgeError> {
    let copy_err = |from: &Path, to: &Path, source: std::io::Error| LabelforgeError::CopyFailed {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    let file_name = asset
        .storage_path
        .file_name()
        .ok_or_else(|| LabelforgeError::Inconsistent {
            path: asset.storage_path.clone(),
            message: format!("asset {} has no file name", asset.id),
        })?;

    let dest_image = images_dir(version_dir, split).join(file_name);
    fs::copy(&asset.storage_path, &dest_image)
        .map_err(|e| copy_err(&asset.storage_path, &dest_image, e))?;

    let src_label = label_path_for(&asset.storage_path);
    if src_label.is_file() {
        let dest_label = label_path_for(&labels_dir(version_dir, split).join(file_name));
        fs::copy(&src_label, &dest_label).map_err(|e| copy_err(&src_label, &dest_label, e))?;
    }

    debug!(asset_id = %asset.id, %split, "placed asset");
    Ok(())
}
