//! Dataset deletion.
//!
//! Rows are removed children first (annotations, label classes, jobs,
//! assets, versions, dataset) inside one transaction. The dataset directory
//! is removed deepest path first between the label cleanup and the row
//! deletes; the transaction commits only once the tree is gone, so a failed
//! removal leaves every row in place.

use std::fs;
use std::io;
use std::path::Path;

use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::assets::dataset_dir;
use crate::catalog::{assets, datasets, jobs, labels, Catalog};
use crate::error::LabelforgeError;
use crate::model::{DatasetId, DatasetVersion, UserId};

/// What a deletion removed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DeletionSummary {
    pub dataset_id: Option<DatasetId>,
    pub versions: usize,
    pub assets: usize,
    pub annotations: usize,
    pub label_classes: usize,
    pub jobs: usize,
    /// Files and directories removed from disk, the root included.
    pub paths_removed: usize,
}

/// Delete a dataset owned by `owner` from the catalog and the data root.
pub fn delete_dataset(
    catalog: &mut Catalog,
    data_root: &Path,
    owner: UserId,
    dataset_id: DatasetId,
) -> Result<DeletionSummary, LabelforgeError> {
    delete_dataset_with(catalog, data_root, owner, dataset_id, remove_entry)
}

fn delete_dataset_with<F>(
    catalog: &mut Catalog,
    data_root: &Path,
    owner: UserId,
    dataset_id: DatasetId,
    remove: F,
) -> Result<DeletionSummary, LabelforgeError>
where
    F: FnMut(&Path, bool) -> io::Result<()>,
{
    let tx = catalog.transaction()?;
    let dataset = datasets::find_owned_dataset(&tx, owner, dataset_id)?;
    let versions = datasets::list_versions(&tx, dataset.id)?;

    let mut summary = DeletionSummary {
        dataset_id: Some(dataset.id),
        versions: versions.len(),
        ..DeletionSummary::default()
    };

    for version in &versions {
        clear_labels(&tx, version, &mut summary)?;
    }

    let root = dataset_dir(data_root, &dataset);
    summary.paths_removed = remove_tree(&root, remove)?;

    for version in &versions {
        summary.jobs += jobs::delete_jobs_for_version(&tx, version.id)?;
        summary.assets += assets::delete_assets_for_version(&tx, version.id)?;
        datasets::delete_version_row(&tx, version.id)?;
    }
    datasets::delete_dataset_row(&tx, dataset.id)?;

    tx.commit()?;

    info!(
        dataset_id = %dataset.id,
        versions = summary.versions,
        assets = summary.assets,
        paths = summary.paths_removed,
        "deleted dataset"
    );
    Ok(summary)
}

/// Annotations of every asset, then the version's label classes.
fn clear_labels(
    conn: &Connection,
    version: &DatasetVersion,
    summary: &mut DeletionSummary,
) -> Result<(), LabelforgeError> {
    for asset in assets::list_assets(conn, version.id)? {
        summary.annotations += labels::delete_annotations_for_asset(conn, asset.id)?;
    }
    summary.label_classes += labels::delete_label_classes(conn, version.id)?;
    debug!(version_id = %version.id, tag = %version.tag, "cleared labels");
    Ok(())
}

/// Remove `root` and everything below it, deepest entries first.
///
/// A missing root is not an error. Stops at the first entry that cannot be
/// removed.
fn remove_tree<F>(root: &Path, mut remove: F) -> Result<usize, LabelforgeError>
where
    F: FnMut(&Path, bool) -> io::Result<()>,
{
    if fs::symlink_metadata(root).is_err() {
        warn!(path = %root.display(), "dataset directory already absent");
        return Ok(0);
    }

    let mut removed = 0;
    for entry in WalkDir::new(root).contents_first(true) {
        let entry = entry.map_err(|err| LabelforgeError::RemoveFailed {
            path: err.path().unwrap_or(root).to_path_buf(),
            source: io::Error::from(err),
        })?;

        let is_dir = entry.file_type().is_dir();
        remove(entry.path(), is_dir).map_err(|source| LabelforgeError::RemoveFailed {
            path: entry.path().to_path_buf(),
            source,
        })?;
        removed += 1;
    }
    Ok(removed)
}

fn remove_entry(path: &Path, is_dir: bool) -> io::Result<()> {
    if is_dir {
        fs::remove_dir(path)
    } else {
        fs::remove_file(path)
    }
}
