//! Asset materialization: getting image files into a version directory.
//!
//! Directory layout under the data root:
//!
//! ```text
//! <data_root>/u<owner>/<dataset_id>_<safe name>/<version tag>/<image files>
//! ```
//!
//! An asset is identified within a version by its display name. Asking for
//! an asset that is already present reuses it without touching the disk.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::annotations::label_path_for;
use crate::catalog::assets::{self, NewAsset};
use crate::error::LabelforgeError;
use crate::model::{Asset, Dataset, DatasetVersion, VersionId};

/// Replace anything outside `[A-Za-z0-9._-]` with `_`.
///
/// Names that would still be special path components (`.`, `..`, empty)
/// become `_`.
pub fn sanitize_file_name(raw: &str) -> String {
    let safe: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    match safe.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => safe,
    }
}

/// Returns true if `tag` can be used verbatim as a directory name.
pub fn is_safe_segment(tag: &str) -> bool {
    !tag.trim().is_empty() && sanitize_file_name(tag) == tag
}

/// Root directory of a dataset.
pub fn dataset_dir(data_root: &Path, dataset: &Dataset) -> PathBuf {
    let name = if dataset.name.trim().is_empty() {
        "dataset"
    } else {
        dataset.name.as_str()
    };
    data_root
        .join(format!("u{}", dataset.owner))
        .join(format!("{}_{}", dataset.id, sanitize_file_name(name)))
}

/// Directory of one version of a dataset.
pub fn version_dir(data_root: &Path, dataset: &Dataset, tag: &str) -> PathBuf {
    dataset_dir(data_root, dataset).join(tag)
}

/// Read the pixel dimensions from an image header.
pub fn probe_image(path: &Path) -> Result<(u32, u32), LabelforgeError> {
    let size = imagesize::size(path).map_err(|source| LabelforgeError::ImageProbe {
        path: path.to_path_buf(),
        source,
    })?;

    let width = u32::try_from(size.width)
        .map_err(|_| LabelforgeError::invalid(format!("{} is too wide", path.display())))?;
    let height = u32::try_from(size.height)
        .map_err(|_| LabelforgeError::invalid(format!("{} is too tall", path.display())))?;
    Ok((width, height))
}

/// Outcome of [`ensure_asset`].
#[derive(Clone, Debug)]
pub enum Materialized {
    /// The target version already had an asset with this name.
    Reused(Asset),
    /// The file was copied and a new asset row created.
    Copied(Asset),
}

impl Materialized {
    pub fn asset(&self) -> &Asset {
        match self {
            Materialized::Reused(asset) | Materialized::Copied(asset) => asset,
        }
    }

    pub fn was_copied(&self) -> bool {
        matches!(self, Materialized::Copied(_))
    }
}

/// Make sure `target` has an asset with the same display name as `source`.
pub fn ensure_asset(
    conn: &Connection,
    source: &Asset,
    target: &DatasetVersion,
    target_dir: &Path,
) -> Result<Materialized, LabelforgeError> {
    let name = source.effective_name();

    if let Some(existing) = assets::find_asset_by_name(conn, target.id, &name)? {
        debug!(asset_id = %existing.id, name = %name, "asset already present in version");
        return Ok(Materialized::Reused(existing));
    }

    let file_name = source
        .storage_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.clone());
    let dest = unique_destination(conn, target.id, target_dir, &sanitize_file_name(&file_name))?;

    copy_file(&source.storage_path, &dest)?;

    let dimensions = match (source.width, source.height) {
        (Some(w), Some(h)) => Some((w, h)),
        _ => None,
    };
    let asset = assets::insert_asset(
        conn,
        &NewAsset {
            version_id: target.id,
            name: &name,
            storage_path: &dest,
            dimensions,
        },
    )?;

    debug!(
        asset_id = %asset.id,
        from = %source.storage_path.display(),
        to = %dest.display(),
        "copied asset into version"
    );
    Ok(Materialized::Copied(asset))
}

/// Register an uploaded file in `version`, skipping names already present.
///
/// Returns `None` when an asset with the same name already exists.
pub fn ingest_file(
    conn: &Connection,
    version: &DatasetVersion,
    version_dir: &Path,
    source: &Path,
    dimensions: (u32, u32),
) -> Result<Option<Asset>, LabelforgeError> {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| {
            LabelforgeError::invalid(format!("{} has no file name", source.display()))
        })?;

    if assets::find_asset_by_name(conn, version.id, &name)?.is_some() {
        debug!(name = %name, "upload skipped, name already present");
        return Ok(None);
    }

    let dest = unique_destination(conn, version.id, version_dir, &sanitize_file_name(&name))?;
    copy_file(source, &dest)?;

    let asset = assets::insert_asset(
        conn,
        &NewAsset {
            version_id: version.id,
            name: &name,
            storage_path: &dest,
            dimensions: Some(dimensions),
        },
    )?;
    info!(asset_id = %asset.id, name = %name, "uploaded asset");
    Ok(Some(asset))
}

/// Pick a path in `dir` for `file_name` whose label file no other asset of
/// the version shares.
///
/// Distinct display names can sanitize to the same file name, and `dog.jpg`
/// and `dog.png` share `dog.txt`; later ones get a numeric suffix on the stem.
fn unique_destination(
    conn: &Connection,
    version_id: VersionId,
    dir: &Path,
    file_name: &str,
) -> Result<PathBuf, LabelforgeError> {
    let taken: HashSet<PathBuf> = assets::storage_paths(conn, version_id)?
        .iter()
        .map(|path| label_path_for(path))
        .collect();
    let is_free = |candidate: &Path| !taken.contains(&label_path_for(candidate));

    let candidate = dir.join(file_name);
    if is_free(&candidate) {
        return Ok(candidate);
    }

    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());

    let mut n = 1u32;
    loop {
        let name = match &ext {
            Some(ext) => format!("{stem}_{n}.{ext}"),
            None => format!("{stem}_{n}"),
        };
        let candidate = dir.join(name);
        if is_free(&candidate) {
            return Ok(candidate);
        }
        n += 1;
    }
}

fn copy_file(from: &Path, to: &Path) -> Result<(), LabelforgeError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(LabelforgeError::Io)?;
    }
    fs::copy(from, to).map_err(|source| LabelforgeError::CopyFailed {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{datasets, Catalog};
    use crate::model::UserId;

    struct Fixture {
        _temp: tempfile::TempDir,
        catalog: Catalog,
        root: PathBuf,
        base: DatasetVersion,
        target: DatasetVersion,
        dataset: Dataset,
    }

    fn fixture() -> Fixture {
        let temp = tempfile::tempdir().expect("create temp dir");
        let root = temp.path().to_path_buf();
        let catalog = Catalog::open_in_memory().expect("open catalog");
        let conn = catalog.connection();
        let dataset = datasets::insert_dataset(conn, UserId(7), "my pets!", None).expect("dataset");
        let base = datasets::insert_version(conn, dataset.id, "v0").expect("v0");
        let target = datasets::insert_version(conn, dataset.id, "v1").expect("v1");
        Fixture {
            _temp: temp,
            catalog,
            root,
            base,
            target,
            dataset,
        }
    }

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_file_name("my cat (1).jpg"), "my_cat__1_.jpg");
        assert_eq!(sanitize_file_name("../../etc"), ".._.._etc");
        assert_eq!(sanitize_file_name(".."), "_");
        assert_eq!(sanitize_file_name(""), "_");
        assert_eq!(sanitize_file_name("ok-name_1.png"), "ok-name_1.png");
    }

    #[test]
    fn version_tags_must_be_safe_segments() {
        assert!(is_safe_segment("v1"));
        assert!(is_safe_segment("v1.2-rc"));
        assert!(!is_safe_segment("../v1"));
        assert!(!is_safe_segment(" "));
        assert!(!is_safe_segment(".."));
    }

    #[test]
    fn dataset_dir_is_scoped_by_owner_and_id() {
        let f = fixture();
        let dir = dataset_dir(&f.root, &f.dataset);
        assert_eq!(
            dir,
            f.root
                .join("u7")
                .join(format!("{}_my_pets_", f.dataset.id))
        );
        assert_eq!(version_dir(&f.root, &f.dataset, "v1"), dir.join("v1"));
    }

    #[test]
    fn ensure_asset_copies_once_then_reuses() {
        let f = fixture();
        let conn = f.catalog.connection();
        let base_dir = version_dir(&f.root, &f.dataset, "v0");
        let target_dir = version_dir(&f.root, &f.dataset, "v1");
        fs::create_dir_all(&base_dir).expect("create base dir");
        fs::write(base_dir.join("dog.jpg"), b"pixels").expect("write image");

        let source = assets::insert_asset(
            conn,
            &NewAsset {
                version_id: f.base.id,
                name: "dog.jpg",
                storage_path: &base_dir.join("dog.jpg"),
                dimensions: Some((2, 2)),
            },
        )
        .expect("source asset");

        let first = ensure_asset(conn, &source, &f.target, &target_dir).expect("first");
        assert!(first.was_copied());
        assert_eq!(first.asset().width, Some(2));
        assert!(target_dir.join("dog.jpg").is_file());

        // Remove the copy: a reuse must not copy again.
        fs::remove_file(target_dir.join("dog.jpg")).expect("remove copy");
        let second = ensure_asset(conn, &source, &f.target, &target_dir).expect("second");
        assert!(!second.was_copied());
        assert_eq!(second.asset().id, first.asset().id);
        assert!(!target_dir.join("dog.jpg").exists());
        assert_eq!(assets::list_assets(conn, f.target.id).unwrap().len(), 1);
    }

    #[test]
    fn colliding_sanitized_names_get_suffixes() {
        let f = fixture();
        let conn = f.catalog.connection();
        let upload_dir = f.root.join("uploads");
        fs::create_dir_all(&upload_dir).expect("create upload dir");
        fs::write(upload_dir.join("a b.jpg"), b"one").expect("write");
        fs::write(upload_dir.join("a_b.jpg"), b"two").expect("write");

        let base_dir = version_dir(&f.root, &f.dataset, "v0");
        let first = ingest_file(conn, &f.base, &base_dir, &upload_dir.join("a b.jpg"), (1, 1))
            .expect("first upload")
            .expect("created");
        let second = ingest_file(conn, &f.base, &base_dir, &upload_dir.join("a_b.jpg"), (1, 1))
            .expect("second upload")
            .expect("created");

        assert_eq!(first.storage_path, base_dir.join("a_b.jpg"));
        assert_eq!(second.storage_path, base_dir.join("a_b_1.jpg"));
        assert_eq!(fs::read(&first.storage_path).unwrap(), b"one");
        assert_eq!(fs::read(&second.storage_path).unwrap(), b"two");
    }

    #[test]
    fn shared_stem_gets_a_suffix() {
        let f = fixture();
        let conn = f.catalog.connection();
        let upload_dir = f.root.join("uploads");
        fs::create_dir_all(&upload_dir).expect("create upload dir");
        fs::write(upload_dir.join("dog.jpg"), b"jpg").expect("write");
        fs::write(upload_dir.join("dog.png"), b"png").expect("write");

        let base_dir = version_dir(&f.root, &f.dataset, "v0");
        let jpg = ingest_file(conn, &f.base, &base_dir, &upload_dir.join("dog.jpg"), (1, 1))
            .expect("jpg upload")
            .expect("created");
        let png = ingest_file(conn, &f.base, &base_dir, &upload_dir.join("dog.png"), (1, 1))
            .expect("png upload")
            .expect("created");

        assert_eq!(jpg.storage_path, base_dir.join("dog.jpg"));
        assert_eq!(png.storage_path, base_dir.join("dog_1.png"));
        assert_eq!(png.name, "dog.png");

        // Copying both into another version keeps the label files apart.
        let target_dir = version_dir(&f.root, &f.dataset, "v1");
        let copied: Vec<PathBuf> = [&jpg, &png]
            .into_iter()
            .map(|source| {
                ensure_asset(conn, source, &f.target, &target_dir)
                    .expect("copy")
                    .asset()
                    .storage_path
                    .clone()
            })
            .collect();
        assert_ne!(label_path_for(&copied[0]), label_path_for(&copied[1]));
    }

    #[test]
    fn copy_failure_is_reported() {
        let f = fixture();
        let conn = f.catalog.connection();
        let source = Asset {
            id: crate::model::AssetId(99),
            version_id: f.base.id,
            name: "ghost.jpg".to_string(),
            storage_path: f.root.join("missing/ghost.jpg"),
            width: None,
            height: None,
            split: None,
        };

        let err = ensure_asset(conn, &source, &f.target, &f.root.join("v1")).unwrap_err();
        assert!(matches!(err, LabelforgeError::CopyFailed { .. }));
        assert!(assets::list_assets(conn, f.target.id).unwrap().is_empty());
    }
}
