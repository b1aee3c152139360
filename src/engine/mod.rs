//! The engine: request-level operations over the catalog and the data root.
//!
//! Every operation opens its own catalog connection. Mutating operations
//! take the lock of each version directory they write, then one IMMEDIATE
//! transaction, do all filesystem work, and commit last. Any error drops
//! the transaction, which rolls the catalog back. A failed save also removes
//! a version directory it created, or puts back the label files and image
//! copies it touched in an existing one.

mod locks;

pub use locks::VersionLocks;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::annotations::{self, LabelJournal, LabelledBox};
use crate::assets::{ensure_asset, ingest_file, probe_image, version_dir};
use crate::catalog::{assets, datasets, jobs, labels, Catalog};
use crate::config::EngineConfig;
use crate::error::LabelforgeError;
use crate::gc::{self, DeletionSummary};
use crate::layout;
use crate::model::{
    Asset, AssetId, ClassId, Dataset, DatasetId, DatasetVersion, JobId, LabelClass,
    NormalizedBox, SplitStats, UserId, BASE_VERSION_TAG,
};
use crate::registry::LabelRegistry;
use crate::request::{AnnotationPayload, ImagePayload, SaveRequest};
use crate::split::SplitCounts;
use crate::training::{
    DispatchPayload, JobStatus, TrainCallback, TrainJob, TrainRequest, TrainingDispatcher,
};
use crate::validation;

/// Result of [`Engine::upload`].
#[derive(Clone, Debug, Serialize)]
pub struct UploadSummary {
    pub dataset: Dataset,
    pub version: DatasetVersion,
    pub dataset_created: bool,
    pub uploaded: Vec<Asset>,
    /// Names already present in the base version.
    pub skipped: Vec<String>,
}

/// Result of [`Engine::save`].
#[derive(Clone, Debug, Serialize)]
pub struct SaveSummary {
    pub dataset_id: DatasetId,
    /// The saved version, with the statistics of this materialization.
    pub version: DatasetVersion,
    pub version_created: bool,
    pub images_processed: usize,
    /// Entries without an image id.
    pub images_skipped: usize,
    pub assets_copied: usize,
    pub assets_reused: usize,
    pub annotations_written: usize,
    pub classes_created: usize,
    pub counts: SplitCounts,
    /// Warning-level validation issues.
    pub warnings: usize,
}

/// One annotation with its label name resolved.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnnotationView {
    pub class_id: ClassId,
    pub label: String,
    pub bbox: NormalizedBox,
}

#[derive(Clone, Debug, Serialize)]
pub struct AssetDetail {
    #[serde(flatten)]
    pub asset: Asset,
    pub annotations: Vec<AnnotationView>,
}

/// Result of [`Engine::dataset_detail`].
#[derive(Clone, Debug, Serialize)]
pub struct DatasetDetail {
    pub dataset: Dataset,
    pub version: DatasetVersion,
    pub classes: Vec<LabelClass>,
    pub assets: Vec<AssetDetail>,
}

/// One entry of [`Engine::list_datasets`].
#[derive(Clone, Debug, Serialize)]
pub struct DatasetOverview {
    pub dataset: Dataset,
    pub versions: Vec<DatasetVersion>,
}

/// Request-level operations. Cheap to clone; clones share the version locks.
#[derive(Clone, Debug)]
pub struct Engine {
    config: EngineConfig,
    locks: Arc<VersionLocks>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            locks: Arc::new(VersionLocks::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn open_catalog(&self) -> Result<Catalog, LabelforgeError> {
        Catalog::open(&self.config.catalog_path)
    }

    /// Upload image files into the base version of the dataset named `name`.
    ///
    /// The dataset and its base version are created on first use. Files
    /// whose name is already present are skipped. Every file's image header
    /// is read before anything is written.
    pub fn upload(
        &self,
        owner: UserId,
        name: &str,
        description: Option<&str>,
        files: &[PathBuf],
    ) -> Result<UploadSummary, LabelforgeError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LabelforgeError::invalid("dataset name must not be empty"));
        }
        if files.is_empty() {
            return Err(LabelforgeError::invalid("no files to upload"));
        }

        let probed = files
            .iter()
            .map(|path| probe_image(path).map(|dims| (path.as_path(), dims)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut catalog = self.open_catalog()?;

        // A dataset that does not exist yet cannot have concurrent savers.
        let existing = datasets::find_dataset_by_name(catalog.connection(), owner, name)?;
        let lock = existing.as_ref().map(|dataset| {
            self.locks
                .handle(&version_dir(&self.config.data_root, dataset, BASE_VERSION_TAG))
        });
        let _guard = lock.as_ref().map(|lock| lock.lock());

        let tx = catalog.transaction()?;
        let (dataset, dataset_created) = match datasets::find_dataset_by_name(&tx, owner, name)? {
            Some(dataset) => (dataset, false),
            None => (
                datasets::insert_dataset(&tx, owner, name, description)?,
                true,
            ),
        };
        let (version, _) = datasets::find_or_insert_version(&tx, dataset.id, BASE_VERSION_TAG)?;
        let dir = version_dir(&self.config.data_root, &dataset, &version.tag);

        let mut uploaded = Vec::new();
        let mut skipped = Vec::new();
        let outcome = ingest_all(&tx, &version, &dir, &probed, &mut uploaded, &mut skipped)
            .and_then(|()| tx.commit().map_err(LabelforgeError::from));
        if let Err(err) = outcome {
            for asset in &uploaded {
                discard_file(&asset.storage_path);
            }
            return Err(err);
        }

        info!(
            dataset_id = %dataset.id,
            uploaded = uploaded.len(),
            skipped = skipped.len(),
            "upload finished"
        );
        Ok(UploadSummary {
            dataset,
            version,
            dataset_created,
            uploaded,
            skipped,
        })
    }

    /// Apply a save request and rebuild the version's training layout.
    pub fn save(&self, owner: UserId, request: &SaveRequest) -> Result<SaveSummary, LabelforgeError> {
        let report = validation::ensure_valid(request)?;
        for issue in &report.issues {
            warn!(%issue, "save request warning");
        }

        let (dataset_id, tag) = match (request.dataset_id, request.version_tag.as_deref()) {
            (Some(id), Some(tag)) => (DatasetId(id), tag),
            _ => {
                return Err(LabelforgeError::invalid(
                    "datasetId and versionTag are required",
                ))
            }
        };

        let mut catalog = self.open_catalog()?;
        let dataset = datasets::find_owned_dataset(catalog.connection(), owner, dataset_id)?;
        let dir = version_dir(&self.config.data_root, &dataset, tag);
        let lock = self.locks.handle(&dir);
        let _guard = lock.lock();

        let tx = catalog.transaction()?;
        let dataset = datasets::find_owned_dataset(&tx, owner, dataset_id)?;
        let sources = resolve_sources(&tx, &dataset, &request.images)?;
        let (version, version_created) = datasets::find_or_insert_version(&tx, dataset.id, tag)?;

        let mut journal = LabelJournal::new();
        let outcome = self
            .populate(&tx, &version, &dir, &sources, &mut journal)
            .and_then(|summary| tx.commit().map(|()| summary).map_err(LabelforgeError::from));

        let mut summary = match outcome {
            Ok(summary) => summary,
            Err(err) => {
                if version_created {
                    discard_dir(&dir);
                } else {
                    let touched = journal.len();
                    let failed = journal.restore();
                    debug!(
                        path = %dir.display(),
                        touched,
                        failed = failed.len(),
                        "restored files of failed save"
                    );
                }
                return Err(err);
            }
        };

        summary.dataset_id = dataset.id;
        summary.version_created = version_created;
        summary.images_skipped = request.images.len() - sources.len();
        summary.warnings = report.warning_count();

        info!(
            dataset_id = %dataset.id,
            tag = %summary.version.tag,
            images = summary.images_processed,
            copied = summary.assets_copied,
            classes_created = summary.classes_created,
            counts = %summary.counts,
            "saved version"
        );
        Ok(summary)
    }

    /// Materialize assets and annotations for every source, then the layout.
    fn populate(
        &self,
        conn: &Connection,
        version: &DatasetVersion,
        dir: &Path,
        sources: &[(Asset, &ImagePayload)],
        journal: &mut LabelJournal,
    ) -> Result<SaveSummary, LabelforgeError> {
        fs::create_dir_all(dir)?;
        let mut registry = LabelRegistry::load(conn, version.id)?;

        let mut assets_copied = 0;
        let mut assets_reused = 0;
        let mut annotations_written = 0;

        for (source, image) in sources {
            let materialized = ensure_asset(conn, source, version, dir)?;
            if materialized.was_copied() {
                journal.record_created(&materialized.asset().storage_path);
                assets_copied += 1;
            } else {
                assets_reused += 1;
            }

            let boxes: Vec<LabelledBox> = image
                .annotations
                .iter()
                .map(AnnotationPayload::to_labelled_box)
                .collect();
            let lines = annotations::replace(
                conn,
                materialized.asset(),
                &boxes,
                &mut registry,
                journal,
            )?;
            annotations_written += lines.len();
        }

        let options = self.config.layout_options();
        let counts = layout::materialize(conn, version, dir, &registry, &options)?;

        Ok(SaveSummary {
            dataset_id: version.dataset_id,
            version: DatasetVersion {
                stats: Some(SplitStats {
                    counts,
                    ratios: options.ratios,
                }),
                ..version.clone()
            },
            version_created: false,
            images_processed: sources.len(),
            images_skipped: 0,
            assets_copied,
            assets_reused,
            annotations_written,
            classes_created: registry.allocated_count(),
            counts,
            warnings: 0,
        })
    }

    /// Delete a dataset with all its versions from the catalog and the disk.
    pub fn delete_dataset(
        &self,
        owner: UserId,
        dataset_id: DatasetId,
    ) -> Result<DeletionSummary, LabelforgeError> {
        let mut catalog = self.open_catalog()?;
        let dataset = datasets::find_owned_dataset(catalog.connection(), owner, dataset_id)?;
        let dirs: Vec<PathBuf> = datasets::list_versions(catalog.connection(), dataset.id)?
            .iter()
            .map(|version| version_dir(&self.config.data_root, &dataset, &version.tag))
            .collect();

        let handles = self.locks.handles(dirs.iter().map(PathBuf::as_path));
        let _guards: Vec<_> = handles.iter().map(|lock| lock.lock()).collect();

        gc::delete_dataset(&mut catalog, &self.config.data_root, owner, dataset_id)
    }

    /// One version with its classes, assets and annotations.
    pub fn dataset_detail(
        &self,
        owner: UserId,
        dataset_id: DatasetId,
        tag: &str,
    ) -> Result<DatasetDetail, LabelforgeError> {
        let catalog = self.open_catalog()?;
        let conn = catalog.connection();

        let dataset = datasets::find_owned_dataset(conn, owner, dataset_id)?;
        let version = datasets::find_version_by_tag(conn, dataset.id, tag)?
            .ok_or_else(|| LabelforgeError::not_found("version", tag))?;
        let classes = labels::load_label_classes(conn, version.id)?;
        let registry = LabelRegistry::from_classes(version.id, &classes);

        let assets = assets::list_assets(conn, version.id)?
            .into_iter()
            .map(|asset| -> Result<AssetDetail, LabelforgeError> {
                let annotations = labels::list_annotations(conn, asset.id)?
                    .into_iter()
                    .map(|annotation| AnnotationView {
                        class_id: annotation.class_id,
                        label: registry
                            .name_of(annotation.class_id)
                            .map(str::to_string)
                            .unwrap_or_default(),
                        bbox: annotation.bbox,
                    })
                    .collect();
                Ok(AssetDetail { asset, annotations })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DatasetDetail {
            dataset,
            version,
            classes,
            assets,
        })
    }

    /// Every dataset of `owner` with its versions.
    pub fn list_datasets(&self, owner: UserId) -> Result<Vec<DatasetOverview>, LabelforgeError> {
        let catalog = self.open_catalog()?;
        let conn = catalog.connection();

        datasets::list_datasets(conn, owner)?
            .into_iter()
            .map(|dataset| -> Result<DatasetOverview, LabelforgeError> {
                let versions = datasets::list_versions(conn, dataset.id)?;
                Ok(DatasetOverview { dataset, versions })
            })
            .collect()
    }

    /// Record a training job and hand it to `dispatcher`.
    ///
    /// The job is stored as queued before the call. A dispatcher failure
    /// marks the job failed; it is not an error of this call.
    pub fn start_training(
        &self,
        owner: UserId,
        request: &TrainRequest,
        dispatcher: &dyn TrainingDispatcher,
    ) -> Result<TrainJob, LabelforgeError> {
        if request.hyperparams.epochs == 0 || request.hyperparams.batch_size == 0 {
            return Err(LabelforgeError::invalid(
                "epochs and batchSize must be positive",
            ));
        }

        let mut catalog = self.open_catalog()?;
        let mut job = {
            let tx = catalog.transaction()?;
            let dataset = datasets::find_owned_dataset(&tx, owner, DatasetId(request.dataset_id))?;
            let version = datasets::find_version_by_tag(&tx, dataset.id, &request.dataset_version)?
                .ok_or_else(|| LabelforgeError::not_found("version", &request.dataset_version))?;
            let job = jobs::insert_job(
                &tx,
                owner,
                version.id,
                &request.model,
                &request.hyperparams,
            )?;
            tx.commit()?;
            job
        };

        let payload = DispatchPayload {
            job_id: job.id,
            dataset_id: request.dataset_id,
            dataset_version: request.dataset_version.clone(),
            model: request.model.clone(),
            hyperparams: request.hyperparams.clone(),
        };

        match dispatcher.dispatch(&payload) {
            Ok(()) => {
                job.status = JobStatus::Running;
                info!(job_id = %job.id, "training dispatched");
            }
            Err(err) => {
                job.status = JobStatus::Failed;
                job.error_message = Some(format!("training service call failed: {err}"));
                warn!(job_id = %job.id, error = %err, "training dispatch failed");
            }
        }
        jobs::update_job(catalog.connection(), &mut job)?;
        Ok(job)
    }

    /// Apply the training service's report for a job.
    pub fn handle_callback(&self, callback: &TrainCallback) -> Result<TrainJob, LabelforgeError> {
        let status: JobStatus = callback.status.parse()?;

        let catalog = self.open_catalog()?;
        let conn = catalog.connection();
        let mut job = jobs::find_job(conn, JobId(callback.job_id))?
            .ok_or_else(|| LabelforgeError::not_found("job", callback.job_id))?;

        job.status = status;
        match status {
            JobStatus::Success => job.result_model_path = callback.result_model_path.clone(),
            JobStatus::Failed => job.error_message = callback.error_message.clone(),
            JobStatus::Queued | JobStatus::Running => {}
        }
        jobs::update_job(conn, &mut job)?;

        info!(job_id = %job.id, status = %job.status, "training callback applied");
        Ok(job)
    }

    /// A job, if `owner` started it.
    pub fn job_for_owner(&self, owner: UserId, job_id: JobId) -> Result<TrainJob, LabelforgeError> {
        let catalog = self.open_catalog()?;
        match jobs::find_job(catalog.connection(), job_id)? {
            Some(job) if job.owner == owner => Ok(job),
            _ => Err(LabelforgeError::not_found("job", job_id)),
        }
    }
}

/// Look up the asset behind every image entry, skipping entries without an id.
///
/// An asset of another dataset is reported as not found.
fn resolve_sources<'r>(
    conn: &Connection,
    dataset: &Dataset,
    images: &'r [ImagePayload],
) -> Result<Vec<(Asset, &'r ImagePayload)>, LabelforgeError> {
    let mut sources = Vec::with_capacity(images.len());
    for image in images {
        let Some(raw_id) = image.image_id else {
            continue;
        };
        let asset = assets::find_asset(conn, AssetId(raw_id))?
            .ok_or_else(|| LabelforgeError::not_found("asset", raw_id))?;
        let owning = datasets::find_version(conn, asset.version_id)?;
        if owning.map(|v| v.dataset_id) != Some(dataset.id) {
            return Err(LabelforgeError::not_found("asset", raw_id));
        }
        sources.push((asset, image));
    }
    Ok(sources)
}

fn ingest_all(
    conn: &Connection,
    version: &DatasetVersion,
    dir: &Path,
    files: &[(&Path, (u32, u32))],
    uploaded: &mut Vec<Asset>,
    skipped: &mut Vec<String>,
) -> Result<(), LabelforgeError> {
    for (path, dimensions) in files {
        match ingest_file(conn, version, dir, path, *dimensions)? {
            Some(asset) => uploaded.push(asset),
            None => skipped.push(
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            ),
        }
    }
    Ok(())
}

/// Remove a directory created by a request that then failed.
fn discard_dir(dir: &Path) {
    match fs::remove_dir_all(dir) {
        Ok(()) => debug!(path = %dir.display(), "removed directory of failed request"),
        Err(err) => warn!(path = %dir.display(), error = %err, "could not remove directory"),
    }
}

fn discard_file(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %err, "could not remove file");
    }
}
