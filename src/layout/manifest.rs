//! The `data.yaml` manifest consumed by the trainer.
//!
//! ```yaml
//! train: images/train
//! val: images/val
//! test: images/test
//! nc: 2
//! names:
//! - dog
//! - cat
//! ```
//!
//! `names` is positional: index `i` is class id `i`.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::LabelforgeError;
use crate::split::Split;

pub const MANIFEST_FILE_NAME: &str = "data.yaml";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub train: String,
    pub val: String,
    pub test: String,
    pub nc: usize,
    pub names: Vec<String>,
}

impl Manifest {
    /// Manifest for the standard split directories and the given ordered names.
    pub fn new(names: Vec<String>) -> Self {
        let dir = |split: Split| format!("images/{split}");
        Self {
            train: dir(Split::Train),
            val: dir(Split::Val),
            test: dir(Split::Test),
            nc: names.len(),
            names,
        }
    }
}

/// Atomically write `manifest` to `<version_dir>/data.yaml`.
pub fn write_manifest(version_dir: &Path, manifest: &Manifest) -> Result<(), LabelforgeError> {
    let path = version_dir.join(MANIFEST_FILE_NAME);
    let manifest_err = |message: String| LabelforgeError::ManifestWrite {
        path: path.clone(),
        message,
    };

    let yaml = serde_yaml::to_string(manifest).map_err(|e| manifest_err(e.to_string()))?;

    let mut tmp = NamedTempFile::new_in(version_dir).map_err(|e| manifest_err(e.to_string()))?;
    tmp.write_all(yaml.as_bytes())
        .map_err(|e| manifest_err(e.to_string()))?;
    tmp.persist(&path)
        .map_err(|e| manifest_err(e.error.to_string()))?;
    Ok(())
}

/// Read a manifest file.
pub fn read_manifest(path: &Path) -> Result<Manifest, LabelforgeError> {
    let data = fs::read_to_string(path).map_err(LabelforgeError::Io)?;
    serde_yaml::from_str(&data).map_err(|source| LabelforgeError::ManifestParse {
        path: path.to_path_buf(),
        source,
    })
}
