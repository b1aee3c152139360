//! Annotation replacement and label-file rendering.
//!
//! Saving an image's annotations always replaces the whole set: existing
//! rows are deleted, the incoming boxes are inserted, and the sibling label
//! file is rewritten from scratch. One line per box:
//!
//! ```text
//! <class_id> <x_center> <y_center> <width> <height>
//! ```
//!
//! with six decimals per float. An image without boxes has no label file.
//!
//! Label files are written before the catalog transaction commits. Every
//! file a save touches is recorded in a [`LabelJournal`] first, so a failed
//! save can put the files back the way the rolled-back catalog describes them.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::catalog::labels;
use crate::error::LabelforgeError;
use crate::model::{Asset, ClassId, NormalizedBox};
use crate::registry::LabelRegistry;

const LABEL_EXTENSION: &str = "txt";

/// One incoming box with its label name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabelledBox {
    pub label: String,
    pub bbox: NormalizedBox,
}

impl LabelledBox {
    pub fn new(label: impl Into<String>, bbox: NormalizedBox) -> Self {
        Self {
            label: label.into(),
            bbox,
        }
    }
}

/// Label file path for an image: same directory and stem, `.txt` extension.
pub fn label_path_for(image_path: &Path) -> PathBuf {
    image_path.with_extension(LABEL_EXTENSION)
}

/// Render one label-file line.
pub fn render_line(class_id: ClassId, bbox: &NormalizedBox) -> String {
    format!(
        "{} {:.6} {:.6} {:.6} {:.6}",
        class_id, bbox.x_center, bbox.y_center, bbox.width, bbox.height
    )
}

/// Label files touched by one save, with what they held before it.
#[derive(Debug, Default)]
pub struct LabelJournal {
    entries: Vec<(PathBuf, Option<Vec<u8>>)>,
    seen: HashSet<PathBuf>,
}

impl LabelJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the current contents of `path`. Only the first call per path counts.
    pub fn record(&mut self, path: &Path) -> Result<(), LabelforgeError> {
        if self.seen.contains(path) {
            return Ok(());
        }
        let previous = match fs::read(path) {
            Ok(bytes) => Some(bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(source) => {
                return Err(LabelforgeError::LabelWrite {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        self.seen.insert(path.to_path_buf());
        self.entries.push((path.to_path_buf(), previous));
        Ok(())
    }

    /// Remember a file this save created, so a restore removes it.
    pub fn record_created(&mut self, path: &Path) {
        if self.seen.insert(path.to_path_buf()) {
            self.entries.push((path.to_path_buf(), None));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Put every recorded file back, newest first.
    ///
    /// A file that did not exist is removed. Returns the paths that could
    /// not be restored; each is logged.
    pub fn restore(self) -> Vec<PathBuf> {
        let mut failed = Vec::new();
        for (path, previous) in self.entries.into_iter().rev() {
            let result = match &previous {
                Some(bytes) => write_atomic(&path, bytes),
                None => remove_if_present(&path),
            };
            if let Err(err) = result {
                warn!(path = %path.display(), error = %err, "could not restore label file");
                failed.push(path);
            }
        }
        failed
    }
}

/// Replace all annotations of `asset` with `boxes` and rewrite its label file.
///
/// Label names are resolved through `registry`, which allocates and persists
/// classes for names it has not seen. The label file's previous contents go
/// to `journal` before it is touched. Returns the rendered lines.
pub fn replace(
    conn: &Connection,
    asset: &Asset,
    boxes: &[LabelledBox],
    registry: &mut LabelRegistry,
    journal: &mut LabelJournal,
) -> Result<Vec<String>, LabelforgeError> {
    let removed = labels::delete_annotations_for_asset(conn, asset.id)?;
    let label_path = label_path_for(&asset.storage_path);
    journal.record(&label_path)?;

    let mut lines = Vec::with_capacity(boxes.len());
    for item in boxes {
        let class_id = registry.resolve_and_persist(conn, &item.label)?;
        labels::insert_annotation(
            conn,
            asset.id,
            asset.version_id,
            class_id,
            &item.bbox,
            &label_path,
        )?;
        lines.push(render_line(class_id, &item.bbox));
    }

    write_label_file(&label_path, &lines)?;

    debug!(
        asset_id = %asset.id,
        removed,
        written = lines.len(),
        "replaced annotations"
    );
    Ok(lines)
}

/// Write `lines` to `path`, or delete `path` when there are no lines.
///
/// The content goes to a temporary file in the same directory which is then
/// renamed over `path`, so readers never see a half-written file.
pub fn write_label_file(path: &Path, lines: &[String]) -> Result<(), LabelforgeError> {
    let result = if lines.is_empty() {
        remove_if_present(path)
    } else {
        let mut content = String::new();
        for line in lines {
            content.push_str(line);
            content.push('\n');
        }
        write_atomic(path, content.as_bytes())
    };

    result.map_err(|source| LabelforgeError::LabelWrite {
        path: path.to_path_buf(),
        source,
    })
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
