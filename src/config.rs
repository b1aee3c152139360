//! Engine configuration.

use std::path::PathBuf;

use crate::layout::LayoutOptions;
use crate::split::{ShuffleMode, SplitRatios};

/// Default data root, relative to the working directory.
pub const DEFAULT_DATA_ROOT: &str = "labelforge-data";

/// Default catalog file name inside the data root.
pub const DEFAULT_CATALOG_FILE: &str = "catalog.db";

/// Where the engine keeps its files and how it partitions versions.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Root of the per-user dataset trees.
    pub data_root: PathBuf,
    /// SQLite catalog file.
    pub catalog_path: PathBuf,
    pub ratios: SplitRatios,
    pub shuffle: ShuffleMode,
}

impl EngineConfig {
    /// Config rooted at `data_root`, with the catalog stored inside it.
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        let data_root = data_root.into();
        Self {
            catalog_path: data_root.join(DEFAULT_CATALOG_FILE),
            data_root,
            ratios: SplitRatios::default(),
            shuffle: ShuffleMode::default(),
        }
    }

    pub fn with_catalog(mut self, catalog_path: impl Into<PathBuf>) -> Self {
        self.catalog_path = catalog_path.into();
        self
    }

    pub fn with_ratios(mut self, ratios: SplitRatios) -> Self {
        self.ratios = ratios;
        self
    }

    pub fn with_shuffle(mut self, shuffle: ShuffleMode) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn layout_options(&self) -> LayoutOptions {
        LayoutOptions {
            ratios: self.ratios,
            shuffle: self.shuffle,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_ROOT)
    }
}
