#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use labelforge::engine::UploadSummary;
use labelforge::model::{AssetId, DatasetId, UserId};
use labelforge::request::{AnnotationPayload, ImagePayload, SaveRequest};
use labelforge::{Engine, EngineConfig};

pub fn bmp_bytes(width: u32, height: u32) -> Vec<u8> {
    let row_stride = (width * 3).div_ceil(4) * 4;
    let pixel_array_size = row_stride * height;
    let file_size = 54 + pixel_array_size;

    let mut bytes = Vec::with_capacity(file_size as usize);
    bytes.extend_from_slice(b"BM");
    bytes.extend_from_slice(&file_size.to_le_bytes());
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    bytes.extend_from_slice(&54u32.to_le_bytes());

    bytes.extend_from_slice(&40u32.to_le_bytes());
    bytes.extend_from_slice(&(width as i32).to_le_bytes());
    bytes.extend_from_slice(&(height as i32).to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&24u16.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&pixel_array_size.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());

    bytes.resize(file_size as usize, 0);
    bytes
}

pub fn write_bmp(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, bmp_bytes(width, height)).expect("write bmp file");
}

pub const OWNER: UserId = UserId(1);

/// A temp directory with an engine rooted in it.
pub struct Workspace {
    pub temp: tempfile::TempDir,
    pub engine: Engine,
}

pub fn workspace() -> Workspace {
    workspace_with(|config| config)
}

pub fn workspace_with(customize: impl FnOnce(EngineConfig) -> EngineConfig) -> Workspace {
    let temp = tempfile::tempdir().expect("create temp dir");
    let config = customize(EngineConfig::new(temp.path().join("data")));
    Workspace {
        engine: Engine::new(config),
        temp,
    }
}

impl Workspace {
    pub fn data_root(&self) -> &Path {
        &self.engine.config().data_root
    }

    /// Write small BMP files into an incoming directory outside the data root.
    pub fn incoming(&self, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = self.temp.path().join("incoming").join(name);
                write_bmp(&path, 4, 3);
                path
            })
            .collect()
    }

    pub fn upload(&self, dataset: &str, names: &[&str]) -> UploadSummary {
        let files = self.incoming(names);
        self.engine
            .upload(OWNER, dataset, None, &files)
            .expect("upload")
    }

    /// Upload `n` images named `img_<i>.bmp` and return the dataset id and asset ids.
    pub fn upload_numbered(&self, dataset: &str, n: usize) -> (DatasetId, Vec<AssetId>) {
        let names: Vec<String> = (0..n).map(|i| format!("img_{i}.bmp")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let summary = self.upload(dataset, &refs);
        let ids = summary.uploaded.iter().map(|a| a.id).collect();
        (summary.dataset.id, ids)
    }
}

pub fn bbox(x: f64, y: f64, w: f64, h: f64, label: &str) -> AnnotationPayload {
    AnnotationPayload {
        x_center: x,
        y_center: y,
        width: w,
        height: h,
        label: label.to_string(),
    }
}

pub fn image(id: AssetId, annotations: Vec<AnnotationPayload>) -> ImagePayload {
    ImagePayload {
        image_id: Some(id.as_i64()),
        annotations,
    }
}

pub fn save_request(dataset: DatasetId, tag: &str, images: Vec<ImagePayload>) -> SaveRequest {
    SaveRequest {
        dataset_id: Some(dataset.as_i64()),
        version_tag: Some(tag.to_string()),
        images,
    }
}

pub fn count_files(dir: &Path) -> usize {
    fs::read_dir(dir).map(|rd| rd.count()).unwrap_or(0)
}
