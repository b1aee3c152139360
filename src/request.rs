//! Wire shape of a save request.
//!
//! ```json
//! {
//!   "datasetId": 3,
//!   "versionTag": "v1",
//!   "images": [
//!     {"imageId": 17, "annotations": [
//!       {"xCenter": 0.5, "yCenter": 0.5, "width": 0.2, "height": 0.3, "label": "dog"}
//!     ]}
//!   ]
//! }
//! ```
//!
//! Top-level ids are optional at the type level so that a missing field is
//! reported by validation rather than as an opaque parse error.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::annotations::LabelledBox;
use crate::error::LabelforgeError;
use crate::model::NormalizedBox;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    #[serde(default)]
    pub dataset_id: Option<i64>,

    #[serde(default, alias = "version")]
    pub version_tag: Option<String>,

    #[serde(default, alias = "annotations")]
    pub images: Vec<ImagePayload>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    #[serde(default)]
    pub image_id: Option<i64>,

    #[serde(default)]
    pub annotations: Vec<AnnotationPayload>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationPayload {
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
    pub label: String,
}

impl AnnotationPayload {
    pub fn bbox(&self) -> NormalizedBox {
        NormalizedBox::new(self.x_center, self.y_center, self.width, self.height)
    }

    pub fn to_labelled_box(&self) -> LabelledBox {
        LabelledBox::new(self.label.trim(), self.bbox())
    }
}

impl SaveRequest {
    /// Read a request from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, LabelforgeError> {
        let data = fs::read_to_string(path).map_err(LabelforgeError::Io)?;
        serde_json::from_str(&data).map_err(|source| LabelforgeError::RequestParse {
            path: path.to_path_buf(),
            source,
        })
    }
}
