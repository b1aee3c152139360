//! Hand-off to the external training service.
//!
//! The engine records a job row, calls a [`TrainingDispatcher`] with the
//! finalized dataset version, and later applies the service's callback.
//! Training itself happens elsewhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::error::LabelforgeError;
use crate::model::{JobId, UserId, VersionId};

/// Lifecycle of a training job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Queued,
    Running,
    Success,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::Running => "RUNNING",
            JobStatus::Success => "SUCCESS",
            JobStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = LabelforgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "QUEUED" => Ok(JobStatus::Queued),
            "RUNNING" => Ok(JobStatus::Running),
            "SUCCESS" => Ok(JobStatus::Success),
            "FAILED" => Ok(JobStatus::Failed),
            _ => Err(LabelforgeError::invalid(format!("unknown job status '{s}'"))),
        }
    }
}

/// Which model to train.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Task family, e.g. `object-detection`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Model family, e.g. `yolov8`.
    pub base: String,
    /// Size variant, e.g. `n`.
    pub size: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hyperparams {
    pub epochs: u32,
    pub batch_size: u32,
    pub learning_rate: f64,
    pub optimizer: String,
}

/// Caller's request to train on a dataset version.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainRequest {
    pub dataset_id: i64,
    pub dataset_version: String,
    pub model: ModelSpec,
    pub hyperparams: Hyperparams,
}

/// Body sent to the training service.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchPayload {
    pub job_id: JobId,
    pub dataset_id: i64,
    pub dataset_version: String,
    pub model: ModelSpec,
    pub hyperparams: Hyperparams,
}

/// Asynchronous result reported back by the training service.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainCallback {
    pub job_id: i64,
    pub status: String,
    #[serde(default)]
    pub result_model_path: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// A recorded training job.
#[derive(Clone, Debug, Serialize)]
pub struct TrainJob {
    pub id: JobId,
    pub owner: UserId,
    pub version_id: VersionId,
    pub model: ModelSpec,
    pub hyperparams: Hyperparams,
    pub status: JobStatus,
    pub result_model_path: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Failure reported by a dispatcher when the service could not be reached.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct DispatchError(pub String);

/// The remote training service.
pub trait TrainingDispatcher {
    /// Ask the service to start training. Returning `Ok` means the request was accepted.
    fn dispatch(&self, payload: &DispatchPayload) -> Result<(), DispatchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parsing_is_case_insensitive() {
        assert_eq!("success".parse::<JobStatus>().unwrap(), JobStatus::Success);
        assert_eq!("FAILED".parse::<JobStatus>().unwrap(), JobStatus::Failed);
        assert!("done".parse::<JobStatus>().is_err());
    }

    #[test]
    fn request_uses_camel_case_fields() {
        let raw = r#"{
            "datasetId": 3,
            "datasetVersion": "v1",
            "model": {"type": "object-detection", "base": "yolov8", "size": "n"},
            "hyperparams": {"epochs": 10, "batchSize": 16, "learningRate": 0.001, "optimizer": "adam"}
        }"#;
        let request: TrainRequest = serde_json::from_str(raw).expect("parse request");
        assert_eq!(request.dataset_version, "v1");
        assert_eq!(request.model.kind, "object-detection");
        assert_eq!(request.hyperparams.batch_size, 16);
    }
}
