//! Training job rows.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{from_millis, now_millis};
use crate::error::LabelforgeError;
use crate::model::{JobId, UserId, VersionId};
use crate::training::{Hyperparams, JobStatus, ModelSpec, TrainJob};

const JOB_COLUMNS: &str = "id, owner_id, version_id, model_type, model_base, model_size, \
     epochs, batch_size, learning_rate, optimizer, status, result_model_path, error_message, \
     created_at, updated_at";

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<TrainJob> {
    let status: String = row.get(10)?;
    Ok(TrainJob {
        id: JobId(row.get(0)?),
        owner: UserId(row.get(1)?),
        version_id: VersionId(row.get(2)?),
        model: ModelSpec {
            kind: row.get(3)?,
            base: row.get(4)?,
            size: row.get(5)?,
        },
        hyperparams: Hyperparams {
            epochs: row.get(6)?,
            batch_size: row.get(7)?,
            learning_rate: row.get(8)?,
            optimizer: row.get(9)?,
        },
        status: status.parse().unwrap_or(JobStatus::Failed),
        result_model_path: row.get(11)?,
        error_message: row.get(12)?,
        created_at: from_millis(row.get(13)?),
        updated_at: from_millis(row.get(14)?),
    })
}

pub fn insert_job(
    conn: &Connection,
    owner: UserId,
    version_id: VersionId,
    model: &ModelSpec,
    hyperparams: &Hyperparams,
) -> Result<TrainJob, LabelforgeError> {
    let now = now_millis();
    conn.execute(
        "INSERT INTO train_jobs (owner_id, version_id, model_type, model_base, model_size,
             epochs, batch_size, learning_rate, optimizer, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        params![
            owner.as_i64(),
            version_id.as_i64(),
            model.kind,
            model.base,
            model.size,
            hyperparams.epochs,
            hyperparams.batch_size,
            hyperparams.learning_rate,
            hyperparams.optimizer,
            JobStatus::Queued.as_str(),
            now,
        ],
    )?;

    Ok(TrainJob {
        id: JobId(conn.last_insert_rowid()),
        owner,
        version_id,
        model: model.clone(),
        hyperparams: hyperparams.clone(),
        status: JobStatus::Queued,
        result_model_path: None,
        error_message: None,
        created_at: from_millis(now),
        updated_at: from_millis(now),
    })
}

pub fn find_job(conn: &Connection, id: JobId) -> Result<Option<TrainJob>, LabelforgeError> {
    let sql = format!("SELECT {JOB_COLUMNS} FROM train_jobs WHERE id = ?1");
    Ok(conn
        .query_row(&sql, params![id.as_i64()], job_from_row)
        .optional()?)
}

/// Persist status, result path and error message of `job`, bumping `updated_at`.
pub fn update_job(conn: &Connection, job: &mut TrainJob) -> Result<(), LabelforgeError> {
    let now = now_millis();
    conn.execute(
        "UPDATE train_jobs SET status = ?1, result_model_path = ?2, error_message = ?3, updated_at = ?4
         WHERE id = ?5",
        params![
            job.status.as_str(),
            job.result_model_path,
            job.error_message,
            now,
            job.id.as_i64(),
        ],
    )?;
    job.updated_at = from_millis(now);
    Ok(())
}

pub fn delete_jobs_for_version(
    conn: &Connection,
    version_id: VersionId,
) -> Result<usize, LabelforgeError> {
    Ok(conn.execute(
        "DELETE FROM train_jobs WHERE version_id = ?1",
        params![version_id.as_i64()],
    )?)
}
