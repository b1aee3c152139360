//! Dataset and version rows.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{from_millis, now_millis};
use crate::error::LabelforgeError;
use crate::model::{Dataset, DatasetId, DatasetVersion, SplitStats, UserId, VersionId};
use crate::split::{SplitCounts, SplitRatios};

const DATASET_COLUMNS: &str = "id, owner_id, name, description, created_at";
const VERSION_COLUMNS: &str =
    "id, dataset_id, version_tag, created_at, train_count, val_count, test_count, ratio";

fn dataset_from_row(row: &Row<'_>) -> rusqlite::Result<Dataset> {
    Ok(Dataset {
        id: DatasetId(row.get(0)?),
        owner: UserId(row.get(1)?),
        name: row.get(2)?,
        description: row.get(3)?,
        created_at: from_millis(row.get(4)?),
    })
}

fn version_from_row(row: &Row<'_>) -> rusqlite::Result<DatasetVersion> {
    let train: Option<i64> = row.get(4)?;
    let val: Option<i64> = row.get(5)?;
    let test: Option<i64> = row.get(6)?;
    let ratio: Option<String> = row.get(7)?;

    let stats = match (train, val, test) {
        (Some(train), Some(val), Some(test)) => Some(SplitStats {
            counts: SplitCounts {
                train: train as usize,
                val: val as usize,
                test: test as usize,
            },
            ratios: ratio
                .as_deref()
                .and_then(SplitRatios::from_descriptor)
                .unwrap_or_default(),
        }),
        _ => None,
    };

    Ok(DatasetVersion {
        id: VersionId(row.get(0)?),
        dataset_id: DatasetId(row.get(1)?),
        tag: row.get(2)?,
        created_at: from_millis(row.get(3)?),
        stats,
    })
}

pub fn find_dataset(conn: &Connection, id: DatasetId) -> Result<Option<Dataset>, LabelforgeError> {
    let sql = format!("SELECT {DATASET_COLUMNS} FROM datasets WHERE id = ?1");
    Ok(conn
        .query_row(&sql, params![id.as_i64()], dataset_from_row)
        .optional()?)
}

/// Load a dataset and check that `owner` owns it.
///
/// A dataset owned by someone else is reported as not found.
pub fn find_owned_dataset(
    conn: &Connection,
    owner: UserId,
    id: DatasetId,
) -> Result<Dataset, LabelforgeError> {
    match find_dataset(conn, id)? {
        Some(dataset) if dataset.owner == owner => Ok(dataset),
        _ => Err(LabelforgeError::not_found("dataset", id)),
    }
}

pub fn find_dataset_by_name(
    conn: &Connection,
    owner: UserId,
    name: &str,
) -> Result<Option<Dataset>, LabelforgeError> {
    let sql = format!("SELECT {DATASET_COLUMNS} FROM datasets WHERE owner_id = ?1 AND name = ?2");
    Ok(conn
        .query_row(&sql, params![owner.as_i64(), name], dataset_from_row)
        .optional()?)
}

pub fn insert_dataset(
    conn: &Connection,
    owner: UserId,
    name: &str,
    description: Option<&str>,
) -> Result<Dataset, LabelforgeError> {
    let created_at = now_millis();
    conn.execute(
        "INSERT INTO datasets (owner_id, name, description, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![owner.as_i64(), name, description, created_at],
    )?;

    Ok(Dataset {
        id: DatasetId(conn.last_insert_rowid()),
        owner,
        name: name.to_string(),
        description: description.map(str::to_string),
        created_at: from_millis(created_at),
    })
}

pub fn list_datasets(conn: &Connection, owner: UserId) -> Result<Vec<Dataset>, LabelforgeError> {
    let sql = format!("SELECT {DATASET_COLUMNS} FROM datasets WHERE owner_id = ?1 ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![owner.as_i64()], dataset_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn delete_dataset_row(conn: &Connection, id: DatasetId) -> Result<(), LabelforgeError> {
    conn.execute("DELETE FROM datasets WHERE id = ?1", params![id.as_i64()])?;
    Ok(())
}

pub fn find_version(
    conn: &Connection,
    id: VersionId,
) -> Result<Option<DatasetVersion>, LabelforgeError> {
    let sql = format!("SELECT {VERSION_COLUMNS} FROM dataset_versions WHERE id = ?1");
    Ok(conn
        .query_row(&sql, params![id.as_i64()], version_from_row)
        .optional()?)
}

pub fn find_version_by_tag(
    conn: &Connection,
    dataset_id: DatasetId,
    tag: &str,
) -> Result<Option<DatasetVersion>, LabelforgeError> {
    let sql = format!(
        "SELECT {VERSION_COLUMNS} FROM dataset_versions WHERE dataset_id = ?1 AND version_tag = ?2"
    );
    Ok(conn
        .query_row(&sql, params![dataset_id.as_i64(), tag], version_from_row)
        .optional()?)
}

pub fn insert_version(
    conn: &Connection,
    dataset_id: DatasetId,
    tag: &str,
) -> Result<DatasetVersion, LabelforgeError> {
    let created_at = now_millis();
    conn.execute(
        "INSERT INTO dataset_versions (dataset_id, version_tag, created_at) VALUES (?1, ?2, ?3)",
        params![dataset_id.as_i64(), tag, created_at],
    )?;

    Ok(DatasetVersion {
        id: VersionId(conn.last_insert_rowid()),
        dataset_id,
        tag: tag.to_string(),
        created_at: from_millis(created_at),
        stats: None,
    })
}

/// Return the version tagged `tag`, creating it if it does not exist.
pub fn find_or_insert_version(
    conn: &Connection,
    dataset_id: DatasetId,
    tag: &str,
) -> Result<(DatasetVersion, bool), LabelforgeError> {
    match find_version_by_tag(conn, dataset_id, tag)? {
        Some(version) => Ok((version, false)),
        None => Ok((insert_version(conn, dataset_id, tag)?, true)),
    }
}

pub fn list_versions(
    conn: &Connection,
    dataset_id: DatasetId,
) -> Result<Vec<DatasetVersion>, LabelforgeError> {
    let sql =
        format!("SELECT {VERSION_COLUMNS} FROM dataset_versions WHERE dataset_id = ?1 ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![dataset_id.as_i64()], version_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn update_version_stats(
    conn: &Connection,
    id: VersionId,
    stats: &SplitStats,
) -> Result<(), LabelforgeError> {
    conn.execute(
        "UPDATE dataset_versions SET train_count = ?1, val_count = ?2, test_count = ?3, ratio = ?4 WHERE id = ?5",
        params![
            stats.counts.train as i64,
            stats.counts.val as i64,
            stats.counts.test as i64,
            stats.ratios.descriptor(),
            id.as_i64(),
        ],
    )?;
    Ok(())
}

pub fn delete_version_row(conn: &Connection, id: VersionId) -> Result<(), LabelforgeError> {
    conn.execute(
        "DELETE FROM dataset_versions WHERE id = ?1",
        params![id.as_i64()],
    )?;
    Ok(())
}
