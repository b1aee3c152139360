//! Asset rows.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::LabelforgeError;
use crate::model::{Asset, AssetId, VersionId};
use crate::split::Split;

const ASSET_COLUMNS: &str = "id, version_id, name, storage_path, width, height, split";

fn asset_from_row(row: &Row<'_>) -> rusqlite::Result<Asset> {
    let storage_path: String = row.get(3)?;
    let split: Option<String> = row.get(6)?;
    Ok(Asset {
        id: AssetId(row.get(0)?),
        version_id: VersionId(row.get(1)?),
        name: row.get(2)?,
        storage_path: PathBuf::from(storage_path),
        width: row.get(4)?,
        height: row.get(5)?,
        // The CHECK constraint keeps this column to known values.
        split: split.and_then(|s| s.parse().ok()),
    })
}

/// Fields of an asset that does not have a row yet.
#[derive(Clone, Debug)]
pub struct NewAsset<'a> {
    pub version_id: VersionId,
    pub name: &'a str,
    pub storage_path: &'a Path,
    pub dimensions: Option<(u32, u32)>,
}

pub fn find_asset(conn: &Connection, id: AssetId) -> Result<Option<Asset>, LabelforgeError> {
    let sql = format!("SELECT {ASSET_COLUMNS} FROM assets WHERE id = ?1");
    Ok(conn
        .query_row(&sql, params![id.as_i64()], asset_from_row)
        .optional()?)
}

pub fn find_asset_by_name(
    conn: &Connection,
    version_id: VersionId,
    name: &str,
) -> Result<Option<Asset>, LabelforgeError> {
    let sql = format!("SELECT {ASSET_COLUMNS} FROM assets WHERE version_id = ?1 AND name = ?2");
    Ok(conn
        .query_row(&sql, params![version_id.as_i64(), name], asset_from_row)
        .optional()?)
}

/// Storage paths of every asset in the version.
pub fn storage_paths(
    conn: &Connection,
    version_id: VersionId,
) -> Result<Vec<PathBuf>, LabelforgeError> {
    let mut stmt = conn.prepare("SELECT storage_path FROM assets WHERE version_id = ?1")?;
    let paths = stmt
        .query_map(params![version_id.as_i64()], |row| {
            row.get::<_, String>(0).map(PathBuf::from)
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(paths)
}

pub fn insert_asset(conn: &Connection, new: &NewAsset<'_>) -> Result<Asset, LabelforgeError> {
    let (width, height) = match new.dimensions {
        Some((w, h)) => (Some(w), Some(h)),
        None => (None, None),
    };

    conn.execute(
        "INSERT INTO assets (version_id, name, storage_path, width, height) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            new.version_id.as_i64(),
            new.name,
            new.storage_path.to_string_lossy().into_owned(),
            width,
            height,
        ],
    )?;

    Ok(Asset {
        id: AssetId(conn.last_insert_rowid()),
        version_id: new.version_id,
        name: new.name.to_string(),
        storage_path: new.storage_path.to_path_buf(),
        width,
        height,
        split: None,
    })
}

/// All assets of a version, in insertion order.
pub fn list_assets(conn: &Connection, version_id: VersionId) -> Result<Vec<Asset>, LabelforgeError> {
    let sql = format!("SELECT {ASSET_COLUMNS} FROM assets WHERE version_id = ?1 ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![version_id.as_i64()], asset_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn update_asset_split(
    conn: &Connection,
    id: AssetId,
    split: Option<Split>,
) -> Result<(), LabelforgeError> {
    conn.execute(
        "UPDATE assets SET split = ?1 WHERE id = ?2",
        params![split.map(|s| s.as_str()), id.as_i64()],
    )?;
    Ok(())
}

pub fn delete_assets_for_version(
    conn: &Connection,
    version_id: VersionId,
) -> Result<usize, LabelforgeError> {
    Ok(conn.execute(
        "DELETE FROM assets WHERE version_id = ?1",
        params![version_id.as_i64()],
    )?)
}
