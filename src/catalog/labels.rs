//! Label class and annotation rows.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, Row};

use crate::error::LabelforgeError;
use crate::model::{
    Annotation, AnnotationId, AssetId, ClassId, LabelClass, NormalizedBox, VersionId,
};

fn annotation_from_row(row: &Row<'_>) -> rusqlite::Result<Annotation> {
    let label_path: String = row.get(7)?;
    Ok(Annotation {
        id: AnnotationId(row.get(0)?),
        asset_id: AssetId(row.get(1)?),
        class_id: ClassId(row.get(2)?),
        bbox: NormalizedBox::new(row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?),
        label_path: PathBuf::from(label_path),
    })
}

/// Every label class of a version, ordered by class id.
pub fn load_label_classes(
    conn: &Connection,
    version_id: VersionId,
) -> Result<Vec<LabelClass>, LabelforgeError> {
    let mut stmt = conn.prepare(
        "SELECT class_id, version_id, name FROM label_classes WHERE version_id = ?1 ORDER BY class_id",
    )?;
    let rows = stmt
        .query_map(params![version_id.as_i64()], |row| {
            Ok(LabelClass {
                class_id: ClassId(row.get(0)?),
                version_id: VersionId(row.get(1)?),
                name: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn insert_label_class(conn: &Connection, class: &LabelClass) -> Result<(), LabelforgeError> {
    conn.execute(
        "INSERT INTO label_classes (class_id, version_id, name) VALUES (?1, ?2, ?3)",
        params![
            class.class_id.as_u32(),
            class.version_id.as_i64(),
            class.name
        ],
    )?;
    Ok(())
}

pub fn delete_label_classes(
    conn: &Connection,
    version_id: VersionId,
) -> Result<usize, LabelforgeError> {
    Ok(conn.execute(
        "DELETE FROM label_classes WHERE version_id = ?1",
        params![version_id.as_i64()],
    )?)
}

pub fn insert_annotation(
    conn: &Connection,
    asset_id: AssetId,
    version_id: VersionId,
    class_id: ClassId,
    bbox: &NormalizedBox,
    label_path: &Path,
) -> Result<Annotation, LabelforgeError> {
    conn.execute(
        "INSERT INTO annotations (asset_id, class_id, version_id, x_center, y_center, width, height, label_path)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            asset_id.as_i64(),
            class_id.as_u32(),
            version_id.as_i64(),
            bbox.x_center,
            bbox.y_center,
            bbox.width,
            bbox.height,
            label_path.to_string_lossy().into_owned(),
        ],
    )?;

    Ok(Annotation {
        id: AnnotationId(conn.last_insert_rowid()),
        asset_id,
        class_id,
        bbox: *bbox,
        label_path: label_path.to_path_buf(),
    })
}

pub fn list_annotations(
    conn: &Connection,
    asset_id: AssetId,
) -> Result<Vec<Annotation>, LabelforgeError> {
    let mut stmt = conn.prepare(
        "SELECT id, asset_id, class_id, x_center, y_center, width, height, label_path
         FROM annotations WHERE asset_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map(params![asset_id.as_i64()], annotation_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn delete_annotations_for_asset(
    conn: &Connection,
    asset_id: AssetId,
) -> Result<usize, LabelforgeError> {
    Ok(conn.execute(
        "DELETE FROM annotations WHERE asset_id = ?1",
        params![asset_id.as_i64()],
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{assets, datasets, Catalog};
    use crate::model::UserId;

    #[test]
    fn annotations_require_a_registered_class() {
        let catalog = Catalog::open_in_memory().expect("open catalog");
        let conn = catalog.connection();
        let dataset = datasets::insert_dataset(conn, UserId(1), "cats", None).expect("dataset");
        let version = datasets::insert_version(conn, dataset.id, "v0").expect("version");
        let asset = assets::insert_asset(
            conn,
            &assets::NewAsset {
                version_id: version.id,
                name: "a.jpg",
                storage_path: Path::new("/d/a.jpg"),
                dimensions: None,
            },
        )
        .expect("asset");

        let bbox = NormalizedBox::new(0.5, 0.5, 0.2, 0.2);
        let orphan = insert_annotation(
            conn,
            asset.id,
            version.id,
            ClassId(0),
            &bbox,
            Path::new("/d/a.txt"),
        );
        assert!(orphan.is_err());

        insert_label_class(
            conn,
            &LabelClass {
                class_id: ClassId(0),
                version_id: version.id,
                name: "cat".to_string(),
            },
        )
        .expect("class");
        insert_annotation(
            conn,
            asset.id,
            version.id,
            ClassId(0),
            &bbox,
            Path::new("/d/a.txt"),
        )
        .expect("annotation");

        assert_eq!(list_annotations(conn, asset.id).expect("list").len(), 1);
        assert_eq!(delete_annotations_for_asset(conn, asset.id).expect("delete"), 1);
        assert!(list_annotations(conn, asset.id).expect("list").is_empty());
    }
}
