//! SQLite schema for the catalog.

use rusqlite::Connection;

use crate::error::LabelforgeError;

/// Create all catalog tables and indexes if they do not exist yet.
pub fn init_schema(conn: &Connection) -> Result<(), LabelforgeError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS datasets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            created_at INTEGER NOT NULL,
            UNIQUE(owner_id, name)
        );

        CREATE TABLE IF NOT EXISTS dataset_versions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            dataset_id INTEGER NOT NULL,
            version_tag TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            train_count INTEGER,
            val_count INTEGER,
            test_count INTEGER,
            ratio TEXT,
            UNIQUE(dataset_id, version_tag),
            FOREIGN KEY(dataset_id) REFERENCES datasets(id)
        );

        CREATE TABLE IF NOT EXISTS assets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            version_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            storage_path TEXT NOT NULL,
            width INTEGER,
            height INTEGER,
            split TEXT CHECK (split IN ('train', 'val', 'test')),
            UNIQUE(version_id, name),
            FOREIGN KEY(version_id) REFERENCES dataset_versions(id)
        );

        -- class_id is scoped per version; it is not the row key.
        CREATE TABLE IF NOT EXISTS label_classes (
            class_id INTEGER NOT NULL,
            version_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            PRIMARY KEY(class_id, version_id),
            UNIQUE(version_id, name),
            FOREIGN KEY(version_id) REFERENCES dataset_versions(id)
        );

        CREATE TABLE IF NOT EXISTS annotations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            asset_id INTEGER NOT NULL,
            class_id INTEGER NOT NULL,
            version_id INTEGER NOT NULL,
            x_center REAL NOT NULL CHECK (x_center BETWEEN 0.0 AND 1.0),
            y_center REAL NOT NULL CHECK (y_center BETWEEN 0.0 AND 1.0),
            width REAL NOT NULL CHECK (width BETWEEN 0.0 AND 1.0),
            height REAL NOT NULL CHECK (height BETWEEN 0.0 AND 1.0),
            label_path TEXT NOT NULL,
            FOREIGN KEY(asset_id) REFERENCES assets(id),
            FOREIGN KEY(class_id, version_id) REFERENCES label_classes(class_id, version_id)
        );

        CREATE TABLE IF NOT EXISTS train_jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id INTEGER NOT NULL,
            version_id INTEGER NOT NULL,
            model_type TEXT NOT NULL,
            model_base TEXT NOT NULL,
            model_size TEXT NOT NULL,
            epochs INTEGER NOT NULL,
            batch_size INTEGER NOT NULL,
            learning_rate REAL NOT NULL,
            optimizer TEXT NOT NULL,
            status TEXT NOT NULL,
            result_model_path TEXT,
            error_message TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY(version_id) REFERENCES dataset_versions(id)
        );

        CREATE INDEX IF NOT EXISTS idx_versions_dataset ON dataset_versions(dataset_id);
        CREATE INDEX IF NOT EXISTS idx_assets_version ON assets(version_id);
        CREATE INDEX IF NOT EXISTS idx_annotations_asset ON annotations(asset_id);
        CREATE INDEX IF NOT EXISTS idx_jobs_owner ON train_jobs(owner_id);
        "#,
    )?;

    Ok(())
}
