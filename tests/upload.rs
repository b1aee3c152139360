use std::fs;

use labelforge::model::BASE_VERSION_TAG;
use labelforge::LabelforgeError;

mod common;
use common::{workspace, OWNER};

#[test]
fn first_upload_creates_dataset_and_base_version() {
    let ws = workspace();
    let files = ws.incoming(&["dog.bmp", "cat.bmp"]);

    let summary = ws
        .engine
        .upload(OWNER, "pets", Some("family pets"), &files)
        .expect("upload");

    assert!(summary.dataset_created);
    assert_eq!(summary.dataset.description.as_deref(), Some("family pets"));
    assert_eq!(summary.version.tag, BASE_VERSION_TAG);
    assert_eq!(summary.uploaded.len(), 2);
    for asset in &summary.uploaded {
        assert_eq!((asset.width, asset.height), (Some(4), Some(3)));
        assert!(asset.storage_path.is_file());
        assert!(asset.storage_path.starts_with(ws.data_root()));
    }
}

#[test]
fn reupload_of_same_name_is_skipped() {
    let ws = workspace();
    let first = ws.upload("pets", &["dog.bmp"]);
    let second = ws.upload("pets", &["dog.bmp", "cat.bmp"]);

    assert!(!second.dataset_created);
    assert_eq!(second.dataset.id, first.dataset.id);
    assert_eq!(second.skipped, vec!["dog.bmp".to_string()]);
    assert_eq!(second.uploaded.len(), 1);
    assert_eq!(second.uploaded[0].name, "cat.bmp");

    let detail = ws
        .engine
        .dataset_detail(OWNER, first.dataset.id, BASE_VERSION_TAG)
        .unwrap();
    assert_eq!(detail.assets.len(), 2);
}

#[test]
fn unsafe_file_names_are_sanitized() {
    let ws = workspace();
    let summary = ws.upload("pets", &["my dog (1).bmp"]);

    let asset = &summary.uploaded[0];
    assert_eq!(asset.name, "my dog (1).bmp");
    assert_eq!(
        asset.storage_path.file_name().unwrap().to_str(),
        Some("my_dog__1_.bmp")
    );
}

#[test]
fn images_sharing_a_stem_get_distinct_files() {
    let ws = workspace();
    let summary = ws.upload("pets", &["dog.bmp", "dog.png"]);

    let stored: Vec<&str> = summary
        .uploaded
        .iter()
        .map(|asset| asset.storage_path.file_name().unwrap().to_str().unwrap())
        .collect();
    assert_eq!(stored, vec!["dog.bmp", "dog_1.png"]);
    assert_eq!(summary.uploaded[1].name, "dog.png");
}

#[test]
fn empty_upload_is_rejected() {
    let ws = workspace();
    let err = ws.engine.upload(OWNER, "pets", None, &[]).unwrap_err();
    assert!(matches!(err, LabelforgeError::InvalidInput { .. }));
    assert!(ws.engine.list_datasets(OWNER).unwrap().is_empty());
}

#[test]
fn unreadable_image_rejects_whole_upload() {
    let ws = workspace();
    let mut files = ws.incoming(&["good.bmp"]);
    let bad = ws.temp.path().join("incoming/notes.bmp");
    fs::write(&bad, b"not an image").unwrap();
    files.push(bad);

    let err = ws.engine.upload(OWNER, "pets", None, &files).unwrap_err();
    assert!(matches!(err, LabelforgeError::ImageProbe { .. }));
    assert!(err.is_client_error());
    assert!(ws.engine.list_datasets(OWNER).unwrap().is_empty());
}
