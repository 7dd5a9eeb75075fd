//! Behaviour every metadata store must share.

#![allow(dead_code)]

use blobvault_core::{ContentHash, CreateBlobOutcome, FileId, NewBlob, NewFileReference};
use blobvault_metadata::MetadataStore;

/// A hash no other test run will produce.
pub fn unique_hash() -> ContentHash {
    ContentHash::compute(FileId::new().to_string().as_bytes())
}

pub fn new_blob(hash: &ContentHash, location: &str) -> NewBlob {
    NewBlob {
        hash: hash.clone(),
        size: 13,
        content_type: "text/plain".to_string(),
        storage_location: location.to_string(),
    }
}

pub async fn check_create_is_conditional<S: MetadataStore>(store: &S) {
    let hash = unique_hash();

    let first = store.create_blob(new_blob(&hash, "blobs/first")).await.unwrap();
    let CreateBlobOutcome::Created(created) = first else {
        panic!("first create should insert");
    };
    assert_eq!(created.ref_count, 1);
    assert_eq!(created.storage_location, "blobs/first");

    let second = store.create_blob(new_blob(&hash, "blobs/second")).await.unwrap();
    let CreateBlobOutcome::Existing(existing) = second else {
        panic!("second create should find the live record");
    };
    assert_eq!(existing.storage_location, "blobs/first");
    assert_eq!(existing.ref_count, 1);
}

pub async fn check_ref_counting<S: MetadataStore>(store: &S) {
    let hash = unique_hash();
    store.create_blob(new_blob(&hash, "blobs/counted")).await.unwrap();

    assert_eq!(store.increment_blob_ref(&hash).await.unwrap().ref_count, 2);
    assert_eq!(store.decrement_blob_ref(&hash).await.unwrap().ref_count, 1);
    assert_eq!(store.decrement_blob_ref(&hash).await.unwrap().ref_count, 0);

    // Retired blobs can be neither incremented nor decremented
    assert!(store.increment_blob_ref(&hash).await.unwrap_err().is_not_found());
    assert!(store.decrement_blob_ref(&hash).await.unwrap_err().is_not_found());

    let missing = unique_hash();
    assert!(store.increment_blob_ref(&missing).await.unwrap_err().is_not_found());
}

pub async fn check_retired_blob_is_revived<S: MetadataStore>(store: &S) {
    let hash = unique_hash();
    store.create_blob(new_blob(&hash, "blobs/old")).await.unwrap();
    store.decrement_blob_ref(&hash).await.unwrap();

    let revived = store.create_blob(new_blob(&hash, "blobs/new")).await.unwrap();
    let CreateBlobOutcome::Created(blob) = revived else {
        panic!("retired record should be revived as created");
    };
    assert_eq!(blob.ref_count, 1);
    assert_eq!(blob.storage_location, "blobs/new");

    // A reclaimer holding the old location must not delete the revived record
    assert!(!store.delete_blob(&hash, "blobs/old").await.unwrap());
    assert!(store.get_blob(&hash).await.unwrap().is_some());
}

pub async fn check_delete_blob_requires_zero<S: MetadataStore>(store: &S) {
    let hash = unique_hash();
    store.create_blob(new_blob(&hash, "blobs/del")).await.unwrap();

    assert!(!store.delete_blob(&hash, "blobs/del").await.unwrap());

    store.decrement_blob_ref(&hash).await.unwrap();
    assert!(store.delete_blob(&hash, "blobs/del").await.unwrap());
    assert!(store.get_blob(&hash).await.unwrap().is_none());

    assert!(!store.delete_blob(&hash, "blobs/del").await.unwrap());
}

pub async fn check_file_reference_lifecycle<S: MetadataStore>(store: &S) {
    let hash = unique_hash();
    store.create_blob(new_blob(&hash, "blobs/files")).await.unwrap();

    let created = store
        .create_file_reference(NewFileReference::new("a.txt", hash.clone()))
        .await
        .unwrap();
    assert_eq!(created.name, "a.txt");
    assert_eq!(created.size, 13);
    assert_eq!(created.content_type, "text/plain");

    let fetched = store.get_file_reference(&created.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.hash, hash);

    assert_eq!(
        store
            .get_blob_hash_for_file_reference(&created.id)
            .await
            .unwrap(),
        Some(hash.clone())
    );

    assert!(store.delete_file_reference(&created.id).await.unwrap());
    assert!(!store.delete_file_reference(&created.id).await.unwrap());
    assert!(store.get_file_reference(&created.id).await.unwrap().is_none());
    assert!(
        store
            .get_blob_hash_for_file_reference(&created.id)
            .await
            .unwrap()
            .is_none()
    );
}

pub async fn check_file_reference_needs_blob<S: MetadataStore>(store: &S) {
    let err = store
        .create_file_reference(NewFileReference::new("orphan.txt", unique_hash()))
        .await
        .unwrap_err();
    assert!(!err.is_not_found());
}
