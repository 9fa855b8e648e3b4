//! Snapshot discovery against an in-memory bucket listing.

use std::sync::Mutex;

use poolstats_core::snapshot::{SelectionPolicy, SnapshotError, SnapshotLocator};
use poolstats_core::storage::{BlobObject, BlobStore, ObjectAcl, StorageError};
use poolstats_core::{Epoch, Slot};

struct ListingBucket {
    objects: Vec<BlobObject>,
    prefixes: Mutex<Vec<String>>,
}

impl ListingBucket {
    fn new(objects: Vec<BlobObject>) -> Self {
        Self {
            objects,
            prefixes: Mutex::new(Vec::new()),
        }
    }
}

impl BlobStore for ListingBucket {
    fn bucket(&self) -> &str {
        "jito-mainnet"
    }

    fn list(&self, prefix: &str) -> Result<Vec<BlobObject>, StorageError> {
        self.prefixes.lock().unwrap().push(prefix.to_string());
        Ok(self
            .objects
            .iter()
            .filter(|o| o.name.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn upload(&self, _: &str, _: Vec<u8>, _: &str, _: ObjectAcl) -> Result<(), StorageError> {
        unreachable!("locator never uploads")
    }
}

fn object(name: &str, size: u64) -> BlobObject {
    BlobObject {
        name: name.to_string(),
        size,
        media_link: format!("https://storage.example/{name}"),
    }
}

const SLOT: Slot = Slot(223_343_999);

#[test]
fn picks_preferred_warehouse_among_mixed_listing() {
    let bucket = ListingBucket::new(vec![
        object("515/ny-mainnet-warehouse-1/snapshot-222911999-aaa.tar.zst", 60_000_000_000),
        object("516/ams-mainnet-warehouse-1/incremental-snapshot-223300000-223343999-q.tar.zst", 900_000_000),
        object("516/ams-mainnet-warehouse-1/snapshot-223343999-bbb.tar.zst", 61_000_000_000),
        object("516/ny-mainnet-warehouse-1/snapshot-223343999-ccc.tar.zst", 62_000_000_000),
        object("516/ny-mainnet-warehouse-1/bank-hash-223343999.json", 1_000),
    ]);
    let locator = SnapshotLocator::new(&bucket, SelectionPolicy::default());

    let chosen = locator.locate(Epoch(516), SLOT).unwrap();
    assert_eq!(chosen.file_name, "snapshot-223343999-ccc.tar.zst");
    assert_eq!(chosen.warehouse, "ny-mainnet-warehouse-1");
    assert!(chosen.preferred);
    assert_eq!(
        chosen.url,
        "https://storage.example/516/ny-mainnet-warehouse-1/snapshot-223343999-ccc.tar.zst"
    );
    assert_eq!(*bucket.prefixes.lock().unwrap(), vec!["516/".to_string()]);
}

#[test]
fn falls_back_to_listing_order_without_preferred_warehouse() {
    let bucket = ListingBucket::new(vec![
        object("516/fra-mainnet-warehouse-1/snapshot-223343999-x.tar.zst", 61_000_000_000),
        object("516/ams-mainnet-warehouse-1/snapshot-223343999-y.tar.zst", 61_000_000_000),
    ]);
    let locator = SnapshotLocator::new(&bucket, SelectionPolicy::default());

    let chosen = locator.locate(Epoch(516), SLOT).unwrap();
    assert_eq!(chosen.warehouse, "fra-mainnet-warehouse-1");
    assert!(!chosen.preferred);
}

#[test]
fn only_partial_snapshots_is_not_found() {
    let bucket = ListingBucket::new(vec![
        object("516/ny-mainnet-warehouse-1/snapshot-223343999-x.tar.zst", 4_000_000_000),
        object("516/ams-mainnet-warehouse-1/snapshot-223343999-y.tar.zst", 9_999_999_999),
    ]);
    let locator = SnapshotLocator::new(&bucket, SelectionPolicy::default());

    let err = locator.locate(Epoch(516), SLOT).unwrap_err();
    assert!(matches!(
        err,
        SnapshotError::NoSnapshotFound { epoch: Epoch(516), slot: Slot(223_343_999) }
    ));
}

#[test]
fn wrong_slot_is_not_found() {
    let bucket = ListingBucket::new(vec![object(
        "516/ny-mainnet-warehouse-1/snapshot-223343000-x.tar.zst",
        60_000_000_000,
    )]);
    let locator = SnapshotLocator::new(&bucket, SelectionPolicy::default());
    assert!(matches!(
        locator.locate(Epoch(516), SLOT),
        Err(SnapshotError::NoSnapshotFound { .. })
    ));
}

#[test]
fn listing_failure_is_a_storage_error() {
    struct Down;
    impl BlobStore for Down {
        fn bucket(&self) -> &str {
            "jito-mainnet"
        }
        fn list(&self, _: &str) -> Result<Vec<BlobObject>, StorageError> {
            Err(StorageError::Status {
                status: 503,
                url: "https://storage.example/o".into(),
            })
        }
        fn upload(&self, _: &str, _: Vec<u8>, _: &str, _: ObjectAcl) -> Result<(), StorageError> {
            unreachable!()
        }
    }

    let locator = SnapshotLocator::new(&Down, SelectionPolicy::default());
    assert!(matches!(
        locator.locate(Epoch(516), SLOT),
        Err(SnapshotError::Storage(StorageError::Status { status: 503, .. }))
    ));
}
