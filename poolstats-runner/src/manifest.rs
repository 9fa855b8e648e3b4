//! Publishing stats artifacts and the manifest that indexes them.
//!
//! Stats files go up first, one object per epoch under the publish prefix,
//! all public-read. The manifest is written last and only when every stats
//! upload succeeded, so a published manifest never names a missing file.

use poolstats_core::domain::{parse_stats_file, MANIFEST_FILE_NAME};
use poolstats_core::storage::{BlobStore, ObjectAcl, StorageError};
use poolstats_core::workspace::scan_artifacts;
use poolstats_core::Epoch;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("upload of {object} failed: {source}")]
    Storage {
        object: String,
        #[source]
        source: StorageError,
    },

    #[error("encode manifest: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Index of published stats epochs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub latest: Option<Epoch>,
    pub epochs: Vec<Epoch>,
}

/// Manifest for a set of epochs: ascending, deduplicated, `latest` the maximum.
pub fn build_manifest(epochs: impl IntoIterator<Item = Epoch>) -> Manifest {
    let mut epochs: Vec<Epoch> = epochs.into_iter().collect();
    epochs.sort();
    epochs.dedup();
    Manifest {
        latest: epochs.last().copied(),
        epochs,
    }
}

/// `prefix/file`, or just `file` for an empty prefix.
pub fn object_name(prefix: &str, file: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        file.to_string()
    } else {
        format!("{prefix}/{file}")
    }
}

/// What a publish run uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub uploaded: Vec<String>,
    pub manifest_object: String,
    pub manifest: Manifest,
}

/// Uploads stats artifacts and the manifest to a bucket.
pub struct ManifestPublisher<'a> {
    store: &'a dyn BlobStore,
    prefix: String,
}

impl<'a> ManifestPublisher<'a> {
    pub fn new(store: &'a dyn BlobStore, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    fn upload_json(&self, object: &str, body: Vec<u8>) -> Result<(), PublishError> {
        self.store
            .upload(object, body, JSON_CONTENT_TYPE, ObjectAcl::PublicRead)
            .map_err(|source| PublishError::Storage {
                object: object.to_string(),
                source,
            })
    }

    /// Upload every `stats_<epoch>.json` in `output_dir`, then the manifest.
    pub fn publish(&self, output_dir: &Path) -> Result<PublishReport, PublishError> {
        let stats = scan_artifacts(output_dir, parse_stats_file).map_err(|source| {
            PublishError::Io {
                path: output_dir.to_path_buf(),
                source,
            }
        })?;

        let mut uploaded = Vec::with_capacity(stats.len());
        let mut epochs = Vec::with_capacity(stats.len());
        for (epoch, path) in stats {
            let body = fs::read(&path).map_err(|source| PublishError::Io {
                path: path.clone(),
                source,
            })?;
            let file = path
                .file_name()
                .and_then(|f| f.to_str())
                .map(str::to_string)
                .unwrap_or_else(|| poolstats_core::domain::stats_file_name(epoch));
            let object = object_name(&self.prefix, &file);

            info!(%epoch, bucket = self.store.bucket(), %object, "uploading stats");
            self.upload_json(&object, body)?;
            uploaded.push(object);
            epochs.push(epoch);
        }

        let manifest = build_manifest(epochs);
        let manifest_object = object_name(&self.prefix, MANIFEST_FILE_NAME);
        let body = serde_json::to_vec(&manifest)?;
        info!(
            latest = ?manifest.latest.map(Epoch::get),
            count = manifest.epochs.len(),
            object = %manifest_object,
            "uploading manifest"
        );
        self.upload_json(&manifest_object, body)?;

        Ok(PublishReport {
            uploaded,
            manifest_object,
            manifest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poolstats_core::storage::BlobObject;
    use proptest::prelude::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingBucket {
        uploads: Mutex<Vec<(String, Vec<u8>, String, ObjectAcl)>>,
        fail_on: Option<String>,
    }

    impl BlobStore for RecordingBucket {
        fn bucket(&self) -> &str {
            "mrgn-public"
        }

        fn list(&self, _prefix: &str) -> Result<Vec<BlobObject>, StorageError> {
            Ok(Vec::new())
        }

        fn upload(
            &self,
            name: &str,
            body: Vec<u8>,
            content_type: &str,
            acl: ObjectAcl,
        ) -> Result<(), StorageError> {
            if self.fail_on.as_deref() == Some(name) {
                return Err(StorageError::Status {
                    status: 403,
                    url: name.to_string(),
                });
            }
            self.uploads.lock().unwrap().push((
                name.to_string(),
                body,
                content_type.to_string(),
                acl,
            ));
            Ok(())
        }
    }

    fn write_stats(dir: &Path, epochs: &[u64]) {
        for e in epochs {
            fs::write(dir.join(format!("stats_{e}.json")), format!("{{\"epoch\":{e}}}")).unwrap();
        }
    }

    #[test]
    fn manifest_of_nothing_has_no_latest() {
        let manifest = build_manifest(Vec::new());
        assert_eq!(manifest.latest, None);
        assert_eq!(serde_json::to_string(&manifest).unwrap(), r#"{"latest":null,"epochs":[]}"#);
    }

    #[test]
    fn manifest_is_sorted_and_deduplicated() {
        let manifest = build_manifest([Epoch(519), Epoch(516), Epoch(517), Epoch(516)]);
        assert_eq!(manifest.latest, Some(Epoch(519)));
        assert_eq!(manifest.epochs, vec![Epoch(516), Epoch(517), Epoch(519)]);
    }

    #[test]
    fn object_names_join_prefix() {
        assert_eq!(object_name("stake_pool_data", "manifest.json"), "stake_pool_data/manifest.json");
        assert_eq!(object_name("stake_pool_data/", "stats_516.json"), "stake_pool_data/stats_516.json");
        assert_eq!(object_name("", "manifest.json"), "manifest.json");
    }

    #[test]
    fn publishes_stats_then_manifest_public_read() {
        let tmp = tempfile::tempdir().unwrap();
        write_stats(tmp.path(), &[517, 516]);
        fs::write(tmp.path().join("stake_pool_metas_516.json"), "{}").unwrap();
        fs::write(tmp.path().join("stats_516.json.bak"), "{}").unwrap();

        let bucket = RecordingBucket::default();
        let report = ManifestPublisher::new(&bucket, "stake_pool_data")
            .publish(tmp.path())
            .unwrap();

        let uploads = bucket.uploads.lock().unwrap();
        let names: Vec<&str> = uploads.iter().map(|(n, ..)| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "stake_pool_data/stats_516.json",
                "stake_pool_data/stats_517.json",
                "stake_pool_data/manifest.json",
            ]
        );
        assert!(uploads
            .iter()
            .all(|(_, _, ct, acl)| ct == JSON_CONTENT_TYPE && *acl == ObjectAcl::PublicRead));
        assert_eq!(uploads[0].1, b"{\"epoch\":516}");
        assert_eq!(uploads[2].1, br#"{"latest":517,"epochs":[516,517]}"#);
        assert_eq!(report.manifest.latest, Some(Epoch(517)));
        assert_eq!(report.uploaded.len(), 2);
    }

    #[test]
    fn failed_stats_upload_skips_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        write_stats(tmp.path(), &[516, 517]);

        let bucket = RecordingBucket {
            fail_on: Some("stake_pool_data/stats_517.json".to_string()),
            ..RecordingBucket::default()
        };
        let err = ManifestPublisher::new(&bucket, "stake_pool_data")
            .publish(tmp.path())
            .unwrap_err();

        assert!(matches!(err, PublishError::Storage { ref object, .. } if object == "stake_pool_data/stats_517.json"));
        let uploads = bucket.uploads.lock().unwrap();
        assert!(uploads.iter().all(|(n, ..)| !n.ends_with(MANIFEST_FILE_NAME)));
    }

    #[test]
    fn empty_output_publishes_empty_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let bucket = RecordingBucket::default();
        let report = ManifestPublisher::new(&bucket, "stake_pool_data")
            .publish(&tmp.path().join("missing"))
            .unwrap();
        assert!(report.uploaded.is_empty());
        assert_eq!(report.manifest, build_manifest(Vec::new()));
    }

    proptest! {
        #[test]
        fn latest_is_max_and_epochs_match_input_set(input in prop::collection::vec(0u64..2_000, 0..40)) {
            let manifest = build_manifest(input.iter().copied().map(Epoch));
            let expected: std::collections::BTreeSet<u64> = input.iter().copied().collect();

            prop_assert_eq!(manifest.latest.map(Epoch::get), expected.iter().next_back().copied());
            prop_assert_eq!(
                manifest.epochs.iter().map(|e| e.get()).collect::<Vec<_>>(),
                expected.into_iter().collect::<Vec<_>>()
            );
        }
    }
}
