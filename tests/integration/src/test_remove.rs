//! Bulk remove scenarios.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{TimeDelta, Utc};
    use futures::{StreamExt, stream};
    use ruststack_core::FsConfig;
    use ruststack_s3_fs::{
        DirPlacement, FsError, ListOptions, ObjectFs, RemoveError, RemoveOptions, RemoveTarget,
    };
    use ruststack_s3_store::{RetentionMode, StorageApi, StoreError};

    use crate::{media_store, open, open_with, seeded_store};

    fn object(bucket: &str, key: &str) -> RemoveTarget {
        RemoveTarget::Object {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
        }
    }

    /// List `fs` recursively and feed the result into a remove.
    async fn remove_listed(
        fs: &ObjectFs,
        placement: DirPlacement,
        opts: RemoveOptions,
    ) -> Vec<RemoveError> {
        let listing = ListOptions::builder()
            .recursive(true)
            .incomplete(opts.incomplete)
            .dir_placement(placement)
            .build();
        let targets = fs
            .list(listing)
            .filter_map(|entry| async move { RemoveTarget::from_entry(&entry) });
        fs.remove(opts, targets)
            .unwrap_or_else(|e| panic!("remove: {e}"))
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_should_report_one_error_per_failed_delete_across_buckets() {
        let keys: Vec<String> = (0..40).map(|i| format!("k/{i:03}")).collect();
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let store = seeded_store(&[
            ("b1", refs.as_slice()),
            ("b2", refs.as_slice()),
            ("b3", refs.as_slice()),
        ]);

        let mut injected = 0;
        for (bucket, step) in [("b1", 7), ("b2", 5), ("b3", 40)] {
            for key in keys.iter().step_by(step) {
                store.fail_delete(bucket, key, StoreError::Internal("disk".to_owned()));
                injected += 1;
            }
        }

        let targets: Vec<RemoveTarget> = ["b1", "b2", "b3"]
            .iter()
            .flat_map(|bucket| keys.iter().map(|key| object(bucket, key)))
            .collect();
        let fs = open(&store, "/");
        let errors: Vec<RemoveError> = fs
            .remove(RemoveOptions::default(), stream::iter(targets))
            .unwrap_or_else(|e| panic!("remove: {e}"))
            .collect()
            .await;

        assert_eq!(errors.len(), injected);
        assert!(errors.iter().all(|e| matches!(e.cause, FsError::Transport { .. })));
        assert_eq!(store.delete_calls(), 3);
        for bucket in ["b1", "b2", "b3"] {
            let left = store.keys(bucket).len();
            let expected = errors
                .iter()
                .filter(|e| e.locator.resolve().0 == bucket)
                .count();
            assert_eq!(left, expected, "{bucket}");
        }
    }

    #[tokio::test]
    async fn test_should_finish_with_slow_failure_channel() {
        let keys: Vec<String> = (0..50).map(|i| format!("slow/{i:02}")).collect();
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let store = seeded_store(&[("a", refs.as_slice()), ("b", refs.as_slice())]);
        for bucket in ["a", "b"] {
            for key in &keys {
                store.fail_delete(bucket, key, StoreError::AccessDenied);
            }
        }
        store.set_failure_delay(Duration::from_millis(1));

        let config = FsConfig::builder()
            .remove_queue_depth(1)
            .result_buffer(1)
            .build();
        let fs = open_with(&store, "/", config);
        let targets: Vec<RemoveTarget> = ["a", "b"]
            .iter()
            .flat_map(|bucket| keys.iter().map(|key| object(bucket, key)))
            .collect();

        let errors = tokio::time::timeout(Duration::from_secs(10), async {
            fs.remove(RemoveOptions::default(), stream::iter(targets))
                .unwrap_or_else(|e| panic!("remove: {e}"))
                .collect::<Vec<_>>()
                .await
        })
        .await
        .unwrap_or_else(|e| panic!("remove deadlocked: {e}"));

        assert_eq!(errors.len(), 100);
        assert!(
            errors
                .iter()
                .all(|e| matches!(e.cause, FsError::PermissionDenied { .. }))
        );
    }

    #[tokio::test]
    async fn test_should_reject_rb_on_object_path_before_deleting() {
        let store = media_store();
        let fs = open(&store, "/media/dir");
        let opts = RemoveOptions::builder().remove_bucket(true).build();

        let result = fs.remove(opts, stream::iter(vec![object("media", "dir/b.txt")]));
        assert!(matches!(result, Err(FsError::Usage(_))));
        assert_eq!(store.delete_calls(), 0);
        assert_eq!(store.keys("media").len(), 3);
    }

    #[tokio::test]
    async fn test_should_remove_buckets_with_their_objects() {
        let store = seeded_store(&[
            ("media", &["a.txt", "dir/b.txt", "dir/sub/c.txt"]),
            ("empty", &[]),
        ]);
        let fs = open(&store, "/");
        let opts = RemoveOptions::builder().remove_bucket(true).build();

        let errors = remove_listed(&fs, DirPlacement::Last, opts).await;
        assert!(errors.is_empty(), "{errors:?}");
        assert!(!store.has_bucket("media"));
        assert!(!store.has_bucket("empty"));
    }

    #[tokio::test]
    async fn test_should_keep_bucket_when_rb_is_not_requested() {
        let store = media_store();
        let fs = open(&store, "/media");
        let errors = remove_listed(&fs, DirPlacement::None, RemoveOptions::default()).await;
        assert!(errors.is_empty());
        assert!(store.has_bucket("media"));
        assert!(store.keys("media").is_empty());
    }

    #[tokio::test]
    async fn test_should_report_bucket_removal_failure() {
        let store = media_store();
        store.fail_delete("media", "a.txt", StoreError::AccessDenied);
        let fs = open(&store, "/media");
        let opts = RemoveOptions::builder().remove_bucket(true).build();

        let errors = remove_listed(&fs, DirPlacement::Last, opts).await;
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0].cause, FsError::PermissionDenied { .. }));
        assert!(matches!(errors[1].cause, FsError::Transport { .. }));
        assert_eq!(errors[1].locator.resolve(), ("media".to_owned(), String::new()));
        assert!(store.has_bucket("media"));
    }

    #[tokio::test]
    async fn test_should_reopen_conduit_after_end_of_bucket() {
        let store = media_store();
        let fs = open(&store, "/media");
        let targets = vec![
            object("media", "a.txt"),
            RemoveTarget::EndOfBucket {
                bucket: "media".to_owned(),
            },
            object("media", "dir/b.txt"),
            RemoveTarget::Object {
                bucket: String::new(),
                key: "ignored".to_owned(),
            },
        ];
        let errors: Vec<RemoveError> = fs
            .remove(RemoveOptions::default(), stream::iter(targets))
            .unwrap_or_else(|e| panic!("remove: {e}"))
            .collect()
            .await;

        assert!(errors.is_empty());
        assert_eq!(store.delete_calls(), 2);
        assert_eq!(store.keys("media"), vec!["dir/sub/c.txt"]);
    }

    #[tokio::test]
    async fn test_should_honour_governance_bypass() {
        let store = media_store();
        let until = Utc::now() + TimeDelta::days(1);
        store
            .put_object_retention("media", "a.txt", RetentionMode::Governance, until)
            .unwrap_or_else(|e| panic!("retention: {e}"));
        let fs = open(&store, "/media");

        let errors = fs
            .remove(RemoveOptions::default(), stream::iter(vec![object("media", "a.txt")]))
            .unwrap_or_else(|e| panic!("remove: {e}"))
            .collect::<Vec<_>>()
            .await;
        assert_eq!(errors.len(), 1);

        let bypass = RemoveOptions::builder().bypass_governance(true).build();
        let errors = fs
            .remove(bypass, stream::iter(vec![object("media", "a.txt")]))
            .unwrap_or_else(|e| panic!("remove: {e}"))
            .collect::<Vec<_>>()
            .await;
        assert!(errors.is_empty());
        assert!(store.stat_object("media", "a.txt").await.is_err());
    }

    #[tokio::test]
    async fn test_should_abort_listed_incomplete_uploads() {
        let store = media_store();
        for key in ["up/one.bin", "up/two.bin"] {
            store
                .create_multipart_upload("media", key)
                .unwrap_or_else(|e| panic!("create upload {key}: {e}"));
        }
        let fs = open(&store, "/media/up/");
        let opts = RemoveOptions::builder().incomplete(true).build();

        let errors = remove_listed(&fs, DirPlacement::None, opts).await;
        assert!(errors.is_empty());
        let left = fs.stat(true).await;
        assert!(left.is_err());
        assert_eq!(store.keys("media").len(), 3);
    }
}
