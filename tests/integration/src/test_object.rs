//! Bucket creation and single-object transfer scenarios.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use ruststack_s3_fs::{
        DEFAULT_CONTENT_TYPE, ErrorKind, FsError, ListOptions, WatchEventKind, WatchParams,
    };
    use ruststack_s3_store::PutOptions;

    use crate::{list_paths, media_store, open, seeded_store};

    #[tokio::test]
    async fn test_should_list_folder_created_in_new_bucket() {
        let store = seeded_store(&[]);
        open(&store, "/photos/2024/")
            .make_bucket(false)
            .await
            .unwrap_or_else(|e| panic!("mb: {e}"));

        let paths = list_paths(&open(&store, "/photos/"), ListOptions::default()).await;
        assert_eq!(paths, vec!["photos/2024/"]);

        let entry = open(&store, "/photos/2024/")
            .stat(false)
            .await
            .unwrap_or_else(|e| panic!("stat: {e}"));
        assert!(entry.is_dir());
    }

    #[tokio::test]
    async fn test_should_round_trip_object_with_metadata() {
        let store = media_store();
        let fs = open(&store, "/media/notes/today.md");
        let mut opts = PutOptions {
            content_type: Some("text/markdown".to_owned()),
            ..PutOptions::default()
        };
        opts.user_metadata.insert("author".to_owned(), "ops".to_owned());

        fs.put(Bytes::from_static(b"# today"), opts)
            .await
            .unwrap_or_else(|e| panic!("put: {e}"));
        let body = fs.get().await.unwrap_or_else(|e| panic!("get: {e}"));
        assert_eq!(body, Bytes::from_static(b"# today"));

        let entry = fs.stat(false).await.unwrap_or_else(|e| panic!("stat: {e}"));
        assert_eq!(entry.size, 7);
        assert_eq!(
            entry.metadata.get("Content-Type").map(String::as_str),
            Some("text/markdown")
        );
        assert_eq!(entry.user_metadata.get("author").map(String::as_str), Some("ops"));

        let plain = open(&store, "/media/blob.bin");
        plain
            .put(Bytes::from_static(b"\x00\x01"), PutOptions::default())
            .await
            .unwrap_or_else(|e| panic!("put: {e}"));
        let entry = plain.stat(false).await.unwrap_or_else(|e| panic!("stat: {e}"));
        assert_eq!(
            entry.metadata.get("Content-Type").map(String::as_str),
            Some(DEFAULT_CONTENT_TYPE)
        );
    }

    #[tokio::test]
    async fn test_should_report_copy_to_watchers() {
        let store = seeded_store(&[("media", &["a.txt"]), ("backup", &[])]);
        let mut handle = open(&store, "/backup/")
            .watch(WatchParams::default())
            .await
            .unwrap_or_else(|e| panic!("watch: {e}"));
        tokio::time::sleep(Duration::from_millis(100)).await;

        let source = open(&store, "/media/a.txt").locator().clone();
        open(&store, "/backup/a.txt")
            .copy_from(&source)
            .await
            .unwrap_or_else(|e| panic!("copy: {e}"));

        let event = tokio::time::timeout(Duration::from_secs(2), handle.events.recv())
            .await
            .unwrap_or_else(|e| panic!("no event: {e}"))
            .unwrap_or_else(|| panic!("event stream closed"));
        assert_eq!(event.kind, WatchEventKind::CreatedViaCopy);
        assert_eq!(event.locator.resolve(), ("backup".to_owned(), "a.txt".to_owned()));
        handle.cancel();
    }

    #[tokio::test]
    async fn test_should_classify_transfer_failures() {
        let store = media_store();
        store.deny_prefix("media", "private/");

        let denied = open(&store, "/media/private/key.txt")
            .put(Bytes::from_static(b"x"), PutOptions::default())
            .await;
        assert!(matches!(denied, Err(FsError::PermissionDenied { .. })));

        let missing = open(&store, "/media/none.txt").get().await;
        assert!(missing.is_err_and(|e| e.kind() == ErrorKind::ResourceMissing));

        let folder = open(&store, "/media/not-a-folder").make_bucket(true).await;
        assert!(folder.is_err_and(|e| e.kind() == ErrorKind::Usage));
    }
}
