//! Watch scenarios.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use chrono::{TimeDelta, Utc};
    use ruststack_s3_fs::{
        EventCategory, FsError, WatchEvent, WatchEventKind, WatchHandle, WatchParams,
    };
    use ruststack_s3_store::{
        EventRecord, EventSource, MemoryStore, RetentionMode, StorageApi, StoreError,
    };

    use crate::{ENDPOINT, media_store, open, seeded_store};

    const WAIT: Duration = Duration::from_secs(2);

    /// Give freshly spawned workers time to subscribe.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    async fn start(store: &MemoryStore, path: &str, params: WatchParams) -> WatchHandle {
        let handle = open(store, path)
            .watch(params)
            .await
            .unwrap_or_else(|e| panic!("watch {path}: {e}"));
        settle().await;
        handle
    }

    async fn next_event(handle: &mut WatchHandle) -> WatchEvent {
        tokio::time::timeout(WAIT, handle.events.recv())
            .await
            .unwrap_or_else(|e| panic!("no event: {e}"))
            .unwrap_or_else(|| panic!("event stream closed"))
    }

    async fn next_error(handle: &mut WatchHandle) -> FsError {
        tokio::time::timeout(WAIT, handle.errors.recv())
            .await
            .unwrap_or_else(|e| panic!("no error: {e}"))
            .unwrap_or_else(|| panic!("error stream closed"))
    }

    /// Wait for both streams to close, returning any leftover events.
    async fn drain(handle: &mut WatchHandle) -> Vec<WatchEvent> {
        let mut events = Vec::new();
        tokio::time::timeout(WAIT, async {
            while let Some(event) = handle.events.recv().await {
                events.push(event);
            }
            while handle.errors.recv().await.is_some() {}
        })
        .await
        .unwrap_or_else(|e| panic!("streams did not close: {e}"));
        events
    }

    fn raw(bucket: &str, key: &str) -> EventRecord {
        EventRecord {
            event_name: "s3:ObjectCreated:Put".to_owned(),
            event_time: Utc::now(),
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            size: 7,
            user_metadata: HashMap::new(),
            source: EventSource {
                host: "10.0.0.8".to_owned(),
                port: "51234".to_owned(),
                user_agent: "uploader/1.0".to_owned(),
            },
        }
    }

    #[tokio::test]
    async fn test_should_normalize_every_event_kind() {
        let store = media_store();
        let mut handle = start(&store, "/media/", WatchParams::default()).await;

        store
            .put_object("media", "new.txt", "hello")
            .unwrap_or_else(|e| panic!("put: {e}"));
        store
            .copy_object("media", "new.txt", "copy.txt")
            .unwrap_or_else(|e| panic!("copy: {e}"));
        store
            .put_object_retention(
                "media",
                "new.txt",
                RetentionMode::Governance,
                Utc::now() + TimeDelta::days(1),
            )
            .unwrap_or_else(|e| panic!("retention: {e}"));
        store
            .get_object("media", "new.txt")
            .unwrap_or_else(|e| panic!("get: {e}"));
        store
            .stat_object("media", "new.txt")
            .await
            .unwrap_or_else(|e| panic!("head: {e}"));
        store
            .delete_object("media", "copy.txt")
            .unwrap_or_else(|e| panic!("delete: {e}"));

        let mut kinds = Vec::new();
        for _ in 0..6 {
            let event = next_event(&mut handle).await;
            if event.kind == WatchEventKind::Removed {
                assert_eq!(event.size, 0);
                assert!(event.user_metadata.is_empty());
                assert_eq!(event.locator.resolve().1, "copy.txt");
            } else {
                assert_eq!(event.size, 5);
            }
            kinds.push(event.kind);
        }
        assert_eq!(
            kinds,
            vec![
                WatchEventKind::Created,
                WatchEventKind::CreatedViaCopy,
                WatchEventKind::CreatedPutRetention,
                WatchEventKind::AccessedRead,
                WatchEventKind::AccessedStat,
                WatchEventKind::Removed,
            ]
        );

        handle.cancel();
        drain(&mut handle).await;
    }

    #[tokio::test]
    async fn test_should_filter_by_category_and_suffix() {
        let store = media_store();
        let params = WatchParams::builder()
            .suffix(".log")
            .categories(vec![EventCategory::Delete])
            .build();
        let mut handle = start(&store, "/media", params).await;

        for key in ["a.log", "b.txt"] {
            store
                .put_object("media", key, "x")
                .unwrap_or_else(|e| panic!("put {key}: {e}"));
            store
                .delete_object("media", key)
                .unwrap_or_else(|e| panic!("delete {key}: {e}"));
        }

        let event = next_event(&mut handle).await;
        assert_eq!(event.kind, WatchEventKind::Removed);
        assert_eq!(event.locator.resolve().1, "a.log");

        handle.cancel();
        assert!(drain(&mut handle).await.is_empty());
    }

    #[tokio::test]
    async fn test_should_merge_events_from_all_buckets() {
        let store = seeded_store(&[("logs", &[]), ("media", &[])]);
        let mut handle = start(&store, "/", WatchParams::default()).await;

        store
            .put_object("logs", "l.txt", "x")
            .unwrap_or_else(|e| panic!("put: {e}"));
        store
            .put_object("media", "m.txt", "x")
            .unwrap_or_else(|e| panic!("put: {e}"));

        let mut buckets = vec![
            next_event(&mut handle).await.locator.resolve().0,
            next_event(&mut handle).await.locator.resolve().0,
        ];
        buckets.sort();
        assert_eq!(buckets, vec!["logs", "media"]);

        handle.cancel();
        drain(&mut handle).await;
    }

    #[tokio::test]
    async fn test_should_close_both_streams_on_cancel() {
        let store = seeded_store(&[("a", &[]), ("b", &[]), ("c", &[])]);
        let mut handle = start(&store, "/", WatchParams::default()).await;

        handle.cancel();
        handle.cancel();
        assert!(drain(&mut handle).await.is_empty());

        // Nothing is listening any more.
        store
            .put_object("a", "late.txt", "x")
            .unwrap_or_else(|e| panic!("put: {e}"));
        assert!(handle.events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_should_end_only_the_unsupported_bucket() {
        let store = seeded_store(&[("old", &[]), ("new", &[])]);
        let mut handle = start(&store, "/", WatchParams::default()).await;

        store.inject_notification_error(
            "old",
            StoreError::NotImplemented {
                api: "ListenBucketNotification".to_owned(),
            },
        );
        let error = next_error(&mut handle).await;
        assert_eq!(
            error,
            FsError::Unsupported {
                api: "Watch".to_owned(),
                endpoint: ENDPOINT.to_owned(),
            }
        );
        settle().await;

        store
            .put_object("old", "ignored.txt", "x")
            .unwrap_or_else(|e| panic!("put: {e}"));
        store
            .put_object("new", "seen.txt", "x")
            .unwrap_or_else(|e| panic!("put: {e}"));
        let event = next_event(&mut handle).await;
        assert_eq!(event.locator.resolve().0, "new");

        handle.cancel();
        assert!(drain(&mut handle).await.is_empty());
    }

    #[tokio::test]
    async fn test_should_close_streams_when_notifications_are_unsupported() {
        let store = seeded_store(&[("a", &[]), ("b", &[])]);
        store.disable_notifications();
        let mut handle = start(&store, "/", WatchParams::default()).await;

        for _ in 0..2 {
            assert!(matches!(
                next_error(&mut handle).await,
                FsError::Unsupported { .. }
            ));
        }
        assert!(drain(&mut handle).await.is_empty());
    }

    #[tokio::test]
    async fn test_should_report_undecodable_keys_and_continue() {
        let store = media_store();
        let mut handle = start(&store, "/media/", WatchParams::default()).await;

        store.publish(raw("media", "bad%zzkey"));
        store.publish(raw("media", "dir/good%20name.txt"));

        assert!(matches!(next_error(&mut handle).await, FsError::Transport { .. }));
        let event = next_event(&mut handle).await;
        assert_eq!(event.locator.resolve().1, "dir/good name.txt");
        assert_eq!(event.source_host, "10.0.0.8");
        assert_eq!(event.source_port, "51234");
        assert_eq!(event.user_agent, "uploader/1.0");
        assert_eq!(event.size, 7);

        handle.cancel();
        drain(&mut handle).await;
    }

    #[tokio::test]
    async fn test_should_reject_ambiguous_scope() {
        let store = media_store();
        let params = WatchParams::builder().prefix("dir/").build();
        let result = open(&store, "/media/dir/").watch(params).await;
        assert!(matches!(result, Err(FsError::Usage(_))));

        assert!(matches!(
            "rename".parse::<EventCategory>(),
            Err(FsError::Usage(_))
        ));
    }

    #[tokio::test]
    async fn test_should_stop_workers_when_handle_is_dropped() {
        let store = seeded_store(&[("media", &["a.txt"]), ("logs", &[])]);
        let handle = start(&store, "/", WatchParams::default()).await;
        assert_eq!(store.subscriber_count(), 2);
        drop(handle);

        tokio::time::timeout(WAIT, async {
            while store.subscriber_count() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|e| panic!("workers still subscribed: {e}"));
        assert_eq!(store.subscriber_count(), 0);

        store
            .put_object("media", "after.txt", "x")
            .unwrap_or_else(|e| panic!("put: {e}"));
    }
}
