//! Listing scenarios.

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};
    use std::sync::Arc;

    use ruststack_core::{BucketLookup, FsConfig};
    use ruststack_s3_fs::{DirPlacement, EntryKind, ListOptions, Locator, ObjectFs};
    use ruststack_s3_store::{MemoryStore, PutOptions, StoreError};

    use crate::{list_all, list_paths, media_store, open, open_with, seeded_store};

    const PHOTO_KEYS: &[&str] = &[
        "photos/2024/jan/img1.jpg",
        "photos/2024/jan/img2.jpg",
        "photos/2024/feb/img3.jpg",
        "photos/2025/mar/img4.jpg",
        "documents/report.pdf",
        "documents/readme.txt",
        "root.txt",
    ];

    fn recursive(placement: DirPlacement) -> ListOptions {
        ListOptions::builder()
            .recursive(true)
            .dir_placement(placement)
            .build()
    }

    /// Keys of a listing, with directories suffixed by the separator.
    async fn walk(fs: &ObjectFs, opts: ListOptions) -> Vec<(String, bool)> {
        list_all(fs, opts)
            .await
            .into_iter()
            .map(|entry| {
                assert!(entry.error.is_none(), "unexpected error entry {entry}");
                (entry.bucket_and_key().1, entry.is_dir())
            })
            .collect()
    }

    #[tokio::test]
    async fn test_should_list_media_bucket_one_level() {
        let store = media_store();
        let fs = open(&store, "/media/");
        let got = list_paths(&fs, ListOptions::default()).await;
        assert_eq!(got, vec!["media/a.txt", "media/dir/"]);
    }

    #[tokio::test]
    async fn test_should_never_list_the_prefix_itself() {
        let store = seeded_store(&[("photos", PHOTO_KEYS)]);
        store
            .put_object("photos", "photos/2024/", "")
            .unwrap_or_else(|e| panic!("put marker: {e}"));

        let fs = open(&store, "/photos/photos/2024/");
        let got = walk(&fs, ListOptions::default()).await;
        assert_eq!(
            got,
            vec![
                ("photos/2024/feb/".to_owned(), true),
                ("photos/2024/jan/".to_owned(), true),
            ]
        );
    }

    #[tokio::test]
    async fn test_should_order_directories_by_placement() {
        let store = seeded_store(&[("photos", PHOTO_KEYS)]);
        let fs = open(&store, "/photos/");

        let first = walk(&fs, recursive(DirPlacement::First)).await;
        let last = walk(&fs, recursive(DirPlacement::Last)).await;
        for (entries, before) in [(&first, true), (&last, false)] {
            for (i, (dir, is_dir)) in entries.iter().enumerate() {
                if !is_dir {
                    continue;
                }
                for (j, (key, _)) in entries.iter().enumerate() {
                    if key != dir && key.starts_with(dir.as_str()) {
                        assert_eq!(i < j, before, "{dir} vs {key}");
                    }
                }
            }
        }

        let none = walk(&fs, recursive(DirPlacement::None)).await;
        assert!(none.iter().all(|(_, is_dir)| !is_dir));
        assert_eq!(none.len(), PHOTO_KEYS.len());
    }

    #[tokio::test]
    async fn test_should_place_media_directories_first() {
        let store = media_store();
        let fs = open(&store, "/media");
        let got: Vec<String> = walk(&fs, recursive(DirPlacement::First))
            .await
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        assert_eq!(
            got,
            vec!["", "a.txt", "dir/", "dir/b.txt", "dir/sub/", "dir/sub/c.txt"]
        );
    }

    #[tokio::test]
    async fn test_should_reconstruct_hierarchy_from_flat_listing() {
        let store = seeded_store(&[("photos", PHOTO_KEYS)]);
        let fs = open(&store, "/photos/");

        let mut derived = BTreeSet::new();
        for (key, _) in walk(&fs, recursive(DirPlacement::None)).await {
            let mut end = 0;
            while let Some(pos) = key[end..].find('/') {
                end += pos + 1;
                derived.insert(key[..end].to_owned());
            }
            derived.insert(key);
        }

        let tree: BTreeSet<String> = walk(&fs, recursive(DirPlacement::First))
            .await
            .into_iter()
            .map(|(key, _)| key)
            .filter(|key| !key.is_empty())
            .collect();
        assert_eq!(derived, tree);
    }

    #[tokio::test]
    async fn test_should_page_without_changing_results() {
        let store = seeded_store(&[("photos", PHOTO_KEYS)]);
        let small = FsConfig::builder().list_page_size(1).build();

        for placement in [DirPlacement::None, DirPlacement::First, DirPlacement::Last] {
            let paged = walk(&open_with(&store, "/photos/", small.clone()), recursive(placement)).await;
            let whole = walk(&open(&store, "/photos/"), recursive(placement)).await;
            assert_eq!(paged, whole, "{placement:?}");
        }
    }

    #[tokio::test]
    async fn test_should_enumerate_buckets() {
        let store = seeded_store(&[("media", &["a.txt"]), ("docs", &["x/y.txt"])]);
        let fs = open(&store, "/");

        let entries = list_all(&fs, ListOptions::default()).await;
        let names: Vec<String> = entries.iter().map(|e| e.bucket_and_key().0).collect();
        assert_eq!(names, vec!["docs", "media"]);
        assert!(entries.iter().all(|e| e.is_dir() && e.last_modified.is_some()));

        let got = list_paths(&fs, recursive(DirPlacement::First)).await;
        assert_eq!(
            got,
            vec!["docs/", "docs/x/", "docs/x/y.txt", "media/", "media/a.txt"]
        );

        let got = list_paths(&fs, recursive(DirPlacement::None)).await;
        assert_eq!(got, vec!["docs/x/y.txt", "media/a.txt"]);
    }

    #[tokio::test]
    async fn test_should_end_with_one_error_when_buckets_cannot_be_listed() {
        let store = media_store();
        store.fail_list_buckets(StoreError::Internal("boom".to_owned()));
        let fs = open(&store, "/");
        let got = list_paths(&fs, recursive(DirPlacement::First)).await;
        assert_eq!(got.len(), 1);
        assert!(got[0].starts_with('!'));
    }

    #[tokio::test]
    async fn test_should_keep_listing_siblings_after_branch_error() {
        let store = seeded_store(&[("photos", PHOTO_KEYS)]);
        store.deny_prefix("photos", "photos/2024/");
        let fs = open(&store, "/photos/");

        let got = list_paths(&fs, recursive(DirPlacement::Last)).await;
        let errors = got.iter().filter(|p| p.starts_with('!')).count();
        assert_eq!(errors, 1);
        assert!(got.contains(&"photos/photos/2025/mar/img4.jpg".to_owned()));
        assert!(got.contains(&"photos/root.txt".to_owned()));
        assert!(!got.iter().any(|p| p.contains("img1")));
    }

    #[tokio::test]
    async fn test_should_report_missing_bucket() {
        let store = media_store();
        let got = list_paths(&open(&store, "/nope"), ListOptions::default()).await;
        assert_eq!(got.len(), 1);
        assert!(got[0].starts_with('!'));
    }

    #[tokio::test]
    async fn test_should_treat_timeless_markers_as_directories() {
        let store = media_store();
        let marker = PutOptions {
            hide_last_modified: true,
            ..PutOptions::default()
        };
        store
            .put_object_with("media", "empty/", "", marker)
            .unwrap_or_else(|e| panic!("put marker: {e}"));

        let fs = open(&store, "/media/");
        let entries = list_all(&fs, ListOptions::default()).await;
        let marker = entries
            .iter()
            .find(|e| e.bucket_and_key().1 == "empty/")
            .unwrap_or_else(|| panic!("marker missing"));
        assert!(marker.is_dir());

        let got = walk(&fs, recursive(DirPlacement::First)).await;
        assert_eq!(got.iter().filter(|(k, _)| k == "empty/").count(), 1);
    }

    #[tokio::test]
    async fn test_should_fetch_metadata_on_request() {
        let store = media_store();
        let options = PutOptions {
            content_type: Some("image/png".to_owned()),
            user_metadata: HashMap::from([("owner".to_owned(), "ops".to_owned())]),
            ..PutOptions::default()
        };
        store
            .put_object_with("media", "logo.png", "png", options)
            .unwrap_or_else(|e| panic!("put: {e}"));
        let fs = open(&store, "/media/logo.png");

        let plain = list_all(&fs, ListOptions::default()).await;
        assert_eq!(plain.len(), 1);
        assert!(plain[0].user_metadata.is_empty());

        let rich = list_all(&fs, ListOptions::builder().with_metadata(true).build()).await;
        assert_eq!(rich[0].user_metadata.get("owner").map(String::as_str), Some("ops"));
        assert_eq!(
            rich[0].metadata.get("Content-Type").map(String::as_str),
            Some("image/png")
        );
    }

    #[tokio::test]
    async fn test_should_list_incomplete_uploads_recursively() {
        let store = media_store();
        for key in ["up/one.bin", "up/deep/two.bin"] {
            store
                .create_multipart_upload("media", key)
                .unwrap_or_else(|e| panic!("create upload {key}: {e}"));
        }
        let fs = open(&store, "/media/up/");
        let opts = ListOptions::builder()
            .recursive(true)
            .incomplete(true)
            .dir_placement(DirPlacement::First)
            .build();

        let entries = list_all(&fs, opts).await;
        let kinds: Vec<(String, EntryKind)> = entries
            .iter()
            .map(|e| (e.bucket_and_key().1, e.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("up/".to_owned(), EntryKind::Directory),
                ("up/deep/".to_owned(), EntryKind::Directory),
                ("up/deep/two.bin".to_owned(), EntryKind::IncompleteUpload),
                ("up/one.bin".to_owned(), EntryKind::IncompleteUpload),
            ]
        );
    }

    #[tokio::test]
    async fn test_should_list_virtual_host_address_with_path_style_children() {
        let store: MemoryStore = media_store();
        let root = Locator::parse("https://media.s3.amazonaws.com/dir/", BucketLookup::Auto);
        let fs = ObjectFs::new(Arc::new(store), root, FsConfig::default());

        let entries = list_all(&fs, ListOptions::default()).await;
        let rendered: Vec<String> = entries.iter().map(|e| e.locator.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "https://s3.amazonaws.com/media/dir/b.txt",
                "https://s3.amazonaws.com/media/dir/sub/",
            ]
        );
    }
}
