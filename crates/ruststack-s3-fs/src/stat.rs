//! Single-target stat.
//!
//! Resolves one locator to one [`Entry`]: a bucket existence check when
//! there is no object path, a HEAD for plain keys, and a one-level listing to
//! find out whether the path names a prefix.

use ruststack_s3_store::{ListQuery, StorageApi, StoreError};
use tracing::debug;

use crate::entry::Entry;
use crate::error::{FsError, FsResult};
use crate::locator::Locator;

/// Stat `root` against `api`.
pub(crate) async fn stat(
    api: &dyn StorageApi,
    root: &Locator,
    incomplete: bool,
    page_size: usize,
) -> FsResult<Entry> {
    let (bucket, object) = root.resolve();
    let endpoint = api.endpoint();
    let sep = root.separator();

    if bucket.is_empty() {
        return Err(FsError::Usage("a bucket name is required".to_owned()));
    }
    if object.is_empty() {
        return match api.bucket_exists(&bucket).await {
            Ok(true) => Ok(Entry::directory(root.child(&bucket, ""))),
            Ok(false) => Err(FsError::BucketMissing { bucket }),
            Err(e) => Err(FsError::from_store(e, &bucket, "", &endpoint)),
        };
    }

    let trimmed = object.trim_end_matches(sep);
    let dir_key = format!("{trimmed}{sep}");

    if incomplete {
        let mut query = ListQuery::delimited(&bucket, trimmed, sep);
        query.max_keys = page_size;
        loop {
            let page = api
                .list_uploads_page(&query)
                .await
                .map_err(|e| FsError::from_store(e, &bucket, &object, &endpoint))?;
            for item in page.items {
                if item.is_prefix && item.key == dir_key {
                    return Ok(Entry::directory(root.child(&bucket, &dir_key)));
                }
                if !item.is_prefix && item.key == object {
                    return Ok(Entry::from_upload(root, &bucket, item));
                }
            }
            match page.next_cursor {
                Some(cursor) => query.cursor = Some(cursor),
                None => break,
            }
        }
        return Err(FsError::ObjectMissing { bucket, key: object });
    }

    if !object.ends_with(sep) {
        match api.stat_object(&bucket, &object).await {
            Ok(item) => return Ok(Entry::from_object(root, &bucket, item)),
            Err(StoreError::NoSuchKey { .. }) => {
                debug!(bucket = %bucket, key = %object, "no such key, checking for prefix");
            }
            Err(e) => return Err(FsError::from_store(e, &bucket, &object, &endpoint)),
        }
    }

    let mut query = ListQuery::delimited(&bucket, trimmed, sep);
    query.max_keys = page_size;
    loop {
        let page = api
            .list_objects_page(&query)
            .await
            .map_err(|e| FsError::from_store(e, &bucket, &object, &endpoint))?;
        if page.items.iter().any(|item| item.key == dir_key) {
            return Ok(Entry::directory(root.child(&bucket, &dir_key)));
        }
        match page.next_cursor {
            Some(cursor) => query.cursor = Some(cursor),
            None => break,
        }
    }

    Err(FsError::ObjectMissing { bucket, key: object })
}
