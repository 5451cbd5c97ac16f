//! Bucket creation and single-object transfer.
//!
//! Creating a locator with an object path writes a zero-byte folder marker,
//! creating the bucket first when it does not exist yet.

use bytes::Bytes;
use ruststack_s3_store::{PutOptions, StorageApi, StoreError};
use tracing::{debug, info};

use crate::error::{FsError, FsResult};
use crate::locator::Locator;

/// `Content-Type` recorded when the caller gives none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

fn require_bucket(bucket: &str) -> FsResult<()> {
    if bucket.is_empty() {
        return Err(FsError::Usage("a bucket name is required".to_owned()));
    }
    Ok(())
}

fn require_key(root: &Locator, key: &str) -> FsResult<()> {
    if key.is_empty() {
        return Err(FsError::Usage(format!("`{root}` does not name an object")));
    }
    Ok(())
}

/// Create the bucket named by `root`, or a folder marker inside it.
pub(crate) async fn make_bucket(
    api: &dyn StorageApi,
    root: &Locator,
    ignore_existing: bool,
) -> FsResult<()> {
    let (bucket, object) = root.resolve();
    let endpoint = api.endpoint();
    require_bucket(&bucket)?;

    if !object.is_empty() {
        if !object.ends_with(root.separator()) {
            return Err(FsError::Usage(format!(
                "`{root}` must name a bucket or a folder ending in `{}`",
                root.separator()
            )));
        }
        let mut retried = false;
        loop {
            let put = api
                .put_object(&bucket, &object, Bytes::new(), PutOptions::default())
                .await;
            match put {
                Ok(_) => {
                    debug!(bucket = %bucket, key = %object, "folder marker created");
                    return Ok(());
                }
                Err(StoreError::NoSuchBucket { .. }) if !retried => {
                    api.make_bucket(&bucket)
                        .await
                        .map_err(|e| FsError::from_store(e, &bucket, "", &endpoint))?;
                    info!(bucket = %bucket, "bucket created for folder marker");
                    retried = true;
                }
                Err(e) => return Err(FsError::from_store(e, &bucket, &object, &endpoint)),
            }
        }
    }

    match api.make_bucket(&bucket).await {
        Ok(()) => Ok(()),
        Err(StoreError::BucketAlreadyExists { .. } | StoreError::BucketAlreadyOwnedByYou { .. })
            if ignore_existing =>
        {
            debug!(bucket = %bucket, "bucket already exists");
            Ok(())
        }
        Err(e) => Err(FsError::from_store(e, &bucket, "", &endpoint)),
    }
}

/// Write `data` at `root`, returning the new etag.
pub(crate) async fn put(
    api: &dyn StorageApi,
    root: &Locator,
    data: Bytes,
    mut opts: PutOptions,
) -> FsResult<String> {
    let (bucket, object) = root.resolve();
    require_bucket(&bucket)?;
    require_key(root, &object)?;
    if opts.content_type.is_none() {
        opts.content_type = Some(DEFAULT_CONTENT_TYPE.to_owned());
    }

    let size = data.len();
    let etag = api
        .put_object(&bucket, &object, data, opts)
        .await
        .map_err(|e| FsError::from_store(e, &bucket, &object, &api.endpoint()))?;
    debug!(bucket = %bucket, key = %object, size, "object written");
    Ok(etag)
}

/// Read the object at `root`.
pub(crate) async fn get(api: &dyn StorageApi, root: &Locator) -> FsResult<Bytes> {
    let (bucket, object) = root.resolve();
    require_bucket(&bucket)?;
    require_key(root, &object)?;
    api.get_object(&bucket, &object)
        .await
        .map_err(|e| FsError::from_store(e, &bucket, &object, &api.endpoint()))
}

/// Server-side copy of `source` to `root`.
pub(crate) async fn copy(api: &dyn StorageApi, source: &Locator, root: &Locator) -> FsResult<()> {
    let (dst_bucket, dst_key) = root.resolve();
    let (src_bucket, src_key) = source.resolve();
    require_bucket(&dst_bucket)?;
    require_key(root, &dst_key)?;
    require_bucket(&src_bucket)?;
    require_key(source, &src_key)?;

    match api
        .copy_object(&src_bucket, &src_key, &dst_bucket, &dst_key)
        .await
    {
        Ok(()) => {
            debug!(from = %source, to = %root, "object copied");
            Ok(())
        }
        // A missing key can only be the source.
        Err(StoreError::NoSuchKey { key }) => Err(FsError::ObjectMissing {
            bucket: src_bucket,
            key,
        }),
        Err(e) => Err(FsError::from_store(e, &dst_bucket, &dst_key, &api.endpoint())),
    }
}
