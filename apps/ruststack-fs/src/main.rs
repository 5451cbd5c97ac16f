//! RustStack FS command line.
//!
//! Runs `ls`, `stat`, `rm`, `rb`, `mb`, `cat`, `put` and `cp` against an
//! in-memory object store, optionally seeded from a JSON fixture.

mod cli;
mod fixture;

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result, bail};
use clap::Parser;
use futures::{StreamExt, stream};
use ruststack_core::{ClientConfig, ClientRegistry, FsConfig};
use ruststack_s3_fs::{
    Connector, DirPlacement, Entry, EntryKind, ListOptions, ObjectFs, ObjectFsFactory,
    RemoveError, RemoveOptions, RemoveTarget,
};
use ruststack_s3_store::{MemoryStore, PutOptions, StorageApi};
use serde_json::{Value, json};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::cli::{CatArgs, Cli, Command, CpArgs, LsArgs, MbArgs, PutArgs, RbArgs, RmArgs, StatArgs};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = FsConfig::from_env();
    init_tracing(&config.log_level)?;

    let store = match &cli.fixture {
        Some(path) => fixture::load(path).await?,
        None => MemoryStore::new(),
    };
    let factory = build_factory(store, config);
    let client = ClientConfig::from_env();
    info!(endpoint = %client.host_url, "ruststack-fs starting");

    let failures = run(&factory, &client, cli.command, cli.json).await?;
    if failures > 0 {
        bail!("{failures} operation(s) failed");
    }
    Ok(())
}

/// Initialize the tracing subscriber.
///
/// Logs go to stderr so they never mix with command output.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// A factory whose every client handle is `store`.
fn build_factory(store: MemoryStore, config: FsConfig) -> ObjectFsFactory {
    let connector: Connector = Arc::new(move |client: &ClientConfig| {
        debug!(endpoint = %client.host_url, "connecting to in-memory store");
        Ok(Arc::new(store.clone()) as Arc<dyn StorageApi>)
    });
    ObjectFsFactory::new(Arc::new(ClientRegistry::new()), connector, config)
}

/// Join the client endpoint and a user target such as `media/dir/`.
fn address(client: &ClientConfig, target: &str) -> String {
    format!(
        "{}/{}",
        client.host_url.trim_end_matches('/'),
        target.trim_start_matches('/')
    )
}

/// Execute one command, returning how many operations failed.
async fn run(
    factory: &ObjectFsFactory,
    client: &ClientConfig,
    command: Command,
    json: bool,
) -> Result<usize> {
    match command {
        Command::Ls(args) => ls(factory, client, args, json).await,
        Command::Stat(args) => stat(factory, client, args, json).await,
        Command::Rm(args) => rm(factory, client, args).await,
        Command::Rb(args) => rb(factory, client, args).await,
        Command::Mb(args) => mb(factory, client, args).await,
        Command::Cat(args) => cat(factory, client, args).await,
        Command::Put(args) => put(factory, client, args).await,
        Command::Cp(args) => cp(factory, client, args).await,
    }
}

async fn ls(
    factory: &ObjectFsFactory,
    client: &ClientConfig,
    args: LsArgs,
    json: bool,
) -> Result<usize> {
    let fs = factory.open(&address(client, args.target.as_deref().unwrap_or("")), client)?;
    let opts = ListOptions::builder()
        .recursive(args.recursive)
        .incomplete(args.incomplete)
        .with_metadata(args.metadata)
        .dir_placement(args.dirs)
        .build();

    let mut failures = 0;
    let mut entries = fs.list(opts);
    while let Some(entry) = entries.next().await {
        if let Some(error) = &entry.error {
            eprintln!("error: {}: {error}", entry.locator);
            failures += 1;
            continue;
        }
        println!("{}", render(&entry, json));
    }
    Ok(failures)
}

async fn stat(
    factory: &ObjectFsFactory,
    client: &ClientConfig,
    args: StatArgs,
    json: bool,
) -> Result<usize> {
    let fs = factory.open(&address(client, &args.target), client)?;
    let entry = fs
        .stat(args.incomplete)
        .await
        .with_context(|| format!("cannot stat {}", fs.locator()))?;
    println!("{}", render(&entry, json));
    Ok(0)
}

async fn rm(factory: &ObjectFsFactory, client: &ClientConfig, args: RmArgs) -> Result<usize> {
    let fs = factory.open(&address(client, &args.target), client)?;
    let opts = RemoveOptions::builder()
        .incomplete(args.incomplete)
        .bypass_governance(args.bypass)
        .build();

    if args.recursive {
        let listing = ListOptions::builder()
            .recursive(true)
            .incomplete(args.incomplete)
            .dir_placement(DirPlacement::None)
            .build();
        return remove_listed(&fs, listing, opts).await;
    }

    let entry = fs
        .stat(args.incomplete)
        .await
        .with_context(|| format!("cannot remove {}", fs.locator()))?;
    if entry.is_dir() {
        bail!("{} is a directory; use --recursive", fs.locator());
    }
    let target = RemoveTarget::from_entry(&entry)
        .with_context(|| format!("nothing to remove at {}", fs.locator()))?;
    let errors: Vec<RemoveError> = fs.remove(opts, stream::iter([target]))?.collect().await;
    Ok(report(&errors))
}

async fn rb(factory: &ObjectFsFactory, client: &ClientConfig, args: RbArgs) -> Result<usize> {
    let fs = factory.open(&address(client, &args.bucket), client)?;
    let opts = RemoveOptions::builder().remove_bucket(true).build();

    if args.force {
        let listing = ListOptions::builder()
            .recursive(true)
            .dir_placement(DirPlacement::Last)
            .build();
        return remove_listed(&fs, listing, opts).await;
    }

    let (bucket, _) = fs.locator().resolve();
    let end = RemoveTarget::EndOfBucket { bucket };
    let errors: Vec<RemoveError> = fs.remove(opts, stream::iter([end]))?.collect().await;
    Ok(report(&errors))
}

async fn mb(factory: &ObjectFsFactory, client: &ClientConfig, args: MbArgs) -> Result<usize> {
    let fs = factory.open(&address(client, &args.target), client)?;
    fs.make_bucket(args.ignore_existing)
        .await
        .with_context(|| format!("cannot make {}", fs.locator()))?;
    info!(locator = %fs.locator(), "bucket created");
    Ok(0)
}

async fn cat(factory: &ObjectFsFactory, client: &ClientConfig, args: CatArgs) -> Result<usize> {
    let fs = factory.open(&address(client, &args.target), client)?;
    let data = fs
        .get()
        .await
        .with_context(|| format!("cannot read {}", fs.locator()))?;
    std::io::stdout()
        .lock()
        .write_all(&data)
        .context("cannot write to stdout")?;
    Ok(0)
}

async fn put(factory: &ObjectFsFactory, client: &ClientConfig, args: PutArgs) -> Result<usize> {
    let fs = factory.open(&address(client, &args.target), client)?;
    let data = tokio::fs::read(&args.source)
        .await
        .with_context(|| format!("cannot read {}", args.source.display()))?;
    let opts = PutOptions {
        content_type: args.content_type,
        ..PutOptions::default()
    };
    let etag = fs
        .put(data.into(), opts)
        .await
        .with_context(|| format!("cannot write {}", fs.locator()))?;
    debug!(locator = %fs.locator(), etag = %etag, "uploaded");
    Ok(0)
}

async fn cp(factory: &ObjectFsFactory, client: &ClientConfig, args: CpArgs) -> Result<usize> {
    let fs = factory.open(&address(client, &args.target), client)?;
    let source = factory
        .open(&address(client, &args.source), client)?
        .locator()
        .clone();
    fs.copy_from(&source)
        .await
        .with_context(|| format!("cannot copy {source} to {}", fs.locator()))?;
    Ok(0)
}

/// Feed a recursive listing of `fs` into a remove.
///
/// Listing failures are printed and counted alongside removal failures.
async fn remove_listed(fs: &ObjectFs, listing: ListOptions, opts: RemoveOptions) -> Result<usize> {
    let unlisted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&unlisted);
    let targets = fs.list(listing).filter_map(move |entry| {
        let counter = Arc::clone(&counter);
        async move {
            if let Some(error) = &entry.error {
                eprintln!("error: {}: {error}", entry.locator);
                counter.fetch_add(1, Ordering::Relaxed);
            }
            RemoveTarget::from_entry(&entry)
        }
    });
    let errors: Vec<RemoveError> = fs.remove(opts, targets)?.collect().await;
    Ok(unlisted.load(Ordering::Relaxed) + report(&errors))
}

/// Print removal failures, returning how many there were.
fn report(errors: &[RemoveError]) -> usize {
    for error in errors {
        eprintln!("error: {error}");
    }
    errors.len()
}

/// One output line for `entry`.
fn render(entry: &Entry, json: bool) -> String {
    if json {
        return entry_json(entry).to_string();
    }
    let time = entry
        .last_modified
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_default();
    format!("[{time:>23}] {:>10} {}", entry.size, entry.locator)
}

fn entry_json(entry: &Entry) -> Value {
    let kind = match entry.kind {
        EntryKind::Object => "file",
        EntryKind::Directory => "folder",
        EntryKind::IncompleteUpload => "upload",
    };
    let mut value = json!({
        "status": "success",
        "type": kind,
        "key": entry.locator.to_string(),
        "size": entry.size,
        "lastModified": entry.last_modified.map(|t| t.to_rfc3339()),
    });
    if !entry.etag.is_empty() {
        value["etag"] = json!(entry.etag);
    }
    if let Some(upload_id) = &entry.upload_id {
        value["uploadId"] = json!(upload_id);
    }
    if !entry.user_metadata.is_empty() {
        value["userMetadata"] = json!(entry.user_metadata);
    }
    if !entry.metadata.is_empty() {
        value["metadata"] = json!(entry.metadata);
    }
    value
}
