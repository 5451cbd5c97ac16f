//! Command line definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use ruststack_s3_fs::DirPlacement;

/// Filesystem view over object storage.
#[derive(Debug, Parser)]
#[command(name = "ruststack-fs", version)]
pub struct Cli {
    /// JSON fixture used to seed the in-memory store.
    #[arg(long, global = true)]
    pub fixture: Option<PathBuf>,

    /// Print one JSON object per line.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List buckets, objects and directories
    Ls(LsArgs),
    /// Show a single object, directory or bucket
    Stat(StatArgs),
    /// Remove objects or incomplete uploads
    Rm(RmArgs),
    /// Remove a bucket
    Rb(RbArgs),
    /// Make a bucket or a folder
    Mb(MbArgs),
    /// Print an object's content
    Cat(CatArgs),
    /// Upload a local file
    Put(PutArgs),
    /// Copy an object server-side
    Cp(CpArgs),
}

#[derive(Debug, Args)]
pub struct LsArgs {
    /// Descend into sub-directories.
    #[arg(short, long)]
    pub recursive: bool,

    /// List incomplete uploads.
    #[arg(long)]
    pub incomplete: bool,

    /// Include user and system metadata.
    #[arg(long)]
    pub metadata: bool,

    /// Where directories appear in recursive listings: none, first or last.
    #[arg(long, default_value = "none")]
    pub dirs: DirPlacement,

    /// Target such as `media/dir/`; lists buckets when omitted.
    pub target: Option<String>,
}

#[derive(Debug, Args)]
pub struct StatArgs {
    /// Look up an incomplete upload.
    #[arg(long)]
    pub incomplete: bool,

    /// Target to resolve.
    pub target: String,
}

#[derive(Debug, Args)]
pub struct RmArgs {
    /// Remove everything under the target.
    #[arg(short, long)]
    pub recursive: bool,

    /// Abort incomplete uploads instead of deleting objects.
    #[arg(long)]
    pub incomplete: bool,

    /// Delete objects under governance retention.
    #[arg(long)]
    pub bypass: bool,

    /// Target to remove.
    pub target: String,
}

#[derive(Debug, Args)]
pub struct RbArgs {
    /// Remove the bucket's objects first.
    #[arg(long)]
    pub force: bool,

    /// Bucket to remove.
    pub bucket: String,
}

#[derive(Debug, Args)]
pub struct MbArgs {
    /// Succeed when the bucket already exists.
    #[arg(short = 'p', long)]
    pub ignore_existing: bool,

    /// Bucket, or `bucket/folder/` for a folder marker.
    pub target: String,
}

#[derive(Debug, Args)]
pub struct CatArgs {
    /// Object to print.
    pub target: String,
}

#[derive(Debug, Args)]
pub struct PutArgs {
    /// `Content-Type` to record.
    #[arg(long)]
    pub content_type: Option<String>,

    /// Local file to upload.
    pub source: PathBuf,

    /// Destination object.
    pub target: String,
}

#[derive(Debug, Args)]
pub struct CpArgs {
    /// Source object.
    pub source: String,

    /// Destination object.
    pub target: String,
}
