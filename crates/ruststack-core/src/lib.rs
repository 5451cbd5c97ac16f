//! Core types, configuration, and client registry for the RustStack object
//! filesystem.
//!
//! This crate provides the pieces shared by every layer above the storage
//! API: environment-driven configuration, the bucket addressing style, and
//! the explicit registry that caches storage client handles per endpoint
//! and credential.

mod config;
mod error;
mod registry;
mod types;

pub use config::{ClientConfig, FsConfig};
pub use error::{CoreError, CoreResult};
pub use registry::{ClientKey, ClientRegistry};
pub use types::BucketLookup;
