//! Client-side adapters over a remote file collection: a blocking folder model on top of an
//! asynchronous DAV client, and a deduplicating thumbnail cache.

#![deny(missing_debug_implementations)]

pub mod cache;
pub mod codec;
pub mod config;
pub mod dav;
pub mod error;
pub mod log;
pub mod stats;
pub mod types;

pub type Result<T> = std::result::Result<T, anyhow::Error>;

pub use cache::{FetchCompleter, ThumbnailFetcher, ThumbnailProvider};
pub use config::{FolderConfig, ThumbnailConfig};
pub use dav::{DavFile, DavTransport, FolderEvent, ListingSink, RemoteFolder};
pub use error::{DavError, StatusKind, ThumbnailError};
pub use types::{
    Capabilities, CacheBudget, ImageDimensions, Item, ItemKind, OpenMode, Permissions,
    PropertyRecord, RequestToken, RequestedSize, StatusCode, ThumbnailKey,
};

/// Returns the version of the core crate for telemetry and debugging.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
