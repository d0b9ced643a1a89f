//! Thumbnail caching: the byte store, in-flight fetch tracking, and the blocking provider.

mod flight;
pub mod memory;
pub mod thumbnail;

pub use memory::{CacheEntry, MemoryCache};
pub use thumbnail::{FetchCompleter, ThumbnailFetcher, ThumbnailProvider};
