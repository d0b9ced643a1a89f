//! Tunables for the adapters. Hosts deserialize these from their own settings store.

use std::time::Duration;

use serde::Deserialize;

use crate::types::CacheBudget;

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Settings for [`RemoteFolder`](crate::dav::RemoteFolder).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FolderConfig {
    /// Label shown for the root path `/`.
    pub root_label: String,
    /// MIME type assigned to entries the server reports without one.
    pub default_mime_type: String,
    /// Upper bound on how long a blocking mkdir/delete waits for its completion.
    pub request_timeout_ms: u64,
}

impl Default for FolderConfig {
    fn default() -> Self {
        Self {
            root_label: "DAV".to_string(),
            default_mime_type: "application/x-octet-stream".to_string(),
            request_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl FolderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_root_label<S: Into<String>>(mut self, label: S) -> Self {
        self.root_label = label.into();
        self
    }
}

/// Settings for [`ThumbnailProvider`](crate::cache::ThumbnailProvider).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Time a fetch may take, counted from dispatch. Requesters that join it share its deadline.
    pub fetch_timeout_ms: u64,
    /// Byte budget for cached thumbnails. `None` keeps every thumbnail for the process lifetime.
    pub cache_budget_bytes: Option<usize>,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self { fetch_timeout_ms: DEFAULT_TIMEOUT_MS, cache_budget_bytes: None }
    }
}

impl ThumbnailConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn budget(&self) -> CacheBudget {
        self.cache_budget_bytes
            .map(|bytes_max| CacheBudget { bytes_max })
            .unwrap_or_else(CacheBudget::unbounded)
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_budget_bytes(mut self, bytes: usize) -> Self {
        self.cache_budget_bytes = Some(bytes);
        self
    }
}
