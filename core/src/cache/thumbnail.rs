//! Blocking thumbnail provider with request deduplication.
//!
//! [`ThumbnailProvider::request_image`] blocks, so it belongs on a worker thread that is allowed
//! to wait (an asynchronous image-loading context in the host), never on a UI thread.
//!
//! Every key is in one of three states: absent, pending (exactly one fetch in flight, shared by
//! all requesters through a [`Flight`]), or present in the [`MemoryCache`]. The state lock is
//! held only while inspecting or mutating the map and pending set, never across a fetch.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::codec::{DecodedImage, decode_thumbnail};
use crate::config::ThumbnailConfig;
use crate::error::ThumbnailError;
use crate::stats::{CacheSnapshot, StatsCollector};
use crate::types::ThumbnailKey;

use super::flight::{FetchOutcome, Flight};
use super::memory::{CacheEntry, MemoryCache};

/// Asynchronous thumbnail source, e.g. a Dropbox thumbnail endpoint.
pub trait ThumbnailFetcher: Send + Sync {
    /// Start loading `key` and return immediately. The result goes through `done`, from any
    /// thread.
    fn load_image(&self, key: &ThumbnailKey, done: FetchCompleter);
}

#[derive(Debug)]
struct CacheState {
    images: MemoryCache,
    loading: HashMap<ThumbnailKey, Arc<Flight>>,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<CacheState>,
    stats: StatsCollector,
}

impl Shared {
    fn publish_usage(&self, state: &CacheState) {
        self.stats.update_cache_usage(
            state.images.bytes_used() as u64,
            state.images.budget().bytes_max as u64,
            state.loading.len(),
        );
    }

    fn release_if_current(state: &mut CacheState, key: &ThumbnailKey, flight: &Arc<Flight>) {
        if state.loading.get(key).is_some_and(|current| Arc::ptr_eq(current, flight)) {
            state.loading.remove(key);
        }
    }

    fn settle(
        &self,
        key: &ThumbnailKey,
        flight: &Arc<Flight>,
        outcome: FetchOutcome,
        elapsed: Duration,
    ) {
        match &outcome {
            Ok(bytes) => debug!(?key, bytes = bytes.len(), ?elapsed, "thumbnail loaded"),
            Err(err) => warn!(?key, error = %err, "thumbnail fetch failed"),
        }
        self.stats.record_fetch_finished(elapsed, outcome.is_ok());

        let mut state = self.state.lock();
        Self::release_if_current(&mut state, key, flight);
        if let Ok(bytes) = &outcome {
            if !state.images.insert(key.clone(), CacheEntry::new(bytes.clone())) {
                debug!(?key, "thumbnail exceeds cache budget; serving without caching");
            }
        }
        self.publish_usage(&state);
        // Resolve under the state lock so a concurrent timeout cannot overtake a delivered image.
        flight.resolve(outcome);
    }

    fn abandon(&self, key: &ThumbnailKey, flight: &Arc<Flight>, after: Duration) -> FetchOutcome {
        let mut state = self.state.lock();
        Self::release_if_current(&mut state, key, flight);
        self.publish_usage(&state);

        let timeout = ThumbnailError::Timeout { path: key.path.clone(), after };
        if flight.resolve(Err(timeout.clone())) {
            warn!(?key, ?after, "thumbnail fetch timed out; releasing waiters");
            self.stats.record_timeout();
        }
        flight.outcome().unwrap_or(Err(timeout))
    }
}

/// Handle given to the fetcher; consuming it publishes the result to every waiter of the key.
///
/// A completer dropped without a result counts as a failed fetch, so the key is never left
/// pending.
pub struct FetchCompleter {
    key: ThumbnailKey,
    flight: Arc<Flight>,
    shared: Weak<Shared>,
    started: Instant,
    fired: bool,
}

impl FetchCompleter {
    fn new(key: ThumbnailKey, flight: Arc<Flight>, shared: Weak<Shared>) -> Self {
        Self { key, flight, shared, started: Instant::now(), fired: false }
    }

    pub fn key(&self) -> &ThumbnailKey {
        &self.key
    }

    /// Deliver the encoded image bytes, or a description of why the fetch failed.
    pub fn complete(mut self, result: Result<Vec<u8>, String>) {
        self.fire(result);
    }

    fn fire(&mut self, result: Result<Vec<u8>, String>) {
        if self.fired {
            return;
        }
        self.fired = true;

        let outcome =
            result.map_err(|reason| ThumbnailError::Fetch { path: self.key.path.clone(), reason });
        match self.shared.upgrade() {
            Some(shared) => shared.settle(&self.key, &self.flight, outcome, self.started.elapsed()),
            None => {
                self.flight.resolve(outcome);
            }
        }
    }
}

impl Drop for FetchCompleter {
    fn drop(&mut self) {
        if !self.fired {
            self.fire(Err("fetch dropped without a result".to_string()));
        }
    }
}

impl fmt::Debug for FetchCompleter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchCompleter")
            .field("key", &self.key)
            .field("fired", &self.fired)
            .finish_non_exhaustive()
    }
}

/// Serves thumbnails by key, fetching each key at most once while it is in flight.
pub struct ThumbnailProvider {
    shared: Arc<Shared>,
    fetcher: Arc<dyn ThumbnailFetcher>,
    config: ThumbnailConfig,
}

impl ThumbnailProvider {
    pub fn new(fetcher: Arc<dyn ThumbnailFetcher>, config: ThumbnailConfig) -> Self {
        let state =
            CacheState { images: MemoryCache::new(config.budget()), loading: HashMap::new() };
        Self {
            shared: Arc::new(Shared { state: Mutex::new(state), stats: StatsCollector::new() }),
            fetcher,
            config,
        }
    }

    /// Return the encoded bytes for `key`, blocking until they are available.
    ///
    /// Concurrent calls for the same key share one fetch. The fetch timeout runs from dispatch,
    /// so a caller that joins a fetch already in flight waits only for what is left of it. A
    /// failed or timed-out fetch is reported to every waiter and forgotten, so the next call
    /// fetches again.
    pub fn request_image(&self, key: &ThumbnailKey) -> Result<Vec<u8>, ThumbnailError> {
        let (flight, dispatch) = {
            let mut state = self.shared.state.lock();
            if let Some(entry) = state.images.get(key) {
                self.shared.stats.record_lookup(true);
                trace!(?key, "thumbnail cache hit");
                return Ok(entry.bytes.clone());
            }
            self.shared.stats.record_lookup(false);

            match state.loading.get(key) {
                Some(flight) => {
                    self.shared.stats.record_joined();
                    trace!(?key, "joining in-flight thumbnail fetch");
                    (Arc::clone(flight), false)
                }
                None => {
                    let flight = Arc::new(Flight::new(self.config.fetch_timeout()));
                    state.loading.insert(key.clone(), Arc::clone(&flight));
                    self.shared.publish_usage(&state);
                    (flight, true)
                }
            }
        };

        if dispatch {
            debug!(?key, "dispatching thumbnail fetch");
            self.shared.stats.record_fetch_dispatched();
            let done =
                FetchCompleter::new(key.clone(), Arc::clone(&flight), Arc::downgrade(&self.shared));
            self.fetcher.load_image(key, done);
        }

        match flight.wait() {
            Some(outcome) => outcome,
            None => self.shared.abandon(key, &flight, self.config.fetch_timeout()),
        }
    }

    /// Like [`request_image`](Self::request_image), but decoded to RGBA with its dimensions.
    pub fn request_decoded(&self, key: &ThumbnailKey) -> Result<DecodedImage, ThumbnailError> {
        let bytes = self.request_image(key)?;
        decode_thumbnail(&bytes).map_err(|err| ThumbnailError::Decode(format!("{err:#}")))
    }

    pub fn contains(&self, key: &ThumbnailKey) -> bool {
        self.shared.state.lock().images.contains_key(key)
    }

    pub fn is_pending(&self, key: &ThumbnailKey) -> bool {
        self.shared.state.lock().loading.contains_key(key)
    }

    pub fn cached_len(&self) -> usize {
        self.shared.state.lock().images.len()
    }

    pub fn stats(&self) -> CacheSnapshot {
        self.shared.stats.snapshot()
    }
}

impl fmt::Debug for ThumbnailProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThumbnailProvider")
            .field("shared", &self.shared)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
