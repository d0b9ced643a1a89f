//! Fake transports shared by the integration tests.
//!
//! Both fakes deliver results from spawned threads, the way a real network client would.

// Each integration test is compiled as its own crate, so not every test file
// uses every item from this shared module.
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use remote_folders_core::dav::{Completer, DavTransport, ListingSink, RemoteStream};
use remote_folders_core::{
    DavError, FetchCompleter, OpenMode, PropertyRecord, StatusCode, ThumbnailFetcher, ThumbnailKey,
};

pub fn folder(href: &str, name: &str) -> PropertyRecord {
    PropertyRecord {
        href: href.to_string(),
        name: name.to_string(),
        resource_type: "collection".to_string(),
        content_type: String::new(),
        content_length: 0,
        last_modified: None,
    }
}

pub fn file(href: &str, name: &str, content_type: &str, size: u64) -> PropertyRecord {
    PropertyRecord {
        href: href.to_string(),
        name: name.to_string(),
        resource_type: String::new(),
        content_type: content_type.to_string(),
        content_length: size,
        last_modified: None,
    }
}

/// How the fake answers a `propfind`.
#[derive(Clone)]
pub enum Listing {
    /// Send the records, then the end-of-listing record.
    Complete(Vec<PropertyRecord>),
    /// Send the records, then report a transport failure.
    FailAfter(Vec<PropertyRecord>, String),
    /// Send the records, then drop the sink without finishing.
    Abandon(Vec<PropertyRecord>),
}

/// DAV server double with per-path scripted answers.
#[derive(Default)]
pub struct ScriptedDav {
    listings: Mutex<HashMap<String, Listing>>,
    statuses: Mutex<HashMap<String, StatusCode>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    stalled: Mutex<Vec<Completer>>,
    pub delay: Duration,
    pub requests: AtomicUsize,
}

impl ScriptedDav {
    pub fn new() -> Self {
        Self { delay: Duration::from_millis(5), ..Self::default() }
    }

    pub fn with_listing(self, path: &str, listing: Listing) -> Self {
        self.listings.lock().unwrap().insert(path.to_string(), listing);
        self
    }

    /// Status answered for mkcol/delete on `path`. Paths without one never answer.
    pub fn with_status(self, path: &str, status: StatusCode) -> Self {
        self.statuses.lock().unwrap().insert(path.to_string(), status);
        self
    }

    pub fn with_file(self, path: &str, contents: &[u8]) -> Self {
        self.files.lock().unwrap().insert(path.to_string(), contents.to_vec());
        self
    }

    fn answer(&self, path: &str, reply: Completer) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let status = self.statuses.lock().unwrap().get(path).copied();
        match status {
            Some(status) => {
                let delay = self.delay;
                thread::spawn(move || {
                    thread::sleep(delay);
                    reply.complete(Ok(status));
                });
            }
            None => self.stalled.lock().unwrap().push(reply),
        }
    }
}

impl DavTransport for ScriptedDav {
    fn propfind(&self, path: &str, mut sink: ListingSink) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let listing = self.listings.lock().unwrap().get(path).cloned();
        let delay = self.delay;
        thread::spawn(move || {
            thread::sleep(delay);
            match listing {
                Some(Listing::Complete(records)) => {
                    for record in records {
                        sink.record(record);
                    }
                    sink.record(PropertyRecord::end_of_listing());
                }
                Some(Listing::FailAfter(records, reason)) => {
                    for record in records {
                        sink.record(record);
                    }
                    sink.fail(DavError::Transport(reason));
                }
                Some(Listing::Abandon(records)) => {
                    for record in records {
                        sink.record(record);
                    }
                    drop(sink);
                }
                None => sink.fail(DavError::from_status("", StatusCode::NOT_FOUND)),
            }
        });
    }

    fn mkcol(&self, path: &str, reply: Completer) {
        self.answer(path, reply);
    }

    fn delete(&self, path: &str, reply: Completer) {
        self.answer(path, reply);
    }

    fn open_stream(&self, path: &str, mode: OpenMode) -> Result<Box<dyn RemoteStream>, DavError> {
        let contents = self.files.lock().unwrap().get(path).cloned();
        match (contents, mode) {
            (Some(bytes), _) => Ok(Box::new(Cursor::new(bytes))),
            (None, OpenMode::Write) => Ok(Box::new(Cursor::new(Vec::new()))),
            (None, _) => Err(DavError::from_status(path, StatusCode::NOT_FOUND)),
        }
    }
}

/// Thumbnail source that holds every request until the test releases it.
#[derive(Default)]
pub struct GatedFetcher {
    held: Mutex<Vec<FetchCompleter>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl GatedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls_for(&self, path: &str) -> usize {
        self.calls.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn held(&self) -> usize {
        self.held.lock().unwrap().len()
    }

    /// Complete every held request for `path` from a background thread.
    pub fn release(&self, path: &str, result: Result<Vec<u8>, String>) {
        let mut held = self.held.lock().unwrap();
        let (matching, rest): (Vec<_>, Vec<_>) =
            held.drain(..).partition(|done| done.key().path == path);
        *held = rest;
        drop(held);

        for done in matching {
            let result = result.clone();
            thread::spawn(move || done.complete(result));
        }
    }
}

impl ThumbnailFetcher for GatedFetcher {
    fn load_image(&self, key: &ThumbnailKey, done: FetchCompleter) {
        *self.calls.lock().unwrap().entry(key.path.clone()).or_default() += 1;
        self.held.lock().unwrap().push(done);
    }
}

/// Counters shared between a [`DelayedFetcher`] and its delivery threads.
#[derive(Default)]
pub struct FetchCounters {
    pub calls: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

/// Thumbnail source that answers every request after a fixed delay, echoing the path as bytes.
pub struct DelayedFetcher {
    pub delay: Duration,
    pub counters: Arc<FetchCounters>,
}

impl DelayedFetcher {
    pub fn new(delay: Duration) -> Self {
        Self { delay, counters: Arc::new(FetchCounters::default()) }
    }
}

impl ThumbnailFetcher for DelayedFetcher {
    fn load_image(&self, key: &ThumbnailKey, done: FetchCompleter) {
        let counters = Arc::clone(&self.counters);
        counters.calls.fetch_add(1, Ordering::SeqCst);
        let now = counters.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        counters.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.delay;
        let bytes = key.path.as_bytes().to_vec();
        thread::spawn(move || {
            thread::sleep(delay);
            counters.in_flight.fetch_sub(1, Ordering::SeqCst);
            done.complete(Ok(bytes));
        });
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now().checked_add(timeout);
    while deadline.is_none_or(|deadline| Instant::now() < deadline) {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}
