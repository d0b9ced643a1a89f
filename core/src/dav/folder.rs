//! Synchronous folder operations over an asynchronous DAV transport.

use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use crate::config::FolderConfig;
use crate::error::DavError;
use crate::types::{
    Capabilities, Item, ItemKind, OpenMode, Permissions, PropertyRecord, StatusCode,
};

use super::file::DavFile;
use super::pending::{Completer, PendingCalls};
use super::transport::{DavTransport, ListingEvent, ListingSink};
use super::{Result, util};

/// Change notifications for hosts that render the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderEvent {
    LoadingChanged(bool),
    ItemAppended(usize),
    ListingFailed(DavError),
}

#[derive(Debug, Default)]
struct ListingState {
    path: String,
    items: Vec<Item>,
    loading: bool,
    generation: u64,
    failure: Option<DavError>,
    listeners: Vec<Sender<FolderEvent>>,
}

impl ListingState {
    fn emit(&mut self, event: FolderEvent) {
        self.listeners.retain(|listener| listener.send(event.clone()).is_ok());
    }

    fn kind_of(&self, path: &str) -> Option<ItemKind> {
        let path = util::normalize_path(path);
        self.items.iter().find(|item| item.path == path).map(|item| item.kind)
    }
}

#[derive(Debug, Default)]
struct Listing {
    state: Mutex<ListingState>,
    settled: Condvar,
}

impl Listing {
    fn begin(&self, path: &str) -> u64 {
        let mut state = self.state.lock();
        state.generation = state.generation.wrapping_add(1);
        state.path = util::normalize_path(path);
        state.items.clear();
        state.failure = None;
        state.loading = true;
        state.emit(FolderEvent::LoadingChanged(true));
        state.generation
    }

    fn apply(&self, generation: u64, event: ListingEvent, default_mime_type: &str) {
        let mut state = self.state.lock();
        if state.generation != generation || !state.loading {
            trace!(generation, "discarding event for a finished or superseded listing");
            return;
        }

        match event {
            ListingEvent::Record(record) if record.is_end_of_listing() => {
                debug!(path = %state.path, items = state.items.len(), "listing complete");
                state.loading = false;
                state.emit(FolderEvent::LoadingChanged(false));
                self.settled.notify_all();
            }
            ListingEvent::Record(record) => {
                trace!(
                    name = %record.name,
                    content_type = %record.content_type,
                    content_length = record.content_length,
                    resource_type = %record.resource_type,
                    "listing record"
                );
                state.items.push(item_from_record(record, default_mime_type));
                let index = state.items.len() - 1;
                state.emit(FolderEvent::ItemAppended(index));
            }
            ListingEvent::Failed(err) => {
                warn!(path = %state.path, error = %err, "listing failed");
                state.failure = Some(err.clone());
                state.loading = false;
                state.emit(FolderEvent::ListingFailed(err));
                state.emit(FolderEvent::LoadingChanged(false));
                self.settled.notify_all();
            }
        }
    }
}

fn item_from_record(record: PropertyRecord, default_mime_type: &str) -> Item {
    let kind = if record.is_collection() { ItemKind::Folder } else { ItemKind::File };
    let path = util::normalize_path(&record.href);
    let name =
        if record.name.is_empty() { util::basename(&path).to_string() } else { record.name };
    let mime_type = if record.content_type.is_empty() {
        default_mime_type.to_string()
    } else {
        record.content_type
    };
    let icon = match kind {
        ItemKind::Folder => util::FOLDER_ICON.to_string(),
        ItemKind::File => util::mime_type_icon(&mime_type).to_string(),
    };

    Item {
        path,
        name,
        kind,
        mime_type,
        size: record.content_length,
        mtime: record.last_modified,
        icon,
        selectable: true,
    }
}

/// Folder model backed by a DAV transport.
///
/// `load_directory` is non-blocking: hosts watch [`RemoteFolder::is_loading`] or subscribe to
/// [`FolderEvent`]s. `make_directory` and `delete_file` block the calling thread until the
/// transport reports back or the configured timeout passes, so they must not be called from a
/// thread the transport needs in order to deliver completions.
pub struct RemoteFolder {
    transport: Arc<dyn DavTransport>,
    config: FolderConfig,
    listing: Arc<Listing>,
    selection: Mutex<Vec<String>>,
    calls: Arc<PendingCalls>,
}

impl RemoteFolder {
    pub fn new(transport: Arc<dyn DavTransport>, config: FolderConfig) -> Self {
        Self {
            transport,
            config,
            listing: Arc::new(Listing::default()),
            selection: Mutex::new(Vec::new()),
            calls: PendingCalls::new(),
        }
    }

    pub fn config(&self) -> &FolderConfig {
        &self.config
    }

    /// Replace the listing with the contents of `path`. Returns before the listing arrives.
    ///
    /// Callers serialise loads; records still arriving for an earlier load are discarded.
    pub fn load_directory(&self, path: &str) {
        debug!(path, "loading directory");
        self.selection.lock().clear();

        let generation = self.listing.begin(path);
        let listing = Arc::clone(&self.listing);
        let default_mime_type = self.config.default_mime_type.clone();
        let sink = ListingSink::new(move |event| {
            listing.apply(generation, event, &default_mime_type);
        });
        self.transport.propfind(path, sink);
    }

    /// Block until the current listing settles, returning its items or the listing failure.
    ///
    /// A timeout too large to represent as a deadline (such as `Duration::MAX`) waits without one.
    pub fn wait_for_listing(&self, timeout: Duration) -> Result<Vec<Item>> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.listing.state.lock();
        while state.loading {
            let Some(deadline) = deadline else {
                self.listing.settled.wait(&mut state);
                continue;
            };
            if self.listing.settled.wait_until(&mut state, deadline).timed_out() && state.loading {
                return Err(DavError::Timeout {
                    operation: "PROPFIND",
                    path: state.path.clone(),
                    after: timeout,
                });
            }
        }

        match &state.failure {
            Some(err) => Err(err.clone()),
            None => Ok(state.items.clone()),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.listing.state.lock().loading
    }

    /// Path of the most recent `load_directory` call.
    pub fn path(&self) -> String {
        self.listing.state.lock().path.clone()
    }

    pub fn items(&self) -> Vec<Item> {
        self.listing.state.lock().items.clone()
    }

    pub fn item_count(&self) -> usize {
        self.listing.state.lock().items.len()
    }

    /// Failure reported by the most recent listing, if it failed.
    pub fn listing_error(&self) -> Option<DavError> {
        self.listing.state.lock().failure.clone()
    }

    /// Receive [`FolderEvent`]s for every subsequent change.
    pub fn subscribe(&self) -> Receiver<FolderEvent> {
        let (tx, rx) = mpsc::channel();
        self.listing.state.lock().listeners.push(tx);
        rx
    }

    pub fn kind_of(&self, path: &str) -> Option<ItemKind> {
        self.listing.state.lock().kind_of(path)
    }

    /// Every listed entry is readable and writable by its owner.
    pub fn permissions(&self, path: &str) -> Option<Permissions> {
        self.kind_of(path).map(|_| Permissions::READ_OWNER | Permissions::WRITE_OWNER)
    }

    /// Add a listed entry to the selection. Unknown paths are rejected.
    pub fn select(&self, path: &str) -> bool {
        if self.kind_of(path).is_none() {
            return false;
        }
        let path = util::normalize_path(path);
        let mut selection = self.selection.lock();
        if !selection.contains(&path) {
            selection.push(path);
        }
        true
    }

    pub fn deselect(&self, path: &str) {
        let path = util::normalize_path(path);
        self.selection.lock().retain(|selected| *selected != path);
    }

    pub fn clear_selection(&self) {
        self.selection.lock().clear();
    }

    pub fn selection(&self) -> Vec<String> {
        self.selection.lock().clone()
    }

    pub fn selected(&self) -> usize {
        self.selection.lock().len()
    }

    pub fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::ACCEPT_COPY;
        let selection = self.selection.lock();
        if !selection.is_empty() {
            let state = self.listing.state.lock();
            let can_bookmark =
                selection.iter().all(|path| state.kind_of(path) == Some(ItemKind::Folder));

            caps |= Capabilities::CAN_COPY | Capabilities::CAN_DELETE;
            if can_bookmark {
                caps |= Capabilities::CAN_BOOKMARK;
            }
        }
        caps
    }

    pub fn friendly_basename(&self, path: &str) -> String {
        if path == "/" {
            self.config.root_label.clone()
        } else {
            util::basename(path).to_string()
        }
    }

    pub fn open_file(&self, path: &str, mode: OpenMode) -> Result<DavFile> {
        let mut file = DavFile::new(path, mode, Arc::clone(&self.transport));
        file.open()?;
        Ok(file)
    }

    /// Create a collection, blocking until the server answers. Only `201 Created` succeeds.
    pub fn make_directory(&self, path: &str) -> Result<()> {
        let status =
            self.round_trip("MKCOL", path, |transport, reply| transport.mkcol(path, reply))?;
        expect_status(path, status, StatusCode::CREATED)
    }

    /// Delete a resource, blocking until the server answers. Only `204 No Content` succeeds.
    pub fn delete_file(&self, path: &str) -> Result<()> {
        debug!(path, "deleting");
        let status =
            self.round_trip("DELETE", path, |transport, reply| transport.delete(path, reply))?;
        expect_status(path, status, StatusCode::NO_CONTENT)
    }

    /// Requests issued by blocking calls that have not resolved yet.
    pub fn requests_in_flight(&self) -> usize {
        self.calls.in_flight()
    }

    fn round_trip<F>(&self, operation: &'static str, path: &str, issue: F) -> Result<StatusCode>
    where
        F: FnOnce(&dyn DavTransport, Completer),
    {
        let (completer, call) = PendingCalls::register(&self.calls, operation, path);
        issue(self.transport.as_ref(), completer);
        call.wait(self.config.request_timeout())
    }
}

fn expect_status(path: &str, status: StatusCode, expected: StatusCode) -> Result<()> {
    if status == expected { Ok(()) } else { Err(DavError::from_status(path, status)) }
}

impl fmt::Debug for RemoteFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteFolder")
            .field("config", &self.config)
            .field("listing", &self.listing)
            .field("selection", &self.selection)
            .field("calls", &self.calls)
            .finish_non_exhaustive()
    }
}
