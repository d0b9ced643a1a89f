//! Interface to the asynchronous DAV client.
//!
//! Implementations issue the request and return immediately; results are delivered later, from
//! any thread, through the [`ListingSink`] or [`Completer`] handed to each call.

use std::fmt;
use std::io::{Read, Write};

use crate::error::DavError;
use crate::types::{OpenMode, PropertyRecord};

pub use super::pending::{Completer, Completion};

/// Asynchronous remote-filesystem client consumed by [`RemoteFolder`](super::RemoteFolder).
pub trait DavTransport: Send + Sync {
    /// List `path`, feeding one record per entry into `sink` and finishing with the empty-href
    /// record (or [`ListingSink::fail`]).
    fn propfind(&self, path: &str, sink: ListingSink);

    /// Create the collection at `path`.
    fn mkcol(&self, path: &str, reply: Completer);

    /// Delete the resource at `path`.
    fn delete(&self, path: &str, reply: Completer);

    /// Open a byte stream for the file at `path`.
    fn open_stream(&self, path: &str, mode: OpenMode) -> Result<Box<dyn RemoteStream>, DavError>;
}

/// Byte stream for an open remote file.
pub trait RemoteStream: Read + Write + Send {}

impl<T: Read + Write + Send> RemoteStream for T {}

/// One notification from a listing in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingEvent {
    Record(PropertyRecord),
    Failed(DavError),
}

type ListingHandler = Box<dyn FnMut(ListingEvent) + Send>;

/// Receives the records of a single `propfind`.
///
/// The sink finishes once it has seen the empty-href record or a failure; anything after that is
/// ignored. A sink dropped before finishing reports a transport failure, so a listing can never
/// stay loading forever because the transport lost it.
pub struct ListingSink {
    handler: ListingHandler,
    finished: bool,
}

impl ListingSink {
    pub fn new(handler: impl FnMut(ListingEvent) + Send + 'static) -> Self {
        Self { handler: Box::new(handler), finished: false }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn record(&mut self, record: PropertyRecord) {
        if self.finished {
            return;
        }
        self.finished = record.is_end_of_listing();
        (self.handler)(ListingEvent::Record(record));
    }

    pub fn fail(mut self, err: DavError) {
        self.finish_with(err);
    }

    fn finish_with(&mut self, err: DavError) {
        if self.finished {
            return;
        }
        self.finished = true;
        (self.handler)(ListingEvent::Failed(err));
    }
}

impl Drop for ListingSink {
    fn drop(&mut self) {
        self.finish_with(DavError::Transport("listing ended without completion".to_string()));
    }
}

impl fmt::Debug for ListingSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListingSink").field("finished", &self.finished).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording_sink() -> (ListingSink, Arc<Mutex<Vec<ListingEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink_events = Arc::clone(&events);
        let sink = ListingSink::new(move |event| sink_events.lock().unwrap().push(event));
        (sink, events)
    }

    fn record(href: &str) -> PropertyRecord {
        PropertyRecord { href: href.to_string(), name: href.to_string(), ..Default::default() }
    }

    #[test]
    fn records_after_end_of_listing_are_ignored() {
        let (mut sink, events) = recording_sink();
        sink.record(record("/a"));
        sink.record(PropertyRecord::end_of_listing());
        sink.record(record("/late"));
        assert!(sink.is_finished());
        drop(sink);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], ListingEvent::Record(r) if r.is_end_of_listing()));
    }

    #[test]
    fn dropping_unfinished_sink_reports_failure() {
        let (mut sink, events) = recording_sink();
        sink.record(record("/a"));
        drop(sink);

        let events = events.lock().unwrap();
        assert!(matches!(events.last(), Some(ListingEvent::Failed(DavError::Transport(_)))));
    }

    #[test]
    fn explicit_failure_is_delivered_once() {
        let (sink, events) = recording_sink();
        sink.fail(DavError::Transport("connection reset".into()));
        assert_eq!(events.lock().unwrap().len(), 1);
    }
}
