//! Single-assignment result slot shared by every requester of an in-flight thumbnail.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::ThumbnailError;

pub type FetchOutcome = Result<Vec<u8>, ThumbnailError>;

/// One dispatched fetch. The deadline is fixed at dispatch, so every requester that joins the
/// fetch gives up at the same moment.
#[derive(Debug)]
pub struct Flight {
    outcome: Mutex<Option<FetchOutcome>>,
    resolved: Condvar,
    /// `None` when the timeout is too large to represent; waiters then wait for the outcome.
    deadline: Option<Instant>,
}

impl Flight {
    pub fn new(timeout: Duration) -> Self {
        Self {
            outcome: Mutex::new(None),
            resolved: Condvar::new(),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// Store the outcome and wake every waiter. Only the first call has any effect.
    pub fn resolve(&self, outcome: FetchOutcome) -> bool {
        let mut slot = self.outcome.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(outcome);
        self.resolved.notify_all();
        true
    }

    /// Block until resolved or the fetch deadline passes. `None` means the deadline passed first.
    pub fn wait(&self) -> Option<FetchOutcome> {
        let mut slot = self.outcome.lock();
        while slot.is_none() {
            match self.deadline {
                Some(deadline) => {
                    if self.resolved.wait_until(&mut slot, deadline).timed_out() {
                        break;
                    }
                }
                None => self.resolved.wait(&mut slot),
            }
        }
        slot.clone()
    }

    pub fn outcome(&self) -> Option<FetchOutcome> {
        self.outcome.lock().clone()
    }
}
