//! Table of in-flight DAV requests, each waited on through its own channel.
//!
//! A blocking operation registers itself, hands the returned [`Completer`] to the transport, and
//! then parks on its [`PendingCall`]. The transport resolves the call from whatever thread it
//! runs completions on. Calls that time out are removed from the table, so a late completion is
//! dropped instead of being delivered to an unrelated request.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::DavError;
use crate::types::{RequestToken, StatusCode};

pub type Completion = Result<StatusCode, DavError>;

#[derive(Debug)]
struct Waiting {
    operation: &'static str,
    path: String,
    reply: Sender<Completion>,
}

#[derive(Debug, Default)]
struct PendingInner {
    waiting: HashMap<RequestToken, Waiting>,
    next_token: u64,
}

#[derive(Debug, Default)]
pub struct PendingCalls {
    inner: Mutex<PendingInner>,
}

impl PendingCalls {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a new call. The [`Completer`] goes to the transport, the [`PendingCall`] stays
    /// with the blocked caller.
    pub fn register(
        calls: &Arc<Self>,
        operation: &'static str,
        path: &str,
    ) -> (Completer, PendingCall) {
        let (tx, rx) = mpsc::channel();
        let token = {
            let mut inner = calls.inner.lock();
            inner.next_token = inner.next_token.wrapping_add(1).max(1);
            let token = RequestToken::new(inner.next_token);
            inner
                .waiting
                .insert(token, Waiting { operation, path: path.to_string(), reply: tx });
            token
        };

        let completer = Completer { token, calls: Arc::downgrade(calls), fired: false };
        let call = PendingCall {
            token,
            operation,
            path: path.to_string(),
            receiver: rx,
            calls: Arc::clone(calls),
        };
        (completer, call)
    }

    /// Number of calls still waiting for a completion.
    pub fn in_flight(&self) -> usize {
        self.inner.lock().waiting.len()
    }

    fn resolve(&self, token: RequestToken, completion: Completion) -> bool {
        let waiting = self.inner.lock().waiting.remove(&token);
        match waiting {
            Some(waiting) => {
                debug!(
                    operation = waiting.operation,
                    path = %waiting.path,
                    token = token.as_u64(),
                    ?completion,
                    "request resolved"
                );
                // The caller may have given up between the removal above and this send.
                waiting.reply.send(completion).is_ok()
            }
            None => {
                warn!(token = token.as_u64(), ?completion, "dropping late completion");
                false
            }
        }
    }

    fn abandon(&self, token: RequestToken) {
        self.inner.lock().waiting.remove(&token);
    }
}

/// Handle given to the transport; consuming it delivers the outcome to the blocked caller.
///
/// Dropping a completer without calling [`Completer::complete`] resolves the call with a
/// transport failure, so a transport that loses a request cannot strand its caller.
#[derive(Debug)]
pub struct Completer {
    token: RequestToken,
    calls: Weak<PendingCalls>,
    fired: bool,
}

impl Completer {
    pub fn token(&self) -> RequestToken {
        self.token
    }

    pub fn complete(mut self, completion: Completion) {
        self.fire(completion);
    }

    fn fire(&mut self, completion: Completion) {
        if self.fired {
            return;
        }
        self.fired = true;
        if let Some(calls) = self.calls.upgrade() {
            calls.resolve(self.token, completion);
        }
    }
}

impl Drop for Completer {
    fn drop(&mut self) {
        if !self.fired {
            self.fire(Err(DavError::Transport(
                "request completion dropped without a status".to_string(),
            )));
        }
    }
}

/// The caller's side of a registered request.
#[derive(Debug)]
pub struct PendingCall {
    token: RequestToken,
    operation: &'static str,
    path: String,
    receiver: Receiver<Completion>,
    calls: Arc<PendingCalls>,
}

impl PendingCall {
    /// Block until the transport resolves the call or `timeout` elapses.
    pub fn wait(self, timeout: Duration) -> Completion {
        match self.receiver.recv_timeout(timeout) {
            Ok(completion) => completion,
            Err(RecvTimeoutError::Timeout) => {
                self.calls.abandon(self.token);
                // A completion may have slipped in before the token was removed.
                if let Ok(completion) = self.receiver.try_recv() {
                    return completion;
                }
                warn!(
                    operation = self.operation,
                    path = %self.path,
                    ?timeout,
                    "request timed out"
                );
                Err(DavError::Timeout { operation: self.operation, path: self.path, after: timeout })
            }
            Err(RecvTimeoutError::Disconnected) => Err(DavError::Transport(format!(
                "{} {} lost its completion channel",
                self.operation, self.path
            ))),
        }
    }
}
