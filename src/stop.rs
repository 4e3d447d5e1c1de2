//! Cooperative cancellation: [`StopSource`], [`StopToken`] and
//! [`StopCallback`].
//!
//! A stop source owns a shared, thread-safe state consisting of a
//! requested bit and a list of registered callbacks. Tokens are cheap,
//! cloneable views onto that state. Registering a callback while a stop has
//! already been requested invokes it synchronously and immediately;
//! requesting a stop invokes every registered callback exactly once, in
//! registration order (`spec.md` §3, §5).

use std::fmt;
use std::sync::{Arc, Mutex};

type Callback = Box<dyn FnOnce() + Send>;

struct Inner {
    requested: Mutex<State>,
}

struct State {
    requested: bool,
    callbacks: Vec<(u64, Option<Callback>)>,
    next_id: u64,
}

impl State {
    fn new() -> State {
        State {
            requested: false,
            callbacks: Vec::new(),
            next_id: 0,
        }
    }
}

/// Owns the cancellation state for one task (or one subtree of tasks).
///
/// Requesting stop is the only thread-safe mutation exposed by this module;
/// it may be called from any thread, including one that does not own the
/// task the source is attached to (`spec.md` §5: "Thread-safe operations").
#[derive(Clone)]
pub struct StopSource {
    inner: Arc<Inner>,
}

impl fmt::Debug for StopSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopSource")
            .field("requested", &self.is_stop_requested())
            .finish()
    }
}

impl Default for StopSource {
    fn default() -> StopSource {
        StopSource::new()
    }
}

impl StopSource {
    /// Creates a fresh source with no stop requested.
    pub fn new() -> StopSource {
        StopSource {
            inner: Arc::new(Inner {
                requested: Mutex::new(State::new()),
            }),
        }
    }

    /// A read-only view onto this source's state.
    pub fn token(&self) -> StopToken {
        StopToken {
            inner: self.inner.clone(),
        }
    }

    /// Requests stop.
    ///
    /// Sets the requested bit (step 1 of `spec.md` §5's cancellation
    /// sequence) then synchronously invokes every callback registered so
    /// far, in registration order (step 2). Idempotent: a second call is a
    /// no-op, and no callback runs twice.
    pub fn request_stop(&self) {
        let callbacks = {
            let mut state = self.inner.requested.lock().unwrap();
            if state.requested {
                return;
            }
            state.requested = true;
            state
                .callbacks
                .iter_mut()
                .filter_map(|(_, cb)| cb.take())
                .collect::<Vec<_>>()
        };
        for cb in callbacks {
            cb();
        }
    }

    /// `true` once [`StopSource::request_stop`] has been called.
    pub fn is_stop_requested(&self) -> bool {
        self.inner.requested.lock().unwrap().requested
    }
}

/// A cheap, cloneable, read-only view onto a [`StopSource`]'s state.
#[derive(Clone)]
pub struct StopToken {
    inner: Arc<Inner>,
}

impl fmt::Debug for StopToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopToken")
            .field("requested", &self.is_stop_requested())
            .finish()
    }
}

impl StopToken {
    /// `true` if the owning [`StopSource`] has had stop requested.
    pub fn is_stop_requested(&self) -> bool {
        self.inner.requested.lock().unwrap().requested
    }

    /// Registers `callback` to run when stop is requested.
    ///
    /// If stop has already been requested, `callback` runs synchronously
    /// before this call returns, matching `spec.md` §3: "Registering a
    /// callback while requested invokes it synchronously". The returned
    /// [`StopCallback`] deregisters on drop if it hasn't fired yet.
    pub fn on_stop<F>(&self, callback: F) -> StopCallback
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.inner.requested.lock().unwrap();
        if state.requested {
            drop(state);
            callback();
            return StopCallback {
                inner: self.inner.clone(),
                id: None,
            };
        }
        let id = state.next_id;
        state.next_id += 1;
        state.callbacks.push((id, Some(Box::new(callback))));
        StopCallback {
            inner: self.inner.clone(),
            id: Some(id),
        }
    }

    /// A token that never has stop requested, for leaf tasks with no
    /// cancellation parent.
    pub fn never() -> StopToken {
        StopSource::new().token()
    }
}

/// An RAII registration created by [`StopToken::on_stop`].
///
/// Dropping it before the source requests stop deregisters the callback
/// ("a cancelled waiter is spliced out... without affecting" anything else,
/// `spec.md` §5).
#[must_use = "dropping a StopCallback immediately deregisters it"]
pub struct StopCallback {
    inner: Arc<Inner>,
    id: Option<u64>,
}

impl Drop for StopCallback {
    fn drop(&mut self) {
        if let Some(id) = self.id {
            let mut state = self.inner.requested.lock().unwrap();
            state.callbacks.retain(|(cb_id, _)| *cb_id != id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn callback_runs_exactly_once_on_request() {
        let source = StopSource::new();
        let token = source.token();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let _cb = token.on_stop(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        source.request_stop();
        source.request_stop();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn callback_registered_after_request_runs_synchronously() {
        let source = StopSource::new();
        source.request_stop();
        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        let _cb = source.token().on_stop(move || {
            r.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropped_callback_does_not_run() {
        let source = StopSource::new();
        let token = source.token();
        let ran = Arc::new(AtomicUsize::new(0));
        let r = ran.clone();
        let cb = token.on_stop(move || {
            r.fetch_add(1, Ordering::SeqCst);
        });
        drop(cb);
        source.request_stop();
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}
