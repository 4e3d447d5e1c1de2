//! [`CoroContext`]: the per-task environment every spawned task carries for
//! its whole lifetime, and the thread-local mechanism nested awaiters use to
//! find it.
//!
//! The original C++ runtime injects a `CoroContext` into every awaited
//! object through an `await_transform`/`set_context` hook on `co_await`.
//! Rust's `Future` has no equivalent extension point, so this crate uses the
//! same substitute `tokio::task_local!`/`tracing` span guards use: a
//! thread-local stack that the executor pushes onto before polling a task's
//! top-level future and pops after. Any nested awaiter -- a reactor
//! operation, `sleep`, `this_task::stop_requested` -- reads
//! [`current`] to discover the executor and stop token of whichever task is
//! currently being polled on this thread.

use std::cell::RefCell;
use std::rc::Rc;

use crate::executor::Executor;
use crate::stop::{StopSource, StopToken};

/// The per-task environment described in `spec.md` §3.
///
/// Exactly one task harness owns one `CoroContext` for its lifetime; it is
/// bound before the task's future is first polled and is never reassigned
/// (the invariant `spec.md` states for the C++ promise).
pub struct CoroContext {
    executor: Rc<dyn Executor>,
    stop_source: StopSource,
    parent: Option<Rc<CoroContext>>,
}

impl CoroContext {
    /// Builds a new context bound to `executor`, with its own independent
    /// stop source.
    pub fn new(executor: Rc<dyn Executor>) -> Rc<CoroContext> {
        Rc::new(CoroContext {
            executor,
            stop_source: StopSource::new(),
            parent: None,
        })
    }

    /// Builds a context that is a child of `parent`: same executor,
    /// independent stop source, but a stop of the parent's token is wired
    /// to also request stop here via [`StopToken::on_stop`] by the caller
    /// (composition operators do this explicitly so they can unlink a
    /// child early, e.g. in `select_any`).
    pub fn child_of(parent: &Rc<CoroContext>) -> Rc<CoroContext> {
        Rc::new(CoroContext {
            executor: parent.executor.clone(),
            stop_source: StopSource::new(),
            parent: Some(parent.clone()),
        })
    }

    /// The executor driving this task.
    pub fn executor(&self) -> Rc<dyn Executor> {
        self.executor.clone()
    }

    /// This task's own stop source -- `task.stop()` in `spec.md` §4.4 calls
    /// `request_stop` on this.
    pub fn stop_source(&self) -> &StopSource {
        &self.stop_source
    }

    /// This task's stop token.
    pub fn stop_token(&self) -> StopToken {
        self.stop_source.token()
    }

    /// `true` if this task (or any ancestor it was spawned under) has had
    /// stop requested.
    pub fn is_stop_requested(&self) -> bool {
        if self.stop_source.is_stop_requested() {
            return true;
        }
        match &self.parent {
            Some(parent) => parent.is_stop_requested(),
            None => false,
        }
    }

    /// The context one level up the spawn tree, if any.
    pub fn parent(&self) -> Option<&Rc<CoroContext>> {
        self.parent.as_ref()
    }
}

thread_local! {
    static CURRENT: RefCell<Vec<Rc<CoroContext>>> = RefCell::new(Vec::new());
}

/// The context of whichever task is currently being polled on this thread,
/// if any.
///
/// Reactor operations call this to find the stop token to race against and
/// the executor to register timers on; it is `None` only when code runs
/// outside of any task (e.g. before the first task has been spawned).
pub fn current() -> Option<Rc<CoroContext>> {
    CURRENT.with(|stack| stack.borrow().last().cloned())
}

/// Pushes `ctx` as the current context for the duration of `f`, restoring
/// the previous value (if any) afterwards. Called by the task harness
/// around each `poll`.
pub(crate) fn enter<R>(ctx: Rc<CoroContext>, f: impl FnOnce() -> R) -> R {
    CURRENT.with(|stack| stack.borrow_mut().push(ctx));
    struct Guard;
    impl Drop for Guard {
        fn drop(&mut self) {
            CURRENT.with(|stack| {
                stack.borrow_mut().pop();
            });
        }
    }
    let _guard = Guard;
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::test_support::NoopExecutor;

    #[test]
    fn current_is_none_outside_any_task() {
        assert!(current().is_none());
    }

    #[test]
    fn enter_pushes_and_pops() {
        let ctx = CoroContext::new(Rc::new(NoopExecutor));
        assert!(current().is_none());
        enter(ctx.clone(), || {
            assert!(current().is_some());
        });
        assert!(current().is_none());
    }

    #[test]
    fn child_inherits_stop_from_parent() {
        let parent = CoroContext::new(Rc::new(NoopExecutor));
        let child = CoroContext::child_of(&parent);
        assert!(!child.is_stop_requested());
        parent.stop_source().request_stop();
        assert!(child.is_stop_requested());
        assert!(!child.stop_source.is_stop_requested());
    }
}
