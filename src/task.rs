//! [`Task<T>`] and the harness that drives it.
//!
//! `Task<T>` is the Rust rendering of `spec.md`'s lazy coroutine frame: it
//! wraps a boxed [`Future`] that does nothing until the executor first
//! polls it, and tears the future down on drop exactly like a coroutine
//! frame is destroyed when its handle is dropped without being resumed to
//! completion.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures_channel::oneshot;

use crate::context::CoroContext;
use crate::error::{Error, Result};
use crate::executor::{waker_for, Executor, Runnable, WakeTask};
use crate::stop::StopToken;

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T>>>>;

/// A spawned, independently-schedulable unit of work.
///
/// Awaiting a `Task<T>` waits for it to complete and yields its result;
/// dropping it before completion requests cancellation and tears the
/// task's future down immediately, wherever it was suspended, rather than
/// leaving it running in the background to complete on its own (`spec.md`
/// §4.3/§4.4 -- this crate does not support "fire and forget without ever
/// cancelling", nor does it let an already-detached task keep consuming
/// timers or reactor registrations after its last handle is gone).
pub struct Task<T> {
    harness: Rc<TaskHarness<T>>,
    result: oneshot::Receiver<Result<T>>,
}

impl<T: 'static> Task<T> {
    /// The stop token that, when triggered, cancels this task's subtree.
    pub fn stop_token(&self) -> StopToken {
        self.harness.ctx.stop_token()
    }

    /// Requests cancellation of this task without waiting for it to react.
    pub fn stop(&self) {
        self.harness.ctx.stop_source().request_stop();
    }

    /// `true` if the task has already run to completion.
    pub fn is_finished(&self) -> bool {
        self.harness.state.borrow().future.is_none()
    }
}

impl<T> Drop for Task<T> {
    fn drop(&mut self) {
        self.harness.ctx.stop_source().request_stop();
        // Flips the stop bit alone wouldn't stop anything: nothing in a
        // suspended future (e.g. `Sleep`) polls for it. The harness may
        // still be kept alive by a registered timer/reactor waker after
        // this handle is gone, so drop the boxed future itself here to
        // actually tear down whatever it was suspended on (e.g. freeing
        // `Sleep`, which cancels its pending timer on its own `Drop`).
        self.harness.state.borrow_mut().future = None;
    }
}

impl<T: 'static> Future for Task<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<T>> {
        let this = self.get_mut();
        match Pin::new(&mut this.result).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_canceled)) => Poll::Ready(Err(Error::canceled())),
            Poll::Pending => Poll::Pending,
        }
    }
}

struct HarnessState<T> {
    future: Option<BoxFuture<T>>,
    completion: Option<oneshot::Sender<Result<T>>>,
}

/// The `Rc`-shared cell an executor holds one strong reference to per
/// spawned task, and each outstanding waker holds a second. This is the
/// substitute for the original's `CoroPromise`: it owns the boxed future,
/// the task's [`CoroContext`], and the channel used to report completion.
struct TaskHarness<T> {
    state: RefCell<HarnessState<T>>,
    ctx: Rc<CoroContext>,
}

impl<T: 'static> WakeTask for TaskHarness<T> {
    fn wake_task(self: Rc<Self>) {
        let executor = self.ctx.executor();
        executor.schedule(self as Rc<dyn Runnable>);
    }
}

impl<T: 'static> Runnable for TaskHarness<T> {
    fn run(self: Rc<Self>) {
        run_one_poll(&self);
    }
}

/// Runs one poll of `harness`'s future, propagating the harness's context
/// so nested awaiters can find the executor and stop token, and reporting
/// completion through the oneshot channel on the first `Ready`.
///
/// Called by an executor's `schedule` implementation whenever a harness
/// reaches the front of the ready queue.
pub fn run_one_poll<T: 'static>(harness: &Rc<TaskHarness<T>>) {
    let waker = waker_for(harness.clone() as Rc<dyn WakeTask>);
    let mut cx = Context::from_waker(&waker);

    let poll_result = crate::context::enter(harness.ctx.clone(), || {
        let mut state = harness.state.borrow_mut();
        match state.future.as_mut() {
            Some(future) => Some(future.as_mut().poll(&mut cx)),
            None => None,
        }
    });

    let Some(poll_result) = poll_result else { return };
    if let Poll::Ready(value) = poll_result {
        let mut state = harness.state.borrow_mut();
        state.future = None;
        if let Some(tx) = state.completion.take() {
            let _ = tx.send(value);
        }
    }
}

/// Spawns `future` onto `executor`, returning a [`Task`] that can be
/// awaited for its result.
///
/// The new task's context is a child of the currently-running task, if
/// there is one (`spec.md` §4.5: spawned tasks form a tree rooted at
/// whichever task called `spawn`), so cancelling a parent also cancels
/// children spawned under it.
pub fn spawn<T, F>(executor: Rc<dyn Executor>, future: F) -> Task<T>
where
    T: 'static,
    F: Future<Output = Result<T>> + 'static,
{
    let ctx = match crate::context::current() {
        Some(parent) => CoroContext::child_of(&parent),
        None => CoroContext::new(executor.clone()),
    };
    let (tx, rx) = oneshot::channel();
    let harness = Rc::new(TaskHarness {
        state: RefCell::new(HarnessState {
            future: Some(Box::pin(future)),
            completion: Some(tx),
        }),
        ctx,
    });
    harness.clone().wake_task();
    Task {
        harness,
        result: rx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::test_support::NoopExecutor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn task_harness_reports_completion_after_one_poll() {
        let executor = Rc::new(NoopExecutor);
        let ctx = CoroContext::new(executor.clone());
        let (tx, mut rx) = oneshot::channel::<Result<u32>>();
        let harness = Rc::new(TaskHarness {
            state: RefCell::new(HarnessState {
                future: Some(Box::pin(async { Ok(42u32) }) as BoxFuture<u32>),
                completion: Some(tx),
            }),
            ctx,
        });
        run_one_poll(&harness);
        assert!(harness.state.borrow().future.is_none());
        assert_eq!(rx.try_recv().unwrap().unwrap().unwrap(), 42);
    }

    #[test]
    fn dropping_unresolved_harness_drops_pending_future() {
        static DROPPED: AtomicUsize = AtomicUsize::new(0);
        struct MarkOnDrop;
        impl Drop for MarkOnDrop {
            fn drop(&mut self) {
                DROPPED.fetch_add(1, Ordering::SeqCst);
            }
        }
        let executor = Rc::new(NoopExecutor);
        let ctx = CoroContext::new(executor);
        let (tx, _rx) = oneshot::channel::<Result<()>>();
        let guard = MarkOnDrop;
        let harness = Rc::new(TaskHarness {
            state: RefCell::new(HarnessState {
                future: Some(Box::pin(async move {
                    let _guard = guard;
                    std::future::pending::<()>().await;
                    Ok(())
                }) as BoxFuture<()>),
                completion: Some(tx),
            }),
            ctx,
        });
        run_one_poll(&harness);
        assert_eq!(DROPPED.load(Ordering::SeqCst), 0);
        drop(harness);
        assert_eq!(DROPPED.load(Ordering::SeqCst), 1);
    }
}
