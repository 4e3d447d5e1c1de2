//! [`Waker`]: a cheap, cloneable, cross-thread handle that wakes a
//! specific task, for code that obtained a task's [`StopToken`] or needs
//! to prod it from outside the runtime (a signal handler thread, a
//! completion callback from an unrelated library).
//!
//! Grounded on the teacher's own `src/waker.rs`, which wakes a blocked
//! `Poll` from another thread over an eventfd/kqueue `EVFILT_USER`
//! registration. This crate's reactor backends expose that same
//! eventfd/IOCP primitive as [`crate::executor::PostHandle`]; `Waker` is a
//! thin wrapper around one that also re-arms a specific `std::task::Waker`,
//! rather than a general callback.
//!
//! `Waker` holds a [`PostHandle`], not an `Rc<dyn Executor>`: the executor
//! is `Rc`-shared and genuinely cannot be sent across threads, even behind
//! a reference, without racing its non-atomic reference count against the
//! owning thread. `PostHandle` is built from an `Arc`-shared queue and a
//! raw OS handle instead, so it is `Send + Sync` without any unsafe
//! assertion.

use std::task::Waker as StdWaker;

use crate::executor::PostHandle;

/// Wakes a specific `std::task::Waker` from any thread, by posting the
/// wake-up through the owning executor's reactor rather than touching the
/// `!Send` task harness directly.
#[derive(Clone)]
pub struct Waker {
    post: PostHandle,
    inner: StdWaker,
}

impl Waker {
    /// Wraps `waker`, to be woken via `post`.
    pub fn new(post: PostHandle, waker: StdWaker) -> Waker {
        Waker { post, inner: waker }
    }

    /// Wakes the wrapped `std::task::Waker`, from any thread.
    ///
    /// The actual `Waker::wake` call always happens on the owning
    /// executor's own thread, posted there via the underlying
    /// [`PostHandle`].
    pub fn wake(&self) {
        let inner = self.inner.clone();
        self.post.post(Box::new(move || inner.wake()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::test_support::NoopExecutor;
    use crate::executor::Executor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::task::Wake;

    struct Flag(Arc<AtomicBool>);
    impl Wake for Flag {
        fn wake(self: Arc<Self>) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn wake_runs_the_wrapped_waker() {
        let flag = Arc::new(AtomicBool::new(false));
        let std_waker = StdWaker::from(Arc::new(Flag(flag.clone())));
        let waker = Waker::new(NoopExecutor.post_handle(), std_waker);
        waker.wake();
        assert!(flag.load(Ordering::SeqCst));
    }
}
