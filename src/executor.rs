//! The [`Executor`] trait and the `std::task::Waker` construction every
//! backend in this crate shares.
//!
//! This runtime is explicitly single-threaded and non-work-stealing (no
//! task ever migrates between threads once spawned), so task harnesses are
//! shared with [`Rc`], not `Arc`. `futures_util::task::ArcWake` requires
//! `Arc<Self>: Send + Sync` and so cannot back an `Rc`-based harness; this
//! module instead builds a [`Waker`] directly from a hand-rolled
//! `RawWaker`/`RawWakerVTable` over `Rc<dyn WakeTask>`, the pattern the
//! `std::task` docs describe for executors that don't fit `ArcWake`'s
//! bound. Only [`Executor::post`] and
//! [`crate::stop::StopSource::request_stop`] are ever called from a thread
//! other than the one driving the executor; `schedule` is not.

use std::rc::Rc;
use std::sync::Arc;
use std::task::{RawWaker, RawWakerVTable, Waker};
use std::time::{Duration, Instant};

/// Something that can be told it is now ready -- a task harness wanting
/// another poll, or a lighter adapter (see [`crate::reactor::sleep_on`])
/// that forwards to a `std::task::Waker` it was given by whichever task is
/// actually waiting. Implemented by the task harness in `task.rs` and by
/// small per-operation adapters in the reactor and timer modules.
pub trait WakeTask {
    /// Marks this as ready. Called from [`Waker::wake`] or directly by a
    /// reactor backend / timer service.
    fn wake_task(self: Rc<Self>);
}

/// Something the executor's ready queue can dispatch by polling.
/// Implemented only by the task harness -- `WakeTask::wake_task` schedules
/// one of these onto the executor rather than polling inline, so that
/// waking from inside a poll (a task waking itself) doesn't recurse.
pub trait Runnable {
    /// Drives one poll of the underlying future.
    fn run(self: Rc<Self>);
}

/// The scheduling surface every task, timer and reactor operation in this
/// crate is built on (`spec.md` §4.2).
///
/// An `Executor` is not `Send`: handles to it are `Rc`-shared and only ever
/// touched from the thread running its event loop, except through
/// [`Executor::post`], which is the one operation this trait requires to
/// work from any thread.
pub trait Executor {
    /// Enqueues `task` to be polled again. Only ever called from the
    /// thread that owns this executor.
    fn schedule(&self, task: Rc<dyn Runnable>);

    /// Runs `callback` on the executor's own thread, waking the event loop
    /// if it is currently blocked waiting for I/O or a timer. This is the
    /// only `Executor` operation safe to call from a foreign thread.
    fn post(&self, callback: Box<dyn FnOnce() + Send>);

    /// Registers a one-shot wakeup `duration` from now, returning an id
    /// that can be used to cancel it. When the duration elapses, `task` is
    /// rescheduled.
    fn sleep_until(&self, deadline: Instant, task: Rc<dyn WakeTask>) -> u64;

    /// Cancels a pending timer registered with [`Executor::sleep_until`].
    /// A no-op if the timer already fired or was already cancelled.
    fn cancel_timer(&self, id: u64);

    /// A cloneable, `Send + Sync` handle equivalent to [`Executor::post`],
    /// for code (like [`crate::waker::Waker`]) that needs to carry a
    /// posting capability across a thread boundary.
    ///
    /// The executor itself is `Rc`-shared and cannot cross threads even by
    /// reference; `PostHandle` exists precisely because `Rc<dyn Executor>`
    /// cannot be sent or shared safely, while the narrow slice of state
    /// backing `post` (a queue plus a wakeup primitive) can be built from
    /// genuinely thread-safe pieces.
    fn post_handle(&self) -> PostHandle;
}

/// Implemented by a reactor backend's own posting primitive -- state that
/// is actually `Send + Sync` (an `Arc<Mutex<..>>` queue plus a raw OS
/// handle), unlike the executor or reactor themselves.
pub trait RemotePost: Send + Sync {
    fn post(&self, callback: Box<dyn FnOnce() + Send>);
}

/// A cloneable handle that can run a callback on its owning executor's
/// thread from anywhere, including a foreign thread.
///
/// This is the only thing in this crate that is safe to share across
/// threads by value; everything else (the executor, its tasks, its
/// reactor) is thread-affined by design (`spec.md` §5).
#[derive(Clone)]
pub struct PostHandle(Arc<dyn RemotePost>);

impl PostHandle {
    pub fn new(inner: Arc<dyn RemotePost>) -> PostHandle {
        PostHandle(inner)
    }

    pub fn post(&self, callback: Box<dyn FnOnce() + Send>) {
        self.0.post(callback);
    }
}

/// Builds a [`Waker`] that reschedules `task` on wake.
///
/// This is the crate's substitute for `futures_util::task::ArcWake::into_waker`,
/// adapted to `Rc` instead of `Arc`. `RawWaker`'s data pointer is a single
/// thin pointer, but `Rc<dyn WakeTask>` is a fat pointer (vtable + data), so
/// the `Rc` is boxed once to get a thin envelope the raw waker can carry.
/// The resulting waker is not `Send`/`Sync` and will panic if `Waker::wake`
/// is ever called from a thread other than the one that created it, which
/// matches this executor's single-threaded contract.
pub fn waker_for(task: Rc<dyn WakeTask>) -> Waker {
    let envelope: Box<Rc<dyn WakeTask>> = Box::new(task);
    let raw = Box::into_raw(envelope) as *const ();
    unsafe { Waker::from_raw(RawWaker::new(raw, &VTABLE)) }
}

static VTABLE: RawWakerVTable = RawWakerVTable::new(clone_raw, wake_raw, wake_by_ref_raw, drop_raw);

unsafe fn clone_raw(data: *const ()) -> RawWaker {
    let envelope = data as *const Rc<dyn WakeTask>;
    let cloned: Box<Rc<dyn WakeTask>> = Box::new((*envelope).clone());
    RawWaker::new(Box::into_raw(cloned) as *const (), &VTABLE)
}

unsafe fn wake_raw(data: *const ()) {
    let envelope = Box::from_raw(data as *mut Rc<dyn WakeTask>);
    (*envelope).clone().wake_task();
}

unsafe fn wake_by_ref_raw(data: *const ()) {
    let envelope = data as *const Rc<dyn WakeTask>;
    (*envelope).clone().wake_task();
}

unsafe fn drop_raw(data: *const ()) {
    drop(Box::from_raw(data as *mut Rc<dyn WakeTask>));
}

/// Smallest increment the timer wheel guarantees between two distinct fire
/// times; finer-grained requests are coalesced to the next tick.
pub const TIMER_RESOLUTION: Duration = Duration::from_millis(1);

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// An `Executor` that drops everything given to it; used by unit tests
    /// in other modules that only need *an* executor handle to exist, not
    /// one that actually runs anything.
    pub struct NoopExecutor;

    impl Executor for NoopExecutor {
        fn schedule(&self, _task: Rc<dyn Runnable>) {}
        fn post(&self, callback: Box<dyn FnOnce() + Send>) {
            callback();
        }
        fn sleep_until(&self, _deadline: Instant, _task: Rc<dyn WakeTask>) -> u64 {
            0
        }
        fn cancel_timer(&self, _id: u64) {}
        fn post_handle(&self) -> PostHandle {
            struct NoopPost;
            impl RemotePost for NoopPost {
                fn post(&self, callback: Box<dyn FnOnce() + Send>) {
                    callback();
                }
            }
            PostHandle::new(Arc::new(NoopPost))
        }
    }
}
