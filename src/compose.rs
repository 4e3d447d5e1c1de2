//! Structured-concurrency operators: [`spawn`], [`spawn_blocking`],
//! [`join_all`], [`select_any`], [`timeout`], and the supplemented
//! [`TaskGroup`].

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;
use std::time::{Duration, Instant};

use futures_channel::oneshot;

use crate::error::{Error, ErrorKind, Result};
use crate::executor::Executor;
use crate::task::{self, Task};

/// Spawns `future` onto the currently-running task's executor.
///
/// Must be called from within a task (i.e. while a [`crate::context::current`]
/// context exists); panics otherwise, matching `spec.md` §4.5's requirement
/// that composition operators only make sense inside the runtime.
pub fn spawn<T, F>(future: F) -> Task<T>
where
    T: 'static,
    F: Future<Output = Result<T>> + 'static,
{
    let ctx = crate::context::current().expect("spawn called outside of a running task");
    task::spawn(ctx.executor(), future)
}

/// Runs `f` on a dedicated OS thread and resolves once it returns,
/// without blocking the calling task's executor thread.
///
/// Cancellation does not stop `f` once it has started -- there is no
/// portable way to interrupt a running OS thread -- but the returned
/// `Task` still resolves to [`ErrorKind::Canceled`] promptly if its stop
/// token fires before `f` finishes, matching `spec.md` §4.5's note that
/// `spawn_blocking` cancellation is "best-effort: the closure runs to
/// completion regardless".
pub fn spawn_blocking<T, F>(f: F) -> Task<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let ctx = crate::context::current().expect("spawn_blocking called outside of a running task");
    let executor = ctx.executor();
    let (tx, rx) = oneshot::channel::<T>();
    std::thread::spawn(move || {
        let result = f();
        let _ = tx.send(result);
    });
    spawn_on(executor, async move {
        match rx.await {
            Ok(value) => Ok(value),
            Err(_) => Err(Error::new(ErrorKind::ChannelBroken)),
        }
    })
}

fn spawn_on<T, F>(executor: Rc<dyn Executor>, future: F) -> Task<T>
where
    T: 'static,
    F: Future<Output = Result<T>> + 'static,
{
    task::spawn(executor, future)
}

/// Awaits every task in `tasks`, returning their results in input order
/// once all have completed. Does not cancel siblings if one fails
/// (`spec.md` §4.5: `join_all` always waits for every task).
pub async fn join_all<T: 'static>(tasks: Vec<Task<T>>) -> Vec<Result<T>> {
    let mut results = Vec::with_capacity(tasks.len());
    for task in tasks {
        results.push(task.await);
    }
    results
}

/// Awaits whichever of `tasks` completes first, cancelling the rest.
///
/// Returns the index of the winning task along with its result
/// (`spec.md` §4.5). If `tasks` is empty, returns `None` immediately.
pub async fn select_any<T: 'static>(tasks: Vec<Task<T>>) -> Option<(usize, Result<T>)> {
    if tasks.is_empty() {
        return None;
    }
    use futures_util::future::FutureExt;
    let mut pending: Vec<_> = tasks
        .into_iter()
        .enumerate()
        .map(|(i, task)| Box::pin(task.map(move |r| (i, r))))
        .collect();
    let (winner, _index, rest) = futures_util::future::select_all(pending.drain(..)).await;
    for loser in rest {
        drop(loser);
    }
    Some(winner)
}

/// Races `future` against a `duration` deadline, returning
/// [`ErrorKind::TimedOut`] if the deadline elapses first.
pub async fn timeout<T, F>(duration: Duration, future: F) -> Result<T>
where
    T: 'static,
    F: Future<Output = Result<T>> + 'static,
{
    let ctx = crate::context::current().expect("timeout called outside of a running task");
    let executor = ctx.executor();
    let sleep = crate::reactor::sleep_on(executor, Instant::now() + duration);
    futures_util::pin_mut!(future);
    futures_util::pin_mut!(sleep);
    match futures_util::future::select(future, sleep).await {
        futures_util::future::Either::Left((result, _)) => result,
        futures_util::future::Either::Right((_, _)) => Err(Error::new(ErrorKind::TimedOut)),
    }
}

/// A growable set of spawned children, cancelled as a unit when the group
/// is dropped or explicitly cancelled.
///
/// Grounded on the original runtime's scope type: unlike `join_all`, a
/// `TaskGroup` does not require the full set of children to be known up
/// front -- callers may keep spawning into it for as long as it lives.
pub struct TaskGroup<T> {
    children: RefCell<Vec<Task<T>>>,
}

impl<T: 'static> TaskGroup<T> {
    /// Creates an empty group.
    pub fn new() -> TaskGroup<T> {
        TaskGroup {
            children: RefCell::new(Vec::new()),
        }
    }

    /// Spawns `future` and tracks it in this group.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = Result<T>> + 'static,
    {
        self.children.borrow_mut().push(spawn(future));
    }

    /// Requests cancellation of every task currently tracked by this group.
    pub fn cancel_all(&self) {
        for child in self.children.borrow().iter() {
            child.stop();
        }
    }

    /// Awaits every tracked task, draining the group and returning results
    /// in spawn order.
    pub async fn join_all(&self) -> Vec<Result<T>> {
        let tasks = self.children.borrow_mut().split_off(0);
        join_all(tasks).await
    }
}

impl<T> Default for TaskGroup<T> {
    fn default() -> TaskGroup<T> {
        TaskGroup {
            children: RefCell::new(Vec::new()),
        }
    }
}

impl<T: 'static> Drop for TaskGroup<T> {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
