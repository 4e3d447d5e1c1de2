//! [`LocalExecutor`]: the default, single-threaded [`Executor`]
//! implementation that ties the ready queue, the timer service and a
//! platform reactor together into a runnable event loop.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::context::CoroContext;
use crate::error::Result;
use crate::executor::{Executor, PostHandle, Runnable, WakeTask};
use crate::reactor::{IoContext, PlatformReactor};
use crate::task::{self, Task};

struct State {
    ready: VecDeque<Rc<dyn Runnable>>,
}

/// A non-work-stealing, single-threaded executor: the "one reactor thread
/// drives one ready queue" model `spec.md` §5 specifies as a Non-goal-free
/// zone -- no cross-thread task migration ever happens here.
pub struct LocalExecutor {
    state: RefCell<State>,
    reactor: PlatformReactor,
}

impl LocalExecutor {
    /// Builds a fresh executor with its own platform reactor.
    pub fn new() -> Result<Rc<LocalExecutor>> {
        let reactor = PlatformReactor::new()?;
        log::debug!("executor started");
        Ok(Rc::new(LocalExecutor {
            state: RefCell::new(State {
                ready: VecDeque::new(),
            }),
            reactor,
        }))
    }

    /// The platform reactor backing this executor, for registering
    /// descriptors.
    pub fn reactor(&self) -> &PlatformReactor {
        &self.reactor
    }

    /// Spawns `future` as this executor's root task and runs the event
    /// loop until it completes, returning its result.
    ///
    /// This is the crate's entry point, the Rust analogue of the
    /// original's top-level `sync_wait`/`block_on`.
    pub fn block_on<T, F>(self: &Rc<Self>, future: F) -> Result<T>
    where
        T: 'static,
        F: Future<Output = Result<T>> + 'static,
    {
        let root: Task<T> = task::spawn(self.clone() as Rc<dyn Executor>, future);
        let done = Rc::new(std::cell::Cell::new(false));
        let result = Rc::new(RefCell::new(None));

        let d = done.clone();
        let r = result.clone();
        let waiter: Task<()> = task::spawn(self.clone() as Rc<dyn Executor>, {
            let mut root = root;
            async move {
                let value = (&mut root).await;
                *r.borrow_mut() = Some(value);
                d.set(true);
                Ok(())
            }
        });

        while !done.get() {
            self.turn_once()?;
        }
        drop(waiter);
        result
            .borrow_mut()
            .take()
            .expect("block_on loop only exits once the result cell is populated")
    }

    fn turn_once(&self) -> Result<()> {
        let mut polled = 0u32;
        loop {
            let next = self.state.borrow_mut().ready.pop_front();
            match next {
                Some(task) => {
                    task.run();
                    polled += 1;
                }
                None => break,
            }
        }
        log::trace!("turn_once polled {polled} ready task(s)");
        self.reactor.turn(Some(Duration::from_millis(50)))
    }
}

impl Executor for LocalExecutor {
    fn schedule(&self, task: Rc<dyn Runnable>) {
        self.state.borrow_mut().ready.push_back(task);
    }

    fn post(&self, callback: Box<dyn FnOnce() + Send>) {
        self.reactor.post(callback);
    }

    fn sleep_until(&self, deadline: Instant, task: Rc<dyn WakeTask>) -> u64 {
        self.reactor.insert_timer(deadline, task)
    }

    fn cancel_timer(&self, id: u64) {
        self.reactor.cancel_timer(id);
    }

    fn post_handle(&self) -> PostHandle {
        PostHandle::new(std::sync::Arc::new(self.reactor.post_handle()))
    }
}

/// Builds a fresh context rooted at `executor` with no parent, for
/// top-level code (e.g. tests) that needs a [`CoroContext`] without going
/// through [`crate::compose::spawn`].
pub fn root_context(executor: Rc<dyn Executor>) -> Rc<CoroContext> {
    CoroContext::new(executor)
}
