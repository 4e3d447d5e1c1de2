//! [`TimerService`]: a min-heap of pending deadlines shared by every
//! `sleep`/`timeout` call the executor serves.
//!
//! Registrations are identified by an opaque, monotonically increasing id
//! (the same "slab of timeout entries, looked up by token" idiom as the
//! teacher's wheel-based `Timer<T>`), but this service orders by exact
//! deadline with a binary heap rather than bucketing into a tick wheel --
//! this crate drives at most a handful of timers per executor rather than
//! the tens of thousands a wheel is built to amortize, so a heap's
//! `O(log n)` insert/cancel is the simpler correct choice (`spec.md` §4.2).
//! Cancelled entries are deleted lazily: [`TimerService::cancel`] only
//! flags the id as dead; [`TimerService::fire_expired`] skips dead entries
//! it pops instead of rebuilding the heap.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::rc::Rc;
use std::time::Instant;

use crate::executor::WakeTask;

struct Entry {
    deadline: Instant,
    id: u64,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Entry) -> bool {
        self.deadline == other.deadline && self.id == other.id
    }
}
impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Entry) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Entry) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the earliest deadline sorts
        // highest, making `peek`/`pop` return the soonest-due timer.
        other.deadline.cmp(&self.deadline).then(other.id.cmp(&self.id))
    }
}

/// Tracks pending timers for one executor.
///
/// Not thread-safe: like the rest of the executor, this is only ever
/// touched from the executor's own thread.
#[derive(Default)]
pub struct TimerService {
    heap: BinaryHeap<Entry>,
    live: HashMap<u64, Rc<dyn WakeTask>>,
    next_id: u64,
}

impl TimerService {
    /// Builds an empty timer service.
    pub fn new() -> TimerService {
        TimerService {
            heap: BinaryHeap::new(),
            live: HashMap::new(),
            next_id: 0,
        }
    }

    /// Registers `task` to be woken at `deadline`, returning an id usable
    /// with [`TimerService::cancel`].
    pub fn insert(&mut self, deadline: Instant, task: Rc<dyn WakeTask>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.live.insert(id, task);
        self.heap.push(Entry { deadline, id });
        id
    }

    /// Cancels a pending timer. A no-op if it already fired or was already
    /// cancelled.
    pub fn cancel(&mut self, id: u64) {
        self.live.remove(&id);
    }

    /// The deadline of the soonest still-live timer, if any. Used by the
    /// reactor to size its blocking-poll timeout.
    pub fn next_deadline(&mut self) -> Option<Instant> {
        self.prune_dead();
        self.heap.peek().map(|entry| entry.deadline)
    }

    /// Wakes every timer whose deadline is `<= now`, removing them from
    /// the service. Returns how many tasks were woken, for diagnostics.
    pub fn fire_expired(&mut self, now: Instant) -> usize {
        let mut woken = 0;
        while let Some(entry) = self.heap.peek() {
            if entry.deadline > now {
                break;
            }
            let entry = self.heap.pop().expect("peeked entry must pop");
            if let Some(task) = self.live.remove(&entry.id) {
                task.wake_task();
                woken += 1;
            }
        }
        woken
    }

    fn prune_dead(&mut self) {
        while let Some(entry) = self.heap.peek() {
            if self.live.contains_key(&entry.id) {
                break;
            }
            self.heap.pop();
        }
    }
}
