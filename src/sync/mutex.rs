//! A FIFO-fair, cancellation-safe awaitable [`Mutex`].
//!
//! Unlike `std::sync::Mutex`, waiters here are tasks, not OS threads, so
//! blocking is implemented by parking a waker in a queue rather than by a
//! futex. Waiters are served strictly in arrival order, and a waiter
//! cancelled (dropped) before its turn is spliced out of the queue without
//! disturbing the others -- the same property `spec.md` §5 requires of
//! `StopCallback` deregistration.

use std::cell::{Cell, RefCell, UnsafeCell};
use std::collections::VecDeque;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

/// A mutual-exclusion cell for use inside this runtime's tasks.
pub struct Mutex<T> {
    locked: Cell<bool>,
    waiters: RefCell<VecDeque<(u64, Waker)>>,
    next_id: Cell<u64>,
    value: UnsafeCell<T>,
}

impl<T> Mutex<T> {
    /// Wraps `value` in a new, unlocked mutex.
    pub fn new(value: T) -> Mutex<T> {
        Mutex {
            locked: Cell::new(false),
            waiters: RefCell::new(VecDeque::new()),
            next_id: Cell::new(0),
            value: UnsafeCell::new(value),
        }
    }

    /// Acquires the lock, waiting in FIFO order behind any earlier waiter.
    pub fn lock(&self) -> Lock<'_, T> {
        Lock {
            mutex: self,
            id: None,
        }
    }

    /// Acquires the lock immediately if uncontended, without waiting.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        if self.waiters.borrow().is_empty() && !self.locked.get() {
            self.locked.set(true);
            Some(MutexGuard { mutex: self })
        } else {
            None
        }
    }

    fn release(&self) {
        // Ownership passes straight to the next waiter: leave its entry at
        // the front of the queue (its own `Lock::poll` pops it once woken,
        // the only place that's allowed to) and leave `locked` set, just
        // wake it to notice it now owns the lock.
        let front_waker = self.waiters.borrow().front().map(|(_, waker)| waker.clone());
        match front_waker {
            Some(waker) => waker.wake(),
            None => self.locked.set(false),
        }
    }
}

/// A future that resolves to a [`MutexGuard`] once the lock is acquired.
pub struct Lock<'a, T> {
    mutex: &'a Mutex<T>,
    id: Option<u64>,
}

impl<'a, T> Future for Lock<'a, T> {
    type Output = MutexGuard<'a, T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<MutexGuard<'a, T>> {
        let this = self.get_mut();
        let mut waiters = this.mutex.waiters.borrow_mut();

        if let Some(id) = this.id {
            let is_front = waiters.front().map(|(front_id, _)| *front_id) == Some(id);
            if is_front {
                waiters.pop_front();
                this.id = None;
                return Poll::Ready(MutexGuard { mutex: this.mutex });
            }
            if let Some(slot) = waiters.iter_mut().find(|(wid, _)| *wid == id) {
                slot.1 = cx.waker().clone();
            }
            return Poll::Pending;
        }

        if !this.mutex.locked.get() && waiters.is_empty() {
            this.mutex.locked.set(true);
            return Poll::Ready(MutexGuard { mutex: this.mutex });
        }

        let id = this.mutex.next_id.get();
        this.mutex.next_id.set(id + 1);
        waiters.push_back((id, cx.waker().clone()));
        this.id = Some(id);
        this.mutex.locked.set(true);
        Poll::Pending
    }
}

impl<'a, T> Drop for Lock<'a, T> {
    fn drop(&mut self) {
        if let Some(id) = self.id {
            let mut waiters = self.mutex.waiters.borrow_mut();
            waiters.retain(|(wid, _)| *wid != id);
        }
    }
}

/// An RAII guard granting exclusive access to a [`Mutex`]'s contents.
/// Releasing the lock (on drop) hands it straight to the next FIFO waiter
/// if one is queued.
pub struct MutexGuard<'a, T> {
    mutex: &'a Mutex<T>,
}

impl<'a, T> Deref for MutexGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.mutex.value.get() }
    }
}

impl<'a, T> DerefMut for MutexGuard<'a, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.mutex.value.get() }
    }
}

impl<'a, T> Drop for MutexGuard<'a, T> {
    fn drop(&mut self) {
        self.mutex.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::task::Wake;

    struct NoopWaker;
    impl Wake for NoopWaker {
        fn wake(self: std::sync::Arc<Self>) {}
    }

    fn noop_context() -> Waker {
        Waker::from(std::sync::Arc::new(NoopWaker))
    }

    #[test]
    fn try_lock_succeeds_when_uncontended() {
        let mutex = Mutex::new(5);
        let guard = mutex.try_lock().unwrap();
        assert_eq!(*guard, 5);
    }

    #[test]
    fn try_lock_fails_while_held() {
        let mutex = Mutex::new(5);
        let _guard = mutex.try_lock().unwrap();
        assert!(mutex.try_lock().is_none());
    }

    #[test]
    fn first_poll_of_uncontended_lock_succeeds_immediately() {
        let mutex = Mutex::new(0);
        let mut lock = mutex.lock();
        let waker = noop_context();
        let mut cx = Context::from_waker(&waker);
        match Pin::new(&mut lock).poll(&mut cx) {
            Poll::Ready(mut guard) => *guard = 1,
            Poll::Pending => panic!("uncontended lock must resolve on first poll"),
        }
        assert_eq!(*mutex.try_lock().unwrap(), 1);
    }

    struct RecordWake(std::sync::atomic::AtomicUsize);
    impl Wake for RecordWake {
        fn wake(self: std::sync::Arc<Self>) {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    #[test]
    fn second_waiter_is_woken_and_can_complete_after_release() {
        let mutex = Mutex::new(0);
        let first_waker = noop_context();
        let mut first_cx = Context::from_waker(&first_waker);

        let mut first = mutex.lock();
        let guard = match Pin::new(&mut first).poll(&mut first_cx) {
            Poll::Ready(guard) => guard,
            Poll::Pending => panic!("uncontended lock must resolve on first poll"),
        };

        let record = std::sync::Arc::new(RecordWake(std::sync::atomic::AtomicUsize::new(0)));
        let second_waker = Waker::from(record.clone());
        let mut second_cx = Context::from_waker(&second_waker);

        let mut second = mutex.lock();
        assert!(matches!(
            Pin::new(&mut second).poll(&mut second_cx),
            Poll::Pending
        ));

        drop(guard); // releases the lock, handing it straight to `second`
        assert_eq!(record.0.load(std::sync::atomic::Ordering::SeqCst), 1);

        match Pin::new(&mut second).poll(&mut second_cx) {
            Poll::Ready(mut guard) => *guard = 7,
            Poll::Pending => panic!("woken waiter must be able to complete its own poll"),
        }
        assert_eq!(*mutex.try_lock().unwrap(), 7);
    }
}
