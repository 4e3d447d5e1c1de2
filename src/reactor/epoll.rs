//! Linux epoll backend.
//!
//! Grounded on the teacher's `src/sys/unix/selector/epoll.rs`: a raw
//! `epoll_create1`/`epoll_ctl`/`epoll_wait` wrapper, registering interest
//! with `EPOLLONESHOT` so a descriptor never delivers a second readiness
//! notification before the task that asked for the first one has re-armed
//! it. Cross-thread wakeup uses an `eventfd` exactly as the teacher's
//! `sys::Waker` does, rather than mio's own `waker.rs` (kept at the crate
//! root as the public, reactor-facing wakeup primitive built on this same
//! eventfd).

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::os::unix::io::RawFd;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::executor::{PostHandle, RemotePost, WakeTask};
use crate::timer::TimerService;

use super::{DescriptorKind, IoContext, IoDescriptor, PollMask};

const TOKEN_EVENTFD: u64 = u64::MAX;

struct Waiter {
    readable: Option<Rc<dyn WakeTask>>,
    writable: Option<Rc<dyn WakeTask>>,
}

struct Inner {
    epoll_fd: RawFd,
    waiters: HashMap<RawFd, Waiter>,
    timers: TimerService,
}

/// The queue and eventfd a foreign thread actually touches when it calls
/// [`EpollReactor::post`] or a cloned [`EpollPostHandle`].
///
/// Split out from `Inner` because `Inner` lives behind a `RefCell` and is
/// only ever touched by the executor's own thread; this half is the only
/// part of the reactor that is genuinely `Send + Sync`, so it is the only
/// part allowed to cross a thread boundary.
struct PostQueue {
    eventfd: RawFd,
    queue: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
}

/// A cloneable, `Send + Sync` handle that can post a callback to an
/// [`EpollReactor`]'s event loop from any thread.
#[derive(Clone)]
pub struct EpollPostHandle {
    queue: Arc<PostQueue>,
}

impl RemotePost for EpollPostHandle {
    fn post(&self, callback: Box<dyn FnOnce() + Send>) {
        self.queue.queue.lock().unwrap().push(callback);
        notify_eventfd(self.queue.eventfd);
    }
}

/// The Linux reactor: one `epoll` instance per executor thread.
pub struct EpollReactor {
    inner: RefCell<Inner>,
    posted: Arc<PostQueue>,
}

impl EpollReactor {
    /// Creates a fresh epoll instance with its cross-thread wake eventfd
    /// already registered.
    pub fn new() -> Result<EpollReactor> {
        let epoll_fd = cvt(unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) })?;
        let eventfd = cvt(unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) })?;

        let mut event = libc::epoll_event {
            events: libc::EPOLLIN as u32,
            u64: TOKEN_EVENTFD,
        };
        cvt(unsafe {
            libc::epoll_ctl(epoll_fd, libc::EPOLL_CTL_ADD, eventfd, &mut event)
        })?;

        Ok(EpollReactor {
            inner: RefCell::new(Inner {
                epoll_fd,
                waiters: HashMap::new(),
                timers: TimerService::new(),
            }),
            posted: Arc::new(PostQueue {
                eventfd,
                queue: Mutex::new(Vec::new()),
            }),
        })
    }

    /// A cloneable handle other threads can use to post callbacks here,
    /// without needing the `!Send` reactor itself.
    pub fn post_handle(&self) -> EpollPostHandle {
        EpollPostHandle {
            queue: self.posted.clone(),
        }
    }

    /// Arms `task` to be woken the next time `fd` is readable or writable
    /// (per `interest`), re-registering with `EPOLLONESHOT`.
    pub fn arm(&self, fd: RawFd, interest: PollMask, task: Rc<dyn WakeTask>) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let waiter = inner.waiters.entry(fd).or_insert(Waiter {
            readable: None,
            writable: None,
        });
        if interest.is_readable() {
            waiter.readable = Some(task.clone());
        }
        if interest.is_writable() {
            waiter.writable = Some(task);
        }

        let mut events = libc::EPOLLONESHOT as u32;
        if waiter.readable.is_some() {
            events |= libc::EPOLLIN as u32;
        }
        if waiter.writable.is_some() {
            events |= libc::EPOLLOUT as u32;
        }
        let already_registered = inner.waiters.contains_key(&fd);
        let epoll_fd = inner.epoll_fd;
        let mut event = libc::epoll_event { events, u64: fd as u64 };
        let op = if already_registered {
            libc::EPOLL_CTL_MOD
        } else {
            libc::EPOLL_CTL_ADD
        };
        log::trace!("arming fd {fd} with {interest:?}");
        cvt(unsafe { libc::epoll_ctl(epoll_fd, op, fd, &mut event) })?;
        Ok(())
    }

    /// Registers `task` to be woken at `deadline`. `turn` consults the
    /// same timer service for both the wait timeout and expiry dispatch.
    pub fn insert_timer(&self, deadline: std::time::Instant, task: Rc<dyn WakeTask>) -> u64 {
        self.inner.borrow_mut().timers.insert(deadline, task)
    }

    /// Cancels a pending timer registered with [`EpollReactor::insert_timer`].
    pub fn cancel_timer(&self, id: u64) {
        self.inner.borrow_mut().timers.cancel(id);
    }
}

impl IoContext for EpollReactor {
    fn register(&self, descriptor: &IoDescriptor, _interest: PollMask) -> Result<()> {
        if descriptor.kind != DescriptorKind::Socket {
            return Err(Error::new(crate::error::ErrorKind::OperationNotSupported));
        }
        Ok(())
    }

    fn deregister(&self, descriptor: &IoDescriptor) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.waiters.remove(&descriptor.raw_fd);
        cvt(unsafe {
            libc::epoll_ctl(
                inner.epoll_fd,
                libc::EPOLL_CTL_DEL,
                descriptor.raw_fd,
                std::ptr::null_mut(),
            )
        })?;
        Ok(())
    }

    fn turn(&self, timeout: Option<Duration>) -> Result<()> {
        let wait_ms = {
            let mut inner = self.inner.borrow_mut();
            let timer_deadline = inner.timers.next_deadline();
            compute_timeout_ms(timeout, timer_deadline)
        };

        let mut events: Vec<libc::epoll_event> = vec![unsafe { std::mem::zeroed() }; 1024];
        let epoll_fd = self.inner.borrow().epoll_fd;
        let n = cvt(unsafe {
            libc::epoll_wait(epoll_fd, events.as_mut_ptr(), events.len() as i32, wait_ms)
        })?;

        let mut to_wake: Vec<Rc<dyn WakeTask>> = Vec::new();
        {
            let mut inner = self.inner.borrow_mut();
            for event in &events[..n as usize] {
                if event.u64 == TOKEN_EVENTFD {
                    drain_eventfd(self.posted.eventfd);
                    let drained: Vec<_> = self.posted.queue.lock().unwrap().drain(..).collect();
                    to_wake.extend(drained.into_iter().map(run_boxed_as_waker));
                    continue;
                }
                let fd = event.u64 as RawFd;
                if let Some(waiter) = inner.waiters.get_mut(&fd) {
                    if event.events & (libc::EPOLLIN as u32) != 0 {
                        if let Some(task) = waiter.readable.take() {
                            to_wake.push(task);
                        }
                    }
                    if event.events & (libc::EPOLLOUT as u32) != 0 {
                        if let Some(task) = waiter.writable.take() {
                            to_wake.push(task);
                        }
                    }
                }
            }
            to_wake.extend(call_timer_callbacks(&mut inner.timers));
        }
        for task in to_wake {
            task.wake_task();
        }
        Ok(())
    }

    fn post(&self, callback: Box<dyn FnOnce() + Send>) {
        self.posted.queue.lock().unwrap().push(callback);
        notify_eventfd(self.posted.eventfd);
    }
}

fn notify_eventfd(fd: RawFd) {
    let buf: u64 = 1;
    unsafe {
        libc::write(
            fd,
            &buf as *const u64 as *const libc::c_void,
            std::mem::size_of::<u64>(),
        );
    }
}

fn run_boxed_as_waker(callback: Box<dyn FnOnce() + Send>) -> Rc<dyn WakeTask> {
    struct RunOnce(RefCell<Option<Box<dyn FnOnce() + Send>>>);
    impl WakeTask for RunOnce {
        fn wake_task(self: Rc<Self>) {
            if let Some(f) = self.0.borrow_mut().take() {
                f();
            }
        }
    }
    Rc::new(RunOnce(RefCell::new(Some(callback))))
}

fn call_timer_callbacks(timers: &mut TimerService) -> Vec<Rc<dyn WakeTask>> {
    // fire_expired already invokes wake_task internally; nothing further
    // to dispatch here. Kept as an empty extension point so `turn` reads
    // uniformly with the eventfd/readiness paths above.
    timers.fire_expired(std::time::Instant::now());
    Vec::new()
}

fn compute_timeout_ms(
    requested: Option<Duration>,
    timer_deadline: Option<std::time::Instant>,
) -> i32 {
    let from_timer = timer_deadline.map(|deadline| {
        deadline.saturating_duration_since(std::time::Instant::now())
    });
    let effective = match (requested, from_timer) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    };
    match effective {
        None => -1,
        Some(d) => d.as_millis().min(i32::MAX as u128) as i32,
    }
}

fn drain_eventfd(fd: RawFd) {
    let mut buf = [0u8; 8];
    loop {
        let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, 8) };
        if n <= 0 {
            break;
        }
    }
}

fn cvt(ret: libc::c_int) -> Result<libc::c_int> {
    if ret == -1 {
        Err(Error::from_io(io::Error::last_os_error()))
    } else {
        Ok(ret)
    }
}

impl Drop for EpollReactor {
    fn drop(&mut self) {
        let inner = self.inner.borrow();
        unsafe {
            libc::close(inner.epoll_fd);
            libc::close(self.posted.eventfd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_reactor_registers_its_own_eventfd() {
        let reactor = EpollReactor::new().expect("epoll_create1 should succeed in CI sandboxes");
        reactor.post(Box::new(|| {}));
        reactor
            .turn(Some(Duration::from_millis(50)))
            .expect("turn should observe the posted eventfd write");
    }
}
