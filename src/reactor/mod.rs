//! [`IoContext`]: the uniform reactor surface both platform backends
//! implement, plus the descriptor and interest types shared across them.

use std::fmt;
use std::num::NonZeroU8;
use std::rc::Rc;
use std::time::Instant;

use crate::error::Result;
use crate::executor::Executor;

#[cfg(unix)]
pub mod epoll;
#[cfg(windows)]
pub mod iocp;

#[cfg(unix)]
pub use epoll::EpollReactor as PlatformReactor;
#[cfg(windows)]
pub use iocp::IocpReactor as PlatformReactor;

/// Readiness interests a descriptor can be polled for.
///
/// Modeled after the teacher's `Interests` bitset (`src/interests.rs`):
/// a `NonZero` backing integer so `Option<PollMask>` is free, combined
/// with `|`.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct PollMask(NonZeroU8);

const READABLE: u8 = 0b001;
const WRITABLE: u8 = 0b010;
const ERROR: u8 = 0b100;

impl PollMask {
    /// Readiness to read without blocking.
    pub const READABLE: PollMask = PollMask(unsafe { NonZeroU8::new_unchecked(READABLE) });
    /// Readiness to write without blocking.
    pub const WRITABLE: PollMask = PollMask(unsafe { NonZeroU8::new_unchecked(WRITABLE) });
    /// An error or hang-up condition, always implicitly monitored.
    pub const ERROR: PollMask = PollMask(unsafe { NonZeroU8::new_unchecked(ERROR) });

    /// Combines two masks.
    pub const fn add(self, other: PollMask) -> PollMask {
        PollMask(unsafe { NonZeroU8::new_unchecked(self.0.get() | other.0.get()) })
    }

    /// `true` if readable readiness is set.
    pub const fn is_readable(self) -> bool {
        self.0.get() & READABLE != 0
    }

    /// `true` if writable readiness is set.
    pub const fn is_writable(self) -> bool {
        self.0.get() & WRITABLE != 0
    }

    /// `true` if the error/hang-up bit is set.
    pub const fn is_error(self) -> bool {
        self.0.get() & ERROR != 0
    }
}

impl std::ops::BitOr for PollMask {
    type Output = PollMask;
    fn bitor(self, rhs: PollMask) -> PollMask {
        self.add(rhs)
    }
}

impl fmt::Debug for PollMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.is_readable() {
            parts.push("READABLE");
        }
        if self.is_writable() {
            parts.push("WRITABLE");
        }
        if self.is_error() {
            parts.push("ERROR");
        }
        write!(f, "{}", parts.join(" | "))
    }
}

/// What kind of OS handle an [`IoDescriptor`] wraps, used to select the
/// readiness-vs-completion strategy for platforms (IOCP) where that
/// differs by handle type.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DescriptorKind {
    /// A `SOCKET`/socket file descriptor.
    Socket,
    /// A regular file, routed through POSIX-AIO or `os-ext`'s
    /// `ReadFile`/`WriteFile` overlapped path rather than readiness poll.
    File,
    /// A named pipe (Windows `os-ext` only).
    NamedPipe,
}

/// A registered OS handle together with the reactor-internal bookkeeping
/// needed to resume whichever task is waiting on it (`spec.md` §4.6).
pub struct IoDescriptor {
    pub(crate) kind: DescriptorKind,
    #[cfg(unix)]
    pub(crate) raw_fd: std::os::unix::io::RawFd,
    #[cfg(windows)]
    pub(crate) raw_handle: std::os::windows::io::RawHandle,
}

impl IoDescriptor {
    /// The kind of handle this descriptor wraps.
    pub fn kind(&self) -> DescriptorKind {
        self.kind
    }
}

/// The reactor contract both backends implement (`spec.md` §4.6): a place
/// to register descriptors, arm async operations against them, and run
/// the blocking wait loop that drives completions back into the executor.
pub trait IoContext {
    /// Registers `descriptor` with this reactor, returning nothing on
    /// success -- descriptors are addressed by reference from then on.
    fn register(&self, descriptor: &IoDescriptor, interest: PollMask) -> Result<()>;

    /// Deregisters a previously-registered descriptor.
    fn deregister(&self, descriptor: &IoDescriptor) -> Result<()>;

    /// Blocks until at least one registered descriptor is ready, a timer
    /// fires, or `post`-ed work is pending, up to `timeout` (`None` waits
    /// indefinitely). Dispatches every ready completion to its waiting
    /// task before returning.
    fn turn(&self, timeout: Option<std::time::Duration>) -> Result<()>;

    /// A handle that can wake a thread blocked in [`IoContext::turn`] from
    /// any other thread.
    fn post(&self, callback: Box<dyn FnOnce() + Send>);
}

/// Builds a future that resolves once `deadline` has passed, scheduled
/// through `executor`'s [`crate::timer::TimerService`].
///
/// This is the primitive `compose::timeout` and the public `sleep` free
/// function are both built on.
pub fn sleep_on(executor: Rc<dyn Executor>, deadline: Instant) -> impl std::future::Future<Output = ()> {
    Sleep {
        executor,
        deadline,
        timer_id: None,
    }
}

struct Sleep {
    executor: Rc<dyn Executor>,
    deadline: Instant,
    timer_id: Option<u64>,
}

impl std::future::Future for Sleep {
    type Output = ();

    fn poll(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<()> {
        let this = self.get_mut();
        if Instant::now() >= this.deadline {
            return std::task::Poll::Ready(());
        }
        if this.timer_id.is_none() {
            let waker = cx.waker().clone();
            let task = Rc::new(WakeViaStdWaker(waker));
            this.timer_id = Some(this.executor.sleep_until(this.deadline, task));
        }
        std::task::Poll::Pending
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        if let Some(id) = self.timer_id.take() {
            self.executor.cancel_timer(id);
        }
    }
}

struct WakeViaStdWaker(std::task::Waker);

impl crate::executor::WakeTask for WakeViaStdWaker {
    fn wake_task(self: Rc<Self>) {
        self.0.wake_by_ref();
    }
}

/// Suspends the currently-running task until `deadline`.
pub async fn sleep(deadline: Instant) {
    let ctx = crate::context::current().expect("sleep called outside of a running task");
    sleep_on(ctx.executor(), deadline).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_mask_combines_and_queries() {
        let mask = PollMask::READABLE | PollMask::WRITABLE;
        assert!(mask.is_readable());
        assert!(mask.is_writable());
        assert!(!mask.is_error());
    }
}
