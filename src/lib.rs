//! A single-threaded, non-work-stealing async runtime and cross-platform
//! I/O reactor, plus a standalone HPACK (RFC 7541) codec core.
//!
//! The runtime maps the stackless-coroutine model onto native `async`/
//! `.await`: [`Task`] is a lazily-started coroutine frame, [`CoroContext`]
//! is the per-task environment every nested awaiter can reach via
//! [`context::current`], and [`StopSource`]/[`StopToken`] give cooperative
//! cancellation the same shape the original runtime's stop tokens have.
//! [`LocalExecutor`] ties a ready queue, a [`TimerService`] and a platform
//! reactor (`epoll` on Linux, IOCP on Windows) into one event loop; nothing
//! in this crate migrates a task between threads once it is spawned, and
//! [`executor::PostHandle`] is the only handle that is safe to carry across
//! one.
//!
//! Enable `hpack` (on by default) for the header-compression codec in
//! [`hpack`], which has no dependency on the reactor half of this crate.

#![allow(clippy::type_complexity)]

pub mod error;
pub mod stop;
pub mod context;
pub mod executor;
pub mod task;
pub mod timer;
pub mod compose;
pub mod waker;

#[cfg(feature = "os-poll")]
pub mod reactor;
#[cfg(feature = "os-poll")]
pub mod runtime;
#[cfg(feature = "os-poll")]
pub mod stream;
#[cfg(feature = "os-poll")]
pub mod sync;

#[cfg(feature = "hpack")]
pub mod hpack;

pub use error::{Error, ErrorKind, HpackErrorKind, Result};
pub use stop::{StopCallback, StopSource, StopToken};
pub use context::CoroContext;
pub use executor::{Executor, PostHandle, WakeTask};
pub use task::Task;
pub use compose::{join_all, select_any, spawn, spawn_blocking, timeout, TaskGroup};

#[cfg(feature = "os-poll")]
pub use reactor::{sleep, PollMask};
#[cfg(feature = "os-poll")]
pub use runtime::LocalExecutor;
#[cfg(feature = "os-poll")]
pub use stream::StreamBuffer;
#[cfg(feature = "os-poll")]
pub use sync::channel::{bounded, channel, Receiver, Sender};
#[cfg(feature = "os-poll")]
pub use sync::mutex::Mutex;

#[cfg(feature = "hpack")]
pub use hpack::{HeaderField, HpackContext, HpackDecoder, HpackEncoder};

/// Documents this crate's Cargo feature flags; contains no code.
///
/// - `os-poll` (default): the platform reactor ([`reactor`], [`runtime`]),
///   buffered streams ([`stream`]) and the `sync` primitives that build on
///   them.
/// - `os-ext`: AFD-based poll, named pipes and wait-object support on
///   Windows; POSIX-AIO file I/O on Linux. Off by default -- most of this
///   surface is unimplemented stubs today.
/// - `hpack` (default): the RFC 7541 header-compression codec
///   ([`hpack`]), independent of the reactor.
/// - `log` (default): routes internal diagnostics through the `log` crate
///   rather than compiling them out.
pub mod features {}
