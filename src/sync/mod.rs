//! Awaitable synchronization primitives built on this crate's own task
//! model rather than OS threads: [`mutex::Mutex`] and [`channel`].

pub mod channel;
pub mod mutex;
