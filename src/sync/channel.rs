//! MPSC and SPSC channels for passing values between tasks on the same
//! executor thread.
//!
//! Grounded on the teacher's `src/channel.rs` split between a data queue
//! (there, `std::sync::mpsc`; here, a `RefCell<VecDeque<T>>` since every
//! sender and receiver live on the one executor thread) and a readiness
//! control side (there, a `Registration`/`SetReadiness` pair wired into
//! `Poll`; here, a waker slot woken directly rather than through a
//! reactor, since there is no OS handle backing this channel).

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::error::{Error, ErrorKind, Result};

struct Shared<T> {
    queue: RefCell<VecDeque<T>>,
    senders: std::cell::Cell<usize>,
    receiver_alive: std::cell::Cell<bool>,
    capacity: Option<usize>,
    recv_waker: RefCell<Option<Waker>>,
    send_wakers: RefCell<Vec<Waker>>,
}

/// Creates an unbounded MPSC channel.
pub fn channel<T>() -> (Sender<T>, Receiver<T>) {
    make(None)
}

/// Creates a bounded MPSC channel; a send that finds the channel full
/// waits for a slot rather than failing immediately.
pub fn bounded<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
    make(Some(capacity))
}

fn make<T>(capacity: Option<usize>) -> (Sender<T>, Receiver<T>) {
    let shared = Rc::new(Shared {
        queue: RefCell::new(VecDeque::new()),
        senders: std::cell::Cell::new(1),
        receiver_alive: std::cell::Cell::new(true),
        capacity,
        recv_waker: RefCell::new(None),
        send_wakers: RefCell::new(Vec::new()),
    });
    (
        Sender {
            shared: shared.clone(),
        },
        Receiver { shared },
    )
}

/// The sending half of a channel. Cloneable: every clone counts toward
/// "all senders dropped" for [`ErrorKind::ChannelBroken`].
pub struct Sender<T> {
    shared: Rc<Shared<T>>,
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Sender<T> {
        self.shared.senders.set(self.shared.senders.get() + 1);
        Sender {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        let remaining = self.shared.senders.get() - 1;
        self.shared.senders.set(remaining);
        if remaining == 0 {
            if let Some(waker) = self.shared.recv_waker.borrow_mut().take() {
                waker.wake();
            }
        }
    }
}

impl<T> Sender<T> {
    /// Enqueues `value` without waiting, failing with
    /// [`ErrorKind::ChannelFull`] if a bound is set and already reached,
    /// or [`ErrorKind::ChannelBroken`] if the receiver has been dropped.
    pub fn try_send(&self, value: T) -> Result<()> {
        if !self.shared.receiver_alive.get() {
            return Err(Error::new(ErrorKind::ChannelBroken));
        }
        let mut queue = self.shared.queue.borrow_mut();
        if let Some(cap) = self.shared.capacity {
            if queue.len() >= cap {
                return Err(Error::new(ErrorKind::ChannelFull));
            }
        }
        queue.push_back(value);
        drop(queue);
        if let Some(waker) = self.shared.recv_waker.borrow_mut().take() {
            waker.wake();
        }
        Ok(())
    }

    /// Enqueues `value`, waiting for free capacity if the channel is
    /// bounded and currently full.
    pub fn send(&self, value: T) -> Send<'_, T> {
        Send {
            sender: self,
            value: Some(value),
        }
    }
}

/// A future returned by [`Sender::send`].
pub struct Send<'a, T> {
    sender: &'a Sender<T>,
    value: Option<T>,
}

impl<'a, T> Future for Send<'a, T> {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        let this = self.get_mut();
        let value = this.value.take().expect("Send polled after completion");
        match this.sender.try_send(value) {
            Ok(()) => Poll::Ready(Ok(())),
            Err(err) if err.kind() == ErrorKind::ChannelFull => {
                this.sender
                    .shared
                    .send_wakers
                    .borrow_mut()
                    .push(cx.waker().clone());
                Poll::Pending
            }
            Err(err) => Poll::Ready(Err(err)),
        }
    }
}

/// The receiving half of a channel. Not cloneable: exactly one receiver
/// exists per channel.
pub struct Receiver<T> {
    shared: Rc<Shared<T>>,
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        self.shared.receiver_alive.set(false);
    }
}

impl<T> Receiver<T> {
    /// Dequeues a value without waiting, failing with
    /// [`ErrorKind::ChannelEmpty`] if nothing is queued, or
    /// [`ErrorKind::ChannelBroken`] if every sender has been dropped and
    /// the queue is drained.
    pub fn try_recv(&self) -> Result<T> {
        let mut queue = self.shared.queue.borrow_mut();
        match queue.pop_front() {
            Some(value) => {
                drop(queue);
                for waker in self.shared.send_wakers.borrow_mut().drain(..) {
                    waker.wake();
                }
                Ok(value)
            }
            None if self.shared.senders.get() == 0 => Err(Error::new(ErrorKind::ChannelBroken)),
            None => Err(Error::new(ErrorKind::ChannelEmpty)),
        }
    }

    /// Dequeues a value, waiting for one to arrive.
    pub fn recv(&mut self) -> Recv<'_, T> {
        Recv { receiver: self }
    }
}

/// A future returned by [`Receiver::recv`].
pub struct Recv<'a, T> {
    receiver: &'a mut Receiver<T>,
}

impl<'a, T> Future for Recv<'a, T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<T>> {
        let this = self.get_mut();
        match this.receiver.try_recv() {
            Ok(value) => Poll::Ready(Ok(value)),
            Err(err) if err.kind() == ErrorKind::ChannelEmpty => {
                *this.receiver.shared.recv_waker.borrow_mut() = Some(cx.waker().clone());
                Poll::Pending
            }
            Err(err) => Poll::Ready(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_send_then_try_recv_round_trips() {
        let (tx, rx) = channel();
        tx.try_send(42).unwrap();
        assert_eq!(rx.try_recv().unwrap(), 42);
    }

    #[test]
    fn try_recv_on_empty_channel_is_empty_not_broken() {
        let (_tx, rx) = channel::<u32>();
        assert_eq!(rx.try_recv().unwrap_err().kind(), ErrorKind::ChannelEmpty);
    }

    #[test]
    fn dropping_all_senders_breaks_the_channel() {
        let (tx, rx) = channel::<u32>();
        drop(tx);
        assert_eq!(rx.try_recv().unwrap_err().kind(), ErrorKind::ChannelBroken);
    }

    #[test]
    fn bounded_channel_rejects_sends_past_capacity() {
        let (tx, _rx) = bounded(1);
        tx.try_send(1).unwrap();
        assert_eq!(tx.try_send(2).unwrap_err().kind(), ErrorKind::ChannelFull);
    }
}
