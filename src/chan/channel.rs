//! The channel object itself and its non-blocking core operations,
//! `try_send`/`try_recv`.
//!
//! [`Chan<T>`] is a cheap handle (an `Arc` around the shared state) that may
//! be cloned and passed between tasks freely; none of its holders own it
//! exclusively, since a channel is shared by every task that holds a
//! reference to it.
//!
//! The nil channel, a distinguished value on which every operation blocks
//! forever, is modelled as a variant of [`Inner`] rather than a null
//! handle: a tagged variant of the channel itself, not a null reference.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use super::group::{self, WaitGroup};
use super::waiter::{RecvOutcome, RecvWaiter, SendWaiter};

pub(crate) enum TrySendError<T> {
    Closed(T),
    Full(T),
}

pub(crate) enum TryRecvOutcome<T> {
    Delivered(T, Option<SendHandoff<T>>),
    ClosedEmpty,
    WouldBlock,
}

/// A receiver that `try_send` handed a value to directly, deferred so the
/// caller can drop the channel's state guard before waking it: fulfilling
/// a waiter touches its own `WaitGroup`, and that must never happen while
/// `channel.mu` is still held.
pub(crate) struct RecvHandoff<T> {
    waiter: Arc<RecvWaiter<T>>,
    value: T,
}

impl<T> RecvHandoff<T> {
    pub(crate) fn fulfill(self) {
        self.waiter.fulfill(self.value);
    }
}

/// Symmetric to [`RecvHandoff`]: a sender that `try_recv` took a value
/// from, woken only once the caller has dropped the state guard.
pub(crate) struct SendHandoff<T> {
    waiter: Arc<SendWaiter<T>>,
}

impl<T> SendHandoff<T> {
    pub(crate) fn fulfill(self) {
        self.waiter.fulfill();
    }
}

/// Everything protected by a real channel's single mutex.
pub(crate) struct State<T> {
    capacity: usize,
    pub(crate) buffer: VecDeque<T>,
    pub(crate) sendq: VecDeque<Arc<SendWaiter<T>>>,
    pub(crate) recvq: VecDeque<Arc<RecvWaiter<T>>>,
    pub(crate) closed: bool,
}

impl<T> State<T> {
    fn new(capacity: usize) -> Self {
        State {
            capacity,
            buffer: VecDeque::with_capacity(capacity.min(64)),
            sendq: VecDeque::new(),
            recvq: VecDeque::new(),
            closed: false,
        }
    }

    /// Pops the front of `recvq`, skipping (and discarding) any waiter
    /// whose group has already been won by a peer case in some `select`.
    pub(crate) fn dequeue_recv_waiter(&mut self) -> Option<Arc<RecvWaiter<T>>> {
        while let Some(w) = self.recvq.pop_front() {
            if w.group.try_win(w.case) {
                return Some(w);
            }
        }
        None
    }

    /// Symmetric to [`State::dequeue_recv_waiter`] for `sendq`.
    pub(crate) fn dequeue_send_waiter(&mut self) -> Option<Arc<SendWaiter<T>>> {
        while let Some(w) = self.sendq.pop_front() {
            if w.group.try_win(w.case) {
                return Some(w);
            }
        }
        None
    }

    /// Removes a specific, still-queued send waiter (by identity). Used by
    /// `select`'s cleanup pass; a no-op if the waiter was already dequeued.
    pub(crate) fn unregister_send(&mut self, target: &Arc<SendWaiter<T>>) {
        self.sendq.retain(|w| !Arc::ptr_eq(w, target));
    }

    /// Symmetric to [`State::unregister_send`] for `recvq`.
    pub(crate) fn unregister_recv(&mut self, target: &Arc<RecvWaiter<T>>) {
        self.recvq.retain(|w| !Arc::ptr_eq(w, target));
    }

    /// Non-blocking send attempt. On success, any handoff to a waiting
    /// receiver is returned rather than performed inline, so the caller can
    /// drop the state guard first and only then wake the receiver — the
    /// same discipline [`Chan::close`] uses for the waiters it drains.
    pub(crate) fn try_send(&mut self, v: T) -> Result<Option<RecvHandoff<T>>, TrySendError<T>> {
        if self.closed {
            return Err(TrySendError::Closed(v));
        }
        if self.capacity == 0 {
            return match self.dequeue_recv_waiter() {
                Some(waiter) => Ok(Some(RecvHandoff { waiter, value: v })),
                None => Err(TrySendError::Full(v)),
            };
        }
        if self.buffer.len() < self.capacity {
            self.buffer.push_back(v);
            if let Some(waiter) = self.dequeue_recv_waiter() {
                let value = self.buffer.pop_front().expect("value just pushed");
                return Ok(Some(RecvHandoff { waiter, value }));
            }
            return Ok(None);
        }
        Err(TrySendError::Full(v))
    }

    /// Non-blocking receive attempt. Symmetric to [`State::try_send`]: a
    /// woken sender comes back as a [`SendHandoff`] the caller fulfills
    /// only after releasing the state guard.
    pub(crate) fn try_recv(&mut self) -> TryRecvOutcome<T> {
        if let Some(v) = self.buffer.pop_front() {
            let handoff = if let Some(waiter) = self.dequeue_send_waiter() {
                let value = waiter.take_value();
                self.buffer.push_back(value);
                Some(SendHandoff { waiter })
            } else {
                None
            };
            return TryRecvOutcome::Delivered(v, handoff);
        }
        if self.closed {
            return TryRecvOutcome::ClosedEmpty;
        }
        if let Some(waiter) = self.dequeue_send_waiter() {
            let value = waiter.take_value();
            return TryRecvOutcome::Delivered(value, Some(SendHandoff { waiter }));
        }
        TryRecvOutcome::WouldBlock
    }
}

enum Inner<T> {
    Nil,
    Real(Mutex<State<T>>),
}

/// A channel handle: synchronous when built with capacity zero, buffered
/// otherwise, or the distinguished nil channel.
///
/// Cloning a `Chan` is cheap and yields another handle to the same
/// underlying channel, matching the reference semantics Go channels have.
pub struct Chan<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Chan<T> {
    fn clone(&self) -> Self {
        Chan {
            inner: self.inner.clone(),
        }
    }
}

/// Creates a channel. `capacity` of `0` gives a synchronous (rendezvous)
/// channel; any larger value gives a FIFO buffer of that size.
///
/// # Examples
///
/// ```
/// use relay::chan;
///
/// let c = chan::make::<&str>(1);
/// c.send("hello");
/// assert_eq!(c.recv(), Some("hello"));
/// ```
pub fn make<T>(capacity: usize) -> Chan<T> {
    Chan {
        inner: Arc::new(Inner::Real(Mutex::new(State::new(capacity)))),
    }
}

/// The nil channel: every send and receive on it blocks forever, and
/// closing it panics.
pub fn nil<T>() -> Chan<T> {
    Chan {
        inner: Arc::new(Inner::Nil),
    }
}

impl<T> Chan<T> {
    pub fn is_nil(&self) -> bool {
        matches!(*self.inner, Inner::Nil)
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, State<T>> {
        match &*self.inner {
            Inner::Real(mutex) => mutex.lock().unwrap(),
            Inner::Nil => unreachable!("lock_state called on the nil channel"),
        }
    }

    /// Sends `v`, blocking until a receiver accepts it (synchronous
    /// channel) or there is room in the buffer (buffered channel).
    ///
    /// # Panics
    ///
    /// Panics if the channel is already closed, or becomes closed while
    /// this call is parked waiting for room.
    pub fn send(&self, v: T) {
        if self.is_nil() {
            group::block_forever();
        }
        let mut state = self.lock_state();
        match state.try_send(v) {
            Ok(handoff) => {
                drop(state);
                if let Some(handoff) = handoff {
                    handoff.fulfill();
                }
            }
            Err(TrySendError::Closed(_)) => {
                drop(state);
                panic!("send on closed channel");
            }
            Err(TrySendError::Full(v)) => {
                let wg = Arc::new(WaitGroup::new());
                let waiter = SendWaiter::new(wg.clone(), 0, v);
                state.sendq.push_back(waiter.clone());
                drop(state);
                wg.wait();
                if !waiter.succeeded() {
                    panic!("send on closed channel");
                }
            }
        }
    }

    /// Receives a value, returning `(value, true)`, or `(None, false)` if
    /// the channel is closed and empty. Never panics.
    pub fn recv_(&self) -> (Option<T>, bool) {
        if self.is_nil() {
            group::block_forever();
        }
        let mut state = self.lock_state();
        match state.try_recv() {
            TryRecvOutcome::Delivered(v, handoff) => {
                drop(state);
                if let Some(handoff) = handoff {
                    handoff.fulfill();
                }
                (Some(v), true)
            }
            TryRecvOutcome::ClosedEmpty => (None, false),
            TryRecvOutcome::WouldBlock => {
                let wg = Arc::new(WaitGroup::new());
                let waiter = RecvWaiter::new(wg.clone(), 0);
                state.recvq.push_back(waiter.clone());
                drop(state);
                wg.wait();
                match waiter.take_outcome() {
                    RecvOutcome::Delivered(v) => (Some(v), true),
                    RecvOutcome::Closed => (None, false),
                }
            }
        }
    }

    /// `recv_().0`: receives a value, or `None` once the channel is closed
    /// and drained.
    pub fn recv(&self) -> Option<T> {
        self.recv_().0
    }

    /// Closes the channel. Every waiter currently parked on it is woken:
    /// receivers observe `(None, false)`, senders panic.
    ///
    /// # Panics
    ///
    /// Panics if the channel is the nil channel, or already closed.
    pub fn close(&self) {
        if self.is_nil() {
            panic!("close of nil channel");
        }
        let mut state = self.lock_state();
        if state.closed {
            drop(state);
            panic!("close of closed channel");
        }
        state.closed = true;
        let recv_drain: Vec<_> = state.recvq.drain(..).collect();
        let send_drain: Vec<_> = state.sendq.drain(..).collect();
        drop(state);

        // Waking happens outside the channel mutex so we never hold
        // channel.mu while touching group.mu in a way that could race
        // a concurrently-running select's own subscribe pass.
        for waiter in recv_drain {
            if waiter.group.try_win(waiter.case) {
                waiter.close();
            }
        }
        for waiter in send_drain {
            if waiter.group.try_win(waiter.case) {
                waiter.fail();
            }
        }
    }

    /// The number of values currently buffered. Advisory only: by the time
    /// the caller observes it, a concurrent operation may have changed it.
    pub fn len(&self) -> usize {
        if self.is_nil() {
            return 0;
        }
        self.lock_state().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Discards every currently-buffered value without blocking. Used by
    /// `Timer::stop`/`Ticker::stop` to guarantee the channel is empty on
    /// return without going through a receiver.
    pub(crate) fn drain(&self) {
        if self.is_nil() {
            return;
        }
        self.lock_state().buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task;
    use std::sync::mpsc;

    #[test]
    fn buffered_channel_is_fifo() {
        let c = make::<i32>(4);
        for v in [1, 2, 3] {
            c.send(v);
        }
        assert_eq!(c.len(), 3);
        assert_eq!(c.recv(), Some(1));
        assert_eq!(c.recv(), Some(2));
        assert_eq!(c.recv(), Some(3));
        assert_eq!(c.len(), 0);
    }

    #[test]
    fn closed_empty_channel_drains_to_none_forever() {
        let c = make::<i32>(2);
        c.send(1);
        c.send(2);
        c.close();
        assert_eq!(c.recv_(), (Some(1), true));
        assert_eq!(c.recv_(), (Some(2), true));
        assert_eq!(c.recv_(), (None, false));
        assert_eq!(c.recv_(), (None, false));
    }

    #[test]
    #[should_panic(expected = "send on closed channel")]
    fn send_on_closed_channel_panics() {
        let c = make::<i32>(1);
        c.close();
        c.send(1);
    }

    #[test]
    #[should_panic(expected = "close of closed channel")]
    fn double_close_panics() {
        let c = make::<i32>(1);
        c.close();
        c.close();
    }

    #[test]
    #[should_panic(expected = "close of nil channel")]
    fn close_of_nil_channel_panics() {
        let c = nil::<i32>();
        c.close();
    }

    #[test]
    fn nil_channel_blocks_forever_on_recv() {
        let c = nil::<i32>();
        let (tx, rx) = mpsc::channel();
        task::spawn(move || {
            c.recv();
            let _ = tx.send(());
        });
        assert!(rx.recv_timeout(std::time::Duration::from_millis(200)).is_err());
    }

    #[test]
    fn synchronous_channel_rendezvous_delivers_in_order() {
        let c = make::<i32>(0);
        let (done_tx, done_rx) = mpsc::channel();
        let sender = c.clone();
        task::spawn(move || {
            for v in 1..=5 {
                sender.send(v);
            }
            let _ = done_tx.send(());
        });

        let mut seen = Vec::new();
        for _ in 1..=5 {
            seen.push(c.recv().unwrap());
        }
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        done_rx.recv_timeout(std::time::Duration::from_secs(2)).unwrap();
    }

    #[test]
    fn many_paired_sends_are_delivered_exactly_once() {
        const TASKS: i32 = 8;
        const PER_TASK: i32 = 200;

        let c = make::<(i32, i32)>(0);
        for t in 0..TASKS {
            let sender = c.clone();
            task::spawn(move || {
                for i in 0..PER_TASK {
                    sender.send((t, i));
                }
            });
        }

        let mut seen = vec![0; PER_TASK as usize];
        for _ in 0..(TASKS * PER_TASK) {
            let (_, i) = c.recv().unwrap();
            seen[i as usize] += 1;
        }
        assert!(seen.iter().all(|&count| count == TASKS));
    }

    #[test]
    fn invariants_hold_under_random_traffic() {
        let c = make::<i32>(3);
        for _ in 0..2000 {
            if fastrand::bool() && c.len() < 3 {
                c.send(fastrand::i32(..));
            } else if c.len() > 0 {
                c.recv();
            }
            let state = c.lock_state();
            assert!(state.sendq.is_empty() || state.recvq.is_empty());
            assert!(state.buffer.len() <= 3);
        }
    }
}
