//! Transient records for a task parked on one channel operation.
//!
//! A waiter is created right before it is pushed onto a channel's `sendq`
//! or `recvq` and is discarded once its owning [`WaitGroup`] has woken up.
//! It is always reached through an `Arc` so that both the channel (which
//! queues it) and the parked thread (which owns the stack frame waiting on
//! the group) can refer to the same record.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::group::WaitGroup;
use std::sync::Arc;

/// A task parked wanting to send `T` into a channel.
pub(crate) struct SendWaiter<T> {
    pub(crate) group: Arc<WaitGroup>,
    /// The case index this waiter represents within its group. Plain
    /// (non-`select`) sends always use `0`.
    pub(crate) case: usize,
    value: Mutex<Option<T>>,
    succeeded: AtomicBool,
}

impl<T> SendWaiter<T> {
    pub(crate) fn new(group: Arc<WaitGroup>, case: usize, value: T) -> Arc<Self> {
        Arc::new(SendWaiter {
            group,
            case,
            value: Mutex::new(Some(value)),
            succeeded: AtomicBool::new(false),
        })
    }

    /// Takes the carried value back out. Used by whichever side dequeues
    /// this waiter (a matching receiver, or `close` draining `sendq`).
    pub(crate) fn take_value(&self) -> T {
        self.value
            .lock()
            .unwrap()
            .take()
            .expect("SendWaiter value taken twice")
    }

    /// Marks the send as delivered and wakes the parked task.
    pub(crate) fn fulfill(&self) {
        self.succeeded.store(true, Ordering::SeqCst);
        self.group.wake();
    }

    /// Marks the send as failed (channel closed while parked) and wakes
    /// the parked task.
    pub(crate) fn fail(&self) {
        self.succeeded.store(false, Ordering::SeqCst);
        self.group.wake();
    }

    /// Whether the value was actually delivered. Only meaningful after the
    /// waiter's group has woken up.
    pub(crate) fn succeeded(&self) -> bool {
        self.succeeded.load(Ordering::SeqCst)
    }
}

/// The result a parked receive eventually observes: either a value handed
/// over by a matching sender, or notice that the channel closed while it
/// waited.
pub(crate) enum RecvOutcome<T> {
    Delivered(T),
    Closed,
}

/// A task parked wanting to receive a `T` from a channel.
pub(crate) struct RecvWaiter<T> {
    pub(crate) group: Arc<WaitGroup>,
    pub(crate) case: usize,
    slot: Mutex<Option<RecvOutcome<T>>>,
}

impl<T> RecvWaiter<T> {
    pub(crate) fn new(group: Arc<WaitGroup>, case: usize) -> Arc<Self> {
        Arc::new(RecvWaiter {
            group,
            case,
            slot: Mutex::new(None),
        })
    }

    /// Hands a value to this waiter and wakes its parked task.
    pub(crate) fn fulfill(&self, value: T) {
        *self.slot.lock().unwrap() = Some(RecvOutcome::Delivered(value));
        self.group.wake();
    }

    /// Notifies this waiter that the channel closed and wakes its parked
    /// task.
    pub(crate) fn close(&self) {
        *self.slot.lock().unwrap() = Some(RecvOutcome::Closed);
        self.group.wake();
    }

    /// Takes the final outcome out. Only meaningful after the waiter's
    /// group has woken up.
    pub(crate) fn take_outcome(&self) -> RecvOutcome<T> {
        self.slot
            .lock()
            .unwrap()
            .take()
            .expect("RecvWaiter polled before it was fulfilled")
    }
}
