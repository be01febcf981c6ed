//! The arbitration object for a single blocking act.
//!
//! A `WaitGroup` is created fresh for every blocking send, receive, or
//! `select` call and discarded once that call returns. It owns the wakeup
//! semaphore (modeled here as a `Mutex<bool>` + `Condvar`, the same shape
//! `mahkoh-comm`'s channel packet uses for its sleep/wake protocol) and a
//! `winner` field recording which waiter (identified by its case index;
//! plain sends/receives always use `0`) has committed to handling this
//! group's wakeup.
//!
//! `winner` is guarded by its own mutex rather than folded into an atomic,
//! because `select`'s second pass needs to hold it across a multi-step
//! check-then-act sequence: check whether a peer case already won, retry
//! the channel operation, and commit this case as the winner, all without
//! letting another thread observe a state in between. A bare
//! compare-and-swap on a `winner` flag cannot express "peek now, decide
//! later after doing unrelated work, still under the same lock" — so it
//! gets a real `Mutex` and callers hold the guard across that whole
//! sequence via [`WaitGroup::lock_winner`].
//!
//! Separating "who won" from "deliver the value and release the
//! semaphore" is what lets `close` and `select` commit to a winner without
//! ever holding `group.mu` while also holding a second channel's `mu` —
//! the channel.mu > group.mu order is preserved because every acquisition
//! of `winner`'s lock happens strictly after (never instead of, never
//! nested inside from the wrong side) the relevant channel's own lock.

use std::sync::{Condvar, Mutex, MutexGuard};

pub(crate) struct WaitGroup {
    winner: Mutex<Option<usize>>,
    released: Mutex<bool>,
    condvar: Condvar,
}

/// A held lock on a group's winner slot, spanning a check-then-act
/// sequence.
pub(crate) struct WinnerGuard<'a> {
    guard: MutexGuard<'a, Option<usize>>,
}

impl WinnerGuard<'_> {
    pub(crate) fn already_won(&self) -> bool {
        self.guard.is_some()
    }

    /// Commits `case` as the winner. Caller must have just verified
    /// [`WinnerGuard::already_won`] is false.
    pub(crate) fn commit(&mut self, case: usize) {
        debug_assert!(self.guard.is_none());
        *self.guard = Some(case);
    }
}

impl WaitGroup {
    pub(crate) fn new() -> Self {
        WaitGroup {
            winner: Mutex::new(None),
            released: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Atomically claims victory for this group on behalf of `case`.
    /// Monotonic: the first caller to succeed wins, every later caller
    /// gets `false` forever. A plain (non-select) send/recv always passes
    /// `0`. Used by [`super::channel::State::dequeue_recv_waiter`] and its
    /// send counterpart, where the check and the commit are the entire
    /// critical section.
    pub(crate) fn try_win(&self, case: usize) -> bool {
        let mut winner = self.winner.lock().unwrap();
        if winner.is_none() {
            *winner = Some(case);
            true
        } else {
            false
        }
    }

    /// Whether some waiter has already won this group.
    pub(crate) fn has_winner(&self) -> bool {
        self.winner.lock().unwrap().is_some()
    }

    /// Locks the winner slot for a check-then-act sequence. See the
    /// module docs for why this can't just be a single atomic op.
    pub(crate) fn lock_winner(&self) -> WinnerGuard<'_> {
        WinnerGuard {
            guard: self.winner.lock().unwrap(),
        }
    }

    /// The case index that won, once [`WaitGroup::wait`] has returned.
    pub(crate) fn winning_case(&self) -> Option<usize> {
        *self.winner.lock().unwrap()
    }

    /// Releases the semaphore. Must be called exactly once per group,
    /// after the winning waiter's result has been fully written and after
    /// `winner` has already been committed.
    pub(crate) fn wake(&self) {
        let mut released = self.released.lock().unwrap();
        *released = true;
        self.condvar.notify_one();
    }

    /// Blocks the calling thread until [`WaitGroup::wake`] is called.
    pub(crate) fn wait(&self) {
        let mut released = self.released.lock().unwrap();
        while !*released {
            released = self.condvar.wait(released).unwrap();
        }
    }
}

/// Blocks the current thread forever. Used to model operations on the nil
/// channel, which never completes, and by `select` for the case where
/// every registered case is a nil channel and there is no `default`.
pub(crate) fn block_forever() -> ! {
    let group = WaitGroup::new();
    group.wait();
    unreachable!("WaitGroup::wake is never called on a block_forever group")
}
