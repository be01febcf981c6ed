//! Multi-way rendezvous across several channels at once.
//!
//! `select` cannot be a single generic function the way it is in Go: Go's
//! `select(cases...) -> (case_index, recv_result)` relies on cases
//! carrying heterogeneous element types that only the runtime (not the
//! type checker) needs to reconcile. The idiomatic Rust shape for that is
//! the builder crossbeam-channel uses — register cases on a `Select`,
//! call `.select()` to get back an opaque [`SelectedOperation`] carrying
//! just the winning index, then ask that operation to resolve itself
//! against the concrete type of whichever case won.
//!
//! Internally each case is type-erased behind a small [`SelectCase`]
//! trait so `Select` can hold a single `Vec` of them regardless of what
//! element type each underlying channel carries; the erasure cost is one
//! `Box<dyn Any + Send>` for a delivered receive value.

use std::any::Any;
use std::cell::RefCell;
use std::sync::Arc;

use super::channel::{Chan, TryRecvOutcome, TrySendError};
use super::group::{self, WaitGroup};
use super::waiter::{RecvOutcome, RecvWaiter, SendWaiter};

enum Kind {
    Recv(Option<Box<dyn Any + Send>>),
    Send,
    SendOnClosed,
    Default,
}

/// The outcome of a completed [`Select`]: which case fired, and (for recv
/// and send cases) its result.
pub struct SelectedOperation {
    index: usize,
    kind: Kind,
}

impl SelectedOperation {
    /// The original index of the winning case, in registration order.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether the `default` case fired.
    pub fn is_default(&self) -> bool {
        matches!(self.kind, Kind::Default)
    }

    /// Resolves a winning recv case. `T` must match the element type the
    /// case was registered with via [`Select::recv`].
    ///
    /// # Panics
    ///
    /// Panics if this operation is not a recv case, or if `T` does not
    /// match the channel's element type.
    pub fn recv<T: 'static>(self) -> (Option<T>, bool) {
        match self.kind {
            Kind::Recv(Some(boxed)) => {
                let value = *boxed
                    .downcast::<T>()
                    .unwrap_or_else(|_| panic!("SelectedOperation::recv: element type mismatch"));
                (Some(value), true)
            }
            Kind::Recv(None) => (None, false),
            _ => panic!("SelectedOperation::recv called on a non-recv case"),
        }
    }

    /// Resolves a winning send case.
    ///
    /// # Panics
    ///
    /// Panics if this operation is not a send case, or if the send failed
    /// because the channel was closed.
    pub fn send(self) {
        match self.kind {
            Kind::Send => {}
            Kind::SendOnClosed => panic!("send on closed channel"),
            _ => panic!("SelectedOperation::send called on a non-send case"),
        }
    }
}

trait SelectCase {
    fn is_nil(&self) -> bool;
    /// First-pass non-blocking attempt.
    fn poll(&self) -> Option<Kind>;
    /// Second-pass attempt: re-checks the group, retries the op, and
    /// either commits a win or enqueues a waiter.
    fn subscribe(&self, group: &Arc<WaitGroup>, case: usize) -> Option<Kind>;
    /// Pulls the final result out of this case's own waiter. Only called
    /// on the case [`WaitGroup::winning_case`] names.
    fn collect(&self) -> Kind;
    /// Removes this case's waiter from its channel's queue, if it is
    /// still queued. A no-op if the case never subscribed, or already won.
    fn unregister(&self);
}

struct RecvCase<'a, T> {
    chan: &'a Chan<T>,
    waiter: RefCell<Option<Arc<RecvWaiter<T>>>>,
}

impl<T: Send + 'static> SelectCase for RecvCase<'_, T> {
    fn is_nil(&self) -> bool {
        self.chan.is_nil()
    }

    fn poll(&self) -> Option<Kind> {
        if self.chan.is_nil() {
            return None;
        }
        let mut state = self.chan.lock_state();
        let outcome = state.try_recv();
        drop(state);
        match outcome {
            TryRecvOutcome::Delivered(v, handoff) => {
                if let Some(handoff) = handoff {
                    handoff.fulfill();
                }
                Some(Kind::Recv(Some(Box::new(v))))
            }
            TryRecvOutcome::ClosedEmpty => Some(Kind::Recv(None)),
            TryRecvOutcome::WouldBlock => None,
        }
    }

    fn subscribe(&self, group: &Arc<WaitGroup>, case: usize) -> Option<Kind> {
        if self.chan.is_nil() {
            return None;
        }
        let mut state = self.chan.lock_state();
        let mut winner = group.lock_winner();
        if winner.already_won() {
            return None;
        }
        match state.try_recv() {
            TryRecvOutcome::Delivered(v, handoff) => {
                winner.commit(case);
                drop(winner);
                drop(state);
                if let Some(handoff) = handoff {
                    handoff.fulfill();
                }
                Some(Kind::Recv(Some(Box::new(v))))
            }
            TryRecvOutcome::ClosedEmpty => {
                winner.commit(case);
                Some(Kind::Recv(None))
            }
            TryRecvOutcome::WouldBlock => {
                drop(winner);
                let waiter = RecvWaiter::new(group.clone(), case);
                state.recvq.push_back(waiter.clone());
                *self.waiter.borrow_mut() = Some(waiter);
                None
            }
        }
    }

    fn collect(&self) -> Kind {
        let waiter = self
            .waiter
            .borrow_mut()
            .take()
            .expect("winning recv case has no waiter");
        match waiter.take_outcome() {
            RecvOutcome::Delivered(v) => Kind::Recv(Some(Box::new(v))),
            RecvOutcome::Closed => Kind::Recv(None),
        }
    }

    fn unregister(&self) {
        if let Some(waiter) = self.waiter.borrow_mut().take() {
            self.chan.lock_state().unregister_recv(&waiter);
        }
    }
}

struct SendCase<'a, T> {
    chan: &'a Chan<T>,
    value: RefCell<Option<T>>,
    waiter: RefCell<Option<Arc<SendWaiter<T>>>>,
}

impl<T: Send + 'static> SelectCase for SendCase<'_, T> {
    fn is_nil(&self) -> bool {
        self.chan.is_nil()
    }

    fn poll(&self) -> Option<Kind> {
        if self.chan.is_nil() {
            return None;
        }
        let v = self
            .value
            .borrow_mut()
            .take()
            .expect("send case polled after its value was already consumed");
        let mut state = self.chan.lock_state();
        match state.try_send(v) {
            Ok(handoff) => {
                drop(state);
                if let Some(handoff) = handoff {
                    handoff.fulfill();
                }
                Some(Kind::Send)
            }
            Err(TrySendError::Closed(_)) => Some(Kind::SendOnClosed),
            Err(TrySendError::Full(v)) => {
                drop(state);
                *self.value.borrow_mut() = Some(v);
                None
            }
        }
    }

    fn subscribe(&self, group: &Arc<WaitGroup>, case: usize) -> Option<Kind> {
        if self.chan.is_nil() {
            return None;
        }
        let v = self
            .value
            .borrow_mut()
            .take()
            .expect("send case subscribed after its value was already consumed");
        let mut state = self.chan.lock_state();
        let mut winner = group.lock_winner();
        if winner.already_won() {
            drop(winner);
            drop(state);
            *self.value.borrow_mut() = Some(v);
            return None;
        }
        match state.try_send(v) {
            Ok(handoff) => {
                winner.commit(case);
                drop(winner);
                drop(state);
                if let Some(handoff) = handoff {
                    handoff.fulfill();
                }
                Some(Kind::Send)
            }
            Err(TrySendError::Closed(_)) => {
                winner.commit(case);
                Some(Kind::SendOnClosed)
            }
            Err(TrySendError::Full(v)) => {
                drop(winner);
                let waiter = SendWaiter::new(group.clone(), case, v);
                state.sendq.push_back(waiter.clone());
                *self.waiter.borrow_mut() = Some(waiter);
                None
            }
        }
    }

    fn collect(&self) -> Kind {
        let waiter = self
            .waiter
            .borrow_mut()
            .take()
            .expect("winning send case has no waiter");
        if waiter.succeeded() {
            Kind::Send
        } else {
            Kind::SendOnClosed
        }
    }

    fn unregister(&self) {
        if let Some(waiter) = self.waiter.borrow_mut().take() {
            self.chan.lock_state().unregister_send(&waiter);
        }
    }
}

enum CaseEntry<'a> {
    Op(Box<dyn SelectCase + 'a>),
    Default,
}

/// Builds and runs a multi-way rendezvous over several channel operations.
///
/// # Examples
///
/// ```
/// use relay::chan::{self, select::Select};
///
/// let a = chan::make::<i32>(1);
/// a.send(7);
///
/// let mut sel = Select::new();
/// sel.recv(&a);
/// sel.default();
/// let op = sel.select();
///
/// if !op.is_default() {
///     let (v, ok) = op.recv::<i32>();
///     assert_eq!((v, ok), (Some(7), true));
/// }
/// ```
pub struct Select<'a> {
    cases: Vec<CaseEntry<'a>>,
    has_default: bool,
}

impl Default for Select<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Select<'a> {
    pub fn new() -> Self {
        Select {
            cases: Vec::new(),
            has_default: false,
        }
    }

    /// Registers a receive case on `chan`. Returns the case's index.
    pub fn recv<T: Send + 'static>(&mut self, chan: &'a Chan<T>) -> usize {
        let index = self.cases.len();
        self.cases.push(CaseEntry::Op(Box::new(RecvCase {
            chan,
            waiter: RefCell::new(None),
        })));
        index
    }

    /// Registers a send case offering `value` on `chan`. Returns the
    /// case's index.
    pub fn send<T: Send + 'static>(&mut self, chan: &'a Chan<T>, value: T) -> usize {
        let index = self.cases.len();
        self.cases.push(CaseEntry::Op(Box::new(SendCase {
            chan,
            value: RefCell::new(Some(value)),
            waiter: RefCell::new(None),
        })));
        index
    }

    /// Registers the default case, selected only when no other case is
    /// immediately ready.
    ///
    /// # Panics
    ///
    /// Panics if a default case has already been registered on this
    /// `Select`.
    pub fn default(&mut self) -> usize {
        if self.has_default {
            panic!("select: a default case is already registered");
        }
        self.has_default = true;
        let index = self.cases.len();
        self.cases.push(CaseEntry::Default);
        index
    }

    /// Runs the rendezvous: performs a randomly-ordered poll of every
    /// case, falls back to `default` if present, and otherwise subscribes
    /// every case to a shared wait group and blocks until exactly one
    /// fires.
    pub fn select(&mut self) -> SelectedOperation {
        let n = self.cases.len();
        let mut order: Vec<usize> = (0..n).collect();
        shuffle(&mut order);

        let mut default_index = None;
        let mut live: Vec<usize> = Vec::new();

        for &idx in &order {
            match &self.cases[idx] {
                CaseEntry::Default => default_index = Some(idx),
                CaseEntry::Op(case) => {
                    if case.is_nil() {
                        continue;
                    }
                    if let Some(kind) = case.poll() {
                        return SelectedOperation { index: idx, kind };
                    }
                    live.push(idx);
                }
            }
        }

        if let Some(index) = default_index {
            return SelectedOperation {
                index,
                kind: Kind::Default,
            };
        }

        if live.is_empty() {
            group::block_forever();
        }

        let group = Arc::new(WaitGroup::new());
        let mut winner = None;
        for &idx in &live {
            if group.has_winner() {
                break;
            }
            if let CaseEntry::Op(case) = &self.cases[idx] {
                if let Some(kind) = case.subscribe(&group, idx) {
                    winner = Some((idx, kind));
                    break;
                }
            }
        }

        let (win_index, win_kind) = match winner {
            Some(w) => w,
            None => {
                group.wait();
                let win_index = group
                    .winning_case()
                    .expect("wait() returned with no committed winner");
                let kind = match &self.cases[win_index] {
                    CaseEntry::Op(case) => case.collect(),
                    CaseEntry::Default => {
                        unreachable!("default case is never subscribed, so it cannot win a wait")
                    }
                };
                (win_index, kind)
            }
        };

        // Unregister every case that subscribed a waiter. Harmless no-op
        // for cases that never reached the enqueue branch, and for the
        // winner itself, whose waiter was already consumed by `collect`.
        for &idx in &live {
            if let CaseEntry::Op(case) = &self.cases[idx] {
                case.unregister();
            }
        }

        SelectedOperation {
            index: win_index,
            kind: win_kind,
        }
    }
}

fn shuffle(order: &mut [usize]) {
    for i in (1..order.len()).rev() {
        let j = fastrand::usize(0..=i);
        order.swap(i, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chan;
    use crate::task;
    use std::sync::mpsc;

    #[test]
    fn default_fires_when_nothing_ready() {
        let c = chan::make::<i32>(0);
        let mut sel = Select::new();
        let recv_case = sel.recv(&c);
        let default_case = sel.default();
        let op = sel.select();
        assert_eq!(op.index(), default_case);
        assert_ne!(recv_case, default_case);
        assert!(op.is_default());
    }

    #[test]
    fn recv_case_wins_when_value_ready() {
        let c = chan::make::<&str>(1);
        c.send("ready");
        let mut sel = Select::new();
        let recv_case = sel.recv(&c);
        sel.default();
        let op = sel.select();
        assert_eq!(op.index(), recv_case);
        assert_eq!(op.recv::<&str>(), (Some("ready"), true));
    }

    #[test]
    fn send_case_wins_when_receiver_is_waiting() {
        let c = chan::make::<i32>(0);
        let (tx, rx) = mpsc::channel();
        let receiver = c.clone();
        task::spawn(move || {
            let v = receiver.recv();
            let _ = tx.send(v);
        });

        // Give the receiver a head start so the send case is ready.
        std::thread::sleep(std::time::Duration::from_millis(50));

        let mut sel = Select::new();
        let send_case = sel.send(&c, 42);
        let op = sel.select();
        assert_eq!(op.index(), send_case);
        op.send();
        assert_eq!(rx.recv_timeout(std::time::Duration::from_secs(1)).unwrap(), Some(42));
    }

    #[test]
    fn select_blocks_until_a_case_becomes_ready() {
        let c = chan::make::<i32>(0);
        let sender = c.clone();
        task::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(50));
            sender.send(9);
        });

        let mut sel = Select::new();
        let recv_case = sel.recv(&c);
        let op = sel.select();
        assert_eq!(op.index(), recv_case);
        assert_eq!(op.recv::<i32>(), (Some(9), true));
    }

    #[test]
    fn selection_is_fair_between_two_ready_cases() {
        let mut case0_wins = 0;
        let trials = 4000;
        for _ in 0..trials {
            let a = chan::make::<&str>(1);
            let b = chan::make::<&str>(1);
            a.send("a");
            b.send("b");

            let mut sel = Select::new();
            let a_case = sel.recv(&a);
            sel.recv(&b);
            let op = sel.select();
            if op.index() == a_case {
                case0_wins += 1;
            }
        }
        let ratio = case0_wins as f64 / trials as f64;
        assert!((0.45..0.55).contains(&ratio), "case-0 win ratio was {ratio}");
    }

    #[test]
    #[should_panic(expected = "a default case is already registered")]
    fn duplicate_default_panics() {
        let mut sel: Select<'_> = Select::new();
        sel.default();
        sel.default();
    }

    #[test]
    fn nil_channel_case_never_wins_falls_through_to_default() {
        let nil_chan = chan::nil::<i32>();
        let mut sel = Select::new();
        sel.recv(&nil_chan);
        let default_case = sel.default();
        let op = sel.select();
        assert_eq!(op.index(), default_case);
    }
}
