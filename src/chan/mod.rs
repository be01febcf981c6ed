//! Channels and the multi-way rendezvous built on top of them.
//!
//! The module is split by responsibility:
//!
//! * [`group`] — the per-operation arbitration object (`WaitGroup`).
//! * [`waiter`] — transient records for a parked send or receive.
//! * [`channel`] — the channel itself, its non-blocking core
//!   (`trySend`/`tryRecv`), and the public [`Chan`] handle.
//! * [`select`] — the multi-way rendezvous.

mod channel;
mod group;
mod waiter;
pub mod select;

pub use channel::{make, nil, Chan};
