//! A portable concurrency runtime in the "communicating sequential processes"
//! style: lightweight tasks, typed channels with synchronous or buffered
//! semantics, a multi-way rendezvous `select`, and a timer subsystem built
//! entirely on top of those channels.
//!
//! The pieces are the same ones Go (and its ports, like pygolang) expose:
//!
//! * [`spawn`] launches an independent unit of concurrent execution.
//! * [`chan::Chan`] is a channel: synchronous when built with capacity zero,
//!   buffered otherwise, and with a distinguished "nil" value that blocks
//!   forever on every operation.
//! * [`chan::select::Select`] performs an atomic multi-way rendezvous across
//!   several channels at once.
//! * [`time::Timer`] and [`time::Ticker`] are one-shot and periodic event
//!   sources that deliver timestamps on a channel they own.
//!
//! Tasks in this crate are real OS threads: [`spawn`] is a thin wrapper over
//! [`std::thread::spawn`], and the semaphore used to coordinate blocking
//! channel operations is a [`std::sync::Condvar`]. This makes the runtime
//! usable from ordinary multi-threaded Rust programs without an embedded
//! scheduler or executor.
//!
//! # Examples
//!
//! Ping-pong between two tasks over two synchronous channels:
//!
//! ```
//! use relay::chan;
//!
//! let a = chan::make::<i32>(0);
//! let b = chan::make::<i32>(0);
//!
//! {
//!     let a = a.clone();
//!     let b = b.clone();
//!     relay::spawn(move || {
//!         while let Some(v) = a.recv() {
//!             b.send(v * 10);
//!         }
//!     });
//! }
//!
//! for i in 1..=5 {
//!     a.send(i);
//!     assert_eq!(b.recv(), Some(i * 10));
//! }
//! ```

pub mod chan;
pub mod config;
pub mod task;
pub mod time;

pub use chan::select::Select;
pub use chan::Chan;
pub use task::spawn;
