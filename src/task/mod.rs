//! Lightweight tasks.
//!
//! A _task_ here is a unit of concurrent execution launched with [`spawn`]:
//! real OS threads rather than cooperatively scheduled futures polled by an
//! executor, so [`spawn`] is a thin wrapper over
//! [`std::thread::Builder::spawn`] that enqueues `f` for execution as an
//! independent task with no return handle and no join.
//!
//! ## Panics
//!
//! A panic inside a spawned task's closure is surfaced to the host process
//! the way `std::thread` already surfaces thread panics: the default panic
//! hook prints to stderr, and the thread unwinds without taking the rest of
//! the process down. The one exception is a panic raised after
//! [`crate::config::begin_teardown`] has been called: those are swallowed
//! silently (when [`crate::config::Config::suppress_teardown_panics`] is
//! set, the default) to avoid noisy shutdown logs from daemon tasks still
//! running when the host process is exiting.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crate::config;

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Launches `f` as an independent task on the host scheduler.
///
/// There is no join handle and no way to observe the task's result: this is
/// a fire-and-forget wrapper around the host's `spawn`.
///
/// # Examples
///
/// ```
/// use relay::task;
/// use std::sync::mpsc;
///
/// let (tx, rx) = mpsc::channel();
/// task::spawn(move || tx.send(42).unwrap());
/// assert_eq!(rx.recv().unwrap(), 42);
/// ```
pub fn spawn<F>(f: F)
where
    F: FnOnce() + Send + 'static,
{
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let cfg = config::get();
    let name = format!("{}-{id}", cfg.thread_name_prefix);

    let builder = thread::Builder::new().name(name);
    let spawn_result = builder.spawn(move || {
        let result = catch_unwind(AssertUnwindSafe(f));
        if let Err(payload) = result {
            if config::is_tearing_down() && config::get().suppress_teardown_panics {
                return;
            }
            std::panic::resume_unwind(payload);
        }
    });

    // `std::thread::Builder::spawn` only fails if the OS refuses to create a
    // thread (e.g. resource exhaustion); treat that as fatal rather than
    // silently dropping the task.
    spawn_result.expect("failed to spawn task: the host scheduler is out of threads");
}
