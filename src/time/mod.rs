//! The clock service and the scheduled event sources built on it.
//!
//! The clock itself (`now`/`sleep`) is a thin wrapper over [`std::time`];
//! [`Timer`] and [`Ticker`] are genuinely part of this runtime, built
//! entirely out of tasks, channels, and this clock.
//!
//! Durations are expressed as `f64` seconds throughout — a timestamp in
//! seconds since an arbitrary epoch — rather than [`std::time::Duration`],
//! so a fired timer's payload and a timeout argument are the same unit.

mod ticker;
mod timer;

pub use ticker::Ticker;
pub use timer::Timer;

use std::time::{SystemTime, UNIX_EPOCH};

/// One nanosecond, in seconds.
pub const NANOSECOND: f64 = 1e-9;
/// One microsecond, in seconds.
pub const MICROSECOND: f64 = 1e-6;
/// One millisecond, in seconds.
pub const MILLISECOND: f64 = 1e-3;
/// One second.
pub const SECOND: f64 = 1.0;
/// One minute, in seconds.
pub const MINUTE: f64 = 60.0 * SECOND;
/// One hour, in seconds.
pub const HOUR: f64 = 60.0 * MINUTE;

/// Seconds elapsed since the Unix epoch, per the host's wall clock.
///
/// Used only for the timestamp payload [`Timer`] and [`Ticker`] deliver;
/// the durations that drive them (`dt` arguments) are measured against a
/// monotonic clock instead, so resetting the system clock mid-wait can't
/// make a timer fire early or late.
pub fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is set before the Unix epoch")
        .as_secs_f64()
}

/// Blocks the calling task for `dt` seconds. `dt <= 0.0` returns
/// immediately.
pub fn sleep(dt: f64) {
    if dt > 0.0 {
        std::thread::sleep(std::time::Duration::from_secs_f64(dt));
    }
}

/// Fires once at `now() + dt` seconds, delivering a timestamp on the
/// returned channel.
pub fn after(dt: f64) -> crate::chan::Chan<f64> {
    Timer::after(dt)
}

/// Runs `f` in a new task at `now() + dt` seconds; the returned handle
/// supports `stop`/`reset`.
pub fn after_func<F>(dt: f64, f: F) -> Timer
where
    F: Fn() + Send + Sync + 'static,
{
    Timer::after_func(dt, f)
}

/// Starts a periodic ticker delivering a timestamp every `dt` seconds.
pub fn ticker(dt: f64) -> Ticker {
    Ticker::new(dt)
}
