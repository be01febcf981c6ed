//! A one-shot timer delivering a timestamp on a channel it owns.
//!
//! Each armed timer spawns one task whose entire job is to sleep for `dt`
//! and then, unless it has been superseded, fire. A timing wheel would
//! amortize better across many concurrent timers, but this crate keeps the
//! one-task-per-fire design because nothing here runs enough timers at
//! once for it to matter, and it's the simplest thing that is obviously
//! correct. The observable contract — capacity-1 channel, empty-after-stop,
//! reset-only-when-disarmed — is what callers can rely on either way.

use std::sync::{Arc, Mutex};

use crate::chan::{self, Chan};
use crate::task;
use crate::time;

struct State {
    /// `f64::INFINITY` means disarmed.
    deadline_dt: f64,
    /// Bumped on every reset/stop; a fire task whose captured version no
    /// longer matches was cancelled or superseded.
    version: u64,
}

struct Inner {
    state: Mutex<State>,
    chan: Chan<f64>,
    func: Option<Box<dyn Fn() + Send + Sync>>,
}

/// Handle to a one-shot timer. Dropping it does not stop the timer; call
/// [`Timer::stop`] explicitly.
pub struct Timer {
    inner: Arc<Inner>,
}

impl Timer {
    fn construct(dt: f64, func: Option<Box<dyn Fn() + Send + Sync>>) -> Timer {
        // Construction with a function uses the nil channel: nothing is
        // ever meant to recv from it, since `f` runs instead of a send.
        let chan = if func.is_some() {
            chan::nil()
        } else {
            chan::make(1)
        };
        let timer = Timer {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    deadline_dt: f64::INFINITY,
                    version: 0,
                }),
                chan,
                func,
            }),
        };
        timer.reset(dt);
        timer
    }

    /// Creates an armed timer that fires once at `now() + dt` seconds,
    /// delivering a timestamp on its own channel. Analogous to Go's
    /// `time.NewTimer`; [`Timer::after`] is this plus discarding the
    /// handle, keeping only the channel.
    pub fn new(dt: f64) -> Timer {
        Timer::construct(dt, None)
    }

    /// Fires once at `now() + dt` seconds, delivering a timestamp on the
    /// returned channel. Equivalent to `Timer::new(dt).channel().clone()`
    /// for callers who have no need to `stop`/`reset` it.
    pub fn after(dt: f64) -> Chan<f64> {
        Timer::new(dt).inner.chan.clone()
    }

    /// Runs `f` in a new task at `now() + dt` seconds. The returned handle
    /// supports `stop`/`reset`.
    pub fn after_func<F>(dt: f64, f: F) -> Timer
    where
        F: Fn() + Send + Sync + 'static,
    {
        Timer::construct(dt, Some(Box::new(f)))
    }

    /// The channel this timer delivers its firing timestamp on. Blocks
    /// forever on recv if this timer was built with a function instead.
    pub fn channel(&self) -> &Chan<f64> {
        &self.inner.chan
    }

    /// Re-arms the timer to fire `dt` seconds from now.
    ///
    /// # Panics
    ///
    /// Panics if the timer is currently armed (must be stopped or allowed
    /// to expire first).
    pub fn reset(&self, dt: f64) {
        let mut state = self.inner.state.lock().unwrap();
        if state.deadline_dt.is_finite() {
            drop(state);
            panic!("the timer is armed; must be stopped or expired");
        }
        state.deadline_dt = dt;
        state.version += 1;
        let version = state.version;
        drop(state);

        let inner = self.inner.clone();
        task::spawn(move || {
            time::sleep(dt);

            let mut state = inner.state.lock().unwrap();
            if state.version != version {
                // Cancelled (stop) or superseded (another reset) while we slept.
                return;
            }
            state.deadline_dt = f64::INFINITY;

            match &inner.func {
                None => {
                    let now = time::now();
                    // Sending under `state`'s lock lets `stop` guarantee
                    // "if I observe deadline_dt == +inf, no send into the
                    // channel is in progress". Capacity-1 and contractually
                    // empty, so this cannot block.
                    inner.chan.send(now);
                    drop(state);
                }
                Some(f) => {
                    drop(state);
                    // Run outside the lock so `f` may itself call `reset`.
                    f();
                }
            }
        });
    }

    /// Cancels the timer's next firing.
    ///
    /// Returns `true` if this call stopped an active timer, `false` if it
    /// had already fired or was never armed. Either way, the timer's
    /// channel is guaranteed empty once `stop` returns.
    ///
    /// It is not guaranteed that a function timer's `f` has finished
    /// running if `stop` races its firing; callers needing that must
    /// synchronise externally.
    pub fn stop(&self) -> bool {
        let mut state = self.inner.state.lock().unwrap();
        let was_armed = state.deadline_dt.is_finite();
        state.deadline_dt = f64::INFINITY;
        state.version += 1;
        // Drain while still holding `state`, exactly as the fire task sends
        // its value while still holding it: otherwise a `reset()` wedged in
        // between dropping the lock and draining could arm, fire, and send
        // before this stale drain runs, and its legitimate tick would be
        // wiped out instead of the one this call actually meant to cancel.
        self.inner.chan.drain();
        drop(state);
        was_armed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;

    #[test]
    fn after_fires_once_with_a_timestamp() {
        let before = time::now();
        let c = Timer::after(0.05);
        let fired_at = c.recv().unwrap();
        assert!(fired_at >= before);
    }

    #[test]
    fn stop_before_fire_cancels_and_leaves_channel_empty() {
        let timer = Timer::construct(2.0, None);
        assert!(timer.stop());
        assert_eq!(timer.channel().len(), 0);
        // Give the would-be fire task a chance to run; it must see the
        // version bump and exit without sending.
        std::thread::sleep(std::time::Duration::from_millis(100));
        assert_eq!(timer.channel().len(), 0);
    }

    #[test]
    fn stop_after_fire_returns_false_and_leaves_channel_empty() {
        let timer = Timer::construct(0.05, None);
        std::thread::sleep(std::time::Duration::from_millis(150));
        assert_eq!(timer.channel().len(), 1);
        assert!(!timer.stop());
        assert_eq!(timer.channel().len(), 0);
    }

    #[test]
    #[should_panic(expected = "the timer is armed")]
    fn reset_on_armed_timer_panics() {
        let timer = Timer::construct(5.0, None);
        timer.reset(1.0);
    }

    #[test]
    fn reset_after_stop_is_legal() {
        let timer = Timer::construct(5.0, None);
        assert!(timer.stop());
        timer.reset(0.05);
        let fired = timer.channel().recv().unwrap();
        assert!(fired > 0.0);
    }

    #[test]
    fn after_func_runs_the_callback_instead_of_sending() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let (tx, rx) = mpsc::channel();
        let _timer = Timer::after_func(0.02, move || {
            flag.store(true, Ordering::SeqCst);
            let _ = tx.send(());
        });
        rx.recv_timeout(std::time::Duration::from_secs(1)).unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }
}
