//! A periodic timestamp stream delivered on a channel the ticker owns.
//!
//! Unlike [`super::Timer`], a ticker's background task never exits on its
//! own; `stop` only flips a flag the task checks before each send, so a
//! stopped ticker's task finishes its current sleep and then exits
//! quietly rather than being torn down synchronously.

use std::sync::{Arc, Mutex};

use crate::chan::select::Select;
use crate::chan::{self, Chan};
use crate::task;
use crate::time;

struct Inner {
    chan: Chan<f64>,
    stopped: Mutex<bool>,
}

/// Handle to a periodic ticker.
pub struct Ticker {
    inner: Arc<Inner>,
}

impl Ticker {
    /// Starts a ticker that delivers a timestamp every `dt` seconds.
    ///
    /// # Panics
    ///
    /// Panics if `dt <= 0.0`.
    pub fn new(dt: f64) -> Ticker {
        if dt <= 0.0 {
            panic!("ticker: dt <= 0");
        }
        let inner = Arc::new(Inner {
            chan: chan::make(1),
            stopped: Mutex::new(false),
        });

        let background = inner.clone();
        task::spawn(move || loop {
            time::sleep(dt);

            let stopped = background.stopped.lock().unwrap();
            if *stopped {
                return;
            }
            // Non-blocking send: a slow receiver drops ticks rather than
            // having them queue up.
            let mut select = Select::new();
            select.send(&background.chan, time::now());
            select.default();
            select.select();
        });

        Ticker { inner }
    }

    /// The channel this ticker delivers timestamps on.
    pub fn channel(&self) -> &Chan<f64> {
        &self.inner.chan
    }

    /// Stops the ticker. No further ticks are ever delivered after this
    /// returns, and the channel is guaranteed empty.
    pub fn stop(&self) {
        let mut stopped = self.inner.stopped.lock().unwrap();
        *stopped = true;
        drop(stopped);
        self.inner.chan.drain();
    }
}
