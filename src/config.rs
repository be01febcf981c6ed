//! Runtime-wide configuration.
//!
//! A small `#[non_exhaustive]` config struct with a `Default` impl. The
//! host scheduler and the "host-process teardown" signal are both external
//! collaborators this crate assumes rather than owns, so the only things
//! worth exposing are the name given to spawned threads and whether panics
//! raised after teardown has begun are swallowed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

/// Tunables for the runtime's default task launcher.
///
/// # Examples
///
/// ```
/// use relay::config::Config;
///
/// let cfg = Config {
///     thread_name_prefix: "worker",
///     ..Config::default()
/// };
/// relay::config::set(cfg);
/// ```
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct Config {
    /// Prefix used when naming the OS thread backing each spawned task.
    /// Threads are named `"{prefix}-{id}"`.
    pub thread_name_prefix: &'static str,

    /// Whether panics raised by a task after [`begin_teardown`] has been
    /// called are swallowed instead of propagated, to avoid noisy shutdown
    /// logs from daemon tasks still running when the host process exits.
    /// On hosts without a teardown signal this is simply never triggered.
    pub suppress_teardown_panics: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            thread_name_prefix: "relay",
            suppress_teardown_panics: true,
        }
    }
}

static CONFIG: OnceLock<Config> = OnceLock::new();
static TEARDOWN: AtomicBool = AtomicBool::new(false);

/// Installs the runtime configuration. Must be called, if at all, before
/// the first call to [`crate::spawn`]; later calls are ignored once the
/// config has been read.
pub fn set(config: Config) {
    let _ = CONFIG.set(config);
}

pub(crate) fn get() -> &'static Config {
    CONFIG.get_or_init(Config::default)
}

/// Signals that the host process has begun tearing down (e.g. `main` is
/// returning, or global destructors are running). After this call, panics
/// in tasks are handled according to [`Config::suppress_teardown_panics`].
pub fn begin_teardown() {
    TEARDOWN.store(true, Ordering::SeqCst);
}

pub(crate) fn is_tearing_down() -> bool {
    TEARDOWN.load(Ordering::SeqCst)
}
