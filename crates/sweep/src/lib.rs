//! Two independent periodic background loops that keep a running engine
//! tidy: the TTL sweeper purges expired items, the stream sweeper trims
//! change records past their retention window (§4.6, §4.7's "the TTL
//! sweeper"/"the stream sweeper" housekeeping rows).
//!
//! Each sweeper runs on its own `tokio` task, woken on a fixed interval, and
//! stops on a graceful 30-second drain (the in-flight pass is allowed to
//! finish) before being force-aborted, the same shutdown shape as
//! `estuary-flow`'s `crates/agent/src/main.rs` giving its runtime a bounded
//! `shutdown_timeout` rather than blocking forever.

pub mod stream;
pub mod ttl;

use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const GRACEFUL_DRAIN: Duration = Duration::from_secs(30);

/// A running sweeper task. Dropping this without calling `stop` leaves the
/// task running detached; `stop` is the intended shutdown path.
pub struct SweeperHandle {
    name: &'static str,
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
}

impl SweeperHandle {
    fn new(name: &'static str, shutdown: oneshot::Sender<()>, join: JoinHandle<()>) -> Self {
        Self { name, shutdown: Some(shutdown), join }
    }

    /// Signals the sweeper to stop after its current pass, then waits up to
    /// 30 seconds for it to exit before aborting the task outright.
    /// Idempotent: calling `stop` on a handle whose task has already exited
    /// (or whose shutdown signal was already sent) is a no-op rather than an
    /// error.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            // The receiver may already be gone if the task exited on its own;
            // that's not a failure condition for a graceful stop.
            let _ = shutdown.send(());
        }

        tokio::select! {
            result = &mut self.join => {
                if let Err(err) = result {
                    if err.is_panic() {
                        tracing::warn!(sweeper = self.name, "sweeper task panicked");
                    }
                }
            }
            _ = tokio::time::sleep(GRACEFUL_DRAIN) => {
                tracing::warn!(sweeper = self.name, "sweeper did not drain within 30s, aborting");
                self.join.abort();
            }
        }
    }
}
