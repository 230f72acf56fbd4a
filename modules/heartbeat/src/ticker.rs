use std::time::Duration;

use anyhow::Context;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

struct Running {
    cancel: CancellationToken,
    done: oneshot::Receiver<()>,
}

/// A named task on the ambient tokio runtime calling `tick` every
/// `interval` until stopped.
#[derive(Default)]
pub(crate) struct Ticker {
    running: Mutex<Option<Running>>,
}

impl Ticker {
    pub(crate) fn start<F>(&self, name: &str, interval: Duration, mut tick: F) -> anyhow::Result<()>
    where
        F: FnMut() + Send + 'static,
    {
        let mut running = self.running.lock();
        if running.is_some() {
            anyhow::bail!("{name} is already running");
        }
        let handle = tokio::runtime::Handle::try_current()
            .with_context(|| format!("{name} needs a tokio runtime"))?;

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let (done_tx, done) = oneshot::channel();
        let name = name.to_owned();
        handle.spawn(async move {
            let mut ticks = time::interval_at(Instant::now() + interval, interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticks.tick() => tick(),
                }
            }
            tracing::debug!(ticker = %name, "ticker finished");
            let _ = done_tx.send(());
        });
        *running = Some(Running { cancel, done });
        Ok(())
    }

    /// Cancels the task and blocks until it has finished its last tick.
    /// Must not be called from async code.
    pub(crate) fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };
        running.cancel.cancel();
        if running.done.blocking_recv().is_err() {
            tracing::warn!("ticker task ended without finishing");
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }
}
