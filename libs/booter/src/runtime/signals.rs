//! Single-waiter rendezvous between OS signals and in-process notifiers.

use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::signal;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Terminate,
}

type Slot = Arc<Mutex<Option<mpsc::Sender<Signal>>>>;

/// Cloneable handle that wakes the pending [`wait_signal`] from any thread.
#[derive(Clone, Default)]
pub struct SignalNotifier {
    slot: Slot,
}

impl std::fmt::Debug for SignalNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalNotifier")
            .field("waiting", &self.slot.lock().is_some())
            .finish()
    }
}

impl SignalNotifier {
    /// Sends a synthetic interrupt. Returns `false` when nobody is waiting,
    /// in which case the signal is dropped.
    pub fn notify(&self) -> bool {
        self.send(Signal::Interrupt)
    }

    pub fn send(&self, sig: Signal) -> bool {
        match self.slot.lock().as_ref() {
            Some(tx) => tx.try_send(sig).is_ok(),
            None => false,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.slot.lock().is_some()
    }
}

/// Clears the slot when the wait ends, cancelled or not.
struct Registration {
    slot: Slot,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.slot.lock().take();
    }
}

/// Blocks until Ctrl+C, SIGTERM (Unix) or a notifier delivers a signal.
pub async fn wait_signal(notifier: &SignalNotifier) -> io::Result<Signal> {
    let (tx, mut rx) = mpsc::channel(1);
    *notifier.slot.lock() = Some(tx);
    let _registration = Registration {
        slot: notifier.slot.clone(),
    };

    #[cfg(unix)]
    let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate()).map_err(|e| {
        tracing::error!(%e, "Failed to install SIGTERM handler");
        e
    })?;

    #[cfg(unix)]
    let terminated = terminate.recv();
    #[cfg(not(unix))]
    let terminated = std::future::pending::<Option<()>>();

    let sig = tokio::select! {
        result = signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(%e, "Failed to install Ctrl+C handler");
                return Err(e);
            }
            tracing::info!("Received Ctrl+C signal");
            Signal::Interrupt
        },
        _ = terminated => {
            tracing::info!("Received SIGTERM signal");
            Signal::Terminate
        },
        Some(sig) = rx.recv() => {
            tracing::info!(signal = ?sig, "Received in-process signal");
            sig
        },
    };
    Ok(sig)
}
