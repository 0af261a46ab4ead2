use crate::error::TriageError;
use std::future::Future;
use tokio::sync::watch;
use tracing::warn;

/// Counts Ctrl-C presses for the lifetime of the process.
///
/// The listener is installed once and keeps counting while nothing is waiting, so a press
/// during a network call is still seen by the next `guard` or `pressed`.
#[derive(Clone)]
pub struct Interrupt {
    presses: watch::Receiver<u64>,
}

impl Interrupt {
    /// Claims SIGINT. From here on Ctrl-C no longer terminates the process.
    pub fn ctrl_c() -> Self {
        let (tx, presses) = watch::channel(0);
        tokio::spawn(async move {
            loop {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    warn!("Unable to listen for Ctrl-C: {}", err);
                    // Keep the sender alive so waiters stay pending instead of firing
                    std::future::pending::<()>().await;
                }
                tx.send_modify(|n| *n += 1);
            }
        });

        Self { presses }
    }

    /// Interrupt fired by hand through the returned sender
    #[cfg(test)]
    pub fn manual() -> (watch::Sender<u64>, Self) {
        let (tx, presses) = watch::channel(0);
        (tx, Self { presses })
    }

    /// Resolves on the next press not yet observed. Never resolves once the listener is gone.
    pub async fn pressed(&mut self) {
        if self.presses.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Runs `task` unless Ctrl-C arrives first, in which case the task is dropped
    pub async fn guard<T, F>(&mut self, task: F) -> Result<T, TriageError>
    where
        F: Future<Output = Result<T, TriageError>>,
    {
        tokio::select! {
            result = task => result,
            _ = self.pressed() => Err(TriageError::Interrupted),
        }
    }
}
