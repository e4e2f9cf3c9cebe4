//! Readiness of an external player API
//!
//! Embedded players load their scripting API asynchronously. Instead of
//! polling, the loader holds a [`ReadySignal`] and resolves it exactly once;
//! anyone who needs the player awaits a [`ReadinessGate`] with a timeout.

use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReadinessError {
    #[error("player was not ready after {0:?}")]
    TimedOut(Duration),

    #[error("player loader went away before becoming ready")]
    Abandoned,
}

/// Resolving side. Consumed by `resolve`, so readiness is announced once.
#[derive(Debug)]
pub struct ReadySignal {
    tx: watch::Sender<bool>,
}

/// Waiting side. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    rx: watch::Receiver<bool>,
}

/// Create a connected signal/gate pair
pub fn readiness() -> (ReadySignal, ReadinessGate) {
    let (tx, rx) = watch::channel(false);
    (ReadySignal { tx }, ReadinessGate { rx })
}

impl ReadySignal {
    pub fn resolve(self) {
        self.tx.send_replace(true);
    }
}

impl ReadinessGate {
    /// A gate that is already resolved
    pub fn ready() -> Self {
        let (signal, gate) = readiness();
        signal.resolve();
        gate
    }

    pub fn is_ready(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until ready or until `timeout` elapses
    pub async fn wait(&self, timeout: Duration) -> Result<(), ReadinessError> {
        let mut rx = self.rx.clone();
        let result = match tokio::time::timeout(timeout, rx.wait_for(|ready| *ready)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(ReadinessError::Abandoned),
            Err(_) => Err(ReadinessError::TimedOut(timeout)),
        };
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_pending_waiter_sees_resolution() {
        let (signal, gate) = readiness();
        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait(Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(200)).await;
        signal.resolve();

        assert_eq!(waiter.await.unwrap(), Ok(()));
        assert!(gate.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_waiter_resolves_immediately() {
        let (signal, gate) = readiness();
        signal.resolve();
        assert_eq!(gate.wait(Duration::from_millis(1)).await, Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let (_signal, gate) = readiness();
        let result = gate.wait(Duration::from_secs(2)).await;
        assert_eq!(result, Err(ReadinessError::TimedOut(Duration::from_secs(2))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_signal_abandons() {
        let (signal, gate) = readiness();
        drop(signal);
        assert_eq!(
            gate.wait(Duration::from_secs(2)).await,
            Err(ReadinessError::Abandoned)
        );
    }
}
