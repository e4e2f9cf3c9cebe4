//! Cancellable timer tasks
//!
//! Fades and sync loops run as Tokio tasks owned by a [`TaskHandle`].
//! Cancelling the handle is synchronous: once `cancel()` returns, no step
//! guarded by the task's [`CancelGate`] is running or will run again, on
//! any worker thread.

use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Lock shared between a task body and its handle.
///
/// Each timer step runs while holding the lock, and `close()` takes the same
/// lock, so a close can never interleave with a step that is mid-write.
#[derive(Debug, Clone)]
pub struct CancelGate {
    open: Arc<Mutex<bool>>,
}

impl CancelGate {
    fn new() -> Self {
        Self {
            open: Arc::new(Mutex::new(true)),
        }
    }

    /// Run one step if the gate is still open.
    ///
    /// Returns `None` when the task was cancelled. `step` must not call back
    /// into the handle that owns this gate.
    pub fn run<T>(&self, step: impl FnOnce() -> T) -> Option<T> {
        let guard = self.open.lock().unwrap_or_else(|e| e.into_inner());
        if !*guard {
            return None;
        }
        Some(step())
    }

    /// Run the last step and close the gate in the same critical section.
    ///
    /// A cancel arriving after this point finds the task already complete.
    pub fn run_final<T>(&self, step: impl FnOnce() -> T) -> Option<T> {
        let mut guard = self.open.lock().unwrap_or_else(|e| e.into_inner());
        if !*guard {
            return None;
        }
        let out = step();
        *guard = false;
        Some(out)
    }

    pub fn is_open(&self) -> bool {
        *self.open.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn close(&self) {
        *self.open.lock().unwrap_or_else(|e| e.into_inner()) = false;
    }
}

/// Cancels a task without owning it.
///
/// Lets a resource the task writes to stop the task before letting go of
/// itself. Cancelling has the same guarantee as [`TaskHandle::cancel`].
#[derive(Debug, Clone)]
pub struct Canceller {
    name: &'static str,
    gate: CancelGate,
    token: CancellationToken,
}

impl Canceller {
    pub fn cancel(&self) {
        if self.token.is_cancelled() {
            return;
        }
        self.gate.close();
        self.token.cancel();
        debug!("Cancelled {} task", self.name);
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Owner of a spawned timer task. Dropping the handle cancels the task.
#[derive(Debug)]
pub struct TaskHandle {
    name: &'static str,
    gate: CancelGate,
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl TaskHandle {
    /// Spawn `body` on the current Tokio runtime.
    ///
    /// The body receives the gate it must wrap each of its steps in.
    /// Must be called from within a Tokio runtime.
    pub fn spawn<F, Fut>(name: &'static str, body: F) -> Self
    where
        F: FnOnce(CancelGate) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let gate = CancelGate::new();
        let token = CancellationToken::new();
        let task = body(gate.clone());
        let child = token.clone();

        let join = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = child.cancelled() => {}
                _ = task => {}
            }
        });

        Self {
            name,
            gate,
            token,
            join,
        }
    }

    /// Cancel the task. No guarded step runs after this returns.
    pub fn cancel(&self) {
        self.canceller().cancel();
        self.join.abort();
    }

    /// A cloneable cancel switch for this task
    pub fn canceller(&self) -> Canceller {
        Canceller {
            name: self.name,
            gate: self.gate.clone(),
            token: self.token.clone(),
        }
    }

    /// Whether the task is still able to run steps.
    pub fn is_active(&self) -> bool {
        self.gate.is_open() && !self.token.is_cancelled() && !self.join.is_finished()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn counting_task(counter: Arc<AtomicU32>) -> TaskHandle {
        TaskHandle::spawn("counter", move |gate| async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(10));
            loop {
                ticker.tick().await;
                if gate
                    .run(|| counter.fetch_add(1, Ordering::SeqCst))
                    .is_none()
                {
                    return;
                }
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_further_steps() {
        let counter = Arc::new(AtomicU32::new(0));
        let handle = counting_task(counter.clone());

        tokio::time::sleep(Duration::from_millis(35)).await;
        assert!(handle.is_active());
        handle.cancel();
        let seen = counter.load(Ordering::SeqCst);
        assert!(seen > 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), seen);
        assert!(!handle.is_active());
        assert!(handle.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let counter = Arc::new(AtomicU32::new(0));
        let handle = counting_task(counter.clone());
        tokio::time::sleep(Duration::from_millis(25)).await;
        drop(handle);
        let seen = counter.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_canceller_stops_task_it_does_not_own() {
        let counter = Arc::new(AtomicU32::new(0));
        let handle = counting_task(counter.clone());
        let canceller = handle.canceller();

        tokio::time::sleep(Duration::from_millis(25)).await;
        canceller.cancel();
        let seen = counter.load(Ordering::SeqCst);
        assert!(!handle.is_active());
        assert!(handle.is_cancelled());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(counter.load(Ordering::SeqCst), seen);
    }

    #[test]
    fn test_run_final_closes_gate() {
        let gate = CancelGate::new();
        assert_eq!(gate.run(|| 1), Some(1));
        assert_eq!(gate.run_final(|| 2), Some(2));
        assert!(!gate.is_open());
        assert_eq!(gate.run(|| 3), None);
    }
}
