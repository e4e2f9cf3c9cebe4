//! Player synchronization - keeps a secondary surface locked to a primary

mod correction;
mod session;

pub use correction::{sync_once, Correction, Sample, Transport};
pub use session::{SyncLoop, SyncSession};

use std::time::Duration;

/// Drift allowed before the secondary is seeked
pub const DEFAULT_DRIFT_TOLERANCE_SECS: f64 = 0.5;
/// Period of the correction loop
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(500);

/// Sync loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Waiting for a primary and a secondary surface
    Idle,
    /// A session is correcting the secondary
    Syncing,
}

/// Per-instance sync parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncConfig {
    pub drift_tolerance_secs: f64,
    pub tick_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            drift_tolerance_secs: DEFAULT_DRIFT_TOLERANCE_SECS,
            tick_interval: DEFAULT_TICK_INTERVAL,
        }
    }
}
