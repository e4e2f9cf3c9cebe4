//! Sync loop lifecycle
//!
//! A [`SyncLoop`] watches for a primary and a secondary surface. Once both are
//! present it runs exactly one [`SyncSession`], a periodic task correcting the
//! secondary. Removing either surface cancels the session before the
//! reference is released.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use super::correction::sync_once;
use super::{SyncConfig, SyncState};
use crate::surface::PlaybackSurface;
use crate::task::{Canceller, TaskHandle};

/// One running correction task for a (primary, secondary) pair
#[derive(Debug)]
pub struct SyncSession {
    id: Uuid,
    drift_tolerance: f64,
    handle: TaskHandle,
}

impl SyncSession {
    fn start(
        primary: Arc<dyn PlaybackSurface>,
        secondary: Arc<dyn PlaybackSurface>,
        config: SyncConfig,
    ) -> Self {
        let id = Uuid::new_v4();
        let drift_tolerance = config.drift_tolerance_secs;
        let period = config.tick_interval.max(Duration::from_millis(1));

        let handle = TaskHandle::spawn("sync", move |gate| async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let outcome = gate.run(|| {
                    sync_once(primary.as_ref(), secondary.as_ref(), drift_tolerance)
                });
                match outcome {
                    None => return,
                    Some(Ok(correction)) if !correction.is_empty() => {
                        debug!("Sync {} corrected secondary: {:?}", id, correction);
                    }
                    Some(Ok(_)) => trace!("Sync {} in tolerance", id),
                    Some(Err(e)) => warn!("Sync {} tick skipped: {}", id, e),
                }
            }
        });

        info!(
            "Sync session {} started (tolerance {:.2}s, every {:?})",
            id, drift_tolerance, period
        );

        Self {
            id,
            drift_tolerance,
            handle,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn drift_tolerance(&self) -> f64 {
        self.drift_tolerance
    }

    /// Switch that stops this session from outside the loop
    pub fn canceller(&self) -> Canceller {
        self.handle.canceller()
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_active()
    }

    fn cancel(self) {
        self.handle.cancel();
        info!("Sync session {} stopped", self.id);
    }
}

/// Owner of the primary/secondary references and the active session
pub struct SyncLoop {
    config: SyncConfig,
    primary: Option<Arc<dyn PlaybackSurface>>,
    secondary: Option<Arc<dyn PlaybackSurface>>,
    session: Option<SyncSession>,
}

impl std::fmt::Debug for SyncLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncLoop")
            .field("config", &self.config)
            .field("has_primary", &self.primary.is_some())
            .field("has_secondary", &self.secondary.is_some())
            .field("session", &self.session.as_ref().map(SyncSession::id))
            .finish()
    }
}

impl SyncLoop {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            primary: None,
            secondary: None,
            session: None,
        }
    }

    /// `Idle` also covers a session cancelled through its [`Canceller`]
    pub fn state(&self) -> SyncState {
        match &self.session {
            Some(session) if session.is_active() => SyncState::Syncing,
            _ => SyncState::Idle,
        }
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(SyncSession::id)
    }

    pub fn config(&self) -> SyncConfig {
        self.config
    }

    /// Cancel switch for the running session, for surfaces to hold on to
    pub fn session_canceller(&self) -> Option<Canceller> {
        self.session.as_ref().map(SyncSession::canceller)
    }

    /// Set or clear the authoritative surface
    pub fn set_primary(&mut self, primary: Option<Arc<dyn PlaybackSurface>>) {
        self.stop_session();
        self.primary = primary;
        self.reconcile();
    }

    /// Set or clear the follower surface. Replacing it cancels the previous
    /// session first, so two loops never drive the same secondary.
    pub fn set_secondary(&mut self, secondary: Option<Arc<dyn PlaybackSurface>>) {
        self.stop_session();
        self.secondary = secondary;
        self.reconcile();
    }

    /// Change tolerance or period; restarts a running session
    pub fn reconfigure(&mut self, config: SyncConfig) {
        self.config = config;
        if self.session.is_some() {
            self.stop_session();
            self.reconcile();
        }
    }

    /// Drop both references and return to idle
    pub fn shutdown(&mut self) {
        self.stop_session();
        self.primary = None;
        self.secondary = None;
    }

    fn reconcile(&mut self) {
        if self.session.is_some() {
            return;
        }
        match (&self.primary, &self.secondary) {
            (Some(primary), Some(secondary)) => {
                self.session = Some(SyncSession::start(
                    primary.clone(),
                    secondary.clone(),
                    self.config,
                ));
            }
            _ => debug!("Sync idle: waiting for both surfaces"),
        }
    }

    fn stop_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.cancel();
        }
    }
}

impl Drop for SyncLoop {
    fn drop(&mut self) {
        self.stop_session();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{PlayerState, SimulatedSurface, SurfaceCall};

    fn pair() -> (Arc<SimulatedSurface>, Arc<SimulatedSurface>) {
        (
            Arc::new(SimulatedSurface::new("vid", 600.0)),
            Arc::new(SimulatedSurface::new("vid", 600.0)),
        )
    }

    fn seeks(surface: &SimulatedSurface) -> usize {
        surface
            .calls()
            .iter()
            .filter(|c| matches!(c, SurfaceCall::Seek { .. }))
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_only_when_both_present() {
        let (primary, secondary) = pair();
        let mut sync = SyncLoop::new(SyncConfig::default());

        sync.set_secondary(Some(secondary.clone()));
        assert_eq!(sync.state(), SyncState::Idle);

        sync.set_primary(Some(primary.clone()));
        assert_eq!(sync.state(), SyncState::Syncing);

        sync.set_primary(None);
        assert_eq!(sync.state(), SyncState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_corrects_drifted_paused_secondary() {
        let (primary, secondary) = pair();
        primary.pause().unwrap();
        primary.clear_calls();
        let mut sync = SyncLoop::new(SyncConfig::default());
        sync.set_primary(Some(primary.clone()));
        sync.set_secondary(Some(secondary.clone()));

        primary.force(10.0, PlayerState::Playing);
        secondary.force(8.9, PlayerState::Paused);
        tokio::time::sleep(Duration::from_millis(510)).await;

        let calls = secondary.calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(
            calls[0],
            SurfaceCall::Seek {
                allow_seek_ahead: true,
                ..
            }
        ));
        assert_eq!(calls[1], SurfaceCall::Play);
        assert!(primary.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_tolerance_never_seeks() {
        let (primary, secondary) = pair();
        primary.force(20.0, PlayerState::Playing);
        secondary.force(20.3, PlayerState::Playing);

        let mut sync = SyncLoop::new(SyncConfig::default());
        sync.set_primary(Some(primary.clone()));
        sync.set_secondary(Some(secondary.clone()));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(seeks(&secondary), 0);
        assert!(secondary.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_tick_keeps_looping() {
        let (primary, secondary) = pair();
        primary.force(40.0, PlayerState::Playing);
        secondary.force(0.0, PlayerState::Playing);
        secondary.set_failing(true);

        let mut sync = SyncLoop::new(SyncConfig::default());
        sync.set_primary(Some(primary.clone()));
        sync.set_secondary(Some(secondary.clone()));

        tokio::time::sleep(Duration::from_millis(1600)).await;
        assert_eq!(sync.state(), SyncState::Syncing);

        secondary.set_failing(false);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(seeks(&secondary), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_stops_corrections() {
        let (primary, secondary) = pair();
        primary.force(100.0, PlayerState::Playing);
        secondary.force(0.0, PlayerState::Paused);

        let mut sync = SyncLoop::new(SyncConfig::default());
        sync.set_primary(Some(primary.clone()));
        sync.set_secondary(Some(secondary.clone()));
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(!secondary.calls().is_empty());

        sync.set_secondary(None);
        secondary.clear_calls();
        secondary.force(0.0, PlayerState::Paused);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(secondary.calls().is_empty());
        assert_eq!(sync.state(), SyncState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_cancel_goes_idle() {
        let (primary, secondary) = pair();
        primary.force(30.0, PlayerState::Playing);

        let mut sync = SyncLoop::new(SyncConfig::default());
        sync.set_primary(Some(primary.clone()));
        sync.set_secondary(Some(secondary.clone()));
        sync.session_canceller().unwrap().cancel();
        assert_eq!(sync.state(), SyncState::Idle);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(secondary.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replacing_secondary_runs_one_session() {
        let (primary, first) = pair();
        let second = Arc::new(SimulatedSurface::new("vid", 600.0));
        primary.force(50.0, PlayerState::Playing);

        let mut sync = SyncLoop::new(SyncConfig::default());
        sync.set_primary(Some(primary.clone()));
        sync.set_secondary(Some(first.clone()));
        let first_session = sync.session_id();

        sync.set_secondary(Some(second.clone()));
        assert_ne!(sync.session_id(), first_session);

        tokio::time::sleep(Duration::from_millis(510)).await;
        assert!(first.calls().is_empty());
        assert_eq!(seeks(&second), 1);
    }
}
