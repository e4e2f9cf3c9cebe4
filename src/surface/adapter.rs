//! Uniform wrapper over an attached playback surface
//!
//! The adapter owns the "never crash a display" policy: when no surface is
//! attached, or the surface reports an error, the call is logged and
//! becomes a no-op that returns a neutral value.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::readiness::{ReadinessError, ReadinessGate};
use super::{
    clamp_volume, PlaybackState, PlaybackSurface, PlayerState, SurfaceError, SurfaceResult,
};
use crate::task::{Canceller, TaskHandle};

/// Named slot holding zero or one attached surface, plus the timers that
/// drive it: the fade that owns its volume and the sync session it takes
/// part in.
pub struct SurfaceAdapter {
    name: String,
    surface: RwLock<Option<Arc<dyn PlaybackSurface>>>,
    fade: Mutex<Option<TaskHandle>>,
    sync: Mutex<Option<Canceller>>,
}

impl std::fmt::Debug for SurfaceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceAdapter")
            .field("name", &self.name)
            .field("attached", &self.is_attached())
            .field("fading", &self.is_fading())
            .finish()
    }
}

impl SurfaceAdapter {
    /// Create an empty adapter
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            surface: RwLock::new(None),
            fade: Mutex::new(None),
            sync: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach a surface. Readiness is validated here, once.
    pub fn attach(&self, surface: Arc<dyn PlaybackSurface>) -> SurfaceResult<()> {
        if !surface.is_ready() {
            warn!("Refusing to attach {} surface: player not ready", self.name);
            return Err(SurfaceError::NotReady);
        }

        self.cancel_timers();
        *self.surface.write().unwrap_or_else(|e| e.into_inner()) = Some(surface);
        info!("Attached {} surface", self.name);
        Ok(())
    }

    /// Wait for the player API to come up, then attach.
    ///
    /// A timeout leaves the adapter detached; every call stays a no-op.
    pub async fn attach_when_ready(
        &self,
        surface: Arc<dyn PlaybackSurface>,
        gate: &ReadinessGate,
        timeout: Duration,
    ) -> Result<(), ReadinessError> {
        gate.wait(timeout).await?;
        if let Err(e) = self.attach(surface) {
            warn!("{} surface signalled ready but could not attach: {}", self.name, e);
        }
        Ok(())
    }

    /// Detach the surface. The running fade and the sync session are
    /// cancelled first, so no timer can fire against the released reference.
    pub fn detach(&self) -> Option<Arc<dyn PlaybackSurface>> {
        self.cancel_timers();
        let previous = self.surface.write().unwrap_or_else(|e| e.into_inner()).take();
        if previous.is_some() {
            info!("Detached {} surface", self.name);
        }
        previous
    }

    pub fn is_attached(&self) -> bool {
        self.surface.read().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    /// The raw attached surface, for controllers that handle errors themselves
    pub fn surface(&self) -> Option<Arc<dyn PlaybackSurface>> {
        self.surface.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn current_time(&self) -> f64 {
        self.with_surface("getCurrentTime", 0.0, |s| s.current_time())
    }

    pub fn seek_to(&self, seconds: f64, allow_seek_ahead: bool) {
        self.with_surface("seekTo", (), |s| s.seek_to(seconds.max(0.0), allow_seek_ahead))
    }

    pub fn play(&self) {
        self.with_surface("play", (), |s| s.play())
    }

    pub fn pause(&self) {
        self.with_surface("pause", (), |s| s.pause())
    }

    pub fn player_state(&self) -> PlayerState {
        self.with_surface("getPlayerState", PlayerState::Unstarted, |s| s.player_state())
    }

    pub fn volume(&self) -> f64 {
        self.with_surface("getVolume", 0.0, |s| s.volume())
    }

    /// Set the volume directly. A fade in progress gives up ownership of
    /// the volume and is cancelled.
    pub fn set_volume(&self, volume: f64) {
        if self.cancel_fade() {
            debug!("Direct volume write on {} cancelled a running fade", self.name);
        }
        self.with_surface("setVolume", (), |s| s.set_volume(clamp_volume(volume)))
    }

    pub fn is_muted(&self) -> bool {
        self.with_surface("isMuted", false, |s| s.is_muted())
    }

    pub fn mute(&self) {
        self.with_surface("mute", (), |s| s.mute())
    }

    pub fn un_mute(&self) {
        self.with_surface("unMute", (), |s| s.un_mute())
    }

    pub fn load_video(&self, video_id: &str, start_seconds: f64) {
        self.cancel_fade();
        self.with_surface("loadVideoById", (), |s| {
            s.load_video(video_id, start_seconds.max(0.0))
        })
    }

    pub fn video_id(&self) -> Option<String> {
        self.with_surface("getVideoId", None, |s| s.video_id().map(Some))
    }

    /// Snapshot of the attached surface, if it can be read
    pub fn snapshot(&self) -> Option<PlaybackState> {
        self.with_surface("snapshot", None, |s| PlaybackState::capture(s).map(Some))
    }

    /// Whether a fade currently owns this surface's volume
    pub fn is_fading(&self) -> bool {
        self.fade
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(TaskHandle::is_active)
            .unwrap_or(false)
    }

    /// Cancel the running fade. Returns true if one was still active.
    pub fn cancel_fade(&self) -> bool {
        let previous = self.fade.lock().unwrap_or_else(|e| e.into_inner()).take();
        match previous {
            Some(handle) => {
                let was_active = handle.is_active();
                handle.cancel();
                was_active
            }
            None => false,
        }
    }

    /// Record the sync session driving this surface, replacing any earlier
    /// one. `detach` and `attach` cancel it.
    pub fn bind_sync(&self, session: Option<Canceller>) {
        *self.sync.lock().unwrap_or_else(|e| e.into_inner()) = session;
    }

    fn cancel_timers(&self) {
        self.cancel_fade();
        let session = self.sync.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(session) = session {
            if !session.is_cancelled() {
                debug!("Sync session on {} cancelled with its surface", self.name);
            }
            session.cancel();
        }
    }

    /// Hand volume ownership to a new fade. `start` runs with the slot
    /// locked, after the previous fade has been cancelled.
    pub(crate) fn replace_fade(
        &self,
        start: impl FnOnce(&Arc<dyn PlaybackSurface>) -> Option<TaskHandle>,
    ) -> bool {
        let mut slot = self.fade.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = slot.take() {
            if previous.is_active() {
                debug!("New fade on {} supersedes the running one", self.name);
            }
            previous.cancel();
        }

        let Some(surface) = self.surface() else {
            debug!("fade on {} skipped: no surface attached", self.name);
            return false;
        };

        *slot = start(&surface);
        true
    }

    fn with_surface<T>(
        &self,
        op: &str,
        fallback: T,
        call: impl FnOnce(&dyn PlaybackSurface) -> SurfaceResult<T>,
    ) -> T {
        let Some(surface) = self.surface() else {
            debug!("{} on {} ignored: no surface attached", op, self.name);
            return fallback;
        };

        match call(surface.as_ref()) {
            Ok(value) => value,
            Err(e) => {
                warn!("{} on {} failed: {}", op, self.name, e);
                fallback
            }
        }
    }
}
