//! Playback surfaces
//!
//! A playback surface is an embedded video player we do not own. The
//! [`PlaybackSurface`] trait is the fixed capability set every concrete
//! player binding must provide; [`SurfaceAdapter`] wraps one with the
//! "never crash a display" policy.

mod adapter;
pub mod readiness;
mod simulated;

pub use adapter::SurfaceAdapter;
pub use readiness::{readiness, ReadinessError, ReadinessGate, ReadySignal};
pub use simulated::{SimulatedSurface, SurfaceCall};

use serde::{Deserialize, Serialize};

/// Lowest accepted volume
pub const MIN_VOLUME: f64 = 0.0;
/// Highest accepted volume
pub const MAX_VOLUME: f64 = 100.0;

/// Player state as reported by the embedded player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayerState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

impl PlayerState {
    /// Map the numeric state codes used by embeddable web players
    /// (-1 unstarted, 0 ended, 1 playing, 2 paused, 3 buffering, 5 cued).
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(Self::Unstarted),
            0 => Some(Self::Ended),
            1 => Some(Self::Playing),
            2 => Some(Self::Paused),
            3 => Some(Self::Buffering),
            5 => Some(Self::Cued),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Unstarted => -1,
            Self::Ended => 0,
            Self::Playing => 1,
            Self::Paused => 2,
            Self::Buffering => 3,
            Self::Cued => 5,
        }
    }
}

/// Errors a surface binding can report
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SurfaceError {
    #[error("surface is not attached")]
    Unavailable,

    #[error("surface is not ready")]
    NotReady,

    #[error("surface has been disposed")]
    Disposed,

    #[error("player error: {0}")]
    Player(String),
}

pub type SurfaceResult<T> = std::result::Result<T, SurfaceError>;

/// Capability set of an embedded player.
///
/// All calls are synchronous. Implementations report failures instead of
/// panicking; callers decide whether to swallow them.
pub trait PlaybackSurface: Send + Sync {
    /// Video currently loaded
    fn video_id(&self) -> SurfaceResult<String>;

    /// Current playback position in seconds
    fn current_time(&self) -> SurfaceResult<f64>;

    /// Seek to `seconds`. `allow_seek_ahead` lets the player fetch data
    /// beyond what is buffered.
    fn seek_to(&self, seconds: f64, allow_seek_ahead: bool) -> SurfaceResult<()>;

    fn play(&self) -> SurfaceResult<()>;

    fn pause(&self) -> SurfaceResult<()>;

    fn player_state(&self) -> SurfaceResult<PlayerState>;

    /// Volume in the range 0..=100
    fn volume(&self) -> SurfaceResult<f64>;

    fn set_volume(&self, volume: f64) -> SurfaceResult<()>;

    fn is_muted(&self) -> SurfaceResult<bool>;

    fn mute(&self) -> SurfaceResult<()>;

    fn un_mute(&self) -> SurfaceResult<()>;

    /// Replace the loaded video and start it at `start_seconds`
    fn load_video(&self, video_id: &str, start_seconds: f64) -> SurfaceResult<()>;

    /// Whether the player finished initializing. Checked once on attach.
    fn is_ready(&self) -> bool {
        true
    }
}

/// Read-only snapshot of a surface.
///
/// Field names are part of the cross-window wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub is_playing: bool,
    pub current_time_seconds: f64,
    pub volume: f64,
    pub muted: bool,
    pub video_id: String,
}

impl PlaybackState {
    /// Sample every field of `surface`. Fails on the first failing read.
    pub fn capture(surface: &dyn PlaybackSurface) -> SurfaceResult<Self> {
        Ok(Self {
            is_playing: surface.player_state()? == PlayerState::Playing,
            current_time_seconds: surface.current_time()?.max(0.0),
            volume: clamp_volume(surface.volume()?),
            muted: surface.is_muted()?,
            video_id: surface.video_id()?,
        })
    }

    /// The player state this snapshot implies
    pub fn player_state(&self) -> PlayerState {
        if self.is_playing {
            PlayerState::Playing
        } else {
            PlayerState::Paused
        }
    }
}

/// Clamp a volume into 0..=100. NaN becomes 0.
pub fn clamp_volume(volume: f64) -> f64 {
    if volume.is_nan() {
        return MIN_VOLUME;
    }
    volume.clamp(MIN_VOLUME, MAX_VOLUME)
}
