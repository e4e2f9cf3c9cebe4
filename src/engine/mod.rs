//! Control engine - drives the main and cue players from the control window

mod control;

pub use control::ControlEngine;

use futures::StreamExt;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::fader::DEFAULT_FADE_STEPS;
use crate::relay::RelayMessage;
use crate::surface::PlaybackState;
use crate::sync::SyncConfig;

/// Commands that can be sent to the control engine
#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// Show the overlay (fade out, pause) or hide it (unmute, play, fade in)
    ToggleOverlay,
    /// Play or pause the main player
    TogglePlay,
    /// Seek the main player by a relative amount of seconds
    SeekBy(f64),
    /// Load a different video on every surface
    LoadVideo { video_id: String, start_secs: f64 },
    /// Open the display window, or close it if open
    ToggleDisplayPopout,
    /// A relay message delivered to the control context from outside
    Relay(RelayMessage),
    /// Shutdown the engine
    Shutdown,
}

/// Status updates from the control engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineStatus {
    /// Overlay is up and the main player is fading out
    OverlayShown,
    /// Main player paused after the fade-out finished
    OverlayPaused,
    /// Overlay is down and the main player is fading in
    OverlayHidden,
    /// Main → cue correction loop running
    SyncStarted { session_id: Uuid },
    /// Main → cue correction loop stopped
    SyncStopped,
    /// A new video was loaded
    VideoLoaded { video_id: String },
    /// Display window was opened
    DisplayOpened,
    /// Display player announced itself
    DisplayReady,
    /// Display window is gone
    DisplayClosed,
    /// Latest state reported by the display
    DisplayState(PlaybackState),
    /// An error occurred
    Error(String),
}

/// Per-instance engine parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub sync: SyncConfig,
    pub fade_duration: Duration,
    pub fade_steps: u32,
    pub seek_back_secs: f64,
    pub seek_forward_secs: f64,
    pub state_push_interval: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            sync: SyncConfig::default(),
            fade_duration: Duration::from_secs(1),
            fade_steps: DEFAULT_FADE_STEPS,
            seek_back_secs: 5.0,
            seek_forward_secs: 15.0,
            state_push_interval: Duration::from_millis(500),
        }
    }
}

/// Create channels for engine communication
pub fn create_engine_channels() -> (
    mpsc::Sender<EngineCommand>,
    mpsc::Receiver<EngineCommand>,
    broadcast::Sender<EngineStatus>,
    broadcast::Receiver<EngineStatus>,
) {
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (status_tx, status_rx) = broadcast::channel(64);
    (cmd_tx, cmd_rx, status_tx, status_rx)
}

/// Status updates as a stream. Updates missed by a lagging receiver are skipped.
pub fn status_stream(
    rx: broadcast::Receiver<EngineStatus>,
) -> impl futures::Stream<Item = EngineStatus> {
    BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(status) => Some(status),
            Err(e) => {
                warn!("Status log fell behind: {}", e);
                None
            }
        }
    })
}

/// Log every status update until the engine's sender is gone
pub async fn log_statuses(rx: broadcast::Receiver<EngineStatus>) {
    let statuses = status_stream(rx);
    tokio::pin!(statuses);

    while let Some(status) = statuses.next().await {
        match status {
            EngineStatus::Error(message) => error!("Engine error: {}", message),
            EngineStatus::DisplayState(state) => debug!(
                "Display at {:.1}s ({})",
                state.current_time_seconds,
                if state.is_playing { "playing" } else { "paused" }
            ),
            other => info!("Engine status: {:?}", other),
        }
    }
}
