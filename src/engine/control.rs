//! Control engine
//!
//! Owns the main and cue players of the control window. The cue player is
//! kept locked to the main player by a [`SyncLoop`]; the display window is
//! fed state pushes and remote commands over the relay. Overlay toggles use
//! fades so the audio never cuts abruptly.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{EngineCommand, EngineSettings, EngineStatus};
use crate::display::WindowHost;
use crate::fader::Fader;
use crate::relay::{Command, ContextRole, Inbox, PlayerCommand, Relay, RelayMessage};
use crate::surface::{PlaybackSurface, PlayerState, SurfaceAdapter, SurfaceResult, MAX_VOLUME};
use crate::sync::SyncLoop;

/// Completion of an overlay fade, posted back into the engine loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FadeEvent {
    FadedOut,
    FadedIn,
}

/// The control engine coordinates both control-side players and the display
pub struct ControlEngine {
    settings: EngineSettings,
    main: Arc<SurfaceAdapter>,
    cue: Arc<SurfaceAdapter>,
    sync: SyncLoop,
    fader: Fader,
    relay: Relay,
    host: Box<dyn WindowHost>,
    /// Command receiver
    cmd_rx: mpsc::Receiver<EngineCommand>,
    /// Status broadcaster
    status_tx: broadcast::Sender<EngineStatus>,
    /// Messages relayed to the control window
    inbox: Inbox,
    fade_tx: mpsc::UnboundedSender<FadeEvent>,
    fade_rx: mpsc::UnboundedReceiver<FadeEvent>,
    overlay_visible: bool,
    /// Main player volume to return to when the overlay is hidden
    restore_volume: f64,
    display_ready: bool,
}

impl ControlEngine {
    /// Create a new control engine and register the control window
    pub fn new(
        settings: EngineSettings,
        relay: Relay,
        host: Box<dyn WindowHost>,
        cmd_rx: mpsc::Receiver<EngineCommand>,
        status_tx: broadcast::Sender<EngineStatus>,
    ) -> Self {
        let inbox = relay.registry().on_window_opened(ContextRole::Control);
        let (fade_tx, fade_rx) = mpsc::unbounded_channel();

        Self {
            settings,
            main: SurfaceAdapter::new("main"),
            cue: SurfaceAdapter::new("cue"),
            sync: SyncLoop::new(settings.sync),
            fader: Fader::new(settings.fade_steps),
            relay,
            host,
            cmd_rx,
            status_tx,
            inbox,
            fade_tx,
            fade_rx,
            overlay_visible: false,
            restore_volume: MAX_VOLUME,
            display_ready: false,
        }
    }

    pub fn main(&self) -> &Arc<SurfaceAdapter> {
        &self.main
    }

    pub fn cue(&self) -> &Arc<SurfaceAdapter> {
        &self.cue
    }

    pub fn overlay_visible(&self) -> bool {
        self.overlay_visible
    }

    /// Attach the main player. Sync starts once the cue player is present too.
    pub fn attach_main(&mut self, surface: Arc<dyn PlaybackSurface>) -> SurfaceResult<()> {
        self.main.attach(surface)?;
        let before = self.sync.session_id();
        self.sync.set_primary(self.main.surface());
        self.sync_changed(before);
        Ok(())
    }

    /// Attach the cue player. Sync starts once the main player is present too.
    pub fn attach_cue(&mut self, surface: Arc<dyn PlaybackSurface>) -> SurfaceResult<()> {
        self.cue.attach(surface)?;
        let before = self.sync.session_id();
        self.sync.set_secondary(self.cue.surface());
        self.sync_changed(before);
        Ok(())
    }

    /// Tear down the main player: timers first, then the reference
    pub fn detach_main(&mut self) {
        let before = self.sync.session_id();
        self.sync.set_primary(None);
        self.main.detach();
        self.sync_changed(before);
    }

    /// Tear down the cue player: timers first, then the reference
    pub fn detach_cue(&mut self) {
        let before = self.sync.session_id();
        self.sync.set_secondary(None);
        self.cue.detach();
        self.sync_changed(before);
    }

    /// Run the engine main loop
    pub async fn run(&mut self) -> Result<()> {
        info!("Control engine starting");

        let period = self.settings.state_push_interval;
        let mut push_timer = tokio::time::interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                // Handle commands
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(EngineCommand::Shutdown) | None => {
                            info!("Shutdown command received");
                            break;
                        }
                        Some(cmd) => self.handle_command(cmd),
                    }
                }

                // Messages relayed from the display window
                Some(message) = self.inbox.recv() => {
                    self.handle_message(message);
                }

                Some(event) = self.fade_rx.recv() => {
                    self.handle_fade(event);
                }

                // Keep the display in step with the main player
                _ = push_timer.tick() => {
                    self.push_display_state();
                }
            }
        }

        self.teardown();
        info!("Control engine stopped");
        Ok(())
    }

    pub fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::ToggleOverlay => self.toggle_overlay(),
            EngineCommand::TogglePlay => self.toggle_play(),
            EngineCommand::SeekBy(delta) => self.seek_by(delta),
            EngineCommand::LoadVideo {
                video_id,
                start_secs,
            } => self.load_video(&video_id, start_secs),
            EngineCommand::ToggleDisplayPopout => self.toggle_display(),
            EngineCommand::Relay(message) => self.handle_message(message),
            EngineCommand::Shutdown => self.teardown(),
        }
    }

    fn toggle_overlay(&mut self) {
        if self.overlay_visible {
            self.hide_overlay();
        } else {
            self.show_overlay();
        }
    }

    /// Fade the main player out; pause once the fade completes
    fn show_overlay(&mut self) {
        self.overlay_visible = true;

        // Mid-fade the volume is transitional, keep the saved level
        if !self.main.is_fading() {
            self.restore_volume = self.main.volume();
        }

        info!("Overlay shown, fading main player out");
        self.fade_out_main();
        let _ = self.status_tx.send(EngineStatus::OverlayShown);
    }

    /// Fade the main player to silence; `FadedOut` follows on completion
    fn fade_out_main(&self) {
        let tx = self.fade_tx.clone();
        self.fader
            .fade(&self.main, 0.0, self.settings.fade_duration, move || {
                let _ = tx.send(FadeEvent::FadedOut);
            });
    }

    /// Pause both control players and the display
    fn pause_all(&self) {
        self.main.pause();
        self.cue.pause();
        self.remote(PlayerCommand::Pause);
    }

    /// Unmute and resume, then fade the main player back in
    fn hide_overlay(&mut self) {
        self.overlay_visible = false;

        info!("Overlay hidden, resuming main player");
        self.main.un_mute();
        self.main.play();
        self.remote(PlayerCommand::Play);

        let tx = self.fade_tx.clone();
        self.fader.fade(
            &self.main,
            self.restore_volume,
            self.settings.fade_duration,
            move || {
                let _ = tx.send(FadeEvent::FadedIn);
            },
        );
        let _ = self.status_tx.send(EngineStatus::OverlayHidden);
    }

    fn handle_fade(&mut self, event: FadeEvent) {
        match event {
            FadeEvent::FadedOut if self.overlay_visible => {
                debug!("Fade-out finished, pausing players");
                self.pause_all();
                let _ = self.status_tx.send(EngineStatus::OverlayPaused);
            }
            FadeEvent::FadedOut => debug!("Stale fade-out completion ignored"),
            FadeEvent::FadedIn => debug!("Fade-in finished"),
        }
    }

    fn toggle_play(&mut self) {
        if self.main.player_state() == PlayerState::Playing {
            self.main.pause();
            self.remote(PlayerCommand::Pause);
        } else {
            self.main.play();
            self.remote(PlayerCommand::Play);
        }
    }

    fn seek_by(&mut self, delta: f64) {
        let target = (self.main.current_time() + delta).max(0.0);
        debug!("Seeking main player by {:+.1}s to {:.1}s", delta, target);
        self.main.seek_to(target, true);
        self.remote(PlayerCommand::Seek { time: target });
    }

    /// Swap the video on every surface. The sync session is torn down across
    /// the swap so no tick compares the old video against the new one.
    ///
    /// With the overlay up the new video must not be heard: an interrupted
    /// fade-out is restarted, a finished one leaves everything paused.
    fn load_video(&mut self, video_id: &str, start_secs: f64) {
        info!("Loading video {} at {:.1}s", video_id, start_secs);

        let fading_out = self.overlay_visible && self.main.is_fading();
        let before = self.sync.session_id();
        self.sync.set_primary(None);

        self.main.load_video(video_id, start_secs);
        self.cue.load_video(video_id, start_secs);

        self.sync.set_primary(self.main.surface());
        self.sync_changed(before);

        self.remote(PlayerCommand::LoadVideo {
            video_id: video_id.to_string(),
            start_seconds: start_secs,
        });

        if fading_out {
            debug!("Video swapped mid fade-out, restarting the fade");
            self.fade_out_main();
        } else if self.overlay_visible {
            self.pause_all();
        }
        let _ = self.status_tx.send(EngineStatus::VideoLoaded {
            video_id: video_id.to_string(),
        });
    }

    fn toggle_display(&mut self) {
        let registry = self.relay.registry().clone();

        if registry.is_open(ContextRole::Display) {
            info!("Closing display window");
            self.display_ready = false;
            self.host.close_display(&self.relay);
            return;
        }

        let inbox = registry.on_window_opened(ContextRole::Display);
        match self.host.open_display(inbox, self.relay.clone()) {
            Ok(()) => {
                let _ = self.status_tx.send(EngineStatus::DisplayOpened);
            }
            Err(e) => {
                error!("Failed to open display window: {}", e);
                registry.on_window_closed(ContextRole::Display);
                let _ = self
                    .status_tx
                    .send(EngineStatus::Error(format!("Display failed to open: {}", e)));
            }
        }
    }

    pub fn handle_message(&mut self, message: RelayMessage) {
        let command = match message.to_command() {
            Ok(command) => command,
            Err(e) => {
                warn!("Ignoring relay message on control: {}", e);
                return;
            }
        };

        match command {
            Command::SyncToMain { state } => {
                let _ = self.status_tx.send(EngineStatus::DisplayState(state));
            }
            Command::DisplayPlayerReady
                if !self.relay.registry().is_open(ContextRole::Display) =>
            {
                debug!("Ignoring displayPlayerReady from a closed display window");
            }
            Command::DisplayPlayerReady => {
                info!("Display player ready");
                self.display_ready = true;
                self.push_display_state();
                let _ = self.status_tx.send(EngineStatus::DisplayReady);
            }
            Command::DisplayWindowClosed => {
                self.display_ready = false;
                self.relay.registry().on_window_closed(ContextRole::Display);
                let _ = self.status_tx.send(EngineStatus::DisplayClosed);
            }
            Command::ToggleDisplayPopout => self.toggle_display(),
            Command::SyncToDisplay { .. } | Command::ControlDisplayPlayer { .. } => {
                debug!("Control ignores display-bound {}", message.action);
            }
        }
    }

    fn push_display_state(&self) {
        if !self.display_ready {
            return;
        }
        if let Some(state) = self.main.snapshot() {
            self.relay
                .send_command(ContextRole::Control, &Command::SyncToDisplay { state });
        }
    }

    /// Relay a player command to the display, if one is listening
    fn remote(&self, command: PlayerCommand) {
        if !self.display_ready {
            return;
        }
        self.relay
            .send_command(ContextRole::Control, &Command::ControlDisplayPlayer { command });
    }

    /// Hand a new sync session to both adapters, so detaching either one
    /// stops it, and report the change
    fn sync_changed(&self, before: Option<Uuid>) {
        let after = self.sync.session_id();
        if before == after {
            return;
        }

        let session = self.sync.session_canceller();
        self.main.bind_sync(session.clone());
        self.cue.bind_sync(session);

        let status = match after {
            Some(session_id) => EngineStatus::SyncStarted { session_id },
            None => EngineStatus::SyncStopped,
        };
        let _ = self.status_tx.send(status);
    }

    /// Cancel every timer, then release surfaces and windows
    fn teardown(&mut self) {
        let before = self.sync.session_id();
        self.sync.shutdown();
        self.sync_changed(before);

        self.main.cancel_fade();
        self.cue.cancel_fade();

        if self.relay.registry().is_open(ContextRole::Display) {
            self.host.close_display(&self.relay);
        }
        self.display_ready = false;
        self.relay.registry().on_window_closed(ContextRole::Control);
    }
}
