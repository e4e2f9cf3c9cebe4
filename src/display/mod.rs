//! Display context
//!
//! The pop-out display window runs a [`DisplayMirror`]: it follows state
//! pushed from the control window, obeys remote player commands, and pushes
//! its own state back.

mod host;

pub use host::{LocalDisplayHost, WindowHost, SIMULATED_VIDEO_SECS};

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::relay::{Command, ContextRole, Inbox, PlayerCommand, Relay, RelayMessage};
use crate::surface::{
    PlaybackState, PlaybackSurface, ReadinessGate, SurfaceAdapter, SurfaceResult,
};
use crate::sync::{Correction, Sample, SyncConfig};

/// Volume difference ignored when mirroring pushed state
const VOLUME_EPSILON: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayConfig {
    pub sync: SyncConfig,
    pub readiness_timeout: Duration,
    pub state_push_interval: Duration,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            sync: SyncConfig::default(),
            readiness_timeout: Duration::from_secs(10),
            state_push_interval: Duration::from_millis(500),
        }
    }
}

/// Display-side consumer of relay messages
pub struct DisplayMirror {
    adapter: Arc<SurfaceAdapter>,
    relay: Relay,
    inbox: Inbox,
    config: DisplayConfig,
}

impl DisplayMirror {
    pub fn new(
        adapter: Arc<SurfaceAdapter>,
        relay: Relay,
        inbox: Inbox,
        config: DisplayConfig,
    ) -> Self {
        Self {
            adapter,
            relay,
            inbox,
            config,
        }
    }

    /// Wait for the display player, announce it, then serve until the
    /// display window's inbox closes. A window closed before its player came
    /// up never announces it.
    pub async fn run(mut self, surface: Arc<dyn PlaybackSurface>, ready: ReadinessGate) {
        let adapter = self.adapter.clone();
        let attach = adapter.attach_when_ready(surface, &ready, self.config.readiness_timeout);
        tokio::pin!(attach);

        let attached = loop {
            tokio::select! {
                result = &mut attach => break result,
                message = self.inbox.recv() => match message {
                    // Nothing to apply it to yet
                    Some(message) => debug!("Display not ready, dropping {}", message.action),
                    None => {
                        info!("Display window closed before its player was ready");
                        self.adapter.detach();
                        return;
                    }
                },
            }
        };

        match attached {
            Ok(()) if self.adapter.is_attached() => {
                info!("Display player ready");
                self.relay
                    .send_command(ContextRole::Display, &Command::DisplayPlayerReady);
            }
            Ok(()) => {}
            Err(e) => warn!("Display player unavailable, running without it: {}", e),
        }

        let period = self.config.state_push_interval;
        let mut push_timer = tokio::time::interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                message = self.inbox.recv() => {
                    match message {
                        Some(message) => self.handle_message(message),
                        None => break,
                    }
                }

                _ = push_timer.tick() => {
                    self.push_state();
                }
            }
        }

        self.adapter.detach();
        info!("Display mirror stopped");
    }

    pub fn handle_message(&self, message: RelayMessage) {
        let command = match message.to_command() {
            Ok(command) => command,
            Err(e) => {
                warn!("Ignoring relay message on display: {}", e);
                return;
            }
        };

        match command {
            Command::SyncToDisplay { state } => self.follow(&state),
            Command::ControlDisplayPlayer { command } => self.apply(&command),
            other => debug!("Display ignores {:?}", other),
        }
    }

    /// Converge on state pushed by the control window
    fn follow(&self, state: &PlaybackState) {
        let Some(surface) = self.adapter.surface() else {
            debug!("syncToDisplay ignored: no display player");
            return;
        };
        let tolerance = self.config.sync.drift_tolerance_secs;
        if let Err(e) = follow_state(surface.as_ref(), state, tolerance) {
            warn!("Display sync skipped: {}", e);
        }
    }

    fn apply(&self, command: &PlayerCommand) {
        debug!("Display applying {:?}", command);
        match command {
            PlayerCommand::Seek { time } => self.adapter.seek_to(*time, true),
            PlayerCommand::Play => self.adapter.play(),
            PlayerCommand::Pause => self.adapter.pause(),
            PlayerCommand::SetVolume { volume } => self.adapter.set_volume(*volume),
            PlayerCommand::Mute => self.adapter.mute(),
            PlayerCommand::UnMute => self.adapter.un_mute(),
            PlayerCommand::LoadVideo {
                video_id,
                start_seconds,
            } => self.adapter.load_video(video_id, *start_seconds),
        }
    }

    fn push_state(&self) {
        if let Some(state) = self.adapter.snapshot() {
            self.relay
                .send_command(ContextRole::Display, &Command::SyncToMain { state });
        }
    }
}

fn follow_state(
    surface: &dyn PlaybackSurface,
    state: &PlaybackState,
    drift_tolerance: f64,
) -> SurfaceResult<()> {
    if !state.video_id.is_empty() && surface.video_id()? != state.video_id {
        info!("Display switching to video {}", state.video_id);
        surface.load_video(&state.video_id, state.current_time_seconds)?;
        if !state.is_playing {
            surface.pause()?;
        }
        return Ok(());
    }

    let follower = Sample::read(surface)?;
    Correction::plan(Sample::from(state), follower, drift_tolerance).apply(surface)?;

    if (surface.volume()? - state.volume).abs() >= VOLUME_EPSILON {
        surface.set_volume(state.volume)?;
    }
    match (state.muted, surface.is_muted()?) {
        (true, false) => surface.mute()?,
        (false, true) => surface.un_mute()?,
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::WindowRegistry;
    use crate::surface::{PlayerState, SimulatedSurface, SurfaceCall};

    struct Harness {
        registry: Arc<WindowRegistry>,
        relay: Relay,
        control: Inbox,
        surface: Arc<SimulatedSurface>,
    }

    fn harness() -> (Harness, DisplayMirror) {
        let registry = Arc::new(WindowRegistry::new());
        let control = registry.on_window_opened(ContextRole::Control);
        let display_inbox = registry.on_window_opened(ContextRole::Display);
        let relay = Relay::new(registry.clone());
        let surface = Arc::new(SimulatedSurface::new("vid", 600.0));
        let mirror = DisplayMirror::new(
            SurfaceAdapter::new("display"),
            relay.clone(),
            display_inbox,
            DisplayConfig::default(),
        );
        (
            Harness {
                registry,
                relay,
                control,
                surface,
            },
            mirror,
        )
    }

    fn state(time: f64, playing: bool) -> PlaybackState {
        PlaybackState {
            is_playing: playing,
            current_time_seconds: time,
            volume: 100.0,
            muted: false,
            video_id: "vid".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_announces_ready_and_pushes_state() {
        let (mut h, mirror) = harness();
        let task = tokio::spawn(mirror.run(h.surface.clone(), ReadinessGate::ready()));

        let first = h.control.recv().await.unwrap();
        assert_eq!(first.to_command().unwrap(), Command::DisplayPlayerReady);

        tokio::time::sleep(Duration::from_millis(510)).await;
        let pushed = h.control.recv().await.unwrap();
        assert!(matches!(pushed.to_command().unwrap(), Command::SyncToMain { .. }));

        h.relay.window_closed(ContextRole::Display);
        task.await.unwrap();
        assert!(!h.registry.is_open(ContextRole::Display));
    }

    #[tokio::test(start_paused = true)]
    async fn test_follows_pushed_state() {
        let (mut h, mirror) = harness();
        let task = tokio::spawn(mirror.run(h.surface.clone(), ReadinessGate::ready()));
        let _ready = h.control.recv().await.unwrap();

        h.relay.send_command(
            ContextRole::Control,
            &Command::SyncToDisplay {
                state: state(30.0, true),
            },
        );
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(
            h.surface.calls(),
            vec![
                SurfaceCall::Seek {
                    to: 30.0,
                    allow_seek_ahead: true
                },
                SurfaceCall::Play,
            ]
        );

        h.relay.window_closed(ContextRole::Display);
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_commands_apply_directly() {
        let (mut h, mirror) = harness();
        let task = tokio::spawn(mirror.run(h.surface.clone(), ReadinessGate::ready()));
        let _ready = h.control.recv().await.unwrap();

        for command in [
            PlayerCommand::Seek { time: 42.0 },
            PlayerCommand::Pause,
            PlayerCommand::Mute,
        ] {
            h.relay.send_command(
                ContextRole::Control,
                &Command::ControlDisplayPlayer { command },
            );
        }
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(
            h.surface.calls(),
            vec![
                SurfaceCall::Seek {
                    to: 42.0,
                    allow_seek_ahead: true
                },
                SurfaceCall::Pause,
                SurfaceCall::Mute,
            ]
        );
        assert_eq!(h.surface.player_state().unwrap(), PlayerState::Paused);

        h.relay.window_closed(ContextRole::Display);
        task.await.unwrap();
    }

    #[test]
    fn test_follow_loads_new_video_paused() {
        let surface = SimulatedSurface::new("old", 600.0);
        let mut pushed = state(12.0, false);
        pushed.video_id = "new".to_string();

        follow_state(&surface, &pushed, 0.5).unwrap();
        assert_eq!(
            surface.calls(),
            vec![
                SurfaceCall::LoadVideo {
                    video_id: "new".to_string(),
                    start_seconds: 12.0
                },
                SurfaceCall::Pause,
            ]
        );
    }

    #[test]
    fn test_follow_mirrors_volume_and_mute() {
        let surface = SimulatedSurface::new("vid", 600.0);
        surface.force(5.0, PlayerState::Paused);
        let mut pushed = state(5.0, false);
        pushed.volume = 40.0;
        pushed.muted = true;

        follow_state(&surface, &pushed, 0.5).unwrap();
        assert_eq!(
            surface.calls(),
            vec![SurfaceCall::SetVolume(40.0), SurfaceCall::Mute]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_before_ready_never_announces() {
        let (mut h, mirror) = harness();
        let (signal, gate) = crate::surface::readiness();
        let task = tokio::spawn(mirror.run(h.surface.clone(), gate));

        tokio::time::sleep(Duration::from_millis(100)).await;
        h.relay.window_closed(ContextRole::Display);
        task.await.unwrap();
        signal.resolve();

        let mut received = Vec::new();
        while let Ok(message) = h.control.try_recv() {
            received.push(message.action);
        }
        assert_eq!(received, vec!["displayWindowClosed".to_string()]);
        assert!(h.surface.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_readiness_timeout_keeps_serving() {
        let (mut h, mirror) = harness();
        let (_signal, gate) = crate::surface::readiness();
        let task = tokio::spawn(mirror.run(h.surface.clone(), gate));

        tokio::time::sleep(Duration::from_secs(11)).await;
        h.relay.send_command(
            ContextRole::Control,
            &Command::ControlDisplayPlayer {
                command: PlayerCommand::Play,
            },
        );
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(h.surface.calls().is_empty());
        assert!(h.control.try_recv().is_err());

        h.relay.window_closed(ContextRole::Display);
        task.await.unwrap();
    }
}
