//! Software playback surface
//!
//! A clock-driven stand-in for an embedded player, used by the headless
//! host and by tests. Every write is recorded so callers can assert on the
//! exact command sequence a controller issued.

use std::sync::Mutex;
use tokio::time::Instant;

use super::{clamp_volume, PlaybackSurface, PlayerState, SurfaceError, SurfaceResult};

/// A write issued against a [`SimulatedSurface`]
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    Seek { to: f64, allow_seek_ahead: bool },
    Play,
    Pause,
    SetVolume(f64),
    Mute,
    UnMute,
    LoadVideo { video_id: String, start_seconds: f64 },
}

#[derive(Debug)]
struct SimState {
    video_id: String,
    duration_secs: f64,
    /// Position at `playing_since`, or the frozen position when not playing
    position: f64,
    playing_since: Option<Instant>,
    state: PlayerState,
    volume: f64,
    muted: bool,
    ready: bool,
    failing: bool,
}

impl SimState {
    fn position_now(&self) -> f64 {
        let pos = match self.playing_since {
            Some(since) => self.position + since.elapsed().as_secs_f64(),
            None => self.position,
        };
        pos.min(self.duration_secs)
    }

    /// Fold elapsed play time into `position` and detect the end of the video
    fn settle(&mut self) {
        if self.playing_since.is_some() {
            self.position = self.position_now();
            if self.position >= self.duration_secs {
                self.playing_since = None;
                self.state = PlayerState::Ended;
            } else {
                self.playing_since = Some(Instant::now());
            }
        }
    }

    fn check(&self) -> SurfaceResult<()> {
        if self.failing {
            return Err(SurfaceError::Disposed);
        }
        Ok(())
    }
}

/// In-process player with a real (Tokio) clock
#[derive(Debug)]
pub struct SimulatedSurface {
    state: Mutex<SimState>,
    calls: Mutex<Vec<SurfaceCall>>,
}

impl SimulatedSurface {
    /// A cued surface holding `video_id`, `duration_secs` long, at full volume
    pub fn new(video_id: impl Into<String>, duration_secs: f64) -> Self {
        Self {
            state: Mutex::new(SimState {
                video_id: video_id.into(),
                duration_secs: duration_secs.max(0.0),
                position: 0.0,
                playing_since: None,
                state: PlayerState::Cued,
                volume: 100.0,
                muted: false,
                ready: true,
                failing: false,
            }),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Writes issued so far
    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Volumes passed to `set_volume`, in order
    pub fn volume_writes(&self) -> Vec<f64> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SurfaceCall::SetVolume(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    /// Make every call fail as if the player were mid-teardown
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    pub fn set_ready(&self, ready: bool) {
        self.lock().ready = ready;
    }

    /// Put the surface at `position` in `state` without recording a call
    pub fn force(&self, position: f64, state: PlayerState) {
        let mut s = self.lock();
        s.position = position.clamp(0.0, s.duration_secs);
        s.state = state;
        s.playing_since = (state == PlayerState::Playing).then(Instant::now);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: SurfaceCall) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }
}

impl PlaybackSurface for SimulatedSurface {
    fn video_id(&self) -> SurfaceResult<String> {
        let s = self.lock();
        s.check()?;
        Ok(s.video_id.clone())
    }

    fn current_time(&self) -> SurfaceResult<f64> {
        let mut s = self.lock();
        s.check()?;
        s.settle();
        Ok(s.position)
    }

    fn seek_to(&self, seconds: f64, allow_seek_ahead: bool) -> SurfaceResult<()> {
        {
            let mut s = self.lock();
            s.check()?;
            s.settle();
            s.position = seconds.clamp(0.0, s.duration_secs);
            if s.playing_since.is_some() {
                s.playing_since = Some(Instant::now());
            } else if s.state == PlayerState::Ended && s.position < s.duration_secs {
                s.state = PlayerState::Paused;
            }
        }
        self.record(SurfaceCall::Seek {
            to: seconds,
            allow_seek_ahead,
        });
        Ok(())
    }

    fn play(&self) -> SurfaceResult<()> {
        {
            let mut s = self.lock();
            s.check()?;
            s.settle();
            if s.position >= s.duration_secs {
                s.state = PlayerState::Ended;
            } else {
                s.state = PlayerState::Playing;
                s.playing_since.get_or_insert_with(Instant::now);
            }
        }
        self.record(SurfaceCall::Play);
        Ok(())
    }

    fn pause(&self) -> SurfaceResult<()> {
        {
            let mut s = self.lock();
            s.check()?;
            s.settle();
            s.playing_since = None;
            if s.state != PlayerState::Ended {
                s.state = PlayerState::Paused;
            }
        }
        self.record(SurfaceCall::Pause);
        Ok(())
    }

    fn player_state(&self) -> SurfaceResult<PlayerState> {
        let mut s = self.lock();
        s.check()?;
        s.settle();
        Ok(s.state)
    }

    fn volume(&self) -> SurfaceResult<f64> {
        let s = self.lock();
        s.check()?;
        Ok(s.volume)
    }

    fn set_volume(&self, volume: f64) -> SurfaceResult<()> {
        {
            let mut s = self.lock();
            s.check()?;
            s.volume = clamp_volume(volume);
        }
        self.record(SurfaceCall::SetVolume(volume));
        Ok(())
    }

    fn is_muted(&self) -> SurfaceResult<bool> {
        let s = self.lock();
        s.check()?;
        Ok(s.muted)
    }

    fn mute(&self) -> SurfaceResult<()> {
        {
            let mut s = self.lock();
            s.check()?;
            s.muted = true;
        }
        self.record(SurfaceCall::Mute);
        Ok(())
    }

    fn un_mute(&self) -> SurfaceResult<()> {
        {
            let mut s = self.lock();
            s.check()?;
            s.muted = false;
        }
        self.record(SurfaceCall::UnMute);
        Ok(())
    }

    fn load_video(&self, video_id: &str, start_seconds: f64) -> SurfaceResult<()> {
        {
            let mut s = self.lock();
            s.check()?;
            s.video_id = video_id.to_string();
            s.position = start_seconds.clamp(0.0, s.duration_secs);
            s.state = PlayerState::Playing;
            s.playing_since = Some(Instant::now());
        }
        self.record(SurfaceCall::LoadVideo {
            video_id: video_id.to_string(),
            start_seconds,
        });
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.lock().ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_time_advances_only_while_playing() {
        let surface = SimulatedSurface::new("vid", 60.0);
        surface.play().unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        let t = surface.current_time().unwrap();
        assert!((t - 3.0).abs() < 1e-6);

        surface.pause().unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        let paused_at = surface.current_time().unwrap();
        assert!((paused_at - 3.0).abs() < 1e-6);
        assert_eq!(surface.player_state().unwrap(), PlayerState::Paused);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaches_end() {
        let surface = SimulatedSurface::new("vid", 2.0);
        surface.play().unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(surface.player_state().unwrap(), PlayerState::Ended);
        assert_eq!(surface.current_time().unwrap(), 2.0);
    }

    #[test]
    fn test_failing_surface_reports_disposed() {
        let surface = SimulatedSurface::new("vid", 10.0);
        surface.set_failing(true);
        assert_eq!(surface.play(), Err(SurfaceError::Disposed));
        assert_eq!(surface.current_time(), Err(SurfaceError::Disposed));
        assert!(surface.calls().is_empty());
    }

    #[test]
    fn test_records_writes_not_reads() {
        let surface = SimulatedSurface::new("vid", 10.0);
        surface.seek_to(4.0, true).unwrap();
        let _ = surface.current_time();
        let _ = surface.volume();
        surface.set_volume(30.0).unwrap();

        assert_eq!(
            surface.calls(),
            vec![
                SurfaceCall::Seek {
                    to: 4.0,
                    allow_seek_ahead: true
                },
                SurfaceCall::SetVolume(30.0),
            ]
        );
    }
}
