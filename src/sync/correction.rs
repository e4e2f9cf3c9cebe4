//! Correction policy
//!
//! One-way and tolerance based: the secondary is moved toward the primary,
//! never the reverse, and only when it has drifted past the tolerance.

use crate::surface::{PlaybackState, PlaybackSurface, PlayerState, SurfaceResult};

/// Position and state read from one surface at one instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub time: f64,
    pub state: PlayerState,
}

impl Sample {
    pub fn read(surface: &dyn PlaybackSurface) -> SurfaceResult<Self> {
        Ok(Self {
            time: surface.current_time()?,
            state: surface.player_state()?,
        })
    }
}

impl From<&PlaybackState> for Sample {
    fn from(state: &PlaybackState) -> Self {
        Self {
            time: state.current_time_seconds,
            state: state.player_state(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Play,
    Pause,
}

/// Writes to issue against the secondary surface
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Correction {
    pub seek_to: Option<f64>,
    pub transport: Option<Transport>,
}

impl Correction {
    /// Decide what the secondary needs to follow the primary.
    ///
    /// Drift is symmetric: a secondary ahead of the primary is pulled back
    /// the same way one behind is pushed forward. Buffering, ended, cued and
    /// unstarted primaries produce no transport correction.
    pub fn plan(primary: Sample, secondary: Sample, drift_tolerance: f64) -> Self {
        let seek_to = ((primary.time - secondary.time).abs() > drift_tolerance)
            .then_some(primary.time);

        let transport = match primary.state {
            PlayerState::Playing if secondary.state != PlayerState::Playing => {
                Some(Transport::Play)
            }
            PlayerState::Paused if secondary.state != PlayerState::Paused => {
                Some(Transport::Pause)
            }
            _ => None,
        };

        Self { seek_to, transport }
    }

    pub fn is_empty(&self) -> bool {
        self.seek_to.is_none() && self.transport.is_none()
    }

    /// Issue the writes: seek first, then play/pause
    pub fn apply(&self, secondary: &dyn PlaybackSurface) -> SurfaceResult<()> {
        if let Some(time) = self.seek_to {
            secondary.seek_to(time, true)?;
        }
        match self.transport {
            Some(Transport::Play) => secondary.play()?,
            Some(Transport::Pause) => secondary.pause()?,
            None => {}
        }
        Ok(())
    }
}

/// Sample both surfaces, then correct the secondary.
///
/// Both reads complete before any write is issued.
pub fn sync_once(
    primary: &dyn PlaybackSurface,
    secondary: &dyn PlaybackSurface,
    drift_tolerance: f64,
) -> SurfaceResult<Correction> {
    let lead = Sample::read(primary)?;
    let follower = Sample::read(secondary)?;
    let correction = Correction::plan(lead, follower, drift_tolerance);
    correction.apply(secondary)?;
    Ok(correction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{SimulatedSurface, SurfaceCall};

    fn sample(time: f64, state: PlayerState) -> Sample {
        Sample { time, state }
    }

    #[test]
    fn test_within_tolerance_no_seek() {
        for secondary_time in [9.5, 10.0, 10.5, 9.75] {
            let c = Correction::plan(
                sample(10.0, PlayerState::Playing),
                sample(secondary_time, PlayerState::Playing),
                0.5,
            );
            assert_eq!(c.seek_to, None, "secondary at {}", secondary_time);
            assert!(c.is_empty());
        }
    }

    #[test]
    fn test_drift_ahead_and_behind_both_seek() {
        for secondary_time in [9.4, 10.6, 0.0, 50.0] {
            let c = Correction::plan(
                sample(10.0, PlayerState::Playing),
                sample(secondary_time, PlayerState::Playing),
                0.5,
            );
            assert_eq!(c.seek_to, Some(10.0));
        }
    }

    #[test]
    fn test_transport_follows_playing_and_paused_only() {
        let play = Correction::plan(
            sample(1.0, PlayerState::Playing),
            sample(1.0, PlayerState::Buffering),
            0.5,
        );
        assert_eq!(play.transport, Some(Transport::Play));

        let pause = Correction::plan(
            sample(1.0, PlayerState::Paused),
            sample(1.0, PlayerState::Playing),
            0.5,
        );
        assert_eq!(pause.transport, Some(Transport::Pause));

        for primary_state in [
            PlayerState::Buffering,
            PlayerState::Ended,
            PlayerState::Cued,
            PlayerState::Unstarted,
        ] {
            let c = Correction::plan(
                sample(1.0, primary_state),
                sample(1.0, PlayerState::Playing),
                0.5,
            );
            assert_eq!(c.transport, None, "primary {:?}", primary_state);
        }
    }

    #[test]
    fn test_sync_once_seeks_then_plays() {
        let primary = SimulatedSurface::new("vid", 60.0);
        let secondary = SimulatedSurface::new("vid", 60.0);
        primary.force(10.0, PlayerState::Playing);
        secondary.force(8.9, PlayerState::Paused);

        let c = sync_once(&primary, &secondary, 0.5).unwrap();
        assert_eq!(c.transport, Some(Transport::Play));

        let calls = secondary.calls();
        assert_eq!(calls.len(), 2);
        match &calls[0] {
            SurfaceCall::Seek {
                to,
                allow_seek_ahead,
            } => {
                assert!((to - 10.0).abs() < 1e-6);
                assert!(*allow_seek_ahead);
            }
            other => panic!("expected seek, got {:?}", other),
        }
        assert_eq!(calls[1], SurfaceCall::Play);
        assert!(primary.calls().is_empty());
    }

    #[test]
    fn test_read_failure_issues_no_writes() {
        let primary = SimulatedSurface::new("vid", 60.0);
        let secondary = SimulatedSurface::new("vid", 60.0);
        primary.force(30.0, PlayerState::Playing);
        primary.set_failing(true);

        assert!(sync_once(&primary, &secondary, 0.5).is_err());
        assert!(secondary.calls().is_empty());
    }
}
