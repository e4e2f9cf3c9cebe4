//! Timed linear volume ramps
//!
//! A fade reads the surface volume once, then walks to the target in a fixed
//! number of equal steps. The last step writes the target exactly and fires
//! the completion callback. Fades are last-writer-wins per surface: the slot
//! lives on the [`SurfaceAdapter`], and starting a new fade cancels the old
//! one before the new one reads the start volume.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::surface::{clamp_volume, PlaybackSurface, SurfaceAdapter};
use crate::task::TaskHandle;

/// Steps in a ramp unless configured otherwise
pub const DEFAULT_FADE_STEPS: u32 = 50;

/// Shortest step the timer can honour
const MIN_STEP: Duration = Duration::from_millis(1);

type Completion = Box<dyn FnOnce() + Send + 'static>;

/// One requested ramp
pub struct FadeJob {
    target_volume: f64,
    duration: Duration,
    on_complete: Option<Completion>,
}

impl FadeJob {
    pub fn new(target_volume: f64, duration: Duration) -> Self {
        Self {
            target_volume: clamp_volume(target_volume),
            duration,
            on_complete: None,
        }
    }

    /// Callback fired once, after the target volume has been written.
    /// Never fires if the fade is cancelled.
    pub fn on_complete(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    pub fn target_volume(&self) -> f64 {
        self.target_volume
    }
}

impl std::fmt::Debug for FadeJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FadeJob")
            .field("target_volume", &self.target_volume)
            .field("duration", &self.duration)
            .finish()
    }
}

/// Starts fades with a fixed step count
#[derive(Debug, Clone, Copy)]
pub struct Fader {
    steps: u32,
}

impl Default for Fader {
    fn default() -> Self {
        Self::new(DEFAULT_FADE_STEPS)
    }
}

impl Fader {
    pub fn new(steps: u32) -> Self {
        Self {
            steps: steps.max(1),
        }
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Convenience for `start(adapter, FadeJob::new(..).on_complete(..))`
    pub fn fade(
        &self,
        adapter: &Arc<SurfaceAdapter>,
        target_volume: f64,
        duration: Duration,
        on_complete: impl FnOnce() + Send + 'static,
    ) {
        self.start(
            adapter,
            FadeJob::new(target_volume, duration).on_complete(on_complete),
        )
    }

    /// Start `job` on `adapter`, cancelling any fade already running there.
    ///
    /// A zero-length fade writes the target and completes before returning.
    /// Without an attached surface the job is dropped and never completes.
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, adapter: &Arc<SurfaceAdapter>, job: FadeJob) {
        let FadeJob {
            target_volume,
            duration,
            on_complete,
        } = job;
        let steps = self.steps;
        let name = adapter.name().to_string();
        let mut immediate: Option<Option<Completion>> = None;

        let started = adapter.replace_fade(|surface| {
            if duration.is_zero() {
                if let Err(e) = surface.set_volume(target_volume) {
                    warn!("Immediate fade on {} failed: {}", name, e);
                }
                immediate = Some(on_complete);
                return None;
            }

            let start_volume = match surface.volume() {
                Ok(v) => clamp_volume(v),
                Err(e) => {
                    warn!("Fade on {} could not read the volume: {}", name, e);
                    return None;
                }
            };
            debug!(
                "Fading {} from {:.1} to {:.1} over {:?}",
                name, start_volume, target_volume, duration
            );

            Some(spawn_ramp(
                surface.clone(),
                Ramp {
                    start_volume,
                    target_volume,
                    steps,
                    step: (duration / steps).max(MIN_STEP),
                },
                on_complete,
                name.clone(),
            ))
        });

        if !started {
            return;
        }

        if let Some(Some(done)) = immediate {
            done();
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Ramp {
    start_volume: f64,
    target_volume: f64,
    steps: u32,
    step: Duration,
}

impl Ramp {
    /// Volume written at `index` (1-based); the last index is the target exactly
    fn volume_at(&self, index: u32) -> f64 {
        if index >= self.steps {
            return self.target_volume;
        }
        let delta = self.target_volume - self.start_volume;
        self.start_volume + delta * (f64::from(index) / f64::from(self.steps))
    }
}

fn spawn_ramp(
    surface: Arc<dyn PlaybackSurface>,
    ramp: Ramp,
    on_complete: Option<Completion>,
    name: String,
) -> TaskHandle {
    TaskHandle::spawn("fade", move |gate| async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + ramp.step, ramp.step);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        for index in 1..ramp.steps {
            ticker.tick().await;
            let written = gate.run(|| surface.set_volume(ramp.volume_at(index)));
            match written {
                None => return,
                Some(Err(e)) => debug!("Fade step {} on {} failed: {}", index, name, e),
                Some(Ok(())) => {}
            }
        }

        ticker.tick().await;
        let finished = gate.run_final(|| {
            if let Err(e) = surface.set_volume(ramp.target_volume) {
                warn!("Final fade step on {} failed: {}", name, e);
            }
        });

        if finished.is_some() {
            debug!("Fade on {} reached {:.1}", name, ramp.target_volume);
            if let Some(done) = on_complete {
                done();
            }
        }
    })
}
