//! Display window hosting
//!
//! The control engine asks a [`WindowHost`] to open or close the pop-out
//! display. The host owns whatever actually renders the display and reports
//! closure back through the relay.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{DisplayConfig, DisplayMirror};
use crate::relay::{ContextRole, Inbox, Relay};
use crate::surface::{readiness, PlaybackSurface, SimulatedSurface, SurfaceAdapter};

/// Length given to simulated videos
pub const SIMULATED_VIDEO_SECS: f64 = 4.0 * 60.0 * 60.0;

/// Trait for whatever opens display windows
pub trait WindowHost: Send {
    /// Open the display window. `inbox` receives messages relayed to it.
    fn open_display(&mut self, inbox: Inbox, relay: Relay) -> Result<()>;

    /// Close the display window and unregister it from the relay
    fn close_display(&mut self, relay: &Relay);
}

/// Runs the display in-process on a simulated player
pub struct LocalDisplayHost {
    config: DisplayConfig,
    /// Simulated time for the player API to load
    load_delay: Duration,
    mirror: Option<JoinHandle<()>>,
}

impl LocalDisplayHost {
    pub fn new(config: DisplayConfig, load_delay: Duration) -> Self {
        Self {
            config,
            load_delay,
            mirror: None,
        }
    }
}

impl WindowHost for LocalDisplayHost {
    fn open_display(&mut self, inbox: Inbox, relay: Relay) -> Result<()> {
        let surface = Arc::new(SimulatedSurface::new("", SIMULATED_VIDEO_SECS));
        surface.set_ready(false);

        let (signal, gate) = readiness();
        let loader = surface.clone();
        let delay = self.load_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            loader.set_ready(true);
            signal.resolve();
        });

        let mirror = DisplayMirror::new(SurfaceAdapter::new("display"), relay, inbox, self.config);
        let player: Arc<dyn PlaybackSurface> = surface;
        self.mirror = Some(tokio::spawn(mirror.run(player, gate)));
        info!("Display window opened");
        Ok(())
    }

    fn close_display(&mut self, relay: &Relay) {
        relay.window_closed(ContextRole::Display);
        if self.mirror.take().is_some() {
            // The mirror exits on its own once its inbox closes
            debug!("Display mirror winding down");
        }
    }
}
