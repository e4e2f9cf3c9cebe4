//! cue-sync presenter
//!
//! Keeps a cue player and a pop-out display window in lock-step with the
//! presenter's main player, with fades around overlay pauses.

pub mod config;
pub mod display;
pub mod engine;
pub mod fader;
pub mod input;
pub mod logging;
pub mod relay;
pub mod surface;
pub mod sync;
pub mod task;
