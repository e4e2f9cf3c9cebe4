//! Typed view of relay messages
//!
//! The relay itself forwards [`RelayMessage`](super::RelayMessage)s verbatim;
//! the two contexts parse them into [`Command`]s at the edges.

use serde::{Deserialize, Serialize};

use crate::surface::PlaybackState;

/// Messages understood by the control and display contexts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    /// Control → display: state of the main player
    SyncToDisplay { state: PlaybackState },

    /// Control → display: drive the display player remotely
    ControlDisplayPlayer { command: PlayerCommand },

    /// Display → control: state of the display player
    SyncToMain { state: PlaybackState },

    /// Display → control: the display player can accept commands
    DisplayPlayerReady,

    /// Either side: open the display window, or close it if open
    ToggleDisplayPopout,

    /// Host → control: the display window is gone
    DisplayWindowClosed,
}

/// Remote command for the display player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlayerCommand {
    Seek {
        time: f64,
    },
    Play,
    Pause,
    SetVolume {
        volume: f64,
    },
    Mute,
    UnMute,
    LoadVideo {
        #[serde(rename = "videoId")]
        video_id: String,
        #[serde(rename = "startSeconds", default)]
        start_seconds: f64,
    },
}
