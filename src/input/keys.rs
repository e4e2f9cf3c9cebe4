//! Presenter key bindings

use crate::engine::{EngineCommand, EngineSettings};
use crate::relay::RelayMessage;

/// A key the presenter can press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Space,
    ArrowLeft,
    ArrowRight,
    Char(char),
}

impl Key {
    /// Map a key to the engine command it triggers, if bound
    pub fn to_command(self, settings: &EngineSettings) -> Option<EngineCommand> {
        match self {
            Key::Space => Some(EngineCommand::ToggleOverlay),
            Key::ArrowLeft => Some(EngineCommand::SeekBy(-settings.seek_back_secs)),
            Key::ArrowRight => Some(EngineCommand::SeekBy(settings.seek_forward_secs)),
            Key::Char(c) => match c.to_ascii_lowercase() {
                'p' => Some(EngineCommand::ToggleDisplayPopout),
                'k' => Some(EngineCommand::TogglePlay),
                'q' => Some(EngineCommand::Shutdown),
                _ => None,
            },
        }
    }

    /// Parse a key name as typed on the console
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "space" | " " => Some(Key::Space),
            "left" | "arrowleft" => Some(Key::ArrowLeft),
            "right" | "arrowright" => Some(Key::ArrowRight),
            _ => {
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(Key::Char(c)),
                    _ => None,
                }
            }
        }
    }
}

/// Turn one console line into an engine command.
///
/// Lines are a key name, `load <video_id> [start_secs]`, or a raw relay
/// message as a JSON object.
pub fn parse_line(line: &str, settings: &EngineSettings) -> Option<EngineCommand> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        // A line of blanks is the space bar itself
        return if line.contains(' ') {
            Some(EngineCommand::ToggleOverlay)
        } else {
            None
        };
    }

    if trimmed.starts_with('{') {
        return match serde_json::from_str::<RelayMessage>(trimmed) {
            Ok(message) => Some(EngineCommand::Relay(message)),
            Err(e) => {
                tracing::warn!("Ignoring unreadable relay message: {}", e);
                None
            }
        };
    }

    let mut words = trimmed.split_whitespace();
    if let Some("load") = words.next() {
        let video_id = words.next()?.to_string();
        let start_secs = words
            .next()
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0)
            .max(0.0);
        return Some(EngineCommand::LoadVideo {
            video_id,
            start_secs,
        });
    }

    Key::parse(trimmed)?.to_command(settings)
}
