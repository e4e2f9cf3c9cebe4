//! Cross-window command relay
//!
//! Messages travel between the control and display contexts as flat JSON
//! objects, `{"action": ..., ...payload}`. The relay checks the action
//! against a fixed allow-list and forwards the message untouched to the
//! opposite context. A message with nowhere to go is dropped: no buffering,
//! no retry.

mod command;
mod registry;

pub use command::{Command, PlayerCommand};
pub use registry::{ContextRole, Inbox, WindowRegistry};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Action names the relay forwards
pub const CHANNELS: [&str; 6] = [
    "syncToDisplay",
    "controlDisplayPlayer",
    "syncToMain",
    "displayPlayerReady",
    "toggleDisplayPopout",
    "displayWindowClosed",
];

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("action {0:?} is not a relay channel")]
    UnknownAction(String),

    #[error("malformed {action} message: {source}")]
    Malformed {
        action: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A message exactly as it crosses the window boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayMessage {
    pub action: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl RelayMessage {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            payload: Map::new(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        CHANNELS.contains(&self.action.as_str())
    }

    pub fn from_command(command: &Command) -> Self {
        match serde_json::to_value(command) {
            Ok(Value::Object(mut fields)) => {
                let action = match fields.remove("action") {
                    Some(Value::String(action)) => action,
                    _ => String::new(),
                };
                Self {
                    action,
                    payload: fields,
                }
            }
            // Every Command variant serializes to a tagged object
            _ => Self::new(""),
        }
    }

    /// Parse into a typed [`Command`]
    pub fn to_command(&self) -> Result<Command, RelayError> {
        if !self.is_allowed() {
            return Err(RelayError::UnknownAction(self.action.clone()));
        }
        let mut fields = self.payload.clone();
        fields.insert("action".to_string(), Value::String(self.action.clone()));
        serde_json::from_value(Value::Object(fields)).map_err(|source| RelayError::Malformed {
            action: self.action.clone(),
            source,
        })
    }
}

impl From<Command> for RelayMessage {
    fn from(command: Command) -> Self {
        Self::from_command(&command)
    }
}

/// Why a message was not delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Action is not on the allow-list
    NotAllowed,
    /// The opposite context is not open
    TargetMissing,
    /// The opposite context closed its inbox
    TargetGone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Forwarded,
    Dropped(DropReason),
}

/// Forwards messages between contexts registered in a [`WindowRegistry`]
#[derive(Debug, Clone)]
pub struct Relay {
    registry: Arc<WindowRegistry>,
}

impl Relay {
    pub fn new(registry: Arc<WindowRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<WindowRegistry> {
        &self.registry
    }

    /// Forward `message` from `from` to the opposite context
    pub fn send(&self, from: ContextRole, message: RelayMessage) -> Delivery {
        if !message.is_allowed() {
            debug!("Dropping {:?} from {}: not a relay channel", message.action, from);
            return Delivery::Dropped(DropReason::NotAllowed);
        }

        let to = from.opposite();
        let Some(tx) = self.registry.sender(to) else {
            debug!("Dropping {} from {}: no {} window", message.action, from, to);
            return Delivery::Dropped(DropReason::TargetMissing);
        };

        let action = message.action.clone();
        match tx.send(message) {
            Ok(()) => Delivery::Forwarded,
            Err(_) => {
                debug!("Dropping {} from {}: {} window went away", action, from, to);
                Delivery::Dropped(DropReason::TargetGone)
            }
        }
    }

    pub fn send_command(&self, from: ContextRole, command: &Command) -> Delivery {
        self.send(from, RelayMessage::from_command(command))
    }

    /// Unregister a closed window. Closing the display tells the control
    /// context with `displayWindowClosed`.
    pub fn window_closed(&self, role: ContextRole) {
        if !self.registry.on_window_closed(role) {
            return;
        }
        if role == ContextRole::Display {
            self.send_command(ContextRole::Display, &Command::DisplayWindowClosed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::PlaybackState;
    use serde_json::json;

    fn state() -> PlaybackState {
        PlaybackState {
            is_playing: true,
            current_time_seconds: 4.0,
            volume: 100.0,
            muted: false,
            video_id: "v".to_string(),
        }
    }

    #[test]
    fn test_message_is_flat_json() {
        let message = RelayMessage::from_command(&Command::SyncToDisplay { state: state() });
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["action"], "syncToDisplay");
        assert_eq!(json["state"]["currentTimeSeconds"], 4.0);

        let back: RelayMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, message);
        assert_eq!(
            back.to_command().unwrap(),
            Command::SyncToDisplay { state: state() }
        );
    }

    #[test]
    fn test_sync_to_display_without_display_is_dropped() {
        let registry = Arc::new(WindowRegistry::new());
        let mut control = registry.on_window_opened(ContextRole::Control);
        let relay = Relay::new(registry);

        let command = Command::SyncToDisplay { state: state() };
        let delivery = relay.send_command(ContextRole::Control, &command);
        assert_eq!(delivery, Delivery::Dropped(DropReason::TargetMissing));
        assert!(control.try_recv().is_err());
    }

    #[test]
    fn test_forwards_verbatim() {
        let registry = Arc::new(WindowRegistry::new());
        let mut display = registry.on_window_opened(ContextRole::Display);
        let relay = Relay::new(registry);

        let message: RelayMessage = serde_json::from_value(json!({
            "action": "controlDisplayPlayer",
            "command": { "type": "seek", "time": 12.0 },
            "extra": [1, 2, 3]
        }))
        .unwrap();

        assert_eq!(relay.send(ContextRole::Control, message.clone()), Delivery::Forwarded);
        assert_eq!(display.try_recv().unwrap(), message);
    }

    #[test]
    fn test_unknown_action_rejected() {
        let registry = Arc::new(WindowRegistry::new());
        let mut display = registry.on_window_opened(ContextRole::Display);
        let relay = Relay::new(registry);

        let delivery = relay.send(ContextRole::Control, RelayMessage::new("openDevTools"));
        assert_eq!(delivery, Delivery::Dropped(DropReason::NotAllowed));
        assert!(display.try_recv().is_err());
        assert!(matches!(
            RelayMessage::new("openDevTools").to_command(),
            Err(RelayError::UnknownAction(_))
        ));
    }

    #[test]
    fn test_closed_display_notifies_control() {
        let registry = Arc::new(WindowRegistry::new());
        let mut control = registry.on_window_opened(ContextRole::Control);
        let _display = registry.on_window_opened(ContextRole::Display);
        let relay = Relay::new(registry.clone());

        relay.window_closed(ContextRole::Display);
        assert!(!registry.is_open(ContextRole::Display));
        assert_eq!(
            control.try_recv().unwrap().to_command().unwrap(),
            Command::DisplayWindowClosed
        );
    }

    #[test]
    fn test_malformed_payload() {
        let message = RelayMessage::new("syncToDisplay");
        assert!(matches!(
            message.to_command(),
            Err(RelayError::Malformed { .. })
        ));
    }
}
