//! Registry of open rendering contexts
//!
//! Lifecycle: an entry is created when a window opens and is cleared when it
//! closes. Opening a role that is already registered replaces the previous
//! entry, so there is never more than one display window.

use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::RelayMessage;

/// The two rendering contexts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextRole {
    Control,
    Display,
}

impl ContextRole {
    pub fn opposite(self) -> Self {
        match self {
            Self::Control => Self::Display,
            Self::Display => Self::Control,
        }
    }
}

impl std::fmt::Display for ContextRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Control => write!(f, "control"),
            Self::Display => write!(f, "display"),
        }
    }
}

pub type Inbox = mpsc::UnboundedReceiver<RelayMessage>;

/// Process-wide table of open contexts and their inboxes
#[derive(Debug, Default)]
pub struct WindowRegistry {
    windows: Mutex<HashMap<ContextRole, mpsc::UnboundedSender<RelayMessage>>>,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly opened window and hand back its inbox
    pub fn on_window_opened(&self, role: ContextRole) -> Inbox {
        let (tx, rx) = mpsc::unbounded_channel();
        let previous = self.lock().insert(role, tx);
        if previous.is_some() {
            info!("Replaced existing {} window registration", role);
        } else {
            info!("{} window opened", role);
        }
        rx
    }

    /// Forget a closed window. Returns whether it was registered.
    pub fn on_window_closed(&self, role: ContextRole) -> bool {
        let removed = self.lock().remove(&role).is_some();
        if removed {
            info!("{} window closed", role);
        } else {
            debug!("{} window close ignored: not open", role);
        }
        removed
    }

    /// Whether `role` is registered and its inbox is still being read
    pub fn is_open(&self, role: ContextRole) -> bool {
        self.lock()
            .get(&role)
            .map(|tx| !tx.is_closed())
            .unwrap_or(false)
    }

    pub(crate) fn sender(&self, role: ContextRole) -> Option<mpsc::UnboundedSender<RelayMessage>> {
        self.lock().get(&role).cloned()
    }

    fn lock(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<ContextRole, mpsc::UnboundedSender<RelayMessage>>> {
        self.windows.lock().unwrap_or_else(|e| e.into_inner())
    }
}
