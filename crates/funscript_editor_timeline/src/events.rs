// SPDX-License-Identifier: MIT OR Apache-2.0
//! Change notifications raised by scripts.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque, stable handle for a script.
///
/// Handed out in events instead of references so a listener never holds on to
/// a script that has since been removed from its project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScriptId(pub Uuid);

impl ScriptId {
    /// Create a new random script ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScriptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Notification sent to whoever listens on a script's channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptEvent {
    /// Actions were edited. Sent at most once per tick.
    ActionsChanged(ScriptId),
    /// The selection changed
    SelectionChanged(ScriptId),
    /// Title or path changed
    MetadataChanged {
        /// Script
        script: ScriptId,
        /// Title before the change
        old_title: String,
    },
    /// The script was removed from its project
    Removed {
        /// Script
        script: ScriptId,
        /// Title at removal time
        title: String,
    },
}

impl ScriptEvent {
    /// Script the event refers to
    pub fn script(&self) -> ScriptId {
        match self {
            Self::ActionsChanged(id) | Self::SelectionChanged(id) => *id,
            Self::MetadataChanged { script, .. } | Self::Removed { script, .. } => *script,
        }
    }
}
