// SPDX-License-Identifier: MIT OR Apache-2.0
//! Funscript JSON documents.
//!
//! Reading is lenient: unknown fields are ignored, missing fields default and
//! malformed action records are skipped. A [`ParsedDocument`] reports whether
//! everything was accepted.

use crate::error::Result;
use funscript_editor_timeline::{Action, ActionSet, Metadata, Script, ScriptSnapshot, TimelineConfig, MAX_POSITION};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

/// File extension of funscript documents, without the dot
pub const FUNSCRIPT_EXTENSION: &str = "funscript";

/// Document format version written on save
pub const FUNSCRIPT_VERSION: &str = "1.0";

/// In-memory funscript document
#[derive(Debug, Clone, PartialEq)]
pub struct FunscriptDocument {
    /// Format version
    pub version: String,
    /// Whether positions are meant to be played inverted
    pub inverted: bool,
    /// Position range, always 100 on write
    pub range: u32,
    /// Actions sorted by time
    pub actions: Vec<Action>,
    /// Metadata block
    pub metadata: Metadata,
}

/// Result of reading a document
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// The valid part of the document
    pub document: FunscriptDocument,
    /// Number of action records that were dropped
    pub rejected: usize,
}

impl ParsedDocument {
    /// Whether every action record was accepted
    pub fn is_complete(&self) -> bool {
        self.rejected == 0
    }
}

#[derive(Deserialize)]
#[serde(default)]
struct RawDocument {
    version: String,
    inverted: bool,
    range: u32,
    actions: Vec<serde_json::Value>,
    metadata: Metadata,
}

impl Default for RawDocument {
    fn default() -> Self {
        Self {
            version: FUNSCRIPT_VERSION.to_string(),
            inverted: false,
            range: u32::from(MAX_POSITION),
            actions: Vec::new(),
            metadata: Metadata::default(),
        }
    }
}

#[derive(Deserialize)]
struct RawAction {
    at: f64,
    pos: f64,
}

#[derive(Serialize)]
struct WireAction {
    at: i64,
    pos: u8,
}

#[derive(Serialize)]
struct WireDocument<'a> {
    version: &'a str,
    inverted: bool,
    range: u32,
    actions: Vec<WireAction>,
    metadata: &'a Metadata,
}

fn parse_action(value: serde_json::Value) -> Option<Action> {
    let raw: RawAction = serde_json::from_value(value).ok()?;
    if !raw.pos.is_finite() {
        return None;
    }
    Action::try_new(raw.at, raw.pos.round() as i64)
}

impl Default for FunscriptDocument {
    fn default() -> Self {
        Self {
            version: FUNSCRIPT_VERSION.to_string(),
            inverted: false,
            range: u32::from(MAX_POSITION),
            actions: Vec::new(),
            metadata: Metadata::default(),
        }
    }
}

impl FunscriptDocument {
    /// Build a document from a script snapshot
    pub fn from_snapshot(snapshot: &ScriptSnapshot) -> Self {
        Self {
            actions: snapshot.actions.as_slice().to_vec(),
            metadata: snapshot.metadata.clone(),
            ..Self::default()
        }
    }

    /// Parse JSON text.
    ///
    /// Fails only when the text is not a JSON object of the right shape.
    /// Bad or duplicate action records are dropped and counted.
    pub fn parse(text: &str) -> Result<ParsedDocument> {
        let raw: RawDocument = serde_json::from_str(text)?;
        let total = raw.actions.len();

        let valid: Vec<Action> = raw.actions.into_iter().filter_map(parse_action).collect();
        let actions = ActionSet::from_actions(valid, usize::MAX).0.as_slice().to_vec();
        let rejected = total - actions.len();

        if rejected > 0 {
            tracing::warn!(rejected, kept = actions.len(), "dropped invalid funscript actions");
        }

        Ok(ParsedDocument {
            document: Self {
                version: raw.version,
                inverted: raw.inverted,
                range: raw.range,
                actions,
                metadata: raw.metadata,
            },
            rejected,
        })
    }

    /// Read a document from disk
    pub fn read(path: &Path) -> Result<ParsedDocument> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Actions with times rounded to whole milliseconds.
    ///
    /// When several actions round to the same millisecond only the earliest
    /// is kept. Returns the kept actions and the number merged away.
    fn wire_actions(&self) -> (Vec<WireAction>, usize) {
        let mut wire: Vec<WireAction> = Vec::with_capacity(self.actions.len());
        for action in &self.actions {
            let at = action.at().round() as i64;
            if wire.last().is_some_and(|prev| prev.at >= at) {
                continue;
            }
            wire.push(WireAction { at, pos: action.pos() });
        }
        let merged = self.actions.len() - wire.len();
        (wire, merged)
    }

    /// Number of actions lost to millisecond rounding on write
    pub fn rounding_collisions(&self) -> usize {
        self.wire_actions().1
    }

    /// Serialize to JSON with integer millisecond times
    pub fn to_json(&self) -> Result<String> {
        let (actions, merged) = self.wire_actions();
        if merged > 0 {
            tracing::warn!(merged, "actions share a millisecond after rounding");
        }
        let wire = WireDocument {
            version: FUNSCRIPT_VERSION,
            inverted: self.inverted,
            range: u32::from(MAX_POSITION),
            actions,
            metadata: &self.metadata,
        };
        Ok(serde_json::to_string(&wire)?)
    }

    /// Write JSON to disk. Returns the number of actions merged by rounding.
    pub fn write(&self, path: &Path) -> Result<usize> {
        std::fs::write(path, self.to_json()?)?;
        Ok(self.rounding_collisions())
    }

    /// One `at,pos` line per action, rounded like [`FunscriptDocument::to_json`]
    pub fn to_csv(&self) -> String {
        let (actions, _) = self.wire_actions();
        let mut out = String::with_capacity(actions.len() * 12);
        for action in &actions {
            let _ = writeln!(out, "{},{}", action.at, action.pos);
        }
        out
    }

    /// Turn the document into a script bound to `path`.
    ///
    /// Returns the script and the number of actions beyond the configured
    /// limit.
    pub fn into_script(self, config: &TimelineConfig, path: &Path) -> (Script, usize) {
        let (mut script, rejected) = Script::with_actions(config, self.actions);
        script.update_relative_path(path);
        *script.local_metadata_mut() = self.metadata;
        (script, rejected)
    }
}
