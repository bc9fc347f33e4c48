// SPDX-License-Identifier: MIT OR Apache-2.0
//! Action timeline engine for the funscript editor.
//!
//! This crate holds everything needed to edit one motion axis:
//! - Sorted, unique-by-time action storage with tolerance lookups
//! - A selection layered on top of the actions
//! - Linear and Catmull-Rom position sampling
//! - Snapshot-based undo/redo
//! - The [`Script`] editing API with dirty tracking and change events
//!
//! ## Architecture
//!
//! A [`Script`] is owned by one editing thread. Listeners receive
//! [`ScriptEvent`]s over a channel and refer to scripts by [`ScriptId`].
//! Persistence happens elsewhere, from an immutable [`ScriptSnapshot`].

pub mod action;
pub mod action_set;
pub mod config;
pub mod events;
pub mod history;
pub mod interpolation;
pub mod metadata;
pub mod script;
pub mod selection;

pub use action::{Action, Direction, MAX_POSITION, MIN_POSITION};
pub use action_set::{ActionSet, DEFAULT_ACTION_LIMIT};
pub use config::{ConfigError, TimelineConfig, CONFIG_FILE_NAME};
pub use events::{ScriptEvent, ScriptId};
pub use history::{HistoryError, HistoryStats, OperationID, StateSnapshot, UndoJournal};
pub use interpolation::{sample_linear, Interpolation, InterpolationMode, SplineSampler};
pub use metadata::Metadata;
pub use script::{EditKind, EditState, Script, ScriptSnapshot};
pub use selection::{EqualizeMode, PositionMatch, Selection};
