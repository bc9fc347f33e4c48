// SPDX-License-Identifier: MIT OR Apache-2.0
//! Project files for the funscript editor.
//!
//! A [`Project`] ties one media file to any number of scripts and persists
//! them in a versioned binary container. Individual scripts are exchanged as
//! funscript JSON documents.
//!
//! Saving never blocks the editing thread: the project is encoded from
//! snapshots and written by the [`SaveWorker`].

pub mod container;
pub mod document;
pub mod error;
pub mod media;
pub mod project;
pub mod writer;

pub use container::{PlayerSettings, ProjectContainer, ScriptRecord, PROJECT_EXTENSION};
pub use document::{FunscriptDocument, ParsedDocument, FUNSCRIPT_EXTENSION};
pub use error::{ProjectError, Result};
pub use media::{is_media_file, FixedMediaResolver, MediaResolver, SiblingMediaResolver};
pub use project::Project;
pub use writer::{SaveOutcome, SaveState, SaveTicket, SaveWorker};
