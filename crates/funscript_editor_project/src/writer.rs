// SPDX-License-Identifier: MIT OR Apache-2.0
//! Background persistence.
//!
//! Encoded buffers are moved into a channel and written by a dedicated thread
//! running a current-thread tokio runtime. The editing thread never waits on
//! disk I/O; it polls for outcomes instead, or reads the per-path state the
//! worker publishes.

use crate::error::{ProjectError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc;

/// Identifies one submitted write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SaveTicket(u64);

impl SaveTicket {
    /// Get the raw ticket value
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Last known state of a write per path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveState {
    /// Queued or being written
    Pending,
    /// On disk
    Written,
    /// The write failed
    Failed(String),
}

/// A buffer to write
#[derive(Debug)]
pub struct SaveRequest {
    /// Ticket handed to the submitter
    pub ticket: SaveTicket,
    /// Target path
    pub path: PathBuf,
    /// Bytes to write
    pub buffer: Vec<u8>,
}

/// Result reported back by the worker
#[derive(Debug, Clone)]
pub struct SaveOutcome {
    /// Ticket of the request
    pub ticket: SaveTicket,
    /// Target path
    pub path: PathBuf,
    /// Error message on failure
    pub error: Option<String>,
}

impl SaveOutcome {
    /// Whether the write succeeded
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Handle to the background writer thread
pub struct SaveWorker {
    request_tx: Option<mpsc::UnboundedSender<SaveRequest>>,
    result_rx: mpsc::UnboundedReceiver<SaveOutcome>,
    states: Arc<RwLock<HashMap<PathBuf, SaveState>>>,
    next_ticket: u64,
    pending: usize,
    thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for SaveWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveWorker")
            .field("pending", &self.pending)
            .field("next_ticket", &self.next_ticket)
            .finish_non_exhaustive()
    }
}

impl SaveWorker {
    /// Spawn the writer thread
    pub fn new() -> Self {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        let states = Arc::new(RwLock::new(HashMap::new()));

        let worker_states = Arc::clone(&states);
        let thread = std::thread::Builder::new()
            .name("save-worker".into())
            .spawn(move || save_worker(request_rx, result_tx, worker_states));
        let thread = match thread {
            Ok(handle) => Some(handle),
            Err(err) => {
                tracing::error!("failed to spawn save worker: {err}");
                None
            }
        };

        Self {
            request_tx: Some(request_tx),
            result_rx,
            states,
            next_ticket: 1,
            pending: 0,
            thread,
        }
    }

    /// Queue `buffer` for writing to `path`
    pub fn submit(&mut self, path: &Path, buffer: Vec<u8>) -> Result<SaveTicket> {
        let sender = self.request_tx.as_ref().ok_or(ProjectError::WorkerUnavailable)?;
        let ticket = SaveTicket(self.next_ticket);
        let request = SaveRequest {
            ticket,
            path: path.to_path_buf(),
            buffer,
        };

        // Published before sending so the worker's result cannot be overwritten
        let previous = self.states.write().insert(path.to_path_buf(), SaveState::Pending);
        if sender.send(request).is_err() {
            let mut states = self.states.write();
            match previous {
                Some(state) => states.insert(path.to_path_buf(), state),
                None => states.remove(path),
            };
            return Err(ProjectError::WorkerUnavailable);
        }

        self.next_ticket += 1;
        self.pending += 1;
        tracing::debug!(ticket = ticket.0, path = %path.display(), "queued save");
        Ok(ticket)
    }

    /// Collect finished writes without blocking
    pub fn poll(&mut self) -> Vec<SaveOutcome> {
        let mut finished = Vec::new();
        while let Ok(outcome) = self.result_rx.try_recv() {
            self.pending = self.pending.saturating_sub(1);
            finished.push(outcome);
        }
        finished
    }

    /// Block until every submitted write has finished.
    ///
    /// Must not be called from inside an async runtime.
    pub fn flush(&mut self) -> Vec<SaveOutcome> {
        let mut finished = Vec::new();
        while self.pending > 0 {
            match self.result_rx.blocking_recv() {
                Some(outcome) => {
                    self.pending = self.pending.saturating_sub(1);
                    finished.push(outcome);
                }
                None => {
                    tracing::warn!(lost = self.pending, "save worker stopped with writes outstanding");
                    self.pending = 0;
                }
            }
        }
        finished
    }

    /// Number of writes not yet reported
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Last known state of the write to `path`
    pub fn state(&self, path: &Path) -> Option<SaveState> {
        self.states.read().get(path).cloned()
    }

    /// Forget every path whose write has finished. Returns how many were dropped.
    pub fn clear_finished(&self) -> usize {
        let mut states = self.states.write();
        let before = states.len();
        states.retain(|_, state| *state == SaveState::Pending);
        before - states.len()
    }
}

impl Default for SaveWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SaveWorker {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain its queue and exit
        self.request_tx = None;
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("save worker panicked");
            }
        }
    }
}

fn save_worker(
    mut request_rx: mpsc::UnboundedReceiver<SaveRequest>,
    result_tx: mpsc::UnboundedSender<SaveOutcome>,
    states: Arc<RwLock<HashMap<PathBuf, SaveState>>>,
) {
    let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(err) => {
            tracing::error!("failed to create save runtime: {err}");
            return;
        }
    };

    rt.block_on(async {
        while let Some(request) = request_rx.recv().await {
            let (state, error) = match tokio::fs::write(&request.path, &request.buffer).await {
                Ok(()) => {
                    tracing::info!(path = %request.path.display(), bytes = request.buffer.len(), "saved");
                    (SaveState::Written, None)
                }
                Err(err) => {
                    tracing::warn!(path = %request.path.display(), "save failed: {err}");
                    (SaveState::Failed(err.to_string()), Some(err.to_string()))
                }
            };
            states.write().insert(request.path.clone(), state);

            let outcome = SaveOutcome {
                ticket: request.ticket,
                path: request.path,
                error,
            };
            if result_tx.send(outcome).is_err() {
                break;
            }
        }
    });
}
