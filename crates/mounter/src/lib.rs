//! Mount-lifecycle orchestration for sshfs.
//!
//! The [`Mounter`] owns at most one external helper process at a time, drives
//! the `Idle → Mounting/Unmounting → Idle/Error` state machine, and scans the
//! helper's raw output for the two semantic signals it can carry: a password
//! prompt and the host-identity-changed warning. Everything the rest of the
//! application learns about an operation arrives as a [`MountEvent`] through
//! the [`EventSink`] registered at construction.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use thiserror::Error;

pub mod classify;
pub mod command;
pub mod mounts;
mod orchestrator;
pub mod preflight;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use orchestrator::Mounter;
pub use sshmount_exec::{LocalSpawner, ProcessSpawner, SpawnError};
pub use sshmount_hosts::{AuthMethod, HostProfile};

/// State of the orchestrator. There is no distinct `Mounted` state: a
/// successful mount returns to `Idle`, and the presentation layer infers
/// mounted-ness from the active mount listing (see [`mounts`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountState {
    Idle,
    Mounting,
    Unmounting,
    Error,
}

/// Tagged event delivered to the presentation layer, one variant per signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountEvent {
    StateChanged(MountState),
    Progress(String),
    MountSucceeded,
    MountFailed(String),
    UnmountSucceeded,
    CredentialRequired,
    HostKeyMismatch,
}

/// Subscription point for [`MountEvent`]s. Invoked synchronously within the
/// orchestrator's sequencing context.
pub trait EventSink: Send {
    fn emit(&mut self, event: MountEvent);
}

/// An [`EventSink`] backed by a shared queue, for callers that poll events
/// between orchestrator calls (the CLI does; tests do too).
#[derive(Debug, Clone, Default)]
pub struct QueueSink {
    queue: Arc<Mutex<VecDeque<MountEvent>>>,
}

impl QueueSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns all queued events.
    pub fn drain(&self) -> Vec<MountEvent> {
        self.queue.lock().unwrap().drain(..).collect()
    }

    /// Returns a copy of all queued events without removing them.
    pub fn snapshot(&self) -> Vec<MountEvent> {
        self.queue.lock().unwrap().iter().cloned().collect()
    }
}

impl EventSink for QueueSink {
    fn emit(&mut self, event: MountEvent) {
        self.queue.lock().unwrap().push_back(event);
    }
}

#[derive(Debug, Error)]
pub enum MountError {
    #[error("Already busy with another operation")]
    Busy,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error("No mount operation to retry")]
    NothingToRetry,
}
