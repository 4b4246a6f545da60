//! Process spawning for the mount orchestrator.
//!
//! A spawned process is observed through a single event channel: zero or more
//! [`ProcessEvent::Output`] chunks followed by exactly one
//! [`ProcessEvent::Exit`]. The exit event is always the last event delivered
//! for a process. Input is written through a dedicated stdin channel; dropping
//! the sender closes the process's stdin. Forced termination goes through a
//! oneshot kill channel.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

pub mod local;

pub use local::LocalSpawner;

/// A command to spawn: program name plus argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

/// Which pipe a chunk of output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Terminal outcome of a process.
///
/// `code` is `None` when the process was terminated abnormally (by a signal)
/// rather than exiting on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    pub code: Option<i32>,
}

impl ExitOutcome {
    /// Exited normally with code 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Exited on its own (normal termination), regardless of code.
    pub fn normal(&self) -> bool {
        self.code.is_some()
    }
}

/// Events produced by a running process.
#[derive(Debug)]
pub enum ProcessEvent {
    /// A chunk of output from stdout or stderr, in production order.
    Output {
        stream: OutputStream,
        data: Vec<u8>,
    },
    /// The process reached its terminal outcome. Sent exactly once, after all
    /// output events.
    Exit { outcome: ExitOutcome },
}

/// Handle to a running process.
///
/// Dropping the handle does not terminate the process by itself, but the
/// spawner arranges for the child to be reaped on every exit path (see
/// [`LocalSpawner`]).
pub struct ProcessHandle {
    stdin_tx: Option<mpsc::Sender<Vec<u8>>>,
    kill_tx: Option<oneshot::Sender<()>>,
}

impl ProcessHandle {
    pub fn new(stdin_tx: mpsc::Sender<Vec<u8>>, kill_tx: oneshot::Sender<()>) -> Self {
        Self {
            stdin_tx: Some(stdin_tx),
            kill_tx: Some(kill_tx),
        }
    }

    /// Writes a chunk to the process's stdin. Returns `false` when the input
    /// channel is already closed or the process is gone.
    pub async fn write_stdin(&mut self, data: Vec<u8>) -> bool {
        match &self.stdin_tx {
            Some(tx) => tx.send(data).await.is_ok(),
            None => false,
        }
    }

    /// Closes the process's stdin. No further input can ever be sent.
    pub fn close_stdin(&mut self) {
        self.stdin_tx = None;
    }

    /// Requests forced termination. Idempotent; the terminal outcome still
    /// arrives through the event channel.
    pub fn kill(&mut self) {
        if let Some(tx) = self.kill_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Output of a command run to completion with captured pipes.
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    pub outcome: ExitOutcome,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        self.outcome.success()
    }
}

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
}

/// Spawning seam. The orchestrator talks to processes only through this
/// trait, so tests can script process behavior.
#[async_trait]
pub trait ProcessSpawner: Send + Sync {
    /// Spawns a command. Events are delivered through `event_tx`; the handle
    /// carries the stdin and kill channels.
    async fn spawn(
        &self,
        spec: CommandSpec,
        event_tx: mpsc::Sender<ProcessEvent>,
    ) -> Result<ProcessHandle, SpawnError>;

    /// Runs a command to completion, capturing stdout and stderr. Used for
    /// short fire-and-forget helpers.
    async fn run_capture(&self, spec: CommandSpec) -> Result<CapturedOutput, SpawnError>;
}

#[async_trait]
impl<S: ProcessSpawner + ?Sized> ProcessSpawner for std::sync::Arc<S> {
    async fn spawn(
        &self,
        spec: CommandSpec,
        event_tx: mpsc::Sender<ProcessEvent>,
    ) -> Result<ProcessHandle, SpawnError> {
        (**self).spawn(spec, event_tx).await
    }

    async fn run_capture(&self, spec: CommandSpec) -> Result<CapturedOutput, SpawnError> {
        (**self).run_capture(spec).await
    }
}
