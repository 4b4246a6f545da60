//! Test doubles: a scripted process spawner for driving the orchestrator
//! without real helper binaries.

use async_trait::async_trait;
use sshmount_exec::{
    CapturedOutput, CommandSpec, ExitOutcome, OutputStream, ProcessEvent, ProcessHandle,
    ProcessSpawner, SpawnError,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Scripted behavior for one spawned process: output chunks in order,
/// followed by an optional terminal outcome.
pub struct ProcessScript {
    chunks: Vec<(OutputStream, Vec<u8>)>,
    exit: Option<ExitOutcome>,
    fail_spawn: bool,
}

impl ProcessScript {
    /// Process that exits normally with the given code.
    pub fn exits(code: i32) -> Self {
        Self {
            chunks: Vec::new(),
            exit: Some(ExitOutcome { code: Some(code) }),
            fail_spawn: false,
        }
    }

    /// Process terminated abnormally (no exit code).
    pub fn signaled() -> Self {
        Self {
            chunks: Vec::new(),
            exit: Some(ExitOutcome { code: None }),
            fail_spawn: false,
        }
    }

    /// Process that produces its chunks and then stays running.
    pub fn hangs() -> Self {
        Self {
            chunks: Vec::new(),
            exit: None,
            fail_spawn: false,
        }
    }

    /// Spawn attempt that fails (helper binary missing).
    pub fn fails_to_start() -> Self {
        Self {
            chunks: Vec::new(),
            exit: None,
            fail_spawn: true,
        }
    }

    pub fn stdout(mut self, text: &str) -> Self {
        self.chunks
            .push((OutputStream::Stdout, text.as_bytes().to_vec()));
        self
    }

    pub fn stderr(mut self, text: &str) -> Self {
        self.chunks
            .push((OutputStream::Stderr, text.as_bytes().to_vec()));
        self
    }
}

/// [`ProcessSpawner`] that replays scripts instead of spawning, recording
/// every command line, all stdin writes, and kill requests.
#[derive(Default)]
pub struct ScriptedSpawner {
    scripts: Mutex<VecDeque<ProcessScript>>,
    capture_results: Mutex<VecDeque<CapturedOutput>>,
    spawned: Mutex<Vec<CommandSpec>>,
    captured: Mutex<Vec<CommandSpec>>,
    stdin_data: Arc<Mutex<Vec<u8>>>,
    stdin_closed: Arc<AtomicBool>,
    killed: Arc<AtomicBool>,
    // Keeps event channels of hanging scripts open.
    open_events: Mutex<Vec<mpsc::Sender<ProcessEvent>>>,
}

impl ScriptedSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the script for the next spawn. Unscripted spawns hang.
    pub fn push_script(&self, script: ProcessScript) {
        self.scripts.lock().unwrap().push_back(script);
    }

    /// Queues the result for the next `run_capture`. Unscripted captures
    /// succeed with empty output.
    pub fn push_capture(&self, output: CapturedOutput) {
        self.capture_results.lock().unwrap().push_back(output);
    }

    /// Command lines passed to `spawn`, in order.
    pub fn spawned(&self) -> Vec<CommandSpec> {
        self.spawned.lock().unwrap().clone()
    }

    /// Command lines passed to `run_capture`, in order.
    pub fn captured(&self) -> Vec<CommandSpec> {
        self.captured.lock().unwrap().clone()
    }

    /// Everything written to any spawned process's stdin.
    pub fn stdin_data(&self) -> Vec<u8> {
        self.stdin_data.lock().unwrap().clone()
    }

    pub fn stdin_closed(&self) -> bool {
        self.stdin_closed.load(Ordering::SeqCst)
    }

    pub fn was_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessSpawner for ScriptedSpawner {
    async fn spawn(
        &self,
        spec: CommandSpec,
        event_tx: mpsc::Sender<ProcessEvent>,
    ) -> Result<ProcessHandle, SpawnError> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(ProcessScript::hangs);

        if script.fail_spawn {
            return Err(SpawnError::Spawn {
                program: spec.program,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "scripted"),
            });
        }

        self.spawned.lock().unwrap().push(spec);

        let (stdin_tx, mut stdin_rx) = mpsc::channel::<Vec<u8>>(16);
        let stdin_data = Arc::clone(&self.stdin_data);
        let stdin_closed = Arc::clone(&self.stdin_closed);
        tokio::spawn(async move {
            while let Some(chunk) = stdin_rx.recv().await {
                stdin_data.lock().unwrap().extend_from_slice(&chunk);
            }
            stdin_closed.store(true, Ordering::SeqCst);
        });

        let (kill_tx, kill_rx) = tokio::sync::oneshot::channel::<()>();
        let killed = Arc::clone(&self.killed);
        tokio::spawn(async move {
            if kill_rx.await.is_ok() {
                killed.store(true, Ordering::SeqCst);
            }
        });

        if script.exit.is_none() {
            self.open_events.lock().unwrap().push(event_tx.clone());
        }

        tokio::spawn(async move {
            for (stream, data) in script.chunks {
                let _ = event_tx.send(ProcessEvent::Output { stream, data }).await;
            }
            if let Some(outcome) = script.exit {
                let _ = event_tx.send(ProcessEvent::Exit { outcome }).await;
            }
        });

        Ok(ProcessHandle::new(stdin_tx, kill_tx))
    }

    async fn run_capture(&self, spec: CommandSpec) -> Result<CapturedOutput, SpawnError> {
        self.captured.lock().unwrap().push(spec);

        Ok(self
            .capture_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(CapturedOutput {
                outcome: ExitOutcome { code: Some(0) },
                stdout: String::new(),
                stderr: String::new(),
            }))
    }
}
