//! LocalSpawner - runs processes on the local system via tokio.

use crate::{
    CapturedOutput, CommandSpec, ExitOutcome, OutputStream, ProcessEvent, ProcessHandle,
    ProcessSpawner, SpawnError,
};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Spawner backed by `tokio::process`.
#[derive(Debug, Default, Clone)]
pub struct LocalSpawner;

impl LocalSpawner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessSpawner for LocalSpawner {
    async fn spawn(
        &self,
        spec: CommandSpec,
        event_tx: mpsc::Sender<ProcessEvent>,
    ) -> Result<ProcessHandle, SpawnError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // Reap the child even if the owner discards the handle mid-operation.
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| SpawnError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        tracing::debug!(program = %spec.program, args = ?spec.args, "spawned");

        let child_stdin = child.stdin.take();
        let child_stdout = child.stdout.take();
        let child_stderr = child.stderr.take();

        let (stdin_tx, mut stdin_rx) = mpsc::channel::<Vec<u8>>(16);
        let (kill_tx, mut kill_rx) = tokio::sync::oneshot::channel::<()>();

        // Stdin writer task. Ends (closing the pipe) when the sender side is
        // dropped, independent of process termination.
        if let Some(mut stdin) = child_stdin {
            tokio::spawn(async move {
                while let Some(data) = stdin_rx.recv().await {
                    if stdin.write_all(&data).await.is_err() {
                        break;
                    }
                    if stdin.flush().await.is_err() {
                        break;
                    }
                }
                let _ = stdin.shutdown().await;
            });
        }

        let stdout_task = child_stdout.map(|out| {
            tokio::spawn(read_into_events(out, OutputStream::Stdout, event_tx.clone()))
        });
        let stderr_task = child_stderr.map(|err| {
            tokio::spawn(read_into_events(err, OutputStream::Stderr, event_tx.clone()))
        });

        // Wait task with kill support. The readers are joined before the exit
        // event is sent so the terminal outcome is always the last event.
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = &mut kill_rx => {
                    let _ = child.kill().await;
                    child.wait().await
                }
            };

            if let Some(task) = stdout_task {
                let _ = task.await;
            }
            if let Some(task) = stderr_task {
                let _ = task.await;
            }

            let code = status.ok().and_then(|s| s.code());
            let _ = event_tx
                .send(ProcessEvent::Exit {
                    outcome: ExitOutcome { code },
                })
                .await;
        });

        Ok(ProcessHandle::new(stdin_tx, kill_tx))
    }

    async fn run_capture(&self, spec: CommandSpec) -> Result<CapturedOutput, SpawnError> {
        let output = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| SpawnError::Spawn {
                program: spec.program.clone(),
                source,
            })?;

        Ok(CapturedOutput {
            outcome: ExitOutcome {
                code: output.status.code(),
            },
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

async fn read_into_events<R: AsyncRead + Unpin>(
    mut reader: R,
    stream: OutputStream,
    tx: mpsc::Sender<ProcessEvent>,
) {
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if tx
                    .send(ProcessEvent::Output {
                        stream,
                        data: buf[..n].to_vec(),
                    })
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Err(_) => break,
        }
    }
}
