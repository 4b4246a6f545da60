//! The mount orchestrator.
//!
//! One external helper process at a time. Callers start an operation with
//! [`Mounter::mount`] or [`Mounter::unmount`], then drive it by awaiting
//! [`Mounter::pump`] until it returns `false`; every observable effect is
//! emitted as a [`MountEvent`] along the way, and the terminal outcome event
//! is always the last one for an operation.

use crate::{classify, command, preflight, EventSink, MountError, MountEvent, MountState};
use sshmount_exec::{ExitOutcome, OutputStream, ProcessEvent, ProcessHandle, ProcessSpawner};
use sshmount_hosts::{AuthMethod, HostProfile};
use std::path::Path;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const MOUNT_SPAWN_FAILED: &str = "Failed to start sshfs. Is it installed and in your PATH?";
const MOUNT_UNKNOWN_ERROR: &str = "Mount failed with unknown error";
const UNMOUNT_UNKNOWN_ERROR: &str = "Unmount failed with unknown error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperationKind {
    Mount,
    Unmount,
}

struct ActiveOperation {
    kind: OperationKind,
    handle: ProcessHandle,
    events: mpsc::Receiver<ProcessEvent>,
    stderr: String,
    // A credential request was already surfaced for this operation.
    prompted: bool,
}

pub struct Mounter<P, E> {
    spawner: P,
    sink: E,
    state: MountState,
    active: Option<ActiveOperation>,
    last_profile: Option<HostProfile>,
}

impl<P: ProcessSpawner, E: EventSink> Mounter<P, E> {
    pub fn new(spawner: P, sink: E) -> Self {
        Self {
            spawner,
            sink,
            state: MountState::Idle,
            active: None,
            last_profile: None,
        }
    }

    pub fn state(&self) -> MountState {
        self.state
    }

    /// An operation is in flight and [`pump`](Self::pump) has work to do.
    pub fn is_busy(&self) -> bool {
        self.active.is_some()
    }

    /// Starts mounting `profile`. `Ok` means the helper was started, not that
    /// the mount succeeded; the outcome arrives through the sink while the
    /// caller pumps.
    pub async fn mount(&mut self, profile: &HostProfile) -> Result<(), MountError> {
        self.ensure_available()?;

        if let Err(message) = preflight::ensure_mount_point(&profile.local_path) {
            self.set_state(MountState::Error);
            self.sink.emit(MountEvent::MountFailed(message.clone()));
            return Err(MountError::Validation(message));
        }

        self.set_state(MountState::Mounting);
        self.sink.emit(MountEvent::Progress(format!(
            "Connecting to {}...",
            profile.host
        )));

        info!(
            host = %profile.host,
            local = %profile.local_path.display(),
            "starting sshfs"
        );

        let (event_tx, events) = mpsc::channel(64);
        let handle = match self
            .spawner
            .spawn(command::mount_command(profile), event_tx)
            .await
        {
            Ok(handle) => handle,
            Err(err) => {
                self.set_state(MountState::Error);
                self.sink
                    .emit(MountEvent::MountFailed(MOUNT_SPAWN_FAILED.to_string()));
                return Err(err.into());
            }
        };

        // In password mode sshfs reads the secret from stdin and often prints
        // no prompt of its own, so the request is surfaced up front.
        let prompted = profile.auth == AuthMethod::Password;

        self.active = Some(ActiveOperation {
            kind: OperationKind::Mount,
            handle,
            events,
            stderr: String::new(),
            prompted,
        });
        self.last_profile = Some(profile.clone());

        if prompted {
            self.sink.emit(MountEvent::CredentialRequired);
        }

        Ok(())
    }

    /// Starts unmounting `local_path` with the platform unmount helper.
    pub async fn unmount(&mut self, local_path: &Path) -> Result<(), MountError> {
        self.ensure_available()?;

        self.set_state(MountState::Unmounting);
        self.sink.emit(MountEvent::Progress(format!(
            "Unmounting {}...",
            local_path.display()
        )));

        let spec = command::unmount_command(local_path);
        let program = spec.program.clone();

        info!(local = %local_path.display(), helper = %program, "unmounting");

        let (event_tx, events) = mpsc::channel(64);
        let handle = match self.spawner.spawn(spec, event_tx).await {
            Ok(handle) => handle,
            Err(err) => {
                self.set_state(MountState::Error);
                self.sink.emit(MountEvent::MountFailed(format!(
                    "Failed to start {program}. Is it installed and in your PATH?"
                )));
                return Err(err.into());
            }
        };

        self.active = Some(ActiveOperation {
            kind: OperationKind::Unmount,
            handle,
            events,
            stderr: String::new(),
            prompted: false,
        });

        Ok(())
    }

    /// Waits for the next helper event and applies it. Returns `false` once
    /// the operation has reached its terminal outcome (or when nothing is in
    /// flight), after which the terminal event has already been emitted.
    pub async fn pump(&mut self) -> bool {
        let event = match self.active.as_mut() {
            Some(op) => op.events.recv().await,
            None => return false,
        };

        match event {
            Some(ProcessEvent::Output { stream, data }) => {
                let text = String::from_utf8_lossy(&data).into_owned();
                self.handle_output(stream, &text);
                true
            }
            Some(ProcessEvent::Exit { outcome }) => {
                self.finish(Some(outcome));
                false
            }
            // Channel closed without an exit event: the helper is gone.
            None => {
                self.finish(None);
                false
            }
        }
    }

    /// Answers a pending credential request. The secret is written to the
    /// helper's stdin followed by a newline, and stdin is closed so the
    /// helper cannot wait for more input. No-op without an active operation.
    pub async fn supply_credential(&mut self, secret: &str) {
        let Some(op) = self.active.as_mut() else {
            return;
        };

        let mut data = secret.as_bytes().to_vec();
        data.push(b'\n');
        let _ = op.handle.write_stdin(data).await;
        op.handle.close_stdin();
    }

    /// Refuses a pending credential request: the helper is killed and the
    /// operation abandoned without a terminal outcome event. The caller
    /// acknowledges with [`reset`](Self::reset).
    pub fn decline_credential(&mut self) {
        if let Some(mut op) = self.active.take() {
            op.handle.kill();
        }
    }

    /// Returns to `Idle` from `Error`, or after a declined credential
    /// request. Ignored while an operation is in flight.
    pub fn reset(&mut self) {
        if self.active.is_none() {
            self.set_state(MountState::Idle);
        }
    }

    /// Recovery path for [`MountEvent::HostKeyMismatch`]: kills the current
    /// helper if any, removes the cached key for the last mounted host with
    /// `ssh-keygen -R`, and retries the same mount.
    pub async fn remove_host_key_and_retry(&mut self) -> Result<(), MountError> {
        let Some(profile) = self.last_profile.clone() else {
            return Err(MountError::NothingToRetry);
        };

        if let Some(mut op) = self.active.take() {
            op.handle.kill();
        }

        self.sink.emit(MountEvent::Progress(format!(
            "Removing cached host key for {}...",
            profile.host
        )));

        match self
            .spawner
            .run_capture(command::host_key_removal_command(&profile.host))
            .await
        {
            Ok(output) if !output.success() => {
                // Usually just "host not found in known_hosts"; the retry
                // decides whether the mismatch is actually gone.
                warn!(host = %profile.host, stderr = %output.stderr.trim(), "ssh-keygen -R failed");
            }
            Ok(_) => {}
            Err(err) => {
                self.set_state(MountState::Error);
                self.sink.emit(MountEvent::MountFailed(format!(
                    "Failed to remove host key for {}",
                    profile.host
                )));
                return Err(err.into());
            }
        }

        self.set_state(MountState::Idle);
        self.mount(&profile).await
    }

    fn ensure_available(&self) -> Result<(), MountError> {
        if self.active.is_some()
            || matches!(self.state, MountState::Mounting | MountState::Unmounting)
        {
            return Err(MountError::Busy);
        }
        Ok(())
    }

    fn handle_output(&mut self, stream: OutputStream, text: &str) {
        let (prompt, host_key) = {
            let Some(op) = self.active.as_mut() else {
                return;
            };

            if stream == OutputStream::Stderr {
                op.stderr.push_str(text);
            }

            let prompt = !op.prompted && classify::mentions_password(text);
            if prompt {
                op.prompted = true;
            }
            (prompt, classify::has_host_key_warning(text))
        };

        if prompt {
            self.sink.emit(MountEvent::CredentialRequired);
        }
        if host_key {
            self.sink.emit(MountEvent::HostKeyMismatch);
        }
    }

    fn finish(&mut self, outcome: Option<ExitOutcome>) {
        let Some(op) = self.active.take() else {
            return;
        };

        let success = outcome.map(|o| o.success()).unwrap_or(false);
        debug!(?outcome, kind = ?op.kind, "helper finished");

        match (op.kind, success) {
            (OperationKind::Mount, true) => {
                self.set_state(MountState::Idle);
                self.sink.emit(MountEvent::MountSucceeded);
            }
            (OperationKind::Unmount, true) => {
                self.set_state(MountState::Idle);
                self.sink.emit(MountEvent::UnmountSucceeded);
            }
            (kind, false) => {
                let fallback = match kind {
                    OperationKind::Mount => MOUNT_UNKNOWN_ERROR,
                    OperationKind::Unmount => UNMOUNT_UNKNOWN_ERROR,
                };
                let detail = op.stderr.trim();
                let message = if detail.is_empty() {
                    fallback.to_string()
                } else {
                    detail.to_string()
                };

                self.set_state(MountState::Error);
                self.sink.emit(MountEvent::MountFailed(message));
            }
        }
    }

    fn set_state(&mut self, state: MountState) {
        if self.state != state {
            self.state = state;
            self.sink.emit(MountEvent::StateChanged(state));
        }
    }
}
