//! Active mount listing.
//!
//! The orchestrator never tracks a "mounted" state of its own; callers that
//! want to show one list the system's active mounts and look for a profile's
//! `user@host` endpoint.

use sshmount_exec::{CommandSpec, ProcessSpawner, SpawnError};

/// Runs `mount` and returns its non-empty output lines.
pub async fn list_active<P: ProcessSpawner + ?Sized>(
    spawner: &P,
) -> Result<Vec<String>, SpawnError> {
    let output = spawner
        .run_capture(CommandSpec::new("mount", Vec::new()))
        .await?;

    Ok(output
        .stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect())
}

/// Whether any mount line mentions the given `user@host` endpoint.
pub fn endpoint_is_mounted(lines: &[String], endpoint: &str) -> bool {
    lines.iter().any(|line| line.contains(endpoint))
}
