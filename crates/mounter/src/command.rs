//! Command-line construction for the external helpers.

use sshmount_exec::CommandSpec;
use sshmount_hosts::{AuthMethod, HostProfile};
use std::path::Path;

pub const SSHFS_PROGRAM: &str = "sshfs";

/// Reconnect/keepalive policy applied to every mount.
pub const SSHFS_BASE_OPTIONS: &str =
    "reconnect,ServerAliveInterval=15,ServerAliveCountMax=3,max_conns=16";

/// `sshfs <user>@<host>:<remote> <local> -p <port> -o <options>`
pub fn mount_command(profile: &HostProfile) -> CommandSpec {
    let auth_options = match profile.auth {
        AuthMethod::PublicKey => "PasswordAuthentication=no",
        AuthMethod::Password => "password_stdin,PubkeyAuthentication=no",
    };

    CommandSpec::new(
        SSHFS_PROGRAM,
        vec![
            profile.remote_spec(),
            profile.local_path.display().to_string(),
            "-p".to_string(),
            profile.port.to_string(),
            "-o".to_string(),
            format!("{SSHFS_BASE_OPTIONS},{auth_options}"),
        ],
    )
}

/// Platform unmount command. A compile-time decision, not a runtime probe.
#[cfg(target_os = "macos")]
pub fn unmount_command(local_path: &Path) -> CommandSpec {
    CommandSpec::new("umount", vec![local_path.display().to_string()])
}

#[cfg(not(target_os = "macos"))]
pub fn unmount_command(local_path: &Path) -> CommandSpec {
    CommandSpec::new(
        "fusermount",
        vec!["-u".to_string(), local_path.display().to_string()],
    )
}

/// `ssh-keygen -R <host>` — deletes the cached key entry for a host.
pub fn host_key_removal_command(host: &str) -> CommandSpec {
    CommandSpec::new("ssh-keygen", vec!["-R".to_string(), host.to_string()])
}
