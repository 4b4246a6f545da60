//! System capability checks and mount-point validation.

use crate::command::SSHFS_PROGRAM;
use std::path::Path;

/// Whether the mount helper resolves on PATH.
pub fn sshfs_installed() -> bool {
    which::which(SSHFS_PROGRAM).is_ok()
}

/// Whether FUSE looks usable: `/dev/fuse` on Linux, or an sshfs binary at the
/// conventional location on systems without the device node.
pub fn fuse_available() -> bool {
    Path::new("/dev/fuse").exists() || Path::new("/usr/local/bin/sshfs").exists()
}

/// Validates the local mount point: creates it when missing and verifies it
/// is writable. The error string is user-facing.
pub fn ensure_mount_point(path: &Path) -> Result<(), String> {
    if !path.exists() && std::fs::create_dir_all(path).is_err() {
        return Err(format!("Cannot create directory: {}", path.display()));
    }

    if !is_writable(path) {
        return Err(format!("No write permission for: {}", path.display()));
    }

    Ok(())
}

#[cfg(unix)]
fn is_writable(path: &Path) -> bool {
    use std::os::unix::ffi::OsStrExt;

    let Ok(cpath) = std::ffi::CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    unsafe { libc::access(cpath.as_ptr(), libc::W_OK) == 0 }
}

#[cfg(not(unix))]
fn is_writable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false)
}
