//! Output classification.
//!
//! The helper has no wire protocol; the only structure in its output is a
//! handful of well-known phrasings. Chunks are scanned as they arrive,
//! independent of line boundaries, so a prompt split across reads is still
//! caught by the chunk that completes the token.

/// Canonical warning emitted by SSH-family tools when a host key no longer
/// matches the locally cached one.
pub const HOST_KEY_BANNER: &str = "REMOTE HOST IDENTIFICATION HAS CHANGED";

/// True when the chunk looks like a credential request. Matches the token
/// "password" case-insensitively, which covers the canonical phrasings
/// ("password", "Password:", "password for ...") the helpers actually print.
pub fn mentions_password(text: &str) -> bool {
    text.to_ascii_lowercase().contains("password")
}

/// True when the chunk contains the host-identity-changed banner.
pub fn has_host_key_warning(text: &str) -> bool {
    text.contains(HOST_KEY_BANNER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_phrasings_match() {
        assert!(mentions_password("deploy@build.example.net's password: "));
        assert!(mentions_password("Password:"));
        assert!(mentions_password("Enter password for deploy"));
        assert!(mentions_password("PASSWORD REQUIRED"));
    }

    #[test]
    fn unrelated_output_does_not_match() {
        assert!(!mentions_password("Connection established."));
        assert!(!mentions_password("passwd file updated"));
        assert!(!mentions_password(""));
    }

    #[test]
    fn host_key_banner_matches_exact_warning() {
        let banner = concat!(
            "@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@\n",
            "@    WARNING: REMOTE HOST IDENTIFICATION HAS CHANGED!     @\n",
            "@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@@\n",
        );
        assert!(has_host_key_warning(banner));
    }

    #[test]
    fn host_key_banner_requires_exact_text() {
        assert!(!has_host_key_warning("remote host identification has changed"));
        assert!(!has_host_key_warning("Host key verification failed."));
    }
}
