//! Terminal prompts: hidden password input and yes/no confirmation.

use anyhow::Context;
use std::io::{BufRead, Write};

pub fn read_line_from_stdin() -> anyhow::Result<String> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading from stdin")?;
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

/// Prompts on stderr and reads a line with terminal echo disabled. Falls back
/// to a plain read when stdin is not a terminal.
pub fn read_secret(prompt: &str) -> anyhow::Result<String> {
    eprint!("{prompt}");
    let _ = std::io::stderr().flush();

    #[cfg(unix)]
    {
        let guard = EchoGuard::disable();
        let line = read_line_from_stdin();
        if guard.is_some() {
            // The suppressed newline from the user's Enter.
            eprintln!();
        }
        line
    }

    #[cfg(not(unix))]
    read_line_from_stdin()
}

pub fn confirm(question: &str) -> anyhow::Result<bool> {
    eprint!("{question} [y/N] ");
    let _ = std::io::stderr().flush();

    let answer = read_line_from_stdin()?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "Yes"))
}

/// Restores the original terminal attributes on drop.
#[cfg(unix)]
struct EchoGuard {
    original: libc::termios,
}

#[cfg(unix)]
impl EchoGuard {
    fn disable() -> Option<Self> {
        unsafe {
            let fd = libc::STDIN_FILENO;
            if libc::isatty(fd) == 0 {
                return None;
            }
            let mut term: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(fd, &mut term) != 0 {
                return None;
            }
            let original = term;
            term.c_lflag &= !libc::ECHO;
            if libc::tcsetattr(fd, libc::TCSANOW, &term) != 0 {
                return None;
            }
            Some(Self { original })
        }
    }
}

#[cfg(unix)]
impl Drop for EchoGuard {
    fn drop(&mut self) {
        unsafe {
            libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &self.original);
        }
    }
}
