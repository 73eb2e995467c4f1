//! Terminal-state hardening.
//!
//! Some agent binaries import libraries that reset terminal attributes
//! during startup; if the host doesn't restore them the whole UI freezes.
//! [`TerminalGuard`] snapshots the termios state on entry and restores it
//! on every exit path, including panics, via `Drop`.

use tracing::debug;

/// Scoped snapshot of the controlling terminal's attributes.
///
/// A no-op off-TTY and on non-Unix platforms.
pub struct TerminalGuard {
    #[cfg(unix)]
    saved: Option<libc::termios>,
}

impl TerminalGuard {
    /// Snapshots terminal attributes if stdin is a TTY.
    pub fn new() -> Self {
        #[cfg(unix)]
        {
            use crossterm::tty::IsTty;
            if !std::io::stdin().is_tty() {
                return Self { saved: None };
            }
            let mut termios = std::mem::MaybeUninit::<libc::termios>::uninit();
            let rc = unsafe { libc::tcgetattr(libc::STDIN_FILENO, termios.as_mut_ptr()) };
            if rc != 0 {
                return Self { saved: None };
            }
            debug!("saved terminal attributes");
            Self {
                saved: Some(unsafe { termios.assume_init() }),
            }
        }
        #[cfg(not(unix))]
        {
            Self {}
        }
    }
}

impl Default for TerminalGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(ref saved) = self.saved {
            let rc = unsafe { libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, saved) };
            if rc == 0 {
                debug!("restored terminal attributes");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_is_safe_off_tty() {
        // Test runners are not TTYs; the guard must be inert, not fail.
        let guard = TerminalGuard::new();
        drop(guard);
    }
}
