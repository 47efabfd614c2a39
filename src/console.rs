//! Operator-facing console
//!
//! Command output and progress lines are written to stdout through
//! [`Operator::say`]; secrets are read without echo through
//! [`Operator::ask_secret`]. Diagnostics go through `tracing` to stderr.
//! [`TtyGuard`] puts the terminal back the way it was found, so an
//! interrupted secret read does not leave echo switched off.

use async_trait::async_trait;
use secrecy::SecretString;
use tracing::{debug, warn};

use crate::error::{ChairError, Result};

/// Line-based interactive console used by a session
#[async_trait]
pub trait Operator: Send + Sync {
    /// Show a line to the operator
    fn say(&self, line: &str);

    /// Ask the operator for a secret; input must not be echoed
    async fn ask_secret(&self, prompt: &str) -> Result<SecretString>;
}

/// Console bound to the controlling terminal
#[derive(Debug, Clone, Default)]
pub struct TerminalOperator;

impl TerminalOperator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Operator for TerminalOperator {
    fn say(&self, line: &str) {
        println!("{}", line);
    }

    async fn ask_secret(&self, prompt: &str) -> Result<SecretString> {
        let prompt = prompt.to_string();
        debug!("Reading secret from terminal");

        // rpassword blocks on the tty; keep it off the runtime threads.
        let secret = tokio::task::spawn_blocking(move || rpassword::prompt_password(prompt))
            .await
            .map_err(|e| ChairError::prompt_relay(format!("Prompt task failed: {}", e)))?
            .map_err(|e| ChairError::prompt_relay(format!("Failed to read secret: {}", e)))?;

        Ok(SecretString::new(secret.into_boxed_str()))
    }
}

/// Restores the terminal settings captured at creation when dropped
#[cfg(unix)]
pub struct TtyGuard {
    tty: std::fs::File,
    saved: nix::sys::termios::Termios,
}

#[cfg(unix)]
impl TtyGuard {
    /// Snapshot the controlling terminal; `None` when there is none
    pub fn capture() -> Option<Self> {
        let tty = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open("/dev/tty")
            .ok()?;
        let saved = nix::sys::termios::tcgetattr(&tty).ok()?;
        Some(Self { tty, saved })
    }
}

#[cfg(unix)]
impl Drop for TtyGuard {
    fn drop(&mut self) {
        if let Err(e) =
            nix::sys::termios::tcsetattr(&self.tty, nix::sys::termios::SetArg::TCSANOW, &self.saved)
        {
            warn!("Failed to restore terminal settings: {}", e);
        }
    }
}

#[cfg(unix)]
impl std::fmt::Debug for TtyGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtyGuard").finish_non_exhaustive()
    }
}
