//! chair - run shell commands on a remote host over SSH
//!
//! A [`RemoteSession`] holds one persistent SSH connection and runs commands
//! on it, either as the connecting user or through `sudo`. Each command gets
//! its own PTY channel. Output is relayed to the operator line by line, and
//! password prompts that show up in the output (including sudo's
//! `Sorry, try again`) are answered with a secret typed by the operator.
//!
//! # Features
//!
//! - `run` / `sudo` on a lazily opened, reused connection
//! - Prompt interception on stdout and stderr, across split chunks
//! - `cp` / `ln -sf` helpers ([`CommandComposer`])
//! - YAML settings with load-time validation ([`Settings`])
//!
//! # Example Usage (CLI)
//!
//! ```bash
//! chair --host=192.168.1.100 --user=deploy sudo "systemctl restart nginx"
//! chair -c chair.yaml link /srv/releases/42 /srv/current --sudo
//! ```

pub mod compose;
pub mod config;
pub mod console;
pub mod deployer;
pub mod error;
pub mod ssh;

// Re-exports for convenience
pub use compose::{copy_command, link_command, CommandComposer};
pub use config::{Args, Command, Settings, TransportOptions};
pub use console::{Operator, TerminalOperator};
pub use deployer::Deployer;
pub use error::{ChairError, Result};
pub use ssh::{Invocation, Privilege, RemoteSession, SshConfig};
