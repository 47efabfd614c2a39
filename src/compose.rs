//! File operation command builders
//!
//! Builds `cp` and `ln -sf` command strings and runs them through a
//! [`RemoteSession`]. Paths and flags are interpolated as-is: quoting paths
//! that contain spaces or shell metacharacters is up to the caller.

use crate::console::Operator;
use crate::error::Result;
use crate::ssh::elevation::{Invocation, Privilege};
use crate::ssh::session::RemoteSession;
use crate::ssh::transport::Connector;

/// Build a `cp [flags] <from> <to>` invocation
pub fn copy_command(from: &str, to: &str, flags: Option<&str>, escalate: bool) -> Invocation {
    let mut parts = vec!["cp"];
    if let Some(flags) = flags.map(str::trim).filter(|f| !f.is_empty()) {
        parts.push(flags);
    }
    parts.push(from);
    parts.push(to);

    Invocation {
        command: parts.join(" "),
        privilege: Privilege::from_escalate(escalate),
    }
}

/// Build a `ln -sf <target> <destination>` invocation
pub fn link_command(target: &str, destination: &str, escalate: bool) -> Invocation {
    Invocation {
        command: format!("ln -sf {} {}", target, destination),
        privilege: Privilege::from_escalate(escalate),
    }
}

/// Runs file operations on a session
pub struct CommandComposer<'a, C: Connector, O: Operator> {
    session: &'a RemoteSession<C, O>,
}

impl<'a, C: Connector, O: Operator> CommandComposer<'a, C, O> {
    pub fn new(session: &'a RemoteSession<C, O>) -> Self {
        Self { session }
    }

    /// Copy `from` to `to` on the remote host
    pub async fn copy(
        &self,
        from: &str,
        to: &str,
        flags: Option<&str>,
        escalate: bool,
    ) -> Result<()> {
        self.session
            .execute(&copy_command(from, to, flags, escalate))
            .await
    }

    /// Point a symlink at `destination` to `target`, replacing any existing one
    pub async fn link(&self, target: &str, destination: &str, escalate: bool) -> Result<()> {
        self.session
            .execute(&link_command(target, destination, escalate))
            .await
    }
}
