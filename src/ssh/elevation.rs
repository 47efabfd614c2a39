//! Command wrapping for plain and `sudo` execution
//!
//! Every command runs inside `sh -c '...'`. Escalated commands are prefixed
//! with `sudo`, which prompts for its password on the PTY when it needs one;
//! that prompt is answered by [`RemoteSession`](super::session::RemoteSession).
//!
//! The command is interpolated literally. It must already be a valid POSIX
//! shell fragment: a single quote inside it ends the `sh -c` argument early.

use std::fmt;

/// Privilege level a command runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Privilege {
    /// Runs as the connecting user
    #[default]
    User,
    /// Runs through `sudo`
    Sudo,
}

impl Privilege {
    /// Pick the privilege from an "escalate?" flag
    pub fn from_escalate(escalate: bool) -> Self {
        if escalate {
            Privilege::Sudo
        } else {
            Privilege::User
        }
    }

    /// Wrap `command` into the command line sent to the remote side
    pub fn wrap(self, command: &str) -> String {
        match self {
            Privilege::User => wrap_shell_command(command),
            Privilege::Sudo => wrap_sudo_command(command),
        }
    }
}

/// A single command to run on the remote host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Shell fragment as given by the caller
    pub command: String,

    /// Whether the fragment runs through `sudo`
    pub privilege: Privilege,
}

impl Invocation {
    /// Plain invocation as the connecting user
    pub fn user(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            privilege: Privilege::User,
        }
    }

    /// Escalated invocation via `sudo`
    pub fn sudo(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            privilege: Privilege::Sudo,
        }
    }

    /// The full command line executed on the remote side
    pub fn remote_command(&self) -> String {
        self.privilege.wrap(&self.command)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.remote_command())
    }
}

/// Wraps a command for execution in a non-escalated shell.
///
/// # Examples
///
/// ```
/// use chair::ssh::elevation::wrap_shell_command;
///
/// assert_eq!(wrap_shell_command("uptime"), "sh -c 'uptime'");
/// ```
pub fn wrap_shell_command(command: &str) -> String {
    format!("sh -c '{}'", command)
}

/// Wraps a command for execution with sudo privileges.
///
/// No `-n` or `-S` flag is passed: sudo prompts on the PTY and the session
/// relays the prompt to the operator.
///
/// # Examples
///
/// ```
/// use chair::ssh::elevation::wrap_sudo_command;
///
/// assert_eq!(wrap_sudo_command("apt update"), "sudo sh -c 'apt update'");
/// ```
pub fn wrap_sudo_command(command: &str) -> String {
    format!("sudo {}", wrap_shell_command(command))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_shell_command() {
        assert_eq!(wrap_shell_command("ls -la"), "sh -c 'ls -la'");
    }

    #[test]
    fn test_wrap_sudo_command() {
        assert_eq!(wrap_sudo_command("apt update"), "sudo sh -c 'apt update'");
    }

    #[test]
    fn test_wrap_is_literal() {
        // No escaping is applied; double quotes pass through untouched.
        assert_eq!(
            wrap_sudo_command("echo \"ran as sudo\""),
            "sudo sh -c 'echo \"ran as sudo\"'"
        );
        assert_eq!(wrap_shell_command(""), "sh -c ''");
    }

    #[test]
    fn test_privilege_from_escalate() {
        assert_eq!(Privilege::from_escalate(true), Privilege::Sudo);
        assert_eq!(Privilege::from_escalate(false), Privilege::User);
        assert_eq!(Privilege::default(), Privilege::User);
    }

    #[test]
    fn test_invocation_remote_command() {
        assert_eq!(Invocation::user("false").remote_command(), "sh -c 'false'");
        assert_eq!(
            Invocation::sudo("echo ok").to_string(),
            "sudo sh -c 'echo ok'"
        );
    }
}
