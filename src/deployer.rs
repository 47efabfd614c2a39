//! Settings-driven session setup

use std::path::Path;

use tracing::info;

use crate::compose::CommandComposer;
use crate::config::Settings;
use crate::console::TerminalOperator;
use crate::error::Result;
use crate::ssh::session::RemoteSession;
use crate::ssh::transport::RusshConnector;

/// A session built from a settings file
#[derive(Debug)]
pub struct Deployer {
    settings: Settings,
    session: RemoteSession,
}

impl Deployer {
    /// Load `path` and prepare a session for the host it names.
    ///
    /// No connection is made until the first command runs.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_settings(Settings::from_file(path)?)
    }

    /// Prepare a session from already-validated settings
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let session = RemoteSession::new(settings.to_ssh_config()?);
        info!(
            "Prepared session for {}@{}:{}",
            settings.user, settings.host, settings.port
        );
        Ok(Self { settings, session })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn session(&self) -> &RemoteSession {
        &self.session
    }

    /// File operations on this deployer's session
    pub fn files(&self) -> CommandComposer<'_, RusshConnector, TerminalOperator> {
        CommandComposer::new(&self.session)
    }
}
