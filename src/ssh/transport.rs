//! Transport seam between a session and the SSH library
//!
//! [`Connector`] opens a [`Transport`] (one authenticated connection), which
//! opens [`ExecChannel`]s (one per command). The russh-backed implementation
//! lives here; tests drive the session through a scripted implementation.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::keys::PrivateKeyWithHashAlg;
use russh::{Channel, ChannelMsg};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::config::SshConfig;
use super::handler::SshHandler;
use crate::error::{ChairError, Result};

/// Terminal type requested for the PTY
const PTY_TERM: &str = "xterm";
const PTY_COLUMNS: u32 = 80;
const PTY_ROWS: u32 = 24;

/// Key files tried when no password or key is configured
const DEFAULT_IDENTITY_FILES: &[&str] = &["id_ed25519", "id_ecdsa", "id_rsa"];

/// Event received on an exec channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Primary output
    Data(Vec<u8>),
    /// Extended (stderr) output
    ExtendedData(Vec<u8>),
    /// Remote process exit status
    ExitStatus(u32),
    /// Remote side will send no more data
    Eof,
    /// Channel closed
    Close,
}

/// A single channel running one remote command
#[async_trait]
pub trait ExecChannel: Send {
    /// Request a pseudo-terminal. Returns `false` if the server refused it.
    async fn request_pty(&mut self) -> Result<bool>;

    /// Start `command`. Fails with [`ChairError::ExecutionRejected`] if the
    /// remote side refuses.
    async fn exec(&mut self, command: &str) -> Result<()>;

    /// Next event, or `None` once the channel is gone.
    ///
    /// Must be cancel-safe: the session polls it under a timeout.
    async fn next_event(&mut self) -> Option<ChannelEvent>;

    /// Write to the channel's input stream
    async fn send(&mut self, data: &[u8]) -> Result<()>;
}

/// One authenticated connection
#[async_trait]
pub trait Transport: Send + Sync {
    type Channel: ExecChannel;

    /// Open a new session channel
    async fn open_channel(&self) -> Result<Self::Channel>;

    /// Tear the connection down
    async fn disconnect(&self) -> Result<()>;
}

/// Factory for transports
#[async_trait]
pub trait Connector: Send + Sync {
    type Transport: Transport;

    /// Establish and authenticate a connection
    async fn connect(&self, config: &SshConfig) -> Result<Self::Transport>;
}

/// Connector backed by russh
#[derive(Debug, Clone, Default)]
pub struct RusshConnector;

impl RusshConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for RusshConnector {
    type Transport = RusshTransport;

    async fn connect(&self, config: &SshConfig) -> Result<RusshTransport> {
        info!("Connecting to SSH server {}...", config.address());

        let ssh_config = Arc::new(client::Config::default());

        let connect_result = timeout(
            config.connect_timeout,
            client::connect(
                ssh_config,
                config.connect_target(),
                SshHandler::new(&config.host),
            ),
        )
        .await;

        let mut handle = match connect_result {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => {
                error!("SSH connection failed: {}", e);
                return Err(ChairError::connection(e.to_string()));
            }
            Err(_) => {
                let secs = config.connect_timeout.as_secs();
                error!("SSH connection timeout after {}s", secs);
                return Err(ChairError::connection(format!(
                    "Connection timeout after {}s",
                    secs
                )));
            }
        };

        authenticate(&mut handle, config).await?;

        info!(
            "Successfully connected to {}@{}",
            config.username,
            config.address()
        );

        Ok(RusshTransport {
            handle: Mutex::new(handle),
        })
    }
}

/// Authenticate with the SSH server
///
/// Order: configured password, configured key, then the default key files in
/// `~/.ssh`. A configured method that is rejected is final.
async fn authenticate(handle: &mut Handle<SshHandler>, config: &SshConfig) -> Result<()> {
    if let Some(ref password) = config.password {
        debug!(
            "Attempting password authentication for user '{}'",
            config.username
        );
        let auth_result = handle
            .authenticate_password(&config.username, password)
            .await
            .map_err(|e| ChairError::auth(e.to_string()))?;

        if auth_result.success() {
            info!("Password authentication successful");
            return Ok(());
        }
        return Err(ChairError::auth("Password authentication rejected"));
    }

    if let Some(ref key_content) = config.private_key {
        debug!(
            "Attempting key authentication for user '{}'",
            config.username
        );
        let key = russh::keys::PrivateKey::from_openssh(key_content.as_bytes())
            .map_err(|e| ChairError::SshKey(format!("Failed to parse private key: {}", e)))?;

        if try_key(handle, &config.username, key).await? {
            info!("Key authentication successful");
            return Ok(());
        }
        return Err(ChairError::auth("Key authentication rejected"));
    }

    for path in default_identity_files() {
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(_) => continue,
        };

        let key = match russh::keys::PrivateKey::from_openssh(content.as_bytes()) {
            Ok(key) if !key.is_encrypted() => key,
            Ok(_) => {
                debug!("Skipping encrypted key {}", path.display());
                continue;
            }
            Err(e) => {
                warn!("Skipping unreadable key {}: {}", path.display(), e);
                continue;
            }
        };

        debug!("Trying default key {}", path.display());
        if try_key(handle, &config.username, key).await? {
            info!("Key authentication successful ({})", path.display());
            return Ok(());
        }
    }

    Err(ChairError::auth(
        "No authentication method succeeded (configure a password or identity_file)",
    ))
}

async fn try_key(
    handle: &mut Handle<SshHandler>,
    username: &str,
    key: russh::keys::PrivateKey,
) -> Result<bool> {
    let key_with_alg = PrivateKeyWithHashAlg::new(Arc::new(key), None);
    let auth_result = handle
        .authenticate_publickey(username, key_with_alg)
        .await
        .map_err(|e| ChairError::auth(e.to_string()))?;
    Ok(auth_result.success())
}

fn default_identity_files() -> Vec<PathBuf> {
    match dirs::home_dir() {
        Some(home) => DEFAULT_IDENTITY_FILES
            .iter()
            .map(|name| home.join(".ssh").join(name))
            .collect(),
        None => Vec::new(),
    }
}

/// Live russh connection
pub struct RusshTransport {
    handle: Mutex<Handle<SshHandler>>,
}

#[async_trait]
impl Transport for RusshTransport {
    type Channel = RusshChannel;

    async fn open_channel(&self) -> Result<RusshChannel> {
        let channel = self
            .handle
            .lock()
            .await
            .channel_open_session()
            .await
            .map_err(|e| ChairError::connection(format!("Failed to open channel: {}", e)))?;

        Ok(RusshChannel {
            channel,
            pending: VecDeque::new(),
        })
    }

    async fn disconnect(&self) -> Result<()> {
        self.handle
            .lock()
            .await
            .disconnect(russh::Disconnect::ByApplication, "", "")
            .await
            .map_err(|e| ChairError::connection(format!("Failed to disconnect: {}", e)))
    }
}

impl std::fmt::Debug for RusshTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RusshTransport").finish_non_exhaustive()
    }
}

/// Outcome of a want-reply channel request
enum Reply {
    Accepted,
    Refused,
    Closed,
}

/// russh session channel
pub struct RusshChannel {
    channel: Channel<client::Msg>,
    /// Events that arrived while waiting for a request reply
    pending: VecDeque<ChannelEvent>,
}

impl RusshChannel {
    async fn await_reply(&mut self) -> Reply {
        loop {
            match self.channel.wait().await {
                Some(ChannelMsg::Success) => return Reply::Accepted,
                Some(ChannelMsg::Failure) => return Reply::Refused,
                Some(msg) => {
                    if let Some(event) = convert(msg) {
                        let closed = event == ChannelEvent::Close;
                        self.pending.push_back(event);
                        if closed {
                            return Reply::Closed;
                        }
                    }
                }
                None => return Reply::Closed,
            }
        }
    }
}

fn convert(msg: ChannelMsg) -> Option<ChannelEvent> {
    match msg {
        ChannelMsg::Data { data } => Some(ChannelEvent::Data(data.to_vec())),
        ChannelMsg::ExtendedData { data, ext } => {
            if ext != 1 {
                debug!("Extended data with type {}", ext);
            }
            Some(ChannelEvent::ExtendedData(data.to_vec()))
        }
        ChannelMsg::ExitStatus { exit_status } => Some(ChannelEvent::ExitStatus(exit_status)),
        ChannelMsg::Eof => Some(ChannelEvent::Eof),
        ChannelMsg::Close => Some(ChannelEvent::Close),
        _ => None,
    }
}

#[async_trait]
impl ExecChannel for RusshChannel {
    async fn request_pty(&mut self) -> Result<bool> {
        self.channel
            .request_pty(true, PTY_TERM, PTY_COLUMNS, PTY_ROWS, 0, 0, &[])
            .await
            .map_err(|e| ChairError::connection(format!("Failed to request PTY: {}", e)))?;

        match self.await_reply().await {
            Reply::Accepted => Ok(true),
            Reply::Refused => Ok(false),
            Reply::Closed => Err(ChairError::connection(
                "Channel closed while requesting PTY",
            )),
        }
    }

    async fn exec(&mut self, command: &str) -> Result<()> {
        self.channel
            .exec(true, command)
            .await
            .map_err(|e| ChairError::connection(format!("Failed to send exec request: {}", e)))?;

        match self.await_reply().await {
            Reply::Accepted => Ok(()),
            Reply::Refused | Reply::Closed => Err(ChairError::rejected(command)),
        }
    }

    async fn next_event(&mut self) -> Option<ChannelEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }

        loop {
            let msg = self.channel.wait().await?;
            if let Some(event) = convert(msg) {
                return Some(event);
            }
        }
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.channel
            .data(data)
            .await
            .map_err(|e| ChairError::connection(format!("Failed to send data: {}", e)))
    }
}
