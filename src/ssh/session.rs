//! Remote session
//!
//! A [`RemoteSession`] owns at most one connection to a single host and runs
//! commands on it one at a time, each on its own PTY channel. Output is relayed
//! to the [`Operator`]; password prompts found in the output are answered with
//! a secret read from the operator and written back into the same channel.

use std::sync::Arc;

use secrecy::ExposeSecret;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::config::SshConfig;
use super::elevation::Invocation;
use super::prompt::{ChunkAction, PromptInterceptor, StreamDecoder, StreamKind};
use super::transport::{
    ChannelEvent, Connector, ExecChannel, RusshConnector, Transport,
};
use crate::console::{Operator, TerminalOperator};
use crate::error::{ChairError, Result};

/// SSH session against one host
///
/// The connection is opened lazily by the first command (or an explicit
/// [`connect`](Self::connect)) and reused until [`close`](Self::close).
pub struct RemoteSession<C: Connector = RusshConnector, O: Operator = TerminalOperator> {
    config: SshConfig,
    connector: C,
    operator: O,
    transport: Mutex<Option<Arc<C::Transport>>>,
}

impl RemoteSession {
    /// Session using russh and the controlling terminal
    pub fn new(config: SshConfig) -> Self {
        Self::with_parts(config, RusshConnector::new(), TerminalOperator::new())
    }
}

impl<C: Connector, O: Operator> RemoteSession<C, O> {
    /// Session with an explicit connector and operator console
    pub fn with_parts(config: SshConfig, connector: C, operator: O) -> Self {
        Self {
            config,
            connector,
            operator,
            transport: Mutex::new(None),
        }
    }

    /// Remote host name
    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// Remote user name
    pub fn user(&self) -> &str {
        &self.config.username
    }

    /// Operator console this session talks to
    pub fn operator(&self) -> &O {
        &self.operator
    }

    /// Whether a connection is currently held
    pub async fn is_connected(&self) -> bool {
        self.transport.lock().await.is_some()
    }

    /// Return the live connection, establishing it first if needed
    pub async fn connect(&self) -> Result<Arc<C::Transport>> {
        let mut guard = self.transport.lock().await;

        if let Some(ref transport) = *guard {
            debug!("Reusing connection to {}", self.config.host);
            return Ok(Arc::clone(transport));
        }

        let transport = Arc::new(self.connector.connect(&self.config).await?);
        *guard = Some(Arc::clone(&transport));

        info!(
            "Session established for {}@{}",
            self.config.username, self.config.host
        );
        Ok(transport)
    }

    /// Run `command` as the connecting user (`sh -c '<command>'`)
    pub async fn run(&self, command: &str) -> Result<()> {
        self.execute(&Invocation::user(command)).await
    }

    /// Run `command` through sudo (`sudo sh -c '<command>'`)
    pub async fn sudo(&self, command: &str) -> Result<()> {
        self.execute(&Invocation::sudo(command)).await
    }

    /// Run an invocation and wait until its channel closes.
    ///
    /// A non-zero exit status is not an error; it only shows up in the relayed
    /// output and the debug log.
    pub async fn execute(&self, invocation: &Invocation) -> Result<()> {
        let transport = self.connect().await?;
        let remote_command = invocation.remote_command();

        self.operator.say(&format!(
            "\n[COMMAND {}]: Executing: {}",
            self.config.host, remote_command
        ));

        let mut channel = transport.open_channel().await?;

        if !channel.request_pty().await? {
            warn!(
                "{} refused a PTY; prompts may not be shown",
                self.config.host
            );
        }

        channel.exec(&remote_command).await?;
        debug!("Exec accepted: {}", remote_command);

        self.drive(&mut channel).await
    }

    /// Release the connection.
    ///
    /// Fails with [`ChairError::NotConnected`] if no connection is held.
    pub async fn close(&self) -> Result<()> {
        let transport = self
            .transport
            .lock()
            .await
            .take()
            .ok_or(ChairError::NotConnected)?;

        transport.disconnect().await?;
        info!("SSH connection to {} closed", self.config.host);
        Ok(())
    }

    /// Poll the channel until it closes, relaying output and answering prompts
    async fn drive<Ch: ExecChannel>(&self, channel: &mut Ch) -> Result<()> {
        let mut interceptor = PromptInterceptor::new();
        let mut stdout = StreamDecoder::new();
        let mut stderr = StreamDecoder::new();

        loop {
            let event = match timeout(self.config.poll_interval, channel.next_event()).await {
                Ok(Some(event)) => event,
                Ok(None) => {
                    debug!("Channel ended without close");
                    break;
                }
                // Still busy
                Err(_) => continue,
            };

            match event {
                ChannelEvent::Data(bytes) => {
                    let text = stdout.decode(&bytes);
                    self.handle_chunk(channel, &mut interceptor, StreamKind::Stdout, &text)
                        .await?
                }
                ChannelEvent::ExtendedData(bytes) => {
                    let text = stderr.decode(&bytes);
                    self.handle_chunk(channel, &mut interceptor, StreamKind::Stderr, &text)
                        .await?
                }
                ChannelEvent::ExitStatus(code) => {
                    debug!("Remote command on {} exited with {}", self.config.host, code);
                }
                ChannelEvent::Eof => debug!("EOF from {}", self.config.host),
                ChannelEvent::Close => {
                    debug!("Channel closed");
                    break;
                }
            }
        }

        // Bytes of a character cut off by the close
        for (decoder, kind) in [
            (&mut stdout, StreamKind::Stdout),
            (&mut stderr, StreamKind::Stderr),
        ] {
            if let Some(rest) = decoder.finish() {
                self.operator
                    .say(&format!("[{}  {}]: {}", kind.label(), self.config.host, rest));
            }
        }

        if interceptor.prompts() > 0 {
            debug!("Answered {} prompt(s)", interceptor.prompts());
        }
        Ok(())
    }

    async fn handle_chunk<Ch: ExecChannel>(
        &self,
        channel: &mut Ch,
        interceptor: &mut PromptInterceptor,
        kind: StreamKind,
        text: &str,
    ) -> Result<()> {
        // Only part of a multibyte character arrived
        if text.is_empty() {
            return Ok(());
        }

        match interceptor.feed(text) {
            ChunkAction::Relay(chunk) => {
                self.operator.say(&format!(
                    "[{}  {}]: {}",
                    kind.label(),
                    self.config.host,
                    chunk
                ));
            }
            ChunkAction::Prompt(prompt) => {
                debug!("Prompt on {} stream", kind.label());
                let secret = self
                    .operator
                    .ask_secret(&format!("[PROMPT  {}]: {} ", self.config.host, prompt))
                    .await?;

                let mut reply = Zeroizing::new(secret.expose_secret().as_bytes().to_vec());
                reply.push(b'\n');
                channel.send(&reply).await?;
                interceptor.secret_sent();
            }
        }

        Ok(())
    }
}

impl<C: Connector, O: Operator> std::fmt::Debug for RemoteSession<C, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSession")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("username", &self.config.username)
            .finish()
    }
}
