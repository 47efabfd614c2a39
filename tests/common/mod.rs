//! Scripted transport and operator used by the session tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::time::Instant;

use chair::console::Operator;
use chair::error::{ChairError, Result};
use chair::ssh::{ChannelEvent, Connector, ExecChannel, RemoteSession, SshConfig, Transport};

pub const HOST: &str = "mock.host";

/// Everything the session did, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Exec(String),
    Sent(Vec<u8>),
    Said(String),
    Asked(String),
    Disconnect,
}

#[derive(Debug, Clone, Default)]
pub struct Log(Arc<Mutex<Vec<Entry>>>);

impl Log {
    pub fn push(&self, entry: Entry) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.0.lock().unwrap().clone()
    }

    pub fn execs(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|e| match e {
                Entry::Exec(cmd) => Some(cmd),
                _ => None,
            })
            .collect()
    }

    pub fn asked(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|e| match e {
                Entry::Asked(prompt) => Some(prompt),
                _ => None,
            })
            .collect()
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.entries()
            .into_iter()
            .filter_map(|e| match e {
                Entry::Sent(data) => Some(data),
                _ => None,
            })
            .collect()
    }

    pub fn said(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|e| match e {
                Entry::Said(line) => Some(line),
                _ => None,
            })
            .collect()
    }

    pub fn position(&self, entry: &Entry) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }
}

#[derive(Debug, Clone)]
pub enum Step {
    Event(ChannelEvent),
    /// Produce nothing for this long
    Stall(Duration),
}

/// What one channel does once opened
#[derive(Debug, Clone)]
pub struct ChannelScript {
    pub pty_granted: bool,
    pub exec_accepted: bool,
    pub steps: Vec<Step>,
}

impl ChannelScript {
    pub fn new() -> Self {
        Self {
            pty_granted: true,
            exec_accepted: true,
            steps: Vec::new(),
        }
    }

    pub fn stdout(mut self, text: &str) -> Self {
        self.steps
            .push(Step::Event(ChannelEvent::Data(text.as_bytes().to_vec())));
        self
    }

    /// Raw stdout bytes, for output cut inside a character
    pub fn stdout_bytes(mut self, bytes: &[u8]) -> Self {
        self.steps.push(Step::Event(ChannelEvent::Data(bytes.to_vec())));
        self
    }

    pub fn stderr(mut self, text: &str) -> Self {
        self.steps.push(Step::Event(ChannelEvent::ExtendedData(
            text.as_bytes().to_vec(),
        )));
        self
    }

    pub fn exit(mut self, code: u32) -> Self {
        self.steps.push(Step::Event(ChannelEvent::ExitStatus(code)));
        self.steps.push(Step::Event(ChannelEvent::Eof));
        self
    }

    pub fn close(mut self) -> Self {
        self.steps.push(Step::Event(ChannelEvent::Close));
        self
    }

    pub fn stall(mut self, millis: u64) -> Self {
        self.steps.push(Step::Stall(Duration::from_millis(millis)));
        self
    }

    pub fn refuse_exec(mut self) -> Self {
        self.exec_accepted = false;
        self
    }

    pub fn refuse_pty(mut self) -> Self {
        self.pty_granted = false;
        self
    }
}

pub struct MockConnector {
    log: Log,
    scripts: Arc<Mutex<VecDeque<ChannelScript>>>,
    connects: Arc<AtomicUsize>,
    failure: Option<String>,
}

impl MockConnector {
    pub fn new(log: Log, scripts: Vec<ChannelScript>) -> Self {
        Self {
            log,
            scripts: Arc::new(Mutex::new(scripts.into())),
            connects: Arc::new(AtomicUsize::new(0)),
            failure: None,
        }
    }

    pub fn failing(log: Log, message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new(log, Vec::new())
        }
    }

    pub fn connects(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.connects)
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&self, _config: &SshConfig) -> Result<MockTransport> {
        if let Some(ref message) = self.failure {
            return Err(ChairError::connection(message.clone()));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(MockTransport {
            log: self.log.clone(),
            scripts: Arc::clone(&self.scripts),
        })
    }
}

pub struct MockTransport {
    log: Log,
    scripts: Arc<Mutex<VecDeque<ChannelScript>>>,
}

#[async_trait]
impl Transport for MockTransport {
    type Channel = MockChannel;

    async fn open_channel(&self) -> Result<MockChannel> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ChairError::connection("no scripted channel left"))?;

        Ok(MockChannel {
            log: self.log.clone(),
            pty_granted: script.pty_granted,
            exec_accepted: script.exec_accepted,
            steps: script.steps.into(),
            stall_until: None,
        })
    }

    async fn disconnect(&self) -> Result<()> {
        self.log.push(Entry::Disconnect);
        Ok(())
    }
}

pub struct MockChannel {
    log: Log,
    pty_granted: bool,
    exec_accepted: bool,
    steps: VecDeque<Step>,
    stall_until: Option<Instant>,
}

#[async_trait]
impl ExecChannel for MockChannel {
    async fn request_pty(&mut self) -> Result<bool> {
        Ok(self.pty_granted)
    }

    async fn exec(&mut self, command: &str) -> Result<()> {
        self.log.push(Entry::Exec(command.to_string()));
        if self.exec_accepted {
            Ok(())
        } else {
            Err(ChairError::rejected(command))
        }
    }

    async fn next_event(&mut self) -> Option<ChannelEvent> {
        loop {
            // Deadline lives on self so a cancelled poll resumes the same stall
            if let Some(deadline) = self.stall_until {
                tokio::time::sleep_until(deadline).await;
                self.stall_until = None;
            }

            match self.steps.pop_front()? {
                Step::Event(event) => return Some(event),
                Step::Stall(duration) => self.stall_until = Some(Instant::now() + duration),
            }
        }
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.log.push(Entry::Sent(data.to_vec()));
        Ok(())
    }
}

/// Operator that records output and hands out queued secrets
pub struct ScriptedOperator {
    log: Log,
    secrets: Mutex<VecDeque<String>>,
}

impl ScriptedOperator {
    pub fn new(log: Log, secrets: &[&str]) -> Self {
        Self {
            log,
            secrets: Mutex::new(secrets.iter().map(|s| s.to_string()).collect()),
        }
    }
}

#[async_trait]
impl Operator for ScriptedOperator {
    fn say(&self, line: &str) {
        self.log.push(Entry::Said(line.to_string()));
    }

    async fn ask_secret(&self, prompt: &str) -> Result<SecretString> {
        self.log.push(Entry::Asked(prompt.to_string()));
        let secret = self
            .secrets
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ChairError::prompt_relay("no terminal attached"))?;
        Ok(SecretString::new(secret.into_boxed_str()))
    }
}

pub fn test_config() -> SshConfig {
    SshConfig::new(HOST, "bob").with_poll_interval(Duration::from_millis(5))
}

/// Session over scripted channels; returns the shared log as well
pub fn scripted_session(
    scripts: Vec<ChannelScript>,
    secrets: &[&str],
) -> (RemoteSession<MockConnector, ScriptedOperator>, Log) {
    let log = Log::default();
    let session = RemoteSession::with_parts(
        test_config(),
        MockConnector::new(log.clone(), scripts),
        ScriptedOperator::new(log.clone(), secrets),
    );
    (session, log)
}
