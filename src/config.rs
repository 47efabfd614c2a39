//! Settings file and CLI argument parsing for chair
//!
//! Settings come from a YAML file:
//!
//! ```yaml
//! host: example.com
//! user: deploy
//! port: 22
//! options:
//!   identity_file: ~/.ssh/deploy_ed25519
//!   connect_timeout_secs: 30
//!   poll_interval_ms: 100
//! ```
//!
//! `--host`, `--user` and `--port` (or `CHAIR_HOST`, `CHAIR_USER`,
//! `CHAIR_PORT`) override the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ChairError, Result};
use crate::ssh::config::{
    SshConfig, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_PORT,
};

/// Settings file read when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "chair.yaml";

/// chair CLI arguments
#[derive(Parser, Debug, Clone)]
#[command(name = "chair")]
#[command(version)]
#[command(about = "Run shell commands on a remote host over SSH, relaying sudo password prompts")]
pub struct Args {
    /// Path to the YAML settings file
    #[arg(long, short = 'c', default_value = DEFAULT_CONFIG_FILE, env = "CHAIR_CONFIG")]
    pub config: PathBuf,

    /// Remote host (overrides the settings file)
    #[arg(long, env = "CHAIR_HOST")]
    pub host: Option<String>,

    /// Remote user (overrides the settings file)
    #[arg(long, env = "CHAIR_USER")]
    pub user: Option<String>,

    /// SSH port (overrides the settings file)
    #[arg(long, env = "CHAIR_PORT")]
    pub port: Option<u16>,

    #[command(subcommand)]
    pub command: Command,
}

/// What to do on the remote host
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run a command as the connecting user
    Run {
        /// Shell fragment, passed to `sh -c`
        command: String,
    },

    /// Run a command through sudo
    Sudo {
        /// Shell fragment, passed to `sudo sh -c`
        command: String,
    },

    /// Copy a file or directory on the remote host
    Copy {
        from: String,
        to: String,

        /// Extra flags for cp, e.g. "-rp"
        #[arg(long, allow_hyphen_values = true)]
        flags: Option<String>,

        /// Run through sudo
        #[arg(long)]
        sudo: bool,
    },

    /// Create or replace a symlink on the remote host
    Link {
        target: String,
        destination: String,

        /// Run through sudo
        #[arg(long)]
        sudo: bool,
    },
}

/// Transport settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportOptions {
    /// Password for SSH authentication
    pub password: Option<String>,

    /// Private key file for SSH authentication (`~/` is expanded)
    pub identity_file: Option<PathBuf>,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Channel polling interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            password: None,
            identity_file: None,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Parsed and validated settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Remote host
    pub host: String,

    /// Remote user
    pub user: String,

    /// SSH port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Transport-specific options
    #[serde(default)]
    pub options: TransportOptions,
}

impl Settings {
    /// Settings for `user@host` with default options
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            port: DEFAULT_PORT,
            options: TransportOptions::default(),
        }
    }

    /// Parse settings from YAML text without validating them
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| ChairError::config(format!("Invalid settings: {}", e)))
    }

    /// Load and validate a settings file
    pub fn from_file(path: &Path) -> Result<Self> {
        let settings = read_settings_file(path)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Build settings from the settings file and CLI overrides.
    ///
    /// The file may be missing only if `--host` and `--user` are both given.
    pub fn resolve(args: &Args) -> Result<Self> {
        let mut settings = if args.config.exists() {
            read_settings_file(&args.config)?
        } else {
            match (&args.host, &args.user) {
                (Some(host), Some(user)) => {
                    debug!(
                        "No settings file at {}, using command line only",
                        args.config.display()
                    );
                    Settings::new(host, user)
                }
                _ => {
                    return Err(ChairError::config(format!(
                        "Settings file not found: {}",
                        args.config.display()
                    )))
                }
            }
        };

        if let Some(ref host) = args.host {
            settings.host = host.clone();
        }
        if let Some(ref user) = args.user {
            settings.user = user.clone();
        }
        if let Some(port) = args.port {
            settings.port = port;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Check required fields and value ranges
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.host.trim().is_empty() {
            errors.push("Missing required host".to_string());
        }

        if self.user.trim().is_empty() {
            errors.push("Missing required user".to_string());
        }

        if self.port == 0 {
            errors.push("Port must be between 1 and 65535".to_string());
        }

        if self.options.poll_interval_ms == 0 {
            errors.push("poll_interval_ms must be greater than zero".to_string());
        }

        if self.options.connect_timeout_secs == 0 {
            errors.push("connect_timeout_secs must be greater than zero".to_string());
        }

        if let Some(ref key_path) = self.options.identity_file {
            let key_path = expand_home(key_path);
            if !key_path.exists() {
                errors.push(format!("SSH key file not found: {}", key_path.display()));
            }
        }

        if !errors.is_empty() {
            return Err(ChairError::Config(format!(
                "Configuration error:\n{}",
                errors.join("\n")
            )));
        }

        Ok(())
    }

    /// Connection parameters for a session, reading the identity file if any
    pub fn to_ssh_config(&self) -> Result<SshConfig> {
        let mut config = SshConfig::new(&self.host, &self.user)
            .with_port(self.port)
            .with_connect_timeout(Duration::from_secs(self.options.connect_timeout_secs))
            .with_poll_interval(Duration::from_millis(self.options.poll_interval_ms));

        if let Some(password) = sanitize_password(self.options.password.clone()) {
            config = config.with_password(password);
        }

        if let Some(ref key_path) = self.options.identity_file {
            let key_path = expand_home(key_path);
            let key = std::fs::read_to_string(&key_path).map_err(|e| {
                ChairError::SshKey(format!("Failed to read {}: {}", key_path.display(), e))
            })?;
            config = config.with_private_key(key);
        }

        Ok(config)
    }
}

fn read_settings_file(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ChairError::config(format!("Failed to read {}: {}", path.display(), e))
    })?;
    serde_yaml::from_str(&content)
        .map_err(|e| ChairError::config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Expand a leading `~/` to the home directory
pub fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

/// Sanitize password: return None if empty
fn sanitize_password(password: Option<String>) -> Option<String> {
    password.filter(|p| !p.is_empty())
}
