//! SSH session module
//!
//! This module provides the remote session, its prompt interception state
//! machine, and the transport seam it runs on.

pub mod config;
pub mod elevation;
pub mod handler;
pub mod prompt;
pub mod session;
pub mod transport;

// Re-exports
pub use config::SshConfig;
pub use elevation::{wrap_shell_command, wrap_sudo_command, Invocation, Privilege};
pub use handler::SshHandler;
pub use prompt::{
    is_prompt, ChunkAction, PromptInterceptor, PromptState, StreamDecoder, StreamKind,
};
pub use session::RemoteSession;
pub use transport::{
    ChannelEvent, Connector, ExecChannel, RusshChannel, RusshConnector, RusshTransport, Transport,
};
