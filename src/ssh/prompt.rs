//! Interactive prompt detection for channel output
//!
//! Output arrives in arbitrary chunks, not lines. [`PromptInterceptor`] keeps
//! the per-invocation state needed to decide, chunk by chunk, whether the
//! remote side is waiting for a secret:
//!
//! - A chunk containing `password` (any case) or `Sorry, try again` is always a
//!   new prompt occurrence. `sudo` re-emits its prompt after a bad password, so
//!   every such chunk is answered.
//! - A prompt split over several chunks (`[sudo] pass` + `word for bob: `) is
//!   caught on the unterminated line, at most once per line. Only the last
//!   few bytes of earlier chunks are carried over, enough to complete a marker.
//!
//! After a match the interceptor sits in [`PromptState::AwaitingSecret`] until
//! [`PromptInterceptor::secret_sent`] is called.

/// Case-insensitive prompt marker
const PASSWORD_MARKER: &str = "password";

/// Case-sensitive marker printed by sudo after a failed attempt
const RETRY_MARKER: &str = "Sorry, try again";

/// Bytes of earlier output kept for matching a marker split across chunks
const CARRY_BYTES: usize = if PASSWORD_MARKER.len() > RETRY_MARKER.len() {
    PASSWORD_MARKER.len() - 1
} else {
    RETRY_MARKER.len() - 1
};

/// Returns `true` if `text` looks like a request for a secret.
pub fn is_prompt(text: &str) -> bool {
    text.to_lowercase().contains(PASSWORD_MARKER) || text.contains(RETRY_MARKER)
}

/// Output stream a chunk arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Primary channel data
    Stdout,
    /// Extended data (stderr)
    Stderr,
}

impl StreamKind {
    /// Tag used when relaying output to the operator
    pub fn label(self) -> &'static str {
        match self {
            StreamKind::Stdout => "STDOUT",
            StreamKind::Stderr => "ERROR",
        }
    }
}

/// State of a single invocation's output handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromptState {
    /// Chunks are relayed to the operator
    #[default]
    AwaitingOutput,
    /// A prompt was seen; the next step is sending the secret
    AwaitingSecret,
}

/// What to do with a chunk of output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkAction {
    /// Forward the chunk to the operator unchanged
    Relay(String),
    /// Ask the operator for a secret, showing this text
    Prompt(String),
}

/// Per-invocation prompt state machine
#[derive(Debug, Default)]
pub struct PromptInterceptor {
    state: PromptState,
    /// Tail of the current unterminated line
    partial_line: String,
    /// A secret was already sent for the prompt on `partial_line`
    answered_line: bool,
    prompts: usize,
}

impl PromptInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    pub fn state(&self) -> PromptState {
        self.state
    }

    /// Number of prompts detected so far
    pub fn prompts(&self) -> usize {
        self.prompts
    }

    /// Classify one chunk of output.
    ///
    /// Returns [`ChunkAction::Prompt`] and moves to `AwaitingSecret` on a match.
    /// Feeding a chunk while a secret is still owed is a caller bug; the chunk
    /// is relayed so that nothing is lost.
    pub fn feed(&mut self, chunk: &str) -> ChunkAction {
        if self.state == PromptState::AwaitingSecret {
            return ChunkAction::Relay(chunk.to_string());
        }

        let fresh_match = is_prompt(chunk);

        let split_match = match chunk.rfind('\n') {
            Some(idx) => {
                self.partial_line.clear();
                self.partial_line.push_str(&chunk[idx + 1..]);
                self.answered_line = false;
                false
            }
            None => {
                self.trim_partial_line();
                self.partial_line.push_str(chunk);
                !self.answered_line && is_prompt(&self.partial_line)
            }
        };

        if fresh_match {
            self.enter_prompt();
            return ChunkAction::Prompt(chunk.to_string());
        }

        if split_match {
            self.enter_prompt();
            return ChunkAction::Prompt(self.partial_line.clone());
        }

        ChunkAction::Relay(chunk.to_string())
    }

    /// Record that the secret was written back to the channel
    pub fn secret_sent(&mut self) {
        self.state = PromptState::AwaitingOutput;
    }

    /// Drop all but the last `CARRY_BYTES` of the carried line
    fn trim_partial_line(&mut self) {
        if self.partial_line.len() <= CARRY_BYTES {
            return;
        }
        let mut start = self.partial_line.len() - CARRY_BYTES;
        while !self.partial_line.is_char_boundary(start) {
            start += 1;
        }
        self.partial_line.drain(..start);
    }

    fn enter_prompt(&mut self) {
        self.state = PromptState::AwaitingSecret;
        self.answered_line = true;
        self.prompts += 1;
    }
}

/// Incremental UTF-8 decoder for one output stream
///
/// A multibyte character split across two packets is held back until the
/// rest arrives instead of being replaced. Invalid sequences still become
/// U+FFFD.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    pending: Vec<u8>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `bytes`, keeping an incomplete trailing sequence for later
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();

        loop {
            let (valid, invalid_len) = match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(e) => (e.valid_up_to(), e.error_len()),
            };

            out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
            match invalid_len {
                Some(len) => {
                    out.push(char::REPLACEMENT_CHARACTER);
                    self.pending.drain(..valid + len);
                }
                None => {
                    self.pending.drain(..valid);
                    return out;
                }
            }
        }
    }

    /// Flush whatever is still held back, e.g. when the channel closes
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(rest)
    }
}
