//! Transport configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::TransportError;
use crate::{DEFAULT_MAX_MESSAGE_BYTES, DEFAULT_READ_CHUNK_SIZE};

/// Pipe transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Directory holding Unix domain socket files. Ignored on Windows.
    pub pipe_dir: PathBuf,
    /// Chunk size used when reading a message body.
    pub read_chunk_size: usize,
    /// Largest message accepted or sent.
    pub max_message_bytes: usize,
    /// Pause after a failed bind/accept before the listen loop retries.
    pub accept_error_backoff: Duration,
    /// Client connection attempts while no endpoint is available.
    pub connect_attempts: u32,
    /// Delay between client connection attempts.
    pub connect_retry_delay: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            pipe_dir: env::temp_dir().join("pipe-broker"),
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            accept_error_backoff: Duration::from_millis(100),
            connect_attempts: 50,
            connect_retry_delay: Duration::from_millis(20),
        }
    }
}

impl TransportConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `BROKER_PIPE_DIR`: socket directory (default: `$TMPDIR/pipe-broker`)
    /// - `BROKER_READ_CHUNK`: read chunk size in bytes (default: 4096)
    /// - `BROKER_MAX_MESSAGE_BYTES`: message size limit (default: 16 MiB)
    /// - `BROKER_ACCEPT_BACKOFF_MS`: listen retry pause (default: 100)
    /// - `BROKER_CONNECT_ATTEMPTS`: client connect attempts (default: 50)
    /// - `BROKER_CONNECT_RETRY_MS`: delay between attempts (default: 20)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            pipe_dir: env::var("BROKER_PIPE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.pipe_dir),

            read_chunk_size: parse_env("BROKER_READ_CHUNK").unwrap_or(defaults.read_chunk_size),

            max_message_bytes: parse_env("BROKER_MAX_MESSAGE_BYTES")
                .unwrap_or(defaults.max_message_bytes),

            accept_error_backoff: parse_env("BROKER_ACCEPT_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.accept_error_backoff),

            connect_attempts: parse_env("BROKER_CONNECT_ATTEMPTS")
                .unwrap_or(defaults.connect_attempts),

            connect_retry_delay: parse_env("BROKER_CONNECT_RETRY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.connect_retry_delay),
        }
    }

    /// Configuration rooted at a specific socket directory.
    pub fn with_pipe_dir(pipe_dir: impl Into<PathBuf>) -> Self {
        Self {
            pipe_dir: pipe_dir.into(),
            ..Self::default()
        }
    }

    /// Reject settings the transport cannot operate with.
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.read_chunk_size == 0 {
            return Err(TransportError::Config(
                "read_chunk_size must be greater than zero".into(),
            ));
        }
        if self.max_message_bytes < self.read_chunk_size {
            return Err(TransportError::Config(format!(
                "max_message_bytes ({}) is smaller than read_chunk_size ({})",
                self.max_message_bytes, self.read_chunk_size
            )));
        }
        if self.max_message_bytes > u32::MAX as usize {
            return Err(TransportError::Config(
                "max_message_bytes does not fit the 32-bit frame header".into(),
            ));
        }
        if self.connect_attempts == 0 {
            return Err(TransportError::Config(
                "connect_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}
