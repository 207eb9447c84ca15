//! # `BrokeredMessage` Envelope
//!
//! The envelope carried through message queues and across the pipe
//! transport.
//!
//! ## Properties
//!
//! - **Versioning**: Every envelope carries a `version` field checked on decode.
//! - **Identity**: `id` is generated once at creation and survives re-publishing.
//! - **Routing**: `channel` records the channel the message was addressed to;
//!   it is a hint only, the queue a message sits in is authoritative.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::MessageError;

/// Unique identifier of a brokered message.
pub type MessageId = Uuid;

/// Envelope of payload plus routing metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokeredMessage {
    /// Envelope format version.
    pub version: u16,

    /// Unique message identifier.
    pub id: MessageId,

    /// Channel this message was addressed to.
    pub channel: String,

    /// Free-form routing metadata owned by the messaging layer.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Opaque payload.
    pub content: serde_json::Value,

    /// Creation time in milliseconds since the unix epoch.
    pub timestamp: u64,
}

impl BrokeredMessage {
    /// Current envelope version.
    pub const CURRENT_VERSION: u16 = 1;

    /// Create a new envelope addressed to `channel`.
    #[must_use]
    pub fn new(channel: impl Into<String>, content: serde_json::Value) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            id: Uuid::new_v4(),
            channel: channel.into(),
            headers: BTreeMap::new(),
            content,
            timestamp: now_millis(),
        }
    }

    /// Attach a routing header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Look up a routing header.
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// Encode as JSON text for the pipe transport.
    pub fn to_json(&self) -> Result<String, MessageError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from JSON text, rejecting unknown envelope versions.
    pub fn from_json(text: &str) -> Result<Self, MessageError> {
        let message: Self = serde_json::from_str(text)?;
        if message.version != Self::CURRENT_VERSION {
            return Err(MessageError::UnsupportedVersion {
                received: message.version,
                supported: Self::CURRENT_VERSION,
            });
        }
        Ok(message)
    }
}

impl fmt::Display for BrokeredMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}@{}] {}", self.id, self.channel, self.content)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
