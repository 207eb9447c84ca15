//! # Shared Types Crate
//!
//! Types shared by every crate in the broker workspace.
//!
//! ## Design Principles
//!
//! - **Opaque payloads**: The queue core never inspects `content`; it only
//!   needs it for diagnostics when a subscriber fails.
//! - **Text on the wire**: Envelopes cross process boundaries as UTF-8 JSON,
//!   so the pipe transport can stay payload-agnostic.

pub mod envelope;
pub mod errors;

pub use envelope::{BrokeredMessage, MessageId};
pub use errors::MessageError;
