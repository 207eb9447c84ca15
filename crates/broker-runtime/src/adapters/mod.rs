//! # Adapters
//!
//! Bridges between the in-process queues and the named-pipe transport.
//!
//! - [`PipeMessageQueueStore`]: store whose queues accept messages from
//!   other processes.
//! - [`RemotePublisher`]: publishes to a queue hosted by another process.

pub mod pipe_store;
pub mod remote_publisher;

pub use pipe_store::PipeMessageQueueStore;
pub use remote_publisher::RemotePublisher;
