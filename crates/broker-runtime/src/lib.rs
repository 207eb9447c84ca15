//! # Broker Runtime
//!
//! Hosts message queues for a set of channels and exposes them to other
//! processes over the named-pipe transport.
//!
//! ## Modules
//!
//! - `config/` - Host configuration from the environment
//! - `adapters/` - Pipe-backed queue store and remote publisher
//! - `handlers/` - Subscribers attached to every hosted channel
//! - `runtime/` - Startup, metrics sampling and shutdown

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod runtime;

pub use adapters::{PipeMessageQueueStore, RemotePublisher};
pub use config::{ConfigError, HostConfig, StoreKind};
pub use handlers::LoggingSubscriber;
pub use runtime::BrokerRuntime;

/// Priority of the pipe-backed store; wins over the in-process store.
pub const NAMED_PIPE_STORE_PRIORITY: i32 = 10;
