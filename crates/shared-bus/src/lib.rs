//! # Shared Bus - In-Process Message Queues
//!
//! Named FIFO queues with asynchronous delivery, and the store that maps
//! channel names to queue instances.
//!
//! ```text
//! ┌──────────────┐  publish()   ┌──────────────────┐  on_arrived()  ┌──────────────┐
//! │  Publisher   │ ───────────→ │  MessageQueue    │ ─────────────→ │  Subscriber  │
//! └──────────────┘   (enqueue)  │  FIFO+dispatcher │   (per queue)  └──────────────┘
//!                               └──────────────────┘
//!                                        ↑
//!                         get_message_queue(channel)
//!                                        │
//!                               ┌──────────────────┐
//!                               │ MessageQueueStore│
//!                               └──────────────────┘
//! ```
//!
//! ## Delivery Guarantees
//!
//! - **At-most-once:** A message is handed to each subscriber once; a failing
//!   subscriber does not trigger redelivery.
//! - **Ordering:** One dispatcher per queue, so a single producer observes
//!   strict FIFO delivery. Across producers only per-producer order holds.
//! - **Isolation:** A subscriber error or panic is logged and swallowed.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod config;
pub mod events;
pub mod queue;
pub mod store;

// Re-export main types
pub use config::BusConfig;
pub use events::{handler_fn, ArrivalHandler, FnHandler, HandlerError, MessageArrived};
pub use queue::{MessagePublisher, MessageQueue, PublishError, SubscriptionId};
pub use store::{select_store, InMemoryMessageQueueStore, MessageQueueStore};

/// Queue depth above which a warning is logged on every publish.
pub const DEFAULT_DEPTH_WARNING_THRESHOLD: usize = 10_000;

/// Priority of the in-process store; alternate stores rank above it.
pub const IN_PROCESS_STORE_PRIORITY: i32 = 0;
