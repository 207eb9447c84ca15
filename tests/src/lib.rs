//! # Pipe Broker Test Suite
//!
//! Cross-crate flows that no single crate can test on its own.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Criterion benchmarks (queue publish, pipe round trip)
//! └── src/integration/
//!     ├── queue_flows.rs   # Ordering, isolation, store atomicity
//!     ├── pipe_flows.rs    # Server/client over real OS endpoints
//!     └── host_flows.rs    # Broker host end to end via RemotePublisher
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p broker-tests
//! cargo test -p broker-tests integration::pipe_flows
//! cargo bench -p broker-tests
//! ```

pub mod integration;
