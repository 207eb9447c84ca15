//! Integration flows.

pub mod queue_flows;

#[cfg(unix)]
pub mod host_flows;
#[cfg(unix)]
pub mod pipe_flows;
