//! # Metric Sources
//!
//! Concrete samplers plugged into [`Poller`](telemetry_agent_pipeline::Poller)s.
//!
//! - **`RuntimeSampler`**: statistics of the agent process itself, a random gauge and the poll counter
//! - **`HostSampler`**: memory and per-CPU utilisation of the host
//!
//! Both follow the sampling contract: gauges are overwritten, counters are
//! added to, and anything the platform cannot report is left out.

#[macro_use]
extern crate tracing;

pub mod host;
pub mod runtime;

pub use host::HostSampler;
pub use runtime::RuntimeSampler;
