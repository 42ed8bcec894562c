//! # Telemetry Pipeline
//!
//! The poll, aggregate and deliver core of the telemetry agent.
//!
//! ## Architecture
//!
//! ```text
//!  Poller (runtime) ──┐
//!                     ├──> Scheduler ──> rendezvous channel ──> ReporterPool ──> HTTP
//!  Poller (host)    ──┘                                         (N Reporters or a Flusher)
//! ```
//!
//! - **`snapshot`**: The gauge/counter pair a poller owns, and its wire-level records
//! - **`poller`**: A source's live snapshot plus the `Sampler` that fills it
//! - **`launcher`**: Runs one poller on a fixed interval
//! - **`scheduler`**: Waits for every poller, then fans their snapshots into one channel per tick
//! - **`reporter`**: Encodes, compresses, signs and posts one snapshot at a time
//! - **`transport`**: The HTTP round trip and its bounded retry decorator
//! - **`pool`**: Competing reporters (or a draining flusher) on the shared channel
//! - **`agent`**: Wires everything under one cancellation token
//!
//! Data only flows towards the network. The single control path back is the shared
//! [`CancellationToken`](tokio_util::sync::CancellationToken).

#[macro_use]
extern crate tracing;

pub mod agent;
pub mod launcher;
pub mod poller;
pub mod pool;
pub mod reporter;
pub mod scheduler;
pub mod snapshot;
pub mod transport;

pub use agent::{
    Agent,
    AgentSettings,
    AgentState,
};
pub use launcher::PollerLauncher;
pub use poller::{
    Poller,
    Sampler,
};
pub use pool::{
    ReporterPool,
    ReporterPoolHandle,
};
pub use reporter::{
    ReportError,
    Reporter,
    SigningKey,
    SIGNATURE_HEADER,
    UPDATES_PATH,
};
pub use scheduler::Scheduler;
pub use snapshot::{
    Counters,
    Gauges,
    Metric,
    MetricKind,
    Snapshot,
};
pub use transport::{
    http::HttpTransport,
    retry::RetryableTransport,
    Reply,
    Request,
    Transport,
    TransportError,
};
