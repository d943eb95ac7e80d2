//! codis-metrics: per-pass registry and Prometheus exposition for Codis.
//!
//! # Architecture
//!
//! ```text
//! CodisCollector::collect()         (holds the collector lock)
//!   ├── Registry::reset_catalog()
//!   ├── producer: for each endpoint
//!   │     Fetch::fetch → navigate → PassEvent ──┐ bounded mpsc
//!   ├── consumer: drain events into Registry ◄──┘
//!   └── Exposition (bookkeeping + registry snapshot)
//!
//! Prometheus exposition
//!   └── render_prometheus() → text/plain for /metrics endpoint
//! ```

pub mod collector;
pub mod prometheus;
pub mod registry;

pub use collector::{CodisCollector, CollectorError, Exposition, ScrapeResult};
pub use prometheus::render_prometheus;
pub use registry::{MetricFamily, MetricKind, MetricVec, Registry, RegistryError};
