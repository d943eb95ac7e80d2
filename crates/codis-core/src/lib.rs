pub mod catalog;
pub mod config;

pub use catalog::{LabelSchema, MetricDef};
pub use config::{ConfigError, ExporterConfig};
