//! codis-scrape: fetching and navigating Codis dashboard statistics.
//!
//! # Architecture
//!
//! ```text
//! Fetch::fetch(uri)        → serde_json::Value
//!   └── navigate(uri, &v)  → EndpointSamples
//!         └── StatsDocument::parse (layered, validated views)
//! ```
//!
//! Every failure along the way is a [`ScrapeError`] and ends the endpoint's
//! contribution to the current pass.

pub mod document;
pub mod error;
pub mod fetcher;
pub mod navigator;

pub use document::StatsDocument;
pub use error::{ScrapeError, Shape};
pub use fetcher::{Fetch, HttpFetcher};
pub use navigator::{EndpointSamples, Sample, navigate};
