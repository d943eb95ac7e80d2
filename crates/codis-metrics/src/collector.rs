//! Pass orchestrator: one full collection across every Codis endpoint.
//!
//! A pass holds the collector lock from registry reset to snapshot, so a
//! concurrent scrape waits for the running pass and never observes a
//! half-built registry. Inside the pass a producer visits endpoints one at
//! a time and streams results over a bounded channel to a consumer that owns
//! the registry until the producer hangs up.

use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use codis_core::catalog::{
    EXPORTER_LAST_SCRAPE_DURATION, EXPORTER_LAST_SCRAPE_ERROR, EXPORTER_SCRAPES_TOTAL, UP,
};
use codis_core::{ConfigError, ExporterConfig};
use codis_scrape::{EndpointSamples, Fetch, HttpFetcher, ScrapeError, navigate};

use crate::prometheus::render_prometheus;
use crate::registry::{MetricFamily, MetricKind, Registry};

/// Capacity of the producer → consumer result queue.
const RESULT_QUEUE_DEPTH: usize = 64;

/// Failure to build a collector from configuration.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),

    #[error("http client: {0}")]
    Client(#[from] ScrapeError),
}

/// A runtime-named metric value for one endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeResult {
    pub name: String,
    pub addr: String,
    pub value: f64,
}

enum PassEvent {
    /// Complete batch of a successfully navigated endpoint.
    Endpoint(EndpointSamples),
    AdHoc(ScrapeResult),
}

#[derive(Debug, Default, Clone, Copy)]
struct PassTally {
    visited: u64,
    errors: u64,
}

struct CollectorState {
    registry: Registry,
    /// Endpoints visited over the process lifetime.
    total_scrapes: u64,
    last_duration: Duration,
    last_errors: u64,
}

/// Result of one pass: bookkeeping followed by the full registry.
#[derive(Debug, Clone)]
pub struct Exposition {
    pub namespace: String,
    pub families: Vec<MetricFamily>,
}

impl Exposition {
    pub fn family(&self, name: &str) -> Option<&MetricFamily> {
        self.families.iter().find(|f| f.name == name)
    }

    /// Value of one series, if present.
    pub fn get(&self, name: &str, labels: &[&str]) -> Option<f64> {
        self.family(name).and_then(|f| f.get(labels))
    }

    pub fn render(&self) -> String {
        render_prometheus(&self.namespace, &self.families)
    }
}

/// Collects Codis dashboard statistics into a fresh registry per pass.
pub struct CodisCollector<F = HttpFetcher> {
    endpoints: Vec<String>,
    namespace: String,
    fetcher: F,
    state: Mutex<CollectorState>,
}

impl CodisCollector<HttpFetcher> {
    /// Build a collector backed by the HTTP fetcher from a validated config.
    pub fn from_config(config: &ExporterConfig) -> Result<Self, CollectorError> {
        config.validate()?;
        let fetcher = HttpFetcher::new(config.request_timeout()?)?;
        let endpoints = config
            .endpoints
            .iter()
            .filter(|e| !e.trim().is_empty())
            .cloned()
            .collect();
        Ok(Self::new(endpoints, &config.namespace, fetcher))
    }
}

impl<F: Fetch> CodisCollector<F> {
    pub fn new(endpoints: Vec<String>, namespace: &str, fetcher: F) -> Self {
        Self {
            endpoints,
            namespace: namespace.to_string(),
            fetcher,
            state: Mutex::new(CollectorState {
                registry: Registry::with_catalog(),
                total_scrapes: 0,
                last_duration: Duration::ZERO,
                last_errors: 0,
            }),
        }
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Run one full pass and return its snapshot.
    ///
    /// Never fails: endpoint errors are counted and reported through the
    /// `up` series and the error gauge.
    pub async fn collect(&self) -> Exposition {
        let mut state = self.state.lock().await;
        let started = Instant::now();

        state.registry.reset_catalog();

        let (tx, rx) = mpsc::channel(RESULT_QUEUE_DEPTH);
        let (tally, ()) = tokio::join!(self.produce(tx), drain(&mut state.registry, rx));

        state.total_scrapes += tally.visited;
        state.last_duration = started.elapsed();
        state.last_errors = tally.errors;

        debug!(
            endpoints = tally.visited,
            errors = tally.errors,
            duration_ms = state.last_duration.as_millis() as u64,
            "codis collection pass finished"
        );

        self.exposition(&state)
    }

    async fn produce(&self, tx: mpsc::Sender<PassEvent>) -> PassTally {
        let mut tally = PassTally::default();

        for uri in &self.endpoints {
            tally.visited += 1;
            info!(endpoint = %uri, "collecting info from codis");

            let up = match self.scrape_endpoint(uri).await {
                Ok(batch) => {
                    let _ = tx.send(PassEvent::Endpoint(batch)).await;
                    1.0
                }
                Err(e) => {
                    tally.errors += 1;
                    if e.is_fetch() {
                        warn!(endpoint = %uri, error = %e, "codis endpoint unreachable");
                    } else {
                        warn!(endpoint = %uri, error = %e, "codis stats rejected");
                    }
                    0.0
                }
            };

            let _ = tx
                .send(PassEvent::AdHoc(ScrapeResult {
                    name: UP.to_string(),
                    addr: uri.clone(),
                    value: up,
                }))
                .await;
        }

        tally
    }

    async fn scrape_endpoint(&self, uri: &str) -> Result<EndpointSamples, ScrapeError> {
        let doc = self.fetcher.fetch(uri).await?;
        navigate(uri, &doc)
    }

    fn exposition(&self, state: &CollectorState) -> Exposition {
        let mut families = vec![
            MetricFamily::single(
                EXPORTER_LAST_SCRAPE_DURATION,
                "The last scrape duration.",
                MetricKind::Gauge,
                state.last_duration.as_secs_f64(),
            ),
            MetricFamily::single(
                EXPORTER_SCRAPES_TOTAL,
                "Current total codis scrapes.",
                MetricKind::Counter,
                state.total_scrapes as f64,
            ),
            MetricFamily::single(
                EXPORTER_LAST_SCRAPE_ERROR,
                "The last scrape error status.",
                MetricKind::Gauge,
                state.last_errors as f64,
            ),
        ];
        families.extend(state.registry.snapshot());

        Exposition {
            namespace: self.namespace.clone(),
            families,
        }
    }
}

/// Consume pass events into the registry until the producer hangs up.
async fn drain(registry: &mut Registry, mut rx: mpsc::Receiver<PassEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            PassEvent::Endpoint(batch) => {
                for sample in batch.samples {
                    if let Err(e) = registry.record(sample) {
                        warn!(endpoint = %batch.endpoint, error = %e, "sample rejected");
                    }
                }
            }
            PassEvent::AdHoc(result) => {
                if let Err(e) = registry.record_ad_hoc(&result.name, &result.addr, result.value) {
                    warn!(metric = %result.name, error = %e, "ad hoc sample rejected");
                }
            }
        }
    }
}
