//! Per-pass metric registry.
//!
//! Maps metric name → [`MetricVec`]. The registry is rebuilt from the static
//! catalog at the start of every pass, so a label tuple only survives if the
//! pass re-emits it. Vanished nodes, proxies and roles therefore disappear
//! from the output without any explicit clearing.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use codis_core::catalog::{self, LABEL_ADDR};
use codis_scrape::Sample;

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("unknown metric: {0}")]
    UnknownMetric(String),

    #[error("metric {metric} expects {expected} labels, got {got}")]
    LabelArity {
        metric: String,
        expected: usize,
        got: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
}

impl MetricKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
        }
    }
}

/// A named set of samples keyed by label tuple.
#[derive(Debug, Clone)]
pub struct MetricVec {
    name: String,
    help: Option<String>,
    kind: MetricKind,
    label_names: Vec<String>,
    samples: BTreeMap<Vec<String>, f64>,
}

impl MetricVec {
    pub fn new(name: &str, help: Option<String>, kind: MetricKind, label_names: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            help,
            kind,
            label_names: label_names.iter().map(|l| l.to_string()).collect(),
            samples: BTreeMap::new(),
        }
    }

    /// Upsert the sample for one label tuple.
    pub fn set(&mut self, labels: Vec<String>, value: f64) -> Result<(), RegistryError> {
        if labels.len() != self.label_names.len() {
            return Err(RegistryError::LabelArity {
                metric: self.name.clone(),
                expected: self.label_names.len(),
                got: labels.len(),
            });
        }
        self.samples.insert(labels, value);
        Ok(())
    }

    pub fn get(&self, labels: &[&str]) -> Option<f64> {
        let key: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
        self.samples.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn to_family(&self) -> MetricFamily {
        MetricFamily {
            name: self.name.clone(),
            help: self.help.clone(),
            kind: self.kind,
            label_names: self.label_names.clone(),
            samples: self
                .samples
                .iter()
                .map(|(labels, value)| (labels.clone(), *value))
                .collect(),
        }
    }
}

/// Immutable snapshot of one metric, as handed to the export layer.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub name: String,
    pub help: Option<String>,
    pub kind: MetricKind,
    pub label_names: Vec<String>,
    pub samples: Vec<(Vec<String>, f64)>,
}

impl MetricFamily {
    /// A family with a single unlabeled sample.
    pub fn single(name: &str, help: &str, kind: MetricKind, value: f64) -> Self {
        Self {
            name: name.to_string(),
            help: Some(help.to_string()),
            kind,
            label_names: Vec::new(),
            samples: vec![(Vec::new(), value)],
        }
    }

    pub fn get(&self, labels: &[&str]) -> Option<f64> {
        self.samples
            .iter()
            .find(|(l, _)| l.iter().eq(labels.iter().copied()))
            .map(|(_, v)| *v)
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    vectors: HashMap<String, MetricVec>,
}

impl Registry {
    /// An empty registry with no vectors at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding a fresh vector for every catalog metric.
    pub fn with_catalog() -> Self {
        let mut registry = Self::new();
        registry.reset_catalog();
        registry
    }

    /// Drop every vector, including ad hoc ones, and redeclare the catalog.
    pub fn reset_catalog(&mut self) {
        self.vectors = catalog::static_metrics()
            .map(|def| {
                let vec = MetricVec::new(
                    def.name,
                    Some(def.help()),
                    MetricKind::Gauge,
                    def.schema.label_names(),
                );
                (def.name.to_string(), vec)
            })
            .collect();
    }

    /// Record a catalog sample. The metric must already be declared.
    pub fn record(&mut self, sample: Sample) -> Result<(), RegistryError> {
        let vec = self
            .vectors
            .get_mut(sample.metric)
            .ok_or_else(|| RegistryError::UnknownMetric(sample.metric.to_string()))?;
        vec.set(sample.labels, sample.value)
    }

    /// Record a runtime-named metric, declaring it with the single `addr`
    /// label on first sight.
    pub fn record_ad_hoc(&mut self, name: &str, addr: &str, value: f64) -> Result<(), RegistryError> {
        let vec = self
            .vectors
            .entry(name.to_string())
            .or_insert_with(|| MetricVec::new(name, None, MetricKind::Gauge, &[LABEL_ADDR]));
        vec.set(vec![addr.to_string()], value)
    }

    pub fn get(&self, name: &str) -> Option<&MetricVec> {
        self.vectors.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vectors.contains_key(name)
    }

    /// Number of declared vectors.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Every vector's samples, sorted by metric name.
    pub fn snapshot(&self) -> Vec<MetricFamily> {
        let mut families: Vec<MetricFamily> =
            self.vectors.values().map(MetricVec::to_family).collect();
        families.sort_by(|a, b| a.name.cmp(&b.name));
        families
    }
}
