//! Stat tree navigator.
//!
//! Maps one endpoint's [`StatsDocument`] onto the static metric catalog,
//! producing a batch of [`Sample`]s. The batch is all-or-nothing: any
//! error aborts the endpoint and nothing from it should be published.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use tracing::{debug, trace};

use codis_core::catalog::{self, REDIS_REPLICATION_STATE, REDIS_ROLE, ROLE_FIELD};

use crate::document::{GroupSection, ProxySection, ProxyStats, StatsDocument, text};
use crate::error::ScrapeError;

/// Replication state string that maps to 1.
const SYNCED: &str = "synced";

/// One catalog sample: metric identifier, label values in schema order, value.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub metric: &'static str,
    pub labels: Vec<String>,
    pub value: f64,
}

/// Everything one endpoint contributed to a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointSamples {
    pub endpoint: String,
    pub samples: Vec<Sample>,
}

impl EndpointSamples {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            samples: Vec::new(),
        }
    }

    fn push(&mut self, metric: &'static str, entity: &str, value: f64) {
        let labels = vec![self.endpoint.clone(), entity.to_string()];
        self.samples.push(Sample {
            metric,
            labels,
            value,
        });
    }

    /// First sample for `metric` whose labels equal `labels`.
    pub fn find(&self, metric: &str, labels: &[&str]) -> Option<f64> {
        self.samples
            .iter()
            .find(|s| s.metric == metric && s.labels.iter().eq(labels.iter().copied()))
            .map(|s| s.value)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Extract every catalog series from one endpoint's decoded document.
pub fn navigate(endpoint: &str, root: &Value) -> Result<EndpointSamples, ScrapeError> {
    let doc = StatsDocument::parse(root)?;
    let mut out = EndpointSamples::new(endpoint);

    storage_nodes(&mut out, &doc.group)?;
    replication(&mut out, &doc.group);
    proxies(&mut out, &doc.proxy)?;

    debug!(
        %endpoint,
        nodes = doc.group.nodes.len(),
        proxies = doc.proxy.models.len(),
        samples = out.len(),
        "navigated codis stats"
    );
    Ok(out)
}

fn storage_nodes(out: &mut EndpointSamples, group: &GroupSection<'_>) -> Result<(), ScrapeError> {
    for node in &group.nodes {
        for (field, raw) in node.fields {
            let value = text(raw);

            if field == ROLE_FIELD {
                // Only the current role is set; stale roles vanish with the
                // per-pass registry reset.
                let labels = vec![out.endpoint.clone(), node.addr.to_string(), value];
                out.samples.push(Sample {
                    metric: REDIS_ROLE,
                    labels,
                    value: 1.0,
                });
                continue;
            }

            let Some(metric) = catalog::redis_metric(field) else {
                continue;
            };
            let parsed = value.parse::<f64>().map_err(|_| ScrapeError::ValueParse {
                path: format!("stats.group.stats[{}].stats.{field}", node.addr),
                raw: value.clone(),
            })?;
            trace!(metric, node = node.addr, value = parsed, "storage node field");
            out.push(metric, node.addr, parsed);
        }
    }
    Ok(())
}

fn replication(out: &mut EndpointSamples, group: &GroupSection<'_>) {
    let states: BTreeMap<&str, &str> = group
        .replicas
        .iter()
        .map(|r| (r.server.as_str(), r.state.as_str()))
        .collect();

    for (server, state) in states {
        let synced = if state == SYNCED { 1.0 } else { 0.0 };
        out.push(REDIS_REPLICATION_STATE, server, synced);
    }
}

fn proxies(out: &mut EndpointSamples, proxy: &ProxySection<'_>) -> Result<(), ScrapeError> {
    let topology: HashMap<&str, &str> = proxy
        .models
        .iter()
        .map(|m| (m.token.as_str(), m.addr.as_str()))
        .collect();

    for &(token, entry) in &proxy.stats {
        let Some(addr) = topology.get(token) else {
            trace!(token, "proxy stats without topology entry, dropped");
            continue;
        };
        let path = format!("stats.proxy.stats[{token}]");
        let Some(stats) = ProxyStats::parse(entry, &path)? else {
            continue;
        };
        for (metric, value) in proxy_values(&stats) {
            out.push(metric, addr, value);
        }
    }
    Ok(())
}

fn proxy_values(stats: &ProxyStats) -> impl Iterator<Item = (&'static str, f64)> {
    [
        (catalog::PROXY_ONLINE, stats.online),
        (catalog::PROXY_OPS_TOTAL, stats.ops_total),
        (catalog::PROXY_OPS_FAILS, stats.ops_fails),
        (catalog::PROXY_OPS_QPS, stats.ops_qps),
        (catalog::PROXY_SESSIONS_TOTAL, stats.sessions_total),
        (catalog::PROXY_SESSIONS_ALIVE, stats.sessions_alive),
        (catalog::PROXY_RUSAGE_CPU, stats.rusage_cpu),
        (catalog::PROXY_RUSAGE_MEM, stats.rusage_mem),
        (catalog::PROXY_RUSAGE_RAW_NUM_THREADS, stats.raw_num_threads),
        (catalog::PROXY_RUSAGE_RAW_VM_SIZE, stats.raw_vm_size),
        (catalog::PROXY_RUSAGE_RAW_VM_RSS, stats.raw_vm_rss),
    ]
    .into_iter()
    .filter_map(|(metric, value)| value.map(|v| (metric, v)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use codis_core::catalog::*;
    use serde_json::json;

    const CODIS: &str = "http://dashboard:18080/topom";

    fn document(group_stats: Value, models: Value, proxy: Value) -> Value {
        json!({
            "stats": {
                "group": { "stats": group_stats, "models": models },
                "proxy": proxy
            }
        })
    }

    #[test]
    fn used_memory_from_string_field() {
        let root: Value = serde_json::from_str(
            r#"{"stats":{"group":{"stats":{"10.0.0.1:6379":{"stats":{"used_memory":"100"}}},"models":[]},"proxy":{}}}"#,
        )
        .unwrap();

        let out = navigate(CODIS, &root).unwrap();
        assert_eq!(
            out.find("redis_used_memory", &[CODIS, "10.0.0.1:6379"]),
            Some(100.0)
        );
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn numeric_json_values_are_accepted() {
        let root = document(
            json!({ "10.0.0.1:6379": { "stats": { "keys": 7, "used_cpu_sys": 1.25 } } }),
            json!([]),
            json!({}),
        );
        let out = navigate(CODIS, &root).unwrap();
        assert_eq!(out.find("redis_keys", &[CODIS, "10.0.0.1:6379"]), Some(7.0));
        assert_eq!(out.find("redis_used_cpu_sys", &[CODIS, "10.0.0.1:6379"]), Some(1.25));
    }

    #[test]
    fn fields_outside_catalog_are_ignored() {
        let root = document(
            json!({ "10.0.0.1:6379": { "stats": { "redis_version": "3.2.11", "uptime_in_days": "4" } } }),
            json!([]),
            json!({}),
        );
        let out = navigate(CODIS, &root).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn role_sets_only_current_role() {
        let root = document(
            json!({ "10.0.0.1:6379": { "stats": { "role": "master" } } }),
            json!([]),
            json!({}),
        );
        let out = navigate(CODIS, &root).unwrap();

        assert_eq!(out.find(REDIS_ROLE, &[CODIS, "10.0.0.1:6379", "master"]), Some(1.0));
        let roles: Vec<_> = out.samples.iter().filter(|s| s.metric == REDIS_ROLE).collect();
        assert_eq!(roles.len(), 1);
        assert_eq!(out.find(REDIS_ROLE, &[CODIS, "10.0.0.1:6379", "slave"]), None);
    }

    #[test]
    fn unparsable_catalog_field_aborts_endpoint() {
        let root = document(
            json!({ "10.0.0.1:6379": { "stats": { "used_memory": "lots" } } }),
            json!([]),
            json!({}),
        );
        let err = navigate(CODIS, &root).unwrap_err();
        match err {
            ScrapeError::ValueParse { path, raw } => {
                assert_eq!(path, "stats.group.stats[10.0.0.1:6379].stats.used_memory");
                assert_eq!(raw, "lots");
            }
            other => panic!("expected value parse error, got {other}"),
        }
    }

    #[test]
    fn replication_state_is_binary() {
        let models = json!([
            {
                "id": 1,
                "servers": [
                    { "server": "10.0.0.1:6379", "action": { "state": "synced" } },
                    { "server": "10.0.0.2:6379", "action": { "state": "not_synced" } },
                    { "server": "10.0.0.3:6379", "action": { "state": "" } }
                ]
            },
            {
                "id": 2,
                "servers": [
                    { "server": "10.0.0.4:6379", "action": { "state": "pending" } }
                ]
            }
        ]);
        let root = document(json!({}), models, json!({}));
        let out = navigate(CODIS, &root).unwrap();

        let state = |node: &str| out.find(REDIS_REPLICATION_STATE, &[CODIS, node]);
        assert_eq!(state("10.0.0.1:6379"), Some(1.0));
        assert_eq!(state("10.0.0.2:6379"), Some(0.0));
        assert_eq!(state("10.0.0.3:6379"), Some(0.0));
        assert_eq!(state("10.0.0.4:6379"), Some(0.0));
    }

    #[test]
    fn replication_state_follows_node_field_state() {
        // The topology walk runs after node fields, so it wins in the registry.
        let root = document(
            json!({ "10.0.0.1:6379": { "stats": { "state": "1" } } }),
            json!([{ "servers": [{ "server": "10.0.0.1:6379", "action": { "state": "migrating" } }] }]),
            json!({}),
        );
        let out = navigate(CODIS, &root).unwrap();
        let last = out
            .samples
            .iter()
            .rev()
            .find(|s| s.metric == REDIS_REPLICATION_STATE)
            .unwrap();
        assert_eq!(last.value, 0.0);
    }

    fn proxy_section(stats: Value) -> Value {
        json!({
            "models": [
                { "id": 1, "token": "t1", "proxy_addr": "10.0.1.1:19000" }
            ],
            "stats": stats
        })
    }

    #[test]
    fn proxy_fields_are_extracted() {
        let proxy = proxy_section(json!({
            "t1": {
                "stats": {
                    "online": true,
                    "ops": { "total": 1000, "ops": 3, "qps": 25 },
                    "sessions": { "total": 40, "alive": 12 },
                    "rusage": {
                        "cpu": 0.75,
                        "mem": 1048576,
                        "raw": { "num_threads": 16, "vm_size": 2048, "vm_rss": 1024 }
                    }
                }
            }
        }));
        let root = document(json!({}), json!([]), proxy);
        let out = navigate(CODIS, &root).unwrap();

        let p = |metric: &str| out.find(metric, &[CODIS, "10.0.1.1:19000"]);
        assert_eq!(p(PROXY_ONLINE), Some(1.0));
        assert_eq!(p(PROXY_OPS_TOTAL), Some(1000.0));
        assert_eq!(p(PROXY_OPS_QPS), Some(25.0));
        assert_eq!(p(PROXY_SESSIONS_TOTAL), Some(40.0));
        assert_eq!(p(PROXY_SESSIONS_ALIVE), Some(12.0));
        assert_eq!(p(PROXY_RUSAGE_CPU), Some(0.75));
        assert_eq!(p(PROXY_RUSAGE_MEM), Some(1048576.0));
        assert_eq!(p(PROXY_RUSAGE_RAW_NUM_THREADS), Some(16.0));
        assert_eq!(p(PROXY_RUSAGE_RAW_VM_SIZE), Some(2048.0));
        assert_eq!(p(PROXY_RUSAGE_RAW_VM_RSS), Some(1024.0));
    }

    #[test]
    fn proxy_ops_fails_mapping_is_unresolved() {
        // `proxy_ops_fails` is read from `ops.ops`; `ops.fails` and the
        // redis error counter are not consulted. Pinned until clarified.
        let proxy = proxy_section(json!({
            "t1": { "stats": { "ops": { "ops": 5, "fails": 9, "redis": { "errors": 2 } } } }
        }));
        let root = document(json!({}), json!([]), proxy);
        let out = navigate(CODIS, &root).unwrap();

        assert_eq!(out.find(PROXY_OPS_FAILS, &[CODIS, "10.0.1.1:19000"]), Some(5.0));
        assert_eq!(out.find(PROXY_OPS_REDIS_ERRORS, &[CODIS, "10.0.1.1:19000"]), None);
    }

    #[test]
    fn mistyped_proxy_leaves_default_to_zero() {
        let proxy = proxy_section(json!({
            "t1": {
                "stats": {
                    "online": "yes",
                    "sessions": { "alive": "many" },
                    "rusage": { "cpu": null }
                }
            }
        }));
        let root = document(json!({}), json!([]), proxy);
        let out = navigate(CODIS, &root).unwrap();

        let p = |metric: &str| out.find(metric, &[CODIS, "10.0.1.1:19000"]);
        assert_eq!(p(PROXY_ONLINE), Some(0.0));
        assert_eq!(p(PROXY_SESSIONS_ALIVE), Some(0.0));
        assert_eq!(p(PROXY_RUSAGE_CPU), Some(0.0));
        assert_eq!(p(PROXY_RUSAGE_MEM), None);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn proxy_token_without_model_is_dropped() {
        let proxy = proxy_section(json!({
            "t1": { "stats": { "online": true } },
            "orphan": { "stats": { "online": true, "ops": { "total": 5 } } }
        }));
        let root = document(json!({}), json!([]), proxy);
        let out = navigate(CODIS, &root).unwrap();

        assert_eq!(out.len(), 1);
        assert!(out.samples.iter().all(|s| s.labels[1] == "10.0.1.1:19000"));
    }

    #[test]
    fn misshapen_required_container_aborts() {
        let root = json!({ "stats": { "group": { "stats": [], "models": [] }, "proxy": {} } });
        assert!(matches!(
            navigate(CODIS, &root).unwrap_err(),
            ScrapeError::Shape { .. }
        ));

        let root = json!({ "stats": { "group": { "stats": {}, "models": [] } } });
        assert!(matches!(
            navigate(CODIS, &root).unwrap_err(),
            ScrapeError::MissingField { .. }
        ));
    }

    #[test]
    fn labels_lead_with_endpoint() {
        let root = document(
            json!({ "10.0.0.9:6379": { "stats": { "keys": "3" } } }),
            json!([]),
            json!({}),
        );
        let out = navigate("http://other:18080/topom", &root).unwrap();
        assert_eq!(
            out.samples[0].labels,
            vec!["http://other:18080/topom".to_string(), "10.0.0.9:6379".to_string()]
        );
    }
}
