//! Layered parse of a Codis dashboard stats document.
//!
//! The dashboard answers with a loosely typed JSON tree. This module turns it
//! into borrowed views, one per nesting level:
//!
//! ```text
//! StatsDocument
//!   ├── GroupSection   stats.group.{stats, models}
//!   │     ├── NodeStats      per storage node: raw INFO fields
//!   │     └── ReplicaState   per server descriptor: action.state
//!   └── ProxySection   stats.proxy.{models, stats}
//!         ├── ProxyModel     token + proxy_addr
//!         └── ProxyStats     guarded numeric leaves
//! ```
//!
//! Containers are validated: a required container that is absent yields
//! [`ScrapeError::MissingField`], any container of the wrong kind yields
//! [`ScrapeError::Shape`]. Leaves are never validated here; they are coerced
//! or defaulted by the reader.

use serde_json::{Map, Value};

use crate::error::{ScrapeError, Shape};

type Object = Map<String, Value>;

/// A fully validated endpoint document.
#[derive(Debug)]
pub struct StatsDocument<'a> {
    pub group: GroupSection<'a>,
    pub proxy: ProxySection<'a>,
}

#[derive(Debug)]
pub struct GroupSection<'a> {
    pub nodes: Vec<NodeStats<'a>>,
    pub replicas: Vec<ReplicaState>,
}

/// Raw stats of one storage node, keyed by INFO field name.
#[derive(Debug)]
pub struct NodeStats<'a> {
    pub addr: &'a str,
    pub fields: &'a Object,
}

/// Replication action state of one server in a group model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaState {
    pub server: String,
    pub state: String,
}

#[derive(Debug)]
pub struct ProxySection<'a> {
    pub models: Vec<ProxyModel>,
    /// Token → raw stats entry, unvalidated until the token is known.
    pub stats: Vec<(&'a str, &'a Value)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyModel {
    pub token: String,
    pub addr: String,
}

/// Numeric leaves of a proxy stats entry. `None` means the leaf was absent;
/// a present leaf of the wrong type reads as `0.0`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProxyStats {
    pub online: Option<f64>,
    pub ops_total: Option<f64>,
    pub ops_fails: Option<f64>,
    pub ops_qps: Option<f64>,
    pub sessions_total: Option<f64>,
    pub sessions_alive: Option<f64>,
    pub rusage_cpu: Option<f64>,
    pub rusage_mem: Option<f64>,
    pub raw_num_threads: Option<f64>,
    pub raw_vm_size: Option<f64>,
    pub raw_vm_rss: Option<f64>,
}

impl<'a> StatsDocument<'a> {
    pub fn parse(root: &'a Value) -> Result<Self, ScrapeError> {
        let root = as_object(root, "$")?;
        let stats = required_object(root, "stats", "")?;
        let group = GroupSection::parse(required_object(stats, "group", "stats")?)?;
        let proxy = ProxySection::parse(required_object(stats, "proxy", "stats")?)?;
        Ok(Self { group, proxy })
    }
}

impl<'a> GroupSection<'a> {
    fn parse(group: &'a Object) -> Result<Self, ScrapeError> {
        const PATH: &str = "stats.group";

        let servers = required_object(group, "stats", PATH)?;
        let mut nodes = Vec::with_capacity(servers.len());
        for (addr, record) in servers {
            let path = format!("{PATH}.stats[{addr}]");
            let record = as_object(record, &path)?;
            let fields = required_object(record, "stats", &path)?;
            nodes.push(NodeStats {
                addr: addr.as_str(),
                fields,
            });
        }

        // The dashboard encodes an empty model list as null.
        let models = match group.get("models") {
            None => {
                return Err(ScrapeError::MissingField {
                    path: format!("{PATH}.models"),
                });
            }
            Some(Value::Null) => &[][..],
            Some(value) => as_array(value, &format!("{PATH}.models"))?.as_slice(),
        };

        let mut replicas = Vec::new();
        for (i, model) in models.iter().enumerate() {
            let path = format!("{PATH}.models[{i}]");
            let model = as_object(model, &path)?;
            let Some(servers) = optional_array(model, "servers", &path)? else {
                continue;
            };
            for (j, server) in servers.iter().enumerate() {
                let path = format!("{path}.servers[{j}]");
                let server = as_object(server, &path)?;
                let addr = server.get("server").map(text).unwrap_or_default();
                let action = optional_object(server, "action", &path)?;
                let state = action.and_then(|a| a.get("state")).map(text);
                if let Some(state) = state
                    && !addr.is_empty()
                {
                    replicas.push(ReplicaState {
                        server: addr,
                        state,
                    });
                }
            }
        }

        Ok(Self { nodes, replicas })
    }
}

impl<'a> ProxySection<'a> {
    fn parse(proxy: &'a Object) -> Result<Self, ScrapeError> {
        const PATH: &str = "stats.proxy";

        let mut models = Vec::new();
        if let Some(entries) = optional_array(proxy, "models", PATH)? {
            for (i, entry) in entries.iter().enumerate() {
                let entry = as_object(entry, &format!("{PATH}.models[{i}]"))?;
                let token = entry.get("token").map(text);
                let addr = entry.get("proxy_addr").map(text);
                if let (Some(token), Some(addr)) = (token, addr) {
                    models.push(ProxyModel { token, addr });
                }
            }
        }

        let stats: Vec<(&str, &Value)> = optional_object(proxy, "stats", PATH)?
            .map(|entries| entries.iter().map(|(k, v)| (k.as_str(), v)).collect())
            .unwrap_or_default();

        Ok(Self { models, stats })
    }
}

impl ProxyStats {
    /// Parse one `stats.proxy.stats[token]` entry. Returns `None` when the
    /// entry carries no inner `stats` map.
    pub fn parse(entry: &Value, path: &str) -> Result<Option<Self>, ScrapeError> {
        let entry = as_object(entry, path)?;
        let Some(stats) = optional_object(entry, "stats", path)? else {
            return Ok(None);
        };
        let path = join(path, "stats");

        let ops = optional_object(stats, "ops", &path)?;
        let sessions = optional_object(stats, "sessions", &path)?;
        let rusage = optional_object(stats, "rusage", &path)?;
        let raw = match rusage {
            Some(rusage) => optional_object(rusage, "raw", &join(&path, "rusage"))?,
            None => None,
        };

        let leaf = |obj: Option<&Object>, key: &str| obj.and_then(|o| o.get(key)).map(number);

        Ok(Some(Self {
            online: stats.get("online").map(flag),
            ops_total: leaf(ops, "total"),
            // Unresolved: fed from `ops.ops`, not `ops.fails`. Kept until the
            // dashboard field it was meant to track is confirmed.
            ops_fails: leaf(ops, "ops"),
            ops_qps: leaf(ops, "qps"),
            sessions_total: leaf(sessions, "total"),
            sessions_alive: leaf(sessions, "alive"),
            rusage_cpu: leaf(rusage, "cpu"),
            rusage_mem: leaf(rusage, "mem"),
            raw_num_threads: leaf(raw, "num_threads"),
            raw_vm_size: leaf(raw, "vm_size"),
            raw_vm_rss: leaf(raw, "vm_rss"),
        }))
    }
}

/// Render a leaf as text: strings verbatim, everything else as JSON.
pub fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Guarded numeric read.
fn number(value: &Value) -> f64 {
    value.as_f64().unwrap_or(0.0)
}

/// Guarded boolean read.
fn flag(value: &Value) -> f64 {
    match value.as_bool() {
        Some(true) => 1.0,
        _ => 0.0,
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn as_object<'a>(value: &'a Value, path: &str) -> Result<&'a Object, ScrapeError> {
    value.as_object().ok_or_else(|| ScrapeError::Shape {
        path: path.to_string(),
        expected: Shape::Object,
        found: Shape::of(value),
    })
}

fn as_array<'a>(value: &'a Value, path: &str) -> Result<&'a Vec<Value>, ScrapeError> {
    value.as_array().ok_or_else(|| ScrapeError::Shape {
        path: path.to_string(),
        expected: Shape::Array,
        found: Shape::of(value),
    })
}

fn required_object<'a>(obj: &'a Object, key: &str, path: &str) -> Result<&'a Object, ScrapeError> {
    let path = join(path, key);
    match obj.get(key) {
        Some(value) => as_object(value, &path),
        None => Err(ScrapeError::MissingField { path }),
    }
}

fn optional_object<'a>(
    obj: &'a Object,
    key: &str,
    path: &str,
) -> Result<Option<&'a Object>, ScrapeError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => as_object(value, &join(path, key)).map(Some),
    }
}

fn optional_array<'a>(
    obj: &'a Object,
    key: &str,
    path: &str,
) -> Result<Option<&'a Vec<Value>>, ScrapeError> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => as_array(value, &join(path, key)).map(Some),
    }
}
