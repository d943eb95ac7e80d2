//! Static metric catalog for the Codis exporter.
//!
//! Every series the exporter can publish is declared here. The tables are
//! immutable and are read by both the navigator (which raw field feeds which
//! metric) and the registry (which vectors exist at the start of a pass).

/// Default namespace prefix for every exported series.
pub const NAMESPACE: &str = "codis";

/// Label: address of the Codis dashboard endpoint that was polled.
pub const LABEL_CODIS_ADDR: &str = "codis_addr";
/// Label: address of a Redis storage node.
pub const LABEL_REDIS_ADDR: &str = "redis_addr";
/// Label: address of a Codis proxy.
pub const LABEL_PROXY_ADDR: &str = "proxy_addr";
/// Label: literal role string reported by a storage node.
pub const LABEL_REDIS_ROLE: &str = "redis_role";
/// Label of ad hoc metrics.
pub const LABEL_ADDR: &str = "addr";

/// Role indicator, labeled by endpoint, node and role string.
pub const REDIS_ROLE: &str = "redis_role";
/// Binary replication state derived from the group topology.
pub const REDIS_REPLICATION_STATE: &str = "redis_replication_state";

/// Raw node field that is exported through [`REDIS_ROLE`] instead of parsed.
pub const ROLE_FIELD: &str = "role";

/// Endpoint liveness, emitted through the ad hoc path.
pub const UP: &str = "up";

pub const PROXY_ONLINE: &str = "proxy_online";
pub const PROXY_OPS_TOTAL: &str = "proxy_ops_total";
pub const PROXY_OPS_FAILS: &str = "proxy_ops_fails";
pub const PROXY_OPS_REDIS_ERRORS: &str = "proxy_ops_redis_errors";
pub const PROXY_OPS_QPS: &str = "proxy_ops_qps";
pub const PROXY_SESSIONS_TOTAL: &str = "proxy_sessions_total";
pub const PROXY_SESSIONS_ALIVE: &str = "proxy_sessions_alive";
pub const PROXY_RUSAGE_CPU: &str = "proxy_rusage_cpu";
pub const PROXY_RUSAGE_MEM: &str = "proxy_rusage_mem";
pub const PROXY_RUSAGE_RAW_NUM_THREADS: &str = "proxy_rusage_raw_num_threads";
pub const PROXY_RUSAGE_RAW_VM_SIZE: &str = "proxy_rusage_raw_vm_size";
pub const PROXY_RUSAGE_RAW_VM_RSS: &str = "proxy_rusage_raw_vm_rss";

/// Pass bookkeeping: endpoints visited over the process lifetime.
pub const EXPORTER_SCRAPES_TOTAL: &str = "exporter_scrapes_total";
/// Pass bookkeeping: wall-clock duration of the last pass.
pub const EXPORTER_LAST_SCRAPE_DURATION: &str = "exporter_last_scrape_duration_seconds";
/// Pass bookkeeping: endpoints that failed during the last pass.
pub const EXPORTER_LAST_SCRAPE_ERROR: &str = "exporter_last_scrape_error";

/// Raw storage-node field → metric identifier.
pub const REDIS_FIELDS: &[(&str, &str)] = &[
    ("state", REDIS_REPLICATION_STATE),
    ("blocked_clients", "redis_blocked_clients"),
    ("client_biggest_input_buf", "redis_client_biggest_input_buf"),
    ("client_longest_output_list", "redis_client_longest_output_list"),
    ("connected_client", "redis_connected_client"),
    ("instantaneous_input_kbps", "redis_instantaneous_input_kbps"),
    ("instantaneous_ops_per_sec", "redis_instantaneous_ops_per_sec"),
    ("instantaneous_output_kbps", "redis_instantaneous_output_kbps"),
    ("keys", "redis_keys"),
    ("rejected_connections", "redis_rejected_connections"),
    ("repl_backlog_active", "redis_repl_backlog_active"),
    ("repl_backlog_size", "redis_repl_backlog_size"),
    ("evicted_keys", "redis_evicted_keys"),
    ("expired_keys", "redis_expired_keys"),
    ("maxmemory", "redis_maxmemory"),
    ("used_memory", "redis_used_memory"),
    ("total_commands_processed", "redis_total_commands_processed"),
    ("total_connections_received", "redis_total_connections_received"),
    ("total_net_input_bytes", "redis_total_net_input_bytes"),
    ("total_net_output_bytes", "redis_total_net_output_bytes"),
    ("keyspace_hits", "redis_keyspace_hits"),
    ("keyspace_misses", "redis_keyspace_misses"),
    ("used_cpu_sys", "redis_used_cpu_sys"),
    ("used_cpu_sys_children", "redis_used_cpu_sys_children"),
    ("used_cpu_user", "redis_used_cpu_user"),
    ("used_cpu_user_children", "redis_used_cpu_user_children"),
];

/// Raw proxy stats key → metric identifier.
///
/// The navigator reads the nested leaves directly; this table is the
/// declaration list. `ops_fails` is fed from the raw `ops.ops` key and
/// `ops_errors` is declared but never populated (see the navigator tests).
pub const PROXY_FIELDS: &[(&str, &str)] = &[
    ("online", PROXY_ONLINE),
    ("ops_total", PROXY_OPS_TOTAL),
    ("ops_fails", PROXY_OPS_FAILS),
    ("ops_errors", PROXY_OPS_REDIS_ERRORS),
    ("ops_qps", PROXY_OPS_QPS),
    ("sessions_total", PROXY_SESSIONS_TOTAL),
    ("sessions_alive", PROXY_SESSIONS_ALIVE),
    ("rusage_cpu", PROXY_RUSAGE_CPU),
    ("rusage_mem", PROXY_RUSAGE_MEM),
    ("rusage_raw_num_threads", PROXY_RUSAGE_RAW_NUM_THREADS),
    ("rusage_raw_vm_size", PROXY_RUSAGE_RAW_VM_SIZE),
    ("rusage_raw_vm_rss", PROXY_RUSAGE_RAW_VM_RSS),
];

/// Label layout of a statically declared metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSchema {
    /// {codis_addr, redis_addr}
    Redis,
    /// {codis_addr, proxy_addr}
    Proxy,
    /// {codis_addr, redis_addr, redis_role}
    Role,
}

impl LabelSchema {
    pub fn label_names(self) -> &'static [&'static str] {
        match self {
            LabelSchema::Redis => &[LABEL_CODIS_ADDR, LABEL_REDIS_ADDR],
            LabelSchema::Proxy => &[LABEL_CODIS_ADDR, LABEL_PROXY_ADDR],
            LabelSchema::Role => &[LABEL_CODIS_ADDR, LABEL_REDIS_ADDR, LABEL_REDIS_ROLE],
        }
    }
}

/// One statically declared metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDef {
    pub name: &'static str,
    pub schema: LabelSchema,
}

impl MetricDef {
    pub fn help(&self) -> String {
        match self.schema {
            LabelSchema::Redis => format!("the {} of codis", self.name),
            LabelSchema::Proxy => format!("the {} of codis proxy", self.name),
            LabelSchema::Role => "The redis role of codis".to_string(),
        }
    }
}

/// Look up the metric fed by a raw storage-node field.
pub fn redis_metric(field: &str) -> Option<&'static str> {
    REDIS_FIELDS
        .iter()
        .find(|(raw, _)| *raw == field)
        .map(|(_, name)| *name)
}

/// Every statically declared metric: storage-node, proxy, then role family.
pub fn static_metrics() -> impl Iterator<Item = MetricDef> {
    let redis = REDIS_FIELDS.iter().map(|&(_, name)| MetricDef {
        name,
        schema: LabelSchema::Redis,
    });
    let proxy = PROXY_FIELDS.iter().map(|&(_, name)| MetricDef {
        name,
        schema: LabelSchema::Proxy,
    });
    let role = std::iter::once(MetricDef {
        name: REDIS_ROLE,
        schema: LabelSchema::Role,
    });
    redis.chain(proxy).chain(role)
}
