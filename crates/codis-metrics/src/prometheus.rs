//! Prometheus text exposition format.
//!
//! Renders a pass snapshot into the Prometheus text exposition format
//! (version 0.0.4) for scraping by a Prometheus server or compatible agent.

use crate::registry::MetricFamily;

/// Content type served alongside [`render_prometheus`] output.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Render metric families into Prometheus text format.
///
/// Every family name is prefixed with `namespace_`. HELP and TYPE headers are
/// emitted even for families that hold no samples this pass.
pub fn render_prometheus(namespace: &str, families: &[MetricFamily]) -> String {
    let mut out = String::new();

    for family in families {
        let name = format!("{namespace}_{}", family.name);

        if let Some(help) = &family.help {
            out.push_str(&format!("# HELP {name} {}\n", escape_help(help)));
        }
        out.push_str(&format!("# TYPE {name} {}\n", family.kind.as_str()));

        for (labels, value) in &family.samples {
            out.push_str(&name);
            if !labels.is_empty() {
                let pairs: Vec<String> = family
                    .label_names
                    .iter()
                    .zip(labels)
                    .map(|(k, v)| format!("{k}=\"{}\"", escape_label(v)))
                    .collect();
                out.push_str(&format!("{{{}}}", pairs.join(",")));
            }
            out.push_str(&format!(" {}\n", format_value(*value)));
        }
    }

    out
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn escape_help(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\n', "\\n")
}
