//! Error types for scraping a single Codis dashboard endpoint.

use thiserror::Error;

/// Kind of JSON node, used to report shape mismatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Object,
    Array,
    String,
    Number,
    Bool,
    Null,
}

impl Shape {
    pub fn of(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(_) => Shape::Object,
            serde_json::Value::Array(_) => Shape::Array,
            serde_json::Value::String(_) => Shape::String,
            serde_json::Value::Number(_) => Shape::Number,
            serde_json::Value::Bool(_) => Shape::Bool,
            serde_json::Value::Null => Shape::Null,
        }
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Shape::Object => "object",
            Shape::Array => "array",
            Shape::String => "string",
            Shape::Number => "number",
            Shape::Bool => "bool",
            Shape::Null => "null",
        };
        f.write_str(name)
    }
}

/// Any error that ends an endpoint's contribution to a pass.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("tls setup failed: {0}")]
    Tls(String),

    #[error("unexpected status {0}")]
    Status(http::StatusCode),

    #[error("invalid json body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("missing required field `{path}`")]
    MissingField { path: String },

    #[error("`{path}` is {found}, expected {expected}")]
    Shape {
        path: String,
        expected: Shape,
        found: Shape,
    },

    #[error("`{path}` value {raw:?} is not a number")]
    ValueParse { path: String, raw: String },
}

impl ScrapeError {
    /// Whether the failure happened before a document was decoded.
    pub fn is_fetch(&self) -> bool {
        matches!(
            self,
            ScrapeError::Transport(_) | ScrapeError::Status(_) | ScrapeError::Decode(_)
        )
    }
}
