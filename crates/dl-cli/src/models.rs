use dl_core::{Node, Value};
use serde::{Deserialize, Serialize};

/// One line of `serve` input.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ServeRequest {
    pub(crate) user: String,
    pub(crate) server: String,
    pub(crate) program: Node,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ErrorReply {
    pub(crate) kind: String,
    pub(crate) message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) iterations: Option<u64>,
}

/// One line of `serve` output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServeReply {
    pub(crate) ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) display: Option<String>,
    #[serde(default)]
    pub(crate) actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<ErrorReply>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) persisted: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ServeSummary {
    pub(crate) handled: usize,
    pub(crate) failed: usize,
}
