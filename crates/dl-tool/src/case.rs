use std::collections::BTreeMap;

use dl_core::{Node, Value};
use dl_runtime::InterpreterOptions;
use serde::{Deserialize, Serialize};

pub const TESTCASE_SCHEMA_V1: &str = "dl-tool-case.v1";

/// A scripted conversation: programs run in order against one store, each
/// followed by the outcome it must produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub schema_version: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_server")]
    pub server: String,
    #[serde(default)]
    pub options: Option<InterpreterOptions>,
    /// Values installed into the core tier before the first step.
    #[serde(default)]
    pub core: BTreeMap<String, Value>,
    #[serde(default)]
    pub steps: Vec<CaseStep>,
}

fn default_user() -> String {
    "tester".to_string()
}

fn default_server() -> String {
    "testbed".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseStep {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub program: Option<Node>,
    /// Program JSON relative to the case directory.
    #[serde(default)]
    pub program_file: Option<String>,
    pub expect: StepOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StepOutcome {
    Value {
        value: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        actions: Option<Vec<String>>,
    },
    Error {
        #[serde(rename = "errorKind")]
        error_kind: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        iterations: Option<u64>,
    },
}

impl StepOutcome {
    /// Optional fields left out of an expectation are not compared.
    pub fn accepts(&self, actual: &StepOutcome) -> bool {
        match (self, actual) {
            (
                Self::Value { value, actions },
                Self::Value {
                    value: actual_value,
                    actions: actual_actions,
                },
            ) => value == actual_value && (actions.is_none() || actions == actual_actions),
            (
                Self::Error {
                    error_kind,
                    iterations,
                },
                Self::Error {
                    error_kind: actual_kind,
                    iterations: actual_iterations,
                },
            ) => {
                error_kind == actual_kind
                    && (iterations.is_none() || iterations == actual_iterations)
            }
            _ => false,
        }
    }
}
