mod case;
mod runner;
mod source;

pub use case::{CaseStep, StepOutcome, TestCase, TESTCASE_SCHEMA_V1};
pub use runner::{assert_case, run_case, RunReport};
pub use source::read_test_case;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse testcase {path}: {source}")]
    ParseCase {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to parse program {path}: {source}")]
    ParseProgram {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid testcase schema version \"{found}\", expected \"{expected}\".")]
    InvalidSchemaVersion { expected: String, found: String },
    #[error("Step {index} has neither an inline program nor a program file.")]
    ProgramMissing { index: usize },
    #[error("Runtime error: {0}")]
    Runtime(#[from] dl_core::DicelangError),
    #[error("Guard exceeded: max_steps={max_steps}.")]
    GuardExceeded { max_steps: usize },
    #[error("Step mismatch at index {index}. expected={expected} actual={actual}")]
    StepMismatch {
        index: usize,
        expected: String,
        actual: String,
    },
    #[error("Failed to serialize outcome for diff: {0}")]
    OutcomeSerialize(serde_json::Error),
}
