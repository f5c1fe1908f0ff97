use std::fs;
use std::path::Path;

use dl_core::Node;

use crate::{CaseStep, TestCase, ToolError, TESTCASE_SCHEMA_V1};

pub fn read_test_case(case_path: &Path) -> Result<TestCase, ToolError> {
    let raw = fs::read_to_string(case_path).map_err(|source| ToolError::ReadFile {
        path: case_path.to_path_buf(),
        source,
    })?;
    let parsed: TestCase = serde_json::from_str(&raw).map_err(|source| ToolError::ParseCase {
        path: case_path.to_path_buf(),
        source,
    })?;
    if parsed.schema_version != TESTCASE_SCHEMA_V1 {
        return Err(ToolError::InvalidSchemaVersion {
            expected: TESTCASE_SCHEMA_V1.to_string(),
            found: parsed.schema_version,
        });
    }
    Ok(parsed)
}

/// Inline program wins over `programFile`.
pub(crate) fn step_program(case_dir: &Path, index: usize, step: &CaseStep) -> Result<Node, ToolError> {
    if let Some(program) = &step.program {
        return Ok(program.clone());
    }
    let Some(file) = &step.program_file else {
        return Err(ToolError::ProgramMissing { index });
    };
    let path = case_dir.join(file);
    let raw = fs::read_to_string(&path).map_err(|source| ToolError::ReadFile {
        path: path.clone(),
        source,
    })?;
    Node::from_json(&raw).map_err(|source| ToolError::ParseProgram { path, source })
}
