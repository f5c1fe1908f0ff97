use std::path::Path;
use std::sync::Arc;

use dl_runtime::{Interpreter, VariableStore};

use crate::source::{read_test_case, step_program};
use crate::{StepOutcome, TestCase, ToolError};

const MAX_STEPS: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub observed: Vec<StepOutcome>,
    pub steps: usize,
}

/// Runs every step of `case` against a fresh in-memory store. Runtime
/// errors are observations, not failures of the run.
pub fn run_case(case_dir: &Path, case: &TestCase) -> Result<RunReport, ToolError> {
    if case.steps.len() > MAX_STEPS {
        return Err(ToolError::GuardExceeded {
            max_steps: MAX_STEPS,
        });
    }

    let store = VariableStore::new();
    for (name, value) in &case.core {
        store.install_core(name, value.clone());
    }
    let mut options = case.options.clone().unwrap_or_default();
    options.random_seed = options.random_seed.or(Some(1));
    let interpreter = Interpreter::new(Arc::new(store), options);

    let mut observed = Vec::with_capacity(case.steps.len());
    for (index, step) in case.steps.iter().enumerate() {
        let program = step_program(case_dir, index, step)?;
        let user = step.user.as_deref().unwrap_or(&case.user);
        let server = step.server.as_deref().unwrap_or(&case.server);
        let outcome = match interpreter.execute(&program, user, server) {
            Ok(outcome) => StepOutcome::Value {
                value: outcome.value,
                actions: Some(outcome.actions),
            },
            Err(error) => StepOutcome::Error {
                error_kind: error.kind.code().to_string(),
                iterations: error.iterations,
            },
        };
        observed.push(outcome);
    }

    Ok(RunReport {
        steps: observed.len(),
        observed,
    })
}

pub fn assert_case(case_dir: &Path, case_path: &Path) -> Result<(), ToolError> {
    let case = read_test_case(case_path)?;
    let report = run_case(case_dir, &case)?;

    for (index, (step, actual)) in case.steps.iter().zip(report.observed.iter()).enumerate() {
        if !step.expect.accepts(actual) {
            let expected =
                serde_json::to_string(&step.expect).map_err(ToolError::OutcomeSerialize)?;
            let actual = serde_json::to_string(actual).map_err(ToolError::OutcomeSerialize)?;
            return Err(ToolError::StepMismatch {
                index,
                expected,
                actual,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod runner_tests {
    use super::*;
    use crate::{CaseStep, TESTCASE_SCHEMA_V1};

    use std::collections::BTreeMap;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    use dl_core::{BinaryOp, Node, Tier, Value};
    use pretty_assertions::assert_eq;

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time should move forward")
            .as_nanos();
        std::env::temp_dir().join(format!("dl-tool-runner-{}-{}", name, nanos))
    }

    fn write_file(path: &Path, content: &str) {
        let parent = path.parent().expect("path should have parent");
        fs::create_dir_all(parent).expect("parent dir should be created");
        fs::write(path, content).expect("file should be written");
    }

    fn step(program: Node, expect: StepOutcome) -> CaseStep {
        CaseStep {
            user: None,
            server: None,
            program: Some(program),
            program_file: None,
            expect,
        }
    }

    fn value(value: Value) -> StepOutcome {
        StepOutcome::Value {
            value,
            actions: None,
        }
    }

    fn simple_case(steps: Vec<CaseStep>) -> TestCase {
        TestCase {
            schema_version: TESTCASE_SCHEMA_V1.to_string(),
            user: "tester".to_string(),
            server: "testbed".to_string(),
            options: None,
            core: BTreeMap::new(),
            steps,
        }
    }

    #[test]
    fn run_case_shares_store_between_steps() {
        let case = simple_case(vec![
            step(
                Node::qualified_assign(Tier::Private, "hp", Node::int(8)),
                value(Value::Integer(8)),
            ),
            step(
                Node::binary(BinaryOp::Add, Node::ident("hp"), Node::int(1)),
                value(Value::Integer(9)),
            ),
        ]);
        let report = run_case(&temp_dir("shared-store"), &case).expect("run should pass");
        assert_eq!(report.steps, 2);
        assert!(matches!(
            &report.observed[1],
            StepOutcome::Value { value: Value::Integer(9), .. }
        ));
    }

    #[test]
    fn run_case_records_runtime_errors() {
        let case = simple_case(vec![
            step(Node::ident("ghost"), value(Value::Undefined)),
            step(
                Node::binary(BinaryOp::Add, Node::ident("ghost"), Node::int(1)),
                StepOutcome::Error {
                    error_kind: "MissingIdentifier".to_string(),
                    iterations: None,
                },
            ),
        ]);
        let report = run_case(&temp_dir("errors"), &case).expect("run should pass");
        assert_eq!(
            report.observed[1],
            StepOutcome::Error {
                error_kind: "MissingIdentifier".to_string(),
                iterations: None,
            }
        );
    }

    #[test]
    fn run_case_reads_program_files_and_core_values() {
        let root = temp_dir("program-file");
        write_file(
            &root.join("program.json"),
            r#"{"kind":"identifier","name":"answer"}"#,
        );
        let mut case = simple_case(vec![CaseStep {
            user: Some("someone".to_string()),
            server: None,
            program: None,
            program_file: Some("program.json".to_string()),
            expect: value(Value::Integer(42)),
        }]);
        case.core.insert("answer".to_string(), Value::Integer(42));
        let report = run_case(&root, &case).expect("run should pass");
        assert!(case.steps[0].expect.accepts(&report.observed[0]));
    }

    #[test]
    fn run_case_reports_missing_program_and_guard() {
        let mut missing = step(Node::int(1), value(Value::Integer(1)));
        missing.program = None;
        let error = run_case(&temp_dir("missing"), &simple_case(vec![missing]))
            .expect_err("missing program should fail");
        assert!(matches!(error, ToolError::ProgramMissing { index: 0 }));

        let steps = (0..=MAX_STEPS)
            .map(|_| step(Node::int(1), value(Value::Integer(1))))
            .collect();
        let error = run_case(&temp_dir("guard"), &simple_case(steps))
            .expect_err("too many steps should fail");
        assert!(matches!(error, ToolError::GuardExceeded { .. }));
    }

    #[test]
    fn assert_case_reports_mismatches_and_passes_matches() {
        let root = temp_dir("assert");
        let case_path = root.join("case.json");
        write_file(
            &case_path,
            r#"{
  "schemaVersion": "dl-tool-case.v1",
  "steps": [
    {"program": {"kind":"integer","value":1}, "expect": {"kind":"value","value":{"type":"integer","value":2}}}
  ]
}"#,
        );
        let error = assert_case(&root, &case_path).expect_err("mismatch should fail");
        assert!(matches!(error, ToolError::StepMismatch { index: 0, .. }));

        write_file(
            &case_path,
            r#"{
  "schemaVersion": "dl-tool-case.v1",
  "steps": [
    {"program": {"kind":"integer","value":1}, "expect": {"kind":"value","value":{"type":"integer","value":1},"actions":[]}}
  ]
}"#,
        );
        assert_case(&root, &case_path).expect("matching case should pass");
    }

    #[test]
    fn assert_case_rejects_unknown_schema() {
        let root = temp_dir("schema");
        let case_path = root.join("case.json");
        write_file(&case_path, r#"{"schemaVersion":"other","steps":[]}"#);
        let error = assert_case(&root, &case_path).expect_err("schema should fail");
        assert!(matches!(error, ToolError::InvalidSchemaVersion { .. }));
    }
}
