use std::fs;
use std::io::Write;
use std::process::{Command, Stdio};

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_dicelang")
}

#[test]
fn exec_runs_all_demo_programs() {
    let programs_root = dl_test_example::demos_root().join("programs");
    let mut programs = fs::read_dir(&programs_root)
        .expect("programs root must exist")
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect::<Vec<_>>();
    programs.sort();

    assert!(!programs.is_empty(), "expected demo programs");

    for program in programs {
        let output = Command::new(bin())
            .arg("exec")
            .arg("--program")
            .arg(&program)
            .arg("--user")
            .arg("smoke")
            .arg("--server")
            .arg("demos")
            .arg("--core-dir")
            .arg(dl_test_example::core_dir())
            .output()
            .expect("cli should execute");

        if !output.status.success() {
            panic!(
                "program {} failed\nstdout:\n{}\nstderr:\n{}",
                program.display(),
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(
            stdout.contains("RESULT:OK"),
            "stdout missing RESULT:OK for {}",
            program.display()
        );
        assert!(
            stdout.contains("VALUE_JSON:"),
            "stdout missing VALUE_JSON for {}",
            program.display()
        );
    }
}

#[test]
fn exec_prints_precedence_result_and_actions() {
    let output = Command::new(bin())
        .arg("exec")
        .arg("--program")
        .arg(dl_test_example::program_path("precedence"))
        .arg("--user")
        .arg("smoke")
        .arg("--server")
        .arg("demos")
        .output()
        .expect("cli should execute");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines = stdout.lines().collect::<Vec<_>>();
    assert_eq!(lines[0], "RESULT:OK");
    assert_eq!(lines[1], r#"VALUE_JSON:{"type":"integer","value":20}"#);
    assert_eq!(lines[2], r#"DISPLAY_JSON:"20""#);
    assert_eq!(lines[3], r#"ACTION_JSON:"14""#);
}

#[test]
fn exec_reports_runtime_errors_with_non_zero_exit() {
    let program = std::env::temp_dir().join(format!(
        "dicelang-smoke-timeout-{}.json",
        std::process::id()
    ));
    fs::write(
        &program,
        r#"{"kind":"while","condition":{"kind":"boolean","value":true}}"#,
    )
    .expect("program should be written");

    let output = Command::new(bin())
        .arg("exec")
        .arg("--program")
        .arg(&program)
        .arg("--user")
        .arg("smoke")
        .arg("--server")
        .arg("demos")
        .output()
        .expect("cli should execute");
    assert_eq!(output.status.code(), Some(1));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("RESULT:ERROR"));
    assert!(stdout.contains("ERROR_KIND:WhileLoopTimeout"));
    assert!(stdout.contains("ITERATIONS:1000"));
}

#[test]
fn view_lists_core_names() {
    let output = Command::new(bin())
        .arg("view")
        .arg("--user")
        .arg("smoke")
        .arg("--server")
        .arg("demos")
        .arg("--core-dir")
        .arg(dl_test_example::core_dir())
        .output()
        .expect("cli should execute");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("TIER:global|[]"));
    assert!(stdout.contains(r#"TIER:core|["answer","greet"]"#));
}

#[test]
fn serve_answers_stdin_lines() {
    let mut child = Command::new(bin())
        .arg("serve")
        .arg("--core-dir")
        .arg(dl_test_example::core_dir())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("cli should spawn");

    {
        let mut stdin = child.stdin.take().expect("stdin should be piped");
        writeln!(
            stdin,
            r#"{{"user":"a","server":"s","program":{{"kind":"identifier","name":"answer"}}}}"#
        )
        .expect("stdin write");
        writeln!(
            stdin,
            r#"{{"user":"a","server":"s","program":{{"kind":"identifier","name":"ghost"}}}}"#
        )
        .expect("stdin write");
    }

    let output = child.wait_with_output().expect("cli should finish");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let replies = stdout
        .lines()
        .map(|line| serde_json::from_str::<serde_json::Value>(line).expect("reply json"))
        .collect::<Vec<_>>();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0]["ok"], serde_json::json!(true));
    assert_eq!(replies[0]["value"]["value"], serde_json::json!(42));
    assert_eq!(replies[1]["ok"], serde_json::json!(true));
}
