use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use dl_core::DicelangError;
use dl_runtime::{Interpreter, JsonFileBackend, Outcome, PersistAction, VariableStore};
use tracing::{info, warn};

use crate::{
    json_line, load_options, map_cli_io, read_core_library, read_program, resolve_core_dir,
    CliError, ErrorReply, ExecArgs, RuntimeArgs, ServeReply, ServeRequest, ServeSummary,
    ViewArgs,
};

pub(crate) fn open_interpreter(args: &RuntimeArgs) -> Result<Interpreter, CliError> {
    let options = load_options(args.config.as_deref())?;
    let store = match args.store.as_deref() {
        Some(path) => VariableStore::open(Arc::new(JsonFileBackend::new(path)))?,
        None => VariableStore::new(),
    };
    if let Some(core_dir) = args.core_dir.as_deref() {
        let core_dir = resolve_core_dir(core_dir)?;
        let library = read_core_library(&core_dir)?;
        info!(entries = library.len(), dir = %core_dir.display(), "core library installed");
        store.replace_core(library);
    }
    Ok(Interpreter::new(Arc::new(store), options))
}

pub(crate) fn run_exec(args: ExecArgs) -> Result<i32, CliError> {
    let interpreter = open_interpreter(&args.runtime)?;
    let program = read_program(Path::new(&args.program))?;
    let result = interpreter.execute(&program, &args.user, &args.server);
    let saved = if interpreter.store().is_durable() {
        interpreter.flush()
    } else {
        Ok(())
    };
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(error) => {
            if let Err(storage) = saved {
                warn!(error = %storage, "store was not saved after the failed program");
            }
            return Err(error.into());
        }
    };
    emit_outcome(&outcome);
    match saved {
        Ok(()) => Ok(0),
        Err(error) => {
            warn!(%error, "store was not saved");
            Ok(1)
        }
    }
}

pub(crate) fn emit_outcome(outcome: &Outcome) {
    println!("RESULT:OK");
    println!(
        "VALUE_JSON:{}",
        serde_json::to_string(&outcome.value).unwrap_or_else(|_| "null".to_string())
    );
    println!("DISPLAY_JSON:{}", json_line(&outcome.value.to_string()));
    for action in &outcome.actions {
        println!("ACTION_JSON:{}", json_line(action));
    }
}

pub(crate) fn run_view(args: ViewArgs) -> Result<i32, CliError> {
    let interpreter = open_interpreter(&args.runtime)?;
    println!("RESULT:OK");
    for tier in args.tier.tiers() {
        let names = interpreter
            .keys(tier, &args.user, &args.server)
            .into_iter()
            .collect::<Vec<_>>();
        println!(
            "TIER:{}|{}",
            tier,
            serde_json::to_string(&names).unwrap_or_else(|_| "[]".to_string())
        );
    }
    Ok(0)
}

pub(crate) fn run_serve(args: RuntimeArgs) -> Result<i32, CliError> {
    let interpreter = open_interpreter(&args)?;
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let summary = serve_lines(&interpreter, stdin.lock(), stdout.lock())?;
    if interpreter.store().is_durable() {
        interpreter.flush()?;
    }
    info!(handled = summary.handled, failed = summary.failed, "serve finished");
    Ok(0)
}

/// Answers one JSON reply per non-empty input line until EOF.
pub(crate) fn serve_lines<R: BufRead, W: Write>(
    interpreter: &Interpreter,
    reader: R,
    mut writer: W,
) -> Result<ServeSummary, CliError> {
    let mut summary = ServeSummary::default();
    for line in reader.lines() {
        let line = line.map_err(map_cli_io)?;
        if line.trim().is_empty() {
            continue;
        }
        let mut reply = match serde_json::from_str::<ServeRequest>(&line) {
            Ok(request) => {
                match interpreter.execute(&request.program, &request.user, &request.server) {
                    Ok(outcome) => success_reply(outcome),
                    Err(error) => failure_reply(&error),
                }
            }
            Err(error) => ServeReply {
                ok: false,
                value: None,
                display: None,
                actions: Vec::new(),
                error: Some(ErrorReply {
                    kind: "CLI_PROGRAM_INVALID".to_string(),
                    message: error.to_string(),
                    iterations: None,
                }),
                persisted: None,
            },
        };
        reply.persisted = match interpreter.after_command() {
            Ok(Some(PersistAction::Save)) => Some("save".to_string()),
            Ok(Some(PersistAction::Backup)) => Some("backup".to_string()),
            Ok(None) => None,
            Err(error) => {
                warn!(%error, "persistence failed after command");
                Some(format!("failed: {}", error.message))
            }
        };

        summary.handled += 1;
        if !reply.ok {
            summary.failed += 1;
        }
        let payload = serde_json::to_string(&reply)
            .map_err(|error| CliError::new("CLI_REPLY_ENCODE", error.to_string()))?;
        writeln!(writer, "{}", payload).map_err(map_cli_io)?;
        writer.flush().map_err(map_cli_io)?;
    }
    Ok(summary)
}

fn success_reply(outcome: Outcome) -> ServeReply {
    ServeReply {
        ok: true,
        display: Some(outcome.value.to_string()),
        value: Some(outcome.value),
        actions: outcome.actions,
        error: None,
        persisted: None,
    }
}

fn failure_reply(error: &DicelangError) -> ServeReply {
    ServeReply {
        ok: false,
        value: None,
        display: None,
        actions: error.actions.clone(),
        error: Some(ErrorReply {
            kind: error.kind.code().to_string(),
            message: error.message.clone(),
            iterations: error.iterations,
        }),
        persisted: None,
    }
}
