use std::fmt::Display;

use dl_core::DicelangError;
use thiserror::Error;

/// Failures surfaced by the binary: either host-side problems (files,
/// JSON, stdin) or errors raised by the runtime itself.
#[derive(Debug, Error)]
pub(crate) enum CliError {
    #[error("{code}: {message}")]
    Host { code: &'static str, message: String },
    #[error(transparent)]
    Runtime(#[from] DicelangError),
}

impl CliError {
    pub(crate) fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self::Host {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn code(&self) -> &'static str {
        match self {
            Self::Host { code, .. } => code,
            Self::Runtime(error) => error.kind.code(),
        }
    }

    pub(crate) fn message(&self) -> &str {
        match self {
            Self::Host { message, .. } => message,
            Self::Runtime(error) => &error.message,
        }
    }
}

fn map_error(code: &'static str, error: impl Display) -> CliError {
    CliError::new(code, error.to_string())
}

pub(crate) fn json_line(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}

pub(crate) fn emit_error(error: CliError) -> i32 {
    println!("RESULT:ERROR");
    println!("ERROR_KIND:{}", error.code());
    println!("ERROR_MSG_JSON:{}", json_line(error.message()));
    if let CliError::Runtime(runtime) = &error {
        if let Some(iterations) = runtime.iterations {
            println!("ITERATIONS:{}", iterations);
        }
        for action in &runtime.actions {
            println!("ACTION_JSON:{}", json_line(action));
        }
    }
    1
}

pub(crate) fn map_cli_io(error: std::io::Error) -> CliError {
    map_error("CLI_IO", error)
}

pub(crate) fn map_cli_program_read(error: std::io::Error) -> CliError {
    map_error("CLI_PROGRAM_READ", error)
}

pub(crate) fn map_cli_program_invalid(error: serde_json::Error) -> CliError {
    map_error("CLI_PROGRAM_INVALID", error)
}

pub(crate) fn map_cli_core_scan(error: walkdir::Error) -> CliError {
    map_error("CLI_CORE_SCAN", error)
}

pub(crate) fn map_cli_core_read(error: std::io::Error) -> CliError {
    map_error("CLI_CORE_READ", error)
}

pub(crate) fn map_cli_core_invalid(error: serde_json::Error) -> CliError {
    map_error("CLI_CORE_INVALID", error)
}

pub(crate) fn map_cli_config_read(error: std::io::Error) -> CliError {
    map_error("CLI_CONFIG_READ", error)
}

pub(crate) fn map_cli_config_invalid(error: serde_json::Error) -> CliError {
    map_error("CLI_CONFIG_INVALID", error)
}
