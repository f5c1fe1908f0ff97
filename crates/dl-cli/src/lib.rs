use std::ffi::OsString;

use clap::Parser;

mod cli_args;
mod error_map;
mod logging;
mod models;
mod session_ops;
mod source_loader;

pub(crate) use cli_args::{Cli, ExecArgs, Mode, RuntimeArgs, ViewArgs};
#[cfg(test)]
pub(crate) use cli_args::TierFilter;
pub(crate) use error_map::{
    emit_error, json_line, map_cli_config_invalid, map_cli_config_read, map_cli_core_invalid,
    map_cli_core_read, map_cli_core_scan, map_cli_io, map_cli_program_invalid,
    map_cli_program_read, CliError,
};
pub(crate) use models::{ErrorReply, ServeReply, ServeRequest, ServeSummary};
pub(crate) use session_ops::{run_exec, run_serve, run_view};
#[cfg(test)]
pub(crate) use session_ops::{open_interpreter, serve_lines};
pub(crate) use source_loader::{load_options, read_core_library, read_program, resolve_core_dir};

pub fn run_cli_from_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return error.exit_code();
        }
    };
    logging::install_tracing();
    match run(cli) {
        Ok(code) => code,
        Err(error) => emit_error(error),
    }
}

fn run(cli: Cli) -> Result<i32, CliError> {
    match cli.command {
        Mode::Exec(args) => run_exec(args),
        Mode::View(args) => run_view(args),
        Mode::Serve(args) => run_serve(args.runtime),
    }
}
