use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use dl_core::{Node, Value};
use dl_runtime::InterpreterOptions;
use walkdir::WalkDir;

use crate::{
    map_cli_config_invalid, map_cli_config_read, map_cli_core_invalid, map_cli_core_read,
    map_cli_core_scan, map_cli_program_invalid, map_cli_program_read, CliError,
};

pub(crate) fn read_program(path: &Path) -> Result<Node, CliError> {
    let raw = fs::read_to_string(path).map_err(map_cli_program_read)?;
    Node::from_json(&raw).map_err(map_cli_program_invalid)
}

pub(crate) fn load_options(path: Option<&str>) -> Result<InterpreterOptions, CliError> {
    let Some(path) = path else {
        return Ok(InterpreterOptions::default());
    };
    let raw = fs::read_to_string(path).map_err(map_cli_config_read)?;
    serde_json::from_str(&raw).map_err(map_cli_config_invalid)
}

pub(crate) fn resolve_core_dir(core_dir: &str) -> Result<PathBuf, CliError> {
    let path = PathBuf::from(core_dir);
    if !path.exists() {
        return Err(CliError::new(
            "CLI_CORE_NOT_FOUND",
            format!("core-dir does not exist: {}", path.display()),
        ));
    }
    if !path.is_dir() {
        return Err(CliError::new(
            "CLI_CORE_NOT_DIR",
            format!("core-dir is not a directory: {}", path.display()),
        ));
    }
    Ok(path)
}

/// Collects every `*.json` file under `core_dir`; each holds a map of
/// names to values. Later files (in path order) win on duplicate names.
pub(crate) fn read_core_library(core_dir: &Path) -> Result<BTreeMap<String, Value>, CliError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(core_dir).follow_links(false) {
        let entry = entry.map_err(map_cli_core_scan)?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path.to_path_buf());
        }
    }
    files.sort();

    let mut library = BTreeMap::new();
    for path in files {
        let raw = fs::read_to_string(&path).map_err(map_cli_core_read)?;
        let entries: BTreeMap<String, Value> =
            serde_json::from_str(&raw).map_err(map_cli_core_invalid)?;
        library.extend(entries);
    }
    Ok(library)
}
