use std::fs;
use std::path::PathBuf;

pub fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

pub fn demos_root() -> PathBuf {
    workspace_root().join("demos")
}

pub fn core_dir() -> PathBuf {
    demos_root().join("core")
}

pub fn program_path(name: &str) -> PathBuf {
    demos_root().join("programs").join(format!("{}.json", name))
}

pub fn cases_root() -> PathBuf {
    demos_root().join("cases")
}

pub fn case_dir(name: &str) -> PathBuf {
    cases_root().join(name)
}

pub fn case_path(name: &str) -> PathBuf {
    case_dir(name).join("case.json")
}

/// Every case directory, sorted by name.
pub fn case_dirs() -> Vec<PathBuf> {
    let mut dirs = fs::read_dir(cases_root())
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| path.is_dir())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    dirs.sort();
    dirs
}
