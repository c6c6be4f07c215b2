//! Serato source locator
//!
//! Resolves a library root into the concrete crate-file and session-log paths
//! that exist and are readable. Crates live under `<root>/History/*.crate`,
//! session logs under `<root>/Logs/*.log` and `*.txt`. Read-only probing; no
//! side effects.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use playlog_common::config::Mode;
use playlog_common::error::{Error, Result, Warning};
use playlog_common::models::Outcome;

/// Candidate source files discovered under a library root
#[derive(Debug, Clone, Default)]
pub struct SourceSet {
    /// Crate files, sorted by path for deterministic downstream order
    pub crates: Vec<PathBuf>,
    /// Session log files, sorted by path
    pub logs: Vec<PathBuf>,
}

/// Locate candidate sources under `root` for the requested mode.
///
/// Both source types are always probed (crate-only modes still correlate
/// against logs for anchor times); the mode only decides whether an empty
/// candidate set is fatal. `auto` never fails here — it yields empty sets and
/// lets the resolver fall back.
pub fn locate(root: &Path, mode: Mode) -> Result<Outcome<SourceSet>> {
    if !root.exists() {
        return Err(Error::Config(format!(
            "Serato root does not exist: {}",
            root.display()
        )));
    }
    if !root.is_dir() {
        return Err(Error::Config(format!(
            "Serato root is not a directory: {}",
            root.display()
        )));
    }

    let mut warnings = Vec::new();
    let crates = collect(&root.join("History"), &["crate"], &mut warnings);
    let logs = collect(&root.join("Logs"), &["log", "txt"], &mut warnings);

    debug!(
        root = %root.display(),
        crates = crates.len(),
        logs = logs.len(),
        "located candidate sources"
    );

    match mode {
        Mode::Crate if crates.is_empty() => {
            return Err(Error::UnavailableSource {
                mode,
                missing: "crate",
            });
        }
        Mode::Logs if logs.is_empty() => {
            return Err(Error::UnavailableSource {
                mode,
                missing: "logs",
            });
        }
        _ => {}
    }

    Ok(Outcome::with_warnings(SourceSet { crates, logs }, warnings))
}

/// Collect readable files with one of `extensions` directly under `dir`.
fn collect(dir: &Path, extensions: &[&str], warnings: &mut Vec<Warning>) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }

    let mut found = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Error accessing entry under {}: {}", dir.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path().to_path_buf();
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase());
        if !ext.is_some_and(|e| extensions.contains(&e.as_str())) {
            continue;
        }
        // readability probe; unreadable candidates are skipped, not fatal
        match File::open(&path) {
            Ok(_) => found.push(path),
            Err(e) => {
                warn!("Skipping unreadable source {}: {}", path.display(), e);
                warnings.push(Warning::source(&path, format!("unreadable source: {e}")));
            }
        }
    }

    found.sort();
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn serato_root(dir: &Path) -> PathBuf {
        let root = dir.join("_Serato_");
        fs::create_dir_all(root.join("History")).unwrap();
        fs::create_dir_all(root.join("Logs")).unwrap();
        root
    }

    #[test]
    fn missing_root_is_a_config_error() {
        let err = locate(Path::new("/definitely/not/here"), Mode::Auto).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn root_must_be_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("root");
        fs::write(&file, b"x").unwrap();
        let err = locate(&file, Mode::Auto).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn finds_crates_and_logs_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let root = serato_root(dir.path());
        fs::write(root.join("History/b.crate"), b"").unwrap();
        fs::write(root.join("History/a.crate"), b"").unwrap();
        fs::write(root.join("History/notes.txt"), b"").unwrap();
        fs::write(root.join("Logs/2025-05-03.log"), b"").unwrap();
        fs::write(root.join("Logs/session.txt"), b"").unwrap();

        let sources = locate(&root, Mode::Auto).unwrap().value;
        let crate_names: Vec<_> = sources
            .crates
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(crate_names, vec!["a.crate", "b.crate"]);
        assert_eq!(sources.logs.len(), 2);
    }

    #[test]
    fn explicit_mode_fails_without_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let root = serato_root(dir.path());
        fs::write(root.join("Logs/session.log"), b"").unwrap();

        let err = locate(&root, Mode::Crate).unwrap_err();
        assert!(matches!(
            err,
            Error::UnavailableSource {
                mode: Mode::Crate,
                missing: "crate"
            }
        ));

        // auto never fails for an absent source type
        let sources = locate(&root, Mode::Auto).unwrap().value;
        assert!(sources.crates.is_empty());
        assert_eq!(sources.logs.len(), 1);
    }
}
