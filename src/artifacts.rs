//! Build output directory handling: cleaning and package discovery.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{BuildError, Result};

/// Directory under the project root that CMake presets build into.
pub const OUTPUT_DIR: &str = "out";

/// Directory under the project root that receives build logs.
pub const LOG_DIR: &str = "build-logs";

/// Archive suffixes produced by the `package` target.
pub const PACKAGE_SUFFIXES: &[&str] = &[".zip", ".tar.gz"];

/// `<root>/out/<preset>`
pub fn preset_output_dir(project_root: &Path, preset: &str) -> PathBuf {
    project_root.join(OUTPUT_DIR).join(preset)
}

/// Result of cleaning a preset's output directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanOutcome {
    /// The directory existed and was removed; bytes it held.
    Removed(u64),
    /// Nothing to do.
    Missing,
}

/// Remove `<root>/out/<preset>` and everything under it.
pub fn clean_preset(project_root: &Path, preset: &str) -> Result<CleanOutcome> {
    let dir = preset_output_dir(project_root, preset);
    if !dir.exists() {
        return Ok(CleanOutcome::Missing);
    }

    let size = dir_size(&dir);
    fs::remove_dir_all(&dir).map_err(|source| BuildError::IoError {
        path: dir.clone(),
        source,
    })?;

    Ok(CleanOutcome::Removed(size))
}

/// Archives directly inside `dir`, sorted by path.
pub fn find_packages(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut packages = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| BuildError::IoError {
            path: dir.to_path_buf(),
            source: e.into(),
        })?;

        if entry.file_type().is_file() && is_package(entry.path()) {
            packages.push(entry.into_path());
        }
    }

    packages.sort();
    Ok(packages)
}

fn is_package(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| PACKAGE_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)))
}

/// Total size of regular files under `dir`; unreadable entries are skipped.
pub fn dir_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}

/// Format size in human-readable format
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit_idx])
    }
}
