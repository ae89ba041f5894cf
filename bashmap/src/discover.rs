//! Input discovery: expand CLI patterns into loaded script sources.

use anyhow::{Context, Result};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// File extensions recognized as bash sources.
const SUPPORTED_EXTENSIONS: &[&str] = &["sh", "bash", "bats"];

/// A loaded script.
#[derive(Debug)]
pub struct Source {
    pub path: PathBuf,
    /// Name recorded in analysis output
    pub label: String,
    pub text: String,
}

impl Source {
    fn load(path: PathBuf, label: String) -> Result<Self> {
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Self { path, label, text })
    }
}

/// Read one script from stdin, labelled `-`.
pub fn read_stdin() -> Result<Source> {
    let mut text = String::new();
    io::stdin()
        .read_to_string(&mut text)
        .context("failed to read stdin")?;
    Ok(Source {
        path: PathBuf::from("-"),
        label: "-".to_string(),
        text,
    })
}

/// Expand patterns and load every matching file, labelled by its path.
pub fn read_sources(patterns: &[String]) -> Result<Vec<Source>> {
    expand_globs(patterns)?
        .into_iter()
        .map(|path| {
            let label = path.display().to_string();
            Source::load(path, label)
        })
        .collect()
}

/// Load every script directly inside `dir`, labelled relative to `dir`.
pub fn read_utility_dir(dir: &Path) -> Result<Vec<Source>> {
    if !dir.is_dir() {
        anyhow::bail!("utility directory not found: {}", dir.display());
    }
    scan_dir(dir)?
        .into_iter()
        .map(|path| {
            let label = relative_label(&path, dir);
            Source::load(path, label)
        })
        .collect()
}

/// Label for `path`: relative to `dir` when it lives there, the path as given otherwise.
pub fn relative_label(path: &Path, dir: &Path) -> String {
    if let Ok(rel) = path.strip_prefix(dir) {
        return rel.display().to_string();
    }
    if let (Ok(abs_path), Ok(abs_dir)) = (path.canonicalize(), dir.canonicalize()) {
        if let Ok(rel) = abs_path.strip_prefix(&abs_dir) {
            return rel.display().to_string();
        }
    }
    path.display().to_string()
}

/// Expand glob patterns into a list of real file paths.
/// Also handles bare directory paths by scanning for supported file types.
fn expand_globs(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let path = Path::new(pattern);
        if path.is_file() {
            files.push(path.to_path_buf());
            continue;
        }
        if path.is_dir() {
            files.extend(scan_dir(path)?);
            continue;
        }
        let matches: Vec<_> = glob::glob(pattern)
            .with_context(|| format!("invalid glob pattern: {}", pattern))?
            .filter_map(|r| r.ok())
            .filter(|p| p.is_file())
            .collect();
        if matches.is_empty() {
            tracing::warn!("no files matched: {}", pattern);
        }
        files.extend(matches);
    }
    // Sort for deterministic output
    files.sort();
    files.dedup();
    Ok(files)
}

/// Supported scripts directly inside `dir` (non-recursive), sorted.
fn scan_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?;
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && is_supported(p))
        .collect();
    files.sort();
    Ok(files)
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext))
}
