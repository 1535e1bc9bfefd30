//! The Collector (§4.1): turns per-kind selectors into a deduplicated stream
//! of [`CollectedPath`]s. Grounded on `original_source/pkg/generate/collect/
//! *.go`'s explicit-paths/globs/recursive-walk fallback chain, adapted to a
//! `tokio::sync::mpsc` channel so later stages can start parsing before the
//! walk finishes (§5 "task-per-file for parsing" begins once paths arrive).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use crate::error::CollectError;
use crate::model::FileKind;

/// Selectors for a single file kind, mirroring the CLI flags of §6.
#[derive(Debug, Clone, Default)]
pub struct Selector {
    pub paths: Vec<String>,
    pub globs: Vec<String>,
    pub recursive: bool,
    pub exclude_dirs: Vec<String>,
}

/// One file destined for the Parser, or an error that aborts the run.
#[derive(Debug)]
pub struct CollectedPath {
    pub kind: FileKind,
    pub path: String,
}

/// Collects every matching path across all three kinds into channel `tx`,
/// lazily: each match is sent as soon as it's found. `base_dir` anchors
/// globs, recursion, and the default-filename fallback. A kind whose
/// selector is `None` is skipped entirely (no default-filename fallback
/// either) — used for `--exclude-dockerfiles`/`--exclude-composefiles` and
/// for Kubernetes, which is opt-in.
///
/// Returns as soon as the first [`CollectError`] is observed; the caller's
/// receiver end will simply see no further items.
pub async fn collect(
    base_dir: &Path,
    dockerfile: Option<Selector>,
    composefile: Option<Selector>,
    kubernetesfile: Option<Selector>,
    lockfile_name: &str,
    tx: mpsc::Sender<CollectedPath>,
) -> Result<(), CollectError> {
    validate_lockfile_name(lockfile_name)?;

    for (kind, selector) in [
        (FileKind::Dockerfile, dockerfile),
        (FileKind::Composefile, composefile),
        (FileKind::Kubernetesfile, kubernetesfile),
    ] {
        if let Some(selector) = selector {
            collect_kind(base_dir, kind, selector, &tx).await?;
        }
    }

    Ok(())
}

fn validate_lockfile_name(name: &str) -> Result<(), CollectError> {
    if name.contains('/') || name.contains(std::path::MAIN_SEPARATOR) {
        return Err(CollectError::LockfileNameHasSeparator(name.to_string()));
    }
    Ok(())
}

async fn collect_kind(
    base_dir: &Path,
    kind: FileKind,
    selector: Selector,
    tx: &mpsc::Sender<CollectedPath>,
) -> Result<(), CollectError> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut found_any = false;

    for explicit in &selector.paths {
        if seen.insert(explicit.clone()) {
            found_any = true;
            if tx.send(CollectedPath { kind, path: explicit.clone() }).await.is_err() {
                return Ok(());
            }
        }
    }

    for pattern in &selector.globs {
        let full_pattern = base_dir.join(pattern);
        let pattern_str = full_pattern.to_string_lossy().to_string();
        let paths = glob::glob(&pattern_str)
            .map_err(|source| CollectError::Glob { pattern: pattern.clone(), source })?;

        for entry in paths.flatten() {
            let path_str = entry.to_string_lossy().to_string();
            if seen.insert(path_str.clone()) {
                found_any = true;
                if tx.send(CollectedPath { kind, path: path_str }).await.is_err() {
                    return Ok(());
                }
            }
        }
    }

    if selector.recursive {
        for default_name in kind.default_filenames() {
            for entry in walk(base_dir, &selector.exclude_dirs)
                .map_err(|source| CollectError::Walk { path: base_dir.to_string_lossy().to_string(), source })?
            {
                if entry.file_name().and_then(|n| n.to_str()) == Some(default_name) {
                    let path_str = entry.to_string_lossy().to_string();
                    if seen.insert(path_str.clone()) {
                        found_any = true;
                        if tx.send(CollectedPath { kind, path: path_str }).await.is_err() {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    if !found_any {
        for default_name in kind.default_filenames() {
            let candidate = base_dir.join(default_name);
            if candidate.is_file() {
                let path_str = candidate.to_string_lossy().to_string();
                if seen.insert(path_str.clone())
                    && tx.send(CollectedPath { kind, path: path_str }).await.is_err()
                {
                    return Ok(());
                }
            }
        }
    }

    Ok(())
}

fn walk(base_dir: &Path, exclude_dirs: &[String]) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in walkdir::WalkDir::new(base_dir)
        .into_iter()
        .filter_entry(|e| !is_excluded(e, exclude_dirs))
    {
        let entry = entry.map_err(|e| e.into_io_error().unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "walk failed")
        }))?;
        if entry.file_type().is_file() {
            out.push(entry.into_path());
        }
    }
    Ok(out)
}

fn is_excluded(entry: &walkdir::DirEntry, exclude_dirs: &[String]) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| exclude_dirs.iter().any(|ex| ex == name))
            .unwrap_or(false)
}
