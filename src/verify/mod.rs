//! The Verifier (§4.5): regenerates a lockfile restricted to the paths an
//! existing one already names, then compares structurally.
//!
//! Grounded on `original_source/pkg/verify/verifier.go`'s
//! decode-then-regenerate-then-compare shape and its
//! `filterDockerfileImageTags`/`filterComposefileImageTags` exclude-tags
//! mode.

use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;

use crate::collect::Selector;
use crate::error::{Result, VerifyError};
use crate::generate::{self, GenerateOptions};
use crate::model::Lockfile;
use crate::registry::WrapperManager;

/// Read `existing` from disk, regenerate a lockfile restricted to its own
/// paths, and compare. Returns `Ok(())` on a silent match; a
/// [`VerifyError::DifferentLockfile`] carries both sides otherwise.
pub async fn verify(
    existing_path: &std::path::Path,
    base_dir: PathBuf,
    env_file: PathBuf,
    manager: Arc<WrapperManager>,
    exclude_tags: bool,
) -> Result<()> {
    let raw = std::fs::read_to_string(existing_path).map_err(VerifyError::Read)?;
    let existing: Lockfile = serde_json::from_str(&raw).map_err(VerifyError::Parse)?;

    let options = GenerateOptions {
        base_dir,
        dockerfile: Some(Selector { paths: existing.dockerfiles.keys().cloned().collect(), ..Default::default() }),
        composefile: Some(Selector {
            paths: existing.composefiles.keys().cloned().collect(),
            ..Default::default()
        }),
        kubernetesfile: if existing.kubernetesfiles.is_empty() {
            None
        } else {
            Some(Selector { paths: existing.kubernetesfiles.keys().cloned().collect(), ..Default::default() })
        },
        lockfile_name: "docker-lock.json".to_string(),
        env_file,
    };

    let new_lockfile = generate::generate(options, manager).await?;

    let (existing_cmp, new_cmp) = if exclude_tags {
        (strip_tags(existing.clone()), strip_tags(new_lockfile.clone()))
    } else {
        (existing.clone(), new_lockfile.clone())
    };

    if existing_cmp != new_cmp {
        return Err(VerifyError::DifferentLockfile {
            existing: Box::new(existing),
            new: Box::new(new_lockfile),
        }
        .into());
    }

    Ok(())
}

fn strip_tags(mut lockfile: Lockfile) -> Lockfile {
    for refs in lockfile.dockerfiles.values_mut() {
        for r in refs.iter_mut() {
            r.image.tag.clear();
        }
    }
    for refs in lockfile.composefiles.values_mut() {
        for r in refs.iter_mut() {
            r.image.tag.clear();
        }
    }
    for refs in lockfile.kubernetesfiles.values_mut() {
        for r in refs.iter_mut() {
            r.image.tag.clear();
        }
    }
    lockfile
}

/// Render a human-readable unified diff between the two sides of a
/// [`VerifyError::DifferentLockfile`], for CLI output.
pub fn render_diff(existing: &Lockfile, new: &Lockfile) -> String {
    let existing_json = serde_json::to_string_pretty(existing).unwrap_or_default();
    let new_json = serde_json::to_string_pretty(new).unwrap_or_default();
    let diff = similar::TextDiff::from_lines(&existing_json, &new_json)
        .unified_diff()
        .context_radius(3)
        .header("existing lockfile", "freshly generated lockfile")
        .to_string();

    diff.lines()
        .map(|line| match line.as_bytes().first() {
            Some(b'+') => line.green().to_string(),
            Some(b'-') => line.red().to_string(),
            Some(b'@') => line.cyan().to_string(),
            _ => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
