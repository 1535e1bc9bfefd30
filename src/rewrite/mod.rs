//! The Rewriter (§4.5): plan → stage → commit, with rollback on partial
//! commit failure.
//!
//! Grounded on `original_source/pkg/rewrite/write/docker.go`'s FROM-line
//! field-rewriting scanner and `pkg/rewrite/write/compose.go`'s
//! service-header/`image:`-line scanner, both generalized from per-kind
//! `map[string][]interface{}` payloads to the typed [`Lockfile`]. Unlike the
//! Go original, commit failure here rolls every prior rename back (§4.5
//! names this a requirement; the Go original does not).

mod docker_writer;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::RewriteError;
use crate::model::{Image, Lockfile};

/// One file whose on-disk contents should become `contents`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
    pub destination: String,
    pub contents: String,
}

/// Build the rewrite plan: read every source file named in `lockfile`,
/// compute its rewritten contents, but touch nothing on disk yet (§4.5 "Plan").
pub fn plan(lockfile: &Lockfile, exclude_tags: bool) -> Result<Vec<PlannedFile>, RewriteError> {
    let mut dockerfile_targets: BTreeMap<String, Vec<Image>> = BTreeMap::new();

    for (path, refs) in &lockfile.dockerfiles {
        let mut sorted = refs.clone();
        sorted.sort_by_key(|r| r.position);
        dockerfile_targets.insert(path.clone(), sorted.into_iter().map(|r| r.image).collect());
    }

    // Compose services with a `build` target their Dockerfile, not the
    // Compose file's own `image:` line (§4.5). Multiple services sharing one
    // Dockerfile must agree on the digest.
    for refs in lockfile.composefiles.values() {
        let mut by_dockerfile: BTreeMap<String, Vec<(usize, Image)>> = BTreeMap::new();
        for r in refs {
            if let Some(dockerfile) = &r.dockerfile {
                by_dockerfile.entry(dockerfile.clone()).or_default().push((r.position, r.image.clone()));
            }
        }

        for (dockerfile_path, mut positioned) in by_dockerfile {
            positioned.sort_by_key(|(pos, _)| *pos);
            let images: Vec<Image> = positioned.into_iter().map(|(_, img)| img).collect();

            match dockerfile_targets.get(&dockerfile_path) {
                None => {
                    dockerfile_targets.insert(dockerfile_path, images);
                }
                Some(existing) => {
                    agree_or_fail(&dockerfile_path, existing, &images)?;
                }
            }
        }
    }

    let mut planned = Vec::new();

    for (path, images) in &dockerfile_targets {
        let contents = std::fs::read_to_string(path)
            .map_err(|source| RewriteError::Stage { path: path.clone(), source })?;
        let rewritten = docker_writer::rewrite_dockerfile(&contents, images, exclude_tags)
            .map_err(|(found, expected)| RewriteError::ImageCountMismatch { path: path.clone(), found, expected })?;
        planned.push(PlannedFile { destination: path.clone(), contents: rewritten });
    }

    for (path, refs) in &lockfile.composefiles {
        let direct: Vec<(&str, &Image)> = refs
            .iter()
            .filter(|r| r.dockerfile.is_none())
            .map(|r| (r.service.as_str(), &r.image))
            .collect();

        if direct.is_empty() {
            continue;
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|source| RewriteError::Stage { path: path.clone(), source })?;
        let rewritten = rewrite_compose_images(&contents, &direct, exclude_tags)
            .map_err(|(found, expected)| RewriteError::ImageCountMismatch { path: path.clone(), found, expected })?;
        planned.push(PlannedFile { destination: path.clone(), contents: rewritten });
    }

    Ok(planned)
}

fn agree_or_fail(dockerfile_path: &str, existing: &[Image], incoming: &[Image]) -> Result<(), RewriteError> {
    if existing.len() != incoming.len() || existing.iter().zip(incoming).any(|(a, b)| a != b) {
        let first = existing.first().map(|i| i.image_line()).unwrap_or_default();
        let second = incoming.first().map(|i| i.image_line()).unwrap_or_default();
        return Err(RewriteError::DigestDisagreement {
            dockerfile: dockerfile_path.to_string(),
            first,
            second,
        });
    }
    Ok(())
}

/// Replace each named service's `image:` line. Ported in spirit from
/// `compose.go`'s header/`image:`-line scanner: a service name line arms the
/// next `image:` line for replacement.
fn rewrite_compose_images(
    contents: &str,
    services: &[(&str, &Image)],
    exclude_tags: bool,
) -> Result<String, (usize, usize)> {
    let by_service: BTreeMap<&str, &Image> = services.iter().copied().collect();
    let mut armed: Option<&str> = None;
    let mut rewritten_count = 0usize;
    let mut out = String::with_capacity(contents.len());

    for line in contents.lines() {
        let trimmed_name = line.trim().trim_end_matches(':');
        let mut emitted = line.to_string();

        if by_service.contains_key(trimmed_name) && line.trim_end().ends_with(':') {
            armed = Some(trimmed_name);
        } else if let Some(service) = armed {
            let without_leading = line.trim_start();
            if without_leading.starts_with("image:") {
                let indent = &line[..line.len() - without_leading.len()];
                let image = by_service[service];
                let mut rendered = image.clone();
                if exclude_tags {
                    rendered.tag.clear();
                }
                emitted = format!("{indent}image: {}", rendered.image_line());
                rewritten_count += 1;
                armed = None;
            }
        }

        out.push_str(&emitted);
        out.push('\n');
    }

    if rewritten_count != services.len() {
        return Err((rewritten_count, services.len()));
    }

    Ok(out)
}

/// Stage every planned file as a sibling temp file inside one temp directory
/// (§4.5 "Stage"): nothing at `destination` is touched yet.
pub fn stage(
    planned: &[PlannedFile],
    temp_dir: Option<&Path>,
) -> Result<(tempfile::TempDir, Vec<(PathBuf, PathBuf)>), RewriteError> {
    let dir = match temp_dir {
        Some(base) => tempfile::Builder::new().prefix("docker-lock-").tempdir_in(base),
        None => tempfile::Builder::new().prefix("docker-lock-").tempdir(),
    }
    .map_err(|source| RewriteError::Stage { path: "<temp dir>".to_string(), source })?;

    let mut staged = Vec::with_capacity(planned.len());
    for file in planned {
        let sanitized = file.destination.replace(['/', '\\'], "-");
        let mut temp = tempfile::Builder::new()
            .prefix(&format!("{sanitized}-"))
            .tempfile_in(dir.path())
            .map_err(|source| RewriteError::Stage { path: file.destination.clone(), source })?;

        use std::io::Write;
        temp.write_all(file.contents.as_bytes())
            .map_err(|source| RewriteError::Stage { path: file.destination.clone(), source })?;

        let temp_path = temp.into_temp_path().keep().map_err(|e| RewriteError::Stage {
            path: file.destination.clone(),
            source: e.error,
        })?;

        staged.push((PathBuf::from(&file.destination), temp_path));
    }

    Ok((dir, staged))
}

/// Rename every staged file onto its destination (§4.5 "Commit"). On the
/// first failure, every prior rename is rolled back to its pre-run content
/// (or deleted, if it didn't exist before), and the error is returned.
pub fn commit(staged: Vec<(PathBuf, PathBuf)>) -> Result<Vec<String>, RewriteError> {
    let mut backups: Vec<(PathBuf, Option<Vec<u8>>)> = Vec::with_capacity(staged.len());
    let mut committed = Vec::with_capacity(staged.len());

    for (dest, temp_path) in &staged {
        let original = std::fs::read(dest).ok();

        if let Err(source) = std::fs::rename(temp_path, dest) {
            let failed_paths: Vec<String> = roll_back(backups, dest.to_string_lossy().to_string());
            return Err(RewriteError::CommitFailed { paths: failed_paths, source });
        }

        backups.push((dest.clone(), original));
        committed.push(dest.to_string_lossy().to_string());
    }

    Ok(committed)
}

fn roll_back(backups: Vec<(PathBuf, Option<Vec<u8>>)>, failed_dest: String) -> Vec<String> {
    let mut unrecoverable = vec![failed_dest];
    for (dest, original) in backups.into_iter().rev() {
        let result = match original {
            Some(bytes) => std::fs::write(&dest, bytes),
            None => std::fs::remove_file(&dest),
        };
        if result.is_err() {
            unrecoverable.push(dest.to_string_lossy().to_string());
        }
    }
    unrecoverable
}

#[cfg(test)]
mod tests {
    use crate::model::{ComposefileImageRef, DockerfileImageRef};

    use super::*;

    fn image(name: &str, tag: &str, digest: &str) -> Image {
        Image::new(name, tag, digest)
    }

    #[test]
    fn plans_a_single_dockerfile_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Dockerfile");
        std::fs::write(&path, "FROM busybox\n").unwrap();
        let path_str = path.to_string_lossy().to_string();

        let mut lockfile = Lockfile::default();
        lockfile.dockerfiles.insert(
            path_str.clone(),
            vec![DockerfileImageRef {
                image: image("busybox", "1.30", "abc123"),
                path: path_str.clone(),
                position: 0,
            }],
        );

        let planned = plan(&lockfile, false).unwrap();
        assert_eq!(planned.len(), 1);
        assert!(planned[0].contents.contains("FROM busybox:1.30@sha256:abc123"));
    }

    #[test]
    fn rejects_mismatched_image_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Dockerfile");
        std::fs::write(&path, "FROM busybox\nFROM alpine\n").unwrap();
        let path_str = path.to_string_lossy().to_string();

        let mut lockfile = Lockfile::default();
        lockfile.dockerfiles.insert(
            path_str.clone(),
            vec![DockerfileImageRef { image: image("busybox", "1.30", "abc123"), path: path_str, position: 0 }],
        );

        let err = plan(&lockfile, false).unwrap_err();
        assert!(matches!(err, RewriteError::ImageCountMismatch { found: 2, expected: 1, .. }));
    }

    #[test]
    fn disagreeing_digests_for_shared_dockerfile_is_fatal() {
        let mut lockfile = Lockfile::default();
        lockfile.composefiles.insert(
            "docker-compose.yml".to_string(),
            vec![
                ComposefileImageRef {
                    image: image("busybox", "1.30", "aaa"),
                    service: "one".to_string(),
                    dockerfile: Some("build/Dockerfile".to_string()),
                    path: "docker-compose.yml".to_string(),
                    position: 0,
                },
                ComposefileImageRef {
                    image: image("busybox", "1.30", "bbb"),
                    service: "two".to_string(),
                    dockerfile: Some("build/Dockerfile".to_string()),
                    path: "docker-compose.yml".to_string(),
                    position: 0,
                },
            ],
        );

        let err = plan(&lockfile, false).unwrap_err();
        assert!(matches!(err, RewriteError::DigestDisagreement { .. }));
    }

    #[test]
    fn stage_then_commit_writes_through_a_temp_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Dockerfile");
        std::fs::write(&path, "FROM busybox\n").unwrap();

        let planned = vec![PlannedFile {
            destination: path.to_string_lossy().to_string(),
            contents: "FROM busybox:1.30@sha256:abc123\n".to_string(),
        }];

        let (_temp_dir, staged) = stage(&planned, None).unwrap();
        let committed = commit(staged).unwrap();
        assert_eq!(committed.len(), 1);

        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert_eq!(on_disk, "FROM busybox:1.30@sha256:abc123\n");
    }

    #[test]
    fn rollback_restores_original_content_on_commit_failure() {
        let dir = tempfile::tempdir().unwrap();
        let good_path = dir.path().join("Dockerfile");
        std::fs::write(&good_path, "FROM busybox\n").unwrap();

        let planned = vec![
            PlannedFile { destination: good_path.to_string_lossy().to_string(), contents: "FROM new\n".to_string() },
            PlannedFile { destination: "/nonexistent-dir/Dockerfile".to_string(), contents: "FROM new\n".to_string() },
        ];

        let (_temp_dir, mut staged) = stage(&planned, None).unwrap();
        // Force the second rename to fail by pointing it at a directory that
        // cannot exist, simulating a commit-phase failure.
        staged[1].0 = PathBuf::from("/nonexistent-dir/Dockerfile");

        let err = commit(staged).unwrap_err();
        assert!(matches!(err, RewriteError::CommitFailed { .. }));

        let restored = std::fs::read_to_string(&good_path).unwrap();
        assert_eq!(restored, "FROM busybox\n");
    }
}
