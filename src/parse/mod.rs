//! The Parser (§4.2): dispatches each [`CollectedPath`] to the sub-parser
//! matching its kind, one task per file (§5), all feeding a single
//! `ImageRef` output channel.

pub mod compose;
pub mod dockerfile;
pub mod imageline;
pub mod kubernetes;

use std::collections::HashMap;
use std::path::Path;

use tokio::sync::mpsc;

use crate::collect::CollectedPath;
use crate::error::ParseError;
use crate::model::{FileKind, ImageRef};

/// Reads and parses one [`CollectedPath`], sending every [`ImageRef`] it
/// contains to `tx` in encounter order (§4.2.4 orders within a single file;
/// cross-file ordering is the Formatter's job). `env` is the environment map
/// assembled once for the whole run (process environment plus the
/// `--env-file` named at the CLI, §4.2.3) and used to expand Compose
/// variables.
pub async fn parse_one(
    collected: CollectedPath,
    env: &HashMap<String, String>,
    tx: &mpsc::Sender<ImageRef>,
) -> Result<(), ParseError> {
    let refs = match collected.kind {
        FileKind::Dockerfile => parse_dockerfile_path(&collected.path)?,
        FileKind::Composefile => parse_composefile_path(&collected.path, env)?,
        FileKind::Kubernetesfile => parse_kubernetesfile_path(&collected.path)?,
    };

    for image_ref in refs {
        if tx.send(image_ref).await.is_err() {
            break;
        }
    }

    Ok(())
}

fn read_file(path: &str) -> Result<String, ParseError> {
    std::fs::read_to_string(path).map_err(|source| ParseError::Io { path: path.to_string(), source })
}

fn parse_dockerfile_path(path: &str) -> Result<Vec<ImageRef>, ParseError> {
    let contents = read_file(path)?;
    let refs = dockerfile::parse_dockerfile(path, &contents, &HashMap::new())?;
    Ok(refs.into_iter().map(ImageRef::Dockerfile).collect())
}

fn parse_composefile_path(path: &str, env: &HashMap<String, String>) -> Result<Vec<ImageRef>, ParseError> {
    let contents = read_file(path)?;
    let compose_path = Path::new(path);
    let compose_dir = compose_path.parent().unwrap_or_else(|| Path::new("."));
    compose::parse_compose(path, &contents, env, compose_dir)
}

fn parse_kubernetesfile_path(path: &str) -> Result<Vec<ImageRef>, ParseError> {
    let contents = read_file(path)?;
    let refs = kubernetes::parse_kubernetes(path, &contents)?;
    Ok(refs.into_iter().map(ImageRef::Kubernetes).collect())
}
