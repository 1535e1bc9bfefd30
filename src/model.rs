//! Core data model: [`Image`], the per-kind `ImageRef` variants, and the
//! [`Lockfile`] they serialize into.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// File kinds the Collector and Parser understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileKind {
    Dockerfile,
    Composefile,
    Kubernetesfile,
}

impl FileKind {
    pub fn default_filenames(self) -> &'static [&'static str] {
        match self {
            FileKind::Dockerfile => &["Dockerfile"],
            FileKind::Composefile => &["docker-compose.yml", "docker-compose.yaml"],
            FileKind::Kubernetesfile => &[],
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FileKind::Dockerfile => "Dockerfile",
            FileKind::Composefile => "Composefile",
            FileKind::Kubernetesfile => "Kubernetesfile",
        };
        write!(f, "{s}")
    }
}

/// The atomic unit: a registry-qualified name, an optional tag, and a
/// digest that is empty until the Updater resolves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub name: String,
    pub tag: String,
    pub digest: String,
}

impl Image {
    pub fn new(name: impl Into<String>, tag: impl Into<String>, digest: impl Into<String>) -> Self {
        Self { name: name.into(), tag: tag.into(), digest: digest.into() }
    }

    /// `(name, tag)` — the dedup key used by the Updater's cache.
    pub fn key(&self) -> (String, String) {
        (self.name.clone(), self.tag.clone())
    }

    /// Render as `name[:tag][@sha256:digest]`, used by the Rewriter.
    pub fn image_line(&self) -> String {
        let mut line = self.name.clone();
        if !self.tag.is_empty() {
            line.push(':');
            line.push_str(&self.tag);
        }
        if !self.digest.is_empty() {
            line.push_str("@sha256:");
            line.push_str(&self.digest);
        }
        line
    }
}

/// A Dockerfile `FROM` reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerfileImageRef {
    #[serde(flatten)]
    pub image: Image,
    #[serde(skip)]
    pub path: String,
    #[serde(skip)]
    pub position: usize,
}

/// A Compose service's image, either named directly or produced by a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposefileImageRef {
    #[serde(flatten)]
    pub image: Image,
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub dockerfile: Option<String>,
    #[serde(skip)]
    pub path: String,
    #[serde(skip)]
    pub position: usize,
}

/// A container (or init container) image inside a Kubernetes manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubernetesImageRef {
    #[serde(flatten)]
    pub image: Image,
    pub container: String,
    #[serde(skip)]
    pub path: String,
    #[serde(skip)]
    pub doc_position: usize,
    #[serde(skip)]
    pub position: usize,
}

/// Provenance-tagged union used internally by the Parser/Updater stages so
/// both can operate over a single channel type regardless of source kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    Dockerfile(DockerfileImageRef),
    Compose(ComposefileImageRef),
    Kubernetes(KubernetesImageRef),
}

impl ImageRef {
    pub fn image(&self) -> &Image {
        match self {
            ImageRef::Dockerfile(r) => &r.image,
            ImageRef::Compose(r) => &r.image,
            ImageRef::Kubernetes(r) => &r.image,
        }
    }

    pub fn image_mut(&mut self) -> &mut Image {
        match self {
            ImageRef::Dockerfile(r) => &mut r.image,
            ImageRef::Compose(r) => &mut r.image,
            ImageRef::Kubernetes(r) => &mut r.image,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            ImageRef::Dockerfile(r) => &r.path,
            ImageRef::Compose(r) => &r.path,
            ImageRef::Kubernetes(r) => &r.path,
        }
    }

    pub fn kind(&self) -> FileKind {
        match self {
            ImageRef::Dockerfile(_) => FileKind::Dockerfile,
            ImageRef::Compose(_) => FileKind::Composefile,
            ImageRef::Kubernetes(_) => FileKind::Kubernetesfile,
        }
    }

    /// Sort key implementing the ordering contract of §4.2.4: Dockerfiles
    /// order by encounter position, Compose orders by `(service, dockerfile,
    /// position)`, Kubernetes orders by `(doc_position, position)` —
    /// document-then-container/init-container encounter order, not
    /// alphabetically by container name.
    pub fn sort_key(&self) -> (String, String, usize) {
        match self {
            ImageRef::Dockerfile(r) => (String::new(), String::new(), r.position),
            ImageRef::Compose(r) => (
                r.service.clone(),
                r.dockerfile.clone().unwrap_or_default(),
                r.position,
            ),
            ImageRef::Kubernetes(r) => (
                String::new(),
                String::new(),
                r.doc_position * 1_000_000 + r.position,
            ),
        }
    }
}

/// The JSON artifact mapping source files to ordered image references.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Lockfile {
    #[serde(default)]
    pub dockerfiles: BTreeMap<String, Vec<DockerfileImageRef>>,
    #[serde(default)]
    pub composefiles: BTreeMap<String, Vec<ComposefileImageRef>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub kubernetesfiles: BTreeMap<String, Vec<KubernetesImageRef>>,
}

/// Normalize a filesystem path to the forward-slash form the Lockfile
/// always stores (§3, §6), regardless of the host's native separator.
pub fn to_slash_path(path: &std::path::Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_line_renders_all_shapes() {
        assert_eq!(Image::new("ubuntu", "latest", "").image_line(), "ubuntu:latest");
        assert_eq!(Image::new("ubuntu", "", "").image_line(), "ubuntu");
        assert_eq!(
            Image::new("ubuntu", "18.04", "abc123").image_line(),
            "ubuntu:18.04@sha256:abc123"
        );
    }

    #[test]
    fn lockfile_round_trips_through_json() {
        let mut lf = Lockfile::default();
        lf.dockerfiles.insert(
            "Dockerfile".to_string(),
            vec![DockerfileImageRef {
                image: Image::new("busybox", "latest", "deadbeef"),
                path: "Dockerfile".to_string(),
                position: 0,
            }],
        );
        let json = serde_json::to_string(&lf).unwrap();
        let back: Lockfile = serde_json::from_str(&json).unwrap();
        assert_eq!(lf, back);
        assert!(!json.contains("kubernetesfiles"));
    }
}
