//! The Formatter (§4.5): groups resolved `ImageRef`s by kind and source
//! path, sorts each group under the §4.2.4 ordering contract, and emits a
//! canonical [`Lockfile`]. Grounded on
//! `original_source/pkg/generate/generator.go`'s `sortImages`/groupby shape,
//! generalized to operate over the unified `ImageRef` enum.

use std::collections::BTreeMap;

use crate::model::{
    ComposefileImageRef, DockerfileImageRef, FileKind, ImageRef, KubernetesImageRef, Lockfile,
};

/// Build the canonical [`Lockfile`] from a flat, unordered set of resolved
/// `ImageRef`s. Grouping is by `(kind, path)`; within a group, ordering
/// follows [`ImageRef::sort_key`].
pub fn format(image_refs: Vec<ImageRef>) -> Lockfile {
    let mut dockerfiles: BTreeMap<String, Vec<DockerfileImageRef>> = BTreeMap::new();
    let mut composefiles: BTreeMap<String, Vec<ComposefileImageRef>> = BTreeMap::new();
    let mut kubernetesfiles: BTreeMap<String, Vec<KubernetesImageRef>> = BTreeMap::new();

    let mut by_path: BTreeMap<(FileKind, String), Vec<ImageRef>> = BTreeMap::new();
    for image_ref in image_refs {
        let key = (image_ref.kind(), crate::model::to_slash_path(std::path::Path::new(image_ref.path())));
        by_path.entry(key).or_default().push(image_ref);
    }

    for ((kind, path), mut refs) in by_path {
        refs.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        match kind {
            FileKind::Dockerfile => {
                dockerfiles.insert(
                    path,
                    refs.into_iter()
                        .filter_map(|r| match r {
                            ImageRef::Dockerfile(d) => Some(d),
                            _ => None,
                        })
                        .collect(),
                );
            }
            FileKind::Composefile => {
                composefiles.insert(
                    path,
                    refs.into_iter()
                        .filter_map(|r| match r {
                            ImageRef::Compose(c) => Some(c),
                            _ => None,
                        })
                        .collect(),
                );
            }
            FileKind::Kubernetesfile => {
                kubernetesfiles.insert(
                    path,
                    refs.into_iter()
                        .filter_map(|r| match r {
                            ImageRef::Kubernetes(k) => Some(k),
                            _ => None,
                        })
                        .collect(),
                );
            }
        }
    }

    Lockfile { dockerfiles, composefiles, kubernetesfiles }
}

#[cfg(test)]
mod tests {
    use crate::model::Image;

    use super::*;

    #[test]
    fn groups_by_path_and_sorts_dockerfiles_by_position() {
        let refs = vec![
            ImageRef::Dockerfile(DockerfileImageRef {
                image: Image::new("b", "latest", "d2"),
                path: "Dockerfile".to_string(),
                position: 1,
            }),
            ImageRef::Dockerfile(DockerfileImageRef {
                image: Image::new("a", "latest", "d1"),
                path: "Dockerfile".to_string(),
                position: 0,
            }),
        ];

        let lockfile = format(refs);
        let entries = lockfile.dockerfiles.get("Dockerfile").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].image.name, "a");
        assert_eq!(entries[1].image.name, "b");
    }

    #[test]
    fn sorts_compose_entries_by_service_then_dockerfile() {
        let refs = vec![
            ImageRef::Compose(ComposefileImageRef {
                image: Image::new("img-z", "latest", ""),
                service: "z-service".to_string(),
                dockerfile: None,
                path: "docker-compose.yml".to_string(),
                position: 0,
            }),
            ImageRef::Compose(ComposefileImageRef {
                image: Image::new("img-a", "latest", ""),
                service: "a-service".to_string(),
                dockerfile: None,
                path: "docker-compose.yml".to_string(),
                position: 0,
            }),
        ];

        let lockfile = format(refs);
        let entries = lockfile.composefiles.get("docker-compose.yml").unwrap();
        assert_eq!(entries[0].service, "a-service");
        assert_eq!(entries[1].service, "z-service");
    }

    #[test]
    fn sorts_kubernetes_entries_by_document_and_position_not_container_name() {
        let refs = vec![
            ImageRef::Kubernetes(KubernetesImageRef {
                image: Image::new("img-z", "latest", ""),
                container: "z-container".to_string(),
                path: "deploy.yaml".to_string(),
                doc_position: 0,
                position: 0,
            }),
            ImageRef::Kubernetes(KubernetesImageRef {
                image: Image::new("img-a", "latest", ""),
                container: "a-container".to_string(),
                path: "deploy.yaml".to_string(),
                doc_position: 0,
                position: 1,
            }),
        ];

        let lockfile = format(refs);
        let entries = lockfile.kubernetesfiles.get("deploy.yaml").unwrap();
        // "z-container" was declared first, so it stays first even though
        // "a-container" would sort first alphabetically.
        assert_eq!(entries[0].container, "z-container");
        assert_eq!(entries[1].container, "a-container");
    }

    #[test]
    fn empty_input_yields_empty_lockfile() {
        let lockfile = format(Vec::new());
        assert!(lockfile.dockerfiles.is_empty());
        assert!(lockfile.composefiles.is_empty());
        assert!(lockfile.kubernetesfiles.is_empty());
    }
}
