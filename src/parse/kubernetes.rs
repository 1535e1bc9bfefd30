//! Kubernetes manifest sub-parser (ambient supplement, SPEC_FULL.md
//! [MODULE: kubernetes]). Extracts container images from multi-document
//! YAML manifests. Ported in spirit from
//! `original_source/pkg/generate/parse/kubernetes.go`; unlike Dockerfile and
//! Compose, Kubernetes manifests undergo no variable expansion.

use serde::Deserialize;

use crate::error::ParseError;
use crate::model::KubernetesImageRef;

use super::imageline::parse_image_line;

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    kind: String,
    #[serde(default)]
    spec: Option<Spec>,
}

#[derive(Debug, Default, Deserialize)]
struct Spec {
    #[serde(default)]
    containers: Vec<Container>,
    #[serde(default, rename = "initContainers")]
    init_containers: Vec<Container>,
    #[serde(default)]
    template: Option<Box<Template>>,
    #[serde(default, rename = "jobTemplate")]
    job_template: Option<Box<JobTemplate>>,
}

#[derive(Debug, Deserialize)]
struct Template {
    #[serde(default)]
    spec: Option<Spec>,
}

#[derive(Debug, Deserialize)]
struct JobTemplate {
    #[serde(default)]
    spec: Option<Box<Template>>,
}

#[derive(Debug, Deserialize)]
struct Container {
    name: String,
    image: String,
}

/// Parse every `---`-separated YAML document in a Kubernetes manifest,
/// emitting one [`KubernetesImageRef`] per container (and init container),
/// document-then-container order (SPEC_FULL.md).
pub fn parse_kubernetes(path: &str, contents: &str) -> Result<Vec<KubernetesImageRef>, ParseError> {
    let mut refs = Vec::new();

    for (doc_position, document) in serde_yaml::Deserializer::from_str(contents).enumerate() {
        let manifest = match Manifest::deserialize(document) {
            Ok(m) => m,
            // Empty documents (e.g. a stray leading `---`) are not errors.
            Err(_) => continue,
        };

        let Some(spec) = resolve_pod_spec(&manifest) else { continue };

        let mut position = 0usize;
        for container in spec.containers.iter().chain(spec.init_containers.iter()) {
            refs.push(KubernetesImageRef {
                image: parse_image_line(&container.image),
                container: container.name.clone(),
                path: path.to_string(),
                doc_position,
                position,
            });
            position += 1;
        }
    }

    Ok(refs)
}

/// Walk `kind`-dependent nesting down to the pod spec that actually carries
/// `containers`/`initContainers`.
fn resolve_pod_spec(manifest: &Manifest) -> Option<Spec> {
    let spec = manifest.spec.as_ref()?;

    if !spec.containers.is_empty() || !spec.init_containers.is_empty() {
        return Some(clone_containers_only(spec));
    }

    if let Some(template) = &spec.template {
        if let Some(inner) = &template.spec {
            return Some(clone_containers_only(inner));
        }
    }

    if let Some(job_template) = &spec.job_template {
        if let Some(template) = &job_template.spec {
            if let Some(inner) = &template.spec {
                return Some(clone_containers_only(inner));
            }
        }
    }

    None
}

fn clone_containers_only(spec: &Spec) -> Spec {
    Spec {
        containers: spec
            .containers
            .iter()
            .map(|c| Container { name: c.name.clone(), image: c.image.clone() })
            .collect(),
        init_containers: spec
            .init_containers
            .iter()
            .map(|c| Container { name: c.name.clone(), image: c.image.clone() })
            .collect(),
        template: None,
        job_template: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pod_manifest() {
        let yaml = "kind: Pod\nspec:\n  containers:\n  - name: app\n    image: busybox\n";
        let refs = parse_kubernetes("pod.yaml", yaml).unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].container, "app");
        assert_eq!(refs[0].image.name, "busybox");
    }

    #[test]
    fn deployment_manifest_with_init_container() {
        let yaml = "kind: Deployment\nspec:\n  template:\n    spec:\n      initContainers:\n      - name: init\n        image: busybox\n      containers:\n      - name: app\n        image: ubuntu:20.04\n";
        let refs = parse_kubernetes("deploy.yaml", yaml).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].container, "app");
        assert_eq!(refs[1].container, "init");
    }

    #[test]
    fn cronjob_manifest() {
        let yaml = "kind: CronJob\nspec:\n  jobTemplate:\n    spec:\n      template:\n        spec:\n          containers:\n          - name: job\n            image: busybox\n";
        let refs = parse_kubernetes("cron.yaml", yaml).unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].container, "job");
    }

    #[test]
    fn multi_document_stream_tracks_doc_position() {
        let yaml = "kind: Pod\nspec:\n  containers:\n  - name: a\n    image: busybox\n---\nkind: Pod\nspec:\n  containers:\n  - name: b\n    image: ubuntu\n";
        let refs = parse_kubernetes("multi.yaml", yaml).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].doc_position, 0);
        assert_eq!(refs[1].doc_position, 1);
    }

    #[test]
    fn non_pod_manifest_yields_nothing() {
        let yaml = "kind: ConfigMap\ndata:\n  key: value\n";
        let refs = parse_kubernetes("cm.yaml", yaml).unwrap();
        assert!(refs.is_empty());
    }
}
