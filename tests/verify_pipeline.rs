//! End-to-end `verify` tests: a lockfile that matches its sources passes
//! silently; a stale one reports `DifferentLockfile`.

use std::sync::Arc;

use async_trait::async_trait;

use docker_lock::config::RegistryConfig;
use docker_lock::error::{RegistryError, VerifyError};
use docker_lock::registry::{RegistryWrapper, WrapperManager};
use docker_lock::{verify, LockError};

struct StableFakeRegistry;

#[async_trait]
impl RegistryWrapper for StableFakeRegistry {
    fn prefix(&self) -> &str {
        ""
    }

    async fn digest(&self, name: &str, tag: &str) -> Result<String, RegistryError> {
        Ok(format!("{name}-{tag}-digest"))
    }
}

fn manager() -> Arc<WrapperManager> {
    let mut manager = WrapperManager::new(&RegistryConfig::default());
    manager.set_default(Arc::new(StableFakeRegistry));
    Arc::new(manager)
}

#[tokio::test]
async fn a_freshly_generated_lockfile_verifies_clean() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Dockerfile"), "FROM busybox:1.30\n").unwrap();

    let options = docker_lock::generate::GenerateOptions {
        base_dir: dir.path().to_path_buf(),
        dockerfile: Some(docker_lock::collect::Selector::default()),
        composefile: Some(docker_lock::collect::Selector::default()),
        kubernetesfile: None,
        lockfile_name: "docker-lock.json".to_string(),
        env_file: dir.path().join(".env"),
    };
    let lockfile = docker_lock::generate::generate(options, manager()).await.unwrap();

    let lockfile_path = dir.path().join("docker-lock.json");
    std::fs::write(&lockfile_path, serde_json::to_string(&lockfile).unwrap()).unwrap();

    verify::verify(&lockfile_path, dir.path().to_path_buf(), dir.path().join(".env"), manager(), false)
        .await
        .unwrap();
}

#[tokio::test]
async fn a_stale_lockfile_reports_a_different_lockfile_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Dockerfile"), "FROM busybox:1.30\n").unwrap();

    let options = docker_lock::generate::GenerateOptions {
        base_dir: dir.path().to_path_buf(),
        dockerfile: Some(docker_lock::collect::Selector::default()),
        composefile: Some(docker_lock::collect::Selector::default()),
        kubernetesfile: None,
        lockfile_name: "docker-lock.json".to_string(),
        env_file: dir.path().join(".env"),
    };
    let lockfile = docker_lock::generate::generate(options, manager()).await.unwrap();
    let lockfile_path = dir.path().join("docker-lock.json");
    std::fs::write(&lockfile_path, serde_json::to_string(&lockfile).unwrap()).unwrap();

    // Now change the source after the lockfile was written.
    std::fs::write(dir.path().join("Dockerfile"), "FROM alpine:3.18\n").unwrap();

    let err = verify::verify(&lockfile_path, dir.path().to_path_buf(), dir.path().join(".env"), manager(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, LockError::Verify(VerifyError::DifferentLockfile { .. })));
}
