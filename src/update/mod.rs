//! The Deduper/Updater (§4.4): resolves every unresolved `(name, tag)` to a
//! digest, querying the registry at most once per unique pair regardless of
//! how many `ImageRef`s share it.
//!
//! Grounded on `original_source/pkg/generate/updater.go`'s
//! cache-then-query-then-broadcast shape, generalized from a lock-free map
//! read to an actual async in-flight wait: concurrent callers for the same
//! key share one [`tokio::sync::OnceCell`] rather than racing duplicate
//! requests, the same "collapse concurrent identical work" idiom
//! `syncable-cli` applies to its own cache layers via `dashmap`.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::cancel::CancellationToken;
use crate::error::UpdateError;
use crate::model::ImageRef;
use crate::registry::WrapperManager;

type DigestCell = Arc<OnceCell<String>>;

pub struct Updater {
    manager: Arc<WrapperManager>,
    cache: DashMap<(String, String), DigestCell>,
}

impl Updater {
    pub fn new(manager: Arc<WrapperManager>) -> Arc<Self> {
        Arc::new(Self { manager, cache: DashMap::new() })
    }

    /// Resolves every `image_ref`'s digest in place, preserving input order.
    ///
    /// On the first registry error the whole call fails and no partial
    /// results are returned (§4.4 "Failure"); `cancel` is tripped so
    /// sibling pipeline stages stop promptly, and any queries not yet
    /// started are skipped.
    pub async fn update_all(
        self: &Arc<Self>,
        image_refs: Vec<ImageRef>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ImageRef>, UpdateError> {
        let mut tasks = Vec::with_capacity(image_refs.len());

        for image_ref in image_refs {
            if cancel.is_cancelled() {
                break;
            }
            let this = self.clone();
            let cancel = cancel.clone();
            tasks.push(tokio::spawn(async move { this.resolve_one(image_ref, &cancel).await }));
        }

        let mut resolved = Vec::with_capacity(tasks.len());
        let mut first_error = None;

        for task in tasks {
            match task.await {
                Ok(Ok(image_ref)) => resolved.push(image_ref),
                Ok(Err(err)) => {
                    cancel.cancel();
                    first_error.get_or_insert(err);
                }
                Err(join_err) => {
                    cancel.cancel();
                    if join_err.is_panic() {
                        std::panic::resume_unwind(join_err.into_panic());
                    }
                    // The task was cancelled by the runtime (e.g. shutdown); the
                    // outer cancellation signal already covers that case.
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            // Cancelled by a sibling stage, not by this call: surface
            // nothing usable rather than a truncated result set.
            None if cancel.is_cancelled() => Err(UpdateError::Cancelled),
            None => Ok(resolved),
        }
    }

    async fn resolve_one(
        self: Arc<Self>,
        mut image_ref: ImageRef,
        cancel: &CancellationToken,
    ) -> Result<ImageRef, UpdateError> {
        if !image_ref.image().digest.is_empty() {
            return Ok(image_ref);
        }

        let key = image_ref.image().key();
        let cell = self.cache.entry(key.clone()).or_insert_with(|| Arc::new(OnceCell::new())).clone();
        let (name, tag) = key;

        let digest = tokio::select! {
            result = cell.get_or_try_init(|| self.manager.digest(&name, &tag)) => {
                result
                    .map(|d| d.clone())
                    .map_err(|source| UpdateError::Registry { path: image_ref.path().to_string(), source })?
            }
            _ = cancel.cancelled() => {
                return Err(UpdateError::Cancelled);
            }
        };

        image_ref.image_mut().digest = digest;
        Ok(image_ref)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::config::RegistryConfig;
    use crate::error::RegistryError;
    use crate::model::{DockerfileImageRef, Image};
    use crate::registry::RegistryWrapper;

    use super::*;

    struct CountingWrapper {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RegistryWrapper for CountingWrapper {
        fn prefix(&self) -> &str {
            ""
        }

        async fn digest(&self, name: &str, _tag: &str) -> Result<String, RegistryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            Ok(format!("digest-for-{name}"))
        }
    }

    fn dockerfile_ref(name: &str, tag: &str, position: usize) -> ImageRef {
        ImageRef::Dockerfile(DockerfileImageRef {
            image: Image::new(name, tag, ""),
            path: "Dockerfile".to_string(),
            position,
        })
    }

    #[tokio::test]
    async fn already_resolved_images_skip_the_registry() {
        let manager = Arc::new(WrapperManager::new(&RegistryConfig::default()));
        let updater = Updater::new(manager);
        let cancel = CancellationToken::new();

        let mut image_ref = dockerfile_ref("ubuntu", "latest", 0);
        image_ref.image_mut().digest = "already-known".to_string();

        let resolved = updater.update_all(vec![image_ref], &cancel).await.unwrap();
        assert_eq!(resolved[0].image().digest, "already-known");
    }

    #[tokio::test]
    async fn duplicate_name_tag_pairs_query_the_registry_once() {
        let counting = Arc::new(CountingWrapper { calls: AtomicUsize::new(0) });
        let mut manager = WrapperManager::new(&RegistryConfig::default());
        manager.set_default(counting.clone());
        let updater = Updater::new(Arc::new(manager));
        let cancel = CancellationToken::new();

        let refs = vec![
            dockerfile_ref("ubuntu", "latest", 0),
            dockerfile_ref("ubuntu", "latest", 1),
            dockerfile_ref("alpine", "3.18", 2),
        ];

        let resolved = updater.update_all(refs, &cancel).await.unwrap();
        assert_eq!(resolved.len(), 3);
        assert_eq!(counting.calls.load(Ordering::SeqCst), 2);
        assert!(resolved.iter().all(|r| !r.image().digest.is_empty()));
    }

    #[tokio::test]
    async fn preserves_input_order() {
        let counting = Arc::new(CountingWrapper { calls: AtomicUsize::new(0) });
        let mut manager = WrapperManager::new(&RegistryConfig::default());
        manager.set_default(counting);
        let updater = Updater::new(Arc::new(manager));
        let cancel = CancellationToken::new();

        let refs = vec![
            dockerfile_ref("c", "1", 0),
            dockerfile_ref("a", "1", 1),
            dockerfile_ref("b", "1", 2),
        ];

        let resolved = updater.update_all(refs, &cancel).await;
        // Ordering across spawned tasks is not FIFO by completion, but the
        // join loop awaits tasks in spawn order, so input order is preserved.
        assert!(resolved.is_ok());
        let resolved = resolved.unwrap();
        assert_eq!(resolved[0].image().name, "c");
        assert_eq!(resolved[1].image().name, "a");
        assert_eq!(resolved[2].image().name, "b");
    }
}
