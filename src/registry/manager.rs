//! `WrapperManager`: picks the right [`RegistryWrapper`] for an image name
//! by longest-registered-prefix match, falling back to the Docker Hub
//! default (§4.3).

use std::sync::Arc;

use crate::config::RegistryConfig;
use crate::error::RegistryError;

use super::acr::AcrWrapper;
use super::docker_hub::DockerHubWrapper;
use super::generic::GenericRegistryWrapper;
use super::RegistryWrapper;

/// Well-known prefixes routed to a generic bearer-token registry client
/// when no ACR registry name is configured for them.
const GENERIC_PREFIXES: &[&str] = &["mcr.microsoft.com/", "docker.elastic.co/"];

pub struct WrapperManager {
    default: Arc<dyn RegistryWrapper>,
    wrappers: Vec<Arc<dyn RegistryWrapper>>,
}

impl WrapperManager {
    pub fn new(config: &RegistryConfig) -> Self {
        let client = reqwest::Client::new();

        let default: Arc<dyn RegistryWrapper> = Arc::new(DockerHubWrapper::new(client.clone(), config));

        let mut wrappers: Vec<Arc<dyn RegistryWrapper>> = GENERIC_PREFIXES
            .iter()
            .map(|prefix| -> Arc<dyn RegistryWrapper> {
                Arc::new(GenericRegistryWrapper::new(client.clone(), *prefix))
            })
            .collect();

        if let Some(registry_name) = &config.acr_registry_name {
            wrappers.push(Arc::new(AcrWrapper::new(client.clone(), config, registry_name.clone())));
        }

        Self { default, wrappers }
    }

    /// The first wrapper whose declared prefix is a prefix of `name`, or
    /// the Docker Hub default when none match.
    pub fn resolve(&self, name: &str) -> Arc<dyn RegistryWrapper> {
        self.wrappers
            .iter()
            .find(|w| !w.prefix().is_empty() && name.starts_with(w.prefix()))
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }

    pub async fn digest(&self, name: &str, tag: &str) -> Result<String, RegistryError> {
        self.resolve(name).digest(name, tag).await
    }

    /// Override the fallback wrapper used when no registered prefix matches a
    /// name. Exposed for tests exercising the Updater/pipeline without a live
    /// registry, and equally useful for embedding this crate against a
    /// registry with no dedicated wrapper.
    pub fn set_default(&mut self, wrapper: Arc<dyn RegistryWrapper>) {
        self.default = wrapper;
    }
}
