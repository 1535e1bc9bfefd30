//! Azure Container Registry wrapper (§4.3). Ported in spirit from
//! `original_source/registry/acr.go`.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::RegistryConfig;
use crate::error::RegistryError;

use super::creds::{self, Credentials};
use super::RegistryWrapper;

pub struct AcrWrapper {
    client: reqwest::Client,
    config_file: PathBuf,
    registry_name: String,
    env_username: Option<String>,
    env_password: Option<String>,
    prefix: String,
}

impl AcrWrapper {
    pub fn new(client: reqwest::Client, config: &RegistryConfig, registry_name: String) -> Self {
        let prefix = format!("{registry_name}.azurecr.io/");
        Self {
            client,
            config_file: config.config_file.clone(),
            registry_name,
            env_username: config.acr_username.clone(),
            env_password: config.acr_password.clone(),
            prefix,
        }
    }

    async fn credentials(&self) -> Credentials {
        if let (Some(u), Some(p)) = (&self.env_username, &self.env_password) {
            return Credentials { username: u.clone(), password: p.clone() };
        }
        let host = format!("{}.azurecr.io", self.registry_name);
        creds::resolve_from_config_file(&self.config_file, &host).await
    }

    fn strip_prefix<'a>(&self, name: &'a str) -> &'a str {
        name.strip_prefix(self.prefix.as_str()).unwrap_or(name)
    }

    async fn token(&self, bare_name: &str) -> Result<String, RegistryError> {
        let credentials = self.credentials().await;

        let url = format!(
            "https://{}oauth2/token?service={}.azurecr.io&scope=repository:{bare_name}:pull",
            self.prefix, self.registry_name
        );

        let mut request = self.client.get(&url);
        if !credentials.is_empty() {
            request = request.basic_auth(credentials.username, Some(credentials.password));
        }

        let response = request.send().await.map_err(|source| RegistryError::TokenResponse {
            name: bare_name.to_string(),
            tag: String::new(),
            source,
        })?;

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
        }

        let body: TokenResponse =
            response.json().await.map_err(|source| RegistryError::TokenResponse {
                name: bare_name.to_string(),
                tag: String::new(),
                source,
            })?;

        Ok(body.access_token)
    }
}

#[async_trait]
impl RegistryWrapper for AcrWrapper {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    async fn digest(&self, name: &str, tag: &str) -> Result<String, RegistryError> {
        let bare_name = self.strip_prefix(name);
        let token = self.token(bare_name).await?;

        let url = format!("https://{}v2/{bare_name}/manifests/{tag}", self.prefix);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .header("Accept", "application/vnd.docker.distribution.manifest.v2+json")
            .send()
            .await
            .map_err(|source| RegistryError::Http { name: name.to_string(), tag: tag.to_string(), source })?;

        if !response.status().is_success() {
            return Err(RegistryError::BadStatus {
                name: name.to_string(),
                tag: tag.to_string(),
                status: response.status().as_u16(),
            });
        }

        let digest = response
            .headers()
            .get("Docker-Content-Digest")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| RegistryError::MissingDigestHeader {
                name: name.to_string(),
                tag: tag.to_string(),
            })?;

        Ok(digest.strip_prefix("sha256:").unwrap_or(&digest).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_includes_registry_name() {
        let config = RegistryConfig::default();
        let wrapper = AcrWrapper::new(reqwest::Client::new(), &config, "myreg".to_string());
        assert_eq!(wrapper.prefix(), "myreg.azurecr.io/");
    }

    #[test]
    fn strip_prefix_removes_registry_host() {
        let config = RegistryConfig::default();
        let wrapper = AcrWrapper::new(reqwest::Client::new(), &config, "myreg".to_string());
        assert_eq!(wrapper.strip_prefix("myreg.azurecr.io/app"), "app");
        assert_eq!(wrapper.strip_prefix("app"), "app");
    }
}
