//! Docker Hub registry wrapper (§4.3). Ported in spirit from
//! `original_source/registry/docker.go`.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::RegistryConfig;
use crate::error::RegistryError;

use super::creds::{self, Credentials};
use super::RegistryWrapper;

const DOCKER_HUB_AUTH_HOST: &str = "https://index.docker.io/v1/";

pub struct DockerHubWrapper {
    client: reqwest::Client,
    config_file: PathBuf,
    env_username: Option<String>,
    env_password: Option<String>,
}

impl DockerHubWrapper {
    pub fn new(client: reqwest::Client, config: &RegistryConfig) -> Self {
        Self {
            client,
            config_file: config.config_file.clone(),
            env_username: config.docker_username.clone(),
            env_password: config.docker_password.clone(),
        }
    }

    async fn credentials(&self) -> Credentials {
        if let (Some(u), Some(p)) = (&self.env_username, &self.env_password) {
            return Credentials { username: u.clone(), password: p.clone() };
        }
        creds::resolve_from_config_file(&self.config_file, DOCKER_HUB_AUTH_HOST).await
    }

    async fn token(&self, name: &str) -> Result<String, RegistryError> {
        let credentials = self.credentials().await;

        let url = format!(
            "https://auth.docker.io/token?scope=repository:{name}:pull&service=registry.docker.io"
        );

        let mut request = self.client.get(&url);
        if !credentials.is_empty() {
            request = request.basic_auth(credentials.username, Some(credentials.password));
        }

        let response = request.send().await.map_err(|source| RegistryError::TokenResponse {
            name: name.to_string(),
            tag: String::new(),
            source,
        })?;

        #[derive(Deserialize)]
        struct TokenResponse {
            token: String,
        }

        let body: TokenResponse =
            response.json().await.map_err(|source| RegistryError::TokenResponse {
                name: name.to_string(),
                tag: String::new(),
                source,
            })?;

        Ok(body.token)
    }

    async fn fetch_digest(&self, name: &str, tag: &str) -> Result<String, RegistryError> {
        let token = self.token(name).await?;
        let url = format!("https://registry-1.docker.io/v2/{name}/manifests/{tag}");

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
            .map(str::to_string);

        digest.ok_or_else(|| RegistryError::MissingDigestHeader {
            name: name.to_string(),
            tag: tag.to_string(),
        })
    }
}

#[async_trait]
impl RegistryWrapper for DockerHubWrapper {
    fn prefix(&self) -> &str {
        ""
    }

    /// For an unqualified name, try it first, then `library/<name>`; for a
    /// qualified name (already containing `/`), try it as-is only (§4.3).
    async fn digest(&self, name: &str, tag: &str) -> Result<String, RegistryError> {
        let qualified = name.contains('/');

        let result = self.fetch_digest(name, tag).await;

        let digest = match (result, qualified) {
            (Ok(digest), _) => digest,
            (Err(_), false) => self.fetch_digest(&format!("library/{name}"), tag).await?,
            (Err(err), true) => return Err(err),
        };

        Ok(digest.strip_prefix("sha256:").unwrap_or(&digest).to_string())
    }
}
