//! Generic v2-registry wrapper for prefixes that aren't Docker Hub or ACR
//! (e.g. `mcr.microsoft.com/`, `docker.elastic.co/`): discover the bearer
//! token realm from the `WWW-Authenticate` challenge on an unauthenticated
//! manifest request, then retry with a token, per the standard Docker
//! Registry HTTP API v2 token flow.

use async_trait::async_trait;

use crate::error::RegistryError;

use super::RegistryWrapper;

pub struct GenericRegistryWrapper {
    client: reqwest::Client,
    prefix: String,
    host: String,
}

impl GenericRegistryWrapper {
    pub fn new(client: reqwest::Client, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let host = prefix.trim_end_matches('/').to_string();
        Self { client, prefix, host }
    }

    fn manifest_url(&self, name: &str, tag: &str) -> String {
        format!("https://{}/v2/{name}/manifests/{tag}", self.host)
    }

    async fn challenge_token(&self, www_authenticate: &str, name: &str) -> Option<String> {
        let challenge = parse_bearer_challenge(www_authenticate)?;
        let scope = challenge.scope.clone().unwrap_or_else(|| format!("repository:{name}:pull"));
        let url = format!("{}?service={}&scope={scope}", challenge.realm, challenge.service);

        #[derive(serde::Deserialize)]
        struct TokenResponse {
            #[serde(alias = "access_token")]
            token: String,
        }

        let response = self.client.get(&url).send().await.ok()?;
        let body: TokenResponse = response.json().await.ok()?;
        Some(body.token)
    }
}

struct BearerChallenge {
    realm: String,
    service: String,
    scope: Option<String>,
}

fn parse_bearer_challenge(header: &str) -> Option<BearerChallenge> {
    let rest = header.strip_prefix("Bearer ")?;
    let mut realm = None;
    let mut service = String::new();
    let mut scope = None;

    for part in rest.split(',') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            let value = value.trim_matches('"').to_string();
            match key {
                "realm" => realm = Some(value),
                "service" => service = value,
                "scope" => scope = Some(value),
                _ => {}
            }
        }
    }

    Some(BearerChallenge { realm: realm?, service, scope })
}

#[async_trait]
impl RegistryWrapper for GenericRegistryWrapper {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    async fn digest(&self, name: &str, tag: &str) -> Result<String, RegistryError> {
        let url = self.manifest_url(name, tag);
        let accept = "application/vnd.docker.distribution.manifest.v2+json";

        let first = self
            .client
            .get(&url)
            .header("Accept", accept)
            .send()
            .await
            .map_err(|source| RegistryError::Http { name: name.to_string(), tag: tag.to_string(), source })?;

        let response = if first.status() == reqwest::StatusCode::UNAUTHORIZED {
            let challenge = first
                .headers()
                .get("WWW-Authenticate")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let token = match challenge {
                Some(c) => self.challenge_token(&c, name).await,
                None => None,
            };

            let mut request = self.client.get(&url).header("Accept", accept);
            if let Some(token) = token {
                request = request.bearer_auth(token);
            }

            request
                .send()
                .await
                .map_err(|source| RegistryError::Http { name: name.to_string(), tag: tag.to_string(), source })?
        } else {
            first
        };

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
    fn parses_bearer_challenge() {
        let header = r#"Bearer realm="https://auth.example.com/token",service="registry.example.com",scope="repository:foo:pull""#;
        let challenge = parse_bearer_challenge(header).unwrap();
        assert_eq!(challenge.realm, "https://auth.example.com/token");
        assert_eq!(challenge.service, "registry.example.com");
        assert_eq!(challenge.scope.as_deref(), Some("repository:foo:pull"));
    }
}
