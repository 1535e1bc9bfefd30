//! Credential resolution shared by the Docker Hub and ACR wrappers (§4.3):
//! env vars, then the Docker config file's `auths` map, then a
//! `docker-credential-<store>` helper. Any failure past step 1 falls back
//! to anonymous access rather than aborting the run.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;

use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn is_empty(&self) -> bool {
        self.username.is_empty() || self.password.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct DockerConfigFile {
    #[serde(default)]
    auths: HashMap<String, AuthEntry>,
    #[serde(default, rename = "credsStore")]
    creds_store: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct AuthEntry {
    #[serde(default)]
    auth: String,
}

#[derive(Debug, Deserialize)]
struct CredHelperResponse {
    #[serde(rename = "Username")]
    username: String,
    #[serde(rename = "Secret")]
    secret: String,
}

/// Resolve credentials for `registry_host` (e.g. `https://index.docker.io/v1/`
/// or `myregistry.azurecr.io`) from the config file at `config_file`,
/// falling back to the creds store helper it names. Never returns an error:
/// any failure yields empty (anonymous) credentials.
pub async fn resolve_from_config_file(config_file: &Path, registry_host: &str) -> Credentials {
    let Ok(contents) = tokio::fs::read_to_string(config_file).await else {
        return Credentials::default();
    };

    let Ok(config) = serde_json::from_str::<DockerConfigFile>(&contents) else {
        return Credentials::default();
    };

    if let Some(entry) = config.auths.get(registry_host) {
        if !entry.auth.is_empty() {
            if let Some(creds) = decode_basic_auth(&entry.auth) {
                return creds;
            }
        }
    }

    if let Some(store) = config.creds_store {
        if let Ok(creds) = resolve_from_creds_store(&store, registry_host).await {
            return creds;
        }
    }

    Credentials::default()
}

fn decode_basic_auth(encoded: &str) -> Option<Credentials> {
    use base64::Engine;
    let decoded = base64::engine::general_purpose::STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some(Credentials { username: username.to_string(), password: password.to_string() })
}

/// Invoke `docker-credential-<store>` with `registry_host` on stdin,
/// matching the JSON-over-stdin/stdout contract of §6.
async fn resolve_from_creds_store(
    store: &str,
    registry_host: &str,
) -> Result<Credentials, std::io::Error> {
    let program = format!("docker-credential-{store}");

    let mut child = Command::new(&program)
        .arg("get")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(registry_host.as_bytes()).await?;
    }

    let output = child.wait_with_output().await?;

    if !output.status.success() {
        return Err(std::io::Error::other(format!("{program} exited with {}", output.status)));
    }

    let response: CredHelperResponse = serde_json::from_slice(&output.stdout)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    Ok(Credentials { username: response.username, password: response.secret })
}
