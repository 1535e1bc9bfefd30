//! Error types for every pipeline stage, plus a top-level [`LockError`] that
//! the CLI layer converts everything into. One enum per component, mirroring
//! `syncable-cli`'s `PlatformApiError` shape.

use thiserror::Error;

use crate::model::Lockfile;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("lockfile name '{0}' may not contain a path separator")]
    LockfileNameHasSeparator(String),

    #[error("failed to walk '{path}': {source}")]
    Walk { path: String, #[source] source: std::io::Error },

    #[error("invalid glob pattern '{pattern}': {source}")]
    Glob { pattern: String, #[source] source: glob::PatternError },
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{path}: could not read file: {source}")]
    Io { path: String, #[source] source: std::io::Error },

    #[error("{path}: could not parse YAML: {source}")]
    Yaml { path: String, #[source] source: serde_yaml::Error },

    #[error("{path}: FROM instruction has no image operand")]
    MissingFromOperand { path: String },

    #[error("{path}, service '{service}': build has neither 'context' nor a scalar context")]
    MissingBuildContext { path: String, service: String },
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{name}:{tag}: registry request failed: {source}")]
    Http { name: String, tag: String, #[source] source: reqwest::Error },

    #[error("{name}:{tag}: registry response missing Docker-Content-Digest header")]
    MissingDigestHeader { name: String, tag: String },

    #[error("{name}:{tag}: registry returned status {status}")]
    BadStatus { name: String, tag: String, status: u16 },

    #[error("{name}:{tag}: malformed token response: {source}")]
    TokenResponse { name: String, tag: String, #[source] source: reqwest::Error },

    #[error("credential helper '{helper}' failed: {message}")]
    CredentialHelper { helper: String, message: String },

    #[error("no registry config file at '{0}'")]
    ConfigFile(String, #[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("{path}: {source}")]
    Registry { path: String, #[source] source: RegistryError },

    #[error("update aborted by a sibling pipeline stage")]
    Cancelled,
}

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("'{path}' has {found} FROM images but the Lockfile has {expected}")]
    ImageCountMismatch { path: String, found: usize, expected: usize },

    #[error(
        "Dockerfile '{dockerfile}' is referenced with disagreeing digests \
         ({first} vs {second}) by different Compose services"
    )]
    DigestDisagreement { dockerfile: String, first: String, second: String },

    #[error("failed to stage rewritten file for '{path}': {source}")]
    Stage { path: String, #[source] source: std::io::Error },

    #[error("commit failed and the following files could not be rolled back: {paths:?}")]
    CommitFailed { paths: Vec<String>, #[source] source: std::io::Error },
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("failed to read existing lockfile: {0}")]
    Read(#[source] std::io::Error),

    #[error("failed to parse existing lockfile: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("lockfile does not match current sources")]
    DifferentLockfile { existing: Box<Lockfile>, new: Box<Lockfile> },
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error(transparent)]
    Collect(#[from] CollectError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Update(#[from] UpdateError),

    #[error(transparent)]
    Rewrite(#[from] RewriteError),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("pipeline task panicked: {0}")]
    TaskPanic(String),
}

pub type Result<T> = std::result::Result<T, LockError>;
