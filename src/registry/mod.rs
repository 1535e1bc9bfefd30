//! Per-registry wrappers translating `(name, tag) -> digest` (§4.3).
//!
//! The async trait-object pattern here is grounded on
//! `epi-project-brane/brane-cfg/src/info.rs`'s `#[async_trait] trait Info`
//! (the teacher itself has no async trait object of this shape).

pub mod acr;
pub mod creds;
pub mod docker_hub;
pub mod generic;
pub mod manager;

use async_trait::async_trait;

use crate::error::RegistryError;

#[async_trait]
pub trait RegistryWrapper: Send + Sync {
    /// The name prefix this wrapper handles, or `""` for the default.
    fn prefix(&self) -> &str;

    /// Resolve `name:tag` to its hex digest (without the `sha256:` prefix).
    async fn digest(&self, name: &str, tag: &str) -> Result<String, RegistryError>;
}

pub use manager::WrapperManager;
