//! Pipeline orchestration (§2, §5): wires Collector → Parser → Updater →
//! Formatter behind one shared [`CancellationToken`], so a failure in any
//! stage stops the others promptly rather than leaking work.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::cancel::CancellationToken;
use crate::collect::{self, CollectedPath, Selector};
use crate::config::env_file;
use crate::error::{LockError, Result};
use crate::format;
use crate::model::{ImageRef, Lockfile};
use crate::parse;
use crate::registry::WrapperManager;
use crate::update::Updater;

const CHANNEL_CAPACITY: usize = 64;

/// Per-kind selectors plus the handful of run-wide settings every
/// `generate`/`verify` call needs (§6 CLI surface).
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub base_dir: PathBuf,
    pub dockerfile: Option<Selector>,
    pub composefile: Option<Selector>,
    pub kubernetesfile: Option<Selector>,
    pub lockfile_name: String,
    /// Path to the `.env` file used for Compose variable expansion (§4.2.3),
    /// merged with the process environment (which always wins).
    pub env_file: PathBuf,
}

/// Run the full pipeline once and return the resulting [`Lockfile`].
pub async fn generate(options: GenerateOptions, manager: Arc<WrapperManager>) -> Result<Lockfile> {
    let cancel = CancellationToken::new();
    let (collected_tx, collected_rx) = mpsc::channel::<CollectedPath>(CHANNEL_CAPACITY);
    let (parsed_tx, mut parsed_rx) = mpsc::channel::<ImageRef>(CHANNEL_CAPACITY);

    let env = Arc::new(env_file::load_environment(&options.env_file));

    let collect_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let result = collect::collect(
                &options.base_dir,
                options.dockerfile,
                options.composefile,
                options.kubernetesfile,
                &options.lockfile_name,
                collected_tx,
            )
            .await;
            if result.is_err() {
                cancel.cancel();
            }
            result
        })
    };

    let parse_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move { run_parse_stage(collected_rx, parsed_tx, env, cancel).await })
    };

    let mut image_refs = Vec::new();
    while let Some(image_ref) = parsed_rx.recv().await {
        image_refs.push(image_ref);
    }

    join_stage(collect_task).await?;
    join_stage(parse_task).await?;

    let updater = Updater::new(manager);
    let resolved = updater.update_all(image_refs, &cancel).await?;

    Ok(format::format(resolved))
}

async fn run_parse_stage(
    mut collected_rx: mpsc::Receiver<CollectedPath>,
    parsed_tx: mpsc::Sender<ImageRef>,
    env: Arc<std::collections::HashMap<String, String>>,
    cancel: CancellationToken,
) -> std::result::Result<(), crate::error::ParseError> {
    let mut tasks = Vec::new();

    while let Some(collected) = collected_rx.recv().await {
        if cancel.is_cancelled() {
            break;
        }
        let tx = parsed_tx.clone();
        let env = env.clone();
        tasks.push(tokio::spawn(async move { parse::parse_one(collected, &env, &tx).await }));
    }
    drop(parsed_tx);

    let mut first_error = None;
    for task in tasks {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                cancel.cancel();
                first_error.get_or_insert(err);
            }
            Err(join_err) => {
                if join_err.is_panic() {
                    std::panic::resume_unwind(join_err.into_panic());
                }
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn join_stage<T, E>(task: tokio::task::JoinHandle<std::result::Result<T, E>>) -> Result<T>
where
    LockError: From<E>,
{
    match task.await {
        Ok(inner) => inner.map_err(LockError::from),
        Err(join_err) => {
            if join_err.is_panic() {
                std::panic::resume_unwind(join_err.into_panic());
            }
            Err(LockError::TaskPanic("pipeline task was cancelled".to_string()))
        }
    }
}
