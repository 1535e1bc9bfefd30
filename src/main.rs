use std::process;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;

use docker_lock::cli::{Cli, Commands};
use docker_lock::collect::Selector;
use docker_lock::config::RegistryConfig;
use docker_lock::generate::{self, GenerateOptions};
use docker_lock::registry::WrapperManager;
use docker_lock::{rewrite, verify, Result};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    cli.init_logging();

    if let Err(e) = run(cli).await {
        eprintln!("{} {e}", "Error:".red());
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let json_output = cli.json;

    match cli.command {
        Commands::Generate {
            base_dir,
            dockerfiles,
            composefiles,
            dockerfile_globs,
            compose_globs,
            dockerfile_recursive,
            compose_recursive,
            kubernetes_globs,
            kubernetes_recursive,
            exclude_dirs,
            lockfile_name,
            config_file,
            env_file,
            exclude_dockerfiles,
            exclude_composefiles,
        } => {
            let dockerfile = (!exclude_dockerfiles).then(|| Selector {
                paths: dockerfiles,
                globs: dockerfile_globs,
                recursive: dockerfile_recursive,
                exclude_dirs: exclude_dirs.clone(),
            });
            let composefile = (!exclude_composefiles).then(|| Selector {
                paths: composefiles,
                globs: compose_globs,
                recursive: compose_recursive,
                exclude_dirs: exclude_dirs.clone(),
            });
            let kubernetes_enabled = kubernetes_recursive || !kubernetes_globs.is_empty();
            let kubernetesfile = kubernetes_enabled.then(|| Selector {
                paths: Vec::new(),
                globs: kubernetes_globs,
                recursive: kubernetes_recursive,
                exclude_dirs,
            });

            let registry_config = RegistryConfig::from_env(config_file);
            let manager = Arc::new(WrapperManager::new(&registry_config));

            let options =
                GenerateOptions { base_dir, dockerfile, composefile, kubernetesfile, lockfile_name, env_file };
            let lockfile_name = options.lockfile_name.clone();

            log::info!("generating lockfile");
            let lockfile = generate::generate(options, manager).await?;

            let json = serde_json::to_string_pretty(&lockfile)?;
            std::fs::write(&lockfile_name, json)?;
            log::info!("wrote {lockfile_name}");
            println!("{} Wrote {lockfile_name}", "✓".green());
        }

        Commands::Verify { lockfile_name, config_file, env_file, exclude_tags } => {
            let registry_config = RegistryConfig::from_env(config_file);
            let manager = Arc::new(WrapperManager::new(&registry_config));
            let base_dir = std::env::current_dir()?;

            log::info!("verifying lockfile");
            match verify::verify(&lockfile_name, base_dir, env_file, manager, exclude_tags).await {
                Ok(()) => {
                    println!("{} Lockfile is up to date.", "✓".green());
                }
                Err(docker_lock::LockError::Verify(
                    ref err @ docker_lock::error::VerifyError::DifferentLockfile { ref existing, ref new },
                )) => {
                    eprintln!("{}", err.to_string().red());
                    if json_output {
                        let payload = serde_json::json!({ "existing": existing, "new": new });
                        eprintln!("{}", serde_json::to_string_pretty(&payload)?);
                    } else {
                        eprintln!("{}", verify::render_diff(existing, new));
                    }
                    process::exit(1);
                }
                Err(e) => return Err(e),
            }
        }

        Commands::Rewrite { lockfile_name, tempdir, exclude_tags } => {
            let raw = std::fs::read_to_string(&lockfile_name)?;
            let lockfile: docker_lock::model::Lockfile = serde_json::from_str(&raw)?;

            log::info!("planning rewrite");
            let planned = rewrite::plan(&lockfile, exclude_tags)?;
            let (_temp_dir, staged) = rewrite::stage(&planned, tempdir.as_deref())?;
            let committed = rewrite::commit(staged)?;

            for path in &committed {
                log::info!("rewrote {path}");
            }
            println!("{} Rewrote {} file(s).", "✓".green(), committed.len());
        }
    }

    Ok(())
}
