//! Command-line surface (§6): `generate`, `verify`, `rewrite`.
//!
//! Grounded on `syncable-cli::cli::Cli`'s top-level `#[derive(Parser)]` plus
//! global `-v`/`-q`/`--json` flags and its `init_logging` verbosity mapping.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "docker-lock")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Pin container base images to immutable registry digests")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit verify's diff output as JSON instead of a unified diff
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Discover images, resolve digests, and write a lockfile
    #[command(alias = "gen")]
    Generate {
        /// Directory to search from
        #[arg(value_name = "BASE_DIR", default_value = ".")]
        base_dir: PathBuf,

        /// Explicit Dockerfile path (repeatable)
        #[arg(long = "dockerfile", value_name = "PATH")]
        dockerfiles: Vec<String>,

        /// Explicit Compose file path (repeatable)
        #[arg(long = "compose", value_name = "PATH")]
        composefiles: Vec<String>,

        /// Glob pattern for Dockerfiles, relative to BASE_DIR (repeatable)
        #[arg(long = "dockerfile-glob", value_name = "PATTERN")]
        dockerfile_globs: Vec<String>,

        /// Glob pattern for Compose files, relative to BASE_DIR (repeatable)
        #[arg(long = "compose-glob", value_name = "PATTERN")]
        compose_globs: Vec<String>,

        /// Recursively walk BASE_DIR for default-named Dockerfiles
        #[arg(long)]
        dockerfile_recursive: bool,

        /// Recursively walk BASE_DIR for default-named Compose files
        #[arg(long)]
        compose_recursive: bool,

        /// Glob pattern for Kubernetes manifests, relative to BASE_DIR (repeatable)
        #[arg(long = "kubernetes-glob", value_name = "PATTERN")]
        kubernetes_globs: Vec<String>,

        /// Recursively walk BASE_DIR for Kubernetes manifests
        #[arg(long)]
        kubernetes_recursive: bool,

        /// Directories to skip during recursive walks (repeatable)
        #[arg(long = "exclude-dir", value_name = "DIR")]
        exclude_dirs: Vec<String>,

        /// Name of the lockfile to write (must not contain a path separator)
        #[arg(long, default_value = "docker-lock.json")]
        lockfile_name: String,

        /// Path to a Docker-style registry config file
        #[arg(long, value_name = "FILE")]
        config_file: Option<PathBuf>,

        /// Path to a `.env` file used for Compose variable expansion
        #[arg(long, value_name = "FILE", default_value = ".env")]
        env_file: PathBuf,

        /// Skip Dockerfiles entirely
        #[arg(long)]
        exclude_dockerfiles: bool,

        /// Skip Compose files entirely
        #[arg(long)]
        exclude_composefiles: bool,
    },

    /// Regenerate a lockfile restricted to its own paths and compare
    Verify {
        /// Path to the existing lockfile
        #[arg(long, default_value = "docker-lock.json")]
        lockfile_name: PathBuf,

        /// Path to a Docker-style registry config file
        #[arg(long, value_name = "FILE")]
        config_file: Option<PathBuf>,

        /// Path to a `.env` file used for Compose variable expansion
        #[arg(long, value_name = "FILE", default_value = ".env")]
        env_file: PathBuf,

        /// Compare ignoring tags (only names and digests must match)
        #[arg(long)]
        exclude_tags: bool,
    },

    /// Rewrite Dockerfiles/Compose files in place with digests from a lockfile
    Rewrite {
        /// Path to the existing lockfile
        #[arg(long, default_value = "docker-lock.json")]
        lockfile_name: PathBuf,

        /// Directory to stage rewritten files in before committing
        #[arg(long, value_name = "DIR")]
        tempdir: Option<PathBuf>,

        /// Omit tags from rewritten FROM/image lines, keeping only the digest
        #[arg(long)]
        exclude_tags: bool,
    },
}

impl Cli {
    /// Map verbosity count to a `log::LevelFilter` and initialize `env_logger`,
    /// mirroring `syncable-cli::cli::Cli::init_logging`.
    pub fn init_logging(&self) {
        if self.quiet {
            return;
        }

        let level = match self.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };

        env_logger::Builder::from_default_env().filter_level(level).init();
    }
}
