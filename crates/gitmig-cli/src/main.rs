//! gitmig - migrate repositories between GitLab instances with authorship
//! rewriting.
//!
//! ## Commands
//!
//! - `project`: export a project, rewrite its commit authors, import it
//! - `group`: export and import a group
//! - `authors`: list the distinct author identities of a local repository
//!
//! Connection settings come from the environment: `SRC_GITLAB_URL`,
//! `SRC_TOKEN`, `DST_GITLAB_URL`, `DST_TOKEN`, `AUTHOR_MAP`, and optionally
//! `GIT_BINARY` and `TLS_VERIFY`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::Level;

use gitmig_core::{collect_authors, migrate_group, migrate_project, Config, GitRunner};

#[derive(Parser)]
#[command(name = "gitmig")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Migrate repositories between GitLab instances, rewriting commit authorship", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Migrate a single project, rewriting its commit history
    Project {
        /// Source project: numeric id or namespace/project
        #[arg(short, long)]
        source: String,

        /// Destination as namespace/project (defaults to the source path)
        #[arg(short, long)]
        dest: Option<String>,
    },

    /// Migrate a group
    Group {
        /// Source group: numeric id or group/subgroup path
        #[arg(short, long)]
        source: String,

        /// Destination group path (defaults to the source path)
        #[arg(short, long)]
        dest: Option<String>,
    },

    /// List the distinct author identities of a local repository
    Authors {
        /// Path to the repository
        #[arg(short, long)]
        repo: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    gitmig_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Project { source, dest } => {
            let config = Config::from_env().context("incomplete migration configuration")?;
            migrate_project(&config, &source, dest.as_deref())
                .await
                .with_context(|| format!("project migration from {source} failed"))
        }
        Commands::Group { source, dest } => {
            let config = Config::from_env().context("incomplete migration configuration")?;
            migrate_group(&config, &source, dest.as_deref())
                .await
                .with_context(|| format!("group migration from {source} failed"))
        }
        Commands::Authors { repo } => {
            let git = GitRunner::from_env();
            let authors =
                collect_authors(&git, &repo).context("could not list repository authors")?;
            for author in authors {
                println!("{author}");
            }
            Ok(())
        }
    }
}
