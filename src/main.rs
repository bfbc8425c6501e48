use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use undercov::cli;
use undercov::config::{JsonFileStore, PreferencesStore, RepoConfig};
use undercov::http::UreqClient;

/// undercov: code coverage overlays for GitHub pages.
#[derive(Parser)]
#[command(name = "undercov", version, about)]
struct Cli {
    /// Path to the preferences file (default: ./undercov.json)
    #[arg(long, global = true, default_value = "undercov.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the coverage overlay for a GitHub page.
    Overlay {
        /// GitHub page URL, e.g. https://github.com/owner/repo/pull/42
        page_url: String,

        /// Branch selected on a repository's root page.
        #[arg(long)]
        branch: Option<String>,

        /// Coverage server origin the overlay may access. Repeatable.
        #[arg(long = "allow-origin")]
        allow_origins: Vec<String>,
    },

    /// Convert a coverage report file and summarize it.
    Convert {
        /// Path to the report.
        file: PathBuf,

        /// Report format (json, cobertura).
        #[arg(long, default_value = "json")]
        format: String,

        /// Print the normalized coverage as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Read or change preferences.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the preferences.
    Show,

    /// Add a repository, or replace its settings.
    AddRepo {
        /// Repository as owner/repo.
        repo_name: String,

        /// Report URL for branches; `$1` is the branch name.
        #[arg(long)]
        branch_url: String,

        /// Report URL for pull requests; `$1` is the pull request id.
        #[arg(long, default_value = "")]
        pr_url: String,

        /// Prefix report paths carry in front of repository paths.
        #[arg(long, default_value = "")]
        path_prefix: String,

        #[arg(long, default_value = "")]
        github_path_prefix: String,

        /// Login URL for the coverage server; `$1` is the page to return to.
        #[arg(long)]
        auth_url: Option<String>,

        /// Report format (json, cobertura).
        #[arg(long, default_value = "json")]
        filetype: String,
    },
}

fn init_logging(debug_enabled: bool) {
    let default = if debug_enabled { "undercov=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let store = JsonFileStore::new(&args.config);
    let preferences = store
        .load_options()
        .with_context(|| format!("Failed to load preferences from {}", args.config.display()))?;
    init_logging(preferences.debug_enabled);

    let output = match args.command {
        Commands::Overlay {
            page_url,
            branch,
            allow_origins,
        } => {
            cli::cmd_overlay(
                preferences,
                Arc::new(UreqClient::new()),
                &page_url,
                branch,
                allow_origins,
            )
            .await?
        }
        Commands::Convert { file, format, json } => cli::cmd_convert(&file, &format, json)?,
        Commands::Config { command } => match command {
            ConfigCommands::Show => cli::cmd_config_show(&store)?,
            ConfigCommands::AddRepo {
                repo_name,
                branch_url,
                pr_url,
                path_prefix,
                github_path_prefix,
                auth_url,
                filetype,
            } => {
                let repo = RepoConfig {
                    repo_name,
                    branch_url_template: branch_url,
                    pr_url_template: pr_url,
                    path_prefix,
                    github_path_prefix,
                    auth_url_template: auth_url,
                    filetype: filetype.parse()?,
                };
                cli::cmd_config_add_repo(&store, repo)?
            }
        },
    };
    print!("{output}");
    Ok(())
}
