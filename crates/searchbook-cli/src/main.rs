//! Searchbook CLI - search notebooks over local repositories.

mod colors;
mod search;
mod serve;
mod show;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "searchbook")]
#[command(about = "Search notebooks over local repositories")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive notebook server
    Serve {
        /// Host address to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Directory whose subdirectories are the searchable repositories
        #[arg(long, default_value = ".")]
        repos_root: PathBuf,

        /// Reject edits from clients
        #[arg(long)]
        read_only: bool,
    },

    /// Run a query block headlessly and print its results
    Search {
        /// Search query (`repo:` filters and `//` comments allowed)
        query: String,

        /// Directory whose subdirectories are the searchable repositories
        #[arg(long, default_value = ".")]
        repos_root: PathBuf,

        /// Print the aggregated results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a file block headlessly and print the file's lines
    Show {
        /// Repository name (a subdirectory of the repository root)
        repository: String,

        /// Path of the file within the repository
        path: String,

        /// Revision to read (default: HEAD)
        #[arg(long, default_value = "")]
        revision: String,

        /// Lines to show, 1-based and inclusive (e.g. 10-20)
        #[arg(long)]
        lines: Option<String>,

        /// Directory whose subdirectories are the searchable repositories
        #[arg(long, default_value = ".")]
        repos_root: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve {
            host,
            port,
            repos_root,
            read_only,
        } => {
            let config = searchbook_server::ServerConfig {
                host,
                port,
                read_only,
                repos_root,
            };
            serve::execute(config).await?;
        }

        Commands::Search {
            query,
            repos_root,
            json,
        } => search::execute(&query, repos_root, json).await?,

        Commands::Show {
            repository,
            path,
            revision,
            lines,
            repos_root,
        } => {
            show::execute(&repository, &path, &revision, lines.as_deref(), repos_root).await?;
        }
    }

    Ok(())
}
