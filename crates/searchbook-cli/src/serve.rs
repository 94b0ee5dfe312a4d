//! Serve command implementation for Searchbook CLI.
//!
//! Starts an interactive WebSocket server with a starter notebook.

use searchbook_core::{BlockInput, FileBlockInput};
use searchbook_server::ServerConfig;

use crate::colors;

/// Blocks the served notebook starts with.
fn welcome_blocks(first_repository: Option<String>) -> Vec<BlockInput> {
    let mut blocks = vec![
        BlockInput::Markdown(
            "# Searchbook\n\nQuery blocks search every repository under the root. \
             Narrow them with `repo:` filters; `//` starts a comment."
                .to_string(),
        ),
        BlockInput::Query("fn main // entry points".to_string()),
    ];

    if let Some(repository) = first_repository {
        blocks.push(BlockInput::Markdown(format!(
            "File blocks show a snippet of a file in `{}`.",
            repository
        )));
        blocks.push(BlockInput::File(FileBlockInput {
            repository_name: repository,
            revision: String::new(),
            file_path: "README.md".to_string(),
            line_range: None,
        }));
    }

    blocks
}

/// First repository under the root, by name.
fn first_repository(config: &ServerConfig) -> Option<String> {
    let mut names: Vec<String> = std::fs::read_dir(&config.repos_root)
        .ok()?
        .flatten()
        .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_dir()))
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|name| !name.starts_with('.'))
        .collect();
    names.sort();
    names.into_iter().next()
}

/// Start the interactive notebook server.
pub async fn execute(config: ServerConfig) -> anyhow::Result<()> {
    if !config.repos_root.is_dir() {
        anyhow::bail!(
            "Repository root not found: {}",
            config.repos_root.display()
        );
    }

    println!(
        "\n{}Searchbook Server{} - Search Notebook",
        colors::BOLD,
        colors::RESET
    );
    println!("{}", "─".repeat(50));

    println!(
        "{}  ◆ Repositories:{} {}",
        colors::CYAN,
        colors::RESET,
        config.repos_root.display()
    );
    println!(
        "{}  ◆ Server:{} http://{}:{}",
        colors::CYAN,
        colors::RESET,
        config.host,
        config.port
    );
    println!(
        "{}  ◆ WebSocket:{} ws://{}:{}/ws",
        colors::CYAN,
        colors::RESET,
        config.host,
        config.port
    );
    if config.read_only {
        println!("{}  ◆ Read-only{}", colors::YELLOW, colors::RESET);
    }
    println!("{}", "─".repeat(50));
    println!("{}Press Ctrl+C to stop{}", colors::GREEN, colors::RESET);
    println!();

    let blocks = welcome_blocks(first_repository(&config));
    searchbook_server::serve(blocks, config).await?;

    Ok(())
}
