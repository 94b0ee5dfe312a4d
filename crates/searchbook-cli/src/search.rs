//! Search command implementation for Searchbook CLI.
//!
//! Runs a single query block against the local repositories and prints the
//! results once the search settles.

use std::path::PathBuf;

use searchbook_core::{
    AggregateSearchResults, Block, BlockDependencies, BlockInput, Notebook, SearchMatch,
    SearchState,
};

use crate::colors;

/// Run a query headlessly.
pub async fn execute(query: &str, repos_root: PathBuf, json: bool) -> anyhow::Result<()> {
    if !repos_root.is_dir() {
        anyhow::bail!("Repository root not found: {}", repos_root.display());
    }

    let mut notebook = Notebook::new(
        vec![BlockInput::Query(query.to_string())],
        BlockDependencies::default(),
        searchbook_server::local_services(repos_root),
    );
    let Some(block_id) = notebook.first_block_id() else {
        anyhow::bail!("Notebook has no query block");
    };
    notebook.run_block_by_id(block_id);

    let output = match notebook.block_by_id(block_id) {
        Some(Block::Query(block)) => block.output.clone(),
        _ => None,
    };
    let Some(output) = output else {
        anyhow::bail!("Query block produced no output");
    };

    let results = output.settled().await;
    tracing::debug!("Search settled with {} matches", results.results.len());

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_results(&results);
    }

    if let SearchState::Error(message) = &results.state {
        anyhow::bail!("Search failed: {}", message);
    }
    Ok(())
}

fn print_results(results: &AggregateSearchResults) {
    for m in &results.results {
        println!(
            "{}{}{} {}",
            colors::CYAN,
            location(m),
            colors::RESET,
            m.preview.trim_end()
        );
    }

    if let Some(alert) = &results.alert {
        println!(
            "\n{}{}{}: {}",
            colors::YELLOW,
            alert.title,
            colors::RESET,
            alert.description
        );
    }

    println!("\n{}{}{}", colors::DIM, summary(results), colors::RESET);
}

/// `repository/path:line:` with a 1-based line number.
fn location(m: &SearchMatch) -> String {
    format!("{}/{}:{}:", m.repository, m.file_path, m.line_number + 1)
}

fn summary(results: &AggregateSearchResults) -> String {
    let progress = &results.progress;
    let matches = results.results.len();
    format!(
        "{} {} in {} {} ({} ms)",
        matches,
        if matches == 1 { "match" } else { "matches" },
        progress.repositories_searched,
        if progress.repositories_searched == 1 {
            "repository"
        } else {
            "repositories"
        },
        progress.duration_ms
    )
}
