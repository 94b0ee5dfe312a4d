//! Integration tests for the filesystem-backed search and file services.

use std::fs;
use std::path::Path;

use futures::StreamExt;
use searchbook_core::{
    AggregateSearchResults, AggregatingSearchExecutor, FileRangeFetcher, FileRangesRequest,
    IdentityHost, LineRange, SearchExecutor, SearchOptions, SearchState, ServiceError,
    TransformRequest,
};
use searchbook_server::{LocalFileFetcher, LocalSearchBackend};
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

/// Layout:
///
/// ```text
/// <base>/secret.txt
/// <base>/repos/acme-app/src/main.rs
/// <base>/repos/acme-app/.gitignore      (ignores target/)
/// <base>/repos/acme-app/target/out.rs
/// <base>/repos/other/README.md
/// ```
fn repos() -> TempDir {
    let base = TempDir::new().unwrap();
    let root = base.path().join("repos");

    write(&base.path().join("secret.txt"), "hello secret\n");
    write(
        &root.join("acme-app/src/main.rs"),
        "fn main() {\n    println!(\"Hello <world>\");\n}\n",
    );
    write(&root.join("acme-app/.gitignore"), "target/\n");
    write(&root.join("acme-app/target/out.rs"), "// hello from build output\n");
    write(&root.join("other/README.md"), "# Other\n\nhello again\n");

    base
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn request(repo: &str, path: &str, range: LineRange) -> FileRangesRequest {
    FileRangesRequest {
        repo_name: repo.to_string(),
        commit_id: "HEAD".to_string(),
        file_path: path.to_string(),
        ranges: vec![range],
        disable_timeout: false,
    }
}

async fn search(backend: LocalSearchBackend, query: &str) -> AggregateSearchResults {
    let executor = AggregatingSearchExecutor::new(backend);
    let request = TransformRequest {
        query: query.to_string(),
        extension_host: std::sync::Arc::new(IdentityHost),
    };
    executor
        .execute(request, SearchOptions::notebook_defaults())
        .collect::<Vec<_>>()
        .await
        .pop()
        .expect("search produced no snapshots")
}

// =============================================================================
// File fetcher
// =============================================================================

#[tokio::test]
async fn test_fetch_line_range_is_escaped() {
    let base = repos();
    let fetcher = LocalFileFetcher::new(base.path().join("repos"));

    let ranges = fetcher
        .fetch_highlighted_file_line_ranges(request(
            "acme-app",
            "src/main.rs",
            LineRange::new(1, 2),
        ))
        .await
        .unwrap();

    assert_eq!(
        ranges,
        vec![vec![
            "    println!(&quot;Hello &lt;world&gt;&quot;);".to_string()
        ]]
    );
}

#[tokio::test]
async fn test_fetch_entire_file() {
    let base = repos();
    let fetcher = LocalFileFetcher::new(base.path().join("repos"));

    let ranges = fetcher
        .fetch_highlighted_file_line_ranges(request(
            "other",
            "README.md",
            LineRange::ENTIRE_FILE,
        ))
        .await
        .unwrap();

    assert_eq!(ranges.len(), 1);
    assert_eq!(ranges[0], vec!["# Other", "", "hello again"]);
}

#[tokio::test]
async fn test_fetch_missing_file() {
    let base = repos();
    let fetcher = LocalFileFetcher::new(base.path().join("repos"));

    let result = fetcher
        .fetch_highlighted_file_line_ranges(request(
            "acme-app",
            "src/nope.rs",
            LineRange::ENTIRE_FILE,
        ))
        .await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn test_fetch_rejects_paths_outside_root() {
    let base = repos();
    let fetcher = LocalFileFetcher::new(base.path().join("repos"));

    let result = fetcher
        .fetch_highlighted_file_line_ranges(request(
            "acme-app",
            "../../secret.txt",
            LineRange::ENTIRE_FILE,
        ))
        .await;
    assert!(matches!(result, Err(ServiceError::InvalidRequest(_))));
}

// =============================================================================
// Search backend
// =============================================================================

#[tokio::test]
async fn test_search_all_repositories() {
    let base = repos();
    let results = search(LocalSearchBackend::new(base.path().join("repos")), "HELLO").await;

    assert_eq!(results.state, SearchState::Complete);
    assert_eq!(results.progress.repositories_searched, 2);
    assert_eq!(results.progress.match_count, 2);

    let found: Vec<(&str, &str, u32)> = results
        .results
        .iter()
        .map(|m| (m.repository.as_str(), m.file_path.as_str(), m.line_number))
        .collect();
    // target/ is gitignored; secret.txt is outside the root.
    assert_eq!(
        found,
        vec![("acme-app", "src/main.rs", 1), ("other", "README.md", 2)]
    );
    assert_eq!(results.results[0].preview, "    println!(\"Hello <world>\");");
}

#[tokio::test]
async fn test_search_repo_filter() {
    let base = repos();
    let results = search(
        LocalSearchBackend::new(base.path().join("repos")),
        "repo:other hello",
    )
    .await;

    assert_eq!(results.state, SearchState::Complete);
    assert_eq!(results.progress.repositories_searched, 1);
    assert_eq!(results.results.len(), 1);
    assert_eq!(results.results[0].repository, "other");
}

#[tokio::test]
async fn test_search_match_limit_alert() {
    let base = repos();
    let backend = LocalSearchBackend::new(base.path().join("repos")).with_match_limit(1);
    let results = search(backend, "hello").await;

    assert_eq!(results.state, SearchState::Complete);
    assert_eq!(results.results.len(), 1);
    assert!(!results.progress.skipped.is_empty());
    assert_eq!(results.alert.unwrap().title, "Result limit hit");
}

#[tokio::test]
async fn test_search_empty_pattern() {
    let base = repos();
    let results = search(
        LocalSearchBackend::new(base.path().join("repos")),
        "repo:acme",
    )
    .await;

    assert_eq!(results.state, SearchState::Complete);
    assert!(results.results.is_empty());
    assert_eq!(results.alert.unwrap().title, "Empty search query");
}

#[tokio::test]
async fn test_search_missing_root_is_error() {
    let base = TempDir::new().unwrap();
    let results = search(
        LocalSearchBackend::new(base.path().join("does-not-exist")),
        "hello",
    )
    .await;

    assert!(matches!(results.state, SearchState::Error(_)));
}
