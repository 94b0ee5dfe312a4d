//! Filesystem-backed services for running notebooks without a search cluster.
//!
//! Repositories are the immediate subdirectories of a root directory:
//! `<root>/<repository_name>/<file_path>`. Revisions are not resolved; the
//! working tree is always read.

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use ignore::WalkBuilder;
use searchbook_core::block::DEFAULT_REVISION;
use searchbook_core::{
    FileRangeFetcher, FileRangesRequest, SearchAlert, SearchBackend, SearchEvent, SearchMatch,
    SearchOptions, SearchPatternType, SearchProgress, ServiceError,
};
use tokio::sync::mpsc;

/// Default cap on matches returned by one local search.
pub const DEFAULT_MATCH_LIMIT: usize = 500;

/// Capacity of the channel between the blocking walker and the event stream.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Escape text for inclusion in HTML.
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Serves file ranges from a directory of checked-out repositories.
#[derive(Debug, Clone)]
pub struct LocalFileFetcher {
    root: PathBuf,
}

impl LocalFileFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a repository file, refusing paths that leave the root.
    fn resolve(&self, repository: &str, file_path: &str) -> Result<PathBuf, ServiceError> {
        let root = self.root.canonicalize()?;
        let candidate = root.join(repository).join(file_path.trim_start_matches('/'));
        let resolved = candidate.canonicalize().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                ServiceError::NotFound(format!("{}/{}", repository, file_path))
            }
            _ => ServiceError::Io(e),
        })?;

        if !resolved.starts_with(&root) {
            return Err(ServiceError::InvalidRequest(format!(
                "path escapes repository root: {}/{}",
                repository, file_path
            )));
        }
        if !resolved.is_file() {
            return Err(ServiceError::NotFound(format!("{}/{}", repository, file_path)));
        }
        Ok(resolved)
    }
}

#[async_trait]
impl FileRangeFetcher for LocalFileFetcher {
    async fn fetch_highlighted_file_line_ranges(
        &self,
        request: FileRangesRequest,
    ) -> Result<Vec<Vec<String>>, ServiceError> {
        if request.commit_id != DEFAULT_REVISION {
            tracing::debug!(
                "Local fetcher reads the working tree; ignoring revision {}",
                request.commit_id
            );
        }

        let path = self.resolve(&request.repo_name, &request.file_path)?;
        let content = tokio::fs::read_to_string(&path).await?;
        let lines: Vec<&str> = content.lines().collect();

        Ok(request
            .ranges
            .iter()
            .map(|range| {
                let end = (range.end_line as usize).min(lines.len());
                let start = (range.start_line as usize).min(end);
                lines[start..end].iter().map(|line| escape_html(line)).collect()
            })
            .collect())
    }
}

/// Parsed local search query.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LocalQuery {
    /// `repo:` filters; a repository matches if its name contains any of them.
    repo_filters: Vec<String>,
    /// Literal pattern searched for in each line.
    pattern: String,
}

impl LocalQuery {
    fn parse(query: &str) -> Self {
        let mut repo_filters = Vec::new();
        let mut terms = Vec::new();
        for token in query.split_whitespace() {
            match token.strip_prefix("repo:") {
                Some(filter) if !filter.is_empty() => repo_filters.push(filter.to_string()),
                _ => terms.push(token),
            }
        }
        Self {
            repo_filters,
            pattern: terms.join(" "),
        }
    }

    fn matches_repo(&self, repository: &str) -> bool {
        self.repo_filters.is_empty()
            || self
                .repo_filters
                .iter()
                .any(|filter| repository.contains(filter.as_str()))
    }
}

/// Literal line search over a directory of repositories.
#[derive(Debug, Clone)]
pub struct LocalSearchBackend {
    root: PathBuf,
    match_limit: usize,
}

impl LocalSearchBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            match_limit: DEFAULT_MATCH_LIMIT,
        }
    }

    pub fn with_match_limit(mut self, match_limit: usize) -> Self {
        self.match_limit = match_limit;
        self
    }
}

impl SearchBackend for LocalSearchBackend {
    fn search(&self, query: String, options: SearchOptions) -> BoxStream<'static, SearchEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let root = self.root.clone();
        let match_limit = self.match_limit;

        tokio::task::spawn_blocking(move || {
            let query = LocalQuery::parse(&query);
            run_local_search(&root, &query, &options, match_limit, &tx);
        });

        stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|event| (event, rx)) }).boxed()
    }
}

/// Walk every matching repository and send events until done or the
/// receiver goes away.
fn run_local_search(
    root: &Path,
    query: &LocalQuery,
    options: &SearchOptions,
    match_limit: usize,
    tx: &mpsc::Sender<SearchEvent>,
) {
    let started = Instant::now();
    let send = |event: SearchEvent| tx.blocking_send(event).is_ok();

    if query.pattern.is_empty() {
        send(SearchEvent::Alert {
            alert: SearchAlert {
                title: "Empty search query".to_string(),
                description: "Add a search term after any repo: filters.".to_string(),
            },
        });
        send(SearchEvent::Done);
        return;
    }

    if options.pattern_type != SearchPatternType::Literal {
        tracing::warn!(
            "Local search only supports literal patterns; treating {:?} query as literal",
            options.pattern_type
        );
    }

    let repositories = match list_repositories(root) {
        Ok(repositories) => repositories,
        Err(e) => {
            send(SearchEvent::Error {
                message: format!("Failed to read repository root {}: {}", root.display(), e),
            });
            return;
        }
    };

    let needle = if options.case_sensitive {
        query.pattern.clone()
    } else {
        query.pattern.to_lowercase()
    };

    let mut progress = SearchProgress::default();
    'repositories: for (name, path) in repositories {
        if !query.matches_repo(&name) {
            continue;
        }
        progress.repositories_searched += 1;

        let walker = WalkBuilder::new(&path)
            .hidden(true)
            .git_ignore(true)
            .require_git(false)
            .build();

        for entry in walker.flatten() {
            if !entry.file_type().is_some_and(|kind| kind.is_file()) {
                continue;
            }
            // Binary and non-UTF-8 files are skipped.
            let Ok(content) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            let file_path = entry
                .path()
                .strip_prefix(&path)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");

            let mut matches = Vec::new();
            for (line_number, line) in content.lines().enumerate() {
                let found = if options.case_sensitive {
                    line.contains(needle.as_str())
                } else {
                    line.to_lowercase().contains(needle.as_str())
                };
                if !found {
                    continue;
                }
                if progress.match_count >= match_limit {
                    progress
                        .skipped
                        .push(format!("Result limit of {} matches reached", match_limit));
                    if !matches.is_empty() && !send(SearchEvent::Matches { matches }) {
                        return;
                    }
                    send(SearchEvent::Alert {
                        alert: SearchAlert {
                            title: "Result limit hit".to_string(),
                            description: format!(
                                "Only the first {} matches are shown. Narrow the query with repo: filters.",
                                match_limit
                            ),
                        },
                    });
                    break 'repositories;
                }
                progress.match_count += 1;
                matches.push(SearchMatch {
                    repository: name.clone(),
                    file_path: file_path.clone(),
                    line_number: u32::try_from(line_number).unwrap_or(u32::MAX),
                    preview: line.to_string(),
                });
            }

            if !matches.is_empty() && !send(SearchEvent::Matches { matches }) {
                return;
            }
        }

        progress.duration_ms = started.elapsed().as_millis() as u64;
        if !send(SearchEvent::Progress {
            progress: progress.clone(),
        }) {
            return;
        }
    }

    progress.duration_ms = started.elapsed().as_millis() as u64;
    tracing::debug!(
        "Local search for {:?} found {} matches in {} repositories",
        query.pattern,
        progress.match_count,
        progress.repositories_searched
    );
    send(SearchEvent::Progress { progress });
    send(SearchEvent::Done);
}

/// Immediate subdirectories of the root, sorted by name.
fn list_repositories(root: &Path) -> std::io::Result<Vec<(String, PathBuf)>> {
    let mut repositories = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with('.') {
                repositories.push((name, entry.path()));
            }
        }
    }
    repositories.sort();
    Ok(repositories)
}
