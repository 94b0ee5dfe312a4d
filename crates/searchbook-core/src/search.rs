//! Search vocabulary shared by query blocks and search backends.
//!
//! A backend emits a stream of [`SearchEvent`]s. [`aggregate_search`] folds
//! them into progressively refined [`AggregateSearchResults`] snapshots,
//! which is what a query block's output observes.

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

/// Search protocol version requested by query blocks.
pub const LATEST_VERSION: &str = "V2";

/// How the query pattern is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPatternType {
    Literal,
    Regexp,
    Structural,
}

/// Options passed to the search executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub version: String,
    pub pattern_type: SearchPatternType,
    pub case_sensitive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl SearchOptions {
    /// Options used by every query block: latest version, literal,
    /// case-insensitive, no trace.
    pub fn notebook_defaults() -> Self {
        Self {
            version: LATEST_VERSION.to_string(),
            pattern_type: SearchPatternType::Literal,
            case_sensitive: false,
            trace: None,
        }
    }
}

/// Remove `//` line comments from a query.
///
/// Everything from `//` up to (not including) the end of the line is dropped.
pub fn strip_comments(query: &str) -> String {
    let mut stripped = String::with_capacity(query.len());
    let mut rest = query;
    while let Some(start) = rest.find("//") {
        stripped.push_str(&rest[..start]);
        let comment = &rest[start..];
        match comment.find(['\n', '\r']) {
            Some(end) => rest = &comment[end..],
            None => rest = "",
        }
    }
    stripped.push_str(rest);
    stripped
}

/// A single matching line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub repository: String,
    pub file_path: String,
    /// 0-based line number.
    pub line_number: u32,
    pub preview: String,
}

/// Execution statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchProgress {
    pub match_count: usize,
    pub duration_ms: u64,
    pub repositories_searched: usize,
    /// Human-readable reasons some results were left out.
    #[serde(default)]
    pub skipped: Vec<String>,
}

/// Notice attached to a search (e.g. result limit hit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchAlert {
    pub title: String,
    pub description: String,
}

/// Raw event emitted by a search backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchEvent {
    Matches { matches: Vec<SearchMatch> },
    Progress { progress: SearchProgress },
    Alert { alert: SearchAlert },
    Error { message: String },
    Done,
}

/// Lifecycle of an aggregated search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum SearchState {
    Loading,
    Complete,
    Error(String),
}

impl SearchState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

/// Snapshot of everything a search has produced so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateSearchResults {
    pub state: SearchState,
    pub results: Vec<SearchMatch>,
    pub progress: SearchProgress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<SearchAlert>,
}

impl AggregateSearchResults {
    /// The value a query block's output starts with.
    pub fn empty() -> Self {
        Self {
            state: SearchState::Loading,
            results: Vec::new(),
            progress: SearchProgress::default(),
            alert: None,
        }
    }

    /// Fold one event into the aggregate.
    pub fn apply(&mut self, event: SearchEvent) {
        match event {
            SearchEvent::Matches { matches } => self.results.extend(matches),
            SearchEvent::Progress { progress } => self.progress = progress,
            SearchEvent::Alert { alert } => self.alert = Some(alert),
            SearchEvent::Error { message } => self.state = SearchState::Error(message),
            SearchEvent::Done => {
                if self.state.is_loading() {
                    self.state = SearchState::Complete;
                }
            }
        }
    }
}

impl Default for AggregateSearchResults {
    fn default() -> Self {
        Self::empty()
    }
}

/// Fold a backend's events into a stream of aggregate snapshots.
///
/// One snapshot is emitted per event. An error event ends the stream; events
/// after it are ignored.
pub fn aggregate_search<S>(events: S) -> impl Stream<Item = AggregateSearchResults> + Send
where
    S: Stream<Item = SearchEvent> + Send,
{
    events
        .scan(AggregateSearchResults::empty(), |aggregate, event| {
            if matches!(aggregate.state, SearchState::Error(_)) {
                return futures::future::ready(None);
            }
            aggregate.apply(event);
            futures::future::ready(Some(aggregate.clone()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_match(line: u32) -> SearchMatch {
        SearchMatch {
            repository: "x".to_string(),
            file_path: "src/lib.rs".to_string(),
            line_number: line,
            preview: "foo".to_string(),
        }
    }

    #[test]
    fn test_strip_comments() {
        assert_eq!(strip_comments("repo:x // a comment\nfoo"), "repo:x \nfoo");
        assert_eq!(strip_comments("foo"), "foo");
        assert_eq!(strip_comments("// only a comment"), "");
        assert_eq!(strip_comments("a // one\nb // two\nc"), "a \nb \nc");
        assert_eq!(strip_comments("a // one\r\nb"), "a \r\nb");
    }

    #[test]
    fn test_notebook_defaults() {
        let options = SearchOptions::notebook_defaults();
        assert_eq!(options.version, "V2");
        assert_eq!(options.pattern_type, SearchPatternType::Literal);
        assert!(!options.case_sensitive);
        assert!(options.trace.is_none());
    }

    #[test]
    fn test_empty_results_are_loading() {
        let empty = AggregateSearchResults::empty();
        assert!(empty.state.is_loading());
        assert!(empty.results.is_empty());
        assert_eq!(empty.progress.match_count, 0);
    }

    #[tokio::test]
    async fn test_aggregate_accumulates_matches() {
        let events = futures::stream::iter(vec![
            SearchEvent::Matches {
                matches: vec![sample_match(1)],
            },
            SearchEvent::Matches {
                matches: vec![sample_match(2), sample_match(3)],
            },
            SearchEvent::Progress {
                progress: SearchProgress {
                    match_count: 3,
                    duration_ms: 12,
                    repositories_searched: 1,
                    skipped: Vec::new(),
                },
            },
            SearchEvent::Done,
        ]);

        let snapshots: Vec<_> = aggregate_search(events).collect().await;
        assert_eq!(snapshots.len(), 4);
        assert_eq!(snapshots[0].results.len(), 1);
        assert!(snapshots[1].state.is_loading());
        assert_eq!(snapshots[1].results.len(), 3);
        let last = snapshots.last().unwrap();
        assert_eq!(last.state, SearchState::Complete);
        assert_eq!(last.progress.match_count, 3);
    }

    #[tokio::test]
    async fn test_aggregate_stops_after_error() {
        let events = futures::stream::iter(vec![
            SearchEvent::Matches {
                matches: vec![sample_match(1)],
            },
            SearchEvent::Error {
                message: "backend down".to_string(),
            },
            SearchEvent::Matches {
                matches: vec![sample_match(2)],
            },
            SearchEvent::Done,
        ]);

        let snapshots: Vec<_> = aggregate_search(events).collect().await;
        assert_eq!(snapshots.len(), 2);
        let last = snapshots.last().unwrap();
        assert_eq!(last.state, SearchState::Error("backend down".to_string()));
        assert_eq!(last.results.len(), 1);
    }

    #[test]
    fn test_search_state_json() {
        let json = serde_json::to_value(SearchState::Error("boom".to_string())).unwrap();
        assert_eq!(json["state"], "error");
        assert_eq!(json["message"], "boom");
        let json = serde_json::to_value(SearchState::Complete).unwrap();
        assert_eq!(json["state"], "complete");
    }
}
