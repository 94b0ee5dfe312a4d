//! Live output handles for asynchronous blocks.
//!
//! Query and file blocks do not hold a computed value. Running them attaches
//! a handle backed by a `tokio::sync::watch` channel; observers clone the
//! handle or subscribe to the receiver and see every update the producer
//! publishes. Re-running a block swaps in a new handle: the old producer keeps
//! running to completion and its existing subscribers still observe its
//! terminal value, but the notebook no longer reaches it.

use serde::Serialize;
use tokio::sync::watch;

use crate::search::AggregateSearchResults;

/// Handle on a query block's progressively aggregated results.
#[derive(Debug, Clone)]
pub struct QueryOutput {
    rx: watch::Receiver<AggregateSearchResults>,
}

impl QueryOutput {
    pub(crate) fn new(rx: watch::Receiver<AggregateSearchResults>) -> Self {
        Self { rx }
    }

    /// The latest published snapshot.
    pub fn current(&self) -> AggregateSearchResults {
        self.rx.borrow().clone()
    }

    /// A receiver that observes every subsequent snapshot.
    pub fn subscribe(&self) -> watch::Receiver<AggregateSearchResults> {
        self.rx.clone()
    }

    /// Wait until the search leaves the loading state.
    ///
    /// Returns the latest snapshot if the producer goes away first.
    pub async fn settled(&self) -> AggregateSearchResults {
        let mut rx = self.rx.clone();
        let settled = rx
            .wait_for(|results| !results.state.is_loading())
            .await
            .map(|results| results.clone());
        match settled {
            Ok(results) => results,
            Err(_) => rx.borrow().clone(),
        }
    }

    /// Whether both handles observe the same producer.
    pub fn same_handle(&self, other: &QueryOutput) -> bool {
        self.rx.same_channel(&other.rx)
    }
}

/// Error value shown in place of file content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct FileError {
    pub message: String,
}

impl FileError {
    /// The value every failed file fetch resolves to.
    pub fn not_found() -> Self {
        Self {
            message: "File not found".to_string(),
        }
    }
}

/// Lines of a fetched range, or the error value.
pub type FileContent = std::result::Result<Vec<String>, FileError>;

/// One-shot handle on a file block's content. `None` while pending.
#[derive(Debug, Clone)]
pub struct FileOutput {
    rx: watch::Receiver<Option<FileContent>>,
}

impl FileOutput {
    pub(crate) fn new(rx: watch::Receiver<Option<FileContent>>) -> Self {
        Self { rx }
    }

    /// The resolved content, or `None` if the fetch is still in flight.
    pub fn current(&self) -> Option<FileContent> {
        self.rx.borrow().clone()
    }

    pub fn is_pending(&self) -> bool {
        self.rx.borrow().is_none()
    }

    /// A receiver that observes the resolution.
    pub fn subscribe(&self) -> watch::Receiver<Option<FileContent>> {
        self.rx.clone()
    }

    /// Wait for the fetch to resolve.
    pub async fn resolved(&self) -> FileContent {
        let mut rx = self.rx.clone();
        let resolved = rx.wait_for(Option::is_some).await.map(|content| content.clone());
        match resolved {
            Ok(content) => content.unwrap_or_else(|| Err(FileError::not_found())),
            // Producer dropped without resolving (task aborted at runtime shutdown).
            Err(_) => Err(FileError::not_found()),
        }
    }

    /// Whether both handles observe the same fetch.
    pub fn same_handle(&self, other: &FileOutput) -> bool {
        self.rx.same_channel(&other.rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchState;

    #[tokio::test]
    async fn test_query_output_settles() {
        let (tx, rx) = watch::channel(AggregateSearchResults::empty());
        let output = QueryOutput::new(rx);
        assert!(output.current().state.is_loading());

        let waiter = {
            let output = output.clone();
            tokio::spawn(async move { output.settled().await })
        };

        tx.send_modify(|results| results.state = SearchState::Complete);
        let settled = waiter.await.unwrap();
        assert_eq!(settled.state, SearchState::Complete);
    }

    #[tokio::test]
    async fn test_query_output_settles_when_producer_drops() {
        let (tx, rx) = watch::channel(AggregateSearchResults::empty());
        let output = QueryOutput::new(rx);
        drop(tx);
        assert!(output.settled().await.state.is_loading());
    }

    #[tokio::test]
    async fn test_file_output_resolves() {
        let (tx, rx) = watch::channel(None);
        let output = FileOutput::new(rx);
        assert!(output.is_pending());

        tx.send_replace(Some(Ok(vec!["fn main() {}".to_string()])));
        assert_eq!(output.resolved().await, Ok(vec!["fn main() {}".to_string()]));
        assert!(!output.is_pending());
    }

    #[tokio::test]
    async fn test_file_output_dropped_producer_is_not_found() {
        let (tx, rx) = watch::channel::<Option<FileContent>>(None);
        let output = FileOutput::new(rx);
        drop(tx);
        assert_eq!(output.resolved().await, Err(FileError::not_found()));
    }

    #[test]
    fn test_same_handle() {
        let (_tx, rx) = watch::channel(None);
        let a = FileOutput::new(rx);
        let b = a.clone();
        let (_tx2, rx2) = watch::channel(None);
        let c = FileOutput::new(rx2);
        assert!(a.same_handle(&b));
        assert!(!a.same_handle(&c));
    }
}
