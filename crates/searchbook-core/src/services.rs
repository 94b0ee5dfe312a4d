//! External services a notebook runs its blocks against.
//!
//! The notebook itself only keeps blocks in order and wires outputs. Turning
//! input into output is delegated to these traits so hosts can plug in a real
//! search backend, a local one, or test doubles.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;

use crate::block::LineRange;
use crate::error::ServiceError;
use crate::markdown::CmarkRenderer;
use crate::search::{AggregateSearchResults, SearchEvent, SearchOptions, aggregate_search};

/// Renders markdown source to HTML. Must be pure.
pub trait MarkdownRenderer: Send + Sync {
    fn render(&self, text: &str) -> String;
}

/// Host that may rewrite search queries before they execute
/// (e.g. query transformers contributed by extensions).
#[async_trait]
pub trait ExtensionHost: Send + Sync {
    async fn transform_search_query(&self, query: String) -> String;
}

/// Extension host without any query transformers.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityHost;

#[async_trait]
impl ExtensionHost for IdentityHost {
    async fn transform_search_query(&self, query: String) -> String {
        query
    }
}

/// Execution context held by a notebook for its whole lifetime and shared
/// read-only by every query run.
#[derive(Clone)]
pub struct BlockDependencies {
    pub extension_host: Arc<dyn ExtensionHost>,
}

impl BlockDependencies {
    pub fn new(extension_host: Arc<dyn ExtensionHost>) -> Self {
        Self { extension_host }
    }
}

impl Default for BlockDependencies {
    fn default() -> Self {
        Self::new(Arc::new(IdentityHost))
    }
}

impl std::fmt::Debug for BlockDependencies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockDependencies").finish_non_exhaustive()
    }
}

/// A query waiting to be transformed by the extension host and executed.
#[derive(Clone)]
pub struct TransformRequest {
    pub query: String,
    pub extension_host: Arc<dyn ExtensionHost>,
}

impl std::fmt::Debug for TransformRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformRequest")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

/// Executes a query and streams aggregated snapshots until it completes or fails.
///
/// Failures are reported as an error state inside the stream, never as a
/// separate error channel.
pub trait SearchExecutor: Send + Sync {
    fn execute(
        &self,
        request: TransformRequest,
        options: SearchOptions,
    ) -> BoxStream<'static, AggregateSearchResults>;
}

/// Low-level search producing raw events for an already-transformed query.
pub trait SearchBackend: Send + Sync {
    fn search(&self, query: String, options: SearchOptions) -> BoxStream<'static, SearchEvent>;
}

/// [`SearchExecutor`] that transforms the query through the extension host,
/// runs it on a [`SearchBackend`] and aggregates the events.
pub struct AggregatingSearchExecutor<B> {
    backend: Arc<B>,
}

impl<B> AggregatingSearchExecutor<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }
}

impl<B: SearchBackend + 'static> SearchExecutor for AggregatingSearchExecutor<B> {
    fn execute(
        &self,
        request: TransformRequest,
        options: SearchOptions,
    ) -> BoxStream<'static, AggregateSearchResults> {
        let backend = Arc::clone(&self.backend);
        let TransformRequest {
            query,
            extension_host,
        } = request;

        let events = stream::once(async move { extension_host.transform_search_query(query).await })
            .flat_map(move |query| {
                tracing::debug!("Executing transformed query: {}", query);
                backend.search(query, options.clone())
            });

        aggregate_search(events).boxed()
    }
}

/// Request for highlighted line ranges of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRangesRequest {
    pub repo_name: String,
    pub commit_id: String,
    pub file_path: String,
    pub ranges: Vec<LineRange>,
    pub disable_timeout: bool,
}

/// Fetches highlighted lines of a file at a revision.
#[async_trait]
pub trait FileRangeFetcher: Send + Sync {
    /// Returns one list of (HTML) lines per requested range, in order.
    async fn fetch_highlighted_file_line_ranges(
        &self,
        request: FileRangesRequest,
    ) -> std::result::Result<Vec<Vec<String>>, ServiceError>;
}

/// Everything a notebook needs to run blocks.
#[derive(Clone)]
pub struct NotebookServices {
    pub markdown: Arc<dyn MarkdownRenderer>,
    pub search: Arc<dyn SearchExecutor>,
    pub files: Arc<dyn FileRangeFetcher>,
    /// Runtime the asynchronous outputs are produced on.
    pub runtime: Handle,
}

impl NotebookServices {
    /// Services using the default markdown renderer, spawning on `runtime`.
    pub fn new(
        search: Arc<dyn SearchExecutor>,
        files: Arc<dyn FileRangeFetcher>,
        runtime: Handle,
    ) -> Self {
        Self {
            markdown: Arc::new(CmarkRenderer::default()),
            search,
            files,
            runtime,
        }
    }

    pub fn with_markdown(mut self, markdown: Arc<dyn MarkdownRenderer>) -> Self {
        self.markdown = markdown;
        self
    }
}

impl std::fmt::Debug for NotebookServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotebookServices").finish_non_exhaustive()
    }
}
