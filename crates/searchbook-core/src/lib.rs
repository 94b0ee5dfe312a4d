//! Core engine for Searchbook search notebooks.
//!
//! This crate provides:
//! - The block model (markdown, query and file blocks)
//! - The [`Notebook`] container with stable identity and display order
//! - The run protocol that attaches live output handles to blocks
//! - Service traits for markdown rendering, search and file fetching
//! - Streaming search aggregation

pub mod block;
pub mod error;
pub mod markdown;
pub mod notebook;
pub mod output;
pub mod search;
pub mod services;

pub use block::{
    Block, BlockDirection, BlockId, BlockInput, BlockKind, FileBlock, FileBlockInput, LineRange,
    MarkdownBlock, QueryBlock,
};
pub use error::{Error, Result, ServiceError};
pub use markdown::CmarkRenderer;
pub use notebook::Notebook;
pub use output::{FileContent, FileError, FileOutput, QueryOutput};
pub use search::{
    AggregateSearchResults, LATEST_VERSION, SearchAlert, SearchEvent, SearchMatch,
    SearchOptions, SearchPatternType, SearchProgress, SearchState, aggregate_search,
    strip_comments,
};
pub use services::{
    AggregatingSearchExecutor, BlockDependencies, ExtensionHost, FileRangeFetcher,
    FileRangesRequest, IdentityHost, MarkdownRenderer, NotebookServices, SearchBackend,
    SearchExecutor, TransformRequest,
};
