//! The notebook: an ordered collection of blocks with stable identity.
//!
//! Blocks live in a map keyed by [`BlockId`]; display order is a separate
//! list of ids. Every mutation updates both together, so the list and the
//! map's key set always hold the same ids.

use std::sync::Arc;

use futures::StreamExt;
use rustc_hash::FxHashMap;
use tokio::sync::watch;

use crate::block::{Block, BlockDirection, BlockId, BlockInput, FileBlockInput};
use crate::error::{Error, Result};
use crate::output::{FileContent, FileError, FileOutput, QueryOutput};
use crate::search::{AggregateSearchResults, SearchOptions, SearchState, strip_comments};
use crate::services::{
    BlockDependencies, FileRangeFetcher, FileRangesRequest, NotebookServices, TransformRequest,
};

/// An in-memory search notebook.
#[derive(Debug)]
pub struct Notebook {
    /// Blocks by id.
    blocks: FxHashMap<BlockId, Block>,
    /// Display order.
    block_order: Vec<BlockId>,
    /// Execution context shared by all query runs.
    dependencies: BlockDependencies,
    services: NotebookServices,
}

impl Notebook {
    /// Create a notebook from initial block inputs, in order.
    ///
    /// Markdown blocks are rendered immediately; query and file blocks are
    /// left without output until they are run.
    pub fn new(
        initial_blocks: Vec<BlockInput>,
        dependencies: BlockDependencies,
        services: NotebookServices,
    ) -> Self {
        let blocks: Vec<Block> = initial_blocks
            .into_iter()
            .map(|input| Block::from_input(BlockId::new(), input))
            .collect();

        let block_order = blocks.iter().map(Block::id).collect();
        let blocks = blocks.into_iter().map(|block| (block.id(), block)).collect();

        let mut notebook = Self {
            blocks,
            block_order,
            dependencies,
            services,
        };
        notebook.render_markdown_blocks();
        notebook
    }

    fn render_markdown_blocks(&mut self) {
        let markdown_ids: Vec<BlockId> = self
            .blocks
            .values()
            .filter(|block| matches!(block, Block::Markdown(_)))
            .map(Block::id)
            .collect();

        for id in markdown_ids {
            self.run_block_by_id(id);
        }
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.block_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.block_order.is_empty()
    }

    /// Block ids in display order.
    pub fn block_ids(&self) -> &[BlockId] {
        &self.block_order
    }

    /// All blocks in display order.
    ///
    /// Fails only if the order references a block that does not exist, which
    /// no mutation path can produce.
    pub fn blocks(&self) -> Result<Vec<&Block>> {
        self.block_order
            .iter()
            .map(|id| self.blocks.get(id).ok_or(Error::MissingBlock(*id)))
            .collect()
    }

    pub fn block_by_id(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    /// Replace a block's input. Output and id are left untouched.
    ///
    /// Unknown ids are ignored. The input must have the block's kind.
    pub fn set_block_input_by_id(&mut self, id: BlockId, input: BlockInput) -> Result<()> {
        let Some(block) = self.blocks.get_mut(&id) else {
            return Ok(());
        };

        match (block, input) {
            (Block::Markdown(block), BlockInput::Markdown(input)) => block.input = input,
            (Block::Query(block), BlockInput::Query(input)) => block.input = input,
            (Block::File(block), BlockInput::File(input)) => block.input = input,
            (block, input) => {
                return Err(Error::BlockTypeMismatch {
                    expected: block.kind(),
                    found: input.kind(),
                });
            }
        }
        Ok(())
    }

    /// Recompute a block's output from its current input.
    ///
    /// Markdown renders synchronously. Query and file blocks get a fresh
    /// output handle whose producer runs on the services' runtime; any
    /// previous handle is replaced but its producer is not cancelled.
    pub fn run_block_by_id(&mut self, id: BlockId) {
        let Some(block) = self.blocks.get_mut(&id) else {
            return;
        };

        match block {
            Block::Markdown(block) => {
                block.output = Some(self.services.markdown.render(&block.input));
            }
            Block::Query(block) => {
                tracing::debug!("Running query block {}", block.id);
                block.output = Some(spawn_query(
                    &self.services,
                    &self.dependencies,
                    &block.input,
                ));
            }
            Block::File(block) => {
                tracing::debug!("Running file block {}", block.id);
                block.output = Some(spawn_file_fetch(&self.services, &block.input));
            }
        }
    }

    /// Remove a block. Unknown ids are ignored.
    pub fn delete_block_by_id(&mut self, id: BlockId) {
        let Some(index) = self.index_of(id) else {
            return;
        };
        self.blocks.remove(&id);
        self.block_order.remove(index);
    }

    /// Insert a new block at `index`, clamped to the end of the notebook.
    pub fn insert_block_at_index(&mut self, index: usize, input: BlockInput) -> Block {
        let block = Block::from_input(BlockId::new(), input);
        self.insert_block(index, block.clone());
        block
    }

    fn insert_block(&mut self, index: usize, block: Block) {
        let index = index.min(self.block_order.len());
        self.block_order.insert(index, block.id());
        self.blocks.insert(block.id(), block);
    }

    /// Copy a block, including its current output, right after the original.
    pub fn duplicate_block_by_id(&mut self, id: BlockId) -> Option<Block> {
        let index = self.index_of(id)?;
        let duplicate = self.blocks.get(&id)?.duplicate_as(BlockId::new());
        self.insert_block(index + 1, duplicate.clone());
        Some(duplicate)
    }

    /// Swap a block with its neighbour in the given direction.
    ///
    /// Does nothing for unknown ids or at the boundary.
    pub fn move_block_by_id(&mut self, id: BlockId, direction: BlockDirection) {
        let Some(index) = self.index_of(id) else {
            return;
        };
        let swap_index = match direction {
            BlockDirection::Up if index > 0 => index - 1,
            BlockDirection::Down if index + 1 < self.block_order.len() => index + 1,
            _ => return,
        };
        self.block_order.swap(index, swap_index);
    }

    pub fn first_block_id(&self) -> Option<BlockId> {
        self.block_order.first().copied()
    }

    pub fn last_block_id(&self) -> Option<BlockId> {
        self.block_order.last().copied()
    }

    pub fn previous_block_id(&self, id: BlockId) -> Option<BlockId> {
        let index = self.index_of(id)?;
        index
            .checked_sub(1)
            .and_then(|previous| self.block_order.get(previous))
            .copied()
    }

    pub fn next_block_id(&self, id: BlockId) -> Option<BlockId> {
        let index = self.index_of(id)?;
        self.block_order.get(index + 1).copied()
    }

    fn index_of(&self, id: BlockId) -> Option<usize> {
        self.block_order.iter().position(|candidate| *candidate == id)
    }
}

/// Start a search for `input` and return the handle observing it.
fn spawn_query(
    services: &NotebookServices,
    dependencies: &BlockDependencies,
    input: &str,
) -> QueryOutput {
    let request = TransformRequest {
        query: strip_comments(input),
        extension_host: Arc::clone(&dependencies.extension_host),
    };
    let mut results = services
        .search
        .execute(request, SearchOptions::notebook_defaults());

    let (tx, rx) = watch::channel(AggregateSearchResults::empty());
    services.runtime.spawn(async move {
        while let Some(snapshot) = results.next().await {
            tx.send_replace(snapshot);
        }
        tx.send_if_modified(|snapshot| {
            if snapshot.state.is_loading() {
                snapshot.state = SearchState::Complete;
                true
            } else {
                false
            }
        });
    });

    QueryOutput::new(rx)
}

/// Start fetching the lines a file block shows and return the handle.
fn spawn_file_fetch(services: &NotebookServices, input: &FileBlockInput) -> FileOutput {
    let request = FileRangesRequest {
        repo_name: input.repository_name.clone(),
        commit_id: input.effective_revision().to_string(),
        file_path: input.file_path.clone(),
        ranges: vec![input.requested_range()],
        disable_timeout: false,
    };
    let fetcher: Arc<dyn FileRangeFetcher> = Arc::clone(&services.files);

    let (tx, rx) = watch::channel(None);
    services.runtime.spawn(async move {
        let content = fetch_first_range(fetcher.as_ref(), request).await;
        tx.send_replace(Some(content));
    });

    FileOutput::new(rx)
}

async fn fetch_first_range(fetcher: &dyn FileRangeFetcher, request: FileRangesRequest) -> FileContent {
    let target = format!(
        "{}@{}/{}",
        request.repo_name, request.commit_id, request.file_path
    );
    match fetcher.fetch_highlighted_file_line_ranges(request).await {
        Ok(ranges) => ranges.into_iter().next().ok_or_else(|| {
            tracing::debug!("No ranges returned for {}", target);
            FileError::not_found()
        }),
        Err(e) => {
            tracing::debug!("Failed to fetch {}: {}", target, e);
            Err(FileError::not_found())
        }
    }
}
