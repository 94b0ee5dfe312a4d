//! WebSocket protocol messages for Searchbook server.
//!
//! Defines the message types exchanged between client and server.

use searchbook_core::{
    AggregateSearchResults, Block, BlockDirection, BlockId, BlockInput, FileOutput, QueryOutput,
};
use serde::{Deserialize, Serialize};

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Request current notebook state.
    GetState,

    /// Replace a block's input.
    SetBlockInput {
        /// Block to update.
        block_id: BlockId,
        /// New input; must match the block's kind.
        input: BlockInput,
    },

    /// Run a block, replacing its output.
    RunBlock {
        /// Block to run.
        block_id: BlockId,
    },

    /// Delete a block.
    DeleteBlock {
        /// Block to delete.
        block_id: BlockId,
    },

    /// Insert a new block.
    InsertBlock {
        /// Position in display order. Clamped to the end.
        index: usize,
        /// Input of the new block.
        input: BlockInput,
    },

    /// Duplicate a block right after itself.
    DuplicateBlock {
        /// Block to duplicate.
        block_id: BlockId,
    },

    /// Move a block up or down.
    MoveBlock {
        /// Block to move.
        block_id: BlockId,
        /// Direction to move.
        direction: BlockDirection,
    },

    /// Select a block, or clear the selection.
    SelectBlock {
        /// Block to select. None = clear.
        block_id: Option<BlockId>,
    },

    /// Move the selection to the neighbouring block.
    MoveBlockSelection {
        /// Block the selection starts from.
        block_id: BlockId,
        /// Direction to move.
        direction: BlockDirection,
    },
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full notebook state (sent on connection and after every edit).
    NotebookState {
        /// Blocks in display order.
        blocks: Vec<BlockState>,
        /// Currently selected block.
        selected_block_id: Option<BlockId>,
        /// Whether edits are rejected.
        read_only: bool,
    },

    /// A block's output changed.
    BlockOutput {
        /// Block whose output changed.
        block_id: BlockId,
        /// New output.
        output: OutputSnapshot,
    },

    /// The selection changed.
    SelectionChanged {
        /// Newly selected block. None = nothing selected.
        selected_block_id: Option<BlockId>,
    },

    /// A request failed.
    Error {
        /// Error message.
        message: String,
    },
}

/// State of a single block for clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockState {
    /// Block identifier.
    pub id: BlockId,
    /// Kind-tagged input.
    pub input: BlockInput,
    /// Current output. None = never run.
    pub output: Option<OutputSnapshot>,
}

impl BlockState {
    /// Snapshot a block.
    pub fn from_block(block: &Block) -> Self {
        Self {
            id: block.id(),
            input: block.input(),
            output: OutputSnapshot::from_block(block),
        }
    }
}

/// Point-in-time view of a block's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputSnapshot {
    /// Rendered markdown.
    Markdown { html: String },
    /// Search results aggregated so far.
    Query { results: AggregateSearchResults },
    /// File fetch still in flight.
    FilePending,
    /// Lines of the requested range.
    File { lines: Vec<String> },
    /// File could not be fetched.
    FileError { message: String },
}

impl OutputSnapshot {
    /// Snapshot a block's output, if it has been run.
    pub fn from_block(block: &Block) -> Option<Self> {
        match block {
            Block::Markdown(block) => block.output.clone().map(|html| Self::Markdown { html }),
            Block::Query(block) => block.output.as_ref().map(Self::from_query),
            Block::File(block) => block.output.as_ref().map(Self::from_file),
        }
    }

    pub fn from_query(output: &QueryOutput) -> Self {
        Self::Query {
            results: output.current(),
        }
    }

    pub fn from_file(output: &FileOutput) -> Self {
        match output.current() {
            None => Self::FilePending,
            Some(Ok(lines)) => Self::File { lines },
            Some(Err(e)) => Self::FileError { message: e.message },
        }
    }

    /// Whether the output can still change without a re-run.
    pub fn is_settled(&self) -> bool {
        match self {
            Self::Query { results } => !results.state.is_loading(),
            Self::FilePending => false,
            _ => true,
        }
    }
}
