//! Notebook session management.
//!
//! Wraps a [`Notebook`] with the view state a client needs (selection,
//! read-only mode) and relays asynchronous block outputs to subscribers.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use searchbook_core::{
    Block, BlockDependencies, BlockDirection, BlockId, BlockInput, Notebook, NotebookServices,
};
use tokio::runtime::Handle;
use tokio::sync::{RwLock, broadcast, watch};
use tokio::task::JoinHandle;

use crate::error::{ServerError, ServerResult};
use crate::protocol::{BlockState, ClientMessage, OutputSnapshot, ServerMessage};

/// Capacity for the broadcast channel.
/// Query blocks publish a snapshot per batch of matches, so leave headroom.
/// If clients fall behind, older messages will be dropped.
const MESSAGE_CHANNEL_CAPACITY: usize = 256;

/// A notebook session.
pub struct NotebookSession {
    /// The notebook being edited.
    notebook: Notebook,

    /// Currently selected block.
    selected_block_id: Option<BlockId>,

    /// Whether edits are rejected. Running and selecting are still allowed.
    read_only: bool,

    /// Broadcast channel for server messages.
    tx: broadcast::Sender<ServerMessage>,

    /// Tasks relaying block outputs to subscribers, by block.
    ///
    /// Aborting one stops the relay only; the output's producer keeps running.
    forwarders: FxHashMap<BlockId, JoinHandle<()>>,

    /// Runtime the forwarders run on.
    runtime: Handle,
}

/// Thread-safe session handle.
pub type SessionHandle = Arc<RwLock<NotebookSession>>;

impl NotebookSession {
    /// Create a new notebook session.
    pub fn new(
        initial_blocks: Vec<BlockInput>,
        dependencies: BlockDependencies,
        services: NotebookServices,
        read_only: bool,
    ) -> (Self, broadcast::Receiver<ServerMessage>) {
        let (tx, rx) = broadcast::channel(MESSAGE_CHANNEL_CAPACITY);
        let runtime = services.runtime.clone();
        let notebook = Notebook::new(initial_blocks, dependencies, services);

        tracing::info!(
            "Created notebook session with {} blocks{}",
            notebook.len(),
            if read_only { " (read-only)" } else { "" }
        );

        let session = Self {
            notebook,
            selected_block_id: None,
            read_only,
            tx,
            forwarders: FxHashMap::default(),
            runtime,
        };

        (session, rx)
    }

    /// The underlying notebook.
    pub fn notebook(&self) -> &Notebook {
        &self.notebook
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn selected_block_id(&self) -> Option<BlockId> {
        self.selected_block_id
    }

    /// Subscribe to server messages.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.tx.subscribe()
    }

    /// Broadcast a server message, ignoring send failures.
    pub fn broadcast(&self, msg: ServerMessage) {
        let _ = self.tx.send(msg);
    }

    /// Full notebook state.
    pub fn get_state(&self) -> ServerResult<ServerMessage> {
        let blocks = self
            .notebook
            .blocks()?
            .into_iter()
            .map(BlockState::from_block)
            .collect();

        Ok(ServerMessage::NotebookState {
            blocks,
            selected_block_id: self.selected_block_id,
            read_only: self.read_only,
        })
    }

    fn broadcast_state(&self) -> ServerResult<()> {
        let state = self.get_state()?;
        self.broadcast(state);
        Ok(())
    }

    fn ensure_writable(&self) -> ServerResult<()> {
        if self.read_only {
            return Err(ServerError::ReadOnly);
        }
        Ok(())
    }

    /// Apply a client message. Returns a reply meant for the sender only.
    pub fn handle_message(&mut self, msg: ClientMessage) -> ServerResult<Option<ServerMessage>> {
        match msg {
            ClientMessage::GetState => return self.get_state().map(Some),
            ClientMessage::SetBlockInput { block_id, input } => {
                self.set_block_input(block_id, input)?
            }
            ClientMessage::RunBlock { block_id } => self.run_block(block_id)?,
            ClientMessage::DeleteBlock { block_id } => self.delete_block(block_id)?,
            ClientMessage::InsertBlock { index, input } => {
                self.insert_block(index, input)?;
            }
            ClientMessage::DuplicateBlock { block_id } => {
                self.duplicate_block(block_id)?;
            }
            ClientMessage::MoveBlock {
                block_id,
                direction,
            } => self.move_block(block_id, direction)?,
            ClientMessage::SelectBlock { block_id } => self.select_block(block_id),
            ClientMessage::MoveBlockSelection {
                block_id,
                direction,
            } => self.move_block_selection(block_id, direction),
        }
        Ok(None)
    }

    /// Replace a block's input.
    pub fn set_block_input(&mut self, block_id: BlockId, input: BlockInput) -> ServerResult<()> {
        self.ensure_writable()?;
        self.notebook.set_block_input_by_id(block_id, input)?;
        self.broadcast_state()
    }

    /// Run a block and start relaying its output.
    pub fn run_block(&mut self, block_id: BlockId) -> ServerResult<()> {
        self.notebook.run_block_by_id(block_id);

        match self.notebook.block_by_id(block_id) {
            Some(Block::Markdown(block)) => {
                if let Some(html) = block.output.clone() {
                    self.broadcast(ServerMessage::BlockOutput {
                        block_id,
                        output: OutputSnapshot::Markdown { html },
                    });
                }
            }
            Some(_) => self.watch_output(block_id),
            None => {}
        }
        Ok(())
    }

    /// Delete a block, dropping the selection if it pointed there.
    pub fn delete_block(&mut self, block_id: BlockId) -> ServerResult<()> {
        self.ensure_writable()?;
        self.notebook.delete_block_by_id(block_id);
        self.stop_forwarder(block_id);

        if self.selected_block_id == Some(block_id) {
            self.selected_block_id = None;
        }
        self.broadcast_state()
    }

    /// Insert a new block and return its id.
    pub fn insert_block(&mut self, index: usize, input: BlockInput) -> ServerResult<BlockId> {
        self.ensure_writable()?;
        let block = self.notebook.insert_block_at_index(index, input);
        self.broadcast_state()?;
        Ok(block.id())
    }

    /// Duplicate a block and return the copy's id.
    pub fn duplicate_block(&mut self, block_id: BlockId) -> ServerResult<BlockId> {
        self.ensure_writable()?;
        let duplicate = self
            .notebook
            .duplicate_block_by_id(block_id)
            .ok_or(ServerError::BlockNotFound(block_id))?;

        // The copy shares the source's output; relay it under the new id too.
        if matches!(duplicate, Block::Query(_) | Block::File(_)) && duplicate.has_output() {
            self.watch_output(duplicate.id());
        }
        self.broadcast_state()?;
        Ok(duplicate.id())
    }

    /// Swap a block with its neighbour.
    pub fn move_block(&mut self, block_id: BlockId, direction: BlockDirection) -> ServerResult<()> {
        self.ensure_writable()?;
        self.notebook.move_block_by_id(block_id, direction);
        self.broadcast_state()
    }

    /// Select a block, or clear the selection with `None`.
    ///
    /// Unknown ids are ignored.
    pub fn select_block(&mut self, block_id: Option<BlockId>) {
        let known = block_id.is_none_or(|id| self.notebook.block_by_id(id).is_some());
        if known {
            self.set_selection(block_id);
        }
    }

    /// Select the block before or after `block_id`. Stays put at a boundary.
    pub fn move_block_selection(&mut self, block_id: BlockId, direction: BlockDirection) {
        let target = match direction {
            BlockDirection::Up => self.notebook.previous_block_id(block_id),
            BlockDirection::Down => self.notebook.next_block_id(block_id),
        };
        if let Some(target) = target {
            self.set_selection(Some(target));
        }
    }

    fn set_selection(&mut self, block_id: Option<BlockId>) {
        if self.selected_block_id == block_id {
            return;
        }
        self.selected_block_id = block_id;
        self.broadcast(ServerMessage::SelectionChanged {
            selected_block_id: block_id,
        });
    }

    /// Relay a query or file block's output until it settles.
    fn watch_output(&mut self, block_id: BlockId) {
        self.stop_forwarder(block_id);

        let tx = self.tx.clone();
        let forwarder = match self.notebook.block_by_id(block_id) {
            Some(Block::Query(block)) => match &block.output {
                Some(output) => self.runtime.spawn(forward_output(
                    block_id,
                    output.subscribe(),
                    tx,
                    |results| OutputSnapshot::Query {
                        results: results.clone(),
                    },
                )),
                None => return,
            },
            Some(Block::File(block)) => match &block.output {
                Some(output) => self.runtime.spawn(forward_output(
                    block_id,
                    output.subscribe(),
                    tx,
                    |content| match content {
                        None => OutputSnapshot::FilePending,
                        Some(Ok(lines)) => OutputSnapshot::File {
                            lines: lines.clone(),
                        },
                        Some(Err(e)) => OutputSnapshot::FileError {
                            message: e.message.clone(),
                        },
                    },
                )),
                None => return,
            },
            _ => return,
        };

        self.forwarders.insert(block_id, forwarder);
    }

    fn stop_forwarder(&mut self, block_id: BlockId) {
        if let Some(forwarder) = self.forwarders.remove(&block_id) {
            forwarder.abort();
        }
    }
}

impl Drop for NotebookSession {
    fn drop(&mut self) {
        for (_, forwarder) in self.forwarders.drain() {
            forwarder.abort();
        }
    }
}

/// Broadcast every value the output publishes until it settles or its
/// producer goes away.
async fn forward_output<T>(
    block_id: BlockId,
    mut rx: watch::Receiver<T>,
    tx: broadcast::Sender<ServerMessage>,
    snapshot: fn(&T) -> OutputSnapshot,
) {
    loop {
        let output = snapshot(&rx.borrow_and_update());
        let settled = output.is_settled();
        let _ = tx.send(ServerMessage::BlockOutput { block_id, output });
        if settled || rx.changed().await.is_err() {
            break;
        }
    }
}
