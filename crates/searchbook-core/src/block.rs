//! Block types for the notebook model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::output::{FileOutput, QueryOutput};

/// Last line index used to request an entire file.
pub const MAX_LINE: u32 = 2_147_483_647;

/// Revision used when a file block does not name one.
pub const DEFAULT_REVISION: &str = "HEAD";

/// Unique identifier for a block within a notebook.
///
/// Assigned once at creation and never reused. Survives reordering; a
/// duplicated block always receives a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(Uuid);

impl BlockId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BlockId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for BlockId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Kind of a block. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    /// Markdown text rendered to HTML.
    #[serde(rename = "md")]
    Markdown,
    /// Search query executed against the search backend.
    #[serde(rename = "query")]
    Query,
    /// Snippet of a file at a revision.
    #[serde(rename = "file")]
    File,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Query => "query",
            Self::File => "file",
        }
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line range within a file, 0-based with an exclusive end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub start_line: u32,
    pub end_line: u32,
}

impl LineRange {
    /// Sentinel range covering the whole file.
    pub const ENTIRE_FILE: LineRange = LineRange {
        start_line: 0,
        end_line: MAX_LINE,
    };

    pub fn new(start_line: u32, end_line: u32) -> Self {
        Self {
            start_line,
            end_line,
        }
    }

    pub fn is_entire_file(&self) -> bool {
        *self == Self::ENTIRE_FILE
    }
}

/// Reference to a file (or part of one) shown by a file block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBlockInput {
    pub repository_name: String,
    /// Revision to read; empty means `HEAD`.
    #[serde(default)]
    pub revision: String,
    pub file_path: String,
    /// Lines to show; `None` shows the whole file.
    #[serde(default)]
    pub line_range: Option<LineRange>,
}

impl FileBlockInput {
    /// The revision to fetch, falling back to `HEAD`.
    pub fn effective_revision(&self) -> &str {
        if self.revision.is_empty() {
            DEFAULT_REVISION
        } else {
            &self.revision
        }
    }

    /// The range to fetch, falling back to the whole file.
    pub fn requested_range(&self) -> LineRange {
        self.line_range.unwrap_or(LineRange::ENTIRE_FILE)
    }
}

/// Kind-tagged input used to create a block or replace its input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "input")]
pub enum BlockInput {
    #[serde(rename = "md")]
    Markdown(String),
    #[serde(rename = "query")]
    Query(String),
    #[serde(rename = "file")]
    File(FileBlockInput),
}

impl BlockInput {
    pub fn kind(&self) -> BlockKind {
        match self {
            Self::Markdown(_) => BlockKind::Markdown,
            Self::Query(_) => BlockKind::Query,
            Self::File(_) => BlockKind::File,
        }
    }
}

/// Direction for moving a block or the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockDirection {
    /// Towards the start of the notebook.
    Up,
    /// Towards the end of the notebook.
    Down,
}

/// Markdown block. Output is the rendered HTML.
#[derive(Debug, Clone)]
pub struct MarkdownBlock {
    pub id: BlockId,
    pub input: String,
    pub output: Option<String>,
}

/// Search query block. Output is a live handle on aggregated results.
#[derive(Debug, Clone)]
pub struct QueryBlock {
    pub id: BlockId,
    pub input: String,
    pub output: Option<QueryOutput>,
}

/// File snippet block. Output resolves once to the requested lines.
#[derive(Debug, Clone)]
pub struct FileBlock {
    pub id: BlockId,
    pub input: FileBlockInput,
    pub output: Option<FileOutput>,
}

/// A notebook block.
#[derive(Debug, Clone)]
pub enum Block {
    Markdown(MarkdownBlock),
    Query(QueryBlock),
    File(FileBlock),
}

impl Block {
    /// Create a block with no output from the given input.
    pub fn from_input(id: BlockId, input: BlockInput) -> Self {
        match input {
            BlockInput::Markdown(input) => Self::Markdown(MarkdownBlock {
                id,
                input,
                output: None,
            }),
            BlockInput::Query(input) => Self::Query(QueryBlock {
                id,
                input,
                output: None,
            }),
            BlockInput::File(input) => Self::File(FileBlock {
                id,
                input,
                output: None,
            }),
        }
    }

    pub fn id(&self) -> BlockId {
        match self {
            Self::Markdown(block) => block.id,
            Self::Query(block) => block.id,
            Self::File(block) => block.id,
        }
    }

    pub fn kind(&self) -> BlockKind {
        match self {
            Self::Markdown(_) => BlockKind::Markdown,
            Self::Query(_) => BlockKind::Query,
            Self::File(_) => BlockKind::File,
        }
    }

    /// A copy of the block's current input.
    pub fn input(&self) -> BlockInput {
        match self {
            Self::Markdown(block) => BlockInput::Markdown(block.input.clone()),
            Self::Query(block) => BlockInput::Query(block.input.clone()),
            Self::File(block) => BlockInput::File(block.input.clone()),
        }
    }

    /// Whether the block has been run at least once.
    pub fn has_output(&self) -> bool {
        match self {
            Self::Markdown(block) => block.output.is_some(),
            Self::Query(block) => block.output.is_some(),
            Self::File(block) => block.output.is_some(),
        }
    }

    /// Copy input and output verbatim under a new id.
    ///
    /// Output handles are shared with the source, not recomputed.
    pub(crate) fn duplicate_as(&self, id: BlockId) -> Self {
        let mut copy = self.clone();
        match &mut copy {
            Self::Markdown(block) => block.id = id,
            Self::Query(block) => block.id = id,
            Self::File(block) => block.id = id,
        }
        copy
    }
}
