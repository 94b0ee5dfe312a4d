//! Integration tests for protocol message serialization.
//!
//! Clients speak JSON; these pin the wire shape of each message family.

use searchbook_core::{
    AggregateSearchResults, Block, BlockDirection, BlockId, BlockInput, FileBlockInput, LineRange,
    MarkdownBlock, SearchState,
};
use searchbook_server::protocol::*;

#[test]
fn test_client_messages_parse() {
    let id = BlockId::new();

    let msg: ClientMessage = serde_json::from_str(&format!(
        r#"{{"type":"set_block_input","block_id":"{id}","input":{{"type":"query","input":"repo:x foo"}}}}"#
    ))
    .unwrap();
    match msg {
        ClientMessage::SetBlockInput { block_id, input } => {
            assert_eq!(block_id, id);
            assert_eq!(input, BlockInput::Query("repo:x foo".to_string()));
        }
        other => panic!("Expected SetBlockInput, got {:?}", other),
    }

    let msg: ClientMessage = serde_json::from_str(
        r#"{"type":"insert_block","index":2,"input":{"type":"file","input":{"repository_name":"r","file_path":"src/main.rs","line_range":{"start_line":1,"end_line":4}}}}"#,
    )
    .unwrap();
    match msg {
        ClientMessage::InsertBlock { index, input } => {
            assert_eq!(index, 2);
            assert_eq!(
                input,
                BlockInput::File(FileBlockInput {
                    repository_name: "r".to_string(),
                    revision: String::new(),
                    file_path: "src/main.rs".to_string(),
                    line_range: Some(LineRange::new(1, 4)),
                })
            );
        }
        other => panic!("Expected InsertBlock, got {:?}", other),
    }

    let msg: ClientMessage = serde_json::from_str(&format!(
        r#"{{"type":"move_block","block_id":"{id}","direction":"down"}}"#
    ))
    .unwrap();
    assert!(matches!(
        msg,
        ClientMessage::MoveBlock {
            direction: BlockDirection::Down,
            ..
        }
    ));

    let msg: ClientMessage =
        serde_json::from_str(r#"{"type":"select_block","block_id":null}"#).unwrap();
    assert!(matches!(msg, ClientMessage::SelectBlock { block_id: None }));

    let msg: ClientMessage = serde_json::from_str(r#"{"type":"get_state"}"#).unwrap();
    assert!(matches!(msg, ClientMessage::GetState));
}

#[test]
fn test_all_client_messages_serialize() {
    let id = BlockId::new();
    let messages = vec![
        ClientMessage::GetState,
        ClientMessage::SetBlockInput {
            block_id: id,
            input: BlockInput::Markdown("# Notes".to_string()),
        },
        ClientMessage::RunBlock { block_id: id },
        ClientMessage::DeleteBlock { block_id: id },
        ClientMessage::InsertBlock {
            index: 0,
            input: BlockInput::Query("foo".to_string()),
        },
        ClientMessage::DuplicateBlock { block_id: id },
        ClientMessage::MoveBlock {
            block_id: id,
            direction: BlockDirection::Up,
        },
        ClientMessage::SelectBlock { block_id: Some(id) },
        ClientMessage::MoveBlockSelection {
            block_id: id,
            direction: BlockDirection::Down,
        },
    ];

    let expected_types = [
        "get_state",
        "set_block_input",
        "run_block",
        "delete_block",
        "insert_block",
        "duplicate_block",
        "move_block",
        "select_block",
        "move_block_selection",
    ];

    for (msg, expected) in messages.iter().zip(expected_types) {
        let json = serde_json::to_value(msg).unwrap();
        assert_eq!(json["type"], expected);

        // Every message must survive a trip through the wire.
        let text = serde_json::to_string(msg).unwrap();
        let _: ClientMessage = serde_json::from_str(&text)
            .unwrap_or_else(|e| panic!("Failed to parse {}: {}", text, e));
    }
}

#[test]
fn test_notebook_state_shape() {
    let block = Block::Markdown(MarkdownBlock {
        id: BlockId::new(),
        input: "# Title".to_string(),
        output: Some("<h1>Title</h1>\n".to_string()),
    });
    let unrun = Block::from_input(BlockId::new(), BlockInput::Query("foo".to_string()));

    let msg = ServerMessage::NotebookState {
        blocks: vec![BlockState::from_block(&block), BlockState::from_block(&unrun)],
        selected_block_id: Some(block.id()),
        read_only: true,
    };

    let json = serde_json::to_value(&msg).unwrap();
    assert_eq!(json["type"], "notebook_state");
    assert_eq!(json["read_only"], true);
    assert_eq!(json["selected_block_id"], block.id().to_string());

    let blocks = json["blocks"].as_array().unwrap();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0]["id"], block.id().to_string());
    assert_eq!(blocks[0]["input"]["type"], "md");
    assert_eq!(blocks[0]["input"]["input"], "# Title");
    assert_eq!(blocks[0]["output"]["kind"], "markdown");
    assert_eq!(blocks[0]["output"]["html"], "<h1>Title</h1>\n");
    assert_eq!(blocks[1]["input"]["type"], "query");
    assert!(blocks[1]["output"].is_null());
}

#[test]
fn test_output_snapshot_shapes() {
    let json = serde_json::to_value(OutputSnapshot::FilePending).unwrap();
    assert_eq!(json, serde_json::json!({ "kind": "file_pending" }));

    let json = serde_json::to_value(OutputSnapshot::File {
        lines: vec!["fn main() {}".to_string()],
    })
    .unwrap();
    assert_eq!(json["kind"], "file");
    assert_eq!(json["lines"][0], "fn main() {}");

    let json = serde_json::to_value(OutputSnapshot::FileError {
        message: "File not found".to_string(),
    })
    .unwrap();
    assert_eq!(json["kind"], "file_error");
    assert_eq!(json["message"], "File not found");

    let json = serde_json::to_value(OutputSnapshot::Query {
        results: AggregateSearchResults::empty(),
    })
    .unwrap();
    assert_eq!(json["kind"], "query");
    assert_eq!(json["results"]["state"]["state"], "loading");
    assert!(json["results"]["results"].as_array().unwrap().is_empty());
}

#[test]
fn test_output_snapshot_settled() {
    let mut results = AggregateSearchResults::empty();
    assert!(!OutputSnapshot::Query {
        results: results.clone()
    }
    .is_settled());

    results.state = SearchState::Complete;
    assert!(OutputSnapshot::Query {
        results: results.clone()
    }
    .is_settled());

    results.state = SearchState::Error("boom".to_string());
    assert!(OutputSnapshot::Query { results }.is_settled());

    assert!(!OutputSnapshot::FilePending.is_settled());
    assert!(OutputSnapshot::File { lines: Vec::new() }.is_settled());
    assert!(
        OutputSnapshot::Markdown {
            html: String::new()
        }
        .is_settled()
    );
}

#[test]
fn test_server_messages_serialize() {
    let id = BlockId::new();

    let json = serde_json::to_value(ServerMessage::SelectionChanged {
        selected_block_id: None,
    })
    .unwrap();
    assert_eq!(json["type"], "selection_changed");
    assert!(json["selected_block_id"].is_null());

    let json = serde_json::to_value(ServerMessage::BlockOutput {
        block_id: id,
        output: OutputSnapshot::FilePending,
    })
    .unwrap();
    assert_eq!(json["type"], "block_output");
    assert_eq!(json["block_id"], id.to_string());
    assert_eq!(json["output"]["kind"], "file_pending");

    let json = serde_json::to_value(ServerMessage::Error {
        message: "Notebook is read-only".to_string(),
    })
    .unwrap();
    assert_eq!(json["type"], "error");
    assert_eq!(json["message"], "Notebook is read-only");
}
