//! End-to-end scenarios through the public parser and handler surface.

use agent_stream::{
    JsonDialect, ParserConfig, SegmentEventType, SegmentType, Strategy, StreamingParser,
    StreamingResponseHandler, collect_segments,
};
use serde_json::json;

#[test]
fn test_plain_text_across_two_chunks() {
    let mut handler = StreamingResponseHandler::new(None, Some("xml")).unwrap();

    handler.feed("Hello, ").unwrap();
    handler.feed("world!").unwrap();
    handler.finalize().unwrap();

    let segments = collect_segments(handler.all_events());
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].segment_type, SegmentType::Text);
    assert_eq!(segments[0].content, "Hello, world!");
    assert!(handler.all_invocations().is_empty());
}

#[test]
fn test_write_file_with_sentinel_payload() {
    let input = "pre<tool name=\"write_file\"><arguments><arg name=\"path\">/a.py</arg><arg name=\"content\">__START_CONTENT__\nprint('<x>')\n__END_CONTENT__</arg></arguments></tool>post";

    let mut handler = StreamingResponseHandler::new(None, Some("xml")).unwrap();
    handler.feed(input).unwrap();
    handler.finalize().unwrap();

    let segments = collect_segments(handler.all_events());
    assert_eq!(segments.len(), 3);

    assert_eq!(segments[0].segment_type, SegmentType::Text);
    assert_eq!(segments[0].content, "pre");

    let file_seg = &segments[1];
    assert_eq!(file_seg.segment_type, SegmentType::WriteFile);
    assert_eq!(file_seg.metadata["path"], json!("/a.py"));
    assert_eq!(file_seg.content, "print('<x>')\n");
    assert_eq!(
        file_seg.metadata["arguments"],
        json!({"path": "/a.py", "content": "print('<x>')\n"})
    );

    assert_eq!(segments[2].segment_type, SegmentType::Text);
    assert_eq!(segments[2].content, "post");

    let invocations = handler.all_invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].name, "write_file");
    assert_eq!(invocations[0].arguments["path"], json!("/a.py"));
    assert_eq!(invocations[0].arguments["content"], json!("print('<x>')\n"));
    // Cross-system invariant: the invocation id is the segment id.
    assert_eq!(invocations[0].id, file_seg.id);
}

#[test]
fn test_false_end_sentinel_survives_verbatim() {
    let input = "<tool name=\"write_file\"><arguments><arg name=\"path\">/n.py</arg><arg name=\"content\">__START_CONTENT__\n# do not remove __END_CONTENT__ marker\ndone\n__END_CONTENT__</arg></arguments></tool>";

    let mut handler = StreamingResponseHandler::new(None, Some("xml")).unwrap();
    handler.feed(input).unwrap();
    handler.finalize().unwrap();

    let invocations = handler.all_invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(
        invocations[0].arguments["content"],
        json!("# do not remove __END_CONTENT__ marker\ndone\n")
    );
}

#[test]
fn test_openai_json_tool_in_five_byte_chunks() {
    let input = r#"{"tool_calls":[{"function":{"name":"weather","arguments":"{\"city\":\"NYC\"}"}}]}"#;

    let config = ParserConfig::builder()
        .json_dialect(JsonDialect::OpenAi)
        .build()
        .unwrap();
    let mut handler = StreamingResponseHandler::new(Some(config), Some("json")).unwrap();

    for chunk in input.as_bytes().chunks(5) {
        handler.feed(std::str::from_utf8(chunk).unwrap()).unwrap();
    }
    handler.finalize().unwrap();

    let invocations = handler.all_invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].name, "weather");
    assert_eq!(invocations[0].arguments["city"], json!("NYC"));
}

#[test]
fn test_sentinel_framed_terminal_command() {
    let input = "[[SEG_START {\"type\":\"run_terminal_cmd\"}]]echo hi[[SEG_END]]";

    let mut handler = StreamingResponseHandler::new(None, Some("sentinel")).unwrap();
    handler.feed(input).unwrap();
    handler.finalize().unwrap();

    let segments = collect_segments(handler.all_events());
    let cmd = segments
        .iter()
        .find(|s| s.segment_type == SegmentType::RunTerminalCmd)
        .unwrap();
    assert_eq!(cmd.content, "echo hi");

    let invocations = handler.all_invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].name, "execute_bash");
    assert_eq!(invocations[0].arguments["command"], json!("echo hi"));
    assert_eq!(invocations[0].id, cmd.id);
}

#[test]
fn test_malformed_tag_swallowed_to_text() {
    let mut handler = StreamingResponseHandler::new(None, Some("xml")).unwrap();
    handler.feed("<foobar>stuff</foobar>").unwrap();
    handler.finalize().unwrap();

    let segments = collect_segments(handler.all_events());
    let text: String = segments
        .iter()
        .filter(|s| s.segment_type == SegmentType::Text)
        .map(|s| s.content.as_str())
        .collect();
    assert_eq!(text, "<foobar>stuff</foobar>");
    assert!(handler.all_invocations().is_empty());
}

#[test]
fn test_generic_tool_argument_streaming_phases() {
    let input = "<tool name=\"search\"><arguments><arg name=\"query\">streaming parsers</arg></arguments></tool>";

    let mut parser = StreamingParser::new(ParserConfig::default());
    let events = parser.feed_and_finalize(input).unwrap();

    // One invocation-shaped END with assembled arguments.
    let end = events
        .iter()
        .find(|e| e.event_type == SegmentEventType::End)
        .unwrap();
    assert_eq!(
        end.metadata().unwrap()["arguments"],
        json!({"query": "streaming parsers"})
    );

    // arg_state start/delta/end all carry the argument name.
    let phases: Vec<_> = events
        .iter()
        .filter(|e| e.payload.arg_name.as_deref() == Some("query"))
        .filter_map(|e| e.payload.arg_state)
        .collect();
    assert_eq!(phases.len(), 3);
}

#[test]
fn test_iframe_document_between_text() {
    let input = "look: <!doctype html><body>hi</body></html> done";

    let mut handler = StreamingResponseHandler::new(None, Some("xml")).unwrap();
    handler.feed(input).unwrap();
    handler.finalize().unwrap();

    let segments = collect_segments(handler.all_events());
    assert_eq!(segments.len(), 3);
    assert_eq!(segments[1].segment_type, SegmentType::Iframe);
    assert_eq!(segments[1].content, "<!doctype html><body>hi</body></html>");
    assert_eq!(segments[2].content, " done");
    assert!(handler.all_invocations().is_empty());
}

#[test]
fn test_native_variant_passes_tool_markup_through() {
    let input = "<tool name=\"write_file\"><arguments></arguments></tool>";

    let mut handler = StreamingResponseHandler::new(None, Some("native")).unwrap();
    handler.feed(input).unwrap();
    handler.finalize().unwrap();

    let segments = collect_segments(handler.all_events());
    let text: String = segments
        .iter()
        .filter(|s| s.segment_type == SegmentType::Text)
        .map(|s| s.content.as_str())
        .collect();
    assert_eq!(text, input);
    assert!(handler.all_invocations().is_empty());
}

#[test]
fn test_multiple_tools_in_one_stream() {
    let input = "a<tool name=\"run_terminal_cmd\"><arguments><arg name=\"command\">ls</arg></arguments></tool>b<tool name=\"search\"><arguments><arg name=\"q\">x</arg></arguments></tool>c";

    let mut handler = StreamingResponseHandler::new(None, Some("xml")).unwrap();
    handler.feed(input).unwrap();
    handler.finalize().unwrap();

    let invocations = handler.all_invocations();
    assert_eq!(invocations.len(), 2);
    assert_eq!(invocations[0].name, "execute_bash");
    assert_eq!(invocations[1].name, "search");

    let segments = collect_segments(handler.all_events());
    let text: String = segments
        .iter()
        .filter(|s| s.segment_type == SegmentType::Text)
        .map(|s| s.content.as_str())
        .collect();
    assert_eq!(text, "abc");
}

#[test]
fn test_multibyte_content_round_trips() {
    let input = "héllo <tool name=\"write_file\"><arguments><arg name=\"path\">/ü.txt</arg><arg name=\"content\">__START_CONTENT__\nwörld → ✓ done\n__END_CONTENT__</arg></arguments></tool> après";

    // Chunk at char boundaries of varying byte widths.
    let chars: Vec<char> = input.chars().collect();
    for size in [1, 3, 7] {
        let mut handler = StreamingResponseHandler::new(None, Some("xml")).unwrap();
        for chunk in chars.chunks(size) {
            let chunk: String = chunk.iter().collect();
            handler.feed(&chunk).unwrap();
        }
        handler.finalize().unwrap();

        let invocations = handler.all_invocations();
        assert_eq!(invocations.len(), 1, "chunk size {size}");
        assert_eq!(
            invocations[0].arguments["content"],
            json!("wörld → ✓ done\n"),
            "chunk size {size}"
        );

        let segments = collect_segments(handler.all_events());
        let text: String = segments
            .iter()
            .filter(|s| s.segment_type == SegmentType::Text)
            .map(|s| s.content.as_str())
            .collect();
        assert_eq!(text, "héllo  après", "chunk size {size}");
    }
}

#[test]
fn test_sentinel_strategy_via_builder() {
    let config = ParserConfig::builder()
        .strategy_order(vec![Strategy::Sentinel])
        .segment_id_prefix("turn7_")
        .build()
        .unwrap();

    let mut parser = StreamingParser::new(config);
    let events = parser
        .feed_and_finalize("[[SEG_START {\"type\":\"reasoning\"}]]let me think[[SEG_END]]")
        .unwrap();

    let segments = collect_segments(&events);
    assert_eq!(segments[0].segment_type, SegmentType::Reasoning);
    assert_eq!(segments[0].content, "let me think");
    assert!(segments[0].id.starts_with("turn7_seg_"));
}
