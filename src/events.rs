//! Core data model: segments, segment lifecycle events, and tool invocations.
//!
//! The parser classifies the incoming character stream into *segments* and
//! describes each segment's lifecycle with exactly three event kinds:
//!
//! ```text
//! SEGMENT_START ──► SEGMENT_CONTENT (0..n) ──► SEGMENT_END
//! ```
//!
//! Events serialize to a transport-agnostic JSON shape:
//!
//! ```json
//! {
//!   "type": "SEGMENT_CONTENT",
//!   "segment_id": "seg_3",
//!   "payload": { "delta": "print('hi')", "arg_name": "content", "arg_state": "delta" }
//! }
//! ```
//!
//! `segment_type` is present only on START events. Tool-bearing segments are
//! additionally surfaced as [`ToolInvocation`] values by the adapter; the
//! invocation id *is* the segment id, so the UI event stream and the
//! execution queue share one identifier.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata map attached to segment START/END events.
pub type Metadata = serde_json::Map<String, Value>;

// ============================================================================
// SEGMENT CLASSIFICATION
// ============================================================================

/// Types of content segments that can be parsed from LLM responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentType {
    /// Plain prose between recognized markup.
    Text,
    /// A generic tool call (XML `<tool>` block or JSON tool object).
    ToolCall,
    /// A file write streamed through the `write_file` specialization.
    WriteFile,
    /// A patch/edit streamed through the `patch_file` specialization.
    PatchFile,
    /// A terminal command streamed through the `run_terminal_cmd` specialization.
    RunTerminalCmd,
    /// An HTML preview block (`<!doctype html>…</html>`).
    Iframe,
    /// Model reasoning delivered out-of-band (e.g. via sentinel framing).
    Reasoning,
}

impl SegmentType {
    /// The wire value used in serialized events and sentinel headers.
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentType::Text => "text",
            SegmentType::ToolCall => "tool_call",
            SegmentType::WriteFile => "write_file",
            SegmentType::PatchFile => "patch_file",
            SegmentType::RunTerminalCmd => "run_terminal_cmd",
            SegmentType::Iframe => "iframe",
            SegmentType::Reasoning => "reasoning",
        }
    }

    /// Parse a wire value back into a segment type.
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "text" => Some(SegmentType::Text),
            "tool_call" => Some(SegmentType::ToolCall),
            "write_file" => Some(SegmentType::WriteFile),
            "patch_file" => Some(SegmentType::PatchFile),
            "run_terminal_cmd" => Some(SegmentType::RunTerminalCmd),
            "iframe" => Some(SegmentType::Iframe),
            "reasoning" => Some(SegmentType::Reasoning),
            _ => None,
        }
    }
}

// ============================================================================
// EVENT KINDS
// ============================================================================

/// Lifecycle stage of a segment event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentEventType {
    #[serde(rename = "SEGMENT_START")]
    Start,
    #[serde(rename = "SEGMENT_CONTENT")]
    Content,
    #[serde(rename = "SEGMENT_END")]
    End,
}

/// Boundary state for streamed tool arguments.
///
/// CONTENT events inside a `<tool>` block carry the argument name they belong
/// to plus one of these phases, so a consumer can render per-argument streams
/// without re-parsing the XML scaffolding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgPhase {
    Start,
    Delta,
    End,
}

/// Payload carried by a segment event.
///
/// START events fill `metadata`; CONTENT events fill `delta` (plus the
/// optional argument context); END events fill `metadata` with the final map
/// the consumer merges over the START metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arg_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arg_state: Option<ArgPhase>,
}

/// A structured event emitted by the streaming parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentEvent {
    /// The lifecycle stage of this event.
    #[serde(rename = "type")]
    pub event_type: SegmentEventType,
    /// Identifier of the segment this event belongs to.
    pub segment_id: String,
    /// The segment's type; present only on START events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_type: Option<SegmentType>,
    /// Event payload (metadata, delta, argument context).
    #[serde(default)]
    pub payload: EventPayload,
}

impl SegmentEvent {
    /// Create a SEGMENT_START event.
    pub fn start(segment_id: impl Into<String>, segment_type: SegmentType, metadata: Metadata) -> Self {
        Self {
            event_type: SegmentEventType::Start,
            segment_id: segment_id.into(),
            segment_type: Some(segment_type),
            payload: EventPayload {
                metadata: Some(metadata),
                ..EventPayload::default()
            },
        }
    }

    /// Create a SEGMENT_CONTENT event.
    pub fn content(
        segment_id: impl Into<String>,
        delta: impl Into<String>,
        arg_name: Option<String>,
        arg_state: Option<ArgPhase>,
    ) -> Self {
        Self {
            event_type: SegmentEventType::Content,
            segment_id: segment_id.into(),
            segment_type: None,
            payload: EventPayload {
                delta: Some(delta.into()),
                arg_name,
                arg_state,
                ..EventPayload::default()
            },
        }
    }

    /// Create a SEGMENT_END event carrying the final metadata map.
    pub fn end(segment_id: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            event_type: SegmentEventType::End,
            segment_id: segment_id.into(),
            segment_type: None,
            payload: EventPayload {
                metadata: Some(metadata),
                ..EventPayload::default()
            },
        }
    }

    /// The content delta, if this is a CONTENT event.
    pub fn delta(&self) -> Option<&str> {
        self.payload.delta.as_deref()
    }

    /// The metadata map, if this is a START or END event.
    pub fn metadata(&self) -> Option<&Metadata> {
        self.payload.metadata.as_ref()
    }
}

// ============================================================================
// TOOL INVOCATIONS
// ============================================================================

/// A downstream-ready tool call produced from a completed tool segment.
///
/// The `id` equals the producing segment's id, so approval flows and
/// execution results can be correlated back to the UI stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Invocation id; equals the segment id of the tool-producing segment.
    pub id: String,
    /// Canonical tool name.
    pub name: String,
    /// Parsed argument map.
    pub arguments: Metadata,
}

impl ToolInvocation {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Metadata) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

// ============================================================================
// COLLECTED SEGMENTS
// ============================================================================

/// A fully materialized segment, folded from an event list.
///
/// Produced by [`collect_segments`](crate::parser::collect_segments) for
/// consumers that want whole segments rather than a live event stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub id: String,
    pub segment_type: SegmentType,
    pub content: String,
    pub metadata: Metadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(pairs: &[(&str, Value)]) -> Metadata {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_segment_type_wire_values() {
        assert_eq!(SegmentType::Text.as_str(), "text");
        assert_eq!(SegmentType::RunTerminalCmd.as_str(), "run_terminal_cmd");
        assert_eq!(SegmentType::from_wire("write_file"), Some(SegmentType::WriteFile));
        assert_eq!(SegmentType::from_wire("iframe"), Some(SegmentType::Iframe));
        assert_eq!(SegmentType::from_wire("bogus"), None);
    }

    #[test]
    fn test_start_event_serialization() {
        let event = SegmentEvent::start("seg_1", SegmentType::WriteFile, meta(&[("path", json!("/a.py"))]));
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], "SEGMENT_START");
        assert_eq!(value["segment_id"], "seg_1");
        assert_eq!(value["segment_type"], "write_file");
        assert_eq!(value["payload"]["metadata"]["path"], "/a.py");
    }

    #[test]
    fn test_content_event_serialization() {
        let event = SegmentEvent::content("seg_2", "hello", Some("query".into()), Some(ArgPhase::Delta));
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], "SEGMENT_CONTENT");
        assert_eq!(value["payload"]["delta"], "hello");
        assert_eq!(value["payload"]["arg_name"], "query");
        assert_eq!(value["payload"]["arg_state"], "delta");
        // segment_type only appears on START events
        assert!(value.get("segment_type").is_none());
    }

    #[test]
    fn test_end_event_serialization() {
        let event = SegmentEvent::end("seg_3", meta(&[("arguments", json!({"k": "v"}))]));
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], "SEGMENT_END");
        assert_eq!(value["payload"]["metadata"]["arguments"]["k"], "v");
    }

    #[test]
    fn test_content_event_without_arg_context() {
        let event = SegmentEvent::content("seg_4", "text", None, None);
        let value = serde_json::to_value(&event).unwrap();

        assert!(value["payload"].get("arg_name").is_none());
        assert!(value["payload"].get("arg_state").is_none());
    }

    #[test]
    fn test_event_roundtrip() {
        let event = SegmentEvent::start("seg_5", SegmentType::ToolCall, meta(&[("tool_name", json!("search"))]));
        let json = serde_json::to_string(&event).unwrap();
        let back: SegmentEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn test_tool_invocation_shape() {
        let invocation = ToolInvocation::new("seg_9", "weather", meta(&[("city", json!("NYC"))]));
        let value = serde_json::to_value(&invocation).unwrap();

        assert_eq!(value["id"], "seg_9");
        assert_eq!(value["name"], "weather");
        assert_eq!(value["arguments"]["city"], "NYC");
    }
}
