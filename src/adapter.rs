//! Converts tool-bearing segment events into [`ToolInvocation`]s.
//!
//! The adapter is a pure event consumer with no parser access: it watches
//! the START/CONTENT/END lifecycle and, when a tool-bearing segment ends,
//! produces the `{id, name, arguments}` value the execution side dispatches.
//! The segment id becomes the invocation id, which is what lets a UI stream
//! and an execution queue agree on what they are talking about.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::events::{Metadata, SegmentEvent, SegmentEventType, SegmentType, ToolInvocation};
use crate::registry::tool_syntax_for;

/// Tracking record for one open tool-bearing segment.
#[derive(Debug)]
struct ActiveSegment {
    segment_type: SegmentType,
    tool_name: Option<String>,
    content: String,
}

/// Watches segment events and emits completed tool invocations.
///
/// ```rust
/// use agent_stream::{ParserConfig, StreamingParser, ToolInvocationAdapter};
///
/// let mut parser = StreamingParser::new(ParserConfig::default());
/// let mut adapter = ToolInvocationAdapter::new();
///
/// let events = parser
///     .feed_and_finalize("<tool name=\"ping\"><arguments></arguments></tool>")
///     .unwrap();
/// let invocations = adapter.process_events(&events);
/// assert_eq!(invocations[0].name, "ping");
/// ```
#[derive(Debug, Default)]
pub struct ToolInvocationAdapter {
    active: HashMap<String, ActiveSegment>,
}

impl ToolInvocationAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one event; returns an invocation when a tool segment completes.
    pub fn process_event(&mut self, event: &SegmentEvent) -> Option<ToolInvocation> {
        match event.event_type {
            SegmentEventType::Start => {
                self.handle_start(event);
                None
            }
            SegmentEventType::Content => {
                self.handle_content(event);
                None
            }
            SegmentEventType::End => self.handle_end(event),
        }
    }

    fn handle_start(&mut self, event: &SegmentEvent) {
        let Some(segment_type) = event.segment_type else {
            return;
        };
        let tool_bearing =
            segment_type == SegmentType::ToolCall || tool_syntax_for(segment_type).is_some();
        if !tool_bearing {
            return;
        }

        let tool_name = event
            .metadata()
            .and_then(|m| m.get("tool_name"))
            .and_then(Value::as_str)
            .map(str::to_string);

        self.active.insert(
            event.segment_id.clone(),
            ActiveSegment {
                segment_type,
                tool_name,
                content: String::new(),
            },
        );
        debug!(segment_id = %event.segment_id, "tracking tool segment");
    }

    fn handle_content(&mut self, event: &SegmentEvent) {
        if let Some(active) = self.active.get_mut(&event.segment_id)
            && let Some(delta) = event.delta()
        {
            active.content.push_str(delta);
        }
    }

    fn handle_end(&mut self, event: &SegmentEvent) -> Option<ToolInvocation> {
        let active = self.active.remove(&event.segment_id)?;
        let metadata = event.metadata().cloned().unwrap_or_default();

        if active.segment_type == SegmentType::ToolCall {
            let name = metadata
                .get("tool_name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or(active.tool_name);

            let Some(name) = name else {
                warn!(segment_id = %event.segment_id, "tool segment ended without a tool name");
                return None;
            };

            let arguments = match metadata.get("arguments") {
                Some(Value::Object(map)) => map.clone(),
                _ => Metadata::new(),
            };
            return Some(ToolInvocation::new(event.segment_id.as_str(), name, arguments));
        }

        // Mapped segment types synthesize their arguments via the registry.
        let spec = tool_syntax_for(active.segment_type)?;
        let arguments = (spec.build_arguments)(&metadata, &active.content)?;
        Some(ToolInvocation::new(
            event.segment_id.as_str(),
            spec.tool_name,
            arguments,
        ))
    }

    /// Process a batch of events, collecting every completed invocation.
    pub fn process_events(&mut self, events: &[SegmentEvent]) -> Vec<ToolInvocation> {
        events
            .iter()
            .filter_map(|event| self.process_event(event))
            .collect()
    }

    /// Clear all tracking state.
    pub fn reset(&mut self) {
        self.active.clear();
    }

    /// Ids of tool segments currently being tracked.
    pub fn active_segment_ids(&self) -> Vec<String> {
        self.active.keys().cloned().collect()
    }
}
