//! Event emission and open-segment tracking.
//!
//! The emitter is the only component that mints segment ids and builds
//! [`SegmentEvent`]s. It tracks at most one open segment at a time and keeps
//! the accumulated content and metadata for that segment, so END events can
//! carry the final metadata map and specialized states can read back what
//! they streamed.
//!
//! # Text coalescing
//!
//! [`append_text`](EventEmitter::append_text) keeps a TEXT segment open
//! across calls: consecutive text appends become CONTENT deltas on one
//! logical segment. The open TEXT segment is closed automatically when a
//! non-text segment starts, or by the driver at finalize.

use crate::error::{Error, Result};
use crate::events::{ArgPhase, Metadata, SegmentEvent, SegmentType};
use serde_json::Value;

/// Record for the single currently open segment.
#[derive(Debug)]
struct OpenSegment {
    id: String,
    segment_type: SegmentType,
    content: String,
    metadata: Metadata,
}

/// Builds and queues segment lifecycle events.
///
/// Ids are allocated from a per-emitter monotonic counter, formatted as
/// `<prefix>seg_<n>`. One emitter serves one parser instance, so id
/// uniqueness holds per stream without any process-global state.
#[derive(Debug)]
pub struct EventEmitter {
    queue: Vec<SegmentEvent>,
    counter: u64,
    id_prefix: String,
    open: Option<OpenSegment>,
}

impl EventEmitter {
    /// Create an emitter with an optional id prefix (e.g. a turn id).
    pub fn new(id_prefix: Option<&str>) -> Self {
        Self {
            queue: Vec::new(),
            counter: 0,
            id_prefix: id_prefix.unwrap_or_default().to_string(),
            open: None,
        }
    }

    fn next_id(&mut self) -> String {
        self.counter += 1;
        format!("{}seg_{}", self.id_prefix, self.counter)
    }

    /// Open a new segment and queue its START event. Returns the new id.
    ///
    /// Any segment still open (a coalescing TEXT segment, or a segment left
    /// open at finalize) is closed first so the one-open-segment invariant
    /// holds across the event stream.
    pub fn emit_start(&mut self, segment_type: SegmentType, metadata: Metadata) -> String {
        if self.open.is_some() {
            self.emit_end();
        }

        let id = self.next_id();
        self.open = Some(OpenSegment {
            id: id.clone(),
            segment_type,
            content: String::new(),
            metadata: metadata.clone(),
        });
        self.queue.push(SegmentEvent::start(id.as_str(), segment_type, metadata));
        id
    }

    /// Queue a CONTENT event on the open segment.
    pub fn emit_content(&mut self, delta: &str) -> Result<()> {
        self.emit_content_with(delta, None, None)
    }

    /// Queue a CONTENT event carrying argument-stream context.
    pub fn emit_content_with(
        &mut self,
        delta: &str,
        arg_name: Option<&str>,
        arg_state: Option<ArgPhase>,
    ) -> Result<()> {
        let open = self.open.as_mut().ok_or(Error::NoOpenSegment)?;
        open.content.push_str(delta);
        self.queue.push(SegmentEvent::content(
            open.id.as_str(),
            delta,
            arg_name.map(str::to_string),
            arg_state,
        ));
        Ok(())
    }

    /// Merge a key/value pair into the open segment's metadata.
    ///
    /// The next END event carries a copy of the merged map.
    pub fn update_metadata(&mut self, key: &str, value: Value) {
        if let Some(open) = self.open.as_mut() {
            open.metadata.insert(key.to_string(), value);
        }
    }

    /// Close the open segment and queue its END event.
    ///
    /// Returns the closed segment's id, or `None` if nothing was open.
    pub fn emit_end(&mut self) -> Option<String> {
        let open = self.open.take()?;
        self.queue.push(SegmentEvent::end(open.id.as_str(), open.metadata));
        Some(open.id)
    }

    /// Append plain text, coalescing into the open TEXT segment.
    ///
    /// If the open segment is TEXT the delta joins it; otherwise a new TEXT
    /// segment is opened (closing any non-text segment first) and left open
    /// so later appends continue the same logical segment.
    pub fn append_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }

        let is_open_text = self
            .open
            .as_ref()
            .is_some_and(|open| open.segment_type == SegmentType::Text);

        if !is_open_text {
            self.emit_start(SegmentType::Text, Metadata::new());
        }
        // The segment is guaranteed open here.
        let _ = self.emit_content(text);
    }

    // --- Open-segment queries ---

    /// Id of the currently open segment.
    pub fn current_segment_id(&self) -> Option<&str> {
        self.open.as_ref().map(|open| open.id.as_str())
    }

    /// Type of the currently open segment.
    pub fn current_segment_type(&self) -> Option<SegmentType> {
        self.open.as_ref().map(|open| open.segment_type)
    }

    /// Accumulated content of the currently open segment.
    pub fn current_segment_content(&self) -> Option<&str> {
        self.open.as_ref().map(|open| open.content.as_str())
    }

    /// Metadata of the currently open segment.
    pub fn current_segment_metadata(&self) -> Option<&Metadata> {
        self.open.as_ref().map(|open| &open.metadata)
    }

    // --- Queue management ---

    /// Take all queued events, leaving the queue empty.
    pub fn drain_events(&mut self) -> Vec<SegmentEvent> {
        std::mem::take(&mut self.queue)
    }

    /// Number of queued events (without draining).
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SegmentEventType;
    use serde_json::json;

    #[test]
    fn test_id_allocation_is_monotonic() {
        let mut emitter = EventEmitter::new(None);
        let first = emitter.emit_start(SegmentType::Text, Metadata::new());
        emitter.emit_end();
        let second = emitter.emit_start(SegmentType::ToolCall, Metadata::new());

        assert_eq!(first, "seg_1");
        assert_eq!(second, "seg_2");
    }

    #[test]
    fn test_id_prefix() {
        let mut emitter = EventEmitter::new(Some("turn42_"));
        let id = emitter.emit_start(SegmentType::Text, Metadata::new());
        assert_eq!(id, "turn42_seg_1");
    }

    #[test]
    fn test_content_requires_open_segment() {
        let mut emitter = EventEmitter::new(None);
        let err = emitter.emit_content("oops").unwrap_err();
        assert!(matches!(err, Error::NoOpenSegment));
    }

    #[test]
    fn test_full_lifecycle() {
        let mut emitter = EventEmitter::new(None);
        let mut meta = Metadata::new();
        meta.insert("tool_name".into(), json!("search"));

        let id = emitter.emit_start(SegmentType::ToolCall, meta);
        emitter.emit_content("abc").unwrap();
        emitter.update_metadata("arguments", json!({"q": "rust"}));
        let ended = emitter.emit_end();

        assert_eq!(ended.as_deref(), Some(id.as_str()));

        let events = emitter.drain_events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].event_type, SegmentEventType::Start);
        assert_eq!(events[1].delta(), Some("abc"));
        assert_eq!(events[2].event_type, SegmentEventType::End);
        // END metadata carries the merged map
        assert_eq!(
            events[2].metadata().unwrap()["arguments"]["q"],
            json!("rust")
        );
    }

    #[test]
    fn test_append_text_coalesces() {
        let mut emitter = EventEmitter::new(None);
        emitter.append_text("Hello, ");
        emitter.append_text("world!");

        // One open TEXT segment, two deltas, no END yet
        assert_eq!(emitter.current_segment_type(), Some(SegmentType::Text));
        assert_eq!(emitter.current_segment_content(), Some("Hello, world!"));

        let events = emitter.drain_events();
        assert_eq!(events.len(), 3); // START + 2 CONTENT
        assert_eq!(events[0].event_type, SegmentEventType::Start);
        assert_eq!(events[1].delta(), Some("Hello, "));
        assert_eq!(events[2].delta(), Some("world!"));
    }

    #[test]
    fn test_non_text_start_closes_open_text() {
        let mut emitter = EventEmitter::new(None);
        emitter.append_text("before");
        emitter.emit_start(SegmentType::ToolCall, Metadata::new());

        let events = emitter.drain_events();
        let kinds: Vec<_> = events.iter().map(|e| e.event_type).collect();
        assert_eq!(
            kinds,
            vec![
                SegmentEventType::Start,   // text
                SegmentEventType::Content, // "before"
                SegmentEventType::End,     // text closed
                SegmentEventType::Start,   // tool_call
            ]
        );
    }

    #[test]
    fn test_append_empty_text_is_noop() {
        let mut emitter = EventEmitter::new(None);
        emitter.append_text("");
        assert_eq!(emitter.queued_len(), 0);
        assert!(emitter.current_segment_id().is_none());
    }

    #[test]
    fn test_arg_content_context() {
        let mut emitter = EventEmitter::new(None);
        emitter.emit_start(SegmentType::ToolCall, Metadata::new());
        emitter
            .emit_content_with("", Some("path"), Some(ArgPhase::Start))
            .unwrap();
        emitter
            .emit_content_with("/a.py", Some("path"), Some(ArgPhase::Delta))
            .unwrap();

        let events = emitter.drain_events();
        assert_eq!(events[1].payload.arg_name.as_deref(), Some("path"));
        assert_eq!(events[1].payload.arg_state, Some(ArgPhase::Start));
        assert_eq!(events[2].delta(), Some("/a.py"));
    }

    #[test]
    fn test_drain_clears_queue() {
        let mut emitter = EventEmitter::new(None);
        emitter.append_text("x");
        assert_eq!(emitter.drain_events().len(), 2);
        assert_eq!(emitter.drain_events().len(), 0);
    }
}
