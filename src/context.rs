//! Shared state for the parser state machine.
//!
//! [`ParserContext`] is the narrow façade states work against: it bundles the
//! scanner, the event emitter, and the configuration, and delegates to them.
//! States never build events themselves; everything flows through the
//! emitter, which keeps the segment lifecycle invariants in one place.

use crate::config::{ParserConfig, Strategy};
use crate::dialect::JsonDialect;
use crate::emitter::EventEmitter;
use crate::error::Result;
use crate::events::{ArgPhase, Metadata, SegmentEvent, SegmentType};
use crate::scanner::StreamScanner;
use serde_json::Value;

/// Holds the scanner, emitter, and configuration shared by all states.
#[derive(Debug)]
pub struct ParserContext {
    scanner: StreamScanner,
    emitter: EventEmitter,
    config: ParserConfig,
}

impl ParserContext {
    pub fn new(config: ParserConfig) -> Self {
        let emitter = EventEmitter::new(config.segment_id_prefix.as_deref());
        Self {
            scanner: StreamScanner::new(),
            emitter,
            config,
        }
    }

    // --- Configuration access ---

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn parse_tool_calls(&self) -> bool {
        self.config.parse_tool_calls
    }

    pub fn has_strategy(&self, strategy: Strategy) -> bool {
        self.config.has_strategy(strategy)
    }

    pub fn json_tool_patterns(&self) -> &[String] {
        &self.config.json_tool_patterns
    }

    pub fn json_dialect(&self) -> JsonDialect {
        self.config.json_dialect
    }

    // --- Scanner delegation ---

    pub fn append(&mut self, text: &str) {
        self.scanner.append(text);
    }

    pub fn peek_char(&self) -> Option<char> {
        self.scanner.peek()
    }

    pub fn advance(&mut self) {
        self.scanner.advance();
    }

    pub fn has_more_chars(&self) -> bool {
        self.scanner.has_more()
    }

    pub fn position(&self) -> usize {
        self.scanner.position()
    }

    /// Move the cursor back by up to `count` bytes.
    ///
    /// Content states use this to return trailing bytes (e.g. text after a
    /// closing `</tool>`) to the scanner for the next state to re-process.
    pub fn rewind_by(&mut self, count: usize) {
        let new_pos = self.scanner.position().saturating_sub(count);
        self.scanner.set_position(new_pos);
    }

    pub fn substring(&self, start: usize, end: usize) -> &str {
        self.scanner.substring(start, end)
    }

    pub fn consume_remaining(&mut self) -> String {
        self.scanner.consume_remaining()
    }

    /// Drop the consumed buffer prefix. Called by the driver between feeds.
    pub fn compact_scanner(&mut self) {
        self.scanner.compact_to_cursor();
    }

    pub fn consumed_prefix_len(&self) -> usize {
        self.scanner.position()
    }

    // --- Emitter delegation ---

    pub fn emit_segment_start(&mut self, segment_type: SegmentType, metadata: Metadata) -> String {
        self.emitter.emit_start(segment_type, metadata)
    }

    pub fn emit_segment_content(&mut self, delta: &str) -> Result<()> {
        self.emitter.emit_content(delta)
    }

    pub fn emit_arg_content(
        &mut self,
        delta: &str,
        arg_name: Option<&str>,
        arg_state: Option<ArgPhase>,
    ) -> Result<()> {
        self.emitter.emit_content_with(delta, arg_name, arg_state)
    }

    pub fn update_segment_metadata(&mut self, key: &str, value: Value) {
        self.emitter.update_metadata(key, value);
    }

    pub fn emit_segment_end(&mut self) -> Option<String> {
        self.emitter.emit_end()
    }

    pub fn append_text_segment(&mut self, text: &str) {
        self.emitter.append_text(text);
    }

    pub fn current_segment_id(&self) -> Option<&str> {
        self.emitter.current_segment_id()
    }

    pub fn current_segment_type(&self) -> Option<SegmentType> {
        self.emitter.current_segment_type()
    }

    pub fn current_segment_content(&self) -> Option<&str> {
        self.emitter.current_segment_content()
    }

    pub fn drain_events(&mut self) -> Vec<SegmentEvent> {
        self.emitter.drain_events()
    }
}
