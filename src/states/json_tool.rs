//! Consumption of a complete JSON tool value.

use serde_json::Value;
use tracing::debug;

use crate::context::ParserContext;
use crate::error::Result;
use crate::events::{Metadata, SegmentType};

use super::ParserState;

/// Consumes a balanced JSON value (object, or object-in-array) and turns it
/// into tool-call segments via the configured dialect.
///
/// Brace and bracket depth is tracked with full string/escape awareness, so
/// `{`/`}` inside string literals never affect balance. Events are deferred
/// until the value completes: a finished blob that the dialect cannot
/// interpret degrades to text, and an unfinished blob at end of stream is
/// flushed as text by `finalize`.
#[derive(Debug)]
pub(crate) struct JsonToolState {
    content: String,
    brace_count: i32,
    bracket_count: i32,
    in_string: bool,
    escape_next: bool,
    is_array: bool,
}

impl JsonToolState {
    pub fn new(signature: String) -> Self {
        let mut state = Self {
            content: String::new(),
            brace_count: 0,
            bracket_count: 0,
            in_string: false,
            escape_next: false,
            is_array: signature.starts_with('['),
        };
        for c in signature.chars() {
            state.track(c);
        }
        state.content = signature;
        state
    }

    pub fn run(&mut self, ctx: &mut ParserContext) -> Result<Option<ParserState>> {
        while ctx.has_more_chars() {
            let Some(c) = ctx.peek_char() else { break };
            self.content.push(c);
            ctx.advance();
            self.track(c);

            if self.is_complete() {
                self.emit_tool_calls(ctx)?;
                return Ok(Some(ParserState::text()));
            }
        }
        Ok(None)
    }

    fn emit_tool_calls(&mut self, ctx: &mut ParserContext) -> Result<()> {
        let records = ctx.json_dialect().parse(&self.content);

        if records.is_empty() {
            debug!("JSON blob yielded no tool calls; degrading to text");
            ctx.append_text_segment(&self.content);
            self.content.clear();
            return Ok(());
        }

        for record in records {
            let mut metadata = Metadata::new();
            metadata.insert("tool_name".into(), Value::String(record.name));
            ctx.emit_segment_start(SegmentType::ToolCall, metadata);
            // The raw blob is the display content for each call.
            ctx.emit_segment_content(&self.content)?;
            ctx.update_segment_metadata("arguments", Value::Object(record.arguments));
            ctx.emit_segment_end();
        }
        self.content.clear();
        Ok(())
    }

    fn track(&mut self, c: char) {
        if self.escape_next {
            self.escape_next = false;
            return;
        }
        if c == '\\' && self.in_string {
            self.escape_next = true;
            return;
        }
        if c == '"' {
            self.in_string = !self.in_string;
            return;
        }
        if self.in_string {
            return;
        }
        match c {
            '{' => self.brace_count += 1,
            '}' => self.brace_count -= 1,
            '[' => self.bracket_count += 1,
            ']' => self.bracket_count -= 1,
            _ => {}
        }
    }

    fn is_complete(&self) -> bool {
        if self.in_string {
            return false;
        }
        if self.is_array {
            self.bracket_count == 0 && self.brace_count == 0
        } else {
            self.brace_count == 0
        }
    }

    pub fn finalize(&mut self, ctx: &mut ParserContext) -> Result<()> {
        // Incomplete JSON at end of stream: no invocation, just text.
        if !self.content.is_empty() {
            ctx.append_text_segment(&self.content);
            self.content.clear();
        }
        Ok(())
    }
}
