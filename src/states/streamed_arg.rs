//! Specialized per-tool content states (write_file, patch_file, run_terminal_cmd).
//!
//! These states obey the same outer contract as the generic tool state but
//! stream only the tool's salient argument as segment content, hiding the
//! `<arg>` scaffolding from the consumer. Behavior is table-driven by a
//! [`StreamedArgSpec`] from the registry:
//!
//! - `write_file` streams the `content` argument, honors the
//!   `__START_CONTENT__`/`__END_CONTENT__` sentinel pair, and defers START
//!   until a `path` argument is seen.
//! - `patch_file` (and its `edit_file` alias) does the same for `patch` with
//!   `__START_PATCH__`/`__END_PATCH__`.
//! - `run_terminal_cmd` streams `command` with no sentinel pair.
//!
//! An end sentinel only terminates the content when it is followed, after
//! optional whitespace, by `</arg>`; anywhere else the literal marker belongs
//! to the content. A single `\n` directly after the opening marker is
//! stripped.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::context::ParserContext;
use crate::error::Result;
use crate::events::Metadata;
use crate::registry::StreamedArgSpec;

use super::{ParserState, PrefixMatch, find_ci, floor_char_boundary, match_prefix_ci};

const CLOSING_TAG: &str = "</tool>";
const ARG_CLOSE: &str = "</arg>";

static PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<arg\s+name\s*=\s*["']path["']\s*>([^<]+)</arg>"#).expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Scanning the block head: capture `path`, find the content argument.
    SeekArgs,
    /// Streaming the content argument.
    Content,
    /// Content done; eating scaffolding until `</tool>`.
    Swallow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentMode {
    /// Probing for an opening sentinel before committing.
    SeekMarker,
    /// Streaming until `</arg>`.
    Default,
    /// Streaming until the end sentinel.
    Marker,
}

/// Streams a single argument of a specialized tool as segment content.
#[derive(Debug)]
pub(crate) struct StreamedArgState {
    spec: &'static StreamedArgSpec,
    tool_name: String,
    opening_tag: String,
    content_arg_re: Regex,
    started: bool,
    completed: bool,
    phase: Phase,
    mode: ContentMode,
    pre_buffer: String,
    seek_buffer: String,
    tail: String,
    swallow_buffer: String,
    captured_path: Option<String>,
    strip_newline_next: bool,
}

impl StreamedArgState {
    pub fn new(spec: &'static StreamedArgSpec, tool_name: String, opening_tag: String) -> Self {
        let pattern = format!(
            r#"(?i)<arg\s+name\s*=\s*["']{}["']\s*>"#,
            regex::escape(spec.content_arg)
        );
        Self {
            spec,
            tool_name,
            opening_tag,
            content_arg_re: Regex::new(&pattern).expect("valid regex"),
            started: false,
            completed: false,
            phase: Phase::SeekArgs,
            mode: if spec.markers.is_some() {
                ContentMode::SeekMarker
            } else {
                ContentMode::Default
            },
            pre_buffer: String::new(),
            seek_buffer: String::new(),
            tail: String::new(),
            swallow_buffer: String::new(),
            captured_path: None,
            strip_newline_next: false,
        }
    }

    pub fn run(&mut self, ctx: &mut ParserContext) -> Result<Option<ParserState>> {
        if self.phase == Phase::Swallow {
            return self.handle_swallow(ctx);
        }

        if !self.started && !self.spec.capture_path {
            self.emit_start(ctx);
        }

        if !ctx.has_more_chars() {
            return Ok(None);
        }

        let chunk = ctx.consume_remaining();
        match self.phase {
            Phase::SeekArgs => self.seek_args(ctx, chunk),
            Phase::Content => self.process_content(ctx, chunk),
            Phase::Swallow => self.handle_swallow(ctx),
        }
    }

    fn emit_start(&mut self, ctx: &mut ParserContext) {
        let mut metadata = Metadata::new();
        metadata.insert("tool_name".into(), Value::String(self.tool_name.clone()));
        if let Some(path) = &self.captured_path {
            metadata.insert("path".into(), Value::String(path.clone()));
        }
        ctx.emit_segment_start(self.spec.segment_type, metadata);
        self.started = true;
    }

    fn seek_args(&mut self, ctx: &mut ParserContext, chunk: String) -> Result<Option<ParserState>> {
        self.pre_buffer.push_str(&chunk);

        if self.spec.capture_path && self.captured_path.is_none() {
            let found = PATH_RE
                .captures(&self.pre_buffer)
                .map(|caps| caps[1].trim().to_string());
            if let Some(path) = found {
                self.captured_path = Some(path.clone());
                if !self.started {
                    self.emit_start(ctx);
                } else {
                    ctx.update_segment_metadata("path", Value::String(path));
                }
            }
        }

        let content_open = self.content_arg_re.find(&self.pre_buffer).map(|m| m.end());
        if let Some(open_end) = content_open {
            if !self.started {
                self.emit_start(ctx);
            }
            let rest = self.pre_buffer[open_end..].to_string();
            self.pre_buffer.clear();
            self.phase = Phase::Content;
            self.tail.clear();
            return self.process_content(ctx, rest);
        }

        if let Some(idx) = find_ci(&self.pre_buffer, CLOSING_TAG) {
            // The block closed before its content argument appeared.
            if !self.started {
                self.emit_start(ctx);
            }
            let after_len = self.pre_buffer.len() - (idx + CLOSING_TAG.len());
            self.complete_segment(ctx);
            ctx.rewind_by(after_len);
            self.pre_buffer.clear();
            self.completed = true;
            return Ok(Some(ParserState::text()));
        }

        Ok(None)
    }

    fn process_content(&mut self, ctx: &mut ParserContext, chunk: String) -> Result<Option<ParserState>> {
        match self.mode {
            ContentMode::SeekMarker => self.seek_marker(ctx, chunk),
            ContentMode::Default => self.default_mode(ctx, chunk),
            ContentMode::Marker => self.marker_mode(ctx, chunk),
        }
    }

    /// Probe the content body for the opening sentinel before committing
    /// to a streaming mode.
    fn seek_marker(&mut self, ctx: &mut ParserContext, chunk: String) -> Result<Option<ParserState>> {
        let Some((start_marker, _)) = self.spec.markers else {
            self.mode = ContentMode::Default;
            return self.default_mode(ctx, chunk);
        };

        self.seek_buffer.push_str(&chunk);

        let start_idx = self.seek_buffer.find(start_marker);
        let close_idx = find_ci(&self.seek_buffer, ARG_CLOSE);

        // Whichever appears first decides the mode.
        if let Some(idx) = start_idx
            && close_idx.is_none_or(|close| idx < close)
        {
            let mut after = self.seek_buffer[idx + start_marker.len()..].to_string();
            self.seek_buffer.clear();
            self.mode = ContentMode::Marker;
            self.tail.clear();
            if after.starts_with('\n') {
                after.remove(0);
            } else if after.is_empty() {
                self.strip_newline_next = true;
                return Ok(None);
            }
            return self.marker_mode(ctx, after);
        }

        if close_idx.is_some() {
            let buffered = std::mem::take(&mut self.seek_buffer);
            self.mode = ContentMode::Default;
            self.tail.clear();
            return self.default_mode(ctx, buffered);
        }

        let stripped = self.seek_buffer.trim_start();
        if !stripped.is_empty() && !start_marker.starts_with(stripped) {
            let buffered = std::mem::take(&mut self.seek_buffer);
            self.mode = ContentMode::Default;
            self.tail.clear();
            return self.default_mode(ctx, buffered);
        }

        Ok(None)
    }

    /// Stream until `</arg>` with a `len-1` holdback.
    fn default_mode(&mut self, ctx: &mut ParserContext, chunk: String) -> Result<Option<ParserState>> {
        let combined = std::mem::take(&mut self.tail) + &chunk;

        if let Some(idx) = find_ci(&combined, ARG_CLOSE) {
            if idx > 0 {
                ctx.emit_segment_content(&combined[..idx])?;
            }
            self.phase = Phase::Swallow;
            self.swallow_buffer = combined[idx + ARG_CLOSE.len()..].to_string();
            return self.handle_swallow(ctx);
        }

        let holdback = (ARG_CLOSE.len() - 1).min(combined.len());
        let split = floor_char_boundary(&combined, combined.len() - holdback);
        let safe = &combined[..split];
        if !safe.is_empty() {
            ctx.emit_segment_content(safe)?;
        }
        self.tail = combined[split..].to_string();
        Ok(None)
    }

    /// Stream until the end sentinel, which only counts when `</arg>` follows.
    fn marker_mode(&mut self, ctx: &mut ParserContext, chunk: String) -> Result<Option<ParserState>> {
        let Some((_, end_marker)) = self.spec.markers else {
            self.mode = ContentMode::Default;
            return self.default_mode(ctx, chunk);
        };

        let mut combined = std::mem::take(&mut self.tail) + &chunk;
        if self.strip_newline_next {
            self.strip_newline_next = false;
            if combined.starts_with('\n') {
                combined.remove(0);
            }
        }

        loop {
            let Some(idx) = combined.find(end_marker) else {
                let holdback = (end_marker.len() - 1).min(combined.len());
                let split = floor_char_boundary(&combined, combined.len() - holdback);
                let safe = &combined[..split];
                if !safe.is_empty() {
                    ctx.emit_segment_content(safe)?;
                }
                self.tail = combined[split..].to_string();
                return Ok(None);
            };

            let after = &combined[idx + end_marker.len()..];
            let rest = after.trim_start();

            if rest.is_empty() {
                // Not yet decidable whether </arg> follows; hold the marker.
                if idx > 0 {
                    ctx.emit_segment_content(&combined[..idx])?;
                }
                self.tail = combined[idx..].to_string();
                return Ok(None);
            }

            match match_prefix_ci(rest, ARG_CLOSE) {
                PrefixMatch::Complete => {
                    if idx > 0 {
                        ctx.emit_segment_content(&combined[..idx])?;
                    }
                    self.phase = Phase::Swallow;
                    self.swallow_buffer = after.to_string();
                    return self.handle_swallow(ctx);
                }
                PrefixMatch::Viable => {
                    if idx > 0 {
                        ctx.emit_segment_content(&combined[..idx])?;
                    }
                    self.tail = combined[idx..].to_string();
                    return Ok(None);
                }
                PrefixMatch::None => {
                    // A false sentinel: the marker is literal content.
                    let literal_end = idx + end_marker.len();
                    ctx.emit_segment_content(&combined[..literal_end])?;
                    combined = combined[literal_end..].to_string();
                }
            }
        }
    }

    /// Eat remaining scaffolding until `</tool>`, then close the segment.
    fn handle_swallow(&mut self, ctx: &mut ParserContext) -> Result<Option<ParserState>> {
        let remaining = ctx.consume_remaining();
        self.swallow_buffer.push_str(&remaining);

        match find_ci(&self.swallow_buffer, CLOSING_TAG) {
            Some(idx) => {
                let after_len = self.swallow_buffer.len() - (idx + CLOSING_TAG.len());
                self.complete_segment(ctx);
                ctx.rewind_by(after_len);
                self.swallow_buffer.clear();
                self.completed = true;
                Ok(Some(ParserState::text()))
            }
            None => {
                let keep = (CLOSING_TAG.len() - 1).min(self.swallow_buffer.len());
                let drop_len =
                    floor_char_boundary(&self.swallow_buffer, self.swallow_buffer.len() - keep);
                self.swallow_buffer.drain(..drop_len);
                Ok(None)
            }
        }
    }

    /// Attach the final argument map and close the segment.
    fn complete_segment(&mut self, ctx: &mut ParserContext) {
        let mut args = Metadata::new();
        if let Some(path) = &self.captured_path {
            args.insert("path".into(), Value::String(path.clone()));
        }
        let content = ctx
            .current_segment_content()
            .unwrap_or_default()
            .to_string();
        args.insert(self.spec.content_arg.into(), Value::String(content));
        ctx.update_segment_metadata("arguments", Value::Object(args));
        ctx.emit_segment_end();
    }

    pub fn finalize(&mut self, ctx: &mut ParserContext) -> Result<()> {
        let remaining = ctx.consume_remaining();

        if !self.started {
            let text = format!("{}{}{}", self.opening_tag, self.pre_buffer, remaining);
            if !text.is_empty() {
                ctx.append_text_segment(&text);
            }
            return Ok(());
        }

        if self.completed {
            return Ok(());
        }

        match self.phase {
            Phase::SeekArgs => {
                // The content argument never opened; nothing was streamed.
            }
            Phase::Content => {
                self.process_content(ctx, remaining)?;
                if !self.completed {
                    let leftover = match self.mode {
                        ContentMode::SeekMarker => std::mem::take(&mut self.seek_buffer),
                        ContentMode::Default | ContentMode::Marker => std::mem::take(&mut self.tail),
                    };
                    if !leftover.is_empty() {
                        ctx.emit_segment_content(&leftover)?;
                    }
                }
            }
            Phase::Swallow => {
                self.handle_swallow(ctx)?;
            }
        }

        if !self.completed {
            self.complete_segment(ctx);
            self.completed = true;
        }
        Ok(())
    }
}
