//! Sentinel-framed segments: `[[SEG_START {json}]] … [[SEG_END]]`.

use serde_json::Value;
use tracing::debug;

use crate::context::ParserContext;
use crate::error::Result;
use crate::events::{Metadata, SegmentType};

use super::{ParserState, PrefixMatch, floor_char_boundary, match_prefix};

const HEADER_PREFIX: &str = "[[SEG_START ";
const HEADER_CLOSE: &str = "]]";
const END_SENTINEL: &str = "[[SEG_END]]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SentinelPhase {
    /// Confirming the `[[SEG_START ` prefix byte by byte.
    Prefix,
    /// Accumulating the JSON header until its closing `]]`.
    Header,
    /// Streaming body bytes until `[[SEG_END]]`.
    Content,
}

/// Parses a sentinel-framed segment.
///
/// The header is a JSON object carrying at least `{"type": …}`; remaining
/// header fields become the segment's START metadata. An invalid header (or
/// an unknown type) demotes the whole `[[SEG_START …]]` run to text. Body
/// bytes stream verbatim with a `len("[[SEG_END]]")-1` holdback.
#[derive(Debug)]
pub(crate) struct SentinelState {
    phase: SentinelPhase,
    buffer: String,
    tail: String,
}

impl SentinelState {
    pub fn new() -> Self {
        Self {
            phase: SentinelPhase::Prefix,
            buffer: String::new(),
            tail: String::new(),
        }
    }

    pub fn run(&mut self, ctx: &mut ParserContext) -> Result<Option<ParserState>> {
        loop {
            match self.phase {
                SentinelPhase::Prefix => match self.run_prefix(ctx)? {
                    Flow::Continue => {}
                    Flow::Yield => return Ok(None),
                    Flow::Transition(next) => return Ok(Some(next)),
                },
                SentinelPhase::Header => match self.run_header(ctx)? {
                    Flow::Continue => {}
                    Flow::Yield => return Ok(None),
                    Flow::Transition(next) => return Ok(Some(next)),
                },
                SentinelPhase::Content => return self.run_content(ctx),
            }
        }
    }

    fn run_prefix(&mut self, ctx: &mut ParserContext) -> Result<Flow> {
        while ctx.has_more_chars() {
            let Some(c) = ctx.peek_char() else { break };
            self.buffer.push(c);
            ctx.advance();

            match match_prefix(&self.buffer, HEADER_PREFIX) {
                PrefixMatch::Complete => {
                    self.phase = SentinelPhase::Header;
                    return Ok(Flow::Continue);
                }
                PrefixMatch::Viable => continue,
                PrefixMatch::None => {
                    ctx.append_text_segment(&self.buffer);
                    self.buffer.clear();
                    return Ok(Flow::Transition(ParserState::text()));
                }
            }
        }
        Ok(Flow::Yield)
    }

    fn run_header(&mut self, ctx: &mut ParserContext) -> Result<Flow> {
        while ctx.has_more_chars() {
            let Some(c) = ctx.peek_char() else { break };
            self.buffer.push(c);
            ctx.advance();

            if self.buffer.ends_with(HEADER_CLOSE) {
                let header = &self.buffer[HEADER_PREFIX.len()..self.buffer.len() - HEADER_CLOSE.len()];
                match parse_header(header) {
                    Some((segment_type, metadata)) => {
                        ctx.emit_segment_start(segment_type, metadata);
                        self.buffer.clear();
                        self.phase = SentinelPhase::Content;
                        return Ok(Flow::Continue);
                    }
                    None => {
                        debug!("invalid sentinel header; demoting run to text");
                        ctx.append_text_segment(&self.buffer);
                        self.buffer.clear();
                        return Ok(Flow::Transition(ParserState::text()));
                    }
                }
            }
        }
        Ok(Flow::Yield)
    }

    fn run_content(&mut self, ctx: &mut ParserContext) -> Result<Option<ParserState>> {
        if !ctx.has_more_chars() && self.tail.is_empty() {
            return Ok(None);
        }

        let chunk = ctx.consume_remaining();
        let combined = std::mem::take(&mut self.tail) + &chunk;

        match combined.find(END_SENTINEL) {
            Some(idx) => {
                if idx > 0 {
                    ctx.emit_segment_content(&combined[..idx])?;
                }
                ctx.emit_segment_end();
                let after_len = combined.len() - (idx + END_SENTINEL.len());
                ctx.rewind_by(after_len);
                Ok(Some(ParserState::text()))
            }
            None => {
                let holdback = (END_SENTINEL.len() - 1).min(combined.len());
                let split = floor_char_boundary(&combined, combined.len() - holdback);
                let safe = &combined[..split];
                if !safe.is_empty() {
                    ctx.emit_segment_content(safe)?;
                }
                self.tail = combined[split..].to_string();
                Ok(None)
            }
        }
    }

    pub fn finalize(&mut self, ctx: &mut ParserContext) -> Result<()> {
        match self.phase {
            SentinelPhase::Prefix | SentinelPhase::Header => {
                if !self.buffer.is_empty() {
                    ctx.append_text_segment(&self.buffer);
                    self.buffer.clear();
                }
            }
            SentinelPhase::Content => {
                let tail = std::mem::take(&mut self.tail);
                if !tail.is_empty() {
                    ctx.emit_segment_content(&tail)?;
                }
                ctx.emit_segment_end();
            }
        }
        Ok(())
    }
}

enum Flow {
    Continue,
    Yield,
    Transition(ParserState),
}

/// Parse the JSON header into a segment type and its metadata.
fn parse_header(header: &str) -> Option<(SegmentType, Metadata)> {
    let value: Value = serde_json::from_str(header).ok()?;
    let obj = value.as_object()?;
    let type_str = obj.get("type")?.as_str()?;
    let segment_type = SegmentType::from_wire(type_str)?;

    let metadata: Metadata = obj
        .iter()
        .filter(|(k, _)| k.as_str() != "type")
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Some((segment_type, metadata))
}
