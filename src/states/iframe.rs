//! HTML preview blocks: `<!doctype html>…</html>`.

use crate::context::ParserContext;
use crate::error::Result;
use crate::events::{Metadata, SegmentType};

use super::{ParserState, find_ci, floor_char_boundary};

const CLOSING_TAG: &str = "</html>";

/// Streams an HTML document as an iframe segment.
///
/// The DOCTYPE opening tag is the first CONTENT delta and the closing
/// `</html>` (matched case-insensitively) is included in the content, so the
/// consumer receives a renderable document verbatim.
#[derive(Debug)]
pub(crate) struct IframeState {
    opening_tag: String,
    started: bool,
    tail: String,
}

impl IframeState {
    pub fn new(opening_tag: String) -> Self {
        Self {
            opening_tag,
            started: false,
            tail: String::new(),
        }
    }

    fn ensure_started(&mut self, ctx: &mut ParserContext) -> Result<()> {
        if !self.started {
            ctx.emit_segment_start(SegmentType::Iframe, Metadata::new());
            ctx.emit_segment_content(&self.opening_tag)?;
            self.started = true;
        }
        Ok(())
    }

    pub fn run(&mut self, ctx: &mut ParserContext) -> Result<Option<ParserState>> {
        self.ensure_started(ctx)?;

        if !ctx.has_more_chars() {
            return Ok(None);
        }

        let chunk = ctx.consume_remaining();
        let combined = std::mem::take(&mut self.tail) + &chunk;

        match find_ci(&combined, CLOSING_TAG) {
            Some(idx) => {
                let content_end = idx + CLOSING_TAG.len();
                ctx.emit_segment_content(&combined[..content_end])?;
                ctx.emit_segment_end();
                ctx.rewind_by(combined.len() - content_end);
                Ok(Some(ParserState::text()))
            }
            None => {
                let holdback = (CLOSING_TAG.len() - 1).min(combined.len());
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
        self.ensure_started(ctx)?;
        let tail = std::mem::take(&mut self.tail);
        if !tail.is_empty() {
            ctx.emit_segment_content(&tail)?;
        }
        ctx.emit_segment_end();
        Ok(())
    }
}
