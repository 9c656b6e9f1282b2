//! Tag dispatch after a `<` is detected.

use std::sync::LazyLock;

use regex::Regex;

use crate::context::ParserContext;
use crate::error::Result;
use crate::registry::specialization_for;

use super::{
    IframeState, ParserState, PrefixMatch, StreamedArgState, XmlToolState, match_prefix_ci,
};

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)name\s*=\s*["']([^"']+)["']"#).expect("valid regex"));

const TOOL_PREFIX: &str = "<tool";
const DOCTYPE_PREFIX: &str = "<!doctype html";

/// Buffers a potential tag after `<` and dispatches to the matching state.
///
/// Known prefixes are `<tool` (generic or per-name specialized tool states)
/// and `<!doctype html` (HTML preview). Anything else fails fast: as soon as
/// the buffer can no longer extend into a known prefix, the accumulated
/// bytes are emitted as text and parsing returns to the text state.
#[derive(Debug)]
pub(crate) struct XmlTagInitState {
    tag_buffer: String,
}

impl XmlTagInitState {
    /// Enter the state, consuming the `<` that triggered it.
    pub fn enter(ctx: &mut ParserContext) -> Self {
        ctx.advance();
        Self {
            tag_buffer: String::from("<"),
        }
    }

    pub fn run(&mut self, ctx: &mut ParserContext) -> Result<Option<ParserState>> {
        while ctx.has_more_chars() {
            let Some(c) = ctx.peek_char() else { break };
            self.tag_buffer.push(c);
            ctx.advance();

            if c == '>' {
                return Ok(Some(self.dispatch(ctx)));
            }

            if !self.still_viable() {
                ctx.append_text_segment(&self.tag_buffer);
                return Ok(Some(ParserState::text()));
            }
        }

        // Tag incomplete; wait for more data.
        Ok(None)
    }

    /// Decide where a completed opening tag goes.
    fn dispatch(&mut self, ctx: &mut ParserContext) -> ParserState {
        if match_prefix_ci(&self.tag_buffer, TOOL_PREFIX) == PrefixMatch::Complete {
            if ctx.parse_tool_calls() {
                let tool_name = NAME_RE
                    .captures(&self.tag_buffer)
                    .map(|caps| caps[1].to_string());

                if let Some(name) = &tool_name
                    && let Some(spec) = specialization_for(name)
                {
                    return ParserState::StreamedArg(StreamedArgState::new(
                        spec,
                        name.clone(),
                        self.tag_buffer.clone(),
                    ));
                }
                return ParserState::XmlTool(XmlToolState::new(tool_name, self.tag_buffer.clone()));
            }

            ctx.append_text_segment(&self.tag_buffer);
            return ParserState::text();
        }

        if match_prefix_ci(&self.tag_buffer, DOCTYPE_PREFIX) == PrefixMatch::Complete {
            return ParserState::Iframe(IframeState::new(self.tag_buffer.clone()));
        }

        ctx.append_text_segment(&self.tag_buffer);
        ParserState::text()
    }

    fn still_viable(&self) -> bool {
        match_prefix_ci(&self.tag_buffer, TOOL_PREFIX) != PrefixMatch::None
            || match_prefix_ci(&self.tag_buffer, DOCTYPE_PREFIX) != PrefixMatch::None
    }

    pub fn finalize(&mut self, ctx: &mut ParserContext) -> Result<()> {
        if !self.tag_buffer.is_empty() {
            ctx.append_text_segment(&self.tag_buffer);
            self.tag_buffer.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserConfig;
    use crate::events::SegmentType;

    fn enter_with(ctx: &mut ParserContext, input: &str) -> XmlTagInitState {
        ctx.append(input);
        XmlTagInitState::enter(ctx)
    }

    #[test]
    fn test_tool_tag_dispatches_generic() {
        let mut ctx = ParserContext::new(ParserConfig::default());
        let mut state = enter_with(&mut ctx, "<tool name=\"search\">");

        let next = state.run(&mut ctx).unwrap();
        assert!(matches!(next, Some(ParserState::XmlTool(_))));
    }

    #[test]
    fn test_tool_tag_dispatches_specialization() {
        let mut ctx = ParserContext::new(ParserConfig::default());
        let mut state = enter_with(&mut ctx, "<tool name=\"write_file\">");

        let next = state.run(&mut ctx).unwrap();
        assert!(matches!(next, Some(ParserState::StreamedArg(_))));
    }

    #[test]
    fn test_single_quoted_name() {
        let mut ctx = ParserContext::new(ParserConfig::default());
        let mut state = enter_with(&mut ctx, "<tool name='run_terminal_cmd'>");

        let next = state.run(&mut ctx).unwrap();
        assert!(matches!(next, Some(ParserState::StreamedArg(_))));
    }

    #[test]
    fn test_doctype_dispatches_iframe() {
        let mut ctx = ParserContext::new(ParserConfig::default());
        let mut state = enter_with(&mut ctx, "<!DOCTYPE html>");

        let next = state.run(&mut ctx).unwrap();
        assert!(matches!(next, Some(ParserState::Iframe(_))));
    }

    #[test]
    fn test_unknown_tag_reverts_to_text() {
        let mut ctx = ParserContext::new(ParserConfig::default());
        let mut state = enter_with(&mut ctx, "<foobar>");

        let next = state.run(&mut ctx).unwrap();
        assert!(matches!(next, Some(ParserState::Text(_))));

        let events = ctx.drain_events();
        // Fail-fast happens at "<f", before the whole tag is buffered
        assert_eq!(events[1].delta(), Some("<f"));
    }

    #[test]
    fn test_tool_parsing_disabled_emits_text() {
        let config = ParserConfig::builder().parse_tool_calls(false).build().unwrap();
        let mut ctx = ParserContext::new(config);
        let mut state = enter_with(&mut ctx, "<tool name=\"x\">");

        let next = state.run(&mut ctx).unwrap();
        assert!(matches!(next, Some(ParserState::Text(_))));

        let events = ctx.drain_events();
        assert_eq!(events[1].delta(), Some("<tool name=\"x\">"));
        assert_eq!(ctx.current_segment_type(), Some(SegmentType::Text));
    }

    #[test]
    fn test_partial_tag_yields() {
        let mut ctx = ParserContext::new(ParserConfig::default());
        let mut state = enter_with(&mut ctx, "<too");

        let next = state.run(&mut ctx).unwrap();
        assert!(next.is_none());

        // The rest arrives in a later chunk
        ctx.append("l name=\"a\">");
        let next = state.run(&mut ctx).unwrap();
        assert!(matches!(next, Some(ParserState::XmlTool(_))));
    }

    #[test]
    fn test_finalize_flushes_buffer_as_text() {
        let mut ctx = ParserContext::new(ParserConfig::default());
        let mut state = enter_with(&mut ctx, "<too");
        state.run(&mut ctx).unwrap();

        state.finalize(&mut ctx).unwrap();
        let events = ctx.drain_events();
        assert_eq!(events[1].delta(), Some("<too"));
    }
}
