//! Signature probing for JSON tool calls.

use crate::context::ParserContext;
use crate::error::Result;

use super::{JsonToolState, ParserState, PrefixMatch, match_prefix};

/// Classifies a `{`/`[` run against the configured signature prefixes.
///
/// The state buffers characters until the accumulation either matches one of
/// `json_tool_patterns` (hand off to the JSON tool state), can still grow
/// into one (wait for more bytes), or can never match (flush as text).
#[derive(Debug, Default)]
pub(crate) struct JsonInitState {
    buffer: String,
}

impl JsonInitState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(&mut self, ctx: &mut ParserContext) -> Result<Option<ParserState>> {
        while ctx.has_more_chars() {
            let Some(c) = ctx.peek_char() else { break };
            self.buffer.push(c);
            ctx.advance();

            match classify(&self.buffer, ctx.json_tool_patterns()) {
                PrefixMatch::Complete => {
                    let signature = std::mem::take(&mut self.buffer);
                    return Ok(Some(ParserState::JsonTool(JsonToolState::new(signature))));
                }
                PrefixMatch::Viable => continue,
                PrefixMatch::None => {
                    ctx.append_text_segment(&self.buffer);
                    self.buffer.clear();
                    return Ok(Some(ParserState::text()));
                }
            }
        }
        Ok(None)
    }

    pub fn finalize(&mut self, ctx: &mut ParserContext) -> Result<()> {
        if !self.buffer.is_empty() {
            ctx.append_text_segment(&self.buffer);
            self.buffer.clear();
        }
        Ok(())
    }
}

/// Best classification across all patterns: a full match wins, any viable
/// pattern keeps the probe alive, otherwise the buffer is plain text.
fn classify(buffer: &str, patterns: &[String]) -> PrefixMatch {
    let mut best = PrefixMatch::None;
    for pattern in patterns {
        match match_prefix(buffer, pattern) {
            PrefixMatch::Complete => return PrefixMatch::Complete,
            PrefixMatch::Viable => best = PrefixMatch::Viable,
            PrefixMatch::None => {}
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ParserConfig, Strategy};

    fn json_ctx() -> ParserContext {
        let config = ParserConfig::builder()
            .strategy_order(vec![Strategy::JsonTool])
            .build()
            .unwrap();
        ParserContext::new(config)
    }

    #[test]
    fn test_signature_match_hands_off() {
        let mut ctx = json_ctx();
        let mut state = JsonInitState::new();

        ctx.append("{\"name\"");
        let next = state.run(&mut ctx).unwrap();
        assert!(matches!(next, Some(ParserState::JsonTool(_))));
    }

    #[test]
    fn test_partial_signature_waits() {
        let mut ctx = json_ctx();
        let mut state = JsonInitState::new();

        ctx.append("{\"na");
        let next = state.run(&mut ctx).unwrap();
        assert!(next.is_none());

        ctx.append("me\"");
        let next = state.run(&mut ctx).unwrap();
        assert!(matches!(next, Some(ParserState::JsonTool(_))));
    }

    #[test]
    fn test_no_match_flushes_text() {
        let mut ctx = json_ctx();
        let mut state = JsonInitState::new();

        ctx.append("{not a tool");
        let next = state.run(&mut ctx).unwrap();
        assert!(matches!(next, Some(ParserState::Text(_))));

        let events = ctx.drain_events();
        assert_eq!(events[1].delta(), Some("{n"));
    }

    #[test]
    fn test_finalize_flushes_partial_as_text() {
        let mut ctx = json_ctx();
        let mut state = JsonInitState::new();

        ctx.append("{\"na");
        state.run(&mut ctx).unwrap();
        state.finalize(&mut ctx).unwrap();

        let events = ctx.drain_events();
        assert_eq!(events[1].delta(), Some("{\"na"));
    }

    #[test]
    fn test_array_signature() {
        let mut ctx = json_ctx();
        let mut state = JsonInitState::new();

        ctx.append("[{\"tool\"");
        let next = state.run(&mut ctx).unwrap();
        assert!(matches!(next, Some(ParserState::JsonTool(_))));
    }
}
