//! Default state: plain text with trigger detection.

use crate::config::Strategy;
use crate::context::ParserContext;
use crate::error::Result;

use super::{JsonInitState, ParserState, SentinelState, XmlTagInitState};

/// Consumes plain text, watching each character for a recognizer trigger.
///
/// Text is not emitted eagerly: the state walks the scanner and flushes the
/// accumulated slice as one delta when a trigger is found or the buffer runs
/// out. Which triggers are honored depends on the configured strategy order:
///
/// - `<` hands off to XML tag initialization when `xml_tag` is enabled.
/// - `{` / `[` hand off to JSON initialization when `json_tool` is enabled.
/// - `[` hands off to sentinel parsing when `sentinel` is enabled; with both
///   bracket strategies enabled, the earlier one in the order claims it.
#[derive(Debug, Default)]
pub(crate) struct TextState;

impl TextState {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&mut self, ctx: &mut ParserContext) -> Result<Option<ParserState>> {
        let start = ctx.position();

        while ctx.has_more_chars() {
            let Some(c) = ctx.peek_char() else { break };

            if let Some(next) = next_state_for(ctx, c) {
                flush_text(ctx, start);
                let state = build_state(ctx, next);
                return Ok(Some(state));
            }

            ctx.advance();
        }

        flush_text(ctx, start);
        Ok(None)
    }

    pub fn finalize(&mut self, _ctx: &mut ParserContext) -> Result<()> {
        // run() already flushes accumulated text at buffer exhaustion.
        Ok(())
    }
}

/// Which kind of state a trigger character selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Xml,
    Json,
    Sentinel,
}

fn next_state_for(ctx: &ParserContext, c: char) -> Option<Trigger> {
    match c {
        '<' if ctx.has_strategy(Strategy::XmlTag) => Some(Trigger::Xml),
        '{' if ctx.parse_tool_calls() && ctx.has_strategy(Strategy::JsonTool) => {
            Some(Trigger::Json)
        }
        '[' if ctx.parse_tool_calls() => {
            // The earlier bracket strategy in the order claims '['.
            ctx.config()
                .strategy_order
                .iter()
                .find_map(|strategy| match strategy {
                    Strategy::JsonTool => Some(Trigger::Json),
                    Strategy::Sentinel => Some(Trigger::Sentinel),
                    Strategy::XmlTag => None,
                })
        }
        _ => None,
    }
}

fn build_state(ctx: &mut ParserContext, trigger: Trigger) -> ParserState {
    match trigger {
        Trigger::Xml => ParserState::XmlInit(XmlTagInitState::enter(ctx)),
        Trigger::Json => ParserState::JsonInit(JsonInitState::new()),
        Trigger::Sentinel => ParserState::Sentinel(SentinelState::new()),
    }
}

fn flush_text(ctx: &mut ParserContext, start: usize) {
    let text = ctx.substring(start, ctx.position()).to_string();
    if !text.is_empty() {
        ctx.append_text_segment(&text);
    }
}
