//! The streaming parser driver.
//!
//! [`StreamingParser`] is the primary entry point: feed it chunks from an
//! LLM stream, collect [`SegmentEvent`]s, and finalize when the stream ends.
//!
//! ```rust
//! use agent_stream::{ParserConfig, StreamingParser};
//!
//! let mut parser = StreamingParser::new(ParserConfig::default());
//! let mut events = parser.feed("Hello, ").unwrap();
//! events.extend(parser.feed("world!").unwrap());
//! events.extend(parser.finalize().unwrap());
//!
//! let text: String = events.iter().filter_map(|e| e.delta()).collect();
//! assert_eq!(text, "Hello, world!");
//! ```

use std::collections::HashMap;

use tracing::debug;

use crate::config::ParserConfig;
use crate::context::ParserContext;
use crate::error::{Error, Result};
use crate::events::{Metadata, Segment, SegmentEvent, SegmentEventType, SegmentType};
use crate::states::ParserState;

/// Consumed scanner prefix beyond which the buffer is compacted between feeds.
const COMPACT_THRESHOLD: usize = 64 * 1024;

/// Incremental parser turning an LLM character stream into segment events.
///
/// One instance serves one stream; create a fresh parser per response. The
/// lifecycle is `feed*` then `finalize` exactly once; feeding after
/// finalize (or finalizing twice) is a usage error.
#[derive(Debug)]
pub struct StreamingParser {
    ctx: ParserContext,
    state: ParserState,
    finalized: bool,
}

impl StreamingParser {
    /// Create a parser with the given configuration.
    pub fn new(config: ParserConfig) -> Self {
        debug!(?config, "streaming parser initialized");
        Self {
            ctx: ParserContext::new(config),
            state: ParserState::text(),
            finalized: false,
        }
    }

    /// The parser's configuration.
    pub fn config(&self) -> &ParserConfig {
        self.ctx.config()
    }

    /// Feed a chunk of response text and collect the events it produced.
    ///
    /// Chunks may be any length, including empty (a no-op), and may split
    /// any delimiter; the state machine holds back ambiguous bytes until
    /// they resolve.
    pub fn feed(&mut self, chunk: &str) -> Result<Vec<SegmentEvent>> {
        if self.finalized {
            return Err(Error::FeedAfterFinalize);
        }
        if chunk.is_empty() {
            return Ok(Vec::new());
        }

        if self.ctx.consumed_prefix_len() > COMPACT_THRESHOLD {
            self.ctx.compact_scanner();
        }
        self.ctx.append(chunk);

        while self.ctx.has_more_chars() {
            if let Some(next) = self.state.run(&mut self.ctx)? {
                self.state = next;
            }
        }

        Ok(self.ctx.drain_events())
    }

    /// Signal end of stream: flush buffers, close any open segment, and
    /// return the final events.
    pub fn finalize(&mut self) -> Result<Vec<SegmentEvent>> {
        if self.finalized {
            return Err(Error::DoubleFinalize);
        }
        self.finalized = true;

        self.state.finalize(&mut self.ctx)?;
        // A coalescing TEXT segment may still be open.
        if self.ctx.current_segment_id().is_some() {
            self.ctx.emit_segment_end();
        }
        self.state = ParserState::text();

        Ok(self.ctx.drain_events())
    }

    /// Parse a complete response in one call.
    pub fn feed_and_finalize(&mut self, text: &str) -> Result<Vec<SegmentEvent>> {
        let mut events = self.feed(text)?;
        events.extend(self.finalize()?);
        Ok(events)
    }

    /// Whether `finalize` has been called.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Id of the currently open segment, if any.
    pub fn current_segment_id(&self) -> Option<&str> {
        self.ctx.current_segment_id()
    }

    /// Type of the currently open segment, if any.
    pub fn current_segment_type(&self) -> Option<SegmentType> {
        self.ctx.current_segment_type()
    }
}

/// Parse a complete response with a one-off parser.
pub fn parse_complete_response(text: &str, config: ParserConfig) -> Result<Vec<SegmentEvent>> {
    StreamingParser::new(config).feed_and_finalize(text)
}

/// Fold an event list into typed [`Segment`]s.
///
/// END metadata is merged over START metadata. Segments that never received
/// an END (stream cut off) are included with whatever accumulated.
pub fn collect_segments(events: &[SegmentEvent]) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    let mut open: HashMap<String, usize> = HashMap::new();

    for event in events {
        match event.event_type {
            SegmentEventType::Start => {
                let index = segments.len();
                segments.push(Segment {
                    id: event.segment_id.clone(),
                    segment_type: event.segment_type.unwrap_or(SegmentType::Text),
                    content: String::new(),
                    metadata: event.metadata().cloned().unwrap_or_default(),
                });
                open.insert(event.segment_id.clone(), index);
            }
            SegmentEventType::Content => {
                if let (Some(&index), Some(delta)) = (open.get(&event.segment_id), event.delta()) {
                    segments[index].content.push_str(delta);
                }
            }
            SegmentEventType::End => {
                if let Some(index) = open.remove(&event.segment_id) {
                    let final_meta = event.metadata().cloned().unwrap_or_default();
                    merge_metadata(&mut segments[index].metadata, final_meta);
                }
            }
        }
    }

    segments
}

fn merge_metadata(base: &mut Metadata, overlay: Metadata) {
    for (key, value) in overlay {
        base.insert(key, value);
    }
}
