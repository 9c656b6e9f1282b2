//! High-level streaming façades.
//!
//! [`StreamingResponseHandler`] wires a [`StreamingParser`] to a
//! [`ToolInvocationAdapter`] and fans results out to optional callbacks: one
//! for every segment event (UI streaming) and one for every completed tool
//! invocation (execution queue). Callback panics are caught, logged, and
//! swallowed; a misbehaving consumer must not stall the stream.
//!
//! [`PassthroughHandler`] is the degenerate variant: one TEXT segment, every
//! chunk a delta, no parsing, no invocations. It exists so callers that want
//! raw passthrough still receive the same event shape.

use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::error;

use crate::adapter::ToolInvocationAdapter;
use crate::config::ParserConfig;
use crate::emitter::EventEmitter;
use crate::error::{Error, Result};
use crate::events::{Metadata, SegmentEvent, SegmentType, ToolInvocation};
use crate::factory::{create_parser, resolve_parser_name};
use crate::parser::StreamingParser;

/// Callback invoked for each segment event.
pub type EventCallback = Box<dyn FnMut(&SegmentEvent) + Send>;

/// Callback invoked for each completed tool invocation.
pub type InvocationCallback = Box<dyn FnMut(&ToolInvocation) + Send>;

/// Drives parsing, adapter fan-out, and callbacks for one response stream.
///
/// ```rust
/// use agent_stream::StreamingResponseHandler;
///
/// let mut handler = StreamingResponseHandler::new(None, None).unwrap();
/// handler.feed("Hello ").unwrap();
/// handler.feed("world").unwrap();
/// handler.finalize().unwrap();
///
/// assert!(handler.all_invocations().is_empty());
/// ```
pub struct StreamingResponseHandler {
    parser: StreamingParser,
    adapter: ToolInvocationAdapter,
    parser_name: String,
    base_config: Option<ParserConfig>,
    on_event: Option<EventCallback>,
    on_invocation: Option<InvocationCallback>,
    all_events: Vec<SegmentEvent>,
    all_invocations: Vec<ToolInvocation>,
}

impl StreamingResponseHandler {
    /// Create a handler; the variant name falls back to the environment.
    pub fn new(config: Option<ParserConfig>, variant_name: Option<&str>) -> Result<Self> {
        let parser_name = resolve_parser_name(variant_name);
        let parser = create_parser(config.clone(), Some(&parser_name))?;
        Ok(Self {
            parser,
            adapter: ToolInvocationAdapter::new(),
            parser_name,
            base_config: config,
            on_event: None,
            on_invocation: None,
            all_events: Vec::new(),
            all_invocations: Vec::new(),
        })
    }

    /// Register a callback for every segment event.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&SegmentEvent) + Send + 'static,
    {
        self.on_event = Some(Box::new(callback));
        self
    }

    /// Register a callback for every completed tool invocation.
    pub fn on_invocation<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&ToolInvocation) + Send + 'static,
    {
        self.on_invocation = Some(Box::new(callback));
        self
    }

    /// Process a chunk of LLM response text.
    pub fn feed(&mut self, chunk: &str) -> Result<Vec<SegmentEvent>> {
        let events = self.parser.feed(chunk)?;
        self.dispatch(&events);
        Ok(events)
    }

    /// Finalize parsing and flush any remaining segments.
    pub fn finalize(&mut self) -> Result<Vec<SegmentEvent>> {
        let events = self.parser.finalize()?;
        self.dispatch(&events);
        Ok(events)
    }

    fn dispatch(&mut self, events: &[SegmentEvent]) {
        for event in events {
            self.all_events.push(event.clone());

            if let Some(callback) = self.on_event.as_mut() {
                let outcome = catch_unwind(AssertUnwindSafe(|| callback(event)));
                if outcome.is_err() {
                    error!("on_event callback panicked; continuing stream");
                }
            }

            if let Some(invocation) = self.adapter.process_event(event) {
                if let Some(callback) = self.on_invocation.as_mut() {
                    let outcome = catch_unwind(AssertUnwindSafe(|| callback(&invocation)));
                    if outcome.is_err() {
                        error!("on_invocation callback panicked; continuing stream");
                    }
                }
                self.all_invocations.push(invocation);
            }
        }
    }

    /// Every event seen so far.
    pub fn all_events(&self) -> &[SegmentEvent] {
        &self.all_events
    }

    /// Every invocation produced so far.
    pub fn all_invocations(&self) -> &[ToolInvocation] {
        &self.all_invocations
    }

    /// Reset for reuse on a new stream: fresh parser and adapter, cleared
    /// accumulators. Callbacks are kept.
    pub fn reset(&mut self) -> Result<()> {
        self.parser = create_parser(self.base_config.clone(), Some(&self.parser_name))?;
        self.adapter.reset();
        self.all_events.clear();
        self.all_invocations.clear();
        Ok(())
    }
}

impl std::fmt::Debug for StreamingResponseHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingResponseHandler")
            .field("parser_name", &self.parser_name)
            .field("events", &self.all_events.len())
            .field("invocations", &self.all_invocations.len())
            .finish()
    }
}

/// Raw passthrough with the segment-event shape.
///
/// Opens one TEXT segment on the first non-empty feed, emits every chunk as
/// a CONTENT delta, and closes the segment on finalize. Produces no tool
/// invocations.
#[derive(Debug)]
pub struct PassthroughHandler {
    emitter: EventEmitter,
    started: bool,
    finalized: bool,
    all_events: Vec<SegmentEvent>,
}

impl PassthroughHandler {
    pub fn new(segment_id_prefix: Option<&str>) -> Self {
        Self {
            emitter: EventEmitter::new(segment_id_prefix),
            started: false,
            finalized: false,
            all_events: Vec::new(),
        }
    }

    /// Emit the chunk as a TEXT delta.
    pub fn feed(&mut self, chunk: &str) -> Result<Vec<SegmentEvent>> {
        if self.finalized {
            return Err(Error::FeedAfterFinalize);
        }
        if chunk.is_empty() {
            return Ok(Vec::new());
        }

        if !self.started {
            self.emitter.emit_start(SegmentType::Text, Metadata::new());
            self.started = true;
        }
        self.emitter.emit_content(chunk)?;

        let events = self.emitter.drain_events();
        self.all_events.extend(events.iter().cloned());
        Ok(events)
    }

    /// Close the TEXT segment.
    pub fn finalize(&mut self) -> Result<Vec<SegmentEvent>> {
        if self.finalized {
            return Err(Error::DoubleFinalize);
        }
        self.finalized = true;

        if self.started {
            self.emitter.emit_end();
        }
        let events = self.emitter.drain_events();
        self.all_events.extend(events.iter().cloned());
        Ok(events)
    }

    pub fn all_events(&self) -> &[SegmentEvent] {
        &self.all_events
    }
}
