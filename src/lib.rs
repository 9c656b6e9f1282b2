//! # Agent Stream Parser
//!
//! An incremental streaming parser for LLM response text. It converts an
//! unbounded character stream arriving in arbitrary chunks into a structured
//! sequence of lifecycle events describing typed *segments* (plain text,
//! tool invocations, file writes, terminal commands, HTML previews,
//! reasoning blocks) and, for tool-bearing segments, yields fully-formed
//! *tool invocations* ready for downstream dispatch.
//!
//! ## Why a dedicated parser
//!
//! A language model emits one continuous stream in which specialized markup
//! (XML-like tags, JSON tool objects, sentinel-framed content) is
//! interleaved with free text. Getting this right means:
//!
//! - detecting segment boundaries character by character, without
//!   backtracking beyond a bounded window;
//! - streaming partial content to a UI as early as possible while never
//!   emitting a byte that might belong to a closing delimiter;
//! - handling delimiters split across chunk boundaries at any offset;
//! - telling a *true* end sentinel apart from the same literal appearing
//!   inside user content;
//! - preserving exact inner bytes (whitespace, XML-special characters inside
//!   raw-content sentinels) so the consumer sees the model's payload.
//!
//! ## Quick start
//!
//! ```rust
//! use agent_stream::{ParserConfig, StreamingParser, collect_segments};
//!
//! let mut parser = StreamingParser::new(ParserConfig::default());
//! let mut events = parser.feed("Reading the file now: ").unwrap();
//! events.extend(
//!     parser
//!         .feed("<tool name=\"search\"><arguments><arg name=\"q\">rust</arg></arguments></tool>")
//!         .unwrap(),
//! );
//! events.extend(parser.finalize().unwrap());
//!
//! let segments = collect_segments(&events);
//! assert_eq!(segments.len(), 2); // text + tool_call
//! ```
//!
//! For the full pipeline (events fanned out to a UI callback and tool
//! invocations to an execution queue) use the handler façade:
//!
//! ```rust
//! use agent_stream::StreamingResponseHandler;
//!
//! let mut handler = StreamingResponseHandler::new(None, Some("xml"))
//!     .unwrap()
//!     .on_invocation(|invocation| println!("dispatch {}", invocation.name));
//!
//! handler.feed("<tool name=\"ping\"><arguments></arguments></tool>").unwrap();
//! handler.finalize().unwrap();
//! assert_eq!(handler.all_invocations().len(), 1);
//! ```
//!
//! ## Architecture
//!
//! - **scanner**: append-only character buffer with a forward cursor
//! - **emitter**: segment ids, lifecycle events, the one open segment
//! - **states**: the recognizer state machine (text, XML tool, specialized
//!   tools, JSON, sentinel framing, HTML preview)
//! - **registry**: per-tool specializations and segment-type → tool mappings
//! - **dialect**: provider-specific JSON tool-call shapes
//! - **adapter**: segment events → tool invocations
//! - **handler**: the public feed/finalize façade with callbacks
//! - **factory**: variant selection (`xml`/`json`/`native`/`sentinel`) from
//!   code or the `AUTOBYTEUS_STREAM_PARSER` environment variable
//!
//! The parser is strictly single-threaded and synchronous: no I/O, no
//! suspension, one instance per stream.

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

/// Tool-invocation adapter: turns completed tool segments into dispatchable
/// invocations whose id equals the segment id.
mod adapter;

/// Parser configuration: strategy order, JSON signatures, id prefixes.
mod config;

/// Shared state (scanner + emitter + config) the state machine runs against.
mod context;

/// Provider dialects for JSON-formatted tool calls.
mod dialect;

/// Event emission, segment id allocation, and open-segment tracking.
mod emitter;

/// Error types and the crate-wide `Result` alias.
mod error;

/// Segment, event, and invocation data model with the JSON wire shape.
mod events;

/// Parser variant selection from configuration or environment.
mod factory;

/// Streaming façades: parser + adapter + callbacks, and raw passthrough.
mod handler;

/// The `feed`/`finalize` driver around the state machine.
mod parser;

/// Specialization and tool-syntax lookup tables.
mod registry;

/// Append-only scanner with cursor save/rewind.
mod scanner;

/// The recognizer state machine.
mod states;

// ============================================================================
// PUBLIC EXPORTS
// ============================================================================

pub use adapter::ToolInvocationAdapter;
pub use config::{DEFAULT_JSON_PATTERNS, ParserConfig, ParserConfigBuilder, Strategy};
pub use dialect::{JsonDialect, ParsedToolCall};
pub use emitter::EventEmitter;
pub use error::{Error, Result};
pub use events::{
    ArgPhase, EventPayload, Metadata, Segment, SegmentEvent, SegmentEventType, SegmentType,
    ToolInvocation,
};
pub use factory::{
    DEFAULT_PARSER_NAME, ENV_PARSER_NAME, ParserVariant, create_parser, resolve_parser_name,
};
pub use handler::{
    EventCallback, InvocationCallback, PassthroughHandler, StreamingResponseHandler,
};
pub use parser::{StreamingParser, collect_segments, parse_complete_response};
pub use registry::{StreamedArgSpec, ToolArgsBuilder, ToolSyntaxSpec, specialization_for, tool_syntax_for};
pub use scanner::StreamScanner;

// ============================================================================
// CONVENIENCE PRELUDE
// ============================================================================

/// The most commonly used types and functions.
///
/// Import with `use agent_stream::prelude::*;`.
pub mod prelude {
    pub use crate::{
        ArgPhase, Error, JsonDialect, ParserConfig, ParserVariant, Result, Segment, SegmentEvent,
        SegmentEventType, SegmentType, StreamingParser, StreamingResponseHandler, ToolInvocation,
        ToolInvocationAdapter, collect_segments, parse_complete_response,
    };
}
