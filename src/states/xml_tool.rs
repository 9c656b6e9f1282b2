//! Generic `<tool name="…">…</tool>` parsing with streamed arguments.
//!
//! The inner body of a tool call is a small XML dialect:
//!
//! ```text
//! <tool name="search">
//!   <arguments>
//!     <arg name="query">rust parsers</arg>
//!     <arg name="filters"><item>recent</item><item>code</item></arg>
//!   </arguments>
//! </tool>
//! ```
//!
//! Structural tags are consumed silently; literal text inside an `<arg>` is
//! streamed as CONTENT deltas carrying the argument name and a
//! start/delta/end phase. When `</tool>` closes the block, the accumulated
//! body is parsed into the final argument map (strict XML first, a sanitized
//! retry second, a permissive tag-pair scan last) and attached to the END
//! event's metadata.
//!
//! Inside an `<arg>`, the literal `__START_CONTENT__` switches to a raw
//! guard that streams every byte verbatim (including XML-special characters)
//! until `__END_CONTENT__`; the markers themselves are stripped.

use std::sync::LazyLock;

use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::context::ParserContext;
use crate::error::Result;
use crate::events::{ArgPhase, Metadata, SegmentType};

use super::{ParserState, PrefixMatch, floor_char_boundary, match_prefix_ci, partial_suffix_len};

const CLOSING_TAG: &str = "</tool>";
const ARGS_OPEN: &str = "<arguments>";
const ARGS_CLOSE: &str = "</arguments>";
const ITEM_OPEN: &str = "<item>";
const ITEM_CLOSE: &str = "</item>";
const ARG_CLOSE: &str = "</arg>";
const RAW_START: &str = "__START_CONTENT__";
const RAW_END: &str = "__END_CONTENT__";

static ARG_OPEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^<arg\s+name\s*=\s*["']([^"']+)["']\s*>"#).expect("valid regex")
});

/// Streams the body of a generic tool call.
#[derive(Debug)]
pub(crate) struct XmlToolState {
    opening_tag: String,
    tool_name: Option<String>,
    started: bool,
    completed: bool,
    buffer: String,
    full_content: String,
    in_raw_guard: bool,
    strip_newline_next: bool,
    current_arg: Option<String>,
    arg_stack: Vec<Option<String>>,
}

impl XmlToolState {
    pub fn new(tool_name: Option<String>, opening_tag: String) -> Self {
        Self {
            opening_tag,
            tool_name,
            started: false,
            completed: false,
            buffer: String::new(),
            full_content: String::new(),
            in_raw_guard: false,
            strip_newline_next: false,
            current_arg: None,
            arg_stack: Vec::new(),
        }
    }

    pub fn run(&mut self, ctx: &mut ParserContext) -> Result<Option<ParserState>> {
        if !self.started {
            let Some(name) = self.tool_name.clone() else {
                ctx.append_text_segment(&self.opening_tag);
                return Ok(Some(ParserState::text()));
            };
            let mut metadata = Metadata::new();
            metadata.insert("tool_name".into(), Value::String(name));
            ctx.emit_segment_start(SegmentType::ToolCall, metadata);
            self.started = true;
        }

        if !ctx.has_more_chars() {
            return Ok(None);
        }

        let chunk = ctx.consume_remaining();
        self.buffer.push_str(&chunk);
        self.process_buffer(ctx)
    }

    fn process_buffer(&mut self, ctx: &mut ParserContext) -> Result<Option<ParserState>> {
        while !self.buffer.is_empty() {
            if self.strip_newline_next {
                self.strip_newline_next = false;
                if self.buffer.starts_with('\n') {
                    self.buffer.remove(0);
                    continue;
                }
            }

            if self.current_arg.is_some() || !self.arg_stack.is_empty() {
                match self.process_inside_arg(ctx)? {
                    Step::Continue => continue,
                    Step::Yield => return Ok(None),
                    Step::Done => return Ok(Some(ParserState::text())),
                }
            } else {
                match self.process_outside_arg(ctx)? {
                    Step::Continue => continue,
                    Step::Yield => return Ok(None),
                    Step::Done => return Ok(Some(ParserState::text())),
                }
            }
        }
        Ok(None)
    }

    fn process_inside_arg(&mut self, ctx: &mut ParserContext) -> Result<Step> {
        if self.in_raw_guard {
            return self.process_raw_guard(ctx);
        }

        let marker_idx = self.buffer.find(RAW_START);
        let lt_idx = self.buffer.find('<');
        let next_idx = match (marker_idx, lt_idx) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        let Some(next_idx) = next_idx else {
            // No structural bytes; emit all but a possible marker prefix.
            let holdback = partial_suffix_len(&self.buffer, RAW_START);
            let safe: String = self.buffer[..self.buffer.len() - holdback].to_string();
            if !safe.is_empty() {
                self.emit_arg_delta(ctx, &safe)?;
                self.append_full_text(&safe);
                self.buffer.drain(..safe.len());
            }
            return Ok(Step::Yield);
        };

        if next_idx > 0 {
            let literal: String = self.buffer[..next_idx].to_string();
            self.emit_arg_delta(ctx, &literal)?;
            self.append_full_text(&literal);
            self.buffer.drain(..next_idx);
            return Ok(Step::Continue);
        }

        if marker_idx == Some(0) {
            self.buffer.drain(..RAW_START.len());
            self.in_raw_guard = true;
            self.strip_newline_next = true;
            return Ok(Step::Continue);
        }

        // The buffer starts with '<'.
        if match_prefix_ci(&self.buffer, ARG_CLOSE) == PrefixMatch::Complete {
            self.append_full_raw(ARG_CLOSE);
            self.emit_arg_phase(ctx, ArgPhase::End)?;
            self.pop_arg();
            self.buffer.drain(..ARG_CLOSE.len());
            return Ok(Step::Continue);
        }

        if is_arg_open_prefix(&self.buffer) {
            return match self.buffer.find('>') {
                None => Ok(Step::Yield),
                Some(end_idx) => {
                    let tag_text: String = self.buffer[..=end_idx].to_string();
                    self.append_full_raw(&tag_text);
                    self.push_arg(ctx, &tag_text)?;
                    self.buffer.drain(..=end_idx);
                    Ok(Step::Continue)
                }
            };
        }

        for structural in [ITEM_OPEN, ITEM_CLOSE] {
            if match_prefix_ci(&self.buffer, structural) == PrefixMatch::Complete {
                self.append_full_raw(structural);
                self.buffer.drain(..structural.len());
                return Ok(Step::Continue);
            }
        }

        if match_prefix_ci(&self.buffer, ARGS_CLOSE) == PrefixMatch::Complete {
            // Unterminated <arg>; recover by closing everything open.
            self.close_all_open_args(ctx)?;
            self.append_full_raw(ARGS_CLOSE);
            self.buffer.drain(..ARGS_CLOSE.len());
            return Ok(Step::Continue);
        }

        if match_prefix_ci(&self.buffer, CLOSING_TAG) == PrefixMatch::Complete {
            self.close_all_open_args(ctx)?;
            return self.complete_tool(ctx).map(|_| Step::Done);
        }

        if self.any_viable(&[ARG_CLOSE, ARGS_CLOSE, "<arg", ITEM_OPEN, ITEM_CLOSE, CLOSING_TAG]) {
            return Ok(Step::Yield);
        }

        // Proven literal '<' inside an argument value.
        self.emit_arg_delta(ctx, "<")?;
        self.append_full_text("<");
        self.buffer.remove(0);
        Ok(Step::Continue)
    }

    fn process_outside_arg(&mut self, ctx: &mut ParserContext) -> Result<Step> {
        let Some(lt_idx) = self.buffer.find('<') else {
            let text = std::mem::take(&mut self.buffer);
            self.emit_outside_delta(ctx, &text)?;
            self.append_full_text(&text);
            return Ok(Step::Yield);
        };

        if lt_idx > 0 {
            let text: String = self.buffer[..lt_idx].to_string();
            self.emit_outside_delta(ctx, &text)?;
            self.append_full_text(&text);
            self.buffer.drain(..lt_idx);
            return Ok(Step::Continue);
        }

        if match_prefix_ci(&self.buffer, CLOSING_TAG) == PrefixMatch::Complete {
            return self.complete_tool(ctx).map(|_| Step::Done);
        }

        if match_prefix_ci(&self.buffer, ARGS_OPEN) == PrefixMatch::Complete {
            self.append_full_raw(ARGS_OPEN);
            self.buffer.drain(..ARGS_OPEN.len());
            return Ok(Step::Continue);
        }

        if match_prefix_ci(&self.buffer, ARGS_CLOSE) == PrefixMatch::Complete {
            self.append_full_raw(ARGS_CLOSE);
            self.buffer.drain(..ARGS_CLOSE.len());
            return Ok(Step::Continue);
        }

        if is_arg_open_prefix(&self.buffer) {
            return match self.buffer.find('>') {
                None => Ok(Step::Yield),
                Some(end_idx) => {
                    let tag_text: String = self.buffer[..=end_idx].to_string();
                    self.append_full_raw(&tag_text);
                    self.push_arg(ctx, &tag_text)?;
                    self.buffer.drain(..=end_idx);
                    Ok(Step::Continue)
                }
            };
        }

        if self.any_viable(&[CLOSING_TAG, ARGS_OPEN, ARGS_CLOSE, "<arg"]) {
            return Ok(Step::Yield);
        }

        self.emit_outside_delta(ctx, "<")?;
        self.append_full_text("<");
        self.buffer.remove(0);
        Ok(Step::Continue)
    }

    fn process_raw_guard(&mut self, ctx: &mut ParserContext) -> Result<Step> {
        match self.buffer.find(RAW_END) {
            None => {
                let holdback = (RAW_END.len() - 1).min(self.buffer.len());
                let split = floor_char_boundary(&self.buffer, self.buffer.len() - holdback);
                let safe: String = self.buffer[..split].to_string();
                if !safe.is_empty() {
                    self.emit_arg_delta(ctx, &safe)?;
                    self.append_full_text(&safe);
                    self.buffer.drain(..safe.len());
                }
                Ok(Step::Yield)
            }
            Some(end_idx) => {
                if end_idx > 0 {
                    let content: String = self.buffer[..end_idx].to_string();
                    self.emit_arg_delta(ctx, &content)?;
                    self.append_full_text(&content);
                }
                self.buffer.drain(..end_idx + RAW_END.len());
                self.in_raw_guard = false;
                self.strip_newline_next = true;
                Ok(Step::Continue)
            }
        }
    }

    fn any_viable(&self, patterns: &[&str]) -> bool {
        patterns
            .iter()
            .any(|p| match_prefix_ci(&self.buffer, p) == PrefixMatch::Viable)
    }

    fn emit_arg_delta(&mut self, ctx: &mut ParserContext, content: &str) -> Result<()> {
        if !content.is_empty() {
            ctx.emit_arg_content(content, self.current_arg.as_deref(), Some(ArgPhase::Delta))?;
        }
        Ok(())
    }

    fn emit_outside_delta(&mut self, ctx: &mut ParserContext, content: &str) -> Result<()> {
        if !content.is_empty() {
            ctx.emit_segment_content(content)?;
        }
        Ok(())
    }

    fn emit_arg_phase(&mut self, ctx: &mut ParserContext, phase: ArgPhase) -> Result<()> {
        if let Some(name) = self.current_arg.clone() {
            ctx.emit_arg_content("", Some(&name), Some(phase))?;
        }
        Ok(())
    }

    fn push_arg(&mut self, ctx: &mut ParserContext, tag_text: &str) -> Result<()> {
        let name = ARG_OPEN_RE
            .captures(tag_text)
            .map(|caps| caps[1].to_string());
        self.arg_stack.push(self.current_arg.take());
        self.current_arg = name;
        self.emit_arg_phase(ctx, ArgPhase::Start)
    }

    fn pop_arg(&mut self) {
        self.current_arg = self.arg_stack.pop().flatten();
        self.in_raw_guard = false;
    }

    fn close_all_open_args(&mut self, ctx: &mut ParserContext) -> Result<()> {
        while self.current_arg.is_some() {
            self.emit_arg_phase(ctx, ArgPhase::End)?;
            self.pop_arg();
        }
        self.arg_stack.clear();
        Ok(())
    }

    fn append_full_raw(&mut self, content: &str) {
        self.full_content.push_str(content);
    }

    fn append_full_text(&mut self, content: &str) {
        self.full_content.push_str(&escape_text(content));
    }

    /// Assemble arguments, close the segment, and return trailing bytes.
    fn complete_tool(&mut self, ctx: &mut ParserContext) -> Result<()> {
        let after_len = self.buffer.len() - CLOSING_TAG.len();
        let arguments = parse_arguments(&self.full_content);
        ctx.update_segment_metadata("arguments", Value::Object(arguments));
        ctx.emit_segment_end();
        if after_len > 0 {
            ctx.rewind_by(after_len);
        }
        self.buffer.clear();
        self.completed = true;
        Ok(())
    }

    pub fn finalize(&mut self, ctx: &mut ParserContext) -> Result<()> {
        let remaining = ctx.consume_remaining();

        if !self.started {
            let text = format!("{}{}{}", self.opening_tag, self.buffer, remaining);
            if !text.is_empty() {
                ctx.append_text_segment(&text);
            }
            return Ok(());
        }

        self.buffer.push_str(&remaining);
        self.process_buffer(ctx)?;

        if !self.completed {
            let leftover = std::mem::take(&mut self.buffer);
            if !leftover.is_empty() {
                if self.current_arg.is_some() {
                    self.emit_arg_delta(ctx, &leftover)?;
                } else {
                    self.emit_outside_delta(ctx, &leftover)?;
                }
                self.append_full_text(&leftover);
            }
            self.close_all_open_args(ctx)?;
            self.buffer.clear();
            let arguments = parse_arguments(&self.full_content);
            ctx.update_segment_metadata("arguments", Value::Object(arguments));
            ctx.emit_segment_end();
            self.completed = true;
        }
        Ok(())
    }
}

/// Loop step outcome inside the buffer processor.
enum Step {
    Continue,
    Yield,
    Done,
}

/// `<arg` followed by whitespace, `>`, or `/` opens an argument tag.
fn is_arg_open_prefix(buffer: &str) -> bool {
    if match_prefix_ci(buffer, "<arg") != PrefixMatch::Complete {
        return false;
    }
    match buffer.as_bytes().get(4) {
        None => true,
        Some(b) => b.is_ascii_whitespace() || *b == b'>' || *b == b'/',
    }
}

fn escape_text(content: &str) -> String {
    content
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// ============================================================================
// ARGUMENT ASSEMBLY
// ============================================================================

static ARGS_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<arguments>(.*?)</arguments>").expect("valid regex"));

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[A-Za-z!/][^>]*>").expect("valid regex"));

static ENTITY_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:amp|lt|gt|quot|apos|#[0-9]+|#x[0-9a-fA-F]+);").expect("valid regex")
});

static SIMPLE_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([A-Za-z_][A-Za-z0-9_]*)>").expect("valid regex"));

/// Parse the accumulated tool body into an argument map.
///
/// Ladder: strict XML parse of the (re-escaped) body, then a sanitized
/// retry, then a permissive `<k>v</k>` pair scan. An empty map is the final
/// fallback; the invocation is still emitted if the tool name is known.
pub(crate) fn parse_arguments(content: &str) -> Metadata {
    let args_content = match ARGS_BLOCK_RE.captures(content) {
        Some(caps) => caps[1].to_string(),
        None => content.trim().to_string(),
    };

    if args_content.is_empty() {
        return Metadata::new();
    }

    if let Some(args) = parse_strict(&args_content) {
        return args;
    }

    let sanitized = sanitize_fragment(&args_content);
    if let Some(args) = parse_strict(&sanitized) {
        return args;
    }

    debug!("argument XML unparseable, falling back to permissive pair scan");
    parse_legacy_pairs(&args_content)
}

#[derive(Debug, Default)]
struct XmlNode {
    tag: String,
    name_attr: Option<String>,
    text: String,
    children: Vec<XmlNode>,
}

fn parse_strict(fragment: &str) -> Option<Metadata> {
    let wrapped = format!("<root>{fragment}</root>");
    let root = parse_xml_tree(&wrapped)?;
    Some(children_map(&root))
}

fn parse_xml_tree(xml: &str) -> Option<XmlNode> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<XmlNode> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let mut node = XmlNode {
                    tag: String::from_utf8_lossy(start.name().as_ref()).to_string(),
                    ..XmlNode::default()
                };
                for attr in start.attributes() {
                    let attr = attr.ok()?;
                    if attr.key.as_ref() == b"name" {
                        node.name_attr = Some(attr.unescape_value().ok()?.to_string());
                    }
                }
                stack.push(node);
            }
            Ok(Event::Empty(start)) => {
                let mut node = XmlNode {
                    tag: String::from_utf8_lossy(start.name().as_ref()).to_string(),
                    ..XmlNode::default()
                };
                for attr in start.attributes() {
                    let attr = attr.ok()?;
                    if attr.key.as_ref() == b"name" {
                        node.name_attr = Some(attr.unescape_value().ok()?.to_string());
                    }
                }
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => return None,
                }
            }
            Ok(Event::Text(text)) => {
                let unescaped = text.unescape().ok()?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&unescaped);
                }
            }
            Ok(Event::CData(cdata)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&cdata));
                }
            }
            Ok(Event::End(_)) => {
                let node = stack.pop()?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => return Some(node),
                }
            }
            Ok(Event::Eof) => return None,
            Ok(_) => {}
            Err(_) => return None,
        }
    }
}

fn children_map(node: &XmlNode) -> Metadata {
    let mut map = Metadata::new();
    for child in &node.children {
        let key = child.name_attr.clone().unwrap_or_else(|| child.tag.clone());
        if key.is_empty() {
            continue;
        }
        map.insert(key, node_value(child));
    }
    map
}

fn node_value(node: &XmlNode) -> Value {
    let items: Vec<&XmlNode> = node.children.iter().filter(|c| c.tag == "item").collect();
    if !items.is_empty() {
        return Value::Array(items.into_iter().map(item_value).collect());
    }

    if !node.children.is_empty() {
        return Value::Object(children_map(node));
    }

    Value::String(node.text.trim().to_string())
}

fn item_value(node: &XmlNode) -> Value {
    if !node.children.is_empty() {
        return Value::Object(children_map(node));
    }
    Value::String(node.text.trim().to_string())
}

/// Escape raw text runs so the fragment becomes parseable, leaving tags alone.
fn sanitize_fragment(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut last = 0;

    for m in TAG_RE.find_iter(fragment) {
        escape_text_run(&fragment[last..m.start()], &mut out);
        out.push_str(m.as_str());
        last = m.end();
    }
    escape_text_run(&fragment[last..], &mut out);
    out
}

fn escape_text_run(run: &str, out: &mut String) {
    for (i, c) in run.char_indices() {
        match c {
            '&' if !ENTITY_START_RE.is_match(&run[i + 1..]) => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            _ => out.push(c),
        }
    }
}

/// Last-resort extraction of flat `<k>v</k>` pairs.
fn parse_legacy_pairs(fragment: &str) -> Metadata {
    let mut args = Metadata::new();
    let mut pos = 0;

    while let Some(caps) = SIMPLE_OPEN_RE.captures(&fragment[pos..]) {
        let open = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
        let name = caps[1].to_string();
        let value_start = pos + open.1;
        let close_tag = format!("</{name}>");

        match fragment[value_start..].find(&close_tag) {
            Some(idx) => {
                let value = fragment[value_start..value_start + idx].trim().to_string();
                args.insert(name, Value::String(value));
                pos = value_start + idx + close_tag.len();
            }
            None => {
                pos += open.1;
            }
        }
    }
    args
}
