//! Specialization and tool-syntax registries.
//!
//! Two small read-only lookups keep per-tool behavior out of the state
//! machine:
//!
//! 1. The *specialization registry* maps a tool name from a `<tool name="…">`
//!    opening tag to a [`StreamedArgSpec`] describing which argument that
//!    tool streams as segment content, which raw-content sentinel pair it
//!    honors, and whether it defers START until a `path` is known.
//! 2. The *tool-syntax registry* maps non-generic segment types to the
//!    canonical tool name and argument builder the invocation adapter uses.

use crate::events::{Metadata, SegmentType};
use serde_json::Value;

// ============================================================================
// SPECIALIZED CONTENT STATES
// ============================================================================

/// How a specialized per-tool state streams its content.
///
/// Generic `<tool>` blocks stream every argument with `<arg>` context; a
/// specialization instead streams one salient argument as plain segment
/// content and swallows the surrounding scaffolding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamedArgSpec {
    /// Segment type emitted for this tool.
    pub segment_type: SegmentType,
    /// The argument whose inner text becomes the segment content.
    pub content_arg: &'static str,
    /// Optional raw-content sentinel pair carried inside the argument.
    pub markers: Option<(&'static str, &'static str)>,
    /// Defer START until a `path` argument is seen.
    pub capture_path: bool,
}

const WRITE_FILE_SPEC: StreamedArgSpec = StreamedArgSpec {
    segment_type: SegmentType::WriteFile,
    content_arg: "content",
    markers: Some(("__START_CONTENT__", "__END_CONTENT__")),
    capture_path: true,
};

const PATCH_FILE_SPEC: StreamedArgSpec = StreamedArgSpec {
    segment_type: SegmentType::PatchFile,
    content_arg: "patch",
    markers: Some(("__START_PATCH__", "__END_PATCH__")),
    capture_path: true,
};

const RUN_TERMINAL_CMD_SPEC: StreamedArgSpec = StreamedArgSpec {
    segment_type: SegmentType::RunTerminalCmd,
    content_arg: "command",
    markers: None,
    capture_path: false,
};

/// Tool name -> specialization. Unlisted names use the generic state.
const SPECIALIZATION_MAP: &[(&str, &StreamedArgSpec)] = &[
    ("write_file", &WRITE_FILE_SPEC),
    ("patch_file", &PATCH_FILE_SPEC),
    ("edit_file", &PATCH_FILE_SPEC),
    ("run_terminal_cmd", &RUN_TERMINAL_CMD_SPEC),
];

/// Look up the specialized content state for a tool name.
pub fn specialization_for(tool_name: &str) -> Option<&'static StreamedArgSpec> {
    SPECIALIZATION_MAP
        .iter()
        .find(|(name, _)| *name == tool_name)
        .map(|(_, spec)| *spec)
}

// ============================================================================
// SEGMENT TYPE -> TOOL INVOCATION
// ============================================================================

/// Builds the argument map for an invocation from segment metadata + content.
pub type ToolArgsBuilder = fn(&Metadata, &str) -> Option<Metadata>;

/// Defines how a non-generic segment type maps to a tool invocation.
#[derive(Clone, Copy)]
pub struct ToolSyntaxSpec {
    /// Canonical tool name used for the invocation.
    pub tool_name: &'static str,
    /// Argument builder; `None` from the builder suppresses the invocation.
    pub build_arguments: ToolArgsBuilder,
}

fn build_write_file_args(metadata: &Metadata, content: &str) -> Option<Metadata> {
    let path = metadata.get("path")?.as_str()?;
    let mut args = Metadata::new();
    args.insert("path".into(), Value::String(path.to_string()));
    args.insert("content".into(), Value::String(content.to_string()));
    Some(args)
}

fn build_patch_file_args(metadata: &Metadata, content: &str) -> Option<Metadata> {
    let path = metadata.get("path")?.as_str()?;
    let mut args = Metadata::new();
    args.insert("path".into(), Value::String(path.to_string()));
    args.insert("patch".into(), Value::String(content.to_string()));
    Some(args)
}

fn build_execute_bash_args(metadata: &Metadata, content: &str) -> Option<Metadata> {
    let command = if content.is_empty() {
        metadata.get("cmd").and_then(Value::as_str).unwrap_or_default()
    } else {
        content
    };
    if command.is_empty() {
        return None;
    }
    let mut args = Metadata::new();
    args.insert("command".into(), Value::String(command.to_string()));
    Some(args)
}

const TOOL_SYNTAX_MAP: &[(SegmentType, ToolSyntaxSpec)] = &[
    (
        SegmentType::WriteFile,
        ToolSyntaxSpec {
            tool_name: "write_file",
            build_arguments: build_write_file_args,
        },
    ),
    (
        SegmentType::PatchFile,
        ToolSyntaxSpec {
            tool_name: "patch_file",
            build_arguments: build_patch_file_args,
        },
    ),
    (
        SegmentType::RunTerminalCmd,
        ToolSyntaxSpec {
            tool_name: "execute_bash",
            build_arguments: build_execute_bash_args,
        },
    ),
];

/// Return the tool syntax spec for a segment type, if registered.
pub fn tool_syntax_for(segment_type: SegmentType) -> Option<&'static ToolSyntaxSpec> {
    TOOL_SYNTAX_MAP
        .iter()
        .find(|(st, _)| *st == segment_type)
        .map(|(_, spec)| spec)
}
