//! Provider dialects for JSON-formatted tool calls.
//!
//! Different providers wrap the same information (a tool name and an
//! argument map) in different JSON shapes. A [`JsonDialect`] turns a
//! complete JSON blob into zero or more [`ParsedToolCall`]s; it is the
//! authoritative definition of which keys are accepted for its provider.

use crate::events::Metadata;
use serde_json::Value;
use tracing::debug;

/// A tool call extracted from a JSON blob, before it becomes a segment.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedToolCall {
    pub name: String,
    pub arguments: Metadata,
}

/// JSON tool-call dialect profiles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JsonDialect {
    /// Best-effort dialect: accepts `name`/`tool`/`function.name` for the
    /// tool name and `arguments`/`args`/`parameters`/`function.arguments`
    /// (object or JSON-encoded string) for the arguments. Handles a single
    /// object, a top-level array, and a `tool_calls` wrapper.
    #[default]
    Default,
    /// OpenAI chat-completions shape:
    /// `{"tool_calls":[{"function":{"name":…,"arguments":"<json string>"}}]}`.
    OpenAi,
}

impl JsonDialect {
    /// Parse a complete JSON string into tool calls.
    ///
    /// Returns an empty vector when the blob is valid JSON but carries no
    /// recognizable tool call; the caller degrades it to text.
    pub fn parse(&self, raw: &str) -> Vec<ParsedToolCall> {
        let Ok(data) = serde_json::from_str::<Value>(raw) else {
            debug!("json dialect: blob is not valid JSON");
            return Vec::new();
        };

        match self {
            JsonDialect::Default => parse_default(&data),
            JsonDialect::OpenAi => parse_openai(&data),
        }
    }
}

fn parse_default(data: &Value) -> Vec<ParsedToolCall> {
    let records: Vec<&Value> = match data {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => match map.get("tool_calls") {
            Some(Value::Array(items)) => items.iter().collect(),
            _ => vec![data],
        },
        _ => return Vec::new(),
    };

    records.into_iter().filter_map(parse_default_record).collect()
}

fn parse_default_record(record: &Value) -> Option<ParsedToolCall> {
    let obj = record.as_object()?;
    let function = obj.get("function").and_then(Value::as_object);

    let name = obj
        .get("name")
        .or_else(|| obj.get("tool"))
        .or_else(|| function.and_then(|f| f.get("name")))
        .and_then(Value::as_str)?;

    let args = obj
        .get("arguments")
        .or_else(|| obj.get("args"))
        .or_else(|| obj.get("parameters"))
        .or_else(|| function.and_then(|f| f.get("arguments")));

    let arguments = match args {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => map,
            _ => {
                debug!(tool = name, "json dialect: argument string is not a JSON object");
                return None;
            }
        },
        Some(Value::Null) | None => Metadata::new(),
        Some(_) => {
            debug!(tool = name, "json dialect: unsupported arguments value");
            return None;
        }
    };

    Some(ParsedToolCall {
        name: name.to_string(),
        arguments,
    })
}

fn parse_openai(data: &Value) -> Vec<ParsedToolCall> {
    let Some(calls) = data.get("tool_calls").and_then(Value::as_array) else {
        debug!("json dialect: missing tool_calls array");
        return Vec::new();
    };

    calls
        .iter()
        .filter_map(|call| {
            let function = call.get("function")?.as_object()?;
            let name = function.get("name")?.as_str()?;
            let arguments_str = function.get("arguments")?.as_str()?;

            match serde_json::from_str::<Value>(arguments_str) {
                Ok(Value::Object(map)) => Some(ParsedToolCall {
                    name: name.to_string(),
                    arguments: map,
                }),
                _ => {
                    debug!(tool = name, "json dialect: unparseable arguments string");
                    None
                }
            }
        })
        .collect()
}
