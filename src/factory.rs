//! Parser variant selection from configuration or environment.

use std::env;
use std::str::FromStr;

use crate::config::{ParserConfig, Strategy};
use crate::error::{Error, Result};
use crate::parser::StreamingParser;

/// Environment variable that selects the default parser variant.
pub const ENV_PARSER_NAME: &str = "AUTOBYTEUS_STREAM_PARSER";

/// Variant used when neither code nor environment selects one.
pub const DEFAULT_PARSER_NAME: &str = "xml";

/// Named parser variants.
///
/// `native` and `api_tool_call` are aliases for a parser with tool parsing
/// disabled: tool calls arrive via a provider side channel, so tool markup
/// in the text stream passes through as plain text (HTML previews are still
/// recognized).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserVariant {
    /// XML `<tool>` markup (the default).
    Xml,
    /// JSON tool objects.
    Json,
    /// Tool parsing disabled; tools arrive out-of-band.
    Native,
    /// Sentinel framing (`[[SEG_START …]]`).
    Sentinel,
    /// Alias of `Native` for providers with first-class tool-call APIs.
    ApiToolCall,
}

impl ParserVariant {
    /// All recognized variant names, for error messages.
    pub const NAMES: &'static [&'static str] = &["xml", "json", "native", "sentinel", "api_tool_call"];

    /// Apply this variant's strategy to a base configuration.
    pub fn apply(self, base: ParserConfig) -> ParserConfig {
        let mut config = base;
        match self {
            ParserVariant::Xml => {
                config.parse_tool_calls = true;
                config.strategy_order = vec![Strategy::XmlTag];
            }
            ParserVariant::Json => {
                config.parse_tool_calls = true;
                config.strategy_order = vec![Strategy::JsonTool];
            }
            ParserVariant::Sentinel => {
                config.parse_tool_calls = true;
                config.strategy_order = vec![Strategy::Sentinel];
            }
            ParserVariant::Native | ParserVariant::ApiToolCall => {
                // Keep tag recognition for iframes; tool markup becomes text.
                config.parse_tool_calls = false;
            }
        }
        config
    }
}

impl FromStr for ParserVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "xml" => Ok(ParserVariant::Xml),
            "json" => Ok(ParserVariant::Json),
            "native" => Ok(ParserVariant::Native),
            "sentinel" => Ok(ParserVariant::Sentinel),
            "api_tool_call" | "api-tool-call" => Ok(ParserVariant::ApiToolCall),
            other => Err(Error::unknown_parser(other)),
        }
    }
}

/// Resolve the variant name from an explicit value or the environment.
///
/// Explicit configuration in code always wins over `AUTOBYTEUS_STREAM_PARSER`.
pub fn resolve_parser_name(explicit: Option<&str>) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| env::var(ENV_PARSER_NAME).ok())
        .unwrap_or_else(|| DEFAULT_PARSER_NAME.to_string())
        .trim()
        .to_lowercase()
}

/// Create a parser for the resolved variant.
pub fn create_parser(config: Option<ParserConfig>, variant_name: Option<&str>) -> Result<StreamingParser> {
    let name = resolve_parser_name(variant_name);
    let variant = name.parse::<ParserVariant>()?;
    let base = config.unwrap_or_default();
    Ok(StreamingParser::new(variant.apply(base)))
}
