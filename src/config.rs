//! Parser configuration.
//!
//! A [`ParserConfig`] selects which recognizers the text state may transition
//! into, how JSON tool calls are detected and interpreted, and how segment
//! ids are prefixed. Configs are built with [`ParserConfig::builder`] and are
//! immutable once handed to a parser.

use crate::dialect::JsonDialect;
use crate::error::{Error, Result};

/// Signature prefixes that flag a JSON tool call in the default config.
///
/// A `{` or `[` in the stream only commits to JSON tool parsing once the
/// following bytes match one of these prefixes.
pub const DEFAULT_JSON_PATTERNS: &[&str] = &[
    "{\"name",
    "{\"tool",
    "{\"function",
    "[{\"name",
    "[{\"tool",
];

/// A top-level recognizer the text state may transition into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// XML-style markup: `<tool …>`, `<!doctype html>`.
    XmlTag,
    /// JSON tool objects matched against the configured signature prefixes.
    JsonTool,
    /// Sentinel framing: `[[SEG_START {…}]] … [[SEG_END]]`.
    Sentinel,
}

/// Configuration for a streaming parser instance.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Master switch. When false, all tool-bearing markup passes through as text.
    pub parse_tool_calls: bool,
    /// Recognizers the text state honors, in priority order.
    pub strategy_order: Vec<Strategy>,
    /// Signature prefixes that flag a JSON tool call.
    pub json_tool_patterns: Vec<String>,
    /// Provider dialect used to interpret a complete JSON tool blob.
    pub json_dialect: JsonDialect,
    /// Optional prefix for generated segment ids (e.g. a turn id).
    pub segment_id_prefix: Option<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            parse_tool_calls: true,
            strategy_order: vec![Strategy::XmlTag],
            json_tool_patterns: DEFAULT_JSON_PATTERNS.iter().map(|s| s.to_string()).collect(),
            json_dialect: JsonDialect::Default,
            segment_id_prefix: None,
        }
    }
}

impl ParserConfig {
    /// Start building a config from the defaults.
    pub fn builder() -> ParserConfigBuilder {
        ParserConfigBuilder::default()
    }

    /// Whether a strategy is enabled.
    pub fn has_strategy(&self, strategy: Strategy) -> bool {
        self.strategy_order.contains(&strategy)
    }
}

/// Builder for [`ParserConfig`].
#[derive(Debug, Default)]
pub struct ParserConfigBuilder {
    parse_tool_calls: Option<bool>,
    strategy_order: Option<Vec<Strategy>>,
    json_tool_patterns: Option<Vec<String>>,
    json_dialect: Option<JsonDialect>,
    segment_id_prefix: Option<String>,
}

impl ParserConfigBuilder {
    /// Enable or disable tool call parsing (default: enabled).
    pub fn parse_tool_calls(mut self, enabled: bool) -> Self {
        self.parse_tool_calls = Some(enabled);
        self
    }

    /// Set the recognizer priority order (default: `[XmlTag]`).
    pub fn strategy_order(mut self, order: Vec<Strategy>) -> Self {
        self.strategy_order = Some(order);
        self
    }

    /// Override the JSON tool signature prefixes.
    pub fn json_tool_patterns(mut self, patterns: Vec<String>) -> Self {
        self.json_tool_patterns = Some(patterns);
        self
    }

    /// Select the JSON tool dialect (default: [`JsonDialect::Default`]).
    pub fn json_dialect(mut self, dialect: JsonDialect) -> Self {
        self.json_dialect = Some(dialect);
        self
    }

    /// Prefix generated segment ids, scoping them to e.g. one turn.
    pub fn segment_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.segment_id_prefix = Some(prefix.into());
        self
    }

    /// Validate and build the config.
    pub fn build(self) -> Result<ParserConfig> {
        let defaults = ParserConfig::default();
        let config = ParserConfig {
            parse_tool_calls: self.parse_tool_calls.unwrap_or(defaults.parse_tool_calls),
            strategy_order: self.strategy_order.unwrap_or(defaults.strategy_order),
            json_tool_patterns: self.json_tool_patterns.unwrap_or(defaults.json_tool_patterns),
            json_dialect: self.json_dialect.unwrap_or(defaults.json_dialect),
            segment_id_prefix: self.segment_id_prefix,
        };

        if config.has_strategy(Strategy::JsonTool) && config.json_tool_patterns.is_empty() {
            return Err(Error::config(
                "json_tool strategy requires at least one signature pattern",
            ));
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ParserConfig::default();
        assert!(config.parse_tool_calls);
        assert_eq!(config.strategy_order, vec![Strategy::XmlTag]);
        assert_eq!(config.json_tool_patterns.len(), 5);
        assert!(config.segment_id_prefix.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let config = ParserConfig::builder()
            .parse_tool_calls(false)
            .strategy_order(vec![Strategy::Sentinel, Strategy::JsonTool])
            .segment_id_prefix("t1_")
            .build()
            .unwrap();

        assert!(!config.parse_tool_calls);
        assert!(config.has_strategy(Strategy::Sentinel));
        assert!(config.has_strategy(Strategy::JsonTool));
        assert!(!config.has_strategy(Strategy::XmlTag));
        assert_eq!(config.segment_id_prefix.as_deref(), Some("t1_"));
    }

    #[test]
    fn test_json_strategy_requires_patterns() {
        let result = ParserConfig::builder()
            .strategy_order(vec![Strategy::JsonTool])
            .json_tool_patterns(vec![])
            .build();

        assert!(result.is_err());
    }

    #[test]
    fn test_default_patterns_cover_openai_prelude() {
        let config = ParserConfig::default();
        // {"tool_calls": … is matched through the {"tool" prefix
        assert!(
            config
                .json_tool_patterns
                .iter()
                .any(|p| "{\"tool_calls\"".starts_with(p.as_str()))
        );
    }
}
