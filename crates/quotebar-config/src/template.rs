//! Display format templates.

use quotebar_core::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Template used when none is configured.
pub const DEFAULT_TEMPLATE: &str = "{indicator} {name}({symbol}) {value} ({change})";

/// A named slot in the display format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Indicator,
    Name,
    Symbol,
    Value,
    Change,
    Unit,
    Detail,
    Provider,
}

impl Placeholder {
    pub const ALL: [Placeholder; 8] = [
        Placeholder::Indicator,
        Placeholder::Name,
        Placeholder::Symbol,
        Placeholder::Value,
        Placeholder::Change,
        Placeholder::Unit,
        Placeholder::Detail,
        Placeholder::Provider,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Placeholder::Indicator => "indicator",
            Placeholder::Name => "name",
            Placeholder::Symbol => "symbol",
            Placeholder::Value => "value",
            Placeholder::Change => "change",
            Placeholder::Unit => "unit",
            Placeholder::Detail => "detail",
            Placeholder::Provider => "provider",
        }
    }

    fn lookup(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == name)
    }
}

/// Piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Slot(Placeholder),
}

/// A validated display format such as `{name} {value}`.
///
/// `{{` and `}}` produce literal braces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DisplayTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl DisplayTemplate {
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if !closed {
                        return Err(ConfigError::InvalidTemplate(format!(
                            "unclosed placeholder in '{}'",
                            source
                        )));
                    }
                    let slot = Placeholder::lookup(name.trim()).ok_or_else(|| {
                        ConfigError::InvalidTemplate(format!("unknown placeholder {{{}}}", name))
                    })?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Slot(slot));
                }
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        if segments.is_empty() {
            return Err(ConfigError::InvalidTemplate("template is empty".to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the template mentions `slot`.
    pub fn uses(&self, slot: Placeholder) -> bool {
        self.segments.iter().any(|s| *s == Segment::Slot(slot))
    }
}

impl Default for DisplayTemplate {
    fn default() -> Self {
        Self {
            source: DEFAULT_TEMPLATE.to_string(),
            segments: vec![
                Segment::Slot(Placeholder::Indicator),
                Segment::Literal(" ".to_string()),
                Segment::Slot(Placeholder::Name),
                Segment::Literal("(".to_string()),
                Segment::Slot(Placeholder::Symbol),
                Segment::Literal(") ".to_string()),
                Segment::Slot(Placeholder::Value),
                Segment::Literal(" (".to_string()),
                Segment::Slot(Placeholder::Change),
                Segment::Literal(")".to_string()),
            ],
        }
    }
}

impl FromStr for DisplayTemplate {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DisplayTemplate {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DisplayTemplate> for String {
    fn from(template: DisplayTemplate) -> Self {
        template.source
    }
}

impl fmt::Display for DisplayTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_parse() {
        assert_eq!(DisplayTemplate::parse(DEFAULT_TEMPLATE).unwrap(), DisplayTemplate::default());
    }

    #[test]
    fn test_parse_segments() {
        let template = DisplayTemplate::parse("{symbol}: {value}{unit}").unwrap();

        assert_eq!(
            template.segments(),
            &[
                Segment::Slot(Placeholder::Symbol),
                Segment::Literal(": ".into()),
                Segment::Slot(Placeholder::Value),
                Segment::Slot(Placeholder::Unit),
            ]
        );
        assert!(template.uses(Placeholder::Unit));
        assert!(!template.uses(Placeholder::Change));
    }

    #[test]
    fn test_escaped_braces() {
        let template = DisplayTemplate::parse("{{{symbol}}}").unwrap();
        assert_eq!(
            template.segments(),
            &[
                Segment::Literal("{".into()),
                Segment::Slot(Placeholder::Symbol),
                Segment::Literal("}".into()),
            ]
        );
    }

    #[test]
    fn test_invalid_templates() {
        assert!(matches!(
            DisplayTemplate::parse("{price}"),
            Err(ConfigError::InvalidTemplate(_))
        ));
        assert!(matches!(
            DisplayTemplate::parse("{symbol"),
            Err(ConfigError::InvalidTemplate(_))
        ));
        assert!(matches!(
            DisplayTemplate::parse(""),
            Err(ConfigError::InvalidTemplate(_))
        ));
    }
}
