//! Processor parameter schema and typed values
//!
//! Every processor declares its parameters up front. Values read from a
//! project script arrive as text and are converted with the declared type;
//! text that does not convert stays `Raw` so it survives a save untouched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Processor parameters of one content item, keyed by parameter name.
pub type ParamMap = BTreeMap<String, ParamValue>;

/// RGBA color as written by the build tool (`R,G,B,A`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Magenta, the conventional color key.
    pub const MAGENTA: Color = Color::new(255, 0, 255, 255);

    /// Parse `R,G,B` or `R,G,B,A`.
    pub fn parse(text: &str) -> Option<Self> {
        let parts: Vec<u8> = text
            .split(',')
            .map(|p| p.trim().parse::<u8>())
            .collect::<std::result::Result<_, _>>()
            .ok()?;

        match parts.as_slice() {
            [r, g, b] => Some(Color::new(*r, *g, *b, 255)),
            [r, g, b, a] => Some(Color::new(*r, *g, *b, *a)),
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.r, self.g, self.b, self.a)
    }
}

/// A processor parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Color(Color),
    /// Text that has not been (or could not be) converted to the schema type.
    Raw(String),
}

impl ParamValue {
    /// True when the value is still unconverted text.
    pub fn is_raw(&self) -> bool {
        matches!(self, ParamValue::Raw(_))
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(true) => write!(f, "True"),
            ParamValue::Bool(false) => write!(f, "False"),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(s) | ParamValue::Raw(s) => write!(f, "{}", s),
            ParamValue::Color(c) => write!(f, "{}", c),
        }
    }
}

/// Semantic type tag of a processor parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ParamType {
    Bool,
    Int,
    Float,
    Text,
    Color,
    Enum { options: Vec<String> },
}

impl ParamType {
    /// Convert text to a typed value, `None` if the text is not valid for this type.
    pub fn parse(&self, text: &str) -> Option<ParamValue> {
        let trimmed = text.trim();
        match self {
            ParamType::Bool => {
                if trimmed.eq_ignore_ascii_case("true") {
                    Some(ParamValue::Bool(true))
                } else if trimmed.eq_ignore_ascii_case("false") {
                    Some(ParamValue::Bool(false))
                } else {
                    None
                }
            }
            ParamType::Int => trimmed.parse::<i64>().ok().map(ParamValue::Int),
            ParamType::Float => trimmed.parse::<f64>().ok().map(ParamValue::Float),
            ParamType::Text => Some(ParamValue::Text(text.to_string())),
            ParamType::Color => Color::parse(trimmed).map(ParamValue::Color),
            ParamType::Enum { options } => options
                .iter()
                .find(|o| o.eq_ignore_ascii_case(trimmed))
                .map(|o| ParamValue::Text(o.clone())),
        }
    }

    /// Whether `value` already has the native representation of this type.
    pub fn accepts(&self, value: &ParamValue) -> bool {
        match (self, value) {
            (ParamType::Bool, ParamValue::Bool(_)) => true,
            (ParamType::Int, ParamValue::Int(_)) => true,
            (ParamType::Float, ParamValue::Float(_)) => true,
            (ParamType::Text, ParamValue::Text(_)) => true,
            (ParamType::Color, ParamValue::Color(_)) => true,
            (ParamType::Enum { options }, ParamValue::Text(s)) => options.contains(s),
            _ => false,
        }
    }

    /// Convert an existing value to this type, going through its text form.
    pub fn convert(&self, value: &ParamValue) -> Option<ParamValue> {
        if self.accepts(value) {
            return Some(value.clone());
        }
        self.parse(&value.to_string())
    }

    /// Zero value used when a schema entry declares no default.
    pub fn zero(&self) -> ParamValue {
        match self {
            ParamType::Bool => ParamValue::Bool(false),
            ParamType::Int => ParamValue::Int(0),
            ParamType::Float => ParamValue::Float(0.0),
            ParamType::Text => ParamValue::Text(String::new()),
            ParamType::Color => ParamValue::Color(Color::new(0, 0, 0, 255)),
            ParamType::Enum { options } => {
                ParamValue::Text(options.first().cloned().unwrap_or_default())
            }
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Bool => write!(f, "bool"),
            ParamType::Int => write!(f, "int"),
            ParamType::Float => write!(f, "float"),
            ParamType::Text => write!(f, "text"),
            ParamType::Color => write!(f, "color"),
            ParamType::Enum { options } => write!(f, "enum({})", options.join("|")),
        }
    }
}

/// Specification for a processor parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(flatten)]
    pub param_type: ParamType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

impl ParamSpec {
    pub fn new(name: &str, param_type: ParamType, default: serde_json::Value) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            description: String::new(),
            default: Some(default),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// The declared default converted to the parameter type.
    pub fn default_value(&self) -> ParamValue {
        let text = match &self.default {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Null) | None => return self.param_type.zero(),
            Some(other) => other.to_string(),
        };
        self.param_type
            .parse(&text)
            .unwrap_or_else(|| self.param_type.zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use test_case::test_case;

    #[test_case(ParamType::Bool, "True", Some(ParamValue::Bool(true)); "bool title case")]
    #[test_case(ParamType::Bool, "false", Some(ParamValue::Bool(false)); "bool lower case")]
    #[test_case(ParamType::Bool, "yes", None; "bool garbage")]
    #[test_case(ParamType::Int, " 42 ", Some(ParamValue::Int(42)); "int padded")]
    #[test_case(ParamType::Int, "4.2", None; "int from float text")]
    #[test_case(ParamType::Color, "255,0,255", Some(ParamValue::Color(Color::MAGENTA)); "color without alpha")]
    #[test_case(ParamType::Color, "1,2", None; "color too short")]
    fn test_parse(param_type: ParamType, text: &str, expected: Option<ParamValue>) {
        assert_eq!(param_type.parse(text), expected);
    }

    #[test]
    fn test_parse_float() {
        match ParamType::Float.parse("0.25") {
            Some(ParamValue::Float(v)) => assert_relative_eq!(v, 0.25),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_enum_canonical_case() {
        let t = ParamType::Enum {
            options: vec!["Color".to_string(), "Compressed".to_string()],
        };
        assert_eq!(
            t.parse("compressed"),
            Some(ParamValue::Text("Compressed".to_string()))
        );
        assert_eq!(t.parse("Dxt5"), None);
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        let value = ParamValue::Color(Color::new(10, 20, 30, 40));
        assert_eq!(value.to_string(), "10,20,30,40");
        assert_eq!(ParamType::Color.parse(&value.to_string()), Some(value));
        assert_eq!(ParamValue::Bool(true).to_string(), "True");
    }

    #[test]
    fn test_convert_raw() {
        let raw = ParamValue::Raw("1".to_string());
        assert_eq!(ParamType::Int.convert(&raw), Some(ParamValue::Int(1)));
        assert_eq!(ParamType::Bool.convert(&raw), None);
    }

    #[test]
    fn test_default_value_from_json() {
        let spec = ParamSpec::new("Scale", ParamType::Float, serde_json::json!(1.0));
        assert_eq!(spec.default_value(), ParamValue::Float(1.0));

        let spec = ParamSpec::new("ColorKeyColor", ParamType::Color, serde_json::json!("255,0,255,255"));
        assert_eq!(spec.default_value(), ParamValue::Color(Color::MAGENTA));

        let spec = ParamSpec {
            name: "Defines".to_string(),
            param_type: ParamType::Text,
            description: String::new(),
            default: None,
        };
        assert_eq!(spec.default_value(), ParamValue::Text(String::new()));
    }

    #[test]
    fn test_spec_deserializes_flattened_type() {
        let json = r#"{"name":"Quality","type":"Enum","options":["Low","Best"],"default":"Best"}"#;
        let spec: ParamSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.name, "Quality");
        assert_eq!(spec.default_value(), ParamValue::Text("Best".to_string()));
    }
}
