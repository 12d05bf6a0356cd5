//! Frame model
//!
//! A frame is a typed record with ordered, named attributes. Attribute
//! values are either a scalar or an ordered list of strings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Frame category
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FrameType {
    Pest,
    Crop,
    Practice,
    Disease,
    Soil,
    Other(String),
}

impl FrameType {
    pub fn as_str(&self) -> &str {
        match self {
            FrameType::Pest => "pest",
            FrameType::Crop => "crop",
            FrameType::Practice => "practice",
            FrameType::Disease => "disease",
            FrameType::Soil => "soil",
            FrameType::Other(name) => name,
        }
    }
}

impl From<&str> for FrameType {
    fn from(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "pest" => FrameType::Pest,
            "crop" => FrameType::Crop,
            "practice" => FrameType::Practice,
            "disease" => FrameType::Disease,
            "soil" => FrameType::Soil,
            other => FrameType::Other(other.to_string()),
        }
    }
}

impl From<String> for FrameType {
    fn from(name: String) -> Self {
        FrameType::from(name.as_str())
    }
}

impl From<FrameType> for String {
    fn from(frame_type: FrameType) -> Self {
        frame_type.as_str().to_string()
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single attribute value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", if *b { "yes" } else { "no" }),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

/// Attribute value: a scalar or an ordered string sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Scalar(Scalar),
    List(Vec<String>),
}

impl AttributeValue {
    pub fn text(value: impl Into<String>) -> Self {
        AttributeValue::Scalar(Scalar::Text(value.into()))
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            AttributeValue::List(items) => Some(items),
            AttributeValue::Scalar(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Scalar(Scalar::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// Empty text, empty list. Booleans and integers are never empty.
    pub fn is_empty(&self) -> bool {
        match self {
            AttributeValue::Scalar(Scalar::Text(s)) => s.trim().is_empty(),
            AttributeValue::Scalar(_) => false,
            AttributeValue::List(items) => items.iter().all(|i| i.trim().is_empty()),
        }
    }

    /// Human-readable rendering; identifiers lose their underscores
    pub fn display(&self) -> String {
        match self {
            AttributeValue::Scalar(scalar) => humanize(&scalar.to_string()),
            AttributeValue::List(items) => items
                .iter()
                .map(|i| humanize(i))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// `neem_oil` -> `neem oil`
pub fn humanize(value: &str) -> String {
    value.replace('_', " ")
}

/// Named attribute, kept in source order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
}

/// Knowledge frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// `{type}:{name key}`, unique within a store
    pub id: String,
    pub frame_type: FrameType,
    /// Name as written in the source
    pub name: String,
    pub attributes: Vec<Attribute>,
    /// Line of the block in its source
    #[serde(default)]
    pub line: usize,
}

impl Frame {
    /// Attribute by case-insensitive name
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(key))
            .map(|a| &a.value)
    }

    /// List attribute by name; `None` if absent or scalar
    pub fn list(&self, key: &str) -> Option<&[String]> {
        self.get(key).and_then(AttributeValue::as_list)
    }

    /// Present and not empty
    pub fn has_value(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| !v.is_empty())
    }

    /// Name for display
    pub fn display_name(&self) -> String {
        humanize(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aphid() -> Frame {
        Frame {
            id: "pest:aphid".to_string(),
            frame_type: FrameType::Pest,
            name: "aphid".to_string(),
            attributes: vec![
                Attribute {
                    name: "type".to_string(),
                    value: AttributeValue::text("insect"),
                },
                Attribute {
                    name: "controls".to_string(),
                    value: AttributeValue::List(vec!["neem_oil".into(), "ladybugs".into()]),
                },
                Attribute {
                    name: "notes".to_string(),
                    value: AttributeValue::text(" "),
                },
            ],
            line: 1,
        }
    }

    #[test]
    fn test_attribute_lookup_is_case_insensitive() {
        let frame = aphid();
        assert_eq!(frame.get("Controls").and_then(|v| v.as_list()).map(|l| l.len()), Some(2));
        assert!(frame.get("missing").is_none());
    }

    #[test]
    fn test_has_value_ignores_blank_text() {
        let frame = aphid();
        assert!(frame.has_value("controls"));
        assert!(!frame.has_value("notes"));
    }

    #[test]
    fn test_display_humanizes_identifiers() {
        let frame = aphid();
        assert_eq!(frame.get("controls").unwrap().display(), "neem oil, ladybugs");
    }

    #[test]
    fn test_frame_type_round_trips_as_string() {
        let json = serde_json::to_string(&FrameType::Other("weed".into())).unwrap();
        assert_eq!(json, "\"weed\"");
        let parsed: FrameType = serde_json::from_str("\"Pest\"").unwrap();
        assert_eq!(parsed, FrameType::Pest);
    }
}
