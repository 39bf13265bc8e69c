//! Heterogeneous configuration tree
//!
//! Override sections can hold any YAML structure. They are decoded once into a
//! [`ConfigNode`] so that templating can walk them by variant instead of
//! inspecting dynamic values.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::{Number, Value};

/// A node of an arbitrary configuration tree
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum ConfigNode {
    /// Key/value section, keys are unique and keep their YAML type
    Mapping(IndexMap<Value, ConfigNode>),
    /// Ordered list of nodes
    Sequence(Vec<ConfigNode>),
    /// Leaf value
    Scalar(Scalar),
    /// Explicit or implicit YAML null
    #[default]
    Null,
}

/// Leaf values of a [`ConfigNode`] tree
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Bool(bool),
    Number(Number),
}

impl ConfigNode {
    /// An empty mapping node
    pub fn empty_mapping() -> Self {
        ConfigNode::Mapping(IndexMap::new())
    }

    /// A string leaf
    pub fn string(value: impl Into<String>) -> Self {
        ConfigNode::Scalar(Scalar::String(value.into()))
    }

    /// Parse a node from a YAML document
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize the node as a YAML document
    pub fn to_yaml(&self) -> std::result::Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ConfigNode::Null)
    }

    /// Borrow the string value of a string leaf
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigNode::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Look up a string key of a mapping node
    pub fn get(&self, key: &str) -> Option<&ConfigNode> {
        self.get_key(&Value::String(key.to_string()))
    }

    /// Look up a key of any YAML type
    pub fn get_key(&self, key: &Value) -> Option<&ConfigNode> {
        match self {
            ConfigNode::Mapping(map) => map.get(key),
            _ => None,
        }
    }
}

impl From<Value> for ConfigNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ConfigNode::Null,
            Value::Bool(b) => ConfigNode::Scalar(Scalar::Bool(b)),
            Value::Number(n) => ConfigNode::Scalar(Scalar::Number(n)),
            Value::String(s) => ConfigNode::Scalar(Scalar::String(s)),
            Value::Sequence(items) => {
                ConfigNode::Sequence(items.into_iter().map(ConfigNode::from).collect())
            }
            Value::Mapping(map) => ConfigNode::Mapping(
                map.into_iter()
                    .map(|(key, value)| (key, ConfigNode::from(value)))
                    .collect(),
            ),
            // Tags carry no meaning for chart values
            Value::Tagged(tagged) => ConfigNode::from(tagged.value),
        }
    }
}

impl From<ConfigNode> for Value {
    fn from(node: ConfigNode) -> Self {
        match node {
            ConfigNode::Null => Value::Null,
            ConfigNode::Scalar(Scalar::Bool(b)) => Value::Bool(b),
            ConfigNode::Scalar(Scalar::Number(n)) => Value::Number(n),
            ConfigNode::Scalar(Scalar::String(s)) => Value::String(s),
            ConfigNode::Sequence(items) => {
                Value::Sequence(items.into_iter().map(Value::from).collect())
            }
            ConfigNode::Mapping(map) => Value::Mapping(
                map.into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}
