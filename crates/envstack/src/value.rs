// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Raw and resolved variable values.

use std::fmt;

use indexmap::IndexMap;

use crate::codec::Codec;
use crate::node::TypedNode;

#[cfg(test)]
#[path = "./value_test.rs"]
mod value_test;

/// Ordered variable name to value mapping.
pub type Mapping = IndexMap<String, Value>;

/// A variable value as read from a stack file or produced by expansion.
///
/// Scalars are always text. Numbers and booleans in stack files keep the
/// text they were written with.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    List(Vec<Value>),
    Map(Mapping),
    Node(TypedNode),
}

impl Value {
    /// Convert a parsed YAML value, turning known tags into typed nodes.
    pub fn from_yaml(value: serde_yaml::Value) -> Self {
        use serde_yaml::Value as Yaml;

        match value {
            Yaml::Null => Self::Str(String::new()),
            Yaml::Bool(b) => Self::Str(b.to_string()),
            Yaml::Number(n) => Self::Str(n.to_string()),
            Yaml::String(s) => Self::Str(s),
            Yaml::Sequence(items) => Self::List(items.into_iter().map(Self::from_yaml).collect()),
            Yaml::Mapping(mapping) => Self::Map(
                mapping
                    .into_iter()
                    .map(|(k, v)| (yaml_key(k), Self::from_yaml(v)))
                    .collect(),
            ),
            Yaml::Tagged(tagged) => {
                let tag = tagged.tag.to_string();
                let inner = Self::from_yaml(tagged.value);
                match Codec::from_tag(&tag) {
                    Some(codec) => Self::Node(TypedNode::stored(codec, inner.to_text())),
                    None => {
                        tracing::debug!(%tag, "ignoring unknown tag");
                        inner
                    }
                }
            }
        }
    }

    /// Convert a JSON value, used when restoring list and mapping text.
    pub fn from_json(value: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match value {
            Json::Null => Self::Str(String::new()),
            Json::Bool(b) => Self::Str(b.to_string()),
            Json::Number(n) => Self::Str(n.to_string()),
            Json::String(s) => Self::Str(s),
            Json::Array(items) => Self::List(items.into_iter().map(Self::from_json).collect()),
            Json::Object(object) => Self::Map(
                object
                    .into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Self::Str(s) => Json::String(s.clone()),
            Self::List(items) => Json::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(mapping) => Json::Object(
                mapping
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Self::Node(node) => Json::String(node.raw().to_string()),
        }
    }

    /// Single string form: lists and mappings render as JSON.
    pub fn to_text(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Node(node) => node.raw().to_string(),
            Self::List(_) | Self::Map(_) => self.to_json().to_string(),
        }
    }

    /// Reinterpret text that holds a list or mapping literal.
    ///
    /// Only quoted literals count: `["a","b"]` or `['a', 'b']` become a
    /// list, while `[prod]` or `{token}` stay text. Anything else,
    /// including numbers, stays text.
    pub fn safe_eval(text: &str) -> Self {
        let trimmed = text.trim();
        if !(trimmed.starts_with('[') || trimmed.starts_with('{')) {
            return Self::Str(text.to_string());
        }
        let parsed = serde_json::from_str::<serde_json::Value>(trimmed).or_else(|err| {
            // single quoted literals, as written by older tools
            if trimmed.contains('"') {
                Err(err)
            } else {
                serde_json::from_str(&trimmed.replace('\'', "\""))
            }
        });
        match parsed {
            Ok(parsed @ (serde_json::Value::Array(_) | serde_json::Value::Object(_))) => {
                Self::from_json(parsed)
            }
            _ => {
                tracing::trace!(text, "value is not a list or mapping literal");
                Self::Str(text.to_string())
            }
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&TypedNode> {
        match self {
            Self::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Empty text, list or mapping.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Str(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Map(mapping) => mapping.is_empty(),
            Self::Node(node) => node.raw().is_empty(),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Str(String::new())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<TypedNode> for Value {
    fn from(node: TypedNode) -> Self {
        Self::Node(node)
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match Value::from_yaml(key) {
        Value::Str(s) => s,
        other => other.to_text(),
    }
}
