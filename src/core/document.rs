//! Typed YAML document tree
//!
//! Controller manifests are rewritten in place (descriptions stripped,
//! tolerations injected) at whatever depth the relevant keys appear. This
//! module gives those rewrites a typed tree to walk instead of loosely typed
//! maps, and handles multi-document parsing and emission through serde_yaml.

use serde::de::Deserialize;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::collections::BTreeMap;
use thiserror::Error;

/// Error type for document parsing and emission
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to parse YAML document {index}: {message}")]
    Parse { index: usize, message: String },

    #[error("failed to emit YAML: {0}")]
    Emit(String),
}

/// Scalar number, kept integral when the source was integral
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

/// A node in a YAML document
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Sequence(Vec<Node>),
    Mapping(BTreeMap<String, Node>),
}

impl Node {
    pub fn mapping() -> Self {
        Node::Mapping(BTreeMap::new())
    }

    pub fn string(s: impl Into<String>) -> Self {
        Node::String(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&BTreeMap<String, Node>> {
        match self {
            Node::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut BTreeMap<String, Node>> {
        match self {
            Node::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Node]> {
        match self {
            Node::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Child of a mapping by key
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_mapping().and_then(|m| m.get(key))
    }

    /// Follow a path of mapping keys
    pub fn get_path(&self, path: &[&str]) -> Option<&Node> {
        path.iter().try_fold(self, |node, key| node.get(key))
    }

    /// `kind` of a Kubernetes object document
    pub fn kind(&self) -> Option<&str> {
        self.get("kind").and_then(Node::as_str)
    }

    /// Child mapping under `key`, created (or replaced if not a mapping) when needed.
    ///
    /// Returns `None` when `self` is not a mapping.
    pub fn entry_mapping(&mut self, key: &str) -> Option<&mut Node> {
        let map = self.as_mapping_mut()?;
        let child = map.entry(key.to_string()).or_insert_with(Node::mapping);
        if !matches!(child, Node::Mapping(_)) {
            *child = Node::mapping();
        }
        Some(child)
    }

    /// Child sequence under `key`, created (or replaced if not a sequence) when needed.
    pub fn entry_sequence(&mut self, key: &str) -> Option<&mut Vec<Node>> {
        let map = self.as_mapping_mut()?;
        let child = map
            .entry(key.to_string())
            .or_insert_with(|| Node::Sequence(Vec::new()));
        if !matches!(child, Node::Sequence(_)) {
            *child = Node::Sequence(Vec::new());
        }
        match child {
            Node::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Remove every mapping entry named `key` at any depth. Returns how many were removed.
    pub fn remove_key_recursive(&mut self, key: &str) -> usize {
        match self {
            Node::Mapping(map) => {
                let mut removed = usize::from(map.remove(key).is_some());
                for child in map.values_mut() {
                    removed += child.remove_key_recursive(key);
                }
                removed
            }
            Node::Sequence(items) => items
                .iter_mut()
                .map(|item| item.remove_key_recursive(key))
                .sum(),
            _ => 0,
        }
    }

    /// Visit every pod spec (a mapping with a `containers` sequence) at any depth.
    ///
    /// Returns the number of pod specs visited. Nested pod specs inside a
    /// visited one are not visited again.
    pub fn for_each_pod_spec_mut<F>(&mut self, f: &mut F) -> usize
    where
        F: FnMut(&mut Node),
    {
        let is_pod_spec = self
            .get("containers")
            .is_some_and(|c| matches!(c, Node::Sequence(_)));
        if is_pod_spec {
            f(self);
            return 1;
        }

        match self {
            Node::Mapping(map) => map
                .values_mut()
                .map(|child| child.for_each_pod_spec_mut(f))
                .sum(),
            Node::Sequence(items) => items
                .iter_mut()
                .map(|item| item.for_each_pod_spec_mut(f))
                .sum(),
            _ => 0,
        }
    }
}

impl From<serde_yaml::Value> for Node {
    fn from(value: serde_yaml::Value) -> Self {
        use serde_yaml::Value;
        match value {
            Value::Null => Node::Null,
            Value::Bool(b) => Node::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Node::Number(Number::Int(i))
                } else if let Some(u) = n.as_u64() {
                    // Only reachable above i64::MAX
                    Node::Number(Number::Float(u as f64))
                } else {
                    Node::Number(Number::Float(n.as_f64().unwrap_or(f64::NAN)))
                }
            }
            Value::String(s) => Node::String(s),
            Value::Sequence(items) => Node::Sequence(items.into_iter().map(Node::from).collect()),
            Value::Mapping(map) => Node::Mapping(
                map.into_iter()
                    .map(|(k, v)| (key_to_string(k), Node::from(v)))
                    .collect(),
            ),
            Value::Tagged(tagged) => Node::from(tagged.value),
        }
    }
}

fn key_to_string(key: serde_yaml::Value) -> String {
    use serde_yaml::Value;
    match key {
        Value::String(s) => s,
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Node::Null => serializer.serialize_unit(),
            Node::Bool(b) => serializer.serialize_bool(*b),
            Node::Number(Number::Int(i)) => serializer.serialize_i64(*i),
            Node::Number(Number::Float(f)) => serializer.serialize_f64(*f),
            Node::String(s) => serializer.serialize_str(s),
            Node::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Node::Mapping(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

/// Parse a multi-document YAML stream, skipping empty documents
pub fn parse_documents(input: &str) -> Result<Vec<Node>, DocumentError> {
    let mut docs = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_str(input).enumerate() {
        let value = serde_yaml::Value::deserialize(document).map_err(|e| DocumentError::Parse {
            index,
            message: e.to_string(),
        })?;
        if value.is_null() {
            continue;
        }
        docs.push(Node::from(value));
    }
    Ok(docs)
}

/// Emit documents as one multi-document YAML stream
pub fn emit_documents(docs: &[Node]) -> Result<String, DocumentError> {
    let mut out = String::new();
    for doc in docs {
        let rendered = serde_yaml::to_string(doc).map_err(|e| DocumentError::Emit(e.to_string()))?;
        out.push_str("---\n");
        out.push_str(&rendered);
    }
    Ok(out)
}
