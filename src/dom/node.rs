//! Document nodes and their attributes

use std::fmt;

use serde::{Deserialize, Serialize};

/// Caller-assigned node identifier; 0 is reserved for the root
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    /// The implicit document root
    pub const ROOT: NodeId = NodeId(0);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub const fn is_root(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Ordered attribute map with unique keys
///
/// Overwriting a key keeps its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes {
    entries: Vec<(String, String)>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an attribute value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Insert or overwrite an attribute, returning the previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Class names from the `class` attribute
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.get("class").unwrap_or_default().split_whitespace()
    }

    /// Value of the `id` attribute
    pub fn id(&self) -> Option<&str> {
        self.get("id")
    }

    /// Value of the `tag` attribute, matched by type selectors
    pub fn tag(&self) -> Option<&str> {
        self.get("tag")
    }
}

/// A node in the document arena
///
/// Nodes never own each other; edges are stored as ids.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: NodeId,
    pub(crate) text: Option<String>,
    pub(crate) attributes: Attributes,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl Node {
    pub(crate) fn new(id: NodeId, text: Option<String>) -> Self {
        Self {
            id,
            text,
            attributes: Attributes::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Serializable snapshot used to probe state across process boundaries
    pub fn info(&self) -> NodeInfo {
        NodeInfo {
            id: self.id,
            text: self.text.clone(),
            attributes: self.attributes.clone(),
            parent: self.parent,
            children: self.children.clone(),
        }
    }
}

/// Owned copy of a node's observable state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: NodeId,
    pub text: Option<String>,
    pub attributes: Attributes,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_overwrite_keeps_position() {
        let mut attrs = Attributes::new();
        attrs.set("class", "a");
        attrs.set("id", "main");
        assert_eq!(attrs.set("class", "b"), Some("a".to_string()));

        let keys: Vec<_> = attrs.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["class", "id"]);
        assert_eq!(attrs.get("class"), Some("b"));
        assert_eq!(attrs.len(), 2);
    }

    #[test]
    fn test_classes_split_on_whitespace() {
        let mut attrs = Attributes::new();
        attrs.set("class", "  blue-bg\tlarge  ");
        let classes: Vec<_> = attrs.classes().collect();
        assert_eq!(classes, vec!["blue-bg", "large"]);
    }

    #[test]
    fn test_missing_class_yields_nothing() {
        let attrs = Attributes::new();
        assert_eq!(attrs.classes().count(), 0);
        assert!(attrs.is_empty());
    }

    #[test]
    fn test_node_id_root() {
        assert!(NodeId::ROOT.is_root());
        assert!(!NodeId::new(3).is_root());
        assert_eq!(NodeId::from(3).to_string(), "3");
    }
}
