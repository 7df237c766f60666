//! Arena-backed document tree

use std::collections::HashMap;

use super::node::{Node, NodeId};
use crate::utils::TreeError;

/// The document: an arena of nodes keyed by caller-assigned ids
///
/// The root (id 0) always exists and never has a parent. Every other node
/// starts detached and appears in at most one child list.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    nodes: HashMap<NodeId, Node>,
}

impl Document {
    /// Create a document holding only the root
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(NodeId::ROOT, Node::new(NodeId::ROOT, None));
        Self { nodes }
    }

    pub fn root_id(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn root(&self) -> &Node {
        &self.nodes[&NodeId::ROOT]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Number of nodes, root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Insert a detached node with the given id
    pub fn create_node(&mut self, id: NodeId, text: Option<String>) -> Result<NodeId, TreeError> {
        if id.is_root() {
            return Err(TreeError::ZeroId);
        }
        if self.nodes.contains_key(&id) {
            return Err(TreeError::DuplicateId(id));
        }
        self.nodes.insert(id, Node::new(id, text));
        Ok(id)
    }

    /// Attach `child` as the last child of `parent`, detaching it first
    pub fn set_parent(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        if !self.contains(parent) {
            return Err(TreeError::UnknownNode(parent));
        }
        if !self.contains(child) {
            return Err(TreeError::UnknownNode(child));
        }
        if child.is_root() {
            return Err(TreeError::RootHasNoParent);
        }
        if self.would_cycle(parent, child) {
            return Err(TreeError::Cycle { parent, child });
        }

        self.detach(child);
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(child);
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        Ok(())
    }

    /// Upsert an attribute on a node
    pub fn set_attribute(
        &mut self,
        id: NodeId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), TreeError> {
        let node = self.nodes.get_mut(&id).ok_or(TreeError::UnknownNode(id))?;
        node.attributes.set(key, value);
        Ok(())
    }

    /// Whether attaching `child` under `parent` closes a loop; a leaf only
    /// loops with itself
    fn would_cycle(&self, parent: NodeId, child: NodeId) -> bool {
        let is_leaf = self
            .nodes
            .get(&child)
            .is_none_or(|node| node.children.is_empty());
        if is_leaf {
            return parent == child;
        }
        self.is_ancestor_or_self(child, parent)
    }

    /// Whether `ancestor` is `node` or lies on its parent chain
    ///
    /// The walk is bounded by tree depth since the parent relation is acyclic.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    /// Parent chain from the node's parent up to the topmost ancestor
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.nodes.get(&id).and_then(|n| n.parent);
        while let Some(parent) = current {
            chain.push(parent);
            current = self.nodes.get(&parent).and_then(|n| n.parent);
        }
        chain
    }

    /// Pre-order traversal of the subtree rooted at `id`
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            out.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    fn detach(&mut self, child: NodeId) {
        let Some(old_parent) = self.nodes.get_mut(&child).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(&old_parent) {
            node.children.retain(|&c| c != child);
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(v: u64) -> NodeId {
        NodeId::new(v)
    }

    #[test]
    fn test_new_document_has_root() {
        let doc = Document::new();
        assert_eq!(doc.root_id(), NodeId::ROOT);
        assert!(doc.root().parent().is_none());
        assert!(doc.is_empty());
    }

    #[test]
    fn test_create_node_rejects_zero_and_duplicates() {
        let mut doc = Document::new();
        assert_eq!(doc.create_node(id(0), None), Err(TreeError::ZeroId));
        assert_eq!(doc.create_node(id(1), Some("Hello".into())), Ok(id(1)));
        assert_eq!(
            doc.create_node(id(1), Some("Other".into())),
            Err(TreeError::DuplicateId(id(1)))
        );
        assert_eq!(doc.get(id(1)).unwrap().text(), Some("Hello"));
    }

    #[test]
    fn test_new_nodes_are_detached() {
        let mut doc = Document::new();
        doc.create_node(id(5), None).unwrap();
        assert!(doc.get(id(5)).unwrap().parent().is_none());
        assert!(doc.root().children().is_empty());
    }

    #[test]
    fn test_reparent_moves_child() {
        let mut doc = Document::new();
        for v in 1..=3 {
            doc.create_node(id(v), None).unwrap();
        }
        doc.set_parent(id(1), id(3)).unwrap();
        doc.set_parent(id(2), id(3)).unwrap();

        assert_eq!(doc.get(id(3)).unwrap().parent(), Some(id(2)));
        assert!(doc.get(id(1)).unwrap().children().is_empty());
        assert_eq!(doc.get(id(2)).unwrap().children(), &[id(3)]);
    }

    #[test]
    fn test_cycle_is_rejected_without_mutation() {
        let mut doc = Document::new();
        doc.create_node(id(1), None).unwrap();
        doc.create_node(id(2), None).unwrap();
        doc.set_parent(id(1), id(2)).unwrap();

        let before = doc.clone();
        assert_eq!(
            doc.set_parent(id(2), id(1)),
            Err(TreeError::Cycle {
                parent: id(2),
                child: id(1)
            })
        );
        assert_eq!(doc.get(id(1)), before.get(id(1)));
        assert_eq!(doc.get(id(2)), before.get(id(2)));
    }

    #[test]
    fn test_self_parent_is_cycle() {
        let mut doc = Document::new();
        doc.create_node(id(1), None).unwrap();
        assert!(matches!(doc.set_parent(id(1), id(1)), Err(TreeError::Cycle { .. })));
    }

    #[test]
    fn test_long_chain_builds_and_rejects_closing_cycle() {
        let mut doc = Document::new();
        let depth = 100_000;
        for v in 1..=depth {
            doc.create_node(id(v), None).unwrap();
            doc.set_parent(id(v - 1), id(v)).unwrap();
        }
        assert_eq!(doc.ancestors(id(depth)).len(), depth as usize);
        assert!(matches!(
            doc.set_parent(id(depth), id(1)),
            Err(TreeError::Cycle { .. })
        ));
    }

    #[test]
    fn test_deep_cycle_is_rejected() {
        let mut doc = Document::new();
        for v in 1..=4 {
            doc.create_node(id(v), None).unwrap();
        }
        doc.set_parent(id(1), id(2)).unwrap();
        doc.set_parent(id(2), id(3)).unwrap();
        doc.set_parent(id(3), id(4)).unwrap();
        assert!(doc.set_parent(id(4), id(1)).is_err());
        assert_eq!(doc.ancestors(id(4)), vec![id(3), id(2), id(1)]);
    }

    #[test]
    fn test_root_cannot_be_reparented() {
        let mut doc = Document::new();
        doc.create_node(id(1), None).unwrap();
        assert_eq!(doc.set_parent(id(1), NodeId::ROOT), Err(TreeError::RootHasNoParent));
    }

    #[test]
    fn test_unknown_ids() {
        let mut doc = Document::new();
        doc.create_node(id(1), None).unwrap();
        assert_eq!(doc.set_parent(id(9), id(1)), Err(TreeError::UnknownNode(id(9))));
        assert_eq!(doc.set_parent(NodeId::ROOT, id(9)), Err(TreeError::UnknownNode(id(9))));
        assert_eq!(doc.set_attribute(id(9), "class", "x"), Err(TreeError::UnknownNode(id(9))));
    }

    #[test]
    fn test_same_parent_appends_to_end() {
        let mut doc = Document::new();
        doc.create_node(id(1), None).unwrap();
        doc.create_node(id(2), None).unwrap();
        doc.set_parent(NodeId::ROOT, id(1)).unwrap();
        doc.set_parent(NodeId::ROOT, id(2)).unwrap();
        doc.set_parent(NodeId::ROOT, id(1)).unwrap();
        assert_eq!(doc.root().children(), &[id(2), id(1)]);
    }

    #[test]
    fn test_descendants_preorder() {
        let mut doc = Document::new();
        for v in 1..=3 {
            doc.create_node(id(v), None).unwrap();
        }
        doc.set_parent(NodeId::ROOT, id(1)).unwrap();
        doc.set_parent(id(1), id(2)).unwrap();
        doc.set_parent(NodeId::ROOT, id(3)).unwrap();
        assert_eq!(
            doc.descendants(NodeId::ROOT),
            vec![NodeId::ROOT, id(1), id(2), id(3)]
        );
    }
}
