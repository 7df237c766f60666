//! Style computation and cascade

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::css::{CssParser, Rule, Specificity, Stylesheet, Value};
use crate::dom::{Document, Node, NodeId};

/// Computed styles for a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComputedStyle {
    properties: BTreeMap<String, Value>,
}

impl ComputedStyle {
    /// Get a property value
    pub fn get(&self, property: &str) -> Option<&Value> {
        self.properties.get(property)
    }

    /// Set a property value
    pub fn set(&mut self, property: impl Into<String>, value: Value) {
        self.properties.insert(property.into(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Style tree node (document node + computed style)
#[derive(Debug, Clone)]
pub struct StyledNode<'a> {
    pub node: &'a Node,
    pub style: ComputedStyle,
    /// Indices into the owning `StyledTree`
    pub children: Vec<usize>,
}

/// Styled nodes stored flat in document pre-order; index 0 is the root
///
/// Depth is bounded only by the document, so neither building nor
/// dropping the tree recurses.
#[derive(Debug, Clone)]
pub struct StyledTree<'a> {
    nodes: Vec<StyledNode<'a>>,
}

impl<'a> StyledTree<'a> {
    pub fn root(&self) -> &StyledNode<'a> {
        &self.nodes[0]
    }

    pub fn get(&self, index: usize) -> Option<&StyledNode<'a>> {
        self.nodes.get(index)
    }

    pub fn children<'t>(
        &'t self,
        node: &'t StyledNode<'a>,
    ) -> impl DoubleEndedIterator<Item = &'t StyledNode<'a>> + 't {
        node.children.iter().map(move |&index| &self.nodes[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = &StyledNode<'a>> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Owns an instance's stylesheets and resolves the cascade
pub struct StyleEngine {
    parser: CssParser,
    stylesheets: Vec<Stylesheet>,
}

impl StyleEngine {
    /// Create a style engine with no stylesheets
    pub fn new() -> Self {
        Self {
            parser: CssParser::new(),
            stylesheets: Vec::new(),
        }
    }

    /// Parse and append a stylesheet; returns the parsed sheet
    pub fn add_stylesheet(&mut self, css: &str) -> &Stylesheet {
        let sheet = self.parser.parse(css);
        self.stylesheets.push(sheet);
        &self.stylesheets[self.stylesheets.len() - 1]
    }

    pub fn stylesheets(&self) -> &[Stylesheet] {
        &self.stylesheets
    }

    /// Total number of rules across all sheets
    pub fn rule_count(&self) -> usize {
        self.stylesheets.iter().map(|s| s.rules.len()).sum()
    }

    /// Compute styles for the whole tree under the document root
    pub fn style_tree<'a>(&self, document: &'a Document) -> StyledTree<'a> {
        let mut nodes: Vec<StyledNode<'a>> = Vec::with_capacity(document.len());
        let mut stack: Vec<(&'a Node, Option<usize>)> = vec![(document.root(), None)];

        while let Some((node, parent)) = stack.pop() {
            let index = nodes.len();
            nodes.push(StyledNode {
                node,
                style: self.computed_style(node),
                children: Vec::new(),
            });
            if let Some(parent) = parent {
                nodes[parent].children.push(index);
            }
            // reversed so siblings pop in document order
            stack.extend(
                node.children()
                    .iter()
                    .rev()
                    .filter_map(|&child| document.get(child))
                    .map(|child| (child, Some(index))),
            );
        }

        StyledTree { nodes }
    }

    /// Compute styles for a single node by id
    pub fn computed_style_for(&self, document: &Document, id: NodeId) -> Option<ComputedStyle> {
        document.get(id).map(|node| self.computed_style(node))
    }

    /// Compute style for a single node
    ///
    /// Matching rules apply in (specificity, sheet order, rule order)
    /// ascending order, so the last applicable declaration wins.
    pub fn computed_style(&self, node: &Node) -> ComputedStyle {
        let mut matched: Vec<(Specificity, usize, usize, &Rule)> = Vec::new();
        for (sheet_index, sheet) in self.stylesheets.iter().enumerate() {
            for (rule_index, rule) in sheet.rules.iter().enumerate() {
                if let Some(specificity) = rule.match_specificity(node.attributes()) {
                    matched.push((specificity, sheet_index, rule_index, rule));
                }
            }
        }
        matched.sort_by_key(|&(specificity, sheet, rule, _)| (specificity, sheet, rule));

        let mut style = ComputedStyle::default();
        for (_, _, _, rule) in matched {
            for declaration in &rule.declarations {
                style.set(declaration.property.clone(), declaration.value.clone());
            }
        }
        style
    }
}

impl Default for StyleEngine {
    fn default() -> Self {
        Self::new()
    }
}
