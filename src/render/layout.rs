//! Block layout over the styled tree

use crate::dom::NodeId;
use crate::style::{Color, ComputedStyle, StyledNode, StyledTree, Unit, Value};

/// Box dimensions
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Dimensions {
    /// Content area
    pub content: Rect,
    pub padding: EdgeSizes,
    pub border: EdgeSizes,
    pub margin: EdgeSizes,
}

impl Dimensions {
    /// Get the padding box rectangle
    pub fn padding_box(&self) -> Rect {
        self.content.expanded_by(&self.padding)
    }

    /// Get the border box rectangle
    pub fn border_box(&self) -> Rect {
        self.padding_box().expanded_by(&self.border)
    }

    /// Get the margin box rectangle
    pub fn margin_box(&self) -> Rect {
        self.border_box().expanded_by(&self.margin)
    }
}

/// Rectangle for positioning
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    fn expanded_by(self, edge: &EdgeSizes) -> Rect {
        Rect {
            x: self.x - edge.left,
            y: self.y - edge.top,
            width: self.width + edge.left + edge.right,
            height: self.height + edge.top + edge.bottom,
        }
    }

    /// Half-open containment test
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// Edge sizes for padding, border, margin
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EdgeSizes {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl EdgeSizes {
    fn uniform(size: f32) -> Self {
        Self {
            top: size,
            right: size,
            bottom: size,
            left: size,
        }
    }

    fn horizontal(&self) -> f32 {
        self.left + self.right
    }
}

/// Display type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayType {
    Block,
    Inline,
    None,
}

/// Layout box in the render tree
#[derive(Debug, Clone)]
pub struct LayoutBox {
    pub node_id: NodeId,
    pub dimensions: Dimensions,
    pub display: DisplayType,
    /// Resolved background color, if any
    pub background: Option<Color>,
    pub text: Option<String>,
    /// Indices into the owning `LayoutTree`
    pub children: Vec<usize>,
    style: ComputedStyle,
}

/// Layout boxes stored flat in pre-order; index 0 is the root box
///
/// Pre-order is also paint order: parents come before their children and
/// earlier siblings before later ones.
#[derive(Debug, Clone)]
pub struct LayoutTree {
    boxes: Vec<LayoutBox>,
}

impl LayoutTree {
    pub fn root(&self) -> &LayoutBox {
        &self.boxes[0]
    }

    pub fn get(&self, index: usize) -> Option<&LayoutBox> {
        self.boxes.get(index)
    }

    pub fn children<'t>(
        &'t self,
        parent: &'t LayoutBox,
    ) -> impl DoubleEndedIterator<Item = &'t LayoutBox> + 't {
        parent.children.iter().map(move |&index| &self.boxes[index])
    }

    /// Boxes in paint order
    pub fn iter(&self) -> impl Iterator<Item = &LayoutBox> {
        self.boxes.iter()
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Find the box generated for a node
    pub fn find(&self, id: NodeId) -> Option<&LayoutBox> {
        self.boxes.iter().find(|b| b.node_id == id)
    }

    /// Node path from the root to the innermost box under the point
    ///
    /// Later siblings are painted on top, so they are tested first.
    /// Empty when the point lies outside the root box.
    pub fn hit_test(&self, x: f32, y: f32) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut current = self.root();
        if !current.dimensions.border_box().contains(x, y) {
            return path;
        }
        path.push(current.node_id);

        while let Some(child) = self
            .children(current)
            .rev()
            .find(|child| child.dimensions.border_box().contains(x, y))
        {
            path.push(child.node_id);
            current = child;
        }
        path
    }
}

/// A box whose children are still being placed
struct OpenBox {
    index: usize,
    next_child: usize,
    /// Containing block for the next child; its height grows as children land
    cursor: Dimensions,
}

/// Default font metrics for text layout
#[derive(Debug, Clone, Copy)]
pub struct FontMetrics {
    /// Font size in pixels
    pub size: f32,
    /// Line height multiplier
    pub line_height: f32,
    /// Average character width (approximation)
    pub char_width: f32,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self {
            size: 16.0,
            line_height: 1.2,
            char_width: 8.0,
        }
    }
}

impl FontMetrics {
    fn line_box(&self) -> f32 {
        self.size * self.line_height
    }
}

/// Layout engine for computing the layout tree
pub struct LayoutEngine {
    viewport_width: f32,
    viewport_height: f32,
    font_metrics: FontMetrics,
}

impl LayoutEngine {
    pub fn new(viewport_width: u32, viewport_height: u32) -> Self {
        Self {
            viewport_width: viewport_width as f32,
            viewport_height: viewport_height as f32,
            font_metrics: FontMetrics::default(),
        }
    }

    /// Set viewport dimensions
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport_width = width as f32;
        self.viewport_height = height as f32;
    }

    pub fn viewport(&self) -> (u32, u32) {
        (self.viewport_width as u32, self.viewport_height as u32)
    }

    /// Compute layout for a styled tree
    ///
    /// The root box always covers at least the viewport.
    pub fn compute(&self, styled: &StyledTree<'_>) -> LayoutTree {
        let viewport = Dimensions {
            content: Rect {
                x: 0.0,
                y: 0.0,
                width: self.viewport_width,
                height: 0.0,
            },
            ..Default::default()
        };

        let mut tree = self.build_layout_tree(styled);
        self.layout_tree(&mut tree, &viewport);
        let content = &mut tree.boxes[0].dimensions.content;
        content.height = content.height.max(self.viewport_height);
        tree
    }

    /// One box per displayed node; `display: none` drops the whole subtree
    fn build_layout_tree(&self, styled: &StyledTree<'_>) -> LayoutTree {
        let mut boxes: Vec<LayoutBox> = Vec::with_capacity(styled.len());
        let mut stack = vec![(styled.root(), None::<usize>)];

        while let Some((node, parent)) = stack.pop() {
            let layout_box = self.build_box(node);
            let index = boxes.len();
            if let Some(parent) = parent {
                if layout_box.display == DisplayType::None {
                    continue;
                }
                boxes[parent].children.push(index);
            }
            boxes.push(layout_box);
            stack.extend(styled.children(node).rev().map(|child| (child, Some(index))));
        }

        LayoutTree { boxes }
    }

    fn build_box(&self, styled: &StyledNode<'_>) -> LayoutBox {
        let style = &styled.style;
        let display = match style.get("display").and_then(Value::as_keyword) {
            Some("none") => DisplayType::None,
            Some("inline") => DisplayType::Inline,
            _ => DisplayType::Block,
        };
        let background = style
            .get("background-color")
            .or_else(|| style.get("background"))
            .and_then(Value::as_color);

        LayoutBox {
            node_id: styled.node.id(),
            dimensions: Dimensions::default(),
            display,
            background,
            text: styled
                .node
                .text()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            children: Vec::new(),
            style: style.clone(),
        }
    }

    /// Place every box, parents' widths first and heights on the way back up
    ///
    /// Children stack vertically below the parent's text, so each child is
    /// placed only once its previous sibling's subtree has a height.
    fn layout_tree(&self, tree: &mut LayoutTree, viewport: &Dimensions) {
        let root = &mut tree.boxes[0];
        self.calculate_block_width(root, viewport);
        self.calculate_block_position(root, viewport);
        let mut stack = vec![self.open(root, 0)];

        while let Some(top) = stack.last_mut() {
            if let Some(&child) = tree.boxes[top.index].children.get(top.next_child) {
                top.next_child += 1;
                let containing = top.cursor;
                let child_box = &mut tree.boxes[child];
                match child_box.display {
                    DisplayType::Inline => self.place_inline(child_box, &containing),
                    DisplayType::Block | DisplayType::None => {
                        self.calculate_block_width(child_box, &containing);
                        self.calculate_block_position(child_box, &containing);
                    }
                }
                let open = self.open(child_box, child);
                stack.push(open);
                continue;
            }

            let OpenBox { index, cursor, .. } = *top;
            stack.pop();
            let finished = &mut tree.boxes[index];
            self.calculate_block_height(finished, cursor.content.height);
            let height = finished.dimensions.margin_box().height;
            if let Some(parent) = stack.last_mut() {
                parent.cursor.content.height += height;
            }
        }
    }

    fn open(&self, layout_box: &LayoutBox, index: usize) -> OpenBox {
        let mut cursor = layout_box.dimensions;
        cursor.content.height = self.text_height(layout_box);
        OpenBox {
            index,
            next_child: 0,
            cursor,
        }
    }

    fn calculate_block_width(&self, layout_box: &mut LayoutBox, containing_block: &Dimensions) {
        let reference = containing_block.content.width;
        let style = &layout_box.style;
        let dims = &mut layout_box.dimensions;
        dims.margin = self.edges(style, "margin", reference);
        dims.padding = self.edges(style, "padding", reference);
        dims.border = self.border_edges(style, reference);

        let available = reference - dims.margin.horizontal() - dims.border.horizontal()
            - dims.padding.horizontal();
        let width = self
            .length(style, "width", reference)
            .unwrap_or(available);
        dims.content.width = width.max(0.0);
    }

    fn calculate_block_position(&self, layout_box: &mut LayoutBox, containing_block: &Dimensions) {
        let dims = &mut layout_box.dimensions;
        dims.content.x =
            containing_block.content.x + dims.margin.left + dims.border.left + dims.padding.left;
        dims.content.y = containing_block.content.y
            + containing_block.content.height
            + dims.margin.top
            + dims.border.top
            + dims.padding.top;
    }

    /// `auto` is the height of the text plus every child's margin box
    fn calculate_block_height(&self, layout_box: &mut LayoutBox, auto: f32) {
        let reference = self.viewport_height;
        layout_box.dimensions.content.height = self
            .length(&layout_box.style, "height", reference)
            .unwrap_or(auto)
            .max(0.0);
    }

    /// Inline boxes shrink to their text
    fn place_inline(&self, layout_box: &mut LayoutBox, containing_block: &Dimensions) {
        let reference = containing_block.content.width;
        let text_width = layout_box
            .text
            .as_ref()
            .map(|t| t.chars().count() as f32 * self.font_metrics.char_width)
            .unwrap_or(0.0);
        let width = self
            .length(&layout_box.style, "width", reference)
            .unwrap_or(text_width.min(reference));
        layout_box.dimensions.content.width = width.max(0.0);
        layout_box.dimensions.content.x = containing_block.content.x;
        layout_box.dimensions.content.y =
            containing_block.content.y + containing_block.content.height;
    }

    fn text_height(&self, layout_box: &LayoutBox) -> f32 {
        match &layout_box.text {
            Some(text) => {
                self.calculate_text_lines(text, layout_box.dimensions.content.width) as f32
                    * self.font_metrics.line_box()
            }
            None => 0.0,
        }
    }

    /// Number of lines needed to fit text in the given width
    fn calculate_text_lines(&self, text: &str, width: f32) -> usize {
        let per_line = (width / self.font_metrics.char_width).floor().max(1.0) as usize;
        text.chars().count().div_ceil(per_line).max(1)
    }

    fn length(&self, style: &ComputedStyle, property: &str, reference: f32) -> Option<f32> {
        style.get(property).and_then(|v| self.to_px(v, reference))
    }

    /// Resolve a length against the containing block and viewport
    fn to_px(&self, value: &Value, reference: f32) -> Option<f32> {
        match value {
            Value::Length(v, unit) => Some(match unit {
                Unit::Px => *v,
                Unit::Em | Unit::Rem => v * self.font_metrics.size,
                Unit::Percent => v * reference / 100.0,
                Unit::Vw => v * self.viewport_width / 100.0,
                Unit::Vh => v * self.viewport_height / 100.0,
                Unit::Pt => v * 96.0 / 72.0,
                Unit::Cm => v * 96.0 / 2.54,
                Unit::Mm => v * 96.0 / 25.4,
                Unit::In => v * 96.0,
            }),
            Value::Percentage(p) => Some(p * reference / 100.0),
            Value::Number(n) if *n == 0.0 => Some(0.0),
            _ => None,
        }
    }

    /// `margin`/`padding` shorthand (one to four values) then longhands
    fn edges(&self, style: &ComputedStyle, prefix: &str, reference: f32) -> EdgeSizes {
        let mut edges = match style.get(prefix) {
            Some(Value::List(values)) => {
                let px: Vec<f32> = values
                    .iter()
                    .map(|v| self.to_px(v, reference).unwrap_or(0.0))
                    .collect();
                match px.as_slice() {
                    [all] => EdgeSizes::uniform(*all),
                    [vertical, horizontal] => EdgeSizes {
                        top: *vertical,
                        right: *horizontal,
                        bottom: *vertical,
                        left: *horizontal,
                    },
                    [top, horizontal, bottom] => EdgeSizes {
                        top: *top,
                        right: *horizontal,
                        bottom: *bottom,
                        left: *horizontal,
                    },
                    [top, right, bottom, left, ..] => EdgeSizes {
                        top: *top,
                        right: *right,
                        bottom: *bottom,
                        left: *left,
                    },
                    [] => EdgeSizes::default(),
                }
            }
            Some(value) => EdgeSizes::uniform(self.to_px(value, reference).unwrap_or(0.0)),
            None => EdgeSizes::default(),
        };

        let sides: [(&str, &mut f32); 4] = [
            ("top", &mut edges.top),
            ("right", &mut edges.right),
            ("bottom", &mut edges.bottom),
            ("left", &mut edges.left),
        ];
        for (side, slot) in sides {
            if let Some(px) = self.length(style, &format!("{}-{}", prefix, side), reference) {
                *slot = px;
            }
        }
        edges
    }

    /// Uniform border width from `border-width` or the first length in `border`
    fn border_edges(&self, style: &ComputedStyle, reference: f32) -> EdgeSizes {
        let width = self.length(style, "border-width", reference).or_else(|| {
            match style.get("border")? {
                Value::List(values) => values.iter().find_map(|v| self.to_px(v, reference)),
                value => self.to_px(value, reference),
            }
        });
        EdgeSizes::uniform(width.unwrap_or(0.0))
    }
}
