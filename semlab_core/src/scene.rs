//! Declarative vector scene graph.
//!
//! A [`Scene`] is the complete drawing of one widget for one state snapshot.
//! Widgets build a fresh scene on every render; nothing here remembers a
//! previous frame.
//!
//! # Structure
//!
//! ```text
//! Scene (viewBox width × height, aria label, arrow marker)
//!   ├── Item::Node  ── Shape + Style (+ id, tooltip, click action)
//!   └── Item::Group ── class, opacity, nested items
//! ```

use crate::widget::Action;
use serde::{Deserialize, Serialize};

/// RGBA color, serialized as a hex string by the renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Opaque color from RGB components.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Same color with a different alpha.
    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Returns `#rrggbb`, or `#rrggbbaa` when not fully opaque.
    pub fn hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

/// Lecture palette.
pub mod palette {
    use super::Color;

    pub const BLUE: Color = Color::rgb(0x25, 0x63, 0xeb);
    pub const BLUE_TINT: Color = Color::rgb(0xef, 0xf6, 0xff);
    pub const RED: Color = Color::rgb(0xdc, 0x26, 0x26);
    pub const RED_TINT: Color = Color::rgb(0xfe, 0xf2, 0xf2);
    pub const GREEN: Color = Color::rgb(0x16, 0xa3, 0x4a);
    pub const GREEN_TINT: Color = Color::rgb(0xf0, 0xfd, 0xf4);
    pub const AMBER: Color = Color::rgb(0xf5, 0x9e, 0x0b);
    pub const AMBER_DARK: Color = Color::rgb(0xb4, 0x53, 0x09);
    pub const AMBER_TINT: Color = Color::rgb(0xfe, 0xfc, 0xe8);
    pub const PINK: Color = Color::rgb(0xec, 0x48, 0x99);
    pub const PINK_DARK: Color = Color::rgb(0xbe, 0x18, 0x5d);
    pub const PINK_TINT: Color = Color::rgb(0xfd, 0xf2, 0xf8);
    pub const GRAY: Color = Color::rgb(0x6b, 0x72, 0x80);
    pub const GRAY_MID: Color = Color::rgb(0x9c, 0xa3, 0xaf);
    pub const GRAY_LIGHT: Color = Color::rgb(0xd1, 0xd5, 0xdb);
    pub const PAPER: Color = Color::rgb(0xf8, 0xf8, 0xf6);
    pub const INK: Color = Color::rgb(0x2d, 0x2d, 0x2d);
    pub const WHITE: Color = Color::rgb(0xff, 0xff, 0xff);
}

/// Horizontal text alignment relative to the anchor point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Anchor {
    #[default]
    Start,
    Middle,
    End,
}

impl Anchor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Anchor::Start => "start",
            Anchor::Middle => "middle",
            Anchor::End => "end",
        }
    }
}

/// Font settings for text shapes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Font {
    /// Size in px
    pub size: f64,
    /// CSS font weight (400 = normal)
    pub weight: u16,
    pub anchor: Anchor,
}

impl Default for Font {
    fn default() -> Self {
        Self {
            size: 12.0,
            weight: 400,
            anchor: Anchor::Start,
        }
    }
}

/// Geometric primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        rx: f64,
    },
    Ellipse {
        cx: f64,
        cy: f64,
        rx: f64,
        ry: f64,
    },
    Circle {
        cx: f64,
        cy: f64,
        r: f64,
    },
    Line {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
    },
    Text {
        x: f64,
        y: f64,
        content: String,
        font: Font,
    },
}

/// Paint settings shared by all shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Style {
    pub fill: Option<Color>,
    pub stroke: Option<Color>,
    pub stroke_width: f64,
    /// Dash pattern (dash, gap)
    pub dash: Option<(f64, f64)>,
    /// Draw the scene's arrow marker at the end of a line
    pub arrow: bool,
    pub opacity: f64,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fill: None,
            stroke: None,
            stroke_width: 1.0,
            dash: None,
            arrow: false,
            opacity: 1.0,
        }
    }
}

/// A drawable element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub shape: Shape,
    pub style: Style,
    /// Stable identifier, used for hit testing and by tests
    pub id: Option<String>,
    /// Tooltip text shown on hover
    pub title: Option<String>,
    /// Action dispatched when the node is clicked
    pub action: Option<Action>,
}

impl Node {
    fn from_shape(shape: Shape) -> Self {
        Self {
            shape,
            style: Style::default(),
            id: None,
            title: None,
            action: None,
        }
    }

    pub fn rect(x: f64, y: f64, width: f64, height: f64, rx: f64) -> Self {
        Self::from_shape(Shape::Rect { x, y, width, height, rx })
    }

    pub fn ellipse(cx: f64, cy: f64, rx: f64, ry: f64) -> Self {
        Self::from_shape(Shape::Ellipse { cx, cy, rx, ry })
    }

    pub fn circle(cx: f64, cy: f64, r: f64) -> Self {
        Self::from_shape(Shape::Circle { cx, cy, r })
    }

    pub fn line(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::from_shape(Shape::Line { x1, y1, x2, y2 })
    }

    /// Text anchored at its start; chain [`Node::centered`] for middle.
    pub fn text(x: f64, y: f64, content: impl Into<String>, size: f64) -> Self {
        let mut node = Self::from_shape(Shape::Text {
            x,
            y,
            content: content.into(),
            font: Font {
                size,
                ..Font::default()
            },
        });
        node.style.fill = Some(palette::INK);
        node
    }

    pub fn fill(mut self, color: Color) -> Self {
        self.style.fill = Some(color);
        self
    }

    pub fn stroke(mut self, color: Color, width: f64) -> Self {
        self.style.stroke = Some(color);
        self.style.stroke_width = width;
        self
    }

    pub fn dashed(mut self, dash: f64, gap: f64) -> Self {
        self.style.dash = Some((dash, gap));
        self
    }

    pub fn arrow(mut self) -> Self {
        self.style.arrow = true;
        self
    }

    pub fn opacity(mut self, opacity: f64) -> Self {
        self.style.opacity = opacity;
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn on_click(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    /// Sets the font weight. No effect on non-text shapes.
    pub fn weight(mut self, weight: u16) -> Self {
        if let Shape::Text { font, .. } = &mut self.shape {
            font.weight = weight;
        }
        self
    }

    pub fn bold(self) -> Self {
        self.weight(600)
    }

    /// Centers text on its x coordinate. No effect on non-text shapes.
    pub fn centered(mut self) -> Self {
        if let Shape::Text { font, .. } = &mut self.shape {
            font.anchor = Anchor::Middle;
        }
        self
    }

    /// Returns the text content for text nodes.
    pub fn text_content(&self) -> Option<&str> {
        match &self.shape {
            Shape::Text { content, .. } => Some(content),
            _ => None,
        }
    }
}

/// A named layer whose opacity applies to everything inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub class: String,
    pub opacity: f64,
    pub items: Vec<Item>,
}

impl Group {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            opacity: 1.0,
            items: Vec::new(),
        }
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn push(&mut self, node: Node) {
        self.items.push(Item::Node(node));
    }
}

/// Scene graph entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Item {
    Node(Node),
    Group(Group),
}

/// Arrowhead definition shared by the lines of one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrowMarker {
    pub id: String,
    pub color: Color,
}

/// Complete drawing of one widget state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub width: f64,
    pub height: f64,
    pub aria_label: String,
    pub marker: Option<ArrowMarker>,
    pub items: Vec<Item>,
}

impl Scene {
    pub fn new(width: f64, height: f64, aria_label: impl Into<String>) -> Self {
        Self {
            width,
            height,
            aria_label: aria_label.into(),
            marker: None,
            items: Vec::new(),
        }
    }

    pub fn with_marker(mut self, id: impl Into<String>, color: Color) -> Self {
        self.marker = Some(ArrowMarker { id: id.into(), color });
        self
    }

    pub fn push(&mut self, node: Node) {
        self.items.push(Item::Node(node));
    }

    pub fn push_group(&mut self, group: Group) {
        self.items.push(Item::Group(group));
    }

    /// Visits every node with its effective opacity (node × enclosing groups).
    pub fn walk<F: FnMut(&Node, f64)>(&self, mut f: F) {
        fn visit<F: FnMut(&Node, f64)>(items: &[Item], parent: f64, f: &mut F) {
            for item in items {
                match item {
                    Item::Node(node) => f(node, parent * node.style.opacity),
                    Item::Group(group) => visit(&group.items, parent * group.opacity, f),
                }
            }
        }
        visit(&self.items, 1.0, &mut f);
    }

    /// Text content of all nodes that are not fully transparent, in draw order.
    pub fn visible_texts(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.walk(|node, opacity| {
            if opacity > 0.0 {
                if let Some(text) = node.text_content() {
                    out.push(text.to_string());
                }
            }
        });
        out
    }

    /// Finds a node by id anywhere in the scene.
    pub fn find(&self, id: &str) -> Option<&Node> {
        fn search<'a>(items: &'a [Item], id: &str) -> Option<&'a Node> {
            for item in items {
                match item {
                    Item::Node(node) if node.id.as_deref() == Some(id) => return Some(node),
                    Item::Node(_) => {}
                    Item::Group(group) => {
                        if let Some(found) = search(&group.items, id) {
                            return Some(found);
                        }
                    }
                }
            }
            None
        }
        search(&self.items, id)
    }

    /// Effective opacity of the node with `id`, if present.
    pub fn opacity_of(&self, id: &str) -> Option<f64> {
        let mut found = None;
        self.walk(|node, opacity| {
            if found.is_none() && node.id.as_deref() == Some(id) {
                found = Some(opacity);
            }
        });
        found
    }

    /// Actions reachable by clicking visible nodes.
    pub fn clickable(&self) -> Vec<Action> {
        let mut out = Vec::new();
        self.walk(|node, opacity| {
            if opacity > 0.0 {
                if let Some(action) = &node.action {
                    out.push(action.clone());
                }
            }
        });
        out
    }

    /// Total number of nodes, including hidden ones.
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.walk(|_, _| count += 1);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_hex() {
        assert_eq!(palette::BLUE.hex(), "#2563eb");
        assert_eq!(palette::RED.with_alpha(0x15).hex(), "#dc262615");
    }

    #[test]
    fn test_group_opacity_hides_texts() {
        let mut scene = Scene::new(100.0, 100.0, "test");
        scene.push(Node::text(0.0, 0.0, "shown", 12.0));

        let mut hidden = Group::new("layer").with_opacity(0.0);
        hidden.push(Node::text(0.0, 0.0, "hidden", 12.0).id("h"));
        scene.push_group(hidden);

        assert_eq!(scene.visible_texts(), vec!["shown".to_string()]);
        assert_eq!(scene.opacity_of("h"), Some(0.0));
        assert_eq!(scene.node_count(), 2);
    }

    #[test]
    fn test_find_nested() {
        let mut scene = Scene::new(10.0, 10.0, "test");
        let mut group = Group::new("outer");
        group.push(Node::circle(1.0, 1.0, 1.0).id("dot"));
        scene.push_group(group);

        assert!(scene.find("dot").is_some());
        assert!(scene.find("missing").is_none());
    }

    #[test]
    fn test_clickable_skips_invisible() {
        let mut scene = Scene::new(10.0, 10.0, "test");
        scene.push(Node::line(0.0, 0.0, 1.0, 1.0).on_click(Action::Reset));
        scene.push(Node::line(0.0, 0.0, 1.0, 1.0).opacity(0.0).on_click(Action::NextStep));

        assert_eq!(scene.clickable(), vec![Action::Reset]);
    }
}
