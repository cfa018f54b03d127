//! SVG / HTML adapter for frames.
//!
//! The renderer is deliberately dumb: it serializes whatever the widget
//! projected, every time. [`Surface`] sits on top and only reports a redraw
//! when the serialized output actually changed.

use crate::scene::{Item, Node, Scene, Shape};
use crate::widget::{Block, Control, Frame};
use std::fmt::Write;

/// `write!` into a `String`, which cannot fail.
macro_rules! emit {
    ($out:expr, $($arg:tt)*) => {{
        let _ = $out.write_fmt(format_args!($($arg)*));
    }};
}

/// Escapes text for use in XML content and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Formats a coordinate without trailing zeros.
fn num(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        let s = format!("{:.3}", v);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Serializes scenes to SVG and frames to HTML fragments.
#[derive(Debug, Clone, Default)]
pub struct SvgRenderer;

impl SvgRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Renders a scene as a standalone `<svg>` element.
    pub fn render_scene(&self, scene: &Scene) -> String {
        let mut out = String::new();
        emit!(
            out,
            "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 {} {}\" role=\"img\" aria-label=\"{}\">",
            num(scene.width),
            num(scene.height),
            escape(&scene.aria_label)
        );
        if let Some(marker) = &scene.marker {
            emit!(
                out,
                "<defs><marker id=\"{}\" viewBox=\"0 0 10 10\" refX=\"10\" refY=\"5\" markerWidth=\"8\" markerHeight=\"8\" orient=\"auto-start-reverse\"><path d=\"M 0 0 L 10 5 L 0 10 Z\" fill=\"{}\"/></marker></defs>",
                escape(&marker.id),
                marker.color.hex()
            );
        }
        let marker_id = scene.marker.as_ref().map(|m| m.id.as_str());
        self.render_items(&mut out, &scene.items, marker_id);
        out.push_str("</svg>");
        out
    }

    fn render_items(&self, out: &mut String, items: &[Item], marker: Option<&str>) {
        for item in items {
            match item {
                Item::Node(node) => self.render_node(out, node, marker),
                Item::Group(group) => {
                    emit!(
                        out,
                        "<g class=\"{}\" opacity=\"{}\">",
                        escape(&group.class),
                        num(group.opacity)
                    );
                    self.render_items(out, &group.items, marker);
                    out.push_str("</g>");
                }
            }
        }
    }

    fn render_node(&self, out: &mut String, node: &Node, marker: Option<&str>) {
        let mut attrs = String::new();
        if let Some(id) = &node.id {
            emit!(attrs, " id=\"{}\"", escape(id));
        }
        let style = &node.style;
        match (&node.shape, style.fill) {
            (_, Some(fill)) => {
                emit!(attrs, " fill=\"{}\"", fill.hex());
            }
            (Shape::Text { .. }, None) => {}
            (_, None) => attrs.push_str(" fill=\"none\""),
        }
        if let Some(stroke) = style.stroke {
            emit!(
                attrs,
                " stroke=\"{}\" stroke-width=\"{}\"",
                stroke.hex(),
                num(style.stroke_width)
            );
        }
        if let Some((dash, gap)) = style.dash {
            emit!(attrs, " stroke-dasharray=\"{},{}\"", num(dash), num(gap));
        }
        if style.arrow {
            if let Some(id) = marker {
                emit!(attrs, " marker-end=\"url(#{})\"", escape(id));
            }
        }
        if style.opacity < 1.0 {
            emit!(attrs, " opacity=\"{}\"", num(style.opacity));
        }
        if node.action.is_some() {
            attrs.push_str(" style=\"cursor: pointer\"");
        }

        let title = node
            .title
            .as_ref()
            .map(|t| format!("<title>{}</title>", escape(t)));

        match &node.shape {
            Shape::Rect { x, y, width, height, rx } => {
                emit!(
                    out,
                    "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" rx=\"{}\"{}",
                    num(*x),
                    num(*y),
                    num(*width),
                    num(*height),
                    num(*rx),
                    attrs
                );
                close(out, "rect", title);
            }
            Shape::Ellipse { cx, cy, rx, ry } => {
                emit!(
                    out,
                    "<ellipse cx=\"{}\" cy=\"{}\" rx=\"{}\" ry=\"{}\"{}",
                    num(*cx),
                    num(*cy),
                    num(*rx),
                    num(*ry),
                    attrs
                );
                close(out, "ellipse", title);
            }
            Shape::Circle { cx, cy, r } => {
                emit!(
                    out,
                    "<circle cx=\"{}\" cy=\"{}\" r=\"{}\"{}",
                    num(*cx),
                    num(*cy),
                    num(*r),
                    attrs
                );
                close(out, "circle", title);
            }
            Shape::Line { x1, y1, x2, y2 } => {
                emit!(
                    out,
                    "<line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\"{}",
                    num(*x1),
                    num(*y1),
                    num(*x2),
                    num(*y2),
                    attrs
                );
                close(out, "line", title);
            }
            Shape::Text { x, y, content, font } => {
                emit!(
                    out,
                    "<text x=\"{}\" y=\"{}\" text-anchor=\"{}\" font-size=\"{}px\"",
                    num(*x),
                    num(*y),
                    font.anchor.as_str(),
                    num(font.size)
                );
                if font.weight != 400 {
                    emit!(out, " font-weight=\"{}\"", font.weight);
                }
                emit!(out, "{}>", attrs);
                if let Some(t) = title {
                    out.push_str(&t);
                }
                out.push_str(&escape(content));
                out.push_str("</text>");
            }
        }
    }

    /// Renders a whole frame as an HTML fragment (scene plus controls).
    pub fn render_frame(&self, frame: &Frame) -> String {
        let mut out = String::new();
        match &frame.aria_label {
            Some(label) => {
                emit!(out, "<div role=\"region\" aria-label=\"{}\">", escape(label));
            }
            None => out.push_str("<div>"),
        }
        if let Some(scene) = &frame.scene {
            out.push_str(&self.render_scene(scene));
        }
        for block in &frame.blocks {
            self.render_block(&mut out, block);
        }
        out.push_str("</div>");
        out
    }

    fn render_block(&self, out: &mut String, block: &Block) {
        emit!(out, "<div class=\"{}\"", escape(&block.class));
        if let Some(label) = &block.label {
            emit!(out, " role=\"group\" aria-label=\"{}\"", escape(label));
        }
        out.push('>');
        for control in &block.controls {
            match control {
                Control::Button { label, aria_label, enabled, tone, .. } => {
                    emit!(
                        out,
                        "<button class=\"{}\" aria-label=\"{}\"{}>{}</button>",
                        tone.class(),
                        escape(aria_label),
                        if *enabled { "" } else { " disabled" },
                        escape(label)
                    );
                }
                Control::Slider { name, label, min, max, step, value, display } => {
                    emit!(
                        out,
                        "<div class=\"slider-group\"><label for=\"slider-{name}\">{}: <span class=\"slider-value\">{}</span></label><input type=\"range\" id=\"slider-{name}\" min=\"{}\" max=\"{}\" step=\"{}\" value=\"{}\" aria-label=\"{}\"/></div>",
                        escape(label),
                        escape(display),
                        num(*min),
                        num(*max),
                        num(*step),
                        num(*value),
                        escape(label),
                        name = escape(name),
                    );
                }
                Control::Card { id, label, value, tone } => {
                    emit!(
                        out,
                        "<div class=\"fit-card {}\" id=\"{}\"><div class=\"value\">{}</div><div class=\"label\">{}</div></div>",
                        tone.class(),
                        escape(id),
                        escape(value),
                        escape(label)
                    );
                }
                Control::Text { class, content, tone } => {
                    emit!(
                        out,
                        "<p class=\"{} {}\">{}</p>",
                        escape(class),
                        tone.class(),
                        escape(content)
                    );
                }
            }
        }
        out.push_str("</div>");
    }
}

fn close(out: &mut String, tag: &str, title: Option<String>) {
    match title {
        Some(t) => {
            emit!(out, ">{}</{}>", t, tag);
        }
        None => out.push_str("/>"),
    }
}

/// Redraw target that remembers the last presented output.
///
/// Stands in for the container element: a frame is only "drawn" when its
/// serialization differs from what is already on screen.
#[derive(Debug, Default)]
pub struct Surface {
    renderer: SvgRenderer,
    current: Option<String>,
    redraws: usize,
}

impl Surface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Presents a frame. Returns true if the surface content changed.
    pub fn present(&mut self, frame: &Frame) -> bool {
        let html = self.renderer.render_frame(frame);
        if self.current.as_deref() == Some(html.as_str()) {
            return false;
        }
        self.current = Some(html);
        self.redraws += 1;
        true
    }

    /// What is currently on screen.
    pub fn content(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Number of presents that changed the content.
    pub fn redraw_count(&self) -> usize {
        self.redraws
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::palette;
    use crate::widget::Action;

    #[test]
    fn test_render_scene_basic() {
        let mut scene = Scene::new(600.0, 300.0, "Test & diagram").with_marker("arrow-var", palette::BLUE);
        scene.push(Node::rect(80.0, 130.0, 150.0, 50.0, 8.0).fill(palette::BLUE_TINT).stroke(palette::BLUE, 2.0));
        scene.push(Node::line(230.0, 155.0, 370.0, 155.0).stroke(palette::BLUE, 2.0).arrow());
        scene.push(Node::text(155.0, 150.0, "Therapy <Type>", 13.0).bold().centered());

        let svg = SvgRenderer::new().render_scene(&scene);
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("viewBox=\"0 0 600 300\""));
        assert!(svg.contains("aria-label=\"Test &amp; diagram\""));
        assert!(svg.contains("marker-end=\"url(#arrow-var)\""));
        assert!(svg.contains("Therapy &lt;Type&gt;"));
        assert!(svg.contains("font-weight=\"600\""));
        assert!(svg.ends_with("</svg>"));
    }

    #[test]
    fn test_render_tooltip_and_click() {
        let mut scene = Scene::new(10.0, 10.0, "t");
        scene.push(Node::rect(0.0, 0.0, 1.0, 1.0, 0.0).title("IV").on_click(Action::Reset));
        let svg = SvgRenderer::new().render_scene(&scene);
        assert!(svg.contains("<title>IV</title></rect>"));
        assert!(svg.contains("cursor: pointer"));
    }

    #[test]
    fn test_attribute_order() {
        let mut scene = Scene::new(100.0, 100.0, "paths");
        scene.push(
            Node::line(0.0, 0.0, 50.5, 20.0)
                .id("path-a\"b")
                .stroke(palette::BLUE, 1.5)
                .dashed(5.0, 3.0)
                .opacity(0.25),
        );
        let svg = SvgRenderer::new().render_scene(&scene);
        assert!(
            svg.contains(&format!(
                "<line x1=\"0\" y1=\"0\" x2=\"50.5\" y2=\"20\" id=\"path-a&quot;b\" fill=\"none\" \
                 stroke=\"{}\" stroke-width=\"1.5\" stroke-dasharray=\"5,3\" opacity=\"0.25\"/>",
                palette::BLUE.hex()
            )),
            "{}",
            svg
        );
    }

    #[test]
    fn test_num_formatting() {
        assert_eq!(num(10.0), "10");
        assert_eq!(num(0.5), "0.5");
        assert_eq!(num(1.0 / 3.0), "0.333");
    }

    #[test]
    fn test_surface_redraws_only_on_change() {
        let mut surface = Surface::new();
        let frame = Frame::with_scene(Scene::new(1.0, 1.0, "a"));

        assert!(surface.present(&frame));
        assert!(!surface.present(&frame));
        assert_eq!(surface.redraw_count(), 1);

        let other = Frame::with_scene(Scene::new(2.0, 1.0, "a"));
        assert!(surface.present(&other));
        assert_eq!(surface.redraw_count(), 2);
    }
}
