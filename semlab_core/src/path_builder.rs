//! Step-through SEM path diagram.
//!
//! The full diagram is always built; steps only change which layers are
//! opaque. Step `k` shows the first `k + 1` layers.

use crate::error::ContentError;
use crate::scene::{palette, Color, Group, Node, Scene};
use crate::widget::{Action, Block, Control, Frame, Widget, WidgetKind};
use semlab_env::MountId;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Diagram layers in reveal order.
pub const LAYERS: [&str; 5] = ["latents", "indicators", "structural", "errors", "coefficients"];

/// Info line per step.
pub const STEP_LABELS: [&str; 5] = [
    "Latent variables shown",
    "Observed indicators added",
    "Structural paths added",
    "Error terms added",
    "Path coefficients shown",
];

pub const MAX_STEP: usize = LAYERS.len() - 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub label: String,
    /// Offset from the latent's center
    pub dx: f64,
    pub dy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Latent {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub color: Color,
    pub indicators: Vec<Indicator>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralPath {
    pub from: String,
    pub to: String,
    /// Coefficient as printed
    pub coef: String,
}

/// Content of a path diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathDiagram {
    pub width: f64,
    pub height: f64,
    pub latents: Vec<Latent>,
    pub paths: Vec<StructuralPath>,
}

impl PathDiagram {
    /// Checks that every path connects two known latents.
    pub fn validate(&self) -> Result<(), ContentError> {
        for path in &self.paths {
            for end in [&path.from, &path.to] {
                if self.latent(end).is_none() {
                    return Err(ContentError::tree(format!("path references unknown latent {:?}", end)));
                }
            }
        }
        Ok(())
    }

    pub fn latent(&self, id: &str) -> Option<&Latent> {
        self.latents.iter().find(|l| l.id == id)
    }

    /// Latents that receive at least one structural path.
    pub fn is_endogenous(&self, id: &str) -> bool {
        self.paths.iter().any(|p| p.to == id)
    }
}

pub struct PathModelWidget {
    mount: MountId,
    diagram: PathDiagram,
    step: usize,
}

impl PathModelWidget {
    pub fn new(mount: MountId, diagram: PathDiagram) -> Result<Self, ContentError> {
        diagram.validate()?;
        Ok(Self::from_valid(mount, diagram))
    }

    /// For diagrams validated by the caller.
    pub(crate) fn from_valid(mount: MountId, diagram: PathDiagram) -> Self {
        Self {
            mount,
            diagram,
            step: 0,
        }
    }

    pub fn step(&self) -> usize {
        self.step
    }

    fn layer(&self, index: usize) -> Group {
        let opacity = if index <= self.step { 1.0 } else { 0.0 };
        Group::new(format!("layer-{}", LAYERS[index])).with_opacity(opacity)
    }

    fn scene(&self) -> Scene {
        let d = &self.diagram;
        let mut scene = Scene::new(
            d.width,
            d.height,
            "SEM path model diagram showing latent and observed variables with build-up animation",
        )
        .with_marker("arrow-sem", palette::BLUE);

        let mut latents = self.layer(0);
        let mut indicators = self.layer(1);
        let mut structural = self.layer(2);
        let mut errors = self.layer(3);
        let mut coefficients = self.layer(4);

        for lv in &d.latents {
            latents.push(
                Node::ellipse(lv.x, lv.y, 55.0, 22.0)
                    .fill(lv.color.with_alpha(0x15))
                    .stroke(lv.color, 2.0)
                    .id(format!("latent-{}", lv.id)),
            );
            latents.push(Node::text(lv.x, lv.y + 5.0, lv.id.as_str(), 12.0).fill(lv.color).bold().centered());

            for ind in &lv.indicators {
                let (ix, iy) = (lv.x + ind.dx, lv.y + ind.dy);
                indicators.push(
                    Node::rect(ix - 42.0, iy - 10.0, 84.0, 20.0, 3.0)
                        .fill(palette::PAPER)
                        .stroke(palette::GRAY_LIGHT, 1.0),
                );
                indicators.push(Node::text(ix, iy + 4.0, ind.label.as_str(), 9.0).fill(palette::GRAY).centered());

                let side = if ind.dx > 0.0 { 55.0 } else { -55.0 };
                let reach = if ind.dx.abs() > 50.0 { 0.7 } else { 0.5 };
                let end = if ind.dx > 0.0 { -42.0 } else { 42.0 };
                indicators.push(
                    Node::line(lv.x + side * reach, lv.y + ind.dy * 0.3, ix + end, iy)
                        .stroke(palette::GRAY_LIGHT, 1.0)
                        .arrow(),
                );
            }

            if d.is_endogenous(&lv.id) {
                errors.push(
                    Node::circle(lv.x + 55.0, lv.y - 25.0, 8.0)
                        .fill(palette::WHITE)
                        .stroke(palette::GRAY, 1.0)
                        .id(format!("error-{}", lv.id)),
                );
                errors.push(Node::text(lv.x + 55.0, lv.y - 22.0, "e", 9.0).fill(palette::GRAY).centered());
            }
        }

        for path in &d.paths {
            // Validated on construction
            let (Some(from), Some(to)) = (d.latent(&path.from), d.latent(&path.to)) else {
                continue;
            };
            structural.push(
                Node::line(from.x + 55.0, from.y, to.x - 55.0, to.y)
                    .stroke(palette::BLUE, 2.0)
                    .arrow()
                    .id(format!("path-{}-{}", path.from, path.to)),
            );
            let (mx, my) = ((from.x + to.x) / 2.0, (from.y + to.y) / 2.0 - 10.0);
            coefficients.push(
                Node::text(mx, my, path.coef.as_str(), 11.0)
                    .fill(palette::BLUE)
                    .bold()
                    .centered(),
            );
        }

        for layer in [latents, indicators, structural, errors, coefficients] {
            scene.push_group(layer);
        }
        scene
    }
}

impl Widget for PathModelWidget {
    fn mount(&self) -> &MountId {
        &self.mount
    }

    fn kind(&self) -> WidgetKind {
        WidgetKind::PathModel
    }

    fn render(&self) -> Frame {
        let mut frame = Frame::with_scene(self.scene());

        let mut next = Control::button("Next Step", "Show next layer of the SEM diagram", Action::NextStep);
        if self.step >= MAX_STEP {
            next = next.disabled();
        }
        frame.push(
            Block::new("controls")
                .with(next)
                .with(Control::button("Reset", "Reset SEM diagram to first step", Action::Reset)),
        );
        frame.push(Block::new("info").with(Control::text("diagram-explanation", STEP_LABELS[self.step])));
        frame
    }

    fn dispatch(&mut self, action: &Action) -> bool {
        match action {
            Action::NextStep if self.step < MAX_STEP => {
                self.step += 1;
                debug!("{} step {}: {}", self.mount, self.step, STEP_LABELS[self.step]);
                true
            }
            Action::Reset if self.step > 0 => {
                self.step = 0;
                true
            }
            _ => false,
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn diagram() -> PathDiagram {
        let latent = |id: &str, x: f64, y: f64| Latent {
            id: id.to_string(),
            x,
            y,
            color: palette::RED,
            indicators: vec![Indicator {
                label: format!("{} item", id),
                dx: -70.0,
                dy: 0.0,
            }],
        };
        PathDiagram {
            width: 620.0,
            height: 380.0,
            latents: vec![latent("Stress", 100.0, 100.0), latent("Anxiety", 310.0, 60.0)],
            paths: vec![StructuralPath {
                from: "Stress".into(),
                to: "Anxiety".into(),
                coef: "0.62".into(),
            }],
        }
    }

    fn widget() -> PathModelWidget {
        PathModelWidget::new(MountId::from("diagram-sem-model"), diagram()).unwrap()
    }

    #[test]
    fn test_initial_step_shows_latents_only() {
        let frame = widget().render();
        let scene = frame.scene.as_ref().unwrap();
        assert_eq!(scene.visible_texts(), vec!["Stress", "Anxiety"]);
        assert_eq!(frame.texts("diagram-explanation"), vec!["Latent variables shown"]);
    }

    #[test]
    fn test_errors_only_on_endogenous() {
        let mut w = widget();
        for _ in 0..3 {
            w.dispatch(&Action::NextStep);
        }
        let scene = w.render().scene.unwrap();
        assert_eq!(scene.opacity_of("error-Anxiety"), Some(1.0));
        assert!(scene.find("error-Stress").is_none());
        assert!(!scene.visible_texts().contains(&"0.62".to_string()));
    }

    #[test]
    fn test_next_step_stops_at_end() {
        let mut w = widget();
        for _ in 0..MAX_STEP {
            assert!(w.dispatch(&Action::NextStep));
        }
        assert!(!w.dispatch(&Action::NextStep));

        let frame = w.render();
        assert!(!frame.available_actions().contains(&Action::NextStep));
        assert_eq!(frame.texts("diagram-explanation"), vec!["Path coefficients shown"]);
        assert!(frame.scene.unwrap().visible_texts().contains(&"0.62".to_string()));
    }

    #[test]
    fn test_reset() {
        let mut w = widget();
        let initial = w.render();
        assert!(!w.dispatch(&Action::Reset));
        w.dispatch(&Action::NextStep);
        w.dispatch(&Action::NextStep);
        assert!(w.dispatch(&Action::Reset));
        assert_eq!(w.render(), initial);
    }

    #[test]
    fn test_unknown_latent_rejected() {
        let mut d = diagram();
        d.paths[0].to = "Coping".into();
        assert!(PathModelWidget::new(MountId::from("m"), d).is_err());
    }

    proptest! {
        #[test]
        fn prop_visible_layers_match_step(clicks in 0usize..10) {
            let mut w = widget();
            for _ in 0..clicks {
                w.dispatch(&Action::NextStep);
            }
            let step = clicks.min(MAX_STEP);
            prop_assert_eq!(w.step(), step);

            let scene = w.render().scene.unwrap();
            let shown = scene
                .items
                .iter()
                .filter(|item| matches!(item, crate::scene::Item::Group(g) if g.opacity > 0.0))
                .count();
            prop_assert_eq!(shown, step + 1);
        }
    }
}
