//! BKS model explorer.
//!
//! Draws the estimated personality model from reference data and lets the
//! reader remove structural paths in a what-if mode. Removal is visual only;
//! nothing is re-estimated.

use crate::reference::{format_value, ReferenceData, ReferenceError, ReferenceSlot};
use crate::scene::{palette, Color, Node, Scene};
use crate::widget::{Action, Block, Control, Frame, Tone, Widget, WidgetKind};
use semlab_env::MountId;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

pub const MODEL_UNAVAILABLE: &str = "Could not load BKS model data. Run the Python pipeline first.";
pub const EXPLORE_INFO: &str = "Click any arrow to remove that path and see how it might affect model fit.";
pub const REMOVAL_ADVISORY: &str = "Path removed. Removing structural paths generally worsens model fit, as the model can no longer explain variance along that pathway. Real re-estimation would be needed for exact new fit indices.";

const WIDTH: f64 = 650.0;
const HEIGHT: f64 = 420.0;
const BOX_W: f64 = 130.0;
const BOX_H: f64 = 28.0;

/// Interaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExploreMode {
    #[default]
    Normal,
    Explore,
}

struct Placed {
    name: &'static str,
    short: &'static str,
    x: f64,
    y: f64,
}

const PERSONALITY: (f64, f64) = (310.0, 200.0);

const INDICATORS: [Placed; 4] = [
    Placed { name: "opennessvariable", short: "Openness", x: 90.0, y: 80.0 },
    Placed { name: "consciensiousnessvariable", short: "Conscientiousness", x: 90.0, y: 150.0 },
    Placed { name: "extroversionvariable", short: "Extroversion", x: 90.0, y: 220.0 },
    Placed { name: "agreeablenessvariable", short: "Agreeableness", x: 90.0, y: 290.0 },
];

const NEUROTICISM: Placed = Placed { name: "neuroticismvariable", short: "Neuroticism", x: 310.0, y: 50.0 };
const FETISH: Placed = Placed { name: "totalfetishcategory", short: "Fetish Categories", x: 530.0, y: 50.0 };
const POWERLESS: Placed = Placed { name: "powerlessnessvariable", short: "Powerlessness", x: 530.0, y: 340.0 };

/// A removable structural path.
struct StructuralPath {
    id: &'static str,
    /// Equation (left-hand side) and predictor, as exported
    lhs: &'static str,
    rhs: &'static str,
    line: (f64, f64, f64, f64),
    color: Color,
    width: f64,
    dashed: bool,
    label_at: (f64, f64),
    label_size: f64,
}

fn structural_paths() -> [StructuralPath; 4] {
    let (px, py) = PERSONALITY;
    let n = &NEUROTICISM;
    let f = &FETISH;
    let w = &POWERLESS;
    [
        StructuralPath {
            id: "neuroticism-personality",
            lhs: "Personality",
            rhs: n.name,
            line: (n.x, n.y + 14.0, px, py - 24.0),
            color: palette::RED,
            width: 2.0,
            dashed: false,
            label_at: ((n.x + px) / 2.0 - 20.0, (n.y + 14.0 + py - 24.0) / 2.0),
            label_size: 11.0,
        },
        StructuralPath {
            id: "personality-powerlessness",
            lhs: w.name,
            rhs: "Personality",
            line: (px + 55.0, py + 10.0, w.x - 65.0, w.y),
            color: palette::BLUE,
            width: 2.0,
            dashed: false,
            label_at: ((px + 55.0 + w.x - 65.0) / 2.0, (py + w.y) / 2.0 - 8.0),
            label_size: 11.0,
        },
        StructuralPath {
            id: "neuroticism-powerlessness",
            lhs: w.name,
            rhs: n.name,
            line: (n.x + 50.0, n.y + 14.0, w.x - 30.0, w.y - 14.0),
            color: palette::RED,
            width: 1.5,
            dashed: true,
            label_at: ((n.x + 50.0 + w.x - 30.0) / 2.0 + 10.0, (n.y + 14.0 + w.y - 14.0) / 2.0),
            label_size: 10.0,
        },
        StructuralPath {
            id: "fetish-powerlessness",
            lhs: w.name,
            rhs: f.name,
            line: (f.x, f.y + 14.0, w.x, w.y - 14.0),
            color: palette::GRAY,
            width: 1.5,
            dashed: true,
            label_at: (f.x + 15.0, (f.y + 14.0 + w.y - 14.0) / 2.0),
            label_size: 10.0,
        },
    ]
}

/// Ids of the paths a reader can remove.
pub fn path_ids() -> Vec<&'static str> {
    structural_paths().iter().map(|p| p.id).collect()
}

pub struct ModelExplorerWidget {
    mount: MountId,
    reference_path: String,
    data: ReferenceSlot,
    mode: ExploreMode,
    removed: BTreeSet<String>,
    info: Option<&'static str>,
}

impl ModelExplorerWidget {
    pub fn new(mount: MountId, reference_path: impl Into<String>) -> Self {
        Self {
            mount,
            reference_path: reference_path.into(),
            data: ReferenceSlot::Loading,
            mode: ExploreMode::Normal,
            removed: BTreeSet::new(),
            info: None,
        }
    }

    pub fn mode(&self) -> ExploreMode {
        self.mode
    }

    pub fn removed(&self) -> &BTreeSet<String> {
        &self.removed
    }

    pub fn is_ready(&self) -> bool {
        self.data.data().is_some()
    }

    fn toggle_explore(&mut self) {
        self.mode = match self.mode {
            ExploreMode::Normal => {
                self.info = Some(EXPLORE_INFO);
                ExploreMode::Explore
            }
            ExploreMode::Explore => {
                self.info = None;
                ExploreMode::Normal
            }
        };
    }

    fn remove_path(&mut self, id: &str) -> bool {
        if self.mode != ExploreMode::Explore || !path_ids().iter().any(|p| *p == id) {
            return false;
        }
        if !self.removed.insert(id.to_string()) {
            return false;
        }
        self.info = Some(REMOVAL_ADVISORY);
        true
    }

    /// Restores every path and leaves what-if mode.
    fn reset_model(&mut self) -> bool {
        let changed = self.mode != ExploreMode::Normal || !self.removed.is_empty() || self.info.is_some();
        self.mode = ExploreMode::Normal;
        self.removed.clear();
        self.info = None;
        changed
    }

    fn scene(&self, data: &ReferenceData) -> Scene {
        let sem = &data.sem_results;
        let (px, py) = PERSONALITY;
        let mut scene = Scene::new(
            WIDTH,
            HEIGHT,
            "SEM path diagram of BKS personality model with path coefficients",
        )
        .with_marker("arrow-bks", palette::BLUE);

        // Measurement model
        for ind in &INDICATORS {
            scene.push(
                Node::rect(ind.x - BOX_W / 2.0, ind.y - BOX_H / 2.0, BOX_W, BOX_H, 4.0)
                    .fill(palette::PAPER)
                    .stroke(palette::GRAY_LIGHT, 1.0)
                    .id(format!("indicator-{}", ind.name)),
            );
            scene.push(Node::text(ind.x, ind.y + 4.0, ind.short, 11.0).centered());
            scene.push(
                Node::line(ind.x + 65.0, ind.y, px - 55.0, py)
                    .stroke(palette::GRAY_MID, 1.5)
                    .arrow(),
            );
            if let Some(loading) = sem.loading("Personality", ind.name) {
                let mx = (ind.x + 65.0 + px - 55.0) / 2.0;
                let my = (ind.y + py) / 2.0 - 6.0;
                scene.push(
                    Node::text(mx, my, format!("{:.2}", loading), 10.0)
                        .fill(palette::GRAY)
                        .centered()
                        .id(format!("loading-{}", ind.name)),
                );
            }
        }

        scene.push(
            Node::ellipse(px, py, 55.0, 24.0)
                .fill(palette::BLUE_TINT)
                .stroke(palette::BLUE, 2.0)
                .id("latent-personality"),
        );
        scene.push(
            Node::text(px, py + 5.0, "Personality", 13.0)
                .fill(palette::BLUE)
                .bold()
                .centered(),
        );

        push_box(&mut scene, &NEUROTICISM, palette::RED_TINT, palette::RED);
        push_box(&mut scene, &FETISH, palette::PAPER, palette::GRAY);
        push_box(&mut scene, &POWERLESS, palette::AMBER_TINT, palette::AMBER);

        for path in structural_paths() {
            if !self.removed.contains(path.id) {
                let (x1, y1, x2, y2) = path.line;
                let mut line = Node::line(x1, y1, x2, y2)
                    .stroke(path.color, path.width)
                    .arrow()
                    .id(format!("path-{}", path.id));
                if path.dashed {
                    line = line.dashed(4.0, 3.0);
                }
                if self.mode == ExploreMode::Explore {
                    line = line.on_click(Action::RemovePath(path.id.to_string()));
                }
                scene.push(line);
            }

            if let Some(coef) = sem.path(path.lhs, path.rhs) {
                let mut label = Node::text(path.label_at.0, path.label_at.1, format!("{:.3}", coef), path.label_size)
                    .fill(path.color)
                    .id(format!("coef-{}", path.id));
                if path.label_size > 10.0 {
                    label = label.bold();
                }
                scene.push(label);
            }
        }

        // Error term on the outcome
        scene.push(
            Node::circle(POWERLESS.x + 70.0, POWERLESS.y, 10.0)
                .fill(palette::WHITE)
                .stroke(palette::GRAY, 1.0)
                .id("error-powerlessness"),
        );
        scene.push(
            Node::text(POWERLESS.x + 70.0, POWERLESS.y + 4.0, "e", 10.0)
                .fill(palette::GRAY)
                .centered(),
        );

        scene
    }

    fn fit_bar(data: &ReferenceData) -> Block {
        let sem = &data.sem_results;
        let pass = |ok: bool| if ok { Tone::Good } else { Tone::Poor };
        let graded = |value: Option<f64>, check: fn(f64) -> bool| value.map(|v| pass(check(v))).unwrap_or_default();

        let items = [
            ("Chi-square", sem.chi_square(), Tone::Neutral),
            ("CFI", sem.cfi(), graded(sem.cfi(), |v| v >= 0.95)),
            ("RMSEA", sem.rmsea(), graded(sem.rmsea(), |v| v <= 0.06)),
            ("SRMR", sem.srmr(), graded(sem.srmr(), |v| v <= 0.06)),
        ];

        let mut block = Block::new("fit-bar");
        for (label, value, tone) in items {
            block.push(Control::text("fit-item", format!("{}: {}", label, format_value(value))).toned(tone));
        }
        block.push(Control::text("fit-item", format!("N: {}", data.sample_size())));
        block
    }
}

fn push_box(scene: &mut Scene, at: &Placed, fill: Color, stroke: Color) {
    scene.push(
        Node::rect(at.x - BOX_W / 2.0, at.y - BOX_H / 2.0, BOX_W, BOX_H, 4.0)
            .fill(fill)
            .stroke(stroke, 1.5)
            .id(format!("observed-{}", at.name)),
    );
    scene.push(
        Node::text(at.x, at.y + 4.0, at.short, 11.0)
            .fill(stroke)
            .bold()
            .centered(),
    );
}

impl Widget for ModelExplorerWidget {
    fn mount(&self) -> &MountId {
        &self.mount
    }

    fn kind(&self) -> WidgetKind {
        WidgetKind::ModelExplorer
    }

    fn render(&self) -> Frame {
        let data = match &self.data {
            ReferenceSlot::Ready(data) => data,
            ReferenceSlot::Loading => return Frame::default(),
            ReferenceSlot::Unavailable => {
                let mut frame = Frame::default();
                frame.push(Block::new("message").with(Control::text("model-unavailable", MODEL_UNAVAILABLE)));
                return frame;
            }
        };

        let mut frame = Frame::with_scene(self.scene(data));
        frame.push(Self::fit_bar(data));

        let explore_label = match self.mode {
            ExploreMode::Normal => "Explore: Remove a Path",
            ExploreMode::Explore => "Exit What-If Mode",
        };
        frame.push(
            Block::new("controls")
                .with(Control::button(
                    explore_label,
                    "Enter what-if mode to remove paths from the model",
                    Action::ToggleExplore,
                ))
                .with(Control::button("Reset Model", "Restore all removed paths", Action::ResetModel)),
        );
        if let Some(info) = self.info {
            frame.push(Block::new("info").with(Control::text("diagram-explanation", info)));
        }
        frame
    }

    fn dispatch(&mut self, action: &Action) -> bool {
        if !self.is_ready() {
            return false;
        }
        let changed = match action {
            Action::ToggleExplore => {
                self.toggle_explore();
                true
            }
            Action::RemovePath(id) => self.remove_path(id),
            Action::ResetModel => self.reset_model(),
            _ => false,
        };
        if changed {
            debug!("{} {:?} mode={:?} removed={}", self.mount, action, self.mode, self.removed.len());
        }
        changed
    }

    fn reference_request(&self) -> Option<&str> {
        self.data.is_loading().then_some(self.reference_path.as_str())
    }

    fn deliver_reference(&mut self, result: Result<Arc<ReferenceData>, ReferenceError>) {
        if self.data.resolve(result) && !self.is_ready() {
            debug!("{} model data unavailable", self.mount);
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::tests::SAMPLE;
    use semlab_env::EnvError;

    fn ready() -> ModelExplorerWidget {
        let mut w = ModelExplorerWidget::new(MountId::from("sim-bks-model"), "data/bks_excerpt.json");
        w.deliver_reference(Ok(Arc::new(ReferenceData::from_json(SAMPLE).unwrap())));
        w
    }

    #[test]
    fn test_unavailable_message() {
        let mut w = ModelExplorerWidget::new(MountId::from("sim-bks-model"), "data/bks_excerpt.json");
        assert_eq!(w.reference_request(), Some("data/bks_excerpt.json"));
        w.deliver_reference(Err(EnvError::not_found("data/bks_excerpt.json").into()));

        assert_eq!(w.reference_request(), None);
        let frame = w.render();
        assert!(frame.scene.is_none());
        assert_eq!(frame.texts("model-unavailable"), vec![MODEL_UNAVAILABLE]);
        assert!(!w.dispatch(&Action::ToggleExplore));
    }

    #[test]
    fn test_scene_from_data() {
        let frame = ready().render();
        let scene = frame.scene.as_ref().unwrap();

        let texts = scene.visible_texts();
        assert!(texts.contains(&"0.81".to_string()));
        assert!(texts.contains(&"-0.421".to_string()));
        assert!(texts.contains(&"0.031".to_string()));
        // Null estimate and missing indicator draw no label
        assert!(scene.find("loading-extroversionvariable").is_none());
        assert!(scene.find("loading-agreeablenessvariable").is_none());

        // Arrows are inert outside what-if mode
        assert!(scene.clickable().is_empty());
        assert_eq!(
            frame.texts("fit-item"),
            vec!["Chi-square: 812.440", "CFI: 0.941", "RMSEA: 0.072", "SRMR: N/A", "N: 14521"]
        );
    }

    #[test]
    fn test_fit_bar_colouring() {
        let frame = ready().render();
        let tones: Vec<Tone> = frame
            .blocks
            .iter()
            .find(|b| b.class == "fit-bar")
            .unwrap()
            .controls
            .iter()
            .map(|c| match c {
                Control::Text { tone, .. } => *tone,
                _ => Tone::Neutral,
            })
            .collect();
        // CFI .941 < .95 and RMSEA .072 > .06 fail, SRMR missing stays neutral
        assert_eq!(tones, vec![Tone::Neutral, Tone::Poor, Tone::Poor, Tone::Neutral, Tone::Neutral]);
    }

    #[test]
    fn test_remove_requires_explore() {
        let mut w = ready();
        assert!(!w.dispatch(&Action::RemovePath("fetish-powerlessness".into())));

        assert!(w.dispatch(&Action::ToggleExplore));
        assert_eq!(w.render().texts("diagram-explanation"), vec![EXPLORE_INFO]);
        assert_eq!(w.render().scene.unwrap().clickable().len(), 4);

        assert!(w.dispatch(&Action::RemovePath("fetish-powerlessness".into())));
        assert!(!w.dispatch(&Action::RemovePath("fetish-powerlessness".into())));
        assert!(!w.dispatch(&Action::RemovePath("no-such-path".into())));

        let frame = w.render();
        assert!(frame.scene.as_ref().unwrap().find("path-fetish-powerlessness").is_none());
        assert_eq!(frame.texts("diagram-explanation"), vec![REMOVAL_ADVISORY]);
    }

    #[test]
    fn test_exit_explore_keeps_removals() {
        let mut w = ready();
        w.dispatch(&Action::ToggleExplore);
        w.dispatch(&Action::RemovePath("neuroticism-personality".into()));
        w.dispatch(&Action::ToggleExplore);

        assert_eq!(w.mode(), ExploreMode::Normal);
        assert!(w.render().texts("diagram-explanation").is_empty());
        assert!(w.removed().contains("neuroticism-personality"));
    }

    #[test]
    fn test_reset_model() {
        let mut w = ready();
        let initial = w.render();
        assert!(!w.dispatch(&Action::ResetModel));

        w.dispatch(&Action::ToggleExplore);
        w.dispatch(&Action::RemovePath("personality-powerlessness".into()));
        assert!(w.dispatch(&Action::ResetModel));

        assert_eq!(w.mode(), ExploreMode::Normal);
        assert!(w.removed().is_empty());
        assert_eq!(w.render(), initial);
    }
}
