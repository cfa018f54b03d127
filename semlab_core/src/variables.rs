//! IV → DV relationship diagram with optional mediator and moderator.

use crate::scene::{palette, Group, Node, Scene};
use crate::widget::{Action, Block, Control, Frame, Widget, WidgetKind};
use semlab_env::MountId;
use tracing::debug;

pub const MEDIATOR_EXPLANATION: &str = "A mediator explains HOW the IV affects the DV. Therapy may reduce depression through improved coping strategies.";
pub const MODERATOR_EXPLANATION: &str = "A moderator changes the STRENGTH or DIRECTION of the IV\u{2192}DV relationship. Social support may buffer the effect of therapy type on depression.";
pub const IV_TOOLTIP: &str = "IV: The variable you manipulate or predict from";
pub const DV_TOOLTIP: &str = "DV: The variable you measure as an outcome";

const WIDTH: f64 = 600.0;
const HEIGHT: f64 = 300.0;
const BOX_W: f64 = 150.0;
const BOX_H: f64 = 50.0;
const IV: (f64, f64) = (80.0, 130.0);
const DV: (f64, f64) = (370.0, 130.0);

pub struct VariableDiagramWidget {
    mount: MountId,
    mediator: bool,
    moderator: bool,
    explanation: Option<&'static str>,
}

impl VariableDiagramWidget {
    pub fn new(mount: MountId) -> Self {
        Self {
            mount,
            mediator: false,
            moderator: false,
            explanation: None,
        }
    }

    pub fn has_mediator(&self) -> bool {
        self.mediator
    }

    pub fn has_moderator(&self) -> bool {
        self.moderator
    }

    fn scene(&self) -> Scene {
        let mut scene = Scene::new(
            WIDTH,
            HEIGHT,
            "Diagram showing independent variable predicting dependent variable, with options to add mediator and moderator",
        )
        .with_marker("arrow-var", palette::BLUE);

        let (ivx, ivy) = IV;
        let (dvx, dvy) = DV;

        scene.push(
            Node::rect(ivx, ivy, BOX_W, BOX_H, 8.0)
                .fill(palette::BLUE_TINT)
                .stroke(palette::BLUE, 2.0)
                .id("iv")
                .title(IV_TOOLTIP),
        );
        scene.push(Node::text(ivx + BOX_W / 2.0, ivy + 20.0, "Therapy Type", 13.0).fill(palette::BLUE).bold().centered());
        scene.push(
            Node::text(ivx + BOX_W / 2.0, ivy + 38.0, "(Independent Variable)", 11.0)
                .fill(palette::GRAY)
                .centered(),
        );

        scene.push(
            Node::rect(dvx, dvy, BOX_W, BOX_H, 8.0)
                .fill(palette::GREEN_TINT)
                .stroke(palette::GREEN, 2.0)
                .id("dv")
                .title(DV_TOOLTIP),
        );
        scene.push(Node::text(dvx + BOX_W / 2.0, dvy + 20.0, "Depression Score", 13.0).fill(palette::GREEN).bold().centered());
        scene.push(
            Node::text(dvx + BOX_W / 2.0, dvy + 38.0, "(Dependent Variable)", 11.0)
                .fill(palette::GRAY)
                .centered(),
        );

        // The direct effect fades out once a mediator carries it
        scene.push(
            Node::line(ivx + BOX_W, ivy + BOX_H / 2.0, dvx, dvy + BOX_H / 2.0)
                .stroke(palette::BLUE, 2.0)
                .arrow()
                .opacity(if self.mediator { 0.0 } else { 1.0 })
                .id("direct-path"),
        );

        if self.mediator {
            let (mx, my) = (WIDTH / 2.0, 50.0);
            let mut group = Group::new("mediator");
            group.push(
                Node::ellipse(mx, my, 70.0, 25.0)
                    .fill(palette::AMBER_TINT)
                    .stroke(palette::AMBER, 2.0)
                    .id("mediator"),
            );
            group.push(Node::text(mx, my - 5.0, "Coping Strategy", 12.0).fill(palette::AMBER_DARK).bold().centered());
            group.push(Node::text(mx, my + 12.0, "(Mediator)", 10.0).fill(palette::GRAY).centered());
            group.push(
                Node::line(ivx + BOX_W, ivy, mx - 50.0, my + 20.0)
                    .stroke(palette::AMBER, 2.0)
                    .arrow()
                    .id("iv-mediator"),
            );
            group.push(
                Node::line(mx + 50.0, my + 20.0, dvx, dvy)
                    .stroke(palette::AMBER, 2.0)
                    .arrow()
                    .id("mediator-dv"),
            );
            scene.push_group(group);
        }

        if self.moderator {
            let (mx, my) = (WIDTH / 2.0, 250.0);
            let mid_x = (ivx + BOX_W + dvx) / 2.0;
            let mid_y = ivy + BOX_H / 2.0;
            let mut group = Group::new("moderator");
            group.push(
                Node::ellipse(mx, my, 65.0, 25.0)
                    .fill(palette::PINK_TINT)
                    .stroke(palette::PINK, 2.0)
                    .id("moderator"),
            );
            group.push(Node::text(mx, my - 5.0, "Social Support", 12.0).fill(palette::PINK_DARK).bold().centered());
            group.push(Node::text(mx, my + 12.0, "(Moderator)", 10.0).fill(palette::GRAY).centered());
            group.push(
                Node::line(mx, my - 25.0, mid_x, mid_y + 10.0)
                    .stroke(palette::PINK, 2.0)
                    .dashed(6.0, 3.0)
                    .arrow()
                    .id("moderator-path"),
            );
            scene.push_group(group);
        }

        scene
    }
}

impl Widget for VariableDiagramWidget {
    fn mount(&self) -> &MountId {
        &self.mount
    }

    fn kind(&self) -> WidgetKind {
        WidgetKind::VariableDiagram
    }

    fn render(&self) -> Frame {
        let mut frame = Frame::with_scene(self.scene());

        let mut mediator = Control::button(
            "Add Mediator Variable",
            "Add a mediator variable to the diagram",
            Action::AddMediator,
        );
        if self.mediator {
            mediator = mediator.disabled();
        }
        let mut moderator = Control::button(
            "Add Moderator Variable",
            "Add a moderator variable to the diagram",
            Action::AddModerator,
        );
        if self.moderator {
            moderator = moderator.disabled();
        }
        frame.push(Block::new("controls").with(mediator).with(moderator));

        if let Some(text) = self.explanation {
            frame.push(Block::new("info").with(Control::text("diagram-explanation", text)));
        }
        frame
    }

    fn dispatch(&mut self, action: &Action) -> bool {
        let (flag, text) = match action {
            Action::AddMediator => (&mut self.mediator, MEDIATOR_EXPLANATION),
            Action::AddModerator => (&mut self.moderator, MODERATOR_EXPLANATION),
            _ => return false,
        };
        if *flag {
            return false;
        }
        *flag = true;
        self.explanation = Some(text);
        debug!("{} {:?}", self.mount, action);
        true
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn widget() -> VariableDiagramWidget {
        VariableDiagramWidget::new(MountId::from("diagram-variables"))
    }

    #[test]
    fn test_initial_diagram() {
        let frame = widget().render();
        let scene = frame.scene.as_ref().unwrap();
        assert_eq!(scene.opacity_of("direct-path"), Some(1.0));
        assert_eq!(scene.find("iv").and_then(|n| n.title.as_deref()), Some(IV_TOOLTIP));
        assert_eq!(scene.find("dv").and_then(|n| n.title.as_deref()), Some(DV_TOOLTIP));
        assert!(frame.texts("diagram-explanation").is_empty());
        assert_eq!(frame.available_actions(), vec![Action::AddMediator, Action::AddModerator]);
    }

    #[test]
    fn test_add_mediator_once() {
        let mut w = widget();
        assert!(w.dispatch(&Action::AddMediator));
        assert!(!w.dispatch(&Action::AddMediator));

        let frame = w.render();
        let scene = frame.scene.as_ref().unwrap();
        assert_eq!(scene.opacity_of("direct-path"), Some(0.0));
        assert!(scene.find("mediator-dv").is_some());
        assert_eq!(frame.texts("diagram-explanation"), vec![MEDIATOR_EXPLANATION]);
        assert_eq!(frame.available_actions(), vec![Action::AddModerator]);
    }

    #[test]
    fn test_moderator_keeps_direct_path() {
        let mut w = widget();
        assert!(w.dispatch(&Action::AddModerator));

        let frame = w.render();
        let scene = frame.scene.as_ref().unwrap();
        assert_eq!(scene.opacity_of("direct-path"), Some(1.0));
        assert_eq!(scene.find("moderator-path").unwrap().style.dash, Some((6.0, 3.0)));
        assert_eq!(frame.texts("diagram-explanation"), vec![MODERATOR_EXPLANATION]);
    }

    #[test]
    fn test_latest_explanation_wins() {
        let mut w = widget();
        w.dispatch(&Action::AddModerator);
        w.dispatch(&Action::AddMediator);
        assert!(w.has_mediator() && w.has_moderator());
        assert_eq!(w.render().texts("diagram-explanation"), vec![MEDIATOR_EXPLANATION]);
        assert!(w.render().available_actions().is_empty());
    }
}
