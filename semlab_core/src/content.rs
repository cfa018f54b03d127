//! Lecture content: the decision tree, the quiz sets, the path diagram and
//! the page layout binding each mount id to its widget.

use crate::decision_tree::{DecisionTree, DecisionTreeWidget};
use crate::error::ContentError;
use crate::fit_explorer::{default_inputs, FitExplorerWidget};
use crate::page::PageConfig;
use crate::path_builder::{Indicator, Latent, PathDiagram, PathModelWidget, StructuralPath};
use crate::quiz::{QuizSet, QuizWidget};
use crate::scene::{palette, Color};
use crate::sem_model::ModelExplorerWidget;
use crate::simulation::HeuristicFitModel;
use crate::variables::VariableDiagramWidget;
use crate::widget::{Widget, WidgetKind};
use semlab_env::MountId;

const DECISION_TREE_JSON: &str = include_str!("../content/decision_tree.json");
const QUIZZES_JSON: &str = include_str!("../content/quizzes.json");

/// Quiz keys in page order.
pub const QUIZ_KEYS: [&str; 4] = ["data-types", "latent-variables", "assumption-violations", "model-fit"];

/// Statistical-test chooser.
pub fn decision_tree() -> Result<DecisionTree, ContentError> {
    DecisionTree::from_json(DECISION_TREE_JSON)
}

/// All bundled quiz sets, ordered by key.
pub fn quiz_sets() -> Result<Vec<QuizSet>, ContentError> {
    QuizSet::parse_catalog(QUIZZES_JSON)
}

/// Stress / coping / anxiety / performance teaching model.
pub fn stress_model() -> PathDiagram {
    fn latent(id: &str, x: f64, y: f64, color: Color, items: [(&str, f64, f64); 3]) -> Latent {
        Latent {
            id: id.to_string(),
            x,
            y,
            color,
            indicators: items
                .iter()
                .map(|&(label, dx, dy)| Indicator {
                    label: label.to_string(),
                    dx,
                    dy,
                })
                .collect(),
        }
    }
    fn path(from: &str, to: &str, coef: &str) -> StructuralPath {
        StructuralPath {
            from: from.to_string(),
            to: to.to_string(),
            coef: coef.to_string(),
        }
    }

    PathDiagram {
        width: 620.0,
        height: 380.0,
        latents: vec![
            latent(
                "Stress",
                100.0,
                100.0,
                palette::RED,
                [("Work demands", -70.0, -55.0), ("Time pressure", -90.0, 0.0), ("Role conflict", -70.0, 55.0)],
            ),
            latent(
                "Anxiety",
                310.0,
                60.0,
                palette::AMBER,
                [("Worry", -30.0, -60.0), ("Tension", 30.0, -60.0), ("Restlessness", 80.0, -30.0)],
            ),
            latent(
                "Coping",
                100.0,
                260.0,
                palette::GREEN,
                [("Problem-solving", -80.0, -30.0), ("Support seeking", -90.0, 25.0), ("Avoidance", -70.0, 60.0)],
            ),
            latent(
                "Performance",
                520.0,
                180.0,
                palette::BLUE,
                [("GPA", 60.0, -50.0), ("Completion rate", 80.0, 0.0), ("Satisfaction", 60.0, 50.0)],
            ),
        ],
        paths: vec![
            path("Stress", "Performance", "-0.35"),
            path("Stress", "Anxiety", "0.62"),
            path("Coping", "Performance", "0.28"),
            path("Coping", "Anxiety", "-0.41"),
        ],
    }
}

/// When a layout entry's widget is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// On first sufficient visibility
    Lazy,
    /// As soon as the page is installed
    Eager,
}

/// Builds a widget for its mount point.
pub type WidgetFactory = Box<dyn FnOnce(&MountId) -> Box<dyn Widget>>;

/// One mount point of the lecture page.
pub struct LayoutEntry {
    pub mount: MountId,
    pub kind: WidgetKind,
    pub activation: Activation,
    pub factory: WidgetFactory,
}

impl LayoutEntry {
    fn new<F>(mount: &str, kind: WidgetKind, activation: Activation, factory: F) -> Self
    where
        F: FnOnce(&MountId) -> Box<dyn Widget> + 'static,
    {
        Self {
            mount: MountId::from(mount),
            kind,
            activation,
            factory: Box::new(factory),
        }
    }
}

impl std::fmt::Debug for LayoutEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutEntry")
            .field("mount", &self.mount)
            .field("kind", &self.kind)
            .field("activation", &self.activation)
            .finish()
    }
}

/// Mount id of a quiz container.
pub fn quiz_mount(key: &str) -> String {
    format!("quiz-{}", key)
}

/// The lecture page in reading order.
///
/// All content is validated here, so the factories themselves cannot fail.
/// Quizzes render at page load; diagrams and simulations wait for
/// visibility.
pub fn lecture(config: &PageConfig) -> Result<Vec<LayoutEntry>, ContentError> {
    let tree = decision_tree()?;
    let mut quizzes = quiz_sets()?;
    let inputs = default_inputs()?;
    let diagram = stress_model();
    diagram.validate()?;

    let mut take_quiz = |key: &str| -> Result<LayoutEntry, ContentError> {
        let index = quizzes
            .iter()
            .position(|q| q.key == key)
            .ok_or_else(|| ContentError::input(key, "quiz set missing from catalog"))?;
        let set = quizzes.swap_remove(index);
        Ok(LayoutEntry::new(&quiz_mount(key), WidgetKind::Quiz, Activation::Eager, move |m| {
            Box::new(QuizWidget::new(m.clone(), set))
        }))
    };

    let [data_types, latent_variables, assumption_violations, model_fit] = QUIZ_KEYS;
    let reference = config.reference_path.clone();
    let model_reference = config.reference_path.clone();
    let coefficients = config.fit_coefficients;

    Ok(vec![
        LayoutEntry::new("diagram-variables", WidgetKind::VariableDiagram, Activation::Lazy, |m| {
            Box::new(VariableDiagramWidget::new(m.clone()))
        }),
        take_quiz(data_types)?,
        LayoutEntry::new("diagram-decision-tree", WidgetKind::DecisionTree, Activation::Lazy, move |m| {
            Box::new(DecisionTreeWidget::new(m.clone(), tree))
        }),
        take_quiz(latent_variables)?,
        LayoutEntry::new("diagram-sem-model", WidgetKind::PathModel, Activation::Lazy, move |m| {
            Box::new(PathModelWidget::from_valid(m.clone(), diagram))
        }),
        take_quiz(assumption_violations)?,
        LayoutEntry::new("sim-fit-explorer", WidgetKind::FitExplorer, Activation::Lazy, move |m| {
            let model = Box::new(HeuristicFitModel::new(coefficients));
            Box::new(FitExplorerWidget::with_model(m.clone(), inputs, model).with_reference(reference))
        }),
        take_quiz(model_fit)?,
        LayoutEntry::new("sim-bks-model", WidgetKind::ModelExplorer, Activation::Lazy, move |m| {
            Box::new(ModelExplorerWidget::new(m.clone(), model_reference))
        }),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::Action;

    #[test]
    fn test_bundled_tree() {
        let tree = decision_tree().unwrap();
        assert_eq!(tree.max_depth(), 3);

        let mut widget = DecisionTreeWidget::new(MountId::from("diagram-decision-tree"), tree);
        for answer in ["Continuous", "Categorical (2 groups)", "Yes"] {
            assert!(widget.dispatch(&Action::Choose(answer.into())));
        }
        let scene = widget.scene();
        assert_eq!(
            scene.find("result-label").and_then(|n| n.text_content()),
            Some("Independent t-test")
        );
    }

    #[test]
    fn test_bundled_quizzes() {
        let sets = quiz_sets().unwrap();
        let mut keys: Vec<&str> = sets.iter().map(|s| s.key.as_str()).collect();
        keys.sort_unstable();
        let mut expected = QUIZ_KEYS.to_vec();
        expected.sort_unstable();
        assert_eq!(keys, expected);

        let data_types = sets.iter().find(|s| s.key == "data-types").unwrap();
        assert_eq!(data_types.questions.len(), 5);
        assert_eq!(data_types.questions[2].correct, 2);
    }

    #[test]
    fn test_stress_model_errors() {
        let model = stress_model();
        assert!(model.validate().is_ok());
        assert!(model.is_endogenous("Anxiety"));
        assert!(model.is_endogenous("Performance"));
        assert!(!model.is_endogenous("Stress"));
        assert!(!model.is_endogenous("Coping"));
    }

    #[test]
    fn test_lecture_layout() {
        let layout = lecture(&PageConfig::default()).unwrap();
        let mounts: Vec<&str> = layout.iter().map(|e| e.mount.as_str()).collect();
        assert_eq!(
            mounts,
            vec![
                "diagram-variables",
                "quiz-data-types",
                "diagram-decision-tree",
                "quiz-latent-variables",
                "diagram-sem-model",
                "quiz-assumption-violations",
                "sim-fit-explorer",
                "quiz-model-fit",
                "sim-bks-model",
            ]
        );

        for entry in layout {
            let expect = if entry.kind == WidgetKind::Quiz {
                Activation::Eager
            } else {
                Activation::Lazy
            };
            assert_eq!(entry.activation, expect);

            let mount = entry.mount.clone();
            let widget = (entry.factory)(&mount);
            assert_eq!(widget.kind(), entry.kind);
            assert_eq!(widget.mount(), &mount);
        }
    }
}
