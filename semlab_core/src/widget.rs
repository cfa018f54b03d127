//! The widget contract: state in, frame out, actions back in.
//!
//! Every widget follows the same loop:
//!
//! ```text
//!   ┌─────────────┐  render()   ┌───────┐   host draws   ┌──────────┐
//!   │ widget state│ ──────────► │ Frame │ ─────────────► │  screen  │
//!   └─────────────┘             └───────┘                └──────────┘
//!          ▲                                                   │
//!          └──────────────── dispatch(Action) ◄────────────────┘
//! ```
//!
//! `render` is a pure projection and always produces the full frame.
//! `dispatch` returns whether the state changed; invalid or replayed
//! actions are silently ignored and return `false`.

use crate::reference::{ReferenceData, ReferenceError};
use crate::scene::Scene;
use semlab_env::MountId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// User interaction delivered to a widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    /// Pick an answer in the decision tree
    Choose(String),
    /// Return to the initial state (decision tree, step-through diagram)
    Reset,
    /// Commit an answer to a quiz question
    Answer { question: usize, option: usize },
    /// Move a slider
    SetInput { name: String, value: f64 },
    /// Enter or leave path-removal mode
    ToggleExplore,
    /// Remove a connection while exploring
    RemovePath(String),
    /// Rebuild the model diagram from source data
    ResetModel,
    /// Reveal the next diagram layer
    NextStep,
    AddMediator,
    AddModerator,
}

/// Visual grading attached to controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Tone {
    #[default]
    Neutral,
    Good,
    Ok,
    Poor,
    Correct,
    Incorrect,
}

impl Tone {
    /// CSS class used by the HTML renderer.
    pub fn class(&self) -> &'static str {
        match self {
            Tone::Neutral => "",
            Tone::Good => "good",
            Tone::Ok => "ok",
            Tone::Poor => "poor",
            Tone::Correct => "correct",
            Tone::Incorrect => "incorrect",
        }
    }
}

/// Non-vector UI element of a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Control {
    Button {
        label: String,
        aria_label: String,
        action: Action,
        enabled: bool,
        tone: Tone,
    },
    Slider {
        name: String,
        label: String,
        min: f64,
        max: f64,
        step: f64,
        value: f64,
        /// Value as shown next to the label
        display: String,
    },
    Card {
        id: String,
        label: String,
        value: String,
        tone: Tone,
    },
    Text {
        class: String,
        content: String,
        tone: Tone,
    },
}

impl Control {
    pub fn button(label: impl Into<String>, aria_label: impl Into<String>, action: Action) -> Self {
        Control::Button {
            label: label.into(),
            aria_label: aria_label.into(),
            action,
            enabled: true,
            tone: Tone::Neutral,
        }
    }

    pub fn text(class: impl Into<String>, content: impl Into<String>) -> Self {
        Control::Text {
            class: class.into(),
            content: content.into(),
            tone: Tone::Neutral,
        }
    }

    /// Disables a button. No effect on other controls.
    pub fn disabled(mut self) -> Self {
        if let Control::Button { enabled, .. } = &mut self {
            *enabled = false;
        }
        self
    }

    /// Sets the tone of buttons, cards and text.
    pub fn toned(mut self, new_tone: Tone) -> Self {
        match &mut self {
            Control::Button { tone, .. } | Control::Card { tone, .. } | Control::Text { tone, .. } => {
                *tone = new_tone;
            }
            Control::Slider { .. } => {}
        }
        self
    }
}

/// A labelled group of controls (a quiz question, a control bar, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Block class (`controls`, `quiz-question`, `fit-display`, ...)
    pub class: String,
    /// Accessible label for the group, if any
    pub label: Option<String>,
    pub controls: Vec<Control>,
}

impl Block {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            label: None,
            controls: Vec::new(),
        }
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with(mut self, control: Control) -> Self {
        self.controls.push(control);
        self
    }

    pub fn push(&mut self, control: Control) {
        self.controls.push(control);
    }
}

/// Full projection of one widget's state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Frame {
    /// Accessible label of the whole widget region
    pub aria_label: Option<String>,
    pub scene: Option<Scene>,
    pub blocks: Vec<Block>,
}

impl Frame {
    pub fn with_scene(scene: Scene) -> Self {
        Self {
            aria_label: None,
            scene: Some(scene),
            blocks: Vec::new(),
        }
    }

    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// All enabled button actions plus clickable scene actions.
    pub fn available_actions(&self) -> Vec<Action> {
        let mut out: Vec<Action> = self
            .blocks
            .iter()
            .flat_map(|b| b.controls.iter())
            .filter_map(|c| match c {
                Control::Button { action, enabled: true, .. } => Some(action.clone()),
                _ => None,
            })
            .collect();
        if let Some(scene) = &self.scene {
            out.extend(scene.clickable());
        }
        out
    }

    /// Contents of text controls with the given class.
    pub fn texts(&self, class: &str) -> Vec<&str> {
        self.blocks
            .iter()
            .flat_map(|b| b.controls.iter())
            .filter_map(|c| match c {
                Control::Text { class: cls, content, .. } if cls == class => Some(content.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Finds a card by id.
    pub fn card(&self, id: &str) -> Option<&Control> {
        self.blocks
            .iter()
            .flat_map(|b| b.controls.iter())
            .find(|c| matches!(c, Control::Card { id: cid, .. } if cid == id))
    }
}

/// Broad category of a widget, used for logging and the harness oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WidgetKind {
    VariableDiagram,
    DecisionTree,
    PathModel,
    Quiz,
    FitExplorer,
    ModelExplorer,
}

impl WidgetKind {
    pub fn name(&self) -> &'static str {
        match self {
            WidgetKind::VariableDiagram => "variable_diagram",
            WidgetKind::DecisionTree => "decision_tree",
            WidgetKind::PathModel => "path_model",
            WidgetKind::Quiz => "quiz",
            WidgetKind::FitExplorer => "fit_explorer",
            WidgetKind::ModelExplorer => "model_explorer",
        }
    }
}

impl std::fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// An interactive, independently-owned piece of the page.
///
/// # Contract
///
/// - `render` must not mutate state and must describe the whole widget.
/// - `dispatch` never panics on bad input; it returns `false` instead.
/// - Widgets that display reference data ask for it once through
///   `reference_request` and receive exactly one `deliver_reference` call.
pub trait Widget {
    /// Mount point this widget is attached to.
    fn mount(&self) -> &MountId;

    fn kind(&self) -> WidgetKind;

    /// Projects the current state into a frame.
    fn render(&self) -> Frame;

    /// Applies a user action. Returns true if the state changed.
    fn dispatch(&mut self, action: &Action) -> bool;

    /// Path of the static reference file this widget wants, if any.
    fn reference_request(&self) -> Option<&str> {
        None
    }

    /// Hands over the outcome of the single reference fetch.
    fn deliver_reference(&mut self, _result: Result<Arc<ReferenceData>, ReferenceError>) {}

    /// Downcasting hook for inspection in tests and the harness.
    fn as_any(&self) -> &dyn std::any::Any;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_actions_skip_disabled() {
        let mut frame = Frame::default();
        frame.push(
            Block::new("controls")
                .with(Control::button("Next Step", "next", Action::NextStep).disabled())
                .with(Control::button("Reset", "reset", Action::Reset)),
        );
        assert_eq!(frame.available_actions(), vec![Action::Reset]);
    }

    #[test]
    fn test_texts_by_class() {
        let mut frame = Frame::default();
        frame.push(
            Block::new("info")
                .with(Control::text("diagram-explanation", "hello"))
                .with(Control::text("other", "ignored")),
        );
        assert_eq!(frame.texts("diagram-explanation"), vec!["hello"]);
    }
}
