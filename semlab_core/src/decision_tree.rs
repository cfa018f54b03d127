//! Decision Tree Engine
//! ====================
//!
//! A fixed question/answer tree walked one choice at a time.
//!
//! # State machine
//!
//! ```text
//!            choose(answer)              choose(answer)
//!   [root Q] ──────────────► [Q ...] ──────────────► [Leaf]  (terminal)
//!       ▲                                               │
//!       └──────────────────── reset() ◄─────────────────┘
//! ```
//!
//! The state stores the path as branch indices, so the breadcrumb length
//! always equals the depth of the current node.

use crate::error::ContentError;
use crate::scene::{palette, Node, Scene};
use crate::widget::{Action, Block, Control, Frame, Widget, WidgetKind};
use semlab_env::MountId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Contract violations of [`DecisionTreeState::choose`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("Current node is a result; no further choices")]
    AtLeaf,

    #[error("No answer {0:?} at the current question")]
    UnknownAnswer(String),
}

/// One node of the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    Question { text: String, branches: Vec<Branch> },
    Leaf { result: String, description: String },
}

/// An answer and the node it leads to.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub answer: String,
    pub node: TreeNode,
}

impl TreeNode {
    pub fn question(text: impl Into<String>, branches: Vec<Branch>) -> Self {
        TreeNode::Question {
            text: text.into(),
            branches,
        }
    }

    pub fn leaf(result: impl Into<String>, description: impl Into<String>) -> Self {
        TreeNode::Leaf {
            result: result.into(),
            description: description.into(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Leaf { .. })
    }

    /// Longest number of choices from this node to a leaf.
    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Question { branches, .. } => {
                1 + branches.iter().map(|b| b.node.depth()).max().unwrap_or(0)
            }
        }
    }

    fn validate(&self) -> Result<(), ContentError> {
        if let TreeNode::Question { text, branches } = self {
            if branches.is_empty() {
                return Err(ContentError::tree(format!("question {:?} has no answers", text)));
            }
            for (i, branch) in branches.iter().enumerate() {
                if branches[..i].iter().any(|b| b.answer == branch.answer) {
                    return Err(ContentError::tree(format!(
                        "question {:?} repeats answer {:?}",
                        text, branch.answer
                    )));
                }
                branch.node.validate()?;
            }
        }
        Ok(())
    }
}

impl Branch {
    pub fn new(answer: impl Into<String>, node: TreeNode) -> Self {
        Self {
            answer: answer.into(),
            node,
        }
    }
}

/// JSON shape of a tree node: `{question, children}` or `{result, description}`,
/// with `answer` set on every non-root node.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    question: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<RawNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl RawNode {
    fn into_node(self) -> Result<TreeNode, ContentError> {
        match (self.result, self.question) {
            (Some(result), _) => Ok(TreeNode::leaf(result, self.description.unwrap_or_default())),
            (None, Some(question)) => {
                let branches = self
                    .children
                    .into_iter()
                    .map(|child| {
                        let answer = child
                            .answer
                            .clone()
                            .ok_or_else(|| ContentError::tree("child node without answer"))?;
                        Ok(Branch::new(answer, child.into_node()?))
                    })
                    .collect::<Result<Vec<_>, ContentError>>()?;
                Ok(TreeNode::question(question, branches))
            }
            (None, None) => Err(ContentError::tree("node has neither question nor result")),
        }
    }
}

/// Immutable, shareable decision tree. The root is always a question.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTree {
    root: Arc<TreeNode>,
}

impl DecisionTree {
    /// Wraps a root node after validating the whole tree.
    pub fn new(root: TreeNode) -> Result<Self, ContentError> {
        if root.is_leaf() {
            return Err(ContentError::tree("root must be a question"));
        }
        root.validate()?;
        Ok(Self { root: Arc::new(root) })
    }

    /// Parses the nested `{question, children: [{answer, ...}]}` format.
    pub fn from_json(json: &str) -> Result<Self, ContentError> {
        let raw: RawNode = serde_json::from_str(json)?;
        Self::new(raw.into_node()?)
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    /// Maximum number of choices needed to reach any leaf.
    pub fn max_depth(&self) -> usize {
        self.root.depth()
    }
}

/// One recorded decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub question: String,
    pub answer: String,
}

/// Position in a tree plus the breadcrumb that led there.
#[derive(Debug, Clone)]
pub struct DecisionTreeState {
    tree: DecisionTree,
    /// Branch index taken at each level
    path: Vec<usize>,
    breadcrumb: Vec<Step>,
}

impl DecisionTreeState {
    pub fn new(tree: DecisionTree) -> Self {
        Self {
            tree,
            path: Vec::new(),
            breadcrumb: Vec::new(),
        }
    }

    pub fn tree(&self) -> &DecisionTree {
        &self.tree
    }

    /// The node the user is currently looking at.
    pub fn current(&self) -> &TreeNode {
        let mut node = self.tree.root();
        for &index in &self.path {
            match node {
                TreeNode::Question { branches, .. } => node = &branches[index].node,
                TreeNode::Leaf { .. } => break,
            }
        }
        node
    }

    pub fn breadcrumb(&self) -> &[Step] {
        &self.breadcrumb
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn is_leaf(&self) -> bool {
        self.current().is_leaf()
    }

    /// Answers currently on offer (empty at a leaf).
    pub fn choices(&self) -> Vec<&str> {
        match self.current() {
            TreeNode::Question { branches, .. } => branches.iter().map(|b| b.answer.as_str()).collect(),
            TreeNode::Leaf { .. } => Vec::new(),
        }
    }

    /// Takes the branch labelled `answer`.
    pub fn choose(&mut self, answer: &str) -> Result<&TreeNode, TreeError> {
        let (question, index) = match self.current() {
            TreeNode::Leaf { .. } => return Err(TreeError::AtLeaf),
            TreeNode::Question { text, branches } => {
                let index = branches
                    .iter()
                    .position(|b| b.answer == answer)
                    .ok_or_else(|| TreeError::UnknownAnswer(answer.to_string()))?;
                (text.clone(), index)
            }
        };

        self.path.push(index);
        self.breadcrumb.push(Step {
            question,
            answer: answer.to_string(),
        });
        Ok(self.current())
    }

    /// Back to the root with an empty breadcrumb.
    pub fn reset(&mut self) {
        self.path.clear();
        self.breadcrumb.clear();
    }
}

// =============================================================================
// WIDGET
// =============================================================================

const WIDTH: f64 = 600.0;
const HEIGHT: f64 = 400.0;

/// Interactive statistical-test chooser.
pub struct DecisionTreeWidget {
    mount: MountId,
    state: DecisionTreeState,
}

impl DecisionTreeWidget {
    pub fn new(mount: MountId, tree: DecisionTree) -> Self {
        Self {
            mount,
            state: DecisionTreeState::new(tree),
        }
    }

    pub fn state(&self) -> &DecisionTreeState {
        &self.state
    }

    /// Draws breadcrumb lines, then either the result card or the question
    /// with one clickable answer box per branch.
    pub fn scene(&self) -> Scene {
        let mut scene = Scene::new(WIDTH, HEIGHT, "Interactive decision tree for choosing a statistical test");

        let breadcrumb = self.state.breadcrumb();
        let mut start_y = 30.0;
        for (i, step) in breadcrumb.iter().enumerate() {
            scene.push(
                Node::text(20.0, 20.0 + i as f64 * 18.0, format!("{}. {} \u{2192} {}", i + 1, step.question, step.answer), 11.0)
                    .fill(palette::GRAY),
            );
        }
        if !breadcrumb.is_empty() {
            start_y = 20.0 + breadcrumb.len() as f64 * 18.0 + 20.0;
        }

        match self.state.current() {
            TreeNode::Leaf { result, description } => {
                scene.push(
                    Node::rect(WIDTH / 2.0 - 140.0, start_y, 280.0, 70.0, 10.0)
                        .fill(palette::GREEN_TINT)
                        .stroke(palette::GREEN, 2.0)
                        .id("result"),
                );
                scene.push(
                    Node::text(WIDTH / 2.0, start_y + 28.0, result.clone(), 16.0)
                        .weight(700)
                        .centered()
                        .fill(palette::GREEN)
                        .id("result-label"),
                );
                scene.push(
                    Node::text(WIDTH / 2.0, start_y + 50.0, description.clone(), 12.0)
                        .centered()
                        .fill(palette::GRAY),
                );
            }
            TreeNode::Question { text, branches } => {
                scene.push(
                    Node::rect(WIDTH / 2.0 - 150.0, start_y, 300.0, 44.0, 8.0)
                        .fill(palette::BLUE_TINT)
                        .stroke(palette::BLUE, 2.0)
                        .id("question"),
                );
                scene.push(
                    Node::text(WIDTH / 2.0, start_y + 27.0, text.clone(), 14.0)
                        .bold()
                        .centered()
                        .fill(palette::BLUE),
                );

                let btn_y = start_y + 70.0;
                let (btn_w, btn_h, gap) = (170.0, 40.0, 15.0);
                let count = branches.len() as f64;
                let total_w = count * btn_w + (count - 1.0) * gap;
                let start_x = (WIDTH - total_w) / 2.0;

                for (i, branch) in branches.iter().enumerate() {
                    let bx = start_x + i as f64 * (btn_w + gap);
                    let action = Action::Choose(branch.answer.clone());
                    scene.push(
                        Node::line(WIDTH / 2.0, start_y + 44.0, bx + btn_w / 2.0, btn_y)
                            .stroke(palette::GRAY_LIGHT, 1.0),
                    );
                    scene.push(
                        Node::rect(bx, btn_y, btn_w, btn_h, 6.0)
                            .fill(palette::WHITE)
                            .stroke(palette::GRAY_LIGHT, 1.5)
                            .id(format!("answer-{}", i))
                            .on_click(action.clone()),
                    );
                    scene.push(
                        Node::text(bx + btn_w / 2.0, btn_y + 25.0, branch.answer.clone(), 13.0)
                            .centered()
                            .on_click(action),
                    );
                }
            }
        }

        scene
    }
}

impl Widget for DecisionTreeWidget {
    fn mount(&self) -> &MountId {
        &self.mount
    }

    fn kind(&self) -> WidgetKind {
        WidgetKind::DecisionTree
    }

    fn render(&self) -> Frame {
        let mut frame = Frame::with_scene(self.scene());
        frame.push(
            Block::new("controls")
                .with(Control::button("Reset", "Reset decision tree to start", Action::Reset)),
        );
        frame
    }

    fn dispatch(&mut self, action: &Action) -> bool {
        match action {
            Action::Choose(answer) => match self.state.choose(answer) {
                Ok(_) => {
                    debug!("{} chose {:?} (depth={})", self.mount, answer, self.state.depth());
                    true
                }
                Err(e) => {
                    debug!("{} ignored choice: {}", self.mount, e);
                    false
                }
            },
            Action::Reset => {
                let changed = self.state.depth() > 0;
                self.state.reset();
                changed
            }
            _ => false,
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
