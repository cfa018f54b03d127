//! Invariant oracle for simulation.
//!
//! The Oracle watches a page between harness steps and records every broken
//! invariant. It only reads: widgets are inspected through `as_any` downcasts
//! and their rendered frames.
//!
//! Checked after every step:
//! - each mount is activated at most once and stops being observed
//! - the decision-tree breadcrumb replays from the root to the current node
//! - committed quiz answers never change and reveal the correct option
//! - slider values stay on their grid inside their range
//! - removed model paths stay removed until `ResetModel`

use crate::context::SimViewport;
use semlab_core::decision_tree::{DecisionTree, DecisionTreeState, DecisionTreeWidget, Step, TreeNode};
use semlab_core::fit_explorer::FitExplorerWidget;
use semlab_core::quiz::{OptionMark, QuizWidget};
use semlab_core::sem_model::ModelExplorerWidget;
use semlab_core::widget::{Action, Widget};
use semlab_core::Page;
use semlab_env::MountId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// One broken invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub step: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mount: Option<String>,
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.mount {
            Some(mount) => write!(f, "step {} #{}: {}", self.step, mount, self.message),
            None => write!(f, "step {}: {}", self.step, self.message),
        }
    }
}

/// Invariant checker carrying what it has seen across steps.
#[derive(Debug, Default)]
pub struct Oracle {
    /// (quiz mount, question) -> first committed option
    committed: BTreeMap<(MountId, usize), usize>,
    /// Model mount -> paths removed as of the last check
    removed: BTreeMap<MountId, BTreeSet<String>>,
    violations: Vec<Violation>,
    checks: u64,
}

impl Oracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspects the page after `step`. `last` is the action dispatched in
    /// this step, if any.
    pub fn check(&mut self, step: u64, page: &Page, viewport: &SimViewport, last: Option<(&MountId, &Action)>) {
        self.checks += 1;
        self.check_activations(step, page, viewport);

        for mount in page.active_mounts() {
            let Some(widget) = page.widget(mount) else {
                continue;
            };
            let any = widget.as_any();
            if let Some(tree) = any.downcast_ref::<DecisionTreeWidget>() {
                self.check_decision_tree(step, mount, tree);
            } else if let Some(quiz) = any.downcast_ref::<QuizWidget>() {
                self.check_quiz(step, mount, quiz);
            } else if let Some(fit) = any.downcast_ref::<FitExplorerWidget>() {
                self.check_fit_explorer(step, mount, fit);
            } else if let Some(model) = any.downcast_ref::<ModelExplorerWidget>() {
                let reset = matches!(last, Some((m, Action::ResetModel)) if m == mount);
                self.check_model(step, mount, model, reset);
            }
        }
    }

    fn fail(&mut self, step: u64, mount: Option<&MountId>, message: impl Into<String>) {
        let violation = Violation {
            step,
            mount: mount.map(|m| m.as_str().to_string()),
            message: message.into(),
        };
        warn!("Invariant violated: {}", violation);
        self.violations.push(violation);
    }

    fn check_activations(&mut self, step: u64, page: &Page, viewport: &SimViewport) {
        let mut seen = BTreeSet::new();
        let log = page.activation_log().to_vec();
        for mount in &log {
            if !seen.insert(mount) {
                self.fail(step, Some(mount), "activated more than once");
            }
            if !page.is_active(mount) {
                self.fail(step, Some(mount), "in activation log but not active");
            }
            if viewport.is_observed(mount) {
                self.fail(step, Some(mount), "still observed after activation");
            }
        }
    }

    fn check_decision_tree(&mut self, step: u64, mount: &MountId, widget: &DecisionTreeWidget) {
        let state = widget.state();
        if state.breadcrumb().len() != state.depth() {
            self.fail(
                step,
                Some(mount),
                format!("breadcrumb has {} steps at depth {}", state.breadcrumb().len(), state.depth()),
            );
        }
        if state.depth() > state.tree().max_depth() {
            self.fail(step, Some(mount), "walked past the deepest leaf");
        }

        self.check_breadcrumb(step, mount, state.tree(), state.breadcrumb(), state.current());
    }

    /// Replays `breadcrumb` from the root of `tree`; it must end at `current`.
    fn check_breadcrumb(&mut self, step: u64, mount: &MountId, tree: &DecisionTree, breadcrumb: &[Step], current: &TreeNode) {
        let mut replay = DecisionTreeState::new(tree.clone());
        for crumb in breadcrumb {
            if replay.choose(&crumb.answer).is_err() {
                self.fail(step, Some(mount), format!("breadcrumb answer {:?} does not replay", crumb.answer));
                return;
            }
        }
        if replay.current() != current {
            self.fail(step, Some(mount), "breadcrumb does not lead to the current node");
        }
    }

    fn check_quiz(&mut self, step: u64, mount: &MountId, widget: &QuizWidget) {
        let state = widget.state();
        for (q, question) in state.set().questions.iter().enumerate() {
            let key = (mount.clone(), q);
            match (state.committed(q), self.committed.get(&key).copied()) {
                (Some(now), Some(first)) if now != first => {
                    self.fail(step, Some(mount), format!("question {} changed from {} to {}", q, first, now));
                }
                (None, Some(_)) => {
                    self.fail(step, Some(mount), format!("question {} lost its committed answer", q));
                }
                (Some(now), None) => {
                    self.committed.insert(key, now);
                }
                _ => {}
            }

            if state.committed(q).is_some() && state.mark(q, question.correct) != OptionMark::Correct {
                self.fail(step, Some(mount), format!("question {} hides its correct option", q));
            }
        }
    }

    fn check_fit_explorer(&mut self, step: u64, mount: &MountId, widget: &FitExplorerWidget) {
        if !widget.inputs().is_normalized() {
            self.fail(step, Some(mount), "slider value off grid or out of range");
        }
        if widget.metrics().get("cfi").is_none() {
            self.fail(step, Some(mount), "derived metrics missing cfi");
        }
    }

    fn check_model(&mut self, step: u64, mount: &MountId, widget: &ModelExplorerWidget, reset: bool) {
        let now = widget.removed().clone();
        let before = self.removed.get(mount).cloned().unwrap_or_default();
        if !reset && !before.is_subset(&now) {
            self.fail(step, Some(mount), "removed path restored without reset");
        }

        if let Some(scene) = widget.render().scene {
            for id in &now {
                if scene.find(&format!("path-{}", id)).is_some() {
                    self.fail(step, Some(mount), format!("removed path {} still drawn", id));
                }
            }
        }
        self.removed.insert(mount.clone(), now);
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Number of `check` calls so far.
    pub fn checks(&self) -> u64 {
        self.checks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SimHost;
    use semlab_core::decision_tree::Branch;
    use semlab_core::PageConfig;
    use semlab_env::{SessionId, VisibilityObserver};

    fn page(host: &mut SimHost) -> Page {
        semlab_core::lecture_page(&host.document, &mut host.viewport, PageConfig::default(), SessionId::from_seed(1))
            .unwrap()
    }

    #[test]
    fn test_clean_page_passes() {
        let mut host = SimHost::lecture();
        let mut page = page(&mut host);
        let mut oracle = Oracle::new();

        host.scroll_to(f64::MAX);
        let entries = host.intersections();
        page.on_intersections(&entries, &mut host.viewport);

        oracle.check(0, &page, &host.viewport, None);
        assert!(oracle.is_clean(), "{:?}", oracle.violations());
        assert_eq!(oracle.checks(), 1);
    }

    #[test]
    fn test_committed_answers_tracked() {
        let mut host = SimHost::lecture();
        let mut page = page(&mut host);
        let mut oracle = Oracle::new();
        let quiz = MountId::from("quiz-model-fit");

        assert!(page.dispatch(&quiz, &Action::Answer { question: 0, option: 1 }));
        oracle.check(1, &page, &host.viewport, None);
        assert!(!page.dispatch(&quiz, &Action::Answer { question: 0, option: 0 }));
        oracle.check(2, &page, &host.viewport, None);

        assert!(oracle.is_clean());
        assert_eq!(oracle.committed.get(&(quiz, 0)), Some(&1));
    }

    #[test]
    fn test_violation_display() {
        let v = Violation {
            step: 3,
            mount: Some("sim-bks-model".into()),
            message: "removed path restored without reset".into(),
        };
        assert_eq!(v.to_string(), "step 3 #sim-bks-model: removed path restored without reset");
    }

    fn has(oracle: &Oracle, message: &str) -> bool {
        oracle.violations().iter().any(|v| v.message == message)
    }

    #[test]
    fn test_changed_answer_flagged() {
        let mut host = SimHost::lecture();
        let mut page = page(&mut host);
        let mut oracle = Oracle::new();
        let quiz = MountId::from("quiz-model-fit");

        oracle.committed.insert((quiz.clone(), 0), 2);
        assert!(page.dispatch(&quiz, &Action::Answer { question: 0, option: 1 }));
        oracle.check(1, &page, &host.viewport, None);

        assert!(has(&oracle, "question 0 changed from 2 to 1"), "{:?}", oracle.violations());
        assert_eq!(oracle.violations()[0].mount.as_deref(), Some("quiz-model-fit"));
    }

    #[test]
    fn test_restored_path_flagged() {
        let mut host = SimHost::lecture();
        let mut page = page(&mut host);
        let mut oracle = Oracle::new();
        let model = MountId::from("sim-bks-model");

        assert!(host.scroll_into_view(&model));
        let entries = host.intersections();
        page.on_intersections(&entries, &mut host.viewport);
        assert!(page.is_active(&model));

        oracle
            .removed
            .insert(model.clone(), BTreeSet::from(["neuroticism-personality".to_string()]));
        oracle.check(1, &page, &host.viewport, None);
        assert!(has(&oracle, "removed path restored without reset"), "{:?}", oracle.violations());

        // The same shrink right after ResetModel is allowed.
        let mut after_reset = Oracle::new();
        after_reset
            .removed
            .insert(model.clone(), BTreeSet::from(["neuroticism-personality".to_string()]));
        after_reset.check(1, &page, &host.viewport, Some((&model, &Action::ResetModel)));
        assert!(after_reset.is_clean(), "{:?}", after_reset.violations());
    }

    #[test]
    fn test_observed_after_activation_flagged() {
        let mut host = SimHost::lecture();
        let mut page = page(&mut host);
        let mut oracle = Oracle::new();
        let variables = MountId::from("diagram-variables");

        assert!(host.scroll_into_view(&variables));
        let entries = host.intersections();
        let activated = page.on_intersections(&entries, &mut host.viewport);
        assert!(activated.contains(&variables));
        assert!(!host.viewport.is_observed(&variables));

        host.viewport.observe(&variables, page.config().activation_threshold);
        oracle.check(1, &page, &host.viewport, None);
        assert!(has(&oracle, "still observed after activation"), "{:?}", oracle.violations());
    }

    #[test]
    fn test_breadcrumb_replay_flagged() {
        let tree = DecisionTree::new(TreeNode::question(
            "Are the groups independent?",
            vec![
                Branch::new("Yes", TreeNode::leaf("Independent t-test", "Compare two unrelated means")),
                Branch::new("No", TreeNode::leaf("Paired t-test", "Compare two related means")),
            ],
        ))
        .unwrap();
        let mut oracle = Oracle::new();
        let mount = MountId::from("tree-test-chooser");

        let mut walked = DecisionTreeState::new(tree.clone());
        walked.choose("Yes").unwrap();
        oracle.check_breadcrumb(0, &mount, &tree, walked.breadcrumb(), walked.current());
        assert!(oracle.is_clean(), "{:?}", oracle.violations());

        let bogus = [Step {
            question: "Are the groups independent?".into(),
            answer: "Maybe".into(),
        }];
        oracle.check_breadcrumb(1, &mount, &tree, &bogus, walked.current());
        assert!(has(&oracle, "breadcrumb answer \"Maybe\" does not replay"), "{:?}", oracle.violations());

        let wrong_end = [Step {
            question: "Are the groups independent?".into(),
            answer: "No".into(),
        }];
        oracle.check_breadcrumb(2, &mount, &tree, &wrong_end, walked.current());
        assert!(has(&oracle, "breadcrumb does not lead to the current node"));
    }
}
