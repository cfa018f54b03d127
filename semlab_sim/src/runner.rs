//! Scenario runner - drives a simulated reader through the lecture page.
//!
//! Every scenario runs against a fresh [`Session`]: the lecture layout on a
//! [`SimHost`], one [`Page`], a seeded ChaCha8 driver and the [`Oracle`].
//! Each scroll or dispatched action is one step; the oracle checks the page
//! after every step and the first violation ends the scenario.

use crate::context::{MemorySource, SimDocument, SimHost, DEFAULT_VIEWPORT_HEIGHT, LECTURE_LAYOUT};
use crate::error::{ensure, SimError};
use crate::exporter::{SimEvent, SimExport, SimFrame};
use crate::oracle::Oracle;
use crate::scenarios::ScenarioId;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use semlab_core::content::{quiz_mount, QUIZ_KEYS};
use semlab_core::fit_explorer::{FitExplorerWidget, REFERENCE_UNAVAILABLE};
use semlab_core::quiz::QuizWidget;
use semlab_core::sem_model::{path_ids, ModelExplorerWidget, EXPLORE_INFO, MODEL_UNAVAILABLE};
use semlab_core::simulation::SAMPLE_SIZE;
use semlab_core::svg::Surface;
use semlab_core::widget::{Action, Control, Frame};
use semlab_core::{lecture_page, Page, PageConfig};
use semlab_env::{MountId, SessionId};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

#[cfg(feature = "visualization")]
use semlab_core::visualization::RerunSceneLogger;
#[cfg(feature = "visualization")]
use std::sync::Arc;

const DECISION_TREE: &str = "diagram-decision-tree";
const FIT_EXPLORER: &str = "sim-fit-explorer";
const MODEL_EXPLORER: &str = "sim-bks-model";

/// Harness configuration.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Step budget for the randomized phase of a scenario
    pub steps: u64,

    pub viewport_height: f64,

    /// Scroll step distribution in pixels (normal, absolute value taken)
    pub scroll_mean: f64,
    pub scroll_std_dev: f64,

    pub page: PageConfig,

    /// Keep the SVG of every redraw in the export
    pub capture_svg: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            steps: 200,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            scroll_mean: 480.0,
            scroll_std_dev: 160.0,
            page: PageConfig::default(),
            capture_svg: false,
        }
    }
}

/// Counters collected during a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioMetrics {
    pub scroll_events: u64,
    pub actions_dispatched: u64,
    pub state_changes: u64,
    pub no_ops: u64,
    pub redraws: u64,
    pub fetches: usize,
}

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether the scenario passed its assertions and the oracle
    pub passed: bool,

    /// Total steps executed
    pub steps: u64,

    /// Mounts in activation order
    pub activations: Vec<String>,

    /// Failure message if any
    pub failure_reason: Option<String>,

    pub metrics: ScenarioMetrics,

    pub export: SimExport,
}

impl ScenarioResult {
    fn aborted(scenario: ScenarioId, seed: u64, error: SimError) -> Self {
        let reason = error.to_string();
        let mut export = SimExport::new(scenario.name(), seed, SessionId::from_seed(seed).as_uuid());
        export.finalize(false, Some(reason.clone()), Vec::new());
        Self {
            scenario,
            seed,
            passed: false,
            steps: 0,
            activations: Vec::new(),
            failure_reason: Some(reason),
            metrics: ScenarioMetrics::default(),
            export,
        }
    }
}

/// Runs reader scenarios.
pub struct ScenarioRunner {
    seed: u64,
    config: SimConfig,
    #[cfg(feature = "visualization")]
    rerun: Option<Arc<RerunSceneLogger>>,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            config: SimConfig::default(),
            #[cfg(feature = "visualization")]
            rerun: None,
        }
    }

    pub fn with_config(mut self, config: SimConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the step budget.
    pub fn with_steps(mut self, steps: u64) -> Self {
        self.config.steps = steps;
        self
    }

    pub fn with_svg_capture(mut self, capture: bool) -> Self {
        self.config.capture_svg = capture;
        self
    }

    /// Logs every redrawn scene to Rerun.
    #[cfg(feature = "visualization")]
    pub fn with_rerun(mut self, logger: Arc<RerunSceneLogger>) -> Self {
        self.rerun = Some(logger);
        self
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Runs a scenario and returns the result.
    pub async fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let source = if scenario.is_offline() {
            MemorySource::offline()
        } else {
            MemorySource::bks_fixture()
        };

        let mut session = match Session::open(self, scenario, source).await {
            Ok(session) => session,
            Err(e) => {
                warn!("{} (seed={}) setup failed: {}", scenario, self.seed, e);
                return ScenarioResult::aborted(scenario, self.seed, e);
            }
        };

        let outcome = match scenario {
            ScenarioId::ScrollThrough => session.scroll_through().await,
            ScenarioId::DecisionWalk => session.decision_walk().await,
            ScenarioId::QuizReplay => session.quiz_replay(),
            ScenarioId::SliderSweep => session.slider_sweep().await,
            ScenarioId::OfflineReference => session.offline_reference().await,
            ScenarioId::ExploreModel => session.explore_model().await,
            ScenarioId::RandomReader => session.random_reader().await,
        };

        session.finish(scenario, outcome)
    }
}

/// One page session under test.
struct Session {
    seed: u64,
    config: SimConfig,
    host: SimHost,
    page: Page,
    source: MemorySource,
    oracle: Oracle,
    rng: ChaCha8Rng,
    scroll: Normal<f64>,
    surfaces: BTreeMap<MountId, Surface>,
    metrics: ScenarioMetrics,
    export: SimExport,
    /// Frame being filled by the current step
    frame: SimFrame,
    step: u64,
    #[cfg(feature = "visualization")]
    rerun: Option<Arc<RerunSceneLogger>>,
}

impl Session {
    /// Installs the lecture and processes the initial visibility report.
    async fn open(runner: &ScenarioRunner, scenario: ScenarioId, source: MemorySource) -> Result<Self, SimError> {
        let config = runner.config.clone();
        let scroll = Normal::new(config.scroll_mean, config.scroll_std_dev)
            .map_err(|e| SimError::Config(format!("scroll distribution: {}", e)))?;

        let mut host = SimHost::new(SimDocument::lecture(), config.viewport_height);
        let session_id = SessionId::from_seed(runner.seed);
        let page = lecture_page(&host.document, &mut host.viewport, config.page.clone(), session_id)?;

        let mut session = Self {
            seed: runner.seed,
            config,
            host,
            page,
            source,
            oracle: Oracle::new(),
            rng: ChaCha8Rng::seed_from_u64(runner.seed),
            scroll,
            surfaces: BTreeMap::new(),
            metrics: ScenarioMetrics::default(),
            export: SimExport::new(scenario.name(), runner.seed, session_id.as_uuid()),
            frame: SimFrame::default(),
            step: 0,
            #[cfg(feature = "visualization")]
            rerun: runner.rerun.clone(),
        };

        // Eager widgets are drawn at page load
        let eager = session.page.activation_log().to_vec();
        for mount in &eager {
            session.event(Some(mount), "mounted at page load");
            session.present(mount);
        }
        session.sync().await?;
        session.end_step(None)?;
        Ok(session)
    }

    fn budget_left(&self) -> bool {
        self.step < self.config.steps
    }

    fn event(&mut self, mount: Option<&MountId>, message: impl Into<String>) {
        self.frame.events.push(SimEvent::info(mount.map(MountId::as_str), message));
    }

    /// Feeds the current intersections to the page and serves any reference
    /// requests of the widgets it activated.
    async fn sync(&mut self) -> Result<Vec<MountId>, SimError> {
        let entries = self.host.intersections();
        let activated = self.page.on_intersections(&entries, &mut self.host.viewport);
        let threshold = self.page.config().activation_threshold;

        for mount in &activated {
            let ratio = self.host.ratio(mount);
            ensure(ratio > 0.0 && ratio >= threshold, || {
                format!("{} activated at ratio {:.3}", mount, ratio)
            })?;
            self.event(Some(mount), format!("activated (ratio={:.2})", ratio));
        }

        if !activated.is_empty() {
            let served = self.page.load_references(&self.source).await;
            self.metrics.fetches += served;
            if served > 0 {
                let event = if self.source.is_offline() {
                    SimEvent::warn(None, format!("{} reference fetch(es) rejected", served))
                } else {
                    SimEvent::info(None, format!("{} reference fetch(es) served", served))
                };
                self.frame.events.push(event);
            }
            for mount in &activated {
                self.present(mount);
            }
        }
        Ok(activated)
    }

    async fn scroll_to(&mut self, y: f64) -> Result<Vec<MountId>, SimError> {
        let y = self.host.scroll_to(y);
        self.metrics.scroll_events += 1;
        self.frame.scroll_y = y;
        let activated = self.sync().await?;
        self.end_step(None)?;
        Ok(activated)
    }

    async fn scroll_by(&mut self, dy: f64) -> Result<Vec<MountId>, SimError> {
        self.scroll_to(self.host.viewport.scroll_y() + dy).await
    }

    /// Positive scroll distance, never more than one viewport.
    fn scroll_step(&mut self) -> f64 {
        self.scroll
            .sample(&mut self.rng)
            .abs()
            .clamp(1.0, self.host.viewport.height().max(1.0))
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), SimError> {
        while self.host.viewport.scroll_y() < self.host.max_scroll() {
            let dy = self.scroll_step();
            self.scroll_by(dy).await?;
        }
        Ok(())
    }

    async fn scroll_into_view(&mut self, mount: &str) -> Result<(), SimError> {
        let mount = MountId::from(mount);
        let top = self
            .host
            .document
            .extent(&mount)
            .map(|e| e.top)
            .ok_or_else(|| SimError::assertion(format!("{} not in document", mount)))?;
        self.scroll_to(top).await?;
        ensure(self.page.is_active(&mount), || format!("{} not active after scrolling into view", mount))
    }

    /// Dispatches one action as one step. Returns whether state changed.
    fn act(&mut self, mount: &MountId, action: Action) -> Result<bool, SimError> {
        let changed = self.page.dispatch(mount, &action);
        self.metrics.actions_dispatched += 1;
        if changed {
            self.metrics.state_changes += 1;
            self.present(mount);
        } else {
            self.metrics.no_ops += 1;
        }
        debug!("step {} {} {:?} -> {}", self.step, mount, action, changed);
        let suffix = if changed { "" } else { " (no-op)" };
        self.event(Some(mount), format!("{:?}{}", action, suffix));
        self.end_step(Some((mount, &action)))?;
        Ok(changed)
    }

    fn present(&mut self, mount: &MountId) {
        let Some(frame) = self.page.render(mount) else {
            return;
        };
        let surface = self.surfaces.entry(mount.clone()).or_default();
        if !surface.present(&frame) {
            return;
        }
        self.metrics.redraws += 1;

        if self.config.capture_svg {
            if let Some(content) = surface.content() {
                self.frame.svg.insert(mount.as_str().to_string(), content.to_string());
            }
        }

        #[cfg(feature = "visualization")]
        if let (Some(rec), Some(scene)) = (&self.rerun, &frame.scene) {
            rec.set_step(self.step);
            if let Err(e) = rec.log_scene(mount.as_str(), scene) {
                warn!("Rerun logging failed: {}", e);
            }
        }
    }

    /// Runs the oracle and closes the current frame.
    fn end_step(&mut self, last: Option<(&MountId, &Action)>) -> Result<(), SimError> {
        let seen = self.oracle.violations().len();
        self.oracle.check(self.step, &self.page, &self.host.viewport, last);

        let next = SimFrame {
            step: self.step + 1,
            scroll_y: self.host.viewport.scroll_y(),
            ..Default::default()
        };
        let frame = std::mem::replace(&mut self.frame, next);
        self.export.add_frame(frame);
        self.step += 1;

        match self.oracle.violations().get(seen) {
            Some(violation) => Err(SimError::Invariant(violation.clone())),
            None => Ok(()),
        }
    }

    fn frame(&self, mount: &str) -> Result<Frame, SimError> {
        self.page
            .render(&MountId::from(mount))
            .ok_or_else(|| SimError::assertion(format!("#{} is not active", mount)))
    }

    fn widget<W: 'static>(&self, mount: &str) -> Result<&W, SimError> {
        self.page
            .widget(&MountId::from(mount))
            .and_then(|w| w.as_any().downcast_ref::<W>())
            .ok_or_else(|| SimError::assertion(format!("no {} at #{}", std::any::type_name::<W>(), mount)))
    }

    fn finish(mut self, scenario: ScenarioId, outcome: Result<(), SimError>) -> ScenarioResult {
        // Events of a step cut short by a failed assertion
        if !self.frame.events.is_empty() {
            let frame = std::mem::take(&mut self.frame);
            self.export.add_frame(frame);
        }

        let violations = self.oracle.violations().to_vec();
        let failure_reason = match &outcome {
            Err(e) => Some(e.to_string()),
            Ok(()) => violations.first().map(|v| v.to_string()),
        };
        let passed = failure_reason.is_none();
        let activations: Vec<String> = self
            .page
            .activation_log()
            .iter()
            .map(|m| m.as_str().to_string())
            .collect();

        self.export.activations = activations.clone();
        self.export.finalize(passed, failure_reason.clone(), violations);

        if passed {
            info!(
                "{} (seed={}) finished: {} steps, {} actions, {} redraws",
                scenario, self.seed, self.step, self.metrics.actions_dispatched, self.metrics.redraws
            );
        } else {
            warn!(
                "{} (seed={}) failed at step {}: {}",
                scenario,
                self.seed,
                self.step,
                failure_reason.as_deref().unwrap_or("unknown")
            );
        }

        ScenarioResult {
            scenario,
            seed: self.seed,
            passed,
            steps: self.step,
            activations,
            failure_reason,
            metrics: self.metrics,
            export: self.export,
        }
    }

    // =========================================================================
    // SCENARIOS
    // =========================================================================

    /// SIM-001
    async fn scroll_through(&mut self) -> Result<(), SimError> {
        let eager: Vec<MountId> = QUIZ_KEYS.iter().map(|k| MountId::from(quiz_mount(k))).collect();
        for mount in &eager {
            ensure(self.page.is_active(mount), || format!("{} not mounted at page load", mount))?;
        }

        self.scroll_to_bottom().await?;

        for (mount, _) in LECTURE_LAYOUT {
            let mount = MountId::from(mount);
            ensure(self.page.is_active(&mount), || format!("{} never activated", mount))?;
        }

        let lazy: Vec<&str> = self
            .page
            .activation_log()
            .iter()
            .filter(|m| !eager.contains(m))
            .map(|m| m.as_str())
            .collect();
        let expected: Vec<&str> = LECTURE_LAYOUT
            .iter()
            .map(|(m, _)| *m)
            .filter(|m| !m.starts_with("quiz-"))
            .collect();
        ensure(lazy == expected, || format!("activation order {:?}", lazy))?;

        let activations = self.page.activation_log().len();
        while self.host.viewport.scroll_y() > 0.0 {
            let dy = self.scroll_step();
            self.scroll_by(-dy).await?;
        }
        ensure(self.page.activation_log().len() == activations, || {
            "scrolling back up activated a widget again".into()
        })?;
        ensure(self.source.fetch_count() == 2, || {
            format!("{} reference fetches, expected 2", self.source.fetch_count())
        })
    }

    /// SIM-002
    async fn decision_walk(&mut self) -> Result<(), SimError> {
        self.scroll_into_view(DECISION_TREE).await?;
        let mount = MountId::from(DECISION_TREE);

        for answer in ["Continuous", "Categorical (2 groups)", "Yes"] {
            ensure(self.act(&mount, Action::Choose(answer.into()))?, || format!("{:?} rejected", answer))?;
        }
        let result = self
            .frame(DECISION_TREE)?
            .scene
            .and_then(|s| s.find("result-label").and_then(|n| n.text_content()).map(str::to_string));
        ensure(result.as_deref() == Some("Independent t-test"), || format!("unexpected result {:?}", result))?;
        ensure(self.act(&mount, Action::Reset)?, || "reset at a leaf was a no-op".into())?;

        let mut leaves = 0;
        while self.budget_left() {
            let mut choices: Vec<Action> = self
                .frame(DECISION_TREE)?
                .available_actions()
                .into_iter()
                .filter(|a| matches!(a, Action::Choose(_)))
                .collect();
            // Box and label carry the same action
            choices.dedup();

            if choices.is_empty() {
                leaves += 1;
                ensure(self.act(&mount, Action::Reset)?, || "reset at a leaf was a no-op".into())?;
            } else if self.rng.gen_bool(0.1) {
                let accepted = self.act(&mount, Action::Choose("Not an answer".into()))?;
                ensure(!accepted, || "unknown answer accepted".into())?;
            } else {
                let pick = choices[self.rng.gen_range(0..choices.len())].clone();
                ensure(self.act(&mount, pick.clone())?, || format!("{:?} rejected", pick))?;
            }
        }
        debug!("decision_walk reached {} leaves", leaves);
        Ok(())
    }

    /// SIM-003
    fn quiz_replay(&mut self) -> Result<(), SimError> {
        let mut quizzes = Vec::new();
        for key in QUIZ_KEYS {
            let mount = quiz_mount(key);
            let shape: Vec<usize> = self
                .widget::<QuizWidget>(&mount)?
                .state()
                .set()
                .questions
                .iter()
                .map(|q| q.options.len())
                .collect();
            quizzes.push((MountId::from(mount), shape));
        }

        for (mount, shape) in &quizzes {
            for (question, &options) in shape.iter().enumerate() {
                let option = self.rng.gen_range(0..options);
                ensure(self.act(mount, Action::Answer { question, option })?, || {
                    format!("{} q{} first answer rejected", mount, question)
                })?;
            }
        }

        // Everything after the first answer is a replay or out of range
        while self.budget_left() {
            let (mount, shape) = &quizzes[self.rng.gen_range(0..quizzes.len())];
            let question = self.rng.gen_range(0..=shape.len());
            let options = shape.get(question).copied().unwrap_or(4);
            let option = self.rng.gen_range(0..=options);
            ensure(!self.act(mount, Action::Answer { question, option })?, || {
                format!("{} q{} option {} changed state", mount, question, option)
            })?;
        }

        for (mount, shape) in &quizzes {
            let answered = self.widget::<QuizWidget>(mount.as_str())?.state().answered_count();
            ensure(answered == shape.len(), || format!("{} has {} of {} answers", mount, answered, shape.len()))?;
        }
        Ok(())
    }

    /// SIM-004
    async fn slider_sweep(&mut self) -> Result<(), SimError> {
        self.scroll_into_view(FIT_EXPLORER).await?;
        let mount = MountId::from(FIT_EXPLORER);

        let cfi = self.widget::<FitExplorerWidget>(FIT_EXPLORER)?.metrics().get("cfi");
        ensure(cfi.is_some_and(|v| (v - 0.845).abs() < 1e-9), || format!("initial cfi {:?}", cfi))?;
        let reference = self.frame(FIT_EXPLORER)?.texts("bks-reference").join("");
        ensure(reference.starts_with("BKS Model Reference"), || format!("reference row {:?}", reference))?;

        let specs: Vec<(String, f64, f64)> = self
            .widget::<FitExplorerWidget>(FIT_EXPLORER)?
            .inputs()
            .specs()
            .iter()
            .map(|s| (s.name.clone(), s.min, s.max))
            .collect();

        while self.budget_left() {
            let (name, min, max) = specs[self.rng.gen_range(0..specs.len())].clone();
            let span = max - min;
            let value = match self.rng.gen_range(0..20) {
                0 => f64::NAN,
                1 => f64::INFINITY,
                2 => f64::NEG_INFINITY,
                _ => self.rng.gen_range(min - span / 2.0..max + span / 2.0),
            };
            self.act(&mount, Action::SetInput { name: name.clone(), value })?;

            let stored = self
                .widget::<FitExplorerWidget>(FIT_EXPLORER)?
                .inputs()
                .get(&name)
                .ok_or_else(|| SimError::assertion(format!("input {} disappeared", name)))?;
            let changed = self.act(&mount, Action::SetInput { name: name.clone(), value: stored })?;
            ensure(!changed, || format!("re-setting {}={} changed state", name, stored))?;
        }

        let unknown = self.act(&mount, Action::SetInput { name: "unknown".into(), value: 1.0 })?;
        ensure(!unknown, || "unknown input accepted".into())
    }

    /// SIM-005
    async fn offline_reference(&mut self) -> Result<(), SimError> {
        self.scroll_to_bottom().await?;

        let fit = self.frame(FIT_EXPLORER)?;
        ensure(fit.texts("bks-reference") == vec![REFERENCE_UNAVAILABLE], || {
            format!("reference row {:?}", fit.texts("bks-reference"))
        })?;
        let model = self.frame(MODEL_EXPLORER)?;
        ensure(model.scene.is_none() && model.texts("model-unavailable") == vec![MODEL_UNAVAILABLE], || {
            "model explorer did not show its fallback".into()
        })?;

        let toggled = self.act(&MountId::from(MODEL_EXPLORER), Action::ToggleExplore)?;
        ensure(!toggled, || "explore mode entered without data".into())?;

        let fetches = self.source.fetch_count();
        ensure(fetches == 2, || format!("{} reference fetches, expected 2", fetches))?;

        // Revisiting never retries
        self.scroll_to(0.0).await?;
        self.scroll_to_bottom().await?;
        ensure(self.source.fetch_count() == fetches, || "reference fetch retried".into())?;

        // Sliders do not depend on reference data
        let moved = self.act(
            &MountId::from(FIT_EXPLORER),
            Action::SetInput {
                name: SAMPLE_SIZE.into(),
                value: 1000.0,
            },
        )?;
        ensure(moved, || "slider inert without reference data".into())
    }

    /// SIM-006
    async fn explore_model(&mut self) -> Result<(), SimError> {
        self.scroll_into_view(MODEL_EXPLORER).await?;
        let mount = MountId::from(MODEL_EXPLORER);
        let original = self.frame(MODEL_EXPLORER)?;

        let first = path_ids()[0].to_string();
        ensure(!self.act(&mount, Action::RemovePath(first))?, || {
            "path removed outside what-if mode".into()
        })?;
        ensure(self.act(&mount, Action::ToggleExplore)?, || "could not enter what-if mode".into())?;
        let info = self.frame(MODEL_EXPLORER)?;
        ensure(info.texts("diagram-explanation") == vec![EXPLORE_INFO], || "missing what-if hint".into())?;

        while self.budget_left() {
            let clickable = self
                .frame(MODEL_EXPLORER)?
                .scene
                .map(|s| s.clickable())
                .unwrap_or_default();
            if clickable.is_empty() {
                break;
            }
            if self.rng.gen_bool(0.2) {
                let removed = self.act(&mount, Action::RemovePath("no-such-path".into()))?;
                ensure(!removed, || "unknown path removed".into())?;
            } else {
                let pick = clickable[self.rng.gen_range(0..clickable.len())].clone();
                ensure(self.act(&mount, pick.clone())?, || format!("{:?} rejected", pick))?;
                ensure(!self.act(&mount, pick.clone())?, || format!("{:?} applied twice", pick))?;
            }
        }

        // Lines go, coefficient labels stay
        let removed = self.widget::<ModelExplorerWidget>(MODEL_EXPLORER)?.removed().clone();
        if let Some(scene) = self.frame(MODEL_EXPLORER)?.scene {
            for id in &removed {
                ensure(scene.find(&format!("coef-{}", id)).is_some(), || format!("coefficient of {} hidden", id))?;
            }
        }

        ensure(self.act(&mount, Action::ResetModel)?, || "reset did nothing in what-if mode".into())?;
        ensure(self.frame(MODEL_EXPLORER)? == original, || "reset did not restore the original model".into())
    }

    /// SIM-007
    async fn random_reader(&mut self) -> Result<(), SimError> {
        while self.budget_left() {
            if self.rng.gen_bool(0.3) {
                let dy = self.scroll_step();
                let dy = if self.rng.gen_bool(0.25) { -dy } else { dy };
                self.scroll_by(dy).await?;
                continue;
            }

            let active: Vec<MountId> = self.page.active_mounts().into_iter().cloned().collect();
            let Some(mount) = active.choose(&mut self.rng).cloned() else {
                let dy = self.scroll_step();
                self.scroll_by(dy).await?;
                continue;
            };

            let frame = self.frame(mount.as_str())?;
            let mut actions = frame.available_actions();
            for control in frame.blocks.iter().flat_map(|b| b.controls.iter()) {
                if let Control::Slider { name, min, max, .. } = control {
                    actions.push(Action::SetInput {
                        name: name.clone(),
                        value: self.rng.gen_range(*min..=*max),
                    });
                }
            }

            match actions.choose(&mut self.rng).cloned() {
                Some(action) => {
                    self.act(&mount, action)?;
                }
                None => {
                    let dy = self.scroll_step();
                    self.scroll_by(dy).await?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    async fn run(scenario: ScenarioId, seed: u64) -> ScenarioResult {
        ScenarioRunner::new(seed).with_steps(120).run(scenario).await
    }

    #[tokio::test]
    async fn test_every_scenario_passes() {
        for scenario in ScenarioId::all() {
            let result = run(scenario, 42).await;
            assert!(result.passed, "{}: {:?}", scenario, result.failure_reason);
            assert!(result.export.violations.is_empty());
        }
    }

    #[tokio::test]
    async fn test_scroll_through_activates_in_page_order() {
        let result = run(ScenarioId::ScrollThrough, 7).await;
        assert!(result.passed, "{:?}", result.failure_reason);
        assert_eq!(
            result.activations,
            vec![
                "quiz-data-types",
                "quiz-latent-variables",
                "quiz-assumption-violations",
                "quiz-model-fit",
                "diagram-variables",
                "diagram-decision-tree",
                "diagram-sem-model",
                "sim-fit-explorer",
                "sim-bks-model",
            ]
        );
        assert_eq!(result.metrics.fetches, 2);
    }

    #[tokio::test]
    async fn test_offline_reference_degrades() {
        let result = run(ScenarioId::OfflineReference, 3).await;
        assert!(result.passed, "{:?}", result.failure_reason);
        let warned = result
            .export
            .frames
            .iter()
            .flat_map(|f| f.events.iter())
            .any(|e| e.level.as_deref() == Some("warn"));
        assert!(warned);
    }

    #[tokio::test]
    async fn test_same_seed_same_export() {
        let a = run(ScenarioId::RandomReader, 99).await;
        let b = run(ScenarioId::RandomReader, 99).await;
        assert_eq!(
            serde_json::to_string(&a.export).unwrap(),
            serde_json::to_string(&b.export).unwrap()
        );
        assert_eq!(a.steps, b.steps);
    }

    #[tokio::test]
    async fn test_svg_capture() {
        let result = ScenarioRunner::new(1)
            .with_steps(20)
            .with_svg_capture(true)
            .run(ScenarioId::DecisionWalk)
            .await;
        assert!(result.passed, "{:?}", result.failure_reason);
        let svg = result
            .export
            .frames
            .iter()
            .find_map(|f| f.svg.get(DECISION_TREE))
            .expect("decision tree never captured");
        assert!(svg.contains("<svg"));
    }

    #[tokio::test]
    async fn test_invalid_scroll_distribution() {
        let config = SimConfig {
            scroll_std_dev: -1.0,
            ..SimConfig::default()
        };
        let result = ScenarioRunner::new(1).with_config(config).run(ScenarioId::ScrollThrough).await;
        assert!(!result.passed);
        assert!(result.failure_reason.unwrap().contains("scroll distribution"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(12))]

        #[test]
        fn prop_random_reader_keeps_invariants(seed in any::<u64>()) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let result = rt.block_on(ScenarioRunner::new(seed).with_steps(80).run(ScenarioId::RandomReader));
            prop_assert!(result.passed, "seed {}: {:?}", seed, result.failure_reason);
        }
    }
}
