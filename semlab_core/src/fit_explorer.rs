//! Fit index explorer: three sliders, four graded cards and an optional
//! reference row with the fit of the real model.

use crate::error::ContentError;
use crate::reference::{format_value, ReferenceData, ReferenceError, ReferenceSlot, NOT_AVAILABLE};
use crate::simulation::{
    DerivedMetrics, FitModel, HeuristicFitModel, InputSpec, SimulationInputs, MISSPECIFICATION,
    MODEL_COMPLEXITY, SAMPLE_SIZE,
};
use crate::widget::{Action, Block, Control, Frame, Tone, Widget, WidgetKind};
use semlab_env::MountId;
use std::sync::Arc;
use tracing::debug;

pub const REFERENCE_LOADING: &str = "Loading BKS model reference values...";
pub const REFERENCE_UNAVAILABLE: &str = "(BKS reference data not available)";

/// Grade for a "higher is better" value.
pub fn grade_at_least(value: f64, good: f64, ok: f64) -> Tone {
    if value >= good {
        Tone::Good
    } else if value >= ok {
        Tone::Ok
    } else {
        Tone::Poor
    }
}

/// Grade for a "lower is better" value.
pub fn grade_at_most(value: f64, good: f64, ok: f64) -> Tone {
    if value <= good {
        Tone::Good
    } else if value <= ok {
        Tone::Ok
    } else {
        Tone::Poor
    }
}

/// Default slider set.
pub fn default_inputs() -> Result<SimulationInputs, ContentError> {
    SimulationInputs::new(vec![
        InputSpec::new(SAMPLE_SIZE, "Sample Size", (50.0, 2000.0), 50.0, 500.0)?,
        InputSpec::new(
            MODEL_COMPLEXITY,
            "Model Complexity (parameters)",
            (5.0, 50.0),
            1.0,
            15.0,
        )?,
        InputSpec::new(MISSPECIFICATION, "Misspecification Level", (0.0, 1.0), 0.05, 0.1)?
            .with_precision(2),
    ])
}

pub struct FitExplorerWidget {
    mount: MountId,
    inputs: SimulationInputs,
    model: Box<dyn FitModel>,
    metrics: DerivedMetrics,
    reference_path: Option<String>,
    reference: ReferenceSlot,
}

impl FitExplorerWidget {
    /// Explorer with the default sliders and heuristic model.
    pub fn new(mount: MountId) -> Result<Self, ContentError> {
        Ok(Self::with_model(mount, default_inputs()?, Box::new(HeuristicFitModel::default())))
    }

    pub fn with_model(mount: MountId, inputs: SimulationInputs, model: Box<dyn FitModel>) -> Self {
        let metrics = model.derive(&inputs);
        Self {
            mount,
            inputs,
            model,
            metrics,
            reference_path: None,
            reference: ReferenceSlot::Loading,
        }
    }

    /// Enables the reference row, fed from `path`.
    pub fn with_reference(mut self, path: impl Into<String>) -> Self {
        self.reference_path = Some(path.into());
        self
    }

    pub fn inputs(&self) -> &SimulationInputs {
        &self.inputs
    }

    pub fn metrics(&self) -> &DerivedMetrics {
        &self.metrics
    }

    pub fn reference(&self) -> &ReferenceSlot {
        &self.reference
    }

    /// Finite metric value; None when the model did not provide it.
    fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).filter(|v| v.is_finite())
    }

    fn reference_text(&self) -> String {
        match &self.reference {
            ReferenceSlot::Loading => REFERENCE_LOADING.to_string(),
            ReferenceSlot::Unavailable => REFERENCE_UNAVAILABLE.to_string(),
            ReferenceSlot::Ready(data) => {
                let fit = &data.sem_results;
                format!(
                    "BKS Model Reference: Chi-square p={}, CFI={}, RMSEA={}, SRMR={}",
                    format_value(fit.chi_square_p_value()),
                    format_value(fit.cfi()),
                    format_value(fit.rmsea()),
                    format_value(fit.srmr()),
                )
            }
        }
    }

    fn cards(&self) -> Block {
        let chi = self.metric("chi_square");
        let p = self.metric("p_value");
        let cfi = self.metric("cfi");
        let rmsea = self.metric("rmsea");
        let srmr = self.metric("srmr");

        let card = |id: &str, label: &str, value: String, tone: Tone| Control::Card {
            id: id.to_string(),
            label: label.to_string(),
            value,
            tone,
        };

        Block::new("fit-display")
            .with(card(
                "card-chi",
                "Chi-square (p-value)",
                format!(
                    "{} (p={})",
                    chi.map_or_else(|| NOT_AVAILABLE.to_string(), |c| format!("{:.1}", c)),
                    format_value(p)
                ),
                p.map_or(Tone::Neutral, |p| grade_at_least(p, 0.05, 0.01)),
            ))
            .with(card(
                "card-cfi",
                "CFI",
                format_value(cfi),
                cfi.map_or(Tone::Neutral, |v| grade_at_least(v, 0.95, 0.90)),
            ))
            .with(card(
                "card-rmsea",
                "RMSEA",
                format_value(rmsea),
                rmsea.map_or(Tone::Neutral, |v| grade_at_most(v, 0.05, 0.08)),
            ))
            .with(card(
                "card-srmr",
                "SRMR",
                format_value(srmr),
                srmr.map_or(Tone::Neutral, |v| grade_at_most(v, 0.05, 0.08)),
            ))
    }
}

impl Widget for FitExplorerWidget {
    fn mount(&self) -> &MountId {
        &self.mount
    }

    fn kind(&self) -> WidgetKind {
        WidgetKind::FitExplorer
    }

    fn render(&self) -> Frame {
        let mut frame = Frame::default();

        let mut sliders = Block::new("slider-group");
        for spec in self.inputs.specs() {
            sliders.push(Control::Slider {
                name: spec.name.clone(),
                label: spec.label.clone(),
                min: spec.min,
                max: spec.max,
                step: spec.step,
                value: spec.value,
                display: spec.display(spec.value),
            });
        }
        frame.push(sliders);
        frame.push(self.cards());

        if self.reference_path.is_some() {
            frame.push(Block::new("bks-reference").with(Control::text("bks-reference", self.reference_text())));
        }
        frame
    }

    fn dispatch(&mut self, action: &Action) -> bool {
        let Action::SetInput { name, value } = action else {
            return false;
        };
        let before = self.inputs.get(name);
        match self.inputs.set(name, *value) {
            Ok(stored) if Some(stored) != before => {
                self.metrics = self.model.derive(&self.inputs);
                debug!("{} {}={} cfi={}", self.mount, name, stored, format_value(self.metric("cfi")));
                true
            }
            Ok(_) => false,
            Err(e) => {
                debug!("{} ignored input: {}", self.mount, e);
                false
            }
        }
    }

    fn reference_request(&self) -> Option<&str> {
        match self.reference {
            ReferenceSlot::Loading => self.reference_path.as_deref(),
            _ => None,
        }
    }

    fn deliver_reference(&mut self, result: Result<Arc<ReferenceData>, ReferenceError>) {
        if self.reference_path.is_some() && self.reference.resolve(result) {
            debug!("{} reference resolved (ready={})", self.mount, self.reference.data().is_some());
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
