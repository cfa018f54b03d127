//! Slider inputs and the derived fit metrics.
//!
//! Inputs are always stored normalized: clamped into their range and snapped
//! onto the step grid anchored at `min`. Normalizing an already-normalized
//! value returns it unchanged, so replaying a slider position is a no-op.

use crate::error::ContentError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Input names used by the fit explorer.
pub const SAMPLE_SIZE: &str = "sample-size";
pub const MODEL_COMPLEXITY: &str = "model-complexity";
pub const MISSPECIFICATION: &str = "misspecification";

/// Precision used to cancel float drift after stepping.
const SNAP: f64 = 1e9;

/// A bounded numeric input on a step grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSpec {
    pub name: String,
    pub label: String,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    /// Initial value; normalized on construction
    pub value: f64,
    /// Decimals shown next to the label
    pub precision: usize,
}

impl InputSpec {
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        (min, max): (f64, f64),
        step: f64,
        value: f64,
    ) -> Result<Self, ContentError> {
        let name = name.into();
        if !(min.is_finite() && max.is_finite()) || min > max {
            return Err(ContentError::input(name, format!("bad range [{}, {}]", min, max)));
        }
        if !(step.is_finite() && step > 0.0) {
            return Err(ContentError::input(name, format!("step must be positive, got {}", step)));
        }

        let mut spec = Self {
            name,
            label: label.into(),
            min,
            max,
            step,
            value,
            precision: 0,
        };
        spec.value = spec.normalize(value);
        Ok(spec)
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    /// Clamps into `[min, max]` and rounds to the nearest grid point
    /// `min + k * step`. A grid point past `max` steps back once.
    pub fn normalize(&self, value: f64) -> f64 {
        let clamped = if value.is_nan() {
            self.min
        } else {
            value.clamp(self.min, self.max)
        };

        let steps = ((clamped - self.min) / self.step).round();
        let mut out = self.min + steps * self.step;
        if out > self.max + f64::EPSILON {
            out -= self.step;
        }
        (out * SNAP).round() / SNAP
    }

    /// Value formatted for display.
    pub fn display(&self, value: f64) -> String {
        format!("{:.*}", self.precision, value)
    }
}

/// Current, normalized values of a panel's inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationInputs {
    specs: Vec<InputSpec>,
}

impl SimulationInputs {
    pub fn new(specs: Vec<InputSpec>) -> Result<Self, ContentError> {
        for (i, spec) in specs.iter().enumerate() {
            if specs[..i].iter().any(|s| s.name == spec.name) {
                return Err(ContentError::input(spec.name.clone(), "duplicate input"));
            }
        }
        Ok(Self { specs })
    }

    /// Stores the normalized `value` and returns it.
    pub fn set(&mut self, name: &str, value: f64) -> Result<f64, ContentError> {
        let spec = self
            .specs
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| ContentError::input(name, "unknown input"))?;
        let normalized = spec.normalize(value);
        spec.value = normalized;
        Ok(normalized)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.spec(name).map(|s| s.value)
    }

    pub fn spec(&self, name: &str) -> Option<&InputSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn specs(&self) -> &[InputSpec] {
        &self.specs
    }

    /// True if every stored value is a fixed point of its normalization.
    pub fn is_normalized(&self) -> bool {
        self.specs.iter().all(|s| s.normalize(s.value) == s.value)
    }
}

/// Named output values, in display order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    values: Vec<(String, f64)>,
}

impl DerivedMetrics {
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some((_, v)) => *v = value,
            None => self.values.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(n, v)| (n.as_str(), *v))
    }

    /// Snapshot keyed by name, for export.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        self.values.iter().cloned().collect()
    }
}

/// Maps slider inputs to displayed metrics. Must be deterministic.
pub trait FitModel: Send + Sync {
    fn derive(&self, inputs: &SimulationInputs) -> DerivedMetrics;
}

/// Tunable constants of [`HeuristicFitModel`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitCoefficients {
    /// Parameters absorbed before degrees of freedom start counting
    pub df_offset: f64,
    /// Chi-square inflation per unit misspecification
    pub chi_misspec: f64,
    /// Sample size at which chi-square equals df for a correct model
    pub chi_sample_scale: f64,
    pub cfi_misspec: f64,
    /// CFI penalty divisor for the parameter count
    pub cfi_complexity_scale: f64,
    pub rmsea_misspec: f64,
    pub rmsea_complexity: f64,
    pub srmr_misspec: f64,
    pub srmr_complexity: f64,
}

impl Default for FitCoefficients {
    fn default() -> Self {
        Self {
            df_offset: 5.0,
            chi_misspec: 3.0,
            chi_sample_scale: 200.0,
            cfi_misspec: 0.8,
            cfi_complexity_scale: 200.0,
            rmsea_misspec: 0.15,
            rmsea_complexity: 0.5,
            srmr_misspec: 0.12,
            srmr_complexity: 0.3,
        }
    }
}

/// Fit indices computed by [`HeuristicFitModel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitIndices {
    pub df: f64,
    pub chi_square: f64,
    pub p_value: f64,
    pub cfi: f64,
    pub rmsea: f64,
    pub srmr: f64,
}

/// Teaching heuristic for how fit indices move with n, parameters and
/// misspecification. Not a real estimator.
#[derive(Debug, Clone, Default)]
pub struct HeuristicFitModel {
    pub coefficients: FitCoefficients,
}

impl HeuristicFitModel {
    pub fn new(coefficients: FitCoefficients) -> Self {
        Self { coefficients }
    }

    /// Fit indices for sample size `n`, parameter count `p` and
    /// misspecification level `m`.
    pub fn compute(&self, n: f64, p: f64, m: f64) -> FitIndices {
        let c = &self.coefficients;
        let df = (p - c.df_offset).max(1.0);
        let chi_square = df * (1.0 + c.chi_misspec * m) * (n / c.chi_sample_scale);

        // Normal approximation of the chi-square upper tail
        let z = (2.0 * chi_square).sqrt() - (2.0 * df - 1.0).sqrt();
        let p_value = (0.5 * (1.0 - erf(z / std::f64::consts::SQRT_2))).clamp(0.0, 1.0);

        let cfi = (1.0 - c.cfi_misspec * m - p / c.cfi_complexity_scale).clamp(0.0, 1.0);
        let rmsea = (c.rmsea_misspec * m + c.rmsea_complexity * p / n).max(0.0);
        let srmr = (c.srmr_misspec * m + c.srmr_complexity * p / n).max(0.0);

        FitIndices {
            df,
            chi_square,
            p_value,
            cfi,
            rmsea,
            srmr,
        }
    }
}

impl FitModel for HeuristicFitModel {
    fn derive(&self, inputs: &SimulationInputs) -> DerivedMetrics {
        let n = inputs.get(SAMPLE_SIZE).unwrap_or(1.0).max(1.0);
        let p = inputs.get(MODEL_COMPLEXITY).unwrap_or(0.0);
        let m = inputs.get(MISSPECIFICATION).unwrap_or(0.0);
        let fit = self.compute(n, p, m);

        let mut out = DerivedMetrics::default();
        out.insert("chi_square", fit.chi_square);
        out.insert("p_value", fit.p_value);
        out.insert("df", fit.df);
        out.insert("cfi", fit.cfi);
        out.insert("rmsea", fit.rmsea);
        out.insert("srmr", fit.srmr);
        out
    }
}

/// Error function, Abramowitz and Stegun 7.1.26 (|error| < 1.5e-7).
pub fn erf(x: f64) -> f64 {
    let sign = if x >= 0.0 { 1.0 } else { -1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + 0.3275911 * x);
    let poly = ((((1.061405429 * t - 1.453152027) * t + 1.421413741) * t - 0.284496736) * t
        + 0.254829592)
        * t;
    sign * (1.0 - poly * (-x * x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn misspec() -> InputSpec {
        InputSpec::new(MISSPECIFICATION, "Misspecification Level", (0.0, 1.0), 0.05, 0.1).unwrap()
    }

    fn fit_inputs(n: f64, p: f64, m: f64) -> SimulationInputs {
        SimulationInputs::new(vec![
            InputSpec::new(SAMPLE_SIZE, "Sample Size", (50.0, 2000.0), 50.0, n).unwrap(),
            InputSpec::new(MODEL_COMPLEXITY, "Model Complexity", (5.0, 50.0), 1.0, p).unwrap(),
            InputSpec::new(MISSPECIFICATION, "Misspecification", (0.0, 1.0), 0.05, m).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn test_normalize_clamps_and_rounds() {
        let spec = misspec();
        assert_eq!(spec.normalize(-3.0), 0.0);
        assert_eq!(spec.normalize(7.0), 1.0);
        assert_eq!(spec.normalize(0.33), 0.35);
        assert_eq!(spec.normalize(0.1), 0.1);
        assert_eq!(spec.normalize(f64::NAN), 0.0);
    }

    #[test]
    fn test_step_not_dividing_range() {
        let spec = InputSpec::new("x", "x", (0.0, 10.0), 3.0, 0.0).unwrap();
        // 10 rounds to 9 (3 steps), never to 12
        assert_eq!(spec.normalize(10.0), 9.0);
        assert_eq!(spec.normalize(7.4), 6.0);
    }

    #[test]
    fn test_invalid_specs() {
        assert!(InputSpec::new("x", "x", (1.0, 0.0), 1.0, 0.0).is_err());
        assert!(InputSpec::new("x", "x", (0.0, 1.0), 0.0, 0.0).is_err());
        assert!(InputSpec::new("x", "x", (0.0, f64::INFINITY), 1.0, 0.0).is_err());
        assert!(SimulationInputs::new(vec![misspec(), misspec()]).is_err());
    }

    #[test]
    fn test_set_unknown_input() {
        let mut inputs = fit_inputs(500.0, 15.0, 0.1);
        assert!(inputs.set("temperature", 1.0).is_err());
        assert_eq!(inputs.set(SAMPLE_SIZE, 523.0).unwrap(), 500.0);
    }

    #[test]
    fn test_reference_point() {
        let model = HeuristicFitModel::default();
        let metrics = model.derive(&fit_inputs(500.0, 15.0, 0.1));

        assert_relative_eq!(metrics.get("cfi").unwrap(), 0.845, epsilon = 1e-12);
        assert_relative_eq!(metrics.get("df").unwrap(), 10.0);
        assert_relative_eq!(metrics.get("chi_square").unwrap(), 32.5, epsilon = 1e-12);
        assert_relative_eq!(metrics.get("rmsea").unwrap(), 0.03, epsilon = 1e-12);
        assert_relative_eq!(metrics.get("srmr").unwrap(), 0.021, epsilon = 1e-12);
    }

    #[test]
    fn test_df_floor() {
        let fit = HeuristicFitModel::default().compute(200.0, 5.0, 0.0);
        assert_eq!(fit.df, 1.0);
        assert_relative_eq!(fit.chi_square, 1.0);
    }

    #[test]
    fn test_erf_known_values() {
        assert_relative_eq!(erf(0.0), 0.0, epsilon = 1e-7);
        assert_relative_eq!(erf(1.0), 0.842_700_79, epsilon = 1e-6);
        assert_relative_eq!(erf(-1.0), -0.842_700_79, epsilon = 1e-6);
    }

    #[test]
    fn test_metrics_order() {
        let metrics = HeuristicFitModel::default().derive(&fit_inputs(500.0, 15.0, 0.1));
        let names: Vec<&str> = metrics.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["chi_square", "p_value", "df", "cfi", "rmsea", "srmr"]);
    }

    proptest! {
        #[test]
        fn prop_normalize_idempotent(v in -10.0f64..10.0) {
            let spec = misspec();
            let once = spec.normalize(v);
            prop_assert_eq!(spec.normalize(once), once);
            prop_assert!(once >= spec.min && once <= spec.max);
        }

        #[test]
        fn prop_set_stores_normalized(n in 0.0f64..3000.0, p in 0.0f64..60.0) {
            let mut inputs = fit_inputs(500.0, 15.0, 0.1);
            let stored = inputs.set(SAMPLE_SIZE, n).unwrap();
            inputs.set(MODEL_COMPLEXITY, p).unwrap();
            prop_assert!(inputs.is_normalized());
            prop_assert_eq!(inputs.set(SAMPLE_SIZE, stored).unwrap(), stored);
        }

        #[test]
        fn prop_indices_bounded(n in 50.0f64..2000.0, p in 5.0f64..50.0, m in 0.0f64..1.0) {
            let fit = HeuristicFitModel::default().compute(n, p, m);
            prop_assert!((0.0..=1.0).contains(&fit.p_value));
            prop_assert!((0.0..=1.0).contains(&fit.cfi));
            prop_assert!(fit.rmsea >= 0.0 && fit.srmr >= 0.0);
        }
    }
}
