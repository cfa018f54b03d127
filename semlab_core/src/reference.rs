//! Static SEM reference data.
//!
//! The reference file is produced offline by the data pipeline and fetched
//! once per widget. Its fit-index block comes straight out of the estimator
//! and is not fully stable: the chi-square may be keyed `chi_square` or
//! `chi2`, its p-value `chi2_p_value` or `chi2_p-value`, and any index may
//! be missing or null. Accessors here absorb those differences.

use semlab_env::EnvError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Placeholder shown for any missing value.
pub const NOT_AVAILABLE: &str = "N/A";

/// Failure to obtain reference data.
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("Reference fetch failed: {0}")]
    Fetch(#[from] EnvError),

    #[error("Reference parse failed: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One estimated parameter (`from` is the left-hand side in lavaan syntax).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub op: Option<String>,
    #[serde(default)]
    pub estimate: Option<f64>,
    #[serde(default)]
    pub std_err: Option<f64>,
    #[serde(default)]
    pub p_value: Option<f64>,
}

/// Model estimation output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SemResults {
    #[serde(default)]
    pub model_spec: Option<String>,
    #[serde(default)]
    pub factor_loadings: Vec<Estimate>,
    #[serde(default)]
    pub path_coefficients: Vec<Estimate>,
    /// Raw fit statistics, keyed as exported
    #[serde(default)]
    pub fit_indices: BTreeMap<String, Value>,
}

impl SemResults {
    fn fit_value(&self, keys: &[&str]) -> Option<f64> {
        keys.iter()
            .find_map(|k| self.fit_indices.get(*k).and_then(Value::as_f64))
    }

    pub fn chi_square(&self) -> Option<f64> {
        self.fit_value(&["chi_square", "chi2"])
    }

    pub fn chi_square_p_value(&self) -> Option<f64> {
        self.fit_value(&["chi2_p_value", "chi2_p-value"])
    }

    pub fn cfi(&self) -> Option<f64> {
        self.fit_value(&["cfi"])
    }

    pub fn rmsea(&self) -> Option<f64> {
        self.fit_value(&["rmsea"])
    }

    pub fn srmr(&self) -> Option<f64> {
        self.fit_value(&["srmr"])
    }

    /// Loading of indicator `to` on latent `from`.
    pub fn loading(&self, from: &str, to: &str) -> Option<f64> {
        find_estimate(&self.factor_loadings, from, to)
    }

    /// Regression coefficient of `to` in the equation for `from`.
    pub fn path(&self, from: &str, to: &str) -> Option<f64> {
        find_estimate(&self.path_coefficients, from, to)
    }
}

fn find_estimate(list: &[Estimate], from: &str, to: &str) -> Option<f64> {
    list.iter()
        .find(|e| e.from == from && e.to == to)
        .and_then(|e| e.estimate)
}

/// Sample description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DescriptiveStats {
    #[serde(default)]
    pub n: Option<u64>,
    #[serde(default)]
    pub means: BTreeMap<String, f64>,
    #[serde(default)]
    pub std_devs: BTreeMap<String, f64>,
}

/// The whole reference document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceData {
    pub sem_results: SemResults,
    #[serde(default)]
    pub variable_descriptions: BTreeMap<String, String>,
    #[serde(default)]
    pub descriptive_stats: DescriptiveStats,
}

impl ReferenceData {
    pub fn from_json(json: &str) -> Result<Self, ReferenceError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sample size as text, or "N/A".
    pub fn sample_size(&self) -> String {
        self.descriptive_stats
            .n
            .map(|n| n.to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }
}

/// Reference data as seen by a widget: requested once, resolved once.
#[derive(Debug, Clone, Default)]
pub enum ReferenceSlot {
    #[default]
    Loading,
    Ready(Arc<ReferenceData>),
    /// Fetch or parse failed; permanent for the session
    Unavailable,
}

impl ReferenceSlot {
    /// Resolves a loading slot. Later deliveries are ignored.
    pub fn resolve(&mut self, result: Result<Arc<ReferenceData>, ReferenceError>) -> bool {
        if !self.is_loading() {
            return false;
        }
        *self = match result {
            Ok(data) => ReferenceSlot::Ready(data),
            Err(_) => ReferenceSlot::Unavailable,
        };
        true
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, ReferenceSlot::Loading)
    }

    pub fn data(&self) -> Option<&ReferenceData> {
        match self {
            ReferenceSlot::Ready(data) => Some(data),
            _ => None,
        }
    }
}

/// Formats an optional statistic with three decimals, or "N/A".
pub fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.3}", v),
        _ => NOT_AVAILABLE.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Small reference document in the exported shape.
    pub(crate) const SAMPLE: &str = r#"{
        "variable_descriptions": {"opennessvariable": "Openness"},
        "descriptive_stats": {"n": 14521, "means": {"opennessvariable": 1.2}},
        "sem_results": {
            "factor_loadings": [
                {"from": "Personality", "op": "=~", "to": "opennessvariable", "estimate": 1.0},
                {"from": "Personality", "op": "=~", "to": "consciensiousnessvariable", "estimate": 0.8123},
                {"from": "Personality", "op": "=~", "to": "extroversionvariable", "estimate": null}
            ],
            "path_coefficients": [
                {"from": "Personality", "op": "~", "to": "neuroticismvariable", "estimate": -0.4211},
                {"from": "powerlessnessvariable", "op": "~", "to": "Personality", "estimate": -0.3012},
                {"from": "powerlessnessvariable", "op": "~", "to": "neuroticismvariable", "estimate": 0.2554},
                {"from": "powerlessnessvariable", "op": "~", "to": "totalfetishcategory", "estimate": 0.0311}
            ],
            "fit_indices": {"chi2": 812.44, "chi2_p-value": 0.0, "cfi": 0.9412, "rmsea": 0.0718, "srmr": null, "dof": 12}
        }
    }"#;

    #[test]
    fn test_parse_sample() {
        let data = ReferenceData::from_json(SAMPLE).unwrap();
        let sem = &data.sem_results;

        assert_eq!(sem.chi_square(), Some(812.44));
        assert_eq!(sem.chi_square_p_value(), Some(0.0));
        assert_eq!(sem.cfi(), Some(0.9412));
        assert_eq!(sem.srmr(), None);
        assert_eq!(data.sample_size(), "14521");
    }

    #[test]
    fn test_alternate_key_spellings() {
        let json = r#"{"sem_results": {"fit_indices": {"chi_square": 10.5, "chi2_p_value": 0.25}}}"#;
        let data = ReferenceData::from_json(json).unwrap();
        assert_eq!(data.sem_results.chi_square(), Some(10.5));
        assert_eq!(data.sem_results.chi_square_p_value(), Some(0.25));
    }

    #[test]
    fn test_missing_optional_fields() {
        let data = ReferenceData::from_json(r#"{"sem_results": {}}"#).unwrap();
        assert_eq!(format_value(data.sem_results.cfi()), "N/A");
        assert_eq!(data.sample_size(), "N/A");
        assert!(data.variable_descriptions.is_empty());
    }

    #[test]
    fn test_lookup_estimates() {
        let data = ReferenceData::from_json(SAMPLE).unwrap();
        let sem = &data.sem_results;

        assert_eq!(sem.loading("Personality", "consciensiousnessvariable"), Some(0.8123));
        assert_eq!(sem.loading("Personality", "extroversionvariable"), None);
        assert_eq!(sem.path("powerlessnessvariable", "Personality"), Some(-0.3012));
        assert_eq!(sem.path("Personality", "powerlessnessvariable"), None);
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(Some(0.9412)), "0.941");
        assert_eq!(format_value(None), "N/A");
        assert_eq!(format_value(Some(f64::NAN)), "N/A");
    }

    #[test]
    fn test_slot_resolves_once() {
        let mut slot = ReferenceSlot::default();
        assert!(slot.resolve(Err(ReferenceError::Fetch(EnvError::rejected("offline")))));
        assert!(matches!(slot, ReferenceSlot::Unavailable));

        let data = Arc::new(ReferenceData::from_json(SAMPLE).unwrap());
        assert!(!slot.resolve(Ok(data)));
        assert!(slot.data().is_none());
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            ReferenceData::from_json("not json"),
            Err(ReferenceError::Parse(_))
        ));
    }
}
