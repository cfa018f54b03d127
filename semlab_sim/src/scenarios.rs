//! Reader scenarios for the harness.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScenarioId {
    /// SIM-001: Scroll top to bottom and back, every widget activates once
    ScrollThrough,

    /// SIM-002: Random walks through the test chooser with resets
    DecisionWalk,

    /// SIM-003: Answer every quiz, then hammer it with different answers
    QuizReplay,

    /// SIM-004: Random slider values, including out-of-range and NaN
    SliderSweep,

    /// SIM-005: Reference fetch rejected, both data widgets degrade
    OfflineReference,

    /// SIM-006: What-if path removal and model reset
    ExploreModel,

    /// SIM-007: Random scrolls and clicks on whatever is on screen
    RandomReader,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::ScrollThrough,
            ScenarioId::DecisionWalk,
            ScenarioId::QuizReplay,
            ScenarioId::SliderSweep,
            ScenarioId::OfflineReference,
            ScenarioId::ExploreModel,
            ScenarioId::RandomReader,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::ScrollThrough => "scroll_through",
            ScenarioId::DecisionWalk => "decision_walk",
            ScenarioId::QuizReplay => "quiz_replay",
            ScenarioId::SliderSweep => "slider_sweep",
            ScenarioId::OfflineReference => "offline_reference",
            ScenarioId::ExploreModel => "explore_model",
            ScenarioId::RandomReader => "random_reader",
        }
    }

    /// Returns the scenario description.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::ScrollThrough => "Scroll the lecture with a seeded step size; each widget activates exactly once",
            ScenarioId::DecisionWalk => "Random root-to-leaf walks through the test chooser, reset after each leaf",
            ScenarioId::QuizReplay => "Commit an answer per question, then replay other answers; nothing may change",
            ScenarioId::SliderSweep => "Drive the fit sliders with arbitrary values; stored values stay on the grid",
            ScenarioId::OfflineReference => "Reject the reference fetch; fallback texts shown, no retry, no panic",
            ScenarioId::ExploreModel => "Remove model paths in what-if mode, then reset and compare to the original",
            ScenarioId::RandomReader => "Interleave random scrolling with random clicks on active widgets",
        }
    }

    /// Whether the scenario runs without reference data.
    pub fn is_offline(&self) -> bool {
        matches!(self, ScenarioId::OfflineReference)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scroll_through" | "scrollthrough" | "scroll" | "sim-001" => Ok(ScenarioId::ScrollThrough),
            "decision_walk" | "decisionwalk" | "tree" | "sim-002" => Ok(ScenarioId::DecisionWalk),
            "quiz_replay" | "quizreplay" | "quiz" | "sim-003" => Ok(ScenarioId::QuizReplay),
            "slider_sweep" | "slidersweep" | "sliders" | "sim-004" => Ok(ScenarioId::SliderSweep),
            "offline_reference" | "offlinereference" | "offline" | "sim-005" => Ok(ScenarioId::OfflineReference),
            "explore_model" | "exploremodel" | "explore" | "sim-006" => Ok(ScenarioId::ExploreModel),
            "random_reader" | "randomreader" | "random" | "sim-007" => Ok(ScenarioId::RandomReader),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for id in ScenarioId::all() {
            assert_eq!(id.name().parse::<ScenarioId>(), Ok(id));
        }
    }

    #[test]
    fn test_aliases() {
        assert_eq!("SIM-005".parse::<ScenarioId>(), Ok(ScenarioId::OfflineReference));
        assert_eq!("Quiz".parse::<ScenarioId>(), Ok(ScenarioId::QuizReplay));
        assert!("time_warp".parse::<ScenarioId>().is_err());
    }

    #[test]
    fn test_only_offline_scenario_is_offline() {
        let offline: Vec<_> = ScenarioId::all().into_iter().filter(|s| s.is_offline()).collect();
        assert_eq!(offline, vec![ScenarioId::OfflineReference]);
    }
}
