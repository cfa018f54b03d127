//! SEMLAB Core - Interactive widgets for a structural equation modelling lecture
//!
//! Every widget owns a small piece of state and projects it into a full
//! [`Frame`] on each render:
//! 1. **Lazy activation**: widgets are built the first time their mount point
//!    scrolls into view, exactly once per page session
//! 2. **Pure projection**: `render()` describes the whole widget as a scene
//!    graph plus controls; adapters (SVG, Rerun) draw it
//! 3. **Degraded, not broken**: invalid actions are no-ops and a failed
//!    reference fetch only changes what one widget displays

pub mod activation;
pub mod content;
pub mod decision_tree;
pub mod error;
pub mod fit_explorer;
pub mod page;
pub mod path_builder;
pub mod quiz;
pub mod reference;
pub mod scene;
pub mod sem_model;
pub mod simulation;
pub mod svg;
pub mod variables;
pub mod widget;

#[cfg(feature = "visualization")]
pub mod visualization;

// Re-export key types for convenience
pub use activation::{ActivationController, MountStatus};
pub use decision_tree::{DecisionTree, DecisionTreeState, DecisionTreeWidget, TreeError, TreeNode};
pub use error::ContentError;
pub use fit_explorer::FitExplorerWidget;
pub use page::{lecture_page, Page, PageConfig};
pub use path_builder::{PathDiagram, PathModelWidget};
pub use quiz::{QuizError, QuizQuestion, QuizSet, QuizState, QuizWidget};
pub use reference::{ReferenceData, ReferenceError};
pub use scene::Scene;
pub use sem_model::{ExploreMode, ModelExplorerWidget};
pub use simulation::{DerivedMetrics, FitCoefficients, FitModel, HeuristicFitModel, SimulationInputs};
pub use svg::{Surface, SvgRenderer};
pub use variables::VariableDiagramWidget;
pub use widget::{Action, Frame, Widget, WidgetKind};
